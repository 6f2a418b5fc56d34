use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::comments::CommentError;
use crate::presentation::views::render_not_found_response;

use super::public::{HttpState, current_viewer, login_redirect, session_viewer};

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

/// `POST /{username}/{post_id}/comment/`. Anonymous submissions redirect to
/// the login page and persist nothing.
pub(super) async fn add_comment(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let post_path = format!("/{username}/{post_id}/");
    let comment_path = format!("/{username}/{post_id}/comment/");

    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect(&comment_path),
        Err(err) => return err.into_response(),
    };

    let Ok(post_id) = post_id.parse::<Uuid>() else {
        return render_not_found_response(session_viewer(&state, &jar));
    };

    match state.comments.add_comment(&viewer, post_id, &form.text).await {
        Ok(_) => Redirect::to(&post_path).into_response(),
        // An empty comment is dropped and the reader lands back on the post.
        Err(CommentError::EmptyText) => Redirect::to(&post_path).into_response(),
        Err(CommentError::UnknownPost) => render_not_found_response(Some((&viewer).into())),
        Err(CommentError::Repo(err)) => {
            super::repo_error_to_http("infra::http::comments::add_comment", err).into_response()
        }
    }
}
