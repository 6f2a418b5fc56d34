use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::application::follows::FollowError;
use crate::presentation::views::render_not_found_response;

use super::public::{HttpState, current_viewer, login_redirect};

/// `POST /{username}/follow/`. Idempotent: following twice leaves one edge.
pub(super) async fn follow_author(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(username): Path<String>,
) -> Response {
    let profile_path = format!("/{username}/");
    let follow_path = format!("/{username}/follow/");

    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect(&follow_path),
        Err(err) => return err.into_response(),
    };

    match state.follows.follow(&viewer, &username).await {
        Ok(()) => Redirect::to(&profile_path).into_response(),
        // Attempting to follow yourself just returns you to your profile.
        Err(FollowError::SelfFollow) => Redirect::to(&profile_path).into_response(),
        Err(FollowError::UnknownAuthor) => render_not_found_response(Some((&viewer).into())),
        Err(FollowError::Repo(err)) => {
            super::repo_error_to_http("infra::http::follows::follow_author", err).into_response()
        }
    }
}

/// `POST /{username}/unfollow/`. Removing an absent edge is a no-op.
pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(username): Path<String>,
) -> Response {
    let profile_path = format!("/{username}/");
    let unfollow_path = format!("/{username}/unfollow/");

    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect(&unfollow_path),
        Err(err) => return err.into_response(),
    };

    match state.follows.unfollow(&viewer, &username).await {
        Ok(()) => Redirect::to(&profile_path).into_response(),
        Err(FollowError::SelfFollow) => Redirect::to(&profile_path).into_response(),
        Err(FollowError::UnknownAuthor) => render_not_found_response(Some((&viewer).into())),
        Err(FollowError::Repo(err)) => {
            super::repo_error_to_http("infra::http::follows::unfollow_author", err).into_response()
        }
    }
}
