use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        pagination::PageRequest,
        posts::{PostError, PostInput, UploadedImage},
    },
    domain::entities::UserRecord,
    presentation::views::{
        GroupOption, LayoutContext, PostFormContext, PostFormTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::public::{HttpState, current_viewer, login_redirect};

const GROUP_SELECTOR_LIMIT: u32 = 200;

pub(super) fn router(upload_limit_bytes: usize) -> Router<HttpState> {
    Router::new()
        .route("/new/", get(new_post_form).post(create_post))
        .route(
            "/{username}/{post_id}/edit/",
            get(edit_post_form).post(update_post),
        )
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
}

/// Parsed multipart body of the post form: text, optional group, optional image.
struct PostForm {
    text: String,
    group_id: Option<Uuid>,
    image: Option<UploadedImage>,
}

impl PostForm {
    fn into_input(self) -> PostInput {
        PostInput {
            text: self.text,
            group_id: self.group_id,
            image: self.image,
        }
    }
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";

    let mut form = PostForm {
        text: String::new(),
        group_id: None,
        image: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form body", &err)
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                form.text = field.text().await.map_err(|err| {
                    HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form body", &err)
                })?;
            }
            "group" => {
                let value = field.text().await.map_err(|err| {
                    HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form body", &err)
                })?;
                form.group_id = value.trim().parse::<Uuid>().ok();
            }
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data: Bytes = field.bytes().await.map_err(|err| {
                    HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form body", &err)
                })?;
                if !filename.is_empty() && !data.is_empty() {
                    form.image = Some(UploadedImage { filename, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn group_options(
    state: &HttpState,
    selected: Option<Uuid>,
) -> Result<Vec<GroupOption>, HttpError> {
    let groups = state
        .groups
        .list_groups(None, PageRequest::new(1, GROUP_SELECTOR_LIMIT))
        .await
        .map_err(|err| super::repo_error_to_http("infra::http::posts::group_options", err))?;

    Ok(groups
        .into_iter()
        .map(|group| GroupOption {
            selected: selected == Some(group.id),
            id: group.id.to_string(),
            title: group.title,
        })
        .collect())
}

fn render_post_form(
    viewer: &UserRecord,
    context: PostFormContext,
    status: StatusCode,
) -> Response {
    let view = LayoutContext::new(
        context.heading.clone(),
        Some(crate::application::auth::SessionUser::from(viewer)),
        context,
    );
    render_template_response(PostFormTemplate { view }, status)
}

async fn new_post_form(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect("/new/"),
        Err(err) => return err.into_response(),
    };

    let groups = match group_options(&state, None).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    let context = PostFormContext {
        heading: "Новая запись".to_string(),
        submit_label: "Добавить".to_string(),
        action: "/new/".to_string(),
        text: String::new(),
        groups,
        error: None,
    };
    render_post_form(&viewer, context, StatusCode::OK)
}

async fn create_post(
    State(state): State<HttpState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect("/new/"),
        Err(err) => return err.into_response(),
    };

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let submitted_text = form.text.clone();
    let submitted_group = form.group_id;

    match state.posts.create_post(&viewer, form.into_input()).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => {
            post_form_error_response(
                &state,
                &viewer,
                err,
                "Новая запись",
                "Добавить",
                "/new/",
                submitted_text,
                submitted_group,
            )
            .await
        }
    }
}

async fn edit_post_form(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let post_path = format!("/{username}/{post_id}/");
    let edit_path = format!("/{username}/{post_id}/edit/");

    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect(&edit_path),
        Err(err) => return err.into_response(),
    };

    let Ok(post_id) = post_id.parse::<Uuid>() else {
        return render_not_found_response(Some((&viewer).into()));
    };

    let post = match state.posts.find_post(post_id).await {
        Ok(Some(post)) if post.author_username == username => post,
        Ok(_) => return render_not_found_response(Some((&viewer).into())),
        Err(err) => return post_error_to_response(err),
    };

    // Only the author may edit; everyone else lands back on the post.
    if post.author_id != viewer.id {
        return Redirect::to(&post_path).into_response();
    }

    let groups = match group_options(&state, post.group.as_ref().map(|g| g.id)).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    let context = PostFormContext {
        heading: "Редактировать запись".to_string(),
        submit_label: "Сохранить".to_string(),
        action: edit_path,
        text: post.text,
        groups,
        error: None,
    };
    render_post_form(&viewer, context, StatusCode::OK)
}

async fn update_post(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Response {
    let post_path = format!("/{username}/{post_id}/");
    let edit_path = format!("/{username}/{post_id}/edit/");

    let viewer = match current_viewer(&state, &jar).await {
        Ok(Some(viewer)) => viewer,
        Ok(None) => return login_redirect(&edit_path),
        Err(err) => return err.into_response(),
    };

    let Ok(post_id) = post_id.parse::<Uuid>() else {
        return render_not_found_response(Some((&viewer).into()));
    };

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };
    let submitted_text = form.text.clone();
    let submitted_group = form.group_id;

    match state.posts.edit_post(&viewer, post_id, form.into_input()).await {
        Ok(post) => {
            Redirect::to(&format!("/{}/{}/", post.author_username, post.id)).into_response()
        }
        Err(PostError::NotAuthor) => Redirect::to(&post_path).into_response(),
        Err(PostError::NotFound) => render_not_found_response(Some((&viewer).into())),
        Err(err) => {
            post_form_error_response(
                &state,
                &viewer,
                err,
                "Редактировать запись",
                "Сохранить",
                &edit_path,
                submitted_text,
                submitted_group,
            )
            .await
        }
    }
}

/// Re-render the form with the validation message, or surface the failure.
#[allow(clippy::too_many_arguments)]
async fn post_form_error_response(
    state: &HttpState,
    viewer: &UserRecord,
    err: PostError,
    heading: &str,
    submit_label: &str,
    action: &str,
    text: String,
    group_id: Option<Uuid>,
) -> Response {
    let Some(message) = err.form_message() else {
        return post_error_to_response(err);
    };

    let groups = match group_options(state, group_id).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    let context = PostFormContext {
        heading: heading.to_string(),
        submit_label: submit_label.to_string(),
        action: action.to_string(),
        text,
        groups,
        error: Some(message.to_string()),
    };
    render_post_form(viewer, context, StatusCode::OK)
}

fn post_error_to_response(err: PostError) -> Response {
    match err {
        PostError::Repo(repo) => {
            super::repo_error_to_http("infra::http::posts", repo).into_response()
        }
        other => HttpError::from_error(
            "infra::http::posts",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &other,
        )
        .into_response(),
    }
}
