use std::collections::HashMap;

use axum::{
    Router,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;

use crate::application::auth::SESSION_COOKIE;
use crate::presentation::views::{
    AuthFormContext, LayoutContext, LoginTemplate, SignupTemplate, render_template_response,
};

use super::public::{HttpState, session_viewer};

pub(super) fn router() -> Router<HttpState> {
    Router::new()
        .route("/auth/login/", get(login_form).post(login))
        .route("/auth/signup/", get(signup_form).post(signup))
        .route("/auth/logout/", post(logout))
}

#[derive(Debug, Deserialize)]
pub(super) struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: String,
}

/// Post-login destinations must be local paths; anything else falls back to
/// the homepage so the `next` parameter cannot redirect off-site.
fn safe_next(raw: &str) -> &str {
    if raw.starts_with('/') && !raw.starts_with("//") {
        raw
    } else {
        "/"
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

fn render_login(context: AuthFormContext, status: StatusCode) -> Response {
    let view = LayoutContext::new("Войти", None, context);
    render_template_response(LoginTemplate { view }, status)
}

fn render_signup(context: AuthFormContext, status: StatusCode) -> Response {
    let view = LayoutContext::new("Зарегистрироваться", None, context);
    render_template_response(SignupTemplate { view }, status)
}

async fn login_form(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if session_viewer(&state, &jar).is_some() {
        return Redirect::to("/").into_response();
    }

    let context = AuthFormContext {
        username: String::new(),
        next: query.get("next").cloned().unwrap_or_default(),
        error: None,
    };
    render_login(context, StatusCode::OK)
}

async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.auth.login(&form.username, &form.password).await {
        Ok(token) => {
            let jar = jar.add(session_cookie(token));
            (jar, Redirect::to(safe_next(&form.next))).into_response()
        }
        Err(err) => {
            let context = AuthFormContext {
                username: form.username,
                next: form.next,
                error: Some(err.form_message()),
            };
            render_login(context, StatusCode::OK)
        }
    }
}

async fn signup_form(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if session_viewer(&state, &jar).is_some() {
        return Redirect::to("/").into_response();
    }

    let context = AuthFormContext {
        username: String::new(),
        next: query.get("next").cloned().unwrap_or_default(),
        error: None,
    };
    render_signup(context, StatusCode::OK)
}

async fn signup(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.auth.signup(&form.username, &form.password).await {
        Ok((_user, token)) => {
            let jar = jar.add(session_cookie(token));
            (jar, Redirect::to(safe_next(&form.next))).into_response()
        }
        Err(err) => {
            let context = AuthFormContext {
                username: form.username,
                next: form.next,
                error: Some(err.form_message()),
            };
            render_signup(context, StatusCode::OK)
        }
    }
}

async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.auth.logout(cookie.value());
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Redirect::to("/")).into_response()
}
