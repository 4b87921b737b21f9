use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use innerforge_core::auth::{self, SignupOutcome};
use serde::Deserialize;

use crate::auth::{clear_cookie, redirect_with_cookie, session_cookie, session_token, MaybeUser};
use crate::error::AppError;
use crate::routes::Nav;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .route("/signup", get(signup_form).post(signup_submit))
        .route("/logout", post(logout))
}

// -- Templates --

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    nav: Nav,
    username: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupTemplate {
    nav: Nav,
    username: String,
    username_errors: Vec<String>,
    password_errors: Vec<String>,
}

// -- Form params --

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    username: String,
    password: String,
    password_confirm: String,
}

// -- Handlers --

async fn login_form(MaybeUser(user): MaybeUser) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let tmpl = LoginTemplate {
        nav: Nav::for_viewer(None),
        username: String::new(),
        error: None,
    };
    Ok(Html(tmpl.render()?).into_response())
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(input): Form<LoginForm>,
) -> Result<Response, AppError> {
    let ttl_hours = state.config.auth.session_ttl_hours;
    let attempt = auth::login(
        &state.store,
        &input.username,
        &input.password,
        u64::from(ttl_hours),
    )
    .await?;

    match attempt {
        Some((_, session)) => Ok(redirect_with_cookie(
            "/",
            &session_cookie(&session.token, ttl_hours),
        )),
        None => {
            let tmpl = LoginTemplate {
                nav: Nav::for_viewer(None),
                username: input.username,
                error: Some("Wrong username or password.".to_string()),
            };
            Ok(Html(tmpl.render()?).into_response())
        }
    }
}

async fn signup_form(MaybeUser(user): MaybeUser) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let tmpl = SignupTemplate {
        nav: Nav::for_viewer(None),
        username: String::new(),
        username_errors: vec![],
        password_errors: vec![],
    };
    Ok(Html(tmpl.render()?).into_response())
}

async fn signup_submit(
    State(state): State<Arc<AppState>>,
    Form(input): Form<SignupForm>,
) -> Result<Response, AppError> {
    let outcome = auth::signup(
        &state.store,
        &input.username,
        &input.password,
        &input.password_confirm,
    )
    .await?;

    match outcome {
        SignupOutcome::Created(user) => {
            let ttl_hours = state.config.auth.session_ttl_hours;
            let session = auth::issue_session(&state.store, user.id, u64::from(ttl_hours)).await?;
            tracing::info!(username = %user.username, "account created");
            Ok(redirect_with_cookie(
                "/",
                &session_cookie(&session.token, ttl_hours),
            ))
        }
        SignupOutcome::Invalid(errors) => {
            // Mismatch notes land on the password field so the form stays short.
            let mut password_errors: Vec<String> = errors
                .for_field("password")
                .into_iter()
                .map(String::from)
                .collect();
            password_errors.extend(
                errors
                    .for_field("password_confirm")
                    .into_iter()
                    .map(String::from),
            );
            let tmpl = SignupTemplate {
                nav: Nav::for_viewer(None),
                username: input.username,
                username_errors: errors
                    .for_field("username")
                    .into_iter()
                    .map(String::from)
                    .collect(),
                password_errors,
            };
            Ok(Html(tmpl.render()?).into_response())
        }
    }
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        auth::logout(&state.store, &token).await?;
    }
    Ok(redirect_with_cookie("/", &clear_cookie()))
}
