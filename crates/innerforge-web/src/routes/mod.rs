pub mod accounts;
pub mod admin;
pub mod history;
pub mod home;
pub mod workouts;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, Json};
use axum::routing::get;
use axum::Router;
use innerforge_core::model::User;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(home::routes())
        .merge(workouts::routes())
        .merge(history::routes())
        .merge(accounts::routes())
        .merge(admin::routes())
        .fallback(not_found)
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let counts = state.store.counts().await.ok();

    let status = if counts.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if counts.is_some() { "ok" } else { "degraded" },
            "database": if counts.is_some() { "connected" } else { "unavailable" },
            "active_workouts": counts.as_ref().map(|c| c.active_workouts),
            "users": counts.as_ref().map(|c| c.users),
        })),
    )
}

async fn not_found() -> (StatusCode, Html<String>) {
    crate::error::status_page(StatusCode::NOT_FOUND, "404", "This page doesn't exist.")
}

// -- Shared chrome --

/// What `base.html` needs on every page: who is signed in and whether the
/// staff links should show.
pub struct Nav {
    pub username: Option<String>,
    pub is_staff: bool,
}

impl Nav {
    pub fn for_viewer(user: Option<&User>) -> Self {
        Self {
            username: user.map(|u| u.username.clone()),
            is_staff: user.is_some_and(|u| u.is_staff),
        }
    }
}
