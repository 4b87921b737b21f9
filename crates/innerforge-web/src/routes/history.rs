use std::sync::Arc;

use askama::Template;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use innerforge_core::week;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Nav;
use crate::AppState;

/// Upper bound on rows per page; older entries fall off the end.
const PAGE_SIZE: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(history_page))
}

// -- Templates --

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    nav: Nav,
    rows: Vec<HistoryRow>,
    start: String,
    end: String,
    timezone: String,
}

struct HistoryRow {
    workout_name: String,
    performed_on: String,
    duration: String,
}

// -- Query params --

#[derive(Deserialize)]
pub struct HistoryParams {
    start: Option<String>,
    end: Option<String>,
}

// -- Handlers --

async fn history_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<HistoryParams>,
) -> Result<Html<String>, AppError> {
    let profile = state.store.get_or_create_profile(user.id).await?;
    let tz = week::resolve_timezone(
        Some(profile.timezone.as_str()),
        &state.config.time.default_timezone,
    );

    let start_text = params.start.unwrap_or_default();
    let end_text = params.end.unwrap_or_default();

    // A date that does not parse behaves like an empty filter box.
    let start = parse_day(&start_text).map(|d| week::day_bounds(tz, d).0);
    let end = parse_day(&end_text).map(|d| week::day_bounds(tz, d).1);

    let entries = state
        .store
        .recent_history(user.id, start, end, PAGE_SIZE)
        .await?;

    let rows = entries
        .into_iter()
        .map(|entry| HistoryRow {
            performed_on: entry
                .record
                .performed_at
                .with_timezone(&tz)
                .format("%a %b %-d, %H:%M")
                .to_string(),
            duration: entry.record.duration_mmss(),
            workout_name: entry.workout_name,
        })
        .collect();

    let tmpl = HistoryTemplate {
        nav: Nav::for_viewer(Some(&user)),
        rows,
        start: start_text,
        end: end_text,
        timezone: tz.name().to_string(),
    };
    Ok(Html(tmpl.render()?))
}

fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}
