use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use innerforge_core::model::Workout;
use innerforge_core::week::{self, WeekDay};

use crate::auth::MaybeUser;
use crate::error::AppError;
use crate::routes::Nav;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(home))
}

// -- Templates --

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    nav: Nav,
    signed_in: bool,
    week_label: String,
    timezone: String,
    days: Vec<WeekDay>,
    selected: Option<Workout>,
    exercise_count: usize,
}

// -- Handlers --

async fn home(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let (profile, selected) = match &user {
        Some(user) => {
            let profile = state.store.get_or_create_profile(user.id).await?;
            let selected = state.store.selected_workout(user.id).await?;
            (Some(profile), selected)
        }
        None => (None, None),
    };

    let week = week::week_summary(
        &state.store,
        &state.config.time.default_timezone,
        profile.as_ref(),
    )
    .await?;

    let exercise_count = match &selected {
        Some(w) => state.store.ordered_exercises(w.id).await?.len(),
        None => 0,
    };

    let week_label = week
        .days
        .first()
        .map(|d| format!("Week of {}", d.date.format("%B %-d")))
        .unwrap_or_default();

    let tmpl = HomeTemplate {
        nav: Nav::for_viewer(user.as_ref()),
        signed_in: user.is_some(),
        week_label,
        timezone: week.timezone,
        days: week.days,
        selected,
        exercise_count,
    };
    Ok(Html(tmpl.render()?))
}
