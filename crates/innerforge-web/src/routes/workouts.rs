use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use innerforge_core::model::{AdvanceOutcome, StartOutcome, StepOutcome};
use innerforge_core::session;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::routes::Nav;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workouts/list", get(list_workouts))
        .route("/workouts/select/{id}", post(select_workout))
        .route("/workouts/start", post(start_session))
        .route("/workouts/session/{id}", get(show_step))
        .route("/workouts/session/{id}/next", post(advance_step))
        .route("/workouts/congrats", get(congrats))
}

// -- Templates --

#[derive(Template)]
#[template(path = "workout_list.html")]
struct WorkoutListTemplate {
    nav: Nav,
    workouts: Vec<WorkoutRow>,
    q: String,
}

struct WorkoutRow {
    id: String,
    name: String,
    description: String,
    difficulty: String,
    exercise_count: usize,
    is_selected: bool,
}

#[derive(Template)]
#[template(path = "session_step.html")]
struct SessionStepTemplate {
    nav: Nav,
    workout_name: String,
    session_id: String,
    number: u32,
    total: u32,
    progress_pct: u32,
    is_last: bool,
    from_index: u32,
    title: String,
    how_to: String,
    reps: u32,
    image_url: Option<String>,
}

#[derive(Template)]
#[template(path = "congrats.html")]
struct CongratsTemplate {
    nav: Nav,
}

// -- Query params --

#[derive(Deserialize)]
pub struct ListParams {
    q: Option<String>,
}

#[derive(Deserialize)]
pub struct AdvanceForm {
    index: u32,
}

// -- Handlers --

async fn list_workouts(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, AppError> {
    let q = params.q.unwrap_or_default();
    let filter = Some(q.trim()).filter(|s| !s.is_empty());
    let entries = state.store.list_active_workouts(filter).await?;
    let profile = state.store.get_or_create_profile(user.id).await?;

    let workouts = entries
        .into_iter()
        .map(|entry| WorkoutRow {
            is_selected: profile.last_selected_workout == Some(entry.workout.id),
            id: entry.workout.id.to_string(),
            name: entry.workout.name,
            description: entry.workout.description,
            difficulty: entry.workout.difficulty,
            exercise_count: entry.exercise_count,
        })
        .collect();

    let tmpl = WorkoutListTemplate {
        nav: Nav::for_viewer(Some(&user)),
        workouts,
        q,
    };
    Ok(Html(tmpl.render()?))
}

async fn select_workout(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let workout = state.store.select_workout(user.id, id).await?;
    let query = serde_urlencoded::to_string([(
        "toast",
        format!("Workout selected: {}", workout.name),
    )])?;
    Ok(Redirect::to(&format!("/?{query}")))
}

async fn start_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, AppError> {
    match session::start(&state.store, user.id).await? {
        StartOutcome::Started(session) => {
            Ok(Redirect::to(&format!("/workouts/session/{}", session.id)))
        }
        StartOutcome::NoWorkoutSelected => Ok(Redirect::to(
            "/workouts/list?toast=Pick%20a%20workout%20first&toast_type=warning",
        )),
        StartOutcome::EmptyWorkout(_) => Ok(Redirect::to(
            "/?toast=This%20workout%20has%20no%20exercises%20yet&toast_type=warning",
        )),
    }
}

async fn show_step(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    match session::step(&state.store, user.id, id).await? {
        StepOutcome::Finished => Ok(Redirect::to("/workouts/congrats").into_response()),
        StepOutcome::InProgress(view) => {
            let workout = state.store.workout_by_id(view.session.workout_id).await?;
            let tmpl = SessionStepTemplate {
                nav: Nav::for_viewer(Some(&user)),
                workout_name: workout.map(|w| w.name).unwrap_or_default(),
                session_id: view.session.id.to_string(),
                number: view.number,
                total: view.total,
                progress_pct: view.number * 100 / view.total.max(1),
                is_last: view.is_last,
                from_index: view.session.current_index,
                title: view.step.exercise.title,
                how_to: view.step.exercise.how_to,
                reps: view.step.exercise.reps,
                image_url: view.step.exercise.image_url,
            };
            Ok(Html(tmpl.render()?).into_response())
        }
    }
}

async fn advance_step(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Form(form): Form<AdvanceForm>,
) -> Result<Redirect, AppError> {
    match session::advance(&state.store, user.id, id, form.index).await? {
        AdvanceOutcome::Moved(session) => {
            Ok(Redirect::to(&format!("/workouts/session/{}", session.id)))
        }
        AdvanceOutcome::Completed { .. } => Ok(Redirect::to(
            "/workouts/congrats?toast=Workout%20completed%20successfully!",
        )),
        AdvanceOutcome::AlreadyCompleted(_) => Ok(Redirect::to("/workouts/congrats")),
        AdvanceOutcome::Stale(session) => {
            Ok(Redirect::to(&format!("/workouts/session/{}", session.id)))
        }
    }
}

async fn congrats(CurrentUser(user): CurrentUser) -> Result<Html<String>, AppError> {
    let tmpl = CongratsTemplate {
        nav: Nav::for_viewer(Some(&user)),
    };
    Ok(Html(tmpl.render()?))
}
