//! Staff-only workout and exercise management. Every handler takes
//! [`StaffUser`], so the whole surface is fenced off in one place.

use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use innerforge_core::model::{
    validate_exercise_input, validate_workout_input, ExerciseInput, FieldErrors, Workout,
    WorkoutInput,
};
use innerforge_core::ForgeError;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::StaffUser;
use crate::error::AppError;
use crate::routes::Nav;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/workouts/new", get(new_workout_form).post(create_workout))
        .route(
            "/admin/workouts/{id}/edit",
            get(edit_workout_form).post(update_workout),
        )
        .route("/admin/workouts/{id}/archive", post(archive_workout))
        .route(
            "/admin/workouts/{id}/exercises/add",
            get(add_exercise_form).post(add_exercise),
        )
        .route(
            "/admin/workouts/{id}/exercises/{entry_id}/delete",
            post(remove_exercise),
        )
}

// -- Templates --

#[derive(Template)]
#[template(path = "workout_form.html")]
struct WorkoutFormTemplate {
    nav: Nav,
    name: String,
    description: String,
    difficulty: String,
    name_errors: Vec<String>,
    difficulty_errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "workout_edit.html")]
struct WorkoutEditTemplate {
    nav: Nav,
    id: String,
    name: String,
    description: String,
    difficulty: String,
    is_active: bool,
    name_errors: Vec<String>,
    difficulty_errors: Vec<String>,
    steps: Vec<StepRow>,
}

struct StepRow {
    entry_id: String,
    position: u32,
    title: String,
    reps: u32,
}

#[derive(Template)]
#[template(path = "exercise_form.html")]
struct ExerciseFormTemplate {
    nav: Nav,
    workout_id: String,
    workout_name: String,
    title: String,
    how_to: String,
    reps: String,
    image_url: String,
    title_errors: Vec<String>,
    how_to_errors: Vec<String>,
    reps_errors: Vec<String>,
}

// -- Form params --

#[derive(Deserialize)]
pub struct WorkoutFormInput {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    difficulty: String,
}

#[derive(Deserialize)]
pub struct ExerciseFormInput {
    title: String,
    #[serde(default)]
    how_to: String,
    #[serde(default)]
    reps: String,
    #[serde(default)]
    image_url: String,
}

// -- Handlers --

async fn new_workout_form(StaffUser(user): StaffUser) -> Result<Html<String>, AppError> {
    let tmpl = WorkoutFormTemplate {
        nav: Nav::for_viewer(Some(&user)),
        name: String::new(),
        description: String::new(),
        difficulty: String::new(),
        name_errors: vec![],
        difficulty_errors: vec![],
    };
    Ok(Html(tmpl.render()?))
}

async fn create_workout(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Form(input): Form<WorkoutFormInput>,
) -> Result<Response, AppError> {
    let candidate = WorkoutInput {
        name: input.name.trim().to_string(),
        description: input.description.trim().to_string(),
        difficulty: input.difficulty.trim().to_string(),
        is_active: true,
    };
    if let Err(errors) = validate_workout_input(&candidate) {
        let tmpl = WorkoutFormTemplate {
            nav: Nav::for_viewer(Some(&user)),
            name: input.name,
            description: input.description,
            difficulty: input.difficulty,
            name_errors: owned(&errors, "name"),
            difficulty_errors: owned(&errors, "difficulty"),
        };
        return Ok(Html(tmpl.render()?).into_response());
    }

    let workout = Workout::new(candidate.name)
        .with_description(candidate.description)
        .with_difficulty(candidate.difficulty);
    state.store.insert_workout(&workout).await?;
    tracing::info!(workout = %workout.name, by = %user.username, "workout created");

    Ok(Redirect::to(&format!(
        "/admin/workouts/{}/edit?toast=Workout%20created",
        workout.id
    ))
    .into_response())
}

async fn edit_workout_form(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let workout = require_workout(&state, id).await?;
    let steps = load_steps(&state, id).await?;

    let tmpl = WorkoutEditTemplate {
        nav: Nav::for_viewer(Some(&user)),
        id: workout.id.to_string(),
        name: workout.name,
        description: workout.description,
        difficulty: workout.difficulty,
        is_active: workout.is_active,
        name_errors: vec![],
        difficulty_errors: vec![],
        steps,
    };
    Ok(Html(tmpl.render()?))
}

async fn update_workout(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
    Form(input): Form<WorkoutFormInput>,
) -> Result<Response, AppError> {
    let existing = require_workout(&state, id).await?;
    let candidate = WorkoutInput {
        name: input.name.trim().to_string(),
        description: input.description.trim().to_string(),
        difficulty: input.difficulty.trim().to_string(),
        is_active: existing.is_active,
    };
    if let Err(errors) = validate_workout_input(&candidate) {
        let steps = load_steps(&state, id).await?;
        let tmpl = WorkoutEditTemplate {
            nav: Nav::for_viewer(Some(&user)),
            id: id.to_string(),
            name: input.name,
            description: input.description,
            difficulty: input.difficulty,
            is_active: existing.is_active,
            name_errors: owned(&errors, "name"),
            difficulty_errors: owned(&errors, "difficulty"),
            steps,
        };
        return Ok(Html(tmpl.render()?).into_response());
    }

    state.store.update_workout(id, &candidate, Utc::now()).await?;
    Ok(Redirect::to(&format!("/admin/workouts/{id}/edit?toast=Workout%20saved")).into_response())
}

async fn archive_workout(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let workout = state.store.archive_workout(id, Utc::now()).await?;
    tracing::info!(workout = %workout.name, by = %user.username, "workout archived");
    Ok(Redirect::to("/workouts/list?toast=Workout%20archived"))
}

async fn add_exercise_form(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let workout = require_workout(&state, id).await?;
    let tmpl = ExerciseFormTemplate {
        nav: Nav::for_viewer(Some(&user)),
        workout_id: workout.id.to_string(),
        workout_name: workout.name,
        title: String::new(),
        how_to: String::new(),
        reps: String::new(),
        image_url: String::new(),
        title_errors: vec![],
        how_to_errors: vec![],
        reps_errors: vec![],
    };
    Ok(Html(tmpl.render()?))
}

async fn add_exercise(
    State(state): State<Arc<AppState>>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
    Form(input): Form<ExerciseFormInput>,
) -> Result<Response, AppError> {
    let workout = require_workout(&state, id).await?;

    // Anything that is not a number fails the reps >= 1 check below.
    let reps = input.reps.trim().parse::<u32>().unwrap_or(0);
    let candidate = ExerciseInput {
        title: input.title.trim().to_string(),
        how_to: input.how_to.trim().to_string(),
        reps,
        image_url: Some(input.image_url.trim().to_string()).filter(|u| !u.is_empty()),
    };
    if let Err(errors) = validate_exercise_input(&candidate) {
        let tmpl = ExerciseFormTemplate {
            nav: Nav::for_viewer(Some(&user)),
            workout_id: id.to_string(),
            workout_name: workout.name,
            title: input.title,
            how_to: input.how_to,
            reps: input.reps,
            image_url: input.image_url,
            title_errors: owned(&errors, "title"),
            how_to_errors: owned(&errors, "how_to"),
            reps_errors: owned(&errors, "reps"),
        };
        return Ok(Html(tmpl.render()?).into_response());
    }

    let step = state.store.add_exercise_to_workout(id, &candidate).await?;
    tracing::info!(
        workout = %workout.name,
        exercise = %step.exercise.title,
        position = step.association.position,
        "exercise added"
    );
    Ok(Redirect::to(&format!("/admin/workouts/{id}/edit?toast=Exercise%20added")).into_response())
}

async fn remove_exercise(
    State(state): State<Arc<AppState>>,
    StaffUser(_user): StaffUser,
    Path((id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<Redirect, AppError> {
    state.store.remove_workout_exercise(id, entry_id).await?;
    Ok(Redirect::to(&format!(
        "/admin/workouts/{id}/edit?toast=Exercise%20removed%20from%20workout"
    )))
}

// -- Helpers --

async fn require_workout(state: &AppState, id: Uuid) -> Result<Workout, AppError> {
    let found = state.store.workout_by_id(id).await?;
    found.ok_or_else(|| AppError(ForgeError::NotFound(format!("workout {id} not found")).into()))
}

async fn load_steps(state: &AppState, workout_id: Uuid) -> Result<Vec<StepRow>, AppError> {
    let steps = state.store.ordered_exercises(workout_id).await?;
    Ok(steps
        .into_iter()
        .map(|step| StepRow {
            entry_id: step.association.id.to_string(),
            position: step.association.position + 1,
            title: step.exercise.title,
            reps: step.exercise.reps,
        })
        .collect())
}

fn owned(errors: &FieldErrors, field: &str) -> Vec<String> {
    errors
        .for_field(field)
        .into_iter()
        .map(String::from)
        .collect()
}
