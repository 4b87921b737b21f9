use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DIFFICULTY_LENGTH: usize = 50;

/// A single field-level validation failure, keyed by the form field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collected validation failures for a submitted form. An empty set means the
/// input is valid; a non-empty set means nothing may be persisted and the
/// form is redisplayed with these messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldErrors {
    pub errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages for one field, in submission order.
    pub fn for_field(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> std::result::Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Validate inputs for creating or editing a workout.
pub fn validate_workout_input(input: &WorkoutInput) -> std::result::Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    let name = input.name.trim();
    if name.is_empty() {
        errors.push("name", "name cannot be empty");
    } else if name.len() > MAX_NAME_LENGTH {
        errors.push(
            "name",
            format!("name exceeds maximum length of {MAX_NAME_LENGTH} characters"),
        );
    }
    if input.difficulty.trim().len() > MAX_DIFFICULTY_LENGTH {
        errors.push(
            "difficulty",
            format!("difficulty exceeds maximum length of {MAX_DIFFICULTY_LENGTH} characters"),
        );
    }
    errors.into_result()
}

/// Validate inputs for adding an exercise to a workout.
pub fn validate_exercise_input(input: &ExerciseInput) -> std::result::Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    let title = input.title.trim();
    if title.is_empty() {
        errors.push("title", "title cannot be empty");
    } else if title.len() > MAX_TITLE_LENGTH {
        errors.push(
            "title",
            format!("title exceeds maximum length of {MAX_TITLE_LENGTH} characters"),
        );
    }
    if input.how_to.trim().is_empty() {
        errors.push("how_to", "instructions cannot be empty");
    }
    if input.reps == 0 {
        errors.push("reps", "reps must be at least 1");
    }
    errors.into_result()
}

/// A named workout: an ordered collection of exercises that users step
/// through in a guided session. Workouts are archived, never deleted, so
/// history records stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub difficulty: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workout {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name,
            description: String::new(),
            difficulty: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_difficulty(mut self, difficulty: String) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// One exercise: what to do, how to do it, and how many reps to aim for.
/// The media reference is an opaque URL or path; file storage is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub title: String,
    pub how_to: String,
    pub reps: u32,
    pub image_url: Option<String>,
}

impl Exercise {
    pub fn new(title: String, how_to: String, reps: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            how_to,
            reps,
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, image_url: String) -> Self {
        self.image_url = Some(image_url);
        self
    }
}

/// Membership of an exercise in a workout. `position` drives traversal
/// order; ties resolve by association id, which is time-ordered (UUIDv7),
/// so equal positions fall back to insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub exercise_id: Uuid,
    pub position: u32,
}

impl WorkoutExercise {
    pub fn new(workout_id: Uuid, exercise_id: Uuid, position: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            workout_id,
            exercise_id,
            position,
        }
    }
}

/// An association joined with its exercise, as traversed by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutStep {
    pub association: WorkoutExercise,
    pub exercise: Exercise,
}

/// Catalog listing row: a workout annotated with its exercise count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutListEntry {
    pub workout: Workout,
    pub exercise_count: usize,
}

/// Submitted fields for creating or editing a workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Submitted fields for adding an exercise to a workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseInput {
    pub title: String,
    pub how_to: String,
    pub reps: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}
