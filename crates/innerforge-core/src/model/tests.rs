use crate::model::workout::{
    validate_exercise_input, validate_workout_input, MAX_DIFFICULTY_LENGTH, MAX_NAME_LENGTH,
};
use crate::model::*;
use chrono::{Duration, Utc};
use uuid::Uuid;

#[test]
fn test_workout_creation() {
    let workout = Workout::new("Leg Day".to_string());

    assert_eq!(workout.name, "Leg Day");
    assert!(workout.is_active);
    assert!(workout.description.is_empty());
    assert!(workout.difficulty.is_empty());
    assert_eq!(workout.created_at, workout.updated_at);
}

#[test]
fn test_workout_builder() {
    let workout = Workout::new("Core Blast".to_string())
        .with_description("Fifteen minutes of planks and twists".to_string())
        .with_difficulty("intermediate".to_string())
        .with_active(false);

    assert_eq!(workout.description, "Fifteen minutes of planks and twists");
    assert_eq!(workout.difficulty, "intermediate");
    assert!(!workout.is_active);
}

#[test]
fn test_exercise_creation() {
    let exercise = Exercise::new("Squat".to_string(), "Keep your back straight".to_string(), 12)
        .with_image_url("/media/squat.png".to_string());

    assert_eq!(exercise.title, "Squat");
    assert_eq!(exercise.reps, 12);
    assert_eq!(exercise.image_url.as_deref(), Some("/media/squat.png"));
}

#[test]
fn test_workout_exercise_new() {
    let workout_id = Uuid::now_v7();
    let exercise_id = Uuid::now_v7();
    let link = WorkoutExercise::new(workout_id, exercise_id, 3);

    assert_eq!(link.workout_id, workout_id);
    assert_eq!(link.exercise_id, exercise_id);
    assert_eq!(link.position, 3);
}

#[test]
fn test_validate_workout_empty_name() {
    let input = WorkoutInput {
        name: "   ".to_string(),
        description: String::new(),
        difficulty: String::new(),
        is_active: true,
    };
    let errors = validate_workout_input(&input).unwrap_err();
    assert_eq!(errors.for_field("name"), vec!["name cannot be empty"]);
}

#[test]
fn test_validate_workout_long_name() {
    let input = WorkoutInput {
        name: "x".repeat(MAX_NAME_LENGTH + 1),
        description: String::new(),
        difficulty: String::new(),
        is_active: true,
    };
    let errors = validate_workout_input(&input).unwrap_err();
    assert_eq!(errors.for_field("name").len(), 1);
}

#[test]
fn test_validate_workout_long_difficulty() {
    let input = WorkoutInput {
        name: "ok".to_string(),
        description: String::new(),
        difficulty: "y".repeat(MAX_DIFFICULTY_LENGTH + 1),
        is_active: true,
    };
    let errors = validate_workout_input(&input).unwrap_err();
    assert_eq!(errors.for_field("difficulty").len(), 1);
}

#[test]
fn test_validate_workout_ok() {
    let input = WorkoutInput {
        name: "Push Day".to_string(),
        description: "Chest and triceps".to_string(),
        difficulty: "hard".to_string(),
        is_active: true,
    };
    assert!(validate_workout_input(&input).is_ok());
}

#[test]
fn test_validate_exercise_collects_all_errors() {
    let input = ExerciseInput {
        title: String::new(),
        how_to: "  ".to_string(),
        reps: 0,
        image_url: None,
    };
    let errors = validate_exercise_input(&input).unwrap_err();
    assert_eq!(errors.errors.len(), 3);
    assert_eq!(errors.for_field("reps"), vec!["reps must be at least 1"]);
}

#[test]
fn test_validate_exercise_ok() {
    let input = ExerciseInput {
        title: "Lunge".to_string(),
        how_to: "Step forward, knee at ninety degrees".to_string(),
        reps: 10,
        image_url: None,
    };
    assert!(validate_exercise_input(&input).is_ok());
}

#[test]
fn test_field_errors_display() {
    let mut errors = FieldErrors::new();
    errors.push("name", "name cannot be empty");
    errors.push("reps", "reps must be at least 1");
    assert_eq!(
        errors.to_string(),
        "name: name cannot be empty; reps: reps must be at least 1"
    );
}

#[test]
fn test_session_creation() {
    let user_id = Uuid::now_v7();
    let workout_id = Uuid::now_v7();
    let session = Session::new(user_id, workout_id);

    assert_eq!(session.user_id, user_id);
    assert_eq!(session.workout_id, workout_id);
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.current_index, 0);
    assert!(session.finished_at.is_none());
    assert!(!session.is_completed());
}

#[test]
fn test_session_status_roundtrip() {
    for status in [SessionStatus::InProgress, SessionStatus::Completed] {
        let s = status.to_string();
        let parsed: SessionStatus = s.parse().unwrap();
        assert_eq!(status, parsed);
    }
}

#[test]
fn test_session_status_rejects_unknown() {
    assert!("paused".parse::<SessionStatus>().is_err());
}

#[test]
fn test_duration_zero_when_unfinished() {
    let session = Session::new(Uuid::now_v7(), Uuid::now_v7());
    assert_eq!(session.duration_seconds(), 0);
}

#[test]
fn test_duration_whole_seconds() {
    let mut session = Session::new(Uuid::now_v7(), Uuid::now_v7());
    session.finished_at = Some(session.started_at + Duration::seconds(754));
    assert_eq!(session.duration_seconds(), 754);
}

#[test]
fn test_duration_never_negative() {
    let mut session = Session::new(Uuid::now_v7(), Uuid::now_v7());
    session.finished_at = Some(session.started_at - Duration::seconds(30));
    assert_eq!(session.duration_seconds(), 0);
}

#[test]
fn test_history_clamps_negative_duration() {
    let record = WorkoutHistory::new(Uuid::now_v7(), Uuid::now_v7(), Utc::now(), -5);
    assert_eq!(record.duration_seconds, 0);
}

#[test]
fn test_format_mmss() {
    assert_eq!(format_mmss(0), "00:00");
    assert_eq!(format_mmss(59), "00:59");
    assert_eq!(format_mmss(60), "01:00");
    assert_eq!(format_mmss(754), "12:34");
    assert_eq!(format_mmss(3600), "60:00");
}

#[test]
fn test_profile_defaults() {
    let user_id = Uuid::now_v7();
    let profile = UserProfile::new(user_id);

    assert_eq!(profile.user_id, user_id);
    assert_eq!(profile.timezone, DEFAULT_TIMEZONE);
    assert!(profile.last_selected_workout.is_none());
}

#[test]
fn test_user_creation() {
    let user = User::new("ana".to_string());
    assert_eq!(user.username, "ana");
    assert!(!user.is_staff);

    let staff = User::new("root".to_string()).with_staff(true);
    assert!(staff.is_staff);
}
