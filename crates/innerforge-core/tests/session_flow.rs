//! End-to-end flows through the public API: account signup, catalog
//! building, a full guided session, and the week summary that results.
//!
//! Run: `cargo test -p innerforge-core --test session_flow`

use chrono::{TimeZone, Utc};
use innerforge_core::model::*;
use innerforge_core::storage::SqliteStore;
use innerforge_core::{auth, session, week};

async fn signed_up_user(store: &SqliteStore, username: &str) -> User {
    match auth::signup(store, username, "a strong password", "a strong password")
        .await
        .unwrap()
    {
        auth::SignupOutcome::Created(user) => user,
        auth::SignupOutcome::Invalid(errors) => panic!("signup rejected: {errors}"),
    }
}

async fn leg_day(store: &SqliteStore) -> Workout {
    let workout = Workout::new("Leg Day".to_string())
        .with_difficulty("intermediate".to_string())
        .with_description("Quads, glutes and calves".to_string());
    store.insert_workout(&workout).await.unwrap();

    for (title, reps) in [("Squat", 12), ("Lunge", 10), ("Calf Raise", 20)] {
        let input = ExerciseInput {
            title: title.to_string(),
            how_to: format!("How to do {title}"),
            reps,
            image_url: None,
        };
        store.add_exercise_to_workout(workout.id, &input).await.unwrap();
    }
    workout
}

#[tokio::test]
async fn full_session_updates_history_and_week() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = signed_up_user(&store, "ana").await;
    let workout = leg_day(&store).await;

    store.select_workout(user.id, workout.id).await.unwrap();

    // Walk the whole workout, checking what each step shows.
    let StartOutcome::Started(session) = session::start(&store, user.id).await.unwrap() else {
        panic!("expected a started session");
    };

    let mut seen = Vec::new();
    loop {
        match session::step(&store, user.id, session.id).await.unwrap() {
            StepOutcome::Finished => break,
            StepOutcome::InProgress(view) => {
                seen.push(view.step.exercise.title.clone());
                let outcome = session::advance(
                    &store,
                    user.id,
                    session.id,
                    view.session.current_index,
                )
                .await
                .unwrap();
                if seen.len() < 3 {
                    assert!(matches!(outcome, AdvanceOutcome::Moved(_)));
                } else {
                    assert!(matches!(outcome, AdvanceOutcome::Completed { .. }));
                }
            }
        }
    }
    assert_eq!(seen, vec!["Squat", "Lunge", "Calf Raise"]);

    // One history entry, carrying the workout name.
    let history = store.recent_history(user.id, None, None, 100).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].workout_name, "Leg Day");

    // The week strip lights up today.
    let profile = store.get_or_create_profile(user.id).await.unwrap();
    let summary = week::week_summary(&store, "Europe/Madrid", Some(&profile))
        .await
        .unwrap();
    let today = summary.days.iter().find(|d| d.is_today).unwrap();
    assert!(today.is_done);
}

#[tokio::test]
async fn week_summary_follows_profile_timezone() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = signed_up_user(&store, "ana").await;
    let workout = leg_day(&store).await;

    store
        .set_profile_timezone(user.id, "America/New_York")
        .await
        .unwrap();
    let profile = store.get_or_create_profile(user.id).await.unwrap();

    // 02:30 UTC on Wednesday 2024-01-10 is still Tuesday evening in New
    // York; a viewer there sees Tuesday done and Wednesday open.
    let performed = Utc.with_ymd_and_hms(2024, 1, 10, 2, 30, 0).unwrap();
    store
        .insert_history(&WorkoutHistory::new(user.id, workout.id, performed, 412))
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap();
    let summary = week::week_summary_at(&store, "Europe/Madrid", Some(&profile), now)
        .await
        .unwrap();

    assert_eq!(summary.timezone, "America/New_York");
    assert_eq!(summary.days[1].label, "Tue");
    assert!(summary.days[1].is_done);
    assert!(summary.days[2].is_today);
    assert!(!summary.days[2].is_done);
}

#[tokio::test]
async fn login_logout_token_lifecycle() {
    let store = SqliteStore::open_in_memory().unwrap();
    signed_up_user(&store, "ana").await;

    // Wrong password and unknown user both come back empty-handed.
    assert!(auth::login(&store, "ana", "not the password", 24)
        .await
        .unwrap()
        .is_none());
    assert!(auth::login(&store, "nobody", "a strong password", 24)
        .await
        .unwrap()
        .is_none());

    let (user, auth_session) = auth::login(&store, "ana", "a strong password", 24)
        .await
        .unwrap()
        .expect("correct credentials should log in");
    assert_eq!(user.username, "ana");

    let resolved = auth::authenticate(&store, &auth_session.token).await.unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));

    auth::logout(&store, &auth_session.token).await.unwrap();
    assert!(auth::authenticate(&store, &auth_session.token)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn duplicate_signup_reports_field_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    signed_up_user(&store, "ana").await;

    let outcome = auth::signup(&store, "ana", "another password", "another password")
        .await
        .unwrap();
    let auth::SignupOutcome::Invalid(errors) = outcome else {
        panic!("expected a rejected signup");
    };
    assert_eq!(errors.for_field("username").len(), 1);
}
