//! Guided session engine.
//!
//! A session walks one user through their selected workout's exercises in
//! order.  It starts at index 0, moves forward one exercise per advance,
//! and completes when the last exercise is passed; completion is terminal
//! and writes exactly one history record.  The exercise list is read fresh
//! on every step, so catalog edits show up mid-session and a shrunken list
//! heals by finishing early.

use uuid::Uuid;

use crate::error::Result;
use crate::model::{AdvanceOutcome, Session, StartOutcome, StepOutcome, StepView};
use crate::storage::SqliteStore;

/// Start a session on the user's selected workout.
///
/// Preconditions surface as outcomes rather than errors: no selection and
/// an exercise-less selection both leave the store untouched.  The
/// selection may point at an archived workout; starting it is still fine,
/// only selecting anew is restricted to active ones.
pub async fn start(store: &SqliteStore, user_id: Uuid) -> Result<StartOutcome> {
    let Some(workout) = store.selected_workout(user_id).await? else {
        return Ok(StartOutcome::NoWorkoutSelected);
    };

    let steps = store.ordered_exercises(workout.id).await?;
    if steps.is_empty() {
        return Ok(StartOutcome::EmptyWorkout(workout));
    }

    let session = Session::new(user_id, workout.id);
    store.insert_session(&session).await?;
    tracing::info!(
        session = %session.id,
        workout = %workout.name,
        exercises = steps.len(),
        "session started"
    );
    Ok(StartOutcome::Started(session))
}

/// Resolve what the session should show right now.
///
/// Completed sessions and indexes that ran past the current exercise count
/// both resolve to [`StepOutcome::Finished`]; callers send those to the
/// completion view.  Unknown sessions and sessions owned by someone else
/// are both NotFound.
pub async fn step(store: &SqliteStore, user_id: Uuid, session_id: Uuid) -> Result<StepOutcome> {
    let session = require_session(store, user_id, session_id).await?;
    if session.is_completed() {
        return Ok(StepOutcome::Finished);
    }

    let steps = store.ordered_exercises(session.workout_id).await?;
    let total = steps.len();
    let index = session.current_index as usize;
    let Some(step) = steps.into_iter().nth(index) else {
        // The list shrank underneath a live session.
        return Ok(StepOutcome::Finished);
    };

    Ok(StepOutcome::InProgress(StepView {
        number: session.current_index + 1,
        total: total as u32,
        is_last: index + 1 == total,
        session,
        step,
    }))
}

/// Move a session forward from the index the client saw.
///
/// The store runs the whole transition in one transaction; see
/// [`AdvanceOutcome`] for the four ways it can land.  A stale or repeated
/// submit changes nothing.
pub async fn advance(
    store: &SqliteStore,
    user_id: Uuid,
    session_id: Uuid,
    from_index: u32,
) -> Result<AdvanceOutcome> {
    let outcome = store
        .advance_session(session_id, user_id, from_index, chrono::Utc::now())
        .await?;

    match &outcome {
        AdvanceOutcome::Completed { session, history } => {
            tracing::info!(
                session = %session.id,
                duration = %history.duration_mmss(),
                "session completed"
            );
        }
        AdvanceOutcome::Stale(session) => {
            tracing::debug!(
                session = %session.id,
                submitted = from_index,
                stored = session.current_index,
                "stale advance ignored"
            );
        }
        AdvanceOutcome::Moved(_) | AdvanceOutcome::AlreadyCompleted(_) => {}
    }

    Ok(outcome)
}

async fn require_session(
    store: &SqliteStore,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<Session> {
    store
        .session_for_user(session_id, user_id)
        .await?
        .ok_or_else(|| crate::error::ForgeError::NotFound(format!("session {session_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::model::{ExerciseInput, SessionStatus, User, Workout};
    use chrono::Utc;

    async fn seeded_store() -> (SqliteStore, User, Workout) {
        let store = SqliteStore::open_in_memory().expect("open in-memory store");
        let user = User::new("ana".to_string());
        store.create_user(&user, "hash").await.expect("create user");

        let workout = Workout::new("Leg Day".to_string());
        store.insert_workout(&workout).await.expect("insert workout");
        for title in ["Squat", "Lunge", "Calf Raise"] {
            let input = ExerciseInput {
                title: title.to_string(),
                how_to: format!("How to do {title}"),
                reps: 12,
                image_url: None,
            };
            store
                .add_exercise_to_workout(workout.id, &input)
                .await
                .expect("add exercise");
        }
        store
            .select_workout(user.id, workout.id)
            .await
            .expect("select workout");

        (store, user, workout)
    }

    #[tokio::test]
    async fn start_without_selection() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = User::new("ana".to_string());
        store.create_user(&user, "hash").await.unwrap();

        let outcome = start(&store, user.id).await.unwrap();
        assert!(matches!(outcome, StartOutcome::NoWorkoutSelected));
        assert_eq!(store.counts().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn start_with_empty_workout() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = User::new("ana".to_string());
        store.create_user(&user, "hash").await.unwrap();
        let workout = Workout::new("Placeholder".to_string());
        store.insert_workout(&workout).await.unwrap();
        store.select_workout(user.id, workout.id).await.unwrap();

        let outcome = start(&store, user.id).await.unwrap();
        match outcome {
            StartOutcome::EmptyWorkout(w) => assert_eq!(w.id, workout.id),
            other => panic!("expected EmptyWorkout, got {other:?}"),
        }
        assert_eq!(store.counts().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn start_archived_selection_still_works() {
        let (store, user, workout) = seeded_store().await;
        store.archive_workout(workout.id, Utc::now()).await.unwrap();

        let outcome = start(&store, user.id).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started(_)));
    }

    #[tokio::test]
    async fn full_walkthrough_completes_once() {
        let (store, user, workout) = seeded_store().await;

        let StartOutcome::Started(session) = start(&store, user.id).await.unwrap() else {
            panic!("expected Started");
        };
        assert_eq!(session.current_index, 0);
        assert_eq!(session.status, SessionStatus::InProgress);

        // Step 1 of 3.
        let StepOutcome::InProgress(view) = step(&store, user.id, session.id).await.unwrap() else {
            panic!("expected InProgress");
        };
        assert_eq!(view.number, 1);
        assert_eq!(view.total, 3);
        assert_eq!(view.step.exercise.title, "Squat");
        assert!(!view.is_last);

        // Advance twice, landing on the last exercise.
        let moved = advance(&store, user.id, session.id, 0).await.unwrap();
        assert!(matches!(moved, AdvanceOutcome::Moved(_)));
        let moved = advance(&store, user.id, session.id, 1).await.unwrap();
        assert!(matches!(moved, AdvanceOutcome::Moved(_)));

        let StepOutcome::InProgress(view) = step(&store, user.id, session.id).await.unwrap() else {
            panic!("expected InProgress");
        };
        assert_eq!(view.number, 3);
        assert_eq!(view.step.exercise.title, "Calf Raise");
        assert!(view.is_last);

        // Passing the last exercise completes and records history.
        let done = advance(&store, user.id, session.id, 2).await.unwrap();
        let AdvanceOutcome::Completed { session: completed, history } = done else {
            panic!("expected Completed");
        };
        assert_eq!(completed.status, SessionStatus::Completed);
        assert!(completed.finished_at.is_some());
        assert_eq!(completed.current_index, 3);
        assert_eq!(history.user_id, user.id);
        assert_eq!(history.workout_id, workout.id);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.completed_sessions, 1);
        assert_eq!(counts.history, 1);

        // The step view now reports Finished.
        let outcome = step(&store, user.id, session.id).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Finished));
    }

    #[tokio::test]
    async fn double_submit_takes_stale_path() {
        let (store, user, _) = seeded_store().await;
        let StartOutcome::Started(session) = start(&store, user.id).await.unwrap() else {
            panic!("expected Started");
        };

        let first = advance(&store, user.id, session.id, 0).await.unwrap();
        assert!(matches!(first, AdvanceOutcome::Moved(_)));

        // Same form submitted again: index no longer matches, nothing moves.
        let second = advance(&store, user.id, session.id, 0).await.unwrap();
        let AdvanceOutcome::Stale(current) = second else {
            panic!("expected Stale");
        };
        assert_eq!(current.current_index, 1);
    }

    #[tokio::test]
    async fn advancing_a_completed_session_never_duplicates_history() {
        let (store, user, _) = seeded_store().await;
        let StartOutcome::Started(session) = start(&store, user.id).await.unwrap() else {
            panic!("expected Started");
        };

        for index in 0..3 {
            advance(&store, user.id, session.id, index).await.unwrap();
        }
        assert_eq!(store.counts().await.unwrap().history, 1);

        // Whatever index a late submit carries, the session stays done.
        for index in [2, 3, 0] {
            let outcome = advance(&store, user.id, session.id, index).await.unwrap();
            assert!(matches!(outcome, AdvanceOutcome::AlreadyCompleted(_)));
        }
        assert_eq!(store.counts().await.unwrap().history, 1);
    }

    #[tokio::test]
    async fn foreign_sessions_are_not_found() {
        let (store, ana, _) = seeded_store().await;
        let bob = User::new("bob".to_string());
        store.create_user(&bob, "hash").await.unwrap();

        let StartOutcome::Started(session) = start(&store, ana.id).await.unwrap() else {
            panic!("expected Started");
        };

        let viewed = step(&store, bob.id, session.id).await;
        assert!(matches!(viewed, Err(ForgeError::NotFound(_))));

        let advanced = advance(&store, bob.id, session.id, 0).await;
        assert!(matches!(advanced, Err(ForgeError::NotFound(_))));

        // Ana's session is untouched by the rejected calls.
        let StepOutcome::InProgress(view) = step(&store, ana.id, session.id).await.unwrap() else {
            panic!("expected InProgress");
        };
        assert_eq!(view.session.current_index, 0);
    }

    #[tokio::test]
    async fn shrunken_exercise_list_heals_to_finished() {
        let (store, user, workout) = seeded_store().await;
        let StartOutcome::Started(session) = start(&store, user.id).await.unwrap() else {
            panic!("expected Started");
        };
        advance(&store, user.id, session.id, 0).await.unwrap();
        advance(&store, user.id, session.id, 1).await.unwrap();

        // Drop all three exercises from the workout mid-session.
        let steps = store.ordered_exercises(workout.id).await.unwrap();
        for s in steps {
            store
                .remove_workout_exercise(workout.id, s.association.id)
                .await
                .unwrap();
        }

        let outcome = step(&store, user.id, session.id).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Finished));
    }

    #[tokio::test]
    async fn growing_exercise_list_shows_up_mid_session() {
        let (store, user, workout) = seeded_store().await;
        let StartOutcome::Started(session) = start(&store, user.id).await.unwrap() else {
            panic!("expected Started");
        };
        advance(&store, user.id, session.id, 0).await.unwrap();
        advance(&store, user.id, session.id, 1).await.unwrap();

        // A fourth exercise lands while the user is on the third.
        let input = ExerciseInput {
            title: "Wall Sit".to_string(),
            how_to: "Back flat against the wall, knees at ninety degrees".to_string(),
            reps: 1,
            image_url: None,
        };
        store
            .add_exercise_to_workout(workout.id, &input)
            .await
            .unwrap();

        let StepOutcome::InProgress(view) = step(&store, user.id, session.id).await.unwrap() else {
            panic!("expected InProgress");
        };
        assert_eq!(view.total, 4);
        assert!(!view.is_last);

        let moved = advance(&store, user.id, session.id, 2).await.unwrap();
        assert!(matches!(moved, AdvanceOutcome::Moved(_)));

        let done = advance(&store, user.id, session.id, 3).await.unwrap();
        assert!(matches!(done, AdvanceOutcome::Completed { .. }));
    }
}
