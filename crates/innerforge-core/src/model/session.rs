use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::workout::{Workout, WorkoutStep};

/// One user's pass through a workout. `current_index` is the zero-based
/// position of the exercise being shown and only ever moves forward;
/// `Completed` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_index: u32,
}

impl Session {
    pub fn new(user_id: Uuid, workout_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            workout_id,
            status: SessionStatus::InProgress,
            started_at: Utc::now(),
            finished_at: None,
            current_index: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Wall-clock duration in whole seconds. Zero until finished, and never
    /// negative even if the clock moved backwards between start and finish.
    pub fn duration_seconds(&self) -> i64 {
        match self.finished_at {
            Some(finished) => (finished - self.started_at).num_seconds().max(0),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("unknown session status: {s}")),
        }
    }
}

/// Immutable record of one completed workout. Written exactly once, in the
/// same transaction as the completing session update, and never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workout_id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl WorkoutHistory {
    pub fn new(
        user_id: Uuid,
        workout_id: Uuid,
        performed_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            workout_id,
            performed_at,
            duration_seconds: duration_seconds.max(0),
        }
    }

    pub fn duration_mmss(&self) -> String {
        format_mmss(self.duration_seconds)
    }
}

/// History row joined with its workout name for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record: WorkoutHistory,
    pub workout_name: String,
}

/// Render a duration as zero-padded minutes and seconds. Minutes are not
/// capped at 59, so an hour renders as "60:00".
pub fn format_mmss(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Outcome of asking to start a session. Precondition violations are data,
/// not errors: the caller redirects with a message and nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StartOutcome {
    Started(Session),
    NoWorkoutSelected,
    EmptyWorkout(Workout),
}

/// What the guided view should show for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepOutcome {
    InProgress(StepView),
    Finished,
}

/// One renderable step of an in-progress session. `number` is one-based for
/// display; `total` is the live exercise count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
    pub session: Session,
    pub step: WorkoutStep,
    pub number: u32,
    pub total: u32,
    pub is_last: bool,
}

/// Outcome of an advance request. `Stale` means the submitted index no
/// longer matched the stored one (a double submit) and nothing changed;
/// `AlreadyCompleted` means the terminal state was reached earlier and no
/// second history record was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdvanceOutcome {
    Moved(Session),
    Completed {
        session: Session,
        history: WorkoutHistory,
    },
    AlreadyCompleted(Session),
    Stale(Session),
}
