use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timezone assigned to freshly created profiles.
pub const DEFAULT_TIMEZONE: &str = "Europe/Madrid";

/// An account known to the system. Everything past login only needs the id,
/// the display name, and the staff flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            username,
            is_staff: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_staff(mut self, is_staff: bool) -> Self {
        self.is_staff = is_staff;
        self
    }
}

/// Per-user preferences, created lazily on first need. The timezone is an
/// IANA name; unparseable values fall back to the default at read time
/// rather than being rejected here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub timezone: String,
    pub last_selected_workout: Option<Uuid>,
}

impl UserProfile {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            timezone: DEFAULT_TIMEZONE.to_string(),
            last_selected_workout: None,
        }
    }
}
