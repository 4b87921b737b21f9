use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::error::{ForgeError, Result};
use crate::model::*;

const USER_COLS: &str = "id, username, is_staff, created_at";
const WORKOUT_COLS: &str = "id, name, description, difficulty, is_active, created_at, updated_at";
const SESSION_COLS: &str =
    "id, user_id, workout_id, status, started_at, finished_at, current_index";
const HISTORY_COLS: &str = "id, user_id, workout_id, performed_at, duration_seconds";

/// SQLite-backed record store for Innerforge.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks.  All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.  Mutating operations that span several statements open a
/// rusqlite transaction inside the closure, so each logical operation is
/// all-or-nothing.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Sets WAL journal mode and enables foreign keys, then creates all
    /// tables and indexes if they don't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| ForgeError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ForgeError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    /// Shared initialisation: pragmas + table creation.
    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL mode for better concurrent-read performance.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| ForgeError::Storage(format!("failed to set WAL mode: {e}")))?;

        // Enforce foreign-key constraints.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| ForgeError::Storage(format!("failed to enable foreign keys: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        store.create_tables()?;
        Ok(store)
    }

    /// Create all tables and indexes (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ForgeError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_staff INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workouts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                difficulty TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                how_to TEXT NOT NULL,
                reps INTEGER NOT NULL,
                image_url TEXT
            );

            CREATE TABLE IF NOT EXISTS workout_exercises (
                id TEXT PRIMARY KEY,
                workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
                exercise_id TEXT NOT NULL REFERENCES exercises(id) ON DELETE RESTRICT,
                position INTEGER NOT NULL DEFAULT 0,
                UNIQUE(workout_id, exercise_id)
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                timezone TEXT NOT NULL,
                last_selected_workout TEXT REFERENCES workouts(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE RESTRICT,
                status TEXT NOT NULL DEFAULT 'in_progress',
                started_at TEXT NOT NULL,
                finished_at TEXT,
                current_index INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS workout_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE RESTRICT,
                performed_at TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_workout_exercises_order
                ON workout_exercises(workout_id, position, id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_history_user_performed
                ON workout_history(user_id, performed_at DESC);
            CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions(user_id);
            ",
        )
        .map_err(|e| ForgeError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.  The connection is handed out mutably so
    /// closures can open transactions.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| ForgeError::Storage(format!("failed to acquire database lock: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ForgeError::Storage(format!("task join error: {e}")))?
    }

    // ── users & auth sessions ──────────────────────────────────────────

    pub async fn create_user(&self, user: &User, password_hash: &str) -> Result<()> {
        let user = user.clone();
        let password_hash = password_hash.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username, password_hash, is_staff, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.username,
                    password_hash,
                    user.is_staff,
                    encode_ts(&user.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn user_by_name(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE username = ?1"),
                    params![username],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                    params![id.to_string()],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    /// User plus stored password hash, for credential verification.
    pub async fn credentials_by_name(&self, username: &str) -> Result<Option<(User, String)>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT id, username, is_staff, created_at, password_hash
                     FROM users WHERE username = ?1",
                    params![username],
                    |row| Ok((user_from_row(row)?, row.get::<_, String>(4)?)),
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    pub async fn set_staff(&self, username: &str, is_staff: bool) -> Result<User> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET is_staff = ?1 WHERE username = ?2",
                params![is_staff, username],
            )?;
            if changed == 0 {
                return Err(ForgeError::NotFound(format!("user '{username}' not found")));
            }
            let user = conn.query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE username = ?1"),
                params![username],
                user_from_row,
            )?;
            Ok(user)
        })
        .await
    }

    pub async fn insert_auth_session(&self, session: &AuthSession) -> Result<()> {
        let session = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token,
                    session.user_id.to_string(),
                    encode_ts(&session.created_at),
                    encode_ts(&session.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Resolve an unexpired token to its user.
    pub async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT u.id, u.username, u.is_staff, u.created_at
                     FROM auth_sessions s
                     JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1 AND s.expires_at > ?2",
                    params![token, encode_ts(&now)],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub async fn delete_auth_session(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
        .await
    }

    // ── workout catalog ────────────────────────────────────────────────

    pub async fn insert_workout(&self, workout: &Workout) -> Result<()> {
        let w = workout.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO workouts (id, name, description, difficulty, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    w.id.to_string(),
                    w.name,
                    w.description,
                    w.difficulty,
                    w.is_active,
                    encode_ts(&w.created_at),
                    encode_ts(&w.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn workout_by_id(&self, id: Uuid) -> Result<Option<Workout>> {
        self.with_conn(move |conn| {
            let workout = conn
                .query_row(
                    &format!("SELECT {WORKOUT_COLS} FROM workouts WHERE id = ?1"),
                    params![id.to_string()],
                    workout_from_row,
                )
                .optional()?;
            Ok(workout)
        })
        .await
    }

    pub async fn update_workout(
        &self,
        id: Uuid,
        input: &WorkoutInput,
        now: DateTime<Utc>,
    ) -> Result<Workout> {
        let input = input.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE workouts
                 SET name = ?1, description = ?2, difficulty = ?3, is_active = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    input.name,
                    input.description,
                    input.difficulty,
                    input.is_active,
                    encode_ts(&now),
                    id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(ForgeError::NotFound(format!("workout {id} not found")));
            }
            let workout = conn.query_row(
                &format!("SELECT {WORKOUT_COLS} FROM workouts WHERE id = ?1"),
                params![id.to_string()],
                workout_from_row,
            )?;
            Ok(workout)
        })
        .await
    }

    /// Take a workout out of the selectable catalog. The row is kept so
    /// sessions and history stay resolvable.
    pub async fn archive_workout(&self, id: Uuid, now: DateTime<Utc>) -> Result<Workout> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE workouts SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                params![encode_ts(&now), id.to_string()],
            )?;
            if changed == 0 {
                return Err(ForgeError::NotFound(format!("workout {id} not found")));
            }
            let workout = conn.query_row(
                &format!("SELECT {WORKOUT_COLS} FROM workouts WHERE id = ?1"),
                params![id.to_string()],
                workout_from_row,
            )?;
            Ok(workout)
        })
        .await
    }

    /// Active workouts with exercise counts, ordered by name. The optional
    /// filter is a case-insensitive name substring, applied after the fetch.
    pub async fn list_active_workouts(&self, filter: Option<&str>) -> Result<Vec<WorkoutListEntry>> {
        let filter = filter.map(|f| f.trim().to_lowercase()).filter(|f| !f.is_empty());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.name, w.description, w.difficulty, w.is_active,
                        w.created_at, w.updated_at, COUNT(we.id)
                 FROM workouts w
                 LEFT JOIN workout_exercises we ON we.workout_id = w.id
                 WHERE w.is_active = 1
                 GROUP BY w.id
                 ORDER BY w.name COLLATE NOCASE ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(WorkoutListEntry {
                    workout: workout_from_row(row)?,
                    exercise_count: row.get::<_, i64>(7)? as usize,
                })
            })?;
            let mut entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            if let Some(q) = filter {
                entries.retain(|e| e.workout.name.to_lowercase().contains(&q));
            }
            Ok(entries)
        })
        .await
    }

    // ── exercises & associations ───────────────────────────────────────

    pub async fn exercise_by_id(&self, id: Uuid) -> Result<Option<Exercise>> {
        self.with_conn(move |conn| {
            let exercise = conn
                .query_row(
                    "SELECT id, title, how_to, reps, image_url FROM exercises WHERE id = ?1",
                    params![id.to_string()],
                    exercise_from_row,
                )
                .optional()?;
            Ok(exercise)
        })
        .await
    }

    /// Create an exercise and link it to a workout in one transaction. The
    /// new association lands at position = current association count, so
    /// additions append to the traversal order.
    pub async fn add_exercise_to_workout(
        &self,
        workout_id: Uuid,
        input: &ExerciseInput,
    ) -> Result<WorkoutStep> {
        let input = input.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let known: i64 = tx.query_row(
                "SELECT COUNT(*) FROM workouts WHERE id = ?1",
                params![workout_id.to_string()],
                |row| row.get(0),
            )?;
            if known == 0 {
                return Err(ForgeError::NotFound(format!("workout {workout_id} not found")));
            }

            let mut exercise = Exercise::new(input.title, input.how_to, input.reps);
            exercise.image_url = input.image_url.filter(|u| !u.trim().is_empty());
            tx.execute(
                "INSERT INTO exercises (id, title, how_to, reps, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    exercise.id.to_string(),
                    exercise.title,
                    exercise.how_to,
                    exercise.reps,
                    exercise.image_url,
                ],
            )?;

            let position: i64 = tx.query_row(
                "SELECT COUNT(*) FROM workout_exercises WHERE workout_id = ?1",
                params![workout_id.to_string()],
                |row| row.get(0),
            )?;
            let association = WorkoutExercise::new(workout_id, exercise.id, position as u32);
            tx.execute(
                "INSERT INTO workout_exercises (id, workout_id, exercise_id, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    association.id.to_string(),
                    association.workout_id.to_string(),
                    association.exercise_id.to_string(),
                    association.position,
                ],
            )?;

            tx.commit()?;
            Ok(WorkoutStep {
                association,
                exercise,
            })
        })
        .await
    }

    /// Link an existing exercise to a workout at the next position. The
    /// `(workout, exercise)` pair is unique; relinking is a precondition
    /// failure, not a second association.
    pub async fn link_exercise_to_workout(
        &self,
        workout_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<WorkoutStep> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let known: i64 = tx.query_row(
                "SELECT COUNT(*) FROM workouts WHERE id = ?1",
                params![workout_id.to_string()],
                |row| row.get(0),
            )?;
            if known == 0 {
                return Err(ForgeError::NotFound(format!("workout {workout_id} not found")));
            }
            let Some(exercise) = tx
                .query_row(
                    "SELECT id, title, how_to, reps, image_url FROM exercises WHERE id = ?1",
                    params![exercise_id.to_string()],
                    exercise_from_row,
                )
                .optional()?
            else {
                return Err(ForgeError::NotFound(format!("exercise {exercise_id} not found")));
            };

            let position: i64 = tx.query_row(
                "SELECT COUNT(*) FROM workout_exercises WHERE workout_id = ?1",
                params![workout_id.to_string()],
                |row| row.get(0),
            )?;
            let association = WorkoutExercise::new(workout_id, exercise_id, position as u32);
            let inserted = tx.execute(
                "INSERT INTO workout_exercises (id, workout_id, exercise_id, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    association.id.to_string(),
                    association.workout_id.to_string(),
                    association.exercise_id.to_string(),
                    association.position,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(ForgeError::Precondition(
                        "exercise is already part of this workout".into(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit()?;
            Ok(WorkoutStep {
                association,
                exercise,
            })
        })
        .await
    }

    /// Remove one association from a workout. The exercise row itself stays.
    pub async fn remove_workout_exercise(
        &self,
        workout_id: Uuid,
        association_id: Uuid,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "DELETE FROM workout_exercises WHERE id = ?1 AND workout_id = ?2",
                params![association_id.to_string(), workout_id.to_string()],
            )?;
            if changed == 0 {
                return Err(ForgeError::NotFound(format!(
                    "exercise entry {association_id} not found in workout {workout_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    /// Exercises of a workout in traversal order: position ascending, ties
    /// by association id (time-ordered, so insertion order).
    pub async fn ordered_exercises(&self, workout_id: Uuid) -> Result<Vec<WorkoutStep>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT we.id, we.workout_id, we.exercise_id, we.position,
                        e.id, e.title, e.how_to, e.reps, e.image_url
                 FROM workout_exercises we
                 JOIN exercises e ON e.id = we.exercise_id
                 WHERE we.workout_id = ?1
                 ORDER BY we.position ASC, we.id ASC",
            )?;
            let rows = stmt.query_map(params![workout_id.to_string()], |row| {
                Ok(WorkoutStep {
                    association: WorkoutExercise {
                        id: decode_uuid(row.get(0)?, 0)?,
                        workout_id: decode_uuid(row.get(1)?, 1)?,
                        exercise_id: decode_uuid(row.get(2)?, 2)?,
                        position: row.get(3)?,
                    },
                    exercise: Exercise {
                        id: decode_uuid(row.get(4)?, 4)?,
                        title: row.get(5)?,
                        how_to: row.get(6)?,
                        reps: row.get(7)?,
                        image_url: row.get(8)?,
                    },
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    // ── profiles ───────────────────────────────────────────────────────

    /// Fetch a user's profile, creating it with defaults on first touch.
    pub async fn get_or_create_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO profiles (user_id, timezone) VALUES (?1, ?2)",
                params![user_id.to_string(), DEFAULT_TIMEZONE],
            )?;
            let profile = tx.query_row(
                "SELECT user_id, timezone, last_selected_workout FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                profile_from_row,
            )?;
            tx.commit()?;
            Ok(profile)
        })
        .await
    }

    /// Remember `workout_id` as the user's selection. Only active workouts
    /// are selectable; anything else is NotFound.
    pub async fn select_workout(&self, user_id: Uuid, workout_id: Uuid) -> Result<Workout> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let Some(workout) = tx
                .query_row(
                    &format!("SELECT {WORKOUT_COLS} FROM workouts WHERE id = ?1 AND is_active = 1"),
                    params![workout_id.to_string()],
                    workout_from_row,
                )
                .optional()?
            else {
                return Err(ForgeError::NotFound(format!(
                    "active workout {workout_id} not found"
                )));
            };
            tx.execute(
                "INSERT OR IGNORE INTO profiles (user_id, timezone) VALUES (?1, ?2)",
                params![user_id.to_string(), DEFAULT_TIMEZONE],
            )?;
            tx.execute(
                "UPDATE profiles SET last_selected_workout = ?1 WHERE user_id = ?2",
                params![workout_id.to_string(), user_id.to_string()],
            )?;
            tx.commit()?;
            Ok(workout)
        })
        .await
    }

    /// The user's remembered selection, if any. Archiving does not clear a
    /// selection, so this may return an inactive workout.
    pub async fn selected_workout(&self, user_id: Uuid) -> Result<Option<Workout>> {
        self.with_conn(move |conn| {
            let workout = conn
                .query_row(
                    "SELECT w.id, w.name, w.description, w.difficulty, w.is_active,
                            w.created_at, w.updated_at
                     FROM profiles p
                     JOIN workouts w ON w.id = p.last_selected_workout
                     WHERE p.user_id = ?1",
                    params![user_id.to_string()],
                    workout_from_row,
                )
                .optional()?;
            Ok(workout)
        })
        .await
    }

    pub async fn set_profile_timezone(&self, user_id: Uuid, timezone: &str) -> Result<UserProfile> {
        let timezone = timezone.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO profiles (user_id, timezone) VALUES (?1, ?2)",
                params![user_id.to_string(), DEFAULT_TIMEZONE],
            )?;
            tx.execute(
                "UPDATE profiles SET timezone = ?1 WHERE user_id = ?2",
                params![timezone, user_id.to_string()],
            )?;
            let profile = tx.query_row(
                "SELECT user_id, timezone, last_selected_workout FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                profile_from_row,
            )?;
            tx.commit()?;
            Ok(profile)
        })
        .await
    }

    // ── sessions ───────────────────────────────────────────────────────

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let s = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, workout_id, status, started_at, finished_at, current_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    s.id.to_string(),
                    s.user_id.to_string(),
                    s.workout_id.to_string(),
                    s.status.to_string(),
                    encode_ts(&s.started_at),
                    s.finished_at.map(|ts| encode_ts(&ts)),
                    s.current_index,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// A session scoped to its owner. Someone else's session id resolves to
    /// `None`, indistinguishable from an unknown id.
    pub async fn session_for_user(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Session>> {
        self.with_conn(move |conn| {
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?1 AND user_id = ?2"),
                    params![session_id.to_string(), user_id.to_string()],
                    session_from_row,
                )
                .optional()?;
            Ok(session)
        })
        .await
    }

    /// Move a session forward by one exercise, in a single transaction.
    ///
    /// The submitted `from_index` must match the stored one; otherwise the
    /// request raced another advance and nothing changes (`Stale`).  When
    /// the final exercise is passed, the same transaction marks the session
    /// completed and writes its one history record.
    pub async fn advance_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        from_index: u32,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let Some(mut session) = tx
                .query_row(
                    &format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?1 AND user_id = ?2"),
                    params![session_id.to_string(), user_id.to_string()],
                    session_from_row,
                )
                .optional()?
            else {
                return Err(ForgeError::NotFound(format!("session {session_id} not found")));
            };

            if session.is_completed() {
                return Ok(AdvanceOutcome::AlreadyCompleted(session));
            }
            if session.current_index != from_index {
                return Ok(AdvanceOutcome::Stale(session));
            }

            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM workout_exercises WHERE workout_id = ?1",
                params![session.workout_id.to_string()],
                |row| row.get(0),
            )?;

            let next = session.current_index + 1;
            session.current_index = next;
            if i64::from(next) >= total {
                session.status = SessionStatus::Completed;
                session.finished_at = Some(now);
                tx.execute(
                    "UPDATE sessions SET status = ?1, finished_at = ?2, current_index = ?3
                     WHERE id = ?4",
                    params![
                        session.status.to_string(),
                        encode_ts(&now),
                        next,
                        session.id.to_string(),
                    ],
                )?;

                let history = WorkoutHistory::new(
                    session.user_id,
                    session.workout_id,
                    now,
                    session.duration_seconds(),
                );
                tx.execute(
                    "INSERT INTO workout_history (id, user_id, workout_id, performed_at, duration_seconds)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        history.id.to_string(),
                        history.user_id.to_string(),
                        history.workout_id.to_string(),
                        encode_ts(&history.performed_at),
                        history.duration_seconds,
                    ],
                )?;

                tx.commit()?;
                Ok(AdvanceOutcome::Completed { session, history })
            } else {
                tx.execute(
                    "UPDATE sessions SET current_index = ?1 WHERE id = ?2",
                    params![next, session.id.to_string()],
                )?;
                tx.commit()?;
                Ok(AdvanceOutcome::Moved(session))
            }
        })
        .await
    }

    // ── history ────────────────────────────────────────────────────────

    /// Append a history record directly. Session completion writes its own
    /// record transactionally; this is for seeding and tooling.
    pub async fn insert_history(&self, record: &WorkoutHistory) -> Result<()> {
        let r = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO workout_history (id, user_id, workout_id, performed_at, duration_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    r.id.to_string(),
                    r.user_id.to_string(),
                    r.workout_id.to_string(),
                    encode_ts(&r.performed_at),
                    r.duration_seconds,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// History records for a user with `start <= performed_at <= end`,
    /// oldest first.
    pub async fn history_between(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkoutHistory>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HISTORY_COLS} FROM workout_history
                 WHERE user_id = ?1 AND performed_at >= ?2 AND performed_at <= ?3
                 ORDER BY performed_at ASC"
            ))?;
            let rows = stmt.query_map(
                params![user_id.to_string(), encode_ts(&start), encode_ts(&end)],
                history_from_row,
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Newest-first history page joined with workout names, with optional
    /// inclusive time bounds.
    pub async fn recent_history(
        &self,
        user_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>> {
        self.with_conn(move |conn| {
            let mut sql = String::from(
                "SELECT h.id, h.user_id, h.workout_id, h.performed_at, h.duration_seconds, w.name
                 FROM workout_history h
                 JOIN workouts w ON w.id = h.workout_id
                 WHERE h.user_id = ?1",
            );
            let mut bind: Vec<String> = vec![user_id.to_string()];
            if let Some(start) = start {
                bind.push(encode_ts(&start));
                sql.push_str(&format!(" AND h.performed_at >= ?{}", bind.len()));
            }
            if let Some(end) = end {
                bind.push(encode_ts(&end));
                sql.push_str(&format!(" AND h.performed_at <= ?{}", bind.len()));
            }
            sql.push_str(&format!(" ORDER BY h.performed_at DESC LIMIT {limit}"));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
                Ok(HistoryEntry {
                    record: history_from_row(row)?,
                    workout_name: row.get(5)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    // ── maintenance ────────────────────────────────────────────────────

    pub async fn counts(&self) -> Result<StoreCounts> {
        self.with_conn(|conn| {
            Ok(StoreCounts {
                users: count(conn, "SELECT COUNT(*) FROM users")?,
                workouts: count(conn, "SELECT COUNT(*) FROM workouts")?,
                active_workouts: count(conn, "SELECT COUNT(*) FROM workouts WHERE is_active = 1")?,
                exercises: count(conn, "SELECT COUNT(*) FROM exercises")?,
                sessions: count(conn, "SELECT COUNT(*) FROM sessions")?,
                completed_sessions: count(
                    conn,
                    "SELECT COUNT(*) FROM sessions WHERE status = 'completed'",
                )?,
                history: count(conn, "SELECT COUNT(*) FROM workout_history")?,
            })
        })
        .await
    }

    /// Delete all content: history, sessions, associations, exercises and
    /// workouts, in foreign-key order. Accounts and profiles survive;
    /// dangling selections are nulled by the schema.
    pub async fn clear_content(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM workout_history;
                 DELETE FROM sessions;
                 DELETE FROM workout_exercises;
                 DELETE FROM exercises;
                 DELETE FROM workouts;",
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Row counts shown by status tooling.
#[derive(Debug, Clone, Serialize)]
pub struct StoreCounts {
    pub users: i64,
    pub workouts: i64,
    pub active_workouts: i64,
    pub exercises: i64,
    pub sessions: i64,
    pub completed_sessions: i64,
    pub history: i64,
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
}

/// RFC 3339 with fixed-width microseconds and a `Z` suffix, so lexicographic
/// comparison in SQL matches chronological order.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn decode_uuid(raw: String, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: decode_uuid(row.get(0)?, 0)?,
        username: row.get(1)?,
        is_staff: row.get(2)?,
        created_at: decode_ts(row.get(3)?, 3)?,
    })
}

fn workout_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workout> {
    Ok(Workout {
        id: decode_uuid(row.get(0)?, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        difficulty: row.get(3)?,
        is_active: row.get(4)?,
        created_at: decode_ts(row.get(5)?, 5)?,
        updated_at: decode_ts(row.get(6)?, 6)?,
    })
}

fn exercise_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exercise> {
    Ok(Exercise {
        id: decode_uuid(row.get(0)?, 0)?,
        title: row.get(1)?,
        how_to: row.get(2)?,
        reps: row.get(3)?,
        image_url: row.get(4)?,
    })
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let last_selected_workout = match row.get::<_, Option<String>>(2)? {
        Some(raw) => Some(decode_uuid(raw, 2)?),
        None => None,
    };
    Ok(UserProfile {
        user_id: decode_uuid(row.get(0)?, 0)?,
        timezone: row.get(1)?,
        last_selected_workout,
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(3)?;
    let status = status.parse::<SessionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    let finished_at = match row.get::<_, Option<String>>(5)? {
        Some(raw) => Some(decode_ts(raw, 5)?),
        None => None,
    };
    Ok(Session {
        id: decode_uuid(row.get(0)?, 0)?,
        user_id: decode_uuid(row.get(1)?, 1)?,
        workout_id: decode_uuid(row.get(2)?, 2)?,
        status,
        started_at: decode_ts(row.get(4)?, 4)?,
        finished_at,
        current_index: row.get(6)?,
    })
}

fn history_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkoutHistory> {
    Ok(WorkoutHistory {
        id: decode_uuid(row.get(0)?, 0)?,
        user_id: decode_uuid(row.get(1)?, 1)?,
        workout_id: decode_uuid(row.get(2)?, 2)?,
        performed_at: decode_ts(row.get(3)?, 3)?,
        duration_seconds: row.get(4)?,
    })
}
