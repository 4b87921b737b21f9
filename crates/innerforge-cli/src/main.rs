use anyhow::Result;
use clap::Parser;
use innerforge_core::model::{ExerciseInput, Workout};
use innerforge_core::storage;
use innerforge_core::week;
use innerforge_core::{auth, ForgeConfig, SqliteStore};
use owo_colors::OwoColorize;

#[derive(Parser)]
#[command(name = "innerforge", about = "Innerforge: guided workout tracking", version)]
enum Cli {
    /// Write a starter innerforge.toml in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show database location and row counts
    Status,
    /// Create an account
    AddUser {
        username: String,
        password: String,
        /// Grant staff rights (workout management in the web app)
        #[arg(long)]
        staff: bool,
    },
    /// Grant or revoke staff rights on an existing account
    Staff {
        username: String,
        /// Revoke instead of grant
        #[arg(long)]
        revoke: bool,
    },
    /// Set the timezone a user's weeks are computed in
    Timezone {
        username: String,
        /// IANA zone name, e.g. Europe/Madrid
        zone: String,
    },
    /// List active workouts with their exercise counts
    Workouts {
        /// Only show workouts whose name contains this text
        #[arg(short, long)]
        q: Option<String>,
        /// Output raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show a user's recent workout history
    History {
        username: String,
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Populate sample workouts for demonstration
    Seed {
        /// Remove all workout content instead of creating it
        #[arg(long)]
        clean: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = ForgeConfig::load(Some(&std::env::current_dir()?))
        .unwrap_or_else(|_| ForgeConfig::default_config());

    run(cli, &config).await
}

async fn run(cli: Cli, config: &ForgeConfig) -> Result<()> {
    match cli {
        Cli::Init { force } => cmd_init(config, force),
        Cli::Status => {
            let store = storage::open_from_config(config)?;
            cmd_status(&store, config).await
        }
        Cli::AddUser {
            username,
            password,
            staff,
        } => {
            let store = storage::open_from_config(config)?;
            cmd_add_user(&store, &username, &password, staff).await
        }
        Cli::Staff { username, revoke } => {
            let store = storage::open_from_config(config)?;
            cmd_staff(&store, &username, revoke).await
        }
        Cli::Timezone { username, zone } => {
            let store = storage::open_from_config(config)?;
            cmd_timezone(&store, &username, &zone).await
        }
        Cli::Workouts { q, json } => {
            let store = storage::open_from_config(config)?;
            cmd_workouts(&store, q.as_deref(), json).await
        }
        Cli::History {
            username,
            limit,
            json,
        } => {
            let store = storage::open_from_config(config)?;
            cmd_history(&store, config, &username, limit, json).await
        }
        Cli::Seed { clean } => {
            let store = storage::open_from_config(config)?;
            cmd_seed(&store, clean).await
        }
    }
}

fn cmd_init(config: &ForgeConfig, force: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = cwd.join("innerforge.toml");

    if path.exists() && !force {
        println!(
            "{} innerforge.toml already exists. Pass {} to overwrite it.",
            "Skipped.".yellow(),
            "--force".cyan()
        );
        return Ok(());
    }

    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_str)?;

    println!("{}", "Wrote innerforge.toml".green());
    println!("  {}   {}", "Config:".dimmed(), path.display());
    println!(
        "  {}      {}:{}",
        "Web:".dimmed(),
        config.web.host,
        config.web.port
    );
    println!(
        "  {} {}",
        "Timezone:".dimmed(),
        config.time.default_timezone.cyan()
    );
    Ok(())
}

async fn cmd_status(store: &SqliteStore, config: &ForgeConfig) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    println!("{}", format!("Innerforge Status v{version}").bold());
    println!("  {}  {}", "Database:".dimmed(), store.path().display());

    let counts = store.counts().await?;
    println!("  {}     {}", "Users:".dimmed(), counts.users.to_string().cyan());
    println!(
        "  {}  {} active of {}",
        "Workouts:".dimmed(),
        counts.active_workouts.to_string().cyan(),
        counts.workouts
    );
    println!(
        "  {} {}",
        "Exercises:".dimmed(),
        counts.exercises.to_string().cyan()
    );
    println!(
        "  {}  {} completed of {}",
        "Sessions:".dimmed(),
        counts.completed_sessions.to_string().cyan(),
        counts.sessions
    );
    println!(
        "  {}   {}",
        "History:".dimmed(),
        counts.history.to_string().cyan()
    );
    println!(
        "  {}  {}",
        "Timezone:".dimmed(),
        config.time.default_timezone
    );
    println!(
        "  {}       {}:{}",
        "Web:".dimmed(),
        config.web.host,
        config.web.port
    );
    Ok(())
}

async fn cmd_add_user(
    store: &SqliteStore,
    username: &str,
    password: &str,
    staff: bool,
) -> Result<()> {
    if password.len() < auth::MIN_PASSWORD_LENGTH {
        anyhow::bail!(
            "password must be at least {} characters",
            auth::MIN_PASSWORD_LENGTH
        );
    }
    let user = auth::create_user(store, username, password, staff).await?;
    if user.is_staff {
        println!(
            "{} Created staff user {}",
            "Done.".green(),
            user.username.cyan()
        );
    } else {
        println!("{} Created user {}", "Done.".green(), user.username.cyan());
    }
    Ok(())
}

async fn cmd_staff(store: &SqliteStore, username: &str, revoke: bool) -> Result<()> {
    let user = store.set_staff(username, !revoke).await?;
    if user.is_staff {
        println!(
            "{} {} can now manage workouts",
            "Granted.".green(),
            user.username.cyan()
        );
    } else {
        println!(
            "{} {} is a regular account again",
            "Revoked.".yellow(),
            user.username.cyan()
        );
    }
    Ok(())
}

async fn cmd_timezone(store: &SqliteStore, username: &str, zone: &str) -> Result<()> {
    if zone.parse::<chrono_tz::Tz>().is_err() {
        anyhow::bail!("'{zone}' is not a known IANA timezone (try Europe/Madrid)");
    }
    let Some(user) = store.user_by_name(username).await? else {
        anyhow::bail!("no user named '{username}'");
    };
    let profile = store.set_profile_timezone(user.id, zone).await?;
    println!(
        "{} {} now tracks weeks in {}",
        "Done.".green(),
        user.username.cyan(),
        profile.timezone.cyan()
    );
    Ok(())
}

async fn cmd_workouts(store: &SqliteStore, filter: Option<&str>, json: bool) -> Result<()> {
    let entries = store.list_active_workouts(filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No active workouts.".dimmed());
        return Ok(());
    }
    for entry in entries {
        let difficulty = if entry.workout.difficulty.is_empty() {
            String::new()
        } else {
            format!("  [{}]", entry.workout.difficulty)
        };
        println!(
            "{}{}  {}",
            entry.workout.name.bold(),
            difficulty.dimmed(),
            format!("{} exercises", entry.exercise_count).cyan()
        );
        if !entry.workout.description.is_empty() {
            println!("  {}", entry.workout.description.dimmed());
        }
    }
    Ok(())
}

async fn cmd_history(
    store: &SqliteStore,
    config: &ForgeConfig,
    username: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let Some(user) = store.user_by_name(username).await? else {
        anyhow::bail!("no user named '{username}'");
    };
    let entries = store.recent_history(user.id, None, None, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", format!("No workouts recorded for {username}.").dimmed());
        return Ok(());
    }

    let profile = store.get_or_create_profile(user.id).await?;
    let tz = week::resolve_timezone(Some(profile.timezone.as_str()), &config.time.default_timezone);
    println!(
        "{}",
        format!("Recent workouts for {username} ({tz})").bold()
    );
    for entry in entries {
        let local = entry.record.performed_at.with_timezone(&tz);
        println!(
            "  {}  {}  {}",
            local.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            entry.workout_name,
            entry.record.duration_mmss().cyan()
        );
    }
    Ok(())
}

const SEED_WORKOUTS: &[(&str, &str, &str, &[(&str, &str, u32)])] = &[
    (
        "Full Body Basics",
        "A gentle circuit that touches every major muscle group. Good first pick.",
        "easy",
        &[
            ("Squat", "Feet shoulder width apart, sit back until thighs are parallel, drive up through the heels.", 15),
            ("Push-up", "Hands under shoulders, body in one line, lower until the chest almost touches the floor.", 12),
            ("Glute bridge", "On your back, feet flat, push the hips up and squeeze at the top.", 15),
            ("Plank", "Forearms down, body straight, hold while breathing steadily. Count slow seconds.", 30),
        ],
    ),
    (
        "Upper Body Push",
        "Pressing work for chest, shoulders and triceps.",
        "medium",
        &[
            ("Pike push-up", "Hips high in an inverted V, lower the crown of the head toward the floor.", 10),
            ("Bench dip", "Hands on a chair behind you, lower until elbows reach ninety degrees.", 12),
            ("Shoulder tap", "From a high plank, tap the opposite shoulder without rocking the hips.", 20),
        ],
    ),
    (
        "Core Crusher",
        "A dense core block. Keep the lower back pressed down throughout.",
        "hard",
        &[
            ("Crunch", "Curl the shoulder blades off the floor, exhale at the top, lower with control.", 20),
            ("Russian twist", "Seated, heels hovering, rotate the torso side to side. Each side counts.", 30),
            ("Leg raise", "Legs straight, lower them slowly without arching the back.", 15),
            ("Mountain climber", "From a high plank, drive the knees in alternately at a run.", 40),
        ],
    ),
];

async fn cmd_seed(store: &SqliteStore, clean: bool) -> Result<()> {
    if clean {
        let counts = store.counts().await?;
        store.clear_content().await?;
        println!(
            "{} Removed {} workouts, {} exercises and {} history entries. Accounts were kept.",
            "Cleaned.".green(),
            counts.workouts,
            counts.exercises,
            counts.history
        );
        return Ok(());
    }

    let existing = store.list_active_workouts(None).await?;
    if existing
        .iter()
        .any(|e| SEED_WORKOUTS.iter().any(|(name, ..)| e.workout.name == *name))
    {
        println!(
            "{} Seed data already exists. Use {} to remove workout content first.",
            "Skipped.".yellow(),
            "innerforge seed --clean".cyan()
        );
        return Ok(());
    }

    println!("{}", "Seeding sample workouts...".cyan());
    for (name, description, difficulty, exercises) in SEED_WORKOUTS {
        let workout = Workout::new(name.to_string())
            .with_description(description.to_string())
            .with_difficulty(difficulty.to_string());
        store.insert_workout(&workout).await?;
        for (title, how_to, reps) in exercises.iter() {
            let input = ExerciseInput {
                title: title.to_string(),
                how_to: how_to.to_string(),
                reps: *reps,
                image_url: None,
            };
            store.add_exercise_to_workout(workout.id, &input).await?;
        }
        println!(
            "  {} {} ({} exercises)",
            "+".green(),
            workout.name,
            exercises.len()
        );
    }
    println!("{}", "Done. Pick one in the web app and get moving.".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn test_config() -> ForgeConfig {
        ForgeConfig::default_config()
    }

    #[tokio::test]
    async fn test_cmd_seed_populates_then_skips() {
        let store = test_store();
        cmd_seed(&store, false).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.workouts, 3);
        assert_eq!(counts.exercises, 11);

        // A second run must not duplicate anything.
        cmd_seed(&store, false).await.unwrap();
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.workouts, 3);
    }

    #[tokio::test]
    async fn test_cmd_seed_clean_keeps_accounts() {
        let store = test_store();
        cmd_seed(&store, false).await.unwrap();
        cmd_add_user(&store, "ana", "longenough", false)
            .await
            .unwrap();

        cmd_seed(&store, true).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.workouts, 0);
        assert_eq!(counts.exercises, 0);
        assert_eq!(counts.users, 1);
    }

    #[tokio::test]
    async fn test_cmd_add_user_and_staff_toggle() {
        let store = test_store();
        cmd_add_user(&store, "coach", "longenough", true)
            .await
            .unwrap();
        let user = store.user_by_name("coach").await.unwrap().unwrap();
        assert!(user.is_staff);

        cmd_staff(&store, "coach", true).await.unwrap();
        let user = store.user_by_name("coach").await.unwrap().unwrap();
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn test_cmd_add_user_rejects_duplicates_and_short_passwords() {
        let store = test_store();
        cmd_add_user(&store, "ana", "longenough", false)
            .await
            .unwrap();
        assert!(cmd_add_user(&store, "ana", "longenough", false)
            .await
            .is_err());
        assert!(cmd_add_user(&store, "bob", "short", false).await.is_err());
    }

    #[tokio::test]
    async fn test_cmd_timezone_validates_zone_and_user() {
        let store = test_store();
        cmd_add_user(&store, "ana", "longenough", false)
            .await
            .unwrap();

        assert!(cmd_timezone(&store, "ana", "Mars/Olympus_Mons")
            .await
            .is_err());
        assert!(cmd_timezone(&store, "ghost", "Europe/Madrid").await.is_err());

        cmd_timezone(&store, "ana", "America/New_York").await.unwrap();
        let user = store.user_by_name("ana").await.unwrap().unwrap();
        let profile = store.get_or_create_profile(user.id).await.unwrap();
        assert_eq!(profile.timezone, "America/New_York");
    }

    #[tokio::test]
    async fn test_cmd_workouts_json_mode() {
        let store = test_store();
        cmd_seed(&store, false).await.unwrap();
        cmd_workouts(&store, Some("core"), true).await.unwrap();
        cmd_workouts(&store, None, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_cmd_history_requires_known_user() {
        let store = test_store();
        let config = test_config();
        assert!(cmd_history(&store, &config, "ghost", 10, false)
            .await
            .is_err());

        cmd_add_user(&store, "ana", "longenough", false)
            .await
            .unwrap();
        cmd_history(&store, &config, "ana", 10, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_cmd_status_runs() {
        let store = test_store();
        let config = test_config();
        cmd_status(&store, &config).await.unwrap();
    }
}
