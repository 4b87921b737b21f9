//! # innerforge-core
//!
//! Domain logic for Innerforge: the workout catalog, guided session engine,
//! timezone-aware week summaries, workout history, and user accounts, all
//! persisted in a single SQLite database.
//!
//! The web server and CLI are thin shells over this crate.  Everything
//! user-visible goes through [`storage::SqliteStore`] plus the free
//! functions in [`session`], [`week`], and [`auth`].

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod storage;
pub mod week;

pub use config::ForgeConfig;
pub use error::{ForgeError, Result};
pub use storage::SqliteStore;
