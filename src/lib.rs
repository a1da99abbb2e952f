//! SkillPulse: daily skill leaderboard snapshots, day-over-day trend diffs
//! and per-skill history.
//!
//! - [`commands::db`] owns every persisted row (snapshots, history, detail cache).
//! - [`analysis::trend`] turns today's scrape plus the stored previous day into a [`models::trend::TrendResult`].
//! - [`analysis::candidates`] decides which skills are worth enriching this cycle.
//! - [`commands::cycle`] wires both to the scraper, enricher and notifier seams in [`commands::sources`].

pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

pub use commands::db::SnapshotStore;
pub use error::{Error, Result};
