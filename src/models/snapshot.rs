use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One scraped leaderboard row, before any day-over-day annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub rank: u32,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub installs: u64,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub rank: u32,
    pub name: String,
    pub owner: String,
    pub installs: u64,
    pub installs_delta: i64,
    pub installs_rate: f64,
    pub rank_delta: i64, // positive = moved up
    pub url: String,
}

impl Snapshot {
    /// A snapshot with no movement recorded, as for a first appearance.
    pub fn unannotated(date: NaiveDate, entry: &RawEntry) -> Self {
        Self {
            date,
            rank: entry.rank,
            name: entry.name.clone(),
            owner: entry.owner.clone(),
            installs: entry.installs,
            installs_delta: 0,
            installs_rate: 0.0,
            rank_delta: 0,
            url: entry.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub name: String,
    pub date: NaiveDate,
    pub rank: u32,
    pub installs: u64,
}

impl From<&Snapshot> for HistoryPoint {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            date: snapshot.date,
            rank: snapshot.rank,
            installs: snapshot.installs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub category_localized: String,
    pub count: usize,
}

/// Stored rank movers for a date, joined with cached details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredMovers {
    pub rising: Vec<StoredMover>,
    pub falling: Vec<StoredMover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMover {
    pub name: String,
    pub rank: u32,
    pub rank_delta: i64,
    pub summary: String,
    pub category: String,
}
