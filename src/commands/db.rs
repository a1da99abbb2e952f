use crate::error::{Result, StorageError, ValidationError};
use crate::models::detail::{Enrichment, SkillDetail};
use crate::models::snapshot::{CategoryCount, HistoryPoint, Snapshot, StoredMover, StoredMovers};
use chrono::{Days, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 2;

const SNAPSHOT_COLUMNS: &str =
    "date, rank, name, owner, installs, installs_delta, installs_rate, rank_delta, url";

const DETAIL_COLUMNS: &str =
    "name, summary, description, use_case, solves, category, category_localized, rules_count, owner, url, updated_at";

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("snapshot store schema v{version} is newer than v{DB_SCHEMA_VERSION}; continuing");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS skills_daily (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            rank INTEGER NOT NULL,
            name TEXT NOT NULL,
            owner TEXT NOT NULL DEFAULT '',
            installs INTEGER NOT NULL DEFAULT 0,
            installs_delta INTEGER NOT NULL DEFAULT 0,
            installs_rate REAL NOT NULL DEFAULT 0,
            rank_delta INTEGER NOT NULL DEFAULT 0,
            url TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL DEFAULT 0,
            UNIQUE(date, name)
        );

        CREATE TABLE IF NOT EXISTS skills_details (
            name TEXT PRIMARY KEY,
            summary TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            use_case TEXT NOT NULL DEFAULT '',
            solves TEXT NOT NULL DEFAULT '[]',
            category TEXT NOT NULL DEFAULT '',
            category_localized TEXT NOT NULL DEFAULT '',
            rules_count INTEGER,
            owner TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            updated_at INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS skills_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            skill_name TEXT NOT NULL,
            date TEXT NOT NULL,
            rank INTEGER NOT NULL,
            installs INTEGER NOT NULL DEFAULT 0,
            UNIQUE(skill_name, date)
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_daily_date ON skills_daily(date);
        CREATE INDEX IF NOT EXISTS idx_daily_name ON skills_daily(name);
        CREATE INDEX IF NOT EXISTS idx_daily_rank ON skills_daily(date, rank);
        CREATE INDEX IF NOT EXISTS idx_details_category ON skills_details(category);
        CREATE INDEX IF NOT EXISTS idx_details_owner ON skills_details(owner);
        CREATE INDEX IF NOT EXISTS idx_history_name ON skills_history(skill_name);
        CREATE INDEX IF NOT EXISTS idx_history_date ON skills_history(date);
        ",
    )
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

/// The day `days` before `today`, saturating at the earliest representable date.
pub fn days_before(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

fn utc_today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Durable storage for daily leaderboard captures, per-skill history and
/// the enrichment detail cache.
///
/// Not built for concurrent writers: one process per cycle owns the file.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) a store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
        let conn = Connection::open(path).map_err(StorageError::Sqlite)?;
        initialize_schema(&conn).map_err(StorageError::Sqlite)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::Sqlite)?;
        initialize_schema(&conn).map_err(StorageError::Sqlite)?;
        Ok(Self { conn })
    }

    /// Upsert one snapshot and one history point per item, all in one transaction.
    pub fn save_today(&self, date: NaiveDate, items: &[Snapshot]) -> Result<()> {
        validate_snapshots(date, items)?;

        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut daily = tx.prepare_cached(
                "
                INSERT INTO skills_daily (
                    date, rank, name, owner, installs, installs_delta, installs_rate, rank_delta, url, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(date, name) DO UPDATE SET
                    rank = excluded.rank,
                    owner = excluded.owner,
                    installs = excluded.installs,
                    installs_delta = excluded.installs_delta,
                    installs_rate = excluded.installs_rate,
                    rank_delta = excluded.rank_delta,
                    url = excluded.url
                ",
            )?;
            let mut history = tx.prepare_cached(
                "
                INSERT INTO skills_history (skill_name, date, rank, installs)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(skill_name, date) DO UPDATE SET
                    rank = excluded.rank,
                    installs = excluded.installs
                ",
            )?;

            for item in items {
                let installs = installs_to_sql(&item.name, item.installs)?;
                daily.execute(params![
                    date,
                    item.rank,
                    item.name,
                    item.owner,
                    installs,
                    item.installs_delta,
                    item.installs_rate,
                    item.rank_delta,
                    item.url,
                    now,
                ])?;

                let point = HistoryPoint::from(item);
                history.execute(params![point.name, point.date, point.rank, installs])?;
            }
        }
        tx.commit()?;

        log::debug!("saved {} snapshots for {date}", items.len());
        Ok(())
    }

    /// All snapshots for `date`, ascending by rank.
    pub fn get_by_date(&self, date: NaiveDate) -> Result<Vec<Snapshot>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM skills_daily WHERE date = ?1 ORDER BY rank ASC"
        ))?;
        let rows = stmt
            .query_map(params![date], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Snapshots for the calendar day before `date` (not the last stored day).
    pub fn get_yesterday(&self, date: NaiveDate) -> Result<Vec<Snapshot>> {
        match date.pred_opt() {
            Some(yesterday) => self.get_by_date(yesterday),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_latest_date(&self) -> Result<Option<NaiveDate>> {
        let latest = self
            .conn
            .query_row("SELECT MAX(date) FROM skills_daily", [], |row| {
                row.get::<_, Option<NaiveDate>>(0)
            })?;
        Ok(latest)
    }

    /// Names of the first `n` skills by rank on `date`.
    pub fn get_top_n(&self, date: NaiveDate, n: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name FROM skills_daily WHERE date = ?1 ORDER BY rank ASC LIMIT ?2",
        )?;
        let names = stmt
            .query_map(params![date, n as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Upsert detail cache rows; newer enrichment always wins.
    pub fn save_details(&self, details: &[SkillDetail]) -> Result<()> {
        validate_details(details)?;

        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "
                INSERT INTO skills_details (
                    name, summary, description, use_case, solves, category,
                    category_localized, rules_count, owner, url, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(name) DO UPDATE SET
                    summary = excluded.summary,
                    description = excluded.description,
                    use_case = excluded.use_case,
                    solves = excluded.solves,
                    category = excluded.category,
                    category_localized = excluded.category_localized,
                    rules_count = excluded.rules_count,
                    owner = excluded.owner,
                    url = excluded.url,
                    updated_at = excluded.updated_at
                ",
            )?;

            for detail in details {
                let solves_json =
                    serde_json::to_string(&detail.solves).map_err(StorageError::Encode)?;
                stmt.execute(params![
                    detail.name,
                    detail.summary,
                    detail.description,
                    detail.use_case,
                    solves_json,
                    detail.category,
                    detail.category_localized,
                    detail.rules_count,
                    detail.owner,
                    detail.url,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        log::debug!("saved {} skill details", details.len());
        Ok(())
    }

    pub fn get_detail(&self, name: &str) -> Result<Option<SkillDetail>> {
        let detail = self
            .conn
            .query_row(
                &format!("SELECT {DETAIL_COLUMNS} FROM skills_details WHERE name = ?1"),
                params![name],
                detail_from_row,
            )
            .optional()?;
        Ok(detail)
    }

    pub fn get_all_details(&self) -> Result<Enrichment> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {DETAIL_COLUMNS} FROM skills_details"))?;
        let details = stmt
            .query_map([], detail_from_row)?
            .map(|row| row.map(|detail| (detail.name.clone(), detail)))
            .collect::<rusqlite::Result<Enrichment>>()?;
        Ok(details)
    }

    /// History for `name` over the last `days` days, oldest first.
    pub fn get_history(&self, name: &str, days: u32) -> Result<Vec<HistoryPoint>> {
        self.get_history_as_of(name, days, utc_today())
    }

    pub fn get_history_as_of(
        &self,
        name: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<HistoryPoint>> {
        let cutoff = days_before(today, days);
        let mut stmt = self.conn.prepare_cached(
            "
            SELECT skill_name, date, rank, installs
            FROM skills_history
            WHERE skill_name = ?1 AND date > ?2
            ORDER BY date ASC
            ",
        )?;
        let points = stmt
            .query_map(params![name, cutoff], |row| {
                Ok(HistoryPoint {
                    name: row.get(0)?,
                    date: row.get(1)?,
                    rank: row.get(2)?,
                    installs: installs_from_row(row, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    /// Delete snapshot and history rows older than the retention window.
    /// Returns the number of rows removed across both tables.
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        self.cleanup_as_of(retention_days, utc_today())
    }

    pub fn cleanup_as_of(&self, retention_days: u32, today: NaiveDate) -> Result<usize> {
        let cutoff = days_before(today, retention_days);

        let tx = self.conn.unchecked_transaction()?;
        let deleted_daily = tx.execute("DELETE FROM skills_daily WHERE date <= ?1", params![cutoff])?;
        let deleted_history =
            tx.execute("DELETE FROM skills_history WHERE date <= ?1", params![cutoff])?;
        tx.commit()?;

        let total = deleted_daily + deleted_history;
        if total > 0 {
            log::info!("removed {total} rows dated on or before {cutoff}");
        }
        Ok(total)
    }

    /// Distinct stored dates, newest first.
    pub fn get_available_dates(&self, limit: usize) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT date FROM skills_daily ORDER BY date DESC LIMIT ?1",
        )?;
        let dates = stmt
            .query_map(params![limit as i64], |row| row.get::<_, NaiveDate>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(dates)
    }

    /// Per-category counts of the board on `date`. Skills without cached
    /// details are grouped under an empty category.
    pub fn get_category_stats(&self, date: NaiveDate) -> Result<Vec<CategoryCount>> {
        let mut stmt = self.conn.prepare_cached(
            "
            SELECT COALESCE(d.category, '') AS category,
                   COALESCE(d.category_localized, '') AS category_localized,
                   COUNT(*) AS count
            FROM skills_daily s
            LEFT JOIN skills_details d ON s.name = d.name
            WHERE s.date = ?1
            GROUP BY 1, 2
            ORDER BY count DESC, category ASC
            ",
        )?;
        let stats = stmt
            .query_map(params![date], |row| {
                Ok(CategoryCount {
                    category: row.get(0)?,
                    category_localized: row.get(1)?,
                    count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    /// Biggest stored rank movers for `date`, in both directions.
    pub fn get_top_movers(&self, date: NaiveDate, limit: usize) -> Result<StoredMovers> {
        let rising = self.query_movers(
            "s.rank_delta > 0 ORDER BY s.rank_delta DESC, s.rank ASC",
            date,
            limit,
        )?;
        let falling = self.query_movers(
            "s.rank_delta < 0 ORDER BY s.rank_delta ASC, s.rank ASC",
            date,
            limit,
        )?;
        Ok(StoredMovers { rising, falling })
    }

    fn query_movers(&self, filter: &str, date: NaiveDate, limit: usize) -> Result<Vec<StoredMover>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "
            SELECT s.name, s.rank, s.rank_delta,
                   COALESCE(d.summary, ''), COALESCE(d.category, '')
            FROM skills_daily s
            LEFT JOIN skills_details d ON s.name = d.name
            WHERE s.date = ?1 AND {filter}
            LIMIT ?2
            "
        ))?;
        let movers = stmt
            .query_map(params![date, limit as i64], |row| {
                Ok(StoredMover {
                    name: row.get(0)?,
                    rank: row.get(1)?,
                    rank_delta: row.get(2)?,
                    summary: row.get(3)?,
                    category: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(movers)
    }
}

fn validate_snapshots(date: NaiveDate, items: &[Snapshot]) -> std::result::Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        if item.rank == 0 {
            return Err(ValidationError::InvalidRank {
                name: item.name.clone(),
                rank: item.rank,
            });
        }
        if item.date != date {
            return Err(ValidationError::InvalidDate {
                value: item.date.to_string(),
            });
        }
        installs_to_sql(&item.name, item.installs)?;
        if !seen.insert(item.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: item.name.clone(),
            });
        }
    }
    Ok(())
}

/// SQLite integers are signed; counts above `i64::MAX` are rejected.
fn installs_to_sql(name: &str, installs: u64) -> std::result::Result<i64, ValidationError> {
    i64::try_from(installs).map_err(|_| ValidationError::InstallsOutOfRange {
        name: name.to_string(),
        installs,
    })
}

fn installs_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn validate_details(details: &[SkillDetail]) -> std::result::Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(details.len());
    for detail in details {
        if detail.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        if !seen.insert(detail.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: detail.name.clone(),
            });
        }
    }
    Ok(())
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        date: row.get(0)?,
        rank: row.get(1)?,
        name: row.get(2)?,
        owner: row.get(3)?,
        installs: installs_from_row(row, 4)?,
        installs_delta: row.get(5)?,
        installs_rate: row.get(6)?,
        rank_delta: row.get(7)?,
        url: row.get(8)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<SkillDetail> {
    let solves_str: String = row.get(4)?;
    let solves: Vec<String> = serde_json::from_str(&solves_str).unwrap_or_default();
    Ok(SkillDetail {
        name: row.get(0)?,
        summary: row.get(1)?,
        description: row.get(2)?,
        use_case: row.get(3)?,
        solves,
        category: row.get(5)?,
        category_localized: row.get(6)?,
        rules_count: row.get(7)?,
        owner: row.get(8)?,
        url: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
