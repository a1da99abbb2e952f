//! Seams to the collaborators around the core: the leaderboard scraper, the
//! enrichment service and the notification transports.
//!
//! Only file-backed implementations live here; network and AI backed ones
//! plug in through the same traits.

use crate::error::{Error, Result, ValidationError};
use crate::models::detail::{Enrichment, SkillDetail};
use crate::models::snapshot::RawEntry;
use crate::models::trend::TrendResult;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Produces today's ranked leaderboard.
pub trait Scraper {
    fn fetch(&self) -> Result<Vec<RawEntry>>;
}

/// Produces descriptive metadata for a list of candidates. Skills it cannot
/// describe are left out of the returned map.
pub trait Enricher {
    fn enrich(&self, candidates: &[RawEntry]) -> Result<Enrichment>;
}

/// Delivers a computed trend result.
pub trait Notifier {
    fn notify(&self, trends: &TrendResult, date: NaiveDate) -> Result<()>;
}

/// Ranks must start at 1 and names must be unique.
pub fn validate_scrape(entries: &[RawEntry]) -> std::result::Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        if entry.rank == 0 {
            return Err(ValidationError::InvalidRank {
                name: entry.name.clone(),
                rank: entry.rank,
            });
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: entry.name.clone(),
            });
        }
    }
    Ok(())
}

/// Reads a JSON array of `{rank, name, owner, installs, url}`.
pub struct JsonFileScraper {
    path: PathBuf,
}

impl JsonFileScraper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Scraper for JsonFileScraper {
    fn fetch(&self) -> Result<Vec<RawEntry>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut entries: Vec<RawEntry> = serde_json::from_str(&raw)?;
        validate_scrape(&entries)?;
        entries.sort_by_key(|entry| entry.rank);
        Ok(entries)
    }
}

/// Reads a JSON object mapping skill name to detail fields and answers only
/// for the requested candidates.
pub struct JsonFileEnricher {
    path: PathBuf,
}

impl JsonFileEnricher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Enricher for JsonFileEnricher {
    fn enrich(&self, candidates: &[RawEntry]) -> Result<Enrichment> {
        let raw = fs::read_to_string(&self.path)?;
        let mut available: HashMap<String, SkillDetail> = serde_json::from_str(&raw)?;

        let mut enrichment = Enrichment::new();
        for candidate in candidates {
            let Some(mut detail) = available.remove(&candidate.name) else {
                continue;
            };
            detail.name = candidate.name.clone();
            if detail.owner.is_empty() {
                detail.owner = candidate.owner.clone();
            }
            if detail.url.is_empty() {
                detail.url = candidate.url.clone();
            }
            enrichment.insert(candidate.name.clone(), detail);
        }
        Ok(enrichment)
    }
}

/// Stands in when no enrichment source is configured.
pub struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn enrich(&self, _candidates: &[RawEntry]) -> Result<Enrichment> {
        Ok(Enrichment::new())
    }
}

/// Writes the full trend result as pretty JSON.
pub struct JsonFileNotifier {
    path: PathBuf,
}

impl JsonFileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Notifier for JsonFileNotifier {
    fn notify(&self, trends: &TrendResult, date: NaiveDate) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(trends)?;
        fs::write(&self.path, raw)
            .map_err(|e| Error::Collaborator(format!("writing report for {date}: {e}")))?;
        log::info!("trend report for {date} written to {}", self.path.display());
        Ok(())
    }
}

/// Logs the per-view counts only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, trends: &TrendResult, date: NaiveDate) -> Result<()> {
        let s = trends.summary();
        log::info!(
            "{date}: top {} | rising {} | falling {} | new {} | dropped {} | surging {}",
            s.top,
            s.rising,
            s.falling,
            s.new_entries,
            s.dropped,
            s.surging
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: u32, name: &str) -> RawEntry {
        RawEntry {
            rank,
            name: name.to_string(),
            owner: "acme".to_string(),
            installs: 1,
            url: format!("https://skills.example/{name}"),
        }
    }

    #[test]
    fn scrape_validation_rejects_bad_ranks_and_duplicates() {
        assert!(validate_scrape(&[entry(1, "a"), entry(2, "b")]).is_ok());
        assert!(matches!(
            validate_scrape(&[entry(0, "a")]),
            Err(ValidationError::InvalidRank { .. })
        ));
        assert!(matches!(
            validate_scrape(&[entry(1, "a"), entry(2, "a")]),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn file_scraper_sorts_by_rank() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("board.json");
        fs::write(
            &path,
            r#"[{"rank": 2, "name": "b", "installs": 5}, {"rank": 1, "name": "a", "owner": "o", "installs": 9, "url": "u"}]"#,
        )
        .expect("write board");

        let entries = JsonFileScraper::new(&path).fetch().expect("fetch");
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[1].owner, "");
    }

    #[test]
    fn file_enricher_answers_only_for_candidates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("details.json");
        fs::write(
            &path,
            r#"{"a": {"summary": "A", "solves": ["x"]}, "z": {"summary": "Z"}}"#,
        )
        .expect("write details");

        let enrichment = JsonFileEnricher::new(&path)
            .enrich(&[entry(1, "a"), entry(2, "b")])
            .expect("enrich");

        assert_eq!(enrichment.len(), 1);
        let detail = &enrichment["a"];
        assert_eq!(detail.name, "a");
        assert_eq!(detail.owner, "acme");
        assert_eq!(detail.solves, vec!["x"]);
    }
}
