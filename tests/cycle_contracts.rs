use chrono::NaiveDate;
use serde_json::json;
use skillpulse_lib::commands::cycle::{run_cycle, CleanupOutcome, CycleStage};
use skillpulse_lib::commands::db::{parse_date, SnapshotStore};
use skillpulse_lib::commands::settings::{load_effective_settings, save_settings_to_disk, EffectiveSettings};
use skillpulse_lib::commands::sources::{
    Enricher, JsonFileEnricher, JsonFileNotifier, JsonFileScraper, LogNotifier, Notifier, Scraper,
};
use skillpulse_lib::error::{Error, Result};
use skillpulse_lib::models::detail::Enrichment;
use skillpulse_lib::models::snapshot::RawEntry;
use skillpulse_lib::models::trend::TrendResult;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Collects every notified result for assertions.
#[derive(Default)]
struct RecordingNotifier {
    results: RefCell<Vec<TrendResult>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, trends: &TrendResult, _date: NaiveDate) -> Result<()> {
        self.results.borrow_mut().push(trends.clone());
        Ok(())
    }
}

/// Drops the history table from a second connection once notified, so the
/// cleanup step that follows cannot complete.
struct HistoryDroppingNotifier {
    db_path: PathBuf,
}

impl Notifier for HistoryDroppingNotifier {
    fn notify(&self, _trends: &TrendResult, _date: NaiveDate) -> Result<()> {
        let conn = rusqlite::Connection::open(&self.db_path)?;
        conn.execute_batch("DROP TABLE skills_history;")?;
        Ok(())
    }
}

struct FailingEnricher;

impl Enricher for FailingEnricher {
    fn enrich(&self, _candidates: &[RawEntry]) -> Result<Enrichment> {
        Err(Error::Collaborator("rate limited".to_string()))
    }
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _trends: &TrendResult, _date: NaiveDate) -> Result<()> {
        Err(Error::Collaborator("transport down".to_string()))
    }
}

struct FixedScraper(Vec<RawEntry>);

impl Scraper for FixedScraper {
    fn fetch(&self) -> Result<Vec<RawEntry>> {
        Ok(self.0.clone())
    }
}

fn day(value: &str) -> NaiveDate {
    parse_date(value).expect("valid date")
}

fn write_json(dir: &Path, file: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, serde_json::to_string_pretty(&value).expect("encode")).expect("write json");
    path
}

fn create_workspace() -> (TempDir, EffectiveSettings, SnapshotStore) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let settings_path = temp_dir.path().join("settings.json");
    save_settings_to_disk(
        &settings_path,
        json!({
            "dbPath": temp_dir.path().join("db").join("skills.db").to_string_lossy(),
            "reportPath": temp_dir.path().join("out").join("trends.json").to_string_lossy(),
            "retentionDays": 7,
            "topNDetails": 2
        }),
    )
    .expect("save settings");

    let settings = load_effective_settings(&settings_path).expect("load settings");
    let store = SnapshotStore::open(&settings.db_path).expect("open store");
    (temp_dir, settings, store)
}

fn board(entries: &[(&str, u64)]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = entries
        .iter()
        .enumerate()
        .map(|(i, (name, installs))| {
            json!({
                "rank": i + 1,
                "name": name,
                "owner": "acme/skills",
                "installs": installs,
                "url": format!("https://skills.example/acme/{name}")
            })
        })
        .collect();
    json!(rows)
}

#[test]
fn settings_file_is_created_with_defaults_and_overrides() {
    let (tmp, settings, _store) = create_workspace();

    assert_eq!(settings.retention_days, 7);
    assert_eq!(settings.top_n_details, 2);
    assert!((settings.surge_threshold - 0.30).abs() < 1e-9);
    assert!(settings.db_path.exists());

    let raw = fs::read_to_string(tmp.path().join("settings.json")).expect("read settings");
    let saved: serde_json::Value = serde_json::from_str(&raw).expect("parse settings");
    assert_eq!(saved["notifyChannel"], json!("log"));
    assert_eq!(saved["schema_version"], json!(1));
}

#[test]
fn full_cycle_persists_details_trends_and_report() {
    let (tmp, settings, store) = create_workspace();
    let yesterday_board = write_json(tmp.path(), "d1.json", board(&[("a", 100), ("b", 80), ("c", 60)]));
    let today_board = write_json(tmp.path(), "d2.json", board(&[("b", 120), ("a", 110), ("d", 10)]));
    let details = write_json(
        tmp.path(),
        "details.json",
        json!({
            "a": { "summary": "Alpha", "category": "dev", "category_localized": "Development", "solves": ["x"] },
            "b": { "summary": "Beta", "category": "ops", "category_localized": "Operations" },
            "d": { "summary": "Delta" }
        }),
    );

    run_cycle(
        &store,
        &settings,
        &JsonFileScraper::new(&yesterday_board),
        &JsonFileEnricher::new(&details),
        &LogNotifier,
        day("2026-01-22"),
        |_| {},
    )
    .expect("first cycle");

    let notifier = JsonFileNotifier::new(settings.report_path.clone());
    let mut stages = Vec::new();
    let report = run_cycle(
        &store,
        &settings,
        &JsonFileScraper::new(&today_board),
        &JsonFileEnricher::new(&details),
        &notifier,
        day("2026-01-23"),
        |stage| stages.push(stage),
    )
    .expect("second cycle");

    assert_eq!(
        stages,
        vec![
            CycleStage::Scrape,
            CycleStage::SelectCandidates,
            CycleStage::Enrich,
            CycleStage::SaveDetails,
            CycleStage::Analyze,
            CycleStage::Notify,
            CycleStage::Cleanup,
        ]
    );
    assert_eq!(report.scraped, 3);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.enriched, 2);
    assert!(report.is_clean());

    let trends = &report.trends;
    assert_eq!(trends.rising_top5[0].snapshot.name, "b");
    assert_eq!(trends.rising_top5[0].brief.summary, "Beta");
    assert_eq!(trends.falling_top5[0].snapshot.name, "a");
    assert_eq!(trends.new_entries[0].snapshot.name, "d");
    assert_eq!(trends.dropped_entries[0].name, "c");
    // "d" was never a candidate, so it stays undecorated.
    assert_eq!(trends.new_entries[0].brief.summary, "");
    assert_eq!(trends.top20[1].decoration.solves, vec!["x"]);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(notifier.path()).expect("read report")).expect("parse report");
    assert_eq!(written["date"], json!("2026-01-23"));
    assert_eq!(written["dropped_entries"][0]["yesterday_rank"], json!(3));

    assert!(store.get_detail("d").expect("load detail").is_none());
    assert_eq!(
        store.get_detail("b").expect("load detail").expect("b cached").category,
        "ops"
    );
}

#[test]
fn enrichment_failure_degrades_to_undecorated_trends() {
    let (_tmp, settings, store) = create_workspace();
    let scraper = FixedScraper(vec![RawEntry {
        rank: 1,
        name: "a".to_string(),
        owner: "acme".to_string(),
        installs: 5,
        url: String::new(),
    }]);
    let notifier = RecordingNotifier::default();

    let report = run_cycle(
        &store,
        &settings,
        &scraper,
        &FailingEnricher,
        &notifier,
        day("2026-01-23"),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(report.enriched, 0);
    assert_eq!(report.trends.top20[0].decoration.summary, "");
    assert_eq!(notifier.results.borrow().len(), 1);
}

#[test]
fn notifier_failure_aborts_the_cycle_after_saving() {
    let (_tmp, settings, store) = create_workspace();
    let scraper = FixedScraper(vec![RawEntry {
        rank: 1,
        name: "a".to_string(),
        owner: "acme".to_string(),
        installs: 5,
        url: String::new(),
    }]);

    let err = run_cycle(
        &store,
        &settings,
        &scraper,
        &FailingEnricher,
        &FailingNotifier,
        day("2026-01-23"),
        |_| {},
    )
    .expect_err("notifier failure surfaces");

    assert!(matches!(err, Error::Collaborator(_)));
    assert_eq!(store.get_by_date(day("2026-01-23")).expect("load").len(), 1);
}

#[test]
fn empty_scrape_completes_with_empty_result() {
    let (_tmp, settings, store) = create_workspace();
    let notifier = RecordingNotifier::default();

    let report = run_cycle(
        &store,
        &settings,
        &FixedScraper(Vec::new()),
        &FailingEnricher,
        &notifier,
        day("2026-01-23"),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(report.trends, TrendResult::empty(day("2026-01-23")));
    assert_eq!(report.cleanup, CleanupOutcome::Removed { rows: 0 });
}

#[test]
fn cycle_applies_retention_relative_to_cycle_date() {
    let (tmp, settings, store) = create_workspace();
    let old_board = write_json(tmp.path(), "old.json", board(&[("a", 1)]));
    let new_board = write_json(tmp.path(), "new.json", board(&[("a", 2)]));

    for date in ["2026-01-01", "2026-01-16"] {
        run_cycle(
            &store,
            &settings,
            &JsonFileScraper::new(&old_board),
            &FailingEnricher,
            &LogNotifier,
            day(date),
            |_| {},
        )
        .expect("seed cycle");
    }

    let report = run_cycle(
        &store,
        &settings,
        &JsonFileScraper::new(&new_board),
        &FailingEnricher,
        &LogNotifier,
        day("2026-01-20"),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(report.cleanup, CleanupOutcome::Removed { rows: 0 });
    assert_eq!(
        store.get_available_dates(10).expect("dates"),
        vec![day("2026-01-20"), day("2026-01-16")]
    );
}

#[test]
fn cleanup_failure_is_reported_without_failing_the_cycle() {
    let (tmp, settings, store) = create_workspace();
    let today_board = write_json(tmp.path(), "d1.json", board(&[("a", 10), ("b", 5)]));
    let notifier = HistoryDroppingNotifier {
        db_path: settings.db_path.clone(),
    };

    let report = run_cycle(
        &store,
        &settings,
        &JsonFileScraper::new(&today_board),
        &FailingEnricher,
        &notifier,
        day("2026-01-23"),
        |_| {},
    )
    .expect("cleanup failure does not abort the cycle");

    assert!(matches!(report.cleanup, CleanupOutcome::Failed { .. }));
    assert!(!report.is_clean());
    assert_eq!(report.trends.top20.len(), 2);
    assert_eq!(store.get_by_date(day("2026-01-23")).expect("load").len(), 2);
}

#[test]
fn malformed_scrape_is_a_validation_error() {
    let (tmp, settings, store) = create_workspace();
    let bad_board = write_json(
        tmp.path(),
        "bad.json",
        json!([{ "rank": 1, "name": "a" }, { "rank": 2, "name": "a" }]),
    );

    let err = run_cycle(
        &store,
        &settings,
        &JsonFileScraper::new(&bad_board),
        &FailingEnricher,
        &LogNotifier,
        day("2026-01-23"),
        |_| {},
    )
    .expect_err("duplicate names");

    assert!(matches!(err, Error::Validation(_)));
    assert!(store.get_latest_date().expect("latest").is_none());
}
