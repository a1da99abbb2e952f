use crate::analysis::candidates::select_candidates;
use crate::analysis::trend::TrendAnalyzer;
use crate::commands::db::SnapshotStore;
use crate::commands::settings::EffectiveSettings;
use crate::commands::sources::{Enricher, Notifier, Scraper};
use crate::error::Result;
use crate::models::detail::{Enrichment, SkillDetail};
use crate::models::snapshot::RawEntry;
use crate::models::trend::TrendResult;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Scrape,
    SelectCandidates,
    Enrich,
    SaveDetails,
    Analyze,
    Notify,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed { rows: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub scraped: usize,
    pub candidates: usize,
    pub enriched: usize,
    pub trends: TrendResult,
    pub cleanup: CleanupOutcome,
}

impl CycleReport {
    /// False when the cycle finished but retention cleanup did not.
    pub fn is_clean(&self) -> bool {
        matches!(self.cleanup, CleanupOutcome::Removed { .. })
    }
}

/// Run one full daily cycle against `store`.
///
/// Scraper, store and notifier failures abort the cycle. A failing enricher
/// only costs decoration, and a failing cleanup is reported on the returned
/// report instead of as an error.
pub fn run_cycle<F>(
    store: &SnapshotStore,
    settings: &EffectiveSettings,
    scraper: &dyn Scraper,
    enricher: &dyn Enricher,
    notifier: &dyn Notifier,
    today: NaiveDate,
    mut on_stage: F,
) -> Result<CycleReport>
where
    F: FnMut(CycleStage),
{
    on_stage(CycleStage::Scrape);
    let today_items = scraper.fetch()?;
    if today_items.is_empty() {
        log::warn!("scraper returned an empty leaderboard for {today}");
    }

    on_stage(CycleStage::SelectCandidates);
    let candidates = select_candidates(store, &today_items, today, settings.top_n_details)?;

    on_stage(CycleStage::Enrich);
    let enrichment = if candidates.is_empty() {
        Enrichment::new()
    } else {
        match enricher.enrich(&candidates) {
            Ok(enrichment) => enrichment,
            Err(e) => {
                log::warn!("enrichment failed, continuing undecorated: {e}");
                Enrichment::new()
            }
        }
    };

    on_stage(CycleStage::SaveDetails);
    let details = candidate_details(&candidates, &enrichment);
    store.save_details(&details)?;

    on_stage(CycleStage::Analyze);
    let analyzer = TrendAnalyzer::new(store, settings.surge_threshold);
    let trends = analyzer.compute_trends(&today_items, today, &enrichment)?;

    on_stage(CycleStage::Notify);
    notifier.notify(&trends, today)?;

    on_stage(CycleStage::Cleanup);
    let cleanup = match store.cleanup_as_of(settings.retention_days, today) {
        Ok(rows) => CleanupOutcome::Removed { rows },
        Err(e) => {
            log::warn!("retention cleanup failed: {e}");
            CleanupOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    Ok(CycleReport {
        date: today,
        scraped: today_items.len(),
        candidates: candidates.len(),
        enriched: details.len(),
        trends,
        cleanup,
    })
}

/// Enrichment rows for the selected candidates, in candidate order.
fn candidate_details(
    candidates: &[RawEntry],
    enrichment: &Enrichment,
) -> Vec<SkillDetail> {
    candidates
        .iter()
        .filter_map(|candidate| {
            enrichment.get(&candidate.name).map(|detail| SkillDetail {
                name: candidate.name.clone(),
                ..detail.clone()
            })
        })
        .collect()
}
