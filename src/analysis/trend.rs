use crate::commands::db::SnapshotStore;
use crate::error::Result;
use crate::models::detail::Enrichment;
use crate::models::snapshot::{RawEntry, Snapshot};
use crate::models::trend::{Brief, Decoration, DroppedSkill, MovedSkill, RankedSkill, TrendResult};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub const TOP_BOARD_SIZE: usize = 20;
pub const MOVERS_LIMIT: usize = 5;

/// Rates at or above this fraction count as surging unless configured otherwise.
pub const DEFAULT_SURGE_THRESHOLD: f64 = 0.30;

const RATE_TOLERANCE: f64 = 1e-9;

/// Yesterday's board keyed by skill name.
pub type YesterdayLookup = HashMap<String, Snapshot>;

pub struct TrendAnalyzer<'a> {
    store: &'a SnapshotStore,
    surge_threshold: f64,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(store: &'a SnapshotStore, surge_threshold: f64) -> Self {
        Self {
            store,
            surge_threshold,
        }
    }

    /// Diff today's scrape against the stored previous day, persist the
    /// annotated board and derive every trend view.
    ///
    /// `enrichment` overrides cached details for the same name; anything
    /// missing from both is left undecorated.
    pub fn compute_trends(
        &self,
        today_items: &[RawEntry],
        date: NaiveDate,
        enrichment: &Enrichment,
    ) -> Result<TrendResult> {
        let yesterday = self.store.get_yesterday(date)?;
        if yesterday.is_empty() {
            log::info!("no snapshot for the day before {date}; every skill counts as new");
        }
        let lookup = build_lookup(yesterday);

        let annotated = annotate(today_items, &lookup, date);
        self.store.save_today(date, &annotated)?;

        let mut details = self.store.get_all_details()?;
        details.extend(enrichment.iter().map(|(name, detail)| (name.clone(), detail.clone())));

        let result = derive_views(&annotated, &lookup, date, &details, self.surge_threshold);
        log::debug!("trend views for {date}: {:?}", result.summary());
        Ok(result)
    }
}

pub fn build_lookup(yesterday: Vec<Snapshot>) -> YesterdayLookup {
    yesterday
        .into_iter()
        .map(|snapshot| (snapshot.name.clone(), snapshot))
        .collect()
}

/// Attach rank/install deltas against yesterday to each of today's entries.
pub fn annotate(today: &[RawEntry], yesterday: &YesterdayLookup, date: NaiveDate) -> Vec<Snapshot> {
    today
        .iter()
        .map(|entry| {
            let mut snapshot = Snapshot::unannotated(date, entry);
            if let Some(previous) = yesterday.get(&entry.name) {
                snapshot.rank_delta = i64::from(previous.rank) - i64::from(entry.rank);
                snapshot.installs_delta = entry.installs as i64 - previous.installs as i64;
                snapshot.installs_rate = growth_rate(snapshot.installs_delta, previous.installs);
            }
            snapshot
        })
        .collect()
}

/// `delta / base` rounded to 4 decimals; zero when there is no base.
pub fn growth_rate(delta: i64, base: u64) -> f64 {
    if base == 0 {
        return 0.0;
    }
    round4(delta as f64 / base as f64)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn derive_views(
    annotated: &[Snapshot],
    yesterday: &YesterdayLookup,
    date: NaiveDate,
    details: &Enrichment,
    surge_threshold: f64,
) -> TrendResult {
    let brief = |snapshot: &Snapshot| MovedSkill {
        snapshot: snapshot.clone(),
        brief: Brief::from_detail(details.get(&snapshot.name)),
    };

    TrendResult {
        date,
        top20: top_board(annotated)
            .map(|snapshot| RankedSkill {
                snapshot: snapshot.clone(),
                decoration: Decoration::from_detail(details.get(&snapshot.name)),
            })
            .collect(),
        rising_top5: rising(annotated).map(brief).collect(),
        falling_top5: falling(annotated).map(brief).collect(),
        new_entries: new_entries(annotated, yesterday).map(brief).collect(),
        dropped_entries: dropped_entries(annotated, yesterday)
            .map(|previous| DroppedSkill {
                name: previous.name.clone(),
                yesterday_rank: previous.rank,
                installs: previous.installs,
                url: previous.url.clone(),
                brief: details.get(&previous.name).map(|d| Brief::from_detail(Some(d))),
            })
            .collect(),
        surging: surging(annotated, surge_threshold).map(brief).collect(),
    }
}

fn by_rank(annotated: &[Snapshot]) -> Vec<&Snapshot> {
    let mut ordered: Vec<&Snapshot> = annotated.iter().collect();
    ordered.sort_by_key(|s| s.rank);
    ordered
}

pub fn top_board(annotated: &[Snapshot]) -> impl Iterator<Item = &Snapshot> {
    by_rank(annotated).into_iter().take(TOP_BOARD_SIZE)
}

pub fn rising(annotated: &[Snapshot]) -> impl Iterator<Item = &Snapshot> {
    movers(annotated, |s| s.rank_delta > 0, |a, b| b.rank_delta.cmp(&a.rank_delta))
}

pub fn falling(annotated: &[Snapshot]) -> impl Iterator<Item = &Snapshot> {
    movers(annotated, |s| s.rank_delta < 0, |a, b| a.rank_delta.cmp(&b.rank_delta))
}

fn movers<F, C>(annotated: &[Snapshot], keep: F, order: C) -> impl Iterator<Item = &Snapshot>
where
    F: Fn(&Snapshot) -> bool,
    C: Fn(&Snapshot, &Snapshot) -> Ordering,
{
    let mut selected: Vec<&Snapshot> = annotated.iter().filter(|s| keep(*s)).collect();
    selected.sort_by(|a, b| order(*a, *b).then(a.rank.cmp(&b.rank)));
    selected.into_iter().take(MOVERS_LIMIT)
}

pub fn new_entries<'a>(
    annotated: &'a [Snapshot],
    yesterday: &'a YesterdayLookup,
) -> impl Iterator<Item = &'a Snapshot> {
    by_rank(annotated)
        .into_iter()
        .filter(move |s| !yesterday.contains_key(&s.name))
}

/// Yesterday's skills missing today, by yesterday's rank.
pub fn dropped_entries<'a>(
    annotated: &[Snapshot],
    yesterday: &'a YesterdayLookup,
) -> impl Iterator<Item = &'a Snapshot> {
    let today: HashSet<&str> = annotated.iter().map(|s| s.name.as_str()).collect();
    let mut dropped: Vec<&Snapshot> = yesterday
        .values()
        .filter(|s| !today.contains(s.name.as_str()))
        .collect();
    dropped.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
    dropped.into_iter()
}

pub fn surging(annotated: &[Snapshot], threshold: f64) -> impl Iterator<Item = &Snapshot> {
    by_rank(annotated)
        .into_iter()
        .filter(move |s| s.installs_rate + RATE_TOLERANCE >= threshold)
}
