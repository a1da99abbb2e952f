use crate::commands::db::SnapshotStore;
use crate::error::Result;
use crate::models::snapshot::RawEntry;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Pick which of today's skills should be sent for enrichment.
///
/// Normally the first `top_n`. When the top `top_n` names match the last
/// stored run exactly (same order), the skills just outside that window are
/// picked instead, provided there are at least `top_n` of them.
pub fn select_candidates(
    store: &SnapshotStore,
    today_items: &[RawEntry],
    today: NaiveDate,
    top_n: usize,
) -> Result<Vec<RawEntry>> {
    let default: Vec<RawEntry> = today_items.iter().take(top_n).cloned().collect();

    // A same-day rerun would always look identical to itself.
    let previous_top = match store.get_latest_date()? {
        Some(latest) if latest != today => store.get_top_n(latest, top_n)?,
        _ => return Ok(default),
    };

    Ok(choose(today_items, &previous_top, top_n).unwrap_or(default))
}

fn choose(today_items: &[RawEntry], previous_top: &[String], top_n: usize) -> Option<Vec<RawEntry>> {
    if previous_top.is_empty() {
        return None;
    }

    let unchanged = today_items
        .iter()
        .take(top_n)
        .map(|item| item.name.as_str())
        .eq(previous_top.iter().map(String::as_str));
    if !unchanged {
        return None;
    }

    log::info!("top {top_n} unchanged since last run; enriching skills outside it");
    let seen: HashSet<&str> = previous_top.iter().map(String::as_str).collect();
    let fresh: Vec<RawEntry> = today_items
        .iter()
        .filter(|item| !seen.contains(item.name.as_str()))
        .take(top_n)
        .cloned()
        .collect();

    if fresh.len() < top_n {
        log::info!(
            "only {} skills outside the previous top {top_n}; keeping the default selection",
            fresh.len()
        );
        return None;
    }
    Some(fresh)
}
