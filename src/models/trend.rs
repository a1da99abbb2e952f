use crate::models::detail::SkillDetail;
use crate::models::snapshot::Snapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Full decoration attached to the top of the board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub summary: String,
    pub description: String,
    pub use_case: String,
    pub solves: Vec<String>,
    pub category: String,
    pub category_localized: String,
}

impl Decoration {
    pub fn from_detail(detail: Option<&SkillDetail>) -> Self {
        match detail {
            Some(d) => Self {
                summary: d.summary.clone(),
                description: d.description.clone(),
                use_case: d.use_case.clone(),
                solves: d.solves.clone(),
                category: d.category.clone(),
                category_localized: d.category_localized.clone(),
            },
            None => Self::default(),
        }
    }
}

/// Partial decoration used by the mover/entry views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub summary: String,
    pub category_localized: String,
}

impl Brief {
    pub fn from_detail(detail: Option<&SkillDetail>) -> Self {
        detail
            .map(|d| Self {
                summary: d.summary.clone(),
                category_localized: d.category_localized.clone(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSkill {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(flatten)]
    pub decoration: Decoration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedSkill {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(flatten)]
    pub brief: Brief,
}

/// A skill present yesterday but missing from today's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedSkill {
    pub name: String,
    pub yesterday_rank: u32,
    pub installs: u64,
    pub url: String,
    #[serde(flatten)]
    pub brief: Option<Brief>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub date: NaiveDate,
    pub top20: Vec<RankedSkill>,
    pub rising_top5: Vec<MovedSkill>,
    pub falling_top5: Vec<MovedSkill>,
    pub new_entries: Vec<MovedSkill>,
    pub dropped_entries: Vec<DroppedSkill>,
    pub surging: Vec<MovedSkill>,
}

impl TrendResult {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            top20: Vec::new(),
            rising_top5: Vec::new(),
            falling_top5: Vec::new(),
            new_entries: Vec::new(),
            dropped_entries: Vec::new(),
            surging: Vec::new(),
        }
    }

    pub fn summary(&self) -> TrendSummary {
        TrendSummary {
            date: self.date,
            top: self.top20.len(),
            rising: self.rising_top5.len(),
            falling: self.falling_top5.len(),
            new_entries: self.new_entries.len(),
            dropped: self.dropped_entries.len(),
            surging: self.surging.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub date: NaiveDate,
    pub top: usize,
    pub rising: usize,
    pub falling: usize,
    pub new_entries: usize,
    pub dropped: usize,
    pub surging: usize,
}
