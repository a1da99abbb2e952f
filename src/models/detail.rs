use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Enrichment metadata cached per skill, independent of date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillDetail {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub use_case: String,
    pub solves: Vec<String>,
    pub category: String,
    pub category_localized: String,
    pub rules_count: Option<u32>,
    pub owner: String,
    pub url: String,
    pub updated_at: i64, // unix seconds, stamped by the store
}

/// Enrichment keyed by skill name. Names not present are simply undecorated.
pub type Enrichment = HashMap<String, SkillDetail>;
