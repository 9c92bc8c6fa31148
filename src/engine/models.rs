//! Core launcher data types shared by games, the registry and the score board.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub type GameId = String;

/// Outcome of one game session, e.g. `{category: "Rondas", subject_name: "ana", value: 7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub category: String,
    pub subject_name: String,
    #[serde(default)]
    pub value: i64,
}

impl ResultRecord {
    pub fn new(category: impl Into<String>, subject_name: impl Into<String>, value: i64) -> Self {
        Self {
            category: category.into(),
            subject_name: subject_name.into(),
            value,
        }
    }
}

/// Which direction of `ResultRecord::value` counts as the better score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

impl Ranking {
    /// Ordering that places the better record first.
    pub fn compare(self, a: &ResultRecord, b: &ResultRecord) -> Ordering {
        match self {
            Ranking::HigherIsBetter => b.value.cmp(&a.value),
            Ranking::LowerIsBetter => a.value.cmp(&b.value),
        }
    }
}

/// Catalog row returned by `GameRegistry::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: GameId,
    pub display_name: String,
    pub external: bool,
}
