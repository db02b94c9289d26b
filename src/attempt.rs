use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::util::percent;

/// Millisecond creation timestamp; unique and ordered by creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub i64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AttemptId)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTally {
    pub total: u32,
    pub wrong: u32,
}

impl TopicTally {
    pub fn correct(&self) -> u32 {
        self.total.saturating_sub(self.wrong)
    }

    /// Share of correct answers in this topic, `None` for an empty tally
    pub fn accuracy(&self) -> Option<u8> {
        (self.total > 0).then(|| percent(self.correct(), self.total))
    }
}

/// Per-topic tallies, iterated in topic name order
pub type Breakdown = BTreeMap<String, TopicTally>;

/// Scored record of one finished exam. Never mutated after creation.
///
/// Field names on disk use the short attempt keys
/// (`correct`, `total`, `score`, `date`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    pub test_id: u32,
    #[serde(rename = "correct")]
    pub correct_count: u32,
    #[serde(rename = "total")]
    pub total_count: u32,
    #[serde(rename = "score")]
    pub score_percent: u8,
    #[serde(rename = "date")]
    pub timestamp_iso: String,
    #[serde(default)]
    pub breakdown: Breakdown,
}
