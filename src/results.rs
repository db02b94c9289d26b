use chrono::{DateTime, Local};
use itertools::Itertools;

use crate::attempt::{Attempt, AttemptId};
use crate::store::AttemptStore;
use crate::util::{mean, std_dev};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAccuracy {
    pub topic: String,
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: AttemptId,
    pub test_id: u32,
    pub score_percent: u8,
    pub local_time: String,
}

/// Score statistics across every attempt of one test
#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub test_id: u32,
    pub attempts: usize,
    pub mean_score: f64,
    pub std_dev: f64,
    /// Oldest first
    pub scores: Vec<u8>,
}

/// Everything the results screen shows for one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsReport {
    pub attempt: Attempt,
    pub topics: Vec<TopicAccuracy>,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    pub summary: TestSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView {
    NoAttempt,
    Report(ResultsReport),
}

impl ResultsView {
    /// Resolves `id` (or the last attempt) from the store and builds its report.
    pub fn build(store: &AttemptStore, id: Option<AttemptId>) -> Self {
        match store.resolve(id) {
            Some(attempt) => Self::Report(ResultsReport::new(attempt, store.load_history())),
            None => {
                log::debug!("no attempt found for {:?}", id);
                Self::NoAttempt
            }
        }
    }
}

impl ResultsReport {
    pub fn new(attempt: Attempt, history: Vec<Attempt>) -> Self {
        let topics = topic_accuracy(&attempt);
        let summary = summarize(attempt.test_id, &history);
        let history = history
            .iter()
            .sorted_by(|a, b| b.id.cmp(&a.id))
            .map(|a| HistoryEntry {
                id: a.id,
                test_id: a.test_id,
                score_percent: a.score_percent,
                local_time: local_time(&a.timestamp_iso),
            })
            .collect();

        Self {
            attempt,
            topics,
            history,
            summary,
        }
    }
}

/// Accuracy per topic in breakdown order. Empty tallies report 0%.
pub fn topic_accuracy(attempt: &Attempt) -> Vec<TopicAccuracy> {
    attempt
        .breakdown
        .iter()
        .map(|(topic, tally)| TopicAccuracy {
            topic: topic.clone(),
            correct: tally.correct(),
            total: tally.total,
            percent: tally.accuracy().unwrap_or(0),
        })
        .collect()
}

fn summarize(test_id: u32, history: &[Attempt]) -> TestSummary {
    let scores: Vec<u8> = history
        .iter()
        .filter(|a| a.test_id == test_id)
        .sorted_by_key(|a| a.id)
        .map(|a| a.score_percent)
        .collect();
    let as_f64: Vec<f64> = scores.iter().map(|&s| f64::from(s)).collect();

    TestSummary {
        test_id,
        attempts: scores.len(),
        mean_score: mean(&as_f64).unwrap_or(0.0),
        std_dev: std_dev(&as_f64).unwrap_or(0.0),
        scores,
    }
}

/// Renders an RFC 3339 timestamp in local time; unparseable input is shown as is.
pub fn local_time(timestamp_iso: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp_iso) {
        Ok(t) => t
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => timestamp_iso.to_string(),
    }
}
