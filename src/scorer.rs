use chrono::{DateTime, SecondsFormat, Utc};

use crate::attempt::{Attempt, AttemptId, Breakdown};
use crate::bank::Test;
use crate::clock::Clock;
use crate::util::percent;

/// Identity and creation instant for a new attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStamp {
    pub id: AttemptId,
    pub created_at: DateTime<Utc>,
}

impl AttemptStamp {
    /// Stamps "now", bumping the id past `latest` if the clock has not moved beyond it.
    /// An id already at `i64::MAX` is reused rather than overflowing.
    pub fn issue(clock: &Clock, latest: Option<AttemptId>) -> Self {
        let created_at = clock.now();
        let mut id = created_at.timestamp_millis();
        if let Some(AttemptId(prev)) = latest {
            id = id.max(prev.saturating_add(1));
        }
        Self {
            id: AttemptId(id),
            created_at,
        }
    }
}

/// Scores `answers` against `test`. Unanswered slots count as wrong.
///
/// `test` must have at least one question.
pub fn score(test: &Test, answers: &[Option<usize>], stamp: AttemptStamp) -> Attempt {
    let mut correct_count = 0;
    let mut breakdown = Breakdown::new();

    for (i, question) in test.questions.iter().enumerate() {
        let is_correct = answers.get(i).copied().flatten() == Some(question.answer);
        if is_correct {
            correct_count += 1;
        }

        let tally = breakdown.entry(question.topic().to_string()).or_default();
        tally.total += 1;
        if !is_correct {
            tally.wrong += 1;
        }
    }

    let total_count = test.questions.len() as u32;

    Attempt {
        id: stamp.id,
        test_id: test.id,
        correct_count,
        total_count,
        score_percent: percent(correct_count, total_count),
        timestamp_iso: stamp
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Question;
    use chrono::TimeZone;

    fn question(answer: usize, topic: Option<&str>) -> Question {
        Question {
            question: format!("answer is {answer}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer,
            topic: topic.map(String::from),
        }
    }

    fn test_with(questions: Vec<Question>) -> Test {
        Test {
            id: 3,
            title: "t".into(),
            duration_minutes: 1,
            questions,
        }
    }

    fn stamp() -> AttemptStamp {
        AttemptStamp::issue(
            &Clock::fixed(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()),
            None,
        )
    }

    #[test]
    fn two_of_three_scores_67() {
        let test = test_with(vec![
            question(1, None),
            question(0, None),
            question(2, None),
        ]);
        let attempt = score(&test, &[Some(1), Some(2), Some(2)], stamp());
        assert_eq!(attempt.correct_count, 2);
        assert_eq!(attempt.total_count, 3);
        assert_eq!(attempt.score_percent, 67);
        assert_eq!(attempt.test_id, 3);
    }

    #[test]
    fn unanswered_counts_wrong() {
        let test = test_with(vec![question(0, None), question(1, None)]);
        let attempt = score(&test, &[None, None], stamp());
        assert_eq!(attempt.correct_count, 0);
        assert_eq!(attempt.score_percent, 0);
        assert_eq!(attempt.breakdown["Other"].wrong, 2);
    }

    #[test]
    fn all_correct_scores_100() {
        let test = test_with(vec![question(2, Some("A")), question(0, Some("B"))]);
        let attempt = score(&test, &[Some(2), Some(0)], stamp());
        assert_eq!(attempt.correct_count, 2);
        assert_eq!(attempt.score_percent, 100);
    }

    #[test]
    fn breakdown_totals_sum_to_total() {
        let test = test_with(vec![
            question(0, Some("Genetics")),
            question(1, Some("Genetics")),
            question(2, Some("Cells")),
            question(0, Some("")),
            question(1, None),
        ]);
        let attempt = score(&test, &[Some(0), Some(0), Some(2), None, Some(1)], stamp());

        let sum: u32 = attempt.breakdown.values().map(|t| t.total).sum();
        assert_eq!(sum, attempt.total_count);
        assert_eq!(attempt.breakdown.len(), 3);
        assert_eq!(attempt.breakdown["Genetics"].total, 2);
        assert_eq!(attempt.breakdown["Genetics"].wrong, 1);
        assert_eq!(attempt.breakdown["Cells"].wrong, 0);
        assert_eq!(attempt.breakdown["Other"].total, 2);
        assert_eq!(attempt.breakdown["Other"].wrong, 1);
        for tally in attempt.breakdown.values() {
            assert!(tally.wrong <= tally.total);
        }
    }

    #[test]
    fn deterministic_for_same_stamp() {
        let test = test_with(vec![question(1, Some("X")), question(2, None)]);
        let answers = [Some(1), Some(0)];
        assert_eq!(score(&test, &answers, stamp()), score(&test, &answers, stamp()));
    }

    #[test]
    fn timestamp_is_rfc3339_millis_utc() {
        let test = test_with(vec![question(0, None)]);
        let attempt = score(&test, &[Some(0)], stamp());
        assert_eq!(attempt.timestamp_iso, "2026-10-19T08:00:00.000Z");
        assert_eq!(attempt.id, AttemptId(1_792_396_800_000));
    }

    #[test]
    fn stamp_id_stays_ahead_of_latest() {
        let clock = Clock::fixed(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
        let first = AttemptStamp::issue(&clock, None);
        let second = AttemptStamp::issue(&clock, Some(first.id));
        assert!(second.id > first.id);

        let far_future = AttemptId(i64::MAX / 2);
        assert_eq!(
            AttemptStamp::issue(&clock, Some(far_future)).id,
            AttemptId(far_future.0 + 1)
        );
    }

    #[test]
    fn stamp_id_saturates_at_max_latest() {
        let clock = Clock::fixed(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
        let stamp = AttemptStamp::issue(&clock, Some(AttemptId(i64::MAX)));
        assert_eq!(stamp.id, AttemptId(i64::MAX));
        assert_eq!(
            AttemptStamp::issue(&Clock::System, Some(AttemptId(i64::MAX))).id,
            AttemptId(i64::MAX)
        );
    }
}
