use thiserror::Error;

use crate::attempt::Attempt;
use crate::bank::Test;
use crate::clock::Clock;
use crate::scorer::{score, AttemptStamp};
use crate::store::AttemptStore;
use crate::timer::TimerHandle;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no questions found for test {test_id}")]
    NoQuestions { test_id: u32 },
    #[error("exam already finished")]
    Finished,
    #[error("option {index} out of range ({options} options)")]
    OptionOutOfRange { index: usize, options: usize },
}

/// Collaborators every state transition may reach: where attempts go and what time it is.
pub struct SessionContext {
    pub store: AttemptStore,
    pub clock: Clock,
}

impl SessionContext {
    pub fn new(store: AttemptStore, clock: Clock) -> Self {
        Self { store, clock }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    Active,
    Finished,
}

/// Result of finishing an exam
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedExam {
    pub attempt: Attempt,
    /// false when the attempt could not be written to the store
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session already finished; tick dropped
    Ignored,
    Running { remaining_secs: i64 },
    Expired(FinishedExam),
}

/// Live state of one exam attempt
#[derive(Debug)]
pub struct ExamSession {
    test: Test,
    current_index: usize,
    answers: Vec<Option<usize>>,
    remaining_secs: i64,
    phase: ExamPhase,
    timer: Option<TimerHandle>,
}

impl ExamSession {
    pub fn start(test: Test) -> Result<Self, SessionError> {
        if test.questions.is_empty() {
            return Err(SessionError::NoQuestions { test_id: test.id });
        }

        log::debug!(
            "starting test {} ({} questions, {} min)",
            test.id,
            test.questions.len(),
            test.duration_minutes
        );

        Ok(Self {
            answers: vec![None; test.questions.len()],
            remaining_secs: test.duration_secs(),
            current_index: 0,
            phase: ExamPhase::Active,
            timer: None,
            test,
        })
    }

    /// Hands the countdown's scheduled task to the session, which cancels it on finish.
    pub fn attach_timer(&mut self, mut timer: TimerHandle) {
        if self.is_finished() {
            timer.cancel();
        }
        self.timer = Some(timer);
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    pub fn current_answer(&self) -> Option<usize> {
        self.answers[self.current_index]
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs
    }

    pub fn phase(&self) -> ExamPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == ExamPhase::Finished
    }

    pub fn timer_cancelled(&self) -> bool {
        self.timer.as_ref().map_or(true, TimerHandle::is_cancelled)
    }

    pub fn has_previous(&self) -> bool {
        !self.is_finished() && self.current_index > 0
    }

    pub fn has_next(&self) -> bool {
        !self.is_finished() && self.current_index + 1 < self.test.questions.len()
    }

    pub fn select_answer(&mut self, option: usize) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        let options = self.test.questions[self.current_index].options.len();
        if option >= options {
            return Err(SessionError::OptionOutOfRange {
                index: option,
                options,
            });
        }
        self.answers[self.current_index] = Some(option);
        Ok(())
    }

    /// Moves to the next question; returns false at the last question
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Moves to the previous question; returns false at the first question
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// One second of countdown. Finishes the exam once the clock drops below zero.
    pub fn tick(&mut self, ctx: &mut SessionContext) -> Result<TickOutcome, SessionError> {
        if self.is_finished() {
            return Ok(TickOutcome::Ignored);
        }

        self.remaining_secs -= 1;
        if self.remaining_secs < 0 {
            log::info!("time expired on test {}", self.test.id);
            return self.finish(ctx).map(TickOutcome::Expired);
        }

        Ok(TickOutcome::Running {
            remaining_secs: self.remaining_secs,
        })
    }

    /// Ends the exam, scores it and records the attempt.
    pub fn finish(&mut self, ctx: &mut SessionContext) -> Result<FinishedExam, SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }

        self.phase = ExamPhase::Finished;
        if let Some(timer) = self.timer.as_mut() {
            timer.cancel();
        }

        let stamp = AttemptStamp::issue(&ctx.clock, ctx.store.latest_id());
        let attempt = score(&self.test, &self.answers, stamp);

        let persisted = match ctx.store.append(&attempt) {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to save attempt {}: {}", attempt.id, e);
                false
            }
        };

        Ok(FinishedExam { attempt, persisted })
    }
}
