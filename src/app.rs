use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::attempt::AttemptId;
use crate::bank::{BankSource, QuestionBank};
use crate::config::ConfigStore;
use crate::results::{ResultsReport, ResultsView};
use crate::session::{ExamSession, FinishedExam, SessionContext, SessionError, TickOutcome};
use crate::timer::TimerHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Loading,
    Picker,
    Exam,
    NoQuestions { test_id: u32, title: String },
    Results,
    NoAttempt,
}

/// First screen to show once the question bank is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    Picker,
    Exam(Option<u32>),
    Results(Option<AttemptId>),
}

/// What the event loop has to do after the app handled an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    None,
    /// An exam just started and needs its countdown
    StartTimer,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerRow {
    pub test_id: u32,
    pub title: String,
    pub questions: usize,
    pub duration_minutes: u32,
    pub latest_score: Option<u8>,
}

#[derive(Debug, Default)]
pub struct PickerState {
    pub selected: usize,
    pub rows: Vec<PickerRow>,
}

#[derive(Debug, Default)]
pub struct ResultsState {
    pub scroll_offset: usize,
}

pub struct App {
    pub state: AppState,
    pub bank: QuestionBank,
    pub ctx: SessionContext,
    pub session: Option<ExamSession>,
    pub report: Option<ResultsReport>,
    pub picker: PickerState,
    pub results_state: ResultsState,
    bank_source: BankSource,
    config_store: Box<dyn ConfigStore>,
    /// Bumped on every exam start; ticks carrying an older value are stale
    exam_generation: u64,
}

impl App {
    pub fn new(
        bank_source: BankSource,
        ctx: SessionContext,
        config_store: Box<dyn ConfigStore>,
    ) -> Self {
        Self {
            state: AppState::Loading,
            bank: QuestionBank::fallback(),
            ctx,
            session: None,
            report: None,
            picker: PickerState::default(),
            results_state: ResultsState::default(),
            bank_source,
            config_store,
            exam_generation: 0,
        }
    }

    /// Loads the question bank and opens the first screen.
    pub fn launch(&mut self, launch: Launch) -> AppCommand {
        self.bank = QuestionBank::load(&self.bank_source);

        match launch {
            Launch::Picker => {
                self.show_picker();
                AppCommand::None
            }
            Launch::Exam(selector) => self.start_exam(selector),
            Launch::Results(id) => {
                self.show_results(id);
                AppCommand::None
            }
        }
    }

    pub fn show_picker(&mut self) {
        let remembered = self.config_store.load().last_test;
        let rows: Vec<PickerRow> = self
            .bank
            .tests()
            .iter()
            .map(|t| PickerRow {
                test_id: t.id,
                title: t.title.clone(),
                questions: t.questions.len(),
                duration_minutes: t.duration_minutes,
                latest_score: self.ctx.store.latest_for_test(t.id).map(|a| a.score_percent),
            })
            .collect();

        if self.state != AppState::Picker {
            self.picker.selected = remembered
                .and_then(|id| self.bank.position(id))
                .unwrap_or(0);
        }
        self.picker.selected = self.picker.selected.min(rows.len().saturating_sub(1));
        self.picker.rows = rows;
        self.session = None;
        self.state = AppState::Picker;
    }

    pub fn start_exam(&mut self, selector: Option<u32>) -> AppCommand {
        let test = self.bank.select(selector).clone();
        self.remember_test(test.id);

        let title = test.title.clone();
        match ExamSession::start(test) {
            Ok(session) => {
                self.exam_generation += 1;
                self.session = Some(session);
                self.state = AppState::Exam;
                AppCommand::StartTimer
            }
            Err(SessionError::NoQuestions { test_id }) => {
                log::info!("test {test_id} has no questions");
                self.session = None;
                self.state = AppState::NoQuestions { test_id, title };
                AppCommand::None
            }
            Err(e) => {
                log::error!("could not start exam: {e}");
                self.show_picker();
                AppCommand::None
            }
        }
    }

    fn remember_test(&mut self, test_id: u32) {
        let mut cfg = self.config_store.load();
        if cfg.last_test != Some(test_id) {
            cfg.last_test = Some(test_id);
            if let Err(e) = self.config_store.save(&cfg) {
                log::warn!("could not save config: {e}");
            }
        }
    }

    pub fn attach_timer(&mut self, timer: TimerHandle) {
        match self.session.as_mut() {
            Some(session) => session.attach_timer(timer),
            None => drop(timer),
        }
    }

    pub fn show_results(&mut self, id: Option<AttemptId>) {
        self.results_state = ResultsState::default();
        match ResultsView::build(&self.ctx.store, id) {
            ResultsView::Report(report) => {
                self.report = Some(report);
                self.state = AppState::Results;
            }
            ResultsView::NoAttempt => {
                self.report = None;
                self.state = AppState::NoAttempt;
            }
        }
    }

    fn on_finished(&mut self, finished: FinishedExam) {
        if finished.persisted {
            self.show_results(Some(finished.attempt.id));
        } else {
            self.results_state = ResultsState::default();
            let history = self.ctx.store.load_history();
            self.report = Some(ResultsReport::new(finished.attempt, history));
            self.state = AppState::Results;
        }
    }

    pub fn finish_exam(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.finish(&mut self.ctx) {
            Ok(finished) => self.on_finished(finished),
            Err(e) => log::debug!("finish ignored: {e}"),
        }
    }

    /// Generation the countdown of the running exam must tag its ticks with
    pub fn exam_generation(&self) -> u64 {
        self.exam_generation
    }

    pub fn on_tick(&mut self, generation: u64) {
        if self.state != AppState::Exam || generation != self.exam_generation {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.tick(&mut self.ctx) {
            Ok(TickOutcome::Expired(finished)) => self.on_finished(finished),
            Ok(_) => {}
            Err(e) => log::debug!("tick ignored: {e}"),
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> AppCommand {
        if key.kind != KeyEventKind::Press {
            return AppCommand::None;
        }
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return AppCommand::Quit;
        }

        match self.state {
            AppState::Loading => AppCommand::None,
            AppState::Picker => self.on_picker_key(key),
            AppState::Exam => {
                self.on_exam_key(key);
                AppCommand::None
            }
            AppState::Results => {
                match key.code {
                    KeyCode::Char('b') | KeyCode::Backspace => self.show_picker(),
                    KeyCode::Up => {
                        self.results_state.scroll_offset =
                            self.results_state.scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        let max = self
                            .report
                            .as_ref()
                            .map_or(0, |r| r.history.len().saturating_sub(1));
                        self.results_state.scroll_offset =
                            (self.results_state.scroll_offset + 1).min(max);
                    }
                    _ => {}
                }
                AppCommand::None
            }
            AppState::NoQuestions { .. } | AppState::NoAttempt => {
                if matches!(key.code, KeyCode::Char('b') | KeyCode::Backspace) {
                    self.show_picker();
                }
                AppCommand::None
            }
        }
    }

    fn on_picker_key(&mut self, key: KeyEvent) -> AppCommand {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.picker.selected = self.picker.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.picker.selected + 1 < self.picker.rows.len() {
                    self.picker.selected += 1;
                }
            }
            KeyCode::Enter => {
                let selector = self.picker.rows.get(self.picker.selected).map(|r| r.test_id);
                return self.start_exam(selector);
            }
            KeyCode::Char('h') => self.show_results(None),
            _ => {}
        }
        AppCommand::None
    }

    fn on_exam_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Left => {
                session.previous();
            }
            KeyCode::Right => {
                session.next();
            }
            KeyCode::Enter => self.finish_exam(),
            KeyCode::Char(c) if c.is_ascii_lowercase() => {
                let option = (c as u8 - b'a') as usize;
                if let Err(e) = session.select_answer(option) {
                    log::debug!("selection ignored: {e}");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Test;
    use crate::clock::Clock;
    use crate::config::{Config, MemoryConfigStore};
    use crate::store::AttemptStore;
    use std::fs;
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(
            BankSource::default(),
            SessionContext::new(AttemptStore::in_memory(), Clock::default()),
            Box::new(MemoryConfigStore::default()),
        )
    }

    fn correct_letter(test: &Test, index: usize) -> char {
        (b'a' + test.questions[index].answer as u8) as char
    }

    #[test]
    fn starts_loading_then_picker() {
        let mut app = app();
        assert_eq!(app.state, AppState::Loading);
        assert_eq!(app.launch(Launch::Picker), AppCommand::None);
        assert_eq!(app.state, AppState::Picker);
        assert_eq!(app.picker.rows.len(), app.bank.tests().len());
        assert!(app.picker.rows.iter().all(|r| r.latest_score.is_none()));
    }

    #[test]
    fn launch_exam_requests_timer() {
        let mut app = app();
        assert_eq!(app.launch(Launch::Exam(Some(2))), AppCommand::StartTimer);
        assert_eq!(app.state, AppState::Exam);
        assert_eq!(app.session.as_ref().unwrap().test().id, 2);
    }

    #[test]
    fn unknown_test_falls_back_to_first() {
        let mut app = app();
        app.launch(Launch::Exam(Some(404)));
        assert_eq!(app.session.as_ref().unwrap().test().id, app.bank.tests()[0].id);
    }

    #[test]
    fn empty_test_shows_no_questions() {
        let mut app = app();
        assert_eq!(app.launch(Launch::Exam(Some(3))), AppCommand::None);
        assert!(matches!(app.state, AppState::NoQuestions { test_id: 3, .. }));
        assert!(app.session.is_none());

        app.on_key(key(KeyCode::Char('b')));
        assert_eq!(app.state, AppState::Picker);
    }

    #[test]
    fn unreadable_bank_degrades_to_no_questions() {
        let dir = tempdir().unwrap();
        let mut app = App::new(
            BankSource::File(dir.path().join("nope.json")),
            SessionContext::new(AttemptStore::in_memory(), Clock::default()),
            Box::new(MemoryConfigStore::default()),
        );
        app.launch(Launch::Exam(None));
        assert_eq!(
            app.state,
            AppState::NoQuestions {
                test_id: 1,
                title: "Fallback Test".into()
            }
        );
    }

    #[test]
    fn exam_keys_drive_session() {
        let mut app = app();
        app.launch(Launch::Exam(Some(1)));
        let test = app.session.as_ref().unwrap().test().clone();

        app.on_key(key(KeyCode::Char(correct_letter(&test, 0))));
        app.on_key(key(KeyCode::Left));
        assert_eq!(app.session.as_ref().unwrap().current_index(), 0);
        app.on_key(key(KeyCode::Right));
        app.on_key(key(KeyCode::Char('z')));
        assert_eq!(app.session.as_ref().unwrap().answers()[1], None);
        app.on_key(key(KeyCode::Char(correct_letter(&test, 1))));

        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.state, AppState::Results);
        let report = app.report.as_ref().unwrap();
        assert_eq!(report.attempt.correct_count, 2);
        assert_eq!(report.attempt.total_count as usize, test.questions.len());
        assert_eq!(app.ctx.store.load_history().len(), 1);
    }

    #[test]
    fn finishing_all_correct_scores_100() {
        let mut app = app();
        app.launch(Launch::Exam(Some(2)));
        let test = app.session.as_ref().unwrap().test().clone();
        for i in 0..test.questions.len() {
            app.on_key(key(KeyCode::Char(correct_letter(&test, i))));
            app.on_key(key(KeyCode::Right));
        }
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.report.as_ref().unwrap().attempt.score_percent, 100);
    }

    #[test]
    fn expiry_moves_to_results() {
        let mut app = app();
        app.launch(Launch::Exam(Some(2)));
        app.attach_timer(TimerHandle::manual());
        let secs = app.session.as_ref().unwrap().remaining_secs();
        let generation = app.exam_generation();

        for _ in 0..secs {
            app.on_tick(generation);
        }
        assert_eq!(app.state, AppState::Exam);

        app.on_tick(generation);
        assert_eq!(app.state, AppState::Results);
        assert!(app.session.as_ref().unwrap().timer_cancelled());

        // stray ticks after the exam changed screens
        app.on_tick(generation);
        app.on_tick(generation);
        assert_eq!(app.ctx.store.load_history().len(), 1);
    }

    #[test]
    fn late_tick_from_previous_exam_is_ignored() {
        let mut app = app();
        app.launch(Launch::Exam(Some(2)));
        let first = app.exam_generation();
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Char('b')));

        assert_eq!(app.on_key(key(KeyCode::Enter)), AppCommand::StartTimer);
        let second = app.exam_generation();
        assert_ne!(first, second);
        let full = app.session.as_ref().unwrap().remaining_secs();

        app.on_tick(first);
        assert_eq!(app.session.as_ref().unwrap().remaining_secs(), full);

        app.on_tick(second);
        assert_eq!(app.session.as_ref().unwrap().remaining_secs(), full - 1);
    }

    #[test]
    fn results_without_attempt() {
        let mut app = app();
        app.launch(Launch::Results(None));
        assert_eq!(app.state, AppState::NoAttempt);
        app.on_key(key(KeyCode::Backspace));
        assert_eq!(app.state, AppState::Picker);
    }

    #[test]
    fn picker_shows_latest_score_and_remembers_test() {
        let mut app = app();
        app.launch(Launch::Picker);
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.picker.selected, 1);
        assert_eq!(app.on_key(key(KeyCode::Enter)), AppCommand::StartTimer);
        assert_eq!(app.session.as_ref().unwrap().test().id, 2);

        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Char('b')));
        assert_eq!(app.state, AppState::Picker);
        assert_eq!(app.picker.selected, 1);
        assert_eq!(app.picker.rows[1].latest_score, Some(0));
        assert_eq!(app.config_store.load().last_test, Some(2));
    }

    #[test]
    fn picker_navigation_is_clamped() {
        let mut app = app();
        app.launch(Launch::Picker);
        for _ in 0..20 {
            app.on_key(key(KeyCode::Down));
        }
        assert_eq!(app.picker.selected, app.picker.rows.len() - 1);
        for _ in 0..20 {
            app.on_key(key(KeyCode::Up));
        }
        assert_eq!(app.picker.selected, 0);
    }

    #[test]
    fn remembered_test_is_preselected() {
        let mut app = App::new(
            BankSource::default(),
            SessionContext::new(AttemptStore::in_memory(), Clock::default()),
            Box::new(MemoryConfigStore::new(Config {
                last_test: Some(2),
                ..Config::default()
            })),
        );
        app.launch(Launch::Picker);
        assert_eq!(app.picker.selected, 1);
    }

    #[test]
    fn escape_quits_everywhere() {
        let mut app = app();
        app.launch(Launch::Exam(Some(1)));
        assert_eq!(app.on_key(key(KeyCode::Esc)), AppCommand::Quit);
        assert_eq!(
            app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            AppCommand::Quit
        );
    }

    #[test]
    fn custom_bank_file_is_used() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(
            &path,
            r#"{"tests":[{"id":11,"title":"Custom","duration_minutes":1,
                "questions":[{"question":"2+2?","options":["3","4"],"answer":1}]}]}"#,
        )
        .unwrap();
        let mut app = App::new(
            BankSource::File(path),
            SessionContext::new(AttemptStore::in_memory(), Clock::default()),
            Box::new(MemoryConfigStore::default()),
        );
        app.launch(Launch::Exam(None));
        app.on_key(key(KeyCode::Char('b')));
        app.on_key(key(KeyCode::Enter));
        let report = app.report.as_ref().unwrap();
        assert_eq!(report.attempt.test_id, 11);
        assert_eq!(report.attempt.score_percent, 100);
        assert_eq!(report.topics[0].topic, "Other");
    }
}
