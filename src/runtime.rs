use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum ExamEvent {
    Key(KeyEvent),
    Resize,
    /// One second of countdown for the exam of the given generation
    Tick(u64),
    /// Every producer has gone away
    Closed,
}

/// Source of terminal events (keyboard, resize, ticks)
pub trait ExamEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<ExamEvent, RecvTimeoutError>;

    /// Sender other producers (the countdown timer) can push events through
    fn sender(&self) -> Sender<ExamEvent>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<ExamEvent>,
    rx: Receiver<ExamEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let reader_tx = tx.clone();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => ExamEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => ExamEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    log::error!("terminal input failed: {e}");
                    let _ = reader_tx.send(ExamEvent::Closed);
                    break;
                }
            };
            if reader_tx.send(evt).is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ExamEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<ExamEvent> {
        self.tx.clone()
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    tx: Sender<ExamEvent>,
    rx: Receiver<ExamEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ExamEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<ExamEvent> {
        self.tx.clone()
    }
}

/// Runner that advances the application one event at a time
pub struct Runner<E: ExamEventSource> {
    event_source: E,
    poll_interval: Duration,
}

impl<E: ExamEventSource> Runner<E> {
    pub fn new(event_source: E, poll_interval: Duration) -> Self {
        Self {
            event_source,
            poll_interval,
        }
    }

    pub fn sender(&self) -> Sender<ExamEvent> {
        self.event_source.sender()
    }

    /// Blocks up to the poll interval; `None` when nothing arrived
    pub fn step(&self) -> Option<ExamEvent> {
        match self.event_source.recv_timeout(self.poll_interval) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(ExamEvent::Closed),
        }
    }
}
