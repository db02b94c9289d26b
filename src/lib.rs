// Library surface for the binary and the headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod attempt;
pub mod bank;
pub mod clock;
pub mod config;
pub mod export;
pub mod results;
pub mod runtime;
pub mod scorer;
pub mod session;
pub mod store;
pub mod timer;
pub mod ui;
pub mod util;

/// Countdown granularity of a running exam
pub const TICK_RATE_MS: u64 = 1000;

pub use app::{App, AppCommand, AppState, Launch};
