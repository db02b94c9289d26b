use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use examr::{
    attempt::AttemptId,
    bank::BankSource,
    clock::Clock,
    config::{Config, ConfigStore, FileConfigStore, StorageBackend},
    export::export_history,
    runtime::{CrosstermEventSource, ExamEvent, Runner},
    session::SessionContext,
    store::{AttemptStore, MemoryStorage, StorageGateway},
    timer::TimerHandle,
    ui, App, AppCommand, Launch, TICK_RATE_MS,
};

/// timed multiple-choice exams in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Take timed multiple-choice exams from a question bank, review per-topic weaknesses and track your scores over time."
)]
pub struct Cli {
    /// id of the test to start right away
    #[clap(short = 't', long)]
    test: Option<u32>,

    /// question bank file to use instead of the bundled one
    #[clap(long)]
    bank: Option<PathBuf>,

    /// open the results screen instead of starting an exam
    #[clap(short = 'r', long)]
    results: bool,

    /// attempt id to show on the results screen (defaults to the last attempt)
    #[clap(short = 'a', long, requires = "results")]
    attempt: Option<AttemptId>,

    /// where attempts are stored
    #[clap(long, value_enum)]
    storage: Option<StorageBackend>,

    /// directory holding stored attempts
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// write the attempt history as CSV to this path and exit
    #[clap(long)]
    export_history: Option<PathBuf>,
}

impl Cli {
    fn launch(&self) -> Launch {
        if self.results {
            Launch::Results(self.attempt)
        } else if self.test.is_some() {
            Launch::Exam(self.test)
        } else {
            Launch::Picker
        }
    }

    /// Command line flags win over the saved config
    fn merge(&self, mut cfg: Config) -> Config {
        if let Some(bank) = &self.bank {
            cfg.bank_path = Some(bank.clone());
        }
        if let Some(storage) = self.storage {
            cfg.storage = storage;
        }
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = Some(dir.clone());
        }
        cfg
    }
}

fn bank_source(cfg: &Config) -> BankSource {
    match &cfg.bank_path {
        Some(path) => BankSource::File(path.clone()),
        None => BankSource::default(),
    }
}

fn open_storage(cfg: &Config) -> Box<dyn StorageGateway> {
    match cfg.storage.open(cfg.data_dir.as_deref()) {
        Ok(gateway) => gateway,
        Err(e) => {
            log::warn!("could not open {} storage, attempts will not be kept: {e}", cfg.storage);
            Box::new(MemoryStorage::new())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let cfg = cli.merge(config_store.load());
    log::debug!("using config {:?}", cfg);

    let store = AttemptStore::new(open_storage(&cfg));

    if let Some(path) = &cli.export_history {
        let history = store.load_history();
        export_history(&history, path)?;
        println!("exported {} attempts to {}", history.len(), path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        bank_source(&cfg),
        SessionContext::new(store, Clock::System),
        Box::new(config_store),
    );
    let res = start_tui(&mut terminal, &mut app, cli.launch());

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    launch: Launch,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), Duration::from_millis(TICK_RATE_MS));

    terminal.draw(|f| ui::draw(app, f))?;
    let mut command = app.launch(launch);

    loop {
        match command {
            AppCommand::Quit => break,
            AppCommand::StartTimer => {
                let tx = runner.sender();
                let generation = app.exam_generation();
                let timer = TimerHandle::spawn(Duration::from_millis(TICK_RATE_MS), move || {
                    tx.send(ExamEvent::Tick(generation)).is_ok()
                });
                app.attach_timer(timer);
            }
            AppCommand::None => {}
        }
        terminal.draw(|f| ui::draw(app, f))?;

        command = match runner.step() {
            Some(ExamEvent::Tick(generation)) => {
                app.on_tick(generation);
                AppCommand::None
            }
            Some(ExamEvent::Key(key)) => app.on_key(key),
            Some(ExamEvent::Resize) | None => AppCommand::None,
            Some(ExamEvent::Closed) => AppCommand::Quit,
        };
    }

    Ok(())
}
