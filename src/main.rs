use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand, ValueEnum};
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
    time::Instant,
};
use tracing::{info, warn};

use typecafe::{
    app::{Action, App, AppEngine},
    app_dirs::AppDirs,
    auth::{Anonymous, AuthProvider, SignedIn, User},
    config::{Config, ConfigStore, FileConfigStore},
    engine::Engine,
    history::export_history_csv,
    logging::init_logging,
    runtime::{AppEvent, CrosstermEventSource, Runner, TICK_RATE},
    session::{Mode, TextSource},
    store::ResultStore,
    ui::{self, history::aggregates_line},
};

/// typing speed tests with saved history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A typing speed test for the terminal. Run timed or character-count tests against built-in passages or your own text, and keep a history of your results."
)]
pub struct Cli {
    /// kind of test to run
    #[clap(short = 'm', long, value_enum)]
    mode: Option<CliMode>,

    /// seconds (time mode) or characters (chars mode) to type
    #[clap(short = 't', long)]
    target: Option<u32>,

    /// custom text to type instead of a built-in passage
    #[clap(short = 'p', long)]
    text: Option<String>,

    /// email of the user results are saved for
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// display name used when the user is first registered
    #[clap(long)]
    name: Option<String>,

    /// result database location
    #[clap(long)]
    db: Option<PathBuf>,

    /// settings file location
    #[clap(long)]
    config: Option<PathBuf>,

    /// increase log verbosity (-v, -vv, -vvv)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CliMode {
    Time,
    Chars,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Time => Mode::Time,
            CliMode::Chars => Mode::Chars,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// print a page of saved results, newest first
    History {
        #[clap(default_value_t = 1)]
        page: u32,
    },
    /// write every saved result to stdout as CSV
    Export,
    /// delete every saved result for the user
    Clear,
}

impl Cli {
    /// Saved settings with command line overrides applied.
    fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            let mode = Mode::from(mode);
            if mode != config.mode {
                config.target_value = mode.default_target();
            }
            config.mode = mode;
        }
        if let Some(target) = self.target {
            config.target_value = target;
        }
        if let Some(text) = &self.text {
            config.text_source = TextSource::Custom;
            config.custom_text = text.clone();
        }
        if let Some(email) = &self.user {
            config.user_email = Some(email.clone());
        }
        if let Some(name) = &self.name {
            config.user_name = Some(name.clone());
        }
    }
}

fn open_store(cli: &Cli) -> typecafe::Result<ResultStore> {
    match &cli.db {
        Some(path) => ResultStore::open(path),
        None => ResultStore::new(),
    }
}

/// Look up the configured user, registering them on first use.
fn resolve_user(store: &ResultStore, config: &Config) -> typecafe::Result<Option<User>> {
    let Some(email) = &config.user_email else {
        return Ok(None);
    };
    let name = config
        .user_name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    store.find_or_register(email, &name).map(Some)
}

fn run_command(command: &Command, cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    let store = open_store(cli)?;
    let Some(user) = resolve_user(&store, config)? else {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::MissingRequiredArgument, "--user is required")
            .exit();
    };

    match command {
        Command::History { page } => {
            let aggregates = store.aggregates(&user)?;
            let page = store.history_page(&user, *page)?;
            println!("{}", aggregates_line(&aggregates));
            println!("page {} of {}", page.page, page.total_pages.max(1));
            for result in &page.results {
                let m = &result.metrics;
                println!(
                    "{}  {} {}  {:.0} wpm  {:.0} raw  {:.1}% acc  {} errors",
                    result.date_label(),
                    m.mode,
                    m.target_value,
                    m.wpm,
                    m.raw_wpm,
                    m.accuracy * 100.0,
                    m.errors
                );
            }
        }
        Command::Export => {
            let written = export_history_csv(&store, &user, io::stdout().lock())?;
            info!(rows = written, "exported history");
        }
        Command::Clear => {
            let removed = store.clear_results(&user)?;
            info!(rows = removed, "cleared history");
            println!("removed {removed} results");
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        // Logging is best effort; the test still runs without it.
        if let Err(e) = init_logging(cli.verbose, &log_path) {
            eprintln!("typecafe: logging disabled ({}): {e}", log_path.display());
        }
    }

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut config = config_store.load();
    cli.apply(&mut config);
    if let Err(e) = config_store.save(&config) {
        warn!(path = %config_store.path().display(), error = %e, "failed to save config");
    }

    if let Some(command) = &cli.command {
        return run_command(command, &cli, &config);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = match open_store(&cli) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "result store unavailable, results will not be saved");
            None
        }
    };
    let auth: Box<dyn AuthProvider> = match store.as_ref().map(|s| resolve_user(s, &config)) {
        Some(Ok(Some(user))) => Box::new(SignedIn(user)),
        Some(Err(e)) => return Err(e.into()),
        _ => Box::new(Anonymous),
    };

    let engine: AppEngine = Engine::new(auth, store);
    let mut app = App::new(engine, config).with_config_store(Box::new(config_store));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), TICK_RATE);

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let wait = app.until_next_timer(Instant::now()).unwrap_or(TICK_RATE);
        if let AppEvent::Key(key) = runner.step_within(wait) {
            if app.handle_key(key, Instant::now()) == Action::Quit {
                return Ok(());
            }
        }
        // Timers are polled after every event, not only on idle ticks.
        app.on_tick(Instant::now());
    }
}
