use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
};

use typing_race::{
    app::App,
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    opponent::OpponentLevel,
    race::{RaceEngine, RoundConfig},
    results::{JsonFileStore, ResultsQuery, ResultsRepository, SortBy},
    runtime::{CrosstermEventSource, FixedTicker, RaceEvent, Runner},
    sentences::Corpus,
};

/// race a typing robot (or your own best run) in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing race: type a sentence faster than a robot that reveals it at a fixed pace, or race a replay of your own best one-minute run.",
    group(ArgGroup::new("level").args(["extra_fast", "fast", "medium", "low"]))
)]
pub struct Cli {
    /// robot types a character every 200 ms
    #[clap(short = 'e', long)]
    extra_fast: bool,

    /// robot types a character every 260 ms
    #[clap(short = 'f', long)]
    fast: bool,

    /// robot types a character every 360 ms
    #[clap(short = 'm', long)]
    medium: bool,

    /// robot types a character every 1600 ms
    #[clap(short = 'l', long)]
    low: bool,

    /// topic to pick the sentence from (see --list-topics)
    #[clap(short = 't', long)]
    topic: Option<String>,

    /// start with the first words already typed
    #[clap(long)]
    handicap: bool,

    /// number of words typed for you; implies --handicap
    #[clap(short = 'w', long)]
    handicap_words: Option<usize>,

    /// race a replay of your best result instead of the robot
    #[clap(short = 'b', long)]
    best: bool,

    /// open the results screen on start
    #[clap(short = 'r', long)]
    display_results: bool,

    /// sort key for results: cpm, wpm or date, prefix with - for descending
    #[clap(short = 's', long, allow_hyphen_values = true)]
    sort_by: Option<SortBy>,

    /// show every recorded result instead of the top ones
    #[clap(short = 'a', long)]
    all_history: bool,

    /// delete all recorded results and exit
    #[clap(long)]
    clear_results: bool,

    /// print the available topics and exit
    #[clap(long)]
    list_topics: bool,
}

impl Cli {
    fn level(&self) -> Option<OpponentLevel> {
        [
            (self.extra_fast, OpponentLevel::ExtraFast),
            (self.fast, OpponentLevel::Fast),
            (self.medium, OpponentLevel::Medium),
            (self.low, OpponentLevel::Low),
        ]
        .into_iter()
        .find_map(|(set, level)| set.then_some(level))
    }

    /// Round settings, with flags taking precedence over the config file.
    fn round_config(&self, config: &Config) -> RoundConfig {
        RoundConfig {
            opponent_level: self.level().unwrap_or(config.opponent_level),
            topic: self.topic.clone(),
            handicap: self.handicap || self.handicap_words.is_some(),
            handicap_word_count: self.handicap_words.unwrap_or(config.handicap_words),
            compete_against_best: self.best,
        }
    }

    fn results_query(&self, config: &Config) -> ResultsQuery {
        ResultsQuery {
            sort_by: self.sort_by.unwrap_or_else(|| config.sort_by()),
            show_all: self.all_history,
            top_n: config.top_n,
        }
    }
}

/// Logs go to a file since the terminal belongs to the TUI.
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let config = FileConfigStore::new().load();
    let store = JsonFileStore::new()?;
    let results_path = store.path().to_path_buf();
    let repository = ResultsRepository::new(Box::new(store));

    if cli.clear_results {
        repository.clear_all()?;
        println!("All results cleared from {}.", results_path.display());
        return Ok(());
    }

    let corpus = Corpus::embedded();
    if cli.list_topics {
        for topic in corpus.topics() {
            println!("{topic}");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let engine = RaceEngine::new(repository, Box::new(corpus), Box::new(SystemClock))
        .with_max_handicap_words(config.max_handicap_words);
    let mut app = App::new(
        engine,
        cli.round_config(&config),
        cli.results_query(&config),
    );
    if cli.display_results {
        app.show_results()?;
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    terminal.draw(|f| ui(app, f))?;

    loop {
        let event = runner.step();
        // idle ticks only matter while a timer is running
        let redraw = !matches!(event, RaceEvent::Tick) || app.engine.is_ticking();

        app.on_event(event)?;
        if app.should_quit {
            break;
        }
        if redraw {
            terminal.draw(|f| ui(app, f))?;
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
