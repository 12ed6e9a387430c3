mod ui;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use codetype::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::{export_csv, HistoryEntry, HistoryStore, SqliteHistory},
    input::normalize_key,
    language::PracticeLanguage,
    logging,
    practice::Practice,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner, SystemClock},
    session::Phase,
    snippets::{BuiltinSnippets, FixedSnippet, SnippetSource},
    stats::HistorySummary,
};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
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
    fs,
    io::{self, stdin},
    path::PathBuf,
};

/// typing practice for code snippets
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type real code snippets in your terminal and track speed, accuracy and progress over time."
)]
pub struct Cli {
    /// language to draw snippets from (defaults to the last one used)
    #[clap(short = 'l', long, value_enum)]
    language: Option<PracticeLanguage>,

    /// custom snippet to type instead of the built-in pool
    #[clap(short = 'p', long, conflicts_with = "file")]
    prompt: Option<String>,

    /// read the snippet to type from a file
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// history database location
    #[clap(long)]
    db: Option<PathBuf>,

    /// config file location
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print, export or clear past results
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
struct HistoryArgs {
    /// number of entries to show (max 100)
    #[clap(short = 'n', long)]
    limit: Option<usize>,

    /// print entries as JSON
    #[clap(long)]
    json: bool,

    /// write entries to a CSV file
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// delete all stored results
    #[clap(long, conflicts_with_all = ["json", "export"])]
    clear: bool,
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("codetype_history.db"))
    }

    fn snippet_source(&self) -> Result<Box<dyn SnippetSource>, Box<dyn Error>> {
        if let Some(prompt) = &self.prompt {
            return Ok(Box::new(FixedSnippet::new(prompt)?));
        }
        if let Some(path) = &self.file {
            let text = fs::read_to_string(path)?;
            return Ok(Box::new(FixedSnippet::new(text.trim_end())?));
        }
        Ok(Box::new(BuiltinSnippets::new()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    Practice,
    History,
}

#[derive(Debug, Default)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub summary: HistorySummary,
    pub scroll_offset: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub struct App {
    pub practice: Practice,
    pub screen: Screen,
    pub history_view: HistoryView,
    pub history_limit: usize,
}

impl App {
    pub fn new(practice: Practice, history_limit: usize) -> Self {
        Self {
            practice,
            screen: Screen::Practice,
            history_view: HistoryView::default(),
            history_limit,
        }
    }

    pub fn open_history(&mut self) {
        self.history_view = match self.practice.history().list(self.history_limit, 0) {
            Ok(entries) => HistoryView {
                summary: HistorySummary::from_entries(&entries),
                entries,
                ..HistoryView::default()
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history");
                HistoryView {
                    error: Some(format!("Could not load history: {e}")),
                    ..HistoryView::default()
                }
            }
        };
        self.screen = Screen::History;
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Continue;
        }
        match self.screen {
            Screen::Practice => self.on_practice_key(key),
            Screen::History => self.on_history_key(key),
        }
    }

    fn on_practice_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.code == KeyCode::Esc {
            return KeyOutcome::Quit;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return KeyOutcome::Quit,
                KeyCode::Char('p') => {
                    self.practice.toggle_pause();
                }
                KeyCode::Char('s') => {
                    self.practice.stop();
                }
                KeyCode::Char('r') => self.practice.restart(),
                KeyCode::Char('n') => self.practice.new_test(),
                KeyCode::Char('l') => {
                    let next = self.practice.language().next();
                    self.practice.change_language(next);
                }
                KeyCode::Char('o') => self.open_history(),
                KeyCode::Char('d') => self.practice.clear_notification(),
                _ => {}
            }
            return KeyOutcome::Continue;
        }

        if self.practice.session().phase() == Phase::Idle {
            if key.code == KeyCode::Enter {
                self.practice.start();
            }
            return KeyOutcome::Continue;
        }

        if let Some(ch) = normalize_key(&key) {
            self.practice.handle_input(ch);
        }
        KeyOutcome::Continue
    }

    fn on_history_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('b') => {
                self.screen = Screen::Practice;
            }
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.screen = Screen::Practice;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return KeyOutcome::Quit;
            }
            KeyCode::Up => {
                self.history_view.scroll_offset = self.history_view.scroll_offset.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.history_view.scroll_offset + 1 < self.history_view.entries.len() {
                    self.history_view.scroll_offset += 1;
                }
            }
            KeyCode::Home => self.history_view.scroll_offset = 0,
            KeyCode::Char('C') => {
                if let Err(e) = self.practice.history().clear() {
                    tracing::warn!(error = %e, "failed to clear history");
                    self.history_view.error = Some(format!("Could not clear history: {e}"));
                } else {
                    self.open_history();
                }
            }
            _ => {}
        }
        KeyOutcome::Continue
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.config_store();
    let mut config = store.load();

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = logging::init(config.tracing_level(), &log_path) {
            eprintln!("logging disabled: {e}");
        }
    }

    if let Some(Command::History(args)) = &cli.command {
        return run_history(&cli, args, &config);
    }

    let snippets = match cli.snippet_source() {
        Ok(snippets) => snippets,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e).exit();
        }
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(language) = cli.language {
        if language != config.language {
            config.language = language;
            if let Err(e) = store.save(&config) {
                tracing::warn!(error = %e, "failed to save config");
            }
        }
    }

    let history = SqliteHistory::open(&cli.db_path())?;
    let practice = Practice::new(
        config.language,
        snippets,
        Box::new(history),
        Box::new(SystemClock),
    );
    let mut app = App::new(practice, config.history_limit);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app, config.tick_rate_ms);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick_rate_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(tick_rate_ms),
    );
    tracing::info!(language = %app.practice.language(), "tui started");

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Tick if runner.input_closed() => {
                tracing::warn!("terminal input closed, exiting");
                break;
            }
            AppEvent::Tick => app.practice.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if app.on_key(key) == KeyOutcome::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn run_history(cli: &Cli, args: &HistoryArgs, config: &Config) -> Result<(), Box<dyn Error>> {
    let store = SqliteHistory::open(&cli.db_path())?;

    if args.clear {
        store.clear()?;
        println!("history cleared");
        return Ok(());
    }

    let entries = store.list(args.limit.unwrap_or(config.history_limit), 0)?;

    if let Some(path) = &args.export {
        export_csv(&entries, fs::File::create(path)?)?;
        println!("exported {} entries to {}", entries.len(), path.display());
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    print!("{}", ui::history_report(&entries));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetype::runtime::ManualClock;
    use std::time::Duration;

    fn app(text: &str) -> (App, ManualClock) {
        let clock = ManualClock::default();
        let practice = Practice::new(
            PracticeLanguage::Javascript,
            Box::new(FixedSnippet::new(text).unwrap()),
            Box::new(SqliteHistory::open_in_memory().unwrap()),
            Box::new(clock.clone()),
        );
        (App::new(practice, 50), clock)
    }

    fn press(app: &mut App, code: KeyCode) -> KeyOutcome {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut App, c: char) -> KeyOutcome {
        app.on_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["codetype"]);
        assert_eq!(cli.language, None);
        assert_eq!(cli.prompt, None);
        assert_eq!(cli.file, None);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_language() {
        let cli = Cli::parse_from(["codetype", "-l", "go"]);
        assert_eq!(cli.language, Some(PracticeLanguage::Go));

        let cli = Cli::parse_from(["codetype", "--language", "python"]);
        assert_eq!(cli.language, Some(PracticeLanguage::Python));

        assert!(Cli::try_parse_from(["codetype", "-l", "cobol"]).is_err());
    }

    #[test]
    fn test_cli_prompt_conflicts_with_file() {
        let cli = Cli::parse_from(["codetype", "-p", "let x = 1;"]);
        assert_eq!(cli.prompt.as_deref(), Some("let x = 1;"));

        assert!(Cli::try_parse_from(["codetype", "-p", "x", "-f", "snippet.rs"]).is_err());
    }

    #[test]
    fn test_cli_history_subcommand() {
        let cli = Cli::parse_from(["codetype", "history", "-n", "5", "--json"]);
        match cli.command {
            Some(Command::History(args)) => {
                assert_eq!(args.limit, Some(5));
                assert!(args.json);
                assert!(!args.clear);
            }
            other => panic!("expected history command, got {other:?}"),
        }

        assert!(Cli::try_parse_from(["codetype", "history", "--clear", "--json"]).is_err());
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enter_starts_an_idle_session_without_typing() {
        let (mut app, _) = app("\nx");
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.practice.session().phase(), Phase::Idle);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.practice.session().phase(), Phase::Running);
        assert_eq!(app.practice.session().current_index(), 0);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.practice.session().current_index(), 1);
    }

    #[test]
    fn typing_through_keys_finishes_and_saves() {
        let (mut app, clock) = app("a\tb");
        press(&mut app, KeyCode::Enter);
        clock.advance(Duration::from_secs(2));
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('b'));

        assert!(app.practice.session().is_finished());
        assert_eq!(app.practice.history().list(0, 0).unwrap().len(), 1);
    }

    #[test]
    fn control_keys_drive_the_session() {
        let (mut app, _) = app("abc");
        press(&mut app, KeyCode::Enter);

        ctrl(&mut app, 'p');
        assert!(app.practice.session().is_paused());
        ctrl(&mut app, 'p');
        assert!(!app.practice.session().is_paused());

        press(&mut app, KeyCode::Char('a'));
        ctrl(&mut app, 'r');
        assert_eq!(app.practice.session().current_index(), 0);
        assert_eq!(app.practice.session().phase(), Phase::Running);

        ctrl(&mut app, 's');
        assert!(app.practice.session().is_finished());

        ctrl(&mut app, 'l');
        assert_eq!(app.practice.language(), PracticeLanguage::Python);
        assert_eq!(app.practice.session().phase(), Phase::Idle);
    }

    #[test]
    fn history_screen_round_trip() {
        let (mut app, _) = app("z");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('z'));

        ctrl(&mut app, 'o');
        assert_eq!(app.screen, Screen::History);
        assert_eq!(app.history_view.entries.len(), 1);
        assert_eq!(app.history_view.summary.sessions, 1);

        press(&mut app, KeyCode::Char('C'));
        assert!(app.history_view.entries.is_empty());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::Practice);
    }

    #[test]
    fn escape_quits_from_practice() {
        let (mut app, _) = app("abc");
        assert_eq!(press(&mut app, KeyCode::Esc), KeyOutcome::Quit);
        assert_eq!(ctrl(&mut app, 'c'), KeyOutcome::Quit);
    }
}
