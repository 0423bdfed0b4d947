use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame, Terminal,
};
use speedracer::{
    app_dirs::AppDirs,
    audio::{AudioDevice, PacedDisplay},
    config::ConfigOverrides,
    drill::{Drill, DrillStatus},
    error::ConfigError,
    history::{export_csv, HistoryCursor},
    logging,
    question::QuestionSetGenerator,
    runtime::{spawn_terminal_reader, ChannelEventSource, DrillEvent, FixedTicker, Runner, ThreadTimer},
    store::{open_store_or_memory, AppContext, ContextHandle},
    ui::{DrillScreen, HomeScreen},
    TICK_RATE_MS,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::Sender,
    time::Duration,
};
use tracing::{error, info, warn};

/// mental arithmetic drill: listen to the numbers, type the running total
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A mental arithmetic trainer. Each sum is read out one number at a time; type the total once the last number is done. Settings passed on the command line are saved for the next run."
)]
pub struct Cli {
    /// number of sums in a session
    #[clap(short = 'n', long)]
    total_sums: Option<usize>,

    /// numbers read out for each sum
    #[clap(short = 'q', long)]
    questions_each_sum: Option<usize>,

    /// digits in every number
    #[clap(short = 'd', long)]
    digits: Option<u32>,

    /// chance of a number being negative, between 0 and 1
    #[clap(long)]
    negative_percentage: Option<f64>,

    /// pause after each number in milliseconds
    #[clap(long = "delay-ms")]
    delay_ms: Option<u64>,

    /// clip playback speed
    #[clap(short = 'r', long)]
    playback_rate: Option<f32>,

    /// directory holding one <number>.wav clip per value
    #[clap(long, default_value = "audio")]
    audio_dir: PathBuf,

    /// milliseconds a number stays on screen when playing without sound
    #[clap(long, default_value_t = PacedDisplay::DEFAULT_HOLD.as_millis() as u64)]
    hold_ms: u64,

    /// where config and history are stored
    #[clap(long)]
    state_file: Option<PathBuf>,

    /// where logs are written (filter with SPEEDRACER_LOG)
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// write the session history as CSV to this path and exit
    #[clap(long)]
    export: Option<PathBuf>,

    /// give up on a sum after this many random draws instead of retrying forever
    #[clap(long)]
    max_draws: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            total_sums: self.total_sums,
            questions_each_sum: self.questions_each_sum,
            digits: self.digits,
            negative_percentage: self.negative_percentage,
            delay_ms: self.delay_ms,
            playback_rate: self.playback_rate,
        }
    }
}

/// Merge command-line settings into the stored config and save them.
fn apply_overrides(ctx: &mut ContextHandle, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
    if overrides.is_empty() {
        return Ok(());
    }
    let config = ctx.snapshot().config.clone().with_overrides(overrides);
    config.validate()?;
    info!(?config, "config updated from command line");
    if let Err(err) = ctx.update(|c| AppContext { config, ..c }) {
        warn!(%err, "could not save config");
    }
    Ok(())
}

type LiveDrill = Drill<Box<dyn AudioDevice>, ThreadTimer>;

pub enum Screen {
    Home,
    Drill(Box<LiveDrill>),
}

pub struct App {
    pub cli: Cli,
    pub ctx: ContextHandle,
    pub cursor: HistoryCursor,
    pub screen: Screen,
    pub notice: Option<String>,
    generator: QuestionSetGenerator,
    tx: Sender<DrillEvent>,
}

impl App {
    pub fn new(cli: Cli, ctx: ContextHandle, tx: Sender<DrillEvent>) -> Self {
        let cursor = HistoryCursor::latest(&ctx.snapshot().sessions);
        let generator = QuestionSetGenerator::new().with_max_draws(cli.max_draws);
        Self {
            cli,
            ctx,
            cursor,
            screen: Screen::Home,
            notice: None,
            generator,
            tx,
        }
    }

    fn audio_device(&self) -> Box<dyn AudioDevice> {
        #[cfg(feature = "audio")]
        {
            let library = speedracer::audio::ClipLibrary::new(&self.cli.audio_dir);
            if library.is_available() {
                match speedracer::audio::Speaker::open(library, self.tx.clone()) {
                    Ok(speaker) => return Box::new(speaker),
                    Err(err) => warn!(%err, "audio output unavailable, playing silently"),
                }
            }
        }
        #[cfg(not(feature = "audio"))]
        if self.cli.audio_dir.is_dir() {
            info!(dir = %self.cli.audio_dir.display(), "built without the audio feature, playing silently");
        }
        Box::new(PacedDisplay::new(
            self.tx.clone(),
            Duration::from_millis(self.cli.hold_ms),
        ))
    }

    fn start_drill(&mut self) {
        let audio = self.audio_device();
        let timer = ThreadTimer::new(self.tx.clone());
        match Drill::start(
            &mut self.ctx,
            &self.generator,
            &mut rand::thread_rng(),
            audio,
            timer,
            Utc::now(),
        ) {
            Ok(drill) => {
                self.notice = None;
                self.screen = Screen::Drill(Box::new(drill));
            }
            Err(err) => {
                error!(%err, "could not start session");
                self.notice = Some(err.to_string());
            }
        }
    }

    fn back_home(&mut self) {
        self.cursor = HistoryCursor::latest(&self.ctx.snapshot().sessions);
        self.screen = Screen::Home;
    }

    /// Handle one event. Returns false when the app should exit.
    pub fn on_event(&mut self, ev: DrillEvent) -> bool {
        match ev {
            DrillEvent::Key(key) => return self.on_key(key),
            DrillEvent::ClipEnded(_) | DrillEvent::DelayElapsed(_) => {
                if let Screen::Drill(drill) = &mut self.screen {
                    drill.handle(&ev);
                }
            }
            DrillEvent::Tick | DrillEvent::Resize => {}
        }
        true
    }

    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }
        // ctrl+c to quit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            if let Screen::Drill(drill) = &mut self.screen {
                drill.abandon();
            }
            return false;
        }

        match &mut self.screen {
            Screen::Home => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return false,
                KeyCode::Enter | KeyCode::Char('s') => self.start_drill(),
                KeyCode::Left | KeyCode::Char('p') => self.cursor.previous(),
                KeyCode::Right | KeyCode::Char('n') => self.cursor.next(),
                _ => {}
            },
            Screen::Drill(drill) => match key.code {
                KeyCode::Esc => {
                    drill.abandon();
                    self.back_home();
                }
                KeyCode::Enter => {
                    if drill.submit(&mut self.ctx, Utc::now()) == DrillStatus::Finished {
                        self.back_home();
                    }
                }
                KeyCode::Backspace => drill.backspace(),
                KeyCode::Char(c) => drill.push_char(c),
                _ => {}
            },
        }
        true
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().unwrap_or_else(AppDirs::log_path);
    if let Err(err) = logging::init(&log_path) {
        eprintln!("logging disabled: {}", err);
    }

    let state_path = cli.state_file.clone().unwrap_or_else(AppDirs::db_path);
    let mut ctx = ContextHandle::open(open_store_or_memory(&state_path));
    if let Err(err) = apply_overrides(&mut ctx, &cli.overrides()) {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, err).exit();
    }

    if let Some(path) = &cli.export {
        export_csv(&ctx.snapshot().sessions, File::create(path)?)?;
        info!(path = %path.display(), "history exported");
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

    let (tx, events) = ChannelEventSource::channel();
    spawn_terminal_reader(tx.clone());
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    let mut app = App::new(cli, ctx, tx);
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<ChannelEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;
        if !app.on_event(runner.step()) {
            break;
        }
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    let area = f.area();
    match &app.screen {
        Screen::Home => {
            let screen = HomeScreen {
                sessions: &app.ctx.snapshot().sessions,
                cursor: app.cursor,
            };
            f.render_widget(&screen, area);
        }
        Screen::Drill(drill) => {
            let view = drill.view();
            f.render_widget(&DrillScreen { view: &view }, area);
        }
    }

    if let Some(notice) = &app.notice {
        let line = Rect {
            y: area.bottom().saturating_sub(1),
            height: 1.min(area.height),
            ..area
        };
        f.render_widget(
            Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Red)),
            line,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use speedracer::config::Config;
    use speedracer::runtime::DrillEventSource;
    use speedracer::store::MemoryKv;

    fn key(code: KeyCode) -> DrillEvent {
        DrillEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn quick_app(args: &[&str]) -> (App, ChannelEventSource) {
        let mut argv = vec!["speedracer", "--hold-ms", "1"];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);
        let mut ctx = ContextHandle::open(Box::new(MemoryKv::default()));
        ctx.update(|c| AppContext {
            config: Config {
                total_sums: 2,
                questions_each_sum: 2,
                digits: 2,
                delay_between_questions_ms: 0,
                ..Config::default()
            },
            ..c
        })
        .unwrap();
        let (tx, events) = ChannelEventSource::channel();
        (App::new(cli, ctx, tx), events)
    }

    fn pump_until_awaiting(app: &mut App, events: &ChannelEventSource) {
        for _ in 0..100 {
            if let Screen::Drill(drill) = &app.screen {
                if drill.is_awaiting_answer() {
                    return;
                }
            }
            let ev = events
                .recv_timeout(Duration::from_secs(2))
                .expect("playback event");
            assert!(app.on_event(ev));
        }
        panic!("drill never asked for an answer");
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["speedracer"]);
        assert!(cli.overrides().is_empty());
        assert_eq!(cli.audio_dir, PathBuf::from("audio"));
        assert_eq!(cli.hold_ms, 900);
        assert_eq!(cli.export, None);
        assert_eq!(cli.max_draws, None);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "speedracer",
            "-n",
            "10",
            "-q",
            "5",
            "-d",
            "2",
            "--negative-percentage",
            "0.3",
            "--delay-ms",
            "250",
            "-r",
            "1.5",
        ]);
        let o = cli.overrides();
        assert_eq!(o.total_sums, Some(10));
        assert_eq!(o.questions_each_sum, Some(5));
        assert_eq!(o.digits, Some(2));
        assert_eq!(o.negative_percentage, Some(0.3));
        assert_eq!(o.delay_ms, Some(250));
        assert_eq!(o.playback_rate, Some(1.5));
    }

    #[test]
    fn test_apply_overrides_saves_valid_config() {
        let mut ctx = ContextHandle::open(Box::new(MemoryKv::default()));
        let o = ConfigOverrides {
            digits: Some(4),
            ..Default::default()
        };
        apply_overrides(&mut ctx, &o).unwrap();
        assert_eq!(ctx.snapshot().config.digits, 4);
    }

    #[test]
    fn test_apply_overrides_rejects_invalid_config() {
        let mut ctx = ContextHandle::open(Box::new(MemoryKv::default()));
        let o = ConfigOverrides {
            negative_percentage: Some(2.0),
            ..Default::default()
        };
        assert!(apply_overrides(&mut ctx, &o).is_err());
        assert_eq!(ctx.snapshot().config, Config::default());
    }

    #[test]
    fn test_home_navigation_and_quit() {
        let (mut app, _events) = quick_app(&[]);
        assert!(app.on_event(key(KeyCode::Left)));
        assert!(app.on_event(key(KeyCode::Right)));
        assert!(app.on_event(DrillEvent::Tick));
        assert!(!app.on_event(key(KeyCode::Esc)));
    }

    #[test]
    fn test_full_session_returns_home_with_result() {
        let (mut app, events) = quick_app(&[]);
        app.on_event(key(KeyCode::Enter));
        assert!(matches!(app.screen, Screen::Drill(_)));

        for _ in 0..2 {
            pump_until_awaiting(&mut app, &events);
            let expected = match &app.screen {
                Screen::Drill(d) => d.session().expected(d.view().row).unwrap(),
                Screen::Home => unreachable!(),
            };
            for c in expected.to_string().chars() {
                app.on_event(key(KeyCode::Char(c)));
            }
            app.on_event(key(KeyCode::Enter));
        }

        assert!(matches!(app.screen, Screen::Home));
        let sessions = &app.ctx.snapshot().sessions;
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_complete());
        assert_eq!(speedracer::store::score(&sessions[0]), 100);
        assert_eq!(app.cursor.index(), Some(0));
    }

    #[test]
    fn test_escape_leaves_session_unfinished() {
        let (mut app, _events) = quick_app(&[]);
        app.on_event(key(KeyCode::Enter));
        app.on_event(key(KeyCode::Esc));
        assert!(matches!(app.screen, Screen::Home));
        let sessions = &app.ctx.snapshot().sessions;
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].is_complete());
    }

    #[test]
    fn test_generation_cap_shows_notice() {
        let (mut app, _events) = quick_app(&["--max-draws", "5"]);
        app.ctx
            .update(|c| AppContext {
                config: Config {
                    digits: 1,
                    questions_each_sum: 10,
                    ..c.config
                },
                ..c
            })
            .unwrap();
        app.on_event(key(KeyCode::Enter));
        assert!(matches!(app.screen, Screen::Home));
        assert!(app.notice.is_some());
    }

    #[test]
    fn test_ui_renders_both_screens() {
        let (mut app, _events) = quick_app(&[]);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| ui(&app, f)).unwrap();
        app.on_event(key(KeyCode::Enter));
        terminal.draw(|f| ui(&app, f)).unwrap();
    }
}
