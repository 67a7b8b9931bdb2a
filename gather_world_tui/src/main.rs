use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gather_world_core::{
    Position,
    agent::{ActionSource, HarvestPlanner, RandomActions},
    config::Config,
    episode::{EpisodeRunner, EpisodeStats},
    simulation::GridSimulation,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when it does not exist
    #[arg(short, long, value_name = "CONFIG_FILE", default_value = "gather_world.toml")]
    config: PathBuf,

    /// Overrides the seed from the configuration file
    #[arg(short, long)]
    seed: Option<u64>,

    /// How ship and shipyard actions are chosen
    #[arg(short, long, value_enum, default_value_t = Policy::Planner)]
    policy: Policy,

    /// Run without the terminal UI and log progress to stderr
    #[arg(long)]
    headless: bool,

    /// Episodes to run in headless mode
    #[arg(short, long, default_value_t = 1)]
    episodes: usize,

    /// Milliseconds between simulation ticks in the terminal UI
    #[arg(long, default_value_t = 150)]
    tick_ms: u64,

    /// Write logs to this file while the terminal UI is running
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Policy {
    Random,
    Planner,
}

impl Policy {
    fn source(self, seed: u64) -> Box<dyn ActionSource> {
        match self {
            Policy::Random => Box::new(RandomActions::new(seed)),
            Policy::Planner => Box::new(HarvestPlanner::default()),
        }
    }
}

type Runner = EpisodeRunner<Box<dyn ActionSource>>;

struct App {
    runner: Runner,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
}

impl App {
    fn new(runner: Runner) -> Self {
        App {
            runner,
            should_quit: false,
            paused: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) -> Result<()> {
        self.runner.tick()?;
        Ok(())
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let source = args.policy.source(config.seed);
    let runner = EpisodeRunner::new(config, source).context("generating the first board")?;

    if args.headless {
        return run_headless(runner, args.episodes);
    }

    let mut terminal = setup_terminal()?;
    let mut app = App::new(runner);
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    result
}

/// Installs the global subscriber. The terminal UI owns stdout, so logs only
/// go to a file there, and only when one was requested.
fn init_tracing(args: &Args) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    } else if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

fn run_headless(mut runner: Runner, episodes: usize) -> Result<()> {
    let history = runner.run(episodes)?;
    let total_transitions: usize = history.iter().map(|stats| stats.transitions).sum();
    info!(
        episodes = history.len(),
        transitions = total_transitions,
        stored = runner.replay().len(),
        "collection finished"
    );

    let batch_size = runner.config().replay.batch_size.min(runner.replay().len());
    if batch_size > 0 {
        let batch = runner.replay_mut().sample(batch_size);
        let mean = batch.iter().map(|t| t.reward).sum::<f32>() / batch_size as f32;
        let terminal = batch.iter().filter(|t| !t.is_non_terminal).count();
        info!(batch_size, mean_return = mean, terminal, "sampled replay batch");
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.toggle_pause(),
                    KeyCode::Char('n') if app.paused => app.tick()?,
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if !app.paused {
                app.tick()?;
            }
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(2),
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_board(frame, top[0], app.runner.simulation());
    render_stats(frame, top[1], &app.runner);
    render_history(frame, main_layout[1], app.runner.history());

    let help = if app.paused {
        "Paused. 'Space' resumes, 'n' steps, 'q' or 'Esc' quits."
    } else {
        "'Space' pauses, 'q' or 'Esc' quits."
    };
    let help_text = Paragraph::new(help)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders ships, shipyards and the halite field onto the frame.
fn render_board(frame: &mut Frame, area: Rect, simulation: &GridSimulation) {
    let halite = simulation.halite();
    let cap = simulation.config().max_cell_halite;
    let mut lines: Vec<Line> = Vec::with_capacity(halite.height());

    for y in 0..halite.height() {
        let mut spans: Vec<Span> = Vec::with_capacity(halite.width());
        for x in 0..halite.width() {
            let position = Position::new(x, y);
            let span = if simulation.ship_at(position).is_some() {
                let style = if simulation.has_shipyard_at(position) {
                    Style::default().fg(Color::Red).bg(Color::Green).bold()
                } else {
                    Style::default().fg(Color::Red).bold()
                };
                Span::styled("@ ", style)
            } else if simulation.has_shipyard_at(position) {
                Span::styled("Y ", Style::default().fg(Color::Green).bold())
            } else {
                halite_span(halite[position] / cap)
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }

    let title = format!("Gather World (step {})", simulation.step_count());
    let board = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(board, area);
}

fn halite_span(level: f32) -> Span<'static> {
    match level {
        l if l <= 0.01 => Span::raw("  "),
        l if l < 0.1 => Span::styled(". ", Style::default().fg(Color::DarkGray)),
        l if l < 0.3 => Span::styled(": ", Style::default().fg(Color::Yellow)),
        l if l < 0.6 => Span::styled("* ", Style::default().fg(Color::Yellow)),
        _ => Span::styled("# ", Style::default().fg(Color::LightYellow).bold()),
    }
}

/// Renders the running episode's statistics and the latest rewards.
fn render_stats(frame: &mut Frame, area: Rect, runner: &Runner) {
    let simulation = runner.simulation();
    let stats = runner.stats();
    let mut items = vec![
        ListItem::new(format!("Episode: {}", stats.episode)),
        ListItem::new(format!(
            "Step: {}/{}",
            simulation.step_count(),
            simulation.config().episode_steps
        )),
        ListItem::new(format!("Halite: {:.1}", simulation.player_halite())),
        ListItem::new(format!("Cargo: {:.1}", simulation.total_cargo())),
        ListItem::new(format!(
            "Ships: {}  Shipyards: {}",
            simulation.ship_count(),
            simulation.shipyard_count()
        )),
        ListItem::new(format!("Deposited: {:.1}", stats.deposited)),
        ListItem::new(format!(
            "Collisions: {}  Spawns: {}",
            stats.collisions, stats.spawns
        )),
        ListItem::new(format!("Reward: {:.3}", stats.reward)),
        ListItem::new(format!(
            "Replay: {}/{}",
            runner.replay().len(),
            runner.replay().capacity()
        )),
    ];
    items.extend(runner.last_rewards().iter().map(|(id, reward)| {
        let cargo = simulation.ship(*id).map_or(0.0, |ship| ship.cargo);
        ListItem::new(Line::from(vec![
            Span::styled(format!("ship {id:>3}"), Style::default().fg(Color::Red)),
            Span::raw(format!("  reward {reward:>7.3}  cargo {cargo:>6.1}")),
        ]))
    }));

    let widget = List::new(items).block(Block::default().borders(Borders::ALL).title("Stats"));
    frame.render_widget(widget, area);
}

fn render_history(frame: &mut Frame, area: Rect, history: &[EpisodeStats]) {
    let items: Vec<ListItem> = history
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|stats| {
            ListItem::new(format!(
                "#{:<3} halite {:>8.1}  deposited {:>8.1}  reward {:>8.2}  transitions {}",
                stats.episode, stats.final_halite, stats.deposited, stats.reward, stats.transitions
            ))
        })
        .collect();
    let widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Finished episodes"));
    frame.render_widget(widget, area);
}
