use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
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
use rooms_agent_core::{
    Action, Flag, RoomId,
    agent::RoomsAgent,
    environment::{
        ActionResult, EpisodeOutcome, RoomLayout, RoomsEnvironment, load_layout_from_string,
    },
    generator::{Difficulty, generate_layout},
    session::SessionRegistry,
};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::debug;

mod logging;

/// Context id used for every episode played by this process.
const LOCAL_CONTEXT: &str = "local";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Layout file to load instead of generating one
    #[arg(short, long, value_name = "LAYOUT_FILE")]
    map: Option<PathBuf>,

    /// Puzzle family to generate when no layout file is given
    #[arg(short, long, value_enum, default_value_t = DifficultyArg::Tutorial)]
    difficulty: DifficultyArg,

    /// Seed for the first generated layout; later episodes add their index
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Number of episodes to play in headless mode
    #[arg(short, long, default_value_t = 3)]
    count: u64,

    /// Play episodes without the terminal UI and print a summary
    #[arg(long)]
    headless: bool,

    /// Milliseconds between agent turns in the terminal UI
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DifficultyArg {
    Tutorial,
    Easy,
    Random,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Tutorial => Difficulty::Tutorial,
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Random => Difficulty::Random,
        }
    }
}

/// Loads the layout file if one was given, otherwise generates episode `index`.
fn layout_for(args: &Args, index: u64) -> Result<RoomLayout> {
    match &args.map {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read layout file {}", path.display()))?;
            load_layout_from_string(&text)
                .with_context(|| format!("Invalid layout file {}", path.display()))
        }
        None => Ok(generate_layout(
            args.difficulty.into(),
            args.seed.wrapping_add(index),
        )),
    }
}

struct App {
    /// The local puzzle host.
    environment: RoomsEnvironment,
    /// The agent playing the episode.
    agent: RoomsAgent,
    /// Every action taken so far with the host's verdict.
    history: Vec<(Action, ActionResult)>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(layout: RoomLayout) -> Self {
        App {
            environment: RoomsEnvironment::new(layout),
            agent: RoomsAgent::new(),
            history: Vec::new(),
            should_quit: false,
        }
    }

    /// Plays one agent turn.
    fn tick(&mut self) {
        if let Some(turn) = self.environment.step(&mut self.agent) {
            self.history.push(turn);
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.headless {
        logging::init();
        return run_headless(&args);
    }

    let layout = layout_for(&args, 0)?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Create the application state
    let mut app = App::new(layout);

    // Run the main application loop
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

/// Plays `args.count` episodes through the session registry, as a remote host would.
fn run_headless(args: &Args) -> Result<()> {
    let mut registry: SessionRegistry = SessionRegistry::new();
    let mut solved = 0;

    for index in 0..args.count {
        let mut environment = RoomsEnvironment::new(layout_for(args, index)?);

        while !environment.is_over() {
            let prompt = environment.render_prompt();
            let response = registry
                .respond(LOCAL_CONTEXT, &prompt)
                .context("Failed to encode agent response")?;
            let action = Action::from_json(&response)
                .with_context(|| format!("Agent produced an unreadable action: {response}"))?;
            let result = environment.process_action(action);
            debug!(episode = index, %action, ?result, "turn played");
        }

        let outcome = environment.outcome().unwrap_or(EpisodeOutcome::OutOfSteps);
        if outcome == EpisodeOutcome::Won {
            solved += 1;
        }
        println!(
            "episode {} ({}): {:?} after {} turns",
            index + 1,
            match &args.map {
                Some(path) => path.display().to_string(),
                None => format!(
                    "{} seed {}",
                    Difficulty::from(args.difficulty).name(),
                    args.seed.wrapping_add(index)
                ),
            },
            outcome,
            environment.moves()
        );
    }

    println!("solved {}/{}", solved, args.count);
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
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
        // Draw the UI
        terminal.draw(|f| ui(f, app))?;

        // Calculate timeout for event polling
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // Poll for events (keyboard, mouse, etc.)
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                    app.quit();
                }
            }
        }

        // Play a turn if enough time has passed
        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        // Exit loop if requested
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
            Constraint::Percentage(55), // Rooms and knowledge
            Constraint::Percentage(35), // Action log
            Constraint::Percentage(10), // Status/help
        ])
        .split(frame.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_layout[0]);

    render_rooms(frame, top[0], app);
    render_knowledge(frame, top[1], app);
    render_history(frame, main_layout[1], &app.history);
    render_status(frame, main_layout[2], &app.environment);
}

/// Styles one belief flag: `?` unknown, `-` false, the marker when true.
fn flag_cell(flag: Flag, marker: &'static str, color: Color) -> Cell<'static> {
    match flag {
        Flag::Unknown => Cell::from(Span::styled("?", Style::default().fg(Color::DarkGray))),
        Flag::False => Cell::from("-"),
        Flag::True => Cell::from(Span::styled(marker, Style::default().fg(color).bold())),
    }
}

/// Renders the agent's per-room beliefs, marking where the agent stands.
fn render_rooms(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.agent.state();
    let position = app.environment.position();

    let rows: Vec<Row> = (0..app.environment.layout().room_count)
        .map(|room| {
            let label = if room == position {
                Span::styled(format!("@{}", room), Style::default().fg(Color::Red).bold())
            } else {
                Span::raw(format!(" {}", room))
            };
            Row::new(vec![
                Cell::from(label),
                flag_cell(state.visited[room], "v", Color::White),
                flag_cell(state.inspected[room], "i", Color::White),
                flag_cell(state.locked[room], "L", Color::Red),
                flag_cell(state.has_key[room], "k", Color::Yellow),
                flag_cell(state.is_exit[room], "E", Color::Green),
            ])
        })
        .collect();

    let header = Row::new(vec!["Room", "Vis", "Insp", "Lock", "Key", "Exit"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(rows, [Constraint::Length(5); 6])
        .header(header)
        .block(Block::default().title("Rooms").borders(Borders::ALL));

    frame.render_widget(table, area);
}

fn format_rooms(rooms: impl Iterator<Item = RoomId>) -> String {
    rooms
        .map(|room| room.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Renders discovered edges, the planned route and the exploration frontier.
fn render_knowledge(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.agent.state();

    let mut lines = vec![
        Line::from(format!(
            "Route: {}",
            if state.route.is_empty() {
                "none".to_string()
            } else {
                format_rooms(state.route.iter().copied())
            }
        )),
        Line::from(format!(
            "Frontier: {:?}",
            state.frontier.queued().collect::<Vec<_>>()
        )),
        Line::from(format!(
            "Exit: {}  Key: {}",
            state.exit_room.map_or("?".to_string(), |room| room.to_string()),
            state.key_room.map_or("?".to_string(), |room| room.to_string())
        )),
        Line::from(Span::styled("Edges", Style::default().bold())),
    ];
    lines.extend(
        state
            .adjacency
            .edges()
            .map(|(a, b)| Line::from(format!("  {} - {}", a, b))),
    );

    let paragraph =
        Paragraph::new(lines).block(Block::default().title("Knowledge").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Renders the most recent actions, newest last.
fn render_history(frame: &mut Frame, area: Rect, history: &[(Action, ActionResult)]) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = history.len().saturating_sub(visible);

    let items: Vec<ListItem> = history
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(index, (action, result))| {
            let verdict = match result {
                ActionResult::Success => Span::styled("ok", Style::default().fg(Color::Green)),
                ActionResult::Win => Span::styled("WIN", Style::default().fg(Color::Green).bold()),
                ActionResult::Failure(reason) => {
                    Span::styled(reason.clone(), Style::default().fg(Color::Red))
                }
            };
            ListItem::from(Line::from(vec![
                Span::raw(format!("#{:<3} {:<8} ", index + 1, action.to_string())),
                verdict,
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Actions"));
    frame.render_widget(list, area);
}

fn render_status(frame: &mut Frame, area: Rect, environment: &RoomsEnvironment) {
    let outcome = match environment.outcome() {
        Some(EpisodeOutcome::Won) => "solved",
        Some(EpisodeOutcome::OutOfSteps) => "out of steps",
        None => "running",
    };
    let status = format!(
        "{} | move {} | steps left {} | keys {} | {} | 'q'/'Esc' to quit",
        environment.phase().as_str(),
        environment.moves(),
        environment.steps_remaining(),
        environment.keys_held(),
        outcome
    );
    let status_text = Paragraph::new(status)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_text, area);
}
