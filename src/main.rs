use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{self, stdout, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        self, Event, KeyCode, KeyEventKind, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    ExecutableCommand,
};
use log::{info, warn};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use falling_blocks::{
    Cell, Flow, Game, GameConfig, InputState, KeyBindings, Phase, Piece, RandomPieceProvider,
    RepeatConfig, TimingConfig,
};

// ============================================================================
// Command Line
// ============================================================================

/// Falling-block puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Starting gravity interval.
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    fall_ms: u64,

    /// Gravity interval while soft drop is held.
    #[arg(long, default_value_t = 20, value_name = "MS")]
    soft_drop_ms: u64,

    /// How much faster gravity gets per cleared row.
    #[arg(long, default_value_t = 100, value_name = "MS")]
    speedup_ms: u64,

    /// Fastest gravity interval reachable by clearing rows.
    #[arg(long, default_value_t = 100, value_name = "MS")]
    min_fall_ms: u64,

    /// Hold time before a movement key starts repeating.
    #[arg(long, default_value_t = 170, value_name = "MS")]
    repeat_delay_ms: u64,

    /// Time between repeated moves while a key is held.
    #[arg(long, default_value_t = 50, value_name = "MS")]
    repeat_interval_ms: u64,

    /// Seed for piece selection. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Write logs to this file (filter with RUST_LOG, default "info").
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            grid: Default::default(),
            timing: TimingConfig {
                fall_interval: Duration::from_millis(self.fall_ms),
                soft_drop_interval: Duration::from_millis(self.soft_drop_ms),
                speedup_step: Duration::from_millis(self.speedup_ms),
                min_fall_interval: Duration::from_millis(self.min_fall_ms),
            },
            repeat: RepeatConfig {
                delay: Duration::from_millis(self.repeat_delay_ms),
                interval: Duration::from_millis(self.repeat_interval_ms),
            },
        }
    }
}

fn init_logging(path: Option<&PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

// ============================================================================
// Visual Constants
// ============================================================================

const FRAME: Duration = Duration::from_millis(16);
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = "  ";
const CELL_WIDTH: u16 = 2;
const PREVIEW_SIZE: u16 = 4;

/// Without key-release events, a key counts as up once no press or repeat
/// has arrived for this long.
const RELEASE_TIMEOUT: Duration = Duration::from_millis(150);

// ============================================================================
// Color Mapping
// ============================================================================

fn cell_color(color: falling_blocks::Color) -> Color {
    use falling_blocks::Color as C;
    match color {
        C::Red => Color::Red,
        C::Green => Color::Green,
        C::Blue => Color::Blue,
        C::Yellow => Color::Yellow,
        C::Purple => Color::Magenta,
        C::Orange => Color::Rgb(255, 165, 0),
        C::Aqua => Color::Cyan,
    }
}

// ============================================================================
// Raw Input
// ============================================================================

/// Turns crossterm key events into a key-down snapshot per frame.
struct KeyTracker {
    reports_release: bool,
    last_seen: HashMap<KeyCode, Instant>,
    tapped: HashSet<KeyCode>,
}

impl KeyTracker {
    fn new(reports_release: bool) -> Self {
        Self {
            reports_release,
            last_seen: HashMap::new(),
            tapped: HashSet::new(),
        }
    }

    fn record(&mut self, code: KeyCode, kind: KeyEventKind, now: Instant) {
        match kind {
            KeyEventKind::Press => {
                self.tapped.insert(code);
                self.last_seen.insert(code, now);
            }
            KeyEventKind::Repeat => {
                self.last_seen.insert(code, now);
            }
            KeyEventKind::Release => {
                self.last_seen.remove(&code);
            }
        }
    }

    /// Keys down this frame. A key pressed and released between two frames
    /// still shows up once.
    fn snapshot(&mut self, now: Instant) -> HashSet<KeyCode> {
        if !self.reports_release {
            self.last_seen
                .retain(|_, seen| now.saturating_duration_since(*seen) < RELEASE_TIMEOUT);
        }
        let mut down: HashSet<KeyCode> = self.last_seen.keys().copied().collect();
        down.extend(self.tapped.drain());
        down
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, game: &Game) {
    let area = frame.size();
    render_game(frame, game, area);
    if game.phase() == Phase::GameOver {
        render_game_over(frame, game, area);
    }
}

fn render_game(frame: &mut Frame, game: &Game, area: Rect) {
    let grid_display_width = (game.grid().cols() as u16 * CELL_WIDTH) + 2;
    let grid_display_height = game.grid().rows() as u16 + 2;
    let side_width = PREVIEW_SIZE * CELL_WIDTH + 4;
    let total_width = grid_display_width + side_width;
    let total_height = grid_display_height + 2;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(side_width),
    ])
    .split(vertical[0]);

    let side = Layout::vertical([
        Constraint::Length(PREVIEW_SIZE + 2),
        Constraint::Length(4),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    render_grid(frame, game, horizontal[0]);
    render_preview(frame, game.next(), side[0]);
    render_score(frame, game, side[1]);

    let controls = Paragraph::new(Line::from(
        "←→/AD: Move | ↑/W/Enter: Rotate | ↓/S: Drop | Esc/Q: Quit",
    ))
    .alignment(Alignment::Center)
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(controls, vertical[1]);
}

fn render_grid(frame: &mut Frame, game: &Game, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = game
        .visible_cells()
        .into_iter()
        .map(|row| {
            let spans = row
                .into_iter()
                .map(|cell| match cell {
                    Cell::Empty => Span::raw(EMPTY_CHAR),
                    Cell::Filled(color) => {
                        Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(color)))
                    }
                })
                .collect::<Vec<_>>();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_preview(frame: &mut Frame, piece: &Piece, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let style = Style::default().fg(cell_color(piece.color()));
    let lines: Vec<Line> = (0..piece.height())
        .map(|y| {
            let spans = (0..piece.width())
                .map(|x| {
                    if piece.shape().contains(&(x, y)) {
                        Span::styled(BLOCK_CHAR, style)
                    } else {
                        Span::raw(EMPTY_CHAR)
                    }
                })
                .collect::<Vec<_>>();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_score(frame: &mut Frame, game: &Game, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Score ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(format!("{:04}", game.score())),
        Line::from(Span::styled(
            format!("{}ms", game.delay_interval().as_millis()),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_game_over(frame: &mut Frame, game: &Game, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", game.score())),
        Line::from(""),
        Line::from(Span::styled(
            "Press ESC to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(paragraph, centered_rect(24, 9, area));
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    args: &Args,
    reports_release: bool,
) -> Result<()> {
    let config = args.game_config();
    let provider = match args.seed {
        Some(seed) => RandomPieceProvider::seeded(seed),
        None => RandomPieceProvider::new(),
    };

    let start = Instant::now();
    let mut game = Game::with_provider(config, Box::new(provider), start)
        .context("invalid game configuration")?;
    let mut input = InputState::new(KeyBindings::default(), config.repeat);
    let mut keys = KeyTracker::new(reports_release);
    let mut last_frame = start;

    loop {
        terminal.draw(|frame| render(frame, &game))?;

        // Collect key events until the next frame is due.
        let deadline = last_frame + FRAME;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            if !event::poll(timeout)? {
                break;
            }
            if let Event::Key(key) = event::read()? {
                keys.record(key.code, key.kind, Instant::now());
            }
        }

        let now = Instant::now();
        input.update(&keys.snapshot(now), now.saturating_duration_since(last_frame));
        last_frame = now;

        if game.update(&input, now) == Flow::Terminate {
            return Ok(());
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    // Setup terminal
    enable_raw_mode().context("cannot enable raw mode")?;
    undo_on_error(stdout().execute(EnterAlternateScreen).map(drop), || {
        let _ = disable_raw_mode();
    })
    .context("cannot enter alternate screen")?;
    let reports_release = supports_keyboard_enhancement().unwrap_or(false)
        && stdout()
            .execute(PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
            ))
            .is_ok();
    if !reports_release {
        warn!("terminal does not report key releases, using a release timeout");
    }

    let result = Terminal::new(CrosstermBackend::new(stdout()))
        .map_err(anyhow::Error::from)
        .and_then(|mut terminal| run(&mut terminal, &args, reports_release));

    // Restore terminal
    if reports_release {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    restore_terminal().context("cannot restore terminal")?;

    info!("exiting");
    result
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Runs `undo` when a setup step failed, then hands the error back.
fn undo_on_error<T>(step: io::Result<T>, undo: impl FnOnce()) -> io::Result<T> {
    step.map_err(|err| {
        undo();
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_setup_step_runs_undo() {
        let mut undone = false;
        let result: io::Result<()> = undo_on_error(
            Err(io::Error::new(io::ErrorKind::Other, "no alternate screen")),
            || undone = true,
        );
        assert!(result.is_err());
        assert!(undone);
    }

    #[test]
    fn successful_setup_step_keeps_state() {
        let mut undone = false;
        let result = undo_on_error(Ok(3), || undone = true);
        assert_eq!(result.unwrap(), 3);
        assert!(!undone);
    }
}
