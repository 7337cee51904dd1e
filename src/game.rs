use std::mem;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{GameConfig, GridConfig};
use crate::error::ConfigError;
use crate::grid::{Cell, Grid};
use crate::input::{Action, DirectionLock, InputState};
use crate::piece::Piece;

// ============================================================================
// Types
// ============================================================================

/// Where the game stands between frames.
///
/// Locking and line clearing happen inside a single [`Game::update`] call
/// and are never observed from outside.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Falling,
    /// A piece locked while still poking above row 0. Gravity and movement
    /// stop; only the quit action is honoured.
    GameOver,
    Terminated,
}

/// What the host loop should do after a frame.
#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Terminate,
}

// ============================================================================
// Piece Provider Trait
// ============================================================================

pub trait PieceProvider {
    fn next_piece(&mut self, grid: &GridConfig) -> Piece;
}

pub struct RandomPieceProvider {
    rng: StdRng,
}

impl RandomPieceProvider {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPieceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceProvider for RandomPieceProvider {
    fn next_piece(&mut self, grid: &GridConfig) -> Piece {
        Piece::spawn(grid, &mut self.rng)
    }
}

/// Hands out clones of a fixed list, in order, forever. Positions are kept
/// as given.
pub struct SequencePieceProvider {
    pieces: Vec<Piece>,
    index: usize,
}

impl SequencePieceProvider {
    pub fn new(pieces: Vec<Piece>) -> Result<Self, ConfigError> {
        if pieces.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        Ok(Self { pieces, index: 0 })
    }
}

impl PieceProvider for SequencePieceProvider {
    fn next_piece(&mut self, _grid: &GridConfig) -> Piece {
        let piece = self.pieces[self.index % self.pieces.len()].clone();
        self.index += 1;
        piece
    }
}

// ============================================================================
// Game
// ============================================================================

pub struct Game {
    config: GameConfig,
    grid: Grid,
    active: Piece,
    next: Piece,
    score: u32,
    phase: Phase,
    direction: DirectionLock,
    soft_dropping: bool,
    elapsed: Duration,
    prev_time: Instant,
    /// Interval gravity currently runs at.
    fall_interval: Duration,
    /// Normal-speed interval; what `fall_interval` returns to after a soft drop.
    delay_interval: Duration,
    provider: Box<dyn PieceProvider>,
}

impl Game {
    pub fn new(config: GameConfig, now: Instant) -> Result<Self, ConfigError> {
        Self::with_provider(config, Box::new(RandomPieceProvider::new()), now)
    }

    pub fn with_provider(
        config: GameConfig,
        provider: Box<dyn PieceProvider>,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        let grid = Grid::new(config.grid)?;
        Self::with_grid(config, grid, provider, now)
    }

    /// Starts from a prepared grid. The grid's dimensions override
    /// `config.grid`.
    pub fn with_grid(
        mut config: GameConfig,
        grid: Grid,
        mut provider: Box<dyn PieceProvider>,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        config.grid = *grid.config();
        config.validate()?;

        let active = provider.next_piece(&config.grid);
        let next = provider.next_piece(&config.grid);

        Ok(Self {
            config,
            grid,
            active,
            next,
            score: 0,
            phase: Phase::Falling,
            direction: DirectionLock::Unlocked,
            soft_dropping: false,
            elapsed: Duration::ZERO,
            prev_time: now,
            fall_interval: config.timing.fall_interval,
            delay_interval: config.timing.fall_interval,
            provider,
        })
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Advances one frame: input first, then gravity, then line clears.
    ///
    /// `input` must already hold this frame's snapshot. `now` is the frame's
    /// wall-clock time; gravity runs on the real time since the previous
    /// call, whatever the frame rate.
    pub fn update(&mut self, input: &InputState, now: Instant) -> Flow {
        if self.phase == Phase::Terminated {
            return Flow::Terminate;
        }
        if input.was_pressed(Action::Pause) {
            info!("quit requested with score {}", self.score);
            self.phase = Phase::Terminated;
            return Flow::Terminate;
        }
        if self.phase == Phase::GameOver {
            self.prev_time = now;
            return Flow::Continue;
        }

        self.handle_input(input);

        self.elapsed += now.saturating_duration_since(self.prev_time);
        self.prev_time = now;

        if self.elapsed >= self.fall_interval {
            self.elapsed = Duration::ZERO;
            self.apply_gravity();
        }

        Flow::Continue
    }

    fn handle_input(&mut self, input: &InputState) {
        if input.was_pressed(Action::Rotate) || input.was_pressed(Action::Confirm) {
            self.rotate_piece();
        }

        let dx = self.direction.resolve(&input.horizontal());
        if dx != 0 {
            self.shift_piece(dx);
        }

        if input.is_down(Action::SoftDrop) {
            self.soft_dropping = true;
            self.fall_interval = self.config.timing.soft_drop_interval;
        } else if input.was_released(Action::SoftDrop) {
            self.soft_dropping = false;
            self.fall_interval = self.delay_interval;
        }
    }

    // ------------------------------------------------------------------------
    // Piece actions
    // ------------------------------------------------------------------------

    /// Rotates the active piece if the turned (and re-clamped) shape fits.
    /// No wall kicks: a blocked rotation leaves the piece untouched.
    pub fn rotate_piece(&mut self) -> bool {
        if self.phase != Phase::Falling {
            return false;
        }
        let rotated = self.active.rotated(&self.config.grid);
        if self.grid.is_legal(&rotated) {
            self.active = rotated;
            true
        } else {
            false
        }
    }

    /// Moves the active piece `dx` columns, clamped to the walls. A step into
    /// locked cells is reverted.
    pub fn shift_piece(&mut self, dx: i32) -> bool {
        if self.phase != Phase::Falling {
            return false;
        }
        let mut moved = self.active.moved(dx, 0);
        moved.keep_in_bound(&self.config.grid);
        if moved.x != self.active.x && self.grid.is_legal(&moved) {
            self.active = moved;
            true
        } else {
            false
        }
    }

    fn apply_gravity(&mut self) {
        let fallen = self.active.moved(0, 1);
        if self.grid.is_legal(&fallen) {
            self.active = fallen;
            return;
        }

        self.lock_active();
        if self.phase == Phase::Falling {
            self.clear_lines();
        }
    }

    fn lock_active(&mut self) {
        let fits = self.grid.lock(&self.active);
        debug!(
            "locked {:?} piece at ({}, {})",
            self.active.color(),
            self.active.x,
            self.active.y
        );
        if !fits {
            info!("topped out with score {}", self.score);
            self.phase = Phase::GameOver;
            return;
        }

        let fresh = self.provider.next_piece(&self.config.grid);
        self.active = mem::replace(&mut self.next, fresh);
    }

    /// Removes completed rows, scores one point per row and speeds gravity up
    /// by one step per row. Returns the number of rows removed.
    pub fn clear_lines(&mut self) -> usize {
        let completed = self.grid.completed_rows();
        if !completed.contains(&true) {
            return 0;
        }

        let cleared = self.grid.clear_and_compact(&completed);
        self.score += cleared as u32;
        for _ in 0..cleared {
            self.delay_interval = self.config.timing.accelerate(self.delay_interval);
        }
        if !self.soft_dropping {
            self.fall_interval = self.delay_interval;
        }

        info!(
            "cleared {} row(s), score {}, fall interval {}ms",
            cleared,
            self.score,
            self.delay_interval.as_millis()
        );
        cleared
    }

    // ------------------------------------------------------------------------
    // Read access for the renderer
    // ------------------------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn active(&self) -> &Piece {
        &self.active
    }

    pub fn next(&self) -> &Piece {
        &self.next
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn direction_lock(&self) -> DirectionLock {
        self.direction
    }

    pub fn fall_interval(&self) -> Duration {
        self.fall_interval
    }

    pub fn delay_interval(&self) -> Duration {
        self.delay_interval
    }

    /// The grid with the active piece painted over it. Cells of the piece
    /// that are still above row 0 are left out.
    pub fn visible_cells(&self) -> Vec<Vec<Cell>> {
        let mut cells: Vec<Vec<Cell>> = self.grid.iter_rows().map(<[Cell]>::to_vec).collect();
        let rows = self.grid.rows() as i32;
        let cols = self.grid.cols() as i32;

        for (x, y) in self.active.cells() {
            if (0..rows).contains(&y) && (0..cols).contains(&x) {
                cells[y as usize][x as usize] = Cell::Filled(self.active.color());
            }
        }

        cells
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;
    use crate::piece::Color;

    pub fn empty_grid(rows: usize, cols: usize) -> Grid {
        Grid::new(GridConfig { rows, cols }).expect("non-empty test grid")
    }

    pub fn fill_row(grid: &mut Grid, y: usize) {
        for x in 0..grid.cols() {
            grid.set(x, y, Cell::Filled(Color::Blue));
        }
    }

    pub fn fill_row_with_gap(grid: &mut Grid, y: usize, gap_x: usize) {
        for x in 0..grid.cols() {
            if x != gap_x {
                grid.set(x, y, Cell::Filled(Color::Blue));
            }
        }
    }

    pub fn single_cell(color: Color) -> Piece {
        Piece::new(vec![(0, 0)], color).expect("one-cell shape")
    }

    pub fn sequence(pieces: Vec<Piece>) -> Box<dyn PieceProvider> {
        Box::new(SequencePieceProvider::new(pieces).expect("non-empty sequence"))
    }
}
