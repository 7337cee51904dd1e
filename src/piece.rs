use rand::Rng;

use crate::config::GridConfig;
use crate::error::ConfigError;

// ============================================================================
// Types
// ============================================================================

/// Identity tag painted into the grid when a piece locks.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Orange,
    Aqua,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    O,
    I,
    T,
    S,
    Z,
    L,
    J,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::O,
        PieceKind::I,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::L,
        PieceKind::J,
    ];

    /// Spawn orientation, already normalized.
    pub fn shape(&self) -> &'static [(i32, i32)] {
        match self {
            PieceKind::O => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            PieceKind::I => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            PieceKind::T => &[(0, 0), (1, 0), (2, 0), (1, 1)],
            PieceKind::S => &[(1, 0), (2, 0), (1, 1), (0, 1)],
            PieceKind::Z => &[(0, 0), (1, 0), (1, 1), (2, 1)],
            PieceKind::L => &[(0, 0), (0, 1), (0, 2), (1, 2)],
            PieceKind::J => &[(1, 0), (1, 1), (1, 2), (0, 2)],
        }
    }

    pub fn color(&self) -> Color {
        match self {
            PieceKind::O => Color::Red,
            PieceKind::I => Color::Green,
            PieceKind::T => Color::Blue,
            PieceKind::S => Color::Yellow,
            PieceKind::Z => Color::Purple,
            PieceKind::L => Color::Orange,
            PieceKind::J => Color::Aqua,
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// A piece on (or above) the grid.
///
/// `x`/`y` is the top-left corner of the bounding box; `y` is negative while
/// the piece is still entering from above. Offsets in `shape` are always
/// normalized so that the smallest x and the smallest y are both zero.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Piece {
    pub x: i32,
    pub y: i32,
    shape: Vec<(i32, i32)>,
    color: Color,
    width: i32,
    height: i32,
}

// ============================================================================
// Construction
// ============================================================================

impl Piece {
    /// Builds a piece at the origin from arbitrary offsets.
    pub fn new(shape: Vec<(i32, i32)>, color: Color) -> Result<Self, ConfigError> {
        if shape.is_empty() {
            return Err(ConfigError::EmptyShape);
        }
        let mut piece = Self {
            x: 0,
            y: 0,
            shape,
            color,
            width: 0,
            height: 0,
        };
        piece.normalize();
        Ok(piece)
    }

    pub fn from_kind(kind: PieceKind) -> Self {
        let mut piece = Self {
            x: 0,
            y: 0,
            shape: kind.shape().to_vec(),
            color: kind.color(),
            width: 0,
            height: 0,
        };
        piece.update_dimensions();
        piece
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Random kind, random legal column, bottom edge resting just above row
    /// 0, then up to three quarter turns. Each turn only happens if the
    /// previous one did, with even odds.
    pub fn spawn<R: Rng>(grid: &GridConfig, rng: &mut R) -> Self {
        let mut piece = Self::from_kind(PieceKind::random(rng));

        let max_x = (grid.cols as i32 - piece.width).max(0);
        piece.x = rng.gen_range(0..=max_x);
        piece.y = -piece.height;

        for _ in 0..3 {
            if !rng.gen_bool(0.5) {
                break;
            }
            piece.rotate(grid);
        }

        piece
    }
}

// ============================================================================
// Geometry
// ============================================================================

impl Piece {
    pub fn shape(&self) -> &[(i32, i32)] {
        &self.shape
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Absolute grid coordinates of every occupied cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .iter()
            .map(move |&(dx, dy)| (self.x + dx, self.y + dy))
    }

    pub fn moved(&self, dx: i32, dy: i32) -> Self {
        let mut piece = self.clone();
        piece.x += dx;
        piece.y += dy;
        piece
    }

    /// Quarter turn `(x, y) -> (y, -x)`, renormalized and clamped back into
    /// the grid. The caller decides whether the result is legal.
    pub fn rotated(&self, grid: &GridConfig) -> Self {
        let mut piece = self.clone();
        piece.rotate(grid);
        piece
    }

    pub fn rotate(&mut self, grid: &GridConfig) {
        for cell in &mut self.shape {
            *cell = (cell.1, -cell.0);
        }
        self.normalize();
        self.keep_in_bound(grid);
    }

    /// Pulls the piece back between the side walls and above the floor.
    /// Negative `y` is left alone.
    pub fn keep_in_bound(&mut self, grid: &GridConfig) {
        let cols = grid.cols as i32;
        let rows = grid.rows as i32;

        if self.x + self.width > cols {
            self.x = cols - self.width;
        }
        if self.x < 0 {
            self.x = 0;
        }

        if self.y + self.height > rows {
            self.y = rows - self.height;
        }
    }

    fn normalize(&mut self) {
        let min_x = self.shape.iter().map(|c| c.0).min().unwrap_or(0);
        let min_y = self.shape.iter().map(|c| c.1).min().unwrap_or(0);
        for cell in &mut self.shape {
            cell.0 -= min_x;
            cell.1 -= min_y;
        }
        self.update_dimensions();
    }

    fn update_dimensions(&mut self) {
        self.width = self.shape.iter().map(|c| c.0).max().unwrap_or(0) + 1;
        self.height = self.shape.iter().map(|c| c.1).max().unwrap_or(0) + 1;
    }
}
