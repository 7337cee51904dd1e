use crate::config::GridConfig;
use crate::error::ConfigError;
use crate::piece::{Color, Piece};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Empty,
    Filled(Color),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// The locked cells of the playfield. `cells[y][x]`, row 0 at the top.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Grid {
    config: GridConfig,
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cells: vec![vec![Cell::Empty; config.cols]; config.rows],
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn rows(&self) -> usize {
        self.config.rows
    }

    pub fn cols(&self) -> usize {
        self.config.cols
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Overwrites one cell. Panics if `(x, y)` lies outside the grid.
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y][x] = cell;
    }

    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.iter().map(Vec::as_slice)
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| !c.is_empty()).count()
    }

    /// Whether `piece` may occupy its current position.
    ///
    /// Cells below the floor are illegal, and so is any column off either
    /// side (`x < 0` or `x >= cols`); neither wall lets a cell through.
    /// Cells above row 0 never collide, so a piece can sit partly above the
    /// visible area while it enters.
    pub fn is_legal(&self, piece: &Piece) -> bool {
        let rows = self.config.rows as i32;
        let cols = self.config.cols as i32;

        for (x, y) in piece.cells() {
            if y >= rows {
                return false;
            }
            if x < 0 || x >= cols {
                return false;
            }
            if y < 0 {
                continue;
            }
            if !self.cells[y as usize][x as usize].is_empty() {
                return false;
            }
        }
        true
    }

    /// Paints the piece into the grid.
    ///
    /// Cells above row 0 cannot be stored and are dropped; the return value
    /// is `false` when that happened.
    pub fn lock(&mut self, piece: &Piece) -> bool {
        let mut fits = true;
        for (x, y) in piece.cells() {
            if y < 0 || x < 0 || x >= self.config.cols as i32 || y >= self.config.rows as i32 {
                fits = false;
                continue;
            }
            self.cells[y as usize][x as usize] = Cell::Filled(piece.color());
        }
        fits
    }

    /// One flag per row, `true` when every cell in that row is filled.
    pub fn completed_rows(&self) -> Vec<bool> {
        self.cells
            .iter()
            .map(|row| row.iter().all(|c| !c.is_empty()))
            .collect()
    }

    /// Removes every row flagged in `completed`, shifting the rows above it
    /// down and opening an empty row at the top. Returns how many rows went.
    ///
    /// Rows are visited top to bottom, so removing one never moves a row
    /// that is still waiting to be visited.
    pub fn clear_and_compact(&mut self, completed: &[bool]) -> usize {
        let mut cleared = 0;
        for (y, _) in completed
            .iter()
            .enumerate()
            .take(self.config.rows)
            .filter(|(_, done)| **done)
        {
            self.cells.remove(y);
            self.cells.insert(0, vec![Cell::Empty; self.config.cols]);
            cleared += 1;
        }
        cleared
    }
}
