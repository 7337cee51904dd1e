use thiserror::Error;

/// Rejections raised while building a grid, a piece or a game.
///
/// None of these can happen once a [`Game`](crate::game::Game) exists: the
/// per-frame path is total over well-formed state.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    #[error("grid must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("piece shape has no cells")]
    EmptyShape,
    #[error("piece sequence is empty")]
    EmptySequence,
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("minimum fall interval ({min_ms}ms) exceeds the starting interval ({start_ms}ms)")]
    FloorAboveStart { min_ms: u128, start_ms: u128 },
}
