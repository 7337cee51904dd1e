pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod input;
pub mod piece;

pub use config::{GameConfig, GridConfig, RepeatConfig, TimingConfig};
pub use error::ConfigError;
pub use game::{Flow, Game, Phase, PieceProvider, RandomPieceProvider, SequencePieceProvider};
pub use grid::{Cell, Grid};
pub use input::{Action, DirectionLock, InputState, KeyBindings};
pub use piece::{Color, Piece, PieceKind};
