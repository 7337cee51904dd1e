use std::time::Duration;

use crate::error::ConfigError;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 10;

const FALL_INTERVAL_MS: u64 = 1000;
const SOFT_DROP_INTERVAL_MS: u64 = 20;
const SPEEDUP_STEP_MS: u64 = 100;
const MIN_FALL_INTERVAL_MS: u64 = 100;

const REPEAT_DELAY_MS: u64 = 170;
const REPEAT_INTERVAL_MS: u64 = 50;

// ============================================================================
// Types
// ============================================================================

/// Playfield dimensions. Fixed for the lifetime of a grid.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
}

impl GridConfig {
    pub fn new(rows: usize, cols: usize) -> Result<Self, ConfigError> {
        let config = Self { rows, cols };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

/// Gravity timing and difficulty progression.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimingConfig {
    /// Starting gravity interval, also the initial "delay" value.
    pub fall_interval: Duration,
    /// Gravity interval while soft drop is held.
    pub soft_drop_interval: Duration,
    /// Amount shaved off the gravity interval per cleared row.
    pub speedup_step: Duration,
    /// The gravity interval never drops below this.
    pub min_fall_interval: Duration,
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fall_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("fall interval"));
        }
        if self.soft_drop_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("soft drop interval"));
        }
        if self.min_fall_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("minimum fall interval"));
        }
        if self.min_fall_interval > self.fall_interval {
            return Err(ConfigError::FloorAboveStart {
                min_ms: self.min_fall_interval.as_millis(),
                start_ms: self.fall_interval.as_millis(),
            });
        }
        Ok(())
    }

    /// One difficulty step down from `interval`, clamped to the floor.
    pub fn accelerate(&self, interval: Duration) -> Duration {
        interval
            .saturating_sub(self.speedup_step)
            .max(self.min_fall_interval)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fall_interval: Duration::from_millis(FALL_INTERVAL_MS),
            soft_drop_interval: Duration::from_millis(SOFT_DROP_INTERVAL_MS),
            speedup_step: Duration::from_millis(SPEEDUP_STEP_MS),
            min_fall_interval: Duration::from_millis(MIN_FALL_INTERVAL_MS),
        }
    }
}

/// Auto-repeat for held movement keys: first repeat after `delay`, then
/// one every `interval`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RepeatConfig {
    pub delay: Duration,
    pub interval: Duration,
}

impl RepeatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval("repeat interval"));
        }
        Ok(())
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(REPEAT_DELAY_MS),
            interval: Duration::from_millis(REPEAT_INTERVAL_MS),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub timing: TimingConfig,
    pub repeat: RepeatConfig,
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        self.timing.validate()?;
        self.repeat.validate()
    }
}
