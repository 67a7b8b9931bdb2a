use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub reward: RewardConfig,
    pub accumulator: AccumulatorConfig,
    pub replay: ReplayConfig,
    /// Seed for board generation and the random action source.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            board: BoardConfig::default(),
            reward: RewardConfig::default(),
            accumulator: AccumulatorConfig::default(),
            replay: ReplayConfig::default(),
            seed: 123,
        }
    }
}

/// Rules of the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Width and height of the (square, toroidal) board.
    pub size: usize,
    pub episode_steps: usize,
    /// Currency the player starts with; also the total halite spread over a
    /// freshly generated board.
    pub starting_halite: f32,
    /// Fraction of a cell's halite a ship collects per tick.
    pub collect_rate: f32,
    /// Multiplicative per-tick regeneration of every cell.
    pub regen_rate: f32,
    pub max_cell_halite: f32,
    pub convert_cost: f32,
    pub spawn_cost: f32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            size: 12,
            episode_steps: 361,
            starting_halite: 5000.0,
            collect_rate: 0.25,
            regen_rate: 0.02,
            max_cell_halite: 500.0,
            convert_cost: 500.0,
            spawn_cost: 500.0,
        }
    }
}

impl BoardConfig {
    /// Upper bound on simultaneously live ships: one per cell.
    pub fn max_ships(&self) -> usize {
        self.size * self.size
    }
}

/// Weight and clip range of a single reward term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardTerm {
    /// Magnitude of the schedule.
    pub beta: f32,
    /// Decay rate as a fraction of the episode length.
    pub time_beta: f32,
    pub min_clip: f32,
    pub max_clip: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub mine: RewardTerm,
    pub deposit: RewardTerm,
    /// Distance reward is never clipped; its clip bounds are only validated.
    pub distance: RewardTerm,
    pub discovery: RewardTerm,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            mine: RewardTerm {
                beta: 2.0,
                time_beta: 0.5,
                min_clip: 0.0,
                max_clip: 5.0,
            },
            deposit: RewardTerm {
                beta: 0.0,
                time_beta: 0.5,
                min_clip: 0.0,
                max_clip: 3.0,
            },
            distance: RewardTerm {
                beta: 0.0,
                time_beta: 0.5,
                min_clip: 0.0,
                max_clip: 1.0,
            },
            discovery: RewardTerm {
                beta: 0.0,
                time_beta: 0.25,
                min_clip: 0.0,
                max_clip: 0.25,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// Number of transitions folded into one N-step return.
    pub multi_step_n: usize,
    pub gamma: f32,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        AccumulatorConfig {
            multi_step_n: 6,
            gamma: 0.99,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub capacity: usize,
    pub batch_size: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            capacity: 15000,
            batch_size: 32,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let board = &self.board;
        if board.size < 2 {
            return Err(ConfigError::Validation("board.size must be >= 2".into()));
        }
        // The opening convert and spawn take two steps.
        if board.episode_steps < 3 {
            return Err(ConfigError::Validation(
                "board.episode_steps must be >= 3".into(),
            ));
        }
        if !(board.collect_rate > 0.0 && board.collect_rate <= 1.0) {
            return Err(ConfigError::Validation(
                "board.collect_rate must be in (0, 1]".into(),
            ));
        }
        if board.regen_rate < 0.0 {
            return Err(ConfigError::Validation(
                "board.regen_rate must be >= 0".into(),
            ));
        }
        if board.max_cell_halite <= 0.0 {
            return Err(ConfigError::Validation(
                "board.max_cell_halite must be > 0".into(),
            ));
        }
        if board.starting_halite <= 0.0 {
            return Err(ConfigError::Validation(
                "board.starting_halite must be > 0".into(),
            ));
        }

        for (name, term) in [
            ("mine", &self.reward.mine),
            ("deposit", &self.reward.deposit),
            ("distance", &self.reward.distance),
            ("discovery", &self.reward.discovery),
        ] {
            if term.time_beta <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "reward.{name}.time_beta must be > 0"
                )));
            }
            if term.min_clip > term.max_clip {
                return Err(ConfigError::Validation(format!(
                    "reward.{name}.min_clip must be <= reward.{name}.max_clip"
                )));
            }
        }

        if self.accumulator.multi_step_n == 0 {
            return Err(ConfigError::Validation(
                "accumulator.multi_step_n must be > 0".into(),
            ));
        }
        if self.accumulator.gamma < 0.0 || self.accumulator.gamma > 1.0 {
            return Err(ConfigError::Validation(
                "accumulator.gamma must be in [0, 1]".into(),
            ));
        }
        if self.replay.capacity == 0 {
            return Err(ConfigError::Validation(
                "replay.capacity must be > 0".into(),
            ));
        }
        if self.replay.batch_size > self.replay.capacity {
            return Err(ConfigError::Validation(
                "replay.batch_size must be <= replay.capacity".into(),
            ));
        }
        Ok(())
    }
}
