use std::path::PathBuf;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Position ({x}, {y}) is already occupied")]
    Occupied { x: usize, y: usize },
}

/// Errors produced while parsing a text board layout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout is empty")]
    Empty,

    #[error("layout must be {expected}x{expected} to match the board size, found {width}x{height}")]
    SizeMismatch {
        expected: usize,
        width: usize,
        height: usize,
    },

    #[error("inconsistent width at row {row}: expected {expected}, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown token '{token}' at ({x}, {y})")]
    UnknownToken { token: String, x: usize, y: usize },

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Errors raised by the random board generator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid {name} distribution: {reason}")]
    Distribution { name: &'static str, reason: String },

    #[error("failed to place starting ship: {0}")]
    Placement(#[from] GridError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
