use std::fmt;

use thiserror::Error;

/// Why a pour request was rejected before any liquid was inspected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidMoveReason {
    SameBottle,
    SourceOutOfRange { index: usize, bottle_count: usize },
    DestinationOutOfRange { index: usize, bottle_count: usize },
    EmptySource,
    ZeroAmount,
}

impl fmt::Display for InvalidMoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidMoveReason::SameBottle => write!(f, "cannot pour a bottle into itself"),
            InvalidMoveReason::SourceOutOfRange { index, bottle_count } => {
                write!(f, "source bottle {index} out of range (0..{bottle_count})")
            }
            InvalidMoveReason::DestinationOutOfRange { index, bottle_count } => {
                write!(f, "destination bottle {index} out of range (0..{bottle_count})")
            }
            InvalidMoveReason::EmptySource => write!(f, "source bottle is empty"),
            InvalidMoveReason::ZeroAmount => write!(f, "amount must be at least 1"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    #[error("no valid puzzle after {attempts} generation attempts")]
    GenerationExhausted { attempts: usize },

    #[error("invalid move: {0}")]
    InvalidMove(InvalidMoveReason),

    #[error("no liquid can be poured from bottle {from} into bottle {to}")]
    NoLiquidMovable { from: usize, to: usize },

    #[error("no solution found after expanding {expanded} states")]
    NoSolutionFound { expanded: usize },

    #[error("search cancelled after expanding {expanded} states")]
    Cancelled { expanded: usize },

    #[error("invalid puzzle: {0}")]
    InvalidPuzzle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
