//! Water-sort puzzle engine.
//!
//! Bottles hold stacks of colored liquid units. A move pours the top run of
//! one bottle onto another bottle whose top matches (or which is empty).
//! The crate validates and applies moves on immutable [`Puzzle`] values,
//! generates shuffled instances, and finds solutions with an A* search.

pub mod config;
pub mod error;
pub mod gameplay;
pub mod generator;
pub mod model;
pub mod renderer;
mod rules;
pub mod solver;
pub mod storage;

pub use error::{Error, InvalidMoveReason, Result};
pub use gameplay::{ActionOutcome, GameSession, SessionAction};
pub use generator::{Difficulty, GeneratorConfig, generate, generate_seeded};
pub use model::{Bottle, Color, Move, Puzzle};
pub use solver::{SearchBudget, Solution, solve};
pub use storage::SavedGame;
