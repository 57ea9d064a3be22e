//! Board engine and search library for cave puzzle generation.
//!
//! The board engine folds falling-block layouts one deterministic tick
//! at a time. On top of it sit a depth-bounded solver over the fold
//! graph and a generation pipeline that turns random boards into
//! scored, solvable puzzles.

pub mod board;
pub mod element;
pub mod generator;
pub mod pattern;
pub mod rules;
pub mod solver;
pub mod store;

// Re-export main types
pub use board::Board;
pub use element::{Direction, Element, ElementKind, ExplosionKind};
pub use generator::{generate, GenerateSummary, GeneratorConfig};
pub use pattern::{load_patterns, Anchor, CommandKind, Pattern, PatternCommand};
pub use solver::{heuristic, validate, Canceler, SearchOutcome, Solution, Solver};
pub use store::{FoldRecord, PuzzleRecord, PuzzleStore, RejectReason, RejectRecord, SolutionRecord};
