//! JSON persistence for generated puzzles and their reject trail.
//!
//! The store keeps every accepted puzzle together with its scored
//! solution, plus a record of every rejected candidate so reruns skip
//! boards that were already tried.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One board of a recorded solution path, as a move name plus the
/// resulting layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldRecord {
    #[serde(rename = "move")]
    pub move_name: String,
    pub data: String,
}

/// Scored solution attached to a kept puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionRecord {
    pub score: i64,
    pub avg_diff: i64,
    pub avg_goals: i64,
    pub avg_before: i64,
    pub avg_after: i64,
    pub falling_delta: i64,
    pub proximity: i64,
    pub folds: Vec<FoldRecord>,
}

/// An accepted puzzle, stored as its pristine pre-settling layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleRecord {
    pub hash: u64,
    pub width: u8,
    pub height: u8,
    /// Boards in the solution path, root included.
    pub par: usize,
    pub start_x: i32,
    pub start_y: i32,
    pub exit_x: i32,
    pub exit_y: i32,
    /// Settling folds applied before the player was placed.
    pub idle: u32,
    pub data: String,
    pub solution: SolutionRecord,
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    MinMove,
    Timeout,
    Unsolvable,
    ReoptimizeTimeout,
    MinScore,
}

/// A rejected candidate. Only the hash and reason are always present;
/// the remaining detail depends on how far the candidate got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRecord {
    pub hash: u64,
    pub reason: RejectReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionRecord>,
}

impl RejectRecord {
    pub fn new(hash: u64, reason: RejectReason) -> RejectRecord {
        RejectRecord {
            hash,
            reason,
            width: None,
            height: None,
            start_x: None,
            start_y: None,
            exit_x: None,
            exit_y: None,
            idle: None,
            data: None,
            solution: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuzzleStore {
    #[serde(default)]
    pub boards: Vec<PuzzleRecord>,
    #[serde(default)]
    pub rejects: Vec<RejectRecord>,
}

impl PuzzleStore {
    /// Load a store from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> io::Result<PuzzleStore> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PuzzleStore::default()),
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(path, json)
    }
}
