//! Board construction patterns.
//!
//! A pattern bounds the dimensions of a candidate board, carries the DNA
//! string its fill is drawn from, and can pin the start and exit or
//! paint fixed shapes over the fill. Pattern files are JSON arrays.

use std::fs;
use std::io;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::element::{Element, ElementKind};

/// Default DNA: eight space, eight dirt, two bricks, two diamonds, two
/// boulders and a lone firefly.
const DEFAULT_DNA: &str = "........********##dd00<";

/// Relative position inside a board, both axes in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Line,
    Rectangle,
}

/// A fixed shape painted over the random fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub symbol: char,
    pub from: Anchor,
    pub to: Anchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// Dimension ranges are half-open; a range with min >= max always
    /// yields min.
    pub min_width: u8,
    pub max_width: u8,
    pub min_height: u8,
    pub max_height: u8,
    /// Fraction of cells replaced by mobs after the fill.
    pub mob_ratio: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<Anchor>,
    pub dna: String,
    #[serde(default)]
    pub commands: Vec<PatternCommand>,
}

impl Default for Pattern {
    fn default() -> Pattern {
        Pattern {
            min_width: 5,
            max_width: 11,
            min_height: 5,
            max_height: 11,
            mob_ratio: 0.04,
            start: None,
            exit: None,
            dna: DEFAULT_DNA.to_string(),
            commands: Vec::new(),
        }
    }
}

impl Pattern {
    /// Draw one concrete board: sample the dimensions, fill every cell
    /// from the non-mob DNA, sprinkle mobs, paint the commands, then
    /// place the start and exit as Steel markers. The player is not
    /// placed here.
    pub fn materialize<R: Rng>(&self, rng: &mut R) -> Board {
        let width = sample_dimension(rng, self.min_width, self.max_width);
        let height = sample_dimension(rng, self.min_height, self.max_height);
        let mut board = Board::new(width, height);
        let cols = i32::from(width);
        let rows = i32::from(height);

        let dna: Vec<ElementKind> = self.dna.chars().map(ElementKind::from_symbol).collect();
        let fill: Vec<ElementKind> = dna.iter().copied().filter(|kind| !kind.mob()).collect();
        if !fill.is_empty() {
            for row in 0..rows {
                for col in 0..cols {
                    let kind = fill[rng.gen_range(0..fill.len())];
                    board.place(Element::new(kind), row, col);
                }
            }
        }

        let mobs: Vec<ElementKind> = dna.iter().copied().filter(|kind| kind.mob()).collect();
        if !mobs.is_empty() {
            let cells = usize::from(width) * usize::from(height);
            // Keep at least one non-mob cell so every probe below lands.
            let mob_count = ((cells as f32 * self.mob_ratio).round() as usize)
                .min(cells.saturating_sub(1));
            for _ in 0..mob_count {
                loop {
                    let col = rng.gen_range(0..cols);
                    let row = rng.gen_range(0..rows);
                    if !board.kind_at(row, col).mob() {
                        let kind = mobs[rng.gen_range(0..mobs.len())];
                        board.place(Element::new(kind), row, col);
                        break;
                    }
                }
            }
        }

        for command in &self.commands {
            paint(&mut board, command, cols, rows);
        }

        let (start_x, start_y) = match self.start {
            Some(anchor) => (scale_clamped(anchor.x, cols), scale_clamped(anchor.y, rows)),
            None => (rng.gen_range(0..cols), rng.gen_range(0..rows)),
        };
        board.set_start(start_x, start_y);
        board.place(Element::new(ElementKind::Steel), start_y, start_x);

        loop {
            let (exit_x, exit_y) = match self.exit {
                Some(anchor) => (scale_clamped(anchor.x, cols), scale_clamped(anchor.y, rows)),
                None => (rng.gen_range(0..cols), rng.gen_range(0..rows)),
            };
            if board.kind_at(exit_y, exit_x) == ElementKind::Player {
                continue;
            }
            board.set_exit(exit_x, exit_y);
            board.place(Element::new(ElementKind::Steel), exit_y, exit_x);
            break;
        }

        board
    }
}

/// Load a JSON array of patterns.
pub fn load_patterns(path: &Path) -> io::Result<Vec<Pattern>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn sample_dimension<R: Rng>(rng: &mut R, min: u8, max: u8) -> u8 {
    let sampled = if min >= max {
        min
    } else {
        rng.gen_range(min..max)
    };
    sampled.max(1)
}

fn scale(value: f32, extent: i32) -> i32 {
    (value * extent as f32).round() as i32
}

fn scale_clamped(value: f32, extent: i32) -> i32 {
    scale(value, extent).clamp(0, extent - 1)
}

/// Paint a command. Corner coordinates are not clamped; writes that land
/// off the board are dropped, so edge anchors at 1.0 fall outside.
fn paint(board: &mut Board, command: &PatternCommand, cols: i32, rows: i32) {
    let element = Element::from_symbol(command.symbol);
    let fx = scale(command.from.x, cols);
    let fy = scale(command.from.y, rows);
    let tx = scale(command.to.x, cols);
    let ty = scale(command.to.y, rows);
    match command.kind {
        CommandKind::Line => {
            let dx = tx - fx;
            let dy = ty - fy;
            // Walk the dominant axis, excluding the far endpoint.
            let steps = dx.abs().max(dy.abs());
            for i in 0..steps {
                let t = i as f32 / steps as f32;
                let col = (fx as f32 + dx as f32 * t).round() as i32;
                let row = (fy as f32 + dy as f32 * t).round() as i32;
                board.place(element, row, col);
            }
        }
        CommandKind::Rectangle => {
            for col in fx..tx {
                board.place(element, fy, col);
                board.place(element, ty, col);
            }
            for row in (fy + 1)..(ty - 1) {
                board.place(element, row, fx);
                board.place(element, row, tx);
            }
        }
    }
}
