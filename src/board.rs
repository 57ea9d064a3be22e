//! Rectangular cave board and the tick driver.
//!
//! Cells are stored row-major. A cell may be empty, which reads back as
//! Space; reads outside the board return a Steel border element that is
//! never written back. One call to [`Board::fold`] advances the board a
//! single tick in strict row-major scan order.

use std::fmt;

use smallvec::SmallVec;

use crate::element::{Direction, Element, ElementKind};
use crate::rules;

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

const BORDER: Element = Element {
    kind: ElementKind::Steel,
    scanned: false,
    falling: false,
    facing: Direction::None,
};

const EMPTY: Element = Element {
    kind: ElementKind::Space,
    scanned: false,
    falling: false,
    facing: Direction::None,
};

/// A cave grid plus the pending player input for the next tick.
#[derive(Debug, Clone)]
pub struct Board {
    cols: u8,
    rows: u8,
    cells: Vec<Option<Element>>,
    input_x: i32,
    input_y: i32,
    grabbing: bool,
    start_x: i32,
    start_y: i32,
    exit_x: i32,
    exit_y: i32,
    last_fold_important: u32,
}

impl Board {
    /// Create an empty board. Panics when either dimension is zero.
    pub fn new(width: u8, height: u8) -> Board {
        assert!(width > 0 && height > 0, "board dimensions must be positive");
        Board {
            cols: width,
            rows: height,
            cells: vec![None; usize::from(width) * usize::from(height)],
            input_x: 0,
            input_y: 0,
            grabbing: false,
            start_x: 0,
            start_y: 0,
            // Off the grid until assigned, so no cell is a winning exit
            // by accident.
            exit_x: -1,
            exit_y: -1,
            last_fold_important: 0,
        }
    }

    /// Parse a row-major symbol string. Missing trailing cells stay
    /// empty, unknown symbols become Steel.
    pub fn from_symbols(width: u8, height: u8, data: &str) -> Board {
        let mut board = Board::new(width, height);
        let cell_count = board.cells.len();
        for (i, chr) in data.chars().take(cell_count).enumerate() {
            board.cells[i] = Some(Element::from_symbol(chr));
        }
        board
    }

    pub fn width(&self) -> u8 {
        self.cols
    }

    pub fn height(&self) -> u8 {
        self.rows
    }

    pub fn input(&self) -> (i32, i32) {
        (self.input_x, self.input_y)
    }

    pub fn grabbing(&self) -> bool {
        self.grabbing
    }

    pub fn start(&self) -> (i32, i32) {
        (self.start_x, self.start_y)
    }

    pub fn set_start(&mut self, x: i32, y: i32) {
        self.start_x = x;
        self.start_y = y;
    }

    pub fn exit(&self) -> (i32, i32) {
        (self.exit_x, self.exit_y)
    }

    pub fn set_exit(&mut self, x: i32, y: i32) {
        self.exit_x = x;
        self.exit_y = y;
    }

    /// Count of important elements that moved during the last fold.
    pub fn last_fold_important(&self) -> u32 {
        self.last_fold_important
    }

    fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && row < i32::from(self.rows) && col >= 0 && col < i32::from(self.cols)
    }

    fn index(&self, row: i32, col: i32) -> usize {
        (row * i32::from(self.cols) + col) as usize
    }

    /// Element at (row, col). Out-of-range reads yield the Steel border,
    /// empty cells yield Space.
    pub fn element_at(&self, row: i32, col: i32) -> Element {
        if !self.in_bounds(row, col) {
            return BORDER;
        }
        self.cells[self.index(row, col)].unwrap_or(EMPTY)
    }

    pub fn kind_at(&self, row: i32, col: i32) -> ElementKind {
        self.element_at(row, col).kind
    }

    /// Write an element at (row, col). Out-of-range writes are ignored.
    pub fn place(&mut self, element: Element, row: i32, col: i32) {
        if self.in_bounds(row, col) {
            let index = self.index(row, col);
            self.cells[index] = Some(element);
        }
    }

    pub fn has_diamonds(&self) -> bool {
        self.cells
            .iter()
            .flatten()
            .any(|element| element.kind == ElementKind::Diamond)
    }

    /// Player position as (x, y), or None when the player is gone.
    pub fn player_position(&self) -> Option<(i32, i32)> {
        for row in 0..i32::from(self.rows) {
            for col in 0..i32::from(self.cols) {
                if self.kind_at(row, col) == ElementKind::Player {
                    return Some((col, row));
                }
            }
        }
        None
    }

    /// Advance the board one tick. Returns true when anything changed.
    /// When the player's move fails, the pending input is cleared so the
    /// tick reads back as a stand-still.
    pub fn fold(&mut self) -> bool {
        for cell in self.cells.iter_mut().flatten() {
            cell.scanned = false;
        }
        self.last_fold_important = 0;

        let mut changed = false;
        for row in 0..i32::from(self.rows) {
            for col in 0..i32::from(self.cols) {
                let element = match self.cells[self.index(row, col)] {
                    Some(element) => element,
                    None => continue,
                };
                if element.scanned {
                    continue;
                }
                if rules::act(self, row, col) {
                    if element.kind.important() {
                        self.last_fold_important += 1;
                    }
                    changed = true;
                } else if element.kind == ElementKind::Player {
                    self.input_x = 0;
                    self.input_y = 0;
                    self.grabbing = false;
                }
            }
        }
        changed
    }

    /// All distinct-input next states that actually change the board.
    /// Inputs are tried in a fixed order: Down, Left, Up, Right, each
    /// without then with grab, and finally standing still.
    pub fn fold_successors(&self) -> SmallVec<[Board; 9]> {
        let mut successors = SmallVec::new();
        for grab in [false, true] {
            for (dx, dy) in [(0, 1), (-1, 0), (0, -1), (1, 0)] {
                let mut next = self.clone();
                next.input_x = dx;
                next.input_y = dy;
                next.grabbing = grab;
                if next.fold() {
                    successors.push(next);
                }
            }
        }
        let mut next = self.clone();
        next.input_x = 0;
        next.input_y = 0;
        next.grabbing = false;
        if next.fold() {
            successors.push(next);
        }
        successors
    }

    /// FNV-1a hash of the visible layout: both dimensions, then the
    /// glyph of every cell in row-major order. Transient flags do not
    /// contribute.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = FNV_OFFSET;
        hash ^= u64::from(self.cols);
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= u64::from(self.rows);
        hash = hash.wrapping_mul(FNV_PRIME);
        for cell in &self.cells {
            let symbol = match cell {
                Some(element) => element.symbol(),
                None => '.',
            };
            hash ^= u64::from(symbol as u8);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Name of the pending input, for example "Right" or "GrabDown".
    pub fn name_move(&self) -> String {
        let mut name = String::new();
        if self.grabbing {
            name.push_str("Grab");
        }
        name.push_str(match (self.input_x, self.input_y) {
            (-1, 0) => "Left",
            (1, 0) => "Right",
            (0, -1) => "Up",
            (0, 1) => "Down",
            _ => "Stationary",
        });
        name
    }

    /// Set the pending input from a move name, case-insensitively.
    /// Unknown names leave the player standing still.
    pub fn set_move(&mut self, name: &str) {
        let mut rest = name;
        self.grabbing = false;
        if let Some(prefix) = rest.get(..4) {
            if prefix.eq_ignore_ascii_case("Grab") {
                self.grabbing = true;
                rest = &rest[4..];
            }
        }
        self.input_x = 0;
        self.input_y = 0;
        match rest.to_ascii_lowercase().as_str() {
            "left" => self.input_x = -1,
            "right" => self.input_x = 1,
            "up" => self.input_y = -1,
            "down" => self.input_y = 1,
            _ => {}
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            let symbol = match cell {
                Some(element) => element.symbol(),
                None => '.',
            };
            write!(f, "{}", symbol)?;
        }
        Ok(())
    }
}
