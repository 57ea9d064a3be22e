//! Per-kind transition rules applied by the board scan.
//!
//! Each rule receives the acting element by value together with its
//! position. It mutates the board in place and reports whether anything
//! changed. Rules mark every element they move as scanned so the same
//! element never acts twice in one tick.

use crate::board::Board;
use crate::element::{Element, ElementKind, ExplosionKind};

/// Run the rule for the element at (row, col). Returns true when the
/// board changed.
pub(crate) fn act(board: &mut Board, row: i32, col: i32) -> bool {
    let element = board.element_at(row, col);
    match element.kind {
        ElementKind::Player => act_player(board, element, row, col),
        ElementKind::Boulder | ElementKind::Diamond => {
            if element.falling {
                act_falling(board, element, row, col)
            } else {
                act_resting(board, element, row, col)
            }
        }
        ElementKind::Firefly | ElementKind::Butterfly => act_mob(board, element, row, col),
        _ => match element.kind.explosion_successor() {
            Some(next) => {
                let mut debris = Element::new(next);
                debris.scanned = true;
                board.place(debris, row, col);
                true
            }
            None => false,
        },
    }
}

fn walkable(kind: ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::Space | ElementKind::Dirt | ElementKind::Diamond
    )
}

fn act_player(board: &mut Board, mut element: Element, row: i32, col: i32) -> bool {
    let (dx, dy) = board.input();
    let to_row = row + dy;
    let to_col = col + dx;
    let mut dest = board.element_at(to_row, to_col);

    // The exit opens once the last diamond is gone.
    let (exit_x, exit_y) = board.exit();
    if to_col == exit_x && to_row == exit_y && !board.has_diamonds() {
        dest = Element::new(ElementKind::Space);
    }

    if walkable(dest.kind) {
        element.scanned = true;
        if board.grabbing() {
            board.place(element, row, col);
            board.place(Element::new(ElementKind::Space), to_row, to_col);
        } else {
            board.place(Element::new(ElementKind::Space), row, col);
            board.place(element, to_row, to_col);
        }
        return true;
    }

    if dx != 0 && dest.kind == ElementKind::Boulder && !dest.falling {
        let behind = board.element_at(row, col + dx * 2);
        if behind.kind == ElementKind::Space {
            let mut pushed = dest;
            pushed.scanned = true;
            element.scanned = true;
            board.place(pushed, row, col + dx * 2);
            if board.grabbing() {
                board.place(element, row, col);
                board.place(Element::new(ElementKind::Space), row, to_col);
            } else {
                board.place(Element::new(ElementKind::Space), row, col);
                board.place(element, row, to_col);
            }
            return true;
        }
    }

    false
}

/// Column a rounded element at (row, col) can roll into, probing the
/// preferred side first. Both the side cell and the diagonal below it
/// must be empty.
fn roll_target(board: &Board, row: i32, col: i32, left_first: bool) -> Option<i32> {
    let first = if left_first { col - 1 } else { col + 1 };
    if board.kind_at(row, first) == ElementKind::Space
        && board.kind_at(row + 1, first) == ElementKind::Space
    {
        return Some(first);
    }
    let second = if left_first { col + 1 } else { col - 1 };
    if board.kind_at(row, second) == ElementKind::Space
        && board.kind_at(row + 1, second) == ElementKind::Space
    {
        return Some(second);
    }
    None
}

fn act_resting(board: &mut Board, mut element: Element, row: i32, col: i32) -> bool {
    let left_first = element.kind == ElementKind::Boulder;
    element.scanned = true;

    let below = board.element_at(row + 1, col);
    if below.kind == ElementKind::Space {
        element.falling = true;
        board.place(below, row, col);
        board.place(element, row + 1, col);
        return true;
    }

    if below.kind.rounded() && !below.falling {
        if let Some(to_col) = roll_target(board, row, col, left_first) {
            let beside = board.element_at(row, to_col);
            element.falling = true;
            board.place(beside, row, col);
            board.place(element, row, to_col);
            return true;
        }
    }

    board.place(element, row, col);
    false
}

fn act_falling(board: &mut Board, mut element: Element, row: i32, col: i32) -> bool {
    let left_first = element.kind == ElementKind::Boulder;
    element.scanned = true;

    let below = board.element_at(row + 1, col);
    if below.kind == ElementKind::Space {
        board.place(below, row, col);
        board.place(element, row + 1, col);
        return true;
    }

    if below.kind.rounded() && !below.falling {
        if let Some(to_col) = roll_target(board, row, col, left_first) {
            let beside = board.element_at(row, to_col);
            board.place(beside, row, col);
            board.place(element, row, to_col);
            return true;
        }
        // Both sides blocked: the fall is arrested, which still counts
        // as a change for this tick.
        element.falling = false;
        board.place(element, row, col);
        return true;
    }

    if below.kind.explosion() != ExplosionKind::None {
        return explode(
            board,
            row + 1,
            col,
            below.kind.explosion() == ExplosionKind::ToDiamond,
        );
    }

    element.falling = false;
    board.place(element, row, col);
    true
}

fn act_mob(board: &mut Board, mut element: Element, row: i32, col: i32) -> bool {
    let left_first = element.kind == ElementKind::Firefly;

    let player_beside = board.kind_at(row - 1, col) == ElementKind::Player
        || board.kind_at(row, col - 1) == ElementKind::Player
        || board.kind_at(row + 1, col) == ElementKind::Player
        || board.kind_at(row, col + 1) == ElementKind::Player;
    if player_beside {
        return explode(
            board,
            row,
            col,
            element.kind.explosion() == ExplosionKind::ToDiamond,
        );
    }

    // Hug the wall: try the preferred turn, then straight ahead, then
    // turn the other way in place.
    let side = if left_first {
        element.facing.rotate_left()
    } else {
        element.facing.rotate_right()
    };
    let (dx, dy) = side.delta();
    if board.kind_at(row + dy, col + dx) == ElementKind::Space {
        let vacated = board.element_at(row + dy, col + dx);
        element.facing = side;
        element.scanned = true;
        board.place(vacated, row, col);
        board.place(element, row + dy, col + dx);
        return true;
    }

    let (dx, dy) = element.facing.delta();
    if board.kind_at(row + dy, col + dx) == ElementKind::Space {
        let vacated = board.element_at(row + dy, col + dx);
        element.scanned = true;
        board.place(vacated, row, col);
        board.place(element, row + dy, col + dx);
        return true;
    }

    element.facing = if left_first {
        element.facing.rotate_right()
    } else {
        element.facing.rotate_left()
    };
    element.scanned = true;
    board.place(element, row, col);
    true
}

/// Detonate a 3x3 blast centered on (row, col). Indestructible cells
/// survive; everything else becomes explosion debris. Cells at or before
/// the center in scan order get stage one pre-scanned, cells after it
/// get stage zero so the same tick still advances them once.
pub fn explode(board: &mut Board, row: i32, col: i32, to_diamond: bool) -> bool {
    let mut changed = false;
    for blast_row in (row - 1)..=(row + 1) {
        for blast_col in (col - 1)..=(col + 1) {
            changed |= explode_cell(board, blast_row, blast_col, row, col, to_diamond);
        }
    }
    changed
}

fn explode_cell(
    board: &mut Board,
    row: i32,
    col: i32,
    from_row: i32,
    from_col: i32,
    to_diamond: bool,
) -> bool {
    if board.kind_at(row, col).indestructible() {
        return false;
    }
    let cols = i32::from(board.width());
    let behind = row * cols + col <= from_row * cols + from_col;
    let stage = match (to_diamond, behind) {
        (true, true) => ElementKind::ExplosionToDiamond1,
        (true, false) => ElementKind::ExplosionToDiamond0,
        (false, true) => ElementKind::Explosion1,
        (false, false) => ElementKind::Explosion0,
    };
    let mut debris = Element::new(stage);
    debris.scanned = behind;
    board.place(debris, row, col);
    true
}
