//! Iterative-deepening solver for cave boards.
//!
//! The search deepens a cost bound over a depth-first walk of the fold
//! graph. The estimate driving it is a greedy diamond tour and is not a
//! lower bound, so the first solution found is good rather than provably
//! optimal. Candidate solutions are replayed move by move before they
//! are accepted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::board::Board;
use crate::element::ElementKind;

/// Cost charged for a step or an estimate once the player is gone.
const LOST_COST: u32 = 10_000;

/// The wall clock is consulted once per this many visited nodes.
const DEADLINE_CHECK_INTERVAL: u64 = 64;

/// How a single bounded search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found,
    NotFound,
    TimedOut,
    Canceled,
    /// The bound was exceeded; carries the smallest cost seen past it.
    Exceeded(u32),
}

/// A validated path from the root board to a winning board.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Every board along the way, root first.
    pub path: Vec<Board>,
    /// Final cost bound the solution was found under.
    pub bound: u32,
}

impl Solution {
    /// Move names for every step after the root.
    pub fn move_names(&self) -> Vec<String> {
        self.path.iter().skip(1).map(Board::name_move).collect()
    }
}

/// Handle for canceling a running solve from another thread.
#[derive(Debug, Clone)]
pub struct Canceler {
    flag: Arc<AtomicBool>,
}

impl Canceler {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// Reusable search state. One solver runs one solve at a time; canceling
/// is sticky, so a canceled solver keeps reporting `Canceled` until a
/// fresh one is built.
pub struct Solver {
    canceled: Arc<AtomicBool>,
    path: Vec<Board>,
    on_path: HashSet<u64>,
    found_path: Option<Vec<Board>>,
    nodes: u64,
    last_outcome: SearchOutcome,
}

impl Solver {
    pub fn new() -> Solver {
        Solver {
            canceled: Arc::new(AtomicBool::new(false)),
            path: Vec::new(),
            on_path: HashSet::new(),
            found_path: None,
            nodes: 0,
            last_outcome: SearchOutcome::NotFound,
        }
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn canceler(&self) -> Canceler {
        Canceler {
            flag: Arc::clone(&self.canceled),
        }
    }

    /// Outcome of the most recent bounded search.
    pub fn last_outcome(&self) -> SearchOutcome {
        self.last_outcome
    }

    /// Nodes visited during the most recent solve.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Search for a path that collects every diamond and reaches the
    /// exit. Each deepening iteration gets the full `budget`; the search
    /// gives up instead of raising the bound to `max_cost` or beyond.
    /// `ratio` scales the estimate, trading solution quality for reach.
    pub fn solve(
        &mut self,
        root: &Board,
        budget: Duration,
        max_cost: u32,
        ratio: f32,
    ) -> Option<Solution> {
        self.path.clear();
        self.on_path.clear();
        self.found_path = None;
        self.nodes = 0;

        let mut bound = heuristic(root, ratio);
        self.path.push(root.clone());
        self.on_path.insert(root.fingerprint());

        loop {
            let deadline = Instant::now() + budget;
            let outcome = self.search(0, bound, ratio, deadline);
            self.last_outcome = outcome;
            match outcome {
                SearchOutcome::Found => {
                    let path = self.found_path.take().unwrap();
                    return Some(Solution { path, bound });
                }
                SearchOutcome::Exceeded(next) => {
                    if next >= max_cost {
                        return None;
                    }
                    bound = next;
                }
                SearchOutcome::NotFound
                | SearchOutcome::TimedOut
                | SearchOutcome::Canceled => return None,
            }
        }
    }

    fn search(&mut self, g: u32, bound: u32, ratio: f32, deadline: Instant) -> SearchOutcome {
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
            return SearchOutcome::TimedOut;
        }
        self.nodes += 1;
        if self.canceled.load(Ordering::Relaxed) {
            return SearchOutcome::Canceled;
        }

        let node = self.path.last().unwrap();
        let fcost = g + heuristic(node, ratio);
        if fcost > bound {
            return SearchOutcome::Exceeded(fcost);
        }
        if is_goal(node) {
            if validate(&self.path) {
                self.found_path = Some(self.path.clone());
                return SearchOutcome::Found;
            }
            return SearchOutcome::NotFound;
        }

        let mut successors = node.fold_successors();
        successors.sort_by_cached_key(|next| heuristic(next, ratio));

        let mut min_exceeded: Option<u32> = None;
        for next in successors {
            let hash = next.fingerprint();
            // States already on the current path only lead back around.
            if !self.on_path.insert(hash) {
                continue;
            }
            let cost = step_cost(&next);
            self.path.push(next);
            let outcome = self.search(g + cost, bound, ratio, deadline);
            self.path.pop();
            self.on_path.remove(&hash);
            match outcome {
                SearchOutcome::Found => return SearchOutcome::Found,
                SearchOutcome::TimedOut => return SearchOutcome::TimedOut,
                SearchOutcome::Canceled => return SearchOutcome::Canceled,
                SearchOutcome::Exceeded(over) => {
                    min_exceeded = Some(match min_exceeded {
                        Some(best) => best.min(over),
                        None => over,
                    });
                }
                SearchOutcome::NotFound => {}
            }
        }
        match min_exceeded {
            Some(over) => SearchOutcome::Exceeded(over),
            None => SearchOutcome::NotFound,
        }
    }
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::new()
    }
}

/// Estimated remaining cost: a greedy nearest-neighbor tour over the
/// remaining diamonds followed by the leg to the exit, in Manhattan
/// distance, scaled by `ratio` and rounded down.
pub fn heuristic(board: &Board, ratio: f32) -> u32 {
    let mut diamonds: SmallVec<[(i32, i32); 32]> = SmallVec::new();
    let mut player = None;
    for row in 0..i32::from(board.height()) {
        for col in 0..i32::from(board.width()) {
            match board.kind_at(row, col) {
                ElementKind::Diamond => diamonds.push((col, row)),
                ElementKind::Player => player = Some((col, row)),
                _ => {}
            }
        }
    }
    let (mut x, mut y) = match player {
        Some(position) => position,
        None => return LOST_COST,
    };

    let mut total = 0;
    while !diamonds.is_empty() {
        let mut closest = 0;
        let mut best = i32::MAX;
        for (i, &(dx, dy)) in diamonds.iter().enumerate() {
            let dist = (x - dx).abs() + (y - dy).abs();
            if dist < best {
                best = dist;
                closest = i;
            }
        }
        total += best;
        let (dx, dy) = diamonds.remove(closest);
        x = dx;
        y = dy;
    }
    let (exit_x, exit_y) = board.exit();
    total += (x - exit_x).abs() + (y - exit_y).abs();

    (total as f32 * ratio).floor() as u32
}

fn step_cost(next: &Board) -> u32 {
    if next.player_position().is_some() {
        1
    } else {
        LOST_COST
    }
}

fn is_goal(board: &Board) -> bool {
    !board.has_diamonds() && board.player_position() == Some(board.exit())
}

/// Replay a path from its root, one named move per step, and check that
/// every folded board matches the recorded one.
pub fn validate(path: &[Board]) -> bool {
    if path.len() <= 1 {
        return true;
    }
    let mut current = path[0].clone();
    for step in &path[1..] {
        current.set_move(&step.name_move());
        if !current.fold() {
            return false;
        }
        if current.fingerprint() != step.fingerprint() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    /// Sealed room with one diamond between the player and the exit,
    /// solvable in exactly three moves to the right.
    fn create_corridor_board() -> Board {
        let mut board = Board::from_symbols(
            5,
            5,
            &["%%%%%", "%@d.%", "%%%%%", "%%%%%", "%%%%%"].concat(),
        );
        board.set_exit(4, 1);
        board
    }

    /// Player boxed in next to a diamond it can never reach.
    fn create_sealed_board() -> Board {
        let mut board = Board::from_symbols(4, 3, &["%%%%", "%@%d", "%%%%"].concat());
        board.set_exit(2, 1);
        board
    }

    #[test]
    fn test_solver_finds_corridor_solution() {
        let mut solver = Solver::new();
        let board = create_corridor_board();
        let solution = solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .unwrap();
        assert_eq!(solution.bound, 3);
        assert_eq!(solution.path.len(), 4);
        assert_eq!(solution.move_names(), vec!["Right", "Right", "Right"]);
        assert_eq!(solver.last_outcome(), SearchOutcome::Found);
        assert!(solver.nodes() > 0);
    }

    #[test]
    fn test_solution_path_replays() {
        let mut solver = Solver::new();
        let board = create_corridor_board();
        let solution = solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .unwrap();
        assert!(validate(&solution.path));
        assert!(validate(&solution.path[..1]));
    }

    #[test]
    fn test_validate_rejects_tampered_path() {
        let mut solver = Solver::new();
        let board = create_corridor_board();
        let solution = solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .unwrap();
        let mut tampered = solution.path.clone();
        tampered
            .last_mut()
            .unwrap()
            .place(Element::new(ElementKind::Diamond), 3, 3);
        assert!(!validate(&tampered));
    }

    #[test]
    fn test_solver_times_out() {
        let mut solver = Solver::new();
        let board = create_corridor_board();
        let solution = solver.solve(&board, Duration::ZERO, 75, 1.0);
        assert!(solution.is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::TimedOut);
    }

    #[test]
    fn test_solver_exhausts_unreachable_board() {
        let mut solver = Solver::new();
        let board = create_sealed_board();
        let solution = solver.solve(&board, Duration::from_secs(10), 75, 1.0);
        assert!(solution.is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::NotFound);
    }

    #[test]
    fn test_solver_reports_exceeded_at_max_cost() {
        let mut solver = Solver::new();
        let board = create_corridor_board();
        // A halved estimate starts the bound too low; capping the bound
        // at 2 stops the search before it can deepen far enough.
        let solution = solver.solve(&board, Duration::from_secs(10), 2, 0.5);
        assert!(solution.is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::Exceeded(2));

        // With room to deepen, the same relaxed search still gets there.
        let solution = solver.solve(&board, Duration::from_secs(10), 10, 0.5);
        assert_eq!(solution.unwrap().bound, 3);
    }

    #[test]
    fn test_solver_cancel_is_sticky() {
        let mut solver = Solver::new();
        let canceler = solver.canceler();
        canceler.cancel();
        let board = create_corridor_board();
        assert!(solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::Canceled);
        // Still canceled on the next attempt.
        assert!(solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::Canceled);
    }

    #[test]
    fn test_search_prunes_states_already_on_path() {
        // No diamonds and no reachable exit: the only thing to do in the
        // two-cell pocket is shuffle back and forth, which the path
        // hashes cut off. The search must exhaust, not loop or time out.
        let board = Board::from_symbols(4, 3, &["%%%%", "%@.%", "%%%%"].concat());
        let mut solver = Solver::new();
        let solution = solver.solve(&board, Duration::from_secs(10), 50, 1.0);
        assert!(solution.is_none());
        assert_eq!(solver.last_outcome(), SearchOutcome::NotFound);
    }

    #[test]
    fn test_solver_state_resets_between_solves() {
        let mut solver = Solver::new();
        let corridor = create_corridor_board();
        assert!(solver
            .solve(&corridor, Duration::from_secs(10), 75, 1.0)
            .is_some());
        assert!(solver
            .solve(&create_sealed_board(), Duration::from_secs(10), 75, 1.0)
            .is_none());
        assert!(solver
            .solve(&corridor, Duration::from_secs(10), 75, 1.0)
            .is_some());
    }

    #[test]
    fn test_heuristic_tours_diamonds_then_exit() {
        let mut board = Board::from_symbols(5, 1, "@.d.d");
        board.set_exit(4, 0);
        assert_eq!(heuristic(&board, 1.0), 4);
        assert_eq!(heuristic(&board, 0.5), 2);
    }

    #[test]
    fn test_heuristic_is_exact_without_diamonds() {
        // With nothing to collect only the exit leg remains, so the
        // estimate is the plain Manhattan distance and the search
        // closes it without a single re-deepening.
        let mut board = Board::from_symbols(6, 2, "@...........");
        board.set_exit(4, 1);
        assert_eq!(heuristic(&board, 1.0), 5);
        assert_eq!(heuristic(&board, 0.5), 2);

        let mut solver = Solver::new();
        let solution = solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .unwrap();
        assert_eq!(solution.bound, 5);
        assert_eq!(solution.path.len(), 6);
    }

    #[test]
    fn test_heuristic_without_player_is_lost() {
        let board = Board::from_symbols(3, 1, ".0d");
        assert_eq!(heuristic(&board, 1.0), LOST_COST);
    }

    #[test]
    fn test_trivial_root_goal() {
        let mut board = Board::from_symbols(2, 1, "@.");
        board.set_exit(0, 0);
        let mut solver = Solver::new();
        let solution = solver
            .solve(&board, Duration::from_secs(10), 75, 1.0)
            .unwrap();
        assert_eq!(solution.bound, 0);
        assert_eq!(solution.path.len(), 1);
        assert!(solution.move_names().is_empty());
    }
}
