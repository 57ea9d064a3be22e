//! Candidate pipeline: randomize, settle, solve, score, keep.
//!
//! Workers draw candidate boards from the patterns, dedup them against
//! everything seen before, give each survivor a solve budget, tighten
//! accepted solutions until the search can do no better, then score what
//! remains. Records flow over a channel to the writer thread, which owns
//! the store.

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::board::Board;
use crate::element::{Element, ElementKind};
use crate::pattern::Pattern;
use crate::solver::{SearchOutcome, Solution, Solver};
use crate::store::{
    FoldRecord, PuzzleRecord, PuzzleStore, RejectReason, RejectRecord, SolutionRecord,
};

/// Pipeline limits and acceptance thresholds.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Worker threads solving candidates.
    pub workers: usize,
    /// Base RNG seed; None draws one from the thread RNG.
    pub seed: Option<u64>,
    /// Stop after accepting this many puzzles; zero keeps going until
    /// the attempt limit.
    pub target: usize,
    /// Candidate limit across all workers.
    pub max_attempts: u64,
    /// Solutions shorter than this are rejected.
    pub min_move: u32,
    /// Cost bound the solver may not reach.
    pub max_move: u32,
    /// Scores below this are rejected.
    pub min_score: i64,
    /// Settling folds applied before the player is placed.
    pub idle_folds: u32,
    /// Solve budget per search iteration.
    pub budget: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            seed: None,
            target: 1,
            max_attempts: 10_000,
            min_move: 15,
            max_move: 75,
            min_score: 100,
            idle_folds: 5,
            budget: Duration::from_secs(600),
        }
    }
}

/// One thread fewer than the machine has, and at least one.
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|cores| cores.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Totals reported after a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummary {
    pub attempts: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub duplicates: u64,
}

enum GenEvent {
    Accepted(PuzzleRecord),
    Rejected(RejectRecord),
}

enum Attempt {
    Event(GenEvent),
    Duplicate,
    /// Reoptimization tightened the solution below the acceptance floor;
    /// the candidate is dropped without a record.
    Dropped,
}

struct SeenHashes {
    accepted: HashSet<u64>,
    rejected: HashSet<u64>,
}

impl SeenHashes {
    fn from_store(store: &PuzzleStore) -> SeenHashes {
        SeenHashes {
            accepted: store.boards.iter().map(|record| record.hash).collect(),
            rejected: store.rejects.iter().map(|record| record.hash).collect(),
        }
    }
}

/// Run the pipeline. Accepted and rejected records are appended to the
/// store as they arrive; when `checkpoint` is given the store is saved
/// after every record and once more at the end.
pub fn generate(
    config: &GeneratorConfig,
    patterns: &[Pattern],
    store: &mut PuzzleStore,
    checkpoint: Option<&Path>,
) -> io::Result<GenerateSummary> {
    let default_patterns;
    let patterns = if patterns.is_empty() {
        default_patterns = [Pattern::default()];
        &default_patterns[..]
    } else {
        patterns
    };

    let base_seed = match config.seed {
        Some(seed) => seed,
        None => rand::thread_rng().gen(),
    };
    let workers = config.workers.max(1);

    let seen = Mutex::new(SeenHashes::from_store(store));
    let stop = AtomicBool::new(false);
    let attempts = AtomicU64::new(0);
    let duplicates = AtomicU64::new(0);
    let (sender, receiver) = crossbeam_channel::unbounded();

    let mut summary = GenerateSummary::default();

    let result: io::Result<()> = thread::scope(|scope| {
        for worker_index in 0..workers {
            let sender = sender.clone();
            let seen = &seen;
            let stop = &stop;
            let attempts = &attempts;
            let duplicates = &duplicates;
            let mut rng = SmallRng::seed_from_u64(base_seed.wrapping_add(worker_index as u64));
            scope.spawn(move || {
                let mut solver = Solver::new();
                while !stop.load(Ordering::Relaxed) {
                    if attempts.fetch_add(1, Ordering::Relaxed) >= config.max_attempts {
                        break;
                    }
                    match attempt_candidate(&mut rng, patterns, &mut solver, seen, config) {
                        Attempt::Event(event) => {
                            if sender.send(event).is_err() {
                                break;
                            }
                        }
                        Attempt::Duplicate => {
                            duplicates.fetch_add(1, Ordering::Relaxed);
                        }
                        Attempt::Dropped => {}
                    }
                }
            });
        }
        drop(sender);

        for event in receiver.iter() {
            match event {
                GenEvent::Accepted(record) => {
                    // Workers race the stop flag, so extra accepts can
                    // arrive after the target is met; drop those.
                    if config.target == 0 || summary.accepted < config.target as u64 {
                        store.boards.push(record);
                        summary.accepted += 1;
                        if config.target > 0 && summary.accepted >= config.target as u64 {
                            stop.store(true, Ordering::Relaxed);
                        }
                    }
                }
                GenEvent::Rejected(record) => {
                    store.rejects.push(record);
                    summary.rejected += 1;
                }
            }
            if let Some(path) = checkpoint {
                if let Err(err) = store.save(path) {
                    stop.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
        Ok(())
    });
    result?;

    if let Some(path) = checkpoint {
        store.save(path)?;
    }

    summary.attempts = attempts.load(Ordering::Relaxed).min(config.max_attempts);
    summary.duplicates = duplicates.load(Ordering::Relaxed);
    Ok(summary)
}

fn attempt_candidate(
    rng: &mut SmallRng,
    patterns: &[Pattern],
    solver: &mut Solver,
    seen: &Mutex<SeenHashes>,
    config: &GeneratorConfig,
) -> Attempt {
    let pattern = &patterns[rng.gen_range(0..patterns.len())];
    let pristine = pattern.materialize(rng);
    let hash = pristine.fingerprint();

    {
        let seen = seen.lock().unwrap();
        if seen.accepted.contains(&hash) || seen.rejected.contains(&hash) {
            return Attempt::Duplicate;
        }
    }

    // Let loose material settle before the player appears.
    let mut board = pristine.clone();
    for _ in 0..config.idle_folds {
        board.fold();
    }
    let (start_x, start_y) = board.start();
    board.place(Element::new(ElementKind::Player), start_y, start_x);

    let mut solution = match solver.solve(&board, config.budget, config.max_move, 1.0) {
        Some(solution) => solution,
        None => {
            let reason = if solver.last_outcome() == SearchOutcome::TimedOut {
                RejectReason::Timeout
            } else {
                RejectReason::Unsolvable
            };
            let mut record = RejectRecord::new(hash, reason);
            if reason == RejectReason::Timeout {
                record.data = Some(pristine.to_string());
            }
            seen.lock().unwrap().rejected.insert(hash);
            return Attempt::Event(GenEvent::Rejected(record));
        }
    };

    if solution.bound < config.min_move {
        seen.lock().unwrap().rejected.insert(hash);
        return Attempt::Event(GenEvent::Rejected(RejectRecord::new(
            hash,
            RejectReason::MinMove,
        )));
    }

    // Tighten: rerun with the current bound as the cap and the estimate
    // relaxed in proportion, until no shorter solution turns up.
    let first_bound = solution.bound as f32;
    while solution.bound > 1 {
        let ratio = (solution.bound - 1) as f32 / first_bound;
        match solver.solve(&board, config.budget, solution.bound, ratio) {
            Some(better) if better.bound < solution.bound => {
                solution = better;
                if solution.bound < config.min_move {
                    return Attempt::Dropped;
                }
            }
            Some(_) => break,
            None => {
                if solver.last_outcome() == SearchOutcome::TimedOut {
                    let mut record = RejectRecord::new(hash, RejectReason::ReoptimizeTimeout);
                    fill_reject_details(&mut record, &pristine, config);
                    seen.lock().unwrap().rejected.insert(hash);
                    return Attempt::Event(GenEvent::Rejected(record));
                }
                break;
            }
        }
    }

    let stats = score_solution(&solution);
    if stats.score < config.min_score {
        let mut record = RejectRecord::new(hash, RejectReason::MinScore);
        fill_reject_details(&mut record, &pristine, config);
        record.solution = Some(build_solution_record(&solution, &stats));
        seen.lock().unwrap().rejected.insert(hash);
        return Attempt::Event(GenEvent::Rejected(record));
    }

    let (exit_x, exit_y) = pristine.exit();
    let record = PuzzleRecord {
        hash,
        width: pristine.width(),
        height: pristine.height(),
        par: solution.path.len(),
        start_x,
        start_y,
        exit_x,
        exit_y,
        idle: config.idle_folds,
        data: pristine.to_string(),
        solution: build_solution_record(&solution, &stats),
    };
    seen.lock().unwrap().accepted.insert(hash);
    Attempt::Event(GenEvent::Accepted(record))
}

fn fill_reject_details(record: &mut RejectRecord, pristine: &Board, config: &GeneratorConfig) {
    let (start_x, start_y) = pristine.start();
    let (exit_x, exit_y) = pristine.exit();
    record.width = Some(pristine.width());
    record.height = Some(pristine.height());
    record.start_x = Some(start_x);
    record.start_y = Some(start_y);
    record.exit_x = Some(exit_x);
    record.exit_y = Some(exit_y);
    record.idle = Some(config.idle_folds);
    record.data = Some(pristine.to_string());
}

struct SolutionStats {
    score: i64,
    avg_diff: i64,
    avg_goals: i64,
    avg_before: i64,
    avg_after: i64,
    falling_delta: i64,
    proximity: i64,
}

/// Score a solution path for how lively it plays. Cell churn dominates,
/// mobs near the player and mobs still ahead of it add tension, shrinking
/// fall activity subtracts a little.
fn score_solution(solution: &Solution) -> SolutionStats {
    let path = &solution.path;
    let steps = path.len() as i64;
    let rows = i32::from(path[0].height());
    let cols = i32::from(path[0].width());
    let cell_count = i64::from(path[0].width()) * i64::from(path[0].height());

    let mut diff_total = 0i64;
    let mut goal_total = 0i64;
    let mut mob_before = 0i64;
    let mut mob_after = 0i64;
    let mut falling_shift = 0i64;
    let mut proximity = 0i64;

    let mut previous: Option<&Board> = None;
    for board in path {
        if let Some(prev) = previous {
            for row in 0..rows {
                for col in 0..cols {
                    if prev.kind_at(row, col) != board.kind_at(row, col) {
                        diff_total += 1;
                    }
                }
            }
            falling_shift += falling_count(board) - falling_count(prev);
        }

        let mut before_player = true;
        for row in 0..rows {
            for col in 0..cols {
                let kind = board.kind_at(row, col);
                if kind == ElementKind::Diamond {
                    goal_total += 1;
                }
                if kind == ElementKind::Player {
                    before_player = false;
                } else if kind.mob() {
                    if before_player {
                        mob_before += 1;
                    } else {
                        mob_after += 1;
                    }
                    proximity += player_neighbors(board, row, col);
                }
            }
        }
        previous = Some(board);
    }

    let denom = (steps - 1).max(1);
    let avg_diff = (diff_total + denom - 1) / denom;
    let avg_goals = goal_total / steps;
    let avg_before = mob_before / steps;
    let avg_after = mob_after / steps;
    let falling_delta = falling_shift.max(-10);
    let score = avg_diff * 10
        + avg_before * 5
        + avg_after * 2
        + falling_delta * 5
        + cell_count
        + avg_goals * 3
        + proximity * 12;

    SolutionStats {
        score,
        avg_diff,
        avg_goals,
        avg_before,
        avg_after,
        falling_delta,
        proximity,
    }
}

fn falling_count(board: &Board) -> i64 {
    let mut count = 0;
    for row in 0..i32::from(board.height()) {
        for col in 0..i32::from(board.width()) {
            if board.element_at(row, col).falling {
                count += 1;
            }
        }
    }
    count
}

fn player_neighbors(board: &Board, row: i32, col: i32) -> i64 {
    let mut count = 0;
    for (dx, dy) in [(0, -1), (-1, 0), (0, 1), (1, 0)] {
        if board.kind_at(row + dy, col + dx) == ElementKind::Player {
            count += 1;
        }
    }
    count
}

fn build_solution_record(solution: &Solution, stats: &SolutionStats) -> SolutionRecord {
    SolutionRecord {
        score: stats.score,
        avg_diff: stats.avg_diff,
        avg_goals: stats.avg_goals,
        avg_before: stats.avg_before,
        avg_after: stats.avg_after,
        falling_delta: stats.falling_delta,
        proximity: stats.proximity,
        folds: solution
            .path
            .iter()
            .map(|board| FoldRecord {
                move_name: board.name_move(),
                data: board.to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed 3x3 pattern whose fill is all dirt, so every candidate is
    /// solvable by digging straight to the exit.
    fn create_dirt_pattern() -> Pattern {
        Pattern {
            min_width: 3,
            max_width: 3,
            min_height: 3,
            max_height: 3,
            mob_ratio: 0.0,
            dna: "*".to_string(),
            ..Pattern::default()
        }
    }

    fn create_test_config() -> GeneratorConfig {
        GeneratorConfig {
            workers: 1,
            seed: Some(42),
            target: 1,
            max_attempts: 50,
            min_move: 0,
            max_move: 20,
            min_score: -1_000,
            idle_folds: 0,
            budget: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_score_counts_churn_and_cells() {
        let mut first = Board::from_symbols(2, 2, "@d%%");
        first.set_exit(1, 1);
        let mut second = first.clone();
        second.set_move("Right");
        assert!(second.fold());
        assert_eq!(second.to_string(), ".@%%");

        let solution = Solution {
            path: vec![first, second],
            bound: 1,
        };
        let stats = score_solution(&solution);
        // Two cells changed over one step, four cells on the board, one
        // diamond over two boards rounds down to zero.
        assert_eq!(stats.avg_diff, 2);
        assert_eq!(stats.avg_goals, 0);
        assert_eq!(stats.score, 24);
    }

    #[test]
    fn test_score_counts_mob_pressure() {
        let board = Board::from_symbols(2, 1, "^@");
        let solution = Solution {
            path: vec![board],
            bound: 0,
        };
        let stats = score_solution(&solution);
        assert_eq!(stats.avg_before, 1);
        assert_eq!(stats.avg_after, 0);
        assert_eq!(stats.proximity, 1);
        // 5 for the leading mob, 12 for hugging the player, 2 cells.
        assert_eq!(stats.score, 19);
    }

    #[test]
    fn test_generate_accepts_a_puzzle() {
        let config = create_test_config();
        let patterns = [create_dirt_pattern()];
        let mut store = PuzzleStore::default();

        let summary = generate(&config, &patterns, &mut store, None).unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(store.boards.len(), 1);

        let record = &store.boards[0];
        assert_eq!(record.width, 3);
        assert_eq!(record.height, 3);
        assert!(record.par >= 1);
        assert_eq!(record.solution.folds.len(), record.par);
        assert_eq!(record.solution.folds[0].move_name, "Stationary");

        // The recorded layout parses back to the recorded hash.
        let parsed = Board::from_symbols(record.width, record.height, &record.data);
        assert_eq!(parsed.fingerprint(), record.hash);
    }

    #[test]
    fn test_generate_skips_known_hashes() {
        let config = create_test_config();
        let patterns = [create_dirt_pattern()];
        let mut store = PuzzleStore::default();

        generate(&config, &patterns, &mut store, None).unwrap();
        // Same seed, same store: the first candidate comes up again and
        // must be skipped as already accepted.
        let summary = generate(&config, &patterns, &mut store, None).unwrap();
        assert!(summary.duplicates >= 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(store.boards.len(), 2);
    }

    #[test]
    fn test_generate_rejects_short_solutions() {
        let config = GeneratorConfig {
            min_move: 50,
            max_attempts: 3,
            ..create_test_config()
        };
        let patterns = [create_dirt_pattern()];
        let mut store = PuzzleStore::default();

        let summary = generate(&config, &patterns, &mut store, None).unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected + summary.duplicates, 3);
        assert!(!store.rejects.is_empty());
        let record = &store.rejects[0];
        assert_eq!(record.reason, RejectReason::MinMove);
        // Short-solution rejects carry no board detail.
        assert!(record.width.is_none());
        assert!(record.data.is_none());
    }

    #[test]
    fn test_generate_checkpoints_store() {
        let path = std::env::temp_dir().join(format!(
            "cavegen-generate-checkpoint-{}.json",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();

        let config = create_test_config();
        let patterns = [create_dirt_pattern()];
        let mut store = PuzzleStore::default();
        generate(&config, &patterns, &mut store, Some(&path)).unwrap();

        let reloaded = PuzzleStore::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(reloaded, store);
    }
}
