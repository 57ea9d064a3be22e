//! CLI entry point for the cave puzzle generator.
//!
//! Usage:
//!   cavegen generate [options]
//!   cavegen solve <board.json> [options]
//!   cavegen solve --stdin [options]
//!
//! Options (generate):
//!   --store <path>       Puzzle store JSON file (default: puzzles.json)
//!   --patterns <path>    Pattern definitions JSON file
//!   --count <n>          Puzzles to accept before stopping (default: 1)
//!   --max-attempts <n>   Candidate limit across all workers (default: 10000)
//!   --workers <n>        Worker threads (default: cores - 1)
//!   --seed <n>           Base RNG seed (default: random)
//!   --min-move <n>       Reject solutions shorter than this (default: 15)
//!   --max-move <n>       Abandon searches reaching this cost (default: 75)
//!   --min-score <n>      Reject puzzles scoring below this (default: 100)
//!   --idle-folds <n>     Settling folds before the player lands (default: 5)
//!   --timeout <seconds>  Solve budget per search iteration (default: 600)
//!
//! Options (solve):
//!   --timeout <seconds>  Search budget per iteration (default: 600)
//!   --max-cost <n>       Give up instead of raising the bound this far (default: 75)
//!   --ratio <f>          Heuristic weight (default: 1.0)

mod board;
mod element;
mod generator;
mod pattern;
mod rules;
mod solver;
mod store;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use board::Board;
use generator::{generate, GeneratorConfig};
use pattern::{load_patterns, Pattern};
use solver::{SearchOutcome, Solver};
use store::PuzzleStore;

#[derive(Parser)]
#[command(name = "cavegen")]
#[command(about = "Generator and solver for falling-block cave puzzles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate puzzles into a store file
    Generate {
        /// Puzzle store JSON file, created when missing
        #[arg(long, default_value = "puzzles.json")]
        store: PathBuf,

        /// Pattern definitions JSON file (omit for the built-in pattern)
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Puzzles to accept before stopping (0 runs to the attempt limit)
        #[arg(long, default_value = "1")]
        count: usize,

        /// Candidate limit across all workers
        #[arg(long, default_value = "10000")]
        max_attempts: u64,

        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Base RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Reject solutions shorter than this many moves
        #[arg(long, default_value = "15")]
        min_move: u32,

        /// Abandon searches once the bound would reach this cost
        #[arg(long, default_value = "75")]
        max_move: u32,

        /// Reject puzzles scoring below this
        #[arg(long, default_value = "100")]
        min_score: i64,

        /// Settling folds before the player is placed
        #[arg(long, default_value = "5")]
        idle_folds: u32,

        /// Solve budget per search iteration in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
    },

    /// Solve a single board and print the moves
    Solve {
        /// Path to board JSON file (use --stdin to read from stdin)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Read board from stdin instead of file
        #[arg(long)]
        stdin: bool,

        /// Search budget per iteration in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        /// Give up instead of raising the bound to this cost
        #[arg(long, default_value = "75")]
        max_cost: u32,

        /// Heuristic weight
        #[arg(long, default_value = "1.0")]
        ratio: f32,
    },
}

/// Board layout accepted by the solve command
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveInput {
    width: u8,
    height: u8,
    /// Row-major symbol string with the player placed as '@'
    data: String,
    exit_x: i32,
    exit_y: i32,
}

/// Output format for the solve command
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveOutput {
    solved: bool,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bound: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moves: Option<Vec<String>>,
    nodes: u64,
    time_elapsed_ms: u64,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            store,
            patterns,
            count,
            max_attempts,
            workers,
            seed,
            min_move,
            max_move,
            min_score,
            idle_folds,
            timeout,
        } => {
            let mut puzzle_store = match PuzzleStore::load(&store) {
                Ok(loaded) => loaded,
                Err(e) => {
                    eprintln!("Error loading store {:?}: {}", store, e);
                    std::process::exit(1);
                }
            };

            let pattern_list: Vec<Pattern> = match patterns {
                Some(path) => match load_patterns(&path) {
                    Ok(list) => list,
                    Err(e) => {
                        eprintln!("Error loading patterns {:?}: {}", path, e);
                        std::process::exit(1);
                    }
                },
                None => Vec::new(),
            };

            let mut config = GeneratorConfig {
                seed,
                target: count,
                max_attempts,
                min_move,
                max_move,
                min_score,
                idle_folds,
                budget: Duration::from_secs(timeout),
                ..GeneratorConfig::default()
            };
            if let Some(workers) = workers {
                config.workers = workers;
            }

            eprintln!(
                "generating with {} workers, target {}, up to {} attempts",
                config.workers, config.target, config.max_attempts
            );

            match generate(&config, &pattern_list, &mut puzzle_store, Some(&store)) {
                Ok(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
                }
                Err(e) => {
                    eprintln!("Error saving store {:?}: {}", store, e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Solve {
            file,
            stdin,
            timeout,
            max_cost,
            ratio,
        } => {
            // Read board JSON
            let json_content = if stdin {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .expect("Failed to read from stdin");
                buffer
            } else if let Some(path) = file {
                fs::read_to_string(&path)
                    .unwrap_or_else(|e| panic!("Failed to read file {:?}: {}", path, e))
            } else {
                eprintln!("Error: Must provide either a file path or --stdin");
                std::process::exit(1);
            };

            // Parse board
            let input: SolveInput = match serde_json::from_str(&json_content) {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("Error parsing board JSON: {}", e);
                    std::process::exit(1);
                }
            };

            let mut root = Board::from_symbols(input.width, input.height, &input.data);
            root.set_exit(input.exit_x, input.exit_y);

            // Run solver
            let mut solver = Solver::new();
            let started = Instant::now();
            let solution = solver.solve(&root, Duration::from_secs(timeout), max_cost, ratio);
            let elapsed = started.elapsed();

            let output = SolveOutput {
                solved: solution.is_some(),
                outcome: outcome_name(solver.last_outcome()).to_string(),
                bound: solution.as_ref().map(|solution| solution.bound),
                moves: solution.as_ref().map(|solution| solution.move_names()),
                nodes: solver.nodes(),
                time_elapsed_ms: elapsed.as_millis() as u64,
            };

            // Print JSON output
            println!("{}", serde_json::to_string_pretty(&output).unwrap());

            // Exit with appropriate code
            if output.solved {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
    }
}

fn outcome_name(outcome: SearchOutcome) -> &'static str {
    match outcome {
        SearchOutcome::Found => "found",
        SearchOutcome::NotFound => "not_found",
        SearchOutcome::TimedOut => "timed_out",
        SearchOutcome::Canceled => "canceled",
        SearchOutcome::Exceeded(_) => "cost_exceeded",
    }
}
