use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use water_sort_engine::config::EngineConfig;
use water_sort_engine::generator::generate_batch;
use water_sort_engine::renderer::{render_analysis, render_board};
use water_sort_engine::solver::solve_batch;
use water_sort_engine::{
    ActionOutcome, Difficulty, Error, GameSession, GeneratorConfig, Puzzle, SavedGame,
    SearchBudget, SessionAction, generate, generate_seeded, solve,
};

/// Generate, solve and play water-sort puzzles
#[derive(Parser, Debug)]
#[command(name = "water-sort", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "water-sort.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PuzzleSource {
    /// Puzzle text, e.g. "ABAB BABA .... ...."
    #[arg(long, conflicts_with = "load")]
    repr: Option<String>,

    /// Saved game JSON file
    #[arg(long)]
    load: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct Shape {
    /// Preset size; defaults to the config file's difficulty
    #[arg(short, long, value_enum)]
    difficulty: Option<Difficulty>,

    /// Number of colors (overrides the preset)
    #[arg(long)]
    colors: Option<usize>,

    /// Bottle height when --colors is given
    #[arg(long, default_value = "4")]
    height: usize,

    /// Bottle count when --colors is given
    #[arg(long)]
    bottles: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a shuffled puzzle
    Generate {
        #[command(flatten)]
        shape: Shape,

        #[arg(long)]
        seed: Option<u64>,

        /// Only accept puzzles the solver can finish
        #[arg(long)]
        verify: bool,

        /// Write the puzzle as a saved game
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Solve a puzzle and print the moves
    Solve {
        #[command(flatten)]
        source: PuzzleSource,

        /// Expansion budget (0 for unlimited)
        #[arg(long)]
        max_expansions: Option<usize>,
    },

    /// Play interactively on stdin
    Play {
        #[command(flatten)]
        source: PuzzleSource,

        #[command(flatten)]
        shape: Shape,

        #[arg(long)]
        seed: Option<u64>,

        /// Save the current state here on quit
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Generate and solve many puzzles in parallel
    Bench {
        #[command(flatten)]
        shape: Shape,

        #[arg(short, long, default_value = "16")]
        count: usize,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = EngineConfig::load(&cli.config)
        .with_context(|| format!("reading config {}", cli.config.display()))?;

    match cli.command {
        Command::Generate {
            shape,
            seed,
            verify,
            save,
        } => run_generate(&config, &shape, seed, verify, save.as_deref()),
        Command::Solve {
            source,
            max_expansions,
        } => {
            let puzzle = load_puzzle(&source)?.context("give --repr or --load")?;
            let budget = match max_expansions {
                Some(0) => SearchBudget::unlimited(),
                Some(max) => SearchBudget::unlimited().with_max_expansions(max),
                None => config.search_budget(),
            };
            run_solve(&puzzle, &budget)
        }
        Command::Play {
            source,
            shape,
            seed,
            save,
        } => {
            let puzzle = match load_puzzle(&source)? {
                Some(puzzle) => puzzle,
                None => new_puzzle(&generator_config(&config, &shape), seed)?,
            };
            run_play(&config, puzzle, save.as_deref())
        }
        Command::Bench { shape, count, seed } => {
            run_bench(&config, &generator_config(&config, &shape), count, seed)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn generator_config(config: &EngineConfig, shape: &Shape) -> GeneratorConfig {
    match shape.colors {
        Some(colors) => {
            let mut generator =
                config.apply_generator_settings(GeneratorConfig::new(colors, shape.height));
            if let Some(bottles) = shape.bottles {
                generator = generator.with_num_bottles(bottles);
            }
            generator
        }
        None => config.generator_config(shape.difficulty.unwrap_or(config.difficulty)),
    }
}

fn new_puzzle(generator: &GeneratorConfig, seed: Option<u64>) -> Result<Puzzle> {
    let puzzle = match seed {
        Some(seed) => generate_seeded(generator, seed)?,
        None => generate(generator, &mut rand::rng())?,
    };
    Ok(puzzle)
}

fn load_puzzle(source: &PuzzleSource) -> Result<Option<Puzzle>> {
    if let Some(repr) = &source.repr {
        return Ok(Some(Puzzle::new_from_repr(repr)?));
    }
    if let Some(path) = &source.load {
        let Some(saved) = SavedGame::load(path)? else {
            bail!("no saved game at {}", path.display());
        };
        return Ok(Some(saved.to_puzzle()?));
    }
    Ok(None)
}

fn run_generate(
    config: &EngineConfig,
    shape: &Shape,
    seed: Option<u64>,
    verify: bool,
    save: Option<&Path>,
) -> Result<()> {
    let mut generator = generator_config(config, shape);
    if verify {
        let budget = config.search_budget().get_max_expansions().unwrap_or(usize::MAX);
        generator = generator.with_verify_budget(budget);
    }
    let puzzle = new_puzzle(&generator, seed)?;
    println!("{}", render_board(&puzzle));
    println!("{}", puzzle.get_text_representation());
    println!("{}", render_analysis(&puzzle));
    if let Some(path) = save {
        SavedGame::from_puzzle(&puzzle, shape.difficulty).save(path)?;
        info!(path = %path.display(), "Saved puzzle");
    }
    Ok(())
}

fn run_solve(puzzle: &Puzzle, budget: &SearchBudget) -> Result<()> {
    println!("{}", render_board(puzzle));
    let started = Instant::now();
    match solve(puzzle, budget) {
        Ok(solution) => {
            println!(
                "solved in {} moves ({} states expanded, {:?})",
                solution.moves.len(),
                solution.expanded,
                started.elapsed()
            );
            let mut state = puzzle.clone();
            for (step, mv) in solution.moves.iter().enumerate() {
                let (next, _) = state.apply(mv)?;
                state = next;
                println!("{:>3}. {mv}    {}", step + 1, state);
            }
            Ok(())
        }
        Err(Error::NoSolutionFound { expanded }) => {
            println!("no solution exists ({expanded} states expanded)");
            Ok(())
        }
        Err(Error::Cancelled { expanded }) => {
            println!("gave up after {expanded} states; raise --max-expansions");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_action(line: &str) -> Option<SessionAction> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["undo" | "u"] => Some(SessionAction::Undo),
        ["redo" | "r"] => Some(SessionAction::Redo),
        ["reset"] => Some(SessionAction::Reset),
        ["hint" | "h"] => Some(SessionAction::Hint),
        [from, to] => Some(SessionAction::Pour(from.parse().ok()?, to.parse().ok()?)),
        [from, to, amount] => Some(SessionAction::PourAmount(
            from.parse().ok()?,
            to.parse().ok()?,
            amount.parse().ok()?,
        )),
        _ => None,
    }
}

fn run_play(config: &EngineConfig, puzzle: Puzzle, save: Option<&Path>) -> Result<()> {
    let mut session =
        GameSession::new(puzzle, config.undo).with_hint_budget(config.search_budget());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    println!("commands: <from> <to> [amount], undo, redo, reset, hint, quit");
    loop {
        println!("{}", render_board(session.get_state()));
        if session.is_complete() {
            println!("solved in {} moves", session.get_moves_made());
            break;
        }
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "quit" | "q") {
            break;
        }
        let Some(action) = parse_action(line) else {
            println!("unrecognised command {line:?}");
            continue;
        };
        match session.handle_action(action) {
            Ok(ActionOutcome::Poured { amount, .. }) => println!("poured {amount}"),
            Ok(ActionOutcome::Restored(false)) => println!("nothing to restore"),
            Ok(ActionOutcome::Restored(true)) => {}
            Ok(ActionOutcome::Hint(Some(mv))) => println!("try {mv}"),
            Ok(ActionOutcome::Hint(None)) => println!("already solved"),
            Err(err) => println!("{err}"),
        }
    }
    if let Some(path) = save {
        if session.is_complete() {
            SavedGame::clear(path)?;
        } else {
            SavedGame::from_puzzle(session.get_state(), None).save(path)?;
        }
    }
    Ok(())
}

fn run_bench(
    config: &EngineConfig,
    generator: &GeneratorConfig,
    count: usize,
    seed: u64,
) -> Result<()> {
    let started = Instant::now();
    let mut puzzles = Vec::with_capacity(count);
    for result in generate_batch(generator, count, seed) {
        match result {
            Ok(puzzle) => puzzles.push(puzzle),
            Err(err) => warn!(%err, "Skipping puzzle"),
        }
    }
    let generated_in = started.elapsed();

    let started = Instant::now();
    let results = solve_batch(&puzzles, &config.search_budget());
    let solved_in = started.elapsed();

    let (mut solved, mut unsolvable, mut cancelled, mut total_moves) = (0, 0, 0, 0);
    for result in &results {
        match result {
            Ok(solution) => {
                solved += 1;
                total_moves += solution.moves.len();
            }
            Err(Error::NoSolutionFound { .. }) => unsolvable += 1,
            Err(Error::Cancelled { .. }) => cancelled += 1,
            Err(err) => warn!(%err, "Unexpected solver error"),
        }
    }
    println!("generated {} puzzles in {generated_in:?}", puzzles.len());
    println!("solved {solved}, unsolvable {unsolvable}, over budget {cancelled} in {solved_in:?}");
    if solved > 0 {
        println!("average solution length {:.1}", total_moves as f64 / solved as f64);
    }
    Ok(())
}
