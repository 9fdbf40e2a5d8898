use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::model::{Bottle, Color, Puzzle};
use crate::solver::{SearchBudget, solve};

pub const MIN_COLORS: usize = 2;
pub const MIN_BOTTLE_HEIGHT: usize = 4;
pub const MIN_EMPTY_BOTTLES: usize = 2;
pub const MAX_GENERATION_ATTEMPTS: usize = 1000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// `(colors, bottle height, bottles)`
    pub fn get_dimensions(&self) -> (usize, usize, usize) {
        match self {
            Difficulty::Easy => (3, 4, 5),
            Difficulty::Medium => (5, 4, 7),
            Difficulty::Hard => (8, 4, 10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub num_colors: usize,
    pub bottle_height: usize,
    /// Defaults to `num_colors + min_empty_bottles`.
    pub num_bottles: Option<usize>,
    pub min_empty_bottles: usize,
    pub max_attempts: usize,
    /// When set, candidates the solver can't finish within this many
    /// expansions are rejected.
    pub verify_budget: Option<usize>,
}

impl GeneratorConfig {
    pub fn new(num_colors: usize, bottle_height: usize) -> Self {
        Self {
            num_colors,
            bottle_height,
            num_bottles: None,
            min_empty_bottles: MIN_EMPTY_BOTTLES,
            max_attempts: MAX_GENERATION_ATTEMPTS,
            verify_budget: None,
        }
    }

    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (num_colors, bottle_height, num_bottles) = difficulty.get_dimensions();
        Self::new(num_colors, bottle_height).with_num_bottles(num_bottles)
    }

    pub fn with_num_bottles(mut self, num_bottles: usize) -> Self {
        self.num_bottles = Some(num_bottles);
        self
    }

    pub fn with_min_empty_bottles(mut self, min_empty_bottles: usize) -> Self {
        self.min_empty_bottles = min_empty_bottles;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_verify_budget(mut self, max_expansions: usize) -> Self {
        self.verify_budget = Some(max_expansions);
        self
    }

    pub fn get_num_bottles(&self) -> usize {
        self.num_bottles
            .unwrap_or(self.num_colors.saturating_add(self.min_empty_bottles))
    }

    fn required_bottles(&self) -> Result<usize> {
        self.num_colors
            .checked_add(self.min_empty_bottles)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} colors plus {} empty bottles is too many bottles",
                    self.num_colors, self.min_empty_bottles
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_colors < MIN_COLORS {
            return Err(Error::InvalidConfig(format!(
                "need at least {MIN_COLORS} colors, got {}",
                self.num_colors
            )));
        }
        if self.bottle_height < MIN_BOTTLE_HEIGHT {
            return Err(Error::InvalidConfig(format!(
                "bottle height must be at least {MIN_BOTTLE_HEIGHT}, got {}",
                self.bottle_height
            )));
        }
        let num_bottles = self.get_num_bottles();
        if num_bottles < self.required_bottles()? {
            return Err(Error::InvalidConfig(format!(
                "{num_bottles} bottles cannot hold {} colors plus {} empty bottles",
                self.num_colors, self.min_empty_bottles
            )));
        }
        if u32::try_from(self.num_colors).is_err()
            || self.num_colors.checked_mul(self.bottle_height).is_none()
        {
            return Err(Error::InvalidConfig(format!(
                "too many colors: {}",
                self.num_colors
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be positive".into()));
        }
        Ok(())
    }
}

/// Shuffles `height` units of every color into full bottles followed by
/// empty ones, retrying until the result is mixed and well formed or the
/// attempt budget runs out.
#[instrument(skip(rng))]
pub fn generate<R: Rng + ?Sized>(config: &GeneratorConfig, rng: &mut R) -> Result<Puzzle> {
    config.validate()?;
    for attempt in 1..=config.max_attempts {
        let candidate = create_directly_mixed_state(config, rng)?;
        if let Err(reason) = check_candidate(config, &candidate) {
            debug!(attempt, %reason, "Rejected candidate");
            continue;
        }
        if let Some(max_expansions) = config.verify_budget {
            let budget = SearchBudget::unlimited().with_max_expansions(max_expansions);
            if let Err(err) = solve(&candidate, &budget) {
                debug!(attempt, %err, "Candidate failed solver verification");
                continue;
            }
        }
        info!(attempt, "Generated puzzle");
        return Ok(candidate);
    }
    Err(Error::GenerationExhausted {
        attempts: config.max_attempts,
    })
}

pub fn generate_seeded(config: &GeneratorConfig, seed: u64) -> Result<Puzzle> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate(config, &mut rng)
}

/// Generates `count` puzzles in parallel, puzzle `i` seeded with
/// `base_seed + i`.
pub fn generate_batch(config: &GeneratorConfig, count: usize, base_seed: u64) -> Vec<Result<Puzzle>> {
    (0..count as u64)
        .into_par_iter()
        .map(|i| generate_seeded(config, base_seed.wrapping_add(i)))
        .collect()
}

fn create_directly_mixed_state<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Puzzle> {
    let mut all_colors: Vec<Color> = (1..=config.num_colors as u32)
        .filter_map(Color::new)
        .flat_map(|color| std::iter::repeat_n(color, config.bottle_height))
        .collect();
    shuffle(&mut all_colors, rng);

    let filled_bottles = config.get_num_bottles() - config.min_empty_bottles;
    let mut units = all_colors.chunks(config.bottle_height);
    let mut bottles: Vec<Bottle> = (0..filled_bottles)
        .map(|_| {
            units
                .next()
                .map(|chunk| Bottle::from_colors(chunk.to_vec()))
                .unwrap_or_default()
        })
        .collect();
    bottles.extend((0..config.min_empty_bottles).map(|_| Bottle::new()));
    Puzzle::from_bottles(bottles, config.bottle_height)
}

/// Fisher-Yates: for `i` from the last index down to 1, swap with a uniform
/// index in `[0, i]`.
fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

fn check_candidate(config: &GeneratorConfig, state: &Puzzle) -> std::result::Result<(), String> {
    if state.is_solved() {
        return Err("already solved".into());
    }
    is_completely_mixed(state)?;
    has_valid_structure(config, state)
}

/// No bottle may hold the same color in two neighbouring slots.
fn is_completely_mixed(state: &Puzzle) -> std::result::Result<(), String> {
    match state
        .get_bottles()
        .iter()
        .position(Bottle::has_adjacent_duplicates)
    {
        Some(index) => Err(format!("bottle {index} has adjacent equal colors")),
        None => Ok(()),
    }
}

fn has_valid_structure(config: &GeneratorConfig, state: &Puzzle) -> std::result::Result<(), String> {
    let color_counts = state.color_counts();
    if color_counts.len() != config.num_colors {
        return Err(format!(
            "color count mismatch: expected {}, found {}",
            config.num_colors,
            color_counts.len()
        ));
    }
    if let Some((color, count)) = color_counts
        .iter()
        .find(|(_, count)| **count != config.bottle_height)
    {
        return Err(format!(
            "color {color} appears {count} times, expected {}",
            config.bottle_height
        ));
    }
    let empty_bottles = state.empty_bottle_count();
    if empty_bottles < config.min_empty_bottles {
        return Err(format!(
            "only {empty_bottles} empty bottles, need {}",
            config.min_empty_bottles
        ));
    }
    Ok(())
}
