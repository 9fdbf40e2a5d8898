//! Settings for the `water-sort` binary, read from a TOML file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::generator::{Difficulty, GeneratorConfig, MAX_GENERATION_ATTEMPTS, MIN_EMPTY_BOTTLES};
use crate::solver::SearchBudget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub difficulty: Difficulty,
    pub generator: GeneratorSettings,
    pub solver: SolverSettings,
    /// Keep undo history in `play` sessions.
    pub undo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub max_attempts: usize,
    pub min_empty_bottles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Zero means unlimited.
    pub max_expansions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Easy,
            generator: GeneratorSettings::default(),
            solver: SolverSettings::default(),
            undo: true,
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_GENERATION_ATTEMPTS,
            min_empty_bottles: MIN_EMPTY_BOTTLES,
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_expansions: 200_000,
        }
    }
}

impl EngineConfig {
    /// Defaults when the file does not exist; parse errors are reported.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "Loaded config");
                Ok(toml::from_str(&content)?)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn generator_config(&self, difficulty: Difficulty) -> GeneratorConfig {
        self.apply_generator_settings(GeneratorConfig::for_difficulty(difficulty))
    }

    pub fn apply_generator_settings(&self, config: GeneratorConfig) -> GeneratorConfig {
        config
            .with_max_attempts(self.generator.max_attempts)
            .with_min_empty_bottles(self.generator.min_empty_bottles)
    }

    pub fn search_budget(&self) -> SearchBudget {
        match self.solver.max_expansions {
            0 => SearchBudget::unlimited(),
            max => SearchBudget::unlimited().with_max_expansions(max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("water-sort.toml");
        fs::write(&path, "difficulty = \"hard\"\n[solver]\nmax_expansions = 0\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.search_budget().get_max_expansions(), None);
        assert_eq!(config.generator, GeneratorSettings::default());
        assert!(config.undo);
        assert_eq!(config.generator_config(Difficulty::Hard).get_num_bottles(), 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "difficulty = [").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(crate::error::Error::Toml(_))
        ));
    }
}
