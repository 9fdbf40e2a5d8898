use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::generator::Difficulty;
use crate::model::Puzzle;

/// The minimal state needed to resume a game: bottles as color ids (bottom
/// first) plus the scalar parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGame {
    pub puzzle: Vec<Vec<u32>>,
    pub bottle_height: usize,
    pub num_colors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl SavedGame {
    pub fn from_puzzle(puzzle: &Puzzle, difficulty: Option<Difficulty>) -> Self {
        Self {
            puzzle: puzzle.to_ids(),
            bottle_height: puzzle.get_bottle_height(),
            num_colors: puzzle.distinct_colors(),
            difficulty,
        }
    }

    /// Rebuilds the puzzle, checking the height bound, color ids and
    /// conservation of liquid.
    pub fn to_puzzle(&self) -> Result<Puzzle> {
        let puzzle = Puzzle::new(self.puzzle.clone(), self.bottle_height)?;
        puzzle.check_conservation()?;
        if puzzle.distinct_colors() != self.num_colors {
            return Err(Error::InvalidPuzzle(format!(
                "saved game declares {} colors but holds {}",
                self.num_colors,
                puzzle.distinct_colors()
            )));
        }
        Ok(puzzle)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Saved game");
        Ok(())
    }

    /// `Ok(None)` when nothing has been saved at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let saved: SavedGame = serde_json::from_str(&data)?;
        saved.to_puzzle()?;
        debug!(path = %path.display(), "Loaded game");
        Ok(Some(saved))
    }

    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Puzzle {
        Puzzle::new(vec![vec![1, 2, 1, 2], vec![2, 1, 2, 1], vec![], vec![]], 4).unwrap()
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games").join("current.json");
        let saved = SavedGame::from_puzzle(&sample(), Some(Difficulty::Easy));
        saved.save(&path).unwrap();

        let loaded = SavedGame::load(&path).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.to_puzzle().unwrap(), sample());

        SavedGame::clear(&path).unwrap();
        assert!(SavedGame::load(&path).unwrap().is_none());
        SavedGame::clear(&path).unwrap();
    }

    #[test]
    fn json_uses_flat_integer_bottles() {
        let saved = SavedGame::from_puzzle(&sample(), None);
        let json: serde_json::Value = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["puzzle"][0], serde_json::json!([1, 2, 1, 2]));
        assert_eq!(json["bottleHeight"], 4);
        assert_eq!(json["numColors"], 2);
        assert!(json.get("difficulty").is_none());
    }

    #[test]
    fn load_rejects_broken_conservation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"puzzle":[[1,1,1],[2,2,2,2]],"bottleHeight":4,"numColors":2}"#,
        )
        .unwrap();
        assert!(matches!(SavedGame::load(&path), Err(Error::InvalidPuzzle(_))));
    }
}
