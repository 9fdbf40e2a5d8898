use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A unit of liquid. Ids start at 1; `0` never names a color and is used as
/// the bottle separator in [`Puzzle::state_key`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(NonZeroU32);

impl Color {
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Color)
    }

    pub fn id(&self) -> u32 {
        self.0.get()
    }

    /// Parses a letter label; `"."` and blank cells are `None`.
    pub fn new_from_repr(repr: &str) -> Result<Option<Self>> {
        let s = repr.trim();
        if s.is_empty() || s == "." {
            return Ok(None);
        }
        Self::letters_to_color_id(s)
            .and_then(Color::new)
            .map(Some)
            .ok_or_else(|| Error::InvalidPuzzle(format!("bad color label {s:?}")))
    }

    /// Excel-style base-26 numbering: A=1, B=2, ..., Z=26, AA=27, ...
    fn letters_to_color_id(s: &str) -> Option<u32> {
        let mut acc: u32 = 0;
        for ch in s.chars() {
            if !ch.is_ascii_alphabetic() {
                return None;
            }
            let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
            acc = acc.checked_mul(26)?.checked_add(digit)?;
        }
        Some(acc)
    }

    pub fn get_letter_representation(&self) -> String {
        let mut chars = Vec::new();
        let mut id = self.id();
        while id > 0 {
            let rem = (id - 1) % 26;
            chars.push((b'A' + rem as u8) as char);
            id = (id - 1) / 26;
        }
        chars.iter().rev().collect()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_letter_representation())
    }
}

/// Colors stacked bottom first; the last element is the top.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bottle {
    colors: Vec<Color>,
}

impl Bottle {
    pub fn new() -> Self {
        Self { colors: Vec::new() }
    }

    pub fn from_colors(colors: Vec<Color>) -> Self {
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get_colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn get_top_color(&self) -> Option<Color> {
        self.colors.last().copied()
    }

    /// Length of the run of equal colors at the top.
    pub fn get_top_run(&self) -> usize {
        let Some(top) = self.get_top_color() else {
            return 0;
        };
        self.colors.iter().rev().take_while(|&&c| c == top).count()
    }

    pub fn get_empty_space(&self, bottle_height: usize) -> usize {
        bottle_height.saturating_sub(self.len())
    }

    pub fn is_monochrome(&self) -> bool {
        match self.colors.first() {
            Some(first) => self.colors.iter().all(|c| c == first),
            None => false,
        }
    }

    pub fn is_complete(&self, bottle_height: usize) -> bool {
        !self.is_empty() && self.len() == bottle_height && self.is_monochrome()
    }

    /// Maximal runs, bottom to top.
    pub fn runs(&self) -> Vec<(Color, usize)> {
        let mut runs: Vec<(Color, usize)> = Vec::new();
        for &color in &self.colors {
            match runs.last_mut() {
                Some((c, len)) if *c == color => *len += 1,
                _ => runs.push((color, 1)),
            }
        }
        runs
    }

    pub fn has_adjacent_duplicates(&self) -> bool {
        self.colors.windows(2).any(|w| w[0] == w[1])
    }

    pub(crate) fn take_top(&mut self, amount: usize) -> Vec<Color> {
        let split = self.colors.len().saturating_sub(amount);
        self.colors.split_off(split)
    }

    pub(crate) fn push_colors(&mut self, colors: &[Color]) {
        self.colors.extend_from_slice(colors);
    }

    pub fn new_from_repr(repr: &str) -> Result<(Self, usize)> {
        let cells: Vec<String> = if repr.contains(',') {
            repr.split(',').map(str::to_string).collect()
        } else {
            repr.chars().map(|ch| ch.to_string()).collect()
        };
        let capacity = cells.len();
        let mut colors = Vec::with_capacity(capacity);
        let mut seen_gap = false;
        for cell in &cells {
            match Color::new_from_repr(cell)? {
                Some(color) if seen_gap => {
                    return Err(Error::InvalidPuzzle(format!(
                        "color {color} floats above an empty cell in {repr:?}"
                    )));
                }
                Some(color) => colors.push(color),
                None => seen_gap = true,
            }
        }
        Ok((Self { colors }, capacity))
    }

    pub fn get_text_representation(&self, bottle_height: usize) -> String {
        let mut repr: Vec<String> = self
            .colors
            .iter()
            .map(|c| c.get_letter_representation())
            .collect();
        repr.extend(std::iter::repeat_n(".".to_string(), self.get_empty_space(bottle_height)));
        let has_multi_char = repr.iter().any(|s| s.len() > 1);
        let separator = if has_multi_char { "," } else { "" };
        repr.join(separator)
    }
}

/// Ordered bottles sharing one height. Treated as an immutable value: moves
/// produce a new `Puzzle` rather than editing this one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Puzzle {
    bottles: Vec<Bottle>,
    bottle_height: usize,
}

impl Puzzle {
    /// Builds a puzzle from raw color ids, bottom first.
    pub fn new(bottles: Vec<Vec<u32>>, bottle_height: usize) -> Result<Self> {
        let bottles = bottles
            .into_iter()
            .enumerate()
            .map(|(index, ids)| {
                ids.into_iter()
                    .map(|id| {
                        Color::new(id).ok_or_else(|| {
                            Error::InvalidPuzzle(format!("bottle {index} holds color id 0"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Bottle::from_colors)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_bottles(bottles, bottle_height)
    }

    pub fn from_bottles(bottles: Vec<Bottle>, bottle_height: usize) -> Result<Self> {
        if bottle_height == 0 {
            return Err(Error::InvalidPuzzle("bottle height must be positive".into()));
        }
        if let Some((index, bottle)) = bottles
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() > bottle_height)
        {
            return Err(Error::InvalidPuzzle(format!(
                "bottle {index} holds {} units but height is {bottle_height}",
                bottle.len()
            )));
        }
        Ok(Self {
            bottles,
            bottle_height,
        })
    }

    pub fn get_bottles(&self) -> &[Bottle] {
        &self.bottles
    }

    pub fn get_bottle(&self, index: usize) -> Option<&Bottle> {
        self.bottles.get(index)
    }

    pub fn bottle_count(&self) -> usize {
        self.bottles.len()
    }

    pub fn get_bottle_height(&self) -> usize {
        self.bottle_height
    }

    pub fn to_ids(&self) -> Vec<Vec<u32>> {
        self.bottles
            .iter()
            .map(|b| b.get_colors().iter().map(Color::id).collect())
            .collect()
    }

    pub fn color_counts(&self) -> BTreeMap<Color, usize> {
        let mut counts = BTreeMap::new();
        for color in self.bottles.iter().flat_map(|b| b.get_colors()) {
            *counts.entry(*color).or_insert(0) += 1;
        }
        counts
    }

    pub fn distinct_colors(&self) -> usize {
        self.color_counts().len()
    }

    pub fn empty_bottle_count(&self) -> usize {
        self.bottles.iter().filter(|b| b.is_empty()).count()
    }

    /// Every color must appear exactly `bottle_height` times.
    pub fn check_conservation(&self) -> Result<()> {
        for (color, count) in self.color_counts() {
            if count != self.bottle_height {
                return Err(Error::InvalidPuzzle(format!(
                    "color {color} appears {count} times, expected {}",
                    self.bottle_height
                )));
            }
        }
        Ok(())
    }

    /// Order-sensitive structural key: color ids with `0` between bottles.
    pub fn state_key(&self) -> Vec<u32> {
        let units: usize = self.bottles.iter().map(Bottle::len).sum();
        let mut key = Vec::with_capacity(units + self.bottles.len());
        for bottle in &self.bottles {
            key.extend(bottle.get_colors().iter().map(Color::id));
            key.push(0);
        }
        key
    }

    /// Copy-on-write pour; callers must have checked legality.
    pub(crate) fn with_pour(&self, from: usize, to: usize, amount: usize) -> Puzzle {
        let mut next = self.clone();
        let moving = next.bottles[from].take_top(amount);
        next.bottles[to].push_colors(&moving);
        next
    }

    pub fn new_from_repr(repr: &str) -> Result<Self> {
        let mut bottles = Vec::new();
        let mut height = None;
        for token in repr.split_whitespace() {
            let (bottle, capacity) = Bottle::new_from_repr(token)?;
            match height {
                None => height = Some(capacity),
                Some(h) if h != capacity => {
                    return Err(Error::InvalidPuzzle(format!(
                        "bottle {token:?} has {capacity} cells, expected {h}"
                    )));
                }
                Some(_) => {}
            }
            bottles.push(bottle);
        }
        let height = height.ok_or_else(|| Error::InvalidPuzzle("no bottles given".into()))?;
        Self::from_bottles(bottles, height)
    }

    pub fn get_text_representation(&self) -> String {
        self.bottles
            .iter()
            .map(|b| b.get_text_representation(self.bottle_height))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Puzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_text_representation())
    }
}

/// A pour request. Only meaningful against a specific [`Puzzle`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: usize,
    pub to: usize,
    pub amount: usize,
}

impl Move {
    pub fn new(from: usize, to: usize, amount: usize) -> Self {
        Self { from, to, amount }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(id: u32) -> Color {
        Color::new(id).unwrap()
    }

    #[test]
    fn letters_follow_excel_numbering() {
        assert_eq!(color(1).get_letter_representation(), "A");
        assert_eq!(color(26).get_letter_representation(), "Z");
        assert_eq!(color(27).get_letter_representation(), "AA");
        assert_eq!(color(28).get_letter_representation(), "AB");
        assert_eq!(Color::new_from_repr("ab").unwrap(), Some(color(28)));
        assert_eq!(Color::new_from_repr(".").unwrap(), None);
        assert!(Color::new_from_repr("A1").is_err());
        assert!(Color::new(0).is_none());
    }

    #[test]
    fn top_run_counts_equal_colors_from_the_top() {
        let bottle = Bottle::from_colors(vec![color(2), color(1), color(1), color(1)]);
        assert_eq!(bottle.get_top_color(), Some(color(1)));
        assert_eq!(bottle.get_top_run(), 3);
        assert_eq!(bottle.runs(), vec![(color(2), 1), (color(1), 3)]);
        assert_eq!(Bottle::new().get_top_run(), 0);
    }

    #[test]
    fn complete_requires_full_single_color() {
        let full = Bottle::from_colors(vec![color(1); 4]);
        assert!(full.is_complete(4));
        assert!(!full.is_complete(5));
        assert!(!Bottle::new().is_complete(4));
        let mixed = Bottle::from_colors(vec![color(1), color(1), color(2), color(1)]);
        assert!(!mixed.is_complete(4));
    }

    #[test]
    fn rejects_overfull_bottles_and_zero_colors() {
        assert!(matches!(
            Puzzle::new(vec![vec![1, 1, 1]], 2),
            Err(Error::InvalidPuzzle(_))
        ));
        assert!(matches!(
            Puzzle::new(vec![vec![1, 0]], 2),
            Err(Error::InvalidPuzzle(_))
        ));
    }

    #[test]
    fn state_key_separates_bottles() {
        let a = Puzzle::new(vec![vec![1], vec![2, 1], vec![]], 2).unwrap();
        let b = Puzzle::new(vec![vec![1, 2], vec![1], vec![]], 2).unwrap();
        assert_ne!(a.state_key(), b.state_key());
        assert_eq!(a.state_key(), vec![1, 0, 2, 1, 0, 0]);
    }

    #[test]
    fn text_representation_parses_back() {
        let puzzle = Puzzle::new(vec![vec![1, 2, 1], vec![2, 1, 2], vec![], vec![]], 4).unwrap();
        let repr = puzzle.get_text_representation();
        assert_eq!(repr, "ABA. BAB. .... ....");
        assert_eq!(Puzzle::new_from_repr(&repr).unwrap(), puzzle);
    }

    #[test]
    fn multi_letter_labels_use_commas() {
        let puzzle = Puzzle::new(vec![vec![27, 1], vec![]], 2).unwrap();
        assert_eq!(puzzle.get_text_representation(), "AA,A ..");
        assert_eq!(Puzzle::new_from_repr("AA,A ..").unwrap(), puzzle);
    }

    #[test]
    fn repr_rejects_floating_colors_and_ragged_heights() {
        assert!(Puzzle::new_from_repr("A.B. ....").is_err());
        assert!(Puzzle::new_from_repr("AB.. ...").is_err());
        assert!(Puzzle::new_from_repr("   ").is_err());
    }

    #[test]
    fn conservation_counts_every_color() {
        let ok = Puzzle::new(vec![vec![1, 2], vec![2, 1], vec![]], 2).unwrap();
        assert!(ok.check_conservation().is_ok());
        let bad = Puzzle::new(vec![vec![1, 2], vec![2, 2], vec![]], 2).unwrap();
        assert!(bad.check_conservation().is_err());
    }
}
