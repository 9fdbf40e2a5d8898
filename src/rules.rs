use tracing::trace;

use crate::error::{Error, InvalidMoveReason, Result};
use crate::model::{Move, Puzzle};

const EMPTY_BOTTLE_BONUS: i64 = 1;
const COMPLETE_BOTTLE_BONUS: i64 = 20;

impl Puzzle {
    /// Structural checks only; color compatibility and capacity are left to
    /// [`Puzzle::compute_legal_amount`].
    pub fn validate(&self, mv: &Move) -> Result<()> {
        let bottle_count = self.bottle_count();
        if mv.from >= bottle_count {
            return Err(Error::InvalidMove(InvalidMoveReason::SourceOutOfRange {
                index: mv.from,
                bottle_count,
            }));
        }
        if mv.to >= bottle_count {
            return Err(Error::InvalidMove(InvalidMoveReason::DestinationOutOfRange {
                index: mv.to,
                bottle_count,
            }));
        }
        if mv.from == mv.to {
            return Err(Error::InvalidMove(InvalidMoveReason::SameBottle));
        }
        if self.get_bottles()[mv.from].is_empty() {
            return Err(Error::InvalidMove(InvalidMoveReason::EmptySource));
        }
        if mv.amount == 0 {
            return Err(Error::InvalidMove(InvalidMoveReason::ZeroAmount));
        }
        Ok(())
    }

    /// `min(requested, top run of from, space in to)`, or 0 when the top
    /// colors differ or `to` is full.
    pub fn compute_legal_amount(&self, from: usize, to: usize, requested: usize) -> usize {
        if from == to {
            return 0;
        }
        let (Some(source), Some(target)) = (self.get_bottle(from), self.get_bottle(to)) else {
            return 0;
        };
        let Some(top_color) = source.get_top_color() else {
            return 0;
        };
        let space = target.get_empty_space(self.get_bottle_height());
        if space == 0 {
            return 0;
        }
        if let Some(target_top) = target.get_top_color()
            && target_top != top_color
        {
            return 0;
        }
        requested.min(source.get_top_run()).min(space)
    }

    /// Pours up to `mv.amount` units and returns the new state together with
    /// the amount actually poured. `self` is never modified.
    pub fn apply(&self, mv: &Move) -> Result<(Puzzle, usize)> {
        self.validate(mv)?;
        let amount = self.compute_legal_amount(mv.from, mv.to, mv.amount);
        if amount == 0 {
            return Err(Error::NoLiquidMovable {
                from: mv.from,
                to: mv.to,
            });
        }
        trace!(from = mv.from, to = mv.to, requested = mv.amount, amount, "pour");
        Ok((self.with_pour(mv.from, mv.to, amount), amount))
    }

    /// Pours as much as legally possible.
    pub fn auto_move(&self, from: usize, to: usize) -> Result<(Puzzle, usize)> {
        self.apply(&Move::new(from, to, self.get_bottle_height()))
    }

    /// Maximal legal pours out of `from`, destinations ascending.
    pub fn legal_moves(&self, from: usize) -> Vec<Move> {
        match self.get_bottle(from) {
            Some(bottle) if !bottle.is_empty() => {}
            _ => return Vec::new(),
        }
        (0..self.bottle_count())
            .filter(|&to| to != from)
            .filter_map(|to| {
                let amount = self.compute_legal_amount(from, to, self.get_bottle_height());
                (amount > 0).then(|| Move::new(from, to, amount))
            })
            .collect()
    }

    /// Every legal pour, ordered by source then destination.
    pub fn all_legal_moves(&self) -> Vec<Move> {
        (0..self.bottle_count())
            .flat_map(|from| self.legal_moves(from))
            .collect()
    }

    pub fn is_solved(&self) -> bool {
        let height = self.get_bottle_height();
        self.get_bottles()
            .iter()
            .all(|b| b.is_empty() || b.is_complete(height))
    }

    /// Higher is closer to solved. Only meant for ranking states.
    pub fn score(&self) -> i64 {
        let height = self.get_bottle_height();
        let mut score = 0;
        for bottle in self.get_bottles() {
            if bottle.is_empty() {
                score += EMPTY_BOTTLE_BONUS;
                continue;
            }
            let runs = bottle.runs();
            score += runs.iter().map(|&(_, len)| (len * len) as i64).sum::<i64>();
            if bottle.len() == height && runs.len() == 1 {
                score += COMPLETE_BOTTLE_BONUS;
            }
        }
        score
    }

    /// Score gained by playing `mv`, or -1 if the move is rejected.
    pub fn evaluate_move(&self, mv: &Move) -> i64 {
        match self.apply(mv) {
            Ok((next, _)) => next.score() - self.score(),
            Err(_) => -1,
        }
    }
}
