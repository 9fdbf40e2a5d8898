use tracing::debug;

use crate::error::Result;
use crate::model::{Move, Puzzle};
use crate::solver::{SearchBudget, solve};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    Pour(usize, usize),
    PourAmount(usize, usize, usize),
    Undo,
    Redo,
    Reset,
    Hint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Poured { amount: usize, solved: bool },
    Restored(bool),
    Hint(Option<Move>),
}

/// A puzzle being played: the current state plus undo/redo history.
pub struct GameSession {
    state: Puzzle,
    starting_state: Puzzle,
    undo_enable: bool,
    undo_stack: Vec<(Puzzle, usize)>,
    redo_stack: Vec<(Puzzle, usize)>,
    moves_made: usize,
    hint_budget: SearchBudget,
}

impl GameSession {
    pub fn new(puzzle: Puzzle, undo_enable: bool) -> Self {
        Self {
            state: puzzle.clone(),
            starting_state: puzzle,
            undo_enable,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            moves_made: 0,
            hint_budget: SearchBudget::unlimited(),
        }
    }

    pub fn with_hint_budget(mut self, budget: SearchBudget) -> Self {
        self.hint_budget = budget;
        self
    }

    pub fn get_state(&self) -> &Puzzle {
        &self.state
    }

    pub fn get_starting_state(&self) -> &Puzzle {
        &self.starting_state
    }

    pub fn get_moves_made(&self) -> usize {
        self.moves_made
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_solved()
    }

    pub fn handle_action(&mut self, action: SessionAction) -> Result<ActionOutcome> {
        let outcome = match action {
            SessionAction::Pour(from, to) => {
                let amount = self.pour(from, to)?;
                ActionOutcome::Poured {
                    amount,
                    solved: self.is_complete(),
                }
            }
            SessionAction::PourAmount(from, to, amount) => {
                let amount = self.pour_amount(from, to, amount)?;
                ActionOutcome::Poured {
                    amount,
                    solved: self.is_complete(),
                }
            }
            SessionAction::Undo => ActionOutcome::Restored(self.undo()),
            SessionAction::Redo => ActionOutcome::Restored(self.redo()),
            SessionAction::Reset => {
                self.reset();
                ActionOutcome::Restored(true)
            }
            SessionAction::Hint => ActionOutcome::Hint(self.hint()?),
        };
        debug!(?action, ?outcome, "Handled action");
        Ok(outcome)
    }

    /// Pours as much as possible. On error the state is unchanged.
    pub fn pour(&mut self, from: usize, to: usize) -> Result<usize> {
        let (next, amount) = self.state.auto_move(from, to)?;
        self.commit(next);
        Ok(amount)
    }

    pub fn pour_amount(&mut self, from: usize, to: usize, amount: usize) -> Result<usize> {
        let (next, amount) = self.state.apply(&Move::new(from, to, amount))?;
        self.commit(next);
        Ok(amount)
    }

    /// First move of a solution from the current state, `None` if already
    /// solved.
    pub fn hint(&self) -> Result<Option<Move>> {
        let solution = solve(&self.state, &self.hint_budget)?;
        Ok(solution.moves.first().copied())
    }

    pub fn reset(&mut self) {
        self.push_undo_state();
        self.state = self.starting_state.clone();
        self.moves_made = 0;
    }

    fn commit(&mut self, next: Puzzle) {
        self.push_undo_state();
        self.state = next;
        self.moves_made += 1;
    }

    fn push_undo_state(&mut self) {
        if self.undo_enable {
            self.undo_stack.push(self.snapshot());
            self.redo_stack.clear();
        }
    }

    fn snapshot(&self) -> (Puzzle, usize) {
        (self.state.clone(), self.moves_made)
    }

    fn restore(&mut self, (state, moves_made): (Puzzle, usize)) {
        self.state = state;
        self.moves_made = moves_made;
    }

    pub fn undo(&mut self) -> bool {
        if self.undo_enable
            && let Some(previous) = self.undo_stack.pop()
        {
            self.redo_stack.push(self.snapshot());
            self.restore(previous);
            return true;
        }
        false
    }

    pub fn redo(&mut self) -> bool {
        if self.undo_enable
            && let Some(next) = self.redo_stack.pop()
        {
            self.undo_stack.push(self.snapshot());
            self.restore(next);
            return true;
        }
        false
    }
}
