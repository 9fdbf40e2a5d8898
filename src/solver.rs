use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::model::{Color, Move, Puzzle};

/// Limits on a search. The cancel flag is checked once per dequeue and the
/// expansion cap right before a new state is expanded, so a goal or an empty
/// frontier reached within the cap is still reported as such. Tripping
/// either one ends the search with [`Error::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct SearchBudget {
    max_expansions: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = Some(max_expansions);
        self
    }

    /// Search stops at the next dequeue after `flag` becomes true.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn get_max_expansions(&self) -> Option<usize> {
        self.max_expansions
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn allows_expansion(&self, expanded: usize) -> bool {
        self.max_expansions.is_none_or(|max| expanded < max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub moves: Vec<Move>,
    pub expanded: usize,
}

#[derive(Clone)]
struct SearchNode {
    state: Puzzle,
    path: Vec<Move>,
    cost: usize,
}

struct FrontierEntry {
    f: usize,
    seq: u64,
    node: SearchNode,
}

// BinaryHeap pops the greatest entry: lowest f first, then earliest insertion.
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for FrontierEntry {}

pub struct Solver {
    starting_state: Puzzle,
    budget: SearchBudget,
    frontier: BinaryHeap<FrontierEntry>,
    visited_states: HashSet<Vec<u32>>,
    next_seq: u64,
    expanded: usize,
}

impl Solver {
    pub fn new(starting_state: Puzzle, budget: SearchBudget) -> Solver {
        Solver {
            starting_state,
            budget,
            frontier: BinaryHeap::new(),
            visited_states: HashSet::new(),
            next_seq: 0,
            expanded: 0,
        }
    }

    fn consider_state(&mut self, node: SearchNode) {
        let f = node.cost + heuristic(&node.state);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.frontier.push(FrontierEntry { f, seq, node });
    }

    /// A* over the move graph with unit edge cost. Returns the first solved
    /// state's move path.
    #[instrument(skip(self), fields(bottles = self.starting_state.bottle_count()))]
    pub fn solve(mut self) -> Result<Solution> {
        if self.starting_state.is_definitely_unsolvable() {
            debug!("Color counts cannot fill whole bottles, skipping search.");
            return Err(Error::NoSolutionFound { expanded: 0 });
        }
        info!(h = heuristic(&self.starting_state), "Starting search");
        let start = SearchNode {
            state: self.starting_state.clone(),
            path: Vec::new(),
            cost: 0,
        };
        self.consider_state(start);

        loop {
            if self.budget.is_cancelled() {
                debug!(expanded = self.expanded, "Search cancelled.");
                return Err(Error::Cancelled {
                    expanded: self.expanded,
                });
            }
            let Some(FrontierEntry { node, .. }) = self.frontier.pop() else {
                debug!(expanded = self.expanded, "Frontier exhausted.");
                return Err(Error::NoSolutionFound {
                    expanded: self.expanded,
                });
            };
            if node.state.is_solved() {
                info!(moves = node.path.len(), expanded = self.expanded, "Solution found");
                return Ok(Solution {
                    moves: node.path,
                    expanded: self.expanded,
                });
            }
            if !self.visited_states.insert(node.state.state_key()) {
                continue;
            }
            if !self.budget.allows_expansion(self.expanded) {
                debug!(expanded = self.expanded, "Expansion budget spent.");
                return Err(Error::Cancelled {
                    expanded: self.expanded,
                });
            }
            self.expanded += 1;
            for mv in node.state.all_legal_moves() {
                let Ok((next, _)) = node.state.apply(&mv) else {
                    continue;
                };
                if self.visited_states.contains(&next.state_key()) {
                    continue;
                }
                let mut path = node.path.clone();
                path.push(mv);
                self.consider_state(SearchNode {
                    state: next,
                    path,
                    cost: node.cost + 1,
                });
            }
        }
    }
}

pub fn solve(state: &Puzzle, budget: &SearchBudget) -> Result<Solution> {
    Solver::new(state.clone(), budget.clone()).solve()
}

/// Solves independent puzzles in parallel; results keep input order.
pub fn solve_batch(puzzles: &[Puzzle], budget: &SearchBudget) -> Vec<Result<Solution>> {
    puzzles.par_iter().map(|p| solve(p, budget)).collect()
}

/// Units that differ from the bottom unit of their bottle.
pub fn misplaced_units(state: &Puzzle) -> usize {
    state
        .get_bottles()
        .iter()
        .map(|b| match b.get_colors().first() {
            Some(first) => b.get_colors().iter().filter(|c| *c != first).count(),
            None => 0,
        })
        .sum()
}

/// Non-empty bottles holding more than one color.
pub fn incomplete_bottle_count(state: &Puzzle) -> usize {
    state
        .get_bottles()
        .iter()
        .filter(|b| !b.is_empty() && !b.is_monochrome())
        .count()
}

/// Sum over colors of (bottles containing the color - 1).
pub fn color_dispersion(state: &Puzzle) -> usize {
    let mut positions: BTreeMap<Color, usize> = BTreeMap::new();
    for bottle in state.get_bottles() {
        let distinct: BTreeSet<Color> = bottle.get_colors().iter().copied().collect();
        for color in distinct {
            *positions.entry(color).or_insert(0) += 1;
        }
    }
    positions.values().map(|n| n - 1).sum()
}

pub fn heuristic(state: &Puzzle) -> usize {
    misplaced_units(state) + incomplete_bottle_count(state) + color_dispersion(state)
}

impl Puzzle {
    /// True when some color's total can't be split into whole bottles. A
    /// false result says nothing about reachability.
    pub fn is_definitely_unsolvable(&self) -> bool {
        let height = self.get_bottle_height();
        self.color_counts()
            .into_values()
            .any(|count| count % height != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(bottles: Vec<Vec<u32>>, height: usize) -> Puzzle {
        Puzzle::new(bottles, height).unwrap()
    }

    fn replay(start: &Puzzle, moves: &[Move]) -> Puzzle {
        moves.iter().fold(start.clone(), |state, mv| {
            let (next, amount) = state.apply(mv).unwrap();
            assert_eq!(amount, mv.amount);
            next
        })
    }

    #[test]
    fn heuristic_parts() {
        let p = puzzle(vec![vec![1, 2, 1], vec![2, 2], vec![1], vec![]], 3);
        assert_eq!(misplaced_units(&p), 1);
        assert_eq!(incomplete_bottle_count(&p), 1);
        // color 1 in bottles 0 and 2, color 2 in bottles 0 and 1
        assert_eq!(color_dispersion(&p), 2);
        assert_eq!(heuristic(&p), 4);
        assert_eq!(heuristic(&puzzle(vec![vec![1, 1], vec![], vec![2, 2]], 2)), 0);
    }

    #[test]
    fn solves_two_color_swap() {
        let start = puzzle(vec![vec![1, 2], vec![2, 1], vec![]], 2);
        let solution = solve(&start, &SearchBudget::unlimited()).unwrap();
        assert!(!solution.moves.is_empty());
        assert!(replay(&start, &solution.moves).is_solved());
    }

    #[test]
    fn already_solved_returns_empty_path() {
        let start = puzzle(vec![vec![1, 1], vec![2, 2], vec![]], 2);
        let solution = solve(&start, &SearchBudget::unlimited()).unwrap();
        assert!(solution.moves.is_empty());
        assert_eq!(solution.expanded, 0);
    }

    #[test]
    fn stuck_puzzle_is_exhausted_not_cancelled() {
        let start = puzzle(vec![vec![1, 2], vec![1, 2]], 2);
        let budget = SearchBudget::unlimited().with_max_expansions(100);
        assert!(matches!(
            solve(&start, &budget),
            Err(Error::NoSolutionFound { expanded: 1 })
        ));
    }

    #[test]
    fn budget_trips_as_cancelled() {
        let start = puzzle(
            vec![vec![1, 2, 3, 1], vec![2, 3, 1, 2], vec![3, 1, 2, 3], vec![], vec![]],
            4,
        );
        let budget = SearchBudget::unlimited().with_max_expansions(1);
        assert!(matches!(
            solve(&start, &budget),
            Err(Error::Cancelled { expanded: 1 })
        ));

        let flag = Arc::new(AtomicBool::new(true));
        let budget = SearchBudget::unlimited().with_cancel_flag(flag);
        assert!(matches!(
            solve(&start, &budget),
            Err(Error::Cancelled { expanded: 0 })
        ));
    }

    #[test]
    fn exhaustion_at_the_expansion_cap_is_not_cancelled() {
        let start = puzzle(vec![vec![1, 2], vec![1, 2]], 2);
        let budget = SearchBudget::unlimited().with_max_expansions(1);
        assert!(matches!(
            solve(&start, &budget),
            Err(Error::NoSolutionFound { expanded: 1 })
        ));
    }

    #[test]
    fn solution_found_on_the_last_allowed_expansion() {
        let start = puzzle(vec![vec![1, 2], vec![2, 1], vec![]], 2);
        let unlimited = solve(&start, &SearchBudget::unlimited()).unwrap();
        assert!(unlimited.expanded > 0);

        let exact = SearchBudget::unlimited().with_max_expansions(unlimited.expanded);
        assert_eq!(solve(&start, &exact).unwrap(), unlimited);

        let short = SearchBudget::unlimited().with_max_expansions(unlimited.expanded - 1);
        assert!(matches!(solve(&start, &short), Err(Error::Cancelled { .. })));
    }

    #[test]
    fn solved_start_needs_no_expansions() {
        let start = puzzle(vec![vec![1, 1], vec![]], 2);
        let budget = SearchBudget::unlimited().with_max_expansions(0);
        let solution = solve(&start, &budget).unwrap();
        assert!(solution.moves.is_empty());
        assert_eq!(solution.expanded, 0);
    }

    #[test]
    fn search_is_deterministic() {
        let start = puzzle(
            vec![vec![1, 2, 3, 1], vec![2, 3, 1, 2], vec![3, 1, 2, 3], vec![], vec![]],
            4,
        );
        let a = solve(&start, &SearchBudget::unlimited()).unwrap();
        let b = solve(&start, &SearchBudget::unlimited()).unwrap();
        assert_eq!(a, b);
        assert!(replay(&start, &a.moves).is_solved());
    }

    #[test]
    fn uneven_color_counts_are_rejected_up_front() {
        let start = puzzle(vec![vec![1, 2], vec![1], vec![]], 2);
        assert!(start.is_definitely_unsolvable());
        assert!(matches!(
            solve(&start, &SearchBudget::unlimited()),
            Err(Error::NoSolutionFound { expanded: 0 })
        ));
        let doubled = puzzle(vec![vec![1, 1], vec![1, 1], vec![2, 2]], 2);
        assert!(!doubled.is_definitely_unsolvable());
    }

    #[test]
    fn batch_keeps_input_order() {
        let solvable = puzzle(vec![vec![1, 2], vec![2, 1], vec![]], 2);
        let stuck = puzzle(vec![vec![1, 2], vec![1, 2]], 2);
        let results = solve_batch(&[solvable.clone(), stuck, solvable], &SearchBudget::unlimited());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::NoSolutionFound { .. })));
        assert!(results[2].is_ok());
    }
}
