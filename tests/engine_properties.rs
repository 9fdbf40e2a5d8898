use rand::SeedableRng;
use rand::rngs::StdRng;

use water_sort_engine::solver::solve_batch;
use water_sort_engine::{
    Difficulty, Error, GeneratorConfig, Move, Puzzle, SearchBudget, generate, solve,
};

fn replay(start: &Puzzle, moves: &[Move]) -> Puzzle {
    let mut state = start.clone();
    for mv in moves {
        let (next, amount) = state.apply(mv).expect("solution move should apply");
        assert_eq!(amount, mv.amount, "replayed amount differs for {mv}");
        state = next;
    }
    state
}

fn assert_invariants(state: &Puzzle) {
    state.check_conservation().expect("liquid conserved");
    for bottle in state.get_bottles() {
        assert!(bottle.len() <= state.get_bottle_height());
    }
}

#[test]
fn generated_puzzles_conserve_liquid_and_are_not_trivial() {
    let mut rng = StdRng::seed_from_u64(2024);
    let config = GeneratorConfig::new(3, 4);
    for _ in 0..25 {
        let puzzle = generate(&config, &mut rng).unwrap();
        assert_invariants(&puzzle);
        for count in puzzle.color_counts().values() {
            assert_eq!(*count, 4);
        }
        assert!(!puzzle.is_solved());
        assert!(puzzle.empty_bottle_count() >= 2);
    }
}

#[test]
fn every_legal_move_preserves_invariants() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut state = generate(&GeneratorConfig::for_difficulty(Difficulty::Medium), &mut rng).unwrap();
    for _ in 0..40 {
        let moves = state.all_legal_moves();
        assert_eq!(moves, state.all_legal_moves());
        let Some(mv) = moves.first() else {
            break;
        };
        for candidate in &moves {
            let (next, amount) = state.apply(candidate).unwrap();
            assert_eq!(amount, candidate.amount);
            assert_invariants(&next);
        }
        state = state.apply(mv).unwrap().0;
    }
}

#[test]
fn invalid_moves_return_errors_without_touching_state() {
    let state = Puzzle::new(vec![vec![1, 2], vec![2, 1], vec![]], 2).unwrap();
    let before = state.clone();
    for mv in [
        Move::new(1, 1, 1),
        Move::new(0, 3, 1),
        Move::new(2, 0, 1),
        Move::new(0, 2, 0),
    ] {
        assert!(matches!(state.apply(&mv), Err(Error::InvalidMove(_))), "{mv}");
    }
    assert_eq!(state, before);
}

#[test]
fn amount_is_the_minimum_of_request_run_and_space() {
    let state = Puzzle::new(vec![vec![1, 1, 1], vec![1], vec![]], 4).unwrap();
    let (next, amount) = state.apply(&Move::new(0, 1, 5)).unwrap();
    assert_eq!(amount, 3);
    assert_eq!(next.to_ids()[1], vec![1, 1, 1, 1]);
}

#[test]
fn solver_solution_replays_to_solved_state() {
    let start = Puzzle::new(vec![vec![1, 2], vec![2, 1], vec![]], 2).unwrap();
    let solution = solve(&start, &SearchBudget::unlimited()).unwrap();
    assert!(replay(&start, &solution.moves).is_solved());
}

#[test]
fn stuck_instance_reports_no_solution() {
    let start = Puzzle::new(vec![vec![1, 2], vec![1, 2]], 2).unwrap();
    let budget = SearchBudget::unlimited().with_max_expansions(1_000);
    assert!(matches!(
        solve(&start, &budget),
        Err(Error::NoSolutionFound { .. })
    ));
}

#[test]
fn generated_easy_puzzles_are_solved_in_parallel() {
    let config = GeneratorConfig::for_difficulty(Difficulty::Easy);
    let puzzles: Vec<Puzzle> = (0..8)
        .map(|seed| water_sort_engine::generate_seeded(&config, seed).unwrap())
        .collect();
    let budget = SearchBudget::unlimited().with_max_expansions(200_000);
    for (puzzle, result) in puzzles.iter().zip(solve_batch(&puzzles, &budget)) {
        match result {
            Ok(solution) => assert!(replay(puzzle, &solution.moves).is_solved()),
            Err(Error::NoSolutionFound { .. }) => {}
            Err(err) => panic!("unexpected solver outcome {err}"),
        }
    }
}

#[test]
fn text_form_round_trips_generated_puzzles() {
    let puzzle =
        water_sort_engine::generate_seeded(&GeneratorConfig::for_difficulty(Difficulty::Hard), 9)
            .unwrap();
    let repr = puzzle.get_text_representation();
    assert_eq!(Puzzle::new_from_repr(&repr).unwrap(), puzzle);
}
