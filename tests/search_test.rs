//! End-to-end searches through the public engine API.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chess_search::ai::score::{is_eval, mate_in, win, NONE};
use chess_search::ai::{Engine, EngineConfig, EngineError, SearchInput, SearchOutput, SearchSignals};
use chess_search::game_repr::Pos;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const MATE_IN_1: &str = "7k/8/6K1/8/8/8/8/R7 w - - 0 1";
const MATE_IN_2: &str = "7k/8/5K2/8/8/8/8/R7 w - - 0 1";
/// Black can only play Kh7.
const ONLY_MOVE: &str = "7k/8/5K2/8/8/8/8/6R1 b - - 0 1";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine(threads: usize) -> Engine {
    Engine::new(EngineConfig::default().with_threads(threads).with_hash_mb(4)).unwrap()
}

fn search(engine: &mut Engine, fen: &str, depth: i32) -> SearchOutput {
    let mut output = SearchOutput::new();
    engine.search_fen(&mut output, fen, &SearchInput::depth(depth)).unwrap();
    output
}

#[test]
fn test_single_legal_move_is_played_at_once() {
    init_logger();

    let mut engine = engine(1);
    let output = search(&mut engine, ONLY_MOVE, 10);

    assert_eq!(output.best_move.map(|mv| mv.to_string()), Some("h8h7".to_string()));
    assert_eq!(output.depth, 0);
    assert_eq!(output.nodes, 0);
}

#[test]
fn test_mate_in_one() {
    init_logger();

    for threads in [1, 4] {
        let mut engine = engine(threads);
        let output = search(&mut engine, MATE_IN_1, 8);

        assert_eq!(output.best_move.map(|mv| mv.to_string()), Some("a1a8".to_string()));
        assert_eq!(output.score, win(1), "{threads} threads");
        assert_eq!(mate_in(output.score), Some(1));
    }
}

#[test]
fn test_mate_in_two() {
    init_logger();

    for threads in [1, 4] {
        let mut engine = engine(threads);
        let output = search(&mut engine, MATE_IN_2, 8);

        assert_eq!(output.score, win(3), "{threads} threads");
        assert!(output.answer.is_some());
        if threads > 1 {
            assert!(output.splits > 0, "no split point was created");
        } else {
            assert_eq!(output.splits, 0);
        }
    }
}

#[test]
fn test_mate_distance_is_stable_across_depths() {
    init_logger();

    let mut engine = engine(1);
    for depth in 2..=6 {
        let output = search(&mut engine, MATE_IN_1, depth);
        assert_eq!(output.score, win(1), "depth {depth}");
    }
}

#[test]
fn test_mate_is_shorter_from_closer_to_the_root() {
    init_logger();

    // The position after Kg6 Kg8 in the mate in two.
    let mut engine = engine(1);
    let two = search(&mut engine, MATE_IN_2, 6);
    let one = search(&mut engine, "6k1/8/6K1/8/8/8/8/R7 w - - 0 1", 6);

    assert_eq!(two.score, win(3));
    assert_eq!(one.score, win(1));
    assert!(one.score > two.score);
}

#[test]
fn test_null_move_agrees_in_zugzwang() {
    init_logger();

    // Whoever moves loses the opposition.
    for fen in ["8/8/3k4/3P4/3K4/8/8/8 w - - 0 1", "8/8/3k4/3P4/3K4/8/8/8 b - - 0 1"] {
        let mut with_null = Engine::new(EngineConfig::default().with_hash_mb(4)).unwrap();
        let mut without_null =
            Engine::new(EngineConfig::default().with_hash_mb(4).with_null_move(false)).unwrap();

        let a = search(&mut with_null, fen, 8);
        let b = search(&mut without_null, fen, 8);

        assert_eq!(a.score, b.score, "{fen}");
        assert_eq!(a.best_move, b.best_move, "{fen}");
        assert_eq!(a.nodes, b.nodes, "{fen}");
    }
}

#[test]
fn test_start_position_is_balanced() {
    init_logger();

    let mut engine = engine(1);
    let output = search(&mut engine, START_FEN, 1);

    assert!(output.best_move.is_some());
    assert!(output.score.abs() < 100, "score {}", output.score);
    assert_eq!(output.depth, 1);
}

#[test]
fn test_serial_search_is_deterministic() {
    init_logger();

    let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

    let first = search(&mut engine(1), fen, 5);
    let second = search(&mut engine(1), fen, 5);

    assert_eq!(first.best_move, second.best_move);
    assert_eq!(first.score, second.score);
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.pv.to_uci(), second.pv.to_uci());
}

#[test]
fn test_parallel_search_agrees_on_forced_lines() {
    init_logger();

    // The knight takes a hanging queen and the pawn recaptures.
    let fen = "4k3/pp3ppp/2q5/8/3N4/8/PP3PPP/4K3 w - - 0 1";

    let serial = search(&mut engine(1), fen, 8);
    let parallel = search(&mut engine(4), fen, 8);

    assert!(parallel.splits > 0, "no split point was created");
    assert!(is_eval(serial.score) && is_eval(parallel.score));
    assert!(serial.score > 300 && parallel.score > 300);
    assert_eq!(serial.best_move, parallel.best_move);
    assert_eq!(serial.best_move.map(|mv| mv.to_string()), Some("d4c6".to_string()));
}

#[test]
fn test_no_legal_moves_is_an_error() {
    init_logger();

    let mut engine = engine(1);
    let mut output = SearchOutput::new();

    // Checkmated.
    let err = engine
        .search_fen(&mut output, "R6k/8/6K1/8/8/8/8/8 b - - 0 1", &SearchInput::depth(3))
        .unwrap_err();
    assert_eq!(err, EngineError::NoLegalMoves);
    assert!(output.best_move.is_none());

    // Stalemated.
    let err = engine
        .search_fen(&mut output, "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", &SearchInput::depth(3))
        .unwrap_err();
    assert_eq!(err, EngineError::NoLegalMoves);
}

#[test]
fn test_stop_signal_ends_infinite_search() {
    init_logger();

    let mut engine = engine(2);
    let signals = SearchSignals::new();
    let input = SearchInput::infinite(signals.clone());

    let stopper = {
        let signals = signals.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            signals.stop();
        })
    };

    let start = Instant::now();
    let mut output = SearchOutput::new();
    engine.search_fen(&mut output, START_FEN, &input).unwrap();
    stopper.join().unwrap();

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(output.best_move.is_some());
    assert!(Pos::default().legal_moves().contains(output.best_move.unwrap()));
}

#[test]
fn test_movetime_is_respected() {
    init_logger();

    let mut engine = engine(1);
    let start = Instant::now();
    let mut output = SearchOutput::new();
    engine
        .search_fen(&mut output, START_FEN, &SearchInput::movetime(0.3))
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(output.best_move.is_some());
    assert!(output.depth >= 1);
}

#[test]
fn test_info_lines_reach_the_callback() {
    init_logger();

    let lines = Arc::new(Mutex::new(Vec::new()));
    let mut output = {
        let lines = lines.clone();
        SearchOutput::with_callback(move |line| lines.lock().unwrap().push(line.to_string()))
    };

    let mut engine = engine(1);
    engine
        .search_fen(&mut output, MATE_IN_1, &SearchInput::depth(3))
        .unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|line| line.contains("score mate 1") && line.contains(" pv a1a8")));
    assert!(lines.iter().any(|line| line.contains("hashfull")));
}

#[test]
fn test_quick_queries() {
    init_logger();

    let mut engine = engine(1);
    let only_move = Pos::from_fen(ONLY_MOVE).unwrap();
    assert_eq!(engine.quick_move(&only_move).map(|mv| mv.to_string()), Some("h8h7".to_string()));

    let start = Pos::default();
    assert_eq!(engine.quick_score(&start), NONE);

    search(&mut engine, START_FEN, 4);

    // The reply position of the main line is cached with a legal move.
    let output = search(&mut engine, START_FEN, 4);
    let after = start.succ(output.best_move.unwrap());
    if let Some(mv) = engine.quick_move(&after) {
        assert!(after.legal_moves().contains(mv));
    }

    engine.clear();
    assert_eq!(engine.quick_score(&after), NONE);
}

#[test]
fn test_random_positions_give_legal_moves() {
    init_logger();

    let mut rng = StdRng::seed_from_u64(7);
    let mut engine = engine(2);

    for _ in 0..8 {
        let mut pos = Pos::default();
        for _ in 0..20 {
            let moves: Vec<_> = pos.legal_moves().iter().collect();
            let Some(&mv) = moves.choose(&mut rng) else {
                break;
            };
            pos = pos.succ(mv);
        }
        if pos.legal_moves().is_empty() {
            continue;
        }

        let mut output = SearchOutput::new();
        engine.search(&mut output, &pos, &SearchInput::depth(4)).unwrap();

        let mv = output.best_move.unwrap();
        assert!(pos.legal_moves().contains(mv), "{mv} in {pos}");
        if let Some(answer) = output.answer {
            assert!(pos.succ(mv).legal_moves().contains(answer));
        }
    }
}
