// Command-line search
//
// chess_search [fen] [depth] [threads]
//
// Searches one position and prints the info lines followed by the best
// move. Logging goes through env_logger (`RUST_LOG=debug` shows iteration
// summaries).

use std::env;
use std::process::ExitCode;

use chess_search::ai::{Engine, EngineConfig, SearchInput, SearchOutput};
use chess_search::game_repr::Pos;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const DEFAULT_DEPTH: i32 = 10;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    let fen = args.first().map_or(START_FEN, String::as_str);
    let depth = match args.get(1).map(|arg| arg.parse::<i32>()) {
        None => DEFAULT_DEPTH,
        Some(Ok(depth)) if depth > 0 => depth,
        Some(_) => {
            eprintln!("depth must be a positive number");
            return ExitCode::FAILURE;
        }
    };
    let threads = match args.get(2).map(|arg| arg.parse::<usize>()) {
        None => 1,
        Some(Ok(threads)) => threads,
        Some(Err(e)) => {
            eprintln!("invalid thread count: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pos = match Pos::from_fen(fen) {
        Ok(pos) => pos,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = match Engine::new(EngineConfig::default().with_threads(threads)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut output = SearchOutput::with_callback(|line| println!("{line}"));

    if let Err(e) = engine.search(&mut output, &pos, &SearchInput::depth(depth)) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match (output.best_move, output.answer) {
        (Some(mv), Some(answer)) => println!("bestmove {mv} ponder {answer}"),
        (Some(mv), None) => println!("bestmove {mv}"),
        (None, _) => println!("bestmove 0000"),
    }

    ExitCode::SUCCESS
}
