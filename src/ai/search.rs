// Iterative Deepening Search Orchestrator
//
// Searches the root at depth 1, 2, 3, ... until the depth limit or the
// clock stops it. Results of each iteration order the next one: the root
// list keeps the best moves in front and the transposition table seeds
// every node.
//
// The driver owns the state shared by all workers of one search: the root
// move list, the best move so far, time-pressure flags and the split-point
// arena. It also decides when to stop (see `time`) and reports progress
// as UCI-style info lines.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chess::ChessMove;
use log::{debug, info, trace};
use parking_lot::Mutex;

use super::engine::{EngineConfig, EngineError};
use super::line::Line;
use super::move_ordering::OrderTables;
use super::node::Node;
use super::score::{from_tt, mate_in, DEPTH_MAX, NONE};
use super::split_point::{arena_size, SpId, SplitPoint, ROOT_SP};
use super::time::{alloc_early, TimeBudget};
use super::transposition_table::{NodeType, TranspositionTable};
use super::worker::{SearchResult, Searcher, WorkerSlot};
use crate::game_repr::{MoveList, Pos};

/// Score gap between the two best depth-1 moves that makes an easy move.
const EASY_MARGIN: i32 = 200;

/// A drop of this much from the previous iteration counts as trouble.
const DROP_MARGIN: i32 = 20;

/// Stop and ponder-hit requests from the caller, shared with a running
/// search.
#[derive(Debug, Default)]
pub struct SearchSignals {
    stop: AtomicBool,
    ponder_hit: AtomicBool,
}

impl SearchSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// End the search as soon as possible.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// The opponent played the expected move; the search continues on
    /// the normal clock.
    pub fn ponder_hit(&self) {
        self.ponder_hit.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn take_ponder_hit(&self) -> bool {
        self.ponder_hit.swap(false, Ordering::SeqCst)
    }
}

/// Search limits.
#[derive(Debug, Clone)]
pub struct SearchInput {
    /// Analysis mode: no single-reply shortcut, wait for a stop at the end.
    pub infinite: bool,
    pub depth: i32,
    /// Clock mode; `time` is the remaining time instead of a move time.
    pub smart: bool,
    /// Moves to the next time control, 0 for sudden death.
    pub moves: u32,
    /// Seconds.
    pub time: f64,
    /// Increment per move, seconds.
    pub inc: f64,
    pub ponder: bool,
    pub signals: Option<Arc<SearchSignals>>,
}

impl Default for SearchInput {
    fn default() -> Self {
        Self {
            infinite: false,
            depth: DEPTH_MAX,
            smart: false,
            moves: 0,
            time: 1e6,
            inc: 0.0,
            ponder: false,
            signals: None,
        }
    }
}

impl SearchInput {
    pub fn depth(depth: i32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    pub fn movetime(secs: f64) -> Self {
        Self {
            time: secs,
            ..Self::default()
        }
    }

    pub fn infinite(signals: Arc<SearchSignals>) -> Self {
        Self {
            infinite: true,
            signals: Some(signals),
            ..Self::default()
        }
    }

    /// Switch to clock mode.
    pub fn set_time(&mut self, moves: u32, time: f64, inc: f64) {
        self.smart = true;
        self.moves = moves;
        self.time = time;
        self.inc = inc;
    }

    pub fn with_signals(mut self, signals: Arc<SearchSignals>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_ponder(mut self, ponder: bool) -> Self {
        self.ponder = ponder;
        self
    }
}

pub type InfoCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Search result and statistics, filled in while the search runs.
pub struct SearchOutput {
    pub best_move: Option<ChessMove>,
    /// Expected reply, the ponder move.
    pub answer: Option<ChessMove>,
    pub score: i32,
    pub node_type: NodeType,
    pub depth: i32,
    pub pv: Line,
    pub nodes: u64,
    pub ply_max: i32,
    /// Split points created by all workers.
    pub splits: u64,
    start: Instant,
    elapsed: Option<Duration>,
    on_info: Option<InfoCallback>,
}

impl Default for SearchOutput {
    fn default() -> Self {
        Self {
            best_move: None,
            answer: None,
            score: NONE,
            node_type: NodeType::None,
            depth: 0,
            pv: Line::new(),
            nodes: 0,
            ply_max: 0,
            splits: 0,
            start: Instant::now(),
            elapsed: None,
            on_info: None,
        }
    }
}

impl SearchOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send every info line to `callback`.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            on_info: Some(Box::new(callback)),
            ..Self::default()
        }
    }

    fn init(&mut self) {
        self.best_move = None;
        self.answer = None;
        self.score = NONE;
        self.node_type = NodeType::None;
        self.depth = 0;
        self.pv.clear();
        self.nodes = 0;
        self.ply_max = 0;
        self.splits = 0;
        self.start = Instant::now();
        self.elapsed = None;
    }

    fn end(&mut self) {
        self.elapsed = Some(self.start.elapsed());
    }

    /// Seconds since the search started, frozen once it ended.
    pub fn time(&self) -> f64 {
        self.elapsed.unwrap_or_else(|| self.start.elapsed()).as_secs_f64()
    }

    fn nps(&self) -> u64 {
        let time = self.time();
        if time < 0.01 {
            0
        } else {
            (self.nodes as f64 / time) as u64
        }
    }

    fn new_best_move(&mut self, mv: ChessMove, sc: i32, node_type: NodeType, depth: i32, pv: &Line) {
        debug_assert_eq!(pv.first(), Some(mv));

        self.best_move = Some(mv);
        self.answer = pv.answer();
        self.score = sc;
        self.node_type = node_type;
        self.depth = depth;
        self.pv = pv.clone();

        self.emit(&self.best_move_line());
    }

    /// Report `mv` without a search behind it.
    fn report_move(&mut self, mv: ChessMove, sc: i32) {
        let mut pv = Line::new();
        pv.set(mv);
        self.new_best_move(mv, sc, NodeType::None, 0, &pv);
    }

    fn best_move_line(&self) -> String {
        // An unsearched move has no score to show.
        let score = match mate_in(self.score) {
            _ if self.score == NONE => "cp 0".to_string(),
            Some(moves) => format!("mate {moves}"),
            None => format!("cp {}", self.score),
        };

        let bound = match self.node_type {
            NodeType::LowerBound => " lowerbound",
            NodeType::UpperBound => " upperbound",
            _ => "",
        };

        format!(
            "info depth {} seldepth {} score {score}{bound} nodes {} time {} nps {} pv {}",
            self.depth,
            self.ply_max,
            self.nodes,
            (self.time() * 1000.0) as u64,
            self.nps(),
            self.pv,
        )
    }

    fn emit(&self, line: &str) {
        info!("{line}");
        if let Some(callback) = &self.on_info {
            callback(line);
        }
    }
}

/// Driver state that changes during the search, behind one lock.
struct RootState {
    output: SearchOutput,
    list: MoveList,
    last_move: Option<ChessMove>,
    last_score: i32,
    /// The first root move of the iteration is being searched.
    first: bool,
    /// The score dropped or failed low in this iteration.
    drop: bool,
    /// Scales the normal time allocation.
    factor: f64,
    current_move: Option<ChessMove>,
    current_number: usize,
    last_poll: f64,
}

/// State shared by the workers of one search.
pub struct SearchGlobal<'a> {
    pub(super) pos: &'a Pos,
    pub(super) input: &'a SearchInput,
    pub(super) tt: &'a TranspositionTable,
    pub(super) tables: &'a OrderTables,
    budget: TimeBudget,
    pub(super) smp: bool,
    pub(super) null_move: bool,
    pub(super) workers: Vec<WorkerSlot>,
    pub(super) split_points: Vec<SplitPoint>,
    pub(super) smp_lock: Mutex<()>,
    pub(super) smp_busy: AtomicBool,
    start: Instant,
    depth: AtomicI32,
    ponder: AtomicBool,
    /// The search may stop as soon as the clock allows.
    flag: AtomicBool,
    /// The best move changed since the flag was last set.
    change: AtomicBool,
    /// Root re-searches in progress.
    high: AtomicI32,
    state: Mutex<RootState>,
}

impl<'a> SearchGlobal<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        pos: &'a Pos,
        input: &'a SearchInput,
        tt: &'a TranspositionTable,
        tables: &'a OrderTables,
        config: &EngineConfig,
        budget: TimeBudget,
        output: SearchOutput,
        list: MoveList,
    ) -> Self {
        let threads = config.threads;
        let split_points: Vec<SplitPoint> = (0..arena_size(threads)).map(|_| SplitPoint::new()).collect();
        split_points[ROOT_SP].init_root(0);

        Self {
            pos,
            input,
            tt,
            tables,
            budget,
            smp: threads > 1,
            null_move: config.null_move,
            workers: (0..threads).map(|_| WorkerSlot::new()).collect(),
            split_points,
            smp_lock: Mutex::new(()),
            smp_busy: AtomicBool::new(false),
            start: output.start,
            depth: AtomicI32::new(0),
            ponder: AtomicBool::new(input.ponder),
            flag: AtomicBool::new(false),
            change: AtomicBool::new(false),
            high: AtomicI32::new(0),
            state: Mutex::new(RootState {
                output,
                list,
                last_move: None,
                last_score: NONE,
                first: false,
                drop: false,
                factor: 1.0,
                current_move: None,
                current_number: 0,
                last_poll: 0.0,
            }),
        }
    }

    pub(super) fn into_output(self) -> SearchOutput {
        self.state.into_inner().output
    }

    #[inline]
    pub(super) fn time(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub(super) fn is_pondering(&self) -> bool {
        self.ponder.load(Ordering::SeqCst)
    }

    pub(super) fn root_list(&self) -> MoveList {
        self.state.lock().list.clone()
    }

    pub(super) fn score(&self) -> i32 {
        self.state.lock().output.score
    }

    pub(super) fn last_score(&self) -> i32 {
        self.state.lock().last_score
    }

    pub(super) fn set_high(&self) {
        self.high.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn clear_high(&self) {
        self.high.fetch_sub(1, Ordering::SeqCst);
    }

    fn set_flag(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    fn clear_flag(&self) {
        self.flag.store(false, Ordering::SeqCst);
        self.change.store(true, Ordering::SeqCst);
    }

    /// Stop every worker.
    fn abort(&self) {
        self.split_points[ROOT_SP].stop_all();
    }

    /// Whether a split may find a helper right now.
    pub(super) fn has_worker(&self) -> bool {
        !self.smp_busy.load(Ordering::SeqCst) && self.workers.iter().any(WorkerSlot::is_idle)
    }

    /// Offer `sp` to every idle worker. Returns how many joined.
    pub(super) fn broadcast(&self, sp: SpId) -> usize {
        self.workers
            .iter()
            .enumerate()
            .filter(|(id, worker)| worker.give_work(*id, sp, &self.split_points))
            .count()
    }

    /// The main worker starts on root move `mv`, the `n`th (from 0).
    pub(super) fn search_move(&self, mv: ChessMove, n: usize) {
        let mut state = self.state.lock();
        state.current_move = Some(mv);
        state.current_number = n + 1;
        state.first = n == 0;
    }

    /// A root node found a new best move.
    pub(super) fn new_best_move(&self, node: &Node) {
        let Some(mv) = node.mv else {
            unreachable!("root update without a move at depth {}", node.depth)
        };

        let mut state = self.state.lock();
        self.collect_stats(&mut state);

        let previous = state.output.best_move;
        state
            .output
            .new_best_move(mv, node.score, node.node_type(), node.depth, &node.pv);

        if let Some(i) = state.list.find(mv) {
            state.list.move_to_front(i);
        }

        if node.depth > 1 && previous != Some(mv) {
            self.clear_flag();
            if self.input.smart {
                state.factor = (state.factor.max(1.0) * 1.2).min(2.0);
            }
        }

        let delta = node.score - state.last_score;
        state.drop = node.score <= node.alpha || delta <= -DROP_MARGIN;
        if delta <= -DROP_MARGIN {
            self.clear_flag();
        }
    }

    /// Check external signals and the clock. Called every 256 nodes by
    /// every worker.
    pub(super) fn poll(&self) {
        if self.depth.load(Ordering::Relaxed) <= 1 {
            return;
        }

        let mut state = self.state.lock();
        let mut abort = false;

        if let Some(signals) = &self.input.signals {
            if signals.is_stopped() {
                self.ponder.store(false, Ordering::SeqCst);
                abort = true;
            } else if signals.take_ponder_hit() {
                self.ponder.store(false, Ordering::SeqCst);
                if self.flag.load(Ordering::SeqCst) || state.list.len() == 1 {
                    abort = true;
                }
            }
        }

        let time = self.time();
        let smart = self.input.smart;
        let high = self.high.load(Ordering::SeqCst) > 0;

        if time >= self.budget.t2 {
            abort = true;
        } else if smart && (high || state.drop) {
            // keep searching
        } else if time >= self.budget.t1 {
            abort = true;
        } else if smart && !state.first {
            // keep searching
        } else if time >= self.budget.t0 * state.factor {
            abort = true;
        }

        if abort {
            self.set_flag();
            if !self.is_pondering() {
                self.abort();
            }
        }

        if time >= state.last_poll + 1.0 {
            state.last_poll += 1.0;
            self.disp_info(&mut state, true);
        }
    }

    fn collect_stats(&self, state: &mut RootState) {
        state.output.nodes = self.workers.iter().map(WorkerSlot::nodes).sum();
        state.output.ply_max = self.workers.iter().map(WorkerSlot::ply_max).max().unwrap_or(0);
        state.output.splits = self.workers.iter().map(WorkerSlot::splits).sum();
    }

    /// Progress line.
    fn disp_info(&self, state: &mut RootState, disp_move: bool) {
        self.collect_stats(state);

        let output = &state.output;
        let mut line = format!(
            "info depth {} seldepth {}",
            self.depth.load(Ordering::Relaxed),
            output.ply_max
        );

        if disp_move {
            if let Some(mv) = state.current_move {
                line.push_str(&format!(" currmove {mv} currmovenumber {}", state.current_number));
            }
        }

        line.push_str(&format!(
            " nodes {} time {} nps {} hashfull {}",
            output.nodes,
            (output.time() * 1000.0) as u64,
            output.nps(),
            self.tt.hashfull()
        ));

        output.emit(&line);
    }

    /// One iteration of the main worker.
    fn search(&self, main: &Searcher<'_>, depth: i32) -> SearchResult<()> {
        {
            let mut state = self.state.lock();
            state.current_move = None;
            state.current_number = 0;
        }
        self.depth.store(depth, Ordering::Relaxed);

        for worker in &self.workers {
            worker.start_iter();
        }

        main.search_root_try(self.pos, depth)?;

        let mut state = self.state.lock();
        debug_assert!(depth < 2 || state.output.best_move.is_some());

        if self.input.smart && depth > 1 && state.output.best_move == state.last_move {
            state.factor = (state.factor * 0.9).max(0.6);
        }

        state.last_move = state.output.best_move;
        state.last_score = state.output.score;

        Ok(())
    }

    /// Depth-1 scores of every root move. Returns the easy move, if any.
    fn find_easy_move(&self, main: &Searcher<'_>) -> Option<ChessMove> {
        let mut list = self.root_list();
        if main.search_all_try(self.pos, &mut list, 1).is_err() {
            return None;
        }

        let best = list.get(0);
        let gap = list.score(0) - list.score(1);
        self.state.lock().list = list;

        if gap >= EASY_MARGIN && quick_move(self.tt, self.pos) == Some(best) {
            debug!("easy move {best} ({gap} ahead)");
            Some(best)
        } else {
            None
        }
    }

    /// Iterative deepening on the main worker.
    fn iterate(&self) {
        let main = Searcher::new(0, self);
        let input = self.input;

        let easy_move = if input.smart && self.state.lock().list.len() > 1 {
            self.find_easy_move(&main)
        } else {
            None
        };

        for depth in 1..=input.depth.clamp(1, DEPTH_MAX) {
            if self.search(&main, depth).is_err() {
                debug!("depth {depth} aborted after {:.3}s", self.time());
                break;
            }

            let mut state = self.state.lock();
            self.collect_stats(&mut state);

            let time = self.time();
            let best = state.output.best_move;
            debug!(
                "depth {depth} done: {} score {} nodes {} in {time:.3}s",
                best.map_or_else(|| "none".to_string(), |mv| mv.to_string()),
                state.output.score,
                state.output.nodes,
            );

            let easy = easy_move.is_some()
                && best == easy_move
                && !self.change.load(Ordering::SeqCst)
                && time >= self.budget.t0 / 16.0;
            let late = input.smart && time >= self.budget.t0 * state.factor * alloc_early(self.pos);
            let abort = (easy || late) && !(input.smart && state.drop);

            drop(state);

            if abort {
                self.set_flag();
                if !self.is_pondering() {
                    break;
                }
            }
        }

        let mut state = self.state.lock();
        self.disp_info(&mut state, false);
    }

    /// Release the helpers.
    fn end(&self) {
        self.abort();
        self.split_points[ROOT_SP].leave(0);
    }
}

/// Cache move of `pos` if it is legal, or the only legal move.
pub fn quick_move(tt: &TranspositionTable, pos: &Pos) -> Option<ChessMove> {
    let list = pos.legal_moves();

    match list.len() {
        0 => None,
        1 => Some(list.get(0)),
        _ => tt
            .probe(pos.key())
            .and_then(|entry| entry.mv)
            .filter(|&mv| list.contains(mv)),
    }
}

/// Cache score of `pos` seen from the root, or `NONE`.
pub fn quick_score(tt: &TranspositionTable, pos: &Pos) -> i32 {
    tt.probe(pos.key()).map_or(NONE, |entry| from_tt(entry.score, 0))
}

/// Run one search. `threads - 1` helpers are started for its duration.
pub(super) fn run(
    tt: &mut TranspositionTable,
    tables: &OrderTables,
    config: &EngineConfig,
    output: &mut SearchOutput,
    pos: &Pos,
    input: &SearchInput,
) -> Result<(), EngineError> {
    output.init();

    let list = pos.legal_moves();
    if list.is_empty() {
        output.end();
        return Err(EngineError::NoLegalMoves);
    }

    if !input.infinite && !input.ponder && list.len() == 1 {
        output.report_move(list.get(0), quick_score(tt, pos));
        output.end();
        return Ok(());
    }

    let threads = config.threads;
    let budget = TimeBudget::new(input, pos, config.ponder);
    debug!(
        "search {pos}: depth {} threads {threads} time {:.3}/{:.3}/{:.3}",
        input.depth, budget.t0, budget.t1, budget.t2
    );

    tt.inc_date();
    tables.clear();

    let first_move = list.get(0);
    let global = SearchGlobal::new(pos, input, tt, tables, config, budget, std::mem::take(output), list);

    thread::scope(|s| {
        let global = &global;

        for id in 1..threads {
            s.spawn(move || {
                trace!("worker {id} started");
                Searcher::new(id, global).idle_loop(ROOT_SP);
                trace!("worker {id} stopped");
            });
        }

        global.iterate();
        global.end();
    });

    let pondering = global.is_pondering();
    *output = global.into_output();

    if output.best_move.is_none() {
        let mv = quick_move(tt, pos).unwrap_or(first_move);
        debug!("no iteration finished, falling back to {mv}");
        output.report_move(mv, quick_score(tt, pos));
    }

    output.end();

    if let Some(signals) = &input.signals {
        wait_for_signal(signals, input.infinite, pondering);
    }

    Ok(())
}

/// An infinite or pondering search only returns on a stop; a ponder-hit
/// ends the wait of a finished ponder search.
fn wait_for_signal(signals: &SearchSignals, infinite: bool, mut pondering: bool) {
    while infinite || pondering {
        if signals.is_stopped() {
            break;
        }
        if signals.take_ponder_hit() {
            pondering = false;
            continue;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::score::{is_win, win};
    use chess::Square;
    use std::sync::atomic::AtomicUsize;

    /// Run `f` on the main worker of a single-threaded search of `pos`.
    pub(crate) fn with_searcher<R>(pos: &Pos, f: impl FnOnce(&Searcher<'_>) -> R) -> R {
        with_config_searcher(pos, &EngineConfig::default(), f)
    }

    /// Like [`with_searcher`] with engine options from `config`.
    pub(crate) fn with_config_searcher<R>(
        pos: &Pos,
        config: &EngineConfig,
        f: impl FnOnce(&Searcher<'_>) -> R,
    ) -> R {
        let tt = TranspositionTable::new(1 << 12);
        let tables = OrderTables::new();
        let input = SearchInput::default();
        let budget = TimeBudget::new(&input, pos, false);
        let config = config.with_threads(1);

        let global = SearchGlobal::new(pos, &input, &tt, &tables, &config, budget, SearchOutput::new(), pos.legal_moves());
        let main = Searcher::new(0, &global);

        main.push_sp(ROOT_SP);
        let result = f(&main);
        main.pop_sp(ROOT_SP);
        result
    }

    #[test]
    fn test_info_line_format() {
        let mut output = SearchOutput::new();
        let mv = ChessMove::new(Square::E2, Square::E4, None);
        let reply = ChessMove::new(Square::E7, Square::E5, None);
        let mut rest = Line::new();
        rest.set(reply);
        let mut pv = Line::new();
        pv.concat(mv, &rest);

        output.new_best_move(mv, 35, NodeType::LowerBound, 7, &pv);
        let line = output.best_move_line();

        assert!(line.starts_with("info depth 7 seldepth 0 score cp 35 lowerbound nodes 0 time "));
        assert!(line.ends_with("pv e2e4 e7e5"));
        assert_eq!(output.answer, Some(reply));
    }

    #[test]
    fn test_mate_score_line() {
        let mut output = SearchOutput::new();
        let mv = ChessMove::new(Square::A1, Square::A8, None);
        let mut pv = Line::new();
        pv.set(mv);

        output.new_best_move(mv, win(3), NodeType::Exact, 4, &pv);
        assert!(output.best_move_line().contains("score mate 2 nodes"));
        assert!(is_win(output.score));
    }

    #[test]
    fn test_callback_receives_lines() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut output = SearchOutput::with_callback(move |line| {
            assert!(line.starts_with("info "));
            seen.fetch_add(1, Ordering::Relaxed);
        });

        output.report_move(ChessMove::new(Square::E2, Square::E4, None), NONE);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_quick_move_validates_cache_move() {
        use crate::ai::transposition_table::TtEntry;

        let tt = TranspositionTable::new(1 << 10);
        let pos = Pos::default();
        assert_eq!(quick_move(&tt, &pos), None);
        assert_eq!(quick_score(&tt, &pos), NONE);

        let bogus = ChessMove::new(Square::E2, Square::E5, None);
        tt.store(
            pos.key(),
            TtEntry { mv: Some(bogus), score: 12, eval: 10, depth: 3, node_type: NodeType::Exact },
        );
        assert_eq!(quick_move(&tt, &pos), None);
        assert_eq!(quick_score(&tt, &pos), 12);

        let good = ChessMove::new(Square::D2, Square::D4, None);
        tt.store(
            pos.key(),
            TtEntry { mv: Some(good), score: 20, eval: 10, depth: 4, node_type: NodeType::Exact },
        );
        assert_eq!(quick_move(&tt, &pos), Some(good));
    }

    #[test]
    fn test_wait_returns_on_stop() {
        let signals = SearchSignals::new();
        signals.stop();
        wait_for_signal(&signals, true, true);

        let signals = SearchSignals::new();
        signals.ponder_hit();
        wait_for_signal(&signals, false, true);
        assert!(!signals.take_ponder_hit());
    }
}
