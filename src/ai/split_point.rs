// Split points
//
// A split point is a node whose remaining moves are searched by several
// workers at once. The owner publishes a copy of its node and position;
// every attached worker pulls moves with `get_move` and folds its results
// back with `update`. Split points live in a preallocated arena, slot 0 is
// the root split point that the main worker holds for the whole search.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chess::ChessMove;
use parking_lot::Mutex;

use super::line::Line;
use super::node::Node;
use super::score::INF;
use crate::game_repr::Pos;

/// Index into the split-point arena.
pub type SpId = usize;

pub const ROOT_SP: SpId = 0;

/// Split points per worker.
pub const POOL_SIZE: usize = 10;

const NO_PARENT: usize = usize::MAX;

/// Arena slot of split point `slot` in `worker`'s pool.
#[inline]
pub fn sp_index(worker: usize, slot: usize) -> SpId {
    debug_assert!(slot < POOL_SIZE);
    1 + worker * POOL_SIZE + slot
}

/// Arena size for `threads` workers.
#[inline]
pub fn arena_size(threads: usize) -> usize {
    1 + threads * POOL_SIZE
}

struct SplitState {
    pos: Pos,
    node: Node,
}

pub struct SplitPoint {
    parent: AtomicUsize,
    workers: AtomicU64,
    stop: AtomicBool,
    shared: Mutex<SplitState>,
}

impl SplitPoint {
    pub fn new() -> Self {
        Self {
            parent: AtomicUsize::new(NO_PARENT),
            workers: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            shared: Mutex::new(SplitState {
                pos: Pos::default(),
                node: Node::new(-INF, INF, 0, 0, false),
            }),
        }
    }

    pub fn init_root(&self, master: usize) {
        self.parent.store(NO_PARENT, Ordering::Relaxed);
        self.workers.store(1 << master, Ordering::SeqCst);
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn init(&self, master: usize, parent: SpId, pos: &Pos, node: &Node) {
        let mut shared = self.shared.lock();
        shared.pos = pos.clone();
        shared.node = node.clone();

        self.parent.store(parent, Ordering::Relaxed);
        self.workers.store(1 << master, Ordering::SeqCst);
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Position and node copy a joining worker searches from.
    pub fn snapshot(&self) -> (Pos, Node) {
        let shared = self.shared.lock();
        (shared.pos.clone(), shared.node.clone())
    }

    /// Final node state, once every worker has left.
    pub fn get_result(&self) -> Node {
        debug_assert!(self.is_free());
        self.shared.lock().node.clone()
    }

    pub fn parent(&self) -> Option<SpId> {
        match self.parent.load(Ordering::Relaxed) {
            NO_PARENT => None,
            sp => Some(sp),
        }
    }

    pub fn enter(&self, id: usize) {
        self.workers.fetch_or(1 << id, Ordering::SeqCst);
    }

    pub fn leave(&self, id: usize) {
        self.workers.fetch_and(!(1 << id), Ordering::SeqCst);
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.workers.load(Ordering::SeqCst) == 0
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn stop_all(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Hand out the next move, refreshing the caller's copy of the score
    /// and searched count. `None` once the node failed high or ran out of
    /// moves.
    pub fn get_move(&self, local: &mut Node) -> Option<ChessMove> {
        let mut shared = self.shared.lock();
        let node = &mut shared.node;

        if node.score >= node.beta || node.i >= node.list.len() {
            return None;
        }

        let mv = node.list.get(node.i);
        node.i += 1;

        local.score = node.score;
        local.j = node.j;

        Some(mv)
    }

    /// Fold one searched move into the shared node. `on_root` runs under
    /// the lock when a root node finds a new best move.
    pub fn update<F>(&self, mv: ChessMove, sc: i32, pv: &Line, on_root: F)
    where
        F: FnOnce(&Node),
    {
        let mut shared = self.shared.lock();
        let node = &mut shared.node;

        if node.score >= node.beta {
            return;
        }

        if node.update(mv, sc, pv) {
            on_root(node);
        }

        if node.score >= node.beta {
            self.stop_all();
        }
    }
}

impl Default for SplitPoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `sp` is `ancestor` or one of its descendants.
pub fn is_child(arena: &[SplitPoint], sp: SpId, ancestor: SpId) -> bool {
    let mut current = Some(sp);

    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = arena[id].parent();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_repr::MoveList;
    use std::thread;

    fn node_with_moves(alpha: i32, beta: i32) -> (Node, Vec<ChessMove>) {
        let pos = Pos::default();
        let list: MoveList = pos.legal_moves();
        let moves = list.iter().collect();

        let mut node = Node::new(alpha, beta, 8, 3, false);
        node.list = list;
        (node, moves)
    }

    /// Deterministic stand-in for a child search.
    fn fake_score(mv: ChessMove) -> i32 {
        (mv.get_dest().to_index() as i32 * 37) % 200 - 100
    }

    #[test]
    fn test_workers_fold_to_serial_result() {
        let (node, moves) = node_with_moves(-INF, INF);
        let sp = SplitPoint::new();
        sp.init(0, ROOT_SP, &Pos::default(), &node);

        thread::scope(|s| {
            for id in 1..4 {
                let sp = &sp;
                sp.enter(id);
                s.spawn(move || {
                    let (_, mut local) = sp.snapshot();
                    while let Some(mv) = sp.get_move(&mut local) {
                        sp.update(mv, fake_score(mv), &Line::new(), |_| {});
                    }
                    sp.leave(id);
                });
            }

            let (_, mut local) = sp.snapshot();
            while let Some(mv) = sp.get_move(&mut local) {
                sp.update(mv, fake_score(mv), &Line::new(), |_| {});
            }
            sp.leave(0);
        });

        let result = sp.get_result();
        let best = moves.iter().map(|&mv| fake_score(mv)).max().unwrap();

        assert_eq!(result.j, moves.len());
        assert_eq!(result.score, best);
        assert_eq!(fake_score(result.mv.unwrap()), best);
        assert!(!sp.is_stopped());
    }

    #[test]
    fn test_fail_high_stops_the_split_point() {
        let (node, moves) = node_with_moves(-INF, 50);
        let sp = SplitPoint::new();
        sp.init(0, ROOT_SP, &Pos::default(), &node);

        let (_, mut local) = sp.snapshot();
        while let Some(mv) = sp.get_move(&mut local) {
            sp.update(mv, fake_score(mv), &Line::new(), |_| {});
        }
        sp.leave(0);

        let result = sp.get_result();
        assert!(result.score >= 50);
        assert!(sp.is_stopped());
        assert!(result.j < moves.len());

        // Late results after the cutoff are ignored.
        sp.update(moves[0], 90, &Line::new(), |_| {});
        assert_eq!(sp.get_result().j, result.j);
    }

    #[test]
    fn test_root_notification_runs_under_lock() {
        let (mut node, _) = node_with_moves(-INF, INF);
        node.root = true;
        node.ply = 0;

        let sp = SplitPoint::new();
        sp.init(0, ROOT_SP, &Pos::default(), &node);

        let reports = AtomicUsize::new(0);
        let (_, mut local) = sp.snapshot();
        while let Some(mv) = sp.get_move(&mut local) {
            sp.update(mv, fake_score(mv), &Line::new(), |_| {
                reports.fetch_add(1, Ordering::Relaxed);
            });
        }

        assert!(reports.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_ancestry() {
        let arena: Vec<SplitPoint> = (0..arena_size(2)).map(|_| SplitPoint::new()).collect();
        let (node, _) = node_with_moves(-INF, INF);
        let pos = Pos::default();

        arena[ROOT_SP].init_root(0);
        arena[sp_index(0, 0)].init(0, ROOT_SP, &pos, &node);
        arena[sp_index(1, 0)].init(1, sp_index(0, 0), &pos, &node);

        assert!(is_child(&arena, sp_index(1, 0), ROOT_SP));
        assert!(is_child(&arena, sp_index(1, 0), sp_index(0, 0)));
        assert!(is_child(&arena, ROOT_SP, ROOT_SP));
        assert!(!is_child(&arena, sp_index(0, 0), sp_index(1, 0)));
    }
}
