// Search workers
//
// Every thread of a search is a worker with an id. Worker 0 is the thread
// that called the engine and drives iterative deepening; the helpers sit in
// `idle_loop` on the root split point until another worker hands them a
// split point to join.
//
// Cancellation unwinds with `Err(Abort)`: a worker polls the stop flags of
// its chain of split points every few nodes, and a raised flag makes every
// search frame return up to the `join` of the stopped split point (or to
// the driver for the root one).

use std::hint;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::thread;

use log::trace;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::node::Node;
use super::search::SearchGlobal;
use super::split_point::{is_child, sp_index, SpId, SplitPoint, ROOT_SP};
use crate::game_repr::{MoveList, Pos};

/// The search was stopped; unwinds to the frame that owns the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

pub type SearchResult<T> = Result<T, Abort>;

/// `work` value of a worker waiting for a split point.
const IDLE: usize = usize::MAX;

/// Spins between two yields of an idle worker.
const SPIN_YIELD: u32 = 1 << 10;

/// Per-worker state visible to the other workers.
pub struct WorkerSlot {
    /// `IDLE`, a split point handed over by another worker, or `ROOT_SP`
    /// while busy.
    work: AtomicUsize,
    stack: Mutex<SmallVec<[SpId; 16]>>,
    pool_size: AtomicUsize,
    nodes: AtomicU64,
    ply_max: AtomicI32,
    /// Split points created by this worker.
    splits: AtomicU64,
}

impl WorkerSlot {
    pub fn new() -> Self {
        Self {
            work: AtomicUsize::new(ROOT_SP),
            stack: Mutex::new(SmallVec::new()),
            pool_size: AtomicUsize::new(0),
            nodes: AtomicU64::new(0),
            ply_max: AtomicI32::new(0),
            splits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.work.load(Ordering::SeqCst) == IDLE
    }

    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn ply_max(&self) -> i32 {
        self.ply_max.load(Ordering::Relaxed)
    }

    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.load(Ordering::Relaxed)
    }

    pub fn start_iter(&self) {
        self.ply_max.store(0, Ordering::Relaxed);
    }

    /// Attach this worker to `sp` if it is idle below an ancestor of it.
    pub fn give_work(&self, id: usize, sp: SpId, arena: &[SplitPoint]) -> bool {
        let stack = self.stack.lock();

        let Some(&top) = stack.last() else {
            return false;
        };
        let Some(parent) = arena[sp].parent() else {
            return false;
        };

        if !self.is_idle() || !is_child(arena, parent, top) {
            return false;
        }

        arena[sp].enter(id);
        if self
            .work
            .compare_exchange(IDLE, sp, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            arena[sp].leave(id);
            return false;
        }

        true
    }
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One thread's view of a running search.
pub struct Searcher<'a> {
    pub(super) id: usize,
    pub(super) global: &'a SearchGlobal<'a>,
}

impl<'a> Searcher<'a> {
    pub fn new(id: usize, global: &'a SearchGlobal<'a>) -> Self {
        Self { id, global }
    }

    #[inline]
    pub(super) fn slot(&self) -> &WorkerSlot {
        &self.global.workers[self.id]
    }

    /// Count a node, poll the clock every 256 and the stop flags every 16.
    pub(super) fn inc_node(&self) -> SearchResult<()> {
        let nodes = self.slot().nodes.fetch_add(1, Ordering::Relaxed) + 1;

        if nodes % 256 == 0 {
            self.global.poll();
        }

        if nodes % 16 == 0 {
            self.poll()?;
        }

        Ok(())
    }

    #[inline]
    pub(super) fn mark_leaf(&self, ply: i32) {
        self.slot().ply_max.fetch_max(ply, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn leaf(&self, sc: i32, ply: i32) -> i32 {
        self.mark_leaf(ply);
        sc
    }

    pub(super) fn poll(&self) -> SearchResult<()> {
        if self.stop() {
            Err(Abort)
        } else {
            Ok(())
        }
    }

    /// Whether any split point between here and the root was stopped.
    fn stop(&self) -> bool {
        let mut current = Some(self.top_sp());

        while let Some(sp) = current {
            let split_point = &self.global.split_points[sp];
            if split_point.is_stopped() {
                return true;
            }
            current = split_point.parent();
        }

        false
    }

    pub(super) fn top_sp(&self) -> SpId {
        match self.slot().stack.lock().last() {
            Some(&sp) => sp,
            None => unreachable!("worker {} searches outside any split point", self.id),
        }
    }

    pub(super) fn push_sp(&self, sp: SpId) {
        let mut stack = self.slot().stack.lock();
        debug_assert!(
            stack
                .last()
                .map_or(true, |&top| is_child(&self.global.split_points, sp, top)),
            "split point {sp} is not below the top of worker {}",
            self.id
        );
        stack.push(sp);
    }

    pub(super) fn pop_sp(&self, sp: SpId) {
        let top = self.slot().stack.lock().pop();
        debug_assert_eq!(top, Some(sp), "unbalanced split point stack");
    }

    /// Search the root at `depth` inside the root split point.
    pub(super) fn search_root_try(&self, pos: &Pos, depth: i32) -> SearchResult<()> {
        self.push_sp(ROOT_SP);
        let result = self.search_asp(pos, depth);
        self.pop_sp(ROOT_SP);
        result
    }

    /// Full-window pass over `list` at `depth`, used to spot an easy move.
    pub(super) fn search_all_try(&self, pos: &Pos, list: &mut MoveList, depth: i32) -> SearchResult<()> {
        self.push_sp(ROOT_SP);
        let result = self.search_all(pos, list, depth);
        self.pop_sp(ROOT_SP);
        result
    }

    /// Search the remaining moves of `node` together with idle workers.
    pub(super) fn split(&self, pos: &Pos, node: &mut Node) -> SearchResult<()> {
        let global = self.global;

        global.poll();
        self.poll()?;

        let sp = {
            let _guard = global.smp_lock.lock();
            global.smp_busy.store(true, Ordering::SeqCst);

            let slot = self.slot().pool_size.fetch_add(1, Ordering::Relaxed);
            self.slot().splits.fetch_add(1, Ordering::Relaxed);
            let sp = sp_index(self.id, slot);
            global.split_points[sp].init(self.id, self.top_sp(), pos, node);

            let helpers = global.broadcast(sp);
            trace!(
                "worker {} split at ply {} depth {} with {helpers} helpers",
                self.id,
                node.ply,
                node.depth
            );

            global.smp_busy.store(false, Ordering::SeqCst);
            sp
        };

        self.join(sp);
        self.idle_loop(sp);

        *node = global.split_points[sp].get_result();
        self.slot().pool_size.fetch_sub(1, Ordering::Relaxed);

        self.poll()
    }

    /// Search moves of `sp` until it runs out or is stopped, then detach.
    fn join(&self, sp: SpId) {
        self.push_sp(sp);

        // An abort only ends this worker's share of the split point.
        if self.split_move_loop(sp).is_err() {
            trace!("worker {} left stopped split point {sp}", self.id);
        }

        self.pop_sp(sp);
        self.global.split_points[sp].leave(self.id);
    }

    /// Help other split points below `wait_sp` until it has no workers.
    pub fn idle_loop(&self, wait_sp: SpId) {
        let global = self.global;
        let slot = self.slot();
        let wait = &global.split_points[wait_sp];

        self.push_sp(wait_sp);

        loop {
            debug_assert_eq!(slot.work.load(Ordering::SeqCst), ROOT_SP);
            slot.work.store(IDLE, Ordering::SeqCst);

            let mut spins = 0u32;
            while !wait.is_free() && slot.work.load(Ordering::SeqCst) == IDLE {
                spins = spins.wrapping_add(1);
                if spins % SPIN_YIELD == 0 {
                    thread::yield_now();
                } else {
                    hint::spin_loop();
                }
            }

            let work = slot.work.swap(ROOT_SP, Ordering::SeqCst);
            if work == IDLE {
                break;
            }

            self.join(work);
        }

        self.pop_sp(wait_sp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::score::INF;
    use crate::ai::split_point::arena_size;

    #[test]
    fn test_give_work_needs_idle_worker_below_parent() {
        let arena: Vec<SplitPoint> = (0..arena_size(2)).map(|_| SplitPoint::new()).collect();
        let pos = Pos::default();
        let node = Node::new(-INF, INF, 8, 2, false);

        arena[ROOT_SP].init_root(0);
        let sp = sp_index(0, 0);
        arena[sp].init(0, ROOT_SP, &pos, &node);

        let helper = WorkerSlot::new();
        assert!(!helper.give_work(1, sp, &arena), "busy workers take no work");

        helper.stack.lock().push(ROOT_SP);
        helper.work.store(IDLE, Ordering::SeqCst);
        assert!(helper.give_work(1, sp, &arena));
        assert_eq!(helper.work.load(Ordering::SeqCst), sp);
        assert!(!helper.is_idle());

        arena[sp].leave(0);
        assert!(!arena[sp].is_free(), "the helper was attached");
        arena[sp].leave(1);
        assert!(arena[sp].is_free());
    }

    #[test]
    fn test_worker_below_other_branch_is_skipped() {
        let arena: Vec<SplitPoint> = (0..arena_size(3)).map(|_| SplitPoint::new()).collect();
        let pos = Pos::default();
        let node = Node::new(-INF, INF, 8, 2, false);

        arena[ROOT_SP].init_root(0);
        let left = sp_index(0, 0);
        let right = sp_index(1, 0);
        arena[left].init(0, ROOT_SP, &pos, &node);
        arena[right].init(1, ROOT_SP, &pos, &node);

        // Waiting on `left`, so it cannot help a split point hanging off the
        // root.
        let helper = WorkerSlot::new();
        helper.stack.lock().push(left);
        helper.work.store(IDLE, Ordering::SeqCst);

        let below_right = sp_index(1, 1);
        arena[below_right].init(1, right, &pos, &node);
        assert!(!helper.give_work(2, below_right, &arena));

        let below_left = sp_index(1, 2);
        arena[below_left].init(1, left, &pos, &node);
        assert!(helper.give_work(2, below_left, &arena));
    }
}
