// Transposition table
//
// A fixed-size, lockless hash table shared by every search thread. Each
// slot is two relaxed `AtomicU64` words; a reader may observe one word
// from an older write and one from a newer one. That race is tolerated:
// the lock only filters most collisions, and callers validate the stored
// move against the legal move list before playing it.
//
// Slots are grouped in clusters of four. A store replaces the entry with
// the same lock when it is not deeper than the new result, otherwise the
// oldest and shallowest entry of the cluster.

use std::sync::atomic::{AtomicU64, Ordering};

use chess::ChessMove;

use super::score::NONE;
use crate::game_repr::moves::{decode, encode};
use crate::game_repr::Key;

/// Entries per cluster.
const CLUSTER: usize = 4;

/// Number of distinct generations before dates wrap around.
const DATE_SIZE: u8 = 16;

/// Entries per MiB (16 bytes each).
const ENTRIES_PER_MB: usize = 1 << 16;

/// Node type for transposition table entries
///
/// - Exact: the score is exact (inside the window)
/// - LowerBound: the score is at least this value (beta cutoff)
/// - UpperBound: the score is at most this value (every move failed low)
/// - None: no bound (a slot that was never written)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeType {
    #[default]
    None,
    UpperBound,
    LowerBound,
    Exact,
}

impl NodeType {
    const UPPER: u8 = 1 << 0;
    const LOWER: u8 = 1 << 1;

    /// Bound type of `sc` searched with the window (`alpha`, `beta`).
    pub fn from_window(sc: i32, alpha: i32, beta: i32) -> Self {
        let mut bits = 0;
        if sc > alpha {
            bits |= Self::LOWER;
        }
        if sc < beta {
            bits |= Self::UPPER;
        }
        Self::from_bits(bits)
    }

    #[inline]
    pub fn is_lower(self) -> bool {
        self.bits() & Self::LOWER != 0
    }

    #[inline]
    pub fn is_upper(self) -> bool {
        self.bits() & Self::UPPER != 0
    }

    fn bits(self) -> u8 {
        match self {
            NodeType::None => 0,
            NodeType::UpperBound => Self::UPPER,
            NodeType::LowerBound => Self::LOWER,
            NodeType::Exact => Self::UPPER | Self::LOWER,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => NodeType::None,
            1 => NodeType::UpperBound,
            2 => NodeType::LowerBound,
            _ => NodeType::Exact,
        }
    }
}

/// Result of an earlier search, as stored in the table.
///
/// `score` is ply independent (see `score::to_tt`), `eval` is the static
/// evaluation or `score::NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub mv: Option<ChessMove>,
    pub score: i32,
    pub eval: i32,
    pub depth: i32,
    pub node_type: NodeType,
}

/// Unpacked slot.
#[derive(Debug, Clone, Copy, Default)]
struct Packed {
    lock: u32,
    mv: u16,
    score: i16,
    eval: i16,
    depth: i8,
    flag: u8,
    date: u8,
}

impl Packed {
    fn words(self) -> (u64, u64) {
        let w0 = (u64::from(self.lock) << 32) | (u64::from(self.mv) << 16) | u64::from(self.score as u16);
        let w1 = u64::from(self.eval as u16)
            | (u64::from(self.depth as u8) << 16)
            | (u64::from(self.flag) << 24)
            | (u64::from(self.date) << 32);
        (w0, w1)
    }

    fn from_words(w0: u64, w1: u64) -> Self {
        Self {
            lock: (w0 >> 32) as u32,
            mv: (w0 >> 16) as u16,
            score: w0 as u16 as i16,
            eval: w1 as u16 as i16,
            depth: (w1 >> 16) as u8 as i8,
            flag: (w1 >> 24) as u8,
            date: (w1 >> 32) as u8,
        }
    }

    fn is_empty(&self) -> bool {
        self.flag == 0
    }
}

#[derive(Debug, Default)]
struct Slot {
    w0: AtomicU64,
    w1: AtomicU64,
}

impl Slot {
    #[inline]
    fn load(&self) -> Packed {
        Packed::from_words(self.w0.load(Ordering::Relaxed), self.w1.load(Ordering::Relaxed))
    }

    #[inline]
    fn save(&self, packed: Packed) {
        let (w0, w1) = packed.words();
        self.w0.store(w0, Ordering::Relaxed);
        self.w1.store(w1, Ordering::Relaxed);
    }
}

/// Transposition Table for storing previously searched positions
pub struct TranspositionTable {
    slots: Vec<Slot>,
    mask: usize,
    date: u8,
}

impl TranspositionTable {
    /// Table with `entries` slots, rounded down to a power of two.
    pub fn new(entries: usize) -> Self {
        let mut table = Self {
            slots: Vec::new(),
            mask: 0,
            date: 0,
        };
        table.set_size(entries);
        table
    }

    /// Table of (at most) `mb` MiB.
    pub fn with_megabytes(mb: usize) -> Self {
        Self::new(Self::entries_for_megabytes(mb))
    }

    pub fn entries_for_megabytes(mb: usize) -> usize {
        round_down_pow2(mb.max(1)) * ENTRIES_PER_MB
    }

    /// Resize to `entries` slots (rounded down to a power of two, at least
    /// one cluster). Drops every entry.
    pub fn set_size(&mut self, entries: usize) {
        let size = round_down_pow2(entries.max(CLUSTER));

        if size != self.slots.len() {
            self.slots = (0..size).map(|_| Slot::default()).collect();
        } else {
            self.clear();
        }

        self.mask = (size - 1) & !(CLUSTER - 1);
        self.date = 0;
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot.w0.get_mut() = 0;
            *slot.w1.get_mut() = 0;
        }
        self.date = 0;
    }

    /// Start a new generation; called once per search.
    pub fn inc_date(&mut self) {
        self.date = (self.date + 1) % DATE_SIZE;
    }

    fn age(&self, date: u8) -> i32 {
        i32::from((self.date + DATE_SIZE - date) % DATE_SIZE)
    }

    #[inline]
    fn cluster(&self, key: Key) -> &[Slot] {
        let index = key as usize & self.mask;
        &self.slots[index..index + CLUSTER]
    }

    #[inline]
    fn lock(key: Key) -> u32 {
        (key >> 32) as u32
    }

    /// Look `key` up. Never-written slots are misses.
    pub fn probe(&self, key: Key) -> Option<TtEntry> {
        let lock = Self::lock(key);

        self.cluster(key).iter().map(Slot::load).find_map(|packed| {
            (packed.lock == lock && !packed.is_empty()).then(|| TtEntry {
                mv: decode(packed.mv),
                score: i32::from(packed.score),
                eval: i32::from(packed.eval),
                depth: i32::from(packed.depth),
                node_type: NodeType::from_bits(packed.flag),
            })
        })
    }

    pub fn store(&self, key: Key, entry: TtEntry) {
        debug_assert!(entry.depth >= -1 && entry.depth < 128);
        debug_assert!(entry.node_type != NodeType::None);

        let lock = Self::lock(key);
        let cluster = self.cluster(key);

        for slot in cluster {
            let mut old = slot.load();

            if old.lock == lock && !old.is_empty() {
                if i32::from(old.depth) <= entry.depth {
                    let mv = match entry.mv {
                        Some(_) => encode(entry.mv),
                        None => old.mv,
                    };
                    let eval = if entry.eval != NONE {
                        entry.eval as i16
                    } else {
                        old.eval
                    };
                    slot.save(self.pack(lock, mv, eval, &entry));
                } else {
                    old.date = self.date;
                    slot.save(old);
                }
                return;
            }
        }

        let mut best = &cluster[0];
        let mut best_score = i32::MIN;

        for slot in cluster {
            let old = slot.load();

            if old.is_empty() {
                best = slot;
                break;
            }

            let score = self.age(old.date) * 64 - i32::from(old.depth);
            if score > best_score {
                best = slot;
                best_score = score;
            }
        }

        best.save(self.pack(lock, encode(entry.mv), entry.eval as i16, &entry));
    }

    fn pack(&self, lock: u32, mv: u16, eval: i16, entry: &TtEntry) -> Packed {
        Packed {
            lock,
            mv,
            score: entry.score as i16,
            eval,
            depth: entry.depth as i8,
            flag: entry.node_type.bits(),
            date: self.date,
        }
    }

    /// Permille of the first thousand slots written in this generation.
    pub fn hashfull(&self) -> usize {
        let sample = self.slots.len().min(1000);
        let used = self.slots[..sample]
            .iter()
            .map(Slot::load)
            .filter(|packed| !packed.is_empty() && packed.date == self.date)
            .count();

        used * 1000 / sample.max(1)
    }
}

fn round_down_pow2(n: usize) -> usize {
    debug_assert!(n > 0);
    1 << n.ilog2()
}
