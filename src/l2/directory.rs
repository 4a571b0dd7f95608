use std::collections::HashMap;
use std::fmt;

use crate::l2::config::{NUM_CORES, NUM_WAYS};
use crate::l2::response::{L2Response, RespOp};

/// Fixed-width per-core bitset, one bit per core sharing the L2.
///
/// Mask operations work on the whole width at once, mirroring the vectored
/// hardware signals they stand in for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoreBitmap(u32);

impl CoreBitmap {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        debug_assert!(bits < (1 << NUM_CORES), "bit set beyond core count");
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn get(self, core: usize) -> bool {
        assert!(core < NUM_CORES, "core id {} out of range", core);
        self.0 & (1 << core) != 0
    }

    pub fn set(&mut self, core: usize) {
        assert!(core < NUM_CORES, "core id {} out of range", core);
        self.0 |= 1 << core;
    }

    pub fn clear(&mut self, core: usize) {
        assert!(core < NUM_CORES, "core id {} out of range", core);
        self.0 &= !(1 << core);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// AND-broadcast a single bit across the whole width: the identity when
    /// `enable` is set, all-zero otherwise.
    pub fn and_broadcast(self, enable: bool) -> Self {
        if enable {
            self
        } else {
            Self::empty()
        }
    }
}

impl fmt::Display for CoreBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.0, width = NUM_CORES)
    }
}

/// Directory lookup result for the line addressed by the live request: which
/// cores privately hold it, and in which local L1 way.  `way[i]` is only
/// meaningful when `has_line` has bit `i` set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectorySnapshot {
    pub has_line: CoreBitmap,
    pub way: [usize; NUM_CORES],
}

#[derive(Debug, Clone, Copy, Default)]
struct DirEntry {
    holders: CoreBitmap,
    way: [usize; NUM_CORES],
}

/// Harness-side directory model: per-line tracking of private L1 copies.
/// The response stage only ever sees `DirectorySnapshot`s produced here.
#[derive(Debug, Default)]
pub struct Directory {
    lines: HashMap<u64, DirEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, line_addr: u64) -> DirectorySnapshot {
        match self.lines.get(&line_addr) {
            Some(entry) => DirectorySnapshot {
                has_line: entry.holders,
                way: entry.way,
            },
            None => DirectorySnapshot::default(),
        }
    }

    /// Record that `core` brought the line into its private L1 at `way`.
    pub fn record_fill(&mut self, line_addr: u64, core: usize, way: usize) {
        assert!(core < NUM_CORES, "core id {} out of range", core);
        assert!(way < NUM_WAYS, "way index {} out of range", way);
        let entry = self.lines.entry(line_addr).or_default();
        entry.holders.set(core);
        entry.way[core] = way;
    }

    /// Fold an emitted response back into the tracking state: an invalidate
    /// acknowledge drops every flagged holder.
    pub fn apply_response(&mut self, line_addr: u64, resp: &L2Response) {
        if !resp.valid || resp.op != RespOp::DinvalAck {
            return;
        }
        if let Some(entry) = self.lines.get_mut(&line_addr) {
            for core in 0..NUM_CORES {
                if resp.update.get(core) {
                    entry.holders.clear(core);
                }
            }
            if entry.holders.is_empty() {
                self.lines.remove(&line_addr);
            }
        }
    }

    pub fn drop_line(&mut self, line_addr: u64) {
        self.lines.remove(&line_addr);
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }
}
