use crate::l2::config::LINE_BYTES;

/// Memory operation kinds accepted by the L2 pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    #[default]
    Load,
    Store,
    Flush,
    DataInvalidate,
    InstInvalidate,
    /// Load-linked half of an atomic sequence.
    SyncLoad,
    /// Store-conditional half of an atomic sequence.
    SyncStore,
}

impl MemOp {
    pub fn is_load_class(self) -> bool {
        matches!(self, Self::Load | Self::SyncLoad)
    }

    pub fn is_store_class(self) -> bool {
        matches!(self, Self::Store | Self::SyncStore)
    }

    /// Coherence-only operations exist to notify other cores, not to move
    /// data, so they respond regardless of hit or miss.
    pub fn is_coherence_only(self) -> bool {
        matches!(self, Self::Flush | Self::DataInvalidate | Self::InstInvalidate)
    }
}

/// Resolved request descriptor arriving from the tag-check stage.
/// One descriptor is live per cycle; invalid cycles carry `valid = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct L2Request {
    pub valid: bool,
    pub op: MemOp,
    /// Originating core, execution unit and hardware thread, propagated so
    /// the response can be routed back.
    pub core: usize,
    pub unit: usize,
    pub strand: usize,
    pub addr: u64,
    /// The requester's own L1 way, used as the fallback way hint for cores
    /// the directory does not list as holders.
    pub way: usize,
}

/// One cache line of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineData(pub [u8; LINE_BYTES]);

impl Default for LineData {
    fn default() -> Self {
        Self([0u8; LINE_BYTES])
    }
}

impl LineData {
    /// Deterministic per-line fill pattern used by the harness in place of a
    /// real data array.  The first eight bytes carry the full line index, so
    /// distinct lines always get distinct payloads.
    pub fn from_addr(addr: u64) -> Self {
        let line = addr / LINE_BYTES as u64;
        let mut bytes = [0u8; LINE_BYTES];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = ((line >> ((i % 8) * 8)) & 0xff) as u8 ^ (i as u8);
        }
        Self(bytes)
    }
}

/// Outcome of the tag/fill logic for the live request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LookupOutcome {
    /// The line resolved in the L2 this cycle.
    pub cache_hit: bool,
    /// This cycle completes a previously-missed load by filling the line.
    pub is_fill: bool,
    /// Result of a store-conditional's atomicity check.
    pub store_sync_success: bool,
    pub data: LineData,
}
