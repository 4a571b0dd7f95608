use crate::sim::config::Config;
use serde::Deserialize;

/// Number of cores sharing the L2.  Every per-core array in the coherence
/// interface is bounded by this, and the directory bitset is exactly this wide.
pub const NUM_CORES: usize = 4;

/// Associativity of each core's private L1, i.e. the bound on way indices
/// carried in requests and responses.
pub const NUM_WAYS: usize = 4;

/// Cache line width in bytes.
pub const LINE_BYTES: usize = 64;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct L2Config {
    pub sets: usize,
    pub ways: usize,
    /// Cycles between a load miss and its fill completion in the harness.
    pub fill_latency: u64,
}

impl Config for L2Config {}

impl Default for L2Config {
    fn default() -> Self {
        Self {
            sets: 256,
            ways: 8,
            fill_latency: 20,
        }
    }
}
