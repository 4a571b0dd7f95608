//! Randomized request stimulus for the L2 pipeline, standing in for the
//! excluded arbitration stage in front of the response generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::l2::{L2Request, MemOp, LINE_BYTES, NUM_CORES, NUM_WAYS};
use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TrafficConfig {
    /// Probability that any given cycle carries a request at all.
    pub req_prob: f64,
    /// Probability that a store-conditional's atomicity check succeeds.
    pub sync_success_prob: f64,
    /// Number of distinct cache lines the address stream draws from.  Small
    /// windows produce more hits and more cross-core sharing.
    pub window_lines: u64,
    pub base_addr: u64,
    pub units_per_core: usize,
    pub strands_per_unit: usize,
    pub op_mix: OpMix,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            req_prob: 0.7,
            sync_success_prob: 0.8,
            window_lines: 512,
            base_addr: 0x8000_0000,
            units_per_core: 2,
            strands_per_unit: 4,
            op_mix: OpMix::default(),
        }
    }
}

/// Relative weights of each operation in the generated stream.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct OpMix {
    pub load: u32,
    pub store: u32,
    pub flush: u32,
    pub dinval: u32,
    pub iinval: u32,
    pub sync_load: u32,
    pub sync_store: u32,
}

impl Default for OpMix {
    fn default() -> Self {
        Self {
            load: 50,
            store: 30,
            flush: 4,
            dinval: 4,
            iinval: 2,
            sync_load: 5,
            sync_store: 5,
        }
    }
}

impl OpMix {
    // Summed at u64 so pathological weight configs cannot overflow.
    fn total(&self) -> u64 {
        [
            self.load,
            self.store,
            self.flush,
            self.dinval,
            self.iinval,
            self.sync_load,
            self.sync_store,
        ]
        .iter()
        .map(|&w| w as u64)
        .sum()
    }

    fn pick(&self, mut roll: u64) -> MemOp {
        for (weight, op) in [
            (self.load, MemOp::Load),
            (self.store, MemOp::Store),
            (self.flush, MemOp::Flush),
            (self.dinval, MemOp::DataInvalidate),
            (self.iinval, MemOp::InstInvalidate),
            (self.sync_load, MemOp::SyncLoad),
            (self.sync_store, MemOp::SyncStore),
        ] {
            if roll < weight as u64 {
                return op;
            }
            roll -= weight as u64;
        }
        MemOp::Load
    }
}

pub struct RequestGenerator {
    config: TrafficConfig,
    rng: StdRng,
}

impl RequestGenerator {
    pub fn new(config: TrafficConfig, seed: u64) -> Self {
        assert!(config.op_mix.total() > 0, "op mix must have nonzero weight");
        assert!(
            (0.0..=1.0).contains(&config.req_prob),
            "req_prob must be within [0, 1]"
        );
        assert!(
            (0.0..=1.0).contains(&config.sync_success_prob),
            "sync_success_prob must be within [0, 1]"
        );
        assert!(config.window_lines > 0, "window_lines must be nonzero");
        assert!(config.units_per_core > 0, "units_per_core must be nonzero");
        assert!(
            config.strands_per_unit > 0,
            "strands_per_unit must be nonzero"
        );
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One cycle's worth of stimulus, or None on an idle cycle.
    pub fn generate(&mut self) -> Option<L2Request> {
        if !self.rng.gen_bool(self.config.req_prob) {
            return None;
        }
        let line = self.rng.gen_range(0..self.config.window_lines);
        let roll = self.rng.gen_range(0..self.config.op_mix.total());
        let op = self.config.op_mix.pick(roll);
        Some(L2Request {
            valid: true,
            op,
            core: self.rng.gen_range(0..NUM_CORES),
            unit: self.rng.gen_range(0..self.config.units_per_core),
            strand: self.rng.gen_range(0..self.config.strands_per_unit),
            addr: self.config.base_addr + line * LINE_BYTES as u64,
            way: self.rng.gen_range(0..NUM_WAYS),
        })
    }

    /// Outcome draw for a store-conditional's atomicity check.
    pub fn sync_outcome(&mut self) -> bool {
        self.rng.gen_bool(self.config.sync_success_prob)
    }

    /// L1 way assignment for a core that just pulled a line in.
    pub fn l1_way(&mut self) -> usize {
        self.rng.gen_range(0..NUM_WAYS)
    }
}
