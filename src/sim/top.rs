use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use crate::base::behavior::*;
use crate::base::port::{link, InputPort, OutputPort, Port};
use crate::l2::{
    Directory, L2Config, L2Request, L2Response, L2TagArray, LineData, LookupOutcome, MemOp,
    ResponseStage, StageInputs, LINE_BYTES,
};
use crate::sim::config::SimConfig;
use crate::traffic::{RequestGenerator, TrafficConfig};

#[derive(Debug, Default, Clone, Copy)]
pub struct TopStats {
    /// Valid requests presented by the stimulus side.
    pub requests: u64,
    /// Valid response packets observed on the interconnect.
    pub responses: u64,
    /// Requests silently dropped on a miss, pending their fill.
    pub drops: u64,
    /// Fill completions replayed through the stage.
    pub fills: u64,
    pub sync_failures: u64,
    pub invalidations: u64,
}

/// Top-level harness: stimulus generator, tag and directory models, and the
/// response stage wired through latched ports.  One `tick_one` is one clock
/// edge for the whole pipeline.
pub struct L2Top {
    sim_config: SimConfig,
    traffic_config: TrafficConfig,
    fill_latency: u64,
    tags: L2TagArray,
    directory: Directory,
    stage: ResponseStage,
    gen: RequestGenerator,
    drive: Port<OutputPort, StageInputs>,
    resp_in: Port<InputPort, L2Response>,
    /// Missed requests waiting to come back as fill completions, with the
    /// cycle they become ready.  Stand-in for the excluded fill/retry path.
    pending_fills: VecDeque<(u64, L2Request)>,
    cycle: u64,
    pub stats: TopStats,
}

impl L2Top {
    pub fn new(sim_config: SimConfig, l2_config: L2Config, traffic_config: TrafficConfig) -> Self {
        let mut stage = ResponseStage::new(Arc::new(l2_config));
        let mut drive = Port::new();
        let mut resp_in = Port::new();
        link(&mut stage.inputs, &mut drive);
        link(&mut resp_in, &mut stage.resp_out);
        Self {
            sim_config,
            traffic_config,
            fill_latency: l2_config.fill_latency,
            tags: L2TagArray::new(l2_config.sets, l2_config.ways),
            directory: Directory::new(),
            stage,
            gen: RequestGenerator::new(traffic_config, sim_config.seed),
            drive,
            resp_in,
            pending_fills: VecDeque::new(),
            cycle: 0,
            stats: TopStats::default(),
        }
    }

    pub fn simulate(&mut self) -> TopStats {
        self.reset();
        for _ in 0..self.sim_config.num_cycles {
            self.tick_one();
        }
        self.drain_response();
        info!(
            "simulated {} cycles: {} requests, {} responses, {} drops, {} fills, {} sync failures",
            self.sim_config.num_cycles,
            self.stats.requests,
            self.stats.responses,
            self.stats.drops,
            self.stats.fills,
            self.stats.sync_failures,
        );
        self.stats
    }

    /// Consume the packet the stage latched on its previous edge.
    fn drain_response(&mut self) {
        let Some(resp) = self.resp_in.get() else {
            return;
        };
        if !resp.valid {
            return;
        }
        self.stats.responses += 1;
        if !resp.status {
            self.stats.sync_failures += 1;
        }
        if !resp.update.is_empty() {
            self.stats.invalidations += resp.update.count() as u64;
        }
        let line_addr = resp.addr / LINE_BYTES as u64;
        self.directory.apply_response(line_addr, &resp);
        debug!(
            "cycle {}: response to core {} {:?} status {} update {}",
            self.cycle, resp.core, resp.op, resp.status, resp.update
        );
    }

    /// Pick this cycle's request: a ready fill completion takes priority over
    /// fresh stimulus, mirroring the fill path's bypass into the pipeline.
    fn select_request(&mut self) -> Option<(L2Request, bool)> {
        match self.pending_fills.front() {
            Some(&(ready_at, _)) if ready_at <= self.cycle => {
                self.pending_fills.pop_front().map(|(_, req)| (req, true))
            }
            _ => self.gen.generate().map(|req| (req, false)),
        }
    }

    fn resolve(&mut self, req: L2Request, is_fill: bool) -> LookupOutcome {
        let line_addr = req.addr / LINE_BYTES as u64;
        let mut outcome = LookupOutcome {
            data: LineData::from_addr(req.addr),
            store_sync_success: self.gen.sync_outcome(),
            ..Default::default()
        };

        if is_fill {
            self.stats.fills += 1;
            if let Some(evicted) = self.tags.fill(line_addr) {
                self.directory.drop_line(evicted);
            }
            outcome.is_fill = true;
        } else if req.op.is_coherence_only() {
            // Flush and data-invalidate drop the L2 copy; the response mask
            // takes care of the L1s.  Instruction-invalidate only concerns
            // the L1 instruction caches.
            if req.op != MemOp::InstInvalidate {
                self.tags.invalidate(line_addr);
            }
        } else {
            outcome.cache_hit = self.tags.probe(line_addr);
            if !outcome.cache_hit {
                // Silent drop: remember the request and replay it as a fill
                // completion once the (modeled) memory latency has passed.
                self.stats.drops += 1;
                self.pending_fills
                    .push_back((self.cycle + self.fill_latency, req));
            }
        }

        // A completed load leaves a private copy behind; the directory must
        // know before the next request to the same line is resolved.
        if req.op.is_load_class() && (outcome.cache_hit || outcome.is_fill) {
            let way = self.gen.l1_way();
            self.directory.record_fill(line_addr, req.core, way);
        }

        outcome
    }
}

impl ModuleBehaviors for L2Top {
    fn tick_one(&mut self) {
        self.drain_response();

        if let Some((req, is_fill)) = self.select_request() {
            if !is_fill {
                self.stats.requests += 1;
            }
            let directory = self.directory.snapshot(req.addr / LINE_BYTES as u64);
            let outcome = self.resolve(req, is_fill);
            self.drive.put(&StageInputs {
                request: req,
                directory,
                outcome,
            });
        }

        self.stage.tick_one();
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.stage.reset();
        self.tags.reset();
        self.directory.reset();
        self.pending_fills.clear();
        self.gen = RequestGenerator::new(self.traffic_config, self.sim_config.seed);
        self.cycle = 0;
        self.stats = TopStats::default();
        // Clear any packet still latched on the interconnect channel.
        let _ = self.resp_in.get();
    }
}
