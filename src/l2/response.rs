use std::array;
use std::sync::Arc;

use log::trace;
use num_derive::FromPrimitive;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::base::port::{InputPort, OutputPort, Port};
use crate::l2::config::{L2Config, NUM_CORES};
use crate::l2::directory::{CoreBitmap, DirectorySnapshot};
use crate::l2::request::{L2Request, LineData, LookupOutcome, MemOp};

/// Response operation codes as seen on the interconnect.  Discriminants are
/// the wire encoding and must not be reordered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum RespOp {
    #[default]
    LoadAck = 0,
    StoreAck = 1,
    DinvalAck = 2,
    IinvalAck = 3,
}

impl RespOp {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Map a request operation to its acknowledge code.
pub fn response_code(op: MemOp) -> RespOp {
    match op {
        // Flush reuses the load acknowledge code until it gets a dedicated
        // one; downstream consumers rely on the exact value.
        MemOp::Load | MemOp::SyncLoad | MemOp::Flush => RespOp::LoadAck,
        MemOp::Store | MemOp::SyncStore => RespOp::StoreAck,
        MemOp::DataInvalidate => RespOp::DinvalAck,
        MemOp::InstInvalidate => RespOp::IinvalAck,
    }
}

/// Coherence response packet broadcast to the L1 controllers.  Overwritten
/// every cycle; every field except `valid` must be ignored when `valid` is
/// false.
#[derive(Debug, Default, Clone, Copy)]
pub struct L2Response {
    pub valid: bool,
    /// Destination ids, copied from the request.
    pub core: usize,
    pub unit: usize,
    pub strand: usize,
    /// Success of the operation.  Only a store-conditional can report false.
    pub status: bool,
    pub op: RespOp,
    pub addr: u64,
    /// Per-core action flags: refresh data for store acks, drop the tag for
    /// invalidate acks.  The op code disambiguates, not the bit.
    pub update: CoreBitmap,
    /// Which local L1 way each flagged core must act on.  Always populated
    /// for every slot; consumers gate on `update`.
    pub way: [usize; NUM_CORES],
    pub data: LineData,
}

/// Everything the response stage samples on one clock edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageInputs {
    pub request: L2Request,
    pub directory: DirectorySnapshot,
    pub outcome: LookupOutcome,
}

/// Single-cycle combinational decision function of the response stage.
///
/// A miss that is neither a fill completion nor a coherence-only op yields an
/// invalid packet: the request is silently dropped here and replayed upstream
/// once its fill completes.
pub fn compute_response(
    req: &L2Request,
    dir: &DirectorySnapshot,
    outcome: &LookupOutcome,
) -> L2Response {
    let valid =
        req.valid && (outcome.cache_hit || outcome.is_fill || req.op.is_coherence_only());

    // Only the store-conditional's atomicity check can fail; every other op
    // completes unconditionally.
    let status = match req.op {
        MemOp::SyncStore => outcome.store_sync_success,
        _ => true,
    };

    // Whole-width mask computation.  A failed store-conditional must not
    // advance coherence state, so its holders are masked out wholesale.
    let update = match req.op {
        MemOp::SyncStore => dir.has_line.and_broadcast(outcome.store_sync_success),
        MemOp::Store | MemOp::DataInvalidate => dir.has_line,
        _ => CoreBitmap::empty(),
    };

    // Every way slot gets a defined value: the directory's way for holders,
    // the request's own way for everyone else.
    let way = array::from_fn(|core| {
        if dir.has_line.get(core) {
            dir.way[core]
        } else {
            req.way
        }
    });

    L2Response {
        valid,
        core: req.core,
        unit: req.unit,
        strand: req.strand,
        status,
        op: response_code(req.op),
        addr: req.addr,
        update,
        way,
        data: outcome.data,
    }
}

#[derive(Debug, Default)]
pub struct ResponseState {
    resp: L2Response,
}

/// Registered response-generation stage of the L2 pipeline.
///
/// Samples `inputs` on each tick and latches the computed packet, so the
/// response for cycle N's request is observable in cycle N+1.  An empty input
/// channel is an idle cycle and latches an invalid packet.
#[derive(Default)]
pub struct ResponseStage {
    base: ModuleBase<ResponseState, L2Config>,
    pub inputs: Port<InputPort, StageInputs>,
    pub resp_out: Port<OutputPort, L2Response>,
}

impl ResponseStage {
    pub fn new(config: Arc<L2Config>) -> Self {
        let mut stage = ResponseStage::default();
        stage.init_conf(config);
        stage
    }

    /// Last cycle's registered packet.
    pub fn output(&self) -> &L2Response {
        &self.state().resp
    }
}

impl ModuleBehaviors for ResponseStage {
    fn tick_one(&mut self) {
        let inputs = self.inputs.get().unwrap_or_default();
        let next = compute_response(&inputs.request, &inputs.directory, &inputs.outcome);
        if next.valid {
            trace!(
                "l2 response: core {} {:?} status {} update {} addr {:#x}",
                next.core,
                next.op,
                next.status,
                next.update,
                next.addr
            );
        }
        // The output register latches unconditionally, valid or not.
        self.resp_out.post(&next);
        self.base.state.resp = next;
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state.resp = L2Response::default();
        self.base.cycle = 0;
    }
}

module!(ResponseStage, ResponseState, L2Config,);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::port::{link, tie_off};
    use num_traits::FromPrimitive;

    fn request(op: MemOp) -> L2Request {
        L2Request {
            valid: true,
            op,
            core: 0,
            unit: 0,
            strand: 0,
            addr: 0x1000,
            way: 0,
        }
    }

    fn holders(cores: &[(usize, usize)]) -> DirectorySnapshot {
        let mut snap = DirectorySnapshot::default();
        for &(core, way) in cores {
            snap.has_line.set(core);
            snap.way[core] = way;
        }
        snap
    }

    fn hit() -> LookupOutcome {
        LookupOutcome {
            cache_hit: true,
            ..Default::default()
        }
    }

    #[test]
    fn coherence_ops_respond_regardless_of_hit() {
        let dir = DirectorySnapshot::default();
        for op in [MemOp::Flush, MemOp::DataInvalidate, MemOp::InstInvalidate] {
            for (cache_hit, is_fill) in [(false, false), (true, false), (false, true)] {
                let outcome = LookupOutcome {
                    cache_hit,
                    is_fill,
                    ..Default::default()
                };
                let resp = compute_response(&request(op), &dir, &outcome);
                assert!(resp.valid, "{:?} must respond on hit={} fill={}", op, cache_hit, is_fill);
            }
        }
    }

    #[test]
    fn data_ops_respond_only_on_hit_or_fill() {
        let dir = DirectorySnapshot::default();
        for op in [MemOp::Load, MemOp::Store, MemOp::SyncLoad, MemOp::SyncStore] {
            for (cache_hit, is_fill) in
                [(false, false), (true, false), (false, true), (true, true)]
            {
                let outcome = LookupOutcome {
                    cache_hit,
                    is_fill,
                    store_sync_success: true,
                    ..Default::default()
                };
                let resp = compute_response(&request(op), &dir, &outcome);
                assert_eq!(resp.valid, cache_hit || is_fill, "{:?}", op);
            }
        }
    }

    #[test]
    fn invalid_request_never_responds() {
        let mut req = request(MemOp::Flush);
        req.valid = false;
        let resp = compute_response(&req, &DirectorySnapshot::default(), &hit());
        assert!(!resp.valid);
    }

    #[test]
    fn miss_drops_silently_but_still_latches_fields() {
        let resp = compute_response(
            &request(MemOp::Load),
            &DirectorySnapshot::default(),
            &LookupOutcome::default(),
        );
        assert!(!resp.valid);
        // Fields are latched alongside validity, not individually gated.
        assert_eq!(resp.op, RespOp::LoadAck);
        assert_eq!(resp.addr, 0x1000);
    }

    #[test]
    fn failed_sync_store_updates_no_core() {
        let dir = holders(&[(0, 1), (1, 2), (3, 0)]);
        let outcome = LookupOutcome {
            cache_hit: true,
            store_sync_success: false,
            ..Default::default()
        };
        let resp = compute_response(&request(MemOp::SyncStore), &dir, &outcome);
        assert!(resp.valid);
        assert!(!resp.status);
        assert!(resp.update.is_empty());
    }

    #[test]
    fn successful_sync_store_updates_all_holders() {
        let dir = holders(&[(0, 1), (2, 3)]);
        let outcome = LookupOutcome {
            cache_hit: true,
            store_sync_success: true,
            ..Default::default()
        };
        let resp = compute_response(&request(MemOp::SyncStore), &dir, &outcome);
        assert!(resp.status);
        assert_eq!(resp.update, dir.has_line);
    }

    #[test]
    fn store_and_dinval_update_all_holders() {
        let dir = holders(&[(1, 0), (2, 1)]);
        for op in [MemOp::Store, MemOp::DataInvalidate] {
            // Mask must not depend on the sync-success signal for plain ops.
            for sync in [false, true] {
                let outcome = LookupOutcome {
                    cache_hit: true,
                    store_sync_success: sync,
                    ..Default::default()
                };
                let resp = compute_response(&request(op), &dir, &outcome);
                assert_eq!(resp.update, dir.has_line, "{:?} sync={}", op, sync);
                assert!(resp.status);
            }
        }
    }

    #[test]
    fn loads_and_iinval_update_nothing() {
        let dir = holders(&[(0, 1), (1, 1), (2, 1), (3, 1)]);
        for op in [MemOp::Load, MemOp::SyncLoad, MemOp::InstInvalidate] {
            let resp = compute_response(&request(op), &dir, &hit());
            assert!(resp.update.is_empty(), "{:?}", op);
        }
    }

    #[test]
    fn way_fanout_uses_fallback_for_non_holders() {
        let dir = holders(&[(1, 3)]);
        let mut req = request(MemOp::Store);
        req.way = 2;
        let resp = compute_response(&req, &dir, &hit());
        for core in 0..NUM_CORES {
            if core == 1 {
                assert_eq!(resp.way[core], 3);
            } else {
                assert_eq!(resp.way[core], 2);
            }
        }
    }

    #[test]
    fn flush_reuses_load_ack_code() {
        assert_eq!(response_code(MemOp::Flush), RespOp::LoadAck);
        assert_eq!(response_code(MemOp::Flush).code(), 0);
    }

    #[test]
    fn resp_op_codes_are_bit_exact() {
        assert_eq!(RespOp::LoadAck.code(), 0);
        assert_eq!(RespOp::StoreAck.code(), 1);
        assert_eq!(RespOp::DinvalAck.code(), 2);
        assert_eq!(RespOp::IinvalAck.code(), 3);
        for code in 0..4u8 {
            assert_eq!(RespOp::from_u8(code).unwrap().code(), code);
        }
        assert!(RespOp::from_u8(4).is_none());
    }

    #[test]
    fn store_hit_end_to_end() {
        // request from core 2 hits; core 1 holds the line in its way 3.
        let mut stage = ResponseStage::new(Arc::new(L2Config::default()));
        let mut drive = Port::<OutputPort, StageInputs>::new();
        link(&mut stage.inputs, &mut drive);
        tie_off(&mut stage.resp_out);
        stage.reset();

        let inputs = StageInputs {
            request: L2Request {
                valid: true,
                op: MemOp::Store,
                core: 2,
                unit: 1,
                strand: 3,
                addr: 0x1000,
                way: 1,
            },
            directory: holders(&[(1, 3)]),
            outcome: LookupOutcome {
                cache_hit: true,
                data: LineData::from_addr(0x1000),
                ..Default::default()
            },
        };
        drive.put(&inputs);
        assert!(!stage.output().valid, "no response before the clock edge");

        stage.tick_one();
        let resp = stage.output();
        assert!(resp.valid);
        assert_eq!(resp.op, RespOp::StoreAck);
        assert!(resp.status);
        assert_eq!(resp.core, 2);
        assert_eq!(resp.unit, 1);
        assert_eq!(resp.strand, 3);
        assert_eq!(resp.addr, 0x1000);
        assert_eq!(resp.update.bits(), 1 << 1);
        assert_eq!(resp.way[1], 3);
        for core in [0, 2, 3] {
            assert_eq!(resp.way[core], 1, "fallback way for core {}", core);
        }
        assert_eq!(resp.data, LineData::from_addr(0x1000));
    }

    #[test]
    fn failed_sync_store_end_to_end() {
        let mut stage = ResponseStage::new(Arc::new(L2Config::default()));
        let mut drive = Port::<OutputPort, StageInputs>::new();
        link(&mut stage.inputs, &mut drive);
        tie_off(&mut stage.resp_out);
        stage.reset();

        let inputs = StageInputs {
            request: L2Request {
                valid: true,
                op: MemOp::SyncStore,
                core: 0,
                ..Default::default()
            },
            directory: holders(&[(0, 0)]),
            outcome: LookupOutcome {
                cache_hit: true,
                store_sync_success: false,
                ..Default::default()
            },
        };
        drive.put(&inputs);
        stage.tick_one();

        let resp = stage.output();
        assert!(resp.valid);
        assert!(!resp.status);
        assert!(resp.update.is_empty());
    }

    #[test]
    fn idle_cycle_overwrites_the_register() {
        let mut stage = ResponseStage::new(Arc::new(L2Config::default()));
        let mut drive = Port::<OutputPort, StageInputs>::new();
        link(&mut stage.inputs, &mut drive);
        tie_off(&mut stage.resp_out);
        stage.reset();

        drive.put(&StageInputs {
            request: request(MemOp::Flush),
            ..Default::default()
        });
        stage.tick_one();
        assert!(stage.output().valid);

        // Nothing driven: the next edge latches an invalid packet.
        stage.tick_one();
        assert!(!stage.output().valid);
    }

    #[test]
    fn deterministic_across_reset() {
        let mut stage = ResponseStage::new(Arc::new(L2Config::default()));
        let mut drive = Port::<OutputPort, StageInputs>::new();
        link(&mut stage.inputs, &mut drive);
        tie_off(&mut stage.resp_out);

        let inputs = StageInputs {
            request: request(MemOp::Store),
            directory: holders(&[(3, 2)]),
            outcome: hit(),
        };

        stage.reset();
        drive.put(&inputs);
        stage.tick_one();
        let first = *stage.output();

        stage.reset();
        assert!(!stage.output().valid, "reset forces the register invalid");
        drive.put(&inputs);
        stage.tick_one();
        let second = *stage.output();

        assert_eq!(first.valid, second.valid);
        assert_eq!(first.update, second.update);
        assert_eq!(first.way, second.way);
        assert_eq!(first.op, second.op);
    }
}
