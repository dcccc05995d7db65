//! # Segment Continuity Planner
//!
//! Decides what a worker should do next for one chain:
//!
//! 1. an open head exists → `Idle` (work in progress),
//! 2. no segments → `CreateAt(0, chain.start_at)`,
//! 3. the last closed segment begins after `segment_begin_before` → `Idle`
//!    (far enough ahead),
//! 4. the last closed segment ends after the chain's stop time → `Complete`
//!    if it is Dubbed and the stop time is before
//!    `chain_stop_complete_before`, else `Idle`,
//! 5. otherwise → `CreateAt(last.offset + 1, last.end_at)`.
//!
//! Step 4 moves the chain to `Complete` itself. A `CreateAt` is only a
//! proposal; the caller persists it through
//! [`crate::segments::SegmentStateMachine::create`], which rejects it if
//! another worker got there first.

use std::sync::Arc;

use nexus_core::{AccessControl, ChainId, NexusResult, Timestamp};
use nexus_state::{Chain, ChainState, SegmentFields, SegmentState};

use crate::chains::{require_top_level, ChainStateMachine};
use crate::clock::Clock;
use crate::config::FabricationConfig;
use crate::gateway::PersistenceGateway;

/// Outcome of one planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPlan {
    /// Create the next segment at `offset`, beginning at `begin_at`.
    CreateAt { offset: u64, begin_at: Timestamp },
    /// The chain reached its stop time and was moved to `Complete`.
    Complete,
    /// Nothing to do yet.
    Idle,
}

impl SegmentPlan {
    /// The `Planned` segment template for a `CreateAt` plan.
    pub fn into_fields(self, chain_id: ChainId) -> Option<SegmentFields> {
        match self {
            Self::CreateAt { offset, begin_at } => {
                Some(SegmentFields::planned(chain_id, offset, begin_at))
            }
            Self::Complete | Self::Idle => None,
        }
    }
}

pub struct SegmentContinuityPlanner {
    gateway: Arc<dyn PersistenceGateway>,
    chains: Arc<ChainStateMachine>,
    clock: Arc<dyn Clock>,
    config: FabricationConfig,
}

impl SegmentContinuityPlanner {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        chains: Arc<ChainStateMachine>,
        clock: Arc<dyn Clock>,
        config: FabricationConfig,
    ) -> Self {
        Self {
            gateway,
            chains,
            clock,
            config,
        }
    }

    /// Plan the next step for `chain` against explicit bounds.
    pub fn plan_next(
        &self,
        access: &dyn AccessControl,
        chain: &Chain,
        segment_begin_before: Timestamp,
        chain_stop_complete_before: Timestamp,
    ) -> NexusResult<SegmentPlan> {
        require_top_level(access)?;

        if let Some(head) = self.gateway.read_open_head(chain.id)? {
            tracing::debug!(chain_id = %chain.id, offset = head.offset, "open head in progress");
            return Ok(SegmentPlan::Idle);
        }

        if self.gateway.count_segments(chain.id)? == 0 {
            return Ok(SegmentPlan::CreateAt {
                offset: 0,
                begin_at: chain.start_at,
            });
        }

        let Some(last) = self.gateway.read_last_closed_segment(chain.id)? else {
            return Ok(SegmentPlan::Idle);
        };
        let Some(last_end) = last.end_at else {
            return Ok(SegmentPlan::Idle);
        };

        if last.begin_at.is_after(&segment_begin_before) {
            tracing::debug!(
                chain_id = %chain.id,
                offset = last.offset,
                "fabricated far enough ahead"
            );
            return Ok(SegmentPlan::Idle);
        }

        if let Some(stop_at) = chain.stop_at {
            if last_end.is_after(&stop_at) {
                if stop_at.is_before(&chain_stop_complete_before)
                    && last.state == SegmentState::Dubbed
                {
                    self.chains.update_state(access, chain.id, ChainState::Complete)?;
                    tracing::info!(chain_id = %chain.id, stop_at = %stop_at, "chain complete");
                    metrics::counter!("nexus_chains_completed_total").increment(1);
                    return Ok(SegmentPlan::Complete);
                }
                return Ok(SegmentPlan::Idle);
            }
        }

        let plan = SegmentPlan::CreateAt {
            offset: last.offset + 1,
            begin_at: last_end,
        };
        tracing::debug!(chain_id = %chain.id, ?plan, "planned next segment");
        Ok(plan)
    }

    /// Plan with bounds taken from the clock: segments may begin up to
    /// `work_ahead_seconds` from now, and a chain completes once its stop time
    /// is more than `complete_grace_seconds` in the past.
    pub fn plan_next_now(
        &self,
        access: &dyn AccessControl,
        chain: &Chain,
    ) -> NexusResult<SegmentPlan> {
        let now = self.clock.now();
        self.plan_next(
            access,
            chain,
            now.plus_seconds(self.config.work_ahead_seconds)?,
            now.minus_seconds(self.config.complete_grace_seconds)?,
        )
    }
}
