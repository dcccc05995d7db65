//! # Chain Revival Monitor
//!
//! Periodic sweep over Production chains in `Fabricate`. A chain is stalled
//! when it has been fabricating for longer than the start threshold and
//! none of its Dubbed segments ended within the head threshold. Stalled
//! chains are revived; see [`ChainStateMachine::revive`].
//!
//! Several workers may sweep at once. A revival that loses its race surfaces
//! as `Conflict`, or as `BusinessRule`/`IllegalTransition` when the loser
//! reads the chain after the winner already failed it. Those are logged and
//! skipped. Any other error aborts the sweep.

use std::sync::Arc;

use nexus_core::{AccessControl, NexusError, NexusResult};
use nexus_state::{Chain, ChainState, SegmentState};

use crate::chains::{require_top_level, ChainStateMachine};
use crate::clock::Clock;
use crate::config::FabricationConfig;
use crate::gateway::PersistenceGateway;

pub struct ChainRevivalMonitor {
    gateway: Arc<dyn PersistenceGateway>,
    chains: Arc<ChainStateMachine>,
    clock: Arc<dyn Clock>,
    config: FabricationConfig,
}

impl ChainRevivalMonitor {
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

    /// Revive every stalled Production chain. Returns the replacement chains.
    pub fn check_and_revive_all(&self, access: &dyn AccessControl) -> NexusResult<Vec<Chain>> {
        require_top_level(access)?;
        let now = self.clock.now();
        let started_before = now.minus_seconds(self.config.revive_threshold_start_seconds)?;
        let dubbed_since = now.minus_seconds(self.config.revive_threshold_head_seconds)?;

        let mut stalled = Vec::new();
        for chain in self.gateway.read_chains_in_state(ChainState::Fabricate)? {
            if !chain.is_production() || chain.start_at.is_after(&started_before) {
                continue;
            }
            let healthy = self.gateway.count_segments_in_state_ending_since(
                chain.id,
                SegmentState::Dubbed,
                dubbed_since,
            )?;
            if healthy == 0 {
                stalled.push(chain);
            }
        }

        let mut revived = Vec::with_capacity(stalled.len());
        for chain in stalled {
            let reason = format!(
                "no Dubbed Segment ended since {dubbed_since} in a Chain fabricating since {}",
                chain.start_at
            );
            match self.chains.revive(access, chain.id, &reason) {
                Ok(replacement) => revived.push(replacement),
                Err(
                    err @ (NexusError::Conflict(_)
                    | NexusError::BusinessRule(_)
                    | NexusError::IllegalTransition { .. }),
                ) => {
                    tracing::warn!(chain_id = %chain.id, error = %err, "skipped chain revival");
                }
                Err(err) => return Err(err),
            }
        }
        if !revived.is_empty() {
            tracing::info!(count = revived.len(), "revival sweep revived chains");
        }
        Ok(revived)
    }
}
