//! Wiring: builds the four components over one set of collaborators and
//! exposes the worker step that drives the planner.

use std::sync::Arc;

use nexus_core::{AccessControl, NexusError, NexusResult};
use nexus_state::{Chain, ChainState, Segment, SegmentFields};

use crate::chains::ChainStateMachine;
use crate::clock::{Clock, SystemClock};
use crate::config::FabricationConfig;
use crate::dispatch::{
    LogDispatcher, LogNotifier, MemoryWaveformStore, Notifier, WaveformStore, WorkDispatcher,
};
use crate::gateway::PersistenceGateway;
use crate::planner::{SegmentContinuityPlanner, SegmentPlan};
use crate::revival::ChainRevivalMonitor;
use crate::segments::SegmentStateMachine;
use crate::store::MemoryGateway;

/// External services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub dispatcher: Arc<dyn WorkDispatcher>,
    pub notifier: Arc<dyn Notifier>,
    pub waveforms: Arc<dyn WaveformStore>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-memory storage, log-only dispatch and notification, wall-clock time.
    pub fn in_memory() -> Self {
        Self {
            gateway: Arc::new(MemoryGateway::new()),
            dispatcher: Arc::new(LogDispatcher),
            notifier: Arc::new(LogNotifier),
            waveforms: Arc::new(MemoryWaveformStore::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// What one worker step did to one chain.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    Created(Segment),
    Completed,
    Idle,
    /// Another worker created the planned segment first.
    Lost,
}

/// The assembled engine.
pub struct Fabric {
    pub chains: Arc<ChainStateMachine>,
    pub segments: Arc<SegmentStateMachine>,
    pub planner: Arc<SegmentContinuityPlanner>,
    pub revival: Arc<ChainRevivalMonitor>,
    gateway: Arc<dyn PersistenceGateway>,
}

impl Fabric {
    pub fn new(collaborators: Collaborators, config: FabricationConfig) -> Self {
        let Collaborators {
            gateway,
            dispatcher,
            notifier,
            waveforms,
            clock,
        } = collaborators;
        let chains = Arc::new(ChainStateMachine::new(
            Arc::clone(&gateway),
            dispatcher,
            notifier,
            Arc::clone(&clock),
            config.clone(),
        ));
        let segments = Arc::new(SegmentStateMachine::new(
            Arc::clone(&gateway),
            waveforms,
            config.clone(),
        ));
        let planner = Arc::new(SegmentContinuityPlanner::new(
            Arc::clone(&gateway),
            Arc::clone(&chains),
            Arc::clone(&clock),
            config.clone(),
        ));
        let revival = Arc::new(ChainRevivalMonitor::new(
            Arc::clone(&gateway),
            Arc::clone(&chains),
            clock,
            config,
        ));
        Self {
            chains,
            segments,
            planner,
            revival,
            gateway,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Plan the next step for `chain` and persist a planned segment.
    ///
    /// Losing the insert race to another worker is reported as
    /// [`WorkOutcome::Lost`], not as an error.
    pub fn work_chain(
        &self,
        access: &dyn AccessControl,
        chain: &Chain,
    ) -> NexusResult<WorkOutcome> {
        match self.planner.plan_next_now(access, chain)? {
            SegmentPlan::Idle => Ok(WorkOutcome::Idle),
            SegmentPlan::Complete => Ok(WorkOutcome::Completed),
            SegmentPlan::CreateAt { offset, begin_at } => {
                let fields = SegmentFields::planned(chain.id, offset, begin_at);
                match self.segments.create(access, fields) {
                    Ok(segment) => Ok(WorkOutcome::Created(segment)),
                    Err(NexusError::BusinessRule(reason)) => {
                        tracing::debug!(
                            chain_id = %chain.id,
                            %reason,
                            "segment already planned elsewhere"
                        );
                        Ok(WorkOutcome::Lost)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// One worker pass over every fabricating chain.
    pub fn work_all(&self, access: &dyn AccessControl) -> NexusResult<Vec<(Chain, WorkOutcome)>> {
        let chains = self.chains.read_all_in_state(access, ChainState::Fabricate)?;
        let mut outcomes = Vec::with_capacity(chains.len());
        for chain in chains {
            let outcome = match self.work_chain(access, &chain) {
                Ok(outcome) => outcome,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(chain_id = %chain.id, error = %err, "worker step lost a race");
                    WorkOutcome::Lost
                }
                Err(err) => return Err(err),
            };
            outcomes.push((chain, outcome));
        }
        Ok(outcomes)
    }
}
