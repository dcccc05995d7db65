//! # Segment State Machine
//!
//! Segments are written only by workers, so every mutation requires
//! top-level access. Reads scoped to a chain follow the chain's account
//! visibility; reads by embed key are public.
//!
//! Creation enforces the continuity rules of a chain: offsets form
//! `0..n-1` with no gaps and no duplicates, and at most one segment is
//! open-ended. The duplicate-offset check is repeated atomically by the
//! gateway insert, so two workers planning the same offset cannot both win.

use std::sync::Arc;

use nexus_core::{
    to_embed_key, AccessControl, ChainId, NexusError, NexusResult, SegmentId, Timestamp,
};
use nexus_state::{Chain, LifecycleState, Segment, SegmentFields, SegmentState};

use crate::chains::{require_chain_account, require_top_level};
use crate::config::FabricationConfig;
use crate::dispatch::WaveformStore;
use crate::gateway::PersistenceGateway;

pub struct SegmentStateMachine {
    gateway: Arc<dyn PersistenceGateway>,
    waveforms: Arc<dyn WaveformStore>,
    config: FabricationConfig,
}

impl SegmentStateMachine {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        waveforms: Arc<dyn WaveformStore>,
        config: FabricationConfig,
    ) -> Self {
        Self {
            gateway,
            waveforms,
            config,
        }
    }

    /// Create a segment. The state is always `Planned`.
    ///
    /// # Errors
    ///
    /// - `Authorization` without top-level access.
    /// - `Validation` for missing fields.
    /// - `NotFound` when the chain does not exist.
    /// - `BusinessRule` when the offset is taken, leaves a gap, or the
    ///   segment would be a second open head.
    pub fn create(
        &self,
        access: &dyn AccessControl,
        mut fields: SegmentFields,
    ) -> NexusResult<Segment> {
        require_top_level(access)?;
        fields.state = SegmentState::Planned;
        fields.validate()?;
        let chain_id = fields
            .chain_id
            .ok_or_else(|| NexusError::Validation("Chain ID is required.".into()))?;
        self.load_chain(chain_id)?;

        let offset = fields.offset;
        if self.gateway.read_segment_at_offset(chain_id, offset)?.is_some() {
            return Err(same_offset());
        }
        let expected = self
            .gateway
            .read_last_segment(chain_id)?
            .map_or(0, |last| last.offset + 1);
        if offset != expected {
            return Err(NexusError::BusinessRule(format!(
                "Segment offset {offset} does not continue Chain; expected {expected}"
            )));
        }
        if fields.end_at.is_none() && self.gateway.read_open_head(chain_id)?.is_some() {
            return Err(NexusError::BusinessRule(
                "Chain already has an open-ended Segment".into(),
            ));
        }

        let segment = fields.into_segment(SegmentId::new())?;
        if !self.gateway.insert_segment(&segment)? {
            return Err(same_offset());
        }
        tracing::debug!(
            chain_id = %chain_id,
            segment_id = %segment.id,
            offset,
            begin_at = %segment.begin_at,
            "created segment"
        );
        metrics::counter!("nexus_segments_planned_total").increment(1);
        Ok(segment)
    }

    // ─── Reads ───────────────────────────────────────────────────────

    pub fn read_one(&self, access: &dyn AccessControl, id: SegmentId) -> NexusResult<Segment> {
        let segment = self.load(id)?;
        let chain = self.load_chain(segment.chain_id)?;
        require_chain_account(access, &chain)?;
        Ok(segment)
    }

    /// The first segments of a chain, up to the configured read limit.
    pub fn read_many(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
    ) -> NexusResult<Vec<Segment>> {
        self.read_many_from_offset(access, chain_id, 0)
    }

    /// Segments from `from_offset` onward, up to the configured read limit.
    pub fn read_many_from_offset(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
        from_offset: u64,
    ) -> NexusResult<Vec<Segment>> {
        let chain = self.load_chain(chain_id)?;
        require_chain_account(access, &chain)?;
        self.gateway
            .read_segments(chain_id, from_offset, self.config.segment_read_limit)
    }

    /// Public: segments of the live chain holding `embed_key`.
    pub fn read_many_by_embed_key(
        &self,
        embed_key: &str,
        from_offset: u64,
    ) -> NexusResult<Vec<Segment>> {
        let key = to_embed_key(embed_key)
            .ok_or_else(|| NexusError::NotFound(format!("Chain with embed key {embed_key:?}")))?;
        let chain = self
            .gateway
            .read_chain_by_embed_key(&key)?
            .ok_or_else(|| NexusError::NotFound(format!("Chain with embed key {key:?}")))?;
        self.gateway
            .read_segments(chain.id, from_offset, self.config.segment_read_limit)
    }

    pub fn read_at_offset(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
        offset: u64,
    ) -> NexusResult<Segment> {
        require_top_level(access)?;
        self.gateway
            .read_segment_at_offset(chain_id, offset)?
            .ok_or_else(|| NexusError::NotFound(format!("Segment@{offset} in {chain_id}")))
    }

    /// Lowest-offset segment in `state` that begins at or before `begin_before`.
    pub fn read_one_in_state(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
        state: SegmentState,
        begin_before: Timestamp,
    ) -> NexusResult<Segment> {
        require_top_level(access)?;
        self.gateway
            .read_first_segment_in_state(chain_id, state, begin_before)?
            .ok_or_else(|| NexusError::NotFound(format!("Segment[state={state}] in {chain_id}")))
    }

    pub fn read_many_in_state(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
        state: SegmentState,
    ) -> NexusResult<Vec<Segment>> {
        require_top_level(access)?;
        self.gateway
            .read_segments_in_state(chain_id, state, self.config.segment_read_limit)
    }

    pub fn read_last_segment(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
    ) -> NexusResult<Option<Segment>> {
        let chain = self.load_chain(chain_id)?;
        require_chain_account(access, &chain)?;
        self.gateway.read_last_segment(chain_id)
    }

    pub fn read_last_dubbed_segment(
        &self,
        access: &dyn AccessControl,
        chain_id: ChainId,
    ) -> NexusResult<Option<Segment>> {
        require_top_level(access)?;
        self.gateway
            .read_last_segment_in_state(chain_id, SegmentState::Dubbed)
    }

    // ─── Mutations ───────────────────────────────────────────────────

    /// Validate and apply `fields` to segment `id`.
    ///
    /// `chain_id` and `offset` are fixed at creation, and a closed segment
    /// cannot be reopened.
    pub fn transition(
        &self,
        access: &dyn AccessControl,
        id: SegmentId,
        fields: SegmentFields,
    ) -> NexusResult<Segment> {
        require_top_level(access)?;
        fields.validate()?;
        let existing = self.load(id)?;

        if fields.chain_id.is_some_and(|c| c != existing.chain_id) {
            return Err(NexusError::BusinessRule("cannot change chainId of a segment".into()));
        }
        if fields.offset != existing.offset {
            return Err(NexusError::BusinessRule("cannot change offset of a segment".into()));
        }
        if fields.end_at.is_none() && existing.end_at.is_some() {
            return Err(NexusError::BusinessRule("cannot reopen a closed segment".into()));
        }
        let from = existing.state;
        let to = fields.state;
        from.require_transition(to)?;

        let updated = fields.into_segment(id)?;
        if !self.gateway.update_segment_if_state(&updated, from)? {
            tracing::debug!(
                segment_id = %id,
                from = %from,
                to = %to,
                "conditional segment write lost"
            );
            return Err(NexusError::no_records_updated());
        }
        if from != to {
            tracing::debug!(
                chain_id = %updated.chain_id,
                segment_id = %id,
                offset = updated.offset,
                from = %from,
                to = %to,
                "segment state changed"
            );
        }
        Ok(updated)
    }

    pub fn update_state(
        &self,
        access: &dyn AccessControl,
        id: SegmentId,
        state: SegmentState,
    ) -> NexusResult<Segment> {
        require_top_level(access)?;
        let existing = self.load(id)?;
        self.transition(access, id, existing.to_fields().with_state(state))
    }

    /// Delete a segment and its stored waveform.
    pub fn destroy(&self, access: &dyn AccessControl, id: SegmentId) -> NexusResult<()> {
        require_top_level(access)?;
        let segment = self.load(id)?;
        if let Some(key) = segment.waveform_key.as_deref() {
            self.waveforms.delete_waveform(key)?;
        }
        self.gateway.delete_segment(id)?;
        tracing::debug!(chain_id = %segment.chain_id, segment_id = %id, "destroyed segment");
        Ok(())
    }

    fn load(&self, id: SegmentId) -> NexusResult<Segment> {
        self.gateway
            .read_segment(id)?
            .ok_or_else(|| NexusError::NotFound(format!("{id}")))
    }

    fn load_chain(&self, id: ChainId) -> NexusResult<Chain> {
        self.gateway
            .read_chain(id)?
            .ok_or_else(|| NexusError::NotFound(format!("{id}")))
    }
}

fn same_offset() -> NexusError {
    NexusError::BusinessRule("Found Segment at same offset in Chain".into())
}
