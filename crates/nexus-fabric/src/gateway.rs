//! # Persistence Gateway
//!
//! The storage contract the state machines are written against. Any
//! transactional store can implement it; [`crate::store::MemoryGateway`] is
//! the in-process reference implementation.
//!
//! Two methods carry the concurrency guarantees of the whole system:
//!
//! - [`PersistenceGateway::update_chain_if_state`] and
//!   [`PersistenceGateway::update_segment_if_state`] write only when the
//!   stored state still equals the state the caller loaded, and report
//!   whether a row was affected. This is `UPDATE ... WHERE id = ? AND
//!   state = ?` in SQL terms.
//! - [`PersistenceGateway::insert_segment`] refuses a second segment at an
//!   occupied `(chain_id, offset)`, the equivalent of a unique index.
//! - [`PersistenceGateway::insert_chain`] and
//!   [`PersistenceGateway::update_chain_if_state`] refuse to store a
//!   non-Erase chain whose embed key another non-Erase chain holds, with
//!   [`nexus_core::NexusError::embed_key_taken`]. This is a partial unique
//!   index on `embed_key WHERE state <> 'Erase'`.
//!
//! All segment lists are ordered by ascending offset.

use nexus_core::{AccountId, ChainId, NexusResult, SegmentId, Timestamp};
use nexus_state::{Chain, ChainBinding, ChainState, Segment, SegmentState};

/// Transactional storage for chains, bindings and segments.
pub trait PersistenceGateway: Send + Sync {
    // ─── Chains ──────────────────────────────────────────────────────

    /// Fails with `BusinessRule` when the embed key is held by a live chain.
    fn insert_chain(&self, chain: &Chain) -> NexusResult<()>;

    fn read_chain(&self, id: ChainId) -> NexusResult<Option<Chain>>;

    /// The non-Erase chain holding `embed_key`, if any.
    fn read_chain_by_embed_key(&self, embed_key: &str) -> NexusResult<Option<Chain>>;

    /// Chains of the given accounts, in every state.
    fn read_chains_for_accounts(&self, account_ids: &[AccountId]) -> NexusResult<Vec<Chain>>;

    fn read_chains_in_state(&self, state: ChainState) -> NexusResult<Vec<Chain>>;

    /// Replace the stored chain only if its state equals `expected`.
    /// Returns `false` when nothing was written. Fails with `BusinessRule`
    /// when the new embed key is held by another live chain.
    fn update_chain_if_state(&self, chain: &Chain, expected: ChainState) -> NexusResult<bool>;

    /// Returns whether a chain was removed.
    fn delete_chain(&self, id: ChainId) -> NexusResult<bool>;

    // ─── Bindings ────────────────────────────────────────────────────

    fn insert_binding(&self, binding: &ChainBinding) -> NexusResult<()>;

    fn read_bindings(&self, chain_id: ChainId) -> NexusResult<Vec<ChainBinding>>;

    /// Returns the number of bindings removed.
    fn delete_bindings(&self, chain_id: ChainId) -> NexusResult<usize>;

    // ─── Segments ────────────────────────────────────────────────────

    /// Insert a segment. Returns `false` when its offset is already taken.
    fn insert_segment(&self, segment: &Segment) -> NexusResult<bool>;

    fn read_segment(&self, id: SegmentId) -> NexusResult<Option<Segment>>;

    /// Up to `limit` segments with `offset >= from_offset`.
    fn read_segments(
        &self,
        chain_id: ChainId,
        from_offset: u64,
        limit: usize,
    ) -> NexusResult<Vec<Segment>>;

    /// Up to `limit` segments in `state`.
    fn read_segments_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        limit: usize,
    ) -> NexusResult<Vec<Segment>>;

    fn read_segment_at_offset(
        &self,
        chain_id: ChainId,
        offset: u64,
    ) -> NexusResult<Option<Segment>>;

    /// The segment with the highest offset.
    fn read_last_segment(&self, chain_id: ChainId) -> NexusResult<Option<Segment>>;

    /// The highest-offset segment that has an `end_at`.
    fn read_last_closed_segment(&self, chain_id: ChainId) -> NexusResult<Option<Segment>>;

    /// The highest-offset segment in `state`.
    fn read_last_segment_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
    ) -> NexusResult<Option<Segment>>;

    /// The segment with `end_at = None`, if any.
    fn read_open_head(&self, chain_id: ChainId) -> NexusResult<Option<Segment>>;

    /// The lowest-offset segment in `state` beginning at or before `begin_before`.
    fn read_first_segment_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        begin_before: Timestamp,
    ) -> NexusResult<Option<Segment>>;

    fn count_segments(&self, chain_id: ChainId) -> NexusResult<usize>;

    /// Number of segments in `state` whose `end_at` is at or after `since`.
    fn count_segments_in_state_ending_since(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        since: Timestamp,
    ) -> NexusResult<usize>;

    /// Replace the stored segment only if its state equals `expected`.
    fn update_segment_if_state(
        &self,
        segment: &Segment,
        expected: SegmentState,
    ) -> NexusResult<bool>;

    fn delete_segment(&self, id: SegmentId) -> NexusResult<bool>;
}
