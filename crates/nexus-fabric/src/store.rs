//! In-memory [`PersistenceGateway`].
//!
//! All tables sit behind one `parking_lot::RwLock`, so every conditional
//! write and every segment insert is a single critical section. The lock is
//! never held across a call out of this module.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use nexus_core::{AccountId, BindingId, ChainId, NexusError, NexusResult, SegmentId, Timestamp};
use nexus_state::{Chain, ChainBinding, ChainState, Segment, SegmentState};

use crate::gateway::PersistenceGateway;

#[derive(Debug, Default)]
struct Tables {
    chains: HashMap<ChainId, Chain>,
    bindings: HashMap<BindingId, ChainBinding>,
    segments: HashMap<SegmentId, Segment>,
    /// `(chain, offset) -> segment`: the unique index and the offset ordering.
    positions: BTreeMap<(ChainId, u64), SegmentId>,
}

impl Tables {
    fn chain_segments(
        &self,
        chain_id: ChainId,
        from_offset: u64,
    ) -> impl Iterator<Item = &Segment> {
        self.positions
            .range((chain_id, from_offset)..=(chain_id, u64::MAX))
            .filter_map(|(_, id)| self.segments.get(id))
    }

    /// Whether a non-Erase chain other than `chain` holds its embed key.
    fn embed_key_taken(&self, chain: &Chain) -> bool {
        let Some(key) = chain.embed_key.as_deref() else {
            return false;
        };
        chain.state != ChainState::Erase
            && self.chains.values().any(|c| {
                c.id != chain.id
                    && c.state != ChainState::Erase
                    && c.embed_key.as_deref() == Some(key)
            })
    }

    fn chain_segments_rev(&self, chain_id: ChainId) -> impl Iterator<Item = &Segment> {
        self.positions
            .range((chain_id, 0)..=(chain_id, u64::MAX))
            .rev()
            .filter_map(|(_, id)| self.segments.get(id))
    }
}

/// Thread-safe, cloneable in-memory gateway. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn insert_chain(&self, chain: &Chain) -> NexusResult<()> {
        let mut tables = self.tables.write();
        if tables.chains.contains_key(&chain.id) {
            return Err(NexusError::Storage(format!("duplicate {}", chain.id)));
        }
        if tables.embed_key_taken(chain) {
            return Err(NexusError::embed_key_taken());
        }
        tables.chains.insert(chain.id, chain.clone());
        Ok(())
    }

    fn read_chain(&self, id: ChainId) -> NexusResult<Option<Chain>> {
        Ok(self.tables.read().chains.get(&id).cloned())
    }

    fn read_chain_by_embed_key(&self, embed_key: &str) -> NexusResult<Option<Chain>> {
        Ok(self
            .tables
            .read()
            .chains
            .values()
            .find(|c| c.state != ChainState::Erase && c.embed_key.as_deref() == Some(embed_key))
            .cloned())
    }

    fn read_chains_for_accounts(&self, account_ids: &[AccountId]) -> NexusResult<Vec<Chain>> {
        let mut chains: Vec<Chain> = self
            .tables
            .read()
            .chains
            .values()
            .filter(|c| account_ids.contains(&c.account_id))
            .cloned()
            .collect();
        chains.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.id.cmp(&b.id)));
        Ok(chains)
    }

    fn read_chains_in_state(&self, state: ChainState) -> NexusResult<Vec<Chain>> {
        let mut chains: Vec<Chain> = self
            .tables
            .read()
            .chains
            .values()
            .filter(|c| c.state == state)
            .cloned()
            .collect();
        chains.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.id.cmp(&b.id)));
        Ok(chains)
    }

    fn update_chain_if_state(&self, chain: &Chain, expected: ChainState) -> NexusResult<bool> {
        let mut tables = self.tables.write();
        if tables.chains.get(&chain.id).map(|stored| stored.state) != Some(expected) {
            return Ok(false);
        }
        if tables.embed_key_taken(chain) {
            return Err(NexusError::embed_key_taken());
        }
        tables.chains.insert(chain.id, chain.clone());
        Ok(true)
    }

    fn delete_chain(&self, id: ChainId) -> NexusResult<bool> {
        Ok(self.tables.write().chains.remove(&id).is_some())
    }

    fn insert_binding(&self, binding: &ChainBinding) -> NexusResult<()> {
        let mut tables = self.tables.write();
        if !tables.chains.contains_key(&binding.chain_id) {
            return Err(NexusError::Storage(format!(
                "binding references missing {}",
                binding.chain_id
            )));
        }
        tables.bindings.insert(binding.id, binding.clone());
        Ok(())
    }

    fn read_bindings(&self, chain_id: ChainId) -> NexusResult<Vec<ChainBinding>> {
        let mut bindings: Vec<ChainBinding> = self
            .tables
            .read()
            .bindings
            .values()
            .filter(|b| b.chain_id == chain_id)
            .cloned()
            .collect();
        bindings.sort_by_key(|b| b.id);
        Ok(bindings)
    }

    fn delete_bindings(&self, chain_id: ChainId) -> NexusResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.bindings.len();
        tables.bindings.retain(|_, b| b.chain_id != chain_id);
        Ok(before - tables.bindings.len())
    }

    fn insert_segment(&self, segment: &Segment) -> NexusResult<bool> {
        let mut tables = self.tables.write();
        let position = (segment.chain_id, segment.offset);
        if tables.positions.contains_key(&position) {
            return Ok(false);
        }
        if tables.segments.contains_key(&segment.id) {
            return Err(NexusError::Storage(format!("duplicate {}", segment.id)));
        }
        tables.positions.insert(position, segment.id);
        tables.segments.insert(segment.id, segment.clone());
        Ok(true)
    }

    fn read_segment(&self, id: SegmentId) -> NexusResult<Option<Segment>> {
        Ok(self.tables.read().segments.get(&id).cloned())
    }

    fn read_segments(
        &self,
        chain_id: ChainId,
        from_offset: u64,
        limit: usize,
    ) -> NexusResult<Vec<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments(chain_id, from_offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn read_segments_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        limit: usize,
    ) -> NexusResult<Vec<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments(chain_id, 0)
            .filter(|s| s.state == state)
            .take(limit)
            .cloned()
            .collect())
    }

    fn read_segment_at_offset(
        &self,
        chain_id: ChainId,
        offset: u64,
    ) -> NexusResult<Option<Segment>> {
        let tables = self.tables.read();
        Ok(tables
            .positions
            .get(&(chain_id, offset))
            .and_then(|id| tables.segments.get(id))
            .cloned())
    }

    fn read_last_segment(&self, chain_id: ChainId) -> NexusResult<Option<Segment>> {
        Ok(self.tables.read().chain_segments_rev(chain_id).next().cloned())
    }

    fn read_last_closed_segment(&self, chain_id: ChainId) -> NexusResult<Option<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments_rev(chain_id)
            .find(|s| s.end_at.is_some())
            .cloned())
    }

    fn read_last_segment_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
    ) -> NexusResult<Option<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments_rev(chain_id)
            .find(|s| s.state == state)
            .cloned())
    }

    fn read_open_head(&self, chain_id: ChainId) -> NexusResult<Option<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments_rev(chain_id)
            .find(|s| s.is_open_head())
            .cloned())
    }

    fn read_first_segment_in_state(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        begin_before: Timestamp,
    ) -> NexusResult<Option<Segment>> {
        Ok(self
            .tables
            .read()
            .chain_segments(chain_id, 0)
            .find(|s| s.state == state && !s.begin_at.is_after(&begin_before))
            .cloned())
    }

    fn count_segments(&self, chain_id: ChainId) -> NexusResult<usize> {
        Ok(self
            .tables
            .read()
            .positions
            .range((chain_id, 0)..=(chain_id, u64::MAX))
            .count())
    }

    fn count_segments_in_state_ending_since(
        &self,
        chain_id: ChainId,
        state: SegmentState,
        since: Timestamp,
    ) -> NexusResult<usize> {
        Ok(self
            .tables
            .read()
            .chain_segments(chain_id, 0)
            .filter(|s| s.state == state && s.end_at.is_some_and(|end| !end.is_before(&since)))
            .count())
    }

    fn update_segment_if_state(
        &self,
        segment: &Segment,
        expected: SegmentState,
    ) -> NexusResult<bool> {
        let mut tables = self.tables.write();
        let Some(stored) = tables.segments.get_mut(&segment.id) else {
            return Ok(false);
        };
        if stored.chain_id != segment.chain_id || stored.offset != segment.offset {
            return Err(NexusError::Storage(format!(
                "position of {} is immutable",
                segment.id
            )));
        }
        if stored.state != expected {
            return Ok(false);
        }
        *stored = segment.clone();
        Ok(true)
    }

    fn delete_segment(&self, id: SegmentId) -> NexusResult<bool> {
        let mut tables = self.tables.write();
        match tables.segments.remove(&id) {
            Some(segment) => {
                tables.positions.remove(&(segment.chain_id, segment.offset));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_state::{ChainFields, SegmentFields};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn chain(gateway: &MemoryGateway) -> Chain {
        let chain = ChainFields::production(AccountId::new(), "radio", ts("2014-08-12T12:00:00Z"))
            .into_chain(ChainId::new())
            .unwrap();
        gateway.insert_chain(&chain).unwrap();
        chain
    }

    fn segment(chain_id: ChainId, offset: u64, begin: &str, end: Option<&str>) -> Segment {
        let mut fields = SegmentFields::planned(chain_id, offset, ts(begin));
        fields.end_at = end.map(ts);
        fields.into_segment(SegmentId::new()).unwrap()
    }

    #[test]
    fn conditional_chain_write_checks_state() {
        let gateway = MemoryGateway::new();
        let mut stored = chain(&gateway);
        stored.state = ChainState::Ready;

        assert!(!gateway.update_chain_if_state(&stored, ChainState::Ready).unwrap());
        assert!(gateway.update_chain_if_state(&stored, ChainState::Draft).unwrap());
        assert_eq!(gateway.read_chain(stored.id).unwrap().unwrap().state, ChainState::Ready);
    }

    #[test]
    fn offset_is_unique_per_chain() {
        let gateway = MemoryGateway::new();
        let c = chain(&gateway);
        let other = chain(&gateway);
        assert!(gateway.insert_segment(&segment(c.id, 0, "2014-08-12T12:00:00Z", None)).unwrap());
        assert!(!gateway.insert_segment(&segment(c.id, 0, "2014-08-12T12:00:00Z", None)).unwrap());
        assert!(
            gateway.insert_segment(&segment(other.id, 0, "2014-08-12T12:00:00Z", None)).unwrap()
        );
        assert_eq!(gateway.count_segments(c.id).unwrap(), 1);
    }

    #[test]
    fn segment_queries_follow_offset_order() {
        let gateway = MemoryGateway::new();
        let c = chain(&gateway);
        let s0 = segment(c.id, 0, "2014-08-12T12:00:00Z", Some("2014-08-12T12:00:30Z"));
        let s1 = segment(c.id, 1, "2014-08-12T12:00:30Z", Some("2014-08-12T12:01:00Z"));
        let s2 = segment(c.id, 2, "2014-08-12T12:01:00Z", None);
        for s in [&s2, &s0, &s1] {
            assert!(gateway.insert_segment(s).unwrap());
        }

        let offsets: Vec<u64> = gateway
            .read_segments(c.id, 0, 10)
            .unwrap()
            .iter()
            .map(|s| s.offset)
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(gateway.read_segments(c.id, 1, 1).unwrap()[0].offset, 1);
        assert_eq!(gateway.read_last_segment(c.id).unwrap().unwrap().offset, 2);
        assert_eq!(gateway.read_last_closed_segment(c.id).unwrap().unwrap().offset, 1);
        assert_eq!(gateway.read_open_head(c.id).unwrap().unwrap().id, s2.id);
        assert_eq!(gateway.read_segment_at_offset(c.id, 1).unwrap().unwrap().id, s1.id);
    }

    #[test]
    fn segment_position_cannot_change() {
        let gateway = MemoryGateway::new();
        let c = chain(&gateway);
        let mut s = segment(c.id, 0, "2014-08-12T12:00:00Z", None);
        gateway.insert_segment(&s).unwrap();
        s.offset = 4;
        assert!(matches!(
            gateway.update_segment_if_state(&s, SegmentState::Planned),
            Err(NexusError::Storage(_))
        ));
    }

    #[test]
    fn delete_segment_frees_offset() {
        let gateway = MemoryGateway::new();
        let c = chain(&gateway);
        let s = segment(c.id, 0, "2014-08-12T12:00:00Z", None);
        gateway.insert_segment(&s).unwrap();
        assert!(gateway.delete_segment(s.id).unwrap());
        assert!(!gateway.delete_segment(s.id).unwrap());
        assert!(gateway.insert_segment(&segment(c.id, 0, "2014-08-12T12:00:00Z", None)).unwrap());
    }

    #[test]
    fn live_embed_key_is_unique() {
        let gateway = MemoryGateway::new();
        let mut holder = chain(&gateway);
        holder.embed_key = Some("jazz".into());
        assert!(gateway.update_chain_if_state(&holder, ChainState::Draft).unwrap());

        let mut rival =
            ChainFields::production(AccountId::new(), "rival", ts("2014-08-12T12:00:00Z"))
                .into_chain(ChainId::new())
                .unwrap();
        rival.embed_key = Some("jazz".into());
        assert_eq!(gateway.insert_chain(&rival), Err(NexusError::embed_key_taken()));

        let mut other = chain(&gateway);
        other.embed_key = Some("jazz".into());
        assert_eq!(
            gateway.update_chain_if_state(&other, ChainState::Draft),
            Err(NexusError::embed_key_taken())
        );
        assert_eq!(gateway.read_chain(other.id).unwrap().unwrap().embed_key, None);

        let mut erased = holder.clone();
        erased.state = ChainState::Erase;
        assert!(gateway.update_chain_if_state(&erased, ChainState::Draft).unwrap());
        assert!(gateway.update_chain_if_state(&other, ChainState::Draft).unwrap());
    }

    #[test]
    fn embed_key_lookup_skips_erased_chains() {
        let gateway = MemoryGateway::new();
        let mut c = chain(&gateway);
        c.embed_key = Some("jazz".into());
        gateway.update_chain_if_state(&c, ChainState::Draft).unwrap();
        assert!(gateway.read_chain_by_embed_key("jazz").unwrap().is_some());

        let mut erased = c.clone();
        erased.state = ChainState::Erase;
        gateway.update_chain_if_state(&erased, ChainState::Draft).unwrap();
        assert!(gateway.read_chain_by_embed_key("jazz").unwrap().is_none());
    }
}
