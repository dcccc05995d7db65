//! Shared fixtures: an engine over in-memory collaborators at a fixed
//! instant, plus direct inserts that bypass the state machines.

#![allow(dead_code)]

use std::sync::Arc;

use nexus_core::{Access, AccountId, ChainId, SegmentId, Timestamp, UserRole};
use nexus_fabric::{
    Collaborators, Fabric, FabricationConfig, FixedClock, MemoryGateway, MemoryWaveformStore,
    PersistenceGateway, RecordingDispatcher, RecordingNotifier,
};
use nexus_state::{
    BindingTarget, Chain, ChainBinding, ChainFields, ChainState, Segment, SegmentFields,
    SegmentState,
};
use uuid::Uuid;

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

pub struct Harness {
    pub fabric: Fabric,
    pub gateway: MemoryGateway,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub waveforms: Arc<MemoryWaveformStore>,
    pub clock: Arc<FixedClock>,
    pub account: AccountId,
}

impl Harness {
    pub fn new(now: &str) -> Self {
        Self::build(now, FabricationConfig::default(), |g| {
            Arc::new(g) as Arc<dyn PersistenceGateway>
        })
    }

    /// `wrap` decides what gateway the engine sees; the harness keeps direct
    /// access to the underlying tables.
    pub fn build(
        now: &str,
        config: FabricationConfig,
        wrap: impl FnOnce(MemoryGateway) -> Arc<dyn PersistenceGateway>,
    ) -> Self {
        let gateway = MemoryGateway::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let waveforms = Arc::new(MemoryWaveformStore::new());
        let clock = Arc::new(FixedClock::new(ts(now)));
        let fabric = Fabric::new(
            Collaborators {
                gateway: wrap(gateway.clone()),
                dispatcher: dispatcher.clone(),
                notifier: notifier.clone(),
                waveforms: waveforms.clone(),
                clock: clock.clone(),
            },
            config,
        );
        Self {
            fabric,
            gateway,
            dispatcher,
            notifier,
            waveforms,
            clock,
            account: AccountId::new(),
        }
    }

    pub fn internal(&self) -> Access {
        Access::internal()
    }

    pub fn engineer(&self) -> Access {
        Access::new([UserRole::Engineer], [self.account])
    }

    pub fn artist(&self) -> Access {
        Access::new([UserRole::Artist], [self.account])
    }

    pub fn member(&self) -> Access {
        Access::new([UserRole::User], [self.account])
    }

    pub fn stranger(&self) -> Access {
        Access::new([UserRole::Engineer], [AccountId::new()])
    }

    /// Store a Production chain in `state` without going through validation.
    pub fn insert_chain(
        &self,
        state: ChainState,
        start_at: &str,
        stop_at: Option<&str>,
        embed_key: Option<&str>,
    ) -> Chain {
        let mut fields =
            ChainFields::production(self.account, "Test Print #1", ts(start_at)).with_state(state);
        fields.stop_at = stop_at.map(ts);
        fields.embed_key = embed_key.map(str::to_string);
        let chain = fields.into_chain(ChainId::new()).unwrap();
        self.gateway.insert_chain(&chain).unwrap();
        chain
    }

    pub fn bind_library(&self, chain_id: ChainId) -> ChainBinding {
        let binding = ChainBinding::new(chain_id, BindingTarget::Library(Uuid::new_v4()));
        self.gateway.insert_binding(&binding).unwrap();
        binding
    }

    /// Store a segment directly, bypassing continuity checks.
    pub fn insert_segment(
        &self,
        chain_id: ChainId,
        offset: u64,
        state: SegmentState,
        begin_at: &str,
        end_at: Option<&str>,
    ) -> Segment {
        let mut fields = SegmentFields::planned(chain_id, offset, ts(begin_at)).with_state(state);
        fields.end_at = end_at.map(ts);
        fields.key = Some("E minor".into());
        fields.total = Some(64);
        fields.density = Some(0.41);
        fields.tempo = Some(120.0);
        fields.waveform_key = Some(format!("chains-{chain_id}-segments-{offset}.wav"));
        let segment = fields.into_segment(SegmentId::new()).unwrap();
        assert!(self.gateway.insert_segment(&segment).unwrap());
        segment
    }

    pub fn chain(&self, id: ChainId) -> Chain {
        self.gateway.read_chain(id).unwrap().unwrap()
    }

    pub fn segments(&self, chain_id: ChainId) -> Vec<Segment> {
        self.gateway.read_segments(chain_id, 0, usize::MAX).unwrap()
    }
}

/// Offsets are exactly `0..n-1` and at most one segment is open-ended.
pub fn assert_continuous(segments: &[Segment]) {
    for (i, s) in segments.iter().enumerate() {
        assert_eq!(s.offset, i as u64, "offset gap or duplicate at position {i}");
    }
    let open = segments.iter().filter(|s| s.end_at.is_none()).count();
    assert!(open <= 1, "{open} open-ended segments");
    for pair in segments.windows(2) {
        if let Some(end) = pair[0].end_at {
            assert_eq!(
                pair[1].begin_at,
                end,
                "segment {} does not start where {} ends",
                pair[1].offset,
                pair[0].offset
            );
        }
    }
}
