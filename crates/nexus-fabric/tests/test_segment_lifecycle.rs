//! # Segment Lifecycle
//!
//! Creation continuity rules, worker-only mutation, immutable position
//! fields and waveform cleanup.

mod common;

use common::{ts, Harness};
use nexus_core::{ChainId, NexusError, SegmentId};
use nexus_state::{ChainState, SegmentFields, SegmentState};

const NOW: &str = "2014-08-12T12:00:00Z";

fn setup() -> (Harness, ChainId) {
    let h = Harness::new(NOW);
    let chain = h.insert_chain(
        ChainState::Fabricate,
        "2014-08-12T12:00:00Z",
        None,
        Some("coolair"),
    );
    (h, chain.id)
}

#[test]
fn create_forces_planned() {
    let (h, chain_id) = setup();
    let fields = SegmentFields::planned(chain_id, 0, ts(NOW)).with_state(SegmentState::Dubbed);
    let segment = h.fabric.segments.create(&h.internal(), fields).unwrap();
    assert_eq!(segment.state, SegmentState::Planned);
    assert_eq!(segment.offset, 0);
}

#[test]
fn create_requires_top_level() {
    let (h, chain_id) = setup();
    let err = h
        .fabric
        .segments
        .create(&h.engineer(), SegmentFields::planned(chain_id, 0, ts(NOW)))
        .unwrap_err();
    assert!(matches!(err, NexusError::Authorization(_)));
}

#[test]
fn create_in_missing_chain_is_not_found() {
    let (h, _) = setup();
    let err = h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(ChainId::new(), 0, ts(NOW)))
        .unwrap_err();
    assert!(matches!(err, NexusError::NotFound(_)));
}

#[test]
fn create_rejects_same_offset() {
    let (h, chain_id) = setup();
    h.insert_segment(chain_id, 0, SegmentState::Dubbed, NOW, Some("2014-08-12T12:00:30Z"));
    let err = h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(chain_id, 0, ts(NOW)))
        .unwrap_err();
    assert_eq!(err, NexusError::BusinessRule("Found Segment at same offset in Chain".into()));
}

#[test]
fn create_rejects_gaps() {
    let (h, chain_id) = setup();
    let err = h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(chain_id, 1, ts(NOW)))
        .unwrap_err();
    assert!(matches!(err, NexusError::BusinessRule(_)));

    h.insert_segment(chain_id, 0, SegmentState::Dubbed, NOW, Some("2014-08-12T12:00:30Z"));
    let err = h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(chain_id, 2, ts("2014-08-12T12:00:30Z")))
        .unwrap_err();
    assert!(matches!(err, NexusError::BusinessRule(_)));
    assert!(h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(chain_id, 1, ts("2014-08-12T12:00:30Z")))
        .is_ok());
}

#[test]
fn create_rejects_second_open_head() {
    let (h, chain_id) = setup();
    h.insert_segment(chain_id, 0, SegmentState::Crafting, NOW, None);
    let err = h
        .fabric
        .segments
        .create(&h.internal(), SegmentFields::planned(chain_id, 1, ts("2014-08-12T12:00:30Z")))
        .unwrap_err();
    assert_eq!(err, NexusError::BusinessRule("Chain already has an open-ended Segment".into()));
    assert_eq!(h.segments(chain_id).len(), 1);
}

#[test]
fn worker_walks_segment_to_dubbed() {
    let (h, chain_id) = setup();
    let access = h.internal();
    let segment = h
        .fabric
        .segments
        .create(&access, SegmentFields::planned(chain_id, 0, ts(NOW)))
        .unwrap();

    h.fabric.segments.update_state(&access, segment.id, SegmentState::Crafting).unwrap();
    let mut crafted = segment
        .to_fields()
        .with_state(SegmentState::Crafted)
        .with_end_at(ts("2014-08-12T12:00:32Z"));
    crafted.key = Some("A major".into());
    crafted.tempo = Some(120.0);
    let crafted = h.fabric.segments.transition(&access, segment.id, crafted).unwrap();
    assert_eq!(crafted.end_at, Some(ts("2014-08-12T12:00:32Z")));

    h.fabric.segments.update_state(&access, segment.id, SegmentState::Dubbing).unwrap();
    let dubbed = h.fabric.segments.update_state(&access, segment.id, SegmentState::Dubbed).unwrap();
    assert_eq!(dubbed.state, SegmentState::Dubbed);
    assert_eq!(dubbed.key.as_deref(), Some("A major"));

    let err = h
        .fabric
        .segments
        .update_state(&access, segment.id, SegmentState::Planned)
        .unwrap_err();
    assert!(matches!(err, NexusError::IllegalTransition { kind: "Segment", .. }));
}

#[test]
fn chain_and_offset_are_immutable() {
    let (h, chain_id) = setup();
    let segment = h.insert_segment(chain_id, 0, SegmentState::Planned, NOW, None);

    let mut fields = segment.to_fields();
    fields.chain_id = Some(ChainId::new());
    let err = h.fabric.segments.transition(&h.internal(), segment.id, fields).unwrap_err();
    assert_eq!(err, NexusError::BusinessRule("cannot change chainId of a segment".into()));

    let mut fields = segment.to_fields();
    fields.offset = 7;
    let err = h.fabric.segments.transition(&h.internal(), segment.id, fields).unwrap_err();
    assert!(matches!(err, NexusError::BusinessRule(_)));
}

#[test]
fn closed_segment_cannot_reopen() {
    let (h, chain_id) = setup();
    let segment = h.insert_segment(
        chain_id,
        0,
        SegmentState::Crafted,
        NOW,
        Some("2014-08-12T12:00:30Z"),
    );
    let mut fields = segment.to_fields();
    fields.end_at = None;
    let err = h.fabric.segments.transition(&h.internal(), segment.id, fields).unwrap_err();
    assert!(matches!(err, NexusError::BusinessRule(_)));
}

#[test]
fn transition_of_missing_segment_is_not_found() {
    let (h, chain_id) = setup();
    let fields = SegmentFields::planned(chain_id, 0, ts(NOW));
    let err = h.fabric.segments.transition(&h.internal(), SegmentId::new(), fields).unwrap_err();
    assert!(matches!(err, NexusError::NotFound(_)));
}

#[test]
fn destroy_deletes_waveform() {
    let (h, chain_id) = setup();
    let segment = h.insert_segment(
        chain_id,
        0,
        SegmentState::Dubbed,
        NOW,
        Some("2014-08-12T12:00:30Z"),
    );
    let key = segment.waveform_key.clone().unwrap();
    h.waveforms.put(key.clone());

    h.fabric.segments.destroy(&h.internal(), segment.id).unwrap();
    assert!(!h.waveforms.contains(&key));
    assert_eq!(h.waveforms.deleted(), vec![key]);
    assert!(h.segments(chain_id).is_empty());
}

#[test]
fn destroy_without_waveform_skips_store() {
    let (h, chain_id) = setup();
    let fields = SegmentFields::planned(chain_id, 0, ts(NOW));
    let segment = h.fabric.segments.create(&h.internal(), fields).unwrap();
    h.fabric.segments.destroy(&h.internal(), segment.id).unwrap();
    assert!(h.waveforms.deleted().is_empty());
}

// ─── Reads ───────────────────────────────────────────────────────────

#[test]
fn reads_by_position_and_state() {
    let (h, chain_id) = setup();
    h.insert_segment(
        chain_id,
        0,
        SegmentState::Dubbed,
        "2014-08-12T12:00:00Z",
        Some("2014-08-12T12:00:30Z"),
    );
    let s1 = h.insert_segment(
        chain_id,
        1,
        SegmentState::Crafted,
        "2014-08-12T12:00:30Z",
        Some("2014-08-12T12:01:00Z"),
    );
    let s2 = h.insert_segment(chain_id, 2, SegmentState::Crafted, "2014-08-12T12:01:00Z", None);
    let access = h.internal();

    assert_eq!(h.fabric.segments.read_at_offset(&access, chain_id, 1).unwrap().id, s1.id);
    assert!(matches!(
        h.fabric.segments.read_at_offset(&access, chain_id, 9),
        Err(NexusError::NotFound(_))
    ));

    let first_crafted = h
        .fabric
        .segments
        .read_one_in_state(&access, chain_id, SegmentState::Crafted, ts("2014-08-12T12:01:00Z"))
        .unwrap();
    assert_eq!(first_crafted.id, s1.id);
    assert!(h
        .fabric
        .segments
        .read_one_in_state(&access, chain_id, SegmentState::Crafted, ts("2014-08-12T12:00:29Z"))
        .is_err());

    let crafted = h
        .fabric
        .segments
        .read_many_in_state(&access, chain_id, SegmentState::Crafted)
        .unwrap();
    assert_eq!(crafted.len(), 2);
    assert_eq!(
        h.fabric.segments.read_last_segment(&h.member(), chain_id).unwrap().unwrap().id,
        s2.id
    );
    assert_eq!(
        h.fabric.segments.read_last_dubbed_segment(&access, chain_id).unwrap().unwrap().offset,
        0
    );
}

#[test]
fn read_many_is_scoped_and_ordered() {
    let (h, chain_id) = setup();
    h.insert_segment(
        chain_id,
        0,
        SegmentState::Dubbed,
        "2014-08-12T12:00:00Z",
        Some("2014-08-12T12:00:30Z"),
    );
    h.insert_segment(chain_id, 1, SegmentState::Planned, "2014-08-12T12:00:30Z", None);

    let offsets: Vec<u64> = h
        .fabric
        .segments
        .read_many(&h.member(), chain_id)
        .unwrap()
        .iter()
        .map(|s| s.offset)
        .collect();
    assert_eq!(offsets, vec![0, 1]);
    assert_eq!(h.fabric.segments.read_many_from_offset(&h.member(), chain_id, 1).unwrap().len(), 1);
    assert!(matches!(
        h.fabric.segments.read_many(&h.stranger(), chain_id),
        Err(NexusError::NotFound(_))
    ));
    let one = h.fabric.segments.read_many(&h.member(), chain_id).unwrap()[1].clone();
    assert!(h.fabric.segments.read_one(&h.stranger(), one.id).is_err());
    assert_eq!(h.fabric.segments.read_one(&h.member(), one.id).unwrap(), one);
}

#[test]
fn read_by_embed_key_is_public() {
    let (h, chain_id) = setup();
    h.insert_segment(
        chain_id,
        0,
        SegmentState::Dubbed,
        "2014-08-12T12:00:00Z",
        Some("2014-08-12T12:00:30Z"),
    );
    h.insert_segment(
        chain_id,
        1,
        SegmentState::Dubbed,
        "2014-08-12T12:00:30Z",
        Some("2014-08-12T12:01:00Z"),
    );
    assert_eq!(h.fabric.segments.read_many_by_embed_key("CoolAir", 0).unwrap().len(), 2);
    assert_eq!(h.fabric.segments.read_many_by_embed_key("coolair", 1).unwrap().len(), 1);
    assert!(matches!(
        h.fabric.segments.read_many_by_embed_key("unknown", 0),
        Err(NexusError::NotFound(_))
    ));
}

#[test]
fn read_limit_caps_lists() {
    let h = Harness::build(
        NOW,
        nexus_fabric::FabricationConfig {
            segment_read_limit: 2,
            ..Default::default()
        },
        |g| std::sync::Arc::new(g) as std::sync::Arc<dyn nexus_fabric::PersistenceGateway>,
    );
    let chain = h.insert_chain(ChainState::Fabricate, NOW, None, None);
    for offset in 0..4u64 {
        let begin = ts(NOW).plus_seconds(offset as i64 * 30).unwrap();
        let end = begin.plus_seconds(30).unwrap();
        h.insert_segment(
            chain.id,
            offset,
            SegmentState::Dubbed,
            &begin.to_string(),
            Some(&end.to_string()),
        );
    }
    assert_eq!(h.fabric.segments.read_many(&h.member(), chain.id).unwrap().len(), 2);
}
