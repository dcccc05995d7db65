//! # nexus-cli: Command-Line Driver for the Chain Nexus
//!
//! Runs the fabrication engine over in-memory collaborators.
//!
//! ## Subcommands
//!
//! - `nexus simulate`: one production from bootstrap to completion on a
//!   simulated clock, optionally stalling it to exercise revival.
//! - `nexus run`: a wall-clock worker loop with a planner tick and a
//!   revival tick, until interrupted.
//!
//! Craft and dub work is stood in for by [`render_segment`], which closes a
//! planned segment and walks it to `Dubbed` immediately.

pub mod run;
pub mod simulate;

use anyhow::{Context, Result};
use nexus_core::{Access, AccessControl, Timestamp};
use nexus_fabric::Fabric;
use nexus_state::{BindingTarget, Chain, ChainFields, ChainState, Segment, SegmentState};
use uuid::Uuid;

/// What to fabricate.
#[derive(Debug, Clone)]
pub struct ProductionPlan {
    pub name: String,
    pub start_at: Timestamp,
    pub stop_at: Option<Timestamp>,
    pub embed_key: Option<String>,
}

/// Create a Production chain, bind it to a library, and start fabrication.
pub fn bootstrap_chain(fabric: &Fabric, owner: &Access, plan: &ProductionPlan) -> Result<Chain> {
    let account = owner
        .account_ids()
        .into_iter()
        .next()
        .context("owner access carries no account")?;
    let mut fields = ChainFields::production(account, plan.name.clone(), plan.start_at);
    fields.stop_at = plan.stop_at;
    fields.embed_key = plan.embed_key.clone();

    let chain = fabric.chains.create(owner, fields).context("create chain")?;
    fabric
        .chains
        .bind(owner, chain.id, BindingTarget::Library(Uuid::new_v4()))
        .context("bind library")?;
    fabric
        .chains
        .update_state(owner, chain.id, ChainState::Ready)
        .context("ready chain")?;
    let chain = fabric
        .chains
        .update_state(owner, chain.id, ChainState::Fabricate)
        .context("start fabrication")?;
    tracing::info!(chain_id = %chain.id, embed_key = ?chain.embed_key, "bootstrapped chain");
    Ok(chain)
}

/// Close a planned segment `length_seconds` after it begins and take it
/// through craft and dub.
pub fn render_segment(
    fabric: &Fabric,
    access: &dyn AccessControl,
    segment: &Segment,
    length_seconds: i64,
) -> Result<Segment> {
    let segments = &fabric.segments;
    let mut fields = segment
        .to_fields()
        .with_state(SegmentState::Crafting)
        .with_end_at(segment.begin_at.plus_seconds(length_seconds)?)
        .with_waveform_key(format!("{}-{}.wav", segment.chain_id, segment.offset));
    fields.key = Some("C major".into());
    fields.total = Some(32);
    fields.density = Some(0.6);
    fields.tempo = Some(120.0);
    segments
        .transition(access, segment.id, fields)
        .with_context(|| format!("craft segment {}", segment.offset))?;
    segments.update_state(access, segment.id, SegmentState::Crafted)?;
    segments.update_state(access, segment.id, SegmentState::Dubbing)?;
    let dubbed = segments
        .update_state(access, segment.id, SegmentState::Dubbed)
        .with_context(|| format!("dub segment {}", segment.offset))?;
    tracing::debug!(chain_id = %dubbed.chain_id, offset = dubbed.offset, "rendered segment");
    Ok(dubbed)
}
