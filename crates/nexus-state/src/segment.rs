//! # Segment Lifecycle
//!
//! A segment is one contiguous time window of a chain, crafted and then
//! dubbed by external workers.
//!
//! ```text
//! Planned  ──▶ Crafting
//! Crafting ──▶ Crafted, Dubbing, Failed
//! Crafted  ──▶ Dubbing
//! Dubbing  ──▶ Dubbed, Failed
//! Dubbed   (terminal)
//! Failed   (terminal)
//! ```
//!
//! `Dubbed` and `Failed` are terminal. A crafting worker may hand straight
//! over to dubbing without stopping at `Crafted`.

use serde::{Deserialize, Serialize};

use nexus_core::{ChainId, NexusError, NexusResult, SegmentId, Timestamp};

use crate::transition::LifecycleState;

/// Segment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentState {
    Planned,
    Crafting,
    Crafted,
    Dubbing,
    Dubbed,
    Failed,
}

impl LifecycleState for SegmentState {
    const KIND: &'static str = "Segment";

    const ALL: &'static [Self] = &[
        Self::Planned,
        Self::Crafting,
        Self::Crafted,
        Self::Dubbing,
        Self::Dubbed,
        Self::Failed,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Crafting => "Crafting",
            Self::Crafted => "Crafted",
            Self::Dubbing => "Dubbing",
            Self::Dubbed => "Dubbed",
            Self::Failed => "Failed",
        }
    }

    fn allowed_targets(&self) -> &'static [Self] {
        match self {
            Self::Planned => &[Self::Crafting],
            Self::Crafting => &[Self::Crafted, Self::Dubbing, Self::Failed],
            Self::Crafted => &[Self::Dubbing],
            Self::Dubbing => &[Self::Dubbed, Self::Failed],
            Self::Dubbed => &[],
            Self::Failed => &[],
        }
    }
}

impl SegmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dubbed | Self::Failed)
    }
}

impl std::fmt::Display for SegmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub chain_id: ChainId,
    pub offset: u64,
    pub state: SegmentState,
    pub begin_at: Timestamp,
    /// `None` while the segment is the open head of its chain.
    pub end_at: Option<Timestamp>,
    pub waveform_key: Option<String>,
    /// Musical key chosen by the crafter.
    pub key: Option<String>,
    /// Length in beats.
    pub total: Option<u32>,
    pub density: Option<f64>,
    pub tempo: Option<f64>,
}

impl Segment {
    /// Whether this segment has no end yet.
    pub fn is_open_head(&self) -> bool {
        self.end_at.is_none()
    }

    pub fn to_fields(&self) -> SegmentFields {
        SegmentFields {
            chain_id: Some(self.chain_id),
            offset: self.offset,
            state: self.state,
            begin_at: Some(self.begin_at),
            end_at: self.end_at,
            waveform_key: self.waveform_key.clone(),
            key: self.key.clone(),
            total: self.total,
            density: self.density,
            tempo: self.tempo,
        }
    }
}

/// Caller-supplied segment payload for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFields {
    pub chain_id: Option<ChainId>,
    pub offset: u64,
    pub state: SegmentState,
    pub begin_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub waveform_key: Option<String>,
    pub key: Option<String>,
    pub total: Option<u32>,
    pub density: Option<f64>,
    pub tempo: Option<f64>,
}

impl SegmentFields {
    /// An open-ended `Planned` segment at `offset`, beginning at `begin_at`.
    pub fn planned(chain_id: ChainId, offset: u64, begin_at: Timestamp) -> Self {
        Self {
            chain_id: Some(chain_id),
            offset,
            state: SegmentState::Planned,
            begin_at: Some(begin_at),
            end_at: None,
            waveform_key: None,
            key: None,
            total: None,
            density: None,
            tempo: None,
        }
    }

    pub fn with_state(mut self, state: SegmentState) -> Self {
        self.state = state;
        self
    }

    pub fn with_end_at(mut self, end_at: Timestamp) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn with_waveform_key(mut self, waveform_key: impl Into<String>) -> Self {
        self.waveform_key = Some(waveform_key.into());
        self
    }

    /// Check required fields and window ordering.
    pub fn validate(&self) -> NexusResult<()> {
        if self.chain_id.is_none() {
            return Err(NexusError::Validation("Chain ID is required.".into()));
        }
        let Some(begin_at) = self.begin_at else {
            return Err(NexusError::Validation("Begin-at is required.".into()));
        };
        if let Some(end_at) = self.end_at {
            if end_at.is_before(&begin_at) {
                return Err(NexusError::Validation(format!(
                    "End-at {end_at} precedes begin-at {begin_at}."
                )));
            }
        }
        if let Some(density) = self.density {
            if !(0.0..=1.0).contains(&density) {
                return Err(NexusError::Validation(format!(
                    "Density {density} is outside 0..=1."
                )));
            }
        }
        Ok(())
    }

    /// Materialize a segment record with the given id.
    pub fn into_segment(self, id: SegmentId) -> NexusResult<Segment> {
        self.validate()?;
        let (Some(chain_id), Some(begin_at)) = (self.chain_id, self.begin_at) else {
            return Err(NexusError::Validation("Chain ID and Begin-at are required.".into()));
        };
        Ok(Segment {
            id,
            chain_id,
            offset: self.offset,
            state: self.state,
            begin_at,
            end_at: self.end_at,
            waveform_key: self.waveform_key,
            key: self.key,
            total: self.total,
            density: self.density,
            tempo: self.tempo,
        })
    }
}
