//! # Chain Lifecycle
//!
//! A chain is a continuous production assembled from segments. Its state
//! moves through the table below; every edge not listed fails with
//! `IllegalTransition`.
//!
//! ```text
//! Draft     ──▶ Ready, Erase
//! Ready     ──▶ Draft, Fabricate
//! Fabricate ──▶ Complete, Failed
//! Complete  ──▶ Erase
//! Failed    ──▶ Erase
//! Erase     (terminal)
//! ```
//!
//! `Erase` is terminal. `Ready -> Draft` lets an operator pull a chain back
//! for rebinding before fabrication starts.

use serde::{Deserialize, Serialize};

use nexus_core::{to_embed_key, AccountId, ChainId, NexusError, NexusResult, Timestamp};

use crate::transition::LifecycleState;

/// Production runs indefinitely and may be public; Preview is a bounded
/// private audition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainType {
    /// Long-running, optionally publicly addressed by embed key.
    Production,
    /// Bounded audition with a mandatory stop time.
    Preview,
}

impl ChainType {
    /// Canonical type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Preview => "Preview",
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Chain lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainState {
    /// Under construction; content bindings may change.
    Draft,
    /// Bound and waiting to start.
    Ready,
    /// Workers are producing segments.
    Fabricate,
    /// Stop time reached and the final segment is dubbed.
    Complete,
    /// Abandoned, usually superseded by a revival.
    Failed,
    /// Scheduled for deletion.
    Erase,
}

impl LifecycleState for ChainState {
    const KIND: &'static str = "Chain";

    const ALL: &'static [Self] = &[
        Self::Draft,
        Self::Ready,
        Self::Fabricate,
        Self::Complete,
        Self::Failed,
        Self::Erase,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Ready => "Ready",
            Self::Fabricate => "Fabricate",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Erase => "Erase",
        }
    }

    fn allowed_targets(&self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Ready, Self::Erase],
            Self::Ready => &[Self::Draft, Self::Fabricate],
            Self::Fabricate => &[Self::Failed, Self::Complete],
            Self::Complete => &[Self::Erase],
            Self::Failed => &[Self::Erase],
            Self::Erase => &[],
        }
    }
}

impl ChainState {
    /// Whether no further transition leaves this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Erase)
    }
}

impl std::fmt::Display for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    pub account_id: AccountId,
    pub name: String,
    #[serde(rename = "type")]
    pub chain_type: ChainType,
    pub state: ChainState,
    pub start_at: Timestamp,
    pub stop_at: Option<Timestamp>,
    pub embed_key: Option<String>,
    /// Free-form configuration text, carried verbatim.
    #[serde(default)]
    pub config: String,
}

impl Chain {
    /// The editable fields of this chain, for read-modify-write updates.
    pub fn to_fields(&self) -> ChainFields {
        ChainFields {
            account_id: Some(self.account_id),
            name: self.name.clone(),
            chain_type: self.chain_type,
            state: self.state,
            start_at: Some(self.start_at),
            stop_at: self.stop_at,
            embed_key: self.embed_key.clone(),
            config: self.config.clone(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.chain_type == ChainType::Production
    }
}

/// Caller-supplied chain payload for create and update.
///
/// Optional members are the ones a caller may omit; [`ChainFields::validate()`]
/// decides which omissions are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFields {
    pub account_id: Option<AccountId>,
    pub name: String,
    #[serde(rename = "type")]
    pub chain_type: ChainType,
    pub state: ChainState,
    pub start_at: Option<Timestamp>,
    pub stop_at: Option<Timestamp>,
    pub embed_key: Option<String>,
    #[serde(default)]
    pub config: String,
}

impl ChainFields {
    /// A Production payload in `Draft`.
    pub fn production(account_id: AccountId, name: impl Into<String>, start_at: Timestamp) -> Self {
        Self {
            account_id: Some(account_id),
            name: name.into(),
            chain_type: ChainType::Production,
            state: ChainState::Draft,
            start_at: Some(start_at),
            stop_at: None,
            embed_key: None,
            config: String::new(),
        }
    }

    /// A Preview payload in `Draft`. Start and stop are assigned on create.
    pub fn preview(account_id: AccountId, name: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id),
            name: name.into(),
            chain_type: ChainType::Preview,
            state: ChainState::Draft,
            start_at: None,
            stop_at: None,
            embed_key: None,
            config: String::new(),
        }
    }

    pub fn with_state(mut self, state: ChainState) -> Self {
        self.state = state;
        self
    }

    pub fn with_stop_at(mut self, stop_at: Timestamp) -> Self {
        self.stop_at = Some(stop_at);
        self
    }

    pub fn with_embed_key(mut self, embed_key: impl Into<String>) -> Self {
        self.embed_key = Some(embed_key.into());
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Replace the embed key with its lower-scored form; blank keys become `None`.
    pub fn normalize_embed_key(&mut self) {
        self.embed_key = self.embed_key.as_deref().and_then(to_embed_key);
    }

    /// Check required fields.
    ///
    /// # Errors
    ///
    /// [`NexusError::Validation`] naming the first missing field.
    pub fn validate(&self) -> NexusResult<()> {
        if self.account_id.is_none() {
            return Err(NexusError::Validation("Account ID is required.".into()));
        }
        if self.name.trim().is_empty() {
            return Err(NexusError::Validation("Name is required.".into()));
        }
        if self.start_at.is_none() {
            return Err(NexusError::Validation("Start-at is required.".into()));
        }
        if self.chain_type != ChainType::Production && self.stop_at.is_none() {
            return Err(NexusError::Validation(format!(
                "Stop-at is required for a {} chain.",
                self.chain_type
            )));
        }
        Ok(())
    }

    /// Materialize a chain record with the given id.
    ///
    /// Validates first, so the required fields are known to be present.
    pub fn into_chain(self, id: ChainId) -> NexusResult<Chain> {
        self.validate()?;
        let (Some(account_id), Some(start_at)) = (self.account_id, self.start_at) else {
            return Err(NexusError::Validation("Account ID and Start-at are required.".into()));
        };
        Ok(Chain {
            id,
            account_id,
            name: self.name,
            chain_type: self.chain_type,
            state: self.state,
            start_at,
            stop_at: self.stop_at,
            embed_key: self.embed_key,
            config: self.config,
        })
    }
}
