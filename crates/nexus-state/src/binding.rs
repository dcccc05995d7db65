//! Content bindings: the libraries, programs and instruments a chain draws
//! its material from. A chain needs at least one before it leaves `Draft`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nexus_core::{BindingId, ChainId};

/// The content source a binding points at. Target ids are opaque to the nexus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum BindingTarget {
    Library(Uuid),
    Program(Uuid),
    Instrument(Uuid),
}

impl std::fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Library(id) => write!(f, "library:{id}"),
            Self::Program(id) => write!(f, "program:{id}"),
            Self::Instrument(id) => write!(f, "instrument:{id}"),
        }
    }
}

/// One chain-to-content link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBinding {
    pub id: BindingId,
    pub chain_id: ChainId,
    pub target: BindingTarget,
}

impl ChainBinding {
    pub fn new(chain_id: ChainId, target: BindingTarget) -> Self {
        Self {
            id: BindingId::new(),
            chain_id,
            target,
        }
    }

    /// A fresh binding to the same target on another chain.
    pub fn clone_onto(&self, chain_id: ChainId) -> Self {
        Self::new(chain_id, self.target)
    }
}
