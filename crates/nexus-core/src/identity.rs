//! # Identifier Newtypes
//!
//! Type-level distinction between identifier namespaces. A `SegmentId`
//! cannot be handed to an operation that expects a `ChainId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Unique identifier for a Chain.
    ChainId,
    "chain"
);

uuid_newtype!(
    /// Unique identifier for a Segment.
    SegmentId,
    "segment"
);

uuid_newtype!(
    /// Unique identifier for the tenant account that owns chains.
    AccountId,
    "account"
);

uuid_newtype!(
    /// Unique identifier for a chain-to-content binding.
    BindingId,
    "binding"
);
