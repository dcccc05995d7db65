//! # nexus-core: Foundational Types for the Fabrication Nexus
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on:
//!
//! 1. **Newtype identifiers.** `ChainId`, `SegmentId`, `AccountId`,
//!    `BindingId`. You cannot pass a segment id where a chain id is
//!    expected.
//!
//! 2. **`Timestamp`.** UTC-only instants at microsecond precision, the
//!    resolution the persistence layer stores.
//!
//! 3. **Access control contract.** The `AccessControl` trait is what the
//!    core consumes from the authorization layer; `Access` is the concrete
//!    role/account set used by workers and tests.
//!
//! 4. **`NexusError`.** The single error taxonomy (Validation, NotFound,
//!    Authorization, IllegalTransition, BusinessRule, Conflict, Storage) with
//!    its HTTP status mapping.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `nexus-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod access;
pub mod error;
pub mod identity;
pub mod temporal;
pub mod text;

pub use access::{Access, AccessControl, UserRole};
pub use error::{NexusError, NexusResult};
pub use identity::{AccountId, BindingId, ChainId, SegmentId};
pub use temporal::Timestamp;
pub use text::{to_embed_key, to_lower_scored};
