//! # nexus-state: Chain and Segment Lifecycles
//!
//! Entity records and the closed state machines that govern them.
//!
//! ## State Machines
//!
//! - **Chain** (`chain.rs`): `Draft → Ready → Fabricate → Complete/Failed →
//!   Erase`, with `Ready → Draft` for rebinding.
//!
//! - **Segment** (`segment.rs`): `Planned → Crafting → Crafted → Dubbing →
//!   Dubbed`, with `Failed` reachable from the two working states.
//!
//! ## Design
//!
//! States are persisted, so they are runtime enums rather than typestates.
//! Each enum implements [`LifecycleState`], whose `allowed_targets()` is an
//! exhaustive `match`: adding a state without deciding its edges does not
//! compile. Re-applying the current state is always legal, which makes a
//! repeated worker write idempotent.
//!
//! Nothing here touches storage. Persistence, access checks and optimistic
//! writes live in `nexus-fabric`.

pub mod binding;
pub mod chain;
pub mod segment;
pub mod transition;

pub use binding::{BindingTarget, ChainBinding};
pub use chain::{Chain, ChainFields, ChainState, ChainType};
pub use segment::{Segment, SegmentFields, SegmentState};
pub use transition::{allowed, require_transition, LifecycleState};
