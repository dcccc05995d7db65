//! # nexus-fabric: Chain Fabrication Engine
//!
//! Drives chains from `Draft` to `Complete` by planning one segment at a
//! time, under any number of concurrent workers.
//!
//! ## Components
//!
//! - **`ChainStateMachine`** (`chains.rs`): validated chain changes,
//!   bindings, and revival of stalled chains.
//! - **`SegmentStateMachine`** (`segments.rs`): validated segment changes
//!   and the continuity rules on creation.
//! - **`SegmentContinuityPlanner`** (`planner.rs`): the next-segment decision
//!   (`CreateAt`, `Complete` or `Idle`).
//! - **`ChainRevivalMonitor`** (`revival.rs`): periodic stall detection.
//! - **`Fabric`** (`engine.rs`): wires the above over one set of
//!   collaborators and runs worker steps.
//!
//! ## Collaborators
//!
//! Storage, work dispatch, audit messages, waveform deletion and time are
//! injected as `Arc<dyn Trait>` (`gateway.rs`, `dispatch.rs`, `clock.rs`).
//! `MemoryGateway` (`store.rs`) is the in-process storage implementation.
//!
//! ## Concurrency
//!
//! The engine spawns no threads and holds no locks of its own. Mutual
//! exclusion between workers comes from conditional writes keyed on the
//! loaded state and from the unique `(chain, offset)` insert. The losing
//! worker gets `NexusError::Conflict` or a `BusinessRule` rejection.

pub mod chains;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod planner;
pub mod revival;
pub mod segments;
pub mod store;

pub use chains::ChainStateMachine;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, FabricationConfig};
pub use dispatch::{
    DispatchEvent, LogDispatcher, LogNotifier, MemoryWaveformStore, MessageLevel, Notifier,
    RecordingDispatcher, RecordingNotifier, WaveformStore, WorkDispatcher,
};
pub use engine::{Collaborators, Fabric, WorkOutcome};
pub use gateway::PersistenceGateway;
pub use planner::{SegmentContinuityPlanner, SegmentPlan};
pub use revival::ChainRevivalMonitor;
pub use segments::SegmentStateMachine;
pub use store::MemoryGateway;
