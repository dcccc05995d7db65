//! # Collaborator Contracts
//!
//! The outbound side of the state machines:
//!
//! - [`WorkDispatcher`] hears about lifecycle changes that start or stop
//!   background work for a chain.
//! - [`Notifier`] carries human-readable audit messages to the platform.
//! - [`WaveformStore`] removes rendered audio when a segment is destroyed.
//!
//! Each contract has a log-only implementation for running the engine
//! without external services and a recording implementation that keeps every
//! call in memory so callers can inspect what happened.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use nexus_core::{ChainId, NexusResult};
use nexus_state::Chain;

// ─── Work dispatch ───────────────────────────────────────────────────

/// Fire-and-forget notifications of chain lifecycle changes.
///
/// Called once per qualifying state change, after the change is persisted.
pub trait WorkDispatcher: Send + Sync {
    /// The chain entered `Fabricate`.
    fn start_chain_fabrication(&self, chain: &Chain);

    /// The chain left `Fabricate` for `Complete` or `Failed`.
    fn stop_chain_fabrication(&self, chain: &Chain);

    /// The chain entered `Erase`.
    fn start_chain_erase(&self, chain: &Chain);
}

/// One recorded dispatcher call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchEvent {
    StartFabrication(ChainId),
    StopFabrication(ChainId),
    StartErase(ChainId),
}

/// Dispatcher that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl WorkDispatcher for LogDispatcher {
    fn start_chain_fabrication(&self, chain: &Chain) {
        tracing::info!(chain_id = %chain.id, "start chain fabrication");
    }

    fn stop_chain_fabrication(&self, chain: &Chain) {
        tracing::info!(chain_id = %chain.id, state = %chain.state, "stop chain fabrication");
    }

    fn start_chain_erase(&self, chain: &Chain) {
        tracing::info!(chain_id = %chain.id, "start chain erase");
    }
}

/// Dispatcher that records every call.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far, oldest first.
    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }

    /// Calls concerning one chain.
    pub fn events_for(&self, chain_id: ChainId) -> Vec<DispatchEvent> {
        self.events
            .lock()
            .iter()
            .copied()
            .filter(|e| match e {
                DispatchEvent::StartFabrication(id)
                | DispatchEvent::StopFabrication(id)
                | DispatchEvent::StartErase(id) => *id == chain_id,
            })
            .collect()
    }
}

impl WorkDispatcher for RecordingDispatcher {
    fn start_chain_fabrication(&self, chain: &Chain) {
        self.events.lock().push(DispatchEvent::StartFabrication(chain.id));
    }

    fn stop_chain_fabrication(&self, chain: &Chain) {
        self.events.lock().push(DispatchEvent::StopFabrication(chain.id));
    }

    fn start_chain_erase(&self, chain: &Chain) {
        self.events.lock().push(DispatchEvent::StartErase(chain.id));
    }
}

// ─── Platform messages ───────────────────────────────────────────────

/// Severity of a platform message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        })
    }
}

/// Publishes audit messages.
pub trait Notifier: Send + Sync {
    fn publish(&self, level: MessageLevel, body: &str);
}

/// Notifier that writes messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, level: MessageLevel, body: &str) {
        match level {
            MessageLevel::Info => tracing::info!(%level, "{body}"),
            MessageLevel::Warning => tracing::warn!(%level, "{body}"),
            MessageLevel::Error => tracing::error!(%level, "{body}"),
        }
    }
}

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, level: MessageLevel, body: &str) {
        self.messages.lock().push((level, body.to_string()));
    }
}

// ─── Waveform storage ────────────────────────────────────────────────

/// Object storage holding rendered segment audio.
pub trait WaveformStore: Send + Sync {
    fn delete_waveform(&self, key: &str) -> NexusResult<()>;
}

/// Waveform store that tracks keys in memory.
#[derive(Debug, Default)]
pub struct MemoryWaveformStore {
    keys: Mutex<BTreeSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryWaveformStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored waveform under `key`.
    pub fn put(&self, key: impl Into<String>) {
        self.keys.lock().insert(key.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }

    /// Keys passed to `delete_waveform`, oldest first.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

impl WaveformStore for MemoryWaveformStore {
    fn delete_waveform(&self, key: &str) -> NexusResult<()> {
        self.keys.lock().remove(key);
        self.deleted.lock().push(key.to_string());
        tracing::debug!(waveform_key = key, "deleted waveform");
        Ok(())
    }
}
