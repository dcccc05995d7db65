//! Injectable time source. Every "now" the engine reads comes from a
//! [`Clock`], so planner and revival thresholds can be tested at fixed
//! instants.

use std::fmt;

use parking_lot::Mutex;

use nexus_core::{NexusResult, Timestamp};

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    pub fn advance_seconds(&self, secs: i64) -> NexusResult<()> {
        let mut now = self.now.lock();
        *now = now.plus_seconds(secs)?;
        Ok(())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
