//! Bus arbitration
//!
//! One [`BusArbiter`] per physical bus number serializes multi-step
//! transactions. Acquisition is tried immediately, then retried once with
//! a blocking wait bounded by the configured timeout. The lock is released
//! on every exit path, including panics inside the transaction, because
//! ownership is held by a [`BusLease`] guard.
//!
//! ```text
//!   UNLOCKED ──acquire──▶ LOCKED ──lease dropped──▶ UNLOCKED
//!      ▲                                               │
//!      └───────────────────────────────────────────────┘
//! ```
//!
//! Threads cannot be interrupted from the outside, so waking waiters is
//! explicit: [`BusArbiter::interrupt`] fails current waiters and
//! [`BusRegistry::shutdown`] fails current and future ones.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hwio_hal::BusError;
use parking_lot::{Condvar, Mutex};

use crate::error::Result;
use crate::properties::Properties;

/// Default acquisition timeout
pub const DEFAULT_BUS_TIMEOUT: Duration = Duration::from_millis(1000);

/// Property holding the acquisition timeout in milliseconds
pub const BUS_TIMEOUT_PROPERTY: &str = "hwio.i2c.lock-timeout";

/// Property selecting FIFO (`true`) or barging (`false`) acquisition
pub const BUS_FAIR_PROPERTY: &str = "hwio.i2c.fair";

/// Arbiter configuration shared by every bus of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSettings {
    /// How long the blocking retry waits
    pub timeout: Duration,
    /// Grant the lock in arrival order
    pub fair: bool,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_BUS_TIMEOUT,
            fair: true,
        }
    }
}

impl BusSettings {
    /// Apply `hwio.i2c.*` overrides from context properties
    pub fn with_properties(mut self, props: &Properties) -> Result<Self> {
        if let Some(raw) = props.get(BUS_TIMEOUT_PROPERTY) {
            let ms: u64 = raw.trim().parse().map_err(|e| {
                crate::Error::invalid_property(BUS_TIMEOUT_PROPERTY, format!("'{raw}': {e}"))
            })?;
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = props.get(BUS_FAIR_PROPERTY) {
            self.fair = raw.trim().parse().map_err(|e| {
                crate::Error::invalid_property(BUS_FAIR_PROPERTY, format!("'{raw}': {e}"))
            })?;
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    /// Tickets of blocked waiters, oldest first
    queue: VecDeque<u64>,
    next_ticket: u64,
    /// Bumped by `interrupt`; waiters that saw an older value give up
    epoch: u64,
    closed: bool,
}

impl LockState {
    fn leave_queue(&mut self, ticket: u64) {
        self.queue.retain(|t| *t != ticket);
    }
}

/// Mutual exclusion for one physical bus
#[derive(Debug)]
pub struct BusArbiter {
    bus: u8,
    settings: BusSettings,
    state: Mutex<LockState>,
    released: Condvar,
}

impl BusArbiter {
    pub fn new(bus: u8, settings: BusSettings) -> Self {
        Self {
            bus,
            settings,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub fn is_fair(&self) -> bool {
        self.settings.fair
    }

    /// Check if a transaction currently owns the bus
    pub fn is_locked(&self) -> bool {
        self.state.lock().held
    }

    /// Number of threads blocked waiting for the bus
    pub fn waiters(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Run `action` while owning the bus
    ///
    /// Fails with [`BusError::Timeout`] if the lock is not acquired within
    /// the timeout and with [`BusError::Interrupted`] if the wait is
    /// interrupted. Errors returned by `action` pass through unchanged.
    pub fn execute<T, E, F>(&self, action: F) -> core::result::Result<T, E>
    where
        F: FnOnce() -> core::result::Result<T, E>,
        E: From<BusError>,
    {
        let _lease = self.acquire()?;
        action()
    }

    /// Acquire the bus, returning a guard that releases it on drop
    pub fn acquire(&self) -> core::result::Result<BusLease<'_>, BusError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Interrupted { bus: self.bus });
        }

        // Immediate attempt; fair mode never overtakes queued waiters.
        if !state.held && (!self.settings.fair || state.queue.is_empty()) {
            state.held = true;
            return Ok(BusLease { arbiter: self });
        }

        tracing::trace!(bus = self.bus, waiters = state.queue.len(), "bus busy, waiting");

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);
        let epoch = state.epoch;
        // Timeouts too large for an `Instant` wait without a deadline
        let deadline = Instant::now().checked_add(self.settings.timeout);
        let mut timed_out = false;

        loop {
            if state.closed || state.epoch != epoch {
                state.leave_queue(ticket);
                self.released.notify_all();
                tracing::debug!(bus = self.bus, "bus wait interrupted");
                return Err(BusError::Interrupted { bus: self.bus });
            }

            let my_turn = !self.settings.fair || state.queue.front() == Some(&ticket);
            if !state.held && my_turn {
                state.leave_queue(ticket);
                state.held = true;
                return Ok(BusLease { arbiter: self });
            }

            if timed_out {
                state.leave_queue(ticket);
                // The head may have changed; let the next waiter re-check.
                self.released.notify_all();
                tracing::debug!(
                    bus = self.bus,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "bus lock timed out"
                );
                return Err(BusError::Timeout {
                    bus: self.bus,
                    timeout: self.settings.timeout,
                });
            }

            timed_out = match deadline {
                Some(deadline) => self.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.released.wait(&mut state);
                    false
                }
            };
        }
    }

    /// Wake every current waiter with [`BusError::Interrupted`]
    ///
    /// The current owner is unaffected and later acquisitions proceed
    /// normally.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        self.released.notify_all();
    }

    /// Interrupt waiters and refuse all later acquisitions
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.epoch += 1;
        self.released.notify_all();
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.held = false;
        self.released.notify_all();
    }
}

/// Ownership of a bus; dropping it releases the lock
#[derive(Debug)]
#[must_use = "the bus is released as soon as the lease is dropped"]
pub struct BusLease<'a> {
    arbiter: &'a BusArbiter,
}

impl BusLease<'_> {
    pub fn bus(&self) -> u8 {
        self.arbiter.bus
    }
}

impl Drop for BusLease<'_> {
    fn drop(&mut self) {
        self.arbiter.release();
    }
}

/// Lazily created arbiters, one per bus number
#[derive(Debug, Default)]
pub struct BusRegistry {
    settings: BusSettings,
    arbiters: Mutex<HashMap<u8, Arc<BusArbiter>>>,
    closed: Mutex<bool>,
}

impl BusRegistry {
    pub fn new(settings: BusSettings) -> Self {
        Self {
            settings,
            arbiters: Mutex::new(HashMap::new()),
            closed: Mutex::new(false),
        }
    }

    pub fn settings(&self) -> BusSettings {
        self.settings
    }

    /// Arbiter for `bus`, created on first use
    pub fn arbiter(&self, bus: u8) -> Arc<BusArbiter> {
        let mut arbiters = self.arbiters.lock();
        Arc::clone(arbiters.entry(bus).or_insert_with(|| {
            tracing::debug!(
                bus,
                timeout_ms = self.settings.timeout.as_millis() as u64,
                fair = self.settings.fair,
                "bus arbiter created"
            );
            let arbiter = BusArbiter::new(bus, self.settings);
            if *self.closed.lock() {
                arbiter.close();
            }
            Arc::new(arbiter)
        }))
    }

    /// Run `action` while owning `bus`
    pub fn execute<T, E, F>(&self, bus: u8, action: F) -> core::result::Result<T, E>
    where
        F: FnOnce() -> core::result::Result<T, E>,
        E: From<BusError>,
    {
        self.arbiter(bus).execute(action)
    }

    /// Bus numbers with an arbiter
    pub fn buses(&self) -> Vec<u8> {
        let mut buses: Vec<u8> = self.arbiters.lock().keys().copied().collect();
        buses.sort_unstable();
        buses
    }

    /// Close every arbiter, now and for buses first used later
    pub fn shutdown(&self) {
        let arbiters = self.arbiters.lock();
        *self.closed.lock() = true;
        for arbiter in arbiters.values() {
            arbiter.close();
        }
        tracing::debug!(buses = arbiters.len(), "bus registry shut down");
    }
}
