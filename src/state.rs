//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the configuration, the shared sampler, and the connection slot
//! accounting that decides when the sampler runs.
//!
//! SLOT ACCOUNTING
//! ===============
//! A slot is reserved as *pending* before the WebSocket upgrade and becomes
//! *connected* once the socket task runs. Both kinds count against
//! `max_clients`. The `SlotGuard` releases whichever kind it holds exactly
//! once when dropped, including when the upgrade never completes.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::protocol::ClientCounts;
use crate::services::procfs::ProcFs;
use crate::services::sampler::Sampler;
use crate::services::system_info;

// =============================================================================
// CLIENT SLOTS
// =============================================================================

#[derive(Debug, Default)]
struct SlotCounts {
    pending: usize,
    connected: usize,
}

/// Bounded pool of WebSocket connection slots.
#[derive(Clone)]
pub struct ClientSlots {
    counts: Arc<Mutex<SlotCounts>>,
    max: usize,
    sampler: Arc<Sampler>,
}

impl ClientSlots {
    #[must_use]
    pub fn new(max: usize, sampler: Arc<Sampler>) -> Self {
        Self { counts: Arc::new(Mutex::new(SlotCounts::default())), max, sampler }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotCounts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a pending slot, or `None` when the pool is full.
    #[must_use]
    pub fn try_reserve(&self) -> Option<SlotGuard> {
        let mut counts = self.lock();
        if counts.pending + counts.connected >= self.max {
            return None;
        }
        counts.pending += 1;
        Some(SlotGuard { slots: self.clone(), connected: false })
    }

    #[must_use]
    pub fn counts(&self) -> ClientCounts {
        ClientCounts { connected: self.lock().connected, max: self.max }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending
    }
}

/// Holds one slot; releases it on drop.
pub struct SlotGuard {
    slots: ClientSlots,
    connected: bool,
}

impl SlotGuard {
    /// Convert the pending slot into a connected one. Starts the sampler for
    /// the first connected client. Returns the new connected count.
    pub fn connect(&mut self) -> usize {
        if self.connected {
            return self.slots.counts().connected;
        }
        let mut counts = self.slots.lock();
        counts.pending = counts.pending.saturating_sub(1);
        counts.connected += 1;
        self.connected = true;
        if counts.connected == 1 {
            self.slots.sampler.start();
        }
        counts.connected
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut counts = self.slots.lock();
        if self.connected {
            counts.connected = counts.connected.saturating_sub(1);
            if counts.connected == 0 {
                self.slots.sampler.stop();
            }
        } else {
            counts.pending = counts.pending.saturating_sub(1);
        }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sampler: Arc<Sampler>,
    pub slots: ClientSlots,
    pub cpu_cores: u32,
    pub clk_tck: u64,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let sampler = Arc::new(Sampler::new(ProcFs::new(&config.proc_root), config.sample_interval));
        let slots = ClientSlots::new(config.max_clients, sampler.clone());
        Self {
            config: Arc::new(config),
            sampler,
            slots,
            cpu_cores: system_info::cpu_cores(),
            clk_tck: system_info::clock_ticks(),
        }
    }

    #[must_use]
    pub fn procfs(&self) -> &ProcFs {
        self.sampler.procfs()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
