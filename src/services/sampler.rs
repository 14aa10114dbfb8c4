//! System statistics sampler.
//!
//! DESIGN
//! ======
//! One background task reads `/proc` every sample interval and publishes the
//! latest `SystemSample` on a `watch` channel. Connection handlers read the
//! channel at their own send cadence, so a slow client never delays sampling.
//!
//! LIFECYCLE
//! =========
//! The task runs only while at least one client is connected: `start` on the
//! first connect, `stop` on the last disconnect (see `state::ClientSlots`).
//! Each start clears the published sample and the CPU baseline, so the first
//! CPU value after a start is always 0.0.

#[cfg(test)]
#[path = "sampler_test.rs"]
mod sampler_test;

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::protocol::{ClientCounts, ErrorCode, Snapshot, round2};
use crate::services::procfs::{CpuTimes, LoadAvg, MemInfo, ProcFs};

// =============================================================================
// CPU
// =============================================================================

/// Turns cumulative `/proc/stat` counters into a usage percentage.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Option<CpuTimes>,
}

impl CpuTracker {
    /// Usage since the previous call. The first call, and any call after a
    /// counter reset, only records a baseline and returns 0.0.
    pub fn update(&mut self, now: CpuTimes) -> f64 {
        let Some(prev) = self.prev.replace(now) else {
            return 0.0;
        };
        if now.idle < prev.idle || now.total < prev.total {
            return 0.0;
        }
        let total = now.total - prev.total;
        if total == 0 {
            return 0.0;
        }
        let idle = now.idle - prev.idle;
        #[allow(clippy::cast_precision_loss)]
        let usage = 100.0 * (1.0 - idle as f64 / total as f64);
        usage.clamp(0.0, 100.0)
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

// =============================================================================
// SAMPLE
// =============================================================================

/// One reading of system-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemSample {
    pub ts_ms: u64,
    pub mono_ms: u64,
    pub delta_ms: u64,
    pub cpu: f64,
    pub mem: MemInfo,
    pub uptime_s: f64,
    pub load: LoadAvg,
}

impl SystemSample {
    /// Wire snapshot for this sample without any monitored process.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_snapshot(&self, cpu_cores: u32, clients: ClientCounts) -> Snapshot {
        Snapshot {
            ts: self.ts_ms,
            mono_ms: self.mono_ms,
            delta_ms: self.delta_ms,
            cpu: round2(self.cpu),
            cpu_cores,
            mem_total_kb: self.mem.total_kb,
            mem_available_kb: self.mem.available_kb,
            // Non-negative and far below u64::MAX.
            uptime_s: self.uptime_s.max(0.0).round() as u64,
            load1: round2(self.load.one),
            load5: round2(self.load.five),
            load15: round2(self.load.fifteen),
            clients,
            proc: None,
            error: None,
        }
    }
}

/// Sampling state carried between ticks of one sampler run.
#[derive(Debug, Default)]
pub struct SampleState {
    cpu: CpuTracker,
    last_mono_ms: Option<u64>,
}

impl SampleState {
    /// Read every system source once. Unreadable sources report zeros and
    /// are logged; a sample is always produced.
    pub fn sample(&mut self, procfs: &ProcFs, ts_ms: u64, mono_ms: u64) -> SystemSample {
        let cpu = match procfs.cpu_times() {
            Ok(times) => self.cpu.update(times),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "sampler: cpu read failed");
                self.cpu.reset();
                0.0
            }
        };
        let mem = procfs.meminfo().unwrap_or_else(|e| {
            warn!(error = %e, code = e.error_code(), "sampler: meminfo read failed");
            MemInfo::default()
        });
        let uptime_s = procfs.uptime_secs().unwrap_or_else(|e| {
            warn!(error = %e, code = e.error_code(), "sampler: uptime read failed");
            0.0
        });
        let load = procfs.loadavg().unwrap_or_else(|e| {
            warn!(error = %e, code = e.error_code(), "sampler: loadavg read failed");
            LoadAvg::default()
        });
        let delta_ms = self.last_mono_ms.map_or(0, |prev| mono_ms.saturating_sub(prev));
        self.last_mono_ms = Some(mono_ms);

        SystemSample { ts_ms, mono_ms, delta_ms, cpu, mem, uptime_s, load }
    }
}

/// Wall clock in milliseconds since the Unix epoch, 0 if the clock is before it.
#[must_use]
pub fn wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// =============================================================================
// SAMPLER TASK
// =============================================================================

pub struct Sampler {
    procfs: ProcFs,
    interval: Duration,
    epoch: Instant,
    tx: watch::Sender<Option<SystemSample>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Sampler {
    #[must_use]
    pub fn new(procfs: ProcFs, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { procfs, interval, epoch: Instant::now(), tx, task: Mutex::new(None) }
    }

    #[must_use]
    pub fn procfs(&self) -> &ProcFs {
        &self.procfs
    }

    /// Milliseconds since the service started.
    #[must_use]
    pub fn mono_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SystemSample>> {
        self.tx.subscribe()
    }

    /// Most recent sample of the current run, if any.
    #[must_use]
    pub fn latest(&self) -> Option<SystemSample> {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the sampling task if it is not already running.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.tx.send_replace(None);

        let procfs = self.procfs.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let interval = self.interval;
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        info!(interval_ms, "sampler: started");

        *task = Some(tokio::spawn(async move {
            let mut state = SampleState::default();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let mono_ms = u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
                let sample = state.sample(&procfs, wall_ms(), mono_ms);
                tx.send_replace(Some(sample));
            }
        }));
    }

    /// Abort the sampling task. Safe to call when nothing is running.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
            info!("sampler: stopped");
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}
