//! Per-session process monitoring.
//!
//! DESIGN
//! ======
//! Each connection may watch one process by `comm` name. The monitor caches
//! the PID it found and re-checks its `comm` every sample, so a recycled PID
//! is never reported under the wrong name.
//!
//! CPU% is `Δjiffies / CLK_TCK / Δseconds * 100 / cores`. Any break in
//! continuity (first sample, PID change, counter going backwards, clock not
//! advancing) re-baselines and reports 0.
//!
//! While the process is missing, the full `/proc` scan runs at most once per
//! `RESCAN_INTERVAL_MS`; samples in between report not-found without touching
//! the filesystem.

#[cfg(test)]
#[path = "process_test.rs"]
mod process_test;

use tracing::{debug, info};

use crate::protocol::{MonitorReport, ProcNotFound, ProcStats, round2};
use crate::services::procfs::{ProcFs, SmapsRollup};

/// Minimum spacing between `/proc` scans for a process that is not running.
pub const RESCAN_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Baseline {
    jiffies: u64,
    mono_ms: u64,
}

#[derive(Debug)]
pub struct ProcessMonitor {
    name: String,
    pid: Option<u32>,
    baseline: Option<Baseline>,
    last_miss_ms: Option<u64>,
}

impl ProcessMonitor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), pid: None, baseline: None, last_miss_ms: None }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample the watched process at `mono_ms`.
    pub fn sample(&mut self, procfs: &ProcFs, mono_ms: u64, cores: u32, clk_tck: u64) -> MonitorReport {
        let Some(pid) = self.resolve_pid(procfs, mono_ms) else {
            self.forget();
            return MonitorReport::NotFound(ProcNotFound::new(&self.name));
        };

        let jiffies = match procfs.process_jiffies(pid) {
            Ok(j) => j,
            Err(e) => {
                debug!(pid, error = %e, "monitor: stat unreadable");
                self.forget();
                return MonitorReport::NotFound(ProcNotFound::new(&self.name));
            }
        };

        let rss_kb = procfs.vm_rss_kb(pid).unwrap_or(0);
        let SmapsRollup { pss_kb, uss_kb } = procfs.smaps_rollup(pid).unwrap_or_default();
        let cpu = self.cpu_percent(jiffies, mono_ms, cores, clk_tck);

        MonitorReport::Found(ProcStats { name: self.name.clone(), cpu: round2(cpu), rss_kb, pss_kb, uss_kb, pid })
    }

    fn resolve_pid(&mut self, procfs: &ProcFs, mono_ms: u64) -> Option<u32> {
        if let Some(pid) = self.pid {
            if procfs.comm_matches(pid, &self.name) {
                return Some(pid);
            }
            info!(pid, name = %self.name, "monitor: cached pid no longer matches; rescanning");
            self.forget();
        } else if self.last_miss_ms.is_some_and(|last| mono_ms.saturating_sub(last) < RESCAN_INTERVAL_MS) {
            return None;
        }
        self.pid = procfs.find_pid(&self.name);
        self.last_miss_ms = if self.pid.is_some() { None } else { Some(mono_ms) };
        self.pid
    }

    fn forget(&mut self) {
        self.pid = None;
        self.baseline = None;
    }

    fn cpu_percent(&mut self, jiffies: u64, mono_ms: u64, cores: u32, clk_tck: u64) -> f64 {
        let now = Baseline { jiffies, mono_ms };
        let Some(prev) = self.baseline.replace(now) else {
            return 0.0;
        };
        if jiffies < prev.jiffies || mono_ms <= prev.mono_ms || clk_tck == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let (ticks, secs, tck) = ((jiffies - prev.jiffies) as f64, (mono_ms - prev.mono_ms) as f64 / 1000.0, clk_tck as f64);
        let percent = ticks / tck / secs * 100.0 / f64::from(cores.max(1));
        percent.max(0.0)
    }
}
