//! Point-in-time process resource sampling.
//!
//! Linux reads `/proc/self/status` (VmRSS) and `/proc/self/stat`
//! (utime + stime against the kernel tick clock). Other platforms
//! report zeros — resource telemetry is advisory and must never fail a
//! request.

use std::sync::Mutex;
use std::time::Instant;

/// CPU and memory sampled at one instant.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// Samples process CPU utilisation and resident memory.
///
/// CPU percent is derived from the tick delta since the previous
/// sample, so the first reading after construction reports 0.0.
pub(crate) struct ResourceSampler {
    baseline: Mutex<Option<CpuBaseline>>,
}

#[derive(Clone, Copy)]
struct CpuBaseline {
    at: Instant,
    ticks: u64,
}

impl ResourceSampler {
    pub fn new() -> Self {
        let baseline = process_cpu_ticks().map(|ticks| CpuBaseline {
            at: Instant::now(),
            ticks,
        });
        Self {
            baseline: Mutex::new(baseline),
        }
    }

    pub fn sample(&self) -> ResourceSample {
        ResourceSample {
            cpu_percent: self.cpu_percent(),
            memory_mb: resident_memory_mb().unwrap_or(0.0),
        }
    }

    fn cpu_percent(&self) -> f64 {
        let Some(ticks) = process_cpu_ticks() else {
            return 0.0;
        };
        let now = Instant::now();
        let mut baseline = self
            .baseline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = baseline.replace(CpuBaseline { at: now, ticks });
        let Some(previous) = previous else {
            return 0.0;
        };

        let elapsed = now.duration_since(previous.at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let cpu_secs = ticks.saturating_sub(previous.ticks) as f64 / clock_ticks_per_sec();
        (cpu_secs / elapsed * 100.0).max(0.0)
    }
}

#[cfg(target_os = "linux")]
fn process_cpu_ticks() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // Fields after the parenthesised comm (which may itself contain
    // spaces): state is the first, utime and stime are the 12th and 13th.
    let after_comm = stat.rsplit_once(')')?.1;
    let mut fields = after_comm.split_whitespace();
    let utime: u64 = fields.nth(11)?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(utime + stime)
}

#[cfg(not(target_os = "linux"))]
fn process_cpu_ticks() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn resident_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: f64 = rest.split_whitespace().next()?.parse().ok()?;
            return Some(kb / 1024.0);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_mb() -> Option<f64> {
    None
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> f64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as f64 } else { 100.0 }
}

#[cfg(not(target_os = "linux"))]
fn clock_ticks_per_sec() -> f64 {
    100.0
}
