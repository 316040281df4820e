use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::time::Instant;

/// Default minimum spacing between two memory reads.
pub const DEFAULT_SAMPLE_EVERY: Duration = Duration::from_millis(50);

/// Reads the resident memory of the current process.
///
/// Refreshing process information is comparatively expensive, so reads are
/// throttled: `sample` returns `None` when called again before `min_spacing`
/// has passed.
pub struct MemoryProbe {
    system: System,
    pid: Option<Pid>,
    min_spacing: Duration,
    last_sample: Option<Instant>,
}

impl MemoryProbe {
    pub fn new(min_spacing: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Memory sampling disabled: {e}");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
            min_spacing,
            last_sample: None,
        }
    }

    /// Resident set size in bytes, if a read is due and the platform supports it.
    pub fn sample(&mut self) -> Option<u64> {
        let pid = self.pid?;
        let now = Instant::now();
        if let Some(last) = self.last_sample {
            if now.duration_since(last) < self.min_spacing {
                return None;
            }
        }
        self.last_sample = Some(now);
        self.read(pid)
    }

    /// Read unconditionally, ignoring the throttle.
    pub fn sample_now(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.last_sample = Some(Instant::now());
        self.read(pid)
    }

    fn read(&mut self, pid: Pid) -> Option<u64> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory())
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_EVERY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn throttles_reads() {
        let mut probe = MemoryProbe::new(Duration::from_secs(1));
        // first read is always attempted (may still be None on unsupported platforms)
        let _ = probe.sample();
        assert!(probe.sample().is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        if probe.pid.is_some() {
            assert!(probe.sample().is_some());
        }
    }
}
