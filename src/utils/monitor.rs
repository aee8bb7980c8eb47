use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// Wall time and memory recorded at the end of one pipeline phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStats {
    pub phase: String,
    pub elapsed: Duration,
    /// Resident memory in MB, when the platform reports it.
    pub memory_mb: Option<u64>,
}

/// Per-phase process monitor. Disabled monitors record nothing.
pub struct SystemMonitor {
    enabled: bool,
    start_time: Instant,
    phase_start: Mutex<Instant>,
    phases: Mutex<Vec<PhaseStats>>,
    peak_memory: Mutex<u64>,
    #[cfg(feature = "cli")]
    process: Option<(Mutex<System>, Pid)>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        #[cfg(feature = "cli")]
        let process = if enabled {
            sysinfo::get_current_pid().ok().map(|pid| {
                let mut system = System::new_with_specifics(RefreshKind::everything());
                // 初始刷新
                system.refresh_all();
                (Mutex::new(system), pid)
            })
        } else {
            None
        };

        let now = Instant::now();
        Self {
            enabled,
            start_time: now,
            phase_start: Mutex::new(now),
            phases: Mutex::new(Vec::new()),
            peak_memory: Mutex::new(0),
            #[cfg(feature = "cli")]
            process,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn memory_mb(&self) -> Option<u64> {
        let (system, pid) = self.process.as_ref()?;
        let mut system = system.lock().ok()?;
        system.refresh_all();
        let memory_mb = system.process(*pid)?.memory() / 1024 / 1024;

        if let Ok(mut peak) = self.peak_memory.lock() {
            *peak = (*peak).max(memory_mb);
        }
        Some(memory_mb)
    }

    #[cfg(not(feature = "cli"))]
    fn memory_mb(&self) -> Option<u64> {
        None
    }

    /// Close the current phase and log its duration.
    pub fn log_stats(&self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let elapsed = match self.phase_start.lock() {
            Ok(mut start) => {
                let elapsed = now.duration_since(*start);
                *start = now;
                elapsed
            }
            Err(_) => return,
        };

        let stats = PhaseStats {
            phase: phase.to_string(),
            elapsed,
            memory_mb: self.memory_mb(),
        };

        match stats.memory_mb {
            Some(memory) => tracing::info!(
                "📊 {} - Time: {:?}, Memory: {}MB",
                stats.phase,
                stats.elapsed,
                memory
            ),
            None => tracing::info!("📊 {} - Time: {:?}", stats.phase, stats.elapsed),
        }

        if let Ok(mut phases) = self.phases.lock() {
            phases.push(stats);
        }
    }

    pub fn phases(&self) -> Vec<PhaseStats> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn peak_memory_mb(&self) -> u64 {
        self.peak_memory.lock().map(|p| *p).unwrap_or(0)
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB, Phases: {}",
            self.start_time.elapsed(),
            self.peak_memory_mb(),
            self.phases().len()
        );
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let monitor = SystemMonitor::default();

        monitor.log_stats("extract");
        monitor.log_final_stats();

        assert!(!monitor.is_enabled());
        assert!(monitor.phases().is_empty());
    }

    #[test]
    fn test_enabled_monitor_records_phases_in_order() {
        let monitor = SystemMonitor::new(true);

        monitor.log_stats("extract");
        monitor.log_stats("transform");

        let phases: Vec<String> = monitor.phases().into_iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec!["extract", "transform"]);
    }
}
