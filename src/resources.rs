//! Host resource sampling
//!
//! The metrics snapshot carries a point-in-time view of CPU, memory, network
//! and disk usage. [`SystemProbe`] reads it from the OS via `sysinfo`;
//! [`StaticProbe`] returns fixed figures when monitoring is disabled or under
//! test.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Networks, Pid, ProcessesToUpdate, System};

/// Point-in-time resource figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Global CPU usage since the previous sample, 0-100
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Bytes received on all interfaces since boot
    pub network_rx_bytes: u64,
    /// Bytes transmitted on all interfaces since boot
    pub network_tx_bytes: u64,
    /// Bytes read from disk by this process
    pub disk_read_bytes: u64,
    /// Bytes written to disk by this process
    pub disk_write_bytes: u64,
}

impl ResourceUsage {
    /// Memory in use as a percentage of total (0 when total is unknown)
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_bytes == 0 {
            0.0
        } else {
            self.memory_used_bytes as f64 / self.memory_total_bytes as f64 * 100.0
        }
    }
}

/// Source of resource readings
pub trait ResourceProbe: Send + Sync {
    fn current_usage(&self) -> ResourceUsage;
}

struct SystemState {
    system: System,
    networks: Networks,
    pid: Option<Pid>,
}

/// Reads live figures from the operating system
pub struct SystemProbe {
    state: Mutex<SystemState>,
}

impl SystemProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot determine own pid, disk figures will be zero");
                None
            }
        };

        let mut system = System::new();
        // Prime the CPU counters so the first sample has a baseline
        system.refresh_cpu_usage();

        Self {
            state: Mutex::new(SystemState {
                system,
                networks: Networks::new_with_refreshed_list(),
                pid,
            }),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    fn current_usage(&self) -> ResourceUsage {
        let mut state = self.state.lock();
        let SystemState {
            system,
            networks,
            pid,
        } = &mut *state;

        system.refresh_cpu_usage();
        system.refresh_memory();
        networks.refresh(true);

        let (network_rx_bytes, network_tx_bytes) = networks
            .list()
            .iter()
            .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                (rx + data.total_received(), tx + data.total_transmitted())
            });

        let (disk_read_bytes, disk_write_bytes) = match pid {
            Some(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[*pid]), true);
                system
                    .process(*pid)
                    .map(|p| {
                        let disk = p.disk_usage();
                        (disk.total_read_bytes, disk.total_written_bytes)
                    })
                    .unwrap_or((0, 0))
            }
            None => (0, 0),
        };

        ResourceUsage {
            cpu_percent: system.global_cpu_usage(),
            memory_used_bytes: system.used_memory(),
            memory_total_bytes: system.total_memory(),
            network_rx_bytes,
            network_tx_bytes,
            disk_read_bytes,
            disk_write_bytes,
        }
    }
}

/// Always reports the same figures
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    usage: ResourceUsage,
}

impl StaticProbe {
    pub fn new(usage: ResourceUsage) -> Self {
        Self { usage }
    }
}

impl ResourceProbe for StaticProbe {
    fn current_usage(&self) -> ResourceUsage {
        self.usage
    }
}
