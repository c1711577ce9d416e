use crate::alerts::Alert;
use crate::ranking::SortKey;
use crate::rates::{DiskRates, NetRates};
use crate::timeseries::TimeSeries;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// One complete collection cycle. Published behind an `Arc` and never mutated
/// after publication.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub system: SystemInfo,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub network: NetworkStats,
    pub process: ProcessStats,
    /// Newest first.
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub os: String,
    pub kernel_version: String,
    #[serde(with = "duration_secs")]
    pub uptime: Duration,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuStats {
    pub usage: f64,
    pub per_core: Vec<f64>,
    pub cores: usize,
    /// `None` where the platform has no load average.
    pub load_avg: Option<LoadAverage>,
    /// Celsius; `None` when no usable sensor exists.
    pub temperature: Option<f64>,
    pub history: TimeSeries,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub swap_percent: f64,
    pub history: TimeSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionUsage {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiskStats {
    /// Ordered by mount point.
    pub partitions: Vec<PartitionUsage>,
    pub io_counters: BTreeMap<String, DiskIoCounters>,
    pub io_rates: BTreeMap<String, DiskRates>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac_address: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NetIoCounters {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    pub packets_recv: u64,
    pub packets_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub protocol: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub status: String,
    pub uid: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub interfaces: Vec<InterfaceInfo>,
    pub io_counters: BTreeMap<String, NetIoCounters>,
    pub io_rates: BTreeMap<String, NetRates>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub status: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub threads: Option<usize>,
    pub command: Vec<String>,
    pub parent_pid: Option<u32>,
    pub nice: Option<i64>,
    pub rss: u64,
    pub vms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessStats {
    /// Full ranked list; truncation to a display count is left to the renderer.
    pub processes: Vec<ProcessRecord>,
    pub total: usize,
    pub sort_by: SortKey,
}

/// Percentage of `part` in `total`, zero when `total` is zero.
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
