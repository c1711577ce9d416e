//! Raw metric readings, one call per subsystem.
//!
//! Every method may fail independently; the collector keeps the previous
//! section of the snapshot when one does.

pub mod host;

pub use host::HostSampler;

use crate::types::{
    Connection, DiskIoCounters, InterfaceInfo, LoadAverage, NetIoCounters, PartitionUsage,
    ProcessRecord,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The provider returned nothing usable for this subsystem
    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(target_os = "linux")]
    #[error("procfs: {0}")]
    Proc(#[from] procfs::ProcError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    System,
    Cpu,
    Memory,
    Disk,
    Network,
    Process,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Process => "process",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemReading {
    pub hostname: String,
    pub platform: String,
    pub os: String,
    pub kernel_version: String,
    pub uptime: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CpuReading {
    pub usage: f64,
    pub per_core: Vec<f64>,
    pub load_avg: Option<LoadAverage>,
    pub temperature: Option<f64>,
}

/// Byte counts; percentages are derived by the collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DiskReading {
    pub partitions: Vec<PartitionUsage>,
    /// `None` when the IO counters could not be read this tick.
    pub io_counters: Option<BTreeMap<String, DiskIoCounters>>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkReading {
    pub interfaces: Vec<InterfaceInfo>,
    pub io_counters: Option<BTreeMap<String, NetIoCounters>>,
    /// Reading the socket tables may need privileges; `None` keeps the last list.
    pub connections: Option<Vec<Connection>>,
}

pub trait Sampler: Send {
    fn system_info(&mut self) -> Result<SystemReading, SamplerError>;
    fn cpu(&mut self) -> Result<CpuReading, SamplerError>;
    fn memory(&mut self) -> Result<MemoryReading, SamplerError>;
    fn disks(&mut self) -> Result<DiskReading, SamplerError>;
    fn network(&mut self) -> Result<NetworkReading, SamplerError>;
    fn processes(&mut self) -> Result<Vec<ProcessRecord>, SamplerError>;
}
