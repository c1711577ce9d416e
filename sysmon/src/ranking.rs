use crate::types::ProcessRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
    Pid,
    Name,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [Self::Cpu, Self::Memory, Self::Pid, Self::Name];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Pid => "pid",
            Self::Name => "name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU usage",
            Self::Memory => "memory usage",
            Self::Pid => "PID",
            Self::Name => "name",
        }
    }
}

/// Unrecognized keys fall back to CPU ordering.
impl From<&str> for SortKey {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Self::Memory,
            "pid" => Self::Pid,
            "name" => Self::Name,
            _ => Self::Cpu,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order `processes` in place. CPU and memory sort highest first, PID and
/// name ascending (name compared case-insensitively). Equal keys keep their
/// sampled order.
pub fn rank(processes: &mut [ProcessRecord], key: SortKey) {
    match key {
        SortKey::Cpu => processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent)),
        SortKey::Memory => processes.sort_by(|a, b| b.mem_percent.total_cmp(&a.mem_percent)),
        SortKey::Pid => processes.sort_by_key(|p| p.pid),
        SortKey::Name => processes.sort_by_cached_key(|p| p.name.to_lowercase()),
    }
}
