#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysmon::sampler::{CpuReading, DiskReading, MemoryReading, NetworkReading, SystemReading};
use sysmon::types::{DiskIoCounters, NetIoCounters, PartitionUsage, ProcessRecord};
use sysmon::{Collection, Sampler, SamplerError, Subsystem};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Readings handed out by `ScriptedSampler`; tests mutate it between cycles.
#[derive(Debug, Clone)]
pub struct Script {
    pub system: SystemReading,
    pub cpu: CpuReading,
    pub memory: MemoryReading,
    pub disks: DiskReading,
    pub network: NetworkReading,
    pub processes: Vec<ProcessRecord>,
    pub failing: HashSet<Subsystem>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            system: SystemReading {
                hostname: "testhost".into(),
                platform: "linux".into(),
                os: "Test OS 1.0".into(),
                kernel_version: "6.1.0".into(),
                uptime: Duration::from_secs(3600),
            },
            cpu: CpuReading {
                usage: 10.0,
                per_core: vec![10.0, 10.0],
                load_avg: None,
                temperature: None,
            },
            memory: MemoryReading {
                total: 16 * GIB,
                used: 4 * GIB,
                free: 12 * GIB,
                swap_total: 0,
                swap_used: 0,
                swap_free: 0,
            },
            disks: DiskReading {
                partitions: vec![partition("/", 40.0)],
                io_counters: counters(&[("sda", disk_io(0, 0))]),
            },
            network: NetworkReading {
                interfaces: Vec::new(),
                io_counters: counters(&[("eth0", net_io(0, 0))]),
                connections: Some(Vec::new()),
            },
            processes: vec![
                process(1, "init", 0.1, 0.5),
                process(200, "worker", 45.0, 2.0),
                process(300, "Database", 12.0, 30.0),
            ],
            failing: HashSet::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedSampler {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSampler {
    pub fn new() -> (Self, Arc<Mutex<Script>>) {
        let sampler = Self::default();
        let script = Arc::clone(&sampler.script);
        (sampler, script)
    }

    fn read<T>(
        &self,
        subsystem: Subsystem,
        f: impl FnOnce(&Script) -> T,
    ) -> Result<T, SamplerError> {
        let script = self.script.lock().unwrap();
        if script.failing.contains(&subsystem) {
            return Err(SamplerError::Unavailable(subsystem.to_string()));
        }
        Ok(f(&script))
    }
}

impl Sampler for ScriptedSampler {
    fn system_info(&mut self) -> Result<SystemReading, SamplerError> {
        self.read(Subsystem::System, |s| s.system.clone())
    }

    fn cpu(&mut self) -> Result<CpuReading, SamplerError> {
        self.read(Subsystem::Cpu, |s| s.cpu.clone())
    }

    fn memory(&mut self) -> Result<MemoryReading, SamplerError> {
        self.read(Subsystem::Memory, |s| s.memory)
    }

    fn disks(&mut self) -> Result<DiskReading, SamplerError> {
        self.read(Subsystem::Disk, |s| s.disks.clone())
    }

    fn network(&mut self) -> Result<NetworkReading, SamplerError> {
        self.read(Subsystem::Network, |s| s.network.clone())
    }

    fn processes(&mut self) -> Result<Vec<ProcessRecord>, SamplerError> {
        self.read(Subsystem::Process, |s| s.processes.clone())
    }
}

pub fn partition(mount_point: &str, used_percent: f64) -> PartitionUsage {
    let total = 100 * GIB;
    let used = (total as f64 * used_percent / 100.0) as u64;
    PartitionUsage {
        device: format!("/dev/sd{}", mount_point.len()),
        mount_point: mount_point.to_string(),
        fs_type: "ext4".into(),
        total,
        used,
        free: total - used,
        used_percent,
    }
}

pub fn disk_io(read_bytes: u64, write_bytes: u64) -> DiskIoCounters {
    DiskIoCounters {
        read_bytes,
        write_bytes,
    }
}

pub fn net_io(bytes_recv: u64, bytes_sent: u64) -> NetIoCounters {
    NetIoCounters {
        bytes_recv,
        bytes_sent,
        ..Default::default()
    }
}

pub fn process(pid: u32, name: &str, cpu_percent: f64, mem_percent: f64) -> ProcessRecord {
    ProcessRecord {
        pid,
        name: name.to_string(),
        user: "root".into(),
        status: "running".into(),
        cpu_percent,
        mem_percent,
        ..Default::default()
    }
}

/// Counter map in the shape the sampler reports it.
pub fn counters<C: Copy>(entries: &[(&str, C)]) -> Option<BTreeMap<String, C>> {
    let map = entries.iter().map(|(name, c)| (name.to_string(), *c));
    Some(map.collect())
}

pub fn pids(collection: &Collection) -> Vec<u32> {
    let processes = &collection.snapshot.process.processes;
    processes.iter().map(|p| p.pid).collect()
}
