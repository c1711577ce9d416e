//! One full sampling cycle: read every subsystem, derive rates and history,
//! rank processes, evaluate alerts and publish an immutable snapshot.

use crate::alerts::{AlertManager, Thresholds};
use crate::ranking::{SortKey, rank};
use crate::rates::{PrevCounterCache, effective_elapsed};
use crate::sampler::{Sampler, SamplerError, Subsystem};
use crate::timeseries::TimeSeries;
use crate::types::{DiskIoCounters, NetIoCounters, ProcessStats, Snapshot, SystemInfo, percent_of};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub thresholds: Thresholds,
    pub max_alerts: usize,
    pub history_capacity: usize,
    pub sort_key: SortKey,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            max_alerts: 100,
            history_capacity: crate::timeseries::DEFAULT_CAPACITY,
            sort_key: SortKey::Cpu,
        }
    }
}

/// A subsystem that could not be read this tick. Its snapshot section holds
/// the previous values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemFailure {
    pub subsystem: Subsystem,
    pub message: String,
}

/// Result of one `collect()` call.
#[derive(Debug, Clone)]
pub struct Collection {
    pub snapshot: Arc<Snapshot>,
    pub failures: Vec<SubsystemFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Only raised on the very first cycle; later system-info failures are soft.
    #[error("could not determine system identity: {0}")]
    SystemIdentity(#[source] SamplerError),
}

pub struct Collector {
    sampler: Box<dyn Sampler>,
    last_collect: Option<Instant>,
    disk_counters: PrevCounterCache<DiskIoCounters>,
    net_counters: PrevCounterCache<NetIoCounters>,
    cpu_history: TimeSeries,
    memory_history: TimeSeries,
    alerts: AlertManager,
    sort_key: SortKey,
    latest: Arc<Snapshot>,
    cycles: u64,
}

impl Collector {
    pub fn new(sampler: Box<dyn Sampler>, config: &CollectorConfig) -> Self {
        Self {
            sampler,
            last_collect: None,
            disk_counters: PrevCounterCache::new(),
            net_counters: PrevCounterCache::new(),
            cpu_history: TimeSeries::with_capacity(config.history_capacity),
            memory_history: TimeSeries::with_capacity(config.history_capacity),
            alerts: AlertManager::new(config.thresholds, config.max_alerts),
            sort_key: config.sort_key,
            latest: Arc::new(Snapshot::default()),
            cycles: 0,
        }
    }

    /// Run one cycle. Subsystem failures are reported in the returned
    /// `Collection` and never abort the cycle; the only error is a failure to
    /// identify the host on the first cycle.
    pub fn collect(&mut self) -> Result<Collection, CollectError> {
        let now = Instant::now();
        let captured_at = Utc::now();
        let elapsed = self
            .last_collect
            .map(|last| effective_elapsed(now.duration_since(last)))
            .unwrap_or(1.0);
        self.last_collect = Some(now);

        let mut next = Snapshot::clone(&self.latest);
        let mut failures = Vec::new();

        match self.sampler.system_info() {
            Ok(r) => {
                next.system = SystemInfo {
                    hostname: r.hostname,
                    platform: r.platform,
                    os: r.os,
                    kernel_version: r.kernel_version,
                    uptime: r.uptime,
                    captured_at,
                };
            }
            Err(e) if self.cycles == 0 => return Err(CollectError::SystemIdentity(e)),
            Err(e) => record(&mut failures, Subsystem::System, e),
        }
        next.system.captured_at = captured_at;

        self.collect_cpu(&mut next, captured_at, &mut failures);
        self.collect_memory(&mut next, captured_at, &mut failures);
        self.collect_disk(&mut next, elapsed, &mut failures);
        self.collect_network(&mut next, elapsed, &mut failures);
        self.collect_processes(&mut next, &mut failures);

        self.alerts.check_resource_alerts(&next);
        next.alerts = self.alerts.to_vec();

        self.cycles += 1;
        self.latest = Arc::new(next);
        debug!(
            "[collector] cycle {} done: cpu={:.1}% mem={:.1}% procs={} alerts={} failures={}",
            self.cycles,
            self.latest.cpu.usage,
            self.latest.memory.used_percent,
            self.latest.process.total,
            self.latest.alerts.len(),
            failures.len()
        );

        Ok(Collection {
            snapshot: Arc::clone(&self.latest),
            failures,
        })
    }

    fn collect_cpu(
        &mut self,
        next: &mut Snapshot,
        captured_at: DateTime<Utc>,
        failures: &mut Vec<SubsystemFailure>,
    ) {
        match self.sampler.cpu() {
            Ok(r) => {
                self.cpu_history.append(r.usage, captured_at);
                next.cpu.usage = r.usage;
                next.cpu.cores = r.per_core.len();
                next.cpu.per_core = r.per_core;
                next.cpu.load_avg = r.load_avg;
                next.cpu.temperature = r.temperature;
            }
            Err(e) => record(failures, Subsystem::Cpu, e),
        }
        next.cpu.history = self.cpu_history.clone();
    }

    fn collect_memory(
        &mut self,
        next: &mut Snapshot,
        captured_at: DateTime<Utc>,
        failures: &mut Vec<SubsystemFailure>,
    ) {
        match self.sampler.memory() {
            Ok(r) => {
                let used_percent = percent_of(r.used, r.total);
                self.memory_history.append(used_percent, captured_at);

                let mem = &mut next.memory;
                mem.total = r.total;
                mem.used = r.used;
                mem.free = r.free;
                mem.used_percent = used_percent;
                mem.swap_total = r.swap_total;
                mem.swap_used = r.swap_used;
                mem.swap_free = r.swap_free;
                mem.swap_percent = percent_of(r.swap_used, r.swap_total);
            }
            Err(e) => record(failures, Subsystem::Memory, e),
        }
        next.memory.history = self.memory_history.clone();
    }

    fn collect_disk(
        &mut self,
        next: &mut Snapshot,
        elapsed: f64,
        failures: &mut Vec<SubsystemFailure>,
    ) {
        match self.sampler.disks() {
            Ok(r) => {
                next.disk.partitions = r.partitions;
                match r.io_counters {
                    Some(io) => {
                        next.disk.io_rates = self.disk_counters.advance(&io, elapsed);
                        next.disk.io_counters = io;
                    }
                    None => {
                        warn!("[collector] disk IO counters unavailable, keeping last rates");
                        self.disk_counters.clear();
                    }
                }
            }
            Err(e) => {
                self.disk_counters.clear();
                record(failures, Subsystem::Disk, e);
            }
        }
    }

    fn collect_network(
        &mut self,
        next: &mut Snapshot,
        elapsed: f64,
        failures: &mut Vec<SubsystemFailure>,
    ) {
        match self.sampler.network() {
            Ok(r) => {
                next.network.interfaces = r.interfaces;
                match r.io_counters {
                    Some(io) => {
                        next.network.io_rates = self.net_counters.advance(&io, elapsed);
                        next.network.io_counters = io;
                    }
                    None => {
                        warn!("[collector] network IO counters unavailable, keeping last rates");
                        self.net_counters.clear();
                    }
                }
                if let Some(connections) = r.connections {
                    next.network.connections = connections;
                }
            }
            Err(e) => {
                self.net_counters.clear();
                record(failures, Subsystem::Network, e);
            }
        }
    }

    fn collect_processes(&mut self, next: &mut Snapshot, failures: &mut Vec<SubsystemFailure>) {
        match self.sampler.processes() {
            Ok(mut processes) => {
                rank(&mut processes, self.sort_key);
                next.process = ProcessStats {
                    total: processes.len(),
                    processes,
                    sort_by: self.sort_key,
                };
            }
            Err(e) => {
                record(failures, Subsystem::Process, e);
                // stale list, but honour a sort key changed since it was taken
                if next.process.sort_by != self.sort_key {
                    rank(&mut next.process.processes, self.sort_key);
                    next.process.sort_by = self.sort_key;
                }
            }
        }
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort_key = key;
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Last published snapshot; empty before the first cycle.
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

fn record(failures: &mut Vec<SubsystemFailure>, subsystem: Subsystem, err: SamplerError) {
    warn!("[collector] failed to collect {subsystem} info: {err}");
    failures.push(SubsystemFailure {
        subsystem,
        message: err.to_string(),
    });
}
