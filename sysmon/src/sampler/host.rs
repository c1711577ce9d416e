use super::{
    CpuReading, DiskReading, MemoryReading, NetworkReading, Sampler, SamplerError, SystemReading,
};
use crate::types::{
    Connection, DiskIoCounters, InterfaceInfo, LoadAverage, NetIoCounters, PartitionUsage,
    ProcessRecord, percent_of,
};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::time::Duration;
use sysinfo::{Components, Disks, Networks, ProcessRefreshKind, ProcessesToUpdate, System, Users};

/// Sensor labels that report the CPU package temperature on common drivers.
const CPU_SENSOR_LABELS: &[&str] = &["coretemp Package id 0", "k10temp Tdie", "cpu_thermal"];

/// Samples the local host through `sysinfo`, with `procfs` filling in what
/// `sysinfo` does not expose on Linux (socket tables, niceness, block device
/// counters).
///
/// The `System` instance is kept across calls so CPU usage is measured over
/// the interval between ticks.
pub struct HostSampler {
    system: System,
    disks: Disks,
    networks: Networks,
    components: Components,
    users: Users,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            users: Users::new_with_refreshed_list(),
        }
    }

    fn cpu_temperature(&mut self) -> Option<f64> {
        self.components.refresh(true);

        let known = self.components.list().iter().find(|c| {
            CPU_SENSOR_LABELS
                .iter()
                .any(|label| c.label().eq_ignore_ascii_case(label))
        });
        let component = known.or_else(|| {
            self.components.list().iter().find(|c| {
                let label = c.label().to_lowercase();
                label.contains("cpu") || label.contains("package")
            })
        })?;

        component.temperature().map(f64::from)
    }

    fn disk_io_counters(&self) -> Option<BTreeMap<String, DiskIoCounters>> {
        #[cfg(target_os = "linux")]
        {
            match read_diskstats() {
                Ok(counters) => return Some(counters),
                Err(e) => debug!("[sampler] /proc/diskstats unavailable: {e}"),
            }
        }

        let mut counters = BTreeMap::new();
        for disk in self.disks.list() {
            let usage = disk.usage();
            counters.insert(
                disk.name().to_string_lossy().into_owned(),
                DiskIoCounters {
                    read_bytes: usage.total_read_bytes,
                    write_bytes: usage.total_written_bytes,
                },
            );
        }
        Some(counters)
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for HostSampler {
    fn system_info(&mut self) -> Result<SystemReading, SamplerError> {
        let hostname =
            System::host_name().ok_or_else(|| SamplerError::Unavailable("host name".into()))?;

        Ok(SystemReading {
            hostname,
            platform: System::distribution_id(),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            kernel_version: System::kernel_version().unwrap_or_default(),
            uptime: Duration::from_secs(System::uptime()),
        })
    }

    fn cpu(&mut self) -> Result<CpuReading, SamplerError> {
        self.system.refresh_cpu_usage();

        let per_core: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|c| f64::from(c.cpu_usage()))
            .collect();
        if per_core.is_empty() {
            return Err(SamplerError::Unavailable("cpu list".into()));
        }

        let load_avg = if cfg!(target_os = "windows") {
            None
        } else {
            let load = System::load_average();
            Some(LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            })
        };

        Ok(CpuReading {
            usage: f64::from(self.system.global_cpu_usage()),
            per_core,
            load_avg,
            temperature: self.cpu_temperature(),
        })
    }

    fn memory(&mut self) -> Result<MemoryReading, SamplerError> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(SamplerError::Unavailable("memory totals".into()));
        }

        Ok(MemoryReading {
            total,
            used: self.system.used_memory(),
            free: self.system.free_memory(),
            swap_total: self.system.total_swap(),
            swap_used: self.system.used_swap(),
            swap_free: self.system.free_swap(),
        })
    }

    fn disks(&mut self) -> Result<DiskReading, SamplerError> {
        self.disks.refresh(true);

        // keyed by mount point so bind mounts of one device appear once
        let mut partitions = BTreeMap::new();
        for disk in self.disks.list() {
            let mount_point = disk.mount_point().to_string_lossy().into_owned();
            let total = disk.total_space();
            if total == 0 {
                warn!("[sampler] could not get usage for {mount_point}");
                continue;
            }
            let free = disk.available_space().min(total);
            let used = total - free;
            partitions.insert(
                mount_point.clone(),
                PartitionUsage {
                    device: disk.name().to_string_lossy().into_owned(),
                    mount_point,
                    fs_type: disk.file_system().to_string_lossy().into_owned(),
                    total,
                    used,
                    free,
                    used_percent: percent_of(used, total),
                },
            );
        }

        if partitions.is_empty() && self.disks.list().is_empty() {
            return Err(SamplerError::Unavailable("disk partitions".into()));
        }

        Ok(DiskReading {
            partitions: partitions.into_values().collect(),
            io_counters: self.disk_io_counters(),
        })
    }

    fn network(&mut self) -> Result<NetworkReading, SamplerError> {
        self.networks.refresh(true);

        let mut interfaces = Vec::new();
        let mut io_counters = BTreeMap::new();
        for (name, data) in self.networks.list().iter() {
            interfaces.push(InterfaceInfo {
                name: name.clone(),
                mac_address: data.mac_address().to_string(),
                addresses: data
                    .ip_networks()
                    .iter()
                    .map(|net| format!("{}/{}", net.addr, net.prefix))
                    .collect(),
            });
            io_counters.insert(
                name.clone(),
                NetIoCounters {
                    bytes_recv: data.total_received(),
                    bytes_sent: data.total_transmitted(),
                    packets_recv: data.total_packets_received(),
                    packets_sent: data.total_packets_transmitted(),
                },
            );
        }
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));

        let connections = match read_connections() {
            Ok(connections) => Some(connections),
            Err(e) => {
                warn!("[sampler] could not get network connections: {e}");
                None
            }
        };

        Ok(NetworkReading {
            interfaces,
            io_counters: Some(io_counters),
            connections,
        })
    }

    fn processes(&mut self) -> Result<Vec<ProcessRecord>, SamplerError> {
        self.system.refresh_memory();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let total_memory = self.system.total_memory();
        let records: Vec<ProcessRecord> = self
            .system
            .processes()
            .values()
            .map(|process| {
                let pid = process.pid().as_u32();
                let user = process
                    .user_id()
                    .and_then(|uid| self.users.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                #[cfg(not(target_os = "windows"))]
                let threads = process.tasks().map(|t| t.len());
                #[cfg(target_os = "windows")]
                let threads = None;

                ProcessRecord {
                    pid,
                    name: process.name().to_string_lossy().into_owned(),
                    user,
                    status: process.status().to_string(),
                    cpu_percent: f64::from(process.cpu_usage()),
                    mem_percent: percent_of(process.memory(), total_memory),
                    threads,
                    command: process
                        .cmd()
                        .iter()
                        .map(|arg| arg.to_string_lossy().into_owned())
                        .collect(),
                    parent_pid: process.parent().map(|p| p.as_u32()),
                    nice: process_nice(pid),
                    rss: process.memory(),
                    vms: process.virtual_memory(),
                }
            })
            .collect();

        if records.is_empty() {
            return Err(SamplerError::Unavailable("process table".into()));
        }
        Ok(records)
    }
}

#[cfg(target_os = "linux")]
fn read_diskstats() -> Result<BTreeMap<String, DiskIoCounters>, SamplerError> {
    const SECTOR_SIZE: u64 = 512;

    let stats = procfs::diskstats()?;
    Ok(stats
        .into_iter()
        .map(|s| {
            (
                s.name,
                DiskIoCounters {
                    read_bytes: s.sectors_read as u64 * SECTOR_SIZE,
                    write_bytes: s.sectors_written as u64 * SECTOR_SIZE,
                },
            )
        })
        .collect())
}

#[cfg(target_os = "linux")]
fn read_connections() -> Result<Vec<Connection>, SamplerError> {
    use procfs::net::{TcpNetEntry, UdpNetEntry};

    fn tcp(protocol: &str, entries: Vec<TcpNetEntry>) -> Vec<Connection> {
        let to_connection = |e: TcpNetEntry| Connection {
            protocol: protocol.to_string(),
            local_addr: e.local_address.to_string(),
            remote_addr: e.remote_address.to_string(),
            status: format!("{:?}", e.state),
            uid: Some(e.uid),
        };
        entries.into_iter().map(to_connection).collect()
    }

    fn udp(protocol: &str, entries: Vec<UdpNetEntry>) -> Vec<Connection> {
        let to_connection = |e: UdpNetEntry| Connection {
            protocol: protocol.to_string(),
            local_addr: e.local_address.to_string(),
            remote_addr: e.remote_address.to_string(),
            status: format!("{:?}", e.state),
            uid: Some(e.uid),
        };
        entries.into_iter().map(to_connection).collect()
    }

    merge_tables(vec![
        ("tcp", procfs::net::tcp().map(|t| tcp("tcp", t))),
        ("tcp6", procfs::net::tcp6().map(|t| tcp("tcp6", t))),
        ("udp", procfs::net::udp().map(|t| udp("udp", t))),
        ("udp6", procfs::net::udp6().map(|t| udp("udp6", t))),
    ])
}

/// Each socket table stands alone: a host without IPv6 has no `tcp6`.
/// Fails only when no table could be read at all.
#[cfg(target_os = "linux")]
fn merge_tables(
    tables: Vec<(&str, procfs::ProcResult<Vec<Connection>>)>,
) -> Result<Vec<Connection>, SamplerError> {
    let mut connections = Vec::new();
    let mut read_any = false;
    let mut last_err = None;

    for (protocol, table) in tables {
        match table {
            Ok(entries) => {
                read_any = true;
                connections.extend(entries);
            }
            Err(procfs::ProcError::NotFound(_)) => {
                debug!("[sampler] no {protocol} socket table, skipping");
            }
            Err(e) => {
                warn!("[sampler] could not read {protocol} socket table: {e}");
                last_err = Some(e);
            }
        }
    }

    match (read_any, last_err) {
        (true, _) => Ok(connections),
        (false, Some(e)) => Err(e.into()),
        (false, None) => Err(SamplerError::Unavailable("socket tables".into())),
    }
}

#[cfg(not(target_os = "linux"))]
fn read_connections() -> Result<Vec<Connection>, SamplerError> {
    Err(SamplerError::Unavailable("socket tables".into()))
}

#[cfg(target_os = "linux")]
fn process_nice(pid: u32) -> Option<i64> {
    let pid = i32::try_from(pid).ok()?;
    procfs::process::Process::new(pid)
        .and_then(|p| p.stat())
        .map(|stat| stat.nice)
        .ok()
}

#[cfg(not(target_os = "linux"))]
fn process_nice(_pid: u32) -> Option<i64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_local_host_without_nan() {
        let mut sampler = HostSampler::new();

        let cpu = sampler.cpu().unwrap();
        assert!(cpu.usage.is_finite());
        assert_eq!(cpu.per_core.len(), sampler.system.cpus().len());

        let memory = sampler.memory().unwrap();
        assert!(memory.total > 0);
        assert!(memory.used <= memory.total);
    }

    #[test]
    fn process_table_includes_self() {
        let mut sampler = HostSampler::new();
        let processes = sampler.processes().unwrap();
        let me = std::process::id();
        let record = processes.iter().find(|p| p.pid == me);
        assert!(record.is_some(), "own pid {me} should be listed");
        assert!(record.unwrap().mem_percent >= 0.0);
    }

    #[cfg(target_os = "linux")]
    fn listener() -> Connection {
        Connection {
            protocol: "tcp".into(),
            local_addr: "0.0.0.0:22".into(),
            remote_addr: "0.0.0.0:0".into(),
            status: "Listen".into(),
            uid: Some(0),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn missing_socket_tables_are_skipped() {
        let no_ipv6 = procfs::ProcError::NotFound(Some("/proc/net/tcp6".into()));
        let tables = vec![
            ("tcp", Ok(vec![listener()])),
            ("tcp6", Err(no_ipv6)),
            ("udp", Ok(Vec::new())),
            ("udp6", Err(procfs::ProcError::NotFound(None))),
        ];
        assert_eq!(merge_tables(tables).unwrap(), vec![listener()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn connections_fail_when_no_table_is_readable() {
        let tables = vec![
            ("tcp", Err(procfs::ProcError::PermissionDenied(None))),
            ("tcp6", Err(procfs::ProcError::NotFound(None))),
        ];
        assert!(matches!(merge_tables(tables), Err(SamplerError::Proc(_))));

        let tables = vec![("tcp6", Err(procfs::ProcError::NotFound(None)))];
        let err = merge_tables(tables).unwrap_err();
        assert!(matches!(err, SamplerError::Unavailable(_)));
    }
}
