//! Plain-text dashboard rendered from a published `Collection`.
//!
//! Rendering never touches the collector; it only reads the immutable
//! snapshot it is handed.

pub mod format;
pub mod sparkline;

use crate::alerts::{Alert, AlertLevel};
use crate::collector::Collection;
use crate::ranking::SortKey;
use crate::types::Snapshot;
use colored::*;
use format::{format_bytes, format_duration, format_percent, format_rate, progress_bar};
use std::fmt;

const BAR_WIDTH: usize = 30;
const SPARK_WIDTH: usize = 40;
const OVERVIEW_PROCESSES: usize = 5;
const OVERVIEW_ALERTS: usize = 3;
const MAX_CONNECTIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Overview,
    Cpu,
    Memory,
    Disk,
    Network,
    Processes,
    Alerts,
}

impl View {
    pub const ALL: [View; 7] = [
        Self::Overview,
        Self::Cpu,
        Self::Memory,
        Self::Disk,
        Self::Network,
        Self::Processes,
        Self::Alerts,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
            Self::Disk => "Disk",
            Self::Network => "Network",
            Self::Processes => "Processes",
            Self::Alerts => "Alerts",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// A line typed by the user on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Sort(SortKey),
    Refresh,
    Show(View),
    NextView,
    PrevView,
    Quit,
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        // `1`..`4` pick sort keys in `SortKey::ALL` order
        if let Ok(n @ 1..=4) = line.parse::<usize>() {
            return Some(Self::Sort(SortKey::ALL[n - 1]));
        }
        let input = match line {
            "r" => Self::Refresh,
            "n" => Self::NextView,
            "p" => Self::PrevView,
            "o" => Self::Show(View::Overview),
            "c" => Self::Show(View::Cpu),
            "m" => Self::Show(View::Memory),
            "d" => Self::Show(View::Disk),
            "i" => Self::Show(View::Network),
            "t" => Self::Show(View::Processes),
            "a" => Self::Show(View::Alerts),
            "q" => Self::Quit,
            _ => return None,
        };
        Some(input)
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    view: View,
    max_processes: usize,
}

impl Dashboard {
    pub fn new(max_processes: usize) -> Self {
        Self {
            view: View::default(),
            max_processes: max_processes.max(1),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn show(&mut self, view: View) {
        self.view = view;
    }

    pub fn next_view(&mut self) {
        self.view = self.view.next();
    }

    pub fn prev_view(&mut self) {
        self.view = self.view.prev();
    }

    pub fn render(&self, collection: &Collection) -> String {
        Frame {
            dashboard: self,
            collection,
        }
        .to_string()
    }
}

struct Frame<'a> {
    dashboard: &'a Dashboard,
    collection: &'a Collection,
}

impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap: &Snapshot = &self.collection.snapshot;
        self.header(f, snap)?;
        match self.dashboard.view {
            View::Overview => self.overview(f, snap)?,
            View::Cpu => cpu_view(f, snap)?,
            View::Memory => memory_view(f, snap)?,
            View::Disk => disk_view(f, snap)?,
            View::Network => network_view(f, snap)?,
            View::Processes => processes_view(f, snap, self.dashboard.max_processes)?,
            View::Alerts => {
                writeln!(f, "{}", "Alerts".bold())?;
                if snap.alerts.is_empty() {
                    writeln!(f, "{}", "  no alerts".dimmed())?;
                }
                for alert in &snap.alerts {
                    alert_line(f, alert)?;
                }
            }
        }
        writeln!(f)?;
        write!(
            f,
            "{}",
            "[1-4] sort  [r] refresh  [n/p] view  [o c m d i t a] jump  [q] quit".dimmed()
        )
    }
}

impl Frame<'_> {
    fn header(&self, f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
        let sys = &snap.system;
        writeln!(
            f,
            "{}  {} {}  kernel {}  up {}  {}",
            sys.hostname.bold().cyan(),
            sys.os,
            sys.platform.dimmed(),
            sys.kernel_version,
            format_duration(sys.uptime),
            sys.captured_at.format("%H:%M:%S").to_string().dimmed()
        )?;

        let tabs: Vec<String> = View::ALL
            .iter()
            .map(|v| {
                if *v == self.dashboard.view {
                    format!("[{}]", v.title()).bold().to_string()
                } else {
                    v.title().dimmed().to_string()
                }
            })
            .collect();
        writeln!(f, "{}", tabs.join(" "))?;

        for failure in &self.collection.failures {
            writeln!(
                f,
                "{}",
                format!("stale {}: {}", failure.subsystem, failure.message).yellow()
            )?;
        }
        writeln!(f)
    }

    fn overview(&self, f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
        writeln!(f, "{}", progress_bar("CPU ", snap.cpu.usage, BAR_WIDTH))?;
        let mem = &snap.memory;
        writeln!(f, "{}", progress_bar("MEM ", mem.used_percent, BAR_WIDTH))?;
        if mem.swap_total > 0 {
            writeln!(f, "{}", progress_bar("SWAP", mem.swap_percent, BAR_WIDTH))?;
        }
        if let Some(l) = snap.cpu.load_avg {
            writeln!(f, "load {:.2} {:.2} {:.2}", l.one, l.five, l.fifteen)?;
        }

        writeln!(f)?;
        for part in &snap.disk.partitions {
            writeln!(
                f,
                "{:<20} {}",
                part.mount_point,
                format_percent(part.used_percent)
            )?;
        }

        let (recv, sent) = snap.network.io_rates.values().fold((0.0, 0.0), |acc, r| {
            (acc.0 + r.recv_bytes_per_sec, acc.1 + r.sent_bytes_per_sec)
        });
        writeln!(f, "net  rx {}  tx {}", format_rate(recv), format_rate(sent))?;

        writeln!(f)?;
        writeln!(
            f,
            "{}",
            format!("Top processes by {}", snap.process.sort_by.label()).bold()
        )?;
        process_table(f, snap, OVERVIEW_PROCESSES)?;

        let unresolved: Vec<&Alert> = snap
            .alerts
            .iter()
            .filter(|a| !a.resolved)
            .take(OVERVIEW_ALERTS)
            .collect();
        if !unresolved.is_empty() {
            writeln!(f)?;
            for alert in unresolved {
                alert_line(f, alert)?;
            }
        }
        Ok(())
    }
}

fn cpu_view(f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
    let cpu = &snap.cpu;
    writeln!(f, "{}", progress_bar("total", cpu.usage, BAR_WIDTH))?;
    let spark = sparkline::sparkline(&cpu.history, SPARK_WIDTH);
    writeln!(f, "      {spark}")?;
    writeln!(f)?;
    for (i, usage) in cpu.per_core.iter().enumerate() {
        let label = format!("cpu{i:<2}");
        writeln!(f, "{}", progress_bar(&label, *usage, BAR_WIDTH))?;
    }
    writeln!(f)?;
    writeln!(f, "cores {}", cpu.cores)?;
    match cpu.load_avg {
        Some(l) => writeln!(f, "load  {:.2} {:.2} {:.2}", l.one, l.five, l.fifteen)?,
        None => writeln!(f, "load  {}", "n/a".dimmed())?,
    }
    match cpu.temperature {
        Some(t) => writeln!(f, "temp  {t:.1}°C"),
        None => writeln!(f, "temp  {}", "n/a".dimmed()),
    }
}

fn memory_view(f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
    let mem = &snap.memory;
    writeln!(f, "{}", progress_bar("RAM ", mem.used_percent, BAR_WIDTH))?;
    let spark = sparkline::sparkline(&mem.history, SPARK_WIDTH);
    writeln!(f, "     {spark}")?;
    writeln!(
        f,
        "     used {} / {}  free {}",
        format_bytes(mem.used),
        format_bytes(mem.total),
        format_bytes(mem.free)
    )?;
    writeln!(f)?;
    if mem.swap_total == 0 {
        return writeln!(f, "SWAP {}", "none".dimmed());
    }
    writeln!(f, "{}", progress_bar("SWAP", mem.swap_percent, BAR_WIDTH))?;
    writeln!(
        f,
        "     used {} / {}  free {}",
        format_bytes(mem.swap_used),
        format_bytes(mem.swap_total),
        format_bytes(mem.swap_free)
    )
}

fn disk_view(f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
    writeln!(
        f,
        "{}",
        format!(
            "{:<20} {:<16} {:<8} {:>10} {:>10} {:>7}",
            "MOUNT", "DEVICE", "FS", "USED", "TOTAL", "USE%"
        )
        .bold()
    )?;
    for part in &snap.disk.partitions {
        writeln!(
            f,
            "{:<20} {:<16} {:<8} {:>10} {:>10} {:>7}",
            part.mount_point,
            part.device,
            part.fs_type,
            format_bytes(part.used),
            format_bytes(part.total),
            format_percent(part.used_percent)
        )?;
    }

    writeln!(f)?;
    writeln!(
        f,
        "{}",
        format!("{:<16} {:>14} {:>14}", "DEVICE", "READ", "WRITE").bold()
    )?;
    for (name, rates) in &snap.disk.io_rates {
        writeln!(
            f,
            "{:<16} {:>14} {:>14}",
            name,
            format_rate(rates.read_bytes_per_sec),
            format_rate(rates.write_bytes_per_sec)
        )?;
    }
    Ok(())
}

fn network_view(f: &mut fmt::Formatter<'_>, snap: &Snapshot) -> fmt::Result {
    let net = &snap.network;
    writeln!(
        f,
        "{}",
        format!(
            "{:<16} {:>14} {:>14} {:>12} {:>12}",
            "INTERFACE", "RX", "TX", "RX TOTAL", "TX TOTAL"
        )
        .bold()
    )?;
    for (name, rates) in &net.io_rates {
        let totals = net.io_counters.get(name).copied().unwrap_or_default();
        writeln!(
            f,
            "{:<16} {:>14} {:>14} {:>12} {:>12}",
            name,
            format_rate(rates.recv_bytes_per_sec),
            format_rate(rates.sent_bytes_per_sec),
            format_bytes(totals.bytes_recv),
            format_bytes(totals.bytes_sent)
        )?;
    }

    writeln!(f)?;
    for iface in &net.interfaces {
        writeln!(
            f,
            "{:<16} {}  {}",
            iface.name,
            iface.mac_address.dimmed(),
            iface.addresses.join(", ")
        )?;
    }

    writeln!(f)?;
    writeln!(
        f,
        "{}",
        format!("Connections ({})", net.connections.len()).bold()
    )?;
    for conn in net.connections.iter().take(MAX_CONNECTIONS) {
        writeln!(
            f,
            "{:<5} {:<28} {:<28} {}",
            conn.protocol, conn.local_addr, conn.remote_addr, conn.status
        )?;
    }
    Ok(())
}

fn processes_view(f: &mut fmt::Formatter<'_>, snap: &Snapshot, rows: usize) -> fmt::Result {
    writeln!(
        f,
        "{}",
        format!(
            "{} processes, sorted by {}",
            snap.process.total,
            snap.process.sort_by.label()
        )
        .bold()
    )?;
    process_table(f, snap, rows)
}

fn process_table(f: &mut fmt::Formatter<'_>, snap: &Snapshot, rows: usize) -> fmt::Result {
    writeln!(
        f,
        "{}",
        format!(
            "{:>7} {:<12} {:>6} {:>6} {:>5} {:<10} {}",
            "PID", "USER", "CPU%", "MEM%", "THR", "STATUS", "NAME"
        )
        .dimmed()
    )?;
    for p in snap.process.processes.iter().take(rows) {
        let threads = p
            .threads
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            f,
            "{:>7} {:<12} {:>6.1} {:>6.1} {:>5} {:<10} {}",
            p.pid,
            truncate(&p.user, 12),
            p.cpu_percent,
            p.mem_percent,
            threads,
            truncate(&p.status, 10),
            p.name
        )?;
    }
    Ok(())
}

fn alert_line(f: &mut fmt::Formatter<'_>, alert: &Alert) -> fmt::Result {
    let line = format!(
        "{} {:<8} {}",
        alert.timestamp.format("%H:%M:%S"),
        alert.level.to_string().to_uppercase(),
        alert.message
    );
    let line = if alert.resolved {
        line.dimmed()
    } else {
        match alert.level {
            AlertLevel::Critical => line.red().bold(),
            AlertLevel::Warning => line.yellow(),
            AlertLevel::Info => line.blue(),
        }
    };
    writeln!(f, "{line}")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
