//! Threshold alerts with hysteresis-gated resolution.
//!
//! The manager owns a bounded, newest-first list of alerts. At most one
//! unresolved alert exists per source; a resolved alert is never reopened,
//! a returning condition is raised as a new alert instead.

use crate::types::Snapshot;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;

/// Points below the CPU threshold usage must fall before the alert resolves.
pub const CPU_BAND: f64 = 10.0;
pub const MEMORY_BAND: f64 = 10.0;
pub const SWAP_BAND: f64 = 10.0;
/// Disk usage moves slowly, so its band is tighter.
pub const DISK_BAND: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Identifies the condition an alert is about. Rendered as the stable string
/// key used for display and serialization, e.g. `disk_usage_/mnt/data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertSource {
    CpuUsage,
    MemoryUsage,
    SwapUsage,
    DiskUsage(String),
    /// Notice that the wrapped condition returned to normal.
    Resolved(Box<AlertSource>),
}

impl AlertSource {
    pub fn disk(mount_point: impl Into<String>) -> Self {
        Self::DiskUsage(mount_point.into())
    }

    pub fn resolved(self) -> Self {
        Self::Resolved(Box::new(self))
    }
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuUsage => f.write_str("cpu_usage"),
            Self::MemoryUsage => f.write_str("memory_usage"),
            Self::SwapUsage => f.write_str("swap_usage"),
            Self::DiskUsage(mount) => write!(f, "disk_usage_{mount}"),
            Self::Resolved(inner) => write!(f, "{inner}_resolved"),
        }
    }
}

impl Serialize for AlertSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: AlertLevel,
    pub source: AlertSource,
    pub resolved: bool,
}

/// Usage percentages (0-100) at which alerts are raised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub swap: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 85.0,
            memory: 85.0,
            disk: 90.0,
            swap: 80.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertManager {
    alerts: VecDeque<Alert>,
    max_alerts: usize,
    thresholds: Thresholds,
}

impl AlertManager {
    pub fn new(thresholds: Thresholds, max_alerts: usize) -> Self {
        let max_alerts = max_alerts.max(1);
        Self {
            alerts: VecDeque::with_capacity(max_alerts),
            max_alerts,
            thresholds,
        }
    }

    /// Raise an alert. Returns `false` when an unresolved alert with the same
    /// source and level already exists. An unresolved alert for the same
    /// source at another level is resolved first, since the condition
    /// changed severity.
    pub fn add_alert(
        &mut self,
        message: impl Into<String>,
        level: AlertLevel,
        source: AlertSource,
    ) -> bool {
        if self
            .alerts
            .iter()
            .any(|a| !a.resolved && a.source == source && a.level == level)
        {
            return false;
        }

        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| !a.resolved && a.source == source)
        {
            debug!(
                "[alerts] {} changed severity {} -> {}",
                alert.source, alert.level, level
            );
            alert.resolved = true;
        }

        let message = message.into();
        match level {
            AlertLevel::Critical => warn!("[alerts] {level} {source}: {message}"),
            _ => info!("[alerts] {level} {source}: {message}"),
        }

        self.alerts.push_front(Alert {
            timestamp: Utc::now(),
            message,
            level,
            source,
            resolved: false,
        });

        if self.alerts.len() > self.max_alerts {
            let dropped = self.alerts.len() - self.max_alerts;
            self.alerts.truncate(self.max_alerts);
            debug!("[alerts] trimmed {dropped} oldest alert(s)");
        }
        true
    }

    /// Resolve the first unresolved alert for `source` and post an
    /// informational notice. Returns `false` when nothing was open.
    pub fn resolve_alert(&mut self, source: &AlertSource) -> bool {
        let Some(alert) = self
            .alerts
            .iter_mut()
            .find(|a| !a.resolved && &a.source == source)
        else {
            return false;
        };
        alert.resolved = true;

        self.add_alert(
            format!("{source} has returned to normal levels"),
            AlertLevel::Info,
            source.clone().resolved(),
        );
        true
    }

    /// Evaluate the per-tick thresholds against freshly assembled metrics.
    /// Every decision is made from current values and the alert list alone.
    pub fn check_resource_alerts(&mut self, snapshot: &Snapshot) {
        let t = self.thresholds;

        let cpu = snapshot.cpu.usage;
        self.evaluate(
            cpu,
            t.cpu,
            CPU_BAND,
            AlertLevel::Critical,
            AlertSource::CpuUsage,
            || format!("CPU usage is high ({cpu:.1}%)"),
        );

        let mem = snapshot.memory.used_percent;
        self.evaluate(
            mem,
            t.memory,
            MEMORY_BAND,
            AlertLevel::Critical,
            AlertSource::MemoryUsage,
            || format!("Memory usage is high ({mem:.1}%)"),
        );

        if snapshot.memory.swap_total > 0 {
            let swap = snapshot.memory.swap_percent;
            self.evaluate(
                swap,
                t.swap,
                SWAP_BAND,
                AlertLevel::Warning,
                AlertSource::SwapUsage,
                || format!("Swap usage is high ({swap:.1}%)"),
            );
        }

        for partition in &snapshot.disk.partitions {
            let used = partition.used_percent;
            let mount = &partition.mount_point;
            self.evaluate(
                used,
                t.disk,
                DISK_BAND,
                AlertLevel::Warning,
                AlertSource::disk(mount.clone()),
                || format!("Disk usage on {mount} is high ({used:.1}%)"),
            );
        }
    }

    fn evaluate(
        &mut self,
        value: f64,
        threshold: f64,
        band: f64,
        level: AlertLevel,
        source: AlertSource,
        message: impl FnOnce() -> String,
    ) {
        if value >= threshold {
            self.add_alert(message(), level, source);
        } else if value < threshold - band {
            self.resolve_alert(&source);
        }
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.resolved)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn max_alerts(&self) -> usize {
        self.max_alerts
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }
}
