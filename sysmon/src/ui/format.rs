use colored::{ColoredString, Colorize};
use std::time::Duration;

/// Binary units: `1536` -> `1.5 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {unit}iB", bytes as f64 / div as f64)
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0).round() as u64))
}

/// `3d 4h 5m`, `4h 5m` or `5m`.
pub fn format_duration(d: Duration) -> String {
    let total_minutes = d.as_secs() / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Percentage colored green below 60, yellow below 85, red above.
pub fn format_percent(value: f64) -> ColoredString {
    let text = format!("{value:.1}%");
    if value < 60.0 {
        text.green()
    } else if value < 85.0 {
        text.yellow()
    } else {
        text.red()
    }
}

/// `label ████░░░░ 42.0%`; the filled part is colored like `format_percent`.
pub fn progress_bar(label: &str, value: f64, width: usize) -> String {
    let width = width.max(10);
    let filled = ((value.clamp(0.0, 100.0) / 100.0) * width as f64) as usize;
    let filled = filled.min(width);
    let bar = "█".repeat(filled);
    let bar = if value < 60.0 {
        bar.green()
    } else if value < 85.0 {
        bar.yellow()
    } else {
        bar.red()
    };
    format!(
        "{label} {bar}{} {}",
        "░".repeat(width - filled),
        format_percent(value)
    )
}
