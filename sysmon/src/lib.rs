pub mod alerts;
pub mod collector;
pub mod config;
pub mod ranking;
pub mod rates;
pub mod sampler;
pub mod service;
pub mod timeseries;
pub mod types;
pub mod ui;

pub use alerts::{Alert, AlertLevel, AlertManager, AlertSource, Thresholds};
pub use collector::{CollectError, Collection, Collector, CollectorConfig, SubsystemFailure};
pub use config::{Config, ConfigError};
pub use ranking::SortKey;
pub use sampler::{HostSampler, Sampler, SamplerError, Subsystem};
pub use service::{MonitorHandle, MonitorService, collect_blocking};
pub use timeseries::TimeSeries;
pub use types::Snapshot;
