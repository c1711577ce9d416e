//! Per-second throughput derived from cumulative IO counters.

use crate::types::{DiskIoCounters, NetIoCounters};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Elapsed intervals shorter than this are replaced by one second.
const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// `(current - previous) / elapsed_secs`. A counter that went backwards
/// (device reset, wraparound) yields 0 rather than a negative rate.
pub fn rate(current: u64, previous: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / elapsed_secs
}

/// Seconds between two ticks, with the one-second fallback for
/// identical or sub-millisecond timestamps.
pub fn effective_elapsed(elapsed: Duration) -> f64 {
    if elapsed < MIN_ELAPSED {
        1.0
    } else {
        elapsed.as_secs_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DiskRates {
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NetRates {
    pub recv_bytes_per_sec: f64,
    pub sent_bytes_per_sec: f64,
}

/// A set of cumulative counters that can be turned into rates against an
/// earlier reading of the same device.
pub trait Cumulative: Clone {
    type Rates: Default + Copy;

    fn rates_since(&self, previous: &Self, elapsed_secs: f64) -> Self::Rates;
}

impl Cumulative for DiskIoCounters {
    type Rates = DiskRates;

    fn rates_since(&self, previous: &Self, elapsed_secs: f64) -> DiskRates {
        DiskRates {
            read_bytes_per_sec: rate(self.read_bytes, previous.read_bytes, elapsed_secs),
            write_bytes_per_sec: rate(self.write_bytes, previous.write_bytes, elapsed_secs),
        }
    }
}

impl Cumulative for NetIoCounters {
    type Rates = NetRates;

    fn rates_since(&self, previous: &Self, elapsed_secs: f64) -> NetRates {
        NetRates {
            recv_bytes_per_sec: rate(self.bytes_recv, previous.bytes_recv, elapsed_secs),
            sent_bytes_per_sec: rate(self.bytes_sent, previous.bytes_sent, elapsed_secs),
        }
    }
}

/// Last counter reading per device or interface. Replaced wholesale on every
/// tick, so a device that disappears and comes back starts from zero again.
#[derive(Debug, Clone)]
pub struct PrevCounterCache<C> {
    previous: HashMap<String, C>,
}

impl<C: Cumulative> PrevCounterCache<C> {
    pub fn new() -> Self {
        Self {
            previous: HashMap::new(),
        }
    }

    /// Compute rates for every device in `current` and remember `current` for
    /// the next tick. Devices seen for the first time report zero rates.
    pub fn advance(
        &mut self,
        current: &BTreeMap<String, C>,
        elapsed_secs: f64,
    ) -> BTreeMap<String, C::Rates> {
        let rates = current
            .iter()
            .map(|(name, counters)| {
                let rates = self
                    .previous
                    .get(name)
                    .map(|prev| counters.rates_since(prev, elapsed_secs))
                    .unwrap_or_default();
                (name.clone(), rates)
            })
            .collect();

        self.previous = current
            .iter()
            .map(|(name, counters)| (name.clone(), counters.clone()))
            .collect();

        rates
    }

    /// Forget every device, e.g. after a tick whose counters could not be
    /// read, so the next delta is not stretched over two intervals.
    pub fn clear(&mut self) {
        self.previous.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.previous.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

impl<C: Cumulative> Default for PrevCounterCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(read: u64, write: u64) -> DiskIoCounters {
        DiskIoCounters {
            read_bytes: read,
            write_bytes: write,
        }
    }

    #[test]
    fn test_rate_basic() {
        assert_eq!(rate(1100, 100, 10.0), 100.0);
        assert_eq!(rate(500, 500, 1.0), 0.0);
    }

    #[test]
    fn test_rate_clamps_counter_reset() {
        assert_eq!(rate(10, 5_000, 1.0), 0.0);
    }

    #[test]
    fn test_effective_elapsed_fallback() {
        assert_eq!(effective_elapsed(Duration::ZERO), 1.0);
        assert_eq!(effective_elapsed(Duration::from_micros(300)), 1.0);
        assert_eq!(effective_elapsed(Duration::from_millis(500)), 0.5);
    }

    #[test]
    fn first_sample_reports_zero() {
        let mut cache = PrevCounterCache::new();
        let mut current = BTreeMap::new();
        current.insert("sda".to_string(), disk(1_000, 2_000));

        let rates = cache.advance(&current, 1.0);
        assert_eq!(rates["sda"], DiskRates::default());
        assert!(cache.contains("sda"));
    }

    #[test]
    fn second_sample_uses_previous() {
        let mut cache = PrevCounterCache::new();
        let mut current = BTreeMap::new();
        current.insert("sda".to_string(), disk(100, 0));
        cache.advance(&current, 10.0);

        current.insert("sda".to_string(), disk(1_100, 500));
        current.insert("sdb".to_string(), disk(42, 42));
        let rates = cache.advance(&current, 10.0);

        assert_eq!(rates["sda"].read_bytes_per_sec, 100.0);
        assert_eq!(rates["sda"].write_bytes_per_sec, 50.0);
        assert_eq!(rates["sdb"], DiskRates::default());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn vanished_device_is_forgotten() {
        let mut cache: PrevCounterCache<NetIoCounters> = PrevCounterCache::new();
        let mut current = BTreeMap::new();
        current.insert("eth0".to_string(), NetIoCounters::default());
        cache.advance(&current, 1.0);

        cache.advance(&BTreeMap::new(), 1.0);
        assert!(cache.is_empty());
    }
}
