use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

/// Fixed-capacity series of samples, oldest first. Appending past capacity
/// evicts from the front.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries<T = f64> {
    capacity: usize,
    points: VecDeque<Point<T>>,
}

impl<T: Copy> TimeSeries<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, value: T, timestamp: DateTime<Utc>) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(Point { timestamp, value });
    }

    pub fn points(&self) -> std::collections::vec_deque::Iter<'_, Point<T>> {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<T> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn latest(&self) -> Option<T> {
        self.points.back().map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Copy> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut series = TimeSeries::with_capacity(60);
        for i in 0..65 {
            series.append(i as f64, at(i));
        }

        assert_eq!(series.len(), 60);
        let values = series.values();
        assert_eq!(values.first(), Some(&5.0));
        assert_eq!(values.last(), Some(&64.0));
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn timestamps_stay_oldest_to_newest() {
        let mut series = TimeSeries::with_capacity(3);
        let start = at(0);
        for i in 0..5 {
            series.append(1.0, start + Duration::seconds(i));
        }
        let stamps: Vec<_> = series.points().map(|p| p.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                start + Duration::seconds(2),
                start + Duration::seconds(3),
                start + Duration::seconds(4)
            ]
        );
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut series: TimeSeries<u64> = TimeSeries::with_capacity(0);
        series.append(1, at(0));
        series.append(2, at(1));
        assert_eq!(series.capacity(), 1);
        assert_eq!(series.latest(), Some(2));
    }

    #[test]
    fn default_capacity_is_sixty() {
        let series: TimeSeries = TimeSeries::default();
        assert_eq!(series.capacity(), DEFAULT_CAPACITY);
        assert!(series.is_empty());
        assert_eq!(series.latest(), None);
    }
}
