/// Bounded per-unit reading history and summary statistics
use std::collections::{HashMap, VecDeque};

use crate::models::Reading;

pub const DEFAULT_CAPACITY: usize = 50;

/// Mean, max and min of one numeric field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl FieldStats {
    fn over(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;

        for value in values {
            count += 1;
            sum += value;
            max = max.max(value);
            min = min.min(value);
        }

        if count == 0 {
            return None;
        }

        Some(FieldStats {
            mean: sum / count as f64,
            max,
            min,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub voltage: FieldStats,
    pub current: FieldStats,
    pub power: FieldStats,
    pub samples: usize,
}

/// Readings kept per unit, oldest first, capped at `capacity`
///
/// Each unit's window is independent: appending to one unit never evicts
/// from another.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    windows: HashMap<String, VecDeque<Reading>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        HistoryStore {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&mut self, unit_id: &str, reading: Reading) {
        let capacity = self.capacity;
        let window = self
            .windows
            .entry(unit_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));

        window.push_back(reading);
        while window.len() > capacity {
            window.pop_front();
        }
    }

    pub fn len(&self, unit_id: &str) -> usize {
        self.windows.get(unit_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, unit_id: &str) -> bool {
        self.len(unit_id) == 0
    }

    /// Readings for a unit in insertion order
    pub fn readings(&self, unit_id: &str) -> impl Iterator<Item = &Reading> + '_ {
        self.windows.get(unit_id).into_iter().flatten()
    }

    /// Statistics over the unit's current window, `None` when there is no data
    pub fn summary(&self, unit_id: &str) -> Option<HistorySummary> {
        let window = self.windows.get(unit_id)?;

        Some(HistorySummary {
            voltage: FieldStats::over(window.iter().map(|r| r.voltage))?,
            current: FieldStats::over(window.iter().map(|r| r.current))?,
            power: FieldStats::over(window.iter().map(|r| r.power))?,
            samples: window.len(),
        })
    }
}
