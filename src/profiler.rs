use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::gpu::passes::PassStage;

/// Per-stage submission counters and encode+submit timings for one session.
#[derive(Debug, Default)]
pub struct Profiler {
    timers: HashMap<PassStage, Instant>,
    measurements: HashMap<PassStage, MeasurementStats>,
    counters: HashMap<PassStage, u64>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer(&mut self, stage: PassStage) {
        tracing::trace!(stage = stage.label(), "start_timer");
        self.timers.insert(stage, Instant::now());
    }

    pub fn end_timer(&mut self, stage: PassStage) {
        if let Some(start) = self.timers.remove(&stage) {
            let duration = start.elapsed();
            tracing::debug!(stage = stage.label(), duration_us = ?duration.as_micros(), "end_timer");
            self.add_measurement(stage, duration);
        }
    }

    pub fn increment_counter(&mut self, stage: PassStage) {
        *self.counters.entry(stage).or_insert(0) += 1;
    }

    pub fn add_measurement(&mut self, stage: PassStage, duration: Duration) {
        self.measurements
            .entry(stage)
            .and_modify(|m| m.record(duration))
            .or_insert_with(|| MeasurementStats::first(duration));
    }

    pub fn get_stats(&self) -> PassStats {
        PassStats {
            measurements: self.measurements.clone(),
            counters: self.counters.clone(),
        }
    }
}

/// Running aggregate of stage durations.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementStats {
    pub count: usize,
    pub total_time: Duration,
    pub min_time: Duration,
    pub max_time: Duration,
}

impl MeasurementStats {
    fn first(duration: Duration) -> Self {
        Self {
            count: 1,
            total_time: duration,
            min_time: duration,
            max_time: duration,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_time += duration;
        self.min_time = self.min_time.min(duration);
        self.max_time = self.max_time.max(duration);
    }

    pub fn average_time(&self) -> Duration {
        if self.count == 0 {
            Duration::default()
        } else {
            self.total_time / self.count as u32
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassStats {
    pub measurements: HashMap<PassStage, MeasurementStats>,
    pub counters: HashMap<PassStage, u64>,
}

impl PassStats {
    /// Number of command submissions made for `stage`.
    pub fn submissions(&self, stage: PassStage) -> u64 {
        self.counters.get(&stage).copied().unwrap_or(0)
    }

    pub fn total_submissions(&self) -> u64 {
        self.counters.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_aggregates_per_stage() {
        let mut profiler = Profiler::new();
        profiler.increment_counter(PassStage::Tensor);
        profiler.increment_counter(PassStage::Composite);
        profiler.increment_counter(PassStage::Composite);
        profiler.add_measurement(PassStage::Composite, Duration::from_millis(4));
        profiler.add_measurement(PassStage::Composite, Duration::from_millis(2));

        let stats = profiler.get_stats();
        assert_eq!(stats.submissions(PassStage::Tensor), 1);
        assert_eq!(stats.submissions(PassStage::Composite), 2);
        assert_eq!(stats.submissions(PassStage::BlurVertical), 0);
        assert_eq!(stats.total_submissions(), 3);

        let composite = &stats.measurements[&PassStage::Composite];
        assert_eq!(composite.count, 2);
        assert_eq!(composite.min_time, Duration::from_millis(2));
        assert_eq!(composite.max_time, Duration::from_millis(4));
        assert_eq!(composite.average_time(), Duration::from_millis(3));
    }
}
