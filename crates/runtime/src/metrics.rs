use std::collections::BTreeMap;

/// Counters kept by the synchronization engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Counter {
    GateAccepted,
    GateOverflow,
    GateFailed,
    StaleLoadDropped,
    EventsAdded,
    EventsEvicted,
    ClockPushes,
    EchoesSuppressed,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::GateAccepted => "gate.accepted",
            Counter::GateOverflow => "gate.overflow",
            Counter::GateFailed => "gate.failed",
            Counter::StaleLoadDropped => "load.stale_dropped",
            Counter::EventsAdded => "index.events_added",
            Counter::EventsEvicted => "index.events_evicted",
            Counter::ClockPushes => "playback.clock_pushes",
            Counter::EchoesSuppressed => "playback.echoes_suppressed",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Histogram {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }
}

/// Deterministic metrics aggregation.
///
/// Sorted maps keep snapshots stable for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<Counter, u64>,
    hit_totals: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, counter: Counter, by: u64) {
        *self.counters.entry(counter).or_insert(0) += by;
    }

    /// Records the summed hit count of one gate pass.
    pub fn record_hit_total(&mut self, total: u64) {
        self.hit_totals.record(total);
    }

    pub fn hit_totals(&self) -> Histogram {
        self.hit_totals
    }

    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters.iter().map(|(k, v)| (k.name(), *v)).collect()
    }
}
