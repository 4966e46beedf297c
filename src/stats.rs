use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Why the sink pipeline discarded an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    HostBusy,
    Trivial,
    NoOwner,
    FrameworkNoise,
    Binary,
    FilePolicy,
    NoValidOwner,
    Duplicate,
    Superset,
}

impl DropReason {
    const ALL: [DropReason; 9] = [
        DropReason::HostBusy,
        DropReason::Trivial,
        DropReason::NoOwner,
        DropReason::FrameworkNoise,
        DropReason::Binary,
        DropReason::FilePolicy,
        DropReason::NoValidOwner,
        DropReason::Duplicate,
        DropReason::Superset,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::HostBusy => "host_busy",
            DropReason::Trivial => "trivial",
            DropReason::NoOwner => "no_owner",
            DropReason::FrameworkNoise => "framework_noise",
            DropReason::Binary => "binary",
            DropReason::FilePolicy => "file_policy",
            DropReason::NoValidOwner => "no_valid_owner",
            DropReason::Duplicate => "duplicate",
            DropReason::Superset => "superset",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum StatEvent {
    TagApplied,
    TagRefused,
    Propagated,
    RecordEmitted,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tags_applied: u64,
    pub tags_refused: u64,
    pub saturation_misses: u64,
    pub propagations: u64,
    pub records_emitted: u64,
    pub dropped: std::collections::BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped.get(reason.as_str()).copied().unwrap_or(0)
    }
}

/// Lock-free counters, safe to bump from any sink call.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    tags_applied: AtomicU64,
    tags_refused: AtomicU64,
    propagations: AtomicU64,
    records_emitted: AtomicU64,
    dropped: [AtomicU64; 9],
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, event: StatEvent) {
        let counter = match event {
            StatEvent::TagApplied => &self.tags_applied,
            StatEvent::TagRefused => &self.tags_refused,
            StatEvent::Propagated => &self.propagations,
            StatEvent::RecordEmitted => &self.records_emitted,
            StatEvent::Dropped(reason) => &self.dropped[reason.index()],
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturation lives in the label store, so the caller passes it in.
    pub fn snapshot(&self, saturation_misses: u64) -> StatsSnapshot {
        StatsSnapshot {
            tags_applied: self.tags_applied.load(Ordering::Relaxed),
            tags_refused: self.tags_refused.load(Ordering::Relaxed),
            saturation_misses,
            propagations: self.propagations.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            dropped: DropReason::ALL
                .iter()
                .map(|r| {
                    let count = self.dropped[r.index()].load(Ordering::Relaxed);
                    (r.as_str().to_string(), count)
                })
                .filter(|(_, n)| *n > 0)
                .collect(),
        }
    }
}
