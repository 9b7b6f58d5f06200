use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use ulid::Ulid;

use crate::limits::{OCCUPANCY_CHANNEL_CAPACITY, OCCUPANCY_HISTORY_LEN};
use crate::model::Ms;

/// One headcount reading pushed by a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancySample {
    pub facility_id: Ulid,
    pub at: Ms,
    pub headcount: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdLevel {
    Quiet,
    Moderate,
    Busy,
    Crowded,
}

impl CrowdLevel {
    /// By share of capacity: under 25% quiet, under 50% moderate, under 75% busy.
    pub fn classify(headcount: u32, capacity: u32) -> Self {
        if capacity == 0 {
            return if headcount == 0 { CrowdLevel::Quiet } else { CrowdLevel::Crowded };
        }
        let percent = headcount as u64 * 100 / capacity as u64;
        match percent {
            0..25 => CrowdLevel::Quiet,
            25..50 => CrowdLevel::Moderate,
            50..75 => CrowdLevel::Busy,
            _ => CrowdLevel::Crowded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdLevel::Quiet => "quiet",
            CrowdLevel::Moderate => "moderate",
            CrowdLevel::Busy => "busy",
            CrowdLevel::Crowded => "crowded",
        }
    }
}

/// Mean of the last three headcounts against the mean of the three before.
/// A difference beyond one head either way is a trend.
pub fn trend(samples: &[OccupancySample]) -> Trend {
    let n = samples.len();
    if n < 2 {
        return Trend::Stable;
    }
    let recent = &samples[n.saturating_sub(3)..];
    let older = &samples[n.saturating_sub(6)..n.saturating_sub(3)];
    if older.is_empty() {
        return Trend::Stable;
    }
    let mean = |s: &[OccupancySample]| s.iter().map(|x| x.headcount as f64).sum::<f64>() / s.len() as f64;
    let delta = mean(recent) - mean(older);
    if delta > 1.0 {
        Trend::Increasing
    } else if delta < -1.0 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Fixed-size ring of the most recent samples.
#[derive(Debug, Clone, Default)]
struct History {
    samples: Vec<OccupancySample>,
    /// Slot the next sample overwrites once full.
    head: usize,
}

impl History {
    fn push(&mut self, sample: OccupancySample) {
        if self.samples.len() < OCCUPANCY_HISTORY_LEN {
            self.samples.push(sample);
        } else {
            self.samples[self.head] = sample;
            self.head = (self.head + 1) % OCCUPANCY_HISTORY_LEN;
        }
    }

    /// Oldest first.
    fn ordered(&self) -> Vec<OccupancySample> {
        let (newer, older) = self.samples.split_at(self.head);
        older.iter().chain(newer).copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancySnapshot {
    pub latest: OccupancySample,
    pub trend: Trend,
    pub crowd_level: CrowdLevel,
    /// Oldest first.
    pub history: Vec<OccupancySample>,
}

/// Per-facility occupancy history. Independent of booking state.
#[derive(Default)]
pub struct OccupancyTracker {
    histories: DashMap<Ulid, History>,
}

impl OccupancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sample: OccupancySample) {
        self.histories.entry(sample.facility_id).or_default().push(sample);
        metrics::counter!(crate::observability::OCCUPANCY_SAMPLES_TOTAL).increment(1);
    }

    pub fn history(&self, facility_id: Ulid) -> Vec<OccupancySample> {
        self.histories
            .get(&facility_id)
            .map(|h| h.ordered())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, facility_id: Ulid) -> Option<OccupancySnapshot> {
        let history = self.history(facility_id);
        let latest = *history.last()?;
        Some(OccupancySnapshot {
            latest,
            trend: trend(&history),
            crowd_level: CrowdLevel::classify(latest.headcount, latest.capacity),
            history,
        })
    }

    pub fn forget(&self, facility_id: Ulid) {
        self.histories.remove(&facility_id);
    }
}

pub fn channel() -> (mpsc::Sender<OccupancySample>, mpsc::Receiver<OccupancySample>) {
    mpsc::channel(OCCUPANCY_CHANNEL_CAPACITY)
}

/// Drain pushed samples into the tracker until every sender is gone.
pub async fn run_occupancy(tracker: Arc<OccupancyTracker>, mut rx: mpsc::Receiver<OccupancySample>) {
    while let Some(sample) = rx.recv().await {
        tracker.record(sample);
    }
    tracing::debug!("occupancy feed closed");
}
