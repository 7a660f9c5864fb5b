//! Zone aggregation over density samples
//!
//! The reduction is exact: people counts are summed as integers and density
//! percentages are summed in fixed point (micro-percent), so any partition or
//! ordering of the same sample set produces a bit-identical snapshot.

use crate::events::{DensitySample, TimeRange, Timestamp};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-point scale for density sums (1 unit = 1e-6 percent)
const DENSITY_SCALE: f64 = 1_000_000.0;

/// Per-zone statistics computed from a sample set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSnapshot {
    pub zone_id: String,
    pub zone_name: String,
    pub sample_count: u64,
    pub avg_people_count: f64,
    pub avg_density_percentage: f64,
    pub min_people_count: u64,
    pub max_people_count: u64,
    pub min_density_percentage: f64,
    pub max_density_percentage: f64,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
}

/// Average density and occupancy of one zone at one hour of the day (UTC)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourlyProfile {
    pub zone_id: String,
    pub hour: u32,
    pub sample_count: u64,
    pub avg_people_count: f64,
    pub avg_density_percentage: f64,
}

/// Commutative, associative partial aggregate for one group of samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneAccumulator {
    count: u64,
    people_sum: u128,
    density_sum: u128,
    min_people: u64,
    max_people: u64,
    min_density: f64,
    max_density: f64,
    zone_name: Option<String>,
    window: Option<(Timestamp, Timestamp)>,
}

impl ZoneAccumulator {
    pub fn push(&mut self, sample: &DensitySample) {
        let density = canonical_density(sample.density_percentage);
        let single = ZoneAccumulator {
            count: 1,
            people_sum: u128::from(sample.people_count),
            density_sum: to_fixed(density),
            min_people: sample.people_count,
            max_people: sample.people_count,
            min_density: density,
            max_density: density,
            zone_name: Some(sample.zone_name.clone()),
            window: Some((sample.timestamp, sample.timestamp)),
        };
        self.merge(single);
    }

    /// Fold another partial aggregate into this one
    pub fn merge(&mut self, other: ZoneAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other;
            return;
        }

        self.count += other.count;
        self.people_sum += other.people_sum;
        self.density_sum += other.density_sum;
        self.min_people = self.min_people.min(other.min_people);
        self.max_people = self.max_people.max(other.max_people);
        self.min_density = self.min_density.min(other.min_density);
        self.max_density = self.max_density.max(other.max_density);

        // Smallest name wins so the choice does not depend on arrival order
        self.zone_name = match (self.zone_name.take(), other.zone_name) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.window = match (self.window, other.window) {
            (Some((s1, e1)), Some((s2, e2))) => Some((s1.min(s2), e1.max(e2))),
            (a, b) => a.or(b),
        };
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn avg_people(&self) -> f64 {
        let avg = self.people_sum as f64 / self.count as f64;
        avg.clamp(self.min_people as f64, self.max_people as f64)
    }

    fn avg_density(&self) -> f64 {
        let avg = self.density_sum as f64 / self.count as f64 / DENSITY_SCALE;
        avg.clamp(self.min_density, self.max_density)
    }

    fn snapshot(&self, zone_id: &str) -> Option<ZoneSnapshot> {
        let (window_start, window_end) = self.window?;
        Some(ZoneSnapshot {
            zone_id: zone_id.to_string(),
            zone_name: self
                .zone_name
                .clone()
                .unwrap_or_else(|| zone_id.to_string()),
            sample_count: self.count,
            avg_people_count: self.avg_people(),
            avg_density_percentage: self.avg_density(),
            min_people_count: self.min_people,
            max_people_count: self.max_people,
            min_density_percentage: self.min_density,
            max_density_percentage: self.max_density,
            window_start,
            window_end,
        })
    }
}

/// Fold `-0.0` into `0.0`; `f64::min`/`max` would otherwise keep whichever
/// zero came first
pub(crate) fn canonical_density(density_percentage: f64) -> f64 {
    density_percentage + 0.0
}

fn to_fixed(density_percentage: f64) -> u128 {
    (density_percentage * DENSITY_SCALE).round() as u128
}

/// Groups samples by zone and reduces each group
///
/// Partial aggregators built over disjoint subsets (e.g. on different
/// threads) can be combined with [`ZoneAggregator::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneAggregator {
    zones: BTreeMap<String, ZoneAccumulator>,
}

impl ZoneAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots for every zone in `samples`, sorted by zone id
    pub fn aggregate<'a, I>(samples: I) -> Vec<ZoneSnapshot>
    where
        I: IntoIterator<Item = &'a DensitySample>,
    {
        let mut aggregator = Self::new();
        aggregator.extend(samples);
        aggregator.snapshots()
    }

    /// Like [`ZoneAggregator::aggregate`], keeping only samples inside `window`
    pub fn aggregate_window<'a, I>(samples: I, window: TimeRange) -> Vec<ZoneSnapshot>
    where
        I: IntoIterator<Item = &'a DensitySample>,
    {
        Self::aggregate(
            samples
                .into_iter()
                .filter(|sample| window.contains(sample.timestamp)),
        )
    }

    /// Per-zone, per-hour averages sorted by zone id then hour
    pub fn hourly_profile<'a, I>(samples: I) -> Vec<HourlyProfile>
    where
        I: IntoIterator<Item = &'a DensitySample>,
    {
        let mut buckets: BTreeMap<(String, u32), ZoneAccumulator> = BTreeMap::new();
        for sample in samples {
            buckets
                .entry((sample.zone_id.clone(), sample.timestamp.hour()))
                .or_default()
                .push(sample);
        }

        buckets
            .into_iter()
            .map(|((zone_id, hour), acc)| HourlyProfile {
                zone_id,
                hour,
                sample_count: acc.count,
                avg_people_count: acc.avg_people(),
                avg_density_percentage: acc.avg_density(),
            })
            .collect()
    }

    pub fn push(&mut self, sample: &DensitySample) {
        self.zones
            .entry(sample.zone_id.clone())
            .or_default()
            .push(sample);
    }

    pub fn extend<'a, I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = &'a DensitySample>,
    {
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn merge(&mut self, other: ZoneAggregator) {
        for (zone_id, acc) in other.zones {
            self.zones.entry(zone_id).or_default().merge(acc);
        }
    }

    pub fn snapshots(&self) -> Vec<ZoneSnapshot> {
        self.zones
            .iter()
            .filter_map(|(zone_id, acc)| acc.snapshot(zone_id))
            .collect()
    }
}
