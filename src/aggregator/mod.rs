/// Per-zone statistics over density samples
pub mod zone_aggregator;

pub use zone_aggregator::{HourlyProfile, ZoneAccumulator, ZoneAggregator, ZoneSnapshot};
