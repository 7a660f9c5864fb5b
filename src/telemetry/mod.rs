/// Durable, snapshot-isolated storage for density samples
pub mod journal;
pub mod store;

pub use journal::{Journal, JournalEntry};
pub use store::{SampleFilter, SampleQuery, TelemetryStore};
pub use crate::events::TimeRange;
