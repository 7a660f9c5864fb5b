/// Alert composition from monitoring results and incidents
pub mod alert_composer;

pub use alert_composer::{Alert, AlertComposer};
