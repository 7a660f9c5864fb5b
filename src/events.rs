//! Core telemetry and incident types
//!
//! This module defines the data structures shared by the telemetry store,
//! the zone aggregator, the analysis layer and the alert composer.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the crate
pub type Timestamp = DateTime<Utc>;

/// Inclusive time bounds; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl TimeRange {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

/// A crowd-density reading as submitted for ingestion
///
/// `timestamp` may be omitted by the producer; the store stamps the sample
/// with the ingestion time in that case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSample {
    pub zone_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    pub event_id: String,
    pub people_count: i64,
    pub density_percentage: f64,
    #[serde(default)]
    pub video_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_name: Option<String>,
}

impl NewSample {
    /// Create a sample with the required fields and no timestamp
    pub fn new(
        zone_id: impl Into<String>,
        event_id: impl Into<String>,
        people_count: i64,
        density_percentage: f64,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone_name: None,
            event_id: event_id.into(),
            people_count,
            density_percentage,
            video_timestamp: String::new(),
            timestamp: None,
            camera_id: None,
            camera_name: None,
        }
    }

    /// Set the absolute capture time
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the source-relative marker (e.g. "0:01:35" into the footage)
    pub fn with_video_timestamp(mut self, marker: impl Into<String>) -> Self {
        self.video_timestamp = marker.into();
        self
    }

    /// Set the zone display name
    pub fn with_zone_name(mut self, name: impl Into<String>) -> Self {
        self.zone_name = Some(name.into());
        self
    }
}

/// A stored, immutable crowd-density sample
///
/// Field names match the persisted record shape consumed downstream
/// (`zoneName`, `eventId`, `peopleCount`, `densityPercentage`,
/// `videoTimestamp`, `timestamp`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DensitySample {
    pub zone_id: String,
    pub zone_name: String,
    pub event_id: String,
    pub people_count: u64,
    pub density_percentage: f64,
    pub video_timestamp: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_name: Option<String>,
}

/// Severity shared by incidents, alerts and assessments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Wire names in ascending order
    pub const NAMES: &'static [&'static str] = &["low", "medium", "high", "critical"];

    /// Parse a severity name, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Severity> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident categories tracked by event staff
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Medical,
    Security,
    LostFound,
    General,
}

impl IncidentType {
    /// Map a free-form category label; unrecognised labels are `General`
    pub fn from_label(label: &str) -> IncidentType {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "medical" | "medical_emergency" => IncidentType::Medical,
            "security" | "security_breach" => IncidentType::Security,
            "lost_found" | "lost_&_found" | "lost_and_found" => IncidentType::LostFound,
            _ => IncidentType::General,
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IncidentType::Medical => "Medical",
            IncidentType::Security => "Security",
            IncidentType::LostFound => "Lost & found",
            IncidentType::General => "General",
        };
        f.write_str(label)
    }
}

/// A classified incident at the event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub location: String,
    pub description: String,
    pub severity: Severity,
    /// Classification confidence in [0, 1]
    #[serde(deserialize_with = "unit_interval")]
    pub confidence: f64,
    pub recommended_actions: Vec<String>,
    pub reported_at: Timestamp,
}

fn unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(de::Error::custom(format!(
            "confidence must be within [0, 1], got {}",
            value
        )))
    }
}
