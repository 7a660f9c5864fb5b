use crate::ai::AnalysisResult;
use crate::config::AlertConfig;
use crate::events::{Incident, Severity, Timestamp};
use log::{debug, info};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// An operator-facing alert
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    pub source_incident_ids: BTreeSet<String>,
    pub created_at: Timestamp,
}

/// Builds the ordered alert list for a live-monitoring cycle
///
/// Output order: severity descending, then most recent first, then message,
/// then source ids. Identical inputs always give identical output.
#[derive(Debug, Clone)]
pub struct AlertComposer {
    max_alerts: usize,
    max_message_len: usize,
}

impl Default for AlertComposer {
    fn default() -> Self {
        Self::from_config(&AlertConfig::default())
    }
}

impl AlertComposer {
    /// # Arguments
    ///
    /// * `max_alerts` - Maximum number of alerts returned
    /// * `max_message_len` - Maximum message length in bytes, including the "..." suffix
    pub fn new(max_alerts: usize, max_message_len: usize) -> Self {
        Self {
            max_alerts,
            max_message_len,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.max_alerts, config.max_message_len)
    }

    /// Compose alerts from a monitoring result and the current incidents
    ///
    /// Each distinct incident id yields one alert; repeated ids keep their most
    /// severe occurrence. Provider alerts that reference known incidents raise
    /// those alerts' severity and replace their message. Provider alerts that
    /// reference no known incident become standalone alerts stamped with the
    /// result's generation time. Results of other tasks contribute nothing.
    pub fn compose(&self, result: &AnalysisResult, incidents: &[Incident]) -> Vec<Alert> {
        let mut by_incident: BTreeMap<&str, Alert> = BTreeMap::new();

        for incident in incidents {
            let candidate = alert_for_incident(incident);
            let replace = by_incident
                .get(incident.id.as_str())
                .map_or(true, |existing| outranks(&candidate, existing));
            if replace {
                by_incident.insert(incident.id.as_str(), candidate);
            }
        }

        let mut standalone: Vec<Alert> = Vec::new();
        if let Some(assessment) = result.output.as_live_monitoring() {
            for provider_alert in &assessment.alerts {
                let message = match &provider_alert.zone {
                    Some(zone) => format!("[{}] {}", zone, provider_alert.message),
                    None => provider_alert.message.clone(),
                };

                let mut matched = false;
                for id in &provider_alert.incident_ids {
                    if let Some(alert) = by_incident.get_mut(id.as_str()) {
                        matched = true;
                        if provider_alert.severity >= alert.severity {
                            alert.severity = provider_alert.severity;
                            alert.message = message.clone();
                        }
                    }
                }

                if !matched {
                    let duplicate = standalone.iter_mut().find(|a| a.message == message);
                    match duplicate {
                        Some(existing) => {
                            existing.severity = existing.severity.max(provider_alert.severity)
                        }
                        None => standalone.push(Alert {
                            severity: provider_alert.severity,
                            message,
                            source_incident_ids: BTreeSet::new(),
                            created_at: result.generated_at,
                        }),
                    }
                }
            }
        }

        let mut alerts: Vec<Alert> = by_incident.into_values().chain(standalone).collect();
        alerts.sort_by(alert_order);

        if alerts.len() > self.max_alerts {
            debug!(
                "Dropping {} lowest-ranked alerts over the limit of {}",
                alerts.len() - self.max_alerts,
                self.max_alerts
            );
            alerts.truncate(self.max_alerts);
        }

        for alert in &mut alerts {
            alert.message = truncate_text(&alert.message, self.max_message_len);
        }

        info!(
            "Composed {} alerts from {} incidents",
            alerts.len(),
            incidents.len()
        );
        alerts
    }
}

fn alert_for_incident(incident: &Incident) -> Alert {
    Alert {
        severity: incident.severity,
        message: format!(
            "{} at {}: {}",
            incident.incident_type, incident.location, incident.description
        ),
        source_incident_ids: BTreeSet::from([incident.id.clone()]),
        created_at: incident.reported_at,
    }
}

/// Whether `a` should replace `b` for the same incident
fn outranks(a: &Alert, b: &Alert) -> bool {
    alert_order(a, b) == Ordering::Less
}

fn alert_order(a: &Alert, b: &Alert) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.source_incident_ids.cmp(&b.source_incident_ids))
}

/// Truncate text to a maximum byte length, appending "..."
///
/// Cuts on a UTF-8 character boundary so multi-byte text never panics.
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let mut truncate_at = max_length.saturating_sub(3);
    while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    format!("{}...", &text[..truncate_at])
}
