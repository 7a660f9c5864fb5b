//! Prompt construction for each analysis task

use crate::ai::tasks::{
    AnalysisRequest, ChatRequest, ChatRole, EventProfile, EventSummary, FlowObservation,
    IncidentReport, MonitoringStatus, TaskPayload, TaskType,
};
use crate::aggregator::ZoneSnapshot;

const DEFAULT_CHAT_SYSTEM: &str = "You are an AI Safety Assistant specialized in real-time event safety management. Provide accurate, actionable, and concise advice.";

/// A rendered prompt plus the sampling settings for its task
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub task: TaskType,
    /// Role instructions, sent separately where the provider supports it
    pub system: String,
    pub text: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Prompt {
    /// System instructions and body as one document
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.text)
    }
}

/// Render the prompt for a request
pub fn build_prompt(request: &AnalysisRequest) -> Prompt {
    let task = request.task_type();
    let (system, body) = match &request.payload {
        TaskPayload::SafetyPlanning(profile) => safety_planning(profile),
        TaskPayload::CrowdFlowPrediction(observation) => crowd_flow(observation),
        TaskPayload::AnomalyDetection(report) => anomaly(report),
        TaskPayload::LiveMonitoring(status) => live_monitoring(status),
        TaskPayload::ReportGeneration(summary) => report(summary),
        TaskPayload::ChatAssistant(chat) => chat_assistant(chat),
    };

    let mut text = body;
    if let Some(snapshot) = request.snapshot.as_deref() {
        text.push_str("\n\n");
        text.push_str(&zone_context(snapshot));
    }
    text.push_str("\n\n");
    text.push_str(&response_contract(task));

    Prompt {
        task,
        system,
        text,
        temperature: task.temperature(),
        top_p: task.top_p(),
        max_output_tokens: task.max_output_tokens(),
    }
}

fn safety_planning(profile: &EventProfile) -> (String, String) {
    let zones = optional_line("Zones", &profile.zones.join(", "));
    let body = format!(
        r#"Analyze this event comprehensively and provide data-driven safety recommendations:

EVENT DETAILS:
- Name: {}
- Type: {}
- Expected Attendance: {} people
- Venue: {}
- Duration: {}{}

ANALYSIS REQUIRED:
1. Calculate optimal emergency exits based on attendance (1 exit per 250-300 people)
2. Determine security camera coverage (consider blind spots, high-traffic areas)
3. Medical post placement (1 per 5000 attendees minimum, strategic locations)
4. Crowd control measures (barriers, checkpoints, flow management)
5. Risk assessment considering event type and venue characteristics
6. Evacuation time estimates
7. Staff-to-attendee ratio recommendations"#,
        profile.name,
        profile.event_type,
        profile.expected_attendance,
        profile.venue,
        profile.duration,
        zones
    );
    (
        "You are an expert AI safety analyst for large-scale events.".to_string(),
        body,
    )
}

fn crowd_flow(observation: &FlowObservation) -> (String, String) {
    let zones = if observation.zones.is_empty() {
        "No zone data available".to_string()
    } else {
        observation
            .zones
            .iter()
            .map(|zone| format!("{}: {:.0}%", zone.name, zone.occupancy))
            .collect::<Vec<_>>()
            .join("\n  ")
    };

    let body = format!(
        r#"Analyze real-time crowd flow data and provide actionable predictions:

CURRENT STATE:
- Overall Crowd Level: {:.0}%
- Time: {}
- Event Phase: {}
- Zone Occupancy Breakdown:
  {}

ANALYSIS REQUIRED:
1. Predict the overall crowd level 30 minutes from now
2. Identify the trend (rising/falling/stable)
3. Estimate the expected peak level
4. Detect current and potential bottleneck zones
5. Assess crowd density risk zones
6. Recommend proactive crowd management actions
7. Calculate a confidence score based on data quality"#,
        observation.current_level, observation.time_of_day, observation.event_phase, zones
    );
    (
        "You are an AI crowd dynamics expert with machine learning prediction capabilities."
            .to_string(),
        body,
    )
}

fn anomaly(report: &IncidentReport) -> (String, String) {
    let context = optional_line("Additional Context", report.context.as_deref().unwrap_or(""));
    let body = format!(
        r#"Analyze this incident with precision:

INCIDENT DETAILS:
- Type: {}
- Location: {}
- Description: {}{}

PERFORM ANALYSIS:
1. Assess severity level (low/medium/high/critical)
2. Categorize the incident (crowd_safety, security_breach, medical_emergency, fire_hazard, structural_risk)
3. Calculate a confidence score based on description clarity
4. Recommend immediate actions in priority order
5. Score the overall risk"#,
        report.incident_type, report.location, report.description, context
    );
    (
        "You are an advanced AI security analyst specializing in real-time anomaly detection and threat assessment."
            .to_string(),
        body,
    )
}

fn live_monitoring(status: &MonitoringStatus) -> (String, String) {
    let incidents = if status.recent_incidents.is_empty() {
        "None reported".to_string()
    } else {
        status
            .recent_incidents
            .iter()
            .map(|incident| {
                format!(
                    "- [{}] {} at {} ({}): {}",
                    incident.id,
                    incident.incident_type,
                    incident.location,
                    incident.severity,
                    incident.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n  ")
    };

    let body = format!(
        r#"Provide immediate insights and actionable alerts for the live event:

CURRENT MONITORING STATUS:
- Safety Status: {}
- Active Incidents: {}
- Current Crowd Level: {:.0}%
- Recent Incidents:
  {}

ANALYSIS REQUIRED:
1. Assess overall event safety status
2. Calculate current risk level
3. Generate real-time alerts for concerning patterns; when an alert concerns listed incidents, put their ids (the values in brackets) in incidentIds
4. Provide actionable insights based on data trends
5. Recommend immediate actions if needed"#,
        status.safety_status, status.active_incidents, status.crowd_level, incidents
    );
    (
        "You are an AI real-time monitoring system analyzing live event status.".to_string(),
        body,
    )
}

fn report(summary: &EventSummary) -> (String, String) {
    let zones = optional_line("Event Zones", &summary.zones.join(", "));
    let body = format!(
        r#"Generate a comprehensive, professional post-event safety report with data-driven insights:

EVENT INFORMATION:
- Event Name: {}
- Date: {}
- Total Attendance: {} people
- Total Incidents: {}
- Overall Safety Score: {}/100
- Average Response Time: {:.1} minutes{}

THE REPORT MUST COVER:
1. Executive summary
2. Attendance and crowd management
3. Incident analysis
4. Response performance (target: under 3 minutes)
5. Safety infrastructure assessment
6. Key learnings
7. Recommendations for future events
8. Conclusion

Write the report in professional Markdown inside the summaryText field. Tone should be objective and data-driven."#,
        summary.name,
        summary.date,
        summary.attendance,
        summary.incidents,
        summary.safety_score,
        summary.response_time_minutes,
        zones
    );
    (
        "You are an expert event safety analyst creating an official post-event safety report."
            .to_string(),
        body,
    )
}

fn chat_assistant(chat: &ChatRequest) -> (String, String) {
    let system = chat
        .messages
        .iter()
        .find(|message| message.role == ChatRole::System)
        .map(|message| message.content.clone())
        .unwrap_or_else(|| DEFAULT_CHAT_SYSTEM.to_string());

    let history = chat
        .messages
        .iter()
        .filter(|message| message.role != ChatRole::System)
        .map(|message| {
            let speaker = match message.role {
                ChatRole::Assistant => "Assistant",
                _ => "Human",
            };
            format!("{}: {}", speaker, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let context = chat
        .event_context
        .as_deref()
        .map(|context| format!("LIVE EVENT CONTEXT:\n{}\n\n", context))
        .unwrap_or_default();

    let body = format!(
        r#"You can help with real-time safety status, crowd density, active incidents, emergency protocol guidance, risk assessment and resource allocation. If asked about metrics you cannot see, say so and give relevant guidance.

{}CONVERSATION:
{}

Reply to the last Human message. Put your reply in replyText."#,
        context, history
    );
    (system, body)
}

fn zone_context(snapshot: &[ZoneSnapshot]) -> String {
    let mut lines = vec!["ZONE TELEMETRY:".to_string()];
    if snapshot.is_empty() {
        lines.push("- No telemetry recorded".to_string());
    }
    for zone in snapshot {
        lines.push(format!(
            "- {} ({}): {} samples, avg density {:.1}% (min {:.1}%, max {:.1}%), avg {:.1} people (peak {}), {} to {}",
            zone.zone_name,
            zone.zone_id,
            zone.sample_count,
            zone.avg_density_percentage,
            zone.min_density_percentage,
            zone.max_density_percentage,
            zone.avg_people_count,
            zone.max_people_count,
            zone.window_start.format("%H:%M:%S"),
            zone.window_end.format("%H:%M:%S"),
        ));
    }
    lines.join("\n")
}

fn response_contract(task: TaskType) -> String {
    format!(
        "Respond with ONLY a valid JSON object (no markdown, no extra text) with these fields:\n{}",
        task.schema().describe()
    )
}

fn optional_line(label: &str, value: &str) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        format!("\n- {}: {}", label, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tasks::{ChatMessage, ZoneOccupancy};
    use crate::events::{Incident, IncidentType, Severity};
    use chrono::{TimeZone, Utc};

    fn sample_requests() -> Vec<AnalysisRequest> {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap();
        vec![
            AnalysisRequest::new(TaskPayload::SafetyPlanning(EventProfile {
                name: "Summer Fest".to_string(),
                event_type: "concert".to_string(),
                expected_attendance: 20_000,
                venue: "City Park".to_string(),
                duration: "8 hours".to_string(),
                zones: vec!["Main Stage".to_string(), "Food Court".to_string()],
            })),
            AnalysisRequest::new(TaskPayload::CrowdFlowPrediction(FlowObservation {
                current_level: 67.0,
                time_of_day: "20:15".to_string(),
                event_phase: "headliner".to_string(),
                zones: vec![ZoneOccupancy {
                    name: "Main Entrance".to_string(),
                    occupancy: 95.0,
                }],
            })),
            AnalysisRequest::new(TaskPayload::AnomalyDetection(IncidentReport {
                incident_type: "medical".to_string(),
                location: "Gate B".to_string(),
                description: "Person collapsed near the barrier".to_string(),
                context: None,
            })),
            AnalysisRequest::new(TaskPayload::LiveMonitoring(MonitoringStatus {
                active_incidents: 1,
                crowd_level: 72.0,
                safety_status: "normal".to_string(),
                recent_incidents: vec![Incident {
                    id: "inc-42".to_string(),
                    incident_type: IncidentType::Security,
                    location: "VIP Area".to_string(),
                    description: "Fence breach".to_string(),
                    severity: Severity::High,
                    confidence: 0.8,
                    recommended_actions: Vec::new(),
                    reported_at: now,
                }],
            })),
            AnalysisRequest::new(TaskPayload::ReportGeneration(EventSummary {
                name: "Summer Fest".to_string(),
                date: "2026-05-01".to_string(),
                attendance: 18_500,
                incidents: 4,
                safety_score: 88,
                response_time_minutes: 2.5,
                zones: Vec::new(),
            })),
            AnalysisRequest::new(TaskPayload::ChatAssistant(ChatRequest {
                messages: vec![ChatMessage {
                    role: ChatRole::User,
                    content: "Which gate is the busiest?".to_string(),
                }],
                event_context: None,
            })),
        ]
    }

    #[test]
    fn test_every_prompt_carries_its_contract() {
        for request in sample_requests() {
            let prompt = build_prompt(&request);
            let task = request.task_type();

            assert_eq!(prompt.task, task);
            assert_eq!(prompt.temperature, task.temperature());
            assert!(prompt.text.contains("Respond with ONLY a valid JSON object"));
            for field in task.schema().fields {
                assert!(
                    prompt.text.contains(&format!("- {} (", field.name)),
                    "{} prompt is missing field {}",
                    task,
                    field.name
                );
            }
        }
    }

    #[test]
    fn test_snapshot_section_only_when_supplied() {
        let request = sample_requests().remove(1);
        assert!(!build_prompt(&request).text.contains("ZONE TELEMETRY"));

        let at = Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap();
        let snapshot = vec![ZoneSnapshot {
            zone_id: "zone-1".to_string(),
            zone_name: "Main Entrance".to_string(),
            sample_count: 12,
            avg_people_count: 40.5,
            avg_density_percentage: 81.3,
            min_people_count: 30,
            max_people_count: 52,
            min_density_percentage: 60.0,
            max_density_percentage: 97.0,
            window_start: at,
            window_end: at,
        }];
        let text = build_prompt(&request.with_snapshot(snapshot)).text;
        assert!(text.contains("ZONE TELEMETRY:"));
        assert!(text.contains("- Main Entrance (zone-1): 12 samples, avg density 81.3%"));
    }

    #[test]
    fn test_monitoring_prompt_lists_incident_ids() {
        let request = sample_requests().remove(3);
        let prompt = build_prompt(&request);
        assert!(prompt.text.contains("- [inc-42] Security at VIP Area (high): Fence breach"));
    }

    #[test]
    fn test_chat_uses_supplied_system_message() {
        let request = AnalysisRequest::new(TaskPayload::ChatAssistant(ChatRequest {
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: "You are the venue's head of security.".to_string(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: "Status?".to_string(),
                },
                ChatMessage {
                    role: ChatRole::Assistant,
                    content: "All clear.".to_string(),
                },
            ],
            event_context: Some("Crowd level 40%".to_string()),
        }));

        let prompt = build_prompt(&request);
        assert_eq!(prompt.system, "You are the venue's head of security.");
        assert!(prompt.text.contains("Human: Status?\n\nAssistant: All clear."));
        assert!(prompt.text.contains("LIVE EVENT CONTEXT:\nCrowd level 40%"));
        assert!(prompt.combined().starts_with("You are the venue's head of security."));
    }
}
