//! Analysis task catalog
//!
//! Each task pairs a payload type (what the caller supplies), a result type
//! (what the caller gets back) and a static schema declaring the result's
//! fields with their documented defaults. The schema defaults and the result
//! type's `Default` impl describe the same value.

use crate::ai::schema::{DefaultValue, FieldKind, FieldSpec, TaskSchema};
use crate::aggregator::ZoneSnapshot;
use crate::events::{Incident, IncidentType, Severity, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The six supported analysis tasks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskType {
    SafetyPlanning,
    CrowdFlowPrediction,
    AnomalyDetection,
    LiveMonitoring,
    ReportGeneration,
    ChatAssistant,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::SafetyPlanning,
        TaskType::CrowdFlowPrediction,
        TaskType::AnomalyDetection,
        TaskType::LiveMonitoring,
        TaskType::ReportGeneration,
        TaskType::ChatAssistant,
    ];

    /// Command-line name of the task
    pub fn slug(&self) -> &'static str {
        match self {
            TaskType::SafetyPlanning => "safety-planning",
            TaskType::CrowdFlowPrediction => "crowd-flow",
            TaskType::AnomalyDetection => "anomaly",
            TaskType::LiveMonitoring => "live-monitoring",
            TaskType::ReportGeneration => "report",
            TaskType::ChatAssistant => "chat",
        }
    }

    pub fn schema(&self) -> &'static TaskSchema {
        match self {
            TaskType::SafetyPlanning => &SAFETY_PLANNING_SCHEMA,
            TaskType::CrowdFlowPrediction => &CROWD_FLOW_SCHEMA,
            TaskType::AnomalyDetection => &ANOMALY_SCHEMA,
            TaskType::LiveMonitoring => &LIVE_MONITORING_SCHEMA,
            TaskType::ReportGeneration => &REPORT_SCHEMA,
            TaskType::ChatAssistant => &CHAT_SCHEMA,
        }
    }

    /// Sampling temperature sent with the prompt
    pub fn temperature(&self) -> f32 {
        match self {
            TaskType::SafetyPlanning => 0.3,
            TaskType::CrowdFlowPrediction => 0.3,
            TaskType::AnomalyDetection => 0.2,
            TaskType::LiveMonitoring => 0.3,
            TaskType::ReportGeneration => 0.4,
            TaskType::ChatAssistant => 0.7,
        }
    }

    pub fn top_p(&self) -> f32 {
        match self {
            TaskType::SafetyPlanning | TaskType::LiveMonitoring => 0.8,
            TaskType::AnomalyDetection => 0.7,
            TaskType::CrowdFlowPrediction | TaskType::ReportGeneration => 0.85,
            TaskType::ChatAssistant => 0.9,
        }
    }

    pub fn max_output_tokens(&self) -> u32 {
        match self {
            TaskType::ReportGeneration => 4096,
            TaskType::ChatAssistant => 1024,
            _ => 2048,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TaskType::ALL
            .into_iter()
            .find(|task| task.slug() == wanted || format!("{:?}", task).to_lowercase() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = TaskType::ALL.iter().map(|t| t.slug()).collect();
                format!("unknown task '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Event details for safety planning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub expected_attendance: u64,
    pub venue: String,
    pub duration: String,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOccupancy {
    pub name: String,
    pub occupancy: f64,
}

/// Current crowd state for flow prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowObservation {
    pub current_level: f64,
    pub time_of_day: String,
    pub event_phase: String,
    #[serde(default)]
    pub zones: Vec<ZoneOccupancy>,
}

/// A free-form incident description to classify
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    #[serde(rename = "type")]
    pub incident_type: String,
    pub location: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Live event status for monitoring analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub active_incidents: u32,
    pub crowd_level: f64,
    pub safety_status: String,
    #[serde(default)]
    pub recent_incidents: Vec<Incident>,
}

/// Post-event figures for report generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub name: String,
    pub date: String,
    pub attendance: u64,
    pub incidents: u32,
    pub safety_score: u8,
    pub response_time_minutes: f64,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Conversation for the safety assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_context: Option<String>,
}

/// Task-specific input; the variant determines the task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "taskType", content = "payload")]
pub enum TaskPayload {
    SafetyPlanning(EventProfile),
    CrowdFlowPrediction(FlowObservation),
    AnomalyDetection(IncidentReport),
    LiveMonitoring(MonitoringStatus),
    ReportGeneration(EventSummary),
    ChatAssistant(ChatRequest),
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskPayload::SafetyPlanning(_) => TaskType::SafetyPlanning,
            TaskPayload::CrowdFlowPrediction(_) => TaskType::CrowdFlowPrediction,
            TaskPayload::AnomalyDetection(_) => TaskType::AnomalyDetection,
            TaskPayload::LiveMonitoring(_) => TaskType::LiveMonitoring,
            TaskPayload::ReportGeneration(_) => TaskType::ReportGeneration,
            TaskPayload::ChatAssistant(_) => TaskType::ChatAssistant,
        }
    }

    /// Decode a bare payload document for a task chosen out of band
    pub fn from_value(task: TaskType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match task {
            TaskType::SafetyPlanning => TaskPayload::SafetyPlanning(serde_json::from_value(value)?),
            TaskType::CrowdFlowPrediction => {
                TaskPayload::CrowdFlowPrediction(serde_json::from_value(value)?)
            }
            TaskType::AnomalyDetection => {
                TaskPayload::AnomalyDetection(serde_json::from_value(value)?)
            }
            TaskType::LiveMonitoring => TaskPayload::LiveMonitoring(serde_json::from_value(value)?),
            TaskType::ReportGeneration => {
                TaskPayload::ReportGeneration(serde_json::from_value(value)?)
            }
            TaskType::ChatAssistant => TaskPayload::ChatAssistant(serde_json::from_value(value)?),
        })
    }
}

/// A task payload plus optional zone statistics for context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub payload: TaskPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Vec<ZoneSnapshot>>,
}

impl AnalysisRequest {
    pub fn new(payload: TaskPayload) -> Self {
        Self {
            payload,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Vec<ZoneSnapshot>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRecommendation {
    #[serde(rename = "type")]
    pub category: String,
    pub title: String,
    pub count: Option<u32>,
    pub description: Option<String>,
    pub positions: Vec<String>,
    pub priority: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetyPlan {
    pub overall_score: u8,
    pub recommendations: Vec<SafetyRecommendation>,
    pub risk_level: Severity,
    pub key_insights: Vec<String>,
    pub critical_areas: Vec<String>,
    pub evacuation_time: Option<String>,
    pub staff_recommendation: Option<u32>,
}

impl Default for SafetyPlan {
    fn default() -> Self {
        Self {
            overall_score: 50,
            recommendations: Vec::new(),
            risk_level: Severity::Medium,
            key_insights: Vec::new(),
            critical_areas: Vec::new(),
            evacuation_time: None,
            staff_recommendation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BottleneckZone {
    pub name: String,
    pub severity: Severity,
    pub current_occupancy: Option<u8>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowPrediction {
    pub predicted_level: u8,
    pub trend: Trend,
    pub bottleneck_zones: Vec<BottleneckZone>,
    pub confidence: Option<f64>,
    pub peak_level: Option<u8>,
    pub density_risk_zones: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAssessment {
    pub severity: Severity,
    pub confidence: f64,
    pub recommended_actions: Vec<String>,
    pub category: Option<String>,
    pub analysis: Option<String>,
    pub risk_score: Option<u8>,
}

impl Default for AnomalyAssessment {
    fn default() -> Self {
        Self {
            severity: Severity::Medium,
            confidence: 0.0,
            recommended_actions: Vec::new(),
            category: None,
            analysis: None,
            risk_score: None,
        }
    }
}

impl AnomalyAssessment {
    /// Classify the reported incident with this assessment
    pub fn into_incident(
        self,
        id: impl Into<String>,
        report: &IncidentReport,
        reported_at: Timestamp,
    ) -> Incident {
        Incident {
            id: id.into(),
            incident_type: IncidentType::from_label(&report.incident_type),
            location: report.location.clone(),
            description: report.description.clone(),
            severity: self.severity,
            confidence: self.confidence,
            recommended_actions: self.recommended_actions,
            reported_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Stable,
    Elevated,
    Critical,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringAlert {
    pub severity: Severity,
    pub message: String,
    pub zone: Option<String>,
    pub action: Option<String>,
    pub incident_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringAssessment {
    pub overall_status: OverallStatus,
    pub risk_level: Severity,
    pub alerts: Vec<MonitoringAlert>,
    pub risk_score: Option<u8>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for MonitoringAssessment {
    fn default() -> Self {
        Self {
            overall_status: OverallStatus::Unknown,
            risk_level: Severity::Medium,
            alerts: Vec::new(),
            risk_score: None,
            insights: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

pub const REPORT_UNAVAILABLE: &str =
    "Report unavailable: the analysis provider did not return usable content.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    pub summary_text: String,
    pub highlights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for SafetyReport {
    fn default() -> Self {
        Self {
            summary_text: REPORT_UNAVAILABLE.to_string(),
            highlights: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

pub const CHAT_UNAVAILABLE: &str =
    "I apologize, but I was unable to generate a response. Please try again.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply_text: String,
    pub suggested_actions: Vec<String>,
}

impl Default for ChatReply {
    fn default() -> Self {
        Self {
            reply_text: CHAT_UNAVAILABLE.to_string(),
            suggested_actions: Vec::new(),
        }
    }
}

/// Typed result of one task
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TaskOutput {
    SafetyPlanning(SafetyPlan),
    CrowdFlowPrediction(FlowPrediction),
    AnomalyDetection(AnomalyAssessment),
    LiveMonitoring(MonitoringAssessment),
    ReportGeneration(SafetyReport),
    ChatAssistant(ChatReply),
}

impl TaskOutput {
    /// The documented all-defaults result for a task
    pub fn fallback(task: TaskType) -> Self {
        match task {
            TaskType::SafetyPlanning => TaskOutput::SafetyPlanning(SafetyPlan::default()),
            TaskType::CrowdFlowPrediction => {
                TaskOutput::CrowdFlowPrediction(FlowPrediction::default())
            }
            TaskType::AnomalyDetection => TaskOutput::AnomalyDetection(AnomalyAssessment::default()),
            TaskType::LiveMonitoring => TaskOutput::LiveMonitoring(MonitoringAssessment::default()),
            TaskType::ReportGeneration => TaskOutput::ReportGeneration(SafetyReport::default()),
            TaskType::ChatAssistant => TaskOutput::ChatAssistant(ChatReply::default()),
        }
    }

    /// Decode a conformed object into the task's result type
    pub fn from_object(task: TaskType, object: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(object);
        Ok(match task {
            TaskType::SafetyPlanning => TaskOutput::SafetyPlanning(serde_json::from_value(value)?),
            TaskType::CrowdFlowPrediction => {
                TaskOutput::CrowdFlowPrediction(serde_json::from_value(value)?)
            }
            TaskType::AnomalyDetection => TaskOutput::AnomalyDetection(serde_json::from_value(value)?),
            TaskType::LiveMonitoring => TaskOutput::LiveMonitoring(serde_json::from_value(value)?),
            TaskType::ReportGeneration => TaskOutput::ReportGeneration(serde_json::from_value(value)?),
            TaskType::ChatAssistant => TaskOutput::ChatAssistant(serde_json::from_value(value)?),
        })
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            TaskOutput::SafetyPlanning(_) => TaskType::SafetyPlanning,
            TaskOutput::CrowdFlowPrediction(_) => TaskType::CrowdFlowPrediction,
            TaskOutput::AnomalyDetection(_) => TaskType::AnomalyDetection,
            TaskOutput::LiveMonitoring(_) => TaskType::LiveMonitoring,
            TaskOutput::ReportGeneration(_) => TaskType::ReportGeneration,
            TaskOutput::ChatAssistant(_) => TaskType::ChatAssistant,
        }
    }

    pub fn as_live_monitoring(&self) -> Option<&MonitoringAssessment> {
        match self {
            TaskOutput::LiveMonitoring(assessment) => Some(assessment),
            _ => None,
        }
    }

    pub fn as_anomaly(&self) -> Option<&AnomalyAssessment> {
        match self {
            TaskOutput::AnomalyDetection(assessment) => Some(assessment),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

const SEVERITIES: &[&str] = Severity::NAMES;
const TRENDS: &[&str] = &["rising", "falling", "stable"];
const OVERALL_STATUSES: &[&str] = &["stable", "elevated", "critical", "unknown"];

const PERCENT: FieldKind = FieldKind::Integer { min: 0, max: 100 };
const UNIT_INTERVAL: FieldKind = FieldKind::Real { min: 0.0, max: 1.0 };

const RECOMMENDATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(
        "type",
        FieldKind::Text,
        DefaultValue::Null,
        "resource category such as exit, camera, medical, barrier or staff",
    ),
    FieldSpec::required("title", FieldKind::Text, DefaultValue::Null, "short heading"),
    FieldSpec::optional(
        "count",
        FieldKind::Integer { min: 0, max: 100_000 },
        DefaultValue::Null,
        "how many units to deploy",
    ),
    FieldSpec::optional("description", FieldKind::Text, DefaultValue::Null, "what and why"),
    FieldSpec::optional(
        "positions",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "named placement locations",
    ),
    FieldSpec::optional(
        "priority",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Str("medium"),
        "urgency",
    ),
];

pub static SAFETY_PLANNING_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required("overallScore", PERCENT, DefaultValue::Int(50), "overall safety score"),
    FieldSpec::required(
        "recommendations",
        FieldKind::ObjectList(RECOMMENDATION_FIELDS),
        DefaultValue::EmptyList,
        "safety resources to deploy",
    ),
    FieldSpec::optional(
        "riskLevel",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Str("medium"),
        "overall risk level",
    ),
    FieldSpec::optional("keyInsights", FieldKind::TextList, DefaultValue::EmptyList, "key findings"),
    FieldSpec::optional(
        "criticalAreas",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "areas needing the most attention",
    ),
    FieldSpec::optional(
        "evacuationTime",
        FieldKind::Text,
        DefaultValue::Null,
        "estimated full evacuation time, e.g. \"12-15 minutes\"",
    ),
    FieldSpec::optional(
        "staffRecommendation",
        FieldKind::Integer { min: 0, max: 1_000_000 },
        DefaultValue::Null,
        "recommended number of staff",
    ),
]);

const BOTTLENECK_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("name", FieldKind::Text, DefaultValue::Null, "zone name"),
    FieldSpec::optional(
        "severity",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Str("medium"),
        "congestion severity",
    ),
    FieldSpec::optional("currentOccupancy", PERCENT, DefaultValue::Null, "occupancy percentage"),
    FieldSpec::optional("action", FieldKind::Text, DefaultValue::Null, "recommended action"),
];

pub static CROWD_FLOW_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required(
        "predictedLevel",
        PERCENT,
        DefaultValue::Int(0),
        "predicted overall crowd level in 30 minutes",
    ),
    FieldSpec::required(
        "trend",
        FieldKind::Enum(TRENDS),
        DefaultValue::Str("stable"),
        "direction of the crowd level",
    ),
    FieldSpec::required(
        "bottleneckZones",
        FieldKind::ObjectList(BOTTLENECK_FIELDS),
        DefaultValue::EmptyList,
        "current or imminent bottlenecks",
    ),
    FieldSpec::optional("confidence", UNIT_INTERVAL, DefaultValue::Null, "prediction confidence"),
    FieldSpec::optional("peakLevel", PERCENT, DefaultValue::Null, "expected peak crowd level"),
    FieldSpec::optional(
        "densityRiskZones",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "zones at risk of unsafe density",
    ),
    FieldSpec::optional(
        "recommendations",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "proactive crowd management actions",
    ),
]);

pub static ANOMALY_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required(
        "severity",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Str("medium"),
        "incident severity",
    ),
    FieldSpec::required(
        "confidence",
        UNIT_INTERVAL,
        DefaultValue::Real(0.0),
        "classification confidence",
    ),
    FieldSpec::required(
        "recommendedActions",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "immediate actions in priority order",
    ),
    FieldSpec::optional(
        "category",
        FieldKind::Text,
        DefaultValue::Null,
        "crowd_safety, security_breach, medical_emergency, fire_hazard or structural_risk",
    ),
    FieldSpec::optional("analysis", FieldKind::Text, DefaultValue::Null, "short reasoning"),
    FieldSpec::optional("riskScore", PERCENT, DefaultValue::Null, "risk score"),
]);

const MONITORING_ALERT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required(
        "severity",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Null,
        "alert severity",
    ),
    FieldSpec::required("message", FieldKind::Text, DefaultValue::Null, "alert text"),
    FieldSpec::optional("zone", FieldKind::Text, DefaultValue::Null, "affected zone"),
    FieldSpec::optional("action", FieldKind::Text, DefaultValue::Null, "recommended action"),
    FieldSpec::optional(
        "incidentIds",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "ids of the listed incidents this alert concerns",
    ),
];

pub static LIVE_MONITORING_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required(
        "overallStatus",
        FieldKind::Enum(OVERALL_STATUSES),
        DefaultValue::Str("unknown"),
        "overall event status",
    ),
    FieldSpec::required(
        "riskLevel",
        FieldKind::Enum(SEVERITIES),
        DefaultValue::Str("medium"),
        "current risk level",
    ),
    FieldSpec::required(
        "alerts",
        FieldKind::ObjectList(MONITORING_ALERT_FIELDS),
        DefaultValue::EmptyList,
        "real-time alerts",
    ),
    FieldSpec::optional("riskScore", PERCENT, DefaultValue::Null, "risk score"),
    FieldSpec::optional("insights", FieldKind::TextList, DefaultValue::EmptyList, "observations"),
    FieldSpec::optional(
        "recommendations",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "recommended actions",
    ),
]);

pub static REPORT_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required(
        "summaryText",
        FieldKind::Text,
        DefaultValue::Str(REPORT_UNAVAILABLE),
        "the full report in Markdown",
    ),
    FieldSpec::optional("highlights", FieldKind::TextList, DefaultValue::EmptyList, "key findings"),
    FieldSpec::optional(
        "recommendations",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "recommendations for future events",
    ),
]);

pub static CHAT_SCHEMA: TaskSchema = TaskSchema::new(&[
    FieldSpec::required(
        "replyText",
        FieldKind::Text,
        DefaultValue::Str(CHAT_UNAVAILABLE),
        "the assistant's reply",
    ),
    FieldSpec::optional(
        "suggestedActions",
        FieldKind::TextList,
        DefaultValue::EmptyList,
        "follow-up actions for staff",
    ),
]);
