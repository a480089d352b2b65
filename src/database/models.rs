//! Database models
//!
//! Record structs and enums for inventory rows, with serialization support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device record: one pseudonymous device per (workspace, network, device_key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub network_id: i64,
    /// HMAC fingerprint of the MAC. The raw MAC is never stored.
    pub device_key: String,
    pub label: String,
    pub tags: Vec<String>,
    pub category: String,
    pub owner: Option<String>,
    pub notes: Option<String>,
    pub criticality: Criticality,
    pub approved: bool,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub status: DeviceStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Append-only timeline entry for one sighting of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: i64,
    pub device_id: i64,
    pub network_id: i64,
    pub source: String,
    pub connection_type: String,
    pub mac_masked: String,
    pub ip_masked: String,
    pub vendor: Option<String>,
    pub hostname: Option<String>,
    pub seen_count: i64,
    pub observed_at: DateTime<Utc>,
}

/// Alert record from database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub network_id: i64,
    pub device_id: i64,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub dedup_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ack_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Maintenance window during which selected alert types are suppressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindowRecord {
    pub id: i64,
    pub workspace_id: i64,
    /// None applies the window to every network in the workspace.
    pub network_id: Option<i64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub suppress_alert_types: Vec<AlertType>,
    pub reason: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail entry for operator actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub workspace_id: i64,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Alert types raised by the diff and policy engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewDevice,
    UnapprovedDevice,
    OddHours,
    LongAbsent,
    Custom,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::NewDevice => "new_device",
            AlertType::UnapprovedDevice => "unapproved_device",
            AlertType::OddHours => "odd_hours",
            AlertType::LongAbsent => "long_absent",
            AlertType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_device" => Ok(AlertType::NewDevice),
            "unapproved_device" => Ok(AlertType::UnapprovedDevice),
            "odd_hours" => Ok(AlertType::OddHours),
            "long_absent" => Ok(AlertType::LongAbsent),
            "custom" => Ok(AlertType::Custom),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Low,
    Med,
    High,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Low => "low",
            AlertSeverity::Med => "med",
            AlertSeverity::High => "high",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(AlertSeverity::Info),
            "low" => Ok(AlertSeverity::Low),
            "med" => Ok(AlertSeverity::Med),
            "high" => Ok(AlertSeverity::High),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Alert lifecycle. Transitions are open -> ack -> resolved; resolved is
/// terminal per instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Open,
    Ack,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Ack => "ack",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AlertStatus::Open),
            "ack" => Ok(AlertStatus::Ack),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("Unknown alert status: {}", s)),
        }
    }
}

/// Soft device lifecycle. Devices are never deleted; absence detection is
/// the only automatic transition to inactive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "inactive" => Ok(DeviceStatus::Inactive),
            _ => Err(format!("Unknown device status: {}", s)),
        }
    }
}

/// Three-tier mapping of the numeric risk score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Med,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Med => "med",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "med" => Ok(RiskLevel::Med),
            "high" => Ok(RiskLevel::High),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// Operator-assigned criticality of a device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Med,
    High,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Med => "med",
            Criticality::High => "high",
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Criticality::Low),
            "med" => Ok(Criticality::Med),
            "high" => Ok(Criticality::High),
            _ => Err(format!("Unknown criticality: {}", s)),
        }
    }
}

/// Counts returned by one reconciliation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub devices_created: u64,
    pub devices_updated: u64,
    pub observations_created: u64,
    pub alerts_created: u64,
}

/// Counts returned by one policy-check pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    pub risk_updated: u64,
    pub alerts_created: u64,
}

/// Workspace-level inventory KPIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_devices: i64,
    pub approved_devices: i64,
    pub unapproved_devices: i64,
    pub active_devices: i64,
    pub high_risk_devices: i64,
    pub open_alerts: i64,
    pub total_alerts: i64,
    /// Percentage, one decimal place.
    pub approval_rate: f64,
}

/// Patch of operator-editable device fields. Unset fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub label: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub criticality: Option<Criticality>,
    pub notes: Option<String>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.tags.is_none()
            && self.category.is_none()
            && self.owner.is_none()
            && self.criticality.is_none()
            && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn alert_type_round_trips_through_strings() {
        for alert_type in [
            AlertType::NewDevice,
            AlertType::UnapprovedDevice,
            AlertType::OddHours,
            AlertType::LongAbsent,
        ] {
            let parsed = AlertType::from_str(alert_type.as_str()).expect("known type");
            assert_eq!(parsed, alert_type);
        }
        assert!(AlertType::from_str("bogus").is_err());
    }

    #[test]
    fn alert_serde_names_are_snake_case() {
        let json = serde_json::to_string(&AlertType::UnapprovedDevice).expect("serialize");
        assert_eq!(json, "\"unapproved_device\"");
        let json = serde_json::to_string(&AlertSeverity::Med).expect("serialize");
        assert_eq!(json, "\"med\"");
    }

    #[test]
    fn device_update_emptiness() {
        assert!(DeviceUpdate::default().is_empty());
        let update = DeviceUpdate {
            label: Some("printer".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
