//! Policy & risk engine — calculates device risk scores and runs the
//! built-in time-based checks (odd-hours access, long absence).
//!
//! All functions are deterministic given (device, now) and a connection.

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use rusqlite::Connection;

use crate::config::InventoryConfig;
use crate::database::{
    queries, AlertSeverity, AlertType, DeviceRecord, DeviceStatus, PolicyStats, RiskLevel,
};
use crate::privacy::short_hash;

/// Calculate a 0-100 risk score from static device attributes.
pub fn calculate_risk_score(device: &DeviceRecord, config: &InventoryConfig) -> u8 {
    let mut score: u32 = 0;
    if device.category == "unknown" {
        score += config.risk_unknown_device_points;
    }
    if !device.approved {
        score += config.risk_unapproved_points;
    }
    if device.criticality == crate::database::Criticality::High {
        score += config.risk_critical_network_points;
    }
    score.min(100) as u8
}

/// Fixed three-tier thresholds: >= 60 high, >= 30 med, else low.
pub fn risk_level_from_score(score: u8) -> RiskLevel {
    if score >= 60 {
        RiskLevel::High
    } else if score >= 30 {
        RiskLevel::Med
    } else {
        RiskLevel::Low
    }
}

/// Recompute and persist risk score + level for a device. Idempotent.
pub fn update_device_risk(
    conn: &Connection,
    device: &mut DeviceRecord,
    config: &InventoryConfig,
) -> Result<()> {
    let score = calculate_risk_score(device, config);
    let level = risk_level_from_score(score);
    if score != device.risk_score || level != device.risk_level {
        queries::set_device_risk(conn, device.id, score, level)?;
    }
    device.risk_score = score;
    device.risk_level = level;
    Ok(())
}

/// Alert if a device is seen during the configured odd-hours window.
///
/// The window may wrap past midnight (e.g. 22:00-06:00). Deduplicated per
/// calendar day (UTC), so at most one odd-hours alert per device per day is
/// open or acknowledged. Returns whether an alert was created.
pub fn check_odd_hours(
    conn: &Connection,
    config: &InventoryConfig,
    device: &DeviceRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    let hour = now.hour();
    let start = config.odd_hours_start;
    let end = config.odd_hours_end;

    let in_odd = (start > end && (hour >= start || hour < end))
        || (start <= end && start <= hour && hour < end);
    if !in_odd {
        return Ok(false);
    }

    let dedup_key = short_hash(&format!(
        "{}:odd_hours:{}",
        device.id,
        now.format("%Y-%m-%d")
    ));
    let inserted = queries::insert_alert_if_not_exists(
        conn,
        &queries::AlertInsert {
            workspace_id: device.workspace_id,
            network_id: device.network_id,
            device_id: device.id,
            alert_type: AlertType::OddHours,
            severity: AlertSeverity::Low,
            dedup_key: &dedup_key,
            payload: serde_json::json!({
                "hour": hour,
                "device_label": device.label,
            }),
        },
        now,
    )?;

    Ok(inserted.is_some())
}

/// Mark a device inactive and alert if it has not been seen for the
/// configured number of days.
///
/// The inactive transition is persisted even when the alert dedups, so the
/// soft lifecycle stays correct while the existing alert is being handled.
/// Deduplicated per device, not per day: only one `long_absent` alert exists
/// until it is resolved. Returns whether an alert was created.
pub fn check_long_absent(
    conn: &Connection,
    config: &InventoryConfig,
    device: &mut DeviceRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    let days_absent = (now - device.last_seen_at).num_days();
    if days_absent < config.absent_days_threshold as i64 {
        return Ok(false);
    }

    if device.status != DeviceStatus::Inactive {
        queries::set_device_status(conn, device.id, DeviceStatus::Inactive)?;
        device.status = DeviceStatus::Inactive;
    }

    let dedup_key = short_hash(&format!("{}:long_absent", device.id));
    let inserted = queries::insert_alert_if_not_exists(
        conn,
        &queries::AlertInsert {
            workspace_id: device.workspace_id,
            network_id: device.network_id,
            device_id: device.id,
            alert_type: AlertType::LongAbsent,
            severity: AlertSeverity::Info,
            dedup_key: &dedup_key,
            payload: serde_json::json!({
                "days_absent": days_absent,
                "device_label": device.label,
            }),
        },
        now,
    )?;

    Ok(inserted.is_some())
}

/// Run all built-in policy checks for a network's devices.
///
/// Devices are fetched when not supplied. This is the batch entry point
/// invoked after every import and from the scheduled check command.
pub fn run_all_checks(
    conn: &Connection,
    config: &InventoryConfig,
    workspace_id: i64,
    network_id: i64,
    devices: Option<Vec<DeviceRecord>>,
    now: DateTime<Utc>,
) -> Result<PolicyStats> {
    let devices = match devices {
        Some(devices) => devices,
        None => queries::list_devices(conn, workspace_id, network_id, &Default::default())?,
    };

    let mut stats = PolicyStats::default();

    for mut device in devices {
        update_device_risk(conn, &mut device, config)?;
        stats.risk_updated += 1;

        if check_odd_hours(conn, config, &device, now)? {
            stats.alerts_created += 1;
        }

        if check_long_absent(conn, config, &mut device, now)? {
            stats.alerts_created += 1;
        }
    }

    Ok(stats)
}
