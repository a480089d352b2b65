//! Database query functions
//!
//! CRUD operations for devices, observations, alerts, maintenance windows
//! and KPIs. All timestamps are stored as SQLite UTC text and written from
//! an injected `now` so callers (and tests) control the clock.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::*;

const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEVICE_COLUMNS: &str = "id, workspace_id, network_id, device_key, label, tags, category, \
     owner, notes, criticality, approved, risk_score, risk_level, status, \
     first_seen_at, last_seen_at";

/// Fields for a device created on first observation of a MAC.
pub struct NewDevice<'a> {
    pub workspace_id: i64,
    pub network_id: i64,
    pub device_key: &'a str,
    pub label: &'a str,
}

/// Fields for one appended observation row. Only masked identifiers.
pub struct ObservationInsert<'a> {
    pub device_id: i64,
    pub network_id: i64,
    pub source: &'a str,
    pub connection_type: &'a str,
    pub mac_masked: &'a str,
    pub ip_masked: &'a str,
    pub vendor: Option<&'a str>,
    pub hostname: Option<&'a str>,
}

/// Parameters used to insert an alert record.
pub struct AlertInsert<'a> {
    pub workspace_id: i64,
    pub network_id: i64,
    pub device_id: i64,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub dedup_key: &'a str,
    pub payload: serde_json::Value,
}

/// Fields for a new maintenance window.
pub struct MaintenanceWindowInsert<'a> {
    pub workspace_id: i64,
    pub network_id: Option<i64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub suppress_alert_types: &'a [AlertType],
    pub reason: &'a str,
    pub created_by: &'a str,
}

/// Optional filters for device listing.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub status: Option<DeviceStatus>,
    pub risk_level: Option<RiskLevel>,
    pub approved: Option<bool>,
}

/// Optional filters for alert listing.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<AlertSeverity>,
}

/// Run `body` inside a named SAVEPOINT, rolling back every write on failure.
/// Partial application of device/observation/alert state would corrupt the
/// dedup invariant, so a batch either fully commits or fully rolls back.
pub fn with_savepoint<T, F>(conn: &Connection, name: &str, body: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    conn.execute_batch(&format!("SAVEPOINT {}", name))
        .with_context(|| format!("Failed to start {} transaction", name))?;

    match body() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))
                .with_context(|| format!("Failed to commit {} transaction", name))?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
            ));
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Insert a device on first observation. Unapproved, active, risk 0.
pub fn insert_device(conn: &Connection, device: &NewDevice<'_>, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO devices (
            workspace_id, network_id, device_key, label, category, approved,
            status, first_seen_at, last_seen_at
        ) VALUES (?1, ?2, ?3, ?4, 'unknown', 0, 'active', ?5, ?5)
        "#,
        params![
            device.workspace_id,
            device.network_id,
            device.device_key,
            device.label,
            to_sql_datetime(now),
        ],
    )
    .context("Failed to insert device")?;

    Ok(conn.last_insert_rowid())
}

/// Mark a device as seen now: bump `last_seen_at` and reactivate it.
pub fn touch_device_seen(conn: &Connection, device_id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE devices SET last_seen_at = ?2, status = 'active' WHERE id = ?1",
        params![device_id, to_sql_datetime(now)],
    )
    .context("Failed to update device last_seen_at")?;
    Ok(())
}

pub fn set_device_approved(conn: &Connection, device_id: i64, approved: bool) -> Result<()> {
    conn.execute(
        "UPDATE devices SET approved = ?2 WHERE id = ?1",
        params![device_id, approved as i32],
    )
    .context("Failed to update device approval")?;
    Ok(())
}

pub fn set_device_risk(
    conn: &Connection,
    device_id: i64,
    score: u8,
    level: RiskLevel,
) -> Result<()> {
    conn.execute(
        "UPDATE devices SET risk_score = ?2, risk_level = ?3 WHERE id = ?1",
        params![device_id, score as i32, level.as_str()],
    )
    .context("Failed to update device risk")?;
    Ok(())
}

pub fn set_device_status(conn: &Connection, device_id: i64, status: DeviceStatus) -> Result<()> {
    conn.execute(
        "UPDATE devices SET status = ?2 WHERE id = ?1",
        params![device_id, status.as_str()],
    )
    .context("Failed to update device status")?;
    Ok(())
}

/// Apply an operator field patch. Unset fields are left untouched.
pub fn update_device_fields(
    conn: &Connection,
    device_id: i64,
    update: &DeviceUpdate,
) -> Result<()> {
    if update.is_empty() {
        return Ok(());
    }

    let mut assignments: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(device_id)];

    if let Some(label) = &update.label {
        values.push(Box::new(label.clone()));
        assignments.push(format!("label = ?{}", values.len()));
    }
    if let Some(tags) = &update.tags {
        values.push(Box::new(tags.join(",")));
        assignments.push(format!("tags = ?{}", values.len()));
    }
    if let Some(category) = &update.category {
        values.push(Box::new(category.clone()));
        assignments.push(format!("category = ?{}", values.len()));
    }
    if let Some(owner) = &update.owner {
        values.push(Box::new(owner.clone()));
        assignments.push(format!("owner = ?{}", values.len()));
    }
    if let Some(criticality) = update.criticality {
        values.push(Box::new(criticality.as_str().to_string()));
        assignments.push(format!("criticality = ?{}", values.len()));
    }
    if let Some(notes) = &update.notes {
        values.push(Box::new(notes.clone()));
        assignments.push(format!("notes = ?{}", values.len()));
    }

    let sql = format!(
        "UPDATE devices SET {} WHERE id = ?1",
        assignments.join(", ")
    );
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, params.as_slice())
        .context("Failed to update device fields")?;
    Ok(())
}

/// Get device by id
pub fn get_device(conn: &Connection, device_id: i64) -> Result<Option<DeviceRecord>> {
    let sql = format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS);
    conn.query_row(&sql, params![device_id], map_device_row)
        .optional()
        .context("Failed to query device")
}

/// List devices in a (workspace, network) scope with optional filters.
pub fn list_devices(
    conn: &Connection,
    workspace_id: i64,
    network_id: i64,
    filter: &DeviceFilter,
) -> Result<Vec<DeviceRecord>> {
    let mut sql = format!(
        "SELECT {} FROM devices WHERE workspace_id = ?1 AND network_id = ?2",
        DEVICE_COLUMNS
    );
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(workspace_id), Box::new(network_id)];

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str().to_string()));
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    if let Some(level) = filter.risk_level {
        values.push(Box::new(level.as_str().to_string()));
        sql.push_str(&format!(" AND risk_level = ?{}", values.len()));
    }
    if let Some(approved) = filter.approved {
        values.push(Box::new(approved as i32));
        sql.push_str(&format!(" AND approved = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY last_seen_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let devices = stmt
        .query_map(params.as_slice(), map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

/// List every device in a workspace, most recently seen first.
pub fn list_workspace_devices(conn: &Connection, workspace_id: i64) -> Result<Vec<DeviceRecord>> {
    let sql = format!(
        "SELECT {} FROM devices WHERE workspace_id = ?1 ORDER BY last_seen_at DESC",
        DEVICE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let devices = stmt
        .query_map(params![workspace_id], map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

fn map_device_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRecord> {
    let tags_raw: String = row.get(5)?;
    let criticality_str: String = row.get(9)?;
    let risk_level_str: String = row.get(12)?;
    let status_str: String = row.get(13)?;

    Ok(DeviceRecord {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        network_id: row.get(2)?,
        device_key: row.get(3)?,
        label: row.get(4)?,
        tags: split_tags(&tags_raw),
        category: row.get(6)?,
        owner: row.get(7)?,
        notes: row.get(8)?,
        criticality: parse_criticality_or_default(&criticality_str),
        approved: row.get::<_, i32>(10)? == 1,
        risk_score: clamp_risk_score(row.get(11)?),
        risk_level: parse_risk_level_or_default(&risk_level_str),
        status: parse_device_status_or_default(&status_str),
        first_seen_at: parse_datetime_column(row.get::<_, String>(14)?, 14)?,
        last_seen_at: parse_datetime_column(row.get::<_, String>(15)?, 15)?,
    })
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Append one observation row. The timeline is append-only; rows are never
/// mutated, only pruned by retention.
pub fn insert_observation(
    conn: &Connection,
    obs: &ObservationInsert<'_>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO observations (
            device_id, network_id, source, connection_type, mac_masked,
            ip_masked, vendor, hostname, seen_count, observed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)
        "#,
        params![
            obs.device_id,
            obs.network_id,
            obs.source,
            obs.connection_type,
            obs.mac_masked,
            obs.ip_masked,
            obs.vendor,
            obs.hostname,
            to_sql_datetime(now),
        ],
    )
    .context("Failed to insert observation")?;

    Ok(conn.last_insert_rowid())
}

/// Get the observation timeline for a device, newest first.
pub fn get_device_observations(
    conn: &Connection,
    device_id: i64,
    limit: i64,
) -> Result<Vec<ObservationRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, device_id, network_id, source, connection_type, mac_masked,
               ip_masked, vendor, hostname, seen_count, observed_at
        FROM observations
        WHERE device_id = ?1
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;

    let observations = stmt
        .query_map(params![device_id, limit], map_observation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(observations)
}

/// Most recent observation for a device, if any.
pub fn latest_observation(conn: &Connection, device_id: i64) -> Result<Option<ObservationRecord>> {
    conn.query_row(
        r#"
        SELECT id, device_id, network_id, source, connection_type, mac_masked,
               ip_masked, vendor, hostname, seen_count, observed_at
        FROM observations
        WHERE device_id = ?1
        ORDER BY id DESC
        LIMIT 1
        "#,
        params![device_id],
        map_observation_row,
    )
    .optional()
    .context("Failed to query latest observation")
}

fn map_observation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObservationRecord> {
    Ok(ObservationRecord {
        id: row.get(0)?,
        device_id: row.get(1)?,
        network_id: row.get(2)?,
        source: row.get(3)?,
        connection_type: row.get(4)?,
        mac_masked: row.get(5)?,
        ip_masked: row.get(6)?,
        vendor: row.get(7)?,
        hostname: row.get(8)?,
        seen_count: row.get(9)?,
        observed_at: parse_datetime_column(row.get::<_, String>(10)?, 10)?,
    })
}

/// Delete observation rows older than the retention cutoff. Returns the
/// number of pruned rows.
pub fn prune_observations(
    conn: &Connection,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<u64> {
    let cutoff = now - chrono::Duration::days(retention_days as i64);
    let pruned = conn
        .execute(
            "DELETE FROM observations WHERE observed_at < ?1",
            params![to_sql_datetime(cutoff)],
        )
        .context("Failed to prune observations")?;
    Ok(pruned as u64)
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Insert an alert unless one with the same dedup key is already open or
/// acknowledged. This is the core deduplication contract: at most one
/// unresolved alert per dedup key, new instances only after resolution.
pub fn insert_alert_if_not_exists(
    conn: &Connection,
    alert: &AlertInsert<'_>,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let existing: Option<i64> = conn
        .query_row(
            r#"
            SELECT id
            FROM alerts
            WHERE dedup_key = ?1 AND status IN ('open', 'ack')
            ORDER BY id DESC
            LIMIT 1
            "#,
            params![alert.dedup_key],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        return Ok(None);
    }

    conn.execute(
        r#"
        INSERT INTO alerts (
            workspace_id, network_id, device_id, alert_type, severity,
            status, dedup_key, payload, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?7, ?8)
        "#,
        params![
            alert.workspace_id,
            alert.network_id,
            alert.device_id,
            alert.alert_type.as_str(),
            alert.severity.as_str(),
            alert.dedup_key,
            alert.payload.to_string(),
            to_sql_datetime(now),
        ],
    )
    .context("Failed to insert alert")?;

    Ok(Some(conn.last_insert_rowid()))
}

/// Get alert by id
pub fn get_alert(conn: &Connection, alert_id: i64) -> Result<Option<AlertRecord>> {
    conn.query_row(
        r#"
        SELECT id, workspace_id, network_id, device_id, alert_type, severity,
               status, dedup_key, payload, created_at, ack_at, resolved_at
        FROM alerts WHERE id = ?1
        "#,
        params![alert_id],
        map_alert_row,
    )
    .optional()
    .context("Failed to query alert")
}

/// List alerts for a workspace, optionally narrowed to one network.
pub fn list_alerts(
    conn: &Connection,
    workspace_id: i64,
    network_id: Option<i64>,
    filter: &AlertFilter,
) -> Result<Vec<AlertRecord>> {
    let mut sql = String::from(
        "SELECT id, workspace_id, network_id, device_id, alert_type, severity, \
         status, dedup_key, payload, created_at, ack_at, resolved_at \
         FROM alerts WHERE workspace_id = ?1",
    );
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(workspace_id)];

    if let Some(network_id) = network_id {
        values.push(Box::new(network_id));
        sql.push_str(&format!(" AND network_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str().to_string()));
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    if let Some(severity) = filter.severity {
        values.push(Box::new(severity.as_str().to_string()));
        sql.push_str(&format!(" AND severity = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let alerts = stmt
        .query_map(params.as_slice(), map_alert_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(alerts)
}

/// Acknowledge an open alert.
pub fn ack_alert(conn: &Connection, alert_id: i64, now: DateTime<Utc>) -> Result<AlertRecord> {
    let Some(alert) = get_alert(conn, alert_id)? else {
        bail!("Alert {} not found", alert_id);
    };
    if alert.status != AlertStatus::Open {
        bail!(
            "Alert {} is {}; only open alerts can be acknowledged",
            alert_id,
            alert.status
        );
    }

    conn.execute(
        "UPDATE alerts SET status = 'ack', ack_at = ?2 WHERE id = ?1",
        params![alert_id, to_sql_datetime(now)],
    )
    .context("Failed to acknowledge alert")?;

    Ok(AlertRecord {
        status: AlertStatus::Ack,
        ack_at: Some(now),
        ..alert
    })
}

/// Resolve an alert. Resolved is terminal per instance; a later occurrence of
/// the same condition creates a fresh alert.
pub fn resolve_alert(conn: &Connection, alert_id: i64, now: DateTime<Utc>) -> Result<AlertRecord> {
    let Some(alert) = get_alert(conn, alert_id)? else {
        bail!("Alert {} not found", alert_id);
    };
    if alert.status == AlertStatus::Resolved {
        bail!("Alert {} is already resolved", alert_id);
    }

    conn.execute(
        "UPDATE alerts SET status = 'resolved', resolved_at = ?2 WHERE id = ?1",
        params![alert_id, to_sql_datetime(now)],
    )
    .context("Failed to resolve alert")?;

    Ok(AlertRecord {
        status: AlertStatus::Resolved,
        resolved_at: Some(now),
        ..alert
    })
}

/// Resolve every open alert of one type for a device. Used when approving a
/// device clears its outstanding unapproved_device alerts.
pub fn resolve_open_alerts_for_device(
    conn: &Connection,
    device_id: i64,
    alert_type: AlertType,
    now: DateTime<Utc>,
) -> Result<u64> {
    let resolved = conn
        .execute(
            r#"
            UPDATE alerts SET status = 'resolved', resolved_at = ?3
            WHERE device_id = ?1 AND alert_type = ?2 AND status = 'open'
            "#,
            params![device_id, alert_type.as_str(), to_sql_datetime(now)],
        )
        .context("Failed to resolve device alerts")?;
    Ok(resolved as u64)
}

fn map_alert_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRecord> {
    let alert_type_str: String = row.get(4)?;
    let severity_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let payload_raw: String = row.get(8)?;

    Ok(AlertRecord {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        network_id: row.get(2)?,
        device_id: row.get(3)?,
        alert_type: parse_alert_type_or_default(&alert_type_str),
        severity: parse_alert_severity_or_default(&severity_str),
        status: parse_alert_status_or_default(&status_str),
        dedup_key: row.get(7)?,
        payload: parse_payload_or_default(&payload_raw),
        created_at: parse_datetime_column(row.get::<_, String>(9)?, 9)?,
        ack_at: parse_optional_datetime_column(row.get::<_, Option<String>>(10)?, 10)?,
        resolved_at: parse_optional_datetime_column(row.get::<_, Option<String>>(11)?, 11)?,
    })
}

// ---------------------------------------------------------------------------
// Maintenance windows
// ---------------------------------------------------------------------------

/// Create a maintenance window and return it.
pub fn create_maintenance_window(
    conn: &Connection,
    window: &MaintenanceWindowInsert<'_>,
    now: DateTime<Utc>,
) -> Result<MaintenanceWindowRecord> {
    let suppress = window
        .suppress_alert_types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(",");

    conn.execute(
        r#"
        INSERT INTO maintenance_windows (
            workspace_id, network_id, start_at, end_at, suppress_alert_types,
            reason, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            window.workspace_id,
            window.network_id,
            to_sql_datetime(window.start_at),
            to_sql_datetime(window.end_at),
            suppress,
            window.reason,
            window.created_by,
            to_sql_datetime(now),
        ],
    )
    .context("Failed to insert maintenance window")?;

    Ok(MaintenanceWindowRecord {
        id: conn.last_insert_rowid(),
        workspace_id: window.workspace_id,
        network_id: window.network_id,
        start_at: window.start_at,
        end_at: window.end_at,
        suppress_alert_types: window.suppress_alert_types.to_vec(),
        reason: window.reason.to_string(),
        created_by: window.created_by.to_string(),
        created_at: now,
    })
}

/// Union of alert types suppressed by every maintenance window active at
/// `now` for this network. Windows with NULL network apply workspace-wide.
pub fn active_suppressed_alert_types(
    conn: &Connection,
    workspace_id: i64,
    network_id: i64,
    now: DateTime<Utc>,
) -> Result<HashSet<AlertType>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT suppress_alert_types
        FROM maintenance_windows
        WHERE workspace_id = ?1
          AND start_at <= ?3
          AND end_at >= ?3
          AND (network_id = ?2 OR network_id IS NULL)
        "#,
    )?;

    let lists = stmt
        .query_map(
            params![workspace_id, network_id, to_sql_datetime(now)],
            |row| row.get::<_, String>(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut suppressed = HashSet::new();
    for list in lists {
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.parse::<AlertType>() {
                Ok(alert_type) => {
                    suppressed.insert(alert_type);
                }
                Err(_) => {
                    tracing::warn!("Unknown alert type in maintenance window: {}", name);
                }
            }
        }
    }

    Ok(suppressed)
}

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

/// Workspace-level inventory KPIs.
pub fn kpi_summary(conn: &Connection, workspace_id: i64) -> Result<KpiSummary> {
    let total_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE workspace_id = ?1",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let approved_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE workspace_id = ?1 AND approved = 1",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let active_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE workspace_id = ?1 AND status = 'active'",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let high_risk_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE workspace_id = ?1 AND risk_level = 'high'",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let open_alerts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM alerts WHERE workspace_id = ?1 AND status = 'open'",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let total_alerts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM alerts WHERE workspace_id = ?1",
        params![workspace_id],
        |row| row.get(0),
    )?;

    let approval_rate = if total_devices > 0 {
        (approved_devices as f64 / total_devices as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(KpiSummary {
        total_devices,
        approved_devices,
        unapproved_devices: total_devices - approved_devices,
        active_devices,
        high_risk_devices,
        open_alerts,
        total_alerts,
        approval_rate,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_sql_datetime(value: DateTime<Utc>) -> String {
    value.format(SQLITE_DATETIME_FORMAT).to_string()
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_str(&format!("{} +0000", s), "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_optional_datetime_column(
    s: Option<String>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|raw| parse_datetime_column(raw, column)).transpose()
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn clamp_risk_score(raw: i32) -> u8 {
    if raw < 0 {
        tracing::warn!("Negative risk_score {} found in database; clamping to 0", raw);
        0
    } else if raw > 100 {
        tracing::warn!(
            "Out-of-range risk_score {} found in database; clamping to 100",
            raw
        );
        100
    } else {
        raw as u8
    }
}

fn parse_alert_type_or_default(s: &str) -> AlertType {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown alert type in database: {}", s);
            AlertType::Custom
        }
    }
}

fn parse_alert_severity_or_default(s: &str) -> AlertSeverity {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown alert severity in database: {}", s);
            AlertSeverity::Info
        }
    }
}

fn parse_alert_status_or_default(s: &str) -> AlertStatus {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown alert status in database: {}", s);
            AlertStatus::Open
        }
    }
}

fn parse_device_status_or_default(s: &str) -> DeviceStatus {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown device status in database: {}", s);
            DeviceStatus::Active
        }
    }
}

fn parse_risk_level_or_default(s: &str) -> RiskLevel {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown risk level in database: {}", s);
            RiskLevel::Low
        }
    }
}

fn parse_criticality_or_default(s: &str) -> Criticality {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown criticality in database: {}", s);
            Criticality::Low
        }
    }
}

fn parse_payload_or_default(raw: &str) -> serde_json::Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Malformed alert payload in database: {}", raw);
            serde_json::Value::Null
        }
    }
}
