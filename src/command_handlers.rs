use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::adapters::parse_file;
use crate::audit::{log_audit, AuditEntry};
use crate::config::InventoryConfig;
use crate::database::{
    queries, AlertFilter, AlertStatus, AlertType, Database, DeviceFilter, DeviceStatus,
    DeviceUpdate, MaintenanceWindowInsert,
};
use crate::engine::{reconcile, run_all_checks, update_device_risk};
use crate::exports::export_devices_csv;

fn open_database(db: Option<PathBuf>) -> Result<Database> {
    let path = db.unwrap_or_else(Database::default_path);
    Database::new(path).context("Failed to open database")
}

fn current_actor() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "operator".to_string())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

pub(crate) fn handle_import(
    file: &Path,
    workspace_id: i64,
    network_id: i64,
    source: &str,
    db: Option<PathBuf>,
) -> Result<()> {
    let config = InventoryConfig::from_env();
    config.validate()?;

    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid import file path: {}", file.display()))?;

    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    if !config.allowed_import_extensions.contains(&extension) {
        anyhow::bail!(
            "Unsupported file type '{}'. Allowed: {}",
            extension,
            config.allowed_import_extensions.join(", ")
        );
    }

    let data = std::fs::read(file)
        .with_context(|| format!("Failed to read import file {}", file.display()))?;
    if data.len() > config.max_import_file_size {
        anyhow::bail!(
            "Import file is {} bytes, above the {} byte limit",
            data.len(),
            config.max_import_file_size
        );
    }

    let outcome = parse_file(&data, &filename);
    if !outcome.success {
        anyhow::bail!("Import parse failed: {}", outcome.error);
    }

    tracing::info!(
        "Importing {} clients from {} (workspace={}, network={})",
        outcome.raw_count,
        filename,
        workspace_id,
        network_id
    );

    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();
    let actor = current_actor();

    let (stats, policy) = queries::with_savepoint(&conn, "import_batch", || {
        let stats = reconcile(
            &conn,
            &config,
            workspace_id,
            network_id,
            &outcome.clients,
            source,
            now,
        )?;
        let policy = run_all_checks(&conn, &config, workspace_id, network_id, None, now)?;
        log_audit(
            &conn,
            &AuditEntry {
                workspace_id,
                actor: &actor,
                action: "import_devices",
                entity_type: "network",
                entity_id: Some(network_id.to_string()),
                metadata: json!({
                    "filename": filename,
                    "source": source,
                    "raw_count": outcome.raw_count,
                    "devices_created": stats.devices_created,
                    "devices_updated": stats.devices_updated,
                    "alerts_created": stats.alerts_created,
                }),
            },
        )?;
        Ok((stats, policy))
    })?;

    print_json(&json!({
        "import": {
            "devices_created": stats.devices_created,
            "devices_updated": stats.devices_updated,
            "observations_created": stats.observations_created,
            "alerts_created": stats.alerts_created,
            "risk_updated": policy.risk_updated,
            "policy_alerts": policy.alerts_created,
        },
        "raw_count": outcome.raw_count,
    }))
}

pub(crate) fn handle_check(
    workspace_id: i64,
    network_id: i64,
    db: Option<PathBuf>,
) -> Result<()> {
    let config = InventoryConfig::from_env();
    config.validate()?;

    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();

    let (policy, pruned) = queries::with_savepoint(&conn, "policy_check", || {
        let policy = run_all_checks(&conn, &config, workspace_id, network_id, None, now)?;
        let pruned = queries::prune_observations(&conn, config.observation_retention_days, now)?;
        Ok((policy, pruned))
    })?;

    print_json(&json!({
        "check": {
            "risk_updated": policy.risk_updated,
            "alerts_created": policy.alerts_created,
            "observations_pruned": pruned,
        },
    }))
}

pub(crate) fn handle_devices(
    workspace_id: i64,
    network_id: i64,
    status: Option<DeviceStatus>,
    db: Option<PathBuf>,
) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;

    let filter = DeviceFilter {
        status,
        ..Default::default()
    };
    let devices = queries::list_devices(&conn, workspace_id, network_id, &filter)?;
    let count = devices.len();
    print_json(&json!({ "devices": devices, "count": count }))
}

pub(crate) fn handle_alerts(
    workspace_id: i64,
    network_id: Option<i64>,
    status: Option<AlertStatus>,
    db: Option<PathBuf>,
) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;

    let filter = AlertFilter {
        status,
        ..Default::default()
    };
    let alerts = queries::list_alerts(&conn, workspace_id, network_id, &filter)?;
    let count = alerts.len();
    print_json(&json!({ "alerts": alerts, "count": count }))
}

pub(crate) fn handle_approve(device_id: i64, revoke: bool, db: Option<PathBuf>) -> Result<()> {
    let config = InventoryConfig::from_env();
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();
    let actor = current_actor();
    let approved = !revoke;

    let device = queries::with_savepoint(&conn, "approve_device", || {
        let Some(mut device) = queries::get_device(&conn, device_id)? else {
            anyhow::bail!("Device {} not found", device_id);
        };

        queries::set_device_approved(&conn, device_id, approved)?;
        device.approved = approved;
        update_device_risk(&conn, &mut device, &config)?;

        if approved {
            let resolved = queries::resolve_open_alerts_for_device(
                &conn,
                device_id,
                AlertType::UnapprovedDevice,
                now,
            )?;
            if resolved > 0 {
                tracing::info!(
                    "Resolved {} unapproved_device alerts for device {}",
                    resolved,
                    device_id
                );
            }
        }

        log_audit(
            &conn,
            &AuditEntry {
                workspace_id: device.workspace_id,
                actor: &actor,
                action: if approved {
                    "approve_device"
                } else {
                    "unapprove_device"
                },
                entity_type: "device",
                entity_id: Some(device_id.to_string()),
                metadata: json!({ "approved": approved }),
            },
        )?;
        Ok(device)
    })?;

    print_json(&json!({ "device": device }))
}

pub(crate) fn handle_set(device_id: i64, update: DeviceUpdate, db: Option<PathBuf>) -> Result<()> {
    let config = InventoryConfig::from_env();
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let actor = current_actor();

    let mut fields: Vec<&str> = Vec::new();
    if update.label.is_some() {
        fields.push("label");
    }
    if update.tags.is_some() {
        fields.push("tags");
    }
    if update.category.is_some() {
        fields.push("category");
    }
    if update.owner.is_some() {
        fields.push("owner");
    }
    if update.criticality.is_some() {
        fields.push("criticality");
    }
    if update.notes.is_some() {
        fields.push("notes");
    }

    let device = queries::with_savepoint(&conn, "update_device", || {
        if queries::get_device(&conn, device_id)?.is_none() {
            anyhow::bail!("Device {} not found", device_id);
        }

        queries::update_device_fields(&conn, device_id, &update)?;

        // Category and criticality changes shift the risk score.
        let mut device = queries::get_device(&conn, device_id)?
            .ok_or_else(|| anyhow::anyhow!("Device {} disappeared mid-update", device_id))?;
        update_device_risk(&conn, &mut device, &config)?;

        log_audit(
            &conn,
            &AuditEntry {
                workspace_id: device.workspace_id,
                actor: &actor,
                action: "update_device",
                entity_type: "device",
                entity_id: Some(device_id.to_string()),
                metadata: json!({ "fields": fields }),
            },
        )?;
        Ok(device)
    })?;

    print_json(&json!({ "device": device }))
}

pub(crate) fn handle_ack(alert_id: i64, db: Option<PathBuf>) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();
    let actor = current_actor();

    let alert = queries::with_savepoint(&conn, "ack_alert", || {
        let alert = queries::ack_alert(&conn, alert_id, now)?;
        log_audit(
            &conn,
            &AuditEntry {
                workspace_id: alert.workspace_id,
                actor: &actor,
                action: "ack_alert",
                entity_type: "alert",
                entity_id: Some(alert_id.to_string()),
                metadata: json!({ "alert_type": alert.alert_type }),
            },
        )?;
        Ok(alert)
    })?;

    print_json(&json!({ "alert": alert }))
}

pub(crate) fn handle_resolve(
    alert_id: i64,
    notes: Option<String>,
    db: Option<PathBuf>,
) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();
    let actor = current_actor();

    let alert = queries::with_savepoint(&conn, "resolve_alert", || {
        let alert = queries::resolve_alert(&conn, alert_id, now)?;
        log_audit(
            &conn,
            &AuditEntry {
                workspace_id: alert.workspace_id,
                actor: &actor,
                action: "resolve_alert",
                entity_type: "alert",
                entity_id: Some(alert_id.to_string()),
                metadata: json!({ "alert_type": alert.alert_type, "notes": notes }),
            },
        )?;
        Ok(alert)
    })?;

    print_json(&json!({ "alert": alert }))
}

pub(crate) fn handle_reveal(device_id: i64, reason: &str, db: Option<PathBuf>) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let actor = current_actor();

    let (device, latest) = queries::with_savepoint(&conn, "reveal_identifiers", || {
        let Some(device) = queries::get_device(&conn, device_id)? else {
            anyhow::bail!("Device {} not found", device_id);
        };
        let latest = queries::latest_observation(&conn, device_id)?;

        // Every reveal leaves an audit trace, even though only masked
        // values exist to reveal.
        log_audit(
            &conn,
            &AuditEntry {
                workspace_id: device.workspace_id,
                actor: &actor,
                action: "reveal_identifiers",
                entity_type: "device",
                entity_id: Some(device_id.to_string()),
                metadata: json!({ "reason": reason }),
            },
        )?;
        Ok((device, latest))
    })?;

    print_json(&json!({
        "device_id": device_id,
        "note": "Full identifiers are not stored. Only hashed device_key and masked values are retained.",
        "device_key": device.device_key,
        "latest_masked_mac": latest.as_ref().map(|o| o.mac_masked.clone()),
        "latest_masked_ip": latest.as_ref().map(|o| o.ip_masked.clone()),
        "reveal_logged": true,
    }))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_maintenance(
    workspace_id: i64,
    network_id: Option<i64>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    suppress: &[AlertType],
    reason: &str,
    db: Option<PathBuf>,
) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
    let now = Utc::now();
    let actor = current_actor();

    let window = queries::with_savepoint(&conn, "create_window", || {
        let window = queries::create_maintenance_window(
            &conn,
            &MaintenanceWindowInsert {
                workspace_id,
                network_id,
                start_at: start,
                end_at: end,
                suppress_alert_types: suppress,
                reason,
                created_by: &actor,
            },
            now,
        )?;
        log_audit(
            &conn,
            &AuditEntry {
                workspace_id,
                actor: &actor,
                action: "create_maintenance_window",
                entity_type: "maintenance_window",
                entity_id: Some(window.id.to_string()),
                metadata: json!({
                    "start_at": start,
                    "end_at": end,
                    "suppress": suppress,
                }),
            },
        )?;
        Ok(window)
    })?;

    print_json(&json!({ "maintenance_window": window }))
}

pub(crate) fn handle_report(
    workspace_id: i64,
    output: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<()> {
    let database = open_database(db)?;
    let conn = database.connection();
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;

    let kpis = queries::kpi_summary(&conn, workspace_id)?;

    if let Some(path) = &output {
        let devices = queries::list_workspace_devices(&conn, workspace_id)?;
        let csv = export_devices_csv(&devices)?;
        std::fs::write(path, csv)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Wrote device export to {}", path.display());
    }

    print_json(&json!({ "kpis": kpis }))
}
