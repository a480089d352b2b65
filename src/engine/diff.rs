//! Diff engine — reconciles adapter batches into devices, observations and
//! alerts.
//!
//! Responsibilities:
//! 1. Normalise each client record to a stable `device_key` (HMAC of MAC).
//! 2. Create or update device rows.
//! 3. Append observation rows (timeline).
//! 4. Raise alerts for new/unapproved devices (with dedup).
//! 5. Respect maintenance-window suppression.
//!
//! The caller owns the transaction boundary; a storage failure mid-batch must
//! abort the whole batch (see `queries::with_savepoint`).

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::adapters::NormalisedClient;
use crate::config::InventoryConfig;
use crate::database::{
    queries, AlertSeverity, AlertType, DeviceRecord, DeviceStatus, ReconcileStats,
};
use crate::privacy::{device_fingerprint, mask_ip, mask_mac, short_hash};

/// Process one batch of normalised clients for a (workspace, network) scope.
///
/// Re-importing an identical batch is idempotent with respect to alerts (no
/// duplicate open alerts) but not with respect to observations: the timeline
/// always gains one row per input record.
pub fn reconcile(
    conn: &Connection,
    config: &InventoryConfig,
    workspace_id: i64,
    network_id: i64,
    clients: &[NormalisedClient],
    source: &str,
    now: DateTime<Utc>,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    // Pre-fetch existing devices for this scope, keyed by device_key.
    let mut existing_devices: HashMap<String, DeviceRecord> =
        queries::list_devices(conn, workspace_id, network_id, &Default::default())?
            .into_iter()
            .map(|dev| (dev.device_key.clone(), dev))
            .collect();

    // Pre-fetch the union of suppressed alert types from active windows.
    let suppressed_types =
        queries::active_suppressed_alert_types(conn, workspace_id, network_id, now)?;

    for client in clients {
        let device_key = device_fingerprint(&client.mac, &config.hmac_secret);
        let masked_mac = mask_mac(&client.mac);
        let masked_ip = if client.ip.is_empty() {
            String::new()
        } else {
            mask_ip(&client.ip)
        };

        let is_new = !existing_devices.contains_key(&device_key);

        let device_id = if is_new {
            let label = if client.hostname.is_empty() {
                masked_mac.as_str()
            } else {
                client.hostname.as_str()
            };
            let id = queries::insert_device(
                conn,
                &queries::NewDevice {
                    workspace_id,
                    network_id,
                    device_key: &device_key,
                    label,
                },
                now,
            )?;
            existing_devices.insert(
                device_key.clone(),
                DeviceRecord {
                    id,
                    workspace_id,
                    network_id,
                    device_key: device_key.clone(),
                    label: label.to_string(),
                    tags: Vec::new(),
                    category: "unknown".to_string(),
                    owner: None,
                    notes: None,
                    criticality: crate::database::Criticality::Low,
                    approved: false,
                    risk_score: 0,
                    risk_level: crate::database::RiskLevel::Low,
                    status: DeviceStatus::Active,
                    first_seen_at: now,
                    last_seen_at: now,
                },
            );
            stats.devices_created += 1;
            id
        } else {
            // Drop the immutable borrow before the queries call.
            let id = existing_devices[&device_key].id;
            queries::touch_device_seen(conn, id, now)?;
            if let Some(dev) = existing_devices.get_mut(&device_key) {
                dev.last_seen_at = now;
                dev.status = DeviceStatus::Active;
            }
            stats.devices_updated += 1;
            id
        };

        // Append observation. Always one row per input record, even for
        // devices that already exist.
        queries::insert_observation(
            conn,
            &queries::ObservationInsert {
                device_id,
                network_id,
                source,
                connection_type: &client.connection_type,
                mac_masked: &masked_mac,
                ip_masked: &masked_ip,
                vendor: non_empty(&client.vendor),
                hostname: non_empty(&client.hostname),
            },
            now,
        )?;
        stats.observations_created += 1;

        // Alerts
        if is_new {
            let created = maybe_create_alert(
                conn,
                workspace_id,
                network_id,
                device_id,
                AlertType::NewDevice,
                AlertSeverity::Med,
                serde_json::json!({
                    "mac_masked": masked_mac,
                    "hostname": client.hostname,
                }),
                &suppressed_types,
                now,
            )?;
            if created {
                stats.alerts_created += 1;
            }
        }

        let approved = existing_devices
            .get(&device_key)
            .map(|dev| dev.approved)
            .unwrap_or(false);
        if !approved {
            let created = maybe_create_alert(
                conn,
                workspace_id,
                network_id,
                device_id,
                AlertType::UnapprovedDevice,
                AlertSeverity::Med,
                serde_json::json!({ "mac_masked": masked_mac }),
                &suppressed_types,
                now,
            )?;
            if created {
                stats.alerts_created += 1;
            }
        }
    }

    tracing::debug!(
        workspace_id,
        network_id,
        created = stats.devices_created,
        updated = stats.devices_updated,
        alerts = stats.alerts_created,
        "Reconciled client batch"
    );

    Ok(stats)
}

/// Create an alert unless it is suppressed or deduped. Returns whether an
/// alert row was actually inserted.
#[allow(clippy::too_many_arguments)]
fn maybe_create_alert(
    conn: &Connection,
    workspace_id: i64,
    network_id: i64,
    device_id: i64,
    alert_type: AlertType,
    severity: AlertSeverity,
    payload: serde_json::Value,
    suppressed_types: &HashSet<AlertType>,
    now: DateTime<Utc>,
) -> Result<bool> {
    if suppressed_types.contains(&alert_type) {
        return Ok(false);
    }

    let dedup_key = short_hash(&format!("{}:{}", device_id, alert_type));
    let inserted = queries::insert_alert_if_not_exists(
        conn,
        &queries::AlertInsert {
            workspace_id,
            network_id,
            device_id,
            alert_type,
            severity,
            dedup_key: &dedup_key,
            payload,
        },
        now,
    )?;

    Ok(inserted.is_some())
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}
