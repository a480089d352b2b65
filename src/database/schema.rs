//! Database schema definitions
//!
//! Creates and manages the SQLite tables

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Devices table: one pseudonymous device per (workspace, network, device_key)
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            network_id INTEGER NOT NULL,
            device_key TEXT NOT NULL,
            label TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT 'unknown',
            owner TEXT,
            notes TEXT,
            criticality TEXT NOT NULL DEFAULT 'low',
            approved INTEGER NOT NULL DEFAULT 0,
            risk_score INTEGER NOT NULL DEFAULT 0,
            risk_level TEXT NOT NULL DEFAULT 'low',
            status TEXT NOT NULL DEFAULT 'active',
            first_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            last_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(workspace_id, network_id, device_key)
        );

        -- Observations table: append-only sighting timeline, masked fields only
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            network_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            connection_type TEXT NOT NULL DEFAULT 'unknown',
            mac_masked TEXT NOT NULL,
            ip_masked TEXT NOT NULL DEFAULT '',
            vendor TEXT,
            hostname TEXT,
            seen_count INTEGER NOT NULL DEFAULT 1,
            observed_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE
        );

        -- Alerts table: deduplicated policy notifications
        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            network_id INTEGER NOT NULL,
            device_id INTEGER NOT NULL,
            alert_type TEXT NOT NULL,
            severity TEXT NOT NULL DEFAULT 'info',
            status TEXT NOT NULL DEFAULT 'open',
            dedup_key TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            ack_at TEXT,
            resolved_at TEXT,
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE
        );

        -- Maintenance windows: alert suppression ranges (network_id NULL = whole workspace)
        CREATE TABLE IF NOT EXISTS maintenance_windows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            network_id INTEGER,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            suppress_alert_types TEXT NOT NULL DEFAULT '',
            reason TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Audit logs: append-only operator action trail
        CREATE TABLE IF NOT EXISTS audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id INTEGER NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Indexes for performance
        CREATE INDEX IF NOT EXISTS idx_devices_scope ON devices(workspace_id, network_id);
        CREATE INDEX IF NOT EXISTS idx_devices_last_seen ON devices(last_seen_at);
        CREATE INDEX IF NOT EXISTS idx_observations_device ON observations(device_id);
        CREATE INDEX IF NOT EXISTS idx_observations_observed ON observations(observed_at);
        CREATE INDEX IF NOT EXISTS idx_alerts_workspace ON alerts(workspace_id, status);
        CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);
        CREATE INDEX IF NOT EXISTS idx_alerts_dedup ON alerts(dedup_key) WHERE status != 'resolved';
        CREATE INDEX IF NOT EXISTS idx_windows_workspace ON maintenance_windows(workspace_id, start_at, end_at);
        CREATE INDEX IF NOT EXISTS idx_audit_workspace ON audit_logs(workspace_id, created_at);
        "#,
    )
    .context("Failed to create database tables")?;

    // Backward-compatible migration for databases created before operator notes existed.
    let has_devices_notes: bool = conn
        .prepare("PRAGMA table_info(devices)")
        .and_then(|mut stmt| {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let col_name: String = row.get(1)?;
                if col_name == "notes" {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .context("Failed to inspect devices table schema")?;

    if !has_devices_notes {
        conn.execute("ALTER TABLE devices ADD COLUMN notes TEXT", [])
            .context("Failed to migrate devices table with notes column")?;
    }

    Ok(())
}

/// Drop all tables (for testing/reset)
#[allow(dead_code)]
pub fn drop_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS audit_logs;
        DROP TABLE IF EXISTS maintenance_windows;
        DROP TABLE IF EXISTS alerts;
        DROP TABLE IF EXISTS observations;
        DROP TABLE IF EXISTS devices;
        "#,
    )
    .context("Failed to drop tables")?;

    Ok(())
}
