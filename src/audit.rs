//! Append-only audit trail for operator actions.
//!
//! Every privacy-relevant operation (import, approve, reveal, alert
//! transitions, maintenance-window creation) leaves a row here and a
//! matching tracing line.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// One audit entry as supplied by the caller.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub workspace_id: i64,
    pub actor: &'a str,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Append an audit record.
pub fn log_audit(conn: &Connection, entry: &AuditEntry<'_>) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO audit_logs (workspace_id, actor, action, entity_type, entity_id, metadata)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            entry.workspace_id,
            entry.actor,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.metadata.to_string(),
        ],
    )
    .context("Failed to insert audit record")?;

    tracing::info!(
        "AUDIT | actor={} action={} entity={}/{}",
        entry.actor,
        entry.action,
        entry.entity_type,
        entry.entity_id.as_deref().unwrap_or("-"),
    );

    Ok(())
}
