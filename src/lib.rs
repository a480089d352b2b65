//! netroster — privacy-preserving device inventory engine
//!
//! This crate tracks the devices on managed networks without storing
//! raw identifiers:
//! - HMAC-SHA256 device fingerprints instead of MAC addresses
//! - Masked MAC/IP values for operator display
//! - Batch reconciliation with deduplicated alerts
//! - Maintenance windows that suppress alert noise
//! - Risk scoring and time-based policy checks
//! - Append-only audit trail for operator actions

pub mod adapters;
pub mod app;
pub mod audit;
pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod exports;
pub mod logging;
pub mod privacy;

pub(crate) mod command_handlers;

pub use adapters::{parse_file, NormalisedClient, ParseOutcome};
pub use audit::{log_audit, AuditEntry};
pub use config::InventoryConfig;
pub use database::{
    AlertRecord, AlertSeverity, AlertStatus, AlertType, Criticality, Database, DeviceRecord,
    DeviceStatus, DeviceUpdate, KpiSummary, MaintenanceWindowRecord, ObservationRecord,
    PolicyStats, ReconcileStats, RiskLevel,
};
pub use engine::{
    calculate_risk_score, check_long_absent, check_odd_hours, reconcile, risk_level_from_score,
    run_all_checks, update_device_risk,
};
pub use exports::export_devices_csv;
pub use privacy::{device_fingerprint, mask_ip, mask_mac, short_hash};
