//! Inventory configuration and feature flags (env-driven).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_RETENTION_DAYS: u32 = 90;
const DEFAULT_MAX_SYNCS_PER_HOUR: u32 = 10;
const DEFAULT_MAX_IMPORTS_PER_HOUR: u32 = 20;
const DEFAULT_ODD_HOURS_START: u32 = 22;
const DEFAULT_ODD_HOURS_END: u32 = 6;
const DEFAULT_ABSENT_DAYS: u32 = 30;
const DEFAULT_DEDUP_WINDOW_SECONDS: u64 = 3600;
const DEFAULT_MAX_IMPORT_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Secrets the validator refuses to fingerprint with. Legacy deployments
/// shipped "change-me" as a placeholder; treating it as absent forces a real
/// secret before any device key is minted.
const PLACEHOLDER_SECRETS: [&str; 2] = ["change-me", "changeme"];

/// Feature flags and tunables for the inventory engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    // Feature flags
    pub enable_router_adapters: bool,
    pub enable_enforcement_actions: bool,
    pub data_minimization_mode: bool,

    // Retention
    pub observation_retention_days: u32,

    /// Server-held HMAC secret used for every device fingerprint. All
    /// fingerprinting in a process must use the same value or device_key
    /// joins silently break.
    pub hmac_secret: String,

    // Rate limits (enforced by callers, carried here as the single source)
    pub max_syncs_per_hour: u32,
    pub max_imports_per_hour: u32,

    // Risk engine weights
    pub risk_unknown_device_points: u32,
    pub risk_unapproved_points: u32,
    pub risk_odd_hours_points: u32,
    pub risk_new_vendor_points: u32,
    pub risk_critical_network_points: u32,

    // Odd hours window, 24h clock; may wrap past midnight
    pub odd_hours_start: u32,
    pub odd_hours_end: u32,

    // Absence threshold
    pub absent_days_threshold: u32,

    pub alert_dedup_window_seconds: u64,

    pub allowed_import_extensions: Vec<String>,
    pub max_import_file_size: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            enable_router_adapters: false,
            enable_enforcement_actions: false,
            data_minimization_mode: false,
            observation_retention_days: DEFAULT_RETENTION_DAYS,
            hmac_secret: String::new(),
            max_syncs_per_hour: DEFAULT_MAX_SYNCS_PER_HOUR,
            max_imports_per_hour: DEFAULT_MAX_IMPORTS_PER_HOUR,
            risk_unknown_device_points: 30,
            risk_unapproved_points: 25,
            risk_odd_hours_points: 15,
            risk_new_vendor_points: 10,
            risk_critical_network_points: 20,
            odd_hours_start: DEFAULT_ODD_HOURS_START,
            odd_hours_end: DEFAULT_ODD_HOURS_END,
            absent_days_threshold: DEFAULT_ABSENT_DAYS,
            alert_dedup_window_seconds: DEFAULT_DEDUP_WINDOW_SECONDS,
            allowed_import_extensions: vec![".csv".to_string(), ".json".to_string()],
            max_import_file_size: DEFAULT_MAX_IMPORT_FILE_SIZE,
        }
    }
}

impl InventoryConfig {
    /// Load configuration from `INVENTORY_*` environment variables, falling
    /// back to the defaults above. The HMAC secret also honours the shared
    /// `SECRET_KEY` variable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_router_adapters: env_parse_bool("INVENTORY_ENABLE_ROUTER_ADAPTERS", false),
            enable_enforcement_actions: env_parse_bool("INVENTORY_ENABLE_ENFORCEMENT", false),
            data_minimization_mode: env_parse_bool("INVENTORY_DATA_MINIMIZATION", false),
            observation_retention_days: env_parse_u32(
                "INVENTORY_RETENTION_DAYS",
                DEFAULT_RETENTION_DAYS,
                1,
                3650,
            ),
            hmac_secret: env_var("INVENTORY_HMAC_SECRET")
                .or_else(|| env_var("SECRET_KEY"))
                .unwrap_or_default(),
            max_syncs_per_hour: env_parse_u32(
                "INVENTORY_MAX_SYNCS_HOUR",
                DEFAULT_MAX_SYNCS_PER_HOUR,
                1,
                1000,
            ),
            max_imports_per_hour: env_parse_u32(
                "INVENTORY_MAX_IMPORTS_HOUR",
                DEFAULT_MAX_IMPORTS_PER_HOUR,
                1,
                1000,
            ),
            odd_hours_start: env_parse_u32(
                "INVENTORY_ODD_HOURS_START",
                DEFAULT_ODD_HOURS_START,
                0,
                23,
            ),
            odd_hours_end: env_parse_u32("INVENTORY_ODD_HOURS_END", DEFAULT_ODD_HOURS_END, 0, 23),
            absent_days_threshold: env_parse_u32(
                "INVENTORY_ABSENT_DAYS",
                DEFAULT_ABSENT_DAYS,
                1,
                3650,
            ),
            ..defaults
        }
    }

    /// Reject configurations that would mint unstable or guessable device
    /// fingerprints. Called before any command that fingerprints.
    pub fn validate(&self) -> Result<()> {
        let secret = self.hmac_secret.trim();
        if secret.is_empty() {
            bail!(
                "No HMAC secret configured. Set INVENTORY_HMAC_SECRET (or SECRET_KEY) \
                 before importing devices."
            );
        }
        if PLACEHOLDER_SECRETS.contains(&secret.to_ascii_lowercase().as_str()) {
            bail!(
                "INVENTORY_HMAC_SECRET is still the placeholder value '{}'. \
                 Set a real secret before importing devices.",
                secret
            );
        }
        Ok(())
    }

    /// Config with a fixed secret, for library callers and tests.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            hmac_secret: secret.to_string(),
            ..Self::default()
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_bool(name: &str, default: bool) -> bool {
    match env_var(name) {
        Some(value) => {
            let normalized = value.to_ascii_lowercase();
            match normalized.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            }
        }
        None => default,
    }
}

fn env_parse_u32(name: &str, default: u32, min: u32, max: u32) -> u32 {
    match env_var(name).and_then(|v| v.parse::<u32>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}
