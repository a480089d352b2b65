//! Manual import adapter
//!
//! Parses user-uploaded CSV/JSON device exports into normalised client
//! records. This boundary handles arbitrary uploads, so every failure is
//! reported inside the returned outcome rather than as an error.
//!
//! Supported formats:
//! - CSV with columns for mac, ip, hostname, vendor, connection type (any subset)
//! - JSON array of objects with the same keys
//! - UniFi-style JSON export (`data` key containing the client list)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Column aliases recognised when parsing CSV/JSON, matched case-insensitively.
const MAC_ALIASES: &[&str] = &[
    "mac",
    "mac_address",
    "macaddress",
    "hwaddr",
    "hardware_address",
    "mac-address",
];
const IP_ALIASES: &[&str] = &["ip", "ip_address", "ipaddress", "ipaddr", "ip-address", "last_ip"];
const HOSTNAME_ALIASES: &[&str] = &[
    "hostname",
    "host",
    "name",
    "device_name",
    "devicename",
    "host_name",
];
const VENDOR_ALIASES: &[&str] = &["vendor", "manufacturer", "oui_manufacturer", "oui", "brand"];
const CONN_ALIASES: &[&str] = &[
    "connection_type",
    "conn_type",
    "type",
    "interface",
    "network_type",
    "is_wired",
];

/// A single device record normalised from any import source.
///
/// The MAC is raw here; the diff engine hashes and masks it before anything
/// is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalisedClient {
    pub mac: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub vendor: String,
    /// wifi | ethernet | unknown
    #[serde(default = "default_connection_type")]
    pub connection_type: String,
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

fn default_connection_type() -> String {
    "unknown".to_string()
}

/// Outcome of a parse attempt. `success == false` carries the reason in
/// `error`; the caller surfaces it directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub clients: Vec<NormalisedClient>,
    pub error: String,
    pub raw_count: usize,
}

impl ParseOutcome {
    fn ok(clients: Vec<NormalisedClient>) -> Self {
        let raw_count = clients.len();
        Self {
            success: true,
            clients,
            error: String::new(),
            raw_count,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            clients: Vec::new(),
            error: error.into(),
            raw_count: 0,
        }
    }
}

/// Parse a CSV or JSON upload, selected by file extension.
pub fn parse_file(data: &[u8], filename: &str) -> ParseOutcome {
    let ext = match filename.rfind('.') {
        Some(idx) => filename[idx + 1..].to_ascii_lowercase(),
        None => String::new(),
    };

    match ext.as_str() {
        "csv" => parse_csv(data),
        "json" => parse_json(data),
        _ => ParseOutcome::fail(format!("Unsupported file type: .{}", ext)),
    }
}

fn parse_csv(data: &[u8]) -> ParseOutcome {
    let text = match decode_text(data) {
        Ok(text) => text,
        Err(error) => return ParseOutcome::fail(error),
    };
    if text.is_empty() {
        return ParseOutcome::fail("Empty CSV file");
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(_) => return ParseOutcome::fail("CSV has no header row"),
    };
    if headers.is_empty() {
        return ParseOutcome::fail("CSV has no header row");
    }

    let lower_fields: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect();

    let mac_col = match find_column(&lower_fields, MAC_ALIASES) {
        Some(col) => col,
        None => {
            let found: Vec<&str> = headers.iter().collect();
            return ParseOutcome::fail(format!(
                "CSV must contain a MAC address column. Found: {:?}",
                found
            ));
        }
    };

    let ip_col = find_column(&lower_fields, IP_ALIASES);
    let host_col = find_column(&lower_fields, HOSTNAME_ALIASES);
    let vendor_col = find_column(&lower_fields, VENDOR_ALIASES);
    let conn_col = find_column(&lower_fields, CONN_ALIASES);

    let mut clients = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => return ParseOutcome::fail(format!("Malformed CSV row: {}", e)),
        };

        // Rows without a MAC are skipped rather than failing the batch.
        let mac = record.get(mac_col).unwrap_or("").trim();
        if mac.is_empty() {
            continue;
        }

        clients.push(NormalisedClient {
            mac: mac.to_string(),
            ip: cell(&record, ip_col),
            hostname: cell(&record, host_col),
            vendor: cell(&record, vendor_col),
            connection_type: normalise_conn_type(&cell(&record, conn_col)),
            extra: HashMap::new(),
        });
    }

    ParseOutcome::ok(clients)
}

fn parse_json(data: &[u8]) -> ParseOutcome {
    let text = match decode_text(data) {
        Ok(text) => text,
        Err(error) => return ParseOutcome::fail(error),
    };
    if text.is_empty() {
        return ParseOutcome::fail("Empty JSON file");
    }

    let parsed: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => return ParseOutcome::fail(format!("Invalid JSON: {}", e)),
    };

    // Handle UniFi-style wrapper: {"data": [...]}
    let entries = match &parsed {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(entries)) => entries.as_slice(),
            _ => return ParseOutcome::fail("JSON must be an array of objects"),
        },
        _ => return ParseOutcome::fail("JSON must be an array of objects"),
    };

    let mut clients = Vec::new();
    for entry in entries {
        let Value::Object(map) = entry else {
            continue;
        };
        if let Some(client) = object_to_client(map) {
            clients.push(client);
        }
    }

    ParseOutcome::ok(clients)
}

/// Decode an upload as UTF-8, tolerating a leading BOM.
fn decode_text(data: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(data).map_err(|_| "File is not valid UTF-8".to_string())?;
    Ok(text.trim_start_matches('\u{feff}').trim().to_string())
}

fn find_column(lower_fields: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| lower_fields.get(*alias).copied())
}

fn cell(record: &csv::StringRecord, col: Option<usize>) -> String {
    col.and_then(|idx| record.get(idx))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn object_to_client(map: &serde_json::Map<String, Value>) -> Option<NormalisedClient> {
    let lower: HashMap<String, &Value> = map
        .iter()
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
        .collect();

    let mac = lookup_value(&lower, MAC_ALIASES);
    if mac.is_empty() {
        return None;
    }

    Some(NormalisedClient {
        mac,
        ip: lookup_value(&lower, IP_ALIASES),
        hostname: lookup_value(&lower, HOSTNAME_ALIASES),
        vendor: lookup_value(&lower, VENDOR_ALIASES),
        connection_type: normalise_conn_type(&lookup_value(&lower, CONN_ALIASES)),
        extra: HashMap::new(),
    })
}

fn lookup_value(lower: &HashMap<String, &Value>, aliases: &[&str]) -> String {
    for alias in aliases {
        if let Some(value) = lower.get(*alias) {
            return value_to_string(value);
        }
    }
    String::new()
}

/// Stringify JSON scalars the way vendor exports expect: bare strings are
/// trimmed, booleans/numbers keep their literal form (so `"is_wired": true`
/// normalises to ethernet), null counts as absent.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn normalise_conn_type(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "wifi" | "wireless" | "wlan" | "802.11" => "wifi".to_string(),
        "ethernet" | "wired" | "lan" | "eth" | "true" => "ethernet".to_string(),
        _ => "unknown".to_string(),
    }
}
