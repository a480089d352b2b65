//! End-to-end reconciliation over a real (in-memory) SQLite database:
//! device creation, observation timelines, alert dedup, maintenance-window
//! suppression, and batch atomicity.

use chrono::{DateTime, Duration, TimeZone, Utc};

use netroster::database::{
    queries, AlertFilter, AlertStatus, AlertType, Database, DeviceFilter, MaintenanceWindowInsert,
    RiskLevel,
};
use netroster::{
    device_fingerprint, mask_mac, reconcile, update_device_risk, DeviceUpdate, InventoryConfig,
    NormalisedClient,
};

const WORKSPACE: i64 = 1;
const NETWORK: i64 = 10;

fn test_config() -> InventoryConfig {
    InventoryConfig::with_secret("integration-test-secret")
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0)
        .single()
        .expect("fixed timestamp is valid")
}

fn client(mac: &str, ip: &str, hostname: &str) -> NormalisedClient {
    NormalisedClient {
        mac: mac.to_string(),
        ip: ip.to_string(),
        hostname: hostname.to_string(),
        vendor: "Acme".to_string(),
        connection_type: "wifi".to_string(),
        ..Default::default()
    }
}

fn sample_batch() -> Vec<NormalisedClient> {
    vec![
        client("AA:BB:CC:DD:EE:01", "192.168.1.10", "laptop-01"),
        client("AA:BB:CC:DD:EE:02", "192.168.1.11", "printer-02"),
    ]
}

#[test]
fn fresh_import_creates_devices_observations_and_alerts() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();

    let stats = reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &sample_batch(),
        "manual",
        now,
    )
    .expect("reconcile should succeed");

    assert_eq!(stats.devices_created, 2);
    assert_eq!(stats.devices_updated, 0);
    assert_eq!(stats.observations_created, 2);
    // One new_device and one unapproved_device alert per device.
    assert_eq!(stats.alerts_created, 4);

    let devices = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices");
    assert_eq!(devices.len(), 2);
    for device in &devices {
        assert!(!device.approved, "new devices start unapproved");
        assert_eq!(device.category, "unknown");
        assert_eq!(device.first_seen_at, now);
        assert_eq!(device.last_seen_at, now);
    }
}

#[test]
fn reimport_touches_devices_without_duplicate_alerts() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let batch = sample_batch();

    reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", fixed_now())
        .expect("first import");

    let later = fixed_now() + Duration::hours(1);
    let stats = reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", later)
        .expect("second import");

    assert_eq!(stats.devices_created, 0);
    assert_eq!(stats.devices_updated, 2);
    // The timeline always grows, one observation per input record.
    assert_eq!(stats.observations_created, 2);
    // Both alert types are still open, so nothing new is raised.
    assert_eq!(stats.alerts_created, 0);

    let devices = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices");
    for device in &devices {
        assert_eq!(device.last_seen_at, later, "last_seen advances on re-import");
        let observations =
            queries::get_device_observations(&conn, device.id, 10).expect("observations");
        assert_eq!(observations.len(), 2);
    }

    let alerts = queries::list_alerts(&conn, WORKSPACE, Some(NETWORK), &AlertFilter::default())
        .expect("list alerts");
    assert_eq!(alerts.len(), 4);
}

#[test]
fn maintenance_window_suppresses_matching_alert_types() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();

    queries::create_maintenance_window(
        &conn,
        &MaintenanceWindowInsert {
            workspace_id: WORKSPACE,
            network_id: Some(NETWORK),
            start_at: now - Duration::hours(1),
            end_at: now + Duration::hours(1),
            suppress_alert_types: &[AlertType::NewDevice, AlertType::UnapprovedDevice],
            reason: "AP firmware rollout",
            created_by: "tester",
        },
        now,
    )
    .expect("create window");

    let stats = reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &[client("AA:BB:CC:DD:EE:03", "192.168.1.12", "cam-03")],
        "manual",
        now,
    )
    .expect("reconcile under window");

    // The device and its observation still land; only the noise is held back.
    assert_eq!(stats.devices_created, 1);
    assert_eq!(stats.observations_created, 1);
    assert_eq!(stats.alerts_created, 0);

    let alerts = queries::list_alerts(&conn, WORKSPACE, Some(NETWORK), &AlertFilter::default())
        .expect("list alerts");
    assert!(alerts.is_empty());
}

#[test]
fn window_scoped_to_other_network_does_not_suppress() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();

    queries::create_maintenance_window(
        &conn,
        &MaintenanceWindowInsert {
            workspace_id: WORKSPACE,
            network_id: Some(99),
            start_at: now - Duration::hours(1),
            end_at: now + Duration::hours(1),
            suppress_alert_types: &[AlertType::NewDevice, AlertType::UnapprovedDevice],
            reason: "unrelated maintenance",
            created_by: "tester",
        },
        now,
    )
    .expect("create window");

    let stats = reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &[client("AA:BB:CC:DD:EE:04", "192.168.1.13", "nas-04")],
        "manual",
        now,
    )
    .expect("reconcile on other network");

    assert_eq!(stats.alerts_created, 2);
}

#[test]
fn approving_a_device_resolves_open_unapproved_alerts() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();

    reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &[client("AA:BB:CC:DD:EE:05", "192.168.1.14", "switch-05")],
        "manual",
        now,
    )
    .expect("import");

    let mut device = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices")
        .pop()
        .expect("one device exists");

    queries::set_device_approved(&conn, device.id, true).expect("approve");
    device.approved = true;
    queries::update_device_fields(
        &conn,
        device.id,
        &DeviceUpdate {
            category: Some("switch".to_string()),
            ..Default::default()
        },
    )
    .expect("set category");
    device.category = "switch".to_string();

    let resolved = queries::resolve_open_alerts_for_device(
        &conn,
        device.id,
        AlertType::UnapprovedDevice,
        now,
    )
    .expect("resolve alerts");
    assert_eq!(resolved, 1);

    update_device_risk(&conn, &mut device, &config).expect("risk update");
    assert_eq!(device.risk_score, 0);
    assert_eq!(device.risk_level, RiskLevel::Low);

    let open = queries::list_alerts(
        &conn,
        WORKSPACE,
        Some(NETWORK),
        &AlertFilter {
            status: Some(AlertStatus::Open),
            ..Default::default()
        },
    )
    .expect("list open alerts");
    assert!(
        open.iter()
            .all(|a| a.alert_type != AlertType::UnapprovedDevice),
        "no unapproved_device alert remains open"
    );
}

#[test]
fn savepoint_rolls_back_the_whole_batch_on_failure() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();

    let result: anyhow::Result<()> = queries::with_savepoint(&conn, "import_batch", || {
        reconcile(
            &conn,
            &config,
            WORKSPACE,
            NETWORK,
            &sample_batch(),
            "manual",
            now,
        )?;
        anyhow::bail!("simulated downstream failure");
    });
    assert!(result.is_err());

    let devices = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices");
    assert!(devices.is_empty(), "rollback removes created devices");

    let alerts = queries::list_alerts(&conn, WORKSPACE, Some(NETWORK), &AlertFilter::default())
        .expect("list alerts");
    assert!(alerts.is_empty(), "rollback removes created alerts");
}

#[test]
fn resolved_alert_reopens_dedup_scope() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = fixed_now();
    let batch = [client("AA:BB:CC:DD:EE:06", "192.168.1.15", "iot-06")];

    reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", now).expect("import");

    let alerts = queries::list_alerts(&conn, WORKSPACE, Some(NETWORK), &AlertFilter::default())
        .expect("list alerts");
    assert_eq!(alerts.len(), 2);
    for alert in &alerts {
        queries::resolve_alert(&conn, alert.id, now).expect("resolve");
    }

    let later = now + Duration::hours(2);
    let stats = reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", later)
        .expect("re-import");

    // Only unapproved_device comes back: the device is no longer new, and a
    // resolved alert no longer blocks a fresh instance.
    assert_eq!(stats.alerts_created, 1);

    let open = queries::list_alerts(
        &conn,
        WORKSPACE,
        Some(NETWORK),
        &AlertFilter {
            status: Some(AlertStatus::Open),
            ..Default::default()
        },
    )
    .expect("list open alerts");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].alert_type, AlertType::UnapprovedDevice);
}

#[test]
fn label_falls_back_to_masked_mac_when_hostname_missing() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();

    reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &[client("AA:BB:CC:DD:EE:07", "192.168.1.16", "")],
        "manual",
        fixed_now(),
    )
    .expect("import");

    let device = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices")
        .pop()
        .expect("one device exists");
    assert_eq!(device.label, "AA:BB:CC:**:**:**");
}

#[test]
fn only_hashed_and_masked_identifiers_are_persisted() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let raw_mac = "AA:BB:CC:DD:EE:08";

    reconcile(
        &conn,
        &config,
        WORKSPACE,
        NETWORK,
        &[client(raw_mac, "192.168.1.17", "tablet-08")],
        "manual",
        fixed_now(),
    )
    .expect("import");

    let device = queries::list_devices(&conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices")
        .pop()
        .expect("one device exists");
    assert_eq!(
        device.device_key,
        device_fingerprint(raw_mac, &config.hmac_secret)
    );
    assert_ne!(device.device_key, raw_mac);

    let observation = queries::latest_observation(&conn, device.id)
        .expect("latest observation")
        .expect("observation exists");
    assert_eq!(observation.mac_masked, mask_mac(raw_mac));
    assert_eq!(observation.ip_masked, "192.168.1.***");
    assert!(!observation.mac_masked.contains("DD:EE:08"));
}
