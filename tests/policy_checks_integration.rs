//! Policy engine over a real (in-memory) SQLite database: risk scoring
//! persistence, odd-hours detection with per-day dedup, and the long-absence
//! lifecycle.

use chrono::{DateTime, Duration, TimeZone, Utc};

use netroster::database::{
    queries, AlertFilter, AlertSeverity, AlertType, Database, DeviceFilter, DeviceStatus,
    RiskLevel,
};
use netroster::{reconcile, run_all_checks, Criticality, DeviceUpdate, InventoryConfig, NormalisedClient};

const WORKSPACE: i64 = 1;
const NETWORK: i64 = 10;

fn test_config() -> InventoryConfig {
    InventoryConfig::with_secret("policy-test-secret")
}

fn noon() -> DateTime<Utc> {
    // Well outside the default 22:00-06:00 odd-hours window.
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0)
        .single()
        .expect("fixed timestamp is valid")
}

fn late_night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 23, 0, 0)
        .single()
        .expect("fixed timestamp is valid")
}

fn seed_device(conn: &rusqlite::Connection, config: &InventoryConfig, now: DateTime<Utc>) -> i64 {
    let batch = [NormalisedClient {
        mac: "AA:BB:CC:DD:EE:10".to_string(),
        ip: "192.168.1.20".to_string(),
        hostname: "sensor-10".to_string(),
        connection_type: "wifi".to_string(),
        ..Default::default()
    }];
    reconcile(conn, config, WORKSPACE, NETWORK, &batch, "manual", now).expect("seed import");
    queries::list_devices(conn, WORKSPACE, NETWORK, &DeviceFilter::default())
        .expect("list devices")
        .pop()
        .expect("seeded device exists")
        .id
}

fn alerts_of_type(conn: &rusqlite::Connection, alert_type: AlertType) -> Vec<netroster::AlertRecord> {
    queries::list_alerts(conn, WORKSPACE, Some(NETWORK), &AlertFilter::default())
        .expect("list alerts")
        .into_iter()
        .filter(|a| a.alert_type == alert_type)
        .collect()
}

#[test]
fn risk_score_persists_for_unknown_unapproved_device() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = noon();

    let device_id = seed_device(&conn, &config, now);
    let stats = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, now)
        .expect("policy checks");
    assert_eq!(stats.risk_updated, 1);

    let device = queries::get_device(&conn, device_id)
        .expect("get device")
        .expect("device exists");
    // unknown category (+30) plus unapproved (+25).
    assert_eq!(device.risk_score, 55);
    assert_eq!(device.risk_level, RiskLevel::Med);
}

#[test]
fn high_criticality_pushes_risk_to_high() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = noon();

    let device_id = seed_device(&conn, &config, now);
    queries::update_device_fields(
        &conn,
        device_id,
        &DeviceUpdate {
            criticality: Some(Criticality::High),
            ..Default::default()
        },
    )
    .expect("set criticality");

    run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, now).expect("policy checks");

    let device = queries::get_device(&conn, device_id)
        .expect("get device")
        .expect("device exists");
    // unknown (+30) + unapproved (+25) + high criticality (+20).
    assert_eq!(device.risk_score, 75);
    assert_eq!(device.risk_level, RiskLevel::High);
}

#[test]
fn odd_hours_alert_dedups_per_day_and_reopens_next_day() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let night = late_night();

    seed_device(&conn, &config, night);

    let first = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, night)
        .expect("first check");
    assert_eq!(first.alerts_created, 1);

    let hour_later = night + Duration::hours(1);
    let second = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, hour_later)
        .expect("second check, same window");
    assert_eq!(second.alerts_created, 0, "same-day odd-hours alert dedups");
    assert_eq!(alerts_of_type(&conn, AlertType::OddHours).len(), 1);

    let next_night = night + Duration::days(1);
    let third = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, next_night)
        .expect("third check, next day");
    assert_eq!(third.alerts_created, 1, "next day is a fresh dedup scope");

    let odd_hours = alerts_of_type(&conn, AlertType::OddHours);
    assert_eq!(odd_hours.len(), 2);
    for alert in &odd_hours {
        assert_eq!(alert.severity, AlertSeverity::Low);
    }
}

#[test]
fn no_odd_hours_alert_outside_the_window() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = noon();

    seed_device(&conn, &config, now);
    let stats = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, now)
        .expect("policy checks");

    assert_eq!(stats.alerts_created, 0);
    assert!(alerts_of_type(&conn, AlertType::OddHours).is_empty());
}

#[test]
fn long_absence_marks_inactive_and_alerts_once() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let seeded_at = noon();

    let device_id = seed_device(&conn, &config, seeded_at);

    // Default threshold is 30 days; 31 days later the device is overdue.
    let much_later = seeded_at + Duration::days(31);
    let stats = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, much_later)
        .expect("policy checks");
    assert_eq!(stats.alerts_created, 1);

    let device = queries::get_device(&conn, device_id)
        .expect("get device")
        .expect("device exists");
    assert_eq!(device.status, DeviceStatus::Inactive);

    let absent = alerts_of_type(&conn, AlertType::LongAbsent);
    assert_eq!(absent.len(), 1);
    assert_eq!(absent[0].severity, AlertSeverity::Info);
    assert_eq!(absent[0].payload["days_absent"], 31);

    // Re-running while the alert is still open stays quiet.
    let rerun = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, much_later)
        .expect("rerun");
    assert_eq!(rerun.alerts_created, 0);
    assert_eq!(alerts_of_type(&conn, AlertType::LongAbsent).len(), 1);
}

#[test]
fn kpi_summary_reflects_roster_state() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let now = noon();

    let device_id = seed_device(&conn, &config, now);
    let batch = [NormalisedClient {
        mac: "AA:BB:CC:DD:EE:11".to_string(),
        ip: "192.168.1.21".to_string(),
        hostname: "phone-11".to_string(),
        connection_type: "wifi".to_string(),
        ..Default::default()
    }];
    reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", now)
        .expect("second import");
    queries::set_device_approved(&conn, device_id, true).expect("approve");

    let kpis = queries::kpi_summary(&conn, WORKSPACE).expect("kpi summary");
    assert_eq!(kpis.total_devices, 2);
    assert_eq!(kpis.approved_devices, 1);
    assert_eq!(kpis.unapproved_devices, 1);
    assert_eq!(kpis.active_devices, 2);
    assert_eq!(kpis.open_alerts, 4);
    assert_eq!(kpis.total_alerts, 4);
    assert_eq!(kpis.approval_rate, 50.0);
}

#[test]
fn retention_prune_drops_only_old_observations() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let seeded_at = noon();

    let device_id = seed_device(&conn, &config, seeded_at);
    let batch = [NormalisedClient {
        mac: "AA:BB:CC:DD:EE:10".to_string(),
        ip: "192.168.1.20".to_string(),
        hostname: "sensor-10".to_string(),
        connection_type: "wifi".to_string(),
        ..Default::default()
    }];

    // A second sighting well past the retention horizon of the first.
    let recent = seeded_at + Duration::days(120);
    reconcile(&conn, &config, WORKSPACE, NETWORK, &batch, "manual", recent)
        .expect("later import");

    let pruned = queries::prune_observations(&conn, config.observation_retention_days, recent)
        .expect("prune");
    assert_eq!(pruned, 1, "only the stale observation is removed");

    let remaining =
        queries::get_device_observations(&conn, device_id, 10).expect("observations");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].observed_at, recent);
}

#[test]
fn device_seen_again_before_threshold_stays_active() {
    let db = Database::in_memory().expect("in-memory database should open");
    let conn = db.connection();
    let conn = conn.lock().expect("connection lock");
    let config = test_config();
    let seeded_at = noon();

    let device_id = seed_device(&conn, &config, seeded_at);

    let soon = seeded_at + Duration::days(29);
    let stats = run_all_checks(&conn, &config, WORKSPACE, NETWORK, None, soon)
        .expect("policy checks");
    assert_eq!(stats.alerts_created, 0);

    let device = queries::get_device(&conn, device_id)
        .expect("get device")
        .expect("device exists");
    assert_eq!(device.status, DeviceStatus::Active);
    assert!(alerts_of_type(&conn, AlertType::LongAbsent).is_empty());
}
