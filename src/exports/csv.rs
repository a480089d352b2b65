//! CSV export functionality
//!
//! Export the device inventory to CSV format. Only pseudonymous and masked
//! fields appear here; raw identifiers are never stored to begin with.

use anyhow::Result;
use csv::Writer;

use crate::database::DeviceRecord;

/// Export devices to CSV format
pub fn export_devices_csv(devices: &[DeviceRecord]) -> Result<String> {
    let mut writer = Writer::from_writer(vec![]);

    writer.write_record([
        "id",
        "label",
        "category",
        "owner",
        "status",
        "approved",
        "risk_score",
        "risk_level",
        "criticality",
        "first_seen",
        "last_seen",
        "tags",
    ])?;

    for device in devices {
        writer.write_record([
            device.id.to_string().as_str(),
            &device.label,
            &device.category,
            device.owner.as_deref().unwrap_or(""),
            device.status.as_str(),
            &device.approved.to_string(),
            &device.risk_score.to_string(),
            device.risk_level.as_str(),
            device.criticality.as_str(),
            &device.first_seen_at.to_rfc3339(),
            &device.last_seen_at.to_rfc3339(),
            &device.tags.join(","),
        ])?;
    }

    let csv_data = String::from_utf8(writer.into_inner()?)?;
    Ok(csv_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Criticality, DeviceStatus, RiskLevel};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_export_devices_csv() {
        let seen = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let devices = vec![DeviceRecord {
            id: 7,
            workspace_id: 1,
            network_id: 1,
            device_key: "0011aabbccdd".to_string(),
            label: "office-printer".to_string(),
            tags: vec!["printer".to_string(), "floor-2".to_string()],
            category: "printer".to_string(),
            owner: Some("facilities".to_string()),
            notes: None,
            criticality: Criticality::Low,
            approved: true,
            risk_score: 0,
            risk_level: RiskLevel::Low,
            status: DeviceStatus::Active,
            first_seen_at: seen,
            last_seen_at: seen,
        }];

        let csv = export_devices_csv(&devices).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,label,category,owner,status,approved,risk_score,risk_level,criticality,first_seen,last_seen,tags"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("7,office-printer,printer,facilities,active,true,0,low,low,"));
        assert!(row.contains("2025-03-14T12:00:00+00:00"));
        assert!(row.ends_with("\"printer,floor-2\""));

        // The hashed device key is deliberately absent from the report.
        assert!(!csv.contains("0011aabbccdd"));
    }
}
