use crate::domain::bucket::{AggregatedBucket, GroupBy};
use crate::domain::record::SimulationRecord;
use crate::domain::sensor::{Sensor, SensorStats};
use crate::services::blob_store::BlobInfo;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_bucket_table(group_by: GroupBy, buckets: &[AggregatedBucket]) -> String {
    if buckets.is_empty() {
        return "No matching records".to_string();
    }
    let label_width = buckets
        .iter()
        .map(|bucket| bucket.label.len())
        .chain(std::iter::once(group_by.heading().len()))
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    lines.push(format!("{:<label_width$} | Visitors", group_by.heading()));
    lines.push(format!("{}-|---------", "-".repeat(label_width)));
    for bucket in buckets {
        lines.push(format!("{:<label_width$} | {}", bucket.label, bucket.total));
    }
    let total: u64 = buckets.iter().map(|bucket| bucket.total).sum();
    lines.push(format!("{:<label_width$} | {total}", "Total"));
    lines.join("\n")
}

pub fn format_file_table(files: &[BlobInfo]) -> String {
    if files.is_empty() {
        return "No stored files".to_string();
    }
    let mut lines = Vec::new();
    lines.push("Name | Created | Size".to_string());
    lines.push("-----|---------|-----".to_string());
    for file in files {
        let created = file
            .created_on
            .map(|created| created.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let size = file
            .size
            .map(|size| format!("{size} B"))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!("{} | {created} | {size}", file.name));
    }
    lines.join("\n")
}

/// One-paragraph overview of a loaded dataset.
pub fn format_dataset_summary(source: &str, records: &[SimulationRecord]) -> String {
    let mut lines = vec![format!("Loaded {} records from {source}", records.len())];
    let first = records.iter().map(|record| record.timestamp).min();
    let last = records.iter().map(|record| record.timestamp).max();
    if let (Some(first), Some(last)) = (first, last) {
        lines.push(format!(
            "Time range: {} to {}",
            first.format(TIMESTAMP_FORMAT),
            last.format(TIMESTAMP_FORMAT)
        ));
    }
    let visitors: u64 = records.iter().map(|record| u64::from(record.person_count)).sum();
    lines.push(format!("Total visitors: {visitors}"));
    lines.join("\n")
}

pub fn format_sensor_table(sensors: &[&Sensor], stats: &SensorStats) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Sensors: {} total, {} online, {} warning, {} offline",
        stats.total, stats.online, stats.warning, stats.offline
    ));
    lines.push(String::new());
    lines.push("Id | Name | Status | Battery | Signal | Temp | Humidity | People | Location | Last reading".to_string());
    lines.push("---|------|--------|---------|--------|------|----------|--------|----------|-------------".to_string());
    for sensor in sensors {
        lines.push(format!(
            "{} | {} | {} | {}% | {}% | {:.1}C | {}% | {} | {} | {}",
            sensor.id,
            sensor.name,
            sensor.status,
            sensor.battery,
            sensor.signal,
            sensor.temperature,
            sensor.humidity,
            sensor.people_count,
            sensor.location,
            sensor.last_reading.format(TIMESTAMP_FORMAT)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sensor::default_sensors;
    use crate::test_support::{at, sample_records};

    #[test]
    fn bucket_table_lists_buckets_and_total() {
        let buckets = vec![
            AggregatedBucket {
                label: "Cinema".to_string(),
                total: 15,
            },
            AggregatedBucket {
                label: "Stores".to_string(),
                total: 7,
            },
        ];

        let table = format_bucket_table(GroupBy::Category, &buckets);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Category | Visitors");
        assert_eq!(lines[2], "Cinema   | 15");
        assert_eq!(lines[4], "Total    | 22");
    }

    #[test]
    fn empty_tables_have_a_message() {
        assert_eq!(format_bucket_table(GroupBy::Zone, &[]), "No matching records");
        assert_eq!(format_file_table(&[]), "No stored files");
    }

    #[test]
    fn file_table_formats_creation_time() {
        let files = vec![BlobInfo {
            name: "simulation_2024-02-23_1.json".to_string(),
            url: "file:///tmp/simulation_2024-02-23_1.json".to_string(),
            created_on: Some(at("2024-02-23T10:15:00Z")),
            size: Some(512),
            content_type: None,
        }];

        let table = format_file_table(&files);
        assert!(table.contains("simulation_2024-02-23_1.json | 2024-02-23 10:15:00 | 512 B"));
    }

    #[test]
    fn dataset_summary_shows_range_and_visitors() {
        let summary = format_dataset_summary("cache", &sample_records());
        assert!(summary.starts_with("Loaded 3 records from cache"));
        assert!(summary.contains("Total visitors: 67"));
    }

    #[test]
    fn sensor_table_includes_stats() {
        let sensors = default_sensors(at("2024-02-23T12:00:00Z"));
        let refs: Vec<&Sensor> = sensors.iter().collect();
        let stats = SensorStats {
            total: 4,
            online: 2,
            warning: 1,
            offline: 1,
        };

        let table = format_sensor_table(&refs, &stats);
        assert!(table.starts_with("Sensors: 4 total, 2 online, 1 warning, 1 offline"));
        assert!(table.contains("sensor-004 | South Exit | offline | 12% | 0%"));
    }
}
