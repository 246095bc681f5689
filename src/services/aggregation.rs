use std::collections::HashMap;

use chrono::Timelike;

use crate::domain::bucket::{AggregatedBucket, GroupBy, RecordFilters};
use crate::domain::factors::weekday_index;
use crate::domain::record::SimulationRecord;

/// Field whose distinct values populate a filter selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Category,
    Weekday,
    Weather,
}

pub fn aggregate(
    records: &[SimulationRecord],
    group_by: GroupBy,
    filters: &RecordFilters,
) -> Vec<AggregatedBucket> {
    let mut buckets: Vec<AggregatedBucket> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records.iter().filter(|record| filters.matches(record)) {
        let key = group_key(record, group_by);
        match positions.get(&key) {
            Some(&index) => buckets[index].total += u64::from(record.person_count),
            None => {
                positions.insert(key.clone(), buckets.len());
                buckets.push(AggregatedBucket {
                    label: key,
                    total: u64::from(record.person_count),
                });
            }
        }
    }

    match group_by {
        GroupBy::Hour => buckets.sort_by_key(|bucket| hour_of_label(&bucket.label)),
        // Labels outside the canonical week sort first, in first-seen order.
        GroupBy::Weekday => buckets.sort_by_key(|bucket| {
            weekday_index(&bucket.label).map_or(-1, |index| index as i64)
        }),
        GroupBy::Zone | GroupBy::Category | GroupBy::Weather => {}
    }

    buckets
}

/// Like [`aggregate`], but keyed by the grouping name; unknown names yield no buckets.
pub fn aggregate_by_name(
    records: &[SimulationRecord],
    group_by: &str,
    filters: &RecordFilters,
) -> Vec<AggregatedBucket> {
    match group_by.parse::<GroupBy>() {
        Ok(group_by) => aggregate(records, group_by, filters),
        Err(_) => Vec::new(),
    }
}

pub fn distinct_values(records: &[SimulationRecord], field: FilterField) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for record in records {
        let value = match field {
            FilterField::Category => record.category.as_str(),
            FilterField::Weekday => record.weekday.as_str(),
            FilterField::Weather => record.weather.as_str(),
        };
        if !values.iter().any(|seen| seen == value) {
            values.push(value.to_string());
        }
    }
    values
}

fn group_key(record: &SimulationRecord, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Zone => record.zone.clone(),
        GroupBy::Category => record.category.as_str().to_string(),
        GroupBy::Hour => format!("{}:00", record.timestamp.hour()),
        GroupBy::Weather => record.weather.clone(),
        GroupBy::Weekday => record.weekday.clone(),
    }
}

fn hour_of_label(label: &str) -> u32 {
    label
        .split(':')
        .next()
        .and_then(|hour| hour.parse().ok())
        .unwrap_or(0)
}
