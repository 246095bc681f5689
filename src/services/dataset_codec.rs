use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::record::{Category, SimulationRecord};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

const CSV_COLUMNS: [&str; 7] = [
    "timestamp",
    "category",
    "zone",
    "personCount",
    "weather",
    "weekday",
    "discountPercent",
];

#[derive(Error, Debug)]
pub enum DatasetCodecError {
    #[error("unsupported file type: {0} (only .json and .csv are accepted)")]
    UnsupportedFormat(String),
    #[error("file is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to parse json dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv header is missing column {0}")]
    MissingColumn(String),
    #[error("invalid csv row {line}: {message}")]
    InvalidRow { line: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    Csv,
}

impl DatasetFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, DatasetCodecError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".json") {
            Ok(DatasetFormat::Json)
        } else if lower.ends_with(".csv") {
            Ok(DatasetFormat::Csv)
        } else {
            Err(DatasetCodecError::UnsupportedFormat(file_name.to_string()))
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DatasetFormat::Json => JSON_CONTENT_TYPE,
            DatasetFormat::Csv => CSV_CONTENT_TYPE,
        }
    }
}

pub fn decode_dataset(file_name: &str, bytes: &[u8]) -> Result<Vec<SimulationRecord>, DatasetCodecError> {
    let format = DatasetFormat::from_file_name(file_name)?;
    let contents = String::from_utf8(bytes.to_vec())?;
    match format {
        DatasetFormat::Json => Ok(serde_json::from_str(&contents)?),
        DatasetFormat::Csv => decode_csv(&contents),
    }
}

pub fn encode_dataset(file_name: &str, records: &[SimulationRecord]) -> Result<Vec<u8>, DatasetCodecError> {
    match DatasetFormat::from_file_name(file_name)? {
        DatasetFormat::Json => encode_json(records),
        DatasetFormat::Csv => Ok(encode_csv(records).into_bytes()),
    }
}

/// Pretty JSON with four-space indentation.
pub fn encode_json(records: &[SimulationRecord]) -> Result<Vec<u8>, DatasetCodecError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    records.serialize(&mut serializer)?;
    Ok(buffer)
}

pub fn encode_csv(records: &[SimulationRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_COLUMNS.join(","));
    for record in records {
        let fields = [
            record.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            record.category.as_str().to_string(),
            quote_field(&record.zone),
            record.person_count.to_string(),
            quote_field(&record.weather),
            quote_field(&record.weekday),
            record.discount_percent.to_string(),
        ];
        lines.push(fields.join(","));
    }
    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}

fn quote_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn decode_csv(contents: &str) -> Result<Vec<SimulationRecord>, DatasetCodecError> {
    let mut lines = contents.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
    let Some((_, header_line)) = lines.next() else {
        return Ok(Vec::new());
    };
    let header = split_csv_line(header_line);
    let column = |name: &str| -> Result<usize, DatasetCodecError> {
        header
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| DatasetCodecError::MissingColumn(name.to_string()))
    };
    let indices = CSV_COLUMNS
        .iter()
        .map(|name| column(*name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::new();
    for (index, line) in lines {
        let line_number = index + 1;
        let fields = split_csv_line(line);
        let field = |position: usize| {
            fields
                .get(indices[position])
                .map(String::as_str)
                .ok_or_else(|| DatasetCodecError::InvalidRow {
                    line: line_number,
                    message: format!("missing value for {}", CSV_COLUMNS[position]),
                })
        };
        let invalid = |message: String| DatasetCodecError::InvalidRow {
            line: line_number,
            message,
        };

        let timestamp = DateTime::parse_from_rfc3339(field(0)?)
            .map_err(|e| invalid(format!("timestamp: {e}")))?
            .with_timezone(&Utc);
        let category: Category = field(1)?
            .parse()
            .map_err(|value| invalid(format!("unknown category {value}")))?;
        let person_count = field(3)?
            .parse::<u32>()
            .map_err(|e| invalid(format!("personCount: {e}")))?;
        let discount_percent = field(6)?
            .trim_end_matches('%')
            .parse::<u32>()
            .map_err(|e| invalid(format!("discountPercent: {e}")))?;

        records.push(SimulationRecord {
            timestamp,
            category,
            zone: field(2)?.to_string(),
            person_count,
            weather: field(4)?.to_string(),
            weekday: field(5)?.to_string(),
            discount_percent,
        });
    }
    Ok(records)
}

/// Splits one CSV line, honouring double-quoted fields and trimming whitespace.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
