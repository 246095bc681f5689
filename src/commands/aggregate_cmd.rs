use std::process::ExitCode;

use crate::commands::base_commands::{Commands, FilterArgs, OutputFormat};
use crate::commands::context::CommandContext;
use crate::commands::report_format::format_bucket_table;
use crate::domain::bucket::RecordFilters;
use crate::domain::record::SimulationRecord;
use crate::services::aggregation::{FilterField, aggregate, distinct_values};
use crate::services::bucket_chart::write_bucket_chart_png;

impl From<FilterArgs> for RecordFilters {
    fn from(args: FilterArgs) -> Self {
        RecordFilters {
            category: args.category,
            weekday: args.weekday,
            weather: args.weather,
        }
    }
}

pub async fn aggregate_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::Aggregate {
        input,
        group_by,
        filters,
        format,
    } = cmd
    else {
        return ExitCode::FAILURE;
    };
    let records = match context.load_records(input.as_deref()).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Failed to load dataset: {e}");
            return ExitCode::FAILURE;
        }
    };

    let buckets = aggregate(&records, group_by, &filters.into());
    if buckets.is_empty() && !records.is_empty() {
        eprintln!("{}", available_filters_hint(&records));
    }
    match format {
        OutputFormat::Table => println!("{}", format_bucket_table(group_by, &buckets)),
        OutputFormat::Json => match serde_json::to_string_pretty(&buckets) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize buckets: {e}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn available_filters_hint(records: &[SimulationRecord]) -> String {
    format!(
        "No records match the filters. Categories: {}. Weekdays: {}. Weather: {}.",
        distinct_values(records, FilterField::Category).join(", "),
        distinct_values(records, FilterField::Weekday).join(", "),
        distinct_values(records, FilterField::Weather).join(", ")
    )
}

pub async fn plot_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::Plot {
        input,
        group_by,
        filters,
        output,
    } = cmd
    else {
        return ExitCode::FAILURE;
    };
    let records = match context.load_records(input.as_deref()).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Failed to load dataset: {e}");
            return ExitCode::FAILURE;
        }
    };

    let buckets = aggregate(&records, group_by, &filters.into());
    let title = format!("Visitors by {}", group_by.heading().to_lowercase());
    match write_bucket_chart_png(&output, &title, &buckets).await {
        Ok(()) => {
            println!("Chart written to {output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to plot chart: {e}");
            ExitCode::FAILURE
        }
    }
}
