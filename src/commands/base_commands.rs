use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::domain::bucket::GroupBy;
use crate::domain::sensor::SensorStatus;

#[derive(Parser)]
#[command(name = "mall-traffic", author, version, about)]
pub struct CliArgs {
    /// Path to a dashboard config YAML
    #[arg(long, global = true)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic visitor dataset and store it
    Generate {
        /// First sample time of day (HH:MM)
        #[arg(short, long, default_value = "09:00")]
        start_time: String,
        /// Last sample time of day (HH:MM)
        #[arg(short, long, default_value = "21:00")]
        end_time: String,
        /// Minutes between samples
        #[arg(short, long, default_value_t = 60)]
        interval: u32,
        /// Simulated day (YYYY-MM-DD)
        #[arg(short, long, default_value_t = default_simulation_date())]
        date: String,
        /// YAML file with custom weather, weekday and discount tables
        #[arg(long)]
        factors: Option<String>,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
        /// Also write the dataset to this .json or .csv file
        #[arg(short, long)]
        output: Option<String>,
        /// Skip saving the dataset to blob storage
        #[arg(long)]
        no_upload: bool,
    },
    /// Upload a .json or .csv dataset to blob storage
    Upload {
        /// Dataset file
        #[arg(short, long)]
        input: String,
    },
    /// List stored datasets, newest first
    ListFiles,
    /// Download a stored dataset
    GetFile {
        /// Blob name
        #[arg(short, long)]
        name: String,
        /// Write the dataset to this .json or .csv file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Delete a stored dataset
    DeleteFile {
        /// Blob name
        #[arg(short, long)]
        name: String,
    },
    /// Delete every stored dataset and the local cache
    DeleteData {
        /// Confirm deleting all files
        #[arg(long)]
        all: bool,
    },
    /// Load the newest stored dataset
    Latest,
    /// Total visitors per group
    Aggregate {
        /// Dataset file; defaults to the last loaded dataset
        #[arg(short, long)]
        input: Option<String>,
        /// Grouping key
        #[arg(short, long, value_enum)]
        group_by: GroupBy,
        #[command(flatten)]
        filters: FilterArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Plot visitors per group as a PNG bar chart
    Plot {
        /// Dataset file; defaults to the last loaded dataset
        #[arg(short, long)]
        input: Option<String>,
        /// Grouping key
        #[arg(short, long, value_enum)]
        group_by: GroupBy,
        #[command(flatten)]
        filters: FilterArgs,
        /// Output PNG file
        #[arg(short, long)]
        output: String,
    },
    /// Show the simulated IoT sensor panel
    Sensors {
        /// Number of refresh rounds to apply
        #[arg(short, long, default_value_t = 0)]
        rounds: usize,
        /// Seed for reproducible readings
        #[arg(long)]
        seed: Option<u64>,
        /// Only show sensors with this status
        #[arg(long)]
        status: Option<SensorStatus>,
    },
    /// Serve the dashboard JSON API
    Serve {
        /// Address to listen on; defaults to the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Only count this category
    #[arg(long)]
    pub category: Option<String>,
    /// Only count this weekday
    #[arg(long)]
    pub weekday: Option<String>,
    /// Only count this weather
    #[arg(long)]
    pub weather: Option<String>,
}

fn default_simulation_date() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}
