pub mod aggregate_cmd;
pub mod base_commands;
pub mod context;
pub mod files_cmd;
pub mod generate_cmd;
pub mod report_format;
pub mod sensors_cmd;
pub mod serve_cmd;
