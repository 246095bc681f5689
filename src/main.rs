mod commands;
mod domain;
mod services;
#[cfg(test)]
mod test_support;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use crate::commands::aggregate_cmd::{aggregate_command, plot_command};
use crate::commands::base_commands::{CliArgs, Commands};
use crate::commands::context::CommandContext;
use crate::commands::files_cmd::{
    delete_data_command, delete_file_command, get_file_command, latest_command, list_files_command,
    upload_command,
};
use crate::commands::generate_cmd::generate_command;
use crate::commands::sensors_cmd::sensors_command;
use crate::commands::serve_cmd::serve_command;
use crate::services::config::DashboardConfig;
use crate::services::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match DashboardConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    match args.command {
        Commands::Completions { shell } => {
            let mut command = CliArgs::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            ExitCode::SUCCESS
        }
        Commands::Sensors { .. } => sensors_command(args.command),
        command => {
            let context = CommandContext::from_config(config);
            run_command(command, &context).await
        }
    }
}

async fn run_command(command: Commands, context: &CommandContext) -> ExitCode {
    match command {
        Commands::Generate { .. } => generate_command(command, context).await,
        Commands::Upload { .. } => upload_command(command, context).await,
        Commands::ListFiles => list_files_command(context).await,
        Commands::GetFile { .. } => get_file_command(command, context).await,
        Commands::DeleteFile { .. } => delete_file_command(command, context).await,
        Commands::DeleteData { .. } => delete_data_command(command, context).await,
        Commands::Latest => latest_command(context).await,
        Commands::Aggregate { .. } => aggregate_command(command, context).await,
        Commands::Plot { .. } => plot_command(command, context).await,
        Commands::Serve { .. } => serve_command(command, context).await,
        Commands::Sensors { .. } => sensors_command(command),
        Commands::Completions { .. } => ExitCode::SUCCESS,
    }
}
