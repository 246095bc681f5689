use std::process::ExitCode;

use crate::commands::base_commands::Commands;
use crate::commands::context::CommandContext;
use crate::commands::report_format::format_dataset_summary;
use crate::services::config::load_factor_overrides;
use crate::services::dataset_codec::encode_dataset;
use crate::services::dataset_service::{DatasetService, GenerateSimulationRequest, IntervalValue};

pub async fn generate_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::Generate {
        start_time,
        end_time,
        interval,
        date,
        factors,
        seed,
        output,
        no_upload,
    } = cmd
    else {
        return ExitCode::FAILURE;
    };

    let mut request = GenerateSimulationRequest {
        start_time: Some(start_time),
        end_time: Some(end_time),
        time_interval: Some(IntervalValue::Minutes(interval)),
        simulation_date: Some(date),
        seed,
        ..GenerateSimulationRequest::default()
    };
    if let Some(path) = factors {
        match load_factor_overrides(&path) {
            Ok(overrides) => {
                request.use_custom_factors = true;
                request.weather_factors = overrides.weather;
                request.weekday_factors = overrides.weekday;
                request.weekday_discounts = overrides.discounts;
            }
            Err(e) => {
                eprintln!("Failed to load custom factors: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let offline;
    let service = if no_upload {
        offline = DatasetService::new(None);
        &offline
    } else {
        let Some(service) = context.storage_service() else {
            return ExitCode::FAILURE;
        };
        service.as_ref()
    };
    let response = match service.generate_simulation(request).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Failed to generate simulation: {e}");
            return ExitCode::FAILURE;
        }
    };

    context.remember(&response.data).await;
    println!("{}", format_dataset_summary("simulation", &response.data));
    match (&response.file_name, &response.error) {
        (Some(file_name), _) => println!("Saved to storage as {file_name}"),
        (None, Some(error)) => eprintln!("Simulation was not saved to storage: {error}"),
        (None, None) => println!("{}", response.message),
    }

    if let Some(output) = output {
        let bytes = match encode_dataset(&output, &response.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Failed to encode simulation output: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = tokio::fs::write(&output, bytes).await {
            eprintln!("Failed to write simulation output: {e}");
            return ExitCode::FAILURE;
        }
        println!("Simulation data written to {output}");
    }
    ExitCode::SUCCESS
}
