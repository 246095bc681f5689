use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::commands::base_commands::Commands;
use crate::commands::context::CommandContext;
use crate::services::http_api::serve;
use crate::services::sensor_panel::SensorFleet;

pub async fn serve_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::Serve { bind } = cmd else {
        return ExitCode::FAILURE;
    };
    let bind = bind.unwrap_or_else(|| context.config.server.bind.clone());
    let addr: SocketAddr = match bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Failed to parse bind address {bind}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };

    let fleet = Arc::new(Mutex::new(SensorFleet::with_defaults(Utc::now())));
    match serve(addr, service.clone(), fleet).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to serve dashboard api: {e}");
            ExitCode::FAILURE
        }
    }
}
