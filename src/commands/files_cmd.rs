use std::path::Path;
use std::process::ExitCode;

use crate::commands::base_commands::Commands;
use crate::commands::context::CommandContext;
use crate::commands::report_format::{format_dataset_summary, format_file_table};
use crate::services::dataset_codec::encode_dataset;

pub async fn upload_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::Upload { input } = cmd else {
        return ExitCode::FAILURE;
    };
    let bytes = match tokio::fs::read(&input).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {input}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    let file_name = Path::new(&input)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match service.upload_file(&file_name, bytes).await {
        Ok(response) => {
            context.remember(&response.data).await;
            println!("{}", format_dataset_summary(&file_name, &response.data));
            println!("Uploaded {file_name} as {}", response.blob_name);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to upload file: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn list_files_command(context: &CommandContext) -> ExitCode {
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    if !service.is_storage_configured() {
        eprintln!("Blob storage is not configured");
    }
    match service.list_files().await {
        Ok(listing) => {
            println!("{}", format_file_table(&listing.files));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to list files: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn get_file_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::GetFile { name, output } = cmd else {
        return ExitCode::FAILURE;
    };
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    let records = match service.get_file(&name).await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Failed to get file: {e}");
            return ExitCode::FAILURE;
        }
    };
    context.remember(&records).await;
    println!("{}", format_dataset_summary(&name, &records));

    if let Some(output) = output {
        let written = match encode_dataset(&output, &records) {
            Ok(bytes) => tokio::fs::write(&output, bytes).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            eprintln!("Failed to write {output}: {e}");
            return ExitCode::FAILURE;
        }
        println!("Dataset written to {output}");
    }
    ExitCode::SUCCESS
}

pub async fn delete_file_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::DeleteFile { name } = cmd else {
        return ExitCode::FAILURE;
    };
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    match service.delete_file(&name).await {
        Ok(response) => {
            context.forget().await;
            println!("{}", response.message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to delete file: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn delete_data_command(cmd: Commands, context: &CommandContext) -> ExitCode {
    let Commands::DeleteData { all } = cmd else {
        return ExitCode::FAILURE;
    };
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    match service.delete_data(all).await {
        Ok(response) => {
            context.forget().await;
            println!("{}", response.message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to delete data: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn latest_command(context: &CommandContext) -> ExitCode {
    let Some(service) = context.storage_service() else {
        return ExitCode::FAILURE;
    };
    match service.latest_dataset().await {
        Ok(Some((name, records))) => {
            context.remember(&records).await;
            println!("{}", format_dataset_summary(&name, &records));
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("No stored datasets found");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to load latest dataset: {e}");
            ExitCode::FAILURE
        }
    }
}
