//! Operation status command

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use valve_client::ValveClient;
use valve_core::domain::operation::OperationStatus;
use valve_core::dto::operation::OperationSummary;

/// Get and display the status of one operation
pub async fn show_status(client: &ValveClient, id: &str) -> Result<()> {
    match client.get_operation(id).await {
        Ok(operation) => {
            print_operation(&operation);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            println!(
                "{}",
                format!("Operation {} is not known to the orchestrator.", id).yellow()
            );
            println!(
                "{}",
                "  Status is only kept since its last restart; logs may still exist.".dimmed()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// List known operations, newest first
pub async fn list_operations(client: &ValveClient) -> Result<()> {
    let operations = client.list_operations().await?;

    if operations.is_empty() {
        println!("{}", "No operations since the orchestrator started.".dimmed());
        return Ok(());
    }

    println!("{}", format!("Operations ({}):", operations.len()).bold());
    for op in &operations {
        let id = op
            .operation_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-");
        println!(
            "  {}  {:<9}  {}",
            id.cyan(),
            colorize_status(op.status),
            format_time(op.created_at)
        );
    }

    Ok(())
}

fn print_operation(op: &OperationSummary) {
    println!("{}", "Operation Details:".bold());
    if let Some(id) = &op.operation_id {
        println!("  ID:        {}", id.as_str().cyan());
    }
    println!("  Kind:      {}", op.kind);
    println!("  Status:    {}", colorize_status(op.status));
    println!("  Created:   {}", format_time(op.created_at));

    if let Some(started) = op.started_at {
        println!("  Started:   {}", format_time(started));
    }

    if let Some(finished) = op.finished_at {
        println!("  Finished:  {}", format_time(finished));
        if let Some(started) = op.started_at {
            let duration = finished.signed_duration_since(started);
            println!("  Duration:  {}ms", duration.num_milliseconds());
        }
    }

    if let Some(result) = &op.result {
        println!("\n{}", "Result:".bold());
        println!(
            "  Success:   {}",
            if result.success() {
                "✓".green()
            } else {
                "✗".red()
            }
        );
        println!("  Exit Code: {}", result.exit_code);

        if !result.success() {
            println!("  Error:     {}", result.failure_message().red());
        }
    }

    if let Some(error) = &op.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Colorize operation status for display
fn colorize_status(status: OperationStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        OperationStatus::Created => status_str.dimmed(),
        OperationStatus::Running => status_str.cyan(),
        OperationStatus::Completed => status_str.green(),
        OperationStatus::Failed => status_str.red(),
    }
}
