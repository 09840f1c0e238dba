//! Log command handlers

use anyhow::Result;
use colored::*;
use futures::StreamExt;
use valve_client::ValveClient;
use valve_core::domain::log::LogLine;

/// Print the persisted log, optionally following it
pub async fn show_logs(client: &ValveClient, id: &str, follow: bool) -> Result<()> {
    if follow {
        return follow_logs(client, id).await;
    }

    let logs = client.get_logs(id).await?;

    if logs.logs.is_empty() {
        println!("{}", "No logs found for this operation.".yellow());
    } else {
        println!("{}", format!("Logs for operation {}:", id).bold());
        println!("{}", "─".repeat(80).dimmed());
        print_log_lines(&logs.logs);
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

async fn follow_logs(client: &ValveClient, id: &str) -> Result<()> {
    let mut lines = client.stream_logs(id).await?;

    println!(
        "{}",
        format!("Following operation {} (Ctrl-C to stop)", id).bold()
    );

    while let Some(line) = lines.next().await {
        print_log_line(&line?);
    }

    println!("{}", "Stream closed by orchestrator.".yellow());
    Ok(())
}

pub fn print_log_lines(lines: &[String]) {
    for line in lines {
        print_log_line(line);
    }
}

/// Print one line, dimming its timestamp when it has one
fn print_log_line(line: &str) {
    match LogLine::parse(line) {
        Some((timestamp, message)) => println!(
            "{} {}",
            timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
            colorize_message(message)
        ),
        None => println!("{}", colorize_message(line)),
    }
}

fn colorize_message(message: &str) -> ColoredString {
    let lower = message.to_ascii_lowercase();
    if lower.starts_with("error") || lower.starts_with("traceback") {
        message.red()
    } else if lower.starts_with("warning") {
        message.yellow()
    } else {
        message.normal()
    }
}
