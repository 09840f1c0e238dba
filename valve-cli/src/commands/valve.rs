//! Valve command handlers

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use serde_json::Value;
use valve_client::ValveClient;

use super::log::print_log_lines;

/// Parse the payload given inline or in a file
pub fn read_payload(json: Option<&str>, file: Option<&Path>) -> Result<Value> {
    let (raw, source) = match (json, file) {
        (_, Some(path)) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            path.display().to_string(),
        ),
        (Some(json), None) => (json.to_string(), "argument".to_string()),
        (None, None) => anyhow::bail!("A JSON payload or --file is required"),
    };

    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON payload in {}", source))
}

/// Start an operation and report its output
pub async fn operate(client: &ValveClient, payload: &Value, show_logs: bool) -> Result<()> {
    let response = match client.operate(payload).await {
        Ok(response) => response,
        Err(e) => {
            println!("{} {}", "✗".red(), "Operation failed".bold());
            if let Some(message) = e.api_message() {
                println!("{}", message.red());
                anyhow::bail!("remote controller reported an error");
            }
            return Err(e.into());
        }
    };

    println!("{} {}", "✓".green(), "Operation completed".bold());
    println!("  Operation ID: {}", response.operation_id.as_str().cyan());

    if !response.output.trim().is_empty() {
        println!("\n{}", "Output:".bold());
        print!("{}", response.output);
    }

    if show_logs {
        let logs = client.get_logs(response.operation_id.as_str()).await?;
        println!("\n{}", "Log:".bold());
        print_log_lines(&logs.logs);
    }

    Ok(())
}

/// Stop the running operation
pub async fn stop(client: &ValveClient) -> Result<()> {
    match client.stop().await {
        Ok(response) => {
            println!("{} {}", "✓".green(), "Stopped".bold());
            if !response.output.trim().is_empty() {
                print!("{}", response.output);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red(), "Stop failed".bold());
            if let Some(message) = e.api_message() {
                println!("{}", message.red());
            }
            Err(e.into())
        }
    }
}

/// Check orchestrator health
pub async fn health(client: &ValveClient) -> Result<()> {
    client
        .health()
        .await
        .with_context(|| format!("Orchestrator at {} is not reachable", client.base_url()))?;

    println!("{} Orchestrator at {} is up", "✓".green(), client.base_url());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inline_payload() {
        let payload = read_payload(Some(r#"{"pin": 1, "duration": 30}"#), None).unwrap();
        assert_eq!(payload["pin"], 1);
        assert_eq!(payload["duration"], 30);
    }

    #[test]
    fn test_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"pin": 2}}]"#).unwrap();

        let payload = read_payload(None, Some(file.path())).unwrap();
        assert_eq!(payload[0]["pin"], 2);
    }

    #[test]
    fn test_invalid_payload() {
        let err = read_payload(Some("{pin: 1"), None).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON payload"));
        assert!(read_payload(None, None).is_err());
    }
}
