// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `greenroom status` command implementation.
//!
//! Queries the health and session-status endpoints of a running gateway and
//! displays uptime plus device-session state. Falls back gracefully when
//! the gateway is not running.

use std::io::IsTerminal;
use std::time::Duration;

use greenroom_config::GreenroomConfig;
use greenroom_core::GreenroomError;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

/// Session status endpoint response (subset).
#[derive(Debug, Deserialize)]
struct SessionSnapshot {
    status: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub session_status: Option<String>,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub gateway_host: String,
    pub gateway_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `greenroom status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &GreenroomConfig,
    json: bool,
    plain: bool,
) -> Result<(), GreenroomError> {
    let host = &config.server.host;
    let port = config.server.port;
    let base = format!("http://{host}:{port}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| GreenroomError::Internal(format!("failed to create HTTP client: {e}")))?;

    let result = client.get(format!("{base}/health")).send().await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthResponse = resp.json().await.map_err(|e| {
                GreenroomError::Internal(format!("failed to parse health response: {e}"))
            })?;

            // Best-effort: the gateway is up even if this call fails.
            let session_status = match client.get(format!("{base}/session/status")).send().await {
                Ok(resp) if resp.status().is_success() => resp
                    .json::<SessionSnapshot>()
                    .await
                    .ok()
                    .map(|s| s.status),
                _ => None,
            };

            let uptime_human = format_uptime(health.uptime_secs);

            if json {
                let status_resp = StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    session_status,
                    version: Some(health.version),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human),
                    gateway_host: host.clone(),
                    gateway_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = !plain && std::io::stdout().is_terminal();
                print_status_running(
                    &health.status,
                    session_status.as_deref().unwrap_or("unknown"),
                    &uptime_human,
                    use_color,
                );
            }
        }
        _ => {
            if json {
                let status_resp = StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    session_status: None,
                    version: None,
                    uptime_secs: None,
                    uptime_human: None,
                    gateway_host: host.clone(),
                    gateway_port: port,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status_resp)
                        .unwrap_or_else(|_| "{}".to_string())
                );
            } else {
                let use_color = !plain && std::io::stdout().is_terminal();
                print_status_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

/// Print running status with optional colors.
fn print_status_running(status: &str, session: &str, uptime: &str, use_color: bool) {
    println!();
    println!("  greenroom status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!(
            "    Gateway:  {} {} (uptime: {})",
            "✓".green(),
            status.green(),
            uptime
        );
        let session_line = match session {
            "connected" => session.green(),
            "logged_out" | "disconnected" => session.red(),
            _ => session.yellow(),
        };
        println!("    Session:  {session_line}");
    } else {
        println!("    Gateway:  [OK] {status} (uptime: {uptime})");
        println!("    Session:  {session}");
    }

    println!();
}

/// Print offline status with optional colors.
fn print_status_offline(host: &str, port: u16, use_color: bool) {
    println!();
    println!("  greenroom status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    Gateway:  {} {}", "✗".red(), "not running".red());
    } else {
        println!("    Gateway:  [FAIL] not running");
    }

    println!("    Endpoint: http://{host}:{port}/health");
    println!();
    println!("  Start with: greenroom serve");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uptime_minutes() {
        assert_eq!(format_uptime(120), "2m");
    }

    #[test]
    fn format_uptime_hours() {
        assert_eq!(format_uptime(3720), "1h 2m");
    }

    #[test]
    fn format_uptime_days() {
        assert_eq!(format_uptime(90060), "1d 1h 1m");
    }

    #[test]
    fn status_response_serializes() {
        let resp = StatusResponse {
            running: true,
            status: "ok".to_string(),
            session_status: Some("connected".to_string()),
            version: Some("0.1.0".to_string()),
            uptime_secs: Some(3600),
            uptime_human: Some("1h 0m".to_string()),
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 8085,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":true"));
        assert!(json.contains("\"session_status\":\"connected\""));
    }

    #[test]
    fn status_response_offline_serializes() {
        let resp = StatusResponse {
            running: false,
            status: "not running".to_string(),
            session_status: None,
            version: None,
            uptime_secs: None,
            uptime_human: None,
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 8085,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"running\":false"));
    }
}
