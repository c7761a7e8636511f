use std::time::Duration;

use tracing::info;

use crate::app::adb::parse::parse_wlan_ip;
use crate::app::adb::runner::run_command_with_timeout;
use crate::app::error::AppError;
use crate::app::models::HostCommandResult;

pub const WIRELESS_PORT: u16 = 5555;

/// Switches the device's adbd to TCP/IP listening mode. adbd restarts, so
/// callers should allow a short settle before connecting.
pub fn enable_tcpip(program: &str, serial: &str, trace_id: &str) -> Result<(), AppError> {
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "tcpip".to_string(),
        WIRELESS_PORT.to_string(),
    ];
    let output = run_command_with_timeout(program, &args, Duration::from_secs(10), trace_id)?;
    if output.exit_code.unwrap_or_default() != 0 {
        return Err(AppError::dependency(
            format!("adb tcpip failed: {}", output.stderr.trim()),
            trace_id,
        ));
    }
    info!(trace_id = %trace_id, serial = %serial, "device switched to tcpip mode");
    Ok(())
}

/// Reads the device's Wi-Fi IPv4 address from its wlan0 interface.
pub fn query_wlan_ip(program: &str, serial: &str, trace_id: &str) -> Result<String, AppError> {
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "shell".to_string(),
        "ip".to_string(),
        "addr".to_string(),
        "show".to_string(),
        "wlan0".to_string(),
    ];
    let output = run_command_with_timeout(program, &args, Duration::from_secs(10), trace_id)?;
    parse_wlan_ip(&output.stdout).ok_or_else(|| {
        AppError::parse(
            format!("No Wi-Fi IP on {serial}; is the device on a wireless network?"),
            trace_id,
        )
    })
}

pub fn connect(program: &str, ip: &str, trace_id: &str) -> Result<HostCommandResult, AppError> {
    run_endpoint_command(program, "connect", ip, trace_id)
}

pub fn disconnect(program: &str, ip: &str, trace_id: &str) -> Result<HostCommandResult, AppError> {
    run_endpoint_command(program, "disconnect", ip, trace_id)
}

fn run_endpoint_command(
    program: &str,
    subcommand: &str,
    ip: &str,
    trace_id: &str,
) -> Result<HostCommandResult, AppError> {
    let address = format!("{ip}:{WIRELESS_PORT}");
    let args = vec![subcommand.to_string(), address.clone()];
    let output = run_command_with_timeout(program, &args, Duration::from_secs(10), trace_id)?;
    // adb reports some failures on stdout with a zero exit code.
    let combined = format!("{}{}", output.stdout, output.stderr).to_lowercase();
    if output.exit_code.unwrap_or_default() != 0
        || combined.contains("failed")
        || combined.contains("unable")
    {
        let detail = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        return Err(AppError::dependency(
            format!("adb {subcommand} {address} failed: {detail}"),
            trace_id,
        ));
    }
    Ok(HostCommandResult {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    })
}
