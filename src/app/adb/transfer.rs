use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::app::adb::runner::{run_command_raw, run_command_with_timeout};
use crate::app::error::AppError;
use crate::app::models::{CommandResult, PullOutcome};

/// Builds the remote destination for a push: a directory destination
/// (trailing `/`) gets the local basename appended.
pub fn remote_target(local: &Path, remote: &str) -> String {
    if remote.ends_with('/') {
        let basename = local
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}/{}", remote.trim_end_matches('/'), basename)
    } else {
        remote.to_string()
    }
}

pub fn remote_basename(remote_path: &str) -> &str {
    remote_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(remote_path)
}

/// `adb pull` transliterates non-ASCII remote filenames on some hosts; such
/// files are pulled by streaming raw bytes through `exec-out cat` instead.
/// Directory paths (trailing `/`) always take the native path.
pub fn needs_byte_stream(remote_path: &str) -> bool {
    if remote_path.ends_with('/') {
        return false;
    }
    remote_basename(remote_path).chars().any(|ch| !ch.is_ascii())
}

pub fn push(
    program: &str,
    serial: &str,
    local: &Path,
    remote: &str,
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandResult, AppError> {
    if !local.exists() {
        return Err(AppError::validation(
            format!("Local file not found: {}", local.display()),
            trace_id,
        ));
    }
    let destination = remote_target(local, remote);
    info!(
        trace_id = %trace_id,
        serial = %serial,
        local = %local.display(),
        remote = %destination,
        "pushing file"
    );
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "push".to_string(),
        local.to_string_lossy().to_string(),
        destination,
    ];
    let output = run_command_with_timeout(program, &args, timeout, trace_id)?;
    Ok(CommandResult {
        serial: serial.to_string(),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    })
}

pub fn pull(
    program: &str,
    serial: &str,
    remote_path: &str,
    output_dir: &Path,
    timeout: Duration,
    trace_id: &str,
) -> Result<PullOutcome, AppError> {
    fs::create_dir_all(output_dir).map_err(|err| {
        AppError::system(format!("Failed to create output dir: {err}"), trace_id)
    })?;

    if needs_byte_stream(remote_path) {
        return pull_via_byte_stream(program, serial, remote_path, output_dir, timeout, trace_id);
    }

    info!(
        trace_id = %trace_id,
        serial = %serial,
        remote = %remote_path,
        "pulling file"
    );
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "pull".to_string(),
        remote_path.to_string(),
        output_dir.to_string_lossy().to_string(),
    ];
    let output = run_command_with_timeout(program, &args, timeout, trace_id)?;
    if output.exit_code.unwrap_or_default() != 0 {
        return Err(AppError::dependency(
            format!("adb pull failed: {}", output.stderr.trim()),
            trace_id,
        ));
    }
    Ok(PullOutcome {
        serial: serial.to_string(),
        local_path: local_destination(output_dir, remote_path)
            .to_string_lossy()
            .to_string(),
        used_byte_stream: false,
        exit_code: output.exit_code,
    })
}

fn pull_via_byte_stream(
    program: &str,
    serial: &str,
    remote_path: &str,
    output_dir: &Path,
    timeout: Duration,
    trace_id: &str,
) -> Result<PullOutcome, AppError> {
    info!(
        trace_id = %trace_id,
        serial = %serial,
        remote = %remote_path,
        "remote basename is non-ascii; pulling via exec-out cat"
    );
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "exec-out".to_string(),
        "cat".to_string(),
        remote_path.to_string(),
    ];
    let output = run_command_raw(program, &args, timeout, trace_id)?;
    if output.exit_code.unwrap_or_default() != 0 {
        return Err(AppError::dependency(
            format!("exec-out cat failed: {}", output.stderr.trim()),
            trace_id,
        ));
    }
    let local_path = local_destination(output_dir, remote_path);
    fs::write(&local_path, &output.stdout).map_err(|err| {
        AppError::system(
            format!("Failed to write {}: {err}", local_path.display()),
            trace_id,
        )
    })?;
    Ok(PullOutcome {
        serial: serial.to_string(),
        local_path: local_path.to_string_lossy().to_string(),
        used_byte_stream: true,
        exit_code: output.exit_code,
    })
}

fn local_destination(output_dir: &Path, remote_path: &str) -> PathBuf {
    output_dir.join(remote_basename(remote_path))
}
