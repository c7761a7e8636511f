use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::input::{inject_text, tap_args, AdbInjector};
use crate::app::adb::locator::{resolve_adb_program, resolve_scrcpy_program, validate_program};
use crate::app::adb::parse::{parse_adb_devices, parse_wm_size};
use crate::app::adb::runner::{run_command_raw, run_command_with_timeout};
use crate::app::adb::scrcpy::{build_mirror_command, check_scrcpy_availability};
use crate::app::adb::transfer;
use crate::app::adb::wireless;
use crate::app::config::AppConfig;
use crate::app::coords::{append_click_log, map_point, Point};
use crate::app::error::AppError;
use crate::app::models::{
    AdbInfo, CommandResponse, CommandResult, DeviceHandle, DeviceSummary, HostCommandResult,
    PullOutcome, ScrcpyInfo,
};
use crate::app::playback::{
    spawn_fleet, FleetWorker, PlaybackControl, PlaybackOptions, PlaybackOutcome,
};
use crate::app::subs::{load_srt, load_word_list, pick_random};

pub fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(
            format!("{field} is required"),
            trace_id,
        ));
    }
    Ok(())
}

fn adb_program(config: &AppConfig) -> String {
    resolve_adb_program(&config.adb.command_path)
}

fn command_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.adb.command_timeout_secs.max(1))
}

fn playback_options(config: &AppConfig, start_offset: Duration) -> PlaybackOptions {
    PlaybackOptions {
        start_offset,
        settle: Duration::from_millis(config.playback.settle_ms),
        poll_interval: Duration::from_millis(config.playback.poll_interval_ms),
    }
}

pub fn check_adb(config: &AppConfig, trace_id: Option<String>) -> CommandResponse<AdbInfo> {
    let trace_id = resolve_trace_id(trace_id);
    let program = adb_program(config);

    if let Err(err) = validate_program(&program, "adb") {
        return CommandResponse {
            trace_id,
            data: AdbInfo {
                available: false,
                version_output: String::new(),
                command_path: program,
                error: Some(err),
            },
        };
    }

    let args = vec!["--version".to_string()];
    let data = match run_command_with_timeout(&program, &args, Duration::from_secs(5), &trace_id) {
        Ok(output) if output.exit_code.unwrap_or_default() == 0 => AdbInfo {
            available: true,
            version_output: output.stdout.trim().to_string(),
            command_path: program,
            error: None,
        },
        Ok(output) => AdbInfo {
            available: false,
            version_output: output.stdout,
            command_path: program,
            error: Some(output.stderr.trim().to_string()),
        },
        Err(err) => AdbInfo {
            available: false,
            version_output: String::new(),
            command_path: program,
            error: Some(err.error),
        },
    };
    CommandResponse { trace_id, data }
}

pub fn check_scrcpy(config: &AppConfig, trace_id: Option<String>) -> CommandResponse<ScrcpyInfo> {
    let trace_id = resolve_trace_id(trace_id);
    let program = resolve_scrcpy_program(&config.scrcpy.command_path);
    CommandResponse {
        trace_id,
        data: check_scrcpy_availability(&program),
    }
}

pub fn list_devices(
    config: &AppConfig,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<DeviceSummary>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "list_devices");

    let program = adb_program(config);
    let args = vec!["devices".to_string(), "-l".to_string()];
    let output = run_command_with_timeout(&program, &args, command_timeout(config), &trace_id)?;
    if output.exit_code.unwrap_or_default() != 0 {
        return Err(AppError::dependency(
            format!("adb devices failed: {}", output.stderr.trim()),
            &trace_id,
        ));
    }
    Ok(CommandResponse {
        trace_id,
        data: parse_adb_devices(&output.stdout),
    })
}

/// Resolves the serials an operation targets: online devices filtered by the
/// explicit selection; an empty selection means all online devices. Selecting
/// a serial that is not connected is a validation error; zero online devices
/// is a discovery failure.
pub fn discover_serials(
    config: &AppConfig,
    selection: &[String],
    trace_id: &str,
) -> Result<Vec<String>, AppError> {
    let listed = list_devices(config, Some(trace_id.to_string()))?.data;
    let online: Vec<DeviceSummary> = listed.into_iter().filter(DeviceSummary::is_online).collect();

    if online.is_empty() {
        return Err(AppError::dependency(
            "No devices detected; check connections and USB debugging",
            trace_id,
        ));
    }

    for serial in selection {
        if !online.iter().any(|summary| &summary.serial == serial) {
            return Err(AppError::validation(
                format!("Device {serial} is not connected"),
                trace_id,
            ));
        }
    }

    Ok(online
        .into_iter()
        .map(|summary| summary.serial)
        .filter(|serial| selection.is_empty() || selection.contains(serial))
        .collect())
}

/// Like [`discover_serials`], but additionally queries each device's
/// resolution once and caches it on the handle. An unparsable resolution is
/// logged and leaves the handle without one; coordinate-mapped operations
/// skip such devices.
pub fn discover_handles(
    config: &AppConfig,
    selection: &[String],
    trace_id: &str,
) -> Result<Vec<DeviceHandle>, AppError> {
    let serials = discover_serials(config, selection, trace_id)?;
    let program = adb_program(config);
    let timeout = command_timeout(config);
    Ok(serials
        .into_iter()
        .map(|serial| {
            let resolution = query_resolution(&program, &serial, timeout, trace_id);
            DeviceHandle::new(serial, resolution)
        })
        .collect())
}

fn query_resolution(
    program: &str,
    serial: &str,
    timeout: Duration,
    trace_id: &str,
) -> Option<crate::app::models::Resolution> {
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "shell".to_string(),
        "wm".to_string(),
        "size".to_string(),
    ];
    match run_command_with_timeout(program, &args, timeout, trace_id) {
        Ok(output) => {
            let parsed = parse_wm_size(&output.stdout);
            if parsed.is_none() {
                warn!(
                    trace_id = %trace_id,
                    serial = %serial,
                    output = %output.stdout.trim(),
                    "failed to parse wm size"
                );
            }
            parsed
        }
        Err(err) => {
            warn!(
                trace_id = %trace_id,
                serial = %serial,
                error = %err,
                "failed to query wm size"
            );
            None
        }
    }
}

/// Maps the configured reference tap point onto one device. Fails for
/// devices whose resolution could not be read.
fn device_tap_point(
    config: &AppConfig,
    handle: &DeviceHandle,
    trace_id: &str,
) -> Result<Point, AppError> {
    let resolution = handle.resolution.ok_or_else(|| {
        AppError::parse(
            format!("No usable resolution for {}", handle.serial),
            trace_id,
        )
    })?;
    Ok(map_point(
        config.input.reference_point,
        config.input.reference_resolution,
        resolution,
        &config.input.overrides,
    ))
}

pub fn connect_wireless(
    config: &AppConfig,
    serial: &str,
    trace_id: Option<String>,
) -> Result<CommandResponse<HostCommandResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(serial, "serial", &trace_id)?;

    let program = adb_program(config);
    wireless::enable_tcpip(&program, serial, &trace_id)?;
    // adbd restarts when switching transport; give it a moment to rebind.
    thread::sleep(Duration::from_secs(2));
    let ip = wireless::query_wlan_ip(&program, serial, &trace_id)?;
    info!(trace_id = %trace_id, serial = %serial, ip = %ip, "connecting wirelessly");
    let result = wireless::connect(&program, &ip, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: result,
    })
}

pub fn disconnect_wireless(
    config: &AppConfig,
    serial: &str,
    trace_id: Option<String>,
) -> Result<CommandResponse<HostCommandResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(serial, "serial", &trace_id)?;

    let program = adb_program(config);
    let ip = wireless::query_wlan_ip(&program, serial, &trace_id)?;
    info!(trace_id = %trace_id, serial = %serial, ip = %ip, "disconnecting wireless session");
    let result = wireless::disconnect(&program, &ip, &trace_id)?;
    Ok(CommandResponse {
        trace_id,
        data: result,
    })
}

pub fn launch_mirror(
    config: &AppConfig,
    serial: &str,
    max_size: Option<u32>,
    trace_id: Option<String>,
) -> Result<CommandResponse<u32>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(serial, "serial", &trace_id)?;

    let program = resolve_scrcpy_program(&config.scrcpy.command_path);
    let availability = check_scrcpy_availability(&program);
    if !availability.available {
        return Err(AppError::dependency(
            format!("scrcpy not found (looked for {})", availability.command_path),
            &trace_id,
        ));
    }

    let mut settings = config.scrcpy.clone();
    if let Some(max_size) = max_size {
        settings.max_size = max_size;
    }
    let argv = build_mirror_command(&availability.command_path, serial, &settings);
    info!(trace_id = %trace_id, serial = %serial, command = ?argv, "launching scrcpy");

    // Detached: mirroring outlives this process invocation.
    let child = std::process::Command::new(&argv[0])
        .args(&argv[1..])
        .spawn()
        .map_err(|err| {
            AppError::dependency(format!("Failed to launch scrcpy: {err}"), &trace_id)
        })?;
    Ok(CommandResponse {
        trace_id,
        data: child.id(),
    })
}

/// One-shot text injection, fanned out to one thread per device and joined.
/// Devices without a usable resolution are skipped with a warning. Returns
/// the serials that were injected.
pub fn send_text_to_devices(
    config: &AppConfig,
    handles: &[DeviceHandle],
    text: &str,
    trace_id: &str,
) -> Result<Vec<String>, AppError> {
    ensure_non_empty(text, "text", trace_id)?;

    let program = adb_program(config);
    let timeout = command_timeout(config);
    let mut workers = Vec::new();
    for handle in handles {
        let tap = match device_tap_point(config, handle, trace_id) {
            Ok(tap) => tap,
            Err(err) => {
                warn!(
                    trace_id = %trace_id,
                    serial = %handle.serial,
                    error = %err,
                    "skipping device"
                );
                continue;
            }
        };
        let program = program.clone();
        let serial = handle.serial.clone();
        let action = config.input.clipboard_action.clone();
        let text = text.to_string();
        let trace_id_clone = trace_id.to_string();
        workers.push(thread::spawn(move || {
            inject_text(
                &program,
                &serial,
                tap,
                &action,
                &text,
                timeout,
                &trace_id_clone,
            );
            serial
        }));
    }

    if workers.is_empty() {
        return Err(AppError::dependency(
            "No devices with a usable resolution",
            trace_id,
        ));
    }

    let mut injected = Vec::with_capacity(workers.len());
    for worker in workers {
        let serial = worker
            .join()
            .map_err(|_| AppError::system("Injection thread panicked", trace_id))?;
        injected.push(serial);
    }
    Ok(injected)
}

/// Where the injected text comes from: a literal phrase, or a random line
/// per round from a loaded word list.
pub enum TextSource {
    Literal(String),
    WordList(Vec<String>),
}

impl TextSource {
    pub fn from_word_list(path: &Path, trace_id: &str) -> Result<Self, AppError> {
        Ok(Self::WordList(load_word_list(path, trace_id)?))
    }

    fn next(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text.as_str()),
            Self::WordList(words) => pick_random(words),
        }
    }
}

/// Interval injection: each round draws one phrase from the source and sends
/// it to every device; `every == None` runs a single round. The stop token
/// is polled between rounds.
pub fn run_send_loop(
    config: &AppConfig,
    handles: &[DeviceHandle],
    source: &TextSource,
    every: Option<Duration>,
    control: &PlaybackControl,
    trace_id: &str,
) -> Result<(), AppError> {
    let poll = Duration::from_millis(config.playback.poll_interval_ms);

    loop {
        if control.is_stopped() {
            return Ok(());
        }
        let Some(phrase) = source.next() else {
            return Ok(());
        };
        let injected = send_text_to_devices(config, handles, phrase, trace_id)?;
        info!(
            trace_id = %trace_id,
            phrase = %phrase,
            devices = injected.len(),
            "round sent"
        );

        let Some(interval) = every else {
            return Ok(());
        };
        let mut remaining = interval;
        while !remaining.is_zero() {
            if control.is_stopped() {
                return Ok(());
            }
            let slice = remaining.min(poll);
            thread::sleep(slice);
            remaining -= slice;
        }
    }
}

/// Subtitle-timed playback across a device fleet: one worker thread per
/// assignment, joined before returning (console semantics). Devices without
/// a usable resolution are skipped with a warning.
pub fn run_subtitle_playback(
    config: &AppConfig,
    assignments: Vec<(DeviceHandle, PathBuf)>,
    start_offset: Duration,
    control: Arc<PlaybackControl>,
    trace_id: &str,
) -> Result<Vec<(String, PlaybackOutcome)>, AppError> {
    let program = adb_program(config);
    let timeout = command_timeout(config);

    let mut workers = Vec::new();
    let mut serials = Vec::new();
    for (handle, subtitle_path) in assignments {
        let tap = match device_tap_point(config, &handle, trace_id) {
            Ok(tap) => tap,
            Err(err) => {
                warn!(
                    trace_id = %trace_id,
                    serial = %handle.serial,
                    error = %err,
                    "skipping device"
                );
                continue;
            }
        };
        let entries = load_srt(&subtitle_path, trace_id)?;
        info!(
            trace_id = %trace_id,
            serial = %handle.serial,
            file = %subtitle_path.display(),
            entries = entries.len(),
            "assigned subtitle file"
        );
        serials.push(handle.serial.clone());
        workers.push(FleetWorker {
            serial: handle.serial.clone(),
            entries,
            injector: Box::new(AdbInjector {
                program: program.clone(),
                serial: handle.serial,
                tap,
                clipboard_action: config.input.clipboard_action.clone(),
                timeout,
                trace_id: trace_id.to_string(),
            }),
        });
    }

    if workers.is_empty() {
        return Err(AppError::dependency(
            "No devices with a usable resolution",
            trace_id,
        ));
    }

    let options = playback_options(config, start_offset);
    let handles = spawn_fleet(workers, control, options);
    let mut outcomes = Vec::with_capacity(handles.len());
    for (serial, handle) in serials.into_iter().zip(handles) {
        let outcome = handle
            .join()
            .map_err(|_| AppError::system("Playback thread panicked", trace_id))?;
        outcomes.push((serial, outcome));
    }
    Ok(outcomes)
}

/// Pushes one local file to every selected device, one thread per device.
pub fn push_to_devices(
    config: &AppConfig,
    serials: &[String],
    local: &Path,
    remote: &str,
    trace_id: &str,
) -> Result<Vec<CommandResult>, AppError> {
    ensure_non_empty(remote, "remote path", trace_id)?;

    let program = adb_program(config);
    let timeout = Duration::from_secs(config.transfer.timeout_secs.max(1));
    let mut threads = Vec::new();
    for (index, serial) in serials.iter().enumerate() {
        let program = program.clone();
        let serial = serial.clone();
        let local = local.to_path_buf();
        let remote = remote.to_string();
        let trace_id_clone = trace_id.to_string();
        threads.push(thread::spawn(move || {
            let result = transfer::push(&program, &serial, &local, &remote, timeout, &trace_id_clone);
            (index, result)
        }));
    }

    let mut collected = Vec::with_capacity(threads.len());
    for worker in threads {
        let (index, result) = worker
            .join()
            .map_err(|_| AppError::system("Push thread panicked", trace_id))?;
        collected.push((index, result?));
    }
    collected.sort_by_key(|item| item.0);
    Ok(collected.into_iter().map(|item| item.1).collect())
}

/// Pulls one remote path from every selected device. With more than one
/// device the output lands in per-serial subdirectories so pulls cannot
/// clobber each other.
pub fn pull_from_devices(
    config: &AppConfig,
    serials: &[String],
    remote: &str,
    output_dir: Option<PathBuf>,
    trace_id: &str,
) -> Result<Vec<PullOutcome>, AppError> {
    ensure_non_empty(remote, "remote path", trace_id)?;

    let program = adb_program(config);
    let timeout = Duration::from_secs(config.transfer.timeout_secs.max(1));
    let base_dir = output_dir
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut outcomes = Vec::with_capacity(serials.len());
    for serial in serials {
        let device_dir = if serials.len() > 1 {
            base_dir.join(serial)
        } else {
            base_dir.clone()
        };
        let outcome = transfer::pull(&program, serial, remote, &device_dir, timeout, trace_id)?;
        info!(
            trace_id = %trace_id,
            serial = %serial,
            local = %outcome.local_path,
            byte_stream = outcome.used_byte_stream,
            "pull finished"
        );
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Maps a reference-space point onto each device and taps it. When a click
/// log is given, one `"<x>,<y>"` line per executed tap is appended with the
/// device-mapped coordinates.
pub fn tap_devices(
    config: &AppConfig,
    handles: &[DeviceHandle],
    reference: Point,
    click_log: Option<&Path>,
    trace_id: &str,
) -> Result<Vec<CommandResult>, AppError> {
    let program = adb_program(config);
    let timeout = command_timeout(config);

    let mut results = Vec::new();
    for handle in handles {
        let resolution = match handle.resolution {
            Some(resolution) => resolution,
            None => {
                warn!(
                    trace_id = %trace_id,
                    serial = %handle.serial,
                    "skipping device without a usable resolution"
                );
                continue;
            }
        };
        let mapped = map_point(
            reference,
            config.input.reference_resolution,
            resolution,
            &config.input.overrides,
        );
        let args = tap_args(&handle.serial, mapped);
        let output = run_command_with_timeout(&program, &args, timeout, trace_id)?;
        if let Some(path) = click_log {
            if let Err(err) = append_click_log(path, mapped) {
                warn!(trace_id = %trace_id, error = %err, "failed to append click log");
            }
        }
        info!(
            trace_id = %trace_id,
            serial = %handle.serial,
            x = mapped.x,
            y = mapped.y,
            "tap sent"
        );
        results.push(CommandResult {
            serial: handle.serial.clone(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        });
    }

    if results.is_empty() {
        return Err(AppError::dependency(
            "No devices with a usable resolution",
            trace_id,
        ));
    }
    Ok(results)
}

pub fn capture_screenshot(
    config: &AppConfig,
    serial: &str,
    output: Option<PathBuf>,
    trace_id: Option<String>,
) -> Result<CommandResponse<String>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    ensure_non_empty(serial, "serial", &trace_id)?;

    let output_path = output.unwrap_or_else(|| {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("screenshot_{serial}_{timestamp}.png"))
    });
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::system(format!("Failed to create output dir: {err}"), &trace_id)
            })?;
        }
    }

    let program = adb_program(config);
    let args = vec![
        "-s".to_string(),
        serial.to_string(),
        "exec-out".to_string(),
        "screencap".to_string(),
        "-p".to_string(),
    ];
    let raw = run_command_raw(&program, &args, Duration::from_secs(30), &trace_id)?;
    if raw.exit_code.unwrap_or_default() != 0 {
        return Err(AppError::dependency(
            format!("Screenshot failed: {}", raw.stderr.trim()),
            &trace_id,
        ));
    }
    fs::write(&output_path, &raw.stdout).map_err(|err| {
        AppError::system(format!("Failed to write screenshot: {err}"), &trace_id)
    })?;

    Ok(CommandResponse {
        trace_id,
        data: output_path.to_string_lossy().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_trace_id_keeps_supplied_values() {
        assert_eq!(
            resolve_trace_id(Some("trace-1".to_string())),
            "trace-1".to_string()
        );
    }

    #[test]
    fn resolve_trace_id_generates_when_blank() {
        let generated = resolve_trace_id(Some("   ".to_string()));
        assert!(!generated.trim().is_empty());
        assert_ne!(resolve_trace_id(None), resolve_trace_id(None));
    }

    #[test]
    fn ensure_non_empty_rejects_blank_input() {
        let err = ensure_non_empty("  ", "serial", "test-trace").unwrap_err();
        assert_eq!(err.code, "ERR_VALIDATION");
        assert!(ensure_non_empty("ABC", "serial", "test-trace").is_ok());
    }

    #[test]
    fn tap_point_requires_a_resolution() {
        let config = AppConfig::default();
        let handle = DeviceHandle::new("ABC", None);
        let err = device_tap_point(&config, &handle, "test-trace").unwrap_err();
        assert_eq!(err.code, "ERR_PARSE");
    }

    #[test]
    fn tap_point_uses_override_rules() {
        let config = AppConfig::default();
        let handle = DeviceHandle::new(
            "ABC",
            Some(crate::app::models::Resolution::new(1440, 3120)),
        );
        let point = device_tap_point(&config, &handle, "test-trace").expect("tap point");
        assert_eq!(point, Point::new(300, 3000));
    }
}
