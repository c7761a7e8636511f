use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};

use adbcast::app::cli::{Cli, Commands};
use adbcast::app::commands::{
    capture_screenshot, check_adb, check_scrcpy, connect_wireless, disconnect_wireless,
    discover_handles, discover_serials, launch_mirror, list_devices, pull_from_devices,
    push_to_devices, resolve_trace_id, run_send_loop, run_subtitle_playback, tap_devices,
    TextSource,
};
use adbcast::app::config::{load_config, AppConfig};
use adbcast::app::coords::Point;
use adbcast::app::error::AppError;
use adbcast::app::logging::init_logging;
use adbcast::app::models::DeviceHandle;
use adbcast::app::playback::{PlaybackControl, PlaybackOutcome};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "failed to load config; using defaults");
            AppConfig::default()
        }
    };

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = %err.code, trace_id = %err.trace_id, "{}", err.error);
            eprintln!("error: {}", err.error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<(), AppError> {
    match cli.command {
        Commands::Doctor => {
            let adb = check_adb(config, None).data;
            if adb.available {
                println!("adb\tok\t{}", adb.version_output.lines().next().unwrap_or(""));
            } else {
                println!(
                    "adb\tmissing\t{} ({})",
                    adb.command_path,
                    adb.error.as_deref().unwrap_or("no detail")
                );
            }
            let scrcpy = check_scrcpy(config, None).data;
            if scrcpy.available {
                println!(
                    "scrcpy\tok\t{}",
                    scrcpy.version_output.lines().next().unwrap_or("")
                );
            } else {
                println!("scrcpy\tmissing\t{}", scrcpy.command_path);
            }
            Ok(())
        }

        Commands::Devices => {
            let trace_id = resolve_trace_id(None);
            let devices = list_devices(config, Some(trace_id.clone()))?.data;
            if devices.is_empty() {
                return Err(AppError::dependency(
                    "No devices detected; check connections and USB debugging",
                    trace_id,
                ));
            }
            for device in devices {
                println!(
                    "{}\t{}\t{}",
                    device.serial,
                    device.state,
                    device.model.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }

        Commands::Connect { serial } => {
            let response = connect_wireless(config, &serial, None)?;
            println!("{}", response.data.stdout.trim());
            Ok(())
        }

        Commands::Disconnect { serial } => {
            let response = disconnect_wireless(config, &serial, None)?;
            println!("{}", response.data.stdout.trim());
            Ok(())
        }

        Commands::Mirror { serial, max_size } => {
            let response = launch_mirror(config, &serial, max_size, None)?;
            println!("scrcpy started (pid {})", response.data);
            Ok(())
        }

        Commands::Send {
            text,
            wordlist,
            every,
            devices,
        } => {
            let trace_id = resolve_trace_id(None);
            let source = match (text, wordlist) {
                (Some(text), None) => TextSource::Literal(text),
                (None, Some(path)) => TextSource::from_word_list(&path, &trace_id)?,
                _ => {
                    return Err(AppError::validation(
                        "Pass --text or --wordlist",
                        trace_id,
                    ))
                }
            };

            let handles = discover_handles(config, &devices, &trace_id)?;
            let control = Arc::new(PlaybackControl::new());
            let every = every.map(Duration::from_secs);
            if every.is_some() {
                install_stop_handler(&control);
                println!("Sending every round; Ctrl-C stops.");
            }
            run_send_loop(config, &handles, &source, every, &control, &trace_id)
        }

        Commands::Play {
            file,
            assignments,
            start_offset,
            devices,
        } => {
            let trace_id = resolve_trace_id(None);
            let handles = discover_handles(config, &devices, &trace_id)?;

            let mut pairs: Vec<(DeviceHandle, PathBuf)> = Vec::new();
            for handle in handles {
                let assigned = assignments
                    .iter()
                    .find(|(serial, _)| serial == &handle.serial)
                    .map(|(_, path)| path.clone())
                    .or_else(|| file.clone());
                match assigned {
                    Some(path) => pairs.push((handle, path)),
                    None => warn!(serial = %handle.serial, "no subtitle file assigned; skipping"),
                }
            }
            if pairs.is_empty() {
                return Err(AppError::validation(
                    "No subtitle assignments; pass --file or --assign",
                    trace_id,
                ));
            }

            let control = Arc::new(PlaybackControl::new());
            install_stop_handler(&control);
            spawn_stdin_controller(Arc::clone(&control));
            println!("Playback running; p=pause, r=resume, q=stop (or Ctrl-C).");

            let start_offset = Duration::from_secs_f64(start_offset.max(0.0));
            let outcomes =
                run_subtitle_playback(config, pairs, start_offset, control, &trace_id)?;
            for (serial, outcome) in outcomes {
                let label = match outcome {
                    PlaybackOutcome::Completed => "completed",
                    PlaybackOutcome::Stopped => "stopped",
                };
                println!("{serial}\t{label}");
            }
            Ok(())
        }

        Commands::Push {
            local,
            remote,
            devices,
        } => {
            let trace_id = resolve_trace_id(None);
            let serials = discover_serials(config, &devices, &trace_id)?;
            let remote = remote.unwrap_or_else(|| config.transfer.default_remote_dir.clone());
            let results = push_to_devices(config, &serials, &local, &remote, &trace_id)?;
            for result in results {
                let status = if result.succeeded() { "ok" } else { "failed" };
                println!("{}\t{}\t{}", result.serial, status, result.stdout.trim());
                if !result.stderr.trim().is_empty() {
                    eprintln!("{}\t{}", result.serial, result.stderr.trim());
                }
            }
            Ok(())
        }

        Commands::Pull {
            remote,
            output_dir,
            devices,
        } => {
            let trace_id = resolve_trace_id(None);
            let serials = discover_serials(config, &devices, &trace_id)?;
            let outcomes = pull_from_devices(config, &serials, &remote, output_dir, &trace_id)?;
            for outcome in outcomes {
                let via = if outcome.used_byte_stream {
                    "byte-stream"
                } else {
                    "pull"
                };
                println!("{}\t{}\t{}", outcome.serial, via, outcome.local_path);
            }
            Ok(())
        }

        Commands::Tap {
            x,
            y,
            log,
            devices,
        } => {
            let trace_id = resolve_trace_id(None);
            let handles = discover_handles(config, &devices, &trace_id)?;
            let results = tap_devices(
                config,
                &handles,
                Point::new(x, y),
                log.as_deref(),
                &trace_id,
            )?;
            for result in results {
                let status = if result.succeeded() { "ok" } else { "failed" };
                println!("{}\t{}", result.serial, status);
            }
            Ok(())
        }

        Commands::Screenshot { serial, output } => {
            let response = capture_screenshot(config, &serial, output, None)?;
            println!("{}", response.data);
            Ok(())
        }
    }
}

fn install_stop_handler(control: &Arc<PlaybackControl>) {
    let control = Arc::clone(control);
    if let Err(err) = ctrlc::set_handler(move || control.stop()) {
        warn!(error = %err, "failed to install Ctrl-C handler");
    }
}

/// Console stand-in for the pause/stop buttons: single-letter commands on
/// stdin drive the shared control tokens while workers run.
fn spawn_stdin_controller(control: Arc<PlaybackControl>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "p" => {
                    control.pause();
                    println!("paused");
                }
                "r" => {
                    control.resume();
                    println!("resumed");
                }
                "q" => {
                    control.stop();
                    println!("stopping");
                    break;
                }
                _ => {}
            }
        }
    });
}
