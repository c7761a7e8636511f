use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Drive fleets of Android devices over ADB.
#[derive(Parser, Debug)]
#[command(name = "adbcast")]
#[command(version)]
#[command(about = "Wireless connect, scrcpy mirroring, timed clipboard-text injection and file transfer over ADB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that adb and scrcpy are reachable
    Doctor,

    /// List connected devices
    Devices,

    /// Switch a device to wireless ADB and connect to it
    Connect {
        /// Device serial (USB) to move to TCP/IP mode
        serial: String,
    },

    /// Disconnect a device's wireless ADB session
    Disconnect {
        serial: String,
    },

    /// Mirror a device screen with scrcpy
    Mirror {
        serial: String,

        /// Cap the mirrored dimension (scrcpy --max-size)
        #[arg(short = 'm', long)]
        max_size: Option<u32>,
    },

    /// Inject text into the selected devices (once, or on an interval)
    Send {
        /// Literal text to inject
        #[arg(long, conflicts_with = "wordlist")]
        text: Option<String>,

        /// Pick a random line from this file instead
        #[arg(long)]
        wordlist: Option<PathBuf>,

        /// Repeat every N seconds until Ctrl-C
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,

        /// Target device serial (repeatable; default: all online devices)
        #[arg(short = 'd', long = "device", value_name = "SERIAL")]
        devices: Vec<String>,
    },

    /// Play a subtitle file, injecting each entry at its timestamp
    Play {
        /// Subtitle file for every selected device
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Per-device assignment, SERIAL=FILE (repeatable, wins over --file)
        #[arg(long = "assign", value_name = "SERIAL=FILE", value_parser = parse_assignment)]
        assignments: Vec<(String, PathBuf)>,

        /// Skip entries before this offset (seconds)
        #[arg(long, default_value_t = 0.0, value_name = "SECS")]
        start_offset: f64,

        /// Target device serial (repeatable; default: all online devices)
        #[arg(short = 'd', long = "device", value_name = "SERIAL")]
        devices: Vec<String>,
    },

    /// Push a local file to the selected devices
    Push {
        local: PathBuf,

        /// Remote destination; a trailing slash appends the local basename
        /// (default: the configured remote directory)
        remote: Option<String>,

        #[arg(short = 'd', long = "device", value_name = "SERIAL")]
        devices: Vec<String>,
    },

    /// Pull a remote file from the selected devices
    Pull {
        remote: String,

        /// Local output directory (default: the download directory)
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        #[arg(short = 'd', long = "device", value_name = "SERIAL")]
        devices: Vec<String>,
    },

    /// Tap a reference-space coordinate on the selected devices
    Tap {
        /// X in the reference resolution's coordinate space
        x: u32,

        /// Y in the reference resolution's coordinate space
        y: u32,

        /// Append each device-mapped "<x>,<y>" to this file
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,

        #[arg(short = 'd', long = "device", value_name = "SERIAL")]
        devices: Vec<String>,
    },

    /// Save a device screenshot as PNG
    Screenshot {
        serial: String,

        /// Output file (default: screenshot_<serial>_<timestamp>.png)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_assignment(value: &str) -> Result<(String, PathBuf), String> {
    let Some((serial, path)) = value.split_once('=') else {
        return Err("expected SERIAL=FILE".to_string());
    };
    if serial.trim().is_empty() || path.trim().is_empty() {
        return Err("expected SERIAL=FILE".to_string());
    }
    Ok((serial.trim().to_string(), PathBuf::from(path.trim())))
}
