use std::path::Path;
use std::process::Command;

use crate::app::config::ScrcpySettings;
use crate::app::models::ScrcpyInfo;

pub fn check_scrcpy_availability(program: &str) -> ScrcpyInfo {
    let mut result = ScrcpyInfo {
        available: false,
        version_output: String::new(),
        command_path: program.to_string(),
    };

    if let Some(output) = try_version(program) {
        result.available = true;
        result.version_output = output;
        return result;
    }

    // A configured absolute path either worked above or is wrong; only the
    // bare name warrants probing well-known install locations.
    if program != "scrcpy" {
        return result;
    }

    let common_paths = if std::env::consts::OS == "macos" {
        vec![
            "/opt/homebrew/bin/scrcpy",
            "/usr/local/bin/scrcpy",
            "~/Applications/scrcpy.app/Contents/MacOS/scrcpy",
        ]
    } else {
        vec![
            "/usr/bin/scrcpy",
            "/usr/local/bin/scrcpy",
            "/snap/bin/scrcpy",
            "~/.local/bin/scrcpy",
        ]
    };

    for path in common_paths {
        let expanded = expand_home(path);
        if !Path::new(&expanded).exists() {
            continue;
        }
        if let Some(output) = try_version(&expanded) {
            result.available = true;
            result.version_output = output;
            result.command_path = expanded;
            return result;
        }
    }

    result
}

/// Full argv for a mirror session, program name first.
pub fn build_mirror_command(program: &str, serial: &str, settings: &ScrcpySettings) -> Vec<String> {
    let mut args = vec![program.to_string(), "-s".to_string(), serial.to_string()];
    if settings.max_size > 0 {
        args.push("--max-size".to_string());
        args.push(settings.max_size.to_string());
    }
    if !settings.extra_args.trim().is_empty() {
        args.extend(settings.extra_args.split_whitespace().map(str::to_string));
    }
    args
}

fn try_version(command: &str) -> Option<String> {
    let output = Command::new(command).arg("--version").output().ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> ScrcpySettings {
        ScrcpySettings {
            command_path: String::new(),
            max_size: 0,
            extra_args: String::new(),
        }
    }

    #[test]
    fn build_mirror_command_targets_the_serial() {
        let args = build_mirror_command("scrcpy", "ABC", &base_settings());
        assert_eq!(args, vec!["scrcpy", "-s", "ABC"]);
    }

    #[test]
    fn build_mirror_command_adds_max_size_only_when_set() {
        let mut settings = base_settings();
        settings.max_size = 1080;
        let args = build_mirror_command("scrcpy", "ABC", &settings);
        assert_eq!(args, vec!["scrcpy", "-s", "ABC", "--max-size", "1080"]);

        settings.max_size = 0;
        let args = build_mirror_command("scrcpy", "ABC", &settings);
        assert!(!args.iter().any(|arg| arg == "--max-size"));
    }

    #[test]
    fn build_mirror_command_appends_extra_args() {
        let mut settings = base_settings();
        settings.extra_args = "--no-audio --stay-awake".to_string();
        let args = build_mirror_command("/usr/bin/scrcpy", "ABC", &settings);
        assert_eq!(args[0], "/usr/bin/scrcpy");
        assert!(args.iter().any(|arg| arg == "--no-audio"));
        assert!(args.iter().any(|arg| arg == "--stay-awake"));
    }
}
