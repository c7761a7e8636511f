use std::path::Path;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Empty config values fall back to the bare program name on PATH.
pub fn resolve_program(config_command_path: &str, default: &str) -> String {
    let normalized = normalize_command_path(config_command_path);
    if normalized.is_empty() {
        default.to_string()
    } else {
        normalized
    }
}

pub fn resolve_adb_program(config_command_path: &str) -> String {
    resolve_program(config_command_path, "adb")
}

pub fn resolve_scrcpy_program(config_command_path: &str) -> String {
    resolve_program(config_command_path, "scrcpy")
}

pub fn validate_program(program: &str, name: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err(format!("{name} command is empty"));
    }
    if !program.contains('/') && !program.contains('\\') {
        // Bare name; let PATH lookup decide at spawn time.
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(format!("{name} path must point to an executable file"));
    }
    if !path.exists() {
        return Err(format!("{name} executable not found at the configured path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wrapping_double_quotes() {
        assert_eq!(
            normalize_command_path("  \"/opt/android/platform-tools/adb\"  "),
            "/opt/android/platform-tools/adb"
        );
    }

    #[test]
    fn strips_wrapping_single_quotes() {
        assert_eq!(
            normalize_command_path("  '/usr/local/bin/scrcpy'  "),
            "/usr/local/bin/scrcpy"
        );
    }

    #[test]
    fn resolves_empty_to_path_defaults() {
        assert_eq!(resolve_adb_program(""), "adb");
        assert_eq!(resolve_adb_program("   "), "adb");
        assert_eq!(resolve_scrcpy_program(""), "scrcpy");
    }

    #[test]
    fn accepts_bare_names_without_touching_the_filesystem() {
        assert!(validate_program("adb", "adb").is_ok());
        assert!(validate_program("scrcpy", "scrcpy").is_ok());
    }

    #[test]
    fn rejects_nonexistent_configured_path() {
        let err = validate_program("/this/path/should/not/exist/adb", "adb").unwrap_err();
        assert!(err.to_lowercase().contains("not found"));
    }
}
