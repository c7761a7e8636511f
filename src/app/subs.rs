use std::path::Path;
use std::time::Duration;

use rand::seq::SliceRandom;

use crate::app::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// Block start time, relative to playback start.
    pub offset: Duration,
    pub text: String,
}

/// Parses SRT content: numbered blocks separated by blank lines, each with a
/// `HH:MM:SS,mmm --> HH:MM:SS,mmm` line followed by one or more text lines.
/// Multi-line text is joined with single spaces; the end timestamp is unused.
/// Blocks without a parsable timestamp line are skipped.
pub fn parse_srt(content: &str) -> Vec<SubtitleEntry> {
    let content = content.replace("\r\n", "\n");
    let mut entries = Vec::new();
    for block in content.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let Some(timestamp_index) = lines.iter().position(|line| line.contains("-->")) else {
            continue;
        };
        let Some(offset) = lines[timestamp_index]
            .split("-->")
            .next()
            .map(str::trim)
            .and_then(parse_timestamp)
        else {
            continue;
        };

        let text = lines[timestamp_index + 1..].join(" ");
        if text.is_empty() {
            continue;
        }
        entries.push(SubtitleEntry { offset, text });
    }
    entries
}

/// `HH:MM:SS,mmm` (hours may be one digit) to a duration.
pub fn parse_timestamp(value: &str) -> Option<Duration> {
    let (clock, millis) = value.split_once(',')?;
    let millis = millis.trim().parse::<u64>().ok()?;
    let mut parts = clock.split(':');
    let hours = parts.next()?.trim().parse::<u64>().ok()?;
    let minutes = parts.next()?.trim().parse::<u64>().ok()?;
    let seconds = parts.next()?.trim().parse::<u64>().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 || millis >= 1_000 {
        return None;
    }
    Some(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + seconds) * 1_000 + millis,
    ))
}

pub fn load_srt(path: &Path, trace_id: &str) -> Result<Vec<SubtitleEntry>, AppError> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::validation(
            format!("Failed to read subtitle file {}: {err}", path.display()),
            trace_id,
        )
    })?;
    let entries = parse_srt(&content);
    if entries.is_empty() {
        return Err(AppError::parse(
            format!("No subtitle entries in {}", path.display()),
            trace_id,
        ));
    }
    Ok(entries)
}

/// Loads a plain-text word list: one phrase per line, blanks skipped.
pub fn load_word_list(path: &Path, trace_id: &str) -> Result<Vec<String>, AppError> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::validation(
            format!("Failed to read word list {}: {err}", path.display()),
            trace_id,
        )
    })?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return Err(AppError::parse(
            format!("Word list {} is empty", path.display()),
            trace_id,
        ));
    }
    Ok(lines)
}

pub fn pick_random(lines: &[String]) -> Option<&str> {
    lines.choose(&mut rand::thread_rng()).map(String::as_str)
}
