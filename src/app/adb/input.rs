use std::time::Duration;

use tracing::{debug, warn};

use crate::app::adb::runner::run_command_with_timeout;
use crate::app::coords::Point;
use crate::app::playback::Injector;

/// KEYCODE_PASTE.
pub const PASTE_KEYEVENT: u32 = 279;
/// KEYCODE_ENTER.
pub const ENTER_KEYEVENT: u32 = 66;

pub fn tap_args(serial: &str, point: Point) -> Vec<String> {
    vec![
        "-s".to_string(),
        serial.to_string(),
        "shell".to_string(),
        "input".to_string(),
        "tap".to_string(),
        point.x.to_string(),
        point.y.to_string(),
    ]
}

pub fn clipboard_args(serial: &str, action: &str, text: &str) -> Vec<String> {
    vec![
        "-s".to_string(),
        serial.to_string(),
        "shell".to_string(),
        "am".to_string(),
        "broadcast".to_string(),
        "-a".to_string(),
        action.to_string(),
        "-e".to_string(),
        "text".to_string(),
        shell_quote(text),
    ]
}

pub fn keyevent_args(serial: &str, keycode: u32) -> Vec<String> {
    vec![
        "-s".to_string(),
        serial.to_string(),
        "shell".to_string(),
        "input".to_string(),
        "keyevent".to_string(),
        keycode.to_string(),
    ]
}

/// Double-quotes `text` for the device-side shell. adb joins `shell`
/// arguments into one command line, so metacharacters in the payload would
/// otherwise be interpreted on the device.
pub fn shell_quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// The four-step injection sequence: tap the input field, push the text to
/// the device clipboard via the companion app's broadcast, paste, submit.
/// Individual step failures are logged and the sequence continues.
pub fn inject_text(
    program: &str,
    serial: &str,
    tap: Point,
    clipboard_action: &str,
    text: &str,
    timeout: Duration,
    trace_id: &str,
) {
    debug!(trace_id = %trace_id, serial = %serial, x = tap.x, y = tap.y, "injecting text");
    let steps: [(&str, Vec<String>); 4] = [
        ("tap", tap_args(serial, tap)),
        ("clipboard", clipboard_args(serial, clipboard_action, text)),
        ("paste", keyevent_args(serial, PASTE_KEYEVENT)),
        ("enter", keyevent_args(serial, ENTER_KEYEVENT)),
    ];
    for (step, args) in steps {
        match run_command_with_timeout(program, &args, timeout, trace_id) {
            Ok(output) => {
                if output.exit_code.unwrap_or_default() != 0 {
                    warn!(
                        trace_id = %trace_id,
                        serial = %serial,
                        step = %step,
                        exit_code = ?output.exit_code,
                        stderr = %output.stderr.trim(),
                        "injection step failed"
                    );
                }
            }
            Err(err) => {
                warn!(
                    trace_id = %trace_id,
                    serial = %serial,
                    step = %step,
                    error = %err,
                    "injection step errored"
                );
            }
        }
    }
}

/// Injector bound to one device: the tap point is pre-mapped from the
/// device's cached resolution at construction time.
pub struct AdbInjector {
    pub program: String,
    pub serial: String,
    pub tap: Point,
    pub clipboard_action: String,
    pub timeout: Duration,
    pub trace_id: String,
}

impl Injector for AdbInjector {
    fn inject(&self, text: &str) {
        inject_text(
            &self.program,
            &self.serial,
            self.tap,
            &self.clipboard_action,
            text,
            self.timeout,
            &self.trace_id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tap_args() {
        let args = tap_args("ABC", Point::new(150, 2175));
        assert_eq!(
            args,
            vec!["-s", "ABC", "shell", "input", "tap", "150", "2175"]
        );
    }

    #[test]
    fn builds_clipboard_args_with_quoted_payload() {
        let args = clipboard_args("ABC", "clipper.set", "hello world");
        assert_eq!(args[5], "-a");
        assert_eq!(args[6], "clipper.set");
        assert_eq!(args.last().map(String::as_str), Some("\"hello world\""));
    }

    #[test]
    fn builds_keyevent_args() {
        assert_eq!(
            keyevent_args("ABC", PASTE_KEYEVENT),
            vec!["-s", "ABC", "shell", "input", "keyevent", "279"]
        );
        assert_eq!(keyevent_args("ABC", ENTER_KEYEVENT)[5], "66");
    }

    #[test]
    fn shell_quote_escapes_metacharacters() {
        assert_eq!(shell_quote("plain"), "\"plain\"");
        assert_eq!(shell_quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(shell_quote("$HOME `id` \\"), "\"\\$HOME \\`id\\` \\\\\"");
        assert_eq!(shell_quote("弹幕上线"), "\"弹幕上线\"");
    }
}
