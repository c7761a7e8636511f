use regex::Regex;

use crate::app::models::{DeviceSummary, Resolution};

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let serial = tokens[0].to_string();
            let state = tokens[1].to_string();
            let mut model = None;
            let mut product = None;
            let mut transport_id = None;
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    model = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("product:") {
                    product = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("transport_id:") {
                    transport_id = Some(value.to_string());
                }
            }
            Some(DeviceSummary {
                serial,
                state,
                model,
                product,
                transport_id,
            })
        })
        .collect()
}

/// Parses `wm size` output. Devices report `Physical size: WxH`, and when a
/// `wm size WxH` override is active they additionally report
/// `Override size: WxH`; the override is the coordinate space taps land in,
/// so it wins.
pub fn parse_wm_size(output: &str) -> Option<Resolution> {
    let mut physical = None;
    let mut overridden = None;
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("Physical size:") {
            physical = parse_resolution_token(value);
        } else if let Some(value) = trimmed.strip_prefix("Override size:") {
            overridden = parse_resolution_token(value);
        }
    }
    overridden.or(physical)
}

fn parse_resolution_token(value: &str) -> Option<Resolution> {
    let (width, height) = value.trim().split_once('x')?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Resolution { width, height })
}

/// Extracts the device's Wi-Fi IPv4 address from `ip addr show wlan0`.
pub fn parse_wlan_ip(output: &str) -> Option<String> {
    let re = Regex::new(r"inet (\d+\.\d+\.\d+\.\d+)/").ok()?;
    re.captures(output)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adb_devices_output() {
        let output = "List of devices attached\n0123456789ABCDEF device product:sdk_gphone64_arm64 model:Pixel_7 device:emu64a transport_id:1\n192.168.1.23:5555 device model:M2012K11AC transport_id:2\nemulator-5554 unauthorized transport_id:3\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].serial, "0123456789ABCDEF");
        assert_eq!(parsed[0].state, "device");
        assert_eq!(parsed[0].model.as_deref(), Some("Pixel_7"));
        assert_eq!(parsed[1].serial, "192.168.1.23:5555");
        assert_eq!(parsed[2].state, "unauthorized");
        assert!(!parsed[2].is_online());
    }

    #[test]
    fn skips_daemon_noise_lines() {
        let output = "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\nABC device\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].serial, "ABC");
    }

    #[test]
    fn parses_physical_size() {
        let output = "Physical size: 1080x2400\n";
        assert_eq!(parse_wm_size(output), Some(Resolution::new(1080, 2400)));
    }

    #[test]
    fn override_size_wins_over_physical() {
        let output = "Physical size: 1440x3120\nOverride size: 1096x2560\n";
        assert_eq!(parse_wm_size(output), Some(Resolution::new(1096, 2560)));
    }

    #[test]
    fn rejects_unparsable_wm_size_output() {
        assert_eq!(parse_wm_size(""), None);
        assert_eq!(parse_wm_size("error: no devices/emulators found"), None);
        assert_eq!(parse_wm_size("Physical size: garbage"), None);
        assert_eq!(parse_wm_size("Physical size: 0x2400"), None);
    }

    #[test]
    fn parses_wlan_ip() {
        let output = "30: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    inet 192.168.1.42/24 brd 192.168.1.255 scope global wlan0\n    inet6 fe80::1/64 scope link\n";
        assert_eq!(parse_wlan_ip(output).as_deref(), Some("192.168.1.42"));
    }

    #[test]
    fn missing_wlan_ip_yields_none() {
        let output = "30: wlan0: <BROADCAST,MULTICAST> mtu 1500\n    inet6 fe80::1/64 scope link\n";
        assert_eq!(parse_wlan_ip(output), None);
    }
}
