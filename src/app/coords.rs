use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::models::Resolution;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// One manually tuned mapping: devices reporting exactly this resolution get
/// the fixed point instead of the linear formula. The rules live in
/// configuration; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideRule {
    pub resolution: Resolution,
    pub point: Point,
}

/// Rescales `reference` (expressed against `reference_resolution`) to
/// `device_resolution`. Override rules are consulted in order before the
/// linear formula; the linear result truncates toward zero.
pub fn map_point(
    reference: Point,
    reference_resolution: Resolution,
    device_resolution: Resolution,
    rules: &[OverrideRule],
) -> Point {
    for rule in rules {
        if rule.resolution == device_resolution {
            return rule.point;
        }
    }

    if reference_resolution.width == 0 || reference_resolution.height == 0 {
        return reference;
    }

    let x = u64::from(reference.x) * u64::from(device_resolution.width)
        / u64::from(reference_resolution.width);
    let y = u64::from(reference.y) * u64::from(device_resolution.height)
        / u64::from(reference_resolution.height);
    Point {
        x: x as u32,
        y: y as u32,
    }
}

/// Appends one `"<x>,<y>"` line to the click log.
pub fn append_click_log(path: &Path, point: Point) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{},{}", point.x, point.y)
}
