//! Display formatting for station values.
//!
//! Everything here is pure: no I/O, no clock, same input gives the same string.

use chrono::{DateTime, NaiveDateTime};

/// UV exposure band. Each band's upper bound is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UvBand {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvBand {
    /// Classify a UV index. Bands are checked in ascending order; first match wins.
    pub fn classify(uv: f64) -> Self {
        if uv <= 2.0 {
            UvBand::Low
        } else if uv <= 5.0 {
            UvBand::Moderate
        } else if uv <= 7.0 {
            UvBand::High
        } else if uv <= 10.0 {
            UvBand::VeryHigh
        } else {
            UvBand::Extreme
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UvBand::Low => "Low",
            UvBand::Moderate => "Moderate",
            UvBand::High => "High",
            UvBand::VeryHigh => "Very High",
            UvBand::Extreme => "Extreme",
        }
    }
}

pub fn temperature(celsius: f64) -> String {
    format!("{}°C", celsius)
}

pub fn pressure(hpa: f64) -> String {
    format!("{} hPa", hpa)
}

pub fn humidity(percent: f64) -> String {
    format!("{}%", percent)
}

pub fn wind_speed(kmh: f64) -> String {
    format!("{} km/h", kmh)
}

pub fn rain(mm: f64) -> String {
    format!("{} mm", mm)
}

pub fn rain_rate(mm_per_hour: f64) -> String {
    format!("{} mm/h", mm_per_hour)
}

/// Raw index followed by its band, e.g. `6 (High)`.
pub fn uv(index: f64) -> String {
    format!("{} ({})", index, UvBand::classify(index).label())
}

/// Render a capture timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DD[ T]HH:MM:SS[.fff]` forms. Anything
/// else is returned unchanged.
pub fn captured_at(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DISPLAY).to_string();
    }
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(DISPLAY).to_string();
        }
    }
    raw.to_string()
}
