//! Rule-based reading analysis.
//!
//! Rule groups run in a fixed order and each contributes at most one line.
//! Thresholds are exact; the wording is free to change.

use crate::station::WeatherReading;

/// Line used when no rule produced anything.
pub const NORMAL_CONDITIONS: &str = "Conditions appear normal.";

const COLD_BELOW: f64 = 10.0;
const WARM_ABOVE: f64 = 25.0;
const MUGGY_ABOVE: f64 = 80.0;
const DRY_BELOW: f64 = 30.0;
const STRONG_WIND_ABOVE: f64 = 20.0;
const CALM_WIND_BELOW: f64 = 5.0;
const LOW_PRESSURE_BELOW: f64 = 1013.0;
const HIGH_PRESSURE_ABOVE: f64 = 1020.0;
const HIGH_UV_ABOVE: f64 = 7.0;
const MODERATE_UV_ABOVE: f64 = 3.0;
const WIND_CHILL_DELTA_ABOVE: f64 = 2.0;

/// Produce the ordered observations for a reading.
///
/// Never empty: falls back to [`NORMAL_CONDITIONS`].
pub fn analyze(reading: &WeatherReading) -> Vec<String> {
    let mut lines = Vec::new();

    // Temperature comfort, always exactly one line
    if reading.temperature < COLD_BELOW {
        lines.push("🥶 It's quite cold today.".to_string());
    } else if reading.temperature > WARM_ABOVE {
        lines.push("🌡️ It's a warm day.".to_string());
    } else {
        lines.push("🌤️ Temperature is pleasant.".to_string());
    }

    if reading.humidity > MUGGY_ABOVE {
        lines.push("💧 High humidity levels - might feel muggy.".to_string());
    } else if reading.humidity < DRY_BELOW {
        lines.push("🏜️ Low humidity - air is quite dry.".to_string());
    }

    if reading.wind_speed > STRONG_WIND_ABOVE {
        lines.push("💨 Strong winds present.".to_string());
    } else if reading.wind_speed < CALM_WIND_BELOW {
        lines.push("🍃 Very light winds or calm conditions.".to_string());
    }

    if reading.bar < LOW_PRESSURE_BELOW {
        lines.push("📉 Low pressure system - weather changes possible.".to_string());
    } else if reading.bar > HIGH_PRESSURE_ABOVE {
        lines.push("📈 High pressure system - stable weather likely.".to_string());
    }

    if reading.rain > 0.0 {
        lines.push("🌧️ Currently raining.".to_string());
    }
    if reading.rain_rate > 0.0 {
        lines.push(format!("⛈️ Rain rate: {} mm/h", reading.rain_rate));
    }

    if reading.uv > HIGH_UV_ABOVE {
        lines.push("☀️ High UV levels - sun protection recommended.".to_string());
    } else if reading.uv > MODERATE_UV_ABOVE {
        lines.push("🌤️ Moderate UV levels.".to_string());
    }

    let chill_delta = reading.temperature - reading.wind_chill;
    if chill_delta > WIND_CHILL_DELTA_ABOVE {
        lines.push(format!(
            "❄️ Wind chill makes it feel {:.1}°C colder.",
            (chill_delta * 10.0).round() / 10.0
        ));
    }

    if lines.is_empty() {
        lines.push(NORMAL_CONDITIONS.to_string());
    }
    lines
}

/// Render observations as a bullet list.
pub fn render_bullets(lines: &[String]) -> String {
    if lines.is_empty() {
        return format!("• {}", NORMAL_CONDITIONS);
    }
    lines
        .iter()
        .map(|line| format!("• {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
