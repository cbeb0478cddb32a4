//! Plain-text rendering of lookup results for the terminal

use std::fmt::Write;

use crate::data::WeatherRecord;
use crate::lookup::HealthReport;

/// Render a weather record as a multi-line card
pub fn render_weather(record: &WeatherRecord) -> String {
    let location = &record.location;
    let current = &record.current;

    let mut out = String::new();
    let _ = writeln!(out, "{}, {}, {}", location.name, location.region, location.country);
    let _ = writeln!(
        out,
        "  Local time:  {}  ({:.2}, {:.2})",
        location.localtime, location.lat, location.lon
    );
    let _ = writeln!(
        out,
        "  Temperature: {:.1}°C / {:.1}°F  (feels like {:.1}°C)",
        current.temp_c, current.temp_f, current.feelslike_c
    );
    let _ = writeln!(out, "  Conditions:  {}", current.condition.text);
    let _ = writeln!(out, "  Wind:        {:.1} km/h {}", current.wind_kph, current.wind_dir);
    let _ = writeln!(out, "  Humidity:    {}%", current.humidity);
    let _ = writeln!(out, "  Cloud cover: {}%", current.cloud);
    let _ = write!(out, "  UV index:    {:.1}", current.uv);
    out
}

/// Render a health report
pub fn render_health(report: &HealthReport) -> String {
    let backend = report.cache_backend.unwrap_or("none");
    format!(
        "Status: {}\nCache: {} ({})\nTimestamp: {}\nVersion: {}",
        report.status,
        report.cache,
        backend,
        report.checked_at.to_rfc3339(),
        report.version
    )
}
