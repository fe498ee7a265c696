//! The measurement log: a flat CSV file with one row per successful poll.
//!
//! ```text
//! Seconds, Gauge 1, Gauge 2, Gauge 3, Gauge 4, Gauge 5, Gauge 6
//! 1700000000, 1.053E-06, , 2.000E-03, , ,
//! ```
//!
//! Unusable readings (sensor off, no sensor, ...) are left blank.

pub mod history;
pub mod thin;
pub mod writer;

pub use history::{read_history, read_history_file, HistoryPoint, HistorySeries};
pub use thin::{extract_every_nth_line, thin_out, thin_out_average};
pub use writer::PressureLog;

use crate::device::{PressureReading, SENSOR_COUNT};

/// Name of the time column.
pub const TIME_COLUMN: &str = "Seconds";
pub const FIELD_SEPARATOR: &str = ", ";

pub fn header() -> String {
    let mut columns = vec![TIME_COLUMN.to_string()];
    columns.extend((1..=SENSOR_COUNT).map(|i| format!("Gauge {}", i)));
    columns.join(FIELD_SEPARATOR)
}

/// Format like C's `%.3E`: three decimals, signed exponent of at least two digits.
pub fn format_pressure(value: f64) -> String {
    let formatted = format!("{:.3E}", value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!(
                "{}E{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => formatted,
        },
        // NaN and infinities carry no exponent
        None => formatted,
    }
}

pub fn format_row(unix_seconds: i64, readings: &[Option<PressureReading>]) -> String {
    let mut fields = vec![unix_seconds.to_string()];
    fields.extend(readings.iter().map(|reading| {
        reading
            .and_then(|r| r.value())
            .map(format_pressure)
            .unwrap_or_default()
    }));
    fields.join(FIELD_SEPARATOR)
}
