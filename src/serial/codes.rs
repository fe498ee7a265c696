//! Error and status codes reported by the controller.
//!
//! The two error tables are looked up by exact key. Their keys happen to be
//! powers of two, but the controller reports one enumerated value per table on
//! this channel, so a reported value is never split into bits. The key-press
//! bitmask of `TKB` is the only payload decoded bit by bit.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Result, SerialError};

/// System error codes (manual p. 97).
pub const SYSTEM_ERRORS: &[(u32, &str)] = &[
    (0, "No error"),
    (1, "Watchdog has responded"),
    (2, "Task fail error"),
    (4, "IDCX idle error"),
    (8, "Stack overflow error"),
    (16, "EPROM error"),
    (32, "RAM error"),
    (64, "EEPROM error"),
    (128, "Key error"),
    (4096, "Syntax error"),
    (8192, "Inadmissible parameter"),
    (16384, "No hardware"),
    (32768, "Fatal error"),
];

/// Gauge error codes (manual p. 97).
pub const GAUGE_ERRORS: &[(u32, &str)] = &[
    (0, "No error"),
    (1, "Sensor 1: Measurement error"),
    (2, "Sensor 2: Measurement error"),
    (4, "Sensor 3: Measurement error"),
    (8, "Sensor 4: Measurement error"),
    (16, "Sensor 5: Measurement error"),
    (32, "Sensor 6: Measurement error"),
    (512, "Sensor 1: Identification error"),
    (1024, "Sensor 2: Identification error"),
    (2048, "Sensor 3: Identification error"),
    (4096, "Sensor 4: Identification error"),
    (8192, "Sensor 5: Identification error"),
    (16384, "Sensor 6: Identification error"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorTable {
    System,
    Gauge,
}

impl ErrorTable {
    fn entries(self) -> &'static [(u32, &'static str)] {
        match self {
            ErrorTable::System => SYSTEM_ERRORS,
            ErrorTable::Gauge => GAUGE_ERRORS,
        }
    }

    pub fn lookup(self, code: u32) -> Option<&'static str> {
        self.entries()
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, message)| *message)
    }

    /// Like [`lookup`](Self::lookup), but an absent code is an error.
    pub fn describe(self, code: u32) -> Result<&'static str> {
        self.lookup(code)
            .ok_or(SerialError::UnknownErrorCode { table: self, code })
    }
}

impl fmt::Display for ErrorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorTable::System => write!(f, "system"),
            ErrorTable::Gauge => write!(f, "gauge"),
        }
    }
}

/// Decoded `"<system>,<gauge>"` error pair, as sent after a NAK or in reply to `ERR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub system_code: u32,
    pub system: String,
    pub gauge_code: u32,
    pub gauge: String,
}

impl ErrorReport {
    pub fn parse(payload: &str) -> Result<Self> {
        let (system, gauge) = payload
            .split_once(',')
            .ok_or_else(|| SerialError::ProtocolError(format!("Invalid error payload: {:?}", payload)))?;

        let system_code = parse_code(system, payload)?;
        let gauge_code = parse_code(gauge, payload)?;

        Ok(Self {
            system_code,
            system: ErrorTable::System.describe(system_code)?.to_string(),
            gauge_code,
            gauge: ErrorTable::Gauge.describe(gauge_code)?.to_string(),
        })
    }

    pub fn is_clear(&self) -> bool {
        self.system_code == 0 && self.gauge_code == 0
    }
}

fn parse_code(field: &str, payload: &str) -> Result<u32> {
    field
        .trim()
        .parse()
        .map_err(|_| SerialError::ProtocolError(format!("Invalid error code in payload: {:?}", payload)))
}

/// Status digit that precedes every pressure value (manual p. 88).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PressureStatus {
    Ok = 0,
    Underrange = 1,
    Overrange = 2,
    SensorError = 3,
    SensorOff = 4,
    NoSensor = 5,
    IdentificationError = 6,
}

impl PressureStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PressureStatus::Ok),
            1 => Some(PressureStatus::Underrange),
            2 => Some(PressureStatus::Overrange),
            3 => Some(PressureStatus::SensorError),
            4 => Some(PressureStatus::SensorOff),
            5 => Some(PressureStatus::NoSensor),
            6 => Some(PressureStatus::IdentificationError),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn message(self) -> &'static str {
        match self {
            PressureStatus::Ok => "Measurement data okay",
            PressureStatus::Underrange => "Underrange",
            PressureStatus::Overrange => "Overrange",
            PressureStatus::SensorError => "Sensor error",
            PressureStatus::SensorOff => "Sensor off",
            PressureStatus::NoSensor => "No sensor",
            PressureStatus::IdentificationError => "Identification error",
        }
    }

    /// Only okay, underrange and overrange readings carry a usable pressure.
    pub fn has_reading(self) -> bool {
        matches!(
            self,
            PressureStatus::Ok | PressureStatus::Underrange | PressureStatus::Overrange
        )
    }
}

impl fmt::Display for PressureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_key_lookup() {
        assert_eq!(ErrorTable::System.lookup(4096), Some("Syntax error"));
        assert_eq!(ErrorTable::Gauge.lookup(512), Some("Sensor 1: Identification error"));
        // 3 = 1 | 2 is not decomposed into watchdog + task fail
        assert_eq!(ErrorTable::System.lookup(3), None);
    }

    #[test]
    fn test_parse_nak_payload() {
        let report = ErrorReport::parse("4096,0").unwrap();
        assert_eq!(report.system, "Syntax error");
        assert_eq!(report.gauge, "No error");
        assert!(!report.is_clear());

        let clear = ErrorReport::parse("0, 0").unwrap();
        assert!(clear.is_clear());
    }

    #[test]
    fn test_unknown_code_is_error() {
        let result = ErrorReport::parse("0,64");
        assert!(matches!(
            result,
            Err(SerialError::UnknownErrorCode { table: ErrorTable::Gauge, code: 64 })
        ));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(ErrorReport::parse("4096"), Err(SerialError::ProtocolError(_))));
        assert!(matches!(ErrorReport::parse("abc,0"), Err(SerialError::ProtocolError(_))));
    }

    #[test]
    fn test_pressure_status() {
        assert_eq!(PressureStatus::from_code(0), Some(PressureStatus::Ok));
        assert_eq!(PressureStatus::from_code(7), None);
        assert_eq!(PressureStatus::Ok.message(), "Measurement data okay");
        assert!(PressureStatus::Overrange.has_reading());
        assert!(!PressureStatus::SensorOff.has_reading());
        assert_eq!(PressureStatus::IdentificationError.code(), 6);
    }
}
