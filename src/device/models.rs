use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeviceError, Result, SENSOR_COUNT};

// Re-export the status enum alongside the reading that carries it
pub use crate::serial::codes::PressureStatus;

/// One gauge reading as returned by `PRx`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureReading {
    sensor_id: u8,
    status: PressureStatus,
    /// mbar
    pressure: f64,
}

impl PressureReading {
    pub fn new(sensor_id: u8, status: u8, pressure: f64) -> Result<Self> {
        if !(1..=SENSOR_COUNT as u8).contains(&sensor_id) {
            return Err(DeviceError::Validation(format!(
                "Pressure gauge id must be between 1 and {}, got {}",
                SENSOR_COUNT, sensor_id
            )));
        }
        let status = PressureStatus::from_code(status).ok_or_else(|| {
            DeviceError::Validation(format!(
                "Pressure status must be between 0 and 6, got {}",
                status
            ))
        })?;
        Ok(Self {
            sensor_id,
            status,
            pressure,
        })
    }

    pub fn sensor_id(&self) -> u8 {
        self.sensor_id
    }

    pub fn status(&self) -> PressureStatus {
        self.status
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn status_message(&self) -> &'static str {
        self.status.message()
    }

    /// The pressure, if the status says it is meaningful.
    pub fn value(&self) -> Option<f64> {
        self.status.has_reading().then_some(self.pressure)
    }
}

impl fmt::Display for PressureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gauge #{}: Status {} ({}), Pressure: {:.6} mbar",
            self.sensor_id,
            self.status.code(),
            self.status.message(),
            self.pressure
        )
    }
}

/// The six most recent readings, all taken in the same poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSnapshot {
    /// Indexed by sensor id - 1. `None` until the first successful poll.
    pub readings: Vec<Option<PressureReading>>,
    pub captured_at: Option<DateTime<Utc>>,
    /// Poll generation, 0 for the initial empty snapshot.
    pub seq: u64,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self {
            readings: vec![None; SENSOR_COUNT],
            captured_at: None,
            seq: 0,
        }
    }

    pub fn new(readings: Vec<PressureReading>, captured_at: DateTime<Utc>, seq: u64) -> Self {
        Self {
            readings: readings.into_iter().map(Some).collect(),
            captured_at: Some(captured_at),
            seq,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.captured_at.is_none()
    }

    /// Usable pressures keyed `"gauge N"`, the shape served to dashboards.
    pub fn gauge_map(&self) -> BTreeMap<String, f64> {
        self.readings
            .iter()
            .flatten()
            .filter_map(|r| r.value().map(|v| (format!("gauge {}", r.sensor_id()), v)))
            .collect()
    }
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_validation() {
        assert!(PressureReading::new(1, 0, 1e-6).is_ok());
        assert!(matches!(PressureReading::new(0, 0, 1e-6), Err(DeviceError::Validation(_))));
        assert!(matches!(PressureReading::new(7, 0, 1e-6), Err(DeviceError::Validation(_))));
        assert!(matches!(PressureReading::new(3, 7, 1e-6), Err(DeviceError::Validation(_))));
    }

    #[test]
    fn test_reading_value_by_status() {
        let ok = PressureReading::new(1, 1, 2.5e-3).unwrap();
        assert_eq!(ok.value(), Some(2.5e-3));
        let off = PressureReading::new(2, 4, 2.5e-3).unwrap();
        assert_eq!(off.value(), None);
        assert_eq!(off.status_message(), "Sensor off");
    }

    #[test]
    fn test_reading_display() {
        let reading = PressureReading::new(1, 0, 1.5).unwrap();
        assert_eq!(
            reading.to_string(),
            "Gauge #1: Status 0 (Measurement data okay), Pressure: 1.500000 mbar"
        );
    }

    #[test]
    fn test_gauge_map_skips_unusable() {
        let readings = vec![
            PressureReading::new(1, 0, 1e-6).unwrap(),
            PressureReading::new(2, 5, 0.0).unwrap(),
            PressureReading::new(3, 2, 1e3).unwrap(),
        ];
        let snapshot = CacheSnapshot::new(readings, Utc::now(), 1);
        let map = snapshot.gauge_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("gauge 1"), Some(&1e-6));
        assert_eq!(map.get("gauge 3"), Some(&1e3));
        assert!(!snapshot.is_stale());
        assert!(CacheSnapshot::empty().is_stale());
    }
}
