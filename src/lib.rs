//! Client library for Pfeiffer Vacuum MaxiGauge TPG 256 A controllers.
//!
//! Layers, bottom up: [`serial`] moves lines over the RS-232 link and runs
//! the ENQ/ACK command cycle, [`device`] decodes gauge values and owns the
//! connection, [`monitor`] keeps a background-refreshed snapshot of all six
//! gauges, and [`datalog`] writes and downsamples the measurement log.

pub mod config;
pub mod datalog;
pub mod device;
pub mod monitor;
pub mod serial;

pub use config::Settings;
pub use device::{CacheSnapshot, DeviceError, Gauge, MaxiGauge, PressureReading, PressureStatus};
pub use monitor::PressureCache;
pub use serial::SerialError;
