pub mod gauge;
pub mod manager;
pub mod models;

pub use gauge::Gauge;
pub use manager::MaxiGauge;
pub use models::*;

/// Number of gauge channels on the controller.
pub const SENSOR_COUNT: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Invalid value: {0}")]
    Validation(String),

    #[error("Malformed response to {command}: {response:?}")]
    MalformedResponse { command: String, response: String },

    #[error("Continuous updates already running")]
    AlreadyMonitoring,

    #[error("Serial communication error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
