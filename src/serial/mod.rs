pub mod codes;
pub mod interface;
pub mod mnemonic;
pub mod mock;
pub mod protocol;

pub use codes::{ErrorReport, ErrorTable, PressureStatus};
pub use interface::{log_wire_tap, SerialInterface, SerialPortIO, WireDirection, WireTap};
pub use mnemonic::{Command, Mnemonic, ResponseShape};
pub use protocol::{GaugeProtocol, Handshake, ProtocolAnomaly};

use serde::{Deserialize, Serialize};

/// Control symbols of the controller's serial protocol.
pub mod control {
    /// End of text, resets the interface.
    pub const ETX: u8 = 0x03;
    /// Enquiry, request for data transmission.
    pub const ENQ: u8 = 0x05;
    /// Positive acknowledgement.
    pub const ACQ: u8 = 0x06;
    pub const LF: u8 = 0x0A;
    pub const CR: u8 = 0x0D;
    /// Negative acknowledgement.
    pub const NAK: u8 = 0x15;
    pub const ESC: u8 = 0x1B;
}

/// Every line sent and received ends with CR LF.
pub const LINE_TERMINATION: &[u8] = &[control::CR, control::LF];

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Negative acknowledgement: system error '{}', gauge error '{}'", .0.system, .0.gauge)]
    NegativeAcknowledgement(ErrorReport),

    #[error("Unknown {table} error code: {code}")]
    UnknownErrorCode { table: ErrorTable, code: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
