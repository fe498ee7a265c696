use std::fmt;

use super::codes::ErrorReport;
use super::control::{ACQ, ENQ, NAK};
use super::mnemonic::Command;
use super::{Result, SerialError, SerialInterface, LINE_TERMINATION};

/// Deviations from the documented handshake that the controller is known to
/// produce. They are reported and then treated as an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolAnomaly {
    /// Only a line terminator arrived where ACQ or NAK was expected.
    /// Seen on parameter-setting commands such as `DCC,<n>`.
    MissingHandshake,
    /// A byte other than ACQ or NAK preceded the terminator.
    UnexpectedHandshake(u8),
}

impl fmt::Display for ProtocolAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolAnomaly::MissingHandshake => {
                write!(f, "only received a line termination, expected ACQ or NAK")
            }
            ProtocolAnomaly::UnexpectedHandshake(byte) => {
                write!(f, "expected ACQ or NAK, received 0x{:02X}", byte)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Ack,
    Nak,
    Anomalous(ProtocolAnomaly),
}

impl Handshake {
    /// Classify the first line returned after a command.
    pub fn classify(line: &[u8]) -> Self {
        if line.len() < LINE_TERMINATION.len() + 1 {
            return Handshake::Anomalous(ProtocolAnomaly::MissingHandshake);
        }
        let body = line.strip_suffix(LINE_TERMINATION).unwrap_or(line);
        match body.last() {
            Some(&NAK) => Handshake::Nak,
            Some(&ACQ) => Handshake::Ack,
            Some(&other) => Handshake::Anomalous(ProtocolAnomaly::UnexpectedHandshake(other)),
            None => Handshake::Anomalous(ProtocolAnomaly::MissingHandshake),
        }
    }
}

/// Half-duplex command cycle of the controller:
/// command line, ACQ/NAK handshake, then one ENQ per expected value.
///
/// A cycle borrows the protocol mutably from start to finish, so sharing it
/// behind a mutex keeps exchanges from interleaving.
pub struct GaugeProtocol {
    interface: SerialInterface,
    anomalies: u64,
}

impl GaugeProtocol {
    pub fn new(interface: SerialInterface) -> Self {
        Self {
            interface,
            anomalies: 0,
        }
    }

    /// Run one command cycle and return the raw enquiry responses.
    pub async fn execute(&mut self, command: &Command) -> Result<Vec<String>> {
        self.send(&command.encode(), command.enquiries()).await
    }

    /// Send `line` and collect `enquiries` responses, terminators stripped.
    pub async fn send(&mut self, line: &str, enquiries: usize) -> Result<Vec<String>> {
        self.interface.flush_input().await?;
        self.interface.write_line(line).await?;

        match self.await_handshake().await? {
            Handshake::Nak => return Err(self.query_error().await),
            Handshake::Anomalous(anomaly) => {
                self.anomalies += 1;
                log::warn!("Protocol anomaly after '{}': {}", line, anomaly);
            }
            Handshake::Ack => {}
        }

        let mut response = Vec::with_capacity(enquiries);
        for _ in 0..enquiries {
            response.push(self.enquire().await?);
        }
        log::debug!("{} -> {:?}", line, response);
        Ok(response)
    }

    async fn await_handshake(&mut self) -> Result<Handshake> {
        let line = self.interface.read_line().await?;
        Ok(Handshake::classify(&line))
    }

    async fn enquire(&mut self) -> Result<String> {
        self.interface.send_data(&[ENQ]).await?;
        self.read_text().await
    }

    async fn read_text(&mut self) -> Result<String> {
        let line = self.interface.read_line().await?;
        let body = line.strip_suffix(LINE_TERMINATION).unwrap_or(&line[..]);
        Ok(String::from_utf8_lossy(body).into_owned())
    }

    /// After a NAK, fetch and decode the error pair. Always yields an error.
    async fn query_error(&mut self) -> SerialError {
        let payload = match self.enquire().await {
            Ok(payload) => payload,
            Err(e) => return e,
        };
        match ErrorReport::parse(&payload) {
            Ok(report) => {
                log::warn!("Controller refused command: {} / {}", report.system, report.gauge);
                SerialError::NegativeAcknowledgement(report)
            }
            Err(e) => e,
        }
    }

    /// Handshake anomalies tolerated since the connection was opened.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies
    }

    pub fn interface(&self) -> &SerialInterface {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut SerialInterface {
        &mut self.interface
    }
}
