use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{Result, SerialError, SerialPortInfo, LINE_TERMINATION};

/// Byte-level access to the physical link.
///
/// Implemented by the native serial port and by [`MockPort`](super::mock::MockPort),
/// so everything above this trait can be driven without hardware.
#[async_trait]
pub trait SerialPortIO: Send {
    async fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever is available, waiting at most `wait`.
    /// Returns [`SerialError::Timeout`] when nothing arrived in time.
    async fn read_data(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize>;

    /// Discard bytes received but not yet read.
    async fn clear_input(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDirection {
    Write,
    Read,
}

impl fmt::Display for WireDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireDirection::Write => write!(f, ">>"),
            WireDirection::Read => write!(f, "<<"),
        }
    }
}

/// Observer for every chunk written to or read from the port.
pub type WireTap = Arc<dyn Fn(WireDirection, &[u8]) + Send + Sync>;

/// Wire tap that mirrors traffic to the `maxigauge::wire` log target at trace level.
pub fn log_wire_tap() -> WireTap {
    Arc::new(|direction, data| {
        log::trace!(target: "maxigauge::wire", "{} {}", direction, data.escape_ascii());
    })
}

struct NativePort {
    stream: SerialStream,
}

#[async_trait]
impl SerialPortIO for NativePort {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_data(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize> {
        match timeout(wait, self.stream.read(buf)).await {
            Err(_) => Err(SerialError::Timeout),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Err(SerialError::Timeout),
            Ok(Err(e)) => Err(SerialError::IoError(e)),
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.stream.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Line-oriented access to one controller. Owns the port exclusively;
/// dropping the interface releases it.
pub struct SerialInterface {
    io: Option<Box<dyn SerialPortIO>>,
    info: SerialPortInfo,
    wire_tap: Option<WireTap>,
}

impl SerialInterface {
    /// Open a serial port. Must be called from within a tokio runtime.
    pub fn open(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let stream = tokio_serial::new(port_name, baud_rate)
            .timeout(read_timeout)
            .open_native_async()
            .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", port_name, e)))?;

        log::info!("Opened {} at {} baud", port_name, baud_rate);

        Ok(Self {
            io: Some(Box::new(NativePort { stream })),
            info: SerialPortInfo {
                port_name: port_name.to_string(),
                baud_rate,
                timeout_ms: read_timeout.as_millis() as u64,
            },
            wire_tap: None,
        })
    }

    /// Wrap an arbitrary byte transport, e.g. a simulated controller.
    pub fn from_io(io: Box<dyn SerialPortIO>, read_timeout: Duration) -> Self {
        Self {
            io: Some(io),
            info: SerialPortInfo {
                port_name: "<virtual>".to_string(),
                baud_rate: super::DEFAULT_BAUD_RATE,
                timeout_ms: read_timeout.as_millis() as u64,
            },
            wire_tap: None,
        }
    }

    pub fn with_wire_tap(mut self, tap: WireTap) -> Self {
        self.wire_tap = Some(tap);
        self
    }

    pub fn set_wire_tap(&mut self, tap: Option<WireTap>) {
        self.wire_tap = tap;
    }

    pub fn is_connected(&self) -> bool {
        self.io.is_some()
    }

    pub fn port_info(&self) -> &SerialPortInfo {
        &self.info
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.info.timeout_ms)
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPortIO>> {
        self.io.as_mut().ok_or(SerialError::NotConnected)
    }

    fn tap(&self, direction: WireDirection, data: &[u8]) {
        if let Some(tap) = &self.wire_tap {
            tap(direction, data);
        }
    }

    /// Write raw bytes, no terminator appended.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.tap(WireDirection::Write, data);
        self.port()?.send_data(data).await
    }

    /// Write `line` followed by CR LF.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + LINE_TERMINATION.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(LINE_TERMINATION);
        self.send_data(&data).await
    }

    /// Read up to and including the next CR LF.
    ///
    /// When the read timeout elapses first, the bytes gathered so far are
    /// returned as they are (possibly none).
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.read_timeout();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.port()?.read_data(&mut byte, remaining).await {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if line.ends_with(LINE_TERMINATION) {
                        break;
                    }
                }
                Err(SerialError::Timeout) => break,
                Err(e) => return Err(e),
            }
        }

        if !line.ends_with(LINE_TERMINATION) {
            log::debug!(
                "Read timed out on {} after {} bytes",
                self.info.port_name,
                line.len()
            );
        }
        self.tap(WireDirection::Read, &line);
        Ok(line)
    }

    /// Drop any unread input before a new command cycle.
    pub async fn flush_input(&mut self) -> Result<()> {
        self.port()?.clear_input().await
    }

    /// Release the port. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if self.io.take().is_some() {
            log::info!("Closed {}", self.info.port_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::{MockPort, Reply};
    use std::sync::Mutex;

    fn interface(port: &MockPort) -> SerialInterface {
        SerialInterface::from_io(Box::new(port.clone()), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_read_line_keeps_terminator() {
        let port = MockPort::new();
        port.set_reply("DCC", Reply::value("10"));
        let mut iface = interface(&port);

        iface.write_line("DCC").await.unwrap();
        assert_eq!(iface.read_line().await.unwrap(), b"\x06\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_read_line_returns_partial_on_timeout() {
        let port = MockPort::new();
        let mut iface = interface(&port);
        assert!(iface.read_line().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let port = MockPort::new();
        let mut iface = interface(&port);
        iface.close();
        iface.close();
        assert!(!iface.is_connected());
        assert!(matches!(iface.write_line("DCC").await, Err(SerialError::NotConnected)));
    }

    #[tokio::test]
    async fn test_wire_tap_sees_both_directions() {
        let seen: Arc<Mutex<Vec<(WireDirection, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let port = MockPort::new();
        port.set_reply("TKB", Reply::value("0"));
        let mut iface = interface(&port).with_wire_tap(Arc::new(move |dir, data| {
            sink.lock().unwrap().push((dir, data.to_vec()));
        }));

        iface.write_line("TKB").await.unwrap();
        iface.read_line().await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (WireDirection::Write, b"TKB\r\n".to_vec()));
        assert_eq!(seen[1].0, WireDirection::Read);
    }
}
