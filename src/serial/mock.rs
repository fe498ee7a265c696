//! Simulated controller for tests and dry runs.
//!
//! A [`MockPort`] answers command lines with a handshake and every ENQ with the
//! payload of the last acknowledged command, the way the real controller does.
//! Handles are cheap clones sharing one state, so a test can keep a handle,
//! hand another to [`SerialInterface::from_io`](super::SerialInterface::from_io)
//! and change replies while the device is in use.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::control::{ACQ, ENQ, NAK};
use super::{Result, SerialError, SerialPortIO, LINE_TERMINATION};

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// ACQ, then the payload on enquiry.
    Value(String),
    /// NAK, then `"<system>,<gauge>"` on enquiry.
    Nak { system: u32, gauge: u32 },
    /// Only a line terminator where the handshake belongs, then the payload.
    MissingHandshake(String),
    /// An arbitrary handshake byte, then the payload.
    Handshake(u8, String),
    /// No answer at all.
    Silent,
    /// The write itself fails.
    IoFailure,
}

impl Reply {
    pub fn value(payload: impl Into<String>) -> Self {
        Reply::Value(payload.into())
    }
}

#[derive(Default)]
struct MockState {
    replies: HashMap<String, Reply>,
    rx: VecDeque<u8>,
    partial: Vec<u8>,
    pending: Option<String>,
    writes: Vec<Vec<u8>>,
    commands: Vec<String>,
    enquiries: usize,
}

impl MockState {
    fn push_line(&mut self, line: &[u8]) {
        self.rx.extend(line);
        self.rx.extend(LINE_TERMINATION);
    }

    fn handle_command(&mut self, command: String) -> Result<()> {
        let reply = self
            .replies
            .get(&command)
            .cloned()
            .unwrap_or(Reply::Nak { system: 4096, gauge: 0 });
        self.commands.push(command);

        match reply {
            Reply::Value(payload) => {
                self.push_line(&[ACQ]);
                self.pending = Some(payload);
            }
            Reply::Nak { system, gauge } => {
                self.push_line(&[NAK]);
                self.pending = Some(format!("{},{}", system, gauge));
            }
            Reply::MissingHandshake(payload) => {
                self.push_line(&[]);
                self.pending = Some(payload);
            }
            Reply::Handshake(byte, payload) => {
                self.push_line(&[byte]);
                self.pending = Some(payload);
            }
            Reply::Silent => self.pending = None,
            Reply::IoFailure => {
                self.pending = None;
                return Err(SerialError::IoError(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated link failure",
                )));
            }
        }
        Ok(())
    }

    fn receive(&mut self, data: &[u8]) -> Result<()> {
        self.writes.push(data.to_vec());
        for &byte in data {
            if byte == ENQ && self.partial.is_empty() {
                self.enquiries += 1;
                if let Some(payload) = self.pending.clone() {
                    self.push_line(payload.as_bytes());
                }
                continue;
            }
            self.partial.push(byte);
            if self.partial.ends_with(LINE_TERMINATION) {
                let end = self.partial.len() - LINE_TERMINATION.len();
                let command = String::from_utf8_lossy(&self.partial[..end]).into_owned();
                self.partial.clear();
                self.handle_command(command)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the reply for an exact command line (without terminator).
    /// Commands without a reply are rejected with a syntax error NAK.
    pub fn set_reply(&self, command: &str, reply: Reply) {
        self.state().replies.insert(command.to_string(), reply);
    }

    /// Shorthand for a `PRx` reply of `"<status>,<pressure>"`.
    pub fn set_pressure(&self, sensor: u8, status: u8, pressure: &str) {
        self.set_reply(
            &format!("PR{}", sensor),
            Reply::Value(format!("{},{}", status, pressure)),
        );
    }

    /// Every chunk written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Command lines received so far, enquiries excluded.
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn enquiries(&self) -> usize {
        self.state().enquiries
    }

    pub fn clear_history(&self) {
        let mut state = self.state();
        state.writes.clear();
        state.commands.clear();
        state.enquiries = 0;
    }

    /// Queue bytes as if the controller had sent them unprompted.
    pub fn inject(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes);
    }
}

#[async_trait]
impl SerialPortIO for MockPort {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.state().receive(data)
    }

    async fn read_data(&mut self, buf: &mut [u8], _wait: Duration) -> Result<usize> {
        let mut state = self.state();
        if state.rx.is_empty() {
            return Err(SerialError::Timeout);
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.state().rx.clear();
        Ok(())
    }
}
