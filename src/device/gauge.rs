use std::sync::Arc;

use tokio::sync::Mutex;

use super::{DeviceError, PressureReading, Result, SENSOR_COUNT};
use crate::serial::codes::ErrorReport;
use crate::serial::mnemonic::{Command, DCC, ERR, PRX, TKB};
use crate::serial::GaugeProtocol;

/// Number of front panel keys reported by `TKB`.
const KEY_COUNT: u32 = 5;

/// High-level operations of the controller.
///
/// Cloning is cheap; clones share one connection and every command cycle
/// holds the connection lock until its last enquiry has been answered.
#[derive(Clone)]
pub struct Gauge {
    protocol: Arc<Mutex<GaugeProtocol>>,
}

impl Gauge {
    pub fn new(protocol: GaugeProtocol) -> Self {
        Self {
            protocol: Arc::new(Mutex::new(protocol)),
        }
    }

    /// Run any table command and return its raw enquiry responses.
    pub async fn query(&self, command: &Command) -> Result<Vec<String>> {
        let mut protocol = self.protocol.lock().await;
        Ok(protocol.execute(command).await?)
    }

    async fn query_single(&self, command: &Command) -> Result<String> {
        self.query(command)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| malformed(command, ""))
    }

    /// Read one gauge. `sensor_id` is checked before anything is sent.
    pub async fn pressure(&self, sensor_id: u8) -> Result<PressureReading> {
        if !(1..=SENSOR_COUNT as u8).contains(&sensor_id) {
            return Err(DeviceError::Validation(format!(
                "Sensor can only be between 1 and {}. You chose {}",
                SENSOR_COUNT, sensor_id
            )));
        }
        let command = Command::for_channel(&PRX, sensor_id);
        let raw = self.query_single(&command).await?;
        parse_pressure(sensor_id, &raw)
    }

    /// Read all six gauges in order. Any failure fails the whole read.
    pub async fn pressures(&self) -> Result<Vec<PressureReading>> {
        let mut readings = Vec::with_capacity(SENSOR_COUNT);
        for sensor_id in 1..=SENSOR_COUNT as u8 {
            readings.push(self.pressure(sensor_id).await?);
        }
        Ok(readings)
    }

    /// Read the display contrast, or set it and return the echoed value.
    ///
    /// The documented range is 0..=20; values are passed to the controller
    /// unchecked and out-of-range values are refused by the controller.
    pub async fn display_contrast(&self, new_value: Option<i32>) -> Result<i32> {
        let command = match new_value {
            Some(value) => Command::new(&DCC).with_param(value),
            None => Command::new(&DCC),
        };
        let raw = self.query_single(&command).await?;
        raw.trim().parse().map_err(|_| malformed(&command, &raw))
    }

    /// Keys pressed since the controller was switched on, ascending.
    pub async fn pressed_keys(&self) -> Result<Vec<u8>> {
        let command = Command::new(&TKB);
        let raw = self.query_single(&command).await?;
        let mask: u32 = raw.trim().parse().map_err(|_| malformed(&command, &raw))?;
        Ok(decode_pressed_keys(mask))
    }

    /// Human-readable summary of contrast and key state.
    pub async fn check_device(&self) -> Result<String> {
        let contrast = self.display_contrast(None).await?;
        let keys = self.pressed_keys().await?;
        let keys: Vec<String> = keys.iter().map(u8::to_string).collect();
        Ok(format!(
            "The Display Contrast is currently set to {} (out of 20).\n\
             Keys since MaxiGauge was switched on: {} (out of 1,2,3,4,5).\n",
            contrast,
            keys.join(", ")
        ))
    }

    /// Current error status of controller and gauges.
    pub async fn error_status(&self) -> Result<ErrorReport> {
        let raw = self.query_single(&Command::new(&ERR)).await?;
        Ok(ErrorReport::parse(&raw)?)
    }

    pub async fn anomaly_count(&self) -> u64 {
        self.protocol.lock().await.anomaly_count()
    }

    pub async fn is_connected(&self) -> bool {
        self.protocol.lock().await.interface().is_connected()
    }

    /// Release the serial port. Waits for a running command cycle to finish.
    pub async fn close(&self) {
        self.protocol.lock().await.interface_mut().close();
    }
}

fn malformed(command: &Command, raw: &str) -> DeviceError {
    DeviceError::MalformedResponse {
        command: command.encode(),
        response: raw.to_string(),
    }
}

/// Decode a `PRx` payload of the form `"<status>,<pressure>"`.
pub fn parse_pressure(sensor_id: u8, raw: &str) -> Result<PressureReading> {
    let invalid = || DeviceError::MalformedResponse {
        command: format!("PR{}", sensor_id),
        response: raw.to_string(),
    };
    // status is the first field, pressure the last
    let (status, _) = raw.split_once(',').ok_or_else(invalid)?;
    let (_, pressure) = raw.rsplit_once(',').ok_or_else(invalid)?;
    let status: u8 = status.trim().parse().map_err(|_| invalid())?;
    let pressure: f64 = pressure.trim().parse().map_err(|_| invalid())?;
    PressureReading::new(sensor_id, status, pressure)
}

/// Decode the `TKB` key mask: bit `n` set means key `n + 1` was pressed.
pub fn decode_pressed_keys(mask: u32) -> Vec<u8> {
    let mut keys: Vec<u8> = (0..KEY_COUNT)
        .rev()
        .filter(|&bit| mask & (1 << bit) != 0)
        .map(|bit| bit as u8 + 1)
        .collect();
    keys.reverse();
    keys
}
