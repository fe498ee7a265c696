use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::{CacheSnapshot, DeviceError, Gauge, PressureReading, Result};
use crate::config::Settings;
use crate::datalog::PressureLog;
use crate::monitor::PressureCache;
use crate::serial::codes::ErrorReport;
use crate::serial::{log_wire_tap, GaugeProtocol, SerialInterface};

/// A connected MaxiGauge controller.
///
/// Owns the connection and, while continuous updates run, the pressure
/// cache that polls it in the background.
pub struct MaxiGauge {
    gauge: Gauge,
    cache: Mutex<Option<Arc<PressureCache>>>,
}

impl MaxiGauge {
    /// Open the controller on `port_name`.
    pub fn connect(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let interface = SerialInterface::open(port_name, baud_rate, read_timeout)?;
        log::info!("Connected to MaxiGauge on {} at {} baud", port_name, baud_rate);
        Ok(Self::from_interface(interface))
    }

    pub fn connect_with_settings(settings: &Settings) -> Result<Self> {
        let mut interface =
            SerialInterface::open(&settings.serial_port, settings.baud_rate, settings.timeout())?;
        if settings.trace_wire {
            interface.set_wire_tap(Some(log_wire_tap()));
        }
        log::info!(
            "Connected to MaxiGauge on {} at {} baud",
            settings.serial_port,
            settings.baud_rate
        );
        Ok(Self::from_interface(interface))
    }

    /// Wrap an already opened interface.
    pub fn from_interface(interface: SerialInterface) -> Self {
        Self {
            gauge: Gauge::new(GaugeProtocol::new(interface)),
            cache: Mutex::new(None),
        }
    }

    pub fn gauge(&self) -> &Gauge {
        &self.gauge
    }

    pub async fn pressure(&self, sensor_id: u8) -> Result<PressureReading> {
        self.gauge.pressure(sensor_id).await
    }

    pub async fn pressures(&self) -> Result<Vec<PressureReading>> {
        self.gauge.pressures().await
    }

    pub async fn display_contrast(&self, new_value: Option<i32>) -> Result<i32> {
        self.gauge.display_contrast(new_value).await
    }

    pub async fn pressed_keys(&self) -> Result<Vec<u8>> {
        self.gauge.pressed_keys().await
    }

    pub async fn check_device(&self) -> Result<String> {
        self.gauge.check_device().await
    }

    pub async fn error_status(&self) -> Result<ErrorReport> {
        self.gauge.error_status().await
    }

    /// Start polling all gauges every `interval`, optionally appending each
    /// snapshot to `logfile`.
    pub async fn start_continuous_updates(
        &self,
        interval: Duration,
        retention: usize,
        logfile: Option<&Path>,
    ) -> Result<Arc<PressureCache>> {
        let mut slot = self.cache.lock().await;
        if slot.is_some() {
            return Err(DeviceError::AlreadyMonitoring);
        }

        let log = match logfile {
            Some(path) => Some(PressureLog::open(path).await?),
            None => None,
        };
        let cache = Arc::new(PressureCache::new(self.gauge.clone(), retention, log));
        cache.start(interval).await?;
        *slot = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// The running cache, if continuous updates were started.
    pub async fn cache(&self) -> Option<Arc<PressureCache>> {
        self.cache.lock().await.clone()
    }

    /// Latest snapshot; empty when continuous updates are not running.
    pub async fn cached_pressures(&self) -> Arc<CacheSnapshot> {
        match self.cache().await {
            Some(cache) => cache.cached_pressures(),
            None => Arc::new(CacheSnapshot::empty()),
        }
    }

    pub async fn flush_log(&self) -> Result<()> {
        match self.cache().await {
            Some(cache) => cache.flush_log().await,
            None => Ok(()),
        }
    }

    pub async fn stop_continuous_updates(&self) -> Result<()> {
        let cache = self.cache.lock().await.take();
        if let Some(cache) = cache {
            cache.stop().await;
            cache.flush_log().await?;
        }
        Ok(())
    }

    /// Stop the cache and release the serial port. Safe to call repeatedly.
    pub async fn disconnect(&self) -> Result<()> {
        let stopped = self.stop_continuous_updates().await;
        if self.gauge.is_connected().await {
            self.gauge.close().await;
            log::info!("Disconnected from MaxiGauge");
        }
        stopped
    }
}
