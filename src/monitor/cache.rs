use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

use super::STOP_TIMEOUT;
use crate::datalog::PressureLog;
use crate::device::{CacheSnapshot, DeviceError, Gauge, Result};

/// Most recent readings of all six gauges, refreshed in the background.
///
/// Readers get the last complete snapshot without touching the serial
/// port. A failed poll cycle leaves the previous snapshot in place.
pub struct PressureCache {
    inner: Arc<CacheInner>,
    session: Mutex<Option<PollingSession>>,
}

struct CacheInner {
    gauge: Gauge,
    snapshot_tx: watch::Sender<Arc<CacheSnapshot>>,
    history: std::sync::Mutex<VecDeque<Arc<CacheSnapshot>>>,
    retention: usize,
    log: Option<Mutex<PressureLog>>,
    seq: AtomicU64,
    skipped: AtomicU64,
}

/// Running poll loop
struct PollingSession {
    task_handle: JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl PressureCache {
    /// Create an idle cache. `retention` successful snapshots are kept in memory.
    pub fn new(gauge: Gauge, retention: usize, log: Option<PressureLog>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(CacheSnapshot::empty()));
        Self {
            inner: Arc::new(CacheInner {
                gauge,
                snapshot_tx,
                history: std::sync::Mutex::new(VecDeque::with_capacity(retention)),
                retention,
                log: log.map(Mutex::new),
                seq: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            }),
            session: Mutex::new(None),
        }
    }

    /// Spawn the poll loop. The first cycle runs immediately.
    pub async fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(DeviceError::Validation(
                "Update interval must be positive".to_string(),
            ));
        }

        let mut session = self.session.lock().await;
        if session.is_some() {
            log::warn!("Attempted to start continuous updates twice");
            return Err(DeviceError::AlreadyMonitoring);
        }

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let inner = Arc::clone(&self.inner);
        let task_handle = tokio::spawn(async move {
            Self::polling_loop(inner, interval, stop_rx).await;
        });

        *session = Some(PollingSession {
            task_handle,
            stop_tx,
        });
        Ok(())
    }

    async fn polling_loop(
        inner: Arc<CacheInner>,
        interval: Duration,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        log::info!("Starting continuous pressure updates every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // A dropped sender stops the loop as well
                _ = stop_rx.recv() => {
                    log::info!("Received stop signal for continuous updates");
                    break;
                }
                _ = ticker.tick() => {
                    match inner.poll().await {
                        Ok(snapshot) => log::debug!("Pressure snapshot #{} published", snapshot.seq),
                        Err(e) => {
                            inner.skipped.fetch_add(1, Ordering::Relaxed);
                            log::warn!("Skipping pressure update: {}", e);
                        }
                    }
                }
            }
        }
        log::info!("Continuous pressure updates stopped");
    }

    /// Run one poll cycle in the caller's task.
    pub async fn poll_once(&self) -> Result<Arc<CacheSnapshot>> {
        self.inner.poll().await
    }

    /// The last complete snapshot; empty until the first successful poll.
    pub fn cached_pressures(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.inner.snapshot_tx.borrow())
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Retained snapshots, oldest first.
    pub fn history(&self) -> Vec<Arc<CacheSnapshot>> {
        self.inner.history_guard().iter().cloned().collect()
    }

    /// Poll cycles that failed and left the snapshot unchanged.
    pub fn skipped_cycles(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Push buffered log rows to disk. No-op without a log file.
    pub async fn flush_log(&self) -> Result<()> {
        if let Some(log) = &self.inner.log {
            log.lock().await.flush().await?;
        }
        Ok(())
    }

    /// Stop the poll loop. Safe to call when not running.
    pub async fn stop(&self) {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            return;
        };

        let _ = session.stop_tx.send(()).await;
        let mut task_handle = session.task_handle;
        if timeout(STOP_TIMEOUT, &mut task_handle).await.is_err() {
            log::warn!("Poll loop did not stop within {:?}, aborting", STOP_TIMEOUT);
            task_handle.abort();
        }
    }
}

impl Drop for PressureCache {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.task_handle.abort();
        }
    }
}

impl CacheInner {
    async fn poll(&self) -> Result<Arc<CacheSnapshot>> {
        let readings = self.gauge.pressures().await?;

        // seq, publication and history share one critical section
        let snapshot = {
            let mut history = self.history_guard();
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let snapshot = Arc::new(CacheSnapshot::new(readings, Utc::now(), seq));
            self.snapshot_tx.send_replace(Arc::clone(&snapshot));
            if self.retention > 0 {
                while history.len() >= self.retention {
                    history.pop_front();
                }
                history.push_back(Arc::clone(&snapshot));
            }
            snapshot
        };

        if let Some(log) = &self.log {
            log.lock().await.append(&snapshot).await?;
        }
        Ok(snapshot)
    }

    fn history_guard(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<CacheSnapshot>>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
