//! The tracker's transport, and the control loop that drives it.
//!
//! The transport itself (discovery, pairing, characteristic reads) is an
//! external capability behind [`SensorLink`]. [`drive`] owns the
//! scanning/connected cycle and forwards every orientation reading, in
//! delivery order, to the event worker.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::types::Orientation;

/// How long to wait between discovery attempts while scanning.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Sensor transport errors.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The link has no more devices to offer; the control loop ends.
    #[error("sensor link closed")]
    Closed,

    /// Connecting or subscribing to the device failed.
    #[error("failed to connect to {device}: {reason}")]
    Connect { device: String, reason: String },

    /// Reading the current orientation failed.
    #[error("failed to read orientation: {0}")]
    Read(String),

    /// The event worker is gone, so readings have nowhere to go.
    #[error("event worker stopped")]
    WorkerStopped,
}

/// A live subscription to a connected tracker.
#[derive(Debug)]
pub struct SensorConnection {
    /// Orientation read right after connecting.
    pub initial: Orientation,
    /// Orientation change notifications, in delivery order.
    pub orientations: mpsc::Receiver<Orientation>,
    /// Connection status; `false` (or a dropped sender) means disconnected.
    pub connected: watch::Receiver<bool>,
}

/// Device discovery and connection.
#[async_trait]
pub trait SensorLink: Send {
    /// Looks for a device whose name contains `name_filter`.
    ///
    /// `Ok(None)` means nothing was found yet and scanning continues.
    async fn discover(&mut self, name_filter: &str) -> Result<Option<String>, SensorError>;

    /// Connects to a discovered device, reads its current orientation and
    /// subscribes to changes.
    async fn connect(&mut self, device: &str) -> Result<SensorConnection, SensorError>;
}

/// Settings for [`drive`].
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Substring a device name must contain to be picked up.
    pub device_name: String,
    pub scan_interval: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            device_name: "Timeular".to_string(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// Runs the scanning/connected control loop until `shutdown` resolves or the
/// link reports [`SensorError::Closed`].
///
/// Readings are handed to `events` with `send().await`; the worker on the
/// other end serializes their processing.
pub async fn drive<L, S>(
    link: &mut L,
    events: &mpsc::Sender<Orientation>,
    config: &DriveConfig,
    shutdown: S,
) -> Result<(), SensorError>
where
    L: SensorLink + ?Sized,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tracing::info!(filter = %config.device_name, "scanning");
        let device = loop {
            let found = tokio::select! {
                () = &mut shutdown => return Ok(()),
                found = link.discover(&config.device_name) => found,
            };
            match found {
                Ok(Some(device)) => break device,
                Ok(None) => {}
                Err(SensorError::Closed) => {
                    tracing::info!("sensor link closed");
                    return Ok(());
                }
                Err(err) => tracing::warn!(error = %err, "discovery failed"),
            }
            tokio::select! {
                () = &mut shutdown => return Ok(()),
                () = tokio::time::sleep(config.scan_interval) => {}
            }
        };

        tracing::info!(%device, "connecting");
        let connected = tokio::select! {
            () = &mut shutdown => return Ok(()),
            connected = link.connect(&device) => connected,
        };
        let connection = match connected {
            Ok(connection) => connection,
            Err(err) => {
                tracing::warn!(%device, error = %err, "connection failed, scanning again");
                continue;
            }
        };
        let SensorConnection {
            initial,
            mut orientations,
            mut connected,
        } = connection;

        tracing::info!(%device, orientation = %initial, "connected");
        events
            .send(initial)
            .await
            .map_err(|_| SensorError::WorkerStopped)?;

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => return Ok(()),
                reading = orientations.recv() => match reading {
                    Some(orientation) => {
                        tracing::debug!(%orientation, "orientation changed");
                        events
                            .send(orientation)
                            .await
                            .map_err(|_| SensorError::WorkerStopped)?;
                    }
                    None => break,
                },
                changed = connected.changed() => {
                    if changed.is_err() || !*connected.borrow_and_update() {
                        break;
                    }
                }
            }
        }
        tracing::info!(%device, "disconnected");
    }
}
