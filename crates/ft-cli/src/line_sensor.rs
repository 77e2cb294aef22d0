//! A [`SensorLink`] fed by text lines, one orientation value per line.
//!
//! Stands in for the tracker's radio transport: the first valid line is the
//! orientation read on connect, later lines are change notifications, and
//! end of input is a disconnect after which no device is found again.

use async_trait::async_trait;
use ft_core::{Orientation, SensorConnection, SensorError, SensorLink};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, watch};

/// Device name reported by discovery.
pub const DEVICE_NAME: &str = "Timeular (line input)";

const NOTIFICATION_BUFFER: usize = 64;

pub struct LineSensor<R> {
    lines: Option<Lines<R>>,
}

impl<R> LineSensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: Some(reader.lines()),
        }
    }
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
fn parse_line(line: &str) -> Option<Result<Orientation, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(
        line.parse::<u8>()
            .map(Orientation::new)
            .map_err(|err| format!("{line:?}: {err}")),
    )
}

/// Next valid orientation from `lines`, skipping malformed lines.
async fn next_orientation<R>(lines: &mut Lines<R>) -> Result<Option<Orientation>, SensorError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| SensorError::Read(err.to_string()))?
    {
        match parse_line(&line) {
            Some(Ok(orientation)) => return Ok(Some(orientation)),
            Some(Err(err)) => tracing::warn!(error = %err, "ignoring malformed orientation"),
            None => {}
        }
    }
    Ok(None)
}

#[async_trait]
impl<R> SensorLink for LineSensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn discover(&mut self, name_filter: &str) -> Result<Option<String>, SensorError> {
        if self.lines.is_none() {
            return Err(SensorError::Closed);
        }
        if DEVICE_NAME.contains(name_filter) {
            Ok(Some(DEVICE_NAME.to_string()))
        } else {
            Ok(None)
        }
    }

    async fn connect(&mut self, device: &str) -> Result<SensorConnection, SensorError> {
        let mut lines = self.lines.take().ok_or(SensorError::Closed)?;
        let Some(initial) = next_orientation(&mut lines).await? else {
            return Err(SensorError::Connect {
                device: device.to_string(),
                reason: "input ended before the first reading".to_string(),
            });
        };

        let (orientation_tx, orientations) = mpsc::channel(NOTIFICATION_BUFFER);
        let (status_tx, connected) = watch::channel(true);
        tokio::spawn(async move {
            loop {
                match next_orientation(&mut lines).await {
                    Ok(Some(orientation)) => {
                        if orientation_tx.send(orientation).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "line input failed");
                        break;
                    }
                }
            }
            // Receiver may already be gone.
            let _ = status_tx.send(false);
        });

        Ok(SensorConnection {
            initial,
            orientations,
            connected,
        })
    }
}
