//! Watch command: the long-running control loop.

use std::future::Future;

use anyhow::{Context, Result};
use ft_core::{DriveConfig, OrientationMachine, SensorLink, TimesheetApi, Worker, drive};

/// Bootstraps `machine`, then feeds it every reading `link` delivers until
/// the link closes or `shutdown` resolves.
///
/// Queued readings are processed before returning.
pub async fn run<A, L, S>(
    mut machine: OrientationMachine<A>,
    link: &mut L,
    drive_config: &DriveConfig,
    shutdown: S,
) -> Result<OrientationMachine<A>>
where
    A: TimesheetApi + 'static,
    L: SensorLink + ?Sized,
    S: Future<Output = ()>,
{
    machine.bootstrap().await;

    let worker = Worker::spawn(machine, ft_core::worker::DEFAULT_QUEUE_CAPACITY);
    let events = worker.sender();
    let driven = drive(link, &events, drive_config, shutdown).await;
    drop(events);

    let machine = worker.finish().await.context("event worker panicked")?;
    driven.context("sensor link failed")?;
    Ok(machine)
}
