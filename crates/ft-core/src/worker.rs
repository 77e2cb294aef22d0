//! Single-consumer event worker.
//!
//! Readings are queued on a bounded channel and handled one at a time, so a
//! reading is never processed while the start/stop sequence for the previous
//! one is still in flight. The sender side never waits on the network.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::TimesheetApi;
use crate::machine::OrientationMachine;
use crate::types::Orientation;

/// Queue depth between the sensor link and the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Handle to a running worker.
pub struct Worker<A> {
    sender: mpsc::Sender<Orientation>,
    handle: JoinHandle<OrientationMachine<A>>,
}

impl<A: TimesheetApi + 'static> Worker<A> {
    /// Moves `machine` onto a task that processes queued readings in order.
    pub fn spawn(machine: OrientationMachine<A>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            let mut machine = machine;
            while let Some(orientation) = receiver.recv().await {
                machine.observe(orientation).await;
            }
            tracing::debug!("event queue closed, worker exiting");
            machine
        });
        Self { sender, handle }
    }

    /// Sender for readings; clone it for each producer.
    pub fn sender(&self) -> mpsc::Sender<Orientation> {
        self.sender.clone()
    }

    /// Stops accepting readings, waits for the queue to drain and returns
    /// the machine.
    ///
    /// Other clones of the sender must be dropped first or this waits for
    /// them.
    pub async fn finish(self) -> Result<OrientationMachine<A>, tokio::task::JoinError> {
        drop(self.sender);
        self.handle.await
    }
}
