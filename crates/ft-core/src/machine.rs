//! Orientation state machine.
//!
//! Compares each reading against the previous one and drives the
//! [`TimeEntryClient`] on changes. Holds no timers; every time-based decision
//! belongs to the client.

use std::sync::Arc;

use crate::api::TimesheetApi;
use crate::client::TimeEntryClient;
use crate::notify::{self, Notifier, TITLE};
use crate::types::{Orientation, Placement, SideMapping};

/// What the machine believes the tracker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// No orientation observed or seeded yet.
    Unknown,
    /// Tracker in its base.
    Idle,
    /// Tracker on a face.
    Tracking(u8),
}

pub struct OrientationMachine<A> {
    client: TimeEntryClient<A>,
    sides: SideMapping,
    notifier: Arc<dyn Notifier>,
    last: Option<Orientation>,
}

impl<A: TimesheetApi> OrientationMachine<A> {
    pub fn new(
        client: TimeEntryClient<A>,
        sides: SideMapping,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            sides,
            notifier,
            last: None,
        }
    }

    pub const fn client(&self) -> &TimeEntryClient<A> {
        &self.client
    }

    pub const fn last_orientation(&self) -> Option<Orientation> {
        self.last
    }

    pub const fn state(&self) -> MachineState {
        match self.last {
            None => MachineState::Unknown,
            Some(o) => match o.placement() {
                Placement::Base => MachineState::Idle,
                Placement::Face(face) => MachineState::Tracking(face),
            },
        }
    }

    /// Seeds state from the entry the service reports as running.
    ///
    /// A running entry becomes the open session; if a face maps to its
    /// activity that face becomes the previous orientation, so reading the
    /// same face from the tracker changes nothing. With nothing running the
    /// machine starts idle. If the service cannot be reached the state stays
    /// [`MachineState::Unknown`] with no open session.
    pub async fn bootstrap(&mut self) {
        match self.client.fetch_active().await {
            Ok(Some(entry)) => {
                self.client.adopt(&entry);
                self.last = self.sides.face_for(entry.activity).map(Orientation::new);
                if self.last.is_none() {
                    tracing::info!(activity = %entry.activity, "running entry has no side");
                }
                self.notifier.notify(TITLE, &notify::tracking_message(&entry));
            }
            Ok(None) => {
                tracing::info!("nothing tracked remotely");
                self.last = Some(Orientation::BASE);
            }
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap failed, starting without a session");
                self.last = None;
            }
        }
    }

    /// Handles one orientation reading.
    ///
    /// Never fails: client errors are already reported, and the machine is
    /// left ready for the next reading.
    pub async fn observe(&mut self, orientation: Orientation) {
        let previous = self.last.replace(orientation);

        if previous == Some(orientation) {
            if orientation.placement() == Placement::Base && !self.client.sessions().is_open() {
                self.notifier
                    .notify(TITLE, "Not tracking. Flip your tracker to get started!");
            }
            return;
        }

        tracing::info!(
            from = ?previous.map(Orientation::raw),
            to = orientation.raw(),
            "orientation changed"
        );

        match orientation.placement() {
            Placement::Face(face) => {
                let Some(key) = self.sides.activity_for(face) else {
                    // An unmapped face leaves whatever is running alone.
                    self.notifier
                        .notify(TITLE, &format!("No task assigned to side {face}"));
                    return;
                };
                if let Err(err) = self.client.start(key).await {
                    tracing::warn!(face, error = %err, "could not start tracking");
                }
            }
            Placement::Base => {
                if let Err(err) = self.client.stop().await {
                    tracing::warn!(error = %err, "could not close session");
                }
                self.notifier
                    .notify(TITLE, "Not tracking. Tracker is in its base.");
            }
        }
    }
}
