//! Core logic for the flip tracker.
//!
//! This crate contains:
//! - Orientation state machine: maps tracker faces to activities
//! - Time entry client: retry, short-session and max-duration policy
//! - Session tracking for the single open remote entry
//! - The serialized event worker and the sensor control loop

pub mod api;
pub mod client;
pub mod machine;
pub mod notify;
pub mod sensor;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod worker;

pub use api::{ActiveEntry, ApiError, CreatedEntry, TimesheetApi};
pub use client::{ClientPolicy, EntryError, StopOutcome, TimeEntryClient};
pub use machine::{MachineState, OrientationMachine};
pub use notify::Notifier;
pub use sensor::{DriveConfig, SensorConnection, SensorError, SensorLink, drive};
pub use session::{OpenSession, SessionTracker};
pub use types::{ActivityKey, EntryId, Orientation, Placement, SideMapping, ValidationError};
pub use worker::Worker;
