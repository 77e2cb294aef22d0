//! Flip command: apply one orientation reading and exit.

use ft_core::{MachineState, Orientation, OrientationMachine, TimesheetApi};

/// Seeds `machine` from Kimai, then applies `orientation`.
pub async fn run<A: TimesheetApi>(
    machine: &mut OrientationMachine<A>,
    orientation: Orientation,
) -> MachineState {
    machine.bootstrap().await;
    machine.observe(orientation).await;
    machine.state()
}
