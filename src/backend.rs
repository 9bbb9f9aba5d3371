//! The motor backend as seen by the control task.

use crate::law::ControlCommand;

/// The motor-control platform the control task drives.
///
/// Measurements are filtered instantaneous values. A read failure is reported by the
/// implementation as an out-of-range value; the control path has no error return.
pub trait MotorBackend<F> {
    /// Returns the filtered DC bus voltage.
    fn read_voltage(&mut self) -> F;

    /// Returns the signed rotor speed.
    fn read_speed(&mut self) -> F;

    /// Commands a signed motor current.
    fn apply_current(&mut self, amps: F);

    /// Commands zero torque and lets the motor coast.
    fn release(&mut self);

    /// Tells the host watchdog that the control task is alive.
    fn acknowledge_liveness(&mut self);

    /// Sends a [`ControlCommand`].
    fn apply(&mut self, command: ControlCommand<F>) {
        match command {
            ControlCommand::Current(amps) => self.apply_current(amps),
            ControlCommand::Release => self.release(),
        }
    }
}
