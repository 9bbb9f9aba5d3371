//! The interface between the control laws and the periodic task.

use crate::backend::MotorBackend;
use crate::safety::Zone;
use crate::Real;

/// What the task sends to the backend on a tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ControlCommand<F> {
    /// Command a signed motor current. Negative current brakes positive rotation.
    Current(F),
    /// Apply no torque and let the motor coast. Not the same as commanding zero current.
    Release,
}

impl<F: Real> ControlCommand<F> {
    /// Returns the commanded current, or `None` for a release.
    pub fn current(&self) -> Option<F> {
        match self {
            ControlCommand::Current(amps) => Some(*amps),
            ControlCommand::Release => None,
        }
    }

    /// Returns `true` for a release.
    pub fn is_release(&self) -> bool {
        matches!(self, ControlCommand::Release)
    }
}

/// The process variable a control law reads from the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Quantity {
    /// Filtered DC bus voltage.
    BusVoltage,
    /// Signed rotor speed.
    Speed,
}

impl Quantity {
    /// Reads this quantity from `backend`.
    pub fn read<F: Real, B: MotorBackend<F> + ?Sized>(self, backend: &mut B) -> F {
        match self {
            Quantity::BusVoltage => backend.read_voltage(),
            Quantity::Speed => backend.read_speed(),
        }
    }
}

/// The output of one tick of a control law.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Decision<F> {
    /// The command to send to the backend.
    pub command: ControlCommand<F>,
    /// The unsigned current magnitude the command was derived from.
    pub magnitude: F,
    /// The branch that produced the output.
    pub zone: Zone,
}

/// A control law that the periodic task can run.
///
/// `step` must be a bounded-time, non-blocking computation: it runs inside the tick budget.
/// Laws are immutable during a run; the task swaps the whole law to retune it.
pub trait ControlLaw<F: Real>: Send + 'static {
    /// Working variables carried between ticks. A fresh `Default` value is used on every
    /// activation and after every retune.
    type State: Default + Send + 'static;

    /// The quantity passed to [`step`](Self::step).
    const QUANTITY: Quantity;

    /// The rate at which the law expects to be called.
    fn update_rate_hz(&self) -> u32;

    /// Computes the command for one tick.
    fn step(&self, measurement: F, state: &mut Self::State) -> Decision<F>;
}
