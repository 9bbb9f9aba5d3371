//! Safety envelope around the regulator output.
//!
//! The envelope runs after the PID law on every tick and overrides it: below the absolute
//! voltage floor the output is zero and the regulator state is reset, whatever the law computed.
//! It also owns the command-application policy that turns a magnitude into either a braking
//! current or a motor release.

use crate::config::RegulatorConfig;
use crate::law::ControlCommand;
use crate::pid::PidState;
use crate::Real;

/// The branch that produced a tick's output.
///
/// Both `Idle` and `BelowMinimum` yield zero output; they are kept apart so the source of a zero
/// can be audited.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    /// The law is not asked to act: the bus is healthy, or the rotor is below the start speed.
    Idle,
    /// The law is computing an output.
    Active,
    /// The bus is below the absolute floor and the output is forced to zero.
    BelowMinimum,
}

/// The voltage floor and release deadband taken from a [`RegulatorConfig`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SafetyEnvelope<F> {
    min_voltage: F,
    threshold_voltage: F,
    release_deadband: F,
}

impl<F: Real> SafetyEnvelope<F> {
    /// Extracts the envelope of a regulator configuration.
    pub fn from_config(config: &RegulatorConfig<F>) -> Self {
        SafetyEnvelope {
            min_voltage: config.min_voltage(),
            threshold_voltage: config.threshold_voltage(),
            release_deadband: config.release_deadband(),
        }
    }

    /// Classifies a bus voltage.
    ///
    /// The floor check comes first, so the result is `BelowMinimum` whenever `voltage` is under
    /// the floor. Anything the regulator does not treat as active, NaN included, is `Idle`.
    pub fn classify(&self, voltage: F) -> Zone {
        if voltage < self.min_voltage {
            Zone::BelowMinimum
        } else if voltage < self.threshold_voltage {
            Zone::Active
        } else {
            Zone::Idle
        }
    }

    /// Applies the envelope to a PID output.
    ///
    /// Returns the final magnitude and the zone that produced it. Below the floor the magnitude
    /// is zero and `state` is reset.
    pub fn apply(&self, voltage: F, pid_output: F, state: &mut PidState<F>) -> (F, Zone) {
        let zone = self.classify(voltage);
        if zone == Zone::BelowMinimum {
            state.reset();
            return (F::zero(), zone);
        }
        (pid_output, zone)
    }

    /// Turns a braking magnitude into a command.
    ///
    /// Magnitudes above the deadband are sent as a negative current, which brakes against positive
    /// rotation. Anything else releases the motor.
    pub fn command(&self, magnitude: F) -> ControlCommand<F> {
        if magnitude > self.release_deadband {
            ControlCommand::Current(-magnitude)
        } else {
            ControlCommand::Release
        }
    }

    /// Returns `true` if regeneration is permitted at `voltage`, i.e. the voltage lies strictly
    /// between the floor and the threshold.
    ///
    /// This is the read-only predicate exposed to monitoring; the control law itself goes through
    /// [`classify`](Self::classify).
    pub fn is_regen_active(&self, voltage: F) -> bool {
        voltage > self.min_voltage && voltage < self.threshold_voltage
    }
}
