// The bus-voltage PID law with zone gating and anti-windup
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::config::RegulatorConfig;
use crate::law::{ControlLaw, Decision, Quantity};
use crate::safety::SafetyEnvelope;
use crate::Real;

/// The working variables of the regulator.
///
/// `PidState` is owned by exactly one control task. Nothing outside that task writes to it; a
/// retune replaces the law and resets the state at a tick boundary instead.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidState<F> {
    integral: F,
    previous_error: F,
}

impl<F: Real> Default for PidState<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Real> PidState<F> {
    /// Creates a zeroed state.
    pub fn new() -> Self {
        PidState {
            integral: F::zero(),
            previous_error: F::zero(),
        }
    }

    /// Returns the accumulated integral of the error (V·s). Never exceeds the configured
    /// integral limit in magnitude.
    pub fn integral(&self) -> F {
        self.integral
    }

    /// Returns the error seen on the previous active tick.
    pub fn previous_error(&self) -> F {
        self.previous_error
    }

    /// Zeroes the integral and the previous error.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Returns `true` if the state is exactly zero.
    pub fn is_reset(&self) -> bool {
        self.integral == F::zero() && self.previous_error == F::zero()
    }
}

/// A functional implementation of the bus-voltage regulator.
///
/// The regulator computes a braking-current magnitude from the error between the target bus
/// voltage and the measured one. This implementation is stateless so a [`PidState`] must be
/// passed in with each call.
///
/// The law only acts in the active zone: at or above the threshold voltage, the bus is healthy,
/// the state is reset and the output is zero. The output is clamped to `[0, max_current]`
/// because energy only flows from the motor into the bus.
///
/// The voltage floor is **not** part of this law; it belongs to the [`SafetyEnvelope`], which
/// the [`ControlLaw`] implementation applies after it.
#[derive(Copy, Clone, Debug)]
pub struct FuncRegulator<F> {
    config: RegulatorConfig<F>,
    dt: F,
}

impl<F: Real> FuncRegulator<F> {
    /// Creates a regulator from a validated configuration.
    pub fn new(config: RegulatorConfig<F>) -> Self {
        FuncRegulator {
            dt: config.dt(),
            config,
        }
    }

    /// Returns the configuration of this regulator.
    pub fn config(&self) -> &RegulatorConfig<F> {
        &self.config
    }

    /// Runs one tick of the law on `state` and returns the braking-current magnitude.
    pub fn update(&self, state: &mut PidState<F>, voltage: F) -> F {
        match self.advance(state, voltage) {
            Some(raw) => raw.max(F::zero()).min(self.config.max_current()),
            None => F::zero(),
        }
    }

    /// Pure form of [`update`](Self::update): consumes a state and returns the output along with
    /// the next state.
    pub fn compute(&self, mut state: PidState<F>, voltage: F) -> (F, PidState<F>) {
        let output = self.update(&mut state, voltage);
        (output, state)
    }

    /// Returns the output the law would produce from `state` before the output clamp, or zero
    /// outside the active zone. The state passed in is left untouched.
    pub fn raw_output(&self, mut state: PidState<F>, voltage: F) -> F {
        self.advance(&mut state, voltage).unwrap_or_else(F::zero)
    }

    /// Returns `true` if `voltage` lies in the zone where the law may brake.
    pub fn is_in_active_zone(&self, voltage: F) -> bool {
        voltage < self.config.threshold_voltage()
    }

    /// Advances the state and returns the unclamped output, or `None` after resetting the state
    /// when the bus is healthy.
    fn advance(&self, state: &mut PidState<F>, voltage: F) -> Option<F> {
        if !self.is_in_active_zone(voltage) {
            state.reset();
            return None;
        }

        let error = self.config.target_voltage() - voltage;

        // Clamp on every tick, not only once the output saturates
        let limit = self.config.integral_limit();
        state.integral = (state.integral + error * self.dt).max(-limit).min(limit);

        let derivative = (error - state.previous_error) / self.dt;
        state.previous_error = error;

        let (kp, ki, kd) = self.config.gains();
        Some(kp * error + ki * state.integral + kd * derivative)
    }
}

impl<F: Real> ControlLaw<F> for FuncRegulator<F> {
    type State = PidState<F>;

    const QUANTITY: Quantity = Quantity::BusVoltage;

    fn update_rate_hz(&self) -> u32 {
        self.config.update_rate_hz()
    }

    fn step(&self, voltage: F, state: &mut PidState<F>) -> Decision<F> {
        let envelope = SafetyEnvelope::from_config(&self.config);
        let output = self.update(state, voltage);
        let (magnitude, zone) = envelope.apply(voltage, output, state);
        Decision {
            command: envelope.command(magnitude),
            magnitude,
            zone,
        }
    }
}

/// A stateful implementation of the bus-voltage regulator.
///
/// This regulator owns its [`PidState`] and forwards every call to a [`FuncRegulator`]. Unlike
/// the [`ControlLaw`] implementation, [`compute`](Self::compute) does not apply the voltage
/// floor; see [`compute_with_envelope`](Self::compute_with_envelope) for that.
#[derive(Copy, Clone, Debug)]
pub struct Regulator<F> {
    state: PidState<F>,
    regulator: FuncRegulator<F>,
}

impl<F: Real> Regulator<F> {
    /// Creates a regulator with a zeroed state.
    pub fn new(config: RegulatorConfig<F>) -> Self {
        Regulator {
            state: PidState::new(),
            regulator: FuncRegulator::new(config),
        }
    }

    /// Returns the configuration of this regulator.
    pub fn config(&self) -> &RegulatorConfig<F> {
        self.regulator.config()
    }

    /// Returns the current working variables.
    pub fn state(&self) -> &PidState<F> {
        &self.state
    }

    /// Runs one tick of the PID law and returns the braking-current magnitude.
    pub fn compute(&mut self, voltage: F) -> F {
        self.regulator.update(&mut self.state, voltage)
    }

    /// Runs one tick of the PID law followed by the safety envelope.
    pub fn compute_with_envelope(&mut self, voltage: F) -> Decision<F> {
        self.regulator.step(voltage, &mut self.state)
    }

    /// Zeroes the working variables.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
