// The open-loop speed-ramped generator law
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

use crate::config::GeneratorConfig;
use crate::law::{ControlCommand, ControlLaw, Decision, Quantity};
use crate::safety::Zone;
use crate::Real;

/// Computes the generator current for a signed rotor speed.
///
/// The current ramps linearly from zero at `start_ratio * target_speed` to `target_current` at
/// `target_speed`, and opposes the direction of rotation.
pub fn generator_current<F: Real>(config: &GeneratorConfig<F>, speed: F) -> F {
    let relative = speed.abs() / config.target_speed();
    let start = config.start_ratio();
    let surplus = (relative - start).max(F::zero());
    let magnitude = surplus / (F::one() - start) * config.target_current();

    if magnitude == F::zero() {
        F::zero()
    } else if speed < F::zero() {
        magnitude
    } else {
        -magnitude
    }
}

/// The open-loop generator law.
///
/// It holds no working variables, so leaving and re-entering the generating band is continuous
/// without any reset. Unlike the regulator, it sends its current on every tick, zero included,
/// and never releases the motor.
#[derive(Copy, Clone, Debug)]
pub struct Generator<F> {
    config: GeneratorConfig<F>,
}

impl<F: Real> Default for Generator<F> {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl<F: Real> Generator<F> {
    /// Creates a generator law from a validated configuration.
    pub fn new(config: GeneratorConfig<F>) -> Self {
        Generator { config }
    }

    /// Returns the configuration of this law.
    pub fn config(&self) -> &GeneratorConfig<F> {
        &self.config
    }

    /// Returns the signed current for `speed`.
    pub fn compute(&self, speed: F) -> F {
        generator_current(&self.config, speed)
    }
}

impl<F: Real> ControlLaw<F> for Generator<F> {
    type State = ();

    const QUANTITY: Quantity = Quantity::Speed;

    fn update_rate_hz(&self) -> u32 {
        self.config.update_rate_hz()
    }

    fn step(&self, speed: F, _state: &mut ()) -> Decision<F> {
        let current = self.compute(speed);
        let magnitude = current.abs();
        let zone = if magnitude > F::zero() {
            Zone::Active
        } else {
            Zone::Idle
        };
        Decision {
            command: ControlCommand::Current(current),
            magnitude,
            zone,
        }
    }
}
