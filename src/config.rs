// Validated configuration for the regulator and generator control laws
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

use core::time::Duration;

use crate::{lit, Real};

/// Bus voltage the regulator holds, in volts.
pub const TARGET_VOLTAGE: f32 = 48.0;

/// Braking is only permitted strictly below this bus voltage, in volts.
pub const THRESHOLD_VOLTAGE: f32 = 47.5;

/// Voltage floor of the standard 48 V profile, in volts.
pub const MIN_VOLTAGE_STANDARD: f32 = 45.0;

/// Voltage floor of the hardened 48 V profile, in volts. Allows regulation deeper into a sag.
pub const MIN_VOLTAGE_HARDENED: f32 = 36.0;

/// Errors reported when a configuration fails validation.
///
/// Every check happens when the configuration is built, so the control laws never validate their
/// inputs on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ConfigError {
    /// Kp is zero, negative or not finite. Unlike Ki and Kd, Kp must be strictly positive: every
    /// tuning keeps a proportional term.
    #[cfg_attr(feature = "std", error("proportional gain must be positive and finite"))]
    InvalidProportionalGain,

    /// Ki is negative or not finite.
    #[cfg_attr(feature = "std", error("integral gain must be non-negative and finite"))]
    InvalidIntegralGain,

    /// Kd is negative or not finite.
    #[cfg_attr(feature = "std", error("derivative gain must be non-negative and finite"))]
    InvalidDerivativeGain,

    /// The maximum output current is negative or not finite.
    #[cfg_attr(feature = "std", error("maximum current must be non-negative and finite"))]
    InvalidMaxCurrent,

    /// The integral clamp is negative or not finite.
    #[cfg_attr(feature = "std", error("integral limit must be non-negative and finite"))]
    InvalidIntegralLimit,

    /// The release deadband is negative or not finite.
    #[cfg_attr(feature = "std", error("release deadband must be non-negative and finite"))]
    InvalidDeadband,

    /// The update rate is zero.
    #[cfg_attr(feature = "std", error("update rate must be at least 1 Hz"))]
    InvalidUpdateRate,

    /// No voltage floor was given to the builder.
    #[cfg_attr(feature = "std", error("minimum voltage was not set"))]
    MinimumVoltageUnset,

    /// One of the voltages is not finite.
    #[cfg_attr(feature = "std", error("voltages must be finite"))]
    NonFiniteVoltage,

    /// The target voltage does not lie above the activation threshold.
    #[cfg_attr(feature = "std", error("target voltage must be above the threshold voltage"))]
    TargetNotAboveThreshold,

    /// The activation threshold does not lie above the voltage floor.
    #[cfg_attr(feature = "std", error("threshold voltage must be above the minimum voltage"))]
    ThresholdNotAboveMinimum,

    /// The generator's target speed is not positive and finite.
    #[cfg_attr(feature = "std", error("target speed must be positive and finite"))]
    InvalidTargetSpeed,

    /// The generator's start ratio is outside (0, 1).
    #[cfg_attr(feature = "std", error("start ratio must lie strictly between 0 and 1"))]
    InvalidStartRatio,

    /// The generator's target current is negative or not finite.
    #[cfg_attr(feature = "std", error("target current must be non-negative and finite"))]
    InvalidTargetCurrent,
}

fn non_negative<F: Real>(value: F) -> bool {
    value >= F::zero() && value.is_finite()
}

/// Configuration of the bus-voltage regulator.
///
/// A configuration is an immutable snapshot: it is fixed when a control law is activated. To
/// change it, build a new one (see [`RegulatorConfig::to_builder`]) and hand it to the control
/// task, which resets the regulator state when it swaps the law.
///
/// The invariant `target > threshold > minimum` always holds, and every current, gain and clamp
/// is non-negative.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegulatorConfig<F> {
    /// Bus voltage to hold.
    target_voltage: F,

    /// Braking is permitted only strictly below this voltage.
    threshold_voltage: F,

    /// Absolute floor. Below it the safety envelope forces the output to zero.
    min_voltage: F,

    /// Largest braking current the regulator will command.
    max_current: F,

    /// Proportional gain (A/V).
    kp: F,

    /// Integral gain (A/(V·s)).
    ki: F,

    /// Derivative gain (A·s/V).
    kd: F,

    /// Anti-windup bound on the accumulated integral (V·s).
    integral_limit: F,

    /// Control rate. The timestep is its reciprocal.
    update_rate_hz: u32,

    /// Magnitudes at or below this are sent as a release instead of a current.
    release_deadband: F,
}

impl<F: Real> RegulatorConfig<F> {
    fn preset(min_voltage: f32) -> Self {
        RegulatorConfig {
            target_voltage: lit(TARGET_VOLTAGE),
            threshold_voltage: lit(THRESHOLD_VOLTAGE),
            min_voltage: lit(min_voltage),
            max_current: lit(50.0),
            kp: lit(20.0),
            ki: lit(5.0),
            kd: lit(0.5),
            integral_limit: lit(10.0),
            update_rate_hz: 1000,
            release_deadband: lit(0.1),
        }
    }

    /// The standard 48 V profile: 47.5 V threshold, 45 V floor, 50 A, Kp = 20, Ki = 5,
    /// Kd = 0.5, integral limit 10 V·s, 1 kHz.
    pub fn standard() -> Self {
        Self::preset(MIN_VOLTAGE_STANDARD)
    }

    /// The hardened 48 V profile. Identical to [`RegulatorConfig::standard`] except for its 36 V
    /// floor.
    pub fn hardened() -> Self {
        Self::preset(MIN_VOLTAGE_HARDENED)
    }

    /// Returns a builder seeded with every value of this configuration.
    pub fn to_builder(&self) -> RegulatorConfigBuilder<F> {
        RegulatorConfigBuilder {
            target_voltage: self.target_voltage,
            threshold_voltage: self.threshold_voltage,
            min_voltage: Some(self.min_voltage),
            max_current: self.max_current,
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            integral_limit: self.integral_limit,
            update_rate_hz: self.update_rate_hz,
            release_deadband: self.release_deadband,
        }
    }

    /// Returns the target bus voltage.
    pub fn target_voltage(&self) -> F {
        self.target_voltage
    }

    /// Returns the activation threshold voltage.
    pub fn threshold_voltage(&self) -> F {
        self.threshold_voltage
    }

    /// Returns the absolute minimum voltage.
    pub fn min_voltage(&self) -> F {
        self.min_voltage
    }

    /// Returns the maximum braking current.
    pub fn max_current(&self) -> F {
        self.max_current
    }

    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Convenience method that returns the proportional, integral, and derivative gains together as a tuple.
    pub fn gains(&self) -> (F, F, F) {
        (self.kp, self.ki, self.kd)
    }

    /// Returns the anti-windup limit on the integral.
    pub fn integral_limit(&self) -> F {
        self.integral_limit
    }

    /// Returns the control rate in Hz.
    pub fn update_rate_hz(&self) -> u32 {
        self.update_rate_hz
    }

    /// Returns the fixed timestep, in seconds.
    pub fn dt(&self) -> F {
        F::one() / lit::<F>(self.update_rate_hz as f32)
    }

    /// Returns the fixed timestep as a `Duration`.
    pub fn sample_time(&self) -> Duration {
        Duration::from_secs(1) / self.update_rate_hz
    }

    /// Returns the release deadband.
    pub fn release_deadband(&self) -> F {
        self.release_deadband
    }
}

/// Builder for [`RegulatorConfig`].
///
/// Defaults to the standard 48 V profile **without** a voltage floor: two floors (45 V and 36 V)
/// are in use and neither is assumed. [`build`](Self::build) fails with
/// [`ConfigError::MinimumVoltageUnset`] until [`min_voltage`](Self::min_voltage) is called.
#[derive(Copy, Clone, Debug)]
pub struct RegulatorConfigBuilder<F> {
    target_voltage: F,
    threshold_voltage: F,
    min_voltage: Option<F>,
    max_current: F,
    kp: F,
    ki: F,
    kd: F,
    integral_limit: F,
    update_rate_hz: u32,
    release_deadband: F,
}

impl<F: Real> Default for RegulatorConfigBuilder<F> {
    fn default() -> Self {
        let mut builder = RegulatorConfig::standard().to_builder();
        builder.min_voltage = None;
        builder
    }
}

impl<F: Real> RegulatorConfigBuilder<F> {
    /// Sets the target bus voltage.
    pub fn target_voltage(mut self, volts: F) -> Self {
        self.target_voltage = volts;
        self
    }

    /// Sets the activation threshold voltage.
    pub fn threshold_voltage(mut self, volts: F) -> Self {
        self.threshold_voltage = volts;
        self
    }

    /// Sets the absolute minimum voltage.
    pub fn min_voltage(mut self, volts: F) -> Self {
        self.min_voltage = Some(volts);
        self
    }

    /// Sets the maximum braking current.
    pub fn max_current(mut self, amps: F) -> Self {
        self.max_current = amps;
        self
    }

    /// Sets the proportional gain. Zero is rejected by [`build`](Self::build).
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = kp;
        self
    }

    /// Sets the integral gain.
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = ki;
        self
    }

    /// Sets the derivative gain.
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = kd;
        self
    }

    /// Sets all three gains.
    pub fn gains(self, kp: F, ki: F, kd: F) -> Self {
        self.kp(kp).ki(ki).kd(kd)
    }

    /// Sets the anti-windup limit on the integral.
    pub fn integral_limit(mut self, limit: F) -> Self {
        self.integral_limit = limit;
        self
    }

    /// Sets the control rate in Hz.
    pub fn update_rate_hz(mut self, hz: u32) -> Self {
        self.update_rate_hz = hz;
        self
    }

    /// Sets the release deadband.
    pub fn release_deadband(mut self, amps: F) -> Self {
        self.release_deadband = amps;
        self
    }

    /// Validates the parameters and builds the configuration.
    ///
    /// # Errors
    /// Returns the [`ConfigError`] of the first parameter, or relation between parameters, that
    /// is invalid.
    pub fn build(self) -> Result<RegulatorConfig<F>, ConfigError> {
        if self.update_rate_hz == 0 {
            return Err(ConfigError::InvalidUpdateRate);
        }
        if self.kp <= F::zero() || !self.kp.is_finite() {
            return Err(ConfigError::InvalidProportionalGain);
        }
        if !non_negative(self.ki) {
            return Err(ConfigError::InvalidIntegralGain);
        }
        if !non_negative(self.kd) {
            return Err(ConfigError::InvalidDerivativeGain);
        }
        if !non_negative(self.max_current) {
            return Err(ConfigError::InvalidMaxCurrent);
        }
        if !non_negative(self.integral_limit) {
            return Err(ConfigError::InvalidIntegralLimit);
        }
        if !non_negative(self.release_deadband) {
            return Err(ConfigError::InvalidDeadband);
        }

        let min_voltage = self.min_voltage.ok_or(ConfigError::MinimumVoltageUnset)?;
        let voltages = [self.target_voltage, self.threshold_voltage, min_voltage];
        if voltages.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteVoltage);
        }
        if self.target_voltage <= self.threshold_voltage {
            return Err(ConfigError::TargetNotAboveThreshold);
        }
        if self.threshold_voltage <= min_voltage {
            return Err(ConfigError::ThresholdNotAboveMinimum);
        }

        Ok(RegulatorConfig {
            target_voltage: self.target_voltage,
            threshold_voltage: self.threshold_voltage,
            min_voltage,
            max_current: self.max_current,
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            integral_limit: self.integral_limit,
            update_rate_hz: self.update_rate_hz,
            release_deadband: self.release_deadband,
        })
    }
}

/// Configuration of the open-loop generator law.
///
/// Generation starts at `start_ratio * target_speed` and ramps linearly so that `target_current`
/// is reached at `target_speed`. The ramp keeps going past the target speed; the drive's own
/// current limits cap it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeneratorConfig<F> {
    target_speed: F,
    start_ratio: F,
    target_current: F,
    update_rate_hz: u32,
}

impl<F: Real> Default for GeneratorConfig<F> {
    /// 2000 ERPM target, generation from 90 % of it, 20 A at target, 1 kHz.
    fn default() -> Self {
        GeneratorConfig {
            target_speed: lit(2000.0),
            start_ratio: lit(0.9),
            target_current: lit(20.0),
            update_rate_hz: 1000,
        }
    }
}

impl<F: Real> GeneratorConfig<F> {
    /// Returns a builder seeded with every value of this configuration.
    pub fn to_builder(&self) -> GeneratorConfigBuilder<F> {
        GeneratorConfigBuilder { config: *self }
    }

    /// Returns the speed magnitude at which the target current is reached.
    pub fn target_speed(&self) -> F {
        self.target_speed
    }

    /// Returns the fraction of the target speed at which generation starts.
    pub fn start_ratio(&self) -> F {
        self.start_ratio
    }

    /// Returns the current magnitude commanded at the target speed.
    pub fn target_current(&self) -> F {
        self.target_current
    }

    /// Returns the control rate in Hz.
    pub fn update_rate_hz(&self) -> u32 {
        self.update_rate_hz
    }

    /// Returns the fixed timestep as a `Duration`.
    pub fn sample_time(&self) -> Duration {
        Duration::from_secs(1) / self.update_rate_hz
    }
}

/// Builder for [`GeneratorConfig`]. Defaults to [`GeneratorConfig::default`].
#[derive(Copy, Clone, Debug)]
pub struct GeneratorConfigBuilder<F> {
    config: GeneratorConfig<F>,
}

impl<F: Real> Default for GeneratorConfigBuilder<F> {
    fn default() -> Self {
        GeneratorConfig::default().to_builder()
    }
}

impl<F: Real> GeneratorConfigBuilder<F> {
    /// Sets the target speed magnitude.
    pub fn target_speed(mut self, speed: F) -> Self {
        self.config.target_speed = speed;
        self
    }

    /// Sets the start ratio.
    pub fn start_ratio(mut self, ratio: F) -> Self {
        self.config.start_ratio = ratio;
        self
    }

    /// Sets the current magnitude at target speed.
    pub fn target_current(mut self, amps: F) -> Self {
        self.config.target_current = amps;
        self
    }

    /// Sets the control rate in Hz.
    pub fn update_rate_hz(mut self, hz: u32) -> Self {
        self.config.update_rate_hz = hz;
        self
    }

    /// Validates the parameters and builds the configuration.
    ///
    /// # Errors
    /// Returns the [`ConfigError`] of the first invalid parameter.
    pub fn build(self) -> Result<GeneratorConfig<F>, ConfigError> {
        let config = self.config;
        if config.update_rate_hz == 0 {
            return Err(ConfigError::InvalidUpdateRate);
        }
        if config.target_speed <= F::zero() || !config.target_speed.is_finite() {
            return Err(ConfigError::InvalidTargetSpeed);
        }
        // Also rejects NaN
        if !(config.start_ratio > F::zero() && config.start_ratio < F::one()) {
            return Err(ConfigError::InvalidStartRatio);
        }
        if !non_negative(config.target_current) {
            return Err(ConfigError::InvalidTargetCurrent);
        }
        Ok(config)
    }
}
