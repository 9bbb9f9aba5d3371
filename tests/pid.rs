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

use fixtures::test_regen;

use regen_pid::config::{ConfigError, RegulatorConfig, RegulatorConfigBuilder};
use regen_pid::law::{ControlCommand, ControlLaw};
use regen_pid::pid::{FuncRegulator, PidState};
use regen_pid::safety::{SafetyEnvelope, Zone};

use approx::assert_relative_eq;
use std::time::Duration;

mod test_regulator_config {

    use core::f64;

    use super::*;

    // Zero, negative and non-finite kp are invalid
    const INVALID_KP_VALUES: &[f64; 4] = &[0.0, -1.0, f64::INFINITY, f64::NAN];
    // Negative and non-finite values are invalid for every other gain, current and clamp
    const INVALID_NON_NEGATIVE_VALUES: &[f64; 3] = &[-1.0, f64::INFINITY, f64::NAN];

    fn standard_builder() -> RegulatorConfigBuilder<f64> {
        RegulatorConfig::standard().to_builder()
    }

    #[test]
    fn test_standard_preset() {
        let config = RegulatorConfig::<f64>::standard();
        assert_eq!(config.target_voltage(), 48.0);
        assert_eq!(config.threshold_voltage(), 47.5);
        assert_eq!(config.min_voltage(), 45.0);
        assert_eq!(config.max_current(), 50.0);
        assert_eq!(config.gains(), (20.0, 5.0, 0.5));
        assert_eq!(config.integral_limit(), 10.0);
        assert_eq!(config.update_rate_hz(), 1000);
        assert_relative_eq!(config.release_deadband(), 0.1, epsilon = 1e-6);

        // The timestep is the reciprocal of the rate
        assert_relative_eq!(config.dt(), 0.001);
        assert_eq!(config.sample_time(), Duration::from_millis(1));
    }

    #[test]
    fn test_hardened_preset_only_lowers_the_floor() {
        let hardened = RegulatorConfig::<f64>::hardened();
        assert_eq!(hardened.min_voltage(), 36.0);

        let lowered = standard_builder().min_voltage(36.0).build();
        assert_eq!(lowered, Ok(hardened));
    }

    #[test]
    fn test_builder_requires_a_floor() {
        assert_eq!(
            RegulatorConfigBuilder::<f64>::default().build(),
            Err(ConfigError::MinimumVoltageUnset)
        );

        // Everything else defaults to the standard profile
        let built = RegulatorConfigBuilder::default().min_voltage(45.0).build();
        assert_eq!(built, Ok(RegulatorConfig::<f64>::standard()));
    }

    #[test]
    fn test_build_kp() {
        let built = standard_builder().kp(10.0).build();
        assert!(built.is_ok());
        assert_eq!(built.unwrap().kp(), 10.0);

        for it in INVALID_KP_VALUES {
            assert_eq!(
                standard_builder().kp(*it).build().map(|_| ()),
                Err(ConfigError::InvalidProportionalGain)
            );
        }
    }

    #[test]
    fn test_build_ki_and_kd() {
        // Zero ki and kd are valid
        let built = standard_builder().gains(1.0, 0.0, 0.0).build();
        assert!(built.is_ok());
        assert_eq!(built.unwrap().gains(), (1.0, 0.0, 0.0));

        for it in INVALID_NON_NEGATIVE_VALUES {
            assert_eq!(
                standard_builder().ki(*it).build().map(|_| ()),
                Err(ConfigError::InvalidIntegralGain)
            );
            assert_eq!(
                standard_builder().kd(*it).build().map(|_| ()),
                Err(ConfigError::InvalidDerivativeGain)
            );
        }
    }

    #[test]
    fn test_build_limits() {
        for it in INVALID_NON_NEGATIVE_VALUES {
            assert_eq!(
                standard_builder().max_current(*it).build().map(|_| ()),
                Err(ConfigError::InvalidMaxCurrent)
            );
            assert_eq!(
                standard_builder().integral_limit(*it).build().map(|_| ()),
                Err(ConfigError::InvalidIntegralLimit)
            );
            assert_eq!(
                standard_builder().release_deadband(*it).build().map(|_| ()),
                Err(ConfigError::InvalidDeadband)
            );
        }

        assert_eq!(
            standard_builder().update_rate_hz(0).build().map(|_| ()),
            Err(ConfigError::InvalidUpdateRate)
        );

        let built = standard_builder().update_rate_hz(500).build().unwrap();
        assert_relative_eq!(built.dt(), 0.002);
        assert_eq!(built.sample_time(), Duration::from_millis(2));
    }

    #[test]
    fn test_build_voltage_ordering() {
        // target > threshold > minimum must hold strictly
        assert_eq!(
            standard_builder().target_voltage(47.5).build().map(|_| ()),
            Err(ConfigError::TargetNotAboveThreshold)
        );
        assert_eq!(
            standard_builder().threshold_voltage(49.0).build().map(|_| ()),
            Err(ConfigError::TargetNotAboveThreshold)
        );
        assert_eq!(
            standard_builder().min_voltage(47.5).build().map(|_| ()),
            Err(ConfigError::ThresholdNotAboveMinimum)
        );
        assert_eq!(
            standard_builder().min_voltage(f64::NAN).build().map(|_| ()),
            Err(ConfigError::NonFiniteVoltage)
        );
        assert_eq!(
            standard_builder()
                .target_voltage(f64::INFINITY)
                .build()
                .map(|_| ()),
            Err(ConfigError::NonFiniteVoltage)
        );
    }

    #[test]
    fn test_errors_have_messages() {
        let errors = [
            ConfigError::MinimumVoltageUnset,
            ConfigError::TargetNotAboveThreshold,
            ConfigError::InvalidProportionalGain,
        ];
        for it in errors {
            assert!(!it.to_string().is_empty());
        }
    }
}

mod test_regulator_law {

    use super::test_regen::*;
    use super::*;

    #[test]
    fn test_first_active_tick_saturates() {
        let (regulator, state) = make_regulator();

        // error = 1 V, integral = 0.001 V·s, derivative = 1000 V/s
        // 20 · 1 + 5 · 0.001 + 0.5 · 1000 = 520.005 A, clamped to 50 A
        let (output, state) = regulator.compute(state, 47.0);
        assert_eq!(output, 50.0);
        assert_relative_eq!(state.integral(), 0.001);
        assert_eq!(state.previous_error(), 1.0);

        // The same voltage again has no derivative kick
        let (output, state) = regulator.compute(state, 47.0);
        assert_relative_eq!(output, 20.01, epsilon = 1e-9);
        assert_relative_eq!(state.integral(), 0.002);
    }

    #[test]
    fn test_raw_output_is_unclamped_and_pure() {
        let (regulator, state) = make_regulator();
        assert_relative_eq!(regulator.raw_output(state, 47.0), 520.005, epsilon = 1e-9);
        assert!(state.is_reset());

        // Outside the active zone the raw output is zero too
        assert_eq!(regulator.raw_output(state, 48.0), 0.0);
    }

    #[test]
    fn test_works_on_f32() {
        let regulator = FuncRegulator::new(RegulatorConfig::<f32>::standard());
        let (output, _) = regulator.compute(PidState::new(), 47.0);
        assert_eq!(output, 50.0);
    }

    #[test]
    fn test_reset_above_threshold() {
        let (regulator, mut state) = make_regulator();
        settle(&regulator, &mut state, 46.0, 20);
        assert!(!state.is_reset());

        // A healthy bus wipes the history and produces nothing
        assert_eq!(regulator.update(&mut state, 48.0), 0.0);
        assert!(state.is_reset());

        // And keeps it wiped
        assert_eq!(regulator.update(&mut state, 50.0), 0.0);
        assert_eq!(state, PidState::new());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (regulator, mut state) = make_regulator();
        assert!(!regulator.is_in_active_zone(47.5));
        assert_eq!(regulator.update(&mut state, 47.5), 0.0);
        assert!(state.is_reset());

        let just_below = 47.5 - 1e-9;
        assert!(regulator.is_in_active_zone(just_below));
        assert!(regulator.update(&mut state, just_below) > 0.0);
        assert!(!state.is_reset());
    }

    #[test]
    fn test_negative_output_is_floored() {
        let (regulator, mut state) = make_regulator();
        settle(&regulator, &mut state, 46.0, 1);

        // A fast recovery towards the threshold makes the derivative term dominate:
        // (0.6 − 2) / 0.001 · 0.5 = −700 A
        assert!(regulator.raw_output(state, 47.4) < 0.0);
        assert_eq!(regulator.update(&mut state, 47.4), 0.0);

        // The history is kept; only the output is clamped
        assert_relative_eq!(state.previous_error(), 0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_output_clamped_to_max_current() {
        let config = RegulatorConfig::standard()
            .to_builder()
            .max_current(5.0)
            .build()
            .unwrap();
        let regulator = FuncRegulator::new(config);
        let mut state = PidState::new();
        assert_eq!(regulator.update(&mut state, 46.0), 5.0);
        assert_eq!(settle(&regulator, &mut state, 46.0, 100), 5.0);
    }

    #[test]
    fn test_integral_clamped_every_tick() {
        let config = RegulatorConfig::standard()
            .to_builder()
            .gains(1.0, 1.0, 0.0)
            .build()
            .unwrap();
        let regulator = FuncRegulator::new(config);
        let mut state = PidState::new();

        // 2 V of error accumulates 0.002 V·s per tick and reaches the 10 V·s clamp after 5000
        let output = settle(&regulator, &mut state, 46.0, 6000);
        assert_eq!(state.integral(), 10.0);
        assert_relative_eq!(output, 12.0, epsilon = 1e-9);

        // No windup to unwind: a healthy bus resets immediately
        assert_eq!(regulator.update(&mut state, 47.5), 0.0);
        assert_eq!(state.integral(), 0.0);
    }

    #[test]
    fn test_stateful_matches_functional() {
        let (regulator, mut state) = make_regulator();
        let mut stateful = make_stateful_regulator();

        let voltages = [47.0, 46.5, 46.8, 47.3, 47.6, 47.2, 44.0, 46.0];
        for v in voltages {
            let expected = regulator.update(&mut state, v);
            assert_eq!(stateful.compute(v), expected);
            assert_eq!(stateful.state(), &state);
        }

        stateful.reset();
        assert!(stateful.state().is_reset());
    }

    #[test]
    fn test_stateful_with_envelope() {
        let mut stateful = make_stateful_regulator();
        stateful.compute(46.0);

        let decision = stateful.compute_with_envelope(44.0);
        assert_eq!(decision.zone, Zone::BelowMinimum);
        assert_eq!(decision.command, ControlCommand::Release);
        assert!(stateful.state().is_reset());
    }
}

mod test_safety_envelope {

    use super::test_regen::*;
    use super::*;

    #[test]
    fn test_drop_below_floor_disables_output() {
        let (regulator, mut state) = make_regulator();
        settle(&regulator, &mut state, 46.0, 100);

        let decision = regulator.step(44.0, &mut state);
        assert_eq!(decision.zone, Zone::BelowMinimum);
        assert_eq!(decision.magnitude, 0.0);
        assert_eq!(decision.command, ControlCommand::Release);
        assert!(state.is_reset());

        // Recovering above the floor starts from a clean slate, derivative kick included
        let decision = regulator.step(46.0, &mut state);
        assert_eq!(decision.zone, Zone::Active);
        assert_eq!(decision.command, ControlCommand::Current(-50.0));
    }

    #[test]
    fn test_floor_is_inclusive() {
        let (regulator, mut state) = make_regulator();
        let decision = regulator.step(45.0, &mut state);
        assert_eq!(decision.zone, Zone::Active);
        assert_eq!(decision.magnitude, 50.0);
    }

    #[test]
    fn test_hardened_floor_keeps_regulating() {
        let (regulator, mut state) = make_hardened_regulator();
        for v in [44.0, 40.0] {
            let decision = regulator.step(v, &mut state);
            assert_eq!(decision.zone, Zone::Active);
            assert_eq!(decision.command, ControlCommand::Current(-50.0));
        }

        let decision = regulator.step(35.0, &mut state);
        assert_eq!(decision.zone, Zone::BelowMinimum);
        assert!(decision.command.is_release());
    }

    #[test]
    fn test_idle_above_threshold() {
        let (regulator, mut state) = make_regulator();
        let decision = regulator.step(48.0, &mut state);
        assert_eq!(decision.zone, Zone::Idle);
        assert_eq!(decision.magnitude, 0.0);
        assert_eq!(decision.command, ControlCommand::Release);
    }

    #[test]
    fn test_active_zero_output_releases() {
        let (regulator, mut state) = make_regulator();
        regulator.step(46.0, &mut state);

        // The floored output of a fast recovery is reported as active, not idle
        let decision = regulator.step(47.4, &mut state);
        assert_eq!(decision.zone, Zone::Active);
        assert_eq!(decision.magnitude, 0.0);
        assert!(decision.command.is_release());
    }

    #[test]
    fn test_release_deadband() {
        let envelope = SafetyEnvelope::from_config(&RegulatorConfig::<f64>::standard());
        assert_eq!(envelope.command(0.0), ControlCommand::Release);
        assert_eq!(envelope.command(0.05), ControlCommand::Release);
        assert_eq!(envelope.command(0.1), ControlCommand::Release);
        assert_eq!(envelope.command(0.2), ControlCommand::Current(-0.2));
        assert_eq!(envelope.command(0.2).current(), Some(-0.2));
    }

    #[test]
    fn test_classify() {
        let envelope = SafetyEnvelope::from_config(&RegulatorConfig::<f64>::standard());
        assert_eq!(envelope.classify(50.0), Zone::Idle);
        assert_eq!(envelope.classify(47.5), Zone::Idle);
        assert_eq!(envelope.classify(47.0), Zone::Active);
        assert_eq!(envelope.classify(45.0), Zone::Active);
        assert_eq!(envelope.classify(44.99), Zone::BelowMinimum);

        // An unreadable voltage is never tagged as regulating
        assert_eq!(envelope.classify(f64::NAN), Zone::Idle);
    }

    #[test]
    fn test_nan_voltage_is_idle() {
        let (regulator, mut state) = make_regulator();
        regulator.step(46.0, &mut state);

        let decision = regulator.step(f64::NAN, &mut state);
        assert!(!regulator.is_in_active_zone(f64::NAN));
        assert_eq!(decision.zone, Zone::Idle);
        assert_eq!(decision.magnitude, 0.0);
        assert_eq!(decision.command, ControlCommand::Release);
        assert!(state.is_reset());
    }

    #[test]
    fn test_is_regen_active() {
        let envelope = SafetyEnvelope::from_config(&RegulatorConfig::<f64>::standard());
        let cases = [
            (47.5, false),
            (47.49, true),
            (45.0, false),
            (45.01, true),
            (44.0, false),
            (50.0, false),
        ];
        for (voltage, expected) in cases {
            assert_eq!(envelope.is_regen_active(voltage), expected, "at {voltage} V");
        }
    }
}
