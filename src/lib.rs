#![warn(missing_docs)]

//! # Regenerative Braking Voltage Regulator
//!
//! This library keeps a DC power bus near a target voltage by commanding braking current from an
//! electric motor. It is meant to run as a periodic control task on a motor-control platform.
//!
//! It includes both functional and stateful implementations of the control law, an open-loop
//! alternative for speed-driven generation, and a thread-backed periodic task that drives either
//! of them against a motor backend.
//!
//! ## Features
//!
//! - A bus-voltage PID law built for regeneration:
//!   - Activation zone: the law only acts below a threshold voltage and resets itself above it.
//!   - Anti reset-windup: the integral is clamped on every update.
//!   - Asymmetric output clamp: braking current is never negative.
//!
//! - A safety envelope evaluated after the PID law on every tick:
//!   - Below an absolute voltage floor, the output is forced to zero and the state is reset.
//!   - Every zero output is tagged with the branch that produced it.
//!   - Near-zero commands become a motor release instead of a tiny current.
//!
//! - An open-loop generator law that ramps current with speed above a start ratio.
//!
//! - A periodic control task (`std` feature) with a cooperative stop that joins the worker.
//!
//! ## Usage
//!
//! ### Functional regulator
//!
//! The functional regulator holds no mutable state. The `compute` method is **functionally pure**,
//! which makes it easy to test and to reason about.
//!
//! ```rust
//! use regen_pid::config::RegulatorConfig;
//! use regen_pid::pid::{FuncRegulator, PidState};
//!
//! let regulator = FuncRegulator::new(RegulatorConfig::<f64>::standard());
//! let state = PidState::new();
//!
//! // 47.0 V sits inside the active zone, so the law brakes
//! let (current, state) = regulator.compute(state, 47.0);
//! assert_eq!(current, 50.0);
//!
//! // Back above the threshold, the state is wiped
//! let (current, state) = regulator.compute(state, 48.0);
//! assert_eq!(current, 0.0);
//! assert_eq!(state, PidState::new());
//! ```
//!
//! ### Regulator with safety envelope
//!
//! The `ControlLaw` implementation combines the PID law, the safety envelope and the release
//! deadband, and reports which branch fired.
//!
//! ```rust
//! use regen_pid::config::RegulatorConfig;
//! use regen_pid::law::{ControlCommand, ControlLaw};
//! use regen_pid::pid::{FuncRegulator, PidState};
//! use regen_pid::safety::Zone;
//!
//! let law = FuncRegulator::new(RegulatorConfig::<f64>::standard());
//! let mut state = PidState::new();
//!
//! let decision = law.step(44.0, &mut state);
//! assert_eq!(decision.zone, Zone::BelowMinimum);
//! assert_eq!(decision.command, ControlCommand::Release);
//! ```
//!
//! ### Choosing a voltage floor
//!
//! Two floors are in use for 48 V buses and neither is implied: pick a preset or set it
//! explicitly.
//!
//! ```rust
//! use regen_pid::config::{ConfigError, RegulatorConfig, RegulatorConfigBuilder};
//!
//! let hardened = RegulatorConfig::<f32>::hardened();
//! assert_eq!(hardened.min_voltage(), 36.0);
//!
//! let unset = RegulatorConfigBuilder::<f32>::default().build();
//! assert_eq!(unset.map(|_| ()), Err(ConfigError::MinimumVoltageUnset));
//! ```
//!
//! ## License
//!
//! Licensed under the MIT license.
#![no_std]

#[cfg(feature = "std")]
extern crate std;

/// Controller and generator configuration, with validating builders.
pub mod config;

/// The bus-voltage PID law.
pub mod pid;

/// The voltage floor and the command-application policy.
pub mod safety;

/// The open-loop speed-ramped generator law.
pub mod generator;

/// The interface shared by every control law run by the periodic task.
pub mod law;

/// The motor backend interface.
pub mod backend;

/// Observability counters kept apart from the control state.
pub mod stats;

/// Scheduler ticks and the sleep primitive used by the periodic task.
pub mod time;

/// The periodic control task.
#[cfg(feature = "std")]
pub mod task;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(all(doctest, feature = "std"))]
pub struct ReadmeDoctests;

use num_traits::Float;

/// Floating-point types the control laws can run on.
///
/// This is `f32` on a drive and usually `f64` in analysis and tests. The `From<f32>` bound lets
/// presets and unit conversions be written as literals.
pub trait Real: Float + From<f32> + core::fmt::Debug + Send + Sync + 'static {}

impl<T> Real for T where T: Float + From<f32> + core::fmt::Debug + Send + Sync + 'static {}

/// Converts an `f32` literal into any `Real`.
#[inline]
pub(crate) fn lit<F: Real>(value: f32) -> F {
    <F as From<f32>>::from(value)
}
