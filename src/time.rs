// Scheduler ticks and the sleep primitive the periodic task runs on
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

use core::ops::Add;
use core::time::Duration;

/// Tick frequency of [`StdScheduler`] when none is given, matching a 10 kHz RTOS system tick.
pub const DEFAULT_TICK_HZ: u32 = 10_000;

/// A number of scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Converts this tick count to wall-clock time at `frequency_hz`.
    ///
    /// A zero frequency is treated as 1 Hz.
    pub fn to_duration(self, frequency_hz: u32) -> Duration {
        Duration::from_secs(u64::from(self.0)) / frequency_hz.max(1)
    }
}

impl Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Ticks(self.0.saturating_add(rhs.0))
    }
}

/// Returns the number of scheduler ticks in one control period.
///
/// The integer division rounds down, and a control rate above the scheduler frequency would
/// round to zero ticks. A zero-length sleep never yields to co-resident tasks, so the result is
/// never less than one tick.
pub fn period_ticks(scheduler_hz: u32, update_rate_hz: u32) -> Ticks {
    Ticks((scheduler_hz / update_rate_hz.max(1)).max(1))
}

/// The host scheduler's sleep primitive.
///
/// The periodic task calls [`sleep`](Self::sleep) once per tick with the control period, and the
/// scheduler blocks for whatever is left of that period.
pub trait Scheduler {
    /// Returns the scheduler tick frequency.
    fn frequency_hz(&self) -> u32;

    /// Blocks the calling thread for the remainder of a period of `ticks`.
    fn sleep(&mut self, ticks: Ticks);
}

/// A [`Scheduler`] backed by `std::thread::sleep`.
#[cfg(feature = "std")]
mod std_scheduler {

    use super::{Duration, Scheduler, Ticks, DEFAULT_TICK_HZ};
    use std::time::Instant;

    /// Sleeps on the OS scheduler, pacing periods from the previous wake-up so that the time
    /// spent in the control step is not added to the period.
    #[derive(Debug, Clone, Copy)]
    pub struct StdScheduler {
        frequency_hz: u32,
        last_wake: Option<Instant>,
    }

    impl Default for StdScheduler {
        fn default() -> Self {
            Self::new(DEFAULT_TICK_HZ)
        }
    }

    impl StdScheduler {
        /// Creates a scheduler ticking at `frequency_hz`. Zero is treated as 1 Hz.
        pub fn new(frequency_hz: u32) -> Self {
            StdScheduler {
                frequency_hz: frequency_hz.max(1),
                last_wake: None,
            }
        }

        /// Computes how long to sleep at `now` to complete a period of `ticks`.
        ///
        /// An overrun period still sleeps one tick.
        pub(crate) fn remaining(&self, ticks: Ticks, now: Instant) -> Duration {
            let one_tick = Ticks(1).to_duration(self.frequency_hz);
            let period = ticks.to_duration(self.frequency_hz);
            let deadline = self.last_wake.unwrap_or(now) + period;
            deadline.saturating_duration_since(now).max(one_tick)
        }
    }

    impl Scheduler for StdScheduler {
        fn frequency_hz(&self) -> u32 {
            self.frequency_hz
        }

        fn sleep(&mut self, ticks: Ticks) {
            let remaining = self.remaining(ticks, Instant::now());
            std::thread::sleep(remaining);
            self.last_wake = Some(Instant::now());
        }
    }

    /// Tests that a period overrun still yields at least one tick, and that an early caller
    /// sleeps the rest of the period.
    #[cfg(test)]
    #[test]
    fn test_std_scheduler_remaining() {
        let mut scheduler = StdScheduler::new(1000);
        let start = Instant::now();
        scheduler.last_wake = Some(start);

        let early = start + Duration::from_millis(3);
        assert_eq!(
            scheduler.remaining(Ticks(10), early),
            Duration::from_millis(7)
        );

        let late = start + Duration::from_millis(25);
        assert_eq!(
            scheduler.remaining(Ticks(10), late),
            Duration::from_millis(1)
        );
    }
}

#[cfg(feature = "std")]
pub use std_scheduler::StdScheduler;
