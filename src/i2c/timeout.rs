// Licensed under the Apache-2.0 license

//! Bounded busy-waits.
//!
//! Every wait in the driver is bounded by a tick budget read from a
//! [`TimeSource`]. The default [`SpinTicks`] advances once per poll, so a budget
//! of N ticks is exactly N polls of the status register.

use core::convert::Infallible;

/// Flag-wait budget: start, stop, byte ready and write completion.
pub const FLAG_TIMEOUT: u32 = 0x4000;
/// Read completion budget.
pub const LONG_TIMEOUT: u32 = 0x8000;
/// Largest budget [`wait_until`] honours.
pub const MAX_BUDGET: u32 = u32::MAX - 1;

pub trait TimeSource {
    /// Monotonic tick counter. Wraps at `u32::MAX`.
    fn now(&mut self) -> u32;
}

/// Counts calls to `now`. One tick per poll.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinTicks {
    ticks: u32,
}

impl SpinTicks {
    #[must_use]
    pub const fn new() -> Self {
        Self { ticks: 0 }
    }
}

impl TimeSource for SpinTicks {
    fn now(&mut self) -> u32 {
        self.ticks = self.ticks.wrapping_add(1);
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        cortex_m::asm::nop();
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        core::hint::spin_loop();
        self.ticks
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &mut T {
    fn now(&mut self) -> u32 {
        (**self).now()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub flag: u32,
    pub long: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            flag: FLAG_TIMEOUT,
            long: LONG_TIMEOUT,
        }
    }
}

/// Budget exhausted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Expired;

/// Polls `poll` until it stops returning `WouldBlock` or `budget` ticks pass.
///
/// The condition is checked before the clock, so a ready flag is never
/// reported as a timeout. `u32::MAX` is treated as `u32::MAX - 1`, the
/// longest budget a wrapping tick counter can measure.
pub fn wait_until<T, F>(clock: &mut T, budget: u32, mut poll: F) -> Result<(), Expired>
where
    T: TimeSource,
    F: FnMut() -> nb::Result<(), Infallible>,
{
    let budget = budget.min(MAX_BUDGET);
    let start = clock.now();
    loop {
        match poll() {
            Ok(()) => return Ok(()),
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(never)) => match never {},
        }
        if clock.now().wrapping_sub(start) > budget {
            return Err(Expired);
        }
    }
}
