// Licensed under the Apache-2.0 license

//! TIMINGR values for the supported core clocks.
//!
//! Values come from the vendor timing tool (AN4235) with SYSCLK as I2C kernel
//! clock, analog filter on and digital filter off. Rise/fall time assumptions
//! are 120ns/120ns for standard and fast mode, 120ns/10ns for fast-mode-plus.

use crate::i2c::common::I2cSpeed;
use fugit::HertzU32;

pub const CORE_CLOCK_64MHZ: HertzU32 = HertzU32::from_raw(64_000_000);
pub const CORE_CLOCK_72MHZ: HertzU32 = HertzU32::from_raw(72_000_000);

/// Bits of TIMINGR the controller actually implements.
pub const TIMING_CLEAR_MASK: u32 = 0xF0FF_FFFF;

/// Looks up the TIMINGR value for `speed` at `core_clock`.
///
/// Returns `None` for any core clock other than 64 MHz and 72 MHz.
#[must_use]
pub fn timing_for(core_clock: HertzU32, speed: I2cSpeed) -> Option<u32> {
    let timing = match (core_clock.raw(), speed) {
        (64_000_000, I2cSpeed::Standard) => 0x10B1_7DB4,
        (64_000_000, I2cSpeed::Fast) => 0x00E2_2163,
        (64_000_000, I2cSpeed::FastPlus) => 0x00A0_0D1E,
        (72_000_000, I2cSpeed::Standard) => 0x10D2_8DCB,
        (72_000_000, I2cSpeed::Fast) => 0x00F3_2571,
        (72_000_000, I2cSpeed::FastPlus) => 0x00C0_0D24,
        _ => return None,
    };
    Some(timing)
}
