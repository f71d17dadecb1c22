// Licensed under the Apache-2.0 license

//! # I2C Hardware Instantiation for STM32F334
//!
//! Builds ready-to-use [`I2cController`]s from a pin pair. The pin pair decides
//! which controller is used; the controller decides which register window the
//! driver talks to.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use embedded_hal::i2c::I2c;
//! use fugit::RateExtU32;
//! use stm32_i2c_ddk::i2c::hardware_instantiation::instantiate_i2c1;
//! use stm32_i2c_ddk::pinmap::PinName;
//!
//! // SAFETY: nothing else drives I2C1, RCC, SYSCFG or GPIOA/B.
//! let mut i2c = unsafe { instantiate_i2c1(PinName::PB9, PinName::PB8, 8.MHz()) };
//! i2c.write(0x68, &[0x6B, 0x00])?;
//! ```
//!
//! ## Thread Safety
//!
//! The controllers use `NoOpLogger` and are designed for single-threaded
//! embedded use.

use crate::common::NoOpLogger;
use crate::i2c::common::I2cConfig;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::registers::{Mmio, RegisterBlock};
use crate::i2c::stm32_i2c::Stm32I2c;
use crate::i2c::system_setup::I2cSystemSetup;
use crate::pinmap::{I2cName, PinName};
use crate::syscon::{SysCon, SystemControl};
use fugit::HertzU32;

/// Type alias for an I2C controller without logging.
pub type I2cControllerNoLog<R, S> = I2cController<Stm32I2c<R, S>, NoOpLogger>;

/// Production controller on the memory-mapped register blocks.
pub type Stm32I2cController = I2cControllerNoLog<Mmio, SysCon>;

/// Creates a controller for the pin pair, with `map_registers` supplying the
/// register block of whichever controller the pins resolve to.
///
/// # Panics
///
/// If no controller maps to both pins.
pub fn instantiate<R, S, F>(
    map_registers: F,
    sys: S,
    sda: PinName,
    scl: PinName,
    config: &I2cConfig,
) -> I2cControllerNoLog<R, S>
where
    R: RegisterBlock,
    S: SystemControl,
    F: FnOnce(I2cName) -> R,
{
    let Some(pins) = I2cSystemSetup::resolve_pins(sda, scl) else {
        panic!("pins {sda:?}/{scl:?} do not map to a single I2C controller");
    };
    let regs = map_registers(pins.instance);
    I2cController::new(Stm32I2c::init_with_config(regs, sys, sda, scl, config))
}

/// Creates the I2C1 controller with the default configuration (100 kHz).
///
/// `hse` is the external oscillator frequency, used only when the core clock
/// is derived from HSE.
///
/// # Safety
///
/// The caller must be the only user of the I2C1, RCC, SYSCFG, GPIOA and GPIOB
/// register blocks for the lifetime of the returned controller.
///
/// # Panics
///
/// If the pins are not an I2C1 SDA/SCL pair.
pub unsafe fn instantiate_i2c1(sda: PinName, scl: PinName, hse: HertzU32) -> Stm32I2cController {
    instantiate_hardware(sda, scl, hse, &I2cConfig::default())
}

/// Creates the controller that owns `sda`/`scl` with an explicit configuration.
///
/// # Safety
///
/// As for [`instantiate_i2c1`].
///
/// # Panics
///
/// If no controller maps to both pins.
pub unsafe fn instantiate_hardware(
    sda: PinName,
    scl: PinName,
    hse: HertzU32,
    config: &I2cConfig,
) -> Stm32I2cController {
    // SAFETY: exclusive access to the system blocks is the caller's contract.
    let sys = unsafe { SysCon::new(hse) };
    instantiate(
        // SAFETY: the base comes from the controller the pins resolved to.
        |instance| unsafe { Mmio::new(instance.base_address()) },
        sys,
        sda,
        scl,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::common::{I2cConfigBuilder, I2cSpeed};
    use crate::i2c::registers::Reg;
    use crate::i2c::sim::{BusEvent, SimI2c};
    use embedded_hal::i2c::I2c;

    #[test]
    fn instantiate_maps_the_resolved_controller() {
        let sim = SimI2c::new();
        let mut seen = None;

        let mut i2c = instantiate(
            |instance| {
                seen = Some(instance);
                &sim
            },
            &sim,
            PinName::PB7,
            PinName::PB6,
            &I2cConfig::default(),
        );

        assert_eq!(seen, Some(I2cName::I2c1));
        i2c.write(0x50, &[0xAA]).unwrap();
        assert!(sim.bus_events().contains(&BusEvent::Byte(0xAA)));
    }

    #[test]
    fn instantiate_applies_config() {
        let sim = SimI2c::new();
        let config = I2cConfigBuilder::new().speed(I2cSpeed::Fast).build();

        let i2c = instantiate(|_| &sim, &sim, PinName::PB9, PinName::PB8, &config);

        assert_eq!(i2c.hardware.speed(), I2cSpeed::Fast);
        assert_eq!(sim.register(Reg::Timingr), 0x00E2_2163);
    }

    #[test]
    #[should_panic(expected = "do not map")]
    fn instantiate_rejects_unmapped_pins() {
        let sim = SimI2c::new();
        let _ = instantiate(|_| &sim, &sim, PinName::PA0, PinName::PA1, &I2cConfig::default());
    }
}
