// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! This module provides helper functions for the system-level side of bringing
//! up an I2C controller: resolving the pin pair to a controller, gating its
//! clocks, muxing its pins and pulsing its reset line. The driver itself only
//! talks to its own register block.

use crate::pinmap::{pinmap_find, pinmap_merge, I2cName, PinFunction, PinName};
use crate::pinmap::{PINMAP_I2C_SCL, PINMAP_I2C_SDA};
use crate::syscon::{ClockId, I2cClockSource, ResetId, SystemControl};
use fugit::HertzU32;

/// A pin pair resolved to one controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPins {
    pub instance: I2cName,
    pub sda: (PinName, PinFunction),
    pub scl: (PinName, PinFunction),
}

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Resolve the controller shared by `sda` and `scl`
    ///
    /// # Returns
    ///
    /// * `None` if either pin has no I2C function or the two pins belong to
    ///   different controllers
    #[must_use]
    pub fn resolve_pins(sda: PinName, scl: PinName) -> Option<ResolvedPins> {
        let sda_map = pinmap_find(sda, PINMAP_I2C_SDA)?;
        let scl_map = pinmap_find(scl, PINMAP_I2C_SCL)?;
        let instance = pinmap_merge(Some(sda_map.peripheral), Some(scl_map.peripheral))?;
        Some(ResolvedPins {
            instance,
            sda: (sda, sda_map.function),
            scl: (scl, scl_map.function),
        })
    }

    /// Complete I2C system initialization
    ///
    /// - Controller clock enable
    /// - SYSCLK selected as I2C kernel clock
    /// - SDA/SCL muxed as open-drain alternate function
    pub fn initialize_i2c_system<S>(system_controller: &mut S, pins: &ResolvedPins)
    where
        S: SystemControl,
    {
        system_controller.enable(ClockId::from(pins.instance));
        system_controller.set_i2c_clock_source(pins.instance, I2cClockSource::SysClk);

        let (sda, sda_function) = pins.sda;
        let (scl, scl_function) = pins.scl;
        system_controller.configure_pin(sda, sda_function);
        system_controller.configure_pin(scl, scl_function);
    }

    /// Get I2C source clock frequency for timing lookup
    ///
    /// The kernel clock is SYSCLK, so this is the core clock.
    pub fn get_i2c_source_frequency<S>(system_controller: &mut S) -> HertzU32
    where
        S: SystemControl,
    {
        system_controller.core_clock()
    }

    /// Reset I2C peripheral only (without full system initialization)
    ///
    /// Clears every register of the controller, including pending flags.
    pub fn reset_i2c_peripheral<S>(system_controller: &mut S, instance: I2cName)
    where
        S: SystemControl,
    {
        let reset = ResetId::from(instance);
        system_controller.reset_assert(reset);
        system_controller.reset_deassert(reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinmap::{PinMode, Pull};
    use std::collections::{HashMap, HashSet};

    struct MockSystemController {
        core_clock: HertzU32,
        enabled_clocks: HashSet<ClockId>,
        clock_sources: HashMap<I2cName, I2cClockSource>,
        reset_states: HashMap<ResetId, bool>,
        reset_pulses: u32,
        pins: HashMap<PinName, PinFunction>,
    }

    impl MockSystemController {
        fn new() -> Self {
            Self {
                core_clock: HertzU32::MHz(72),
                enabled_clocks: HashSet::new(),
                clock_sources: HashMap::new(),
                reset_states: HashMap::new(),
                reset_pulses: 0,
                pins: HashMap::new(),
            }
        }
    }

    impl SystemControl for MockSystemController {
        fn enable(&mut self, clock: ClockId) {
            self.enabled_clocks.insert(clock);
        }

        fn set_i2c_clock_source(&mut self, i2c: I2cName, source: I2cClockSource) {
            self.clock_sources.insert(i2c, source);
        }

        fn core_clock(&mut self) -> HertzU32 {
            self.core_clock
        }

        fn reset_assert(&mut self, reset: ResetId) {
            self.reset_states.insert(reset, true);
        }

        fn reset_deassert(&mut self, reset: ResetId) {
            if self.reset_states.insert(reset, false) == Some(true) {
                self.reset_pulses += 1;
            }
        }

        fn set_fast_mode_plus(&mut self, _i2c: I2cName, _enable: bool) {}

        fn configure_pin(&mut self, pin: PinName, function: PinFunction) {
            self.pins.insert(pin, function);
        }
    }

    #[test]
    fn test_resolve_pins() {
        let pins = I2cSystemSetup::resolve_pins(PinName::PB9, PinName::PB8);

        let pins = pins.expect("PB9/PB8 is an I2C1 pair");
        assert_eq!(pins.instance, I2cName::I2c1);
        assert_eq!(pins.sda.0, PinName::PB9);
        assert_eq!(pins.scl.0, PinName::PB8);
        assert_eq!(pins.sda.1.mode, PinMode::AlternateOpenDrain);
        assert_eq!(pins.scl.1.pull, Pull::None);
    }

    #[test]
    fn test_resolve_mixed_pairs() {
        // Any SDA pin combines with any SCL pin of the same controller.
        assert!(I2cSystemSetup::resolve_pins(PinName::PA14, PinName::PB6).is_some());
    }

    #[test]
    fn test_resolve_swapped_or_foreign_pins() {
        assert_eq!(I2cSystemSetup::resolve_pins(PinName::PB8, PinName::PB9), None);
        assert_eq!(I2cSystemSetup::resolve_pins(PinName::PA0, PinName::PB6), None);
        assert_eq!(I2cSystemSetup::resolve_pins(PinName::PB7, PinName::PA10), None);
    }

    #[test]
    fn test_initialize_i2c_system() {
        let mut mock = MockSystemController::new();
        let pins = I2cSystemSetup::resolve_pins(PinName::PB7, PinName::PB6).unwrap();

        I2cSystemSetup::initialize_i2c_system(&mut mock, &pins);

        assert!(mock.enabled_clocks.contains(&ClockId::ClkI2c1));
        assert_eq!(
            mock.clock_sources.get(&I2cName::I2c1),
            Some(&I2cClockSource::SysClk)
        );
        assert_eq!(mock.pins.len(), 2);
        assert_eq!(
            mock.pins.get(&PinName::PB7).map(|f| f.alternate),
            Some(4)
        );
    }

    #[test]
    fn test_get_i2c_source_frequency() {
        let mut mock = MockSystemController::new();
        mock.core_clock = HertzU32::MHz(64);

        let result = I2cSystemSetup::get_i2c_source_frequency(&mut mock);

        assert_eq!(result, HertzU32::MHz(64));
    }

    #[test]
    fn test_reset_i2c_peripheral() {
        let mut mock = MockSystemController::new();

        I2cSystemSetup::reset_i2c_peripheral(&mut mock, I2cName::I2c1);

        assert_eq!(mock.reset_states.get(&ResetId::RstI2c1), Some(&false));
        assert_eq!(mock.reset_pulses, 1);
    }
}
