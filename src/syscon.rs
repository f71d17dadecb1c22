// Licensed under the Apache-2.0 license

//! System control for the I2C driver: clock gating, reset lines, kernel clock
//! selection, fast-mode-plus drive and pin configuration.
//!
//! [`SysCon`] drives the STM32F3 RCC, SYSCFG and GPIO blocks directly. Clock
//! tree *configuration* is left to the board; this module only reads it back.

use crate::i2c::registers::Mmio;
use crate::pinmap::{I2cName, PinFunction, PinMode, PinName, Port, Pull};
use fugit::HertzU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockId {
    ClkI2c1,
    ClkSyscfg,
    ClkGpioA,
    ClkGpioB,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResetId {
    RstI2c1,
}

/// Kernel clock feeding the I2C timing generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum I2cClockSource {
    Hsi,
    SysClk,
}

impl From<I2cName> for ClockId {
    fn from(i2c: I2cName) -> Self {
        match i2c {
            I2cName::I2c1 => ClockId::ClkI2c1,
        }
    }
}

impl From<I2cName> for ResetId {
    fn from(i2c: I2cName) -> Self {
        match i2c {
            I2cName::I2c1 => ResetId::RstI2c1,
        }
    }
}

impl From<Port> for ClockId {
    fn from(port: Port) -> Self {
        match port {
            Port::A => ClockId::ClkGpioA,
            Port::B => ClockId::ClkGpioB,
        }
    }
}

pub trait SystemControl {
    fn enable(&mut self, clock: ClockId);

    fn set_i2c_clock_source(&mut self, i2c: I2cName, source: I2cClockSource);

    /// Current core (SYSCLK after AHB prescaler) frequency.
    fn core_clock(&mut self) -> HertzU32;

    fn reset_assert(&mut self, reset: ResetId);

    fn reset_deassert(&mut self, reset: ResetId);

    /// Extended drive strength needed above 400 kHz.
    fn set_fast_mode_plus(&mut self, i2c: I2cName, enable: bool);

    fn configure_pin(&mut self, pin: PinName, function: PinFunction);
}

impl<S: SystemControl + ?Sized> SystemControl for &mut S {
    fn enable(&mut self, clock: ClockId) {
        (**self).enable(clock);
    }

    fn set_i2c_clock_source(&mut self, i2c: I2cName, source: I2cClockSource) {
        (**self).set_i2c_clock_source(i2c, source);
    }

    fn core_clock(&mut self) -> HertzU32 {
        (**self).core_clock()
    }

    fn reset_assert(&mut self, reset: ResetId) {
        (**self).reset_assert(reset);
    }

    fn reset_deassert(&mut self, reset: ResetId) {
        (**self).reset_deassert(reset);
    }

    fn set_fast_mode_plus(&mut self, i2c: I2cName, enable: bool) {
        (**self).set_fast_mode_plus(i2c, enable);
    }

    fn configure_pin(&mut self, pin: PinName, function: PinFunction) {
        (**self).configure_pin(pin, function);
    }
}

pub const RCC_BASE: usize = 0x4002_1000;
pub const SYSCFG_BASE: usize = 0x4001_0000;
pub const GPIOA_BASE: usize = 0x4800_0000;
pub const GPIOB_BASE: usize = 0x4800_0400;

pub const HSI_VALUE: HertzU32 = HertzU32::from_raw(8_000_000);

mod rcc {
    pub const CFGR: usize = 0x04;
    pub const APB1RSTR: usize = 0x10;
    pub const AHBENR: usize = 0x14;
    pub const APB2ENR: usize = 0x18;
    pub const APB1ENR: usize = 0x1C;
    pub const CFGR2: usize = 0x2C;
    pub const CFGR3: usize = 0x30;

    pub const I2C1EN: u32 = 1 << 21;
    pub const I2C1RST: u32 = 1 << 21;
    pub const SYSCFGEN: u32 = 1 << 0;
    pub const IOPAEN: u32 = 1 << 17;
    pub const IOPBEN: u32 = 1 << 18;
    pub const I2C1SW: u32 = 1 << 4;

    pub const SWS_SHIFT: u32 = 2;
    pub const SWS: u32 = 0b11 << SWS_SHIFT;
    pub const HPRE_SHIFT: u32 = 4;
    pub const HPRE: u32 = 0xF << HPRE_SHIFT;
    pub const PLLSRC: u32 = 1 << 16;
    pub const PLLMUL_SHIFT: u32 = 18;
    pub const PLLMUL: u32 = 0xF << PLLMUL_SHIFT;
    pub const PREDIV: u32 = 0xF;
}

mod syscfg {
    pub const CFGR1: usize = 0x00;
    pub const I2C1_FMP: u32 = 1 << 20;
}

mod gpio {
    pub const MODER: usize = 0x00;
    pub const OTYPER: usize = 0x04;
    pub const OSPEEDR: usize = 0x08;
    pub const PUPDR: usize = 0x0C;
    pub const AFRL: usize = 0x20;
    pub const AFRH: usize = 0x24;
}

/// Right shift applied by the AHB prescaler, indexed by CFGR.HPRE.
const AHB_PRESC_SHIFT: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 6, 7, 8, 9];

/// Computes the core clock from RCC CFGR/CFGR2 the way `SystemCoreClockUpdate`
/// does on the F3 family.
#[must_use]
pub fn core_clock_from_rcc(cfgr: u32, cfgr2: u32, hse: HertzU32) -> HertzU32 {
    let sysclk = match (cfgr & rcc::SWS) >> rcc::SWS_SHIFT {
        0b01 => hse.raw(),
        0b10 => {
            // PLLMUL 0b1110 and 0b1111 both mean x16.
            let mul = (((cfgr & rcc::PLLMUL) >> rcc::PLLMUL_SHIFT) + 2).min(16);
            if cfgr & rcc::PLLSRC == 0 {
                (HSI_VALUE.raw() >> 1) * mul
            } else {
                let prediv = (cfgr2 & rcc::PREDIV) + 1;
                (hse.raw() / prediv) * mul
            }
        }
        _ => HSI_VALUE.raw(),
    };
    let hpre = ((cfgr & rcc::HPRE) >> rcc::HPRE_SHIFT) as usize;
    let shift = AHB_PRESC_SHIFT.get(hpre).copied().unwrap_or(0);
    HertzU32::from_raw(sysclk >> shift)
}

/// STM32F3 system controller.
pub struct SysCon {
    rcc: Mmio,
    syscfg: Mmio,
    gpioa: Mmio,
    gpiob: Mmio,
    hse: HertzU32,
}

impl SysCon {
    /// # Safety
    ///
    /// Takes ownership of RCC, SYSCFG, GPIOA and GPIOB. No other code may
    /// write those blocks while the returned value lives.
    #[must_use]
    pub unsafe fn new(hse: HertzU32) -> Self {
        Self::with_bases(RCC_BASE, SYSCFG_BASE, GPIOA_BASE, GPIOB_BASE, hse)
    }

    /// # Safety
    ///
    /// Every base must point to a register block with the STM32F3 layout.
    #[must_use]
    pub unsafe fn with_bases(
        rcc: usize,
        syscfg: usize,
        gpioa: usize,
        gpiob: usize,
        hse: HertzU32,
    ) -> Self {
        Self {
            rcc: Mmio::new(rcc),
            syscfg: Mmio::new(syscfg),
            gpioa: Mmio::new(gpioa),
            gpiob: Mmio::new(gpiob),
            hse,
        }
    }

    fn port(&mut self, port: Port) -> &mut Mmio {
        match port {
            Port::A => &mut self.gpioa,
            Port::B => &mut self.gpiob,
        }
    }
}

impl SystemControl for SysCon {
    fn enable(&mut self, clock: ClockId) {
        let (offset, bit) = match clock {
            ClockId::ClkI2c1 => (rcc::APB1ENR, rcc::I2C1EN),
            ClockId::ClkSyscfg => (rcc::APB2ENR, rcc::SYSCFGEN),
            ClockId::ClkGpioA => (rcc::AHBENR, rcc::IOPAEN),
            ClockId::ClkGpioB => (rcc::AHBENR, rcc::IOPBEN),
        };
        // SAFETY: enable registers are RCC offsets.
        unsafe { self.rcc.modify_offset(offset, |v| v | bit) };
    }

    fn set_i2c_clock_source(&mut self, i2c: I2cName, source: I2cClockSource) {
        let bit = match i2c {
            I2cName::I2c1 => rcc::I2C1SW,
        };
        // SAFETY: CFGR3 is an RCC offset.
        unsafe {
            self.rcc.modify_offset(rcc::CFGR3, |v| match source {
                I2cClockSource::Hsi => v & !bit,
                I2cClockSource::SysClk => v | bit,
            });
        }
    }

    fn core_clock(&mut self) -> HertzU32 {
        // SAFETY: CFGR and CFGR2 are RCC offsets.
        let (cfgr, cfgr2) = unsafe {
            (
                self.rcc.read_offset(rcc::CFGR),
                self.rcc.read_offset(rcc::CFGR2),
            )
        };
        core_clock_from_rcc(cfgr, cfgr2, self.hse)
    }

    fn reset_assert(&mut self, reset: ResetId) {
        match reset {
            // SAFETY: APB1RSTR is an RCC offset.
            ResetId::RstI2c1 => unsafe {
                self.rcc.modify_offset(rcc::APB1RSTR, |v| v | rcc::I2C1RST);
            },
        }
    }

    fn reset_deassert(&mut self, reset: ResetId) {
        match reset {
            // SAFETY: APB1RSTR is an RCC offset.
            ResetId::RstI2c1 => unsafe {
                self.rcc.modify_offset(rcc::APB1RSTR, |v| v & !rcc::I2C1RST);
            },
        }
    }

    fn set_fast_mode_plus(&mut self, i2c: I2cName, enable: bool) {
        let bit = match i2c {
            I2cName::I2c1 => syscfg::I2C1_FMP,
        };
        self.enable(ClockId::ClkSyscfg);
        // SAFETY: CFGR1 is a SYSCFG offset.
        unsafe {
            self.syscfg.modify_offset(syscfg::CFGR1, |v| {
                if enable {
                    v | bit
                } else {
                    v & !bit
                }
            });
        }
    }

    fn configure_pin(&mut self, pin: PinName, function: PinFunction) {
        self.enable(ClockId::from(pin.port()));

        let index = u32::from(pin.index());
        let (mode, open_drain) = match function.mode {
            PinMode::Input => (0b00, false),
            PinMode::Output => (0b01, false),
            PinMode::AlternatePushPull => (0b10, false),
            PinMode::AlternateOpenDrain => (0b10, true),
            PinMode::Analog => (0b11, false),
        };
        let pull = match function.pull {
            Pull::None => 0b00,
            Pull::Up => 0b01,
            Pull::Down => 0b10,
        };
        let (afr, af_shift) = if index < 8 {
            (gpio::AFRL, index * 4)
        } else {
            (gpio::AFRH, (index - 8) * 4)
        };
        let af = u32::from(function.alternate & 0xF);

        let regs = self.port(pin.port());
        // SAFETY: all offsets are GPIO port registers.
        unsafe {
            // AF number first so the pin never drives the wrong function.
            regs.modify_offset(afr, |v| (v & !(0xF << af_shift)) | (af << af_shift));
            regs.modify_offset(gpio::OSPEEDR, |v| v | (0b11 << (index * 2)));
            regs.modify_offset(gpio::OTYPER, |v| {
                if open_drain {
                    v | (1 << index)
                } else {
                    v & !(1 << index)
                }
            });
            regs.modify_offset(gpio::PUPDR, |v| (v & !(0b11 << (index * 2))) | (pull << (index * 2)));
            regs.modify_offset(gpio::MODER, |v| (v & !(0b11 << (index * 2))) | (mode << (index * 2)));
        }
    }
}
