// Licensed under the Apache-2.0 license

//! Common types and constants for the STM32 I2C driver modules.
//!
//! This module provides shared definitions for error handling, bus speeds,
//! driver configuration and slave-mode events.

use crate::i2c::timeout::Timeouts;
use embedded_hal::i2c::{ErrorKind, SevenBitAddress};
use fugit::HertzU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    /// Maps a bus rate onto one of the three supported speed grades.
    #[must_use]
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            100_000 => Some(I2cSpeed::Standard),
            400_000 => Some(I2cSpeed::Fast),
            1_000_000 => Some(I2cSpeed::FastPlus),
            _ => None,
        }
    }

    #[must_use]
    pub fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }
}

impl TryFrom<HertzU32> for I2cSpeed {
    type Error = Error;

    fn try_from(rate: HertzU32) -> Result<Self, Self::Error> {
        I2cSpeed::from_hz(rate.raw()).ok_or(Error::UnsupportedSpeed(rate.raw()))
    }
}

/// Status flag a blocking wait was polling for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// ISR.BUSY after a START request.
    BusBusy,
    /// ISR.TXIS before writing TXDR.
    TxInterrupt,
    /// ISR.RXNE before reading RXDR.
    RxNotEmpty,
    /// ISR.TC once NBYTES have moved.
    TransferComplete,
    /// ISR.STOPF after a STOP request.
    StopDetected,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A bounded wait ran out of budget.
    Timeout(Event),
    /// NBYTES is eight bits wide.
    TransferTooLong(usize),
    /// Only returned by the fallible `TryFrom<HertzU32>` conversion.
    UnsupportedSpeed(u32),
    /// No TIMINGR value is known for this core clock and none was supplied.
    UnknownCoreClock(u32),
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout(_)
            | Error::TransferTooLong(_)
            | Error::UnsupportedSpeed(_)
            | Error::UnknownCoreClock(_) => ErrorKind::Other,
        }
    }
}

/// What multi-byte transfers do when a single byte wait times out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ByteErrorPolicy {
    /// Log and keep going; the transfer only fails on its completion wait.
    #[default]
    Continue,
    /// Abort the transfer on the first byte timeout.
    Propagate,
}

/// Address-match classification reported by `slave_receive`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SlaveEvent {
    /// Not addressed.
    NoData = 0,
    /// The master requested a read; this slave transmits.
    ReadAddressed = 1,
    /// The master is writing to the general call address.
    WriteGeneral = 2,
    /// The master is writing to this slave.
    WriteAddressed = 3,
}

/// Slave-mode configuration snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Whether OA1 is enabled
    pub enabled: bool,
    /// Programmed own address
    pub address: Option<SevenBitAddress>,
    /// Whether an address match is pending
    pub addressed: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub timeouts: Timeouts,
    pub byte_errors: ByteErrorPolicy,
    /// Raw TIMINGR value used when the core clock has no table entry.
    pub timing_override: Option<u32>,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    timeouts: Timeouts,
    byte_errors: ByteErrorPolicy,
    timing_override: Option<u32>,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            timeouts: Timeouts::default(),
            byte_errors: ByteErrorPolicy::Continue,
            timing_override: None,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn flag_timeout(mut self, ticks: u32) -> Self {
        self.timeouts.flag = ticks;
        self
    }
    #[must_use]
    pub fn long_timeout(mut self, ticks: u32) -> Self {
        self.timeouts.long = ticks;
        self
    }
    #[must_use]
    pub fn byte_errors(mut self, policy: ByteErrorPolicy) -> Self {
        self.byte_errors = policy;
        self
    }
    #[must_use]
    pub fn timing_override(mut self, timing: u32) -> Self {
        self.timing_override = Some(timing);
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            timeouts: self.timeouts,
            byte_errors: self.byte_errors,
            timing_override: self.timing_override,
        }
    }
}
