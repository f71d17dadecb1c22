// Licensed under the Apache-2.0 license

//! Register file of the STM32 "I2C v2" controller (F0/F3/L0/L4 families).
//!
//! The driver never touches memory directly. It goes through [`RegisterBlock`],
//! implemented by [`Mmio`] for real silicon and by the simulated bank in
//! [`crate::i2c::sim`] for host tests. Bit positions follow RM0364.

use core::ptr::{read_volatile, write_volatile};

/// Registers of one controller instance, in address order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Cr1,
    Cr2,
    Oar1,
    Oar2,
    Timingr,
    Timeoutr,
    Isr,
    Icr,
    Pecr,
    Rxdr,
    Txdr,
}

impl Reg {
    pub const COUNT: usize = 11;

    #[must_use]
    pub const fn offset(self) -> usize {
        (self as usize) * 4
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

pub mod cr1 {
    pub const PE: u32 = 1 << 0;
    pub const TXIE: u32 = 1 << 1;
    pub const RXIE: u32 = 1 << 2;
    pub const ADDRIE: u32 = 1 << 3;
    pub const NACKIE: u32 = 1 << 4;
    pub const STOPIE: u32 = 1 << 5;
    pub const TCIE: u32 = 1 << 6;
    pub const ERRIE: u32 = 1 << 7;
    pub const ANFOFF: u32 = 1 << 12;
    pub const SBC: u32 = 1 << 16;
    pub const NOSTRETCH: u32 = 1 << 17;
    pub const GCEN: u32 = 1 << 19;
}

pub mod cr2 {
    pub const SADD: u32 = 0x3FF;
    pub const RD_WRN: u32 = 1 << 10;
    pub const ADD10: u32 = 1 << 11;
    pub const START: u32 = 1 << 13;
    pub const STOP: u32 = 1 << 14;
    pub const NACK: u32 = 1 << 15;
    pub const NBYTES_SHIFT: u32 = 16;
    pub const NBYTES: u32 = 0xFF << NBYTES_SHIFT;
    pub const RELOAD: u32 = 1 << 24;
    pub const AUTOEND: u32 = 1 << 25;

    /// Software end mode: TC is raised after NBYTES and the bus is held.
    pub const SOFTEND_MODE: u32 = 0;
    pub const GENERATE_START_WRITE: u32 = START;
    pub const GENERATE_START_READ: u32 = START | RD_WRN;

    /// Fields rewritten when a new transfer is programmed.
    pub const TRANSFER_FIELDS: u32 = SADD | NBYTES | RELOAD | AUTOEND | RD_WRN | START | STOP;
}

pub mod oar1 {
    pub const OA1: u32 = 0x3FF;
    pub const OA1MODE: u32 = 1 << 10;
    pub const OA1EN: u32 = 1 << 15;
    /// OAR1 bits preserved when the 7-bit address is rewritten.
    pub const KEEP_MASK: u32 = 0xFC00;
    /// 7-bit address field, left-aligned in OA1[7:1].
    pub const OA1_7BIT: u32 = 0x00FE;
}

pub mod oar2 {
    pub const OA2EN: u32 = 1 << 15;
}

/// ISR flags. ICR clear bits sit at the same positions.
pub mod isr {
    pub const TXE: u32 = 1 << 0;
    pub const TXIS: u32 = 1 << 1;
    pub const RXNE: u32 = 1 << 2;
    pub const ADDR: u32 = 1 << 3;
    pub const NACKF: u32 = 1 << 4;
    pub const STOPF: u32 = 1 << 5;
    pub const TC: u32 = 1 << 6;
    pub const TCR: u32 = 1 << 7;
    pub const BERR: u32 = 1 << 8;
    pub const ARLO: u32 = 1 << 9;
    pub const OVR: u32 = 1 << 10;
    pub const BUSY: u32 = 1 << 15;
    pub const DIR: u32 = 1 << 16;
    pub const ADDCODE_SHIFT: u32 = 17;
    pub const ADDCODE: u32 = 0x7F << ADDCODE_SHIFT;
}

/// Access to the registers of one I2C controller.
///
/// `read` takes `&mut self` because reading RXDR pops the receive buffer.
pub trait RegisterBlock {
    fn read(&mut self, reg: Reg) -> u32;

    fn write(&mut self, reg: Reg, value: u32);

    fn modify<F>(&mut self, reg: Reg, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    fn set_bits(&mut self, reg: Reg, bits: u32) {
        self.modify(reg, |v| v | bits);
    }

    fn clear_bits(&mut self, reg: Reg, bits: u32) {
        self.modify(reg, |v| v & !bits);
    }

    fn flag(&mut self, bits: u32) -> bool {
        self.read(Reg::Isr) & bits == bits
    }

    /// Clears ISR flags through ICR.
    fn clear_flags(&mut self, bits: u32) {
        self.write(Reg::Icr, bits);
    }
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for &mut R {
    fn read(&mut self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value);
    }
}

/// Volatile memory-mapped register window.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of a live register block laid out as in
    /// [`Reg`], and no other `Mmio` may alias it while this one is in use.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Reads a 32-bit register at `offset` from the window base.
    ///
    /// # Safety
    ///
    /// `offset` must name a 4-byte aligned register inside the block passed
    /// to [`Mmio::new`].
    pub unsafe fn read_offset(&mut self, offset: usize) -> u32 {
        // SAFETY: the caller keeps `offset` inside the mapped block.
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    /// # Safety
    ///
    /// As for [`Mmio::read_offset`].
    pub unsafe fn write_offset(&mut self, offset: usize, value: u32) {
        // SAFETY: the caller keeps `offset` inside the mapped block.
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// # Safety
    ///
    /// As for [`Mmio::read_offset`].
    pub unsafe fn modify_offset<F>(&mut self, offset: usize, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        // SAFETY: forwarded from the caller.
        unsafe {
            let value = self.read_offset(offset);
            self.write_offset(offset, f(value));
        }
    }
}

impl RegisterBlock for Mmio {
    fn read(&mut self, reg: Reg) -> u32 {
        // SAFETY: every `Reg` offset lies inside the I2C register block.
        unsafe { self.read_offset(reg.offset()) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        // SAFETY: as for `read`.
        unsafe { self.write_offset(reg.offset(), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_match_reference_manual() {
        assert_eq!(Reg::Cr1.offset(), 0x00);
        assert_eq!(Reg::Timingr.offset(), 0x10);
        assert_eq!(Reg::Isr.offset(), 0x18);
        assert_eq!(Reg::Icr.offset(), 0x1C);
        assert_eq!(Reg::Rxdr.offset(), 0x24);
        assert_eq!(Reg::Txdr.offset(), 0x28);
        assert_eq!(Reg::Txdr.index() + 1, Reg::COUNT);
    }

    #[test]
    fn mmio_over_plain_memory() {
        let mut window = [0u32; Reg::COUNT];
        let mut regs = unsafe { Mmio::new(window.as_mut_ptr() as usize) };

        regs.write(Reg::Timingr, 0x10B1_7DB4);
        regs.set_bits(Reg::Cr1, cr1::PE);
        regs.modify(Reg::Cr2, |v| v | cr2::AUTOEND);
        regs.clear_bits(Reg::Cr1, cr1::PE);

        assert_eq!(regs.read(Reg::Timingr), 0x10B1_7DB4);
        assert_eq!(regs.read(Reg::Cr1), 0);
        assert_eq!(regs.read(Reg::Cr2), cr2::AUTOEND);
        drop(regs);
        assert_eq!(window[Reg::Timingr.index()], 0x10B1_7DB4);
    }

    #[test]
    fn raw_offsets_stay_inside_the_window() {
        let mut window = [0u32; 4];
        let mut regs = unsafe { Mmio::new(window.as_mut_ptr() as usize) };

        // SAFETY: 0x0C is the last word of the four-word window.
        unsafe {
            regs.write_offset(0x0C, 0x5A);
            regs.modify_offset(0x0C, |v| v << 4);
            assert_eq!(regs.read_offset(0x0C), 0x5A0);
        }
        drop(regs);
        assert_eq!(window, [0, 0, 0, 0x5A0]);
    }

    #[test]
    fn nbytes_field_position() {
        assert_eq!((255u32 << cr2::NBYTES_SHIFT) & cr2::NBYTES, 0x00FF_0000);
        assert_eq!(cr2::GENERATE_START_READ, 0x2400);
    }
}
