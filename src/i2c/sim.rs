// Licensed under the Apache-2.0 license

//! In-memory I2C controller for host tests.
//!
//! [`SimI2c`] models the subset of the I2C v2 state machine the blocking driver
//! relies on: START/STOP requests, NBYTES counting, TXIS/RXNE/TC/STOPF flags,
//! ICR clearing and slave address matches. A shared reference implements both
//! [`RegisterBlock`] and [`SystemControl`], so a reset issued through the system
//! controller really clears the register bank.
//!
//! In *responsive* mode every flag the driver waits for is raised as soon as the
//! hardware would raise it. In *stalled* mode nothing is ever raised, which is
//! how a disconnected or clock-stretching target looks from the CPU.

use crate::i2c::registers::{cr2, isr, oar1, Reg, RegisterBlock};
use crate::pinmap::{I2cName, PinFunction, PinName};
use crate::syscon::{ClockId, I2cClockSource, ResetId, SystemControl};
use core::cell::RefCell;
use fugit::HertzU32;
use heapless::{Deque, Vec};

pub const BUS_LOG_DEPTH: usize = 128;
pub const SYSTEM_LOG_DEPTH: usize = 32;
pub const RX_DEPTH: usize = 64;

/// Activity seen on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Start { address: u8, read: bool, nbytes: u8 },
    Byte(u8),
    Stop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemEvent {
    ClockEnabled(ClockId),
    ClockSource(I2cName, I2cClockSource),
    ResetAsserted(ResetId),
    ResetReleased(ResetId),
    FastModePlus(I2cName, bool),
    PinConfigured(PinName, PinFunction),
}

struct SimState {
    regs: [u32; Reg::COUNT],
    responsive: bool,
    remaining: u8,
    rx: Deque<u8, RX_DEPTH>,
    bus: Vec<BusEvent, BUS_LOG_DEPTH>,
    system: Vec<SystemEvent, SYSTEM_LOG_DEPTH>,
    core_clock: HertzU32,
    fast_mode_plus: bool,
    /// Set while a remote master drives a slave transfer; `true` when it writes.
    target_receiving: Option<bool>,
}

impl SimState {
    fn get(&self, reg: Reg) -> u32 {
        self.regs.get(reg.index()).copied().unwrap_or(0)
    }

    fn set(&mut self, reg: Reg, value: u32) {
        if let Some(slot) = self.regs.get_mut(reg.index()) {
            *slot = value;
        }
    }

    fn raise(&mut self, bits: u32) {
        let isr = self.get(Reg::Isr);
        self.set(Reg::Isr, isr | bits);
    }

    fn lower(&mut self, bits: u32) {
        let isr = self.get(Reg::Isr);
        self.set(Reg::Isr, isr & !bits);
    }

    fn log_bus(&mut self, event: BusEvent) {
        // A full log keeps its oldest entries.
        let _ = self.bus.push(event);
    }

    fn log_system(&mut self, event: SystemEvent) {
        let _ = self.system.push(event);
    }

    fn reading(&self) -> bool {
        match self.target_receiving {
            Some(receiving) => receiving,
            None => self.get(Reg::Cr2) & cr2::RD_WRN != 0,
        }
    }

    fn write_cr2(&mut self, value: u32) {
        // START and STOP are set by software and cleared by hardware.
        self.set(Reg::Cr2, value & !(cr2::START | cr2::STOP));

        if value & cr2::START != 0 {
            let nbytes = ((value & cr2::NBYTES) >> cr2::NBYTES_SHIFT) as u8;
            let read = value & cr2::RD_WRN != 0;
            self.log_bus(BusEvent::Start {
                address: ((value & cr2::SADD) >> 1) as u8,
                read,
                nbytes,
            });
            self.remaining = nbytes;
            self.target_receiving = None;
            self.lower(isr::TC | isr::TXIS | isr::RXNE);
            if self.responsive {
                self.raise(isr::BUSY);
                self.advance();
            }
        }

        if value & cr2::STOP != 0 {
            self.log_bus(BusEvent::Stop);
            if self.responsive {
                self.lower(isr::BUSY);
                self.raise(isr::STOPF);
            }
        }
    }

    /// Raises the flag the next step of the transfer waits on.
    fn advance(&mut self) {
        if !self.responsive {
            return;
        }
        if self.remaining == 0 {
            self.lower(isr::TXIS | isr::RXNE);
            self.raise(isr::TC);
        } else if self.reading() {
            if self.rx.is_empty() {
                self.lower(isr::RXNE);
            } else {
                self.raise(isr::RXNE);
            }
        } else {
            self.raise(isr::TXIS | isr::TXE);
        }
    }

    fn write_txdr(&mut self, value: u32) {
        self.set(Reg::Txdr, value & 0xFF);
        self.log_bus(BusEvent::Byte((value & 0xFF) as u8));
        self.lower(isr::TXIS);
        self.remaining = self.remaining.saturating_sub(1);
        self.advance();
    }

    fn read_rxdr(&mut self) -> u32 {
        let byte = self.rx.pop_front().unwrap_or(0);
        self.set(Reg::Rxdr, u32::from(byte));
        self.lower(isr::RXNE);
        self.remaining = self.remaining.saturating_sub(1);
        self.advance();
        u32::from(byte)
    }

    fn hardware_reset(&mut self) {
        self.regs = [0; Reg::COUNT];
        self.remaining = 0;
        self.target_receiving = None;
    }
}

pub struct SimI2c {
    state: RefCell<SimState>,
}

impl Default for SimI2c {
    fn default() -> Self {
        Self::new()
    }
}

impl SimI2c {
    /// Responsive controller with a 64 MHz core clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(SimState {
                regs: [0; Reg::COUNT],
                responsive: true,
                remaining: 0,
                rx: Deque::new(),
                bus: Vec::new(),
                system: Vec::new(),
                core_clock: HertzU32::MHz(64),
                fast_mode_plus: false,
                target_receiving: None,
            }),
        }
    }

    #[must_use]
    pub fn stalled() -> Self {
        let sim = Self::new();
        sim.set_responsive(false);
        sim
    }

    pub fn set_responsive(&self, responsive: bool) {
        self.state.borrow_mut().responsive = responsive;
    }

    pub fn set_core_clock(&self, clock: HertzU32) {
        self.state.borrow_mut().core_clock = clock;
    }

    /// Queues bytes the addressed target will return on reads.
    pub fn queue_rx(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        for &b in bytes {
            let _ = state.rx.push_back(b);
        }
        if state.get(Reg::Isr) & isr::BUSY != 0 && state.remaining > 0 {
            state.advance();
        }
    }

    /// Register value without read side effects.
    #[must_use]
    pub fn register(&self, reg: Reg) -> u32 {
        self.state.borrow().get(reg)
    }

    pub fn set_register(&self, reg: Reg, value: u32) {
        self.state.borrow_mut().set(reg, value);
    }

    /// A master on the wire addressed this controller.
    ///
    /// `general_call` reports address 0x00 in ADDCODE instead of OA1.
    pub fn address_match(&self, read: bool, general_call: bool) {
        let mut state = self.state.borrow_mut();
        let code = if general_call {
            0
        } else {
            (state.get(Reg::Oar1) & oar1::OA1_7BIT) >> 1
        };
        let status = state.get(Reg::Isr) & !(isr::ADDCODE | isr::DIR);
        let dir = if read { isr::DIR } else { 0 };
        state.set(
            Reg::Isr,
            status | isr::BUSY | isr::ADDR | dir | (code << isr::ADDCODE_SHIFT),
        );
    }

    /// A remote master writes `bytes` to this controller in slave mode.
    pub fn master_writes(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        for &b in bytes {
            let _ = state.rx.push_back(b);
        }
        state.target_receiving = Some(true);
        state.remaining = u8::try_from(bytes.len()).unwrap_or(u8::MAX);
        state.raise(isr::BUSY);
        state.advance();
    }

    /// A remote master clocks `count` bytes out of this controller.
    pub fn master_reads(&self, count: u8) {
        let mut state = self.state.borrow_mut();
        state.target_receiving = Some(false);
        state.remaining = count;
        state.raise(isr::BUSY);
        state.advance();
    }

    #[must_use]
    pub fn bus_events(&self) -> Vec<BusEvent, BUS_LOG_DEPTH> {
        self.state.borrow().bus.clone()
    }

    #[must_use]
    pub fn system_events(&self) -> Vec<SystemEvent, SYSTEM_LOG_DEPTH> {
        self.state.borrow().system.clone()
    }

    pub fn clear_events(&self) {
        let mut state = self.state.borrow_mut();
        state.bus.clear();
        state.system.clear();
    }

    #[must_use]
    pub fn fast_mode_plus(&self) -> bool {
        self.state.borrow().fast_mode_plus
    }
}

impl RegisterBlock for &SimI2c {
    fn read(&mut self, reg: Reg) -> u32 {
        let mut state = self.state.borrow_mut();
        match reg {
            Reg::Rxdr => state.read_rxdr(),
            _ => state.get(reg),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        let mut state = self.state.borrow_mut();
        match reg {
            Reg::Cr2 => state.write_cr2(value),
            Reg::Txdr => state.write_txdr(value),
            Reg::Icr => state.lower(value),
            Reg::Isr | Reg::Rxdr | Reg::Pecr => {}
            _ => state.set(reg, value),
        }
    }
}

impl SystemControl for &SimI2c {
    fn enable(&mut self, clock: ClockId) {
        self.state.borrow_mut().log_system(SystemEvent::ClockEnabled(clock));
    }

    fn set_i2c_clock_source(&mut self, i2c: I2cName, source: I2cClockSource) {
        self.state
            .borrow_mut()
            .log_system(SystemEvent::ClockSource(i2c, source));
    }

    fn core_clock(&mut self) -> HertzU32 {
        self.state.borrow().core_clock
    }

    fn reset_assert(&mut self, reset: ResetId) {
        let mut state = self.state.borrow_mut();
        state.hardware_reset();
        state.log_system(SystemEvent::ResetAsserted(reset));
    }

    fn reset_deassert(&mut self, reset: ResetId) {
        self.state
            .borrow_mut()
            .log_system(SystemEvent::ResetReleased(reset));
    }

    fn set_fast_mode_plus(&mut self, i2c: I2cName, enable: bool) {
        let mut state = self.state.borrow_mut();
        state.fast_mode_plus = enable;
        state.log_system(SystemEvent::FastModePlus(i2c, enable));
    }

    fn configure_pin(&mut self, pin: PinName, function: PinFunction) {
        self.state
            .borrow_mut()
            .log_system(SystemEvent::PinConfigured(pin, function));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_write_counts_down_to_tc() {
        let sim = SimI2c::new();
        let mut regs = &sim;

        regs.write(Reg::Cr2, (0x50 << 1) | (2 << cr2::NBYTES_SHIFT) | cr2::START);
        assert!(regs.flag(isr::BUSY | isr::TXIS));
        assert_eq!(regs.read(Reg::Cr2) & cr2::START, 0);

        regs.write(Reg::Txdr, 0xAA);
        assert!(regs.flag(isr::TXIS));
        regs.write(Reg::Txdr, 0xBB);
        assert!(regs.flag(isr::TC));
        assert!(!regs.flag(isr::TXIS));

        regs.write(Reg::Cr2, cr2::STOP);
        assert!(regs.flag(isr::STOPF));
        assert!(!regs.flag(isr::BUSY));

        let events = sim.bus_events();
        assert_eq!(
            events.as_slice(),
            &[
                BusEvent::Start {
                    address: 0x50,
                    read: false,
                    nbytes: 2
                },
                BusEvent::Byte(0xAA),
                BusEvent::Byte(0xBB),
                BusEvent::Stop,
            ]
        );
    }

    #[test]
    fn read_drains_queue() {
        let sim = SimI2c::new();
        sim.queue_rx(&[1, 2]);
        let mut regs = &sim;

        regs.write(
            Reg::Cr2,
            (0x68 << 1) | (2 << cr2::NBYTES_SHIFT) | cr2::GENERATE_START_READ,
        );
        assert!(regs.flag(isr::RXNE));
        assert_eq!(regs.read(Reg::Rxdr), 1);
        assert_eq!(regs.read(Reg::Rxdr), 2);
        assert!(regs.flag(isr::TC));
        assert!(!regs.flag(isr::RXNE));
    }

    #[test]
    fn stalled_never_raises_flags() {
        let sim = SimI2c::stalled();
        let mut regs = &sim;
        regs.write(Reg::Cr2, (1 << cr2::NBYTES_SHIFT) | cr2::START);
        regs.write(Reg::Cr2, cr2::STOP);
        assert_eq!(regs.read(Reg::Isr), 0);
    }

    #[test]
    fn icr_clears_isr_bits() {
        let sim = SimI2c::new();
        sim.set_register(Reg::Isr, isr::NACKF | isr::STOPF | isr::BUSY);
        let mut regs = &sim;
        regs.clear_flags(isr::NACKF | isr::STOPF);
        assert_eq!(sim.register(Reg::Isr), isr::BUSY);
    }

    #[test]
    fn reset_clears_registers() {
        let sim = SimI2c::new();
        sim.set_register(Reg::Timingr, 0x1234);
        let mut sys = &sim;
        sys.reset_assert(ResetId::RstI2c1);
        sys.reset_deassert(ResetId::RstI2c1);
        assert_eq!(sim.register(Reg::Timingr), 0);
        assert_eq!(
            sim.system_events().as_slice(),
            &[
                SystemEvent::ResetAsserted(ResetId::RstI2c1),
                SystemEvent::ResetReleased(ResetId::RstI2c1),
            ]
        );
    }

    #[test]
    fn address_match_reports_own_address() {
        let sim = SimI2c::new();
        sim.set_register(Reg::Oar1, oar1::OA1EN | (0x2A << 1));
        sim.address_match(true, false);
        let isr_value = sim.register(Reg::Isr);
        assert_eq!((isr_value & isr::ADDCODE) >> isr::ADDCODE_SHIFT, 0x2A);
        assert_ne!(isr_value & isr::DIR, 0);
        assert_ne!(isr_value & isr::ADDR, 0);
    }

    #[test]
    fn remote_master_drives_slave_transfers() {
        let sim = SimI2c::new();
        let mut regs = &sim;

        sim.master_writes(&[0x10, 0x20]);
        assert!(regs.flag(isr::BUSY | isr::RXNE));
        assert_eq!(regs.read(Reg::Rxdr), 0x10);
        assert_eq!(regs.read(Reg::Rxdr), 0x20);
        assert!(!regs.flag(isr::RXNE));

        sim.master_reads(1);
        assert!(regs.flag(isr::TXIS));
        regs.write(Reg::Txdr, 0x5A);
        assert!(!regs.flag(isr::TXIS));
        assert_eq!(sim.bus_events().as_slice(), &[BusEvent::Byte(0x5A)]);
    }
}
