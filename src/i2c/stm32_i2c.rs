// Licensed under the Apache-2.0 license

//! Blocking driver for the STM32F3 I2C controller.
//!
//! Every operation busy-polls ISR flags under a tick budget. Nothing here uses
//! interrupts or DMA; a timed-out transfer leaves the controller in an
//! unspecified state and [`Stm32I2c::reset`] plus a fresh init is the way back.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{ByteErrorPolicy, Error, Event, I2cConfig, I2cSpeed};
use crate::i2c::registers::{cr1, cr2, isr, oar1, oar2, Reg, RegisterBlock};
use crate::i2c::system_setup::{I2cSystemSetup, ResolvedPins};
use crate::i2c::timeout::{wait_until, Expired, SpinTicks, TimeSource, Timeouts};
use crate::i2c::timing::{timing_for, TIMING_CLEAR_MASK};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use crate::pinmap::{I2cName, PinName};
use crate::syscon::SystemControl;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

#[cfg(feature = "i2c_target")]
use crate::i2c::common::{SlaveEvent, SlaveStatus};

/// Stored in place of a byte whose read timed out.
pub const BYTE_READ_FAILED: u8 = 0xFF;

pub struct Stm32I2c<R, S, T = SpinTicks, L = NoOpLogger>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    regs: R,
    sys: S,
    clock: T,
    logger: L,
    pins: ResolvedPins,
    speed: I2cSpeed,
    timeouts: Timeouts,
    byte_errors: ByteErrorPolicy,
    timing_override: Option<u32>,
}

impl<R: RegisterBlock, S: SystemControl> Stm32I2c<R, S> {
    /// Brings up the controller wired to `sda`/`scl` at 100 kHz.
    ///
    /// # Panics
    ///
    /// If no controller maps to both pins.
    pub fn init(regs: R, sys: S, sda: PinName, scl: PinName) -> Self {
        Self::init_with_config(regs, sys, sda, scl, &I2cConfig::default())
    }

    /// # Panics
    ///
    /// If no controller maps to both pins.
    pub fn init_with_config(
        regs: R,
        sys: S,
        sda: PinName,
        scl: PinName,
        config: &I2cConfig,
    ) -> Self {
        Self::init_with(regs, sys, SpinTicks::new(), NoOpLogger, sda, scl, config)
    }
}

impl<R, S, T, L> Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    /// Full constructor with an explicit time source and logger.
    ///
    /// Sequence: pin resolution, clock enable and kernel clock selection, pin
    /// mux, controller reset, then `config.speed`.
    ///
    /// # Panics
    ///
    /// If no controller maps to both pins.
    pub fn init_with(
        regs: R,
        sys: S,
        clock: T,
        logger: L,
        sda: PinName,
        scl: PinName,
        config: &I2cConfig,
    ) -> Self {
        let Some(pins) = I2cSystemSetup::resolve_pins(sda, scl) else {
            panic!("pins {sda:?}/{scl:?} do not map to a single I2C controller");
        };

        let mut i2c = Self {
            regs,
            sys,
            clock,
            logger,
            pins,
            speed: config.speed,
            timeouts: config.timeouts,
            byte_errors: config.byte_errors,
            timing_override: config.timing_override,
        };
        i2c.bring_up(config.speed);
        i2c
    }

    fn bring_up(&mut self, speed: I2cSpeed) {
        I2cSystemSetup::initialize_i2c_system(&mut self.sys, &self.pins);
        self.reset();
        self.set_speed(speed);
        self.logger.debug(format_args!(
            "{:?} ready, sda {:?} scl {:?}",
            self.pins.instance, self.pins.sda.0, self.pins.scl.0
        ));
    }

    /// Re-runs the init sequence at the current speed.
    pub fn reinit(&mut self) {
        self.bring_up(self.speed);
    }

    /// Re-applies a configuration: budgets, byte policy, timing override and speed.
    pub fn configure(&mut self, config: &I2cConfig) {
        self.store_config(config);
        self.set_speed(config.speed);
    }

    fn store_config(&mut self, config: &I2cConfig) {
        self.timeouts = config.timeouts;
        self.byte_errors = config.byte_errors;
        self.timing_override = config.timing_override;
    }

    #[must_use]
    pub fn instance(&self) -> I2cName {
        self.pins.instance
    }

    #[must_use]
    pub fn speed(&self) -> I2cSpeed {
        self.speed
    }

    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Gives back the register block and system controller.
    pub fn release(self) -> (R, S) {
        (self.regs, self.sys)
    }

    /// Sets the bus rate.
    ///
    /// # Panics
    ///
    /// On anything but 100 kHz, 400 kHz or 1 MHz.
    pub fn set_frequency(&mut self, rate: HertzU32) {
        let Some(speed) = I2cSpeed::from_hz(rate.raw()) else {
            panic!("unsupported I2C bus rate: {} Hz", rate.raw());
        };
        self.set_speed(speed);
    }

    /// Reprograms the controller for `speed`.
    ///
    /// With a core clock missing from the timing table and no override,
    /// TIMINGR keeps its previous value.
    pub fn set_speed(&mut self, speed: I2cSpeed) {
        self.apply_speed(speed);
    }

    fn apply_speed(&mut self, speed: I2cSpeed) -> Option<u32> {
        let (core_clock, timing) = self.lookup_timing(speed);
        if timing.is_none() {
            self.logger.warn(format_args!(
                "no timing for {} Hz core clock, TIMINGR unchanged",
                core_clock.raw()
            ));
        }
        self.program_speed(speed, timing);
        timing
    }

    fn lookup_timing(&mut self, speed: I2cSpeed) -> (HertzU32, Option<u32>) {
        let core_clock = I2cSystemSetup::get_i2c_source_frequency(&mut self.sys);
        let timing = timing_for(core_clock, speed).or(self.timing_override);
        (core_clock, timing)
    }

    fn program_speed(&mut self, speed: I2cSpeed, timing: Option<u32>) {
        self.sys
            .set_fast_mode_plus(self.pins.instance, speed == I2cSpeed::FastPlus);
        self.apply_configuration(timing);
        self.speed = speed;

        self.logger.debug(format_args!(
            "{:?} at {} Hz",
            self.pins.instance,
            speed.frequency().raw()
        ));
    }

    fn apply_configuration(&mut self, timing: Option<u32>) {
        self.regs.clear_bits(Reg::Cr1, cr1::PE);

        if let Some(timing) = timing {
            self.regs.write(Reg::Timingr, timing & TIMING_CLEAR_MASK);
        }

        // Own address 0, 7-bit mode.
        self.regs.clear_bits(Reg::Oar1, oar1::OA1EN);
        self.regs.write(Reg::Oar1, oar1::OA1EN);

        self.regs.set_bits(Reg::Cr2, cr2::AUTOEND | cr2::NACK);

        self.regs.clear_bits(Reg::Oar2, oar2::OA2EN);
        self.regs.write(Reg::Oar2, 0);

        // General call and NOSTRETCH off.
        self.regs.write(Reg::Cr1, 0);

        self.regs.set_bits(Reg::Cr1, cr1::PE);
    }

    /// Requests a START with the current CR2 address and waits for BUSY.
    ///
    /// # Errors
    ///
    /// `Timeout(BusBusy)` if the bus never goes busy.
    pub fn start_condition(&mut self) -> Result<(), Error> {
        self.regs.clear_flags(isr::NACKF);
        self.regs.set_bits(Reg::Cr2, cr2::START);
        self.wait_flag(isr::BUSY, self.timeouts.flag, Event::BusBusy)
    }

    pub fn stop_condition(&mut self) {
        self.regs.set_bits(Reg::Cr2, cr2::STOP);
    }

    /// Master write of `data` to `address`.
    ///
    /// With `send_stop` false the bus is held for a repeated start.
    ///
    /// # Errors
    ///
    /// `TransferTooLong` above 255 bytes, otherwise the timeout of the wait
    /// that failed.
    pub fn write(
        &mut self,
        address: SevenBitAddress,
        data: &[u8],
        send_stop: bool,
    ) -> Result<usize, Error> {
        self.begin_transfer(address, data.len(), false)?;
        self.transmit(data)?;
        self.finish_transfer(self.timeouts.flag, send_stop)?;
        Ok(data.len())
    }

    /// Master read from `address` into `buffer`.
    ///
    /// # Errors
    ///
    /// `TransferTooLong` above 255 bytes, otherwise the timeout of the wait
    /// that failed.
    pub fn read(
        &mut self,
        address: SevenBitAddress,
        buffer: &mut [u8],
        send_stop: bool,
    ) -> Result<usize, Error> {
        self.begin_transfer(address, buffer.len(), true)?;
        self.receive(buffer)?;
        self.finish_transfer(self.timeouts.long, send_stop)?;
        Ok(buffer.len())
    }

    /// Waits for RXNE and returns the received byte.
    ///
    /// # Errors
    ///
    /// `Timeout(RxNotEmpty)`.
    pub fn read_byte(&mut self, _is_last: bool) -> Result<u8, Error> {
        self.wait_flag(isr::RXNE, self.timeouts.flag, Event::RxNotEmpty)?;
        Ok((self.regs.read(Reg::Rxdr) & 0xFF) as u8)
    }

    /// Waits for TXIS and queues one byte.
    ///
    /// # Errors
    ///
    /// `Timeout(TxInterrupt)`, in which case nothing was written.
    pub fn write_byte(&mut self, data: u8) -> Result<(), Error> {
        self.wait_flag(isr::TXIS, self.timeouts.flag, Event::TxInterrupt)?;
        self.regs.write(Reg::Txdr, u32::from(data));
        Ok(())
    }

    /// Pulses the controller reset line. All registers return to reset values.
    pub fn reset(&mut self) {
        I2cSystemSetup::reset_i2c_peripheral(&mut self.sys, self.pins.instance);
    }

    fn begin_transfer(
        &mut self,
        address: SevenBitAddress,
        len: usize,
        read: bool,
    ) -> Result<(), Error> {
        let nbytes = u8::try_from(len).map_err(|_| Error::TransferTooLong(len))?;
        let request = if read {
            cr2::GENERATE_START_READ
        } else {
            cr2::GENERATE_START_WRITE
        };
        let fields = ((u32::from(address) << 1) & cr2::SADD)
            | (u32::from(nbytes) << cr2::NBYTES_SHIFT)
            | cr2::SOFTEND_MODE
            | request;
        self.regs
            .modify(Reg::Cr2, |v| (v & !cr2::TRANSFER_FIELDS) | fields);
        Ok(())
    }

    fn finish_transfer(&mut self, budget: u32, send_stop: bool) -> Result<(), Error> {
        self.wait_flag(isr::TC, budget, Event::TransferComplete)?;
        self.regs.clear_flags(isr::TC);

        if send_stop {
            self.stop_condition();
            self.wait_flag(isr::STOPF, self.timeouts.flag, Event::StopDetected)?;
            self.regs.clear_flags(isr::STOPF);
        }
        Ok(())
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), Error> {
        for &byte in data {
            if let Err(err) = self.write_byte(byte) {
                self.byte_failed(err)?;
            }
        }
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        let last = buffer.len().saturating_sub(1);
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = match self.read_byte(index == last) {
                Ok(byte) => byte,
                Err(err) => {
                    self.byte_failed(err)?;
                    BYTE_READ_FAILED
                }
            };
        }
        Ok(())
    }

    fn byte_failed(&mut self, err: Error) -> Result<(), Error> {
        match self.byte_errors {
            ByteErrorPolicy::Propagate => Err(err),
            ByteErrorPolicy::Continue => {
                self.logger.warn(format_args!("ignoring byte error {err:?}"));
                Ok(())
            }
        }
    }

    fn wait_flag(&mut self, bits: u32, budget: u32, event: Event) -> Result<(), Error> {
        let regs = &mut self.regs;
        let result = wait_until(&mut self.clock, budget, || {
            if regs.flag(bits) {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        });

        result.map_err(|Expired| {
            self.logger.error(format_args!(
                "{:?} timeout waiting for {event:?}",
                self.pins.instance
            ));
            Error::Timeout(event)
        })
    }

    /// Programs TIMINGR for `speed`, returning the value written.
    ///
    /// # Errors
    ///
    /// `UnknownCoreClock` when the core clock has no table entry and no
    /// override is configured. The controller is left untouched: speed,
    /// TIMINGR and the fast-mode-plus drive keep their previous state.
    pub fn configure_timing(&mut self, speed: I2cSpeed) -> Result<u32, Error> {
        let (core_clock, timing) = self.lookup_timing(speed);
        let Some(timing) = timing else {
            return Err(Error::UnknownCoreClock(core_clock.raw()));
        };
        self.program_speed(speed, Some(timing));
        Ok(timing & TIMING_CLEAR_MASK)
    }
}

impl<R, S, T, L> I2cHardwareCore for Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    type Error = Error;

    fn init(&mut self, config: &I2cConfig) {
        self.store_config(config);
        self.bring_up(config.speed);
    }

    fn configure_timing(&mut self, speed: I2cSpeed) -> Result<u32, Self::Error> {
        Stm32I2c::configure_timing(self, speed)
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        self.reinit();
        Ok(())
    }
}

fn is_read(op: &Operation<'_>) -> bool {
    matches!(op, Operation::Read(_))
}

fn same_direction(a: &Operation<'_>, b: &Operation<'_>) -> bool {
    is_read(a) == is_read(b)
}

fn op_len(op: &Operation<'_>) -> usize {
    match op {
        Operation::Read(buffer) => buffer.len(),
        Operation::Write(bytes) => bytes.len(),
    }
}

fn run_len(run: &[Operation<'_>]) -> usize {
    run.iter().map(op_len).sum()
}

impl<R, S, T, L> Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    fn transfer_run(
        &mut self,
        addr: SevenBitAddress,
        run: &mut [Operation<'_>],
        send_stop: bool,
    ) -> Result<(), Error> {
        let read = run.first().is_some_and(is_read);
        self.begin_transfer(addr, run_len(run), read)?;

        for op in run.iter_mut() {
            match op {
                Operation::Read(buffer) => self.receive(buffer)?,
                Operation::Write(bytes) => self.transmit(bytes)?,
            }
        }

        let budget = if read {
            self.timeouts.long
        } else {
            self.timeouts.flag
        };
        self.finish_transfer(budget, send_stop)
    }
}

impl<R, S, T, L> I2cMaster<SevenBitAddress> for Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        Stm32I2c::write(self, addr, bytes, true).map(|_| ())
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        Stm32I2c::read(self, addr, buffer, true).map(|_| ())
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        Stm32I2c::write(self, addr, bytes, false)?;
        Stm32I2c::read(self, addr, buffer, true).map(|_| ())
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        // Every run must fit NBYTES before the first START goes out.
        if let Some(len) = ops_slice
            .chunk_by(same_direction)
            .map(run_len)
            .find(|&len| len > usize::from(u8::MAX))
        {
            return Err(Error::TransferTooLong(len));
        }

        let runs = ops_slice.chunk_by(same_direction).count();
        for (index, run) in ops_slice.chunk_by_mut(same_direction).enumerate() {
            if let Err(err) = self.transfer_run(addr, run, index + 1 == runs) {
                // Release the bus held since the first START.
                self.stop_condition();
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "i2c_target")]
impl<R, S, T, L> Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    /// Programs the 7-bit own address and enables it. `_mask` is not
    /// supported by OA1 and is ignored.
    pub fn set_slave_address(&mut self, address: SevenBitAddress, _mask: u8) {
        self.regs.clear_bits(Reg::Oar1, oar1::OA1EN);
        self.regs.modify(Reg::Oar1, |v| {
            (v & oar1::KEEP_MASK) | ((u32::from(address) << 1) & oar1::OA1_7BIT)
        });
        self.regs.set_bits(Reg::Oar1, oar1::OA1EN);
    }

    pub fn set_slave_mode(&mut self, enable: bool) {
        if enable {
            self.regs.set_bits(Reg::Oar1, oar1::OA1EN);
        } else {
            self.regs.clear_bits(Reg::Oar1, oar1::OA1EN);
        }
    }

    /// Acknowledge the general call address. Cleared by every speed change.
    pub fn set_general_call(&mut self, enable: bool) {
        if enable {
            self.regs.set_bits(Reg::Cr1, cr1::GCEN);
        } else {
            self.regs.clear_bits(Reg::Cr1, cr1::GCEN);
        }
    }

    /// Classifies a pending address match and acknowledges it.
    pub fn slave_receive(&mut self) -> SlaveEvent {
        let status = self.regs.read(Reg::Isr);
        if status & (isr::BUSY | isr::ADDR) != (isr::BUSY | isr::ADDR) {
            return SlaveEvent::NoData;
        }

        let general_call = self.regs.read(Reg::Cr1) & cr1::GCEN != 0
            && (status & isr::ADDCODE) >> isr::ADDCODE_SHIFT == 0;
        let event = if status & isr::DIR != 0 {
            SlaveEvent::ReadAddressed
        } else if general_call {
            SlaveEvent::WriteGeneral
        } else {
            SlaveEvent::WriteAddressed
        };

        self.regs.clear_flags(isr::ADDR);
        event
    }

    /// Receives `buffer.len()` bytes from the addressing master.
    ///
    /// # Errors
    ///
    /// `Timeout(RxNotEmpty)` under [`ByteErrorPolicy::Propagate`].
    pub fn slave_read(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        self.receive(buffer)?;
        Ok(buffer.len())
    }

    /// Sends `data` to the addressing master.
    ///
    /// # Errors
    ///
    /// `Timeout(TxInterrupt)` under [`ByteErrorPolicy::Propagate`].
    pub fn slave_write(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.transmit(data)?;
        Ok(data.len())
    }

    pub fn slave_status(&mut self) -> SlaveStatus {
        let own = self.regs.read(Reg::Oar1);
        let enabled = own & oar1::OA1EN != 0;
        SlaveStatus {
            enabled,
            address: enabled.then_some(((own & oar1::OA1_7BIT) >> 1) as u8),
            addressed: self.regs.flag(isr::ADDR),
        }
    }
}
