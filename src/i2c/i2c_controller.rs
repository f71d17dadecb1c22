// Licensed under the Apache-2.0 license

//! High-level I2C controller abstraction.
//!
//! `I2cController` exposes any [`I2cMaster`] as an `embedded_hal::i2c::I2c`
//! bus, so device drivers written against embedded-hal can sit directly on
//! top of the blocking STM32 driver.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cMaster> I2cController<H> {
    pub fn new(hardware: H) -> Self {
        Self {
            hardware,
            logger: NoOpLogger,
        }
    }
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn with_logger(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }

    fn trace<T>(&mut self, op: &str, addr: SevenBitAddress, result: &Result<T, H::Error>) {
        if let Err(err) = result {
            self.logger
                .error(format_args!("{op} to {addr:#04x} failed: {err:?}"));
        }
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let result = self.hardware.read(addr, buffer);
        self.trace("read", addr, &result);
        result
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let result = self.hardware.write(addr, bytes);
        self.trace("write", addr, &result);
        result
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.write_read(addr, bytes, buffer);
        self.trace("write_read", addr, &result);
        result
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.transaction_slice(addr, operations);
        self.trace("transaction", addr, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FmtLogger, Level};
    use crate::i2c::common::{Error, Event, I2cConfigBuilder};
    use crate::i2c::registers::{isr, Reg};
    use crate::i2c::sim::{BusEvent, SimI2c};
    use crate::i2c::stm32_i2c::Stm32I2c;
    use crate::pinmap::PinName;
    use embedded_hal::i2c::I2c;

    fn controller(sim: &SimI2c) -> I2cController<Stm32I2c<&SimI2c, &SimI2c>> {
        I2cController::new(Stm32I2c::init(sim, sim, PinName::PB9, PinName::PB8))
    }

    #[test]
    fn write_read_uses_repeated_start() {
        let sim = SimI2c::new();
        let mut i2c = controller(&sim);
        sim.queue_rx(&[0x71]);
        sim.clear_events();

        let mut who_am_i = [0u8; 1];
        i2c.write_read(0x68, &[0x75], &mut who_am_i).unwrap();

        assert_eq!(who_am_i, [0x71]);
        assert_eq!(
            sim.bus_events().as_slice(),
            &[
                BusEvent::Start {
                    address: 0x68,
                    read: false,
                    nbytes: 1
                },
                BusEvent::Byte(0x75),
                BusEvent::Start {
                    address: 0x68,
                    read: true,
                    nbytes: 1
                },
                BusEvent::Stop,
            ]
        );
    }

    #[test]
    fn transaction_merges_adjacent_operations() {
        let sim = SimI2c::new();
        let mut i2c = controller(&sim);
        sim.queue_rx(&[1, 2, 3]);
        sim.clear_events();

        let mut first = [0u8; 1];
        let mut second = [0u8; 2];
        let mut ops = [
            Operation::Write(&[0x10]),
            Operation::Write(&[0x20, 0x21]),
            Operation::Read(&mut first),
            Operation::Read(&mut second),
        ];
        i2c.transaction(0x50, &mut ops).unwrap();

        assert_eq!(first, [1]);
        assert_eq!(second, [2, 3]);
        assert_eq!(
            sim.bus_events().as_slice(),
            &[
                BusEvent::Start {
                    address: 0x50,
                    read: false,
                    nbytes: 3
                },
                BusEvent::Byte(0x10),
                BusEvent::Byte(0x20),
                BusEvent::Byte(0x21),
                BusEvent::Start {
                    address: 0x50,
                    read: true,
                    nbytes: 3
                },
                BusEvent::Stop,
            ]
        );
    }

    #[test]
    fn oversized_run_is_rejected_before_any_start() {
        let sim = SimI2c::new();
        let mut i2c = controller(&sim);
        sim.clear_events();

        let mut big = [0u8; 300];
        let mut ops = [Operation::Write(&[1]), Operation::Read(&mut big)];
        assert_eq!(
            i2c.transaction(0x50, &mut ops),
            Err(Error::TransferTooLong(300))
        );

        // Merged writes count as one run.
        let mut ops = [Operation::Write(&[0; 200]), Operation::Write(&[0; 100])];
        assert_eq!(
            i2c.transaction(0x50, &mut ops),
            Err(Error::TransferTooLong(300))
        );

        assert!(sim.bus_events().is_empty());
        assert_eq!(sim.register(Reg::Isr) & isr::BUSY, 0);
    }

    #[test]
    fn failed_later_run_releases_the_bus() {
        let sim = SimI2c::new();
        let config = I2cConfigBuilder::new()
            .flag_timeout(8)
            .long_timeout(16)
            .build();
        let hardware = Stm32I2c::init_with_config(&sim, &sim, PinName::PB9, PinName::PB8, &config);
        let mut i2c = I2cController::new(hardware);
        sim.clear_events();

        // The target never supplies the byte to read.
        let mut value = [0u8; 1];
        let mut ops = [Operation::Write(&[0x75]), Operation::Read(&mut value)];
        assert_eq!(
            i2c.transaction(0x68, &mut ops),
            Err(Error::Timeout(Event::TransferComplete))
        );

        assert_eq!(
            sim.bus_events().as_slice(),
            &[
                BusEvent::Start {
                    address: 0x68,
                    read: false,
                    nbytes: 1
                },
                BusEvent::Byte(0x75),
                BusEvent::Start {
                    address: 0x68,
                    read: true,
                    nbytes: 1
                },
                BusEvent::Stop,
            ]
        );
        assert_eq!(sim.register(Reg::Isr) & isr::BUSY, 0);
    }

    #[test]
    fn empty_transaction_touches_nothing() {
        let sim = SimI2c::new();
        let mut i2c = controller(&sim);
        sim.clear_events();

        i2c.transaction(0x50, &mut []).unwrap();
        assert!(sim.bus_events().is_empty());
    }

    #[test]
    fn plain_read_and_write_end_with_stop() {
        let sim = SimI2c::new();
        let mut i2c = controller(&sim);
        sim.queue_rx(&[0xAB]);
        sim.clear_events();

        i2c.write(0x20, &[0x00]).unwrap();
        let mut buf = [0u8; 1];
        i2c.read(0x20, &mut buf).unwrap();

        assert_eq!(buf, [0xAB]);
        let stops = sim
            .bus_events()
            .iter()
            .filter(|e| **e == BusEvent::Stop)
            .count();
        assert_eq!(stops, 2);
    }

    #[test]
    fn failures_are_logged() {
        let sim = SimI2c::stalled();
        let config = I2cConfigBuilder::new().flag_timeout(4).build();
        let hardware = Stm32I2c::init_with_config(&sim, &sim, PinName::PB9, PinName::PB8, &config);
        let mut log = FmtLogger::new(String::new(), Level::Error);
        {
            let mut i2c = I2cController::with_logger(hardware, &mut log);
            assert_eq!(
                i2c.write(0x50, &[]),
                Err(Error::Timeout(Event::TransferComplete))
            );
        }
        assert_eq!(
            log.into_inner(),
            "[ERROR] write to 0x50 failed: Timeout(TransferComplete)\r\n"
        );
    }
}
