// Licensed under the Apache-2.0 license

//! Slave trait implementations for the STM32 I2C controller
//!
//! Bridges the inherent slave-mode methods of [`Stm32I2c`] to the composable
//! traits in [`crate::i2c::traits::slave`]. Only OA1 with a 7-bit address is
//! used; OA2 stays disabled.

use crate::common::Logger;
use crate::i2c::common::{Error, SlaveEvent, SlaveStatus};
use crate::i2c::registers::RegisterBlock;
use crate::i2c::stm32_i2c::Stm32I2c;
use crate::i2c::timeout::TimeSource;
use crate::i2c::traits::slave::{I2cSlaveBuffer, I2cSlaveCore, I2cSlaveEventPolling};
use crate::syscon::SystemControl;
use embedded_hal::i2c::SevenBitAddress;

// ================================================================================================
// I2cSlaveCore implementation - core slave functionality
// ================================================================================================

impl<R, S, T, L> I2cSlaveCore<SevenBitAddress> for Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    fn configure_slave_address(&mut self, addr: SevenBitAddress) -> Result<(), Self::Error> {
        self.set_slave_address(addr, 0);
        Ok(())
    }

    fn enable_slave_mode(&mut self) -> Result<(), Self::Error> {
        self.set_slave_mode(true);
        Ok(())
    }

    fn disable_slave_mode(&mut self) -> Result<(), Self::Error> {
        self.set_slave_mode(false);
        Ok(())
    }

    fn is_slave_mode_enabled(&mut self) -> bool {
        self.slave_status().enabled
    }

    fn slave_address(&mut self) -> Option<SevenBitAddress> {
        self.slave_status().address
    }
}

// ================================================================================================
// Buffer Operations - I2cSlaveBuffer Trait
// ================================================================================================

impl<R, S, T, L> I2cSlaveBuffer<SevenBitAddress> for Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    fn read_slave_buffer(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.slave_read(buffer)
    }

    fn write_slave_response(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.slave_write(data).map(|_| ())
    }
}

// ================================================================================================
// Event polling - I2cSlaveEventPolling Trait
// ================================================================================================

impl<R, S, T, L> I2cSlaveEventPolling<SevenBitAddress> for Stm32I2c<R, S, T, L>
where
    R: RegisterBlock,
    S: SystemControl,
    T: TimeSource,
    L: Logger,
{
    fn poll_slave_events(&mut self) -> Result<Option<SlaveEvent>, Error> {
        match self.slave_receive() {
            SlaveEvent::NoData => Ok(None),
            event => Ok(Some(event)),
        }
    }

    fn slave_status(&mut self) -> Result<SlaveStatus, Error> {
        Ok(Stm32I2c::slave_status(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::sim::SimI2c;
    use crate::i2c::traits::slave::{I2cMasterSlave, I2cSlave};
    use crate::i2c::traits::I2cMaster;
    use crate::pinmap::PinName;

    fn echo_once<D: I2cSlave>(device: &mut D) -> Result<Option<SlaveEvent>, D::Error> {
        let event = device.poll_slave_events()?;
        if event == Some(SlaveEvent::WriteAddressed) {
            let mut buf = [0u8; 2];
            device.read_slave_buffer(&mut buf)?;
        }
        Ok(event)
    }

    fn assert_master_slave<D: I2cMasterSlave>(_device: &D) {}

    #[test]
    fn slave_core_round_trip() {
        let sim = SimI2c::new();
        let mut i2c = Stm32I2c::init(&sim, &sim, PinName::PA14, PinName::PA15);
        assert_master_slave(&i2c);

        I2cSlaveCore::configure_slave_address(&mut i2c, 0x33).unwrap();
        assert!(i2c.is_slave_mode_enabled());
        assert_eq!(I2cSlaveCore::slave_address(&mut i2c), Some(0x33));

        i2c.disable_slave_mode().unwrap();
        assert!(!i2c.is_slave_mode_enabled());
        assert_eq!(I2cSlaveCore::slave_address(&mut i2c), None);

        i2c.enable_slave_mode().unwrap();
        assert_eq!(I2cSlaveCore::slave_address(&mut i2c), Some(0x33));
    }

    #[test]
    fn polling_and_buffers() {
        let sim = SimI2c::new();
        let mut i2c = Stm32I2c::init(&sim, &sim, PinName::PB7, PinName::PB6);
        I2cSlaveCore::configure_slave_address(&mut i2c, 0x33).unwrap();

        assert_eq!(echo_once(&mut i2c), Ok(None));

        sim.address_match(false, false);
        sim.master_writes(&[0xC0, 0xDE]);
        assert_eq!(echo_once(&mut i2c), Ok(Some(SlaveEvent::WriteAddressed)));

        sim.address_match(true, false);
        sim.master_reads(1);
        assert_eq!(
            i2c.poll_slave_events(),
            Ok(Some(SlaveEvent::ReadAddressed))
        );
        i2c.write_slave_response(&[0x99]).unwrap();

        let status = I2cSlaveEventPolling::slave_status(&mut i2c).unwrap();
        assert!(status.enabled);
        assert!(!status.addressed);
    }

    #[test]
    fn master_side_still_works() {
        let sim = SimI2c::new();
        let mut i2c = Stm32I2c::init(&sim, &sim, PinName::PB7, PinName::PB6);
        I2cSlaveCore::configure_slave_address(&mut i2c, 0x33).unwrap();

        I2cMaster::write(&mut i2c, 0x50, &[0x01]).unwrap();
    }
}
