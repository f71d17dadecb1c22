// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! Composable traits layered over a blocking I2C controller. Each trait covers
//! one responsibility so that a consumer can ask for exactly what it uses.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! I2cHardwareCore (foundation)
//!     ├── I2cMaster (master operations)
//!     └── slave module (feature: i2c_target)
//!         ├── I2cSlaveCore (own address and mode control)
//!         ├── I2cSlaveBuffer (data transfer)
//!         ├── I2cSlaveEventPolling (address match polling)
//!         ├── I2cSlave (all slave capabilities)
//!         └── I2cMasterSlave (master + full slave)
//! ```

use crate::i2c::common::{I2cConfig, I2cSpeed};
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core I2C hardware interface providing basic operations
///
/// # Examples
///
/// ```rust,ignore
/// use stm32_i2c_ddk::i2c::{I2cConfig, I2cHardwareCore, I2cSpeed};
///
/// fn setup_i2c<T: I2cHardwareCore>(mut controller: T) -> Result<(), T::Error> {
///     controller.init(&I2cConfig::default());
///     let timing = controller.configure_timing(I2cSpeed::Fast)?;
///     // `timing` is the TIMINGR value now in effect
///     Ok(())
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Reset the controller and bring it up again with `config`
    fn init(&mut self, config: &I2cConfig);

    /// Program the bus timing for `speed`
    ///
    /// # Returns
    ///
    /// The raw timing register value written to the controller.
    ///
    /// # Errors
    ///
    /// Returns an error if no timing is known for the current kernel clock.
    /// The controller configuration is unchanged in that case.
    fn configure_timing(&mut self, speed: I2cSpeed) -> Result<u32, Self::Error>;

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if bus recovery fails.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C Master mode operations
///
/// # Examples
///
/// ```rust,ignore
/// use stm32_i2c_ddk::i2c::I2cMaster;
///
/// fn read_sensor<T: I2cMaster>(mut i2c: T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.write_read(0x48u8, &[0x00], &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write `bytes` to `addr`, ending with STOP
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the transfer times out.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buffer` from `addr`, ending with STOP
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the transfer times out.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read with a repeated start in between
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute `ops_slice` as one bus transaction
    ///
    /// Adjacent operations of the same direction share one transfer. STOP is
    /// only sent after the last operation.
    ///
    /// # Errors
    ///
    /// Returns the first error; the remaining operations are not executed.
    /// Length errors are reported before anything goes on the bus, and a
    /// failure after the first START still ends with STOP.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// I2C Slave/Target mode functionality (feature-gated module)
#[cfg(feature = "i2c_target")]
pub mod slave {
    use super::*;
    use crate::i2c::common::{SlaveEvent, SlaveStatus};

    /// Core slave functionality - address configuration and mode control
    ///
    /// Methods that only report state take `&mut self` because they read
    /// controller registers.
    pub trait I2cSlaveCore<A: AddressMode = SevenBitAddress>: super::I2cHardwareCore {
        /// Set the own address and start acknowledging it
        ///
        /// # Errors
        ///
        /// Returns an error if the address cannot be programmed.
        fn configure_slave_address(&mut self, addr: A) -> Result<(), Self::Error>;

        /// # Errors
        ///
        /// Returns an error if slave mode cannot be enabled.
        fn enable_slave_mode(&mut self) -> Result<(), Self::Error>;

        /// # Errors
        ///
        /// Returns an error if slave mode cannot be disabled.
        fn disable_slave_mode(&mut self) -> Result<(), Self::Error>;

        fn is_slave_mode_enabled(&mut self) -> bool;

        fn slave_address(&mut self) -> Option<A>;
    }

    /// Slave data transfer with the addressing master
    pub trait I2cSlaveBuffer<A: AddressMode = SevenBitAddress>: I2cSlaveCore<A> {
        /// Receive bytes written by the master into `buffer`
        ///
        /// # Errors
        ///
        /// Returns an error if the master stops supplying data.
        fn read_slave_buffer(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

        /// Send `data` to the master reading from this slave
        ///
        /// # Errors
        ///
        /// Returns an error if the master stops clocking data out.
        fn write_slave_response(&mut self, data: &[u8]) -> Result<(), Self::Error>;
    }

    /// Polling for address matches
    pub trait I2cSlaveEventPolling<A: AddressMode = SevenBitAddress>: I2cSlaveCore<A> {
        /// Check for and acknowledge an address match
        ///
        /// # Errors
        ///
        /// Returns an error if the controller state cannot be read.
        fn poll_slave_events(&mut self) -> Result<Option<SlaveEvent>, Self::Error>;

        /// # Errors
        ///
        /// Returns an error if the controller state cannot be read.
        fn slave_status(&mut self) -> Result<SlaveStatus, Self::Error>;
    }

    /// Complete slave functionality
    pub trait I2cSlave<A: AddressMode = SevenBitAddress>:
        I2cSlaveCore<A> + I2cSlaveBuffer<A> + I2cSlaveEventPolling<A>
    {
    }

    impl<T, A> I2cSlave<A> for T
    where
        A: AddressMode,
        T: I2cSlaveCore<A> + I2cSlaveBuffer<A> + I2cSlaveEventPolling<A>,
    {
    }

    /// A controller acting as master and slave
    pub trait I2cMasterSlave<A: AddressMode = SevenBitAddress>:
        super::I2cMaster<A> + I2cSlave<A>
    {
    }

    impl<T, A> I2cMasterSlave<A> for T
    where
        A: AddressMode,
        T: super::I2cMaster<A> + I2cSlave<A>,
    {
    }
}
