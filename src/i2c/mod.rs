// Licensed under the Apache-2.0 license

//! STM32F3 I2C driver module.
//!
//! This module provides a blocking, polling-only driver for the STM32F3 I2C
//! controller, designed for bare-metal and `no_std` environments. It integrates
//! the register-level driver with higher level abstractions for I2C
//! communication.

pub mod common;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod registers;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
#[cfg(feature = "i2c_target")]
pub mod slave_impl;
pub mod stm32_i2c;
pub mod system_setup;
pub mod timeout;
pub mod timing;
pub mod traits;

pub use common::{
    ByteErrorPolicy, Error, Event, I2cConfig, I2cConfigBuilder, I2cSpeed, SlaveEvent, SlaveStatus,
};
pub use i2c_controller::I2cController;
pub use stm32_i2c::Stm32I2c;
pub use traits::{I2cHardwareCore, I2cMaster};
