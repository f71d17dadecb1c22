// Licensed under the Apache-2.0 license

//! Pin-to-peripheral resolution for the I2C pins of the STM32F334.

/// GPIO pins, named after port and index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PinName {
    PA0,
    PA1,
    PA9,
    PA10,
    PA14,
    PA15,
    PB6,
    PB7,
    PB8,
    PB9,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    A,
    B,
}

impl PinName {
    #[must_use]
    pub fn port(self) -> Port {
        match self {
            PinName::PA0
            | PinName::PA1
            | PinName::PA9
            | PinName::PA10
            | PinName::PA14
            | PinName::PA15 => Port::A,
            PinName::PB6 | PinName::PB7 | PinName::PB8 | PinName::PB9 => Port::B,
        }
    }

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            PinName::PA0 => 0,
            PinName::PA1 => 1,
            PinName::PA9 => 9,
            PinName::PA10 => 10,
            PinName::PA14 => 14,
            PinName::PA15 => 15,
            PinName::PB6 => 6,
            PinName::PB7 => 7,
            PinName::PB8 => 8,
            PinName::PB9 => 9,
        }
    }
}

/// I2C controller instances, carrying their register base address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum I2cName {
    I2c1 = 0x4000_5400,
}

impl I2cName {
    #[must_use]
    pub fn base_address(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PinMode {
    Input,
    Output,
    AlternateOpenDrain,
    AlternatePushPull,
    Analog,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Electrical configuration applied when a pin is handed to a peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PinFunction {
    pub mode: PinMode,
    pub pull: Pull,
    pub alternate: u8,
}

const GPIO_AF4_I2C1: u8 = 4;

const I2C1_OPEN_DRAIN: PinFunction = PinFunction {
    mode: PinMode::AlternateOpenDrain,
    pull: Pull::None,
    alternate: GPIO_AF4_I2C1,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinMap {
    pub pin: PinName,
    pub peripheral: I2cName,
    pub function: PinFunction,
}

pub static PINMAP_I2C_SDA: &[PinMap] = &[
    PinMap {
        pin: PinName::PA14,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
    PinMap {
        pin: PinName::PB7,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
    PinMap {
        pin: PinName::PB9,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
];

pub static PINMAP_I2C_SCL: &[PinMap] = &[
    PinMap {
        pin: PinName::PA15,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
    PinMap {
        pin: PinName::PB6,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
    PinMap {
        pin: PinName::PB8,
        peripheral: I2cName::I2c1,
        function: I2C1_OPEN_DRAIN,
    },
];

#[must_use]
pub fn pinmap_find(pin: PinName, map: &[PinMap]) -> Option<&PinMap> {
    map.iter().find(|entry| entry.pin == pin)
}

#[must_use]
pub fn pinmap_peripheral(pin: PinName, map: &[PinMap]) -> Option<I2cName> {
    pinmap_find(pin, map).map(|entry| entry.peripheral)
}

#[must_use]
pub fn pinmap_function(pin: PinName, map: &[PinMap]) -> Option<PinFunction> {
    pinmap_find(pin, map).map(|entry| entry.function)
}

/// Common peripheral of two resolved pins, `None` if either is unmapped or
/// they belong to different controllers.
#[must_use]
pub fn pinmap_merge(a: Option<I2cName>, b: Option<I2cName>) -> Option<I2cName> {
    match (a, b) {
        (Some(a), Some(b)) if a == b => Some(a),
        _ => None,
    }
}
