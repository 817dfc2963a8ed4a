use thiserror::Error;

/// Errors raised by the sensor, the motor and the command front end.
#[derive(Debug, Error)]
pub enum Error {
    /// A register read or write on the I2C bus failed
    #[error("I2C bus error: {0}")]
    I2c(embedded_hal::i2c::ErrorKind),
    /// The I2C device node could not be opened
    #[error("I2C bus unavailable: {0}")]
    I2cOpen(#[from] rppal::i2c::Error),
    /// A coil output pin could not be driven
    #[error("coil output error: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),
    /// A coil output pin could not be claimed
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    /// The chip id register did not identify a BME280
    #[error("unsupported chip id 0x{0:02X} (expected 0x60)")]
    UnsupportedChip(u8),
    /// Motor command text was neither a keyword nor an integer angle
    #[error("invalid motor command {0:?}: expected clockwise, counterclockwise or an integer angle")]
    InvalidCommand(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
