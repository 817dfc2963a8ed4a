use embedded_hal::i2c::{self, I2c};
use log::debug;

use crate::error::{Error, Result};

fn bus_error<E: i2c::Error>(err: E) -> Error {
    debug!("I2C transfer failed: {:?}", err);
    Error::I2c(err.kind())
}

/// Register level access to one device on a shared two-wire bus.
pub struct DeviceBus<I2C> {
    pub(crate) i2c: I2C,
    address: u8,
}

impl<I2C: I2c> DeviceBus<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        DeviceBus { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back, e.g. to hand it to another driver.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Read `buf.len()` consecutive bytes starting at `register`.
    pub fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c.write_read(self.address, &[register], buf).map_err(bus_error)
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_registers(register, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c.write(self.address, &[register, value]).map_err(bus_error)
    }
}

/// Open `/dev/i2c-<bus>`.
pub fn open_i2c(bus: u8) -> Result<rppal::i2c::I2c> {
    let i2c = rppal::i2c::I2c::with_bus(bus)?;
    debug!("opened /dev/i2c-{}", bus);
    Ok(i2c)
}
