//! BME280 weather readings and a four-coil stepper on a Raspberry Pi.

pub mod bme280;
pub mod bus;
pub mod calibration;
pub mod command;
pub mod compensation;
pub mod config;
pub mod error;
pub mod stepper;
pub mod structs;

pub use error::{Error, Result};
