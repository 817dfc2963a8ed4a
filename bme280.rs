use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::bus::DeviceBus;
use crate::calibration;
use crate::compensation::{compensate_humidity, compensate_pressure, compensate_temperature};
use crate::error::{Error, Result};
use crate::structs::{CalibParams, Measurement, RawData};

// BME280 I2C slave address with SDO pulled high.
pub const ADDR_BME280: u8 = 0x77;

// BME280 register addresses.
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_PRESS: u8 = 0xF7;
const REG_TEMP: u8 = 0xFA;
const REG_HUM: u8 = 0xFD;

const CHIP_ID_BME280: u8 = 0x60;
const RESET_COMMAND: u8 = 0xB6;
const STATUS_MEASURING: u8 = 1 << 3;

const OSRS_X16: u8 = 0b101;
const MODE_SLEEP: u8 = 0b00;
const MODE_FORCED: u8 = 0b01;

const fn ctrl_meas(osrs_t: u8, osrs_p: u8, mode: u8) -> u8 {
    (osrs_t << 5) | (osrs_p << 2) | mode
}

/// Where the sensor is within one measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Triggered,
    Polling,
    Ready,
}

/// Per-cycle working state. Overwritten by every successful cycle.
#[derive(Debug, Default, Clone, Copy)]
struct MeasurementState {
    raw: RawData,
    t_fine: i32,
    last: Option<Measurement>,
}

/// One BME280 driven in forced mode.
pub struct Bme280<I2C, D> {
    bus: DeviceBus<I2C>,
    delay: D,
    calib: CalibParams,
    state: MeasurementState,
    phase: Phase,
    poll_interval_ms: u32,
}

impl<I2C: I2c, D: DelayNs> Bme280<I2C, D> {
    /// Verify the chip id, load the calibration and configure x16 oversampling.
    pub fn new(i2c: I2C, address: u8, delay: D, poll_interval_ms: u32) -> Result<Self> {
        let mut bus = DeviceBus::new(i2c, address);
        let chip_id = bus.read_register(REG_CHIP_ID)?;
        if chip_id != CHIP_ID_BME280 {
            return Err(Error::UnsupportedChip(chip_id));
        }
        let calib = calibration::load(&mut bus)?;

        let mut sensor = Bme280 {
            bus,
            delay,
            calib,
            state: MeasurementState::default(),
            phase: Phase::Idle,
            poll_interval_ms,
        };
        sensor.configure()?;
        info!("BME280 ready at 0x{:02X} (chip id 0x{:02X})", address, chip_id);
        Ok(sensor)
    }

    // ctrl_hum only takes effect after the next ctrl_meas write.
    fn configure(&mut self) -> Result<()> {
        self.bus.write_register(REG_CTRL_HUM, OSRS_X16)?;
        self.bus
            .write_register(REG_CTRL_MEAS, ctrl_meas(OSRS_X16, OSRS_X16, MODE_SLEEP))?;
        Ok(())
    }

    /// Soft reset. The calibration stays loaded; oversampling is re-applied.
    pub fn reset(&mut self) -> Result<()> {
        self.phase = Phase::Idle;
        self.bus.write_register(REG_RESET, RESET_COMMAND)?;
        self.delay.delay_ms(2);
        self.configure()
    }

    /// Hand the bus back.
    pub fn release(self) -> I2C {
        self.bus.release()
    }

    pub fn calibration(&self) -> &CalibParams {
        &self.calib
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_measurement(&self) -> Option<Measurement> {
        self.state.last
    }

    /// Intermediate temperature of the most recent cycle.
    pub fn t_fine(&self) -> i32 {
        self.state.t_fine
    }

    pub fn raw(&self) -> RawData {
        self.state.raw
    }

    /// Run one complete forced-mode cycle and return the compensated reading.
    ///
    /// Blocks while the sensor reports it is still measuring. A bus error
    /// aborts the cycle and leaves the controller idle.
    pub fn do_measure(&mut self) -> Result<Measurement> {
        let result = self.run_cycle();
        if result.is_err() {
            self.phase = Phase::Idle;
        }
        result
    }

    fn run_cycle(&mut self) -> Result<Measurement> {
        self.trigger()?;
        while self.phase == Phase::Polling {
            self.poll()?;
        }
        self.read_out()
    }

    fn trigger(&mut self) -> Result<()> {
        self.bus
            .write_register(REG_CTRL_MEAS, ctrl_meas(OSRS_X16, OSRS_X16, MODE_FORCED))?;
        self.phase = Phase::Triggered;
        debug!("forced measurement triggered");
        self.phase = Phase::Polling;
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        self.delay.delay_ms(self.poll_interval_ms);
        let status = self.bus.read_register(REG_STATUS)?;
        if status & STATUS_MEASURING == 0 {
            self.phase = Phase::Ready;
        }
        Ok(())
    }

    fn read_out(&mut self) -> Result<Measurement> {
        debug_assert_eq!(self.phase, Phase::Ready);

        let mut press = [0u8; 3];
        self.bus.read_registers(REG_PRESS, &mut press)?;
        let mut temp = [0u8; 3];
        self.bus.read_registers(REG_TEMP, &mut temp)?;
        let mut hum = [0u8; 2];
        self.bus.read_registers(REG_HUM, &mut hum)?;

        let raw = RawData {
            pressure: adc20(press),
            temperature: adc20(temp),
            humidity: (u32::from(hum[0]) << 8) | u32::from(hum[1]),
        };
        debug!("raw: {:?}", raw);

        let (temperature, t_fine) = compensate_temperature(raw.temperature, &self.calib);
        let measurement = Measurement {
            temperature,
            pressure: compensate_pressure(raw.pressure, t_fine, &self.calib),
            humidity: compensate_humidity(raw.humidity, t_fine, &self.calib),
        };

        self.state = MeasurementState {
            raw,
            t_fine,
            last: Some(measurement),
        };
        self.phase = Phase::Idle;
        Ok(measurement)
    }

    /// Log the last measurement.
    pub fn dump(&self) {
        match self.state.last {
            Some(m) => {
                info!("Temperature : {:7.2} C", m.celsius());
                info!("Pressure    : {:7.2} hPa", m.hectopascals());
                info!("Humidity    : {:7.2} %", m.relative_humidity());
            }
            None => info!("no measurement yet"),
        }
    }

    /// Altitude estimate from the last pressure reading. `None` before the
    /// first cycle and when that cycle had no valid pressure.
    pub fn altitude(&self, sea_level_hpa: f64) -> Option<f64> {
        self.state.last.and_then(|m| m.altitude(sea_level_hpa))
    }
}

// 20-bit big-endian value, low nibble of the last byte unused.
fn adc20(bytes: [u8; 3]) -> u32 {
    (u32::from(bytes[0]) << 12) | (u32::from(bytes[1]) << 4) | (u32::from(bytes[2]) >> 4)
}
