use clap::Parser;

use crate::bme280::ADDR_BME280;
use crate::error::{Error, Result};
use crate::stepper::HALF_STEP_SEQUENCE;

fn parse_address(s: &str) -> std::result::Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid I2C address {:?}: {}", s, e))
}

/// Weather station with a pointing motor: BME280 on I2C, stepper on GPIO
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// I2C bus number (/dev/i2c-N)
    #[arg(long, default_value_t = 1)]
    pub i2c_bus: u8,

    /// BME280 slave address, hex
    #[arg(long, default_value = "0x77", value_parser = parse_address)]
    pub address: u8,

    /// BCM pins wired to IN1..IN4 of the motor driver
    #[arg(long, value_delimiter = ',', default_values_t = [14u8, 27, 26, 25])]
    pub coil_pins: Vec<u8>,

    /// Seconds between measurements
    #[arg(short, long, default_value_t = 5)]
    pub interval: u64,

    /// Milliseconds between status polls while the sensor is measuring
    #[arg(long, default_value_t = 100)]
    pub poll_interval_ms: u32,

    /// Microseconds between coil activations
    #[arg(long, default_value_t = 1000)]
    pub step_delay_us: u32,

    /// Degrees turned by the clockwise / counterclockwise commands
    #[arg(long, default_value_t = 1.0)]
    pub nudge_degrees: f64,

    /// Coil table rows driven per step
    #[arg(long, default_value_t = 8)]
    pub coil_entries_per_step: usize,

    /// Motor stride angle in degrees
    #[arg(long, default_value_t = 5.625)]
    pub stride_angle: f64,

    /// Motor gearbox reduction
    #[arg(long, default_value_t = 64.0)]
    pub gear_ratio: f64,

    /// Sea-level reference pressure in hPa for the altitude estimate
    #[arg(long, default_value_t = 1013.25)]
    pub sea_level_hpa: f64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            i2c_bus: 1,
            address: ADDR_BME280,
            coil_pins: vec![14, 27, 26, 25],
            interval: 5,
            poll_interval_ms: 100,
            step_delay_us: 1000,
            nudge_degrees: 1.0,
            coil_entries_per_step: HALF_STEP_SEQUENCE.len(),
            stride_angle: 5.625,
            gear_ratio: 64.0,
            sea_level_hpa: 1013.25,
            verbose: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.coil_pins()?;
        if self.coil_entries_per_step == 0 || self.coil_entries_per_step > HALF_STEP_SEQUENCE.len() {
            return Err(Error::Config(format!(
                "coil entries per step must be within 1..={}",
                HALF_STEP_SEQUENCE.len()
            )));
        }
        if !(self.nudge_degrees > 0.0) {
            return Err(Error::Config("nudge degrees must be positive".into()));
        }
        if !(self.stride_angle > 0.0) || !(self.gear_ratio > 0.0) {
            return Err(Error::Config("stride angle and gear ratio must be positive".into()));
        }
        if !(self.sea_level_hpa > 0.0) {
            return Err(Error::Config("sea-level pressure must be positive".into()));
        }
        Ok(())
    }

    /// IN1..IN4, exactly four pins.
    pub fn coil_pins(&self) -> Result<[u8; 4]> {
        self.coil_pins
            .as_slice()
            .try_into()
            .map_err(|_| Error::Config(format!("expected 4 coil pins, got {}", self.coil_pins.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_parser_defaults() {
        let parsed = Config::try_parse_from(["envmotor"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.address, default.address);
        assert_eq!(parsed.coil_pins, default.coil_pins);
        assert_eq!(parsed.coil_entries_per_step, 8);
        assert_eq!(parsed.step_delay_us, 1000);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn parses_overrides() {
        let parsed = Config::try_parse_from([
            "envmotor",
            "--address",
            "0x76",
            "--coil-pins",
            "5,6,13,19",
            "--coil-entries-per-step",
            "7",
            "-v",
        ])
        .unwrap();
        assert_eq!(parsed.address, 0x76);
        assert_eq!(parsed.coil_pins().unwrap(), [5, 6, 13, 19]);
        assert_eq!(parsed.coil_entries_per_step, 7);
        assert!(parsed.verbose);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = Config {
            coil_entries_per_step: 9,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = Config {
            gear_ratio: 0.0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        assert!(Config::try_parse_from(["envmotor", "--address", "zz"]).is_err());
        assert!(Config::try_parse_from(["envmotor", "--address", "0x177"]).is_err());
    }

    #[test]
    fn wrong_pin_count_is_an_error() {
        let parsed = Config::try_parse_from(["envmotor", "--coil-pins", "5,6,13"]).unwrap();
        assert!(matches!(parsed.coil_pins(), Err(Error::Config(_))));
        assert!(matches!(parsed.validate(), Err(Error::Config(_))));

        let cfg = Config {
            coil_pins: vec![5, 6, 13, 19, 26],
            ..Config::default()
        };
        assert!(cfg.coil_pins().is_err());
    }
}
