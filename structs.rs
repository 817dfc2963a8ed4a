use std::fmt;

/// Factory trimming constants, read once from the sensor NVM.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CalibParams {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12-bit signed, packed across 0xE4/0xE5
    pub dig_h4: i16,
    /// 12-bit signed, packed across 0xE5/0xE6
    pub dig_h5: i16,
    pub dig_h6: i8,
}

/// Uncompensated ADC readings of one measurement cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawData {
    /// 20 bit
    pub pressure: u32,
    /// 20 bit
    pub temperature: u32,
    /// 16 bit
    pub humidity: u32,
}

/// One compensated reading in the sensor's native fixed-point units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Hundredths of a degree Celsius.
    pub temperature: i32,
    /// Pascal in Q24.8; 0 when the pressure could not be computed.
    pub pressure: u32,
    /// Thousandths of a percent relative humidity.
    pub humidity: u32,
}

impl Measurement {
    pub fn celsius(&self) -> f64 {
        self.temperature as f64 / 100.0
    }

    pub fn pascals(&self) -> f64 {
        self.pressure as f64 / 256.0
    }

    pub fn hectopascals(&self) -> f64 {
        self.pressure as f64 / 25600.0
    }

    pub fn relative_humidity(&self) -> f64 {
        self.humidity as f64 / 1000.0
    }

    /// Barometric altitude in metres relative to `sea_level_hpa`.
    ///
    /// `None` when the pressure reading is the "no valid pressure" 0.
    pub fn altitude(&self, sea_level_hpa: f64) -> Option<f64> {
        if self.pressure == 0 {
            return None;
        }
        Some(44330.0 * (1.0 - (self.hectopascals() / sea_level_hpa).powf(1.0 / 5.255)))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T = {:.2} ; H = {:.3} ; P = {:.2}",
            self.celsius(),
            self.relative_humidity(),
            self.hectopascals()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions() {
        let m = Measurement {
            temperature: 2508,
            pressure: 25767233,
            humidity: 56317,
        };
        assert_eq!(m.celsius(), 25.08);
        assert!((m.pascals() - 100653.25).abs() < 1e-6);
        assert!((m.hectopascals() - 1006.5325).abs() < 1e-6);
        assert_eq!(m.relative_humidity(), 56.317);
        assert_eq!(m.to_string(), "T = 25.08 ; H = 56.317 ; P = 1006.53");
    }

    #[test]
    fn altitude_is_zero_at_reference_pressure() {
        let m = Measurement {
            temperature: 2000,
            pressure: 101325 * 256,
            humidity: 0,
        };
        assert!(m.altitude(1013.25).unwrap().abs() < 1e-9);

        let higher = Measurement {
            pressure: 90000 * 256,
            ..m
        };
        let alt = higher.altitude(1013.25).unwrap();
        assert!(alt > 980.0 && alt < 1000.0, "altitude {}", alt);
    }

    #[test]
    fn no_altitude_without_pressure() {
        let m = Measurement {
            temperature: 2508,
            pressure: 0,
            humidity: 56317,
        };
        assert_eq!(m.altitude(1013.25), None);
        assert_eq!(m.to_string(), "T = 25.08 ; H = 56.317 ; P = 0.00");
    }
}
