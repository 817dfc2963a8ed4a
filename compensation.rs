//! Integer compensation formulas of the BME280 datasheet (section 4.2.3).
//!
//! Temperature runs in 64 bit. Pressure and humidity run in 128 bit, wide
//! enough for any calibration and ADC value of a 20/16-bit part. The
//! temperature formula produces `t_fine`, which both the pressure and the
//! humidity formula consume, so temperature has to be compensated first in
//! every cycle.

use crate::structs::CalibParams;

/// Upper bound of the humidity accumulator before the final shift
/// (100 %RH in Q22.10, shifted left by 12).
pub const HUMIDITY_CEILING: i64 = 419_430_400;

/// Returns the temperature in hundredths of a degree Celsius and `t_fine`.
pub fn compensate_temperature(adc_t: u32, calib: &CalibParams) -> (i32, i32) {
    let adc_t = i64::from(adc_t);
    let t1 = i64::from(calib.dig_t1);
    let t2 = i64::from(calib.dig_t2);
    let t3 = i64::from(calib.dig_t3);

    let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
    let delta = (adc_t >> 4) - t1;
    let var2 = (((delta * delta) >> 12) * t3) >> 14;
    let t_fine = var1 + var2;
    let temperature = (t_fine * 5 + 128) >> 8;

    (temperature as i32, t_fine as i32)
}

/// Returns the pressure in Pascal as Q24.8 (divide by 256 for Pa).
///
/// 0 means "no valid pressure": the denominator is zero, or the result
/// does not fit the unsigned 32-bit output.
pub fn compensate_pressure(adc_p: u32, t_fine: i32, calib: &CalibParams) -> u32 {
    let p1 = i128::from(calib.dig_p1);
    let p2 = i128::from(calib.dig_p2);
    let p3 = i128::from(calib.dig_p3);
    let p4 = i128::from(calib.dig_p4);
    let p5 = i128::from(calib.dig_p5);
    let p6 = i128::from(calib.dig_p6);
    let p7 = i128::from(calib.dig_p7);
    let p8 = i128::from(calib.dig_p8);
    let p9 = i128::from(calib.dig_p9);

    let mut var1 = i128::from(t_fine) - 128_000;
    let mut var2 = var1 * var1 * p6;
    var2 += (var1 * p5) << 17;
    var2 += p4 << 35;
    var1 = ((var1 * var1 * p3) >> 8) + ((var1 * p2) << 12);
    var1 = (((1i128 << 47) + var1) * p1) >> 33;
    if var1 == 0 {
        return 0;
    }

    let mut p = 1_048_576 - i128::from(adc_p);
    p = (((p << 31) - var2) * 3125) / var1;
    // a near-zero denominator can still blow up the square
    let q = p >> 13;
    let Some(square) = q.checked_mul(q).and_then(|sq| sq.checked_mul(p9)) else {
        return 0;
    };
    var1 = square >> 25;
    var2 = (p8 * p) >> 19;
    p = ((p + var1 + var2) >> 8) + (p7 << 4);

    u32::try_from(p).unwrap_or(0)
}

/// Humidity accumulator before clamping, exposed for range checks.
/// Saturates at the `i64` bounds.
pub fn humidity_accumulator(adc_h: u32, t_fine: i32, calib: &CalibParams) -> i64 {
    let adc_h = i128::from(adc_h);
    let h1 = i128::from(calib.dig_h1);
    let h2 = i128::from(calib.dig_h2);
    let h3 = i128::from(calib.dig_h3);
    let h4 = i128::from(calib.dig_h4);
    let h5 = i128::from(calib.dig_h5);
    let h6 = i128::from(calib.dig_h6);

    let v = i128::from(t_fine) - 76_800;
    let offset = (((adc_h << 14) - (h4 << 20) - (h5 * v)) + 16_384) >> 15;
    let sensitivity = (((((v * h6) >> 10) * (((v * h3) >> 11) + 32_768)) >> 10) + 2_097_152) * h2 + 8_192;
    let v = offset * (sensitivity >> 14);
    let v = v - (((((v >> 15) * (v >> 15)) >> 7) * h1) >> 4);
    v.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Returns the compensated humidity (thousandths of a percent).
///
/// The accumulator is clamped to `[0, HUMIDITY_CEILING]` before the final
/// shift, never wrapped.
pub fn compensate_humidity(adc_h: u32, t_fine: i32, calib: &CalibParams) -> u32 {
    let v = humidity_accumulator(adc_h, t_fine, calib).clamp(0, HUMIDITY_CEILING);
    (v >> 12) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::tests::reference_calib;
    use rstest::rstest;

    const T_FINE: i32 = 128_422;

    #[test]
    fn temperature_matches_datasheet_example() {
        let calib = reference_calib();
        let (temperature, t_fine) = compensate_temperature(519_888, &calib);
        assert_eq!(t_fine, T_FINE);
        assert_eq!(temperature, 2508);
    }

    #[test]
    fn pressure_matches_datasheet_example() {
        let calib = reference_calib();
        let pressure = compensate_pressure(415_148, T_FINE, &calib);
        assert_eq!(pressure, 25_767_233);
        // datasheet quotes 100653.27 Pa
        assert!((pressure as f64 / 256.0 - 100_653.27).abs() < 0.05);
    }

    #[rstest]
    #[case(0)]
    #[case(415_148)]
    #[case(0xFFFFF)]
    fn pressure_sentinel_on_zero_denominator(#[case] adc_p: u32) {
        let calib = CalibParams {
            dig_p1: 0,
            ..reference_calib()
        };
        assert_eq!(compensate_pressure(adc_p, T_FINE, &calib), 0);
    }

    #[rstest]
    #[case(0, None, 44_339_071)]
    #[case(415_148, None, 25_767_233)]
    // negative result, used to wrap to 4_293_269_792
    #[case(0xFFFFF, None, 0)]
    // (p << 31) - var2 times 3125 exceeds i64 here
    #[case(0, Some(-32_768), 70_573_934)]
    #[case(415_148, Some(-32_768), 51_380_854)]
    #[case(0xFFFFF, Some(-32_768), 22_968_236)]
    #[case(0, Some(32_767), 22_968_895)]
    #[case(0xFFFFF, Some(32_767), 0)]
    fn pressure_over_the_full_adc_range(#[case] adc_p: u32, #[case] dig_p4: Option<i16>, #[case] expected: u32) {
        let mut calib = reference_calib();
        if let Some(p4) = dig_p4 {
            calib.dig_p4 = p4;
        }
        assert_eq!(compensate_pressure(adc_p, T_FINE, &calib), expected);
    }

    #[rstest]
    #[case(i32::MIN)]
    #[case(i32::MAX)]
    fn pressure_survives_extreme_t_fine(#[case] t_fine: i32) {
        let calib = CalibParams {
            dig_p1: 65_535,
            dig_p3: 32_767,
            dig_p4: -32_768,
            dig_p6: 32_767,
            dig_p9: 32_767,
            ..reference_calib()
        };
        for adc_p in [0, 415_148, 0xFFFFF] {
            let _ = compensate_pressure(adc_p, t_fine, &calib);
        }
    }

    #[rstest]
    #[case(30_000, 56_317)]
    #[case(32_768, 72_045)]
    #[case(0, 0)]
    #[case(65_535, 102_400)]
    fn humidity_reference_values(#[case] adc_h: u32, #[case] expected: u32) {
        assert_eq!(compensate_humidity(adc_h, T_FINE, &reference_calib()), expected);
    }

    #[test]
    fn humidity_clamps_below_zero() {
        let calib = reference_calib();
        assert!(humidity_accumulator(0, T_FINE, &calib) < 0);
        assert_eq!(compensate_humidity(0, T_FINE, &calib), 0);
    }

    #[test]
    fn humidity_clamps_above_ceiling() {
        let calib = CalibParams {
            dig_h1: 0,
            dig_h2: 32_767,
            dig_h3: 255,
            dig_h4: -2048,
            dig_h5: 0,
            dig_h6: 127,
            ..reference_calib()
        };
        assert!(humidity_accumulator(65_535, T_FINE, &calib) > HUMIDITY_CEILING);
        assert_eq!(compensate_humidity(65_535, T_FINE, &calib), (HUMIDITY_CEILING >> 12) as u32);
    }

    #[test]
    fn humidity_output_stays_in_range() {
        let calib = reference_calib();
        for adc_h in (0..=65_535u32).step_by(97) {
            for t_fine in [-200_000, 0, T_FINE, 300_000] {
                let h = compensate_humidity(adc_h, t_fine, &calib);
                assert!(i64::from(h) <= HUMIDITY_CEILING >> 12);
            }
        }
    }

    #[rstest]
    #[case(i32::MIN)]
    #[case(-200_000)]
    #[case(300_000)]
    #[case(i32::MAX)]
    fn humidity_survives_extreme_calibration(#[case] t_fine: i32) {
        let calib = CalibParams {
            dig_h1: 255,
            dig_h2: 32_767,
            dig_h3: 255,
            dig_h4: -2048,
            dig_h5: 2047,
            dig_h6: 127,
            ..reference_calib()
        };
        for adc_h in [0, 30_000, 65_535] {
            let h = compensate_humidity(adc_h, t_fine, &calib);
            assert!(i64::from(h) <= HUMIDITY_CEILING >> 12);
        }
    }
}
