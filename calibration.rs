use embedded_hal::i2c::I2c;
use log::debug;

use crate::bus::DeviceBus;
use crate::error::Result;
use crate::structs::CalibParams;

// Calibration register blocks.
// cf. BME280 datasheet, table 16 "Compensation parameter storage"
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_00_LEN: usize = 24;
const REG_CALIB_25: u8 = 0xA1;
const REG_CALIB_26: u8 = 0xE1;
const REG_CALIB_26_LEN: usize = 7;

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn i16_at(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Decode the three calibration blocks (0x88..0x9F, 0xA1, 0xE1..0xE7).
pub fn decode(calib_00: &[u8; REG_CALIB_00_LEN], dig_h1: u8, calib_26: &[u8; REG_CALIB_26_LEN]) -> CalibParams {
    // dig_H4 and dig_H5 share 0xE5: H4 takes its low nibble, H5 its high nibble.
    // 0xE4 and 0xE6 hold the signed upper eight bits.
    let e4 = calib_26[3];
    let e5 = calib_26[4];
    let e6 = calib_26[5];
    let h4_msb = i16::from(e4 as i8) << 4;
    let h4_lsb = i16::from(e5 & 0x0F);
    let h5_msb = i16::from(e6 as i8) << 4;
    let h5_lsb = i16::from(e5 >> 4);

    CalibParams {
        dig_t1: u16_at(calib_00, 0),
        dig_t2: i16_at(calib_00, 2),
        dig_t3: i16_at(calib_00, 4),
        dig_p1: u16_at(calib_00, 6),
        dig_p2: i16_at(calib_00, 8),
        dig_p3: i16_at(calib_00, 10),
        dig_p4: i16_at(calib_00, 12),
        dig_p5: i16_at(calib_00, 14),
        dig_p6: i16_at(calib_00, 16),
        dig_p7: i16_at(calib_00, 18),
        dig_p8: i16_at(calib_00, 20),
        dig_p9: i16_at(calib_00, 22),
        dig_h1,
        dig_h2: i16_at(calib_26, 0),
        dig_h3: calib_26[2],
        dig_h4: h4_msb | h4_lsb,
        dig_h5: h5_msb | h5_lsb,
        dig_h6: calib_26[6] as i8,
    }
}

/// Read the factory calibration out of the sensor. No retries: the first
/// failing transfer is returned.
pub fn load<I2C: I2c>(bus: &mut DeviceBus<I2C>) -> Result<CalibParams> {
    let mut calib_00 = [0u8; REG_CALIB_00_LEN];
    bus.read_registers(REG_CALIB_00, &mut calib_00)?;
    let dig_h1 = bus.read_register(REG_CALIB_25)?;
    let mut calib_26 = [0u8; REG_CALIB_26_LEN];
    bus.read_registers(REG_CALIB_26, &mut calib_26)?;

    let calib = decode(&calib_00, dig_h1, &calib_26);
    debug!("calibration: {:?}", calib);
    Ok(calib)
}
