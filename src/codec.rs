//! Register decoding shared by the sensor drivers.
//!
//! Pure functions over fixed-size byte buffers. Nothing in here touches the
//! bus; the drivers read the bytes and hand them over.

use crate::error::CompensationFault;

/// Standard atmosphere at sea level, hPa.
pub const SEA_LEVEL_HPA: f64 = 1013.25;

const TWO_POW_20: f64 = 1_048_576.0;

pub fn decode_unsigned_16_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

pub fn decode_signed_16_le(bytes: [u8; 2]) -> i16 {
    i16::from_le_bytes(bytes)
}

/// 20-bit sample packed as `b0[7:0] b1[7:0] b2[7:4]`.
pub fn decode_packed_20bit(bytes: [u8; 3]) -> u32 {
    (u32::from(bytes[0]) << 12) | (u32::from(bytes[1]) << 4) | (u32::from(bytes[2]) >> 4)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

// ----------------- AHT21 -----------------

/// Relative humidity in percent from the 20-bit AHT21 word.
pub fn aht_humidity_from_raw(raw: u32) -> Result<f64, CompensationFault> {
    let humidity = f64::from(raw) / TWO_POW_20 * 100.0;
    CompensationFault::check("humidity", humidity, 0.0, 100.0)
}

/// Temperature in °C from the 20-bit AHT21 word.
pub fn aht_temperature_from_raw(raw: u32) -> Result<f64, CompensationFault> {
    let temperature = f64::from(raw) / TWO_POW_20 * 200.0 - 50.0;
    CompensationFault::check("temperature", temperature, -40.0, 85.0)
}

/// Split a 6-byte AHT21 frame into its raw humidity and temperature words.
///
/// Layout: `status, h[19:12], h[11:4], h[3:0]|t[19:16], t[15:8], t[7:0]`.
pub fn split_aht_frame(frame: &[u8; 6]) -> (u32, u32) {
    let humidity = decode_packed_20bit([frame[1], frame[2], frame[3]]);
    let temperature =
        (u32::from(frame[3] & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);
    (humidity, temperature)
}

/// Decoded `(humidity %, temperature °C)`, unrounded.
pub fn decode_aht_frame(frame: &[u8; 6]) -> Result<(f64, f64), CompensationFault> {
    let (raw_h, raw_t) = split_aht_frame(frame);
    Ok((aht_humidity_from_raw(raw_h)?, aht_temperature_from_raw(raw_t)?))
}

// ----------------- BMP280 -----------------

/// Factory trim coefficients of one BMP280, registers 0x88..=0x9F.
///
/// Only constructible from a complete register dump, so every compensation
/// runs against a fully loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTable {
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
}

/// Compensated BMP280 output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensated {
    pub t_fine: i32,
    pub temperature_c: f64,
    pub pressure_hpa: f64,
}

impl CalibrationTable {
    pub const REGISTER_LEN: usize = 24;

    pub fn from_registers(regs: &[u8; Self::REGISTER_LEN]) -> Self {
        let word = |i: usize| [regs[i], regs[i + 1]];
        Self {
            dig_t1: decode_unsigned_16_le(word(0)),
            dig_t2: decode_signed_16_le(word(2)),
            dig_t3: decode_signed_16_le(word(4)),
            dig_p1: decode_unsigned_16_le(word(6)),
            dig_p2: decode_signed_16_le(word(8)),
            dig_p3: decode_signed_16_le(word(10)),
            dig_p4: decode_signed_16_le(word(12)),
            dig_p5: decode_signed_16_le(word(14)),
            dig_p6: decode_signed_16_le(word(16)),
            dig_p7: decode_signed_16_le(word(18)),
            dig_p8: decode_signed_16_le(word(20)),
            dig_p9: decode_signed_16_le(word(22)),
        }
    }

    /// First stage: temperature fine value from the raw 20-bit temperature.
    pub fn t_fine(&self, raw_temperature: u32) -> i32 {
        let adc_t = i64::from(raw_temperature);
        let t1 = i64::from(self.dig_t1);
        let t2 = i64::from(self.dig_t2);
        let t3 = i64::from(self.dig_t3);

        let var1 = (((adc_t >> 3) - (t1 << 1)) * t2) >> 11;
        let delta = (adc_t >> 4) - t1;
        let var2 = (((delta * delta) >> 12) * t3) >> 14;
        (var1 + var2) as i32
    }

    /// Second stage: Q24.8 pressure in Pa from the raw 20-bit pressure.
    ///
    /// Intermediates are widened to i128: the datasheet's i64 pipeline
    /// overflows on corrupted bursts (e.g. all-0xFF frames).
    pub fn pressure_fixed(&self, raw_pressure: u32, t_fine: i32) -> Result<i64, CompensationFault> {
        let p1 = i128::from(self.dig_p1);
        let p2 = i128::from(self.dig_p2);
        let p3 = i128::from(self.dig_p3);
        let p4 = i128::from(self.dig_p4);
        let p5 = i128::from(self.dig_p5);
        let p6 = i128::from(self.dig_p6);
        let p7 = i128::from(self.dig_p7);
        let p8 = i128::from(self.dig_p8);
        let p9 = i128::from(self.dig_p9);

        let mut var1 = i128::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * p6;
        var2 += (var1 * p5) << 17;
        var2 += p4 << 35;
        var1 = ((var1 * var1 * p3) >> 8) + ((var1 * p2) << 12);
        var1 = (((1i128 << 47) + var1) * p1) >> 33;
        if var1 == 0 {
            return Err(CompensationFault::ZeroDivisor);
        }

        let mut p = 1_048_576 - i128::from(raw_pressure);
        p = (((p << 31) - var2) * 3125) / var1;
        let var1 = (p9 * (p >> 13) * (p >> 13)) >> 25;
        let var2 = (p8 * p) >> 19;
        let p_fixed = ((p + var1 + var2) >> 8) + (p7 << 4);
        i64::try_from(p_fixed).map_err(|_| CompensationFault::Overflow)
    }

    pub fn compensate(&self, raw_temperature: u32, raw_pressure: u32) -> Result<Compensated, CompensationFault> {
        let t_fine = self.t_fine(raw_temperature);
        let p_fixed = self.pressure_fixed(raw_pressure, t_fine)?;
        Ok(Compensated {
            t_fine,
            temperature_c: temperature_from_t_fine(t_fine),
            // Q24.8 Pa -> Pa (/256) -> hPa (/100)
            pressure_hpa: p_fixed as f64 / 256.0 / 100.0,
        })
    }
}

pub fn temperature_from_t_fine(t_fine: i32) -> f64 {
    f64::from((t_fine * 5 + 128) >> 8) / 100.0
}

/// Raw `(temperature, pressure)` from the 6-byte burst at 0xF7.
pub fn split_bmp_burst(burst: &[u8; 6]) -> (u32, u32) {
    let pressure = decode_packed_20bit([burst[0], burst[1], burst[2]]);
    let temperature = decode_packed_20bit([burst[3], burst[4], burst[5]]);
    (temperature, pressure)
}

/// Barometric altitude in metres, rounded to 2 decimals.
pub fn altitude_from_pressure(pressure_hpa: f64, sea_level_hpa: f64) -> f64 {
    if pressure_hpa <= 0.0 || sea_level_hpa <= 0.0 {
        return 0.0;
    }
    round_to(44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903)), 2)
}

// ----------------- ENS160 -----------------

/// Ambient temperature as the ENS160 expects it: Kelvin × 64.
pub fn ens160_temperature_word(temperature_c: f64) -> u16 {
    ((temperature_c + 273.15) * 64.0).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Relative humidity as the ENS160 expects it: fraction × 512.
pub fn ens160_humidity_word(humidity_pct: f64) -> u16 {
    (humidity_pct / 100.0 * 512.0).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

// ----------------- ADC -----------------

/// Signed 16-bit ADC code to volts for a converter with the given full scale.
pub fn adc_code_to_volts(raw: i16, full_scale_volts: f64) -> f64 {
    f64::from(raw) / 32767.0 * full_scale_volts
}
