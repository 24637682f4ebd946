//! Linear per-channel calibration.

use crate::config::{CHANNELS, DEFAULT_CALIBRATION, FULL_SCALE, REFERENCE_UV};
use crate::utils::saturate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelCalibration {
    /// The voltage applied to calibrate the channel's gain, µV.
    pub calibration_voltage: i32,
    /// The voltage on the attenuator inputs corresponding to
    /// `full_scale_reading`, µV.
    pub full_scale_voltage: i32,
    /// The conversion result, relative to `offset`, for a full scale voltage
    /// applied at the inputs of the attenuator network.
    pub full_scale_reading: i32,
    /// The conversion result with the attenuator inputs shorted.
    pub offset: i32,
}

impl ChannelCalibration {
    pub const fn new(calibration_voltage: i32, full_scale_voltage: i32) -> Self {
        ChannelCalibration {
            calibration_voltage,
            full_scale_voltage,
            full_scale_reading: FULL_SCALE,
            offset: 0,
        }
    }

    /// Calibrated reading in µV for a raw conversion result.
    ///
    /// `(raw - offset) * full_scale_voltage / full_scale_reading`, widened,
    /// truncated toward zero and saturated.  A zero `full_scale_reading`
    /// reads as zero.
    pub const fn apply(&self, raw: i32) -> i32 {
        if self.full_scale_reading == 0 {
            return 0;
        }
        let deviation = raw as i64 - self.offset as i64;
        saturate(deviation.saturating_mul(self.full_scale_voltage as i64)
                 / self.full_scale_reading as i64)
    }

    /// Take `raw` as the reading with the inputs shorted.
    pub fn set_offset(&mut self, raw: i32) {
        self.offset = raw;
    }

    /// Take `raw` as the reading with `calibration_voltage` applied, and
    /// scale it up to the reading for `full_scale_voltage`.  The deviation
    /// is multiplied before dividing, so non integer voltage ratios keep
    /// their precision.
    pub fn set_gain(&mut self, raw: i32) {
        if self.calibration_voltage == 0 {
            return;
        }
        let deviation = raw as i64 - self.offset as i64;
        self.full_scale_reading = saturate(
            deviation.saturating_mul(self.full_scale_voltage as i64)
                / self.calibration_voltage as i64);
    }
}

/// Number of 32 bit words in the persisted record.
pub const RECORD_WORDS: usize = 4 * CHANNELS + 1;

/// All channel calibrations and the reference voltage.  This is the record
/// persisted in the information memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationSet {
    pub channel: [ChannelCalibration; CHANNELS],
    pub reference_voltage: i32,
}

impl CalibrationSet {
    pub const DEFAULT: CalibrationSet = CalibrationSet {
        channel: DEFAULT_CALIBRATION,
        reference_voltage: REFERENCE_UV,
    };

    /// Calibrated readings for all channels.
    pub fn apply(&self, raw: &[i32; CHANNELS]) -> [i32; CHANNELS] {
        core::array::from_fn(|i| self.channel[i].apply(raw[i]))
    }

    /// Flatten for the storage write.
    pub fn to_words(&self) -> [u32; RECORD_WORDS] {
        let mut words = [0; RECORD_WORDS];
        for (chunk, cal) in words.chunks_exact_mut(4).zip(&self.channel) {
            chunk.copy_from_slice(&[
                cal.calibration_voltage as u32,
                cal.full_scale_voltage as u32,
                cal.full_scale_reading as u32,
                cal.offset as u32]);
        }
        words[RECORD_WORDS - 1] = self.reference_voltage as u32;
        words
    }

    pub fn from_words(words: &[u32; RECORD_WORDS]) -> Self {
        let channel = core::array::from_fn(|i| {
            let w = &words[4 * i .. 4 * i + 4];
            ChannelCalibration {
                calibration_voltage: w[0] as i32,
                full_scale_voltage: w[1] as i32,
                full_scale_reading: w[2] as i32,
                offset: w[3] as i32,
            }
        });
        CalibrationSet {channel, reference_voltage: words[RECORD_WORDS - 1] as i32}
    }
}

impl Default for CalibrationSet {
    fn default() -> Self {Self::DEFAULT}
}

// A full scale reading gives exactly the full scale voltage.
static_assertions::const_assert_eq!(
    DEFAULT_CALIBRATION[0].apply(FULL_SCALE), 30_000_000);
static_assertions::const_assert_eq!(
    DEFAULT_CALIBRATION[1].apply(FULL_SCALE), 1_000_000);

#[cfg(test)]
fn cal(fsv: i32, fsr: i32, offset: i32) -> ChannelCalibration {
    ChannelCalibration {
        calibration_voltage: fsv,
        full_scale_voltage: fsv,
        full_scale_reading: fsr,
        offset,
    }
}

#[test]
fn full_scale_identity() {
    for fsv in [1, 1_000_000, 30_000_000, -5_000_000, i32::MAX] {
        for fsr in [1, -1, 77, 0x7f_ffff, -0x80_0000, 123_456] {
            assert_eq!(cal(fsv, fsr, 0).apply(fsr), fsv, "{fsv} {fsr}");
            // With an offset the full scale reading is relative to it.
            assert_eq!(cal(fsv, fsr, 1000).apply(fsr + 1000), fsv);
        }
    }
    for c in DEFAULT_CALIBRATION {
        assert_eq!(c.apply(c.full_scale_reading), c.full_scale_voltage);
    }
}

#[test]
fn truncates_toward_zero() {
    let c = cal(1_000_000, 3, 0);
    assert_eq!(c.apply(1), 333_333);
    assert_eq!(c.apply(-1), -333_333);
}

#[test]
fn saturates() {
    let c = cal(i32::MAX, 1, 0);
    assert_eq!(c.apply(2), i32::MAX);
    assert_eq!(c.apply(i32::MIN), i32::MIN);
    assert_eq!(cal(1, 0, 0).apply(1234), 0);
}

#[test]
fn offset_zeroes_reading() {
    let mut c = DEFAULT_CALIBRATION[1];
    c.set_offset(4321);
    assert_eq!(c.offset, 4321);
    assert_eq!(c.apply(4321), 0);
}

#[test]
fn gain_with_partial_reference() {
    // 5V applied to the 30V channel.
    let mut c = DEFAULT_CALIBRATION[0];
    c.set_gain(FULL_SCALE / 6);
    assert_eq!(c.full_scale_reading, 8_388_606);
    assert_eq!(c.apply(FULL_SCALE / 6), 5_000_000);
    assert_eq!(c.apply(8_388_606), 30_000_000);

    // Offset first, then gain relative to it.
    let mut c = DEFAULT_CALIBRATION[1];
    c.set_offset(-200);
    c.set_gain(1_000_000 - 200);
    assert_eq!(c.full_scale_reading, 1_000_000);
    assert_eq!(c.apply(-200), 0);
    assert_eq!(c.apply(1_000_000 - 200), 1_000_000);
}

#[test]
fn gain_non_integer_ratio() {
    // 7V reference on a 30V channel: 30/7 is not an integer.
    let mut c = ChannelCalibration::new(7_000_000, 30_000_000);
    c.set_gain(1_000_000);
    assert_eq!(c.full_scale_reading, 4_285_714);
    let mut c = ChannelCalibration::new(0, 30_000_000);
    c.set_gain(1_000_000);
    assert_eq!(c.full_scale_reading, FULL_SCALE);
}

#[test]
fn record_layout() {
    let mut set = CalibrationSet::DEFAULT;
    set.channel[2].offset = -17;
    let words = set.to_words();
    assert_eq!(words.len(), 17);
    assert_eq!(words[0 .. 4], [5_000_000, 30_000_000, 0x7f_ffff, 0]);
    assert_eq!(words[11], -17i32 as u32);
    assert_eq!(words[16], 1_158_000);
    assert_eq!(CalibrationSet::from_words(&words), set);
}
