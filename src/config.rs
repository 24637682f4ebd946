//! Build-time configuration.

use crate::calibration::ChannelCalibration;

/// Number of converter channels sampled every conversion.
pub const CHANNELS: usize = 4;

/// The number of conversions accumulated in the background and averaged to
/// obtain one reading.
pub const OVERSAMPLES: u32 = 256;

/// Converter code for a full-scale input.
pub const FULL_SCALE: i32 = 0x7f_ffff;

/// Shared reference voltage in µV.
pub const REFERENCE_UV: i32 = 1_158 * 1000;

pub const CPU_CLK: u32 = 16_384_000;

/// Capacity of the serial command line buffer.
pub const LINE_LEN: usize = 32;

/// Capacity of the telemetry line buffer.
pub const TX_LEN: usize = 64;

/// Capacity of one display text row.
pub const ROW_LEN: usize = 8;

/// Seven-segment cells per display row.
pub const ROW_CELLS: usize = 4;

/// Fatal blink timing, ms.
pub const BLINK_ON: u32 = 250;
pub const BLINK_OFF: u32 = 250;
pub const BLINK_PAUSE: u32 = 1000;

pub const DEFAULT_CALIBRATION: [ChannelCalibration; CHANNELS] = [
    ChannelCalibration::new(5_000_000, 30_000_000),
    ChannelCalibration::new(1_000_000, 1_000_000),
    ChannelCalibration::new(5_000_000, 30_000_000),
    ChannelCalibration::new(1_000_000, 1_000_000),
];

/// How a channel reading is scaled for the readout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    /// µV per displayed least significant digit.
    pub divisor: i32,
    pub integral: usize,
    pub fractional: usize,
}

/// xx.xx V.
pub const VOLTS_10MV: Scale = Scale {divisor: 10_000, integral: 2, fractional: 2};
/// x.xxx V.
pub const VOLTS_1MV: Scale = Scale {divisor: 1_000, integral: 1, fractional: 3};

pub const DISPLAY_SCALE: [Scale; CHANNELS] =
    [VOLTS_10MV, VOLTS_1MV, VOLTS_10MV, VOLTS_1MV];

/// Channels shown on the upper and lower rows outside the menu.
pub const PRIMARY: usize = 0;
pub const SECONDARY: usize = 1;

static_assertions::const_assert!(PRIMARY < CHANNELS && SECONDARY < CHANNELS);
static_assertions::const_assert!(CHANNELS <= 9);
static_assertions::const_assert!(OVERSAMPLES > 0);
// Worst case line: every reading is i32::MIN, tab separated, CRLF.
static_assertions::const_assert!(TX_LEN >= CHANNELS * 12 + 1);
