
/// Outcome of one control loop tick.  Negative codes are fatal.
#[repr(i8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeterStatus {
    /// The device descriptor in the information memory failed its checksum.
    /// Measurements would not be accurate without the factory trim.
    InformationMemoryIntegrity = -4,
    /// A conversion result was not collected before the next one was
    /// available.  This is a systematic timing error.
    ConversionOverflow = -3,
    /// The serial interface is too slow: a new telemetry line is ready
    /// before the previous one was sent.
    SerialBusy = -2,
    /// A formatted value did not fit its buffer.
    StringConversionFailure = -1,
    Ok = 0,
    /// The operator asked for the calibration to be persisted.
    StoreCalibration = 1,
}

pub type Result<T = ()> = core::result::Result<T, MeterStatus>;

impl MeterStatus {
    pub const fn code(self) -> i8 {self as i8}

    pub const fn is_fatal(self) -> bool {self.code() < 0}

    /// Number of blinks for the fatal indication.
    pub const fn severity(self) -> u32 {self.code().unsigned_abs() as u32}
}

#[test]
fn codes() {
    use MeterStatus::*;
    assert_eq!(InformationMemoryIntegrity.severity(), 4);
    assert_eq!(ConversionOverflow.severity(), 3);
    assert_eq!(SerialBusy.severity(), 2);
    assert_eq!(StringConversionFailure.severity(), 1);
    assert!(StringConversionFailure.is_fatal());
    assert!(!Ok.is_fatal());
    assert!(!StoreCalibration.is_fatal());
}
