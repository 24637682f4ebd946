use arrayvec::ArrayString;

use crate::config::ROW_LEN;
use crate::status::{MeterStatus, Result};
use crate::utils::{ipow10, to_bcd};

/// One formatted readout field.
pub type Field = ArrayString<ROW_LEN>;

/// Format `value` as a fixed width field with `integral` digits before and
/// `fractional` digits after the decimal point.  The resolution of `value`
/// must match `fractional`.
///
/// The integral part is right aligned and space padded, the fractional part
/// zero padded.  Values that do not fit show `OL` in the rightmost two cells.
/// A negative value has its first cell replaced by `-`, which leaves one
/// integral digit less for the magnitude.
pub fn format(value: i32, integral: usize, fractional: usize) -> Result<Field> {
    let dp = fractional > 0;
    let width = integral + fractional + dp as usize;
    // to_bcd gives us 8 digits.
    if integral == 0 || width < 2 || width > ROW_LEN
        || integral > 8 || fractional > 8 {
        return Err(MeterStatus::StringConversionFailure);
    }

    let resolution = ipow10(fractional);
    let magnitude = ipow10(integral);
    let abs = value.unsigned_abs();
    let whole = abs / resolution;
    let frac = abs % resolution;
    let limit = if value < 0 {magnitude / 10} else {magnitude};

    let mut cells = [b' '; ROW_LEN];
    let cells = &mut cells[..width];
    if value != 0 && whole >= limit {
        // Overload.  The marker wins over the decimal point.
        if dp {
            cells[integral] = b'.';
        }
        cells[width - 2] = b'O';
        cells[width - 1] = b'L';
    }
    else {
        // Create the digits backwards, at least one integral digit.
        let mut bcd = to_bcd(whole);
        for i in (0 .. integral).rev() {
            cells[i] = (bcd as u8 & 15) + b'0';
            bcd >>= 4;
            if bcd == 0 {
                break;
            }
        }
        let mut bcd = to_bcd(frac);
        for i in (integral + 1 .. width).rev() {
            cells[i] = (bcd as u8 & 15) + b'0';
            bcd >>= 4;
        }
        if dp {
            cells[integral] = b'.';
        }
    }
    if value < 0 {
        cells[0] = b'-';
    }

    let text = core::str::from_utf8(cells)
        .map_err(|_| MeterStatus::StringConversionFailure)?;
    Field::from(text).map_err(|_| MeterStatus::StringConversionFailure)
}

#[cfg(test)]
fn ff(v: i32, integral: usize, fractional: usize) -> String {
    format(v, integral, fractional).unwrap().as_str().to_string()
}

#[test]
fn voltage() {
    assert_eq!(ff(0, 2, 2)     , " 0.00");
    assert_eq!(ff(9999, 2, 2)  , "99.99");
    assert_eq!(ff(10000, 2, 2) , "  .OL");
    assert_eq!(ff(-999, 2, 2)  , "-9.99");
    assert_eq!(ff(-1000, 2, 2) , "- .OL");
    assert_eq!(ff(1, 2, 2)     , " 0.01");
    assert_eq!(ff(1234, 2, 2)  , "12.34");
}

#[test]
fn current() {
    assert_eq!(ff(10000, 1, 3), " . OL");
    assert_eq!(ff(9999, 1, 3) , "9.999");
    assert_eq!(ff(0, 1, 3)    , "0.000");
    assert_eq!(ff(-999, 1, 3) , "-.999");
    assert_eq!(ff(-1000, 1, 3), "-. OL");
    assert_eq!(ff(42, 1, 3)   , "0.042");
}

#[test]
fn integral() {
    assert_eq!(ff(0, 4, 0)    , "   0");
    assert_eq!(ff(-1, 4, 0)   , "-  1");
    assert_eq!(ff(-3, 4, 0)   , "-  3");
    assert_eq!(ff(9999, 4, 0) , "9999");
    assert_eq!(ff(10000, 4, 0), "  OL");
    assert_eq!(ff(i32::MIN, 4, 0), "- OL");
}

#[test]
fn bad_fields() {
    assert_eq!(format(1, 0, 2), Err(MeterStatus::StringConversionFailure));
    assert_eq!(format(1, 1, 0), Err(MeterStatus::StringConversionFailure));
    assert_eq!(format(1, 6, 3), Err(MeterStatus::StringConversionFailure));
}
