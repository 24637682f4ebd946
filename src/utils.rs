
/// Convert the input to 8 digit BCD.  If the input exceeds 8 decimal digits
/// then you get the last 8 digits of the decimal.
pub fn to_bcd(mut v: u32) -> u32 {
    if v == 0 {
        return 0;
    }
    let mut remain = 32;
    while v & 15 << 28 == 0 {
        v <<= 4;
        remain -= 4;
    }
    let pos = 0x11111111;
    let mut bcd = 0u32;
    for _ in 0..remain {
        let overflow = bcd + 3 * pos & pos * 8;
        bcd = bcd.wrapping_add(bcd + (overflow >> 1) + (overflow >> 2));
        bcd += v >> 31;
        v <<= 1;
    }
    bcd
}

/// Integral power of ten.
pub const fn ipow10(exponent: usize) -> u32 {
    let mut result = 1;
    let mut i = 0;
    while i < exponent {
        result *= 10;
        i += 1;
    }
    result
}

static_assertions::const_assert_eq!(ipow10(0), 1);
static_assertions::const_assert_eq!(ipow10(3), 1000);

/// Clamp a widened intermediate back into i32.
#[inline]
pub const fn saturate(v: i64) -> i32 {
    if v > i32::MAX as i64 {
        i32::MAX
    }
    else if v < i32::MIN as i64 {
        i32::MIN
    }
    else {
        v as i32
    }
}

#[test]
fn test_to_bcd() {
    for i in 0..65536 {
        assert_eq!(format!("{i}"), format!("{:x}", to_bcd(i)));
        let j = i * 0x10001;
        assert_eq!(format!("{}", j % 100000000), format!("{:x}", to_bcd(j)));
    }
}

#[test]
fn test_saturate() {
    assert_eq!(saturate(0), 0);
    assert_eq!(saturate(-5), -5);
    assert_eq!(saturate(1 << 40), i32::MAX);
    assert_eq!(saturate(-(1 << 40)), i32::MIN);
    assert_eq!(saturate(i32::MIN as i64), i32::MIN);
}
