//! Seven-segment readout: glyphs and the link driver.

#![allow(non_upper_case_globals)]

use crate::config::ROW_CELLS;
use crate::tx::{TxChannel, TxRegister};

//   -a-
// f|   |b
//   -g-
// e|   |c
//   -d- o DOT
pub const SEG_A: u8 = 0x20;
pub const SEG_B: u8 = 0x10;
pub const SEG_C: u8 = 0x02;
pub const SEG_D: u8 = 0x04;
pub const SEG_E: u8 = 0x08;
pub const SEG_F: u8 = 0x80;
pub const SEG_G: u8 = 0x40;
pub const DOT: u8 = 0x01;

pub const D8: u8 = !DOT;
pub const D0: u8 = D8 & !SEG_G;
pub const D1: u8 = SEG_B | SEG_C;
pub const D2: u8 = D8 & !SEG_C & !SEG_F;
pub const D3: u8 = D9 & !SEG_F;
pub const D4: u8 = D1 | SEG_F | SEG_G;
pub const D5: u8 = D9 & !SEG_B;
pub const D6: u8 = D5 | SEG_E;
pub const D7: u8 = D1 | SEG_A;
pub const D9: u8 = D8 & !SEG_E;

pub const MINUS: u8 = SEG_G;
pub const DA: u8 = D8 & !SEG_D;
pub const DC: u8 = SEG_A | SEG_D | SEG_E | SEG_F;
pub const DE: u8 = DC | SEG_G;
pub const DF: u8 = DE & !SEG_D;
pub const DH: u8 = D4 | SEG_E;
pub const DL: u8 = SEG_D | SEG_E | SEG_F;
pub const DP: u8 = DF | SEG_B;
pub const DU: u8 = D0 & !SEG_A;
pub const Db: u8 = D6 & !SEG_A;
pub const Dc: u8 = SEG_D | SEG_E | SEG_G;
pub const Dd: u8 = Dc | SEG_B | SEG_C;
pub const Dh: u8 = Db & !SEG_D;
pub const Dn: u8 = SEG_C | SEG_E | SEG_G;
pub const Do: u8 = Dc | SEG_C;
pub const Dr: u8 = SEG_E | SEG_G;
pub const Dt: u8 = DL | SEG_G;
pub const Du: u8 = SEG_C | SEG_D | SEG_E;

/// Segments lit for a character.  Unknown characters are blank.
pub const fn glyph(c: u8) -> u8 {
    match c {
        b'0' | b'O' => D0,
        b'1' => D1,
        b'2' => D2,
        b'3' => D3,
        b'4' | b'Y' => D4,
        b'5' | b'S' => D5,
        b'6' => D6,
        b'7' => D7,
        b'8' => D8,
        b'9' => D9,
        b'-' => MINUS,
        b'A' => DA,
        b'C' => DC,
        b'E' => DE,
        b'F' | b'f' => DF,
        b'H' => DH,
        b'L' => DL,
        b'P' => DP,
        b'U' => DU,
        b'b' => Db,
        b'c' => Dc,
        b'd' => Dd,
        b'h' => Dh,
        b'i' => SEG_E,
        b'j' => SEG_C | SEG_D,
        b'n' => Dn,
        b'o' => Do,
        b'r' => Dr,
        b't' => Dt,
        b'u' => Du,
        _ => 0,
    }
}

/// Number of display cells `s` takes: a `.` shares the cell of the
/// character before it.
pub const fn cells(s: &str) -> usize {
    let mut iter = konst::string::chars(s);
    let mut count = 0;
    let mut merge = false;
    while let Some((c, i)) = iter.next() {
        iter = i;
        if c == '.' && merge {
            merge = false;
        }
        else {
            count += 1;
            merge = c != '.';
        }
    }
    count
}

/// Render `text` into active low cell bytes.  Missing text is blank.
pub fn encode(cells: &mut [u8], text: &[u8]) {
    let mut chars = text.iter().copied().peekable();
    for cell in cells {
        let mut segs = chars.next().map_or(0, glyph);
        if chars.next_if_eq(&b'.').is_some() {
            segs |= DOT;
        }
        *cell = !segs;
    }
}

pub const FRAME_LEN: usize = 2 * ROW_CELLS;

/// Driver for the two row, four digit per row, readout.  The frame is
/// clocked out over its own link by the link's TX interrupt.
pub struct Readout<R> {
    link: TxChannel<R, FRAME_LEN>,
}

impl<R: TxRegister> Readout<R> {
    pub const fn new(port: R) -> Self {Readout {link: TxChannel::new(port)}}

    /// Send a new frame.  Returns false, dropping the frame, if the previous
    /// one is still going out.
    ///
    /// # Safety
    /// As for [`TxChannel::begin`]: a single initiating context.
    pub unsafe fn update(&self, upper: &str, lower: &str) -> bool {
        let mut frame = [0u8; FRAME_LEN];
        let (top, bottom) = frame.split_at_mut(ROW_CELLS);
        encode(top, upper.as_bytes());
        encode(bottom, lower.as_bytes());
        unsafe {self.link.begin(&frame)}
    }

    /// Readout link TX interrupt.
    ///
    /// # Safety
    /// Only the readout link's TX interrupt may call this.
    pub unsafe fn on_byte_sent(&self) -> bool {
        unsafe {self.link.on_byte_sent()}
    }

    pub fn idle(&self) -> bool {self.link.idle()}

    pub fn link(&self) -> &TxChannel<R, FRAME_LEN> {&self.link}
}

#[cfg(test)]
fn enc(text: &str) -> [u8; 4] {
    let mut out = [0; 4];
    encode(&mut out, text.as_bytes());
    out
}

#[test]
fn digit_bits() {
    assert_eq!(D0, 0xbe);
    assert_eq!(D1, 0x12);
    assert_eq!(D8, 0xfe);
    assert_eq!(D2, SEG_A | SEG_B | SEG_D | SEG_E | SEG_G);
    assert_eq!(D3, SEG_A | SEG_B | SEG_C | SEG_D | SEG_G);
    assert_eq!(D7, SEG_A | SEG_B | SEG_C);
    assert_eq!(DH, SEG_B | SEG_C | SEG_E | SEG_F | SEG_G);
    assert_eq!(DP, SEG_A | SEG_B | SEG_E | SEG_F | SEG_G);
    assert_eq!(DU, SEG_B | SEG_C | SEG_D | SEG_E | SEG_F);
    assert_eq!(Dh, SEG_C | SEG_E | SEG_F | SEG_G);
    assert_eq!(Do, SEG_C | SEG_D | SEG_E | SEG_G);
}

#[test]
fn no_decimal_point() {
    assert_eq!(enc("   0"), [!0x00, !0x00, !0x00, !0xbe]);
}

#[test]
fn decimal_point() {
    assert_eq!(enc("0.001"), [!0xbf, !0xbe, !0xbe, !0x12]);
}

#[test]
fn short_text_is_blank() {
    assert_eq!(enc("Err"), [!DE, !Dr, !Dr, 0xff]);
    assert_eq!(enc(""), [0xff; 4]);
}

#[test]
fn cell_count() {
    assert_eq!(cells("1.OFF"), 4);
    assert_eq!(cells(" . . . "), 4);
    assert_eq!(cells("-.999"), 4);
    assert_eq!(cells(".."), 2);
    assert_eq!(cells("Stor"), 4);
}

#[test]
fn readout_frame() {
    let readout = Readout::new(crate::tx::mock::Port::default());
    assert!(unsafe {readout.update("1.OFF", " 0.00")});
    assert!(!unsafe {readout.update("xxxx", "xxxx")});
    while unsafe {readout.on_byte_sent()} {
    }
    assert!(readout.idle());
    let sent = readout.link().port().take();
    assert_eq!(sent, [!(D1 | DOT), !D0, !DF, !DF,
                      0xff, !(D0 | DOT), !D0, !D0]);
}
