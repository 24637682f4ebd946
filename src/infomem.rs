//! Factory device descriptor in the information memory.

use crate::status::{MeterStatus, Result};

/// Descriptor words following the checksum word.
pub const DESCRIPTOR_WORDS: usize = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Descriptor {
    pub checksum: u16,
    pub words: [u16; DESCRIPTOR_WORDS],
}

/// Negated XOR of all words.
pub fn checksum(words: &[u16]) -> u16 {
    words.iter().fold(0u16, |x, &w| x ^ w).wrapping_neg()
}

/// The factory trim is only trusted if the checksum matches.
pub fn verify(descriptor: &Descriptor) -> Result {
    if checksum(&descriptor.words) == descriptor.checksum {
        Ok(())
    }
    else {
        Err(MeterStatus::InformationMemoryIntegrity)
    }
}

#[cfg(test)]
pub fn sample() -> Descriptor {
    let mut words = [0xffff; DESCRIPTOR_WORDS];
    words[..14].copy_from_slice(&[
        0x0a01, 0x8851, 0x5172, 0x000e, 0x0014, 0xfef8, 0x0202,
        0x3e00, 0x0403, 0xc084, 0x4069, 0x0204, 0xff0c, 0x22fe]);
    Descriptor {checksum: 0x4adb, words}
}

#[test]
fn known_descriptor() {
    let d = sample();
    assert_eq!(checksum(&d.words), 0x4adb);
    assert_eq!(verify(&d), Ok(()));
}

#[test]
fn corruption_is_detected() {
    let mut d = sample();
    d.words[3] ^= 0x100;
    assert_eq!(verify(&d), Err(MeterStatus::InformationMemoryIntegrity));
    let mut d = sample();
    d.checksum = 0;
    assert_eq!(verify(&d), Err(MeterStatus::InformationMemoryIntegrity));
    assert_eq!(checksum(&[]), 0);
}
