//! Oversampling accumulator for the converter results.
//!
//! The conversion ISR calls [`Accumulator::accumulate`] with the codes of all
//! channels.  Every [`OVERSAMPLES`] calls the sums are averaged and published
//! behind a sequence counter.  The main loop reads the published averages
//! with [`Accumulator::latest`], which never returns a torn set.

use crate::config::{CHANNELS, OVERSAMPLES};
use crate::vcell::{UCell, VCell, barrier};

pub struct Accumulator<const N: usize = CHANNELS> {
    /// ISR only.
    sums: UCell<[i64; N]>,
    /// ISR only.
    count: VCell<u32>,
    averages: [VCell<i32>; N],
    /// Odd while the ISR is publishing.
    sequence: VCell<u32>,
    overflow: VCell<bool>,
}

impl<const N: usize> Accumulator<N> {
    pub const fn new() -> Self {
        Accumulator {
            sums: UCell::new([0; N]),
            count: VCell::new(0),
            averages: [const {VCell::new(0)}; N],
            sequence: VCell::new(0),
            overflow: VCell::new(false),
        }
    }

    /// Conversion ISR.  Returns true when a new set of averages has been
    /// published.
    ///
    /// # Safety
    /// Only one context, the conversion ISR, may call this.  It must not
    /// preempt itself.
    pub unsafe fn accumulate(&self, codes: &[i32; N]) -> bool {
        // Only the ISR touches the sums.
        let sums = unsafe {self.sums.as_mut()};
        for (sum, &code) in sums.iter_mut().zip(codes) {
            *sum += code as i64;
        }
        let count = self.count.read() + 1;
        if count < OVERSAMPLES {
            self.count.write(count);
            return false;
        }

        let seq = self.sequence.read();
        self.sequence.write(seq.wrapping_add(1));
        barrier();
        for (average, sum) in self.averages.iter().zip(sums.iter_mut()) {
            // Integer division truncates toward zero.
            average.write((*sum / count as i64) as i32);
            *sum = 0;
        }
        self.count.write(0);
        barrier();
        self.sequence.write(seq.wrapping_add(2));
        true
    }

    /// Conversion ISR, when the converter reports that a result was
    /// overwritten before it was read.
    pub fn flag_overflow(&self) {
        self.overflow.write(true);
    }

    /// Sticky converter overflow.
    pub fn overflow(&self) -> bool {self.overflow.read()}

    /// The number of the latest published set.  Changes by two for every
    /// publish.
    pub fn sequence(&self) -> u32 {self.sequence.read()}

    /// The latest published averages and their sequence number.
    pub fn latest(&self) -> ([i32; N], u32) {
        loop {
            if let Some(set) = self.read_published(self.sequence.read()) {
                return set;
            }
        }
    }

    /// The averages, if `seq` is a completed publish and is still current
    /// once they have been read.
    fn read_published(&self, seq: u32) -> Option<([i32; N], u32)> {
        if seq & 1 != 0 {
            return None;
        }
        barrier();
        let values = core::array::from_fn(|i| self.averages[i].read());
        barrier();
        (self.sequence.read() == seq).then_some((values, seq))
    }

    /// Latest published average for one channel.
    pub fn get(&self, channel: usize) -> Option<i32> {
        self.latest().0.get(channel).copied()
    }

    #[cfg(test)]
    fn pending(&self) -> (u32, [i64; N]) {
        let sums = unsafe {self.sums.as_ref()};
        (self.count.read(), *sums)
    }
}

impl<const N: usize> Default for Accumulator<N> {
    fn default() -> Self {Self::new()}
}

#[cfg(test)]
fn fill(acc: &Accumulator<2>, f: impl Fn(u32) -> [i32; 2]) -> bool {
    let mut done = false;
    for i in 0 .. OVERSAMPLES {
        assert!(!done, "published early at {i}");
        done = unsafe {acc.accumulate(&f(i))};
    }
    done
}

#[test]
fn averages_after_n() {
    let acc = Accumulator::<2>::new();
    assert!(fill(&acc, |i| [i as i32, 1000]));
    let expect = (OVERSAMPLES as i64 * (OVERSAMPLES as i64 - 1) / 2
                  / OVERSAMPLES as i64) as i32;
    assert_eq!(acc.latest(), ([expect, 1000], 2));
    assert_eq!(acc.pending(), (0, [0, 0]));
    assert_eq!(acc.get(1), Some(1000));
    assert_eq!(acc.get(2), None);
}

#[test]
fn negative_truncates_toward_zero() {
    let acc = Accumulator::<2>::new();
    // Sum -1 over the cycle: -1/N truncates to 0, not -1.
    assert!(fill(&acc, |i| [if i == 0 {-1} else {0}, -3]));
    assert_eq!(acc.latest().0, [0, -3]);
}

#[test]
fn full_scale_does_not_wrap() {
    let acc = Accumulator::<2>::new();
    assert!(fill(&acc, |_| [0x7f_ffff, -0x80_0000]));
    assert_eq!(acc.latest().0, [0x7f_ffff, -0x80_0000]);
}

#[test]
fn mid_cycle_reads_previous() {
    let acc = Accumulator::<2>::new();
    assert!(fill(&acc, |_| [7, 8]));
    for _ in 0 .. OVERSAMPLES / 2 {
        unsafe {acc.accumulate(&[100, 100])};
    }
    assert_eq!(acc.latest(), ([7, 8], 2));
    assert_eq!(acc.pending().0, OVERSAMPLES / 2);
}

#[test]
fn overflow_is_sticky() {
    let acc = Accumulator::<2>::new();
    assert!(!acc.overflow());
    acc.flag_overflow();
    assert!(fill(&acc, |_| [0, 0]));
    assert!(acc.overflow());
}

#[test]
fn torn_reads_are_retried() {
    let acc = Accumulator::<2>::new();
    assert!(fill(&acc, |_| [7, 8]));
    assert_eq!(acc.read_published(2), Some(([7, 8], 2)));

    // The ISR is part way through publishing.
    acc.sequence.write(3);
    assert_eq!(acc.read_published(acc.sequence()), None);
    assert_eq!(acc.read_published(2), None);
    acc.sequence.write(2);
    assert_eq!(acc.latest(), ([7, 8], 2));

    // A publish between reading the sequence and the values: the new values
    // are never paired with the old sequence.
    let seq = acc.sequence();
    assert!(fill(&acc, |_| [9, 10]));
    assert_eq!(acc.read_published(seq), None);
    assert_eq!(acc.latest(), ([9, 10], 4));
}
