//! Operator input events, queued by the port ISR for the main loop.

use crate::encoder::Quadrature;
use crate::vcell::{VCell, barrier};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Press,
    Step(i8),
}

const SIZE: usize = 16;

/// Single producer (the port ISR), single consumer (the main loop) event
/// ring.  The producer writes `w`, the consumer writes `r`.
pub struct Inputs {
    /// Port ISR only.
    encoder: VCell<Quadrature>,
    w: VCell<u8>,
    r: VCell<u8>,
    buf: [VCell<Event>; SIZE],
    dropped: VCell<u32>,
}

static_assertions::const_assert!(SIZE.is_power_of_two() && SIZE < 256);

impl Inputs {
    /// `pins` is the encoder pin state at start-up.
    pub const fn new(pins: u8) -> Self {
        Inputs {
            encoder: VCell::new(Quadrature::new(pins)),
            w: VCell::new(0),
            r: VCell::new(0),
            buf: [const {VCell::new(Event::Press)}; SIZE],
            dropped: VCell::new(0),
        }
    }

    /// Port ISR, button down edge.  Returns true if the main loop should
    /// wake.
    ///
    /// # Safety
    /// Only the port ISR, the single producer, may call this.
    pub unsafe fn on_button(&self) -> bool {
        self.push(Event::Press)
    }

    /// Port ISR, encoder edge.  `pins` is the new encoder pin state.
    ///
    /// # Safety
    /// As for [`Inputs::on_button`].
    pub unsafe fn on_encoder(&self, pins: u8) -> bool {
        let mut encoder = self.encoder.read();
        let step = encoder.on_edge(pins);
        self.encoder.write(encoder);
        step != 0 && self.push(Event::Step(step))
    }

    fn push(&self, event: Event) -> bool {
        let w = self.w.read();
        if w.wrapping_sub(self.r.read()) as usize >= SIZE {
            self.dropped.write(self.dropped.read().wrapping_add(1));
            return false;
        }
        self.buf[w as usize % SIZE].write(event);
        barrier();
        self.w.write(w.wrapping_add(1));
        true
    }

    /// Main loop.  Oldest queued event.
    ///
    /// # Safety
    /// Only one context, the consumer, may call this.
    pub unsafe fn next(&self) -> Option<Event> {
        let r = self.r.read();
        if r == self.w.read() {
            return None;
        }
        barrier();
        let event = self.buf[r as usize % SIZE].read();
        barrier();
        self.r.write(r.wrapping_add(1));
        Some(event)
    }

    /// Events lost to a full ring.
    pub fn dropped(&self) -> u32 {self.dropped.read()}
}

#[cfg(test)]
fn drain(inputs: &Inputs) -> Vec<Event> {
    core::iter::from_fn(|| unsafe {inputs.next()}).collect()
}

#[test]
fn order_is_kept() {
    use crate::encoder::{A, AB};
    let inputs = Inputs::new(0);
    assert!(unsafe {inputs.on_encoder(A)});
    assert!(unsafe {inputs.on_button()});
    assert!(unsafe {inputs.on_encoder(AB)});
    assert_eq!(drain(&inputs), [Event::Step(-1), Event::Press, Event::Step(-1)]);
    assert_eq!(unsafe {inputs.next()}, None);
}

#[test]
fn glitches_are_not_queued() {
    use crate::encoder::AB;
    let inputs = Inputs::new(0);
    assert!(!unsafe {inputs.on_encoder(AB)});
    assert_eq!(unsafe {inputs.next()}, None);
}

#[test]
fn full_ring_drops() {
    let inputs = Inputs::new(0);
    for _ in 0 .. SIZE {
        assert!(unsafe {inputs.on_button()});
    }
    assert!(!unsafe {inputs.on_button()});
    assert_eq!(inputs.dropped(), 1);
    assert_eq!(drain(&inputs).len(), SIZE);
    // Indices wrap around the u8 range.
    for _ in 0 .. 300 {
        assert!(unsafe {inputs.on_button()});
        assert_eq!(unsafe {inputs.next()}, Some(Event::Press));
    }
}
