//! Quadrature decoding for incremental rotary encoders.

/// Phase A input bit.
pub const A: u8 = 1;
/// Phase B input bit.
pub const B: u8 = 2;
pub const AB: u8 = A | B;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quadrature {
    state: u8,
}

impl Quadrature {
    /// Start from the current pin state.
    pub const fn new(state: u8) -> Self {Quadrature {state: state & AB}}

    /// Feed the pin state after an edge.  Returns the step direction, or 0
    /// for a transition that skipped a state.
    pub fn on_edge(&mut self, next: u8) -> i8 {
        let next = next & AB;
        let previous = core::mem::replace(&mut self.state, next);
        match (previous, next) {
            (0, A) | (A, AB) | (AB, B) | (B, 0) => -1,
            (0, B) | (B, AB) | (AB, A) | (A, 0) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
fn steps(start: u8, seq: &[u8]) -> Vec<i8> {
    let mut q = Quadrature::new(start);
    seq.iter().map(|&s| q.on_edge(s)).collect()
}

#[test]
fn full_detent() {
    assert_eq!(steps(0, &[A, AB, B, 0]), [-1, -1, -1, -1]);
    assert_eq!(steps(0, &[B, AB, A, 0]), [1, 1, 1, 1]);
}

#[test]
fn skipped_states_are_ignored() {
    assert_eq!(steps(0, &[AB]), [0]);
    assert_eq!(steps(A, &[B]), [0]);
    // The state still follows the pins, so the next edge decodes.
    assert_eq!(steps(0, &[AB, A, 0]), [0, 1, 1]);
}

#[test]
fn no_change() {
    assert_eq!(steps(A, &[A, A]), [0, 0]);
}
