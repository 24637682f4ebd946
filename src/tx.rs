//! Interrupt driven, one byte ahead, transmission.

use crate::vcell::{UCell, VCell, barrier};

/// The output side of a serial peripheral.
pub trait TxRegister {
    /// Put a byte into the output register.  Completion raises the
    /// peripheral's TX interrupt.
    fn write(&self, byte: u8);
    /// The peripheral is still shifting data out.
    fn busy(&self) -> bool;
}

/// Streams a buffer out through a [`TxRegister`], one byte per completion
/// interrupt.
///
/// `remaining` counts the bytes written to the peripheral but not yet
/// acknowledged by `on_byte_sent`, plus those still queued.  The initiator
/// only touches the cursor while `remaining` is zero, when the completion
/// interrupt has nothing left to do, and publishes it before writing the
/// first byte that arms the interrupt.  `begin` and `on_byte_sent` are
/// `unsafe`: each must have a single calling context.
pub struct TxChannel<R, const N: usize> {
    port: R,
    buf: UCell<[u8; N]>,
    next: VCell<usize>,
    remaining: VCell<usize>,
}

impl<R: TxRegister, const N: usize> TxChannel<R, N> {
    pub const fn new(port: R) -> Self {
        TxChannel {
            port,
            buf: UCell::new([0; N]),
            next: VCell::new(0),
            remaining: VCell::new(0),
        }
    }

    pub fn port(&self) -> &R {&self.port}

    /// No transfer in flight.
    pub fn idle(&self) -> bool {self.remaining.read() == 0}

    /// Idle and the peripheral has drained.
    pub fn flushed(&self) -> bool {self.idle() && !self.port.busy()}

    /// Start sending `data`.  Returns false, changing nothing, if a transfer
    /// is already in flight or `data` is empty or too long.
    ///
    /// # Safety
    /// Only one context, the initiator, may call this.  It must not be
    /// preempted by another initiator of the same channel.
    pub unsafe fn begin(&self, data: &[u8]) -> bool {
        if !self.idle() || data.is_empty() || data.len() > N {
            return false;
        }
        // The completion ISR does not touch the buffer while idle.
        let buf = unsafe {self.buf.as_mut()};
        buf[..data.len()].copy_from_slice(data);
        self.next.write(1);
        self.remaining.write(data.len());
        barrier();
        self.port.write(data[0]);
        true
    }

    /// To be called from the peripheral's TX interrupt.  Returns true if
    /// another byte was written.
    ///
    /// # Safety
    /// Only the peripheral's TX interrupt may call this.
    pub unsafe fn on_byte_sent(&self) -> bool {
        let remaining = self.remaining.read();
        if remaining > 1 {
            let next = self.next.read();
            let byte = unsafe {self.buf.as_ref()}[next];
            self.next.write(next + 1);
            self.remaining.write(remaining - 1);
            self.port.write(byte);
            return true;
        }
        self.remaining.write(0);
        false
    }
}

#[cfg(test)]
pub mod mock {
    use std::cell::{Cell, RefCell};

    /// Records everything written to it.
    #[derive(Default)]
    pub struct Port {
        pub sent: RefCell<Vec<u8>>,
        pub busy: Cell<bool>,
    }

    impl super::TxRegister for Port {
        fn write(&self, byte: u8) {self.sent.borrow_mut().push(byte)}
        fn busy(&self) -> bool {self.busy.get()}
    }

    impl Port {
        pub fn take(&self) -> Vec<u8> {self.sent.take()}
    }
}

#[cfg(test)]
fn channel() -> TxChannel<mock::Port, 8> {TxChannel::new(mock::Port::default())}

#[test]
fn drains_in_length_calls() {
    let tx = channel();
    assert!(unsafe {tx.begin(b"abc")});
    assert_eq!(tx.port().take(), b"a");
    assert!(unsafe {tx.on_byte_sent()});
    assert!(unsafe {tx.on_byte_sent()});
    assert!(!tx.idle());
    assert!(!unsafe {tx.on_byte_sent()});
    assert!(tx.idle());
    assert_eq!(tx.port().take(), b"bc");
}

#[test]
fn busy_begin_is_refused() {
    let tx = channel();
    assert!(unsafe {tx.begin(b"xyz")});
    assert!(unsafe {tx.on_byte_sent()});
    assert!(!unsafe {tx.begin(b"12345")});
    // The first transfer carries on untouched.
    assert!(unsafe {tx.on_byte_sent()});
    assert!(!unsafe {tx.on_byte_sent()});
    assert_eq!(tx.port().take(), b"xyz");
    assert!(unsafe {tx.begin(b"12")});
}

#[test]
fn single_byte() {
    let tx = channel();
    assert!(unsafe {tx.begin(b"!")});
    assert!(!unsafe {tx.on_byte_sent()});
    assert!(tx.idle());
    assert_eq!(tx.port().take(), b"!");
}

#[test]
fn rejects_empty_and_long() {
    let tx = channel();
    assert!(!unsafe {tx.begin(b"")});
    assert!(!unsafe {tx.begin(b"123456789")});
    assert!(tx.idle());
    assert!(tx.port().take().is_empty());
}

#[test]
fn flushed_waits_for_port() {
    let tx = channel();
    tx.port().busy.set(true);
    assert!(tx.idle());
    assert!(!tx.flushed());
    tx.port().busy.set(false);
    assert!(tx.flushed());
}
