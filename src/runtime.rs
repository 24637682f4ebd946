//! The surrounding runtime: bring-up, the main loop, persistence and the
//! fatal indication.

use crate::calibration::{CalibrationSet, RECORD_WORDS};
use crate::config::{BLINK_OFF, BLINK_ON, BLINK_PAUSE, CPU_CLK};
use crate::decimal::{self, Field};
use crate::infomem::{self, Descriptor};
use crate::meter::{Meter, Shared};
use crate::status::{MeterStatus, Result};
use crate::tx::TxRegister;

/// What the runtime needs from the hardware.
///
/// The default methods are the Cortex-M ones.
pub trait Board {
    fn set_led(&mut self, on: bool);

    /// Write the calibration record to the non-volatile region.  Called
    /// with interrupts suppressed.
    fn store_calibration(&mut self, words: &[u32; RECORD_WORDS]);

    /// The persisted record, if there is a valid one.
    fn load_calibration(&mut self) -> Option<[u32; RECORD_WORDS]>;

    /// Wait for an interrupt.  Returns early if one was taken since the
    /// last call.
    fn sleep(&mut self) {
        cortex_m::asm::wfe();
    }

    fn delay_ms(&mut self, ms: u32) {
        cortex_m::asm::delay((CPU_CLK / 1000).saturating_mul(ms));
    }

    fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        cortex_m::interrupt::free(|_| f(self))
    }

    fn disable_interrupts(&mut self) {
        cortex_m::interrupt::disable();
    }
}

/// Verify the factory descriptor and load the calibration.
///
/// # Safety
/// The returned [`Meter`] is the main loop side of `shared`: see
/// [`Meter::new`].
pub unsafe fn start<'a, B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, descriptor: &Descriptor, shared: &'a Shared<T, D>)
    -> Result<Meter<'a, T, D>>
{
    dbgln!("Meter start");
    infomem::verify(descriptor)?;
    let calibration = match board.load_calibration() {
        Some(words) => {
            dbgln!("Calibration loaded");
            CalibrationSet::from_words(&words)
        },
        None => {
            dbgln!("Calibration defaulted");
            CalibrationSet::DEFAULT
        },
    };
    Ok(unsafe {Meter::new(shared, calibration)})
}

/// Handle everything pending after a wake-up.  Returns the status of the
/// tick, or `Ok` if no new sample was ready.
pub fn service<B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, meter: &mut Meter<T, D>) -> MeterStatus
{
    meter.poll_inputs();
    meter.poll_commands();
    if !meter.sample_ready() {
        return MeterStatus::Ok;
    }
    let status = meter.step();
    if status.is_fatal() {
        return status;
    }
    meter.show();
    if status == MeterStatus::StoreCalibration {
        persist(board, meter.calibration());
    }
    status
}

/// The storage write is not re-entrant with the interrupt handlers.
pub fn persist<B: Board>(board: &mut B, calibration: &CalibrationSet) {
    let words = calibration.to_words();
    board.without_interrupts(|b| b.store_calibration(&words));
    dbgln!("Calibration stored");
}

/// Upper and lower readout rows for a failure status.
pub fn error_rows(status: MeterStatus) -> Result<(Field, Field)> {
    let upper = Field::from("Err")
        .map_err(|_| MeterStatus::StringConversionFailure)?;
    let lower = decimal::format(status.code() as i32, 4, 0)?;
    Ok((upper, lower))
}

/// One repetition of the blink code: `severity` blinks then a pause.
pub fn blink<B: Board>(board: &mut B, status: MeterStatus) {
    for _ in 0 .. status.severity() {
        board.set_led(true);
        board.delay_ms(BLINK_ON);
        board.set_led(false);
        board.delay_ms(BLINK_OFF);
    }
    board.delay_ms(BLINK_PAUSE);
}

/// Put `Err` and the status code on the readout, once the link is free, and
/// wait for the frame to go out.
pub fn show_error<B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, meter: &mut Meter<T, D>, status: MeterStatus) -> Result
{
    let (upper, lower) = error_rows(status)?;
    meter.set_rows(upper, lower);
    let readout = &meter.shared().readout;
    while !readout.idle() {
        board.sleep();
    }
    if meter.show() {
        while !readout.link().flushed() {
            board.sleep();
        }
    }
    Ok(())
}

/// Show the status on the readout, then blink it forever with interrupts
/// off.
pub fn fatal<B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, mut meter: Meter<T, D>, status: MeterStatus) -> !
{
    dbgln!("Fatal {status:?} ({})", status.code());
    // The blink code carries the status even if the readout fails.
    let _ = show_error(board, &mut meter, status);
    board.disable_interrupts();
    loop {
        blink(board, status);
    }
}

/// The main loop.
pub fn run<B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, mut meter: Meter<T, D>) -> !
{
    dbgln!("Going!");
    loop {
        board.sleep();
        let status = service(board, &mut meter);
        if status.is_fatal() {
            fatal(board, meter, status);
        }
    }
}

/// Start and run, never returning.  A bad descriptor is fatal before the
/// loop is entered.
///
/// # Safety
/// As for [`start`].
pub unsafe fn boot<B: Board, T: TxRegister, D: TxRegister>(
    board: &mut B, descriptor: &Descriptor, shared: &Shared<T, D>) -> !
{
    match unsafe {start(board, descriptor, shared)} {
        Ok(meter) => run(board, meter),
        // No Meter was made, so this one is the only one.
        Err(status) => fatal(
            board, unsafe {Meter::new(shared, CalibrationSet::DEFAULT)}, status),
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Records what the runtime asks of the hardware.
    #[derive(Default)]
    pub struct Board {
        pub stored: Vec<[u32; RECORD_WORDS]>,
        pub persisted: Option<[u32; RECORD_WORDS]>,
        /// LED level and the delays, in order.
        pub trace: Vec<(bool, u32)>,
        pub led: bool,
        pub masked: bool,
    }

    impl super::Board for Board {
        fn set_led(&mut self, on: bool) {self.led = on}
        fn store_calibration(&mut self, words: &[u32; RECORD_WORDS]) {
            assert!(self.masked);
            self.stored.push(*words);
        }
        fn load_calibration(&mut self) -> Option<[u32; RECORD_WORDS]> {
            self.persisted
        }
        fn sleep(&mut self) {}
        fn delay_ms(&mut self, ms: u32) {self.trace.push((self.led, ms))}
        fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R)
                                 -> R {
            self.masked = true;
            let r = f(self);
            self.masked = false;
            r
        }
        fn disable_interrupts(&mut self) {self.masked = true}
    }
}

#[cfg(test)]
use crate::tx::mock::Port;

#[cfg(test)]
type TestShared = Shared<Port, Port>;

#[cfg(test)]
fn shared() -> TestShared {Shared::new(Port::default(), Port::default(), 0)}

/// The readout link completes a byte each time the main loop sleeps.
#[cfg(test)]
struct Wired<'a> {
    board: mock::Board,
    shared: &'a TestShared,
    sleeps: usize,
}

#[cfg(test)]
impl Board for Wired<'_> {
    fn set_led(&mut self, on: bool) {self.board.set_led(on)}
    fn store_calibration(&mut self, words: &[u32; RECORD_WORDS]) {
        self.board.store_calibration(words)
    }
    fn load_calibration(&mut self) -> Option<[u32; RECORD_WORDS]> {
        self.board.load_calibration()
    }
    fn sleep(&mut self) {
        self.sleeps += 1;
        unsafe {self.shared.on_readout_sent()};
    }
    fn delay_ms(&mut self, ms: u32) {self.board.delay_ms(ms)}
    fn disable_interrupts(&mut self) {self.board.disable_interrupts()}
}

#[test]
fn start_checks_descriptor() {
    let shared = shared();
    let mut board = mock::Board::default();
    let mut bad = infomem::sample();
    bad.checksum ^= 1;
    assert_eq!(unsafe {start(&mut board, &bad, &shared)}.err(),
               Some(MeterStatus::InformationMemoryIntegrity));

    let meter = unsafe {start(&mut board, &infomem::sample(), &shared)}.unwrap();
    assert_eq!(meter.calibration(), &CalibrationSet::DEFAULT);

    let mut stored = CalibrationSet::DEFAULT;
    stored.channel[3].offset = 99;
    board.persisted = Some(stored.to_words());
    let shared = self::shared();
    let meter = unsafe {start(&mut board, &infomem::sample(), &shared)}.unwrap();
    assert_eq!(meter.calibration(), &stored);
}

#[test]
fn store_persists_with_interrupts_masked() {
    let shared = shared();
    let mut board = mock::Board::default();
    let mut meter = unsafe {start(&mut board, &infomem::sample(), &shared)}.unwrap();
    for &c in b"off2\n" {
        unsafe {shared.on_receive(c)};
    }
    for _ in 0 .. crate::config::OVERSAMPLES {
        unsafe {shared.on_conversion(&[0, 77, 0, 0])};
    }
    assert_eq!(service(&mut board, &mut meter), MeterStatus::Ok);
    assert_eq!(meter.calibration().channel[1].offset, 77);
    while unsafe {shared.on_telemetry_sent()} {
    }

    // Nothing new sampled, nothing done.
    for &c in b"store\n" {
        unsafe {shared.on_receive(c)};
    }
    assert_eq!(service(&mut board, &mut meter), MeterStatus::Ok);
    assert!(board.stored.is_empty());

    for _ in 0 .. crate::config::OVERSAMPLES {
        unsafe {shared.on_conversion(&[0, 77, 0, 0])};
    }
    assert_eq!(service(&mut board, &mut meter), MeterStatus::StoreCalibration);
    assert!(!board.masked);
    assert_eq!(board.stored, [meter.calibration().to_words()]);
    assert_eq!(board.stored[0][7], 77);
}

#[test]
fn error_display() {
    let (upper, lower) = error_rows(MeterStatus::SerialBusy).unwrap();
    assert_eq!((upper.as_str(), lower.as_str()), ("Err", "-  2"));
    let (_, lower) = error_rows(MeterStatus::InformationMemoryIntegrity)
        .unwrap();
    assert_eq!(lower.as_str(), "-  4");
}

#[test]
fn blink_code() {
    let mut board = mock::Board::default();
    blink(&mut board, MeterStatus::ConversionOverflow);
    assert_eq!(board.trace, [(true, 250), (false, 250),
                             (true, 250), (false, 250),
                             (true, 250), (false, 250),
                             (false, 1000)]);
}

#[test]
fn error_frame_follows_the_busy_one() {
    use crate::segments::{D2, DE, Dr, MINUS};
    let shared = shared();
    let mut meter = unsafe {Meter::new(&shared, CalibrationSet::DEFAULT)};
    let mut board = Wired {board: mock::Board::default(), shared: &shared,
                           sleeps: 0};
    // A frame of blank rows is still going out.
    assert!(meter.show());
    assert!(!shared.readout.idle());

    assert_eq!(show_error(&mut board, &mut meter, MeterStatus::SerialBusy),
               Ok(()));
    assert!(shared.readout.link().flushed());
    assert!(board.sleeps > 0);
    assert_eq!(meter.rows(), ("Err", "-  2"));
    assert_eq!(shared.readout.link().port().take(),
               [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
                !DE, !Dr, !Dr, 0xff, !MINUS, 0xff, 0xff, !D2]);
    assert!(!board.board.masked);
}
