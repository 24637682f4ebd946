// Drive the whole control loop the way the interrupt handlers and the main
// loop do on the target.

use std::cell::{Cell, RefCell};

use meter::calibration::{CalibrationSet, RECORD_WORDS};
use meter::config::{CHANNELS, FULL_SCALE, OVERSAMPLES};
use meter::encoder::{A, AB};
use meter::infomem::{self, DESCRIPTOR_WORDS, Descriptor};
use meter::{Board, MeterStatus, Shared, TxRegister, runtime};

#[derive(Default)]
struct Port {
    sent: RefCell<Vec<u8>>,
    busy: Cell<bool>,
}

impl TxRegister for Port {
    fn write(&self, byte: u8) {self.sent.borrow_mut().push(byte)}
    fn busy(&self) -> bool {self.busy.get()}
}

#[derive(Default)]
struct Flash {
    record: Option<[u32; RECORD_WORDS]>,
    masked: bool,
    writes: usize,
}

impl Board for Flash {
    fn set_led(&mut self, _on: bool) {}
    fn store_calibration(&mut self, words: &[u32; RECORD_WORDS]) {
        assert!(self.masked, "storage written with interrupts enabled");
        self.record = Some(*words);
        self.writes += 1;
    }
    fn load_calibration(&mut self) -> Option<[u32; RECORD_WORDS]> {self.record}
    fn sleep(&mut self) {}
    fn delay_ms(&mut self, _ms: u32) {}
    fn without_interrupts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.masked = true;
        let r = f(self);
        self.masked = false;
        r
    }
    fn disable_interrupts(&mut self) {self.masked = true}
}

type TestShared = Shared<Port, Port>;

fn shared() -> TestShared {Shared::new(Port::default(), Port::default(), 0)}

fn descriptor() -> Descriptor {
    let mut words = [0xffff; DESCRIPTOR_WORDS];
    words[0] = 0x1234;
    words[5] = 0xbeef;
    Descriptor {checksum: infomem::checksum(&words), words}
}

fn convert(shared: &TestShared, codes: [i32; CHANNELS]) {
    for _ in 0 .. OVERSAMPLES {
        unsafe {shared.on_conversion(&codes)};
    }
}

fn receive(shared: &TestShared, line: &str) {
    for &c in line.as_bytes() {
        unsafe {shared.on_receive(c)};
    }
}

/// Let both links finish and return the telemetry text.
fn flush(shared: &TestShared) -> String {
    while unsafe {shared.on_telemetry_sent()} {
    }
    while unsafe {shared.on_readout_sent()} {
    }
    String::from_utf8(shared.telemetry.port().sent.take()).unwrap()
}

#[test]
fn calibrate_store_and_reload() {
    let shared = shared();
    let mut board = Flash::default();
    let mut meter = unsafe {runtime::start(&mut board, &descriptor(), &shared)}.unwrap();
    assert_eq!(meter.calibration(), &CalibrationSet::DEFAULT);

    convert(&shared, [FULL_SCALE, 0, 0, 0]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    assert_eq!(flush(&shared), "30000000\t0\t0\t0\r\n");
    assert_eq!(meter.rows(), ("30.00", "0.000"));

    // Into the menu, two detents down to "1.OFF", and select it.
    unsafe {
        shared.on_button();
        shared.on_encoder(A);
        shared.on_encoder(AB);
        shared.on_button();
    }
    convert(&shared, [1000, 0, 0, 0]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    assert_eq!(meter.readings()[0], 0);
    assert_eq!(meter.rows(), ("1.OFF", " 0.00"));
    assert_eq!(flush(&shared), "0\t0\t0\t0\r\n");

    // 5V on the 30V channel, gain set over the serial line.
    receive(&shared, "ful1\r\n");
    convert(&shared, [1000 + FULL_SCALE / 6, 0, 0, 0]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    assert_eq!(meter.calibration().channel[0].full_scale_reading, 8_388_606);
    assert_eq!(flush(&shared), "5000000\t0\t0\t0\r\n");
    assert_eq!(meter.rows(), ("1.OFF", " 5.00"));

    // Unknown lines are ignored.
    receive(&shared, "reset\n");
    convert(&shared, [1000 + FULL_SCALE / 6, 0, 0, 0]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    flush(&shared);
    assert_eq!(board.writes, 0);

    receive(&shared, "store\n");
    convert(&shared, [1000 + FULL_SCALE / 6, 0, 0, 0]);
    assert_eq!(runtime::service(&mut board, &mut meter),
               MeterStatus::StoreCalibration);
    assert_eq!(board.writes, 1);
    assert!(!board.masked);
    flush(&shared);

    let calibrated = *meter.calibration();
    assert_eq!(calibrated.channel[0].offset, 1000);

    // After a restart the stored calibration is used.
    let shared = self::shared();
    let meter = unsafe {runtime::start(&mut board, &descriptor(), &shared)}.unwrap();
    assert_eq!(meter.calibration(), &calibrated);
}

#[test]
fn corrupt_descriptor_is_fatal() {
    let shared = shared();
    let mut board = Flash::default();
    let mut bad = descriptor();
    bad.words[7] = 0;
    assert_eq!(unsafe {runtime::start(&mut board, &bad, &shared)}.err(),
               Some(MeterStatus::InformationMemoryIntegrity));
}

#[test]
fn slow_serial_is_fatal() {
    let shared = shared();
    let mut board = Flash::default();
    let mut meter = unsafe {runtime::start(&mut board, &descriptor(), &shared)}.unwrap();
    convert(&shared, [0; CHANNELS]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    // Woken without a new sample: nothing to do.
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::Ok);
    convert(&shared, [0; CHANNELS]);
    assert_eq!(runtime::service(&mut board, &mut meter), MeterStatus::SerialBusy);

    let (upper, lower) = runtime::error_rows(MeterStatus::SerialBusy).unwrap();
    assert_eq!((upper.as_str(), lower.as_str()), ("Err", "-  2"));
}

#[test]
fn overrun_is_fatal() {
    let shared = shared();
    let mut board = Flash::default();
    let mut meter = unsafe {runtime::start(&mut board, &descriptor(), &shared)}.unwrap();
    shared.on_conversion_overrun();
    convert(&shared, [0; CHANNELS]);
    assert_eq!(runtime::service(&mut board, &mut meter),
               MeterStatus::ConversionOverflow);
    assert!(shared.telemetry.idle());
}
