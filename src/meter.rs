//! The control loop: ties the interrupt side producers to the readings,
//! the menu, the readout and the telemetry line.

use core::fmt::Write;

use arrayvec::ArrayString;

use crate::adc::Accumulator;
use crate::calibration::CalibrationSet;
use crate::config::{CHANNELS, DISPLAY_SCALE, PRIMARY, SECONDARY, TX_LEN};
use crate::decimal;
use crate::events::{Event, Inputs};
use crate::menu::{Command, Menu};
use crate::parser::CommandParser;
use crate::segments::Readout;
use crate::status::{MeterStatus, Result};
use crate::tx::{TxChannel, TxRegister};

/// One display row.
pub type Row = decimal::Field;

/// State shared between the interrupt handlers and the main loop.  Each
/// field documents its own hand-off; the handlers below are the only entry
/// points used from interrupt context.
pub struct Shared<T, D> {
    pub samples: Accumulator,
    pub inputs: Inputs,
    pub parser: CommandParser,
    pub telemetry: TxChannel<T, TX_LEN>,
    pub readout: Readout<D>,
}

impl<T: TxRegister, D: TxRegister> Shared<T, D> {
    /// `pins` is the encoder pin state at start-up.
    pub const fn new(telemetry: T, readout: D, pins: u8) -> Self {
        Shared {
            samples: Accumulator::new(),
            inputs: Inputs::new(pins),
            parser: CommandParser::new(),
            telemetry: TxChannel::new(telemetry),
            readout: Readout::new(readout),
        }
    }

    /// Converter ISR.  Returns true when the main loop should wake.
    ///
    /// # Safety
    /// Only the converter interrupt may call this, and it must not preempt
    /// itself.
    pub unsafe fn on_conversion(&self, codes: &[i32; CHANNELS]) -> bool {
        unsafe {self.samples.accumulate(codes)}
    }

    /// Converter ISR, result overwritten before it was collected.
    pub fn on_conversion_overrun(&self) {self.samples.flag_overflow()}

    /// Port ISR.
    ///
    /// # Safety
    /// Only the port interrupt may call this.
    pub unsafe fn on_button(&self) -> bool {unsafe {self.inputs.on_button()}}

    /// Port ISR.
    ///
    /// # Safety
    /// As for [`Shared::on_button`].
    pub unsafe fn on_encoder(&self, pins: u8) -> bool {
        unsafe {self.inputs.on_encoder(pins)}
    }

    /// Serial RX ISR.
    ///
    /// # Safety
    /// Only the serial receive interrupt may call this.
    pub unsafe fn on_receive(&self, c: u8) -> bool {
        unsafe {self.parser.add_character(c)}
    }

    /// Serial TX ISR.
    ///
    /// # Safety
    /// Only the serial transmit interrupt may call this.
    pub unsafe fn on_telemetry_sent(&self) -> bool {
        unsafe {self.telemetry.on_byte_sent()}
    }

    /// Readout link TX ISR.
    ///
    /// # Safety
    /// Only the readout link's transmit interrupt may call this.
    pub unsafe fn on_readout_sent(&self) -> bool {
        unsafe {self.readout.on_byte_sent()}
    }
}

/// Main loop state.  A `Meter` is the consumer side of every hand-off in
/// its [`Shared`], so there is only ever one per `Shared`.
pub struct Meter<'a, T, D> {
    shared: &'a Shared<T, D>,
    calibration: CalibrationSet,
    menu: Menu,
    /// Latched by a button press or a command line, consumed by `step`.
    command: Command,
    raw: [i32; CHANNELS],
    readings: [i32; CHANNELS],
    upper: Row,
    lower: Row,
    last_sequence: u32,
}

impl<'a, T: TxRegister, D: TxRegister> Meter<'a, T, D> {
    /// # Safety
    /// No other `Meter` may exist for `shared`, and the `Meter` must only be
    /// used from the main loop, never from an interrupt handler.
    pub unsafe fn new(shared: &'a Shared<T, D>, calibration: CalibrationSet)
                      -> Self {
        Meter {
            shared,
            calibration,
            menu: Menu::new(),
            command: Command::None,
            raw: [0; CHANNELS],
            readings: [0; CHANNELS],
            upper: Row::new(),
            lower: Row::new(),
            last_sequence: shared.samples.sequence(),
        }
    }

    pub fn shared(&self) -> &'a Shared<T, D> {self.shared}

    pub fn calibration(&self) -> &CalibrationSet {&self.calibration}

    pub fn menu(&self) -> &Menu {&self.menu}

    pub fn command(&self) -> Command {self.command}

    /// Calibrated readings from the last step, µV.
    pub fn readings(&self) -> &[i32; CHANNELS] {&self.readings}

    pub fn rows(&self) -> (&str, &str) {(self.upper.as_str(), self.lower.as_str())}

    /// Replace both rows, e.g. with a failure indication.  The next `step`
    /// renders over them.
    pub fn set_rows(&mut self, upper: Row, lower: Row) {
        self.upper = upper;
        self.lower = lower;
    }

    /// Button press.  In the menu this latches the highlighted item.
    pub fn press(&mut self) {
        if let Some(command) = self.menu.press() {
            self.command = command;
        }
    }

    pub fn turn(&mut self, step: i8) {
        self.menu.turn(step);
    }

    /// Apply the queued button and encoder events, oldest first.
    pub fn poll_inputs(&mut self) {
        // The Meter is the only consumer.
        while let Some(event) = unsafe {self.shared.inputs.next()} {
            match event {
                Event::Press => self.press(),
                Event::Step(step) => self.turn(step),
            }
        }
    }

    /// Latch the command from a completed serial line, if recognised.
    pub fn poll_commands(&mut self) {
        if let Some(command) = unsafe {self.shared.parser.evaluate()} {
            self.command = command;
        }
    }

    /// A set of averages has been published since the last step.
    pub fn sample_ready(&self) -> bool {
        let sequence = self.shared.samples.sequence();
        sequence & 1 == 0 && sequence != self.last_sequence
    }

    /// One control loop tick.
    pub fn step(&mut self) -> MeterStatus {
        match self.try_step() {
            Ok(status) => status,
            Err(status) => status,
        }
    }

    fn try_step(&mut self) -> Result<MeterStatus> {
        if self.shared.samples.overflow() {
            return Err(MeterStatus::ConversionOverflow);
        }
        let (raw, sequence) = self.shared.samples.latest();
        self.raw = raw;
        self.last_sequence = sequence;

        let command = core::mem::take(&mut self.command);
        let status = self.execute(command);

        self.readings = self.calibration.apply(&self.raw);
        self.render()?;
        self.transmit()?;
        Ok(status)
    }

    fn execute(&mut self, command: Command) -> MeterStatus {
        if command != Command::None {
            dbgln!("Command {command:?}");
        }
        match command {
            Command::None => {},
            Command::Back => self.menu.exit(),
            Command::SetOffset(ch) => {
                if let Some(cal) = self.calibration.channel.get_mut(ch) {
                    cal.set_offset(self.raw[ch]);
                    dbgln!("Offset {} = {}", ch + 1, cal.offset);
                }
            },
            Command::SetGain(ch) => {
                if let Some(cal) = self.calibration.channel.get_mut(ch) {
                    cal.set_gain(self.raw[ch]);
                    dbgln!("Full scale {} = {}", ch + 1, cal.full_scale_reading);
                }
            },
            Command::Store => {
                dbgln!("Store requested");
                return MeterStatus::StoreCalibration;
            },
        }
        MeterStatus::Ok
    }

    fn field(&self, ch: usize) -> Result<Row> {
        let scale = DISPLAY_SCALE[ch];
        decimal::format(self.readings[ch] / scale.divisor,
                        scale.integral, scale.fractional)
    }

    fn render(&mut self) -> Result {
        if self.menu.active() {
            let item = self.menu.item();
            self.upper = Row::from(item.label)
                .map_err(|_| MeterStatus::StringConversionFailure)?;
            self.lower = match item.command.channel() {
                Some(ch) => self.field(ch)?,
                None => Row::new(),
            };
        }
        else {
            self.upper = self.field(PRIMARY)?;
            self.lower = self.field(SECONDARY)?;
        }
        Ok(())
    }

    /// Send the readings, µV, tab separated.
    fn transmit(&self) -> Result {
        let mut line = ArrayString::<TX_LEN>::new();
        for (i, reading) in self.readings.iter().enumerate() {
            let sep = if i == 0 {""} else {"\t"};
            write!(line, "{sep}{reading}")
                .map_err(|_| MeterStatus::StringConversionFailure)?;
        }
        line.try_push_str("\r\n")
            .map_err(|_| MeterStatus::StringConversionFailure)?;
        // The Meter is the only initiator.
        if !unsafe {self.shared.telemetry.begin(line.as_bytes())} {
            return Err(MeterStatus::SerialBusy);
        }
        Ok(())
    }

    /// Send the current rows to the readout.  A frame still going out
    /// means this one is skipped.
    pub fn show(&mut self) -> bool {
        unsafe {self.shared.readout.update(&self.upper, &self.lower)}
    }
}

#[cfg(test)]
use crate::{config::{FULL_SCALE, OVERSAMPLES}, tx::mock::Port};

#[cfg(test)]
type TestShared = Shared<Port, Port>;

#[cfg(test)]
fn shared() -> TestShared {Shared::new(Port::default(), Port::default(), 0)}

#[cfg(test)]
fn meter(shared: &TestShared) -> Meter<'_, Port, Port> {
    unsafe {Meter::new(shared, CalibrationSet::DEFAULT)}
}

#[cfg(test)]
fn publish(shared: &TestShared, codes: [i32; CHANNELS]) {
    for i in 0 .. OVERSAMPLES {
        assert_eq!(unsafe {shared.on_conversion(&codes)}, i == OVERSAMPLES - 1);
    }
}

#[cfg(test)]
fn sent(shared: &TestShared) -> String {
    while unsafe {shared.on_telemetry_sent()} {
    }
    String::from_utf8(shared.telemetry.port().take()).unwrap()
}

#[test]
fn idle_rows_and_telemetry() {
    let shared = shared();
    let mut meter = meter(&shared);
    assert!(!meter.sample_ready());
    publish(&shared, [FULL_SCALE, FULL_SCALE, 0, -FULL_SCALE]);
    assert!(meter.sample_ready());
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert!(!meter.sample_ready());
    assert_eq!(meter.readings(), &[30_000_000, 1_000_000, 0, -1_000_000]);
    assert_eq!(meter.rows(), ("30.00", "1.000"));
    assert_eq!(sent(&shared), "30000000\t1000000\t0\t-1000000\r\n");
}

#[test]
fn set_offset_zeroes_channel() {
    let shared = shared();
    let mut meter = meter(&shared);
    publish(&shared, [12_345, 0, 0, 0]);
    meter.press();
    meter.turn(-2);
    meter.press();
    assert_eq!(meter.command(), Command::SetOffset(0));
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert_eq!(meter.command(), Command::None);
    assert_eq!(meter.calibration().channel[0].offset, 12_345);
    assert_eq!(meter.readings()[0], 0);
    assert_eq!(meter.rows(), ("1.OFF", " 0.00"));
    assert!(meter.menu().active());
    assert_eq!(sent(&shared), "0\t0\t0\t0\r\n");
}

#[test]
fn set_gain_from_menu() {
    let shared = shared();
    let mut meter = meter(&shared);
    publish(&shared, [0, 500_000, 0, 0]);
    meter.press();
    meter.turn(-8);
    meter.press();
    assert_eq!(meter.command(), Command::SetGain(1));
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert_eq!(meter.calibration().channel[1].full_scale_reading, 500_000);
    assert_eq!(meter.readings()[1], 1_000_000);
    assert_eq!(meter.rows(), ("2.FUL", "1.000"));
}

#[test]
fn events_from_interrupts() {
    use crate::encoder::{A, AB};
    let shared = shared();
    let mut meter = meter(&shared);
    publish(&shared, [0; CHANNELS]);
    unsafe {shared.on_button()};
    unsafe {shared.on_encoder(A)};
    unsafe {shared.on_encoder(AB)};
    meter.poll_inputs();
    assert_eq!(meter.menu().position(), 2);
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert_eq!(meter.rows(), ("1.OFF", " 0.00"));
    sent(&shared);

    // Back leaves the menu.
    meter.turn(2);
    unsafe {shared.on_button()};
    meter.poll_inputs();
    assert_eq!(meter.command(), Command::Back);
    publish(&shared, [0; CHANNELS]);
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert!(!meter.menu().active());
    assert_eq!(meter.rows(), (" 0.00", "0.000"));
}

#[test]
fn back_row_is_blank() {
    let shared = shared();
    let mut meter = meter(&shared);
    meter.press();
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert_eq!(meter.rows(), (" . . . ", ""));
}

#[test]
fn store_is_reported_once() {
    let shared = shared();
    let mut meter = meter(&shared);
    for &c in b"store\n" {
        unsafe {shared.on_receive(c)};
    }
    meter.poll_commands();
    assert_eq!(meter.step(), MeterStatus::StoreCalibration);
    sent(&shared);
    assert_eq!(meter.step(), MeterStatus::Ok);
    assert_eq!(meter.calibration(), &CalibrationSet::DEFAULT);
}

#[test]
fn failures() {
    let shared = shared();
    let mut meter = meter(&shared);
    assert_eq!(meter.step(), MeterStatus::Ok);
    // The previous line has not gone out.
    assert_eq!(meter.step(), MeterStatus::SerialBusy);
    sent(&shared);
    shared.on_conversion_overrun();
    assert_eq!(meter.step(), MeterStatus::ConversionOverflow);
    assert!(shared.telemetry.idle());
}

#[test]
fn show_sends_rows() {
    use crate::segments::{D0, D1, DOT};
    let shared = shared();
    let mut meter = meter(&shared);
    publish(&shared, [0, 8389, 0, 0]);
    meter.step();
    assert!(meter.show());
    assert!(!meter.show());
    while unsafe {shared.on_readout_sent()} {
    }
    assert_eq!(shared.readout.link().port().take(),
               [0xff, !(D0 | DOT), !D0, !D0, !(D0 | DOT), !D0, !D0, !D1]);
}
