//! Debug output.  Everything goes to a byte sink installed at bring-up,
//! normally a spare UART written by polling.  Before `init` the output is
//! discarded.

use core::fmt::Write;

use crate::vcell::VCell;

/// Blocking byte writer.
pub type Sink = fn(&[u8]);

static SINK: VCell<Option<Sink>> = VCell::new(None);

pub struct DebugS;

fn sdebug_bytes(s: &[u8]) -> core::fmt::Result {
    if let Some(sink) = SINK.read() {
        sink(s);
    }
    Ok(())
}

impl Write for DebugS {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        sdebug_bytes(s.as_bytes())
    }
    fn write_char(&mut self, c: char) -> core::fmt::Result {
        let mut cc = [0; 4];
        sdebug_bytes(c.encode_utf8(&mut cc).as_bytes())
    }
}

#[macro_export]
macro_rules! dbg {
    ($($tt:tt)*) => ({let _ = core::fmt::Write::write_fmt(
        &mut $crate::debug::DebugS, format_args!($($tt)*));});
}

#[macro_export]
macro_rules! dbgln {
    () => ({let _ = core::fmt::Write::write_str(
        &mut $crate::debug::DebugS, "\n");});
    ($($tt:tt)*) => ({
        let _ = core::fmt::Write::write_fmt(
            &mut $crate::debug::DebugS, format_args!($($tt)*));
        let _ = core::fmt::Write::write_str(
            &mut $crate::debug::DebugS, "\n");
    });
}

/// Install the sink.  The dbg* macros work after this.
pub fn init(sink: Sink) {
    SINK.write(Some(sink));
    dbgln!("Debug up");
}

#[cfg(test)]
static CAPTURED: std::sync::Mutex<Vec<u8>> = std::sync::Mutex::new(Vec::new());

#[test]
fn lines_reach_the_sink() {
    init(|s| CAPTURED.lock().unwrap().extend_from_slice(s));
    dbg!("a{}", 1);
    dbgln!(" b{}", 'µ');
    dbgln!();
    let out = String::from_utf8(CAPTURED.lock().unwrap().clone()).unwrap();
    assert!(out.ends_with("a1 bµ\n\n"), "{out:?}");
}
