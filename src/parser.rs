//! Line oriented serial command input.

use crate::config::LINE_LEN;
use crate::menu::Command;
use crate::vcell::{UCell, VCell, barrier};

/// The command vocabulary.  Matched exactly, case sensitive.
pub const VOCABULARY: [(&str, Command); 10] = [
    ("back", Command::Back),
    ("off1", Command::SetOffset(0)),
    ("ful1", Command::SetGain(0)),
    ("off2", Command::SetOffset(1)),
    ("ful2", Command::SetGain(1)),
    ("off3", Command::SetOffset(2)),
    ("ful3", Command::SetGain(2)),
    ("off4", Command::SetOffset(3)),
    ("ful4", Command::SetGain(3)),
    ("store", Command::Store),
];

static_assertions::const_assert_eq!(
    VOCABULARY.len(), crate::menu::ITEM_COUNT);

pub const TERMINATOR: u8 = b'\n';

/// Accumulates received characters into a line.
///
/// The receive ISR owns the buffer until a terminator arrives and `ready`
/// is set.  The main loop then owns it until `evaluate` clears `ready`.
/// Characters received in between are dropped.  Each side is an `unsafe`
/// entry point with a single calling context.
pub struct CommandParser {
    line: UCell<[u8; LINE_LEN]>,
    len: VCell<usize>,
    ready: VCell<bool>,
}

impl CommandParser {
    pub const fn new() -> Self {
        CommandParser {
            line: UCell::new([0; LINE_LEN]),
            len: VCell::new(0),
            ready: VCell::new(false),
        }
    }

    /// Receive ISR.  Returns true when `c` completed a line.  Characters
    /// past the buffer capacity are silently dropped.
    ///
    /// # Safety
    /// Only the receive ISR may call this.
    pub unsafe fn add_character(&self, c: u8) -> bool {
        if self.ready.read() {
            return false;
        }
        if c == TERMINATOR {
            barrier();
            self.ready.write(true);
            return true;
        }
        let len = self.len.read();
        if len < LINE_LEN {
            unsafe {self.line.as_mut()[len] = c};
            self.len.write(len + 1);
        }
        false
    }

    /// A complete line awaits evaluation.
    pub fn ready(&self) -> bool {self.ready.read()}

    /// Main loop.  Match a completed line against the vocabulary and start
    /// a new line.  Unrecognised lines give `None`.
    ///
    /// # Safety
    /// Only one context, the line consumer, may call this.
    pub unsafe fn evaluate(&self) -> Option<Command> {
        if !self.ready.read() {
            return None;
        }
        let line = unsafe {self.line.as_ref()};
        let line = &line[..self.len.read()];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let command = lookup(line);
        self.len.write(0);
        barrier();
        self.ready.write(false);
        command
    }

    #[cfg(test)]
    fn pending(&self) -> &[u8] {
        let line = unsafe {self.line.as_ref()};
        &line[..self.len.read()]
    }
}

impl Default for CommandParser {
    fn default() -> Self {Self::new()}
}

pub fn lookup(line: &[u8]) -> Option<Command> {
    VOCABULARY.iter()
        .find(|(word, _)| word.as_bytes() == line)
        .map(|&(_, command)| command)
}

#[cfg(test)]
fn feed(parser: &CommandParser, s: &str) -> bool {
    let mut done = false;
    for &c in s.as_bytes() {
        assert!(!done);
        done = unsafe {parser.add_character(c)};
    }
    done
}

#[test]
fn known_commands() {
    let p = CommandParser::new();
    assert_eq!(unsafe {p.evaluate()}, None);
    assert!(feed(&p, "off2\n"));
    assert_eq!(unsafe {p.evaluate()}, Some(Command::SetOffset(1)));
    assert!(feed(&p, "store\r\n"));
    assert_eq!(unsafe {p.evaluate()}, Some(Command::Store));
    assert!(!p.ready());
}

#[test]
fn exact_match_only() {
    let p = CommandParser::new();
    for s in ["Back\n", "bac\n", "backk\n", "off\n", "\n", "ful5\n"] {
        assert!(feed(&p, s));
        assert_eq!(unsafe {p.evaluate()}, None, "{s:?}");
    }
}

#[test]
fn long_line_is_truncated() {
    let p = CommandParser::new();
    let long: String = (0 .. LINE_LEN + 10).map(|i| (b'a' + (i % 26) as u8) as char)
        .collect();
    assert!(!feed(&p, &long));
    assert_eq!(p.pending(), &long.as_bytes()[..LINE_LEN]);
    assert!(unsafe {p.add_character(TERMINATOR)});
    assert_eq!(unsafe {p.evaluate()}, None);
    assert!(feed(&p, "back\n"));
    assert_eq!(unsafe {p.evaluate()}, Some(Command::Back));
}

#[test]
fn one_line_in_flight() {
    let p = CommandParser::new();
    assert!(feed(&p, "ful1\n"));
    assert!(!unsafe {p.add_character(b'x')});
    assert!(!unsafe {p.add_character(TERMINATOR)});
    assert_eq!(unsafe {p.evaluate()}, Some(Command::SetGain(0)));
    assert!(p.pending().is_empty());
}
