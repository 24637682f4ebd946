//! Menu items, commands and menu navigation.

use crate::config::{CHANNELS, ROW_CELLS, ROW_LEN};
use crate::segments::cells;

/// A pending menu action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Command {
    #[default]
    None,
    /// Leave the menu.
    Back,
    /// Take the current reading of the channel as its zero.
    SetOffset(usize),
    /// Take the current reading of the channel as its calibration voltage.
    SetGain(usize),
    /// Persist the calibration.
    Store,
}

impl Command {
    /// The channel the command acts on.
    pub const fn channel(self) -> Option<usize> {
        match self {
            Command::SetOffset(ch) | Command::SetGain(ch) => Some(ch),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuItem {
    /// Upper row text while the item is highlighted.
    pub label: &'static str,
    pub command: Command,
}

const OFFSET_LABELS: [&str; CHANNELS] = ["1.OFF", "2.OFF", "3.OFF", "4.OFF"];
const GAIN_LABELS: [&str; CHANNELS] = ["1.FUL", "2.FUL", "3.FUL", "4.FUL"];

pub const ITEM_COUNT: usize = 2 * CHANNELS + 2;

/// Back, then offset and gain for each channel, then store.
pub static ITEMS: [MenuItem; ITEM_COUNT] = items();

const fn items() -> [MenuItem; ITEM_COUNT] {
    let mut items = [MenuItem {label: " . . . ", command: Command::Back};
                     ITEM_COUNT];
    let mut ch = 0;
    while ch < CHANNELS {
        items[1 + 2 * ch] = MenuItem {
            label: OFFSET_LABELS[ch], command: Command::SetOffset(ch)};
        items[2 + 2 * ch] = MenuItem {
            label: GAIN_LABELS[ch], command: Command::SetGain(ch)};
        ch += 1;
    }
    items[ITEM_COUNT - 1] = MenuItem {label: "Stor", command: Command::Store};
    items
}

const fn labels_fit() -> bool {
    let items = items();
    let mut i = 0;
    while i < ITEM_COUNT {
        let label = items[i].label;
        if label.len() > ROW_LEN || cells(label) > ROW_CELLS {
            return false;
        }
        i += 1;
    }
    true
}

static_assertions::const_assert!(labels_fit());

/// Largest encoder position.  Two encoder steps per item.
const MAX_POSITION: i32 = 2 * ITEM_COUNT as i32 - 1;

/// Menu navigation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Menu {
    active: bool,
    position: i32,
}

impl Menu {
    pub const fn new() -> Self {Menu {active: false, position: 0}}

    pub fn active(&self) -> bool {self.active}

    pub fn position(&self) -> i32 {self.position}

    /// The highlighted item.
    pub fn item(&self) -> &'static MenuItem {
        &ITEMS[self.position as usize / 2]
    }

    /// Button press.  Enters the menu at the top, or returns the highlighted
    /// item's command if already in it.
    pub fn press(&mut self) -> Option<Command> {
        if self.active {
            return Some(self.item().command);
        }
        self.active = true;
        self.position = 0;
        None
    }

    /// Encoder step.  Clockwise detents count down the decoder, so they
    /// move down the list.
    pub fn turn(&mut self, step: i8) {
        self.position = (self.position - step as i32).clamp(0, MAX_POSITION);
    }

    pub fn exit(&mut self) {
        self.active = false;
    }
}

#[test]
fn table() {
    assert_eq!(ITEMS[0].command, Command::Back);
    assert_eq!(ITEMS[1], MenuItem {label: "1.OFF", command: Command::SetOffset(0)});
    assert_eq!(ITEMS[4], MenuItem {label: "2.FUL", command: Command::SetGain(1)});
    assert_eq!(ITEMS[ITEM_COUNT - 1].command, Command::Store);
}

#[test]
fn press_enters_then_latches() {
    let mut menu = Menu::new();
    menu.turn(-5);
    assert_eq!(menu.position(), 5);
    assert_eq!(menu.press(), None);
    assert!(menu.active());
    assert_eq!(menu.position(), 0);
    assert_eq!(menu.press(), Some(Command::Back));
    assert!(menu.active());
}

#[test]
fn two_steps_per_item() {
    let mut menu = Menu::new();
    menu.press();
    menu.turn(-1);
    assert_eq!(menu.item().command, Command::Back);
    menu.turn(-1);
    assert_eq!(menu.item().command, Command::SetOffset(0));
    menu.turn(-1);
    menu.turn(-1);
    assert_eq!(menu.press(), Some(Command::SetGain(0)));
}

#[test]
fn position_is_clamped() {
    let mut menu = Menu::new();
    menu.press();
    menu.turn(1);
    assert_eq!(menu.position(), 0);
    for _ in 0 .. 100 {
        menu.turn(-1);
    }
    assert_eq!(menu.position(), MAX_POSITION);
    assert_eq!(menu.item().command, Command::Store);
}
