//! Logical buttons and the 20-bit button mask.
//!
//! The bit assignment is a compatibility contract shared with existing
//! consumers of the polled API, so offsets must never change. Face buttons
//! are named by compass direction (North/South/East/West) to avoid the
//! ambiguity between Nintendo and Xbox/PlayStation layouts.
//!
//! | offset | mask      | button                    |
//! |-------:|-----------|---------------------------|
//! | 0      | `0x00001` | Up                        |
//! | 1      | `0x00002` | Down                      |
//! | 2      | `0x00004` | Left                      |
//! | 3      | `0x00008` | Right                     |
//! | 4      | `0x00010` | Plus / Options            |
//! | 5      | `0x00020` | Minus / Share             |
//! | 6      | `0x00040` | Left stick click          |
//! | 7      | `0x00080` | Right stick click         |
//! | 8      | `0x00100` | L                         |
//! | 9      | `0x00200` | R                         |
//! | 10     | `0x00400` | ZL                        |
//! | 11     | `0x00800` | ZR                        |
//! | 12     | `0x01000` | S                         |
//! | 13     | `0x02000` | E                         |
//! | 14     | `0x04000` | W                         |
//! | 15     | `0x08000` | N                         |
//! | 16     | `0x10000` | Home / PS                 |
//! | 17     | `0x20000` | Capture / Touchpad click  |
//! | 18     | `0x40000` | SL / Mic                  |
//! | 19     | `0x80000` | SR                        |
//!
//! ZL and ZR are also reported as analogue triggers; the bits are the raw
//! digital view.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of defined button bits.
pub const BUTTON_COUNT: usize = 20;

/// Mask covering every defined button bit.
pub const BUTTON_MASK_ALL: u32 = (1 << BUTTON_COUNT) - 1;

/// A logical button. The discriminant is the bit offset in [`ButtonMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Button {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Plus = 4,
    Minus = 5,
    LClick = 6,
    RClick = 7,
    L = 8,
    R = 9,
    ZL = 10,
    ZR = 11,
    S = 12,
    E = 13,
    W = 14,
    N = 15,
    Home = 16,
    Capture = 17,
    SL = 18,
    SR = 19,
}

impl Button {
    /// PlayStation name for [`Button::Plus`].
    pub const OPTIONS: Button = Button::Plus;
    /// PlayStation name for [`Button::Minus`].
    pub const SHARE: Button = Button::Minus;
    /// PlayStation name for [`Button::Home`].
    pub const PS: Button = Button::Home;
    /// PlayStation name for [`Button::Capture`].
    pub const TOUCHPAD_CLICK: Button = Button::Capture;
    /// DualSense name for [`Button::SL`].
    pub const MIC: Button = Button::SL;

    /// Every button, ordered by bit offset.
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Plus,
        Button::Minus,
        Button::LClick,
        Button::RClick,
        Button::L,
        Button::R,
        Button::ZL,
        Button::ZR,
        Button::S,
        Button::E,
        Button::W,
        Button::N,
        Button::Home,
        Button::Capture,
        Button::SL,
        Button::SR,
    ];

    /// Bit offset of this button in the mask.
    #[inline]
    pub const fn offset(self) -> u8 {
        self as u8
    }

    /// Single-bit mask for this button.
    #[inline]
    pub const fn mask(self) -> u32 {
        1 << (self as u8)
    }

    /// Look up the button at a bit offset.
    pub fn from_offset(offset: u8) -> Option<Button> {
        Self::ALL.get(offset as usize).copied()
    }

    /// Short stable name, suitable for logs and config files.
    pub const fn name(self) -> &'static str {
        match self {
            Button::Up => "Up",
            Button::Down => "Down",
            Button::Left => "Left",
            Button::Right => "Right",
            Button::Plus => "Plus",
            Button::Minus => "Minus",
            Button::LClick => "LClick",
            Button::RClick => "RClick",
            Button::L => "L",
            Button::R => "R",
            Button::ZL => "ZL",
            Button::ZR => "ZR",
            Button::S => "S",
            Button::E => "E",
            Button::W => "W",
            Button::N => "N",
            Button::Home => "Home",
            Button::Capture => "Capture",
            Button::SL => "SL",
            Button::SR => "SR",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pressed-button bitset using the fixed offsets of [`Button`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ButtonMask(u32);

impl ButtonMask {
    /// No buttons pressed.
    pub const EMPTY: ButtonMask = ButtonMask(0);

    /// Build a mask from raw bits, dropping anything above bit 19.
    #[inline]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        ButtonMask(bits & BUTTON_MASK_ALL)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    /// Copy of this mask with `button` pressed.
    #[inline]
    pub const fn with(self, button: Button) -> Self {
        ButtonMask(self.0 | button.mask())
    }

    /// Copy of this mask with `button` released.
    #[inline]
    pub const fn without(self, button: Button) -> Self {
        ButtonMask(self.0 & !button.mask())
    }

    /// Pressed buttons in offset order.
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }

    /// Buttons whose state differs between `self` and `other`.
    #[inline]
    pub const fn changed(self, other: ButtonMask) -> ButtonMask {
        ButtonMask(self.0 ^ other.0)
    }
}

impl FromIterator<Button> for ButtonMask {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        iter.into_iter().fold(ButtonMask::EMPTY, ButtonMask::with)
    }
}

impl From<Button> for ButtonMask {
    fn from(button: Button) -> Self {
        ButtonMask(button.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENTED: [(u8, u32, Button); BUTTON_COUNT] = [
        (0, 0x00001, Button::Up),
        (1, 0x00002, Button::Down),
        (2, 0x00004, Button::Left),
        (3, 0x00008, Button::Right),
        (4, 0x00010, Button::Plus),
        (5, 0x00020, Button::Minus),
        (6, 0x00040, Button::LClick),
        (7, 0x00080, Button::RClick),
        (8, 0x00100, Button::L),
        (9, 0x00200, Button::R),
        (10, 0x00400, Button::ZL),
        (11, 0x00800, Button::ZR),
        (12, 0x01000, Button::S),
        (13, 0x02000, Button::E),
        (14, 0x04000, Button::W),
        (15, 0x08000, Button::N),
        (16, 0x10000, Button::Home),
        (17, 0x20000, Button::Capture),
        (18, 0x40000, Button::SL),
        (19, 0x80000, Button::SR),
    ];

    #[test]
    fn every_offset_decodes_to_exactly_one_button() {
        for (offset, mask, expected) in DOCUMENTED {
            let decoded: Vec<Button> = ButtonMask::from_bits_truncate(1 << offset).iter().collect();
            assert_eq!(decoded, vec![expected], "offset {offset}");
            assert_eq!(expected.mask(), mask);
            assert_eq!(expected.offset(), offset);
            assert_eq!(Button::from_offset(offset), Some(expected));
        }
    }

    #[test]
    fn aliases_share_bits() {
        assert_eq!(Button::OPTIONS.mask(), 0x00010);
        assert_eq!(Button::SHARE.mask(), 0x00020);
        assert_eq!(Button::PS.mask(), 0x10000);
        assert_eq!(Button::TOUCHPAD_CLICK.mask(), 0x20000);
        assert_eq!(Button::MIC.mask(), 0x40000);
    }

    #[test]
    fn truncate_drops_undefined_bits() {
        let mask = ButtonMask::from_bits_truncate(0xFFF0_0001);
        assert_eq!(mask.bits(), 0x00001);
        assert_eq!(Button::from_offset(20), None);
    }

    #[test]
    fn with_without_and_collect() {
        let mask: ButtonMask = [Button::S, Button::ZR].into_iter().collect();
        assert!(mask.contains(Button::S));
        assert!(mask.contains(Button::ZR));
        assert!(!mask.contains(Button::N));
        assert_eq!(mask.without(Button::S), ButtonMask::from(Button::ZR));
        assert_eq!(mask.changed(ButtonMask::from(Button::S)), ButtonMask::from(Button::ZR));
    }
}
