//! The modifier byte of a keyboard report.
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;

/// One bit per modifier key, in HID report order (usage 0xE0 is bit 0).
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct HidModifiers {
    #[bits(1)]
    pub left_ctrl: bool,
    #[bits(1)]
    pub left_shift: bool,
    #[bits(1)]
    pub left_alt: bool,
    #[bits(1)]
    pub left_gui: bool,
    #[bits(1)]
    pub right_ctrl: bool,
    #[bits(1)]
    pub right_shift: bool,
    #[bits(1)]
    pub right_alt: bool,
    #[bits(1)]
    pub right_gui: bool,
}

impl BitOr for HidModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitAnd for HidModifiers {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}
impl Not for HidModifiers {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}
impl BitAndAssign for HidModifiers {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}
impl BitOrAssign for HidModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl HidModifiers {
    pub const LCTRL: Self = Self::new().with_left_ctrl(true);
    pub const LSHIFT: Self = Self::new().with_left_shift(true);
    pub const LALT: Self = Self::new().with_left_alt(true);
    pub const LGUI: Self = Self::new().with_left_gui(true);
    pub const RCTRL: Self = Self::new().with_right_ctrl(true);
    pub const RSHIFT: Self = Self::new().with_right_shift(true);
    pub const RALT: Self = Self::new().with_right_alt(true);
    pub const RGUI: Self = Self::new().with_right_gui(true);

    /// Returns `true` when no modifier bit is set
    pub const fn is_empty(self) -> bool {
        self.into_bits() == 0
    }

    /// Iterate the indices (0..8) of the set bits
    pub fn bit_indices(self) -> impl Iterator<Item = usize> {
        let bits = self.into_bits();
        (0..8).filter(move |i| bits & (1 << i) != 0)
    }
}
