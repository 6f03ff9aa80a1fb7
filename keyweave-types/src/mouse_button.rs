//! Mouse button state.
use core::ops::{BitOr, BitOrAssign};

use bitfield_struct::bitfield;

/// The five buttons carried by a boot-protocol style mouse report
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct MouseButtons {
    #[bits(1)]
    pub left: bool,
    #[bits(1)]
    pub right: bool,
    #[bits(1)]
    pub middle: bool,
    #[bits(1)]
    pub back: bool,
    #[bits(1)]
    pub forward: bool,
    #[bits(3)]
    _reserved: u8,
}

impl BitOr for MouseButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitOrAssign for MouseButtons {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl MouseButtons {
    /// Number of buttons tracked
    pub const COUNT: usize = 5;

    pub const LEFT: Self = Self::new().with_left(true);
    pub const RIGHT: Self = Self::new().with_right(true);
    pub const MIDDLE: Self = Self::new().with_middle(true);
    pub const BACK: Self = Self::new().with_back(true);
    pub const FORWARD: Self = Self::new().with_forward(true);

    /// Iterate the indices (0..5) of the pressed buttons
    pub fn bit_indices(self) -> impl Iterator<Item = usize> {
        let bits = self.into_bits();
        (0..Self::COUNT).filter(move |i| bits & (1 << i) != 0)
    }
}
