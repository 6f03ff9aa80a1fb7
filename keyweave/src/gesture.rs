//! Pointer gestures.
//!
//! While a gesture shift is started, motion of its pointing device is
//! accumulated instead of moving the cursor. Every full `distance` travelled
//! along an axis fires the command for that direction once; the remainder is
//! kept for the next motion.

use heapless::Vec;

use crate::command::CommandId;
use crate::shift::PreCommand;

/// Max number of gestures in a keymap
pub const GESTURE_MAX_NUM: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GestureDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gesture {
    /// Pointing device the gesture consumes motion from
    pub device: u8,
    pub distance: u16,
    /// Only keep the dominant axis of the accumulated motion
    pub angle_snap: bool,
    pub left: Option<CommandId>,
    pub right: Option<CommandId>,
    pub up: Option<CommandId>,
    pub down: Option<CommandId>,
    pub pre_command: Option<PreCommand>,
}

impl Gesture {
    pub const fn new(device: u8, distance: u16) -> Self {
        Self {
            device,
            distance,
            angle_snap: false,
            left: None,
            right: None,
            up: None,
            down: None,
            pre_command: None,
        }
    }

    pub fn command(&self, direction: GestureDirection) -> Option<CommandId> {
        match direction {
            GestureDirection::Left => self.left,
            GestureDirection::Right => self.right,
            GestureDirection::Up => self.up,
            GestureDirection::Down => self.down,
        }
    }
}

/// Accumulated displacement of one gesture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct GestureRuntime {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl GestureRuntime {
    pub(crate) fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
    }

    /// Add motion and take every full step out of the accumulator.
    ///
    /// Returns the directions to fire with their repeat counts, x axis first.
    pub(crate) fn accumulate(&mut self, gesture: &Gesture, dx: i16, dy: i16) -> Vec<(GestureDirection, u8), 2> {
        let mut fired = Vec::new();
        self.x = self.x.saturating_add(dx as i32);
        self.y = self.y.saturating_add(dy as i32);
        if gesture.angle_snap {
            if self.x.unsigned_abs() >= self.y.unsigned_abs() {
                self.y = 0;
            } else {
                self.x = 0;
            }
        }
        if gesture.distance == 0 {
            return fired;
        }

        let distance = gesture.distance as i32;
        if let Some((times, step)) = take_steps(&mut self.x, distance) {
            let direction = if step > 0 { GestureDirection::Right } else { GestureDirection::Left };
            let _ = fired.push((direction, times));
        }
        if let Some((times, step)) = take_steps(&mut self.y, distance) {
            let direction = if step > 0 { GestureDirection::Down } else { GestureDirection::Up };
            let _ = fired.push((direction, times));
        }
        fired
    }
}

/// Remove whole multiples of `distance` from `total`, returning the count and sign
fn take_steps(total: &mut i32, distance: i32) -> Option<(u8, i32)> {
    let steps = (*total / distance).clamp(-(u8::MAX as i32), u8::MAX as i32);
    if steps == 0 {
        return None;
    }
    *total -= steps * distance;
    Some((steps.unsigned_abs() as u8, steps.signum()))
}

#[cfg(test)]
mod tests {
    use super::{Gesture, GestureDirection, GestureRuntime};

    #[test]
    fn test_angle_snap_keeps_remainder() {
        let gesture = Gesture {
            angle_snap: true,
            ..Gesture::new(0, 20)
        };
        let mut runtime = GestureRuntime::default();
        let fired = runtime.accumulate(&gesture, 25, 3);
        assert_eq!(fired.as_slice(), &[(GestureDirection::Right, 1)]);
        assert!(runtime.accumulate(&gesture, 0, 0).is_empty());
        assert_eq!((runtime.x, runtime.y), (5, 0));
    }

    #[test]
    fn test_exact_multiple_leaves_no_remainder() {
        let gesture = Gesture::new(0, 10);
        let mut runtime = GestureRuntime::default();
        let fired = runtime.accumulate(&gesture, -30, 0);
        assert_eq!(fired.as_slice(), &[(GestureDirection::Left, 3)]);
        assert_eq!((runtime.x, runtime.y), (0, 0));
    }

    #[test]
    fn test_both_axes_without_snap() {
        let gesture = Gesture::new(1, 10);
        let mut runtime = GestureRuntime::default();
        assert!(runtime.accumulate(&gesture, 6, -9).is_empty());
        let fired = runtime.accumulate(&gesture, 6, -2);
        assert_eq!(
            fired.as_slice(),
            &[(GestureDirection::Right, 1), (GestureDirection::Up, 1)]
        );
        assert_eq!((runtime.x, runtime.y), (2, -1));
    }

    #[test]
    fn test_snap_tie_keeps_x() {
        let gesture = Gesture {
            angle_snap: true,
            ..Gesture::new(0, 10)
        };
        let mut runtime = GestureRuntime::default();
        runtime.accumulate(&gesture, 4, -4);
        assert_eq!((runtime.x, runtime.y), (4, 0));
    }
}
