//! # keyweave types
//!
//! Plain HID data types used by the engine and by the code that configures it.
//!
//! - [`keycode`] - keyboard page usages, consumer usages and system control usages
//! - [`modifier`] - the 8-bit HID modifier byte
//! - [`mouse_button`] - the HID mouse button byte

#![no_std]

pub mod keycode;
pub mod modifier;
pub mod mouse_button;
