//! Usage tables the engine emits: the keyboard page, the consumer page and the
//! generic desktop system controls.
use strum::FromRepr;

/// Keyboard page usages (HID usage tables, page 0x07).
///
/// Only usages that fit the 6-key report array and the modifier byte are listed.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidKeyCode {
    No = 0x00,
    ErrorRollover = 0x01,
    PostFail = 0x02,
    ErrorUndefined = 0x03,
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,
    Kc1 = 0x1E,
    Kc2 = 0x1F,
    Kc3 = 0x20,
    Kc4 = 0x21,
    Kc5 = 0x22,
    Kc6 = 0x23,
    Kc7 = 0x24,
    Kc8 = 0x25,
    Kc9 = 0x26,
    Kc0 = 0x27,
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    LeftBracket = 0x2F,
    RightBracket = 0x30,
    Backslash = 0x31,
    NonusHash = 0x32,
    Semicolon = 0x33,
    Quote = 0x34,
    Grave = 0x35,
    Comma = 0x36,
    Dot = 0x37,
    Slash = 0x38,
    CapsLock = 0x39,
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    Right = 0x4F,
    Left = 0x50,
    Down = 0x51,
    Up = 0x52,
    NumLock = 0x53,
    KpSlash = 0x54,
    KpAsterisk = 0x55,
    KpMinus = 0x56,
    KpPlus = 0x57,
    KpEnter = 0x58,
    Kp1 = 0x59,
    Kp2 = 0x5A,
    Kp3 = 0x5B,
    Kp4 = 0x5C,
    Kp5 = 0x5D,
    Kp6 = 0x5E,
    Kp7 = 0x5F,
    Kp8 = 0x60,
    Kp9 = 0x61,
    Kp0 = 0x62,
    KpDot = 0x63,
    NonusBackslash = 0x64,
    Application = 0x65,
    KbPower = 0x66,
    KpEqual = 0x67,
    F13 = 0x68,
    F14 = 0x69,
    F15 = 0x6A,
    F16 = 0x6B,
    F17 = 0x6C,
    F18 = 0x6D,
    F19 = 0x6E,
    F20 = 0x6F,
    F21 = 0x70,
    F22 = 0x71,
    F23 = 0x72,
    F24 = 0x73,
    Execute = 0x74,
    Help = 0x75,
    Menu = 0x76,
    Select = 0x77,
    Stop = 0x78,
    Again = 0x79,
    Undo = 0x7A,
    Cut = 0x7B,
    Copy = 0x7C,
    Paste = 0x7D,
    Find = 0x7E,
    KbMute = 0x7F,
    KbVolumeUp = 0x80,
    KbVolumeDown = 0x81,
    LCtrl = 0xE0,
    LShift = 0xE1,
    LAlt = 0xE2,
    LGui = 0xE3,
    RCtrl = 0xE4,
    RShift = 0xE5,
    RAlt = 0xE6,
    RGui = 0xE7,
}

impl HidKeyCode {
    /// Returns `true` if the keycode is one of the eight modifier usages
    pub fn is_modifier(self) -> bool {
        HidKeyCode::LCtrl <= self && self <= HidKeyCode::RGui
    }

    /// The modifier bit index (0..8) of a modifier usage
    pub fn modifier_bit(self) -> Option<u8> {
        if self.is_modifier() {
            Some(self as u8 - HidKeyCode::LCtrl as u8)
        } else {
            None
        }
    }
}

impl From<u8> for HidKeyCode {
    fn from(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(HidKeyCode::No)
    }
}

/// Consumer page usages (page 0x0C).
/// Ref: <https://www.usb.org/sites/default/files/documents/hut1_12v2.pdf#page=75>
#[non_exhaustive]
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsumerKey {
    No = 0x00,
    BrightnessUp = 0x6F,
    BrightnessDown = 0x70,
    Play = 0xB0,
    Pause = 0xB1,
    Record = 0xB2,
    FastForward = 0xB3,
    Rewind = 0xB4,
    NextTrack = 0xB5,
    PrevTrack = 0xB6,
    StopPlay = 0xB7,
    Eject = 0xB8,
    PlayPause = 0xCD,
    Mute = 0xE2,
    VolumeIncrement = 0xE9,
    VolumeDecrement = 0xEA,
    Email = 0x18A,
    Calculator = 0x192,
    LocalBrowser = 0x194,
    Lock = 0x19E,
    Undo = 0x21A,
    Copy = 0x21B,
    Cut = 0x21C,
    Paste = 0x21D,
    Search = 0x221,
    Home = 0x223,
    Back = 0x224,
    Forward = 0x225,
    Refresh = 0x227,
    DesktopShowAllWindows = 0x29F,
}

impl ConsumerKey {
    pub const fn usage(self) -> u16 {
        self as u16
    }
}

/// System control usages in the generic desktop page (page 0x01).
/// Ref: <https://www.usb.org/sites/default/files/documents/hut1_12v2.pdf#page=26>
#[non_exhaustive]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemControlKey {
    No = 0x00,
    PowerDown = 0x81,
    Sleep = 0x82,
    WakeUp = 0x83,
    Restart = 0x8F,
}

impl SystemControlKey {
    pub const fn usage(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::HidKeyCode;

    #[test]
    fn test_modifier_bits() {
        assert_eq!(HidKeyCode::LCtrl.modifier_bit(), Some(0));
        assert_eq!(HidKeyCode::RGui.modifier_bit(), Some(7));
        assert_eq!(HidKeyCode::A.modifier_bit(), None);
        assert!(!HidKeyCode::KbVolumeDown.is_modifier());
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(HidKeyCode::from(0x04), HidKeyCode::A);
        assert_eq!(HidKeyCode::from(0x0F), HidKeyCode::L);
        assert_eq!(HidKeyCode::from(0xE1), HidKeyCode::LShift);
        // Gap between the keyboard usages and the modifiers
        assert_eq!(HidKeyCode::from(0xC0), HidKeyCode::No);
    }
}
