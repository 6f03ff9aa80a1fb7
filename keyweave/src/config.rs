use embassy_time::Duration;

/// Tunable behavior of the engine.
///
/// Static tables (keymap, combos, gestures, shifts) live in [`crate::keymap::Keymap`];
/// this struct only carries timings and thresholds that apply to all of them.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineConfig {
    pub tap_dance: TapDanceConfig,
    pub combo: ComboConfig,
    pub pointer: PointerConfig,
    pub encoder: EncoderConfig,
}

/// Configurations for tap dance and hold-tap behavior
#[derive(Clone, Copy, Debug)]
pub struct TapDanceConfig {
    /// Tapping term used when a tap dance doesn't set its own
    pub default_term: Duration,
    /// Pointer displacement on either axis that decides hold while a tap dance is pressed
    pub move_threshold: u16,
}

impl Default for TapDanceConfig {
    fn default() -> Self {
        Self {
            default_term: Duration::from_millis(200),
            move_threshold: 16,
        }
    }
}

/// Config for combo behavior
#[derive(Clone, Copy, Debug)]
pub struct ComboConfig {
    /// Combo term used when a combo doesn't set its own
    pub default_term: Duration,
    /// Pointer delta on either axis that interrupts a partially matched combo
    pub move_interrupt_threshold: u16,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            default_term: Duration::from_millis(50),
            move_interrupt_threshold: 8,
        }
    }
}

/// Scaling of pointer motion that isn't consumed by a gesture.
///
/// Forwarded motion is `delta * scale_numerator / scale_denominator`, the
/// division remainder is carried to the next event of the same device.
#[derive(Clone, Copy, Debug)]
pub struct PointerConfig {
    pub scale_numerator: i16,
    pub scale_denominator: i16,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            scale_numerator: 1,
            scale_denominator: 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EncoderConfig {
    /// Detent steps per fired command for encoder entries with resolution 0
    pub default_resolution: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { default_resolution: 1 }
    }
}
