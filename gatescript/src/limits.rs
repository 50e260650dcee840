//! Capacity limits for the bounded runtime tables.
//!
//! The firmware this engine embeds in has fixed-size tables for everything;
//! the sizes are configuration rather than magic numbers so that host builds
//! and tests can shrink or grow them.

/// Capacity configuration for one [`Interpreter`](crate::script::Interpreter).
#[derive(Debug, Clone)]
pub struct Limits {
    /// Named variable slots.
    pub max_vars: usize,
    /// Maximum variable name length in bytes (without the `$`).
    pub var_name_len: usize,
    /// One-shot countdown timers (`settimer 1..=N`).
    pub max_timers: usize,
    /// Wall-clock alarm slots (`setalarm 1..=N`).
    pub max_alarms: usize,
    /// Watched GPIO input pins (`gpio_interrupt`).
    pub max_gpio_watches: usize,
    /// PWM output channels (`gpio_pwm`).
    pub max_pwm_channels: usize,
    /// Highest addressable GPIO pin number.
    pub max_gpio_pin: u8,
    /// Persisted flash slots (`@1..=@N`).
    pub flash_slots: usize,
    /// Fixed byte width of one flash slot.
    pub flash_slot_len: usize,
    /// Maximum value length: binary literals and concatenation results are
    /// truncated to this.
    pub value_max: usize,
    /// GPIO edge debounce delay.
    pub debounce_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_vars: 10,
            var_name_len: 14,
            max_timers: 4,
            max_alarms: 6,
            max_gpio_watches: 8,
            max_pwm_channels: 4,
            max_gpio_pin: 16,
            flash_slots: 8,
            flash_slot_len: 64,
            value_max: 256,
            debounce_ms: 30,
        }
    }
}
