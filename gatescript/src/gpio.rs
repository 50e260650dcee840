//! GPIO watch and PWM channel registration tables.
//!
//! `gpio_interrupt` event clauses register input watches and `gpio_pwm`
//! actions register PWM channels, both during the syntax-check pass.  A pin
//! cannot be both; the interpreter checks the two tables against each other
//! before registering.
//!
//! The edge interrupt itself is not handled here: hardware disables further
//! interrupts on the pin and the event loop re-samples the level after a
//! debounce delay, then re-arms the watch and dispatches the event.

use std::fmt;

use crate::services::Pull;

/// Why a pin registration was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    /// The watch or channel table is full.
    Exhausted,
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::Exhausted => write!(f, "no free pin slot"),
        }
    }
}

impl std::error::Error for PinError {}

// ── GpioWatchTable ────────────────────────────────────────────────────────

#[derive(Debug)]
struct Watch {
    pin: u8,
    pull: Pull,
    debouncing: bool,
}

/// Watched GPIO input pins with debounce bookkeeping.
#[derive(Debug)]
pub struct GpioWatchTable {
    watches: Vec<Watch>,
    capacity: usize,
}

impl GpioWatchTable {
    pub fn new(capacity: usize) -> GpioWatchTable {
        GpioWatchTable {
            watches: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn contains(&self, pin: u8) -> bool {
        self.watches.iter().any(|w| w.pin == pin)
    }

    pub fn pull_of(&self, pin: u8) -> Option<Pull> {
        self.watches.iter().find(|w| w.pin == pin).map(|w| w.pull)
    }

    /// Register `pin` as watched.  Re-registering updates the pull config.
    pub fn register(&mut self, pin: u8, pull: Pull) -> Result<(), PinError> {
        if let Some(w) = self.watches.iter_mut().find(|w| w.pin == pin) {
            w.pull = pull;
            return Ok(());
        }
        if self.watches.len() >= self.capacity {
            return Err(PinError::Exhausted);
        }
        self.watches.push(Watch { pin, pull, debouncing: false });
        Ok(())
    }

    /// Mark `pin` as debouncing after an edge.  `false` if the pin is not
    /// watched or a debounce is already pending (a second edge during the
    /// delay is noise and is dropped).
    pub fn begin_debounce(&mut self, pin: u8) -> bool {
        match self.watches.iter_mut().find(|w| w.pin == pin) {
            Some(w) if !w.debouncing => {
                w.debouncing = true;
                true
            }
            _ => false,
        }
    }

    /// Re-arm `pin` after the settled level was read.
    pub fn end_debounce(&mut self, pin: u8) {
        if let Some(w) = self.watches.iter_mut().find(|w| w.pin == pin) {
            w.debouncing = false;
        }
    }
}

// ── PwmTable ──────────────────────────────────────────────────────────────

/// Registered PWM output channels.
#[derive(Debug)]
pub struct PwmTable {
    pins: Vec<u8>,
    capacity: usize,
}

impl PwmTable {
    pub fn new(capacity: usize) -> PwmTable {
        PwmTable {
            pins: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn contains(&self, pin: u8) -> bool {
        self.pins.contains(&pin)
    }

    pub fn register(&mut self, pin: u8) -> Result<(), PinError> {
        if self.pins.contains(&pin) {
            return Ok(());
        }
        if self.pins.len() >= self.capacity {
            return Err(PinError::Exhausted);
        }
        self.pins.push(pin);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
