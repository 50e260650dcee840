//! Collaborator interfaces the interpreter drives.
//!
//! The script engine owns no transport, hardware, storage, or clock; it
//! talks to all of them through these traits.  The firmware wires in real
//! implementations; tests and the host binary use the `Null*` defaults or
//! recording mocks.

use std::time::{SystemTime, UNIX_EPOCH};

// ── Scope ─────────────────────────────────────────────────────────────────

/// Which message bus an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The gateway's own broker.
    Local,
    /// The uplink broker.
    Remote,
}

impl Scope {
    pub fn name(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Remote => "remote",
        }
    }
}

/// Pull configuration for a GPIO input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    None,
}

// ── Traits ────────────────────────────────────────────────────────────────

/// Publish/subscribe transport, local and remote.
pub trait PubSub {
    fn publish(&mut self, scope: Scope, topic: &str, payload: &[u8], retained: bool);
    fn subscribe(&mut self, scope: Scope, topic: &str);
    fn unsubscribe(&mut self, scope: Scope, topic: &str);
    /// Last retained payload for `topic`, if any.
    fn retained(&mut self, topic: &str) -> Option<Vec<u8>>;
}

/// GPIO and PWM hardware access.
pub trait GpioPort {
    fn set_input(&mut self, pin: u8, pull: Pull);
    fn set_output(&mut self, pin: u8);
    fn read(&mut self, pin: u8) -> bool;
    fn write(&mut self, pin: u8, level: bool);
    fn register_interrupt(&mut self, pin: u8, pull: Pull, debounce_ms: u64);
    fn set_pwm_duty(&mut self, pin: u8, duty: u32);
}

/// Non-volatile storage for the flash slot table.
pub trait Storage {
    /// Read the whole slot blob; missing or short backing reads as zeros.
    fn load_flash(&mut self, len: usize) -> Vec<u8>;
    /// Write the whole slot blob back.  `false` if the write failed.
    fn save_flash(&mut self, blob: &[u8]) -> bool;
}

/// Network time.
pub trait Clock {
    fn synced(&self) -> bool;
    /// `"HH:MM:SS"`.
    fn time_string(&self) -> String;
    /// Three-letter weekday, e.g. `"Mon"`.
    fn weekday_string(&self) -> String;
}

/// Analog input.
pub trait Analog {
    fn read_adc(&mut self) -> i64;
}

/// Console/log output and system command execution.
pub trait Console {
    fn print(&mut self, text: &str);
    fn run_command(&mut self, cmd: &str);
}

/// Asynchronous HTTP client.  Replies re-enter the engine later as
/// `http_response` events; these calls never block.
pub trait HttpClient {
    fn get(&mut self, url: &str);
    fn post(&mut self, url: &str, body: &[u8]);
}

// ── Services bundle ───────────────────────────────────────────────────────

/// All collaborators an interpreter needs, boxed at the seam.
pub struct Services {
    pub pubsub: Box<dyn PubSub + Send>,
    pub gpio: Box<dyn GpioPort + Send>,
    pub storage: Box<dyn Storage + Send>,
    pub clock: Box<dyn Clock + Send>,
    pub adc: Box<dyn Analog + Send>,
    pub console: Box<dyn Console + Send>,
    pub http: Box<dyn HttpClient + Send>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    /// A bundle of no-op collaborators (syntax-check runs, tests).
    pub fn null() -> Services {
        Services {
            pubsub: Box::new(NullPubSub),
            gpio: Box::new(NullGpio),
            storage: Box::new(NullStorage::default()),
            clock: Box::new(NullClock),
            adc: Box::new(NullAnalog),
            console: Box::new(NullConsole),
            http: Box::new(NullHttp),
        }
    }
}

// ── Null implementations ──────────────────────────────────────────────────

pub struct NullPubSub;

impl PubSub for NullPubSub {
    fn publish(&mut self, _: Scope, _: &str, _: &[u8], _: bool) {}
    fn subscribe(&mut self, _: Scope, _: &str) {}
    fn unsubscribe(&mut self, _: Scope, _: &str) {}
    fn retained(&mut self, _: &str) -> Option<Vec<u8>> {
        None
    }
}

pub struct NullGpio;

impl GpioPort for NullGpio {
    fn set_input(&mut self, _: u8, _: Pull) {}
    fn set_output(&mut self, _: u8) {}
    fn read(&mut self, _: u8) -> bool {
        false
    }
    fn write(&mut self, _: u8, _: bool) {}
    fn register_interrupt(&mut self, _: u8, _: Pull, _: u64) {}
    fn set_pwm_duty(&mut self, _: u8, _: u32) {}
}

/// Volatile stand-in for device flash: keeps the blob in memory.
#[derive(Default)]
pub struct NullStorage {
    blob: Vec<u8>,
}

impl Storage for NullStorage {
    fn load_flash(&mut self, len: usize) -> Vec<u8> {
        let mut blob = self.blob.clone();
        blob.resize(len, 0);
        blob
    }
    fn save_flash(&mut self, blob: &[u8]) -> bool {
        self.blob = blob.to_vec();
        true
    }
}

/// A clock that never syncs; `$timestamp` and `$weekday` read as sentinels.
pub struct NullClock;

impl Clock for NullClock {
    fn synced(&self) -> bool {
        false
    }
    fn time_string(&self) -> String {
        "99:99:99".to_owned()
    }
    fn weekday_string(&self) -> String {
        "xxx".to_owned()
    }
}

pub struct NullAnalog;

impl Analog for NullAnalog {
    fn read_adc(&mut self) -> i64 {
        0
    }
}

pub struct NullConsole;

impl Console for NullConsole {
    fn print(&mut self, _: &str) {}
    fn run_command(&mut self, _: &str) {}
}

pub struct NullHttp;

impl HttpClient for NullHttp {
    fn get(&mut self, _: &str) {}
    fn post(&mut self, _: &str, _: &[u8]) {}
}

// ── System clock ──────────────────────────────────────────────────────────

/// UTC clock derived from [`SystemTime`]; always synced on a host build.
pub struct SystemClock;

impl SystemClock {
    fn epoch_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Clock for SystemClock {
    fn synced(&self) -> bool {
        true
    }

    fn time_string(&self) -> String {
        let s = Self::epoch_secs();
        format!("{:02}:{:02}:{:02}", s / 3600 % 24, s / 60 % 60, s % 60)
    }

    fn weekday_string(&self) -> String {
        // The epoch (1970-01-01) was a Thursday.
        const DAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
        DAYS[(Self::epoch_secs() / 86400 % 7) as usize].to_owned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
