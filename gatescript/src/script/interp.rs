//! Script interpreter: statement driver, runtime state, and dispatch.
//!
//! The interpreter owns the tokenized [`Script`] and all runtime tables, and
//! exposes one entry point per external trigger source.  Every entry funnels
//! into [`Interpreter::dispatch`], which scans the whole token stream once —
//! a *pass* — matching each `on` clause against the live event and executing
//! matched action bodies while it parses them.  No syntax tree is ever
//! built: the same recursive descent both validates and runs the script.
//!
//! A script must pass [`Interpreter::syntax_check`] before dispatch does
//! anything; the check pass also performs load-time registrations (GPIO
//! watches, PWM channels, variable bindings, hex-literal decoding) so that
//! every resource-exhaustion case rejects the script before it is marked
//! runnable.
//!
//! The core is single-threaded and run-to-completion: callers must serialize
//! dispatches (see [`Gateway`](crate::event_loop::Gateway)); nothing here
//! locks.

use std::collections::HashMap;
use std::time::Instant;

use crate::alarm::AlarmTable;
use crate::flash::FlashCache;
use crate::gpio::{GpioWatchTable, PwmTable};
use crate::limits::Limits;
use crate::services::{Scope, Services};
use crate::timers::TimerTable;
use crate::vars::VarStore;
use super::token::{Script, SyntaxError};
use super::value::Value;

// ── Event ─────────────────────────────────────────────────────────────────

/// One external trigger occurrence: the payload half of the trigger context.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Device boot.
    Init,
    /// Wi-Fi came up.
    WifiConnect,
    /// Uplink broker connection established.
    MqttConnect,
    /// A message arrived on the local or remote bus.
    Topic {
        scope: Scope,
        topic: String,
        data: Vec<u8>,
    },
    /// Countdown timer `id` (0-based) expired.
    Timer { id: usize },
    /// Wall-clock alarm `index` (0-based) was reached.
    Alarm { index: usize },
    /// A watched GPIO pin settled at `level` after an edge.
    GpioInt { pin: u8, level: bool },
    /// An HTTP request issued earlier completed.
    HttpResponse { code: u16, body: Vec<u8> },
}

// ── Mode ──────────────────────────────────────────────────────────────────

/// How a pass runs: pure structural validation, or live execution against
/// an event.
#[derive(Debug)]
pub enum Mode {
    /// Syntax-check pass: parse everything, run nothing (load-time
    /// registrations excepted).
    Validate,
    /// Live pass: action bodies of matching `on` clauses run with real side
    /// effects.
    Execute(Event),
}

impl Mode {
    pub fn is_execute(&self) -> bool {
        matches!(self, Mode::Execute(_))
    }

    pub fn event(&self) -> Option<&Event> {
        match self {
            Mode::Execute(e) => Some(e),
            Mode::Validate => None,
        }
    }
}

// ── Pass-local state ──────────────────────────────────────────────────────

/// Lexical scope flags for one `on` clause: which `$this_*` pseudo-values
/// the event clause has made visible to its action body.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PassState {
    pub topic_bound: bool,
    pub gpio_bound: bool,
    pub http_bound: bool,
}

/// How an expression evaluation may touch the outside world.
#[derive(Clone, Copy)]
pub(crate) struct EvalEnv<'e> {
    /// Collaborator reads are live; unbound variables are errors.
    pub live: bool,
    /// The event a matched, executing clause resolves `$this_*` from.
    pub ctx: Option<&'e Event>,
}

// ── Interpreter ───────────────────────────────────────────────────────────

/// The script engine: tokenized script plus all runtime state.
#[derive(Debug)]
pub struct Interpreter {
    pub(crate) script: Script,
    /// Decoded `#HEX` literals, keyed by token index.  Populated during the
    /// syntax-check pass; token storage itself is never mutated.
    pub(crate) literals: HashMap<usize, Vec<u8>>,
    pub(crate) limits: Limits,
    pub(crate) vars: VarStore,
    pub(crate) flash: FlashCache,
    pub timers: TimerTable,
    pub alarms: AlarmTable,
    pub watches: GpioWatchTable,
    pub(crate) pwm: PwmTable,
    pub(crate) services: Services,
    enabled: bool,
    avg_pass_micros: u64,
}

impl Interpreter {
    pub fn new(source: &str, services: Services) -> Interpreter {
        Interpreter::with_limits(source, Limits::default(), services)
    }

    pub fn with_limits(source: &str, limits: Limits, mut services: Services) -> Interpreter {
        let mut flash = FlashCache::new(limits.flash_slots, limits.flash_slot_len);
        flash.load(&mut *services.storage);
        Interpreter {
            script: Script::tokenize(source),
            literals: HashMap::new(),
            vars: VarStore::new(limits.max_vars, limits.var_name_len),
            flash,
            timers: TimerTable::new(limits.max_timers),
            alarms: AlarmTable::new(limits.max_alarms),
            watches: GpioWatchTable::new(limits.max_gpio_watches),
            pwm: PwmTable::new(limits.max_pwm_channels),
            limits,
            services,
            enabled: false,
            avg_pass_micros: 0,
        }
    }

    /// Validate the whole script.  On success the script is marked runnable;
    /// on failure every later [`Interpreter::dispatch`] is a no-op.
    pub fn syntax_check(&mut self) -> Result<(), SyntaxError> {
        self.run_pass(&Mode::Validate)?;
        self.enabled = true;
        Ok(())
    }

    /// Whether the script passed its syntax check.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Run one live pass for `event`.  A no-op unless the script is enabled.
    ///
    /// An error aborts the remainder of the pass; side effects already
    /// executed stay in effect, and the next external trigger dispatches
    /// normally.
    pub fn dispatch(&mut self, event: Event) -> Result<(), SyntaxError> {
        if !self.enabled {
            return Ok(());
        }
        let start = Instant::now();
        let result = self.run_pass(&Mode::Execute(event));
        let sample = start.elapsed().as_micros() as u64;
        // Rolling average, weight 7/8 old + 1/8 new.  Diagnostics only.
        self.avg_pass_micros = self.avg_pass_micros - self.avg_pass_micros / 8 + sample / 8;
        result
    }

    /// Exponentially decayed average pass duration in microseconds.
    pub fn avg_pass_micros(&self) -> u64 {
        self.avg_pass_micros
    }

    // ── Dispatch convenience entries, one per trigger source ──────────────

    pub fn init(&mut self) -> Result<(), SyntaxError> {
        self.dispatch(Event::Init)
    }

    pub fn wifi_connect(&mut self) -> Result<(), SyntaxError> {
        self.dispatch(Event::WifiConnect)
    }

    pub fn mqtt_connect(&mut self) -> Result<(), SyntaxError> {
        self.dispatch(Event::MqttConnect)
    }

    pub fn topic_received(
        &mut self,
        scope: Scope,
        topic: &str,
        data: &[u8],
    ) -> Result<(), SyntaxError> {
        self.dispatch(Event::Topic {
            scope,
            topic: topic.to_owned(),
            data: data.to_vec(),
        })
    }

    pub fn timer_elapsed(&mut self, id: usize) -> Result<(), SyntaxError> {
        self.dispatch(Event::Timer { id })
    }

    pub fn alarm_reached(&mut self, index: usize) -> Result<(), SyntaxError> {
        self.dispatch(Event::Alarm { index })
    }

    pub fn gpio_edge(&mut self, pin: u8, level: bool) -> Result<(), SyntaxError> {
        self.dispatch(Event::GpioInt { pin, level })
    }

    pub fn http_replied(&mut self, code: u16, body: &[u8]) -> Result<(), SyntaxError> {
        self.dispatch(Event::HttpResponse {
            code,
            body: body.to_vec(),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Current value of a named variable, if bound.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Read flash slot `n` (1-based) from the cache.
    pub fn flash_read(&self, n: usize) -> Value {
        self.flash.read(n)
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    // ── Statement driver ──────────────────────────────────────────────────

    /// One complete left-to-right scan of the token stream.
    pub(crate) fn run_pass(&mut self, mode: &Mode) -> Result<(), SyntaxError> {
        let mut i = 0;
        while i < self.script.token_count() {
            if self.script.token_eq(i, "on") {
                let mut st = PassState::default();
                let (next, matched) = self.parse_event(i + 1, mode, &mut st)?;
                if !self.script.token_eq(next, "do") {
                    return Err(self.script.error(next, "'do' expected"));
                }
                let execute = matched && mode.is_execute();
                i = self.parse_actions(next + 1, mode, &st, execute)?;
            } else if self.script.token_eq(i, "config") {
                // Applied by a separate configuration pass; three tokens.
                self.script.need(i + 2)?;
                i += 3;
            } else if mode.is_execute() {
                // Unreachable once validated; a live pass just moves on to
                // the next clause.
                i += 1;
            } else {
                return Err(self.script.error(i, "'on' or 'config' expected"));
            }
        }
        Ok(())
    }

    // ── Shared parsing helpers ────────────────────────────────────────────

    /// Parse token `i` as a 1-based id in `[1, max]`.
    pub(crate) fn parse_index(
        &self,
        i: usize,
        max: usize,
        what: &str,
    ) -> Result<usize, SyntaxError> {
        self.script.need(i)?;
        let bytes = self.script.token_bytes(i);
        if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(self.script.error(i, &format!("{what} number expected")));
        }
        let n = Value::data(bytes.to_vec()).as_int();
        if n < 1 || n as usize > max {
            return Err(self.script.error(i, &format!("{what} number out of range")));
        }
        Ok(n as usize)
    }

    /// Parse token `i` as a GPIO pin number.
    pub(crate) fn parse_pin(&self, i: usize) -> Result<u8, SyntaxError> {
        self.script.need(i)?;
        let bytes = self.script.token_bytes(i);
        if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(self.script.error(i, "gpio pin expected"));
        }
        let n = Value::data(bytes.to_vec()).as_int();
        if n > self.limits.max_gpio_pin as i64 {
            return Err(self.script.error(i, "gpio pin out of range"));
        }
        Ok(n as u8)
    }

    /// Route a live-pass diagnostic to the console collaborator.
    pub(crate) fn diag(&mut self, message: &str) {
        self.services.console.print(message);
    }
}
