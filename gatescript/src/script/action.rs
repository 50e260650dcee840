//! Action body parsing and execution.
//!
//! [`Interpreter::parse_actions`] walks the actions of one `on` clause.
//! Parsing always happens; side effects happen only when `execute` is set
//! (the clause matched the live event).  `if`/`else` recurse with the
//! branch's effective execute flag, so untaken branches are still parsed.
//!
//! Validation additionally performs the load-time registrations this module
//! owns: `setvar $name` binds a variable slot, `gpio_pwm` claims a PWM
//! channel, so every table-exhaustion case rejects the script before it is
//! marked runnable.

use std::time::{Duration, Instant};

use crate::services::{Pull, Scope};
use crate::topic;
use super::interp::{EvalEnv, Interpreter, Mode, PassState};
use super::token::SyntaxError;
use super::value::Kind;

/// Tokens that end an expression chain: a binary operator followed by one of
/// these starts the next action (or clause) instead of continuing the
/// expression.
const BOUNDARY_WORDS: &[&str] = &[
    "print", "println", "system", "publish", "subscribe", "unsubscribe",
    "if", "then", "else", "endif", "settimer", "setalarm", "setvar",
    "http_get", "http_post", "gpio_pinmode", "gpio_out", "gpio_pwm",
    "on", "config", "do", "retained",
];

impl Interpreter {
    /// `true` if token `i` cannot continue an expression.
    pub(crate) fn is_action_boundary(&self, i: usize) -> bool {
        i >= self.script.token_count()
            || BOUNDARY_WORDS.iter().any(|w| self.script.token_eq(i, w))
    }

    /// Parse actions starting at token `i` until the next clause terminator
    /// (`on`, `config`, `else`, `endif`, or end of text) and return the
    /// terminator's index.  Side effects run only when `execute`.
    pub(crate) fn parse_actions(
        &mut self,
        mut i: usize,
        mode: &Mode,
        st: &PassState,
        execute: bool,
    ) -> Result<usize, SyntaxError> {
        loop {
            if i >= self.script.token_count()
                || self.script.token_eq(i, "on")
                || self.script.token_eq(i, "config")
                || self.script.token_eq(i, "else")
                || self.script.token_eq(i, "endif")
            {
                return Ok(i);
            }
            // A bare `|` separates actions; the expression evaluator has
            // already declined to consume it as an operator here.
            if self.script.op_at(i) == Some(b'|') {
                i += 1;
                continue;
            }
            i = self.parse_action(i, mode, st, execute)?;
        }
    }

    fn parse_action(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &PassState,
        execute: bool,
    ) -> Result<usize, SyntaxError> {
        let env = EvalEnv {
            live: execute,
            ctx: if execute { mode.event() } else { None },
        };

        if self.script.token_eq(i, "print") || self.script.token_eq(i, "println") {
            let newline = self.script.token_eq(i, "println");
            let (next, value) = self.eval_expr(i + 1, st, env)?;
            if execute {
                let mut text = value.as_text().into_owned();
                if newline {
                    text.push('\n');
                }
                self.services.console.print(&text);
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "system") {
            let (next, value) = self.eval_expr(i + 1, st, env)?;
            if execute {
                self.services.console.run_command(&value.as_text());
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "publish") {
            return self.parse_publish(i + 1, mode, st, env, execute);
        }

        if self.script.token_eq(i, "subscribe") || self.script.token_eq(i, "unsubscribe") {
            let unsub = self.script.token_eq(i, "unsubscribe");
            let scope = self.parse_scope(i + 1)?;
            let filter_at = i + 2;
            let (next, filter) = self.eval_expr(filter_at, st, env)?;
            let filter = filter.as_text().into_owned();
            if !mode.is_execute() && !filter.is_empty() && !topic::is_valid_filter(&filter) {
                return Err(self.script.error(filter_at, "invalid topic filter"));
            }
            if execute {
                if unsub {
                    self.services.pubsub.unsubscribe(scope, &filter);
                } else {
                    self.services.pubsub.subscribe(scope, &filter);
                }
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "if") {
            let (next, cond) = self.eval_expr(i + 1, st, env)?;
            if !self.script.token_eq(next, "then") {
                return Err(self.script.error(next, "'then' expected"));
            }
            let taken = cond.truthy();
            let mut j = self.parse_actions(next + 1, mode, st, execute && taken)?;
            if self.script.token_eq(j, "else") {
                j = self.parse_actions(j + 1, mode, st, execute && !taken)?;
            }
            if !self.script.token_eq(j, "endif") {
                return Err(self.script.error(j, "'endif' expected"));
            }
            return Ok(j + 1);
        }

        if self.script.token_eq(i, "settimer") {
            let n = self.parse_index(i + 1, self.limits.max_timers, "timer")?;
            let (next, value) = self.eval_expr(i + 2, st, env)?;
            if execute {
                let ms = value.as_int();
                if ms <= 0 {
                    self.timers.disarm(n - 1);
                } else {
                    self.timers
                        .arm(n - 1, Duration::from_millis(ms as u64), Instant::now());
                }
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "setalarm") {
            let n = self.parse_index(i + 1, self.limits.max_alarms, "alarm")?;
            let (next, value) = self.eval_expr(i + 2, st, env)?;
            if execute {
                if value.as_text() == "0" {
                    self.alarms.clear(n - 1);
                } else if !self.alarms.set(n - 1, &value.bytes) {
                    self.diag(&format!(
                        "setalarm {n}: not a HH:MM:SS time: {}",
                        value.as_text()
                    ));
                }
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "setvar") {
            return self.parse_setvar(i + 1, mode, st, env, execute);
        }

        if self.script.token_eq(i, "http_get") {
            let (next, url) = self.eval_expr(i + 1, st, env)?;
            if execute {
                self.services.http.get(&url.as_text());
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "http_post") {
            let (next, url) = self.eval_expr(i + 1, st, env)?;
            let (next, body) = self.eval_expr(next, st, env)?;
            if execute {
                self.services.http.post(&url.as_text(), &body.bytes);
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "gpio_pinmode") {
            return self.parse_pinmode(i + 1, execute);
        }

        if self.script.token_eq(i, "gpio_out") {
            let pin = self.parse_pin(i + 1)?;
            let (next, value) = self.eval_expr(i + 2, st, env)?;
            if execute {
                self.services.gpio.write(pin, value.truthy());
            }
            return Ok(next);
        }

        if self.script.token_eq(i, "gpio_pwm") {
            let pin = self.parse_pin(i + 1)?;
            if !mode.is_execute() {
                if self.watches.contains(pin) {
                    return Err(self.script.error(i + 1, "pin already used as interrupt input"));
                }
                if self.pwm.register(pin).is_err() {
                    return Err(self.script.error(i + 1, "too many pwm channels"));
                }
            }
            let (next, value) = self.eval_expr(i + 2, st, env)?;
            if execute {
                let duty = value.as_int().max(0) as u32;
                self.services.gpio.set_pwm_duty(pin, duty);
            }
            return Ok(next);
        }

        Err(self.script.error(i, "action command expected"))
    }

    /// `publish (local|remote) <topic-expr> <data-expr> [retained]`
    fn parse_publish(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &PassState,
        env: EvalEnv<'_>,
        execute: bool,
    ) -> Result<usize, SyntaxError> {
        let scope = self.parse_scope(i)?;
        let topic_at = i + 1;
        let (next, topic) = self.eval_expr(topic_at, st, env)?;
        let (mut next, data) = self.eval_expr(next, st, env)?;
        let retained = self.script.token_eq(next, "retained");
        if retained {
            next += 1;
        }

        let topic_text = topic.as_text().into_owned();
        // Publish targets a concrete topic: no wildcards, text only.
        let bad = topic.kind != Kind::Str || topic::has_wildcards(&topic_text);
        if bad && !topic_text.is_empty() {
            if !mode.is_execute() {
                return Err(self.script.error(topic_at, "invalid topic for publish"));
            }
            if execute {
                self.diag(&format!("publish: invalid topic: {topic_text}"));
            }
            return Ok(next);
        }
        if execute {
            self.services
                .pubsub
                .publish(scope, &topic_text, &data.bytes, retained);
        }
        Ok(next)
    }

    /// `setvar ($name|@N) = <expr>`
    fn parse_setvar(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &PassState,
        env: EvalEnv<'_>,
        execute: bool,
    ) -> Result<usize, SyntaxError> {
        self.script.need(i)?;
        if self.script.op_at(i + 1) != Some(b'=') {
            return Err(self.script.error(i + 1, "'=' expected"));
        }
        let target = self.script.token_bytes(i).to_vec();
        let (next, value) = self.eval_expr(i + 2, st, env)?;

        if let Some(name) = target.strip_prefix(b"$") {
            if name.is_empty() {
                return Err(self.script.error(i, "variable name expected"));
            }
            let name = String::from_utf8_lossy(name).into_owned();
            if !mode.is_execute() {
                if let Err(e) = self.vars.bind(&name) {
                    return Err(self.script.error(i, &e.to_string()));
                }
            } else if execute {
                if let Err(e) = self.vars.set(&name, value) {
                    return Err(self.script.error(i, &e.to_string()));
                }
            }
            return Ok(next);
        }

        if target.first() == Some(&b'@') {
            let n = self.parse_flash_slot(i)?;
            if value.len() > self.limits.flash_slot_len {
                if !mode.is_execute() {
                    return Err(self.script.error(i, "value too long for flash slot"));
                }
                if execute {
                    self.diag(&format!("setvar @{n}: value too long, not stored"));
                }
                return Ok(next);
            }
            if execute {
                self.flash.write(n, &value.bytes, &mut *self.services.storage);
            }
            return Ok(next);
        }

        Err(self.script.error(i, "'$var' or '@slot' expected"))
    }

    /// `gpio_pinmode <pin> (input [pullup] | output)`
    fn parse_pinmode(&mut self, i: usize, execute: bool) -> Result<usize, SyntaxError> {
        let pin = self.parse_pin(i)?;
        self.script.need(i + 1)?;
        if self.script.token_eq(i + 1, "output") {
            if execute {
                self.services.gpio.set_output(pin);
            }
            return Ok(i + 2);
        }
        if self.script.token_eq(i + 1, "input") {
            let pullup = self.script.token_eq(i + 2, "pullup");
            if execute {
                let pull = if pullup { Pull::Up } else { Pull::None };
                self.services.gpio.set_input(pin, pull);
            }
            return Ok(if pullup { i + 3 } else { i + 2 });
        }
        Err(self.script.error(i + 1, "'input' or 'output' expected"))
    }

    fn parse_scope(&self, i: usize) -> Result<Scope, SyntaxError> {
        self.script.need(i)?;
        if self.script.token_eq(i, "local") {
            Ok(Scope::Local)
        } else if self.script.token_eq(i, "remote") {
            Ok(Scope::Remote)
        } else {
            Err(self.script.error(i, "'local' or 'remote' expected"))
        }
    }

    /// Parse token `i` as `@N`, a 1-based flash slot reference.
    pub(crate) fn parse_flash_slot(&self, i: usize) -> Result<usize, SyntaxError> {
        let bytes = self.script.token_bytes(i);
        let digits = &bytes[1..]; // caller checked the '@'
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.script.error(i, "flash slot number expected"));
        }
        let n = super::value::Value::data(digits.to_vec()).as_int();
        if n < 1 || n as usize > self.limits.flash_slots {
            return Err(self.script.error(i, "flash slot number out of range"));
        }
        Ok(n as usize)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
