//! Event clause matching.
//!
//! Parses the tokens after `on` and decides whether the clause matches the
//! live trigger.  Validation passes additionally perform the load-time
//! registrations (`gpio_interrupt` arms a watch, with pull config and
//! PWM-conflict checks) and set the lexical scope flags that license the
//! `$this_*` pseudo-values in the action body that follows.

use crate::services::{Pull, Scope};
use crate::topic;
use super::interp::{EvalEnv, Event, Interpreter, Mode, PassState};
use super::token::SyntaxError;

impl Interpreter {
    /// Parse one event clause starting at token `i` (the token after `on`).
    ///
    /// Returns the index of the token after the clause and whether the
    /// clause matches the live trigger (always `false` when validating).
    pub(crate) fn parse_event(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &mut PassState,
    ) -> Result<(usize, bool), SyntaxError> {
        self.script.need(i)?;

        if self.script.token_eq(i, "init") {
            return Ok((i + 1, matches!(mode.event(), Some(Event::Init))));
        }

        if self.script.token_eq(i, "wificonnect") {
            return Ok((i + 1, matches!(mode.event(), Some(Event::WifiConnect))));
        }

        if self.script.token_eq(i, "mqttconnect") {
            return Ok((i + 1, matches!(mode.event(), Some(Event::MqttConnect))));
        }

        if self.script.token_eq(i, "topic") {
            return self.parse_topic_event(i + 1, mode, st);
        }

        if self.script.token_eq(i, "timer") {
            let n = self.parse_index(i + 1, self.limits.max_timers, "timer")?;
            let matched = matches!(mode.event(), Some(Event::Timer { id }) if *id == n - 1);
            return Ok((i + 2, matched));
        }

        if self.script.token_eq(i, "alarm") {
            let n = self.parse_index(i + 1, self.limits.max_alarms, "alarm")?;
            let matched = matches!(mode.event(), Some(Event::Alarm { index }) if *index == n - 1);
            return Ok((i + 2, matched));
        }

        if self.script.token_eq(i, "gpio_interrupt") {
            return self.parse_gpio_event(i + 1, mode, st);
        }

        if self.script.token_eq(i, "http_response") {
            st.http_bound = true;
            return Ok((i + 1, matches!(mode.event(), Some(Event::HttpResponse { .. }))));
        }

        Err(self.script.error(
            i,
            "'init', 'wificonnect', 'mqttconnect', 'topic', 'timer', 'alarm', \
             'gpio_interrupt', or 'http_response' expected",
        ))
    }

    /// `topic (remote|local) <pattern-expr>`
    fn parse_topic_event(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &mut PassState,
    ) -> Result<(usize, bool), SyntaxError> {
        self.script.need(i)?;
        let scope = if self.script.token_eq(i, "remote") {
            Scope::Remote
        } else if self.script.token_eq(i, "local") {
            Scope::Local
        } else {
            return Err(self.script.error(i, "'local' or 'remote' expected"));
        };

        // The action body may use $this_topic/$this_data; the flag is
        // lexical, set whether or not the clause matches.
        st.topic_bound = true;

        // The pattern may be any expression (a variable, a concatenation).
        // It is evaluated with no event context: matching has not been
        // decided yet, so $this_* inside the pattern reads as empty.
        let env = EvalEnv { live: mode.is_execute(), ctx: None };
        let pattern_at = i + 1;
        let (next, pattern) = self.eval_expr(pattern_at, st, env)?;
        let pattern = pattern.as_text().into_owned();

        if matches!(mode, Mode::Validate) && !topic::is_valid_filter(&pattern) && !pattern.is_empty()
        {
            return Err(self.script.error(pattern_at, "invalid topic filter"));
        }

        let matched = match mode.event() {
            Some(Event::Topic { scope: s, topic: live, .. }) => {
                *s == scope && topic::matches(&pattern, live)
            }
            _ => false,
        };
        Ok((next, matched))
    }

    /// `gpio_interrupt <pin> (pullup|nopullup)`
    fn parse_gpio_event(
        &mut self,
        i: usize,
        mode: &Mode,
        st: &mut PassState,
    ) -> Result<(usize, bool), SyntaxError> {
        let pin = self.parse_pin(i)?;
        self.script.need(i + 1)?;
        let pull = if self.script.token_eq(i + 1, "pullup") {
            Pull::Up
        } else if self.script.token_eq(i + 1, "nopullup") {
            Pull::None
        } else {
            return Err(self.script.error(i + 1, "'pullup' or 'nopullup' expected"));
        };

        if matches!(mode, Mode::Validate) {
            // Watch registration happens at load time, not when the clause
            // first matches.
            if self.pwm.contains(pin) {
                return Err(self.script.error(i, "pin already used as pwm output"));
            }
            if self.watches.register(pin, pull).is_err() {
                return Err(self.script.error(i, "too many gpio interrupts"));
            }
            self.services.gpio.set_input(pin, pull);
            self.services
                .gpio
                .register_interrupt(pin, pull, self.limits.debounce_ms);
        }

        st.gpio_bound = true;
        let matched = matches!(mode.event(), Some(Event::GpioInt { pin: p, .. }) if *p == pin);
        Ok((i + 2, matched))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Services;

    fn interp(src: &str) -> Interpreter {
        Interpreter::new(src, Services::null())
    }

    fn checked(src: &str) -> Interpreter {
        let mut ip = interp(src);
        ip.syntax_check().expect("script should validate");
        ip
    }

    #[test]
    fn init_event_matches_only_init() {
        let mut ip = checked("on init do println \"boot\"");
        ip.init().unwrap();
        ip.wifi_connect().unwrap();
        ip.mqtt_connect().unwrap();
    }

    #[test]
    fn unknown_event_is_rejected() {
        let e = interp("on reboot do println x").syntax_check().unwrap_err();
        assert!(e.message.contains("expected"), "{e}");
        assert_eq!(e.near, 1);
    }

    #[test]
    fn topic_requires_scope_keyword() {
        let e = interp("on topic both /a do println x")
            .syntax_check()
            .unwrap_err();
        assert!(e.message.contains("'local' or 'remote'"), "{e}");
    }

    #[test]
    fn timer_number_range_checked_at_load() {
        assert!(interp("on timer 4 do println x").syntax_check().is_ok());
        let e = interp("on timer 5 do println x").syntax_check().unwrap_err();
        assert!(e.message.contains("out of range"), "{e}");
        let e = interp("on timer 0 do println x").syntax_check().unwrap_err();
        assert!(e.message.contains("out of range"), "{e}");
    }

    #[test]
    fn alarm_number_range_checked_at_load() {
        assert!(interp("on alarm 6 do println x").syntax_check().is_ok());
        assert!(interp("on alarm 7 do println x").syntax_check().is_err());
    }

    #[test]
    fn gpio_interrupt_registers_watch_at_load() {
        let ip = checked("on gpio_interrupt 4 pullup do println x");
        assert!(ip.watches.contains(4));
        assert_eq!(ip.watches.pull_of(4), Some(Pull::Up));
    }

    #[test]
    fn gpio_interrupt_needs_pull_keyword() {
        let e = interp("on gpio_interrupt 4 do println x")
            .syntax_check()
            .unwrap_err();
        assert!(e.message.contains("'pullup' or 'nopullup'"), "{e}");
    }

    #[test]
    fn gpio_pwm_conflict_is_a_load_error() {
        let e = interp(
            "on init do gpio_pwm 4 512 \
             on gpio_interrupt 4 nopullup do println x",
        )
        .syntax_check()
        .unwrap_err();
        assert!(e.message.contains("pwm"), "{e}");
    }

    #[test]
    fn invalid_topic_filter_rejected_at_load() {
        let e = interp("on topic local \"/a/#/b\" do println x")
            .syntax_check()
            .unwrap_err();
        assert!(e.message.contains("invalid topic filter"), "{e}");
    }
}
