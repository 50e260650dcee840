//! Expression evaluation.
//!
//! There is no operator precedence: `a op b op c` evaluates as
//! `a op (b op c)`, right to left.  A chain stops at the first token that is
//! not a binary operator, or at an operator whose right-hand side would be
//! an action keyword (that operator belongs to the action separator, not the
//! expression).
//!
//! Evaluation is shared between validation and execution.  When the
//! environment is not live, collaborator reads come back as fixed
//! placeholders and unbound variables read as empty, so validation walks
//! every expression without side effects; when live, reads are real and an
//! unbound variable is an error.

use super::interp::{EvalEnv, Interpreter, PassState};
use super::token::SyntaxError;
use super::value::{decode_hex, Value};

/// Binary operators, in token form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Eq,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Gt,
    Gte,
    StrGt,
    StrGte,
}

impl Interpreter {
    /// Evaluate the expression starting at token `i`; returns the index of
    /// the first token after it and the value.
    pub(crate) fn eval_expr(
        &mut self,
        i: usize,
        st: &PassState,
        env: EvalEnv<'_>,
    ) -> Result<(usize, Value), SyntaxError> {
        let (next, lhs) = self.eval_operand(i, st, env)?;
        let Some(op) = self.binary_op(next) else {
            return Ok((next, lhs));
        };
        if self.is_action_boundary(next + 1) {
            // `... | setvar ...`: the operator separates actions.
            return Ok((next, lhs));
        }
        let (rest, rhs) = self.eval_expr(next + 1, st, env)?;
        let value = self.apply_op(op, &lhs, &rhs, env, next)?;
        Ok((rest, value))
    }

    fn binary_op(&self, i: usize) -> Option<BinOp> {
        match self.script.op_at(i) {
            Some(b'=') => return Some(BinOp::Eq),
            Some(b'+') => return Some(BinOp::Add),
            Some(b'-') => return Some(BinOp::Sub),
            Some(b'*') => return Some(BinOp::Mul),
            Some(b'|') => return Some(BinOp::Concat),
            Some(b'>') => return Some(BinOp::Gt),
            _ => {}
        }
        if self.script.token_eq(i, "div") {
            Some(BinOp::Div)
        } else if self.script.token_eq(i, "gte") {
            Some(BinOp::Gte)
        } else if self.script.token_eq(i, "str_gt") {
            Some(BinOp::StrGt)
        } else if self.script.token_eq(i, "str_gte") {
            Some(BinOp::StrGte)
        } else {
            None
        }
    }

    fn apply_op(
        &self,
        op: BinOp,
        lhs: &Value,
        rhs: &Value,
        env: EvalEnv<'_>,
        at: usize,
    ) -> Result<Value, SyntaxError> {
        let value = match op {
            BinOp::Eq => Value::bool(lhs.bytes == rhs.bytes),
            BinOp::Add => Value::int(lhs.as_int().saturating_add(rhs.as_int())),
            BinOp::Sub => Value::int(lhs.as_int().saturating_sub(rhs.as_int())),
            BinOp::Mul => Value::int(lhs.as_int().saturating_mul(rhs.as_int())),
            BinOp::Div => {
                let d = rhs.as_int();
                if d == 0 {
                    if env.live {
                        return Err(self.script.error(at, "division by zero"));
                    }
                    Value::int(0)
                } else {
                    Value::int(lhs.as_int() / d)
                }
            }
            BinOp::Concat => lhs.concat(rhs, self.limits.value_max),
            BinOp::Gt => Value::bool(lhs.as_int() > rhs.as_int()),
            BinOp::Gte => Value::bool(lhs.as_int() >= rhs.as_int()),
            BinOp::StrGt => Value::bool(lhs.bytes > rhs.bytes),
            BinOp::StrGte => Value::bool(lhs.bytes >= rhs.bytes),
        };
        Ok(value)
    }

    /// One operand: `not (...)`, a parenthesized expression, a builtin call,
    /// a literal, or a variable reference.
    fn eval_operand(
        &mut self,
        i: usize,
        st: &PassState,
        env: EvalEnv<'_>,
    ) -> Result<(usize, Value), SyntaxError> {
        self.script.need(i)?;

        if self.script.token_eq(i, "not") {
            self.expect_op(i + 1, b'(')?;
            let (j, inner) = self.eval_expr(i + 2, st, env)?;
            self.expect_op(j, b')')?;
            return Ok((j + 1, Value::bool(!inner.truthy())));
        }

        if self.script.op_at(i) == Some(b'(') {
            let (j, inner) = self.eval_expr(i + 1, st, env)?;
            self.expect_op(j, b')')?;
            return Ok((j + 1, inner));
        }

        if self.script.op_at(i) == Some(b'-') {
            // Unary minus: negate the operand that follows.
            let (j, operand) = self.eval_operand(i + 1, st, env)?;
            return Ok((j, Value::int(operand.as_int().saturating_neg())));
        }

        if self.script.op_at(i).is_some() {
            return Err(self.script.error(i, "value expected"));
        }

        if self.script.token_eq(i, "retained_topic") {
            self.expect_op(i + 1, b'(')?;
            let (j, topic) = self.eval_expr(i + 2, st, env)?;
            self.expect_op(j, b')')?;
            let value = if env.live {
                match self.services.pubsub.retained(&topic.as_text()) {
                    Some(payload) => Value::data(payload),
                    None => Value::str(""),
                }
            } else {
                Value::str("")
            };
            return Ok((j + 1, value));
        }

        if self.script.token_eq(i, "substr") {
            self.expect_op(i + 1, b'(')?;
            let (j, source) = self.eval_expr(i + 2, st, env)?;
            self.expect_op(j, b',')?;
            let (j, from) = self.eval_expr(j + 1, st, env)?;
            self.expect_op(j, b',')?;
            let (j, count) = self.eval_expr(j + 1, st, env)?;
            self.expect_op(j, b')')?;
            return Ok((j + 1, substr(&source, from.as_int(), count.as_int())));
        }

        if self.script.token_eq(i, "gpio_in") {
            self.expect_op(i + 1, b'(')?;
            let pin = self.parse_pin(i + 2)?;
            self.expect_op(i + 3, b')')?;
            let level = env.live && self.services.gpio.read(pin);
            return Ok((i + 4, Value::bool(level)));
        }

        if self.script.token_eq(i, "json_parse") {
            self.expect_op(i + 1, b'(')?;
            let (j, path) = self.eval_expr(i + 2, st, env)?;
            self.expect_op(j, b',')?;
            let (j, json) = self.eval_expr(j + 1, st, env)?;
            self.expect_op(j, b')')?;
            return Ok((j + 1, json_lookup(&path.as_text(), &json.bytes)));
        }

        self.eval_primary(i, st, env)
    }

    /// Literals, pseudo-variables, named variables, flash slots.
    fn eval_primary(
        &mut self,
        i: usize,
        st: &PassState,
        env: EvalEnv<'_>,
    ) -> Result<(usize, Value), SyntaxError> {
        let bytes = self.script.token_bytes(i);

        if bytes.first() == Some(&b'#') {
            let value = self.hex_literal(i)?;
            return Ok((i + 1, value));
        }

        if bytes.first() == Some(&b'@') {
            let n = self.parse_flash_slot(i)?;
            let value = if env.live {
                self.flash.read(n)
            } else {
                Value::str("0")
            };
            return Ok((i + 1, value));
        }

        if bytes.first() == Some(&b'$') {
            return self.eval_dollar(i, st, env);
        }

        // A bare word is a string literal.
        Ok((i + 1, Value::str(self.script.token_str(i).into_owned())))
    }

    fn eval_dollar(
        &mut self,
        i: usize,
        st: &PassState,
        env: EvalEnv<'_>,
    ) -> Result<(usize, Value), SyntaxError> {
        use super::interp::Event;

        let name = self.script.token_str(i).into_owned();
        let value = match name.as_str() {
            "$this_topic" => {
                if !st.topic_bound {
                    return Err(self.script.error(i, "no topic in this event"));
                }
                match env.ctx {
                    Some(Event::Topic { topic, .. }) => Value::str(topic.clone()),
                    _ => Value::str(""),
                }
            }
            "$this_data" => {
                if !st.topic_bound {
                    return Err(self.script.error(i, "no topic in this event"));
                }
                match env.ctx {
                    Some(Event::Topic { data, .. }) => Value::data(data.clone()),
                    _ => Value::data(Vec::new()),
                }
            }
            "$this_gpio" => {
                if !st.gpio_bound {
                    return Err(self.script.error(i, "no gpio level in this event"));
                }
                match env.ctx {
                    Some(Event::GpioInt { level, .. }) => Value::bool(*level),
                    _ => Value::bool(false),
                }
            }
            "$this_http_code" => {
                if !st.http_bound {
                    return Err(self.script.error(i, "no http response in this event"));
                }
                match env.ctx {
                    Some(Event::HttpResponse { code, .. }) => Value::int(*code as i64),
                    _ => Value::int(0),
                }
            }
            "$this_http_body" => {
                if !st.http_bound {
                    return Err(self.script.error(i, "no http response in this event"));
                }
                match env.ctx {
                    Some(Event::HttpResponse { body, .. }) => Value::data(body.clone()),
                    _ => Value::data(Vec::new()),
                }
            }
            "$timestamp" => {
                if env.live {
                    Value::str(self.services.clock.time_string())
                } else {
                    Value::str("99:99:99")
                }
            }
            "$weekday" => {
                if env.live {
                    Value::str(self.services.clock.weekday_string())
                } else {
                    Value::str("xxx")
                }
            }
            "$adc" => {
                if env.live {
                    Value::int(self.services.adc.read_adc())
                } else {
                    Value::int(0)
                }
            }
            "$" => return Err(self.script.error(i, "variable name expected")),
            _ => match self.vars.get(&name[1..]) {
                Some(v) => v.clone(),
                None if env.live => {
                    return Err(self.script.error(i, "unknown variable"));
                }
                None => Value::default(),
            },
        };
        Ok((i + 1, value))
    }

    /// Decode a `#HEX` literal once and cache it by token index; every later
    /// pass reuses the decoded bytes.
    fn hex_literal(&mut self, i: usize) -> Result<Value, SyntaxError> {
        if let Some(bytes) = self.literals.get(&i) {
            return Ok(Value::data(bytes.clone()));
        }
        let digits = self.script.token_bytes(i)[1..].to_vec();
        let Some(decoded) = decode_hex(&digits) else {
            return Err(self.script.error(i, "invalid hex literal"));
        };
        if decoded.len() > self.limits.value_max {
            return Err(self.script.error(i, "binary string too long"));
        }
        let value = Value::data(decoded.clone());
        self.literals.insert(i, decoded);
        Ok(value)
    }

    fn expect_op(&self, i: usize, op: u8) -> Result<(), SyntaxError> {
        if self.script.op_at(i) == Some(op) {
            Ok(())
        } else {
            Err(self.script.error(i, &format!("'{}' expected", op as char)))
        }
    }
}

/// `substr` with byte indexing: a negative `from` counts from the end,
/// clamped to the start.  The operand's kind is preserved.
fn substr(source: &Value, from: i64, count: i64) -> Value {
    let len = source.len() as i64;
    let start = if from < 0 { (len + from).max(0) } else { from.min(len) } as usize;
    let count = count.max(0) as usize;
    let end = (start + count).min(source.len());
    Value {
        bytes: source.bytes[start..end].to_vec(),
        kind: source.kind,
    }
}

/// Look up a dotted path in a JSON document.  Numeric path segments index
/// arrays.  Scalars come back as text, compound values re-serialized, a
/// missing path or unparseable document as empty.
fn json_lookup(path: &str, json: &[u8]) -> Value {
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(json) else {
        return Value::str("");
    };
    let mut cur = &doc;
    for seg in path.split('.').filter(|s| !s.is_empty()) {
        cur = match cur {
            serde_json::Value::Object(map) => match map.get(seg) {
                Some(v) => v,
                None => return Value::str(""),
            },
            serde_json::Value::Array(items) => match seg.parse::<usize>().ok().and_then(|n| items.get(n)) {
                Some(v) => v,
                None => return Value::str(""),
            },
            _ => return Value::str(""),
        };
    }
    match cur {
        serde_json::Value::Null => Value::str(""),
        serde_json::Value::Bool(b) => Value::bool(*b),
        serde_json::Value::Number(n) => Value::str(n.to_string()),
        serde_json::Value::String(s) => Value::str(s.clone()),
        compound => Value::str(serde_json::to_string(compound).unwrap_or_default()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
