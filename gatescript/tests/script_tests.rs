//! End-to-end tests: whole scripts through the public API, with recording
//! collaborators standing in for the transports and hardware.

use std::path::Path;
use std::sync::{Arc, Mutex};

use gatescript::script::{Interpreter, SyntaxError};
use gatescript::services::{
    Console, GpioPort, PubSub, Pull, Scope, Services, Storage,
};

// ── Recording collaborators ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Publish(Scope, String, Vec<u8>, bool),
    Subscribe(Scope, String),
    Unsubscribe(Scope, String),
    Print(String),
    System(String),
    GpioWrite(u8, bool),
    Pwm(u8, u32),
}

#[derive(Default, Clone)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    retained: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    gpio_levels: Arc<Mutex<Vec<(u8, bool)>>>,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PubSub for Recorder {
    fn publish(&mut self, scope: Scope, topic: &str, payload: &[u8], retained: bool) {
        if retained {
            self.retained
                .lock()
                .unwrap()
                .push((topic.to_owned(), payload.to_vec()));
        }
        self.push(Call::Publish(scope, topic.to_owned(), payload.to_vec(), retained));
    }
    fn subscribe(&mut self, scope: Scope, topic: &str) {
        self.push(Call::Subscribe(scope, topic.to_owned()));
    }
    fn unsubscribe(&mut self, scope: Scope, topic: &str) {
        self.push(Call::Unsubscribe(scope, topic.to_owned()));
    }
    fn retained(&mut self, topic: &str) -> Option<Vec<u8>> {
        self.retained
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
    }
}

impl Console for Recorder {
    fn print(&mut self, text: &str) {
        self.push(Call::Print(text.to_owned()));
    }
    fn run_command(&mut self, cmd: &str) {
        self.push(Call::System(cmd.to_owned()));
    }
}

impl GpioPort for Recorder {
    fn set_input(&mut self, _: u8, _: Pull) {}
    fn set_output(&mut self, _: u8) {}
    fn read(&mut self, pin: u8) -> bool {
        self.gpio_levels
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, l)| *l)
            .unwrap_or(false)
    }
    fn write(&mut self, pin: u8, level: bool) {
        self.push(Call::GpioWrite(pin, level));
    }
    fn register_interrupt(&mut self, _: u8, _: Pull, _: u64) {}
    fn set_pwm_duty(&mut self, pin: u8, duty: u32) {
        self.push(Call::Pwm(pin, duty));
    }
}

/// Storage shared between interpreter instances, like device flash surviving
/// a reboot.
#[derive(Default, Clone)]
struct SharedStorage {
    blob: Arc<Mutex<Vec<u8>>>,
}

impl Storage for SharedStorage {
    fn load_flash(&mut self, len: usize) -> Vec<u8> {
        let mut blob = self.blob.lock().unwrap().clone();
        blob.resize(len, 0);
        blob
    }
    fn save_flash(&mut self, blob: &[u8]) -> bool {
        *self.blob.lock().unwrap() = blob.to_vec();
        true
    }
}

fn interp_with(src: &str, rec: &Recorder) -> Result<Interpreter, SyntaxError> {
    let mut services = Services::null();
    services.pubsub = Box::new(rec.clone());
    services.console = Box::new(rec.clone());
    services.gpio = Box::new(rec.clone());
    let mut ip = Interpreter::new(src, services);
    ip.syntax_check()?;
    Ok(ip)
}

fn checked(src: &str) -> (Interpreter, Recorder) {
    let rec = Recorder::default();
    let ip = interp_with(src, &rec).expect("script should validate");
    (ip, rec)
}

// ── Sample scripts ────────────────────────────────────────────────────────

#[test]
fn all_sample_scripts_validate() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts");
    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot open {}: {e}", dir.display()))
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "gs"))
        .collect();
    entries.sort_by_key(|e| e.path());
    assert!(!entries.is_empty(), "no .gs files in {}", dir.display());

    for entry in entries {
        let path = entry.path();
        let src = std::fs::read_to_string(&path).unwrap();
        let rec = Recorder::default();
        if let Err(e) = interp_with(&src, &rec) {
            panic!("{}: {e}", path.display());
        }
    }
}

// ── Topic matching through dispatch ───────────────────────────────────────

#[test]
fn local_wildcard_clause_publishes_exactly_once() {
    let (mut ip, rec) = checked(
        "on topic local \"/a/#\" do publish remote /seen $this_topic",
    );
    ip.topic_received(Scope::Local, "/a/b/c", b"x").unwrap();
    assert_eq!(
        rec.calls(),
        vec![Call::Publish(
            Scope::Remote,
            "/seen".to_owned(),
            b"/a/b/c".to_vec(),
            false
        )]
    );
}

#[test]
fn scope_must_match_for_topic_clauses() {
    let (mut ip, rec) = checked("on topic local \"/a/#\" do println hit");
    ip.topic_received(Scope::Remote, "/a/b", b"").unwrap();
    assert!(rec.calls().is_empty());
    ip.topic_received(Scope::Local, "/other", b"").unwrap();
    assert!(rec.calls().is_empty());
    ip.topic_received(Scope::Local, "/a", b"").unwrap();
    assert_eq!(rec.calls(), vec![Call::Print("hit\n".to_owned())]);
}

#[test]
fn missing_topic_pattern_is_a_load_error() {
    let rec = Recorder::default();
    let e = interp_with("on topic remote do print x", &rec).unwrap_err();
    // The pattern expression consumes the `do` token, so the error is
    // reported one token later, at the first action keyword.
    assert_eq!(e.message, "'do' expected");
    assert_eq!(e.near, 4);
    assert_eq!(e.context, "print x");
}

#[test]
fn this_data_flows_into_expressions() {
    let (mut ip, rec) = checked(
        "on topic local /n do publish local /double $this_data * 2",
    );
    ip.topic_received(Scope::Local, "/n", b"21").unwrap();
    assert_eq!(
        rec.calls(),
        vec![Call::Publish(Scope::Local, "/double".to_owned(), b"42".to_vec(), false)]
    );
}

// ── Payload handling ──────────────────────────────────────────────────────

#[test]
fn hex_literal_publishes_raw_bytes() {
    let (mut ip, rec) = checked("on init do publish remote /bin #DEADBEEF");
    ip.init().unwrap();
    assert_eq!(
        rec.calls(),
        vec![Call::Publish(
            Scope::Remote,
            "/bin".to_owned(),
            vec![0xDE, 0xAD, 0xBE, 0xEF],
            false
        )]
    );
}

#[test]
fn retained_topic_reads_back_retained_payload() {
    let (mut ip, rec) = checked(
        "on init do publish remote /cfg 42 retained \
         on topic local /ask do publish local /answer retained_topic(/cfg)",
    );
    ip.init().unwrap();
    ip.topic_received(Scope::Local, "/ask", b"").unwrap();
    assert_eq!(
        rec.calls()[1],
        Call::Publish(Scope::Local, "/answer".to_owned(), b"42".to_vec(), false)
    );
}

// ── Timers, alarms, gpio ──────────────────────────────────────────────────

#[test]
fn timer_ids_are_one_based_in_scripts() {
    let (mut ip, rec) = checked("on timer 3 do println three");
    ip.timer_elapsed(0).unwrap();
    ip.timer_elapsed(2).unwrap(); // script timer 3
    assert_eq!(rec.calls(), vec![Call::Print("three\n".to_owned())]);
}

#[test]
fn gpio_event_carries_settled_level() {
    let (mut ip, rec) = checked(
        "on gpio_interrupt 4 nopullup do publish local /btn $this_gpio",
    );
    ip.gpio_edge(4, true).unwrap();
    ip.gpio_edge(9, true).unwrap(); // unwatched pin, no clause matches
    assert_eq!(
        rec.calls(),
        vec![Call::Publish(Scope::Local, "/btn".to_owned(), b"1".to_vec(), false)]
    );
}

#[test]
fn pwm_duty_from_expression() {
    let (mut ip, rec) = checked("on topic local /dim do gpio_pwm 12 $this_data * 4");
    ip.topic_received(Scope::Local, "/dim", b"100").unwrap();
    assert_eq!(rec.calls(), vec![Call::Pwm(12, 400)]);
}

// ── Flash persistence ─────────────────────────────────────────────────────

#[test]
fn flash_slot_survives_interpreter_restart() {
    let storage = SharedStorage::default();
    let src = "on topic local /save do setvar @2 = $this_data \
               on topic local /load do publish local /value @2";

    let mut services = Services::null();
    services.storage = Box::new(storage.clone());
    let mut ip = Interpreter::new(src, services);
    ip.syntax_check().unwrap();
    ip.topic_received(Scope::Local, "/save", b"state-17").unwrap();

    // New interpreter over the same backing store.
    let rec = Recorder::default();
    let mut services = Services::null();
    services.storage = Box::new(storage);
    services.pubsub = Box::new(rec.clone());
    let mut ip = Interpreter::new(src, services);
    ip.syntax_check().unwrap();
    ip.topic_received(Scope::Local, "/load", b"").unwrap();

    assert_eq!(
        rec.calls(),
        vec![Call::Publish(
            Scope::Local,
            "/value".to_owned(),
            b"state-17".to_vec(),
            false
        )]
    );
}

// ── Control flow and expressions at the script level ──────────────────────

#[test]
fn pipe_separated_assignments() {
    let (mut ip, _) = checked("on init do setvar $x = 3 + 4 | setvar $y = 1");
    ip.init().unwrap();
    assert_eq!(ip.var("x").unwrap().as_text(), "7");
    assert_eq!(ip.var("y").unwrap().as_text(), "1");
}

#[test]
fn chained_subtraction_is_right_associative() {
    let (mut ip, _) = checked("on init do setvar $r = 10 - 4 - 3");
    ip.init().unwrap();
    assert_eq!(ip.var("r").unwrap().as_text(), "9");
}

#[test]
fn state_machine_across_events() {
    let (mut ip, rec) = checked(
        "on init do setvar $armed = 0 \
         on topic local /arm do setvar $armed = 1 \
         on topic local /motion do \
           if $armed then publish remote /alert $this_data endif",
    );
    ip.init().unwrap();
    ip.topic_received(Scope::Local, "/motion", b"hall").unwrap();
    assert!(rec.calls().is_empty()); // disarmed

    ip.topic_received(Scope::Local, "/arm", b"").unwrap();
    ip.topic_received(Scope::Local, "/motion", b"hall").unwrap();
    assert_eq!(
        rec.calls(),
        vec![Call::Publish(Scope::Remote, "/alert".to_owned(), b"hall".to_vec(), false)]
    );
}

#[test]
fn system_action_reaches_console() {
    let (mut ip, rec) = checked("on init do system \"led-ctl on\"");
    ip.init().unwrap();
    assert_eq!(rec.calls(), vec![Call::System("led-ctl on".to_owned())]);
}

#[test]
fn failed_syntax_check_disables_dispatch() {
    let rec = Recorder::default();
    let mut services = Services::null();
    services.console = Box::new(rec.clone());
    let mut ip = Interpreter::new("on init do println", services);
    assert!(ip.syntax_check().is_err());
    ip.init().unwrap(); // no-op, no panic
    assert!(rec.calls().is_empty());
}

#[test]
fn http_response_clause_sees_code_and_body() {
    let (mut ip, rec) = checked(
        "on http_response do \
           if $this_http_code = 200 then \
             publish local /payload $this_http_body \
           else \
             println $this_http_code \
           endif",
    );
    ip.http_replied(200, b"ok-body").unwrap();
    ip.http_replied(503, b"").unwrap();
    assert_eq!(
        rec.calls(),
        vec![
            Call::Publish(Scope::Local, "/payload".to_owned(), b"ok-body".to_vec(), false),
            Call::Print("503\n".to_owned()),
        ]
    );
}
