//! Main async event loop.
//!
//! The interpreter core is single-threaded and run-to-completion; this loop
//! is the serialization point.  External sources (transports, GPIO edge
//! interrupts, HTTP replies) push [`ExternalEvent`]s through one channel,
//! and the single [`Gateway::run`] task interleaves them with the
//! interpreter's own time sources:
//!
//! ```text
//!   ┌─────────────────────────────┐
//!   │  Gateway::run()             │
//!   │  tokio::select! over:       │
//!   │  • rx (external events)     │◄── transports, gpio edges, http
//!   │  • timer/debounce deadline  │
//!   │  • 1 s alarm tick           │
//!   └─────────────────────────────┘
//! ```
//!
//! GPIO edges are debounced here, not in the interpreter: an edge starts a
//! settle delay, further edges during it are dropped, and when the delay
//! expires the pin level is re-sampled and dispatched as the event's level.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::sleep_until;

use crate::script::interp::{Event, Interpreter};
use crate::script::token::SyntaxError;
use crate::services::Scope;

/// An occurrence pushed into the gateway from outside.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalEvent {
    /// Wi-Fi link came up.
    WifiUp,
    /// Uplink broker connection established.
    MqttUp,
    /// A message arrived on one of the buses.
    Message {
        scope: Scope,
        topic: String,
        data: Vec<u8>,
    },
    /// Raw edge interrupt on a watched pin (level not yet settled).
    GpioEdge { pin: u8 },
    /// An HTTP request issued by a script completed.
    HttpReply { code: u16, body: Vec<u8> },
    /// Stop the loop.
    Shutdown,
}

/// The top-level runtime: owns the interpreter and drives it from a single
/// `tokio::select!` loop.
pub struct Gateway {
    interp: Interpreter,
    rx: mpsc::UnboundedReceiver<ExternalEvent>,
    tx: mpsc::UnboundedSender<ExternalEvent>,
    /// Pins waiting out their debounce delay, with the resample deadline.
    settling: Vec<(u8, Instant)>,
    debounce: Duration,
}

impl Gateway {
    /// Wrap a syntax-checked interpreter.  Dispatches are no-ops if the
    /// check was skipped or failed.
    pub fn new(interp: Interpreter) -> Gateway {
        let (tx, rx) = mpsc::unbounded_channel();
        let debounce = Duration::from_millis(interp.limits().debounce_ms);
        Gateway {
            interp,
            rx,
            tx,
            settling: Vec::new(),
            debounce,
        }
    }

    /// A handle for pushing events into the loop.  Clone freely.
    pub fn sender(&self) -> mpsc::UnboundedSender<ExternalEvent> {
        self.tx.clone()
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Dispatch `init`, then run until [`ExternalEvent::Shutdown`] or all
    /// senders drop.  Returns the interpreter so callers can inspect state.
    pub async fn run(mut self) -> Interpreter {
        self.report(Event::Init);

        let mut alarm_tick = tokio::time::interval(Duration::from_secs(1));
        alarm_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let now = Instant::now();
            let deadline = [
                self.interp.timers.next_wakeup(),
                self.settling.iter().map(|&(_, at)| at).min(),
            ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now + Duration::from_secs(3600));

            tokio::select! {
                maybe = self.rx.recv() => {
                    match maybe {
                        None | Some(ExternalEvent::Shutdown) => break,
                        Some(ev) => self.handle_external(ev),
                    }
                }

                _ = sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    self.run_due(Instant::now());
                }

                _ = alarm_tick.tick() => {
                    self.tick_alarms();
                }
            }
        }
        self.interp
    }

    fn handle_external(&mut self, ev: ExternalEvent) {
        match ev {
            ExternalEvent::WifiUp => self.report(Event::WifiConnect),
            ExternalEvent::MqttUp => self.report(Event::MqttConnect),
            ExternalEvent::Message { scope, topic, data } => {
                self.report(Event::Topic { scope, topic, data });
            }
            ExternalEvent::GpioEdge { pin } => {
                // First edge starts the settle delay; repeats during it are
                // noise and are dropped.
                if self.interp.watches.begin_debounce(pin) {
                    self.settling.push((pin, Instant::now() + self.debounce));
                }
            }
            ExternalEvent::HttpReply { code, body } => {
                self.report(Event::HttpResponse { code, body });
            }
            ExternalEvent::Shutdown => {}
        }
    }

    /// Fire everything whose deadline has passed: expired timers, then
    /// settled GPIO pins.
    fn run_due(&mut self, now: Instant) {
        for id in self.interp.timers.take_expired(now) {
            self.report(Event::Timer { id });
        }

        let mut settled: Vec<u8> = Vec::new();
        self.settling.retain(|&(pin, at)| {
            if at <= now {
                settled.push(pin);
                false
            } else {
                true
            }
        });
        for pin in settled {
            let level = self.interp.services_mut().gpio.read(pin);
            self.interp.watches.end_debounce(pin);
            self.report(Event::GpioInt { pin, level });
        }
    }

    /// Once-per-second alarm comparison, skipped until the clock has synced.
    fn tick_alarms(&mut self) {
        if !self.interp.services_mut().clock.synced() {
            return;
        }
        let now = self.interp.services_mut().clock.time_string();
        for index in self.interp.alarms.tick(&now) {
            self.report(Event::Alarm { index });
        }
    }

    /// Dispatch one event; a failed pass is reported and the loop goes on.
    fn report(&mut self, event: Event) {
        if let Err(e) = self.interp.dispatch(event) {
            self.print_error(&e);
        }
    }

    fn print_error(&mut self, e: &SyntaxError) {
        self.interp.services_mut().console.print(&format!("{e}\n"));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::services::{Console, Services};

    #[derive(Default, Clone)]
    struct RecordingConsole {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Console for RecordingConsole {
        fn print(&mut self, text: &str) {
            self.lines.lock().unwrap().push(text.to_owned());
        }
        fn run_command(&mut self, _: &str) {}
    }

    fn gateway(src: &str) -> (Gateway, RecordingConsole) {
        let console = RecordingConsole::default();
        let mut services = Services::null();
        services.console = Box::new(console.clone());
        let mut interp = Interpreter::new(src, services);
        interp.syntax_check().expect("script should validate");
        (Gateway::new(interp), console)
    }

    #[tokio::test(start_paused = true)]
    async fn init_runs_and_timer_fires() {
        let (gw, console) = gateway(
            "on init do println boot settimer 1 100 \
             on timer 1 do println elapsed",
        );
        let tx = gw.sender();
        let task = tokio::spawn(gw.run());

        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(ExternalEvent::Shutdown).unwrap();
        task.await.unwrap();

        assert_eq!(*console.lines.lock().unwrap(), vec!["boot\n", "elapsed\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn message_event_reaches_matching_clause() {
        let (gw, console) = gateway("on topic local \"/door/+\" do println $this_data");
        let tx = gw.sender();
        let task = tokio::spawn(gw.run());

        tx.send(ExternalEvent::Message {
            scope: Scope::Local,
            topic: "/door/front".to_owned(),
            data: b"open".to_vec(),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(ExternalEvent::Shutdown).unwrap();
        task.await.unwrap();

        assert_eq!(*console.lines.lock().unwrap(), vec!["open\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn gpio_edge_is_debounced() {
        let (gw, console) = gateway("on gpio_interrupt 4 pullup do println edge");
        let tx = gw.sender();
        let task = tokio::spawn(gw.run());

        // Three edges in quick succession settle to a single event.
        tx.send(ExternalEvent::GpioEdge { pin: 4 }).unwrap();
        tx.send(ExternalEvent::GpioEdge { pin: 4 }).unwrap();
        tx.send(ExternalEvent::GpioEdge { pin: 4 }).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(ExternalEvent::Shutdown).unwrap();
        task.await.unwrap();

        assert_eq!(*console.lines.lock().unwrap(), vec!["edge\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_error_goes_to_console() {
        let (gw, console) = gateway("on init do println $undefined_name");
        let tx = gw.sender();
        let task = tokio::spawn(gw.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(ExternalEvent::Shutdown).unwrap();
        task.await.unwrap();

        let lines = console.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("unknown variable"), "{lines:?}");
    }
}
