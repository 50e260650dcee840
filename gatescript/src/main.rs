//! Host binary: syntax-check gateway scripts, or run them against loopback
//! collaborators for development.
//!
//! `run` mode wires the interpreter to the host: published messages loop
//! straight back in as local/remote bus traffic (so rules can react to their
//! own publishes), the flash slot table persists to a file with `-F`, and
//! stdin lines of the form `topic payload` are injected as local messages.

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use gatescript::cli::{self, Command};
use gatescript::config::Config;
use gatescript::event_loop::{ExternalEvent, Gateway};
use gatescript::flash::FileStorage;
use gatescript::script::Interpreter;
use gatescript::services::{Console, PubSub, Scope, Services, SystemClock};

// ── Host collaborators ────────────────────────────────────────────────────

struct StdoutConsole;

impl Console for StdoutConsole {
    fn print(&mut self, text: &str) {
        if text.ends_with('\n') {
            print!("{text}");
        } else {
            println!("{text}");
        }
    }

    fn run_command(&mut self, cmd: &str) {
        let _ = std::process::Command::new("sh").arg("-c").arg(cmd).status();
    }
}

/// Shared slot for the gateway's event sender, filled in after the gateway
/// (and with it the channel) exists.
type SenderSlot = Arc<Mutex<Option<UnboundedSender<ExternalEvent>>>>;

/// Loopback transport: prints every publish and re-injects it as a message
/// on the same bus.  Retained payloads are kept per topic.
#[derive(Default)]
struct LoopbackPubSub {
    sender: SenderSlot,
    retained: std::collections::HashMap<String, Vec<u8>>,
}

impl LoopbackPubSub {
    fn new(sender: SenderSlot) -> LoopbackPubSub {
        LoopbackPubSub { sender, ..Default::default() }
    }
}

impl PubSub for LoopbackPubSub {
    fn publish(&mut self, scope: Scope, topic: &str, payload: &[u8], retained: bool) {
        println!(
            "[{}] {} {}",
            scope.name(),
            topic,
            String::from_utf8_lossy(payload)
        );
        if retained {
            self.retained.insert(topic.to_owned(), payload.to_vec());
        }
        if let Some(tx) = self.sender.lock().unwrap().as_ref() {
            let _ = tx.send(ExternalEvent::Message {
                scope,
                topic: topic.to_owned(),
                data: payload.to_vec(),
            });
        }
    }

    fn subscribe(&mut self, scope: Scope, topic: &str) {
        println!("[{}] subscribe {}", scope.name(), topic);
    }

    fn unsubscribe(&mut self, scope: Scope, topic: &str) {
        println!("[{}] unsubscribe {}", scope.name(), topic);
    }

    fn retained(&mut self, topic: &str) -> Option<Vec<u8>> {
        self.retained.get(topic).cloned()
    }
}

// ── Entry ─────────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let command = match cli::parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("gatescript: {e}");
            eprintln!("Usage: gatescript check <script>");
            eprintln!("       gatescript run [-F<flash-file>] <script>");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Check { script } => check(&script),
        Command::Run { script, flash } => run(&script, flash.as_deref()).await,
    }
}

fn load_source(path: &std::path::Path) -> Result<String, ExitCode> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("gatescript: {}: {e}", path.display());
        ExitCode::FAILURE
    })
}

fn check(path: &std::path::Path) -> ExitCode {
    let src = match load_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut interp = Interpreter::new(&src, Services::null());
    if let Err(e) = interp.syntax_check() {
        eprintln!("{}: {e}", path.display());
        return ExitCode::FAILURE;
    }
    let config = Config::from_script(interp.script());
    println!("{}: ok, {} tokens", path.display(), interp.script().token_count());
    for (key, value) in config.iter() {
        println!("  config {key} = {value}");
    }
    ExitCode::SUCCESS
}

async fn run(path: &std::path::Path, flash: Option<&std::path::Path>) -> ExitCode {
    let src = match load_source(path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let sender_slot: SenderSlot = Arc::new(Mutex::new(None));
    let mut services = Services::null();
    services.console = Box::new(StdoutConsole);
    services.pubsub = Box::new(LoopbackPubSub::new(sender_slot.clone()));
    services.clock = Box::new(SystemClock);
    if let Some(file) = flash {
        services.storage = Box::new(FileStorage::new(file));
    }

    let mut interp = Interpreter::new(&src, services);
    if let Err(e) = interp.syntax_check() {
        eprintln!("{}: {e}", path.display());
        return ExitCode::FAILURE;
    }

    let gateway = Gateway::new(interp);
    let tx = gateway.sender();
    *sender_slot.lock().unwrap() = Some(tx.clone());

    // stdin: `topic payload` lines become local bus messages.
    let stdin_tx = tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
            let sent = stdin_tx.send(ExternalEvent::Message {
                scope: Scope::Local,
                topic: topic.to_owned(),
                data: payload.as_bytes().to_vec(),
            });
            if sent.is_err() {
                break;
            }
        }
        let _ = stdin_tx.send(ExternalEvent::Shutdown);
    });

    // The broker link is up from the start on a host build.
    let _ = tx.send(ExternalEvent::WifiUp);
    let _ = tx.send(ExternalEvent::MqttUp);

    gateway.run().await;
    ExitCode::SUCCESS
}
