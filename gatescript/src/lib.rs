//! gatescript — a reactive rule-scripting engine for an IoT gateway.
//!
//! Scripts are flat lists of `on <event> do <actions>` clauses.  The engine
//! tokenizes the script once, validates it with a full parse pass, and then
//! re-walks the same token stream on every external trigger, executing the
//! action bodies of clauses whose event matches.  All I/O goes through the
//! collaborator traits in [`services`]; the engine itself owns no transport,
//! hardware, storage, or clock.
//!
//! The typical embedding:
//!
//! 1. Build a [`services::Services`] bundle for the target platform.
//! 2. Create a [`script::Interpreter`] and call
//!    [`syntax_check`](script::Interpreter::syntax_check); a failing script
//!    never runs.
//! 3. Hand the interpreter to an [`event_loop::Gateway`] and push
//!    [`event_loop::ExternalEvent`]s at it, or drive
//!    [`dispatch`](script::Interpreter::dispatch) directly from a
//!    single-threaded loop of your own.

pub mod alarm;
pub mod cli;
pub mod config;
pub mod event_loop;
pub mod flash;
pub mod gpio;
pub mod limits;
pub mod script;
pub mod services;
pub mod timers;
pub mod topic;
pub mod vars;
