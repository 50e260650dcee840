//! The gateway rule language.
//!
//! Scripts are lists of `on <event> do <actions>` clauses plus `config`
//! pairs.  There is no AST: the token stream is re-walked on every trigger,
//! with a matched clause's actions executing as they are parsed.
//!
//! # Quick start
//!
//! ```rust
//! use gatescript::script::Interpreter;
//! use gatescript::services::Services;
//!
//! let mut interp = Interpreter::new(
//!     "on init do setvar $greeting = hello | setvar $n = 2 + 3",
//!     Services::null(),
//! );
//! interp.syntax_check().unwrap();
//! interp.init().unwrap();
//! assert_eq!(interp.var("n").unwrap().as_text(), "5");
//! ```

pub mod action;
pub mod event;
pub mod expr;
pub mod interp;
pub mod token;
pub mod value;

// Re-exports for convenience.
pub use interp::{Event, Interpreter, Mode};
pub use token::{Script, SyntaxError};
pub use value::{Kind, Value};
