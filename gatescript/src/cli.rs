//! Command-line argument parsing.
//!
//! Usage:
//!   gatescript check <script>
//!   gatescript run [-F<flash-file>] <script>

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────

/// Parsed command line.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Tokenize and syntax-check the script, then exit.
    Check { script: PathBuf },
    /// Run the script against the host event loop.
    Run {
        script: PathBuf,
        /// Backing file for the flash slot table (`-F<file>`).
        flash: Option<PathBuf>,
    },
}

// ── Parsing ───────────────────────────────────────────────────────────────

/// Parse `std::env::args()` into a [`Command`] or an error message.
pub fn parse_args() -> Result<Command, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<Command, String> {
    let Some(verb) = argv.first() else {
        return Err("expected a command: check or run".to_owned());
    };

    match verb.as_str() {
        "check" => {
            let script = single_script(&argv[1..])?;
            Ok(Command::Check { script })
        }
        "run" => {
            let mut flash = None;
            let mut positional: Vec<String> = Vec::new();
            let mut i = 1;
            while i < argv.len() {
                let arg = argv[i].as_str();
                if let Some(rest) = arg.strip_prefix("-F") {
                    let file = if !rest.is_empty() {
                        rest.to_owned()
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-F requires a file argument".to_owned());
                    };
                    flash = Some(PathBuf::from(file));
                } else if arg.starts_with('-') {
                    return Err(format!("unknown option: {arg}"));
                } else {
                    positional.push(arg.to_owned());
                }
                i += 1;
            }
            let script = single_script(&positional)?;
            Ok(Command::Run { script, flash })
        }
        other => Err(format!("unknown command: {other}")),
    }
}

fn single_script(args: &[impl AsRef<str>]) -> Result<PathBuf, String> {
    match args {
        [one] => Ok(PathBuf::from(one.as_ref())),
        [] => Err("expected a script file".to_owned()),
        more => Err(format!("too many arguments ({})", more.len())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn check_command() {
        let c = parse_argv(&argv(&["check", "rules.gs"])).unwrap();
        assert_eq!(c, Command::Check { script: PathBuf::from("rules.gs") });
    }

    #[test]
    fn run_command() {
        let c = parse_argv(&argv(&["run", "rules.gs"])).unwrap();
        assert_eq!(
            c,
            Command::Run { script: PathBuf::from("rules.gs"), flash: None }
        );
    }

    #[test]
    fn run_with_flash_embedded() {
        let c = parse_argv(&argv(&["run", "-Fstate.bin", "rules.gs"])).unwrap();
        assert_eq!(
            c,
            Command::Run {
                script: PathBuf::from("rules.gs"),
                flash: Some(PathBuf::from("state.bin")),
            }
        );
    }

    #[test]
    fn run_with_flash_separate() {
        let c = parse_argv(&argv(&["run", "-F", "state.bin", "rules.gs"])).unwrap();
        assert!(matches!(c, Command::Run { flash: Some(_), .. }));
    }

    #[test]
    fn missing_verb_and_script() {
        assert!(parse_argv(&argv(&[])).is_err());
        assert!(parse_argv(&argv(&["check"])).is_err());
        assert!(parse_argv(&argv(&["run", "-F"])).is_err());
    }

    #[test]
    fn unknown_verb_and_flag() {
        assert!(parse_argv(&argv(&["frobnicate", "x.gs"])).is_err());
        assert!(parse_argv(&argv(&["run", "-z", "x.gs"])).is_err());
    }

    #[test]
    fn too_many_scripts() {
        assert!(parse_argv(&argv(&["check", "a.gs", "b.gs"])).is_err());
    }
}
