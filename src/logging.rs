use std::fmt::Display;

/// Console output for one invocation. Progress goes to stdout, problems to
/// stderr, and `--quiet` silences both.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    quiet: bool,
}

impl Logger {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn info(&self, msg: impl Display) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    pub fn warn(&self, msg: impl Display) {
        if !self.quiet {
            eprintln!("Warning: {msg}");
        }
    }

    pub fn error(&self, msg: impl Display) {
        if !self.quiet {
            eprintln!("Error: {msg}");
        }
    }

    /// Unprefixed stderr line, for structured diagnostics.
    pub fn diagnostic(&self, line: impl Display) {
        if !self.quiet {
            eprintln!("{line}");
        }
    }
}
