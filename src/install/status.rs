//! Colored status lines for the installer
//!
//! Progress and warnings go to stdout, fatal errors to stderr.

use std::io::{IsTerminal, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes colored, human-readable status lines
pub struct Reporter {
    enabled: bool,
    stdout_choice: ColorChoice,
    stderr_choice: ColorChoice,
}

impl Reporter {
    /// Reporter for an interactive run; each stream is colored only when it
    /// is a terminal
    pub fn stdout() -> Self {
        Self::for_terminals(
            std::io::stdout().is_terminal(),
            std::io::stderr().is_terminal(),
        )
    }

    fn for_terminals(stdout_tty: bool, stderr_tty: bool) -> Self {
        let choice = |tty| if tty { ColorChoice::Auto } else { ColorChoice::Never };
        Self {
            enabled: true,
            stdout_choice: choice(stdout_tty),
            stderr_choice: choice(stderr_tty),
        }
    }

    /// Reporter that prints nothing (library and test use)
    pub fn silent() -> Self {
        Self {
            enabled: false,
            stdout_choice: ColorChoice::Never,
            stderr_choice: ColorChoice::Never,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn heading(&self, message: &str) {
        self.emit(false, Some(Color::Cyan), true, message);
    }

    pub fn step(&self, message: &str) {
        self.emit(false, Some(Color::Cyan), false, message);
    }

    pub fn detail(&self, message: &str) {
        self.emit(false, None, false, message);
    }

    pub fn success(&self, message: &str) {
        self.emit(false, Some(Color::Green), true, &format!("✓ {message}"));
    }

    pub fn warn(&self, message: &str) {
        self.emit(false, Some(Color::Yellow), false, &format!("⚠ {message}"));
    }

    pub fn error(&self, message: &str) {
        self.emit(true, Some(Color::Red), true, &format!("❌ {message}"));
    }

    fn emit(&self, to_stderr: bool, color: Option<Color>, bold: bool, message: &str) {
        if !self.enabled {
            return;
        }
        let mut stream = if to_stderr {
            StandardStream::stderr(self.stderr_choice)
        } else {
            StandardStream::stdout(self.stdout_choice)
        };
        let _ = stream.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = writeln!(stream, "{message}");
        let _ = stream.reset();
    }
}
