//! Styled terminal output for operators.
//!
//! Status lines go to stderr so stdout stays machine-readable (JSON for
//! `decide`, `matrix` and run reports).

use anstyle::{AnsiColor, Color, Style};
use std::io::{self, IsTerminal, Write};

const GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))).bold();
const YELLOW: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))).bold();
const CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
const HEADER: Style = Style::new().bold().underline();
const DIM: Style = Style::new().dimmed();

/// Writes progress, warnings and results with optional colors.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    color: bool,
}

impl OutputManager {
    /// Colors are enabled when stderr is a terminal and `NO_COLOR` is unset
    pub fn new(verbose: bool, quiet: bool) -> Self {
        let color = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            verbose,
            quiet,
            color,
        }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            format!("{}{}{}", style.render(), text, style.render_reset())
        } else {
            text.to_string()
        }
    }

    fn status(&self, symbol: &str, style: Style, message: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{} {}", self.paint(style, symbol), message)
    }

    /// Progress line
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.status("→", CYAN, message)
    }

    /// Success line
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.status("✓", GREEN, message)
    }

    /// Warning line
    pub fn warn(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.status("⚠", YELLOW, message)
    }

    /// Detail shown only in verbose mode
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "  {}", self.paint(DIM, message))
    }

    /// Section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr)?;
        writeln!(stderr, "{}", self.paint(HEADER, title))
    }

    /// Indented detail line
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "    {message}")
    }

    /// Machine-readable result on stdout, printed regardless of quiet mode
    pub fn data(&self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}")
    }
}
