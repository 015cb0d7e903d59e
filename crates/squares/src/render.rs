//! Presentation of menus, listings and messages.
//!
//! The renderer turns plain data into display lines. Color is optional and
//! purely cosmetic; the session never looks at what the renderer produces.

use colored::{ColoredString, Colorize};

use crate::square::{Square, SquareFields};

/// Severity of a one-line session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Neutral progress information.
    Info,
    /// A write went through.
    Success,
    /// Nothing changed, but the user should know why.
    Warning,
    /// A request was rejected or a store call failed.
    Error,
}

/// Builds the text the session shows to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    color: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::plain()
    }
}

impl Renderer {
    /// Renderer that emits plain text.
    #[must_use]
    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Renderer that emits ANSI colors.
    #[must_use]
    pub fn colored() -> Self {
        Self { color: true }
    }

    /// Pick plain or colored output.
    #[must_use]
    pub fn with_color(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, style: impl FnOnce(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Startup line.
    #[must_use]
    pub fn banner(&self) -> String {
        self.paint("Starting Square Management Application...", |s| s.bold())
    }

    /// Section header, preceded by a blank line.
    #[must_use]
    pub fn section(&self, title: &str) -> String {
        format!(
            "\n{}",
            self.paint(&format!("===== {title} ====="), |s| s.cyan().bold())
        )
    }

    /// The main menu.
    #[must_use]
    pub fn menu(&self) -> Vec<String> {
        let mut lines = vec![self.section("SQUARE MANAGEMENT MENU")];
        for (key, label) in [
            ("1", "List all squares"),
            ("2", "Add a new square"),
            ("3", "Update a square"),
            ("4", "Delete a square"),
            ("5", "Exit"),
        ] {
            lines.push(format!("{}. {label}", self.paint(key, |s| s.yellow())));
        }
        lines
    }

    /// Listing of every square with its 1-based display index.
    #[must_use]
    pub fn listing(&self, squares: &[Square]) -> Vec<String> {
        let mut lines = vec![self.section("ALL SQUARES")];
        if squares.is_empty() {
            lines.push(self.paint("No squares found in the database.", |s| s.dimmed()));
        } else {
            lines.extend(
                squares
                    .iter()
                    .enumerate()
                    .map(|(i, square)| self.record_line(i + 1, square)),
            );
        }
        lines
    }

    /// One listing entry.
    #[must_use]
    pub fn record_line(&self, index: usize, square: &Square) -> String {
        format!(
            "{} {}, {}",
            self.paint(&format!("[{index}]"), |s| s.yellow()),
            self.summary(&square.fields),
            self.paint(&format!("ID: {}", square.id), |s| s.dimmed())
        )
    }

    /// All five fields on one line.
    #[must_use]
    pub fn summary(&self, fields: &SquareFields) -> String {
        format!(
            "Length: {}, Color: {}, Filled: {}, Text: \"{}\", Text Color: {}",
            fields.length,
            fields.color,
            yes_no(fields.is_filled),
            fields.text,
            fields.text_color
        )
    }

    /// A one-line status message.
    #[must_use]
    pub fn message(&self, level: MessageLevel, text: &str) -> String {
        match level {
            MessageLevel::Info => self.paint(text, |s| s.dimmed()),
            MessageLevel::Success => self.paint(text, |s| s.green()),
            MessageLevel::Warning => self.paint(text, |s| s.yellow()),
            MessageLevel::Error => self.paint(text, |s| s.red()),
        }
    }

    /// Prompt for a new value, showing the value kept on an empty answer.
    #[must_use]
    pub fn prompt_with_current(&self, label: &str, current: &str) -> String {
        format!("{label} ({}): ", self.paint(current, |s| s.cyan()))
    }

    /// Confirmation prompt that echoes the square about to be deleted.
    #[must_use]
    pub fn confirm_delete(&self, fields: &SquareFields) -> String {
        format!(
            "Are you sure you want to delete this square? (yes/no):\n  {}\n  ",
            self.paint(&self.summary(fields), |s| s.bold())
        )
    }
}

/// Lowercase yes/no, as typed at the filled prompt.
#[must_use]
pub fn yes_no_answer(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
