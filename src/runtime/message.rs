//! Log messages and their severities.

use crate::core::terminal::Color;

/// Severity accepted by `notify`. Unspecified severities are `Debug`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Success,
    #[default]
    Debug,
}

impl Severity {
    /// `(foreground, background)` used for the summary row.
    pub fn colors(self) -> (Color, Color) {
        let foreground = match self {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Info => Color::White,
            Severity::Success => Color::Green,
            Severity::Debug => Color::Gray,
        };
        (foreground, Color::DefaultBackground)
    }
}

/// Text shown by `notify` and by dialogs: a summary plus optional expandable details.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub summary: String,
    pub details: Option<String>,
}

impl ConsoleMessage {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Details, ignoring an empty string.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref().filter(|details| !details.is_empty())
    }
}

impl From<&str> for ConsoleMessage {
    fn from(summary: &str) -> Self {
        Self::new(summary)
    }
}

impl From<String> for ConsoleMessage {
    fn from(summary: String) -> Self {
        Self::new(summary)
    }
}

/// One colored row queued for the log writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub foreground: Color,
    pub background: Color,
}

impl Message {
    pub fn new(text: impl Into<String>, foreground: Color, background: Color) -> Self {
        Self {
            text: text.into(),
            foreground,
            background,
        }
    }

    /// Summary row followed by a details row when details are present.
    pub fn rows_for(message: &ConsoleMessage, severity: Severity) -> Vec<Message> {
        let (foreground, background) = severity.colors();
        let mut rows = vec![Message::new(message.summary.clone(), foreground, background)];
        if let Some(details) = message.details() {
            rows.push(Message::new(details, Color::DarkGray, Color::DefaultBackground));
        }
        rows
    }
}
