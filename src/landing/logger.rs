use super::Landing;
use crate::protocol::{ApiCall, Route};

/// Logger page: a title, a status bar and the module's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerState {
    title: String,
    status: String,
    lines: Vec<String>,
}

impl LoggerState {
    /// Creates an empty logger page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title bar text.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Status bar text.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Output lines collected so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Landing for LoggerState {
    fn apply(&mut self, call: &ApiCall) -> bool {
        match call.route() {
            Some(Route::LoggerStatus) => self.status = call.as_str().to_string(),
            Some(Route::LoggerTitle) => self.title = call.as_str().to_string(),
            _ => return false,
        }
        true
    }

    fn observe_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn summary(&self) -> String {
        format!("[{}] {}", self.title, self.status)
    }
}
