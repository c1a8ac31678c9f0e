use super::{step_percent, Landing};
use crate::protocol::{ApiCall, Route};

const LOADING: &str = "Loading...";

/// Loader shown while a form's setup command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderState {
    status: String,
    percent: i64,
    steps: i64,
    offset: i64,
}

impl Default for LoaderState {
    fn default() -> Self {
        Self {
            status: LOADING.to_string(),
            percent: 0,
            steps: 0,
            offset: 0,
        }
    }
}

impl LoaderState {
    /// Creates a loader in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status text.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Progress in percent.
    pub fn percent(&self) -> i64 {
        self.percent
    }
}

impl Landing for LoaderState {
    fn apply(&mut self, call: &ApiCall) -> bool {
        match call.route() {
            Some(Route::InitProgress) => self.percent = call.as_int().clamp(0, 100),
            Some(Route::InitProgressNext) => {
                self.offset += 1;
                self.percent = step_percent(self.offset, self.steps);
            }
            Some(Route::InitProgressAlloc) => self.steps = call.as_int(),
            Some(Route::InitStatus) => self.status = call.as_str().to_string(),
            Some(Route::InitReset) => self.reset(),
            _ => return false,
        }
        true
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn summary(&self) -> String {
        format!("{}% {}", self.percent, self.status)
    }
}
