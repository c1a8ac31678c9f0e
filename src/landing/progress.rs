//! Progress page, also used for the `list` landing type.
//!
//! Besides explicit `common.progress.*` calls, the page can follow the
//! module's output: once a lookup is set, every matching output line
//! becomes the event text and advances one allocated step.
//!
//! ```text
//! common.progress.allocate:int:3
//! common.lookup.prefix::>>>
//! ```
//!
//! With the lookup above, an output line `>>> Formatting` moves the bar to
//! 33% and shows `Formatting`.

use globset::{Glob, GlobMatcher};
use regex::Regex;

use super::{step_percent, Landing};
use crate::protocol::{ApiCall, Route};

const WELCOME: &str = "Welcome!";

/// How output lines are matched.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Line starts with the prefix; the event is the rest of the line.
    Prefix(String),
    /// Whole line matches a glob.
    Glob(GlobMatcher),
    /// Line matches a regex; the event is the first capture group, if any.
    Regex(Regex),
}

impl Lookup {
    /// Returns the event text for a matching line.
    pub fn matches(&self, line: &str) -> Option<String> {
        match self {
            Self::Prefix(p) => line.strip_prefix(p.as_str()).map(|r| r.trim().to_string()),
            Self::Glob(g) => g.is_match(line).then(|| line.to_string()),
            Self::Regex(re) => re.captures(line).map(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map_or_else(String::new, |m| m.as_str().to_string())
            }),
        }
    }
}

/// One item of the checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Item ID used by `common.list.complete`.
    pub id: String,
    /// Displayed label.
    pub label: String,
    /// Whether the item is done.
    pub done: bool,
}

/// Progress/list page.
#[derive(Debug, Clone)]
pub struct ProgressState {
    title: String,
    event: String,
    info: String,
    percent: i64,
    steps: i64,
    offset: i64,
    lookup: Option<Lookup>,
    checklist: Vec<ChecklistItem>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            title: WELCOME.to_string(),
            event: String::new(),
            info: String::new(),
            percent: 0,
            steps: 0,
            offset: 0,
            lookup: None,
            checklist: Vec::new(),
        }
    }
}

impl ProgressState {
    /// Creates a page in its initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Title text.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current event text.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// General information text.
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Progress in percent.
    pub fn percent(&self) -> i64 {
        self.percent
    }

    /// Checklist in insertion order.
    pub fn checklist(&self) -> &[ChecklistItem] {
        &self.checklist
    }

    fn next(&mut self) {
        self.offset = (self.offset + 1).min(self.steps.max(0));
        self.percent = step_percent(self.offset, self.steps);
    }

    fn set_lookup(&mut self, route: Route, pattern: &str) {
        let lookup = match route {
            Route::LookupPrefix => Ok(Lookup::Prefix(pattern.to_string())),
            Route::LookupGlob => Glob::new(pattern)
                .map(|g| Lookup::Glob(g.compile_matcher()))
                .map_err(|e| e.to_string()),
            _ => Regex::new(pattern).map(Lookup::Regex).map_err(|e| e.to_string()),
        };
        match lookup {
            Ok(l) if !pattern.is_empty() => self.lookup = Some(l),
            Ok(_) => self.lookup = None,
            Err(e) => log::warn!("[Landing] Invalid lookup \"{pattern}\": {e}"),
        }
    }
}

impl Landing for ProgressState {
    fn apply(&mut self, call: &ApiCall) -> bool {
        let Some(route) = call.route() else {
            return false;
        };
        let text = call.as_str();
        match route {
            Route::ProgressEvent => self.event = text.to_string(),
            Route::ProgressAllocate => {
                self.steps = call.as_int();
                self.offset = 0;
            }
            Route::ProgressNext => self.next(),
            Route::ProgressSet => self.percent = call.as_int().clamp(0, 100),
            Route::LookupPrefix | Route::LookupGlob | Route::LookupRegex => {
                self.set_lookup(route, text);
            }
            Route::ListAdd => {
                let id = call.key().unwrap_or(text).to_string();
                self.checklist.push(ChecklistItem {
                    id,
                    label: text.to_string(),
                    done: false,
                });
            }
            Route::ListComplete => {
                let id = call.key().unwrap_or(text);
                let done = call.key().is_none() || call.as_bool();
                if let Some(item) = self.checklist.iter_mut().find(|i| i.id == id) {
                    item.done = done;
                }
            }
            Route::ListReset => self.checklist.iter_mut().for_each(|i| i.done = false),
            Route::InfoAdd => self.info.push_str(text),
            Route::InfoSet => self.info = text.to_string(),
            Route::Title => self.title = text.to_string(),
            Route::Reset => self.reset(),
            _ => return false,
        }
        true
    }

    fn observe_line(&mut self, line: &str) {
        let Some(event) = self.lookup.as_ref().and_then(|l| l.matches(line)) else {
            return;
        };
        self.event = event;
        self.next();
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn summary(&self) -> String {
        let done = self.checklist.iter().filter(|i| i.done).count();
        format!(
            "{}% {} ({done}/{} done)",
            self.percent,
            self.event,
            self.checklist.len()
        )
    }
}
