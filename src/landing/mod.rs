//! Landing page state fed by routed calls.
//!
//! While a module runs, its calls land on one page model, picked by the
//! module's `landing` type. Rendering is somebody else's job; these models
//! only hold what a renderer would draw.
//!
//! | Page | Classes |
//! |------|---------|
//! | [`LoggerState`] | `logger.*`, plus raw output lines |
//! | [`ProgressState`] | `common.*` (also used by the `list` page) |
//! | [`LoaderState`] | `init.*`, while a form is being prepared |

mod loader;
mod logger;
mod progress;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub use loader::LoaderState;
pub use logger::LoggerState;
pub use progress::{ChecklistItem, Lookup, ProgressState};

use crate::channel::CallHandler;
use crate::protocol::ApiCall;
use crate::tree::LandingPage;

/// A page model updated by calls and by the module's output.
pub trait Landing: fmt::Debug + Send {
    /// Applies a call. Returns `true` if the call was meant for this page.
    fn apply(&mut self, call: &ApiCall) -> bool;

    /// Feeds one line of module output.
    fn observe_line(&mut self, _line: &str) {}

    /// Back to the initial state.
    fn reset(&mut self);

    /// One-line summary for headless display.
    fn summary(&self) -> String;
}

/// Landing page shared between the dispatch tasks and the caller.
pub type SharedLanding = Arc<Mutex<Box<dyn Landing>>>;

/// Creates the page model for a landing type.
pub fn for_page(page: LandingPage) -> Box<dyn Landing> {
    match page {
        LandingPage::Logger => Box::new(LoggerState::new()),
        LandingPage::Progress | LandingPage::List => Box::new(ProgressState::new()),
    }
}

/// Wraps a page model for sharing.
pub fn shared(landing: Box<dyn Landing>) -> SharedLanding {
    Arc::new(Mutex::new(landing))
}

/// Socket handler applying calls to a shared page. Never replies.
pub fn handler(landing: &SharedLanding) -> impl CallHandler + 'static {
    let landing = Arc::clone(landing);
    move |call: &ApiCall| -> Option<String> {
        let mut page = landing.lock().unwrap_or_else(PoisonError::into_inner);
        if page.apply(call) {
            log::debug!("[Landing] {} -> {}", call.class(), page.summary());
        }
        None
    }
}

/// Percentage reached after `offset` of `steps` allocated steps.
pub(crate) fn step_percent(offset: i64, steps: i64) -> i64 {
    if steps <= 0 || offset >= steps {
        100
    } else {
        offset * 100 / steps
    }
}
