//! Handler registry consulted for every decoded call.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::ApiCall;

/// Consumes a call and may answer it.
///
/// A non-empty reply is written back to the module as `CLASS:REPLY\n`.
pub trait CallHandler: Send + Sync {
    /// Handles one call.
    fn handle(&self, call: &ApiCall) -> Option<String>;
}

impl<F> CallHandler for F
where
    F: Fn(&ApiCall) -> Option<String> + Send + Sync,
{
    fn handle(&self, call: &ApiCall) -> Option<String> {
        self(call)
    }
}

/// Shared handler reference.
pub type Handler = Arc<dyn CallHandler>;

#[derive(Default)]
struct Handlers {
    global: Vec<Handler>,
    local: Vec<Handler>,
}

/// Global and local handler sets behind one lock.
///
/// Global handlers live for the whole process. Local handlers belong to one
/// listener activation and are dropped when it stops. Cloning shares the
/// same sets.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    inner: Arc<Mutex<Handlers>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.lock();
        f.debug_struct("ActionRegistry")
            .field("global", &h.global.len())
            .field("local", &h.local.len())
            .finish()
    }
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Handlers> {
        // A panicking handler never runs under the lock, so the sets stay consistent.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Registers a handler for the process lifetime.
    pub fn add_global(&self, handler: impl CallHandler + 'static) {
        self.lock().global.push(Arc::new(handler));
    }

    /// Registers a handler for the current activation. Safe to call while
    /// a listener is dispatching.
    pub fn add_local(&self, handler: impl CallHandler + 'static) {
        self.lock().local.push(Arc::new(handler));
    }

    /// Drops every local handler.
    pub fn clear_local(&self) {
        self.lock().local.clear();
    }

    /// Returns `true` if no handler of either kind is registered.
    pub fn is_empty(&self) -> bool {
        let h = self.lock();
        h.global.is_empty() && h.local.is_empty()
    }

    /// Number of (global, local) handlers.
    pub fn counts(&self) -> (usize, usize) {
        let h = self.lock();
        (h.global.len(), h.local.len())
    }

    /// Handlers in dispatch order: global first, then local, each in
    /// registration order.
    pub fn snapshot(&self) -> Vec<Handler> {
        let h = self.lock();
        h.global.iter().chain(h.local.iter()).cloned().collect()
    }

    /// Passes the call to every handler and returns the first non-empty reply.
    ///
    /// Handlers run outside the lock, so they may register further handlers.
    pub fn dispatch(&self, call: &ApiCall) -> Option<String> {
        let mut reply = None;
        for handler in self.snapshot() {
            if let Some(r) = handler.handle(call).filter(|r| !r.is_empty()) {
                reply.get_or_insert(r);
            }
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_dispatch_order_global_then_local() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let registry = ActionRegistry::new();

        for (tag, global) in [("l1", false), ("g1", true), ("l2", false), ("g2", true)] {
            let seen = Arc::clone(&seen);
            let h = move |_: &ApiCall| -> Option<String> {
                seen.lock().unwrap().push(tag);
                None
            };
            if global {
                registry.add_global(h);
            } else {
                registry.add_local(h);
            }
        }

        registry.dispatch(&ApiCall::decode(b"x::y"));
        assert_eq!(*seen.lock().unwrap(), vec!["g1", "g2", "l1", "l2"]);
    }

    #[test]
    fn test_first_non_empty_reply_wins() {
        let registry = ActionRegistry::new();
        registry.add_global(|_: &ApiCall| Some(String::new()));
        registry.add_global(|c: &ApiCall| Some(format!("got {}", c.as_str())));
        registry.add_local(|_: &ApiCall| Some("late".to_string()));

        let reply = registry.dispatch(&ApiCall::decode(b"x::v"));
        assert_eq!(reply.as_deref(), Some("got v"));
    }

    #[test]
    fn test_clear_local_keeps_global() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());
        registry.add_global(|_: &ApiCall| -> Option<String> { None });
        registry.add_local(|_: &ApiCall| -> Option<String> { None });
        assert_eq!(registry.counts(), (1, 1));

        registry.clear_local();
        assert_eq!(registry.counts(), (1, 0));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let registry = ActionRegistry::new();
        let inner = registry.clone();
        registry.add_global(move |_: &ApiCall| -> Option<String> {
            inner.add_local(|_: &ApiCall| -> Option<String> { None });
            None
        });
        registry.dispatch(&ApiCall::default());
        assert_eq!(registry.counts(), (1, 1));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = ActionRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let r = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        r.add_local(|_: &ApiCall| -> Option<String> { None });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.counts(), (0, 800));
    }
}
