//! Runtime key/value session shared by modules.
//!
//! Values are scoped by module ID (the module directory name). Keys starting
//! with `:` are public: every module sees and writes the same value.
//!
//! Modules reach the session over the callback socket:
//!
//! ```text
//! session.set::{disk}/dev/sda        # store
//! session.get::{disk}                # reply: session.get:/dev/sda
//! session.keys::                     # reply: session.keys::host,disk
//! session.delete::disk               # key from the call key or the payload
//! session.flush::                    # drop this module's private keys
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::channel::CallHandler;
use crate::protocol::{ApiCall, Route};

/// Prefix marking a key as shared between modules.
pub const PUBLIC_PREFIX: char = ':';

#[derive(Debug, Default)]
struct Store {
    public: BTreeMap<String, String>,
    modules: HashMap<String, BTreeMap<String, String>>,
}

/// Thread-safe session store. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSession {
    store: Arc<RwLock<Store>>,
}

fn is_public(key: &str) -> bool {
    key.starts_with(PUBLIC_PREFIX)
}

impl RuntimeSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value.
    pub fn set(&self, module: &str, key: &str, value: &str) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let slot = if is_public(key) {
            &mut store.public
        } else {
            store.modules.entry(module.to_string()).or_default()
        };
        slot.insert(key.to_string(), value.to_string());
    }

    /// Reads a value.
    pub fn get(&self, module: &str, key: &str) -> Option<String> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        if is_public(key) {
            store.public.get(key).cloned()
        } else {
            store.modules.get(module)?.get(key).cloned()
        }
    }

    /// Keys visible to a module: public keys first, then its own, each sorted.
    pub fn keys(&self, module: &str) -> Vec<String> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        let own = store.modules.get(module).into_iter().flat_map(BTreeMap::keys);
        store.public.keys().chain(own).cloned().collect()
    }

    /// Deletes a value.
    pub fn delete(&self, module: &str, key: &str) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        if is_public(key) {
            store.public.remove(key);
        } else if let Some(own) = store.modules.get_mut(module) {
            own.remove(key);
        }
    }

    /// Drops every private key of a module. Public keys and other modules
    /// are untouched.
    pub fn flush(&self, module: &str) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.modules.remove(module);
    }

    /// Socket handler serving `session.*` calls for one module.
    pub fn handler(&self, module: &str) -> impl CallHandler + 'static {
        let session = self.clone();
        let module = module.to_string();
        move |call: &ApiCall| -> Option<String> { session.handle(&module, call) }
    }

    fn handle(&self, module: &str, call: &ApiCall) -> Option<String> {
        let key = call.key().unwrap_or_default();
        match call.route()? {
            Route::SessionSet if !key.is_empty() => self.set(module, key, call.raw()),
            Route::SessionSet => log::debug!("[Session] set without a key ignored"),
            Route::SessionGet => return self.get(module, key),
            Route::SessionKeys => return Some(self.keys(module).join(",")),
            Route::SessionDelete => {
                let target = if key.is_empty() { call.raw() } else { key };
                self.delete(module, target);
            }
            Route::SessionFlush => self.flush(module),
            _ => {}
        }
        None
    }
}
