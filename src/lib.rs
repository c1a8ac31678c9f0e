//! Wizshell - terminal wizard shell for declarative modules.
//!
//! This crate discovers a tree of "modules" (external executables described
//! by `init.conf` declarations), assembles their command lines from form
//! state, launches them, and lets the running module report progress back
//! over a Unix domain socket.
//!
//! # Architecture
//!
//! Bottom-up:
//!
//! - **Tree** - Group/Module/Command/Argument model and the discovery walk
//! - **Conditions** - short-circuiting, cached gate deciding module availability
//! - **Args** - per-form flag/argument store serialized into an argv
//! - **Protocol** - `CLASS:TYPE:PAYLOAD` codec and the class vocabulary
//! - **Channel** - Unix socket listener dispatching through the action registry
//! - **Landing / Session** - page models and the key/value store fed by calls
//! - **Launcher** - setup, command and signal-hook subprocesses
//! - **Shell** - explicitly constructed context tying everything together
//!
//! # Modules
//!
//! - [`tree`] - module discovery and the component hierarchy
//! - [`conditions`] - condition evaluator
//! - [`args`] - argument state and form mutations
//! - [`protocol`] - wire codec
//! - [`channel`] - callback socket server and handler registry
//! - [`landing`] - logger, progress and loader page models
//! - [`session`] - runtime key/value session
//! - [`launcher`] - subprocess invocation
//! - [`config`] - application configuration loading

pub mod args;
pub mod channel;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod env;
pub mod error;
pub mod landing;
pub mod launcher;
pub mod protocol;
pub mod session;
pub mod shell;
pub mod tree;

// Re-export commonly used types
pub use args::{ArgumentState, FormState};
pub use channel::{ActionRegistry, CallbackChannel};
pub use conditions::ConditionEvaluator;
pub use config::AppConfig;
pub use error::{ConditionError, ConfigError, ListenerError};
pub use protocol::{ApiCall, DataType, Route};
pub use session::RuntimeSession;
pub use shell::{RunReport, RunRequest, Shell};
pub use tree::{Component, ConfigTree, Module};
