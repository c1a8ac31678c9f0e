//! Error taxonomy for the structural layers.
//!
//! Configuration and condition errors are fatal at startup: a half-built
//! module tree is worse than none. Listener errors are returned to the
//! caller, which decides whether to abort the module activation.
//!
//! Wire decoding never fails and handler failures are not propagated by
//! the dispatch loop, so neither has an error type here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the application config or discovering modules.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The content root or its `init.conf` does not exist.
    #[error("unable to load modules: {} does not exist", .0.display())]
    Missing(PathBuf),

    /// A file could not be read.
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A file is not valid YAML.
    #[error("unable to parse {}: {source}", .path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A declaration is structurally wrong or misses a required field.
    #[error("{0}")]
    Declaration(String),

    /// A condition rule of a module could not be built.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A module declaration failed to load; wraps the inner cause.
    #[error("error loading module {}: {source}", .path.display())]
    Module {
        /// Path of the offending `init.conf`.
        path: PathBuf,
        /// What went wrong.
        source: Box<ConfigError>,
    },

    /// The directory walk itself failed.
    #[error("content walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Declaration`].
    pub(crate) fn declaration(msg: impl Into<String>) -> Self {
        Self::Declaration(msg.into())
    }
}

/// Errors raised while constructing a condition evaluator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// A rule carries no `message` key.
    #[error("condition has no message defined")]
    MissingMessage,

    /// A rule carries only a message and no clause.
    #[error("condition has no clause")]
    NoClause,

    /// A rule carries more than one clause key.
    #[error("condition has more than one clause: {}", .0.join(", "))]
    MultipleClauses(Vec<String>),

    /// The clause key is not recognized.
    #[error("unknown condition clause '{0}'")]
    UnknownClause(String),

    /// The clause has an empty target list.
    #[error("clause '{0}' has no targets")]
    NoTargets(String),

    /// A file clause target is not an absolute path.
    #[error("target path should be always absolute: {0}")]
    RelativeTarget(String),
}

/// Errors raised by the callback channel lifecycle.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// `start` was called while both handler sets are empty.
    #[error("no actions were registered for the callback listener")]
    NoHandlers,

    /// `start` was called while a listener is already bound.
    #[error("callback listener is already running on {}", .0.display())]
    AlreadyRunning(PathBuf),

    /// The socket path exceeds the OS `sun_path` limit.
    #[error("socket path too long ({len} bytes, max {max}): {}", .path.display())]
    PathTooLong {
        /// Offending path.
        path: PathBuf,
        /// Its length in bytes.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// A stale socket file could not be removed.
    #[error("failed to remove stale socket {}: {source}", .path.display())]
    Cleanup {
        /// Socket path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Binding the listener failed.
    #[error("failed to bind socket {}: {source}", .path.display())]
    Bind {
        /// Socket path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}
