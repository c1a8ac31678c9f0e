//! Application-wide constants for wizshell.
//!
//! Constants are grouped by domain:
//!
//! - **Content**: file names and reserved identifiers of the module tree
//! - **Labels**: user-facing menu labels
//! - **Socket**: callback listener limits and deadlines

use std::time::Duration;

// ============================================================================
// Content
// ============================================================================

/// Name of the declaration file in the content root and in every module directory.
pub const INIT_CONF: &str = "init.conf";

/// Identifier of the synthetic terminal entry appended to the top level.
pub const EXIT_ID: &str = "exit";

/// Application name used for config lookup and default paths.
pub const APP_NAME: &str = "wizshell";

// ============================================================================
// Labels
// ============================================================================

/// Title of the synthetic exit entry.
pub const LABEL_EXIT: &str = "Exit ▹▹▶";

// ============================================================================
// Socket
// ============================================================================

/// Maximum Unix socket path length.
///
/// `sun_path` is 104 bytes on macOS and 108 on Linux; the conservative
/// limit is used everywhere.
pub const MAX_SOCKET_PATH: usize = 104;

/// Default deadline for reading one request from a callback connection.
///
/// The protocol frames a request by EOF; a client that never closes its
/// write side would otherwise pin a task forever.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single callback request.
pub const MAX_REQUEST_SIZE: u64 = 16 * 1024 * 1024;
