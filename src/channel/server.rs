//! Unix domain socket listener for module callbacks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use super::registry::ActionRegistry;
use crate::constants::{DEFAULT_READ_TIMEOUT, MAX_REQUEST_SIZE, MAX_SOCKET_PATH};
use crate::error::ListenerError;
use crate::protocol::{reply_line, ApiCall};

#[derive(Debug)]
struct Listening {
    socket_path: PathBuf,
    accept_handle: JoinHandle<()>,
}

/// Owns at most one callback listener at a time.
///
/// `Idle -> Listening -> Stopped`, and back to `Listening` on the next
/// [`start`](Self::start). Every connection carries exactly one call: the
/// module writes it and closes its write side.
#[derive(Debug)]
pub struct CallbackChannel {
    registry: ActionRegistry,
    read_timeout: Duration,
    listening: Option<Listening>,
}

impl CallbackChannel {
    /// Creates an idle channel dispatching through `registry`.
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry,
            read_timeout: DEFAULT_READ_TIMEOUT,
            listening: None,
        }
    }

    /// Sets the per-connection read deadline.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Registry the channel dispatches through.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Binds the listener at `socket_path` and spawns the accept loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if no handler is registered, a listener is already running, the
    /// path exceeds the `sun_path` limit, a stale socket cannot be removed or
    /// the bind fails.
    pub fn start(&mut self, socket_path: &Path) -> Result<(), ListenerError> {
        if self.registry.is_empty() {
            return Err(ListenerError::NoHandlers);
        }
        if let Some(l) = &self.listening {
            return Err(ListenerError::AlreadyRunning(l.socket_path.clone()));
        }

        let len = socket_path.as_os_str().len();
        if len >= MAX_SOCKET_PATH {
            return Err(ListenerError::PathTooLong {
                path: socket_path.to_path_buf(),
                len,
                max: MAX_SOCKET_PATH - 1,
            });
        }

        let cleanup = |source| ListenerError::Cleanup {
            path: socket_path.to_path_buf(),
            source,
        };
        let bind = |source| ListenerError::Bind {
            path: socket_path.to_path_buf(),
            source,
        };

        remove_socket(socket_path).map_err(cleanup)?;
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind)?;
        }

        let listener = std::os::unix::net::UnixListener::bind(socket_path).map_err(bind)?;
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .map_err(bind)?;
        }
        listener.set_nonblocking(true).map_err(bind)?;
        let listener = UnixListener::from_std(listener).map_err(bind)?;

        log::info!("[Callback] Listening on {}", socket_path.display());

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.read_timeout,
            socket_path.to_path_buf(),
        ));

        self.listening = Some(Listening {
            socket_path: socket_path.to_path_buf(),
            accept_handle,
        });
        Ok(())
    }

    /// Closes the listener, removes the socket file and drops the local
    /// handlers. Global handlers stay registered. On an idle channel only
    /// the local handlers are dropped, so an activation whose start failed
    /// leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Fails if the socket file cannot be removed; the channel is stopped
    /// regardless.
    pub fn stop(&mut self) -> Result<(), ListenerError> {
        self.registry.clear_local();
        let Some(listening) = self.listening.take() else {
            return Ok(());
        };

        listening.accept_handle.abort();
        log::info!("[Callback] Stopped listening on {}", listening.socket_path.display());

        remove_socket(&listening.socket_path).map_err(|source| ListenerError::Cleanup {
            path: listening.socket_path,
            source,
        })
    }

    /// Returns `true` while a listener is bound.
    pub fn is_running(&self) -> bool {
        self.listening.is_some()
    }

    /// Path of the bound socket, if running.
    pub fn socket_path(&self) -> Option<&Path> {
        self.listening.as_ref().map(|l| l.socket_path.as_path())
    }
}

impl Drop for CallbackChannel {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("[Callback] {e}");
        }
    }
}

/// Removes a socket file; a missing file is fine.
fn remove_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn accept_loop(
    listener: UnixListener,
    registry: ActionRegistry,
    read_timeout: Duration,
    socket_path: PathBuf,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(handle_connection(stream, registry.clone(), read_timeout));
            }
            Err(e) => {
                if !socket_path.exists() {
                    log::info!("[Callback] Socket file removed, stopping accept loop");
                    break;
                }
                log::error!("[Callback] Accept error: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Reads one call until EOF, dispatches it and writes back the reply, if any.
async fn handle_connection(stream: UnixStream, registry: ActionRegistry, read_timeout: Duration) {
    let (reader, mut writer) = stream.into_split();
    let mut buf = Vec::new();

    let read = tokio::time::timeout(
        read_timeout,
        reader.take(MAX_REQUEST_SIZE + 1).read_to_end(&mut buf),
    )
    .await;
    match read {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::debug!("[Callback] Read error: {e}");
            return;
        }
        Err(_) => {
            log::warn!(
                "[Callback] No EOF within {}s, dropping connection",
                read_timeout.as_secs()
            );
            return;
        }
    }

    if buf.len() as u64 > MAX_REQUEST_SIZE {
        log::warn!(
            "[Callback] Request exceeds {MAX_REQUEST_SIZE} bytes, dropping connection"
        );
        return;
    }

    let call = ApiCall::decode(&buf);
    if call.route().is_none() {
        log::debug!("[Callback] Unrouted call class \"{}\"", call.class());
    }

    let Some(reply) = registry.dispatch(&call) else {
        return;
    };
    let line = reply_line(call.class(), &reply);
    if let Err(e) = writer.write_all(line.as_bytes()).await {
        log::debug!("[Callback] Failed to write reply: {e}");
        return;
    }
    if let Err(e) = writer.shutdown().await {
        log::debug!("[Callback] Failed to close connection: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_start_without_handlers_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut channel = CallbackChannel::new(ActionRegistry::new());
        let err = channel.start(&tmp.path().join("x.sock")).unwrap_err();
        assert!(matches!(err, ListenerError::NoHandlers));
        assert!(!channel.is_running());
    }

    #[tokio::test]
    async fn test_path_too_long() {
        let registry = ActionRegistry::new();
        registry.add_global(|_: &ApiCall| -> Option<String> { None });
        let mut channel = CallbackChannel::new(registry);
        let long = PathBuf::from(format!("/tmp/{}.sock", "a".repeat(120)));
        assert!(matches!(
            channel.start(&long).unwrap_err(),
            ListenerError::PathTooLong { .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_start_still_drops_locals_on_stop() {
        let registry = ActionRegistry::new();
        registry.add_global(|_: &ApiCall| -> Option<String> { None });
        registry.add_local(|_: &ApiCall| -> Option<String> { None });
        let mut channel = CallbackChannel::new(registry.clone());

        let long = PathBuf::from(format!("/tmp/{}.sock", "a".repeat(120)));
        assert!(channel.start(&long).is_err());
        channel.stop().unwrap();
        assert_eq!(registry.counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_lifecycle_and_stale_cleanup() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cb.sock");
        std::fs::write(&path, "stale").unwrap();

        let registry = ActionRegistry::new();
        registry.add_global(|_: &ApiCall| -> Option<String> { None });
        registry.add_local(|_: &ApiCall| -> Option<String> { None });
        let mut channel = CallbackChannel::new(registry.clone());

        channel.start(&path).unwrap();
        assert!(channel.is_running());
        assert!(matches!(
            channel.start(&path).unwrap_err(),
            ListenerError::AlreadyRunning(_)
        ));

        channel.stop().unwrap();
        assert!(!channel.is_running());
        assert!(!path.exists());
        assert_eq!(registry.counts(), (1, 0));
        channel.stop().unwrap();
    }

    #[tokio::test]
    async fn test_silent_client_times_out() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cb.sock");
        let calls = Arc::new(Mutex::new(0usize));

        let registry = ActionRegistry::new();
        let counter = Arc::clone(&calls);
        registry.add_global(move |_: &ApiCall| -> Option<String> {
            *counter.lock().unwrap() += 1;
            None
        });
        let mut channel =
            CallbackChannel::new(registry).with_read_timeout(Duration::from_millis(100));
        channel.start(&path).unwrap();

        // Connect but never close the write side.
        let _stream = UnixStream::connect(&path).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*calls.lock().unwrap(), 0);

        channel.stop().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_request_is_dropped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cb.sock");
        let calls = Arc::new(Mutex::new(0usize));

        let registry = ActionRegistry::new();
        let counter = Arc::clone(&calls);
        registry.add_global(move |_: &ApiCall| -> Option<String> {
            *counter.lock().unwrap() += 1;
            Some("ok".to_string())
        });
        let mut channel = CallbackChannel::new(registry);
        channel.start(&path).unwrap();

        let mut payload = b"field.set.by-label::{Target}".to_vec();
        payload.resize(payload.len() + MAX_REQUEST_SIZE as usize, b'x');

        let mut stream = UnixStream::connect(&path).await.unwrap();
        // The listener may hang up before the tail is written.
        let _ = stream.write_all(&payload).await;
        let _ = stream.shutdown().await;
        let mut reply = Vec::new();
        let _ = stream.read_to_end(&mut reply).await;

        assert!(reply.is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);
        channel.stop().unwrap();
    }
}
