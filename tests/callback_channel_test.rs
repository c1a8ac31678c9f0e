//! End-to-end calls over the callback socket.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use wizshell::landing;
use wizshell::tree::LandingPage;
use wizshell::{ActionRegistry, ApiCall, CallbackChannel, ListenerError, RuntimeSession};

/// Sends one call the way a module script would and returns the reply.
async fn call(socket: &Path, raw: &str) -> String {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await.unwrap();
    reply
}

#[tokio::test]
async fn test_session_round_trip_over_socket() {
    let tmp = tempfile::TempDir::new().unwrap();
    let socket = tmp.path().join("cb.sock");
    let session = RuntimeSession::new();
    let registry = ActionRegistry::new();
    registry.add_local(session.handler("disk"));

    let mut channel = CallbackChannel::new(registry);
    channel.start(&socket).unwrap();

    assert_eq!(call(&socket, "session.set::{device}/dev/sda").await, "");
    assert_eq!(call(&socket, "session.set::{:shared}yes").await, "");
    assert_eq!(call(&socket, "session.get::{device}").await, "session.get:/dev/sda\n");
    // Public keys keep their `:` prefix and list first.
    assert_eq!(call(&socket, "SESSION.KEYS::").await, "session.keys::shared,device\n");
    assert_eq!(call(&socket, "session.get::{missing}").await, "");

    channel.stop().unwrap();
    assert!(!socket.exists());
    assert_eq!(session.get("disk", "device").as_deref(), Some("/dev/sda"));
}

#[tokio::test]
async fn test_landing_follows_calls() {
    let tmp = tempfile::TempDir::new().unwrap();
    let socket = tmp.path().join("cb.sock");
    let page = landing::shared(landing::for_page(LandingPage::Progress));
    let registry = ActionRegistry::new();
    registry.add_local(landing::handler(&page));

    let mut channel = CallbackChannel::new(registry);
    channel.start(&socket).unwrap();

    call(&socket, "common.progress.allocate:int:4").await;
    call(&socket, "common.progress.next::").await;
    call(&socket, "common.progress.event::Partitioning").await;
    channel.stop().unwrap();

    assert_eq!(page.lock().unwrap().summary(), "25% Partitioning (0/0 done)");
}

#[tokio::test]
async fn test_restart_after_stop_keeps_globals() {
    let tmp = tempfile::TempDir::new().unwrap();
    let socket = tmp.path().join("cb.sock");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let registry = ActionRegistry::new();
    let log = Arc::clone(&seen);
    registry.add_global(move |c: &ApiCall| -> Option<String> {
        log.lock().unwrap().push(c.class().to_string());
        None
    });
    registry.add_local(|_: &ApiCall| Some("local".to_string()));

    let mut channel = CallbackChannel::new(registry.clone());
    channel.start(&socket).unwrap();
    assert_eq!(call(&socket, "first::x").await, "first:local\n");
    channel.stop().unwrap();

    channel.start(&socket).unwrap();
    assert_eq!(call(&socket, "second::x").await, "");
    channel.stop().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_start_requires_handlers() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut channel = CallbackChannel::new(ActionRegistry::new());
    assert!(matches!(
        channel.start(&tmp.path().join("cb.sock")),
        Err(ListenerError::NoHandlers)
    ));
}
