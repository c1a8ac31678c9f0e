//! Callback channel: the socket a running module reports back through.
//!
//! ```text
//! module ──write+close──► CallbackChannel ──decode──► ActionRegistry
//!                                │                   (global, then local)
//!        ◄──"CLASS:REPLY\n"──────┘
//! ```
//!
//! [`CallbackChannel`] owns the listener; [`ActionRegistry`] owns the
//! handlers. They share the registry, so local handlers registered after
//! [`CallbackChannel::start`] are seen by later connections.

mod registry;
mod server;

pub use registry::{ActionRegistry, CallHandler, Handler};
pub use server::CallbackChannel;
