//! Transport-agnostic streaming RPC engine.
//!
//! Demonstrates the four call patterns — unary, server-streaming,
//! client-streaming, and bidirectional streaming — over an in-process
//! duplex link. A [`RpcRouter`] maps method paths to handlers and drives
//! one stream controller per call; an [`RpcConnector`] opens typed calls
//! against it. Every call terminates with a [`Status`] trailer whose code
//! survives a numeric round-trip.

use tokio::sync::mpsc;

pub mod call;
pub mod channel;
pub mod client;
pub mod error;
pub mod path;
pub mod server;
pub mod status;

mod controller;

pub use call::{CallContext, CallHeader, CallId, CancelCause, CancelToken, Pattern};
pub use channel::{CallListener, Frame, IncomingCall, RpcInbound, RpcOutbound};
pub use client::{CallOptions, RpcConnection, RpcConnector, RpcReceiver, RpcSender};
pub use error::{ChannelError, MethodPathError, RpcServerError};
pub use path::MethodPath;
pub use server::{RequestStream, RpcRouter, RpcRouterConfig};
pub use status::{Code, Status};

/// Create an in-process link: a connector for callers and the listener a
/// router accepts calls from. `capacity` bounds the queue of calls waiting
/// to be dispatched.
pub fn local_link(capacity: usize) -> (RpcConnector, CallListener) {
    let (tx, rx) = mpsc::channel(capacity);
    (RpcConnector::new(tx), CallListener::new(rx))
}
