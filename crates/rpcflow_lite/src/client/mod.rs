mod config;
mod connection;

pub use config::CallOptions;
pub use connection::{RpcConnection, RpcConnector, RpcReceiver, RpcSender};
