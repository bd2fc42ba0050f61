use thiserror::Error;

use crate::call::CallId;

/// Errors that can occur while parsing method paths.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MethodPathError {
    #[error("invalid method path: {0}")]
    Invalid(String),
}

/// Errors that can occur when registering handlers or dispatching calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RpcServerError {
    /// Failed to parse a method path.
    #[error(transparent)]
    Path(#[from] MethodPathError),

    /// A handler is already registered for the given method path.
    #[error("a handler is already registered for '{0}'")]
    DuplicateHandler(String),

    /// No handler registered for the given method path.
    #[error("no handler registered for '{0}'")]
    NoHandler(String),

    /// A call with this id is already being driven.
    #[error("call '{call_id}' is already active")]
    CallAlreadyActive { call_id: CallId },
}

/// Errors that can occur on a call channel after it is established.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// The peer end of the channel is gone.
    #[error("call channel disconnected")]
    Disconnected,

    /// Failed to encode an outbound message.
    #[error("message encode failed")]
    Encode(#[from] prost::EncodeError),
}
