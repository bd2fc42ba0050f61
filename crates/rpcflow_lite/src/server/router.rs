use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use prost::Message;
use tracing::{debug, info, warn};

use crate::call::{CallContext, CancelToken, Pattern};
use crate::channel::{CallListener, IncomingCall, RpcInbound, RpcOutbound};
use crate::error::RpcServerError;
use crate::path::MethodPath;
use crate::server::callmap::CallMap;
use crate::server::config::RpcRouterConfig;
use crate::server::handler::{
    BidiHandler, ClientStreamHandler, ErasedHandler, RequestStream, ServerStreamHandler,
    UnaryHandler,
};
use crate::status::Status;

struct Registration {
    pattern: Pattern,
    handler: Arc<dyn ErasedHandler>,
}

/// The main RPC router: maps method paths to handlers and spawns one
/// stream controller per incoming call.
pub struct RpcRouter {
    handlers: HashMap<String, Registration>,
    calls: Arc<CallMap>,
    config: RpcRouterConfig,
}

impl RpcRouter {
    pub fn new(config: RpcRouterConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            calls: Arc::new(CallMap::new()),
            config,
        }
    }

    /// Register a unary handler: one request in, one response out.
    ///
    /// # Example
    /// ```ignore
    /// router.register_unary("calculator.CalculatorService/Sum", |_ctx, req: SumRequest| async move {
    ///     Ok(SumResponse { result: req.number_1 + req.number_2 })
    /// })?;
    /// ```
    pub fn register_unary<Req, Resp, F, Fut>(
        &mut self,
        path: impl AsRef<str>,
        f: F,
    ) -> Result<(), RpcServerError>
    where
        Req: Message + Default + 'static,
        Resp: Message + 'static,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        self.insert(
            path.as_ref(),
            Pattern::Unary,
            Arc::new(UnaryHandler::new(f)),
        )
    }

    /// Register a server-streaming handler: one request in, a stream of
    /// responses out.
    pub fn register_server_stream<Req, Resp, F, Fut, S>(
        &mut self,
        path: impl AsRef<str>,
        f: F,
    ) -> Result<(), RpcServerError>
    where
        Req: Message + Default + 'static,
        Resp: Message + 'static,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        self.insert(
            path.as_ref(),
            Pattern::ServerStream,
            Arc::new(ServerStreamHandler::new(f)),
        )
    }

    /// Register a client-streaming handler: a stream of requests in, one
    /// response out once the caller half-closes.
    pub fn register_client_stream<Req, Resp, F, Fut>(
        &mut self,
        path: impl AsRef<str>,
        f: F,
    ) -> Result<(), RpcServerError>
    where
        Req: Message + Default + 'static,
        Resp: Message + 'static,
        F: Fn(CallContext, RequestStream<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        self.insert(
            path.as_ref(),
            Pattern::ClientStream,
            Arc::new(ClientStreamHandler::new(f)),
        )
    }

    /// Register a bidi-streaming handler: requests and responses stream
    /// independently.
    pub fn register_bidi<Req, Resp, F, Fut, S>(
        &mut self,
        path: impl AsRef<str>,
        f: F,
    ) -> Result<(), RpcServerError>
    where
        Req: Message + Default + 'static,
        Resp: Message + 'static,
        F: Fn(CallContext, RequestStream<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        self.insert(
            path.as_ref(),
            Pattern::BidiStream,
            Arc::new(BidiHandler::new(f)),
        )
    }

    fn insert(
        &mut self,
        path: &str,
        pattern: Pattern,
        handler: Arc<dyn ErasedHandler>,
    ) -> Result<(), RpcServerError> {
        let path = MethodPath::parse(path)?.full_path();
        if self.handlers.contains_key(&path) {
            return Err(RpcServerError::DuplicateHandler(path));
        }
        info!(path = %path, pattern = %pattern, "registered rpc handler");
        self.handlers.insert(path, Registration { pattern, handler });
        Ok(())
    }

    /// Run the router, dispatching calls until every connector is gone.
    /// Call tasks continue to run independently.
    pub async fn run(self, mut listener: CallListener) {
        info!(handlers = self.handlers.len(), "rpc router started");

        while let Some(incoming) = listener.accept().await {
            let path = incoming.header().path.clone();
            if let Err(err) = self.dispatch(incoming).await {
                warn!(path = %path, error = %err, "failed to dispatch call");
            }
        }

        info!("link closed, router shutting down");
    }

    async fn dispatch(&self, incoming: IncomingCall) -> Result<(), RpcServerError> {
        let IncomingCall {
            mut header,
            requests,
            responses,
        } = incoming;
        let outbound = RpcOutbound::new(responses);

        let Some(registration) = self.handlers.get(&header.path) else {
            let status = Status::unknown(format!("no handler registered for '{}'", header.path));
            let _ = outbound.send_status(status).await;
            return Err(RpcServerError::NoHandler(header.path));
        };

        if header.deadline.is_none() {
            header.deadline = self.config.default_deadline;
        }

        let guard = self.calls.try_create(header.id, &header.path)?;
        let cancel = CancelToken::new();
        let inbound = RpcInbound::new(requests, cancel.clone());

        debug!(
            call_id = %header.id,
            path = %header.path,
            pattern = %registration.pattern,
            "dispatching call"
        );

        let ctx = CallContext::new(header, cancel);
        registration
            .handler
            .spawn(ctx, inbound, outbound, guard, self.config.feed_buffer);
        Ok(())
    }

    /// Number of calls currently being driven.
    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Check if a handler is registered for the given path.
    pub fn has_handler(&self, path: &str) -> bool {
        self.handlers.contains_key(path)
    }

    /// The pattern a path was registered with, if any.
    pub fn pattern_of(&self, path: &str) -> Option<Pattern> {
        self.handlers.get(path).map(|r| r.pattern)
    }
}
