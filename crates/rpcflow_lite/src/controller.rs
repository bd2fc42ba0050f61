//! Per-call drive logic: one controller owns a call's channel ends, walks
//! each direction through `Open -> HalfClosed -> Closed`, and produces the
//! terminal status trailer.

use futures::StreamExt;
use futures::stream::BoxStream;
use prost::Message;
use tokio::sync::mpsc;

use crate::call::{CallContext, DeadlineGuard};
use crate::channel::{RpcInbound, RpcOutbound};
use crate::server::handler::{BidiFn, ClientStreamFn, RequestStream, ServerStreamFn, UnaryFn};
use crate::status::Status;

/// State of one direction of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectionState {
    Open,
    HalfClosed,
    Closed,
}

impl DirectionState {
    /// Sender-side end-of-stream: explicit close-send, or the pattern's
    /// fixed cardinality reached.
    fn half_close(&mut self) {
        if matches!(self, DirectionState::Open) {
            *self = DirectionState::HalfClosed;
        }
    }

    /// End-of-stream acknowledged, or an error terminated the call.
    fn close(&mut self) {
        *self = DirectionState::Closed;
    }

    pub(crate) fn is_closed(self) -> bool {
        matches!(self, DirectionState::Closed)
    }
}

/// Both directions of a call. The call is terminal once both are closed.
#[derive(Debug)]
pub(crate) struct StreamState {
    request: DirectionState,
    response: DirectionState,
}

impl StreamState {
    fn new() -> Self {
        Self {
            request: DirectionState::Open,
            response: DirectionState::Open,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.request.is_closed() && self.response.is_closed()
    }
}

/// Drives the message exchange for one call according to its pattern.
pub(crate) struct StreamController {
    ctx: CallContext,
    inbound: Option<RpcInbound>,
    outbound: RpcOutbound,
    state: StreamState,
    feed_buffer: usize,
    _deadline: DeadlineGuard,
}

impl StreamController {
    pub(crate) fn new(
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        feed_buffer: usize,
    ) -> Self {
        let deadline = DeadlineGuard::arm(ctx.cancel_token(), ctx.deadline());
        Self {
            ctx,
            inbound: Some(inbound),
            outbound,
            state: StreamState::new(),
            feed_buffer,
            _deadline: deadline,
        }
    }

    /// Exactly one request in, exactly one response (or error status) out.
    pub(crate) async fn run_unary<Req, Resp>(mut self, f: UnaryFn<Req, Resp>)
    where
        Req: Message + Default,
        Resp: Message,
    {
        let req = match self.recv_single::<Req>().await {
            Ok(req) => req,
            Err(status) => return self.finish(status).await,
        };
        self.spawn_cancel_watch();

        match f(self.ctx.clone(), req).await {
            Ok(resp) => {
                if let Err(err) = self.outbound.send(&resp).await {
                    return self
                        .finish(Status::internal(format!("failed to send response: {err}")))
                        .await;
                }
                self.finish(Status::ok()).await
            }
            Err(status) => self.finish(status).await,
        }
    }

    /// One request in, zero or more responses out.
    pub(crate) async fn run_server_stream<Req, Resp>(mut self, f: ServerStreamFn<Req, Resp>)
    where
        Req: Message + Default,
        Resp: Message,
    {
        let req = match self.recv_single::<Req>().await {
            Ok(req) => req,
            Err(status) => return self.finish(status).await,
        };
        self.spawn_cancel_watch();

        let status = match f(self.ctx.clone(), req).await {
            Ok(stream) => self.pump(stream).await,
            Err(status) => status,
        };
        self.finish(status).await
    }

    /// Requests in until end-of-stream, then exactly one response out.
    ///
    /// The inbound feed and the accumulating handler progress cooperatively
    /// in one task; the join below completes only once both are done.
    pub(crate) async fn run_client_stream<Req, Resp>(mut self, f: ClientStreamFn<Req, Resp>)
    where
        Req: Message + Default,
        Resp: Message,
    {
        let Some(inbound) = self.inbound.take() else {
            return self
                .finish(Status::internal("request direction already consumed"))
                .await;
        };
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        let feed_fut = feed::<Req>(inbound, tx, self.ctx.clone());
        let handler_fut = f(self.ctx.clone(), RequestStream::new(rx));

        let (feed_res, handler_res) = tokio::join!(feed_fut, handler_fut);
        if let Err(status) = feed_res {
            return self.finish(status).await;
        }
        self.state.request.close();

        match handler_res {
            Ok(resp) => {
                if let Err(err) = self.outbound.send(&resp).await {
                    return self
                        .finish(Status::internal(format!("failed to send response: {err}")))
                        .await;
                }
                self.finish(Status::ok()).await
            }
            Err(status) => self.finish(status).await,
        }
    }

    /// Both directions stream independently: a feed future pushes decoded
    /// requests into the handler while a drive future pumps the handler's
    /// responses outbound. The join is the completion signal — the call is
    /// terminal only once both report done.
    pub(crate) async fn run_bidi<Req, Resp>(mut self, f: BidiFn<Req, Resp>)
    where
        Req: Message + Default,
        Resp: Message,
    {
        let Some(inbound) = self.inbound.take() else {
            return self
                .finish(Status::internal("request direction already consumed"))
                .await;
        };
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        let requests = RequestStream::new(rx);
        let feed_fut = feed::<Req>(inbound, tx, self.ctx.clone());
        let ctx = self.ctx.clone();
        let drive_fut = async {
            match f(ctx, requests).await {
                Ok(stream) => self.pump(stream).await,
                Err(status) => status,
            }
        };

        let (feed_res, drive_status) = tokio::join!(feed_fut, drive_fut);
        self.state.request.close();

        let status = match feed_res {
            Err(feed_status) if drive_status.is_ok() => feed_status,
            _ => drive_status,
        };
        self.finish(status).await
    }

    /// Receive the single request of a fixed-cardinality pattern.
    async fn recv_single<Req: Message + Default>(&mut self) -> Result<Req, Status> {
        let Some(inbound) = self.inbound.as_mut() else {
            return Err(Status::internal("request direction already consumed"));
        };
        if let Some(cause) = self.ctx.cancel_cause() {
            return Err(cause.into_status());
        }
        let item = tokio::select! {
            biased;
            cause = self.ctx.cancelled() => return Err(cause.into_status()),
            item = inbound.next() => item,
        };
        match item {
            Some(Ok(bytes)) => {
                let req = Req::decode(bytes).map_err(|err| {
                    Status::invalid_argument(format!("failed to decode request: {err}"))
                })?;
                self.state.request.half_close();
                Ok(req)
            }
            Some(Err(status)) => Err(status),
            None => Err(Status::invalid_argument(
                "request stream ended before a message",
            )),
        }
    }

    /// Keep draining the request direction after its cardinality is
    /// satisfied so that cancel frames still reach the token.
    fn spawn_cancel_watch(&mut self) {
        if let Some(mut inbound) = self.inbound.take() {
            tokio::spawn(async move { while inbound.next().await.is_some() {} });
        }
    }

    /// Pump a handler-produced response stream outbound until it ends, an
    /// error occurs, or the call is canceled. The cancellation condition
    /// is checked before every suspension.
    async fn pump<Resp: Message>(
        &mut self,
        mut stream: BoxStream<'static, Result<Resp, Status>>,
    ) -> Status {
        loop {
            if let Some(cause) = self.ctx.cancel_cause() {
                return cause.into_status();
            }
            let item = tokio::select! {
                biased;
                cause = self.ctx.cancelled() => return cause.into_status(),
                item = stream.next() => item,
            };
            match item {
                Some(Ok(resp)) => {
                    let sent = tokio::select! {
                        biased;
                        cause = self.ctx.cancelled() => return cause.into_status(),
                        sent = self.outbound.send(&resp) => sent,
                    };
                    if let Err(err) = sent {
                        return Status::internal(format!("failed to send response: {err}"));
                    }
                }
                Some(Err(status)) => return status,
                None => return Status::ok(),
            }
        }
    }

    /// Send the terminal status and close both directions.
    async fn finish(mut self, status: Status) {
        self.state.response.half_close();
        if self.outbound.send_status(status.clone()).await.is_err() {
            tracing::debug!(call_id = %self.ctx.id(), "caller gone before trailer delivery");
        }
        self.state.request.close();
        self.state.response.close();
        debug_assert!(self.state.is_terminal());

        if status.is_ok() {
            tracing::debug!(
                call_id = %self.ctx.id(),
                method = self.ctx.method(),
                "call completed"
            );
        } else {
            tracing::warn!(
                call_id = %self.ctx.id(),
                method = self.ctx.method(),
                code = %status.code(),
                message = status.message(),
                "call failed"
            );
        }
    }
}

/// Decode inbound request frames and push them to the handler's queue.
///
/// Returns `Ok(())` on clean end-of-stream (or when the handler stops
/// listening early), and the terminal status on cancellation, transport
/// failure, or an undecodable payload.
async fn feed<Req: Message + Default>(
    mut inbound: RpcInbound,
    tx: mpsc::Sender<Req>,
    ctx: CallContext,
) -> Result<(), Status> {
    loop {
        if let Some(cause) = ctx.cancel_cause() {
            return Err(cause.into_status());
        }
        let item = tokio::select! {
            biased;
            cause = ctx.cancelled() => return Err(cause.into_status()),
            item = inbound.next() => item,
        };
        match item {
            Some(Ok(bytes)) => match Req::decode(bytes) {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        return Ok(());
                    }
                }
                Err(err) => {
                    return Err(Status::invalid_argument(format!(
                        "failed to decode request: {err}"
                    )));
                }
            },
            Some(Err(status)) => return Err(status),
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_state_transitions() {
        let mut state = DirectionState::Open;
        state.half_close();
        assert_eq!(state, DirectionState::HalfClosed);
        state.close();
        assert_eq!(state, DirectionState::Closed);
        assert!(state.is_closed());
    }

    #[test]
    fn test_half_close_does_not_reopen_closed_direction() {
        let mut state = DirectionState::Closed;
        state.half_close();
        assert_eq!(state, DirectionState::Closed);
    }

    #[test]
    fn test_stream_state_terminal_requires_both_directions() {
        let mut state = StreamState::new();
        assert!(!state.is_terminal());
        state.request.close();
        assert!(!state.is_terminal());
        state.response.close();
        assert!(state.is_terminal());
    }
}
