use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use prost::Message;
use tokio::sync::mpsc;

use crate::call::CallContext;
use crate::channel::{RpcInbound, RpcOutbound};
use crate::controller::StreamController;
use crate::server::callmap::CallGuard;
use crate::status::Status;

/// Typed request stream handed to client-streaming and bidi handlers.
///
/// Yields decoded request messages until the caller half-closes its
/// direction. Transport failures never surface here — they terminate the
/// call through the controller.
#[derive(Debug)]
pub struct RequestStream<Req> {
    rx: mpsc::Receiver<Req>,
}

impl<Req> RequestStream<Req> {
    pub(crate) fn new(rx: mpsc::Receiver<Req>) -> Self {
        Self { rx }
    }
}

impl<Req> Stream for RequestStream<Req> {
    type Item = Req;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

pub(crate) type UnaryFn<Req, Resp> =
    Arc<dyn Fn(CallContext, Req) -> BoxFuture<'static, Result<Resp, Status>> + Send + Sync>;

pub(crate) type ServerStreamFn<Req, Resp> = Arc<
    dyn Fn(
            CallContext,
            Req,
        ) -> BoxFuture<'static, Result<BoxStream<'static, Result<Resp, Status>>, Status>>
        + Send
        + Sync,
>;

pub(crate) type ClientStreamFn<Req, Resp> = Arc<
    dyn Fn(CallContext, RequestStream<Req>) -> BoxFuture<'static, Result<Resp, Status>>
        + Send
        + Sync,
>;

pub(crate) type BidiFn<Req, Resp> = Arc<
    dyn Fn(
            CallContext,
            RequestStream<Req>,
        ) -> BoxFuture<'static, Result<BoxStream<'static, Result<Resp, Status>>, Status>>
        + Send
        + Sync,
>;

/// A type-erased handler that can be stored in the router's registry.
///
/// Spawns one task per call that drives a [`StreamController`] to a
/// terminal status. The call guard stays alive for the duration of the
/// task.
pub(crate) trait ErasedHandler: Send + Sync {
    fn spawn(
        &self,
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        guard: CallGuard,
        feed_buffer: usize,
    );
}

pub(crate) struct UnaryHandler<Req, Resp> {
    f: UnaryFn<Req, Resp>,
}

impl<Req, Resp> UnaryHandler<Req, Resp> {
    pub(crate) fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |ctx, req| Box::pin(f(ctx, req))),
        }
    }
}

impl<Req, Resp> ErasedHandler for UnaryHandler<Req, Resp>
where
    Req: Message + Default + 'static,
    Resp: Message + 'static,
{
    fn spawn(
        &self,
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        guard: CallGuard,
        feed_buffer: usize,
    ) {
        let f = Arc::clone(&self.f);
        tokio::spawn(async move {
            let _guard = guard;
            StreamController::new(ctx, inbound, outbound, feed_buffer)
                .run_unary(f)
                .await;
        });
    }
}

pub(crate) struct ServerStreamHandler<Req, Resp> {
    f: ServerStreamFn<Req, Resp>,
}

impl<Req, Resp> ServerStreamHandler<Req, Resp> {
    pub(crate) fn new<F, Fut, S>(f: F) -> Self
    where
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |ctx, req| {
                let fut = f(ctx, req);
                Box::pin(async move {
                    let stream = fut.await?;
                    Ok(stream.boxed())
                })
            }),
        }
    }
}

impl<Req, Resp> ErasedHandler for ServerStreamHandler<Req, Resp>
where
    Req: Message + Default + 'static,
    Resp: Message + 'static,
{
    fn spawn(
        &self,
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        guard: CallGuard,
        feed_buffer: usize,
    ) {
        let f = Arc::clone(&self.f);
        tokio::spawn(async move {
            let _guard = guard;
            StreamController::new(ctx, inbound, outbound, feed_buffer)
                .run_server_stream(f)
                .await;
        });
    }
}

pub(crate) struct ClientStreamHandler<Req, Resp> {
    f: ClientStreamFn<Req, Resp>,
}

impl<Req, Resp> ClientStreamHandler<Req, Resp> {
    pub(crate) fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CallContext, RequestStream<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |ctx, requests| Box::pin(f(ctx, requests))),
        }
    }
}

impl<Req, Resp> ErasedHandler for ClientStreamHandler<Req, Resp>
where
    Req: Message + Default + 'static,
    Resp: Message + 'static,
{
    fn spawn(
        &self,
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        guard: CallGuard,
        feed_buffer: usize,
    ) {
        let f = Arc::clone(&self.f);
        tokio::spawn(async move {
            let _guard = guard;
            StreamController::new(ctx, inbound, outbound, feed_buffer)
                .run_client_stream(f)
                .await;
        });
    }
}

pub(crate) struct BidiHandler<Req, Resp> {
    f: BidiFn<Req, Resp>,
}

impl<Req, Resp> BidiHandler<Req, Resp> {
    pub(crate) fn new<F, Fut, S>(f: F) -> Self
    where
        F: Fn(CallContext, RequestStream<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |ctx, requests| {
                let fut = f(ctx, requests);
                Box::pin(async move {
                    let stream = fut.await?;
                    Ok(stream.boxed())
                })
            }),
        }
    }
}

impl<Req, Resp> ErasedHandler for BidiHandler<Req, Resp>
where
    Req: Message + Default + 'static,
    Resp: Message + 'static,
{
    fn spawn(
        &self,
        ctx: CallContext,
        inbound: RpcInbound,
        outbound: RpcOutbound,
        guard: CallGuard,
        feed_buffer: usize,
    ) {
        let f = Arc::clone(&self.f);
        tokio::spawn(async move {
            let _guard = guard;
            StreamController::new(ctx, inbound, outbound, feed_buffer)
                .run_bidi(f)
                .await;
        });
    }
}
