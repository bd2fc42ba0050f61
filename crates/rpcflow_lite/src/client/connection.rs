use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use prost::Message;
use tokio::sync::mpsc;
use tracing::debug;

use crate::call::{CallHeader, CallId};
use crate::channel::{Frame, FrameReceiver, FrameSender, IncomingCall, direction};
use crate::client::config::CallOptions;
use crate::path::MethodPath;
use crate::status::Status;

/// Caller-side handle to a link: opens calls against whatever router is
/// listening on the other end.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    tx: mpsc::Sender<IncomingCall>,
}

impl RpcConnector {
    pub(crate) fn new(tx: mpsc::Sender<IncomingCall>) -> Self {
        Self { tx }
    }

    /// Open a call and return its typed connection. The method path is
    /// validated before anything is sent.
    pub async fn open<Req, Resp>(
        &self,
        path: &str,
        options: CallOptions,
    ) -> Result<RpcConnection<Req, Resp>, Status>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let path = MethodPath::parse(path)
            .map_err(|err| Status::invalid_argument(err.to_string()))?
            .full_path();
        let header = CallHeader {
            id: CallId::new(),
            path,
            deadline: options.deadline,
        };
        let (req_tx, req_rx) = direction(options.channel_capacity);
        let (resp_tx, resp_rx) = direction(options.channel_capacity);

        debug!(call_id = %header.id, path = %header.path, "opening call");

        let incoming = IncomingCall {
            header,
            requests: req_rx,
            responses: resp_tx,
        };
        self.tx
            .send(incoming)
            .await
            .map_err(|_| Status::internal("no router attached to link"))?;

        Ok(RpcConnection::new(req_tx, resp_rx))
    }

    /// One request, one response.
    pub async fn unary<Req, Resp>(
        &self,
        path: &str,
        req: Req,
        options: CallOptions,
    ) -> Result<Resp, Status>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let conn = self.open::<Req, Resp>(path, options).await?;
        let (sender, mut receiver) = conn.split();

        let sent = async {
            sender.send(req).await?;
            sender.close_send().await
        }
        .await;

        // The trailer is authoritative; a send failure only matters if the
        // call never produced one.
        match receiver.next().await {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(status)) => Err(status),
            None => Err(sent
                .err()
                .unwrap_or_else(|| Status::internal("response stream ended without a message"))),
        }
    }

    /// One request, a stream of responses. The returned receiver yields
    /// messages until the terminal status; a non-Ok status surfaces as the
    /// final `Err` item.
    pub async fn server_streaming<Req, Resp>(
        &self,
        path: &str,
        req: Req,
        options: CallOptions,
    ) -> Result<RpcReceiver<Resp>, Status>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let conn = self.open::<Req, Resp>(path, options).await?;
        let (sender, receiver) = conn.split();
        sender.send(req).await?;
        sender.close_send().await?;
        Ok(receiver)
    }

    /// A stream of requests, one response after close-send.
    pub async fn client_streaming<Req, Resp, S>(
        &self,
        path: &str,
        requests: S,
        options: CallOptions,
    ) -> Result<Resp, Status>
    where
        Req: Message,
        Resp: Message + Default,
        S: Stream<Item = Req>,
    {
        let conn = self.open::<Req, Resp>(path, options).await?;
        let (sender, mut receiver) = conn.split();

        let sent = async {
            futures::pin_mut!(requests);
            while let Some(req) = requests.next().await {
                sender.send(req).await?;
            }
            sender.close_send().await
        }
        .await;

        match receiver.next().await {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(status)) => Err(status),
            None => Err(sent
                .err()
                .unwrap_or_else(|| Status::internal("response stream ended without a message"))),
        }
    }

    /// Bidirectional streaming: a spawned task drives the send direction
    /// while this task drains the receive direction. Joining the send task
    /// after the receive loop is the completion signal — the call returns
    /// only once both directions are done.
    pub async fn bidi_streaming<Req, Resp, S>(
        &self,
        path: &str,
        requests: S,
        options: CallOptions,
    ) -> Result<Vec<Resp>, Status>
    where
        Req: Message + 'static,
        Resp: Message + Default,
        S: Stream<Item = Req> + Send + 'static,
    {
        let conn = self.open::<Req, Resp>(path, options).await?;
        let (sender, mut receiver) = conn.split();

        let send_task = tokio::spawn(async move {
            futures::pin_mut!(requests);
            while let Some(req) = requests.next().await {
                sender.send(req).await?;
            }
            sender.close_send().await
        });

        let mut responses = Vec::new();
        let mut failure = None;
        while let Some(item) = receiver.next().await {
            match item {
                Ok(resp) => responses.push(resp),
                Err(status) => {
                    failure = Some(status);
                    break;
                }
            }
        }

        // Completion signal: the call returns only after both directions
        // report done. On failure the outstanding send work is abandoned.
        match failure {
            Some(status) => {
                send_task.abort();
                let _ = send_task.await;
                Err(status)
            }
            None => {
                let _ = send_task.await;
                Ok(responses)
            }
        }
    }
}

/// A typed bidirectional call connection.
///
/// Implements `Stream` for receiving responses; can be split into separate
/// [`RpcSender`] and [`RpcReceiver`] halves for concurrent send/receive.
#[derive(Debug)]
pub struct RpcConnection<Req, Resp> {
    sender: RpcSender<Req>,
    receiver: RpcReceiver<Resp>,
}

impl<Req, Resp> RpcConnection<Req, Resp> {
    fn new(requests: FrameSender, responses: FrameReceiver) -> Self {
        Self {
            sender: RpcSender::new(requests),
            receiver: RpcReceiver::new(responses),
        }
    }

    /// Split the connection into separate send and receive halves.
    pub fn split(self) -> (RpcSender<Req>, RpcReceiver<Resp>) {
        (self.sender, self.receiver)
    }
}

impl<Req, Resp> RpcConnection<Req, Resp>
where
    Req: Message,
{
    pub async fn send(&self, req: Req) -> Result<(), Status> {
        self.sender.send(req).await
    }

    pub async fn close_send(&self) -> Result<(), Status> {
        self.sender.close_send().await
    }

    pub async fn cancel(&self) -> Result<(), Status> {
        self.sender.cancel().await
    }
}

impl<Req, Resp> Stream for RpcConnection<Req, Resp>
where
    Resp: Message + Default,
{
    type Item = Result<Resp, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// The send half of a call connection.
#[derive(Debug)]
pub struct RpcSender<Req> {
    tx: FrameSender,
    _marker: PhantomData<fn(Req)>,
}

impl<Req> RpcSender<Req> {
    fn new(tx: FrameSender) -> Self {
        Self {
            tx,
            _marker: PhantomData,
        }
    }

    /// Explicitly cancel the call. The server observes this at its next
    /// suspension point.
    pub async fn cancel(&self) -> Result<(), Status> {
        self.tx
            .send(Frame::Cancel)
            .await
            .map_err(|_| Status::internal("request channel closed"))
    }

    /// Half-close the request direction.
    pub async fn close_send(&self) -> Result<(), Status> {
        self.tx
            .send(Frame::CloseSend)
            .await
            .map_err(|_| Status::internal("request channel closed"))
    }
}

impl<Req> RpcSender<Req>
where
    Req: Message,
{
    /// Encode and send one request message.
    pub async fn send(&self, req: Req) -> Result<(), Status> {
        let mut buf = Vec::with_capacity(req.encoded_len());
        req.encode(&mut buf)
            .map_err(|err| Status::internal(format!("failed to encode request: {err}")))?;
        self.tx
            .send(Frame::Message(buf.into()))
            .await
            .map_err(|_| Status::internal("request channel closed"))
    }
}

/// The receive half of a call connection.
///
/// Yields decoded responses until the terminal trailer: an Ok trailer ends
/// the stream, a non-Ok trailer surfaces as the final `Err` item. The
/// channel closing without a trailer is a transport failure.
#[derive(Debug)]
pub struct RpcReceiver<Resp> {
    rx: FrameReceiver,
    done: bool,
    _marker: PhantomData<fn() -> Resp>,
}

impl<Resp> RpcReceiver<Resp> {
    fn new(rx: FrameReceiver) -> Self {
        Self {
            rx,
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<Resp> Stream for RpcReceiver<Resp>
where
    Resp: Message + Default,
{
    type Item = Result<Resp, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Frame::Message(bytes))) => {
                    return Poll::Ready(Some(match Resp::decode(bytes) {
                        Ok(resp) => Ok(resp),
                        Err(err) => {
                            this.done = true;
                            Err(Status::internal(format!(
                                "failed to decode response: {err}"
                            )))
                        }
                    }));
                }
                Poll::Ready(Some(Frame::Trailer { code, message })) => {
                    this.done = true;
                    let status = Status::from_parts(code, message);
                    if status.is_ok() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Err(status)));
                }
                Poll::Ready(Some(_)) => {
                    // CloseSend/Cancel never travel on the response direction.
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(Status::internal(
                        "response channel closed before trailer",
                    ))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
