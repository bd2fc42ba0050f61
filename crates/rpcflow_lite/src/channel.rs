use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use prost::Message;
use tokio::sync::mpsc;

use crate::call::{CallHeader, CancelCause, CancelToken};
use crate::error::ChannelError;
use crate::status::Status;

/// One frame on a call channel.
///
/// A direction carries zero or more `Message` frames. The request
/// direction ends with `CloseSend`; the response direction ends with a
/// `Trailer` carrying the call's terminal status. `Cancel` travels on the
/// request direction at any point.
#[derive(Debug, Clone)]
pub enum Frame {
    /// An encoded request or response payload.
    Message(Bytes),
    /// Clean end-of-stream for the sender's direction.
    CloseSend,
    /// Explicit caller-side cancellation.
    Cancel,
    /// Terminal status, sent exactly once as the last response frame.
    Trailer { code: u32, message: String },
}

/// Sending half of one direction of a call channel.
#[derive(Debug, Clone)]
pub(crate) struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl FrameSender {
    pub(crate) async fn send(&self, frame: Frame) -> Result<(), ChannelError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| ChannelError::Disconnected)
    }
}

/// Receiving half of one direction of a call channel.
#[derive(Debug)]
pub(crate) struct FrameReceiver {
    rx: mpsc::Receiver<Frame>,
}

impl FrameReceiver {
    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.rx.poll_recv(cx)
    }
}

/// Create one direction of a call channel. Frames arrive in send order.
pub(crate) fn direction(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (FrameSender { tx }, FrameReceiver { rx })
}

/// A call announced by a connector, carrying the header and the server
/// ends of both directions.
#[derive(Debug)]
pub struct IncomingCall {
    pub(crate) header: CallHeader,
    pub(crate) requests: FrameReceiver,
    pub(crate) responses: FrameSender,
}

impl IncomingCall {
    pub fn header(&self) -> &CallHeader {
        &self.header
    }
}

/// Accepts calls announced over a local link.
#[derive(Debug)]
pub struct CallListener {
    rx: mpsc::Receiver<IncomingCall>,
}

impl CallListener {
    pub(crate) fn new(rx: mpsc::Receiver<IncomingCall>) -> Self {
        Self { rx }
    }

    /// Next incoming call, or `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<IncomingCall> {
        self.rx.recv().await
    }
}

/// Server-side view of the request direction.
///
/// Yields encoded request payloads. A `CloseSend` frame ends the stream
/// cleanly; the channel closing without one is a transport failure and
/// surfaces as `Status::internal`. `Cancel` frames are not yielded — they
/// trigger the call's cancel token and reception continues.
#[derive(Debug)]
pub struct RpcInbound {
    rx: FrameReceiver,
    cancel: CancelToken,
    done: bool,
}

impl RpcInbound {
    pub(crate) fn new(rx: FrameReceiver, cancel: CancelToken) -> Self {
        Self {
            rx,
            cancel,
            done: false,
        }
    }
}

impl Stream for RpcInbound {
    type Item = Result<Bytes, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Frame::Message(bytes))) => return Poll::Ready(Some(Ok(bytes))),
                Poll::Ready(Some(Frame::CloseSend)) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Frame::Cancel)) => {
                    this.cancel.trigger(CancelCause::Canceled);
                }
                Poll::Ready(Some(Frame::Trailer { .. })) => {
                    // Trailers only travel on the response direction.
                    tracing::warn!("ignoring trailer frame on request direction");
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(Status::internal(
                        "request channel closed without end-of-stream",
                    ))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Server-side view of the response direction.
#[derive(Debug, Clone)]
pub struct RpcOutbound {
    tx: FrameSender,
}

impl RpcOutbound {
    pub(crate) fn new(tx: FrameSender) -> Self {
        Self { tx }
    }

    /// Encode and send one response message. Suspends while the channel
    /// is at capacity.
    pub async fn send<M: Message>(&self, msg: &M) -> Result<(), ChannelError> {
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf)?;
        self.tx.send(Frame::Message(buf.into())).await
    }

    /// Send the terminal status trailer.
    pub async fn send_status(&self, status: Status) -> Result<(), ChannelError> {
        let (code, message) = status.into_parts();
        self.tx.send(Frame::Trailer { code, message }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn inbound_pair(capacity: usize) -> (FrameSender, RpcInbound, CancelToken) {
        let (tx, rx) = direction(capacity);
        let cancel = CancelToken::new();
        let inbound = RpcInbound::new(rx, cancel.clone());
        (tx, inbound, cancel)
    }

    #[tokio::test]
    async fn test_inbound_preserves_send_order() {
        let (tx, mut inbound, _cancel) = inbound_pair(8);
        for byte in [1u8, 2, 3] {
            tx.send(Frame::Message(Bytes::from(vec![byte]))).await.unwrap();
        }
        tx.send(Frame::CloseSend).await.unwrap();

        let mut seen = Vec::new();
        while let Some(item) = inbound.next().await {
            seen.push(item.unwrap()[0]);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_close_send_is_clean_end_of_stream() {
        let (tx, mut inbound, _cancel) = inbound_pair(2);
        tx.send(Frame::CloseSend).await.unwrap();
        assert!(inbound.next().await.is_none());
        // Stays terminated.
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn test_abrupt_close_is_internal_error() {
        let (tx, mut inbound, _cancel) = inbound_pair(2);
        drop(tx);
        let err = inbound.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), crate::status::Code::Internal);
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_frame_triggers_token() {
        let (tx, mut inbound, cancel) = inbound_pair(4);
        tx.send(Frame::Cancel).await.unwrap();
        tx.send(Frame::CloseSend).await.unwrap();
        assert!(inbound.next().await.is_none());
        assert_eq!(cancel.cause(), Some(CancelCause::Canceled));
    }
}
