use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four request/response cardinality shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    Unary,
    ServerStream,
    ClientStream,
    BidiStream,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::Unary => "unary",
            Pattern::ServerStream => "server-streaming",
            Pattern::ClientStream => "client-streaming",
            Pattern::BidiStream => "bidi-streaming",
        };
        f.write_str(name)
    }
}

/// Metadata sent ahead of a call's first frame.
#[derive(Debug, Clone)]
pub struct CallHeader {
    pub id: CallId,
    /// Full method path, e.g. `calculator.CalculatorService/Sum`.
    pub path: String,
    /// Time budget for the call, measured from dispatch.
    pub deadline: Option<Duration>,
}

/// Why a call was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The caller canceled explicitly.
    Canceled,
    /// The call's deadline elapsed.
    DeadlineExceeded,
}

impl CancelCause {
    pub fn into_status(self) -> crate::status::Status {
        match self {
            CancelCause::Canceled => crate::status::Status::canceled("call canceled"),
            CancelCause::DeadlineExceeded => {
                crate::status::Status::deadline_exceeded("deadline exceeded")
            }
        }
    }
}

/// Shared cancellation flag for one call.
///
/// Write-once: the first trigger records its cause, later triggers are
/// ignored. Observable synchronously via [`CancelToken::cause`] and
/// asynchronously via [`CancelToken::cancelled`].
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<watch::Sender<Option<CancelCause>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            shared: Arc::new(tx),
        }
    }

    /// Record a cancellation cause. Returns `true` if this call was the
    /// first trigger.
    pub fn trigger(&self, cause: CancelCause) -> bool {
        self.shared.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(cause);
                true
            } else {
                false
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.borrow().is_some()
    }

    pub fn cause(&self) -> Option<CancelCause> {
        *self.shared.borrow()
    }

    /// Resolves once the token is triggered. Never resolves for a call
    /// that is not canceled.
    pub async fn cancelled(&self) -> CancelCause {
        let mut rx = self.shared.subscribe();
        loop {
            if let Some(cause) = *rx.borrow_and_update() {
                return cause;
            }
            if rx.changed().await.is_err() {
                // The sender lives in this token, so this is unreachable
                // while `self` is alive; park forever rather than panic.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cause", &self.cause())
            .finish()
    }
}

/// Arms a timer that triggers a token with [`CancelCause::DeadlineExceeded`]
/// when the deadline elapses. Aborts the timer when dropped.
pub(crate) struct DeadlineGuard {
    handle: Option<JoinHandle<()>>,
}

impl DeadlineGuard {
    pub(crate) fn arm(token: &CancelToken, deadline: Option<Duration>) -> Self {
        let handle = deadline.map(|deadline| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.trigger(CancelCause::DeadlineExceeded);
            })
        });
        Self { handle }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Per-call context handed to handlers: identity, method, and the shared
/// cancellation condition. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CallContext {
    header: Arc<CallHeader>,
    cancel: CancelToken,
}

impl CallContext {
    pub(crate) fn new(header: CallHeader, cancel: CancelToken) -> Self {
        Self {
            header: Arc::new(header),
            cancel,
        }
    }

    pub fn id(&self) -> CallId {
        self.header.id
    }

    /// Full method path of this call.
    pub fn method(&self) -> &str {
        &self.header.path
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.header.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_cause(&self) -> Option<CancelCause> {
        self.cancel.cause()
    }

    /// Resolves once the call is canceled (explicitly or by deadline).
    pub async fn cancelled(&self) -> CancelCause {
        self.cancel.cancelled().await
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_wins() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.trigger(CancelCause::DeadlineExceeded));
        assert!(!token.trigger(CancelCause::Canceled));
        assert_eq!(token.cause(), Some(CancelCause::DeadlineExceeded));
    }

    #[test]
    fn test_trigger_visible_through_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        token.trigger(CancelCause::Canceled);
        assert!(observer.is_cancelled());
        assert_eq!(observer.cause(), Some(CancelCause::Canceled));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_trigger() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        token.trigger(CancelCause::Canceled);
        assert_eq!(task.await.unwrap(), CancelCause::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_guard_triggers() {
        let token = CancelToken::new();
        let _guard = DeadlineGuard::arm(&token, Some(Duration::from_millis(50)));
        token.cancelled().await;
        assert_eq!(token.cause(), Some(CancelCause::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_deadline_guard_never_fires() {
        let token = CancelToken::new();
        let guard = DeadlineGuard::arm(&token, Some(Duration::from_millis(10)));
        drop(guard);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!token.is_cancelled());
    }
}
