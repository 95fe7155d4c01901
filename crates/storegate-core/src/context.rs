//! Per-request cancellation and deadline
//!
//! Every blocking point in storegate takes a [`RequestContext`] and stops
//! as soon as the context is cancelled or its deadline passes. The
//! transport layer owns the timeout; the core only honours it.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::ObjectStream;
use crate::error::{GatewayError, GatewayResult};

const CANCELLED: &str = "request cancelled";
const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Cancellation signal plus optional deadline for one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// Context that is never cancelled unless [`cancel`](Self::cancel) is called
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Context driven by an existing token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derived context: cancelled with its parent, cancellable on its own,
    /// same deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_passed()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Guard that cancels this context when dropped
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Fail fast if the context is already done
    pub fn check(&self) -> GatewayResult<()> {
        if self.token.is_cancelled() {
            return Err(GatewayError::Cancelled(CANCELLED.to_string()));
        }
        if self.deadline_passed() {
            return Err(GatewayError::Cancelled(DEADLINE_EXCEEDED.to_string()));
        }
        Ok(())
    }

    /// Resolves once the context is cancelled or expired
    pub async fn done(&self) -> GatewayError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => GatewayError::Cancelled(CANCELLED.to_string()),
                _ = tokio::time::sleep_until(deadline) => {
                    GatewayError::Cancelled(DEADLINE_EXCEEDED.to_string())
                }
            },
            None => {
                self.token.cancelled().await;
                GatewayError::Cancelled(CANCELLED.to_string())
            }
        }
    }

    /// Run `fut` until it completes or the context is done, whichever is first.
    pub async fn run<T, F>(&self, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = GatewayResult<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }

    /// Tie a body stream to this context.
    ///
    /// Each chunk is awaited through [`run`](Self::run); once the context is
    /// done the stream yields one error and ends.
    pub fn bind_stream(self, body: ObjectStream) -> ObjectStream {
        stream::unfold(Some((body, self)), |state| async move {
            let (mut body, ctx) = state?;
            match ctx.run(async { Ok(body.next().await) }).await {
                Ok(Some(chunk)) => Some((chunk, Some((body, ctx)))),
                Ok(None) => None,
                Err(e) => Some((Err(std::io::Error::other(e)), None)),
            }
        })
        .boxed()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}
