//! Request-scoped context for one projection call chain
//!
//! A `RequestContext` is created by the caller for each logical operation
//! (one reconcile of one binding against one workload) and passed alongside
//! the binding and workload. It carries:
//! - a cancellation token and optional deadline honored at every suspension point
//! - the write-once mapping cache shared by `project` and the `unproject` it runs

use std::future::Future;
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use servicebinding_common::{Error, Result};

use crate::mapping::ResolvedMapping;

/// Cancellation, deadline, and mapping cache for one call chain
#[derive(Debug, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    mapping: OnceCell<ResolvedMapping>,
}

impl RequestContext {
    /// Context that is never cancelled and has no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context cancelled through the given token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Default::default()
        }
    }

    /// Abort the call chain once `timeout` has elapsed
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Abort the call chain at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Context for a new call chain that shares this one's cancellation and deadline.
    ///
    /// The mapping cache is not inherited: the child resolves afresh.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            mapping: OnceCell::new(),
        }
    }

    /// Token that cancels this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the context is cancelled or past its deadline
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled(operation));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::deadline_exceeded(operation));
        }
        Ok(())
    }

    /// Start `op` and await it, aborting if the context is cancelled or the deadline passes.
    ///
    /// `op` is not called at all when the context is already done.
    pub async fn run<Op, F, T>(&self, operation: &str, op: Op) -> Result<T>
    where
        Op: FnOnce() -> F,
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;
        let fut = op();
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled(operation)),
            _ = deadline => Err(Error::deadline_exceeded(operation)),
            result = fut => result,
        }
    }

    /// Write-once cache of the resolved mapping for this call chain
    pub(crate) fn mapping_cache(&self) -> &OnceCell<ResolvedMapping> {
        &self.mapping
    }
}
