//! Completion handle for store operations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error_handling::StoreError;

/// Resolves once the store executor has applied an operation.
///
/// The operation itself is queued when the `Store` method is called, not when
/// this future is first polled, so dropping a `Pending` without awaiting it is
/// the fire-and-forget form of every call. The awaiting task is resumed on its
/// own runtime context; nothing the caller does after `.await` runs on the
/// executor.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, StoreError>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, StoreError>>) -> Self {
        Pending { rx }
    }

    /// A handle that is already resolved with `err`.
    pub(crate) fn failed(err: StoreError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Pending { rx }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Executor dropped the reply: it has shut down
            Poll::Ready(Err(_)) => Poll::Ready(Err(StoreError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
