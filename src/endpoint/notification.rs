//! Single-value completion handles
//!
//! A [`Notification`] resolves at most once with either a value or an
//! [`EndpointError`]. The producing side holds the matching [`Completer`].

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::FutureExt;
use tokio::sync::oneshot;

use super::error::EndpointError;

/// Producer half. Completing consumes it, so a second value is impossible.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<Result<T, EndpointError>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T, EndpointError>) {
        // Receiver may have been dropped by a caller that stopped caring
        let _ = self.tx.send(result);
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, err: EndpointError) {
        self.complete(Err(err));
    }

    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, awaited by the caller
#[derive(Debug)]
pub struct Notification<T> {
    rx: oneshot::Receiver<Result<T, EndpointError>>,
}

impl<T> Notification<T> {
    /// Create a pending notification and its completer
    pub fn pending() -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Completer { tx }, Self { rx })
    }

    /// Create a notification that is already resolved
    pub fn ready(result: Result<T, EndpointError>) -> Self {
        let (completer, notification) = Self::pending();
        completer.complete(result);
        notification
    }

    /// Non-blocking check, mostly for tests and polling callers
    pub fn try_take(&mut self) -> Option<Result<T, EndpointError>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Future for Notification<T> {
    type Output = Result<T, EndpointError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx.poll_unpin(cx).map(|res| {
            res.unwrap_or_else(|_| {
                Err(EndpointError::Uncategorized(
                    "notification dropped before completion".to_string(),
                ))
            })
        })
    }
}
