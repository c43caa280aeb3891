/*
[INPUT]:  Correlation tokens and their eventual outcomes
[OUTPUT]: Awaitable pending entries settled at most once
[POS]:    Auth layer - in-flight attempt bookkeeping
[UPDATE]: When settlement or cancellation semantics change
*/

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::http::{ConnectError, Result};
use crate::types::CorrelationToken;

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Waiter<T> {
    registration: u64,
    tx: oneshot::Sender<Result<T>>,
}

type Waiters<T> = Mutex<HashMap<CorrelationToken, Waiter<T>>>;

/// Maps in-flight correlation tokens to their single waiter.
///
/// Settling an unknown or already settled token is a no-op: out-of-band
/// channels may deliver duplicates or arrive after the attempt finished.
#[derive(Debug)]
pub struct CorrelationRegistry<T> {
    waiters: Arc<Waiters<T>>,
}

impl<T> Clone for CorrelationRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            waiters: Arc::clone(&self.waiters),
        }
    }
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CorrelationRegistry<T> {
    pub fn new() -> Self {
        Self {
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a waiter for `token`
    pub fn register(&self, token: CorrelationToken) -> Result<Pending<T>> {
        let mut waiters = self.lock();
        if waiters.get(&token).is_some_and(|waiter| !waiter.tx.is_closed()) {
            return Err(ConnectError::DuplicateToken(token.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let registration = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        waiters.insert(token.clone(), Waiter { registration, tx });
        debug!(token = %token, "correlation token registered");

        Ok(Pending {
            token,
            registration,
            rx,
            waiters: Arc::downgrade(&self.waiters),
        })
    }

    /// Resolve the waiter for `token`; returns whether a waiter was settled
    pub fn resolve(&self, token: &CorrelationToken, value: T) -> bool {
        self.settle(token, Ok(value))
    }

    /// Reject the waiter for `token`; returns whether a waiter was settled
    pub fn reject(&self, token: &CorrelationToken, error: ConnectError) -> bool {
        self.settle(token, Err(error))
    }

    /// Cancel the waiter for `token`
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        self.settle(token, Err(ConnectError::Cancelled))
    }

    pub fn is_pending(&self, token: &CorrelationToken) -> bool {
        self.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn settle(&self, token: &CorrelationToken, outcome: Result<T>) -> bool {
        let waiter = self.lock().remove(token);
        match waiter {
            Some(waiter) => {
                let delivered = waiter.tx.send(outcome).is_ok();
                debug!(token = %token, delivered, "correlation token settled");
                delivered
            }
            None => {
                debug!(token = %token, "dropping response for unknown or settled token");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationToken, Waiter<T>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Future for a registered token; dropping it releases the registration
#[derive(Debug)]
pub struct Pending<T> {
    token: CorrelationToken,
    registration: u64,
    rx: oneshot::Receiver<Result<T>>,
    waiters: Weak<Waiters<T>>,
}

impl<T> Pending<T> {
    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    /// Wait for settlement, bounded by `timeout` when given
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<T> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(token = %self.token, "correlation token timed out");
                    Err(ConnectError::Timeout {
                        duration: limit,
                    })
                }
            },
            None => self.await,
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ConnectError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        if let Some(waiters) = self.waiters.upgrade() {
            let mut waiters = waiters.lock().unwrap_or_else(PoisonError::into_inner);
            let registration = self.registration;
            if waiters
                .get(&self.token)
                .is_some_and(|waiter| waiter.registration == registration)
            {
                waiters.remove(&self.token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> CorrelationToken {
        CorrelationToken::from(value)
    }

    #[tokio::test]
    async fn test_resolve_delivers_value() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register(token("a")).unwrap();

        assert!(registry.resolve(&token("a"), 7u32));
        assert_eq!(pending.await.unwrap(), 7);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_second_resolve_is_ignored() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register(token("a")).unwrap();

        assert!(registry.resolve(&token("a"), "first"));
        assert!(!registry.resolve(&token("a"), "second"));
        assert!(!registry.reject(&token("a"), ConnectError::Cancelled));
        assert_eq!(pending.await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_reject_then_resolve_keeps_rejection() {
        let registry = CorrelationRegistry::<String>::new();
        let pending = registry.register(token("a")).unwrap();

        assert!(registry.reject(&token("a"), ConnectError::PaymentFailed("no funds".into())));
        assert!(!registry.resolve(&token("a"), "late".to_string()));
        assert!(matches!(pending.await, Err(ConnectError::PaymentFailed(_))));
    }

    #[test]
    fn test_unknown_token_is_noop() {
        let registry = CorrelationRegistry::<u8>::new();
        assert!(!registry.resolve(&token("ghost"), 1));
        assert!(!registry.reject(&token("ghost"), ConnectError::Cancelled));
        assert!(!registry.cancel(&token("ghost")));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CorrelationRegistry::<u8>::new();
        let _pending = registry.register(token("a")).unwrap();
        assert!(matches!(
            registry.register(token("a")),
            Err(ConnectError::DuplicateToken(_))
        ));
    }

    #[test]
    fn test_dropping_pending_releases_registration() {
        let registry = CorrelationRegistry::<u8>::new();
        let pending = registry.register(token("a")).unwrap();
        assert!(registry.is_pending(&token("a")));

        drop(pending);
        assert!(!registry.is_pending(&token("a")));
        assert!(registry.register(token("a")).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_surfaces_cancelled() {
        let registry = CorrelationRegistry::<u8>::new();
        let pending = registry.register(token("a")).unwrap();
        assert!(registry.cancel(&token("a")));
        assert!(matches!(pending.await, Err(ConnectError::Cancelled)));
    }

    #[tokio::test]
    async fn test_wait_times_out_and_releases() {
        let registry = CorrelationRegistry::<u8>::new();
        let pending = registry.register(token("a")).unwrap();

        let err = pending.wait(Some(Duration::from_millis(20))).await.unwrap_err();
        assert!(matches!(err, ConnectError::Timeout { .. }));
        assert!(!registry.is_pending(&token("a")));
    }
}
