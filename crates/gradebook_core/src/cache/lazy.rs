//! Memoized lazy values.
//!
//! A `Lazy<T>` wraps an asynchronous producer that runs on first access and whose
//! result is kept for the lifetime of the owner.
//!
//! # States
//!
//! - `Unrealized`: nothing fetched yet, or the last attempt failed or was cancelled.
//! - `Realizing`: a producer call is in flight. Every caller that arrives now awaits
//!   the same shared future, so the producer runs once no matter how many callers.
//! - `Realized`: the value is cached and never reverts. Owners that need fresh data
//!   build a new `Lazy`, or keep interior mutability inside `T`.
//!
//! A failed producer hands its error to every waiter of that call and returns the
//! value to `Unrealized`; the next `get()` retries. A cancelled caller only resets
//! the value when it was the last one waiting on the call.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::ports::{PortError, PortResult};

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, PortResult<T>> + Send + Sync>;
type Pending<T> = Shared<BoxFuture<'static, PortResult<T>>>;

enum LazyState<T: Clone> {
    Unrealized,
    Realizing {
        attempt: u64,
        pending: Pending<T>,
        waiters: usize,
    },
    Realized(T),
}

struct Inner<T: Clone> {
    state: LazyState<T>,
    attempts: u64,
}

/// What a caller does after inspecting the state.
enum Step<T: Clone> {
    Ready(T),
    Await(u64, Pending<T>),
}

pub struct Lazy<T: Clone> {
    producer: Option<Producer<T>>,
    inner: Mutex<Inner<T>>,
}

impl<T> Lazy<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps `producer` without calling it.
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PortResult<T>> + Send + 'static,
    {
        Self {
            producer: Some(Arc::new(move || producer().boxed())),
            inner: Mutex::new(Inner {
                state: LazyState::Unrealized,
                attempts: 0,
            }),
        }
    }

    /// A value that is realized from the start and has no producer.
    pub fn ready(value: T) -> Self {
        Self {
            producer: None,
            inner: Mutex::new(Inner {
                state: LazyState::Realized(value),
                attempts: 0,
            }),
        }
    }

    pub fn is_realized(&self) -> bool {
        matches!(self.inner.lock().state, LazyState::Realized(_))
    }

    /// The cached value, without fetching.
    pub fn peek(&self) -> Option<T> {
        match &self.inner.lock().state {
            LazyState::Realized(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn get(&self) -> PortResult<T> {
        let (attempt, pending) = match self.step()? {
            Step::Ready(value) => return Ok(value),
            Step::Await(attempt, pending) => (attempt, pending),
        };
        let result = pending.await;
        self.settle(attempt, &result);
        result
    }

    /// Like [`Lazy::get`], giving up when `cancel` fires. If no other caller is
    /// waiting on the same attempt, the value is left unrealized so a later call
    /// starts over.
    pub async fn get_cancellable(&self, cancel: &CancellationToken) -> PortResult<T> {
        let (attempt, pending) = match self.step()? {
            Step::Ready(value) => return Ok(value),
            Step::Await(attempt, pending) => (attempt, pending),
        };
        tokio::select! {
            result = pending => {
                self.settle(attempt, &result);
                result
            }
            _ = cancel.cancelled() => {
                self.abandon(attempt);
                Err(PortError::Cancelled)
            }
        }
    }

    fn step(&self) -> PortResult<Step<T>> {
        let mut inner = self.inner.lock();
        match &mut inner.state {
            LazyState::Realized(value) => return Ok(Step::Ready(value.clone())),
            LazyState::Realizing {
                attempt,
                pending,
                waiters,
            } => {
                *waiters += 1;
                return Ok(Step::Await(*attempt, pending.clone()));
            }
            LazyState::Unrealized => {}
        }
        let producer = self
            .producer
            .as_ref()
            .ok_or_else(|| PortError::Unexpected("lazy value has no producer".to_string()))?;
        inner.attempts += 1;
        let attempt = inner.attempts;
        let pending = producer().shared();
        inner.state = LazyState::Realizing {
            attempt,
            pending: pending.clone(),
            waiters: 1,
        };
        Ok(Step::Await(attempt, pending))
    }

    fn settle(&self, attempt: u64, result: &PortResult<T>) {
        let mut inner = self.inner.lock();
        let current = match inner.state {
            LazyState::Realizing { attempt: current, .. } => current == attempt,
            // An abandoned attempt that still succeeded is kept unless a newer one started.
            LazyState::Unrealized => inner.attempts == attempt && result.is_ok(),
            LazyState::Realized(_) => false,
        };
        if !current {
            return;
        }
        inner.state = match result {
            Ok(value) => LazyState::Realized(value.clone()),
            Err(_) => LazyState::Unrealized,
        };
    }

    fn abandon(&self, attempt: u64) {
        let mut inner = self.inner.lock();
        if let LazyState::Realizing {
            attempt: current,
            waiters,
            ..
        } = &mut inner.state
        {
            if *current != attempt {
                return;
            }
            *waiters -= 1;
            if *waiters == 0 {
                inner.state = LazyState::Unrealized;
            }
        }
    }
}

impl<T: Clone> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.lock().state {
            LazyState::Unrealized => "unrealized",
            LazyState::Realizing { .. } => "realizing",
            LazyState::Realized(_) => "realized",
        };
        f.debug_struct("Lazy").field("state", &state).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
