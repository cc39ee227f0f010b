//! Lazily produced sequences that end with a [`Result`]
//!
//! A [`FallibleSequence`] hands out items one pull at a time and finishes
//! with exactly one `Done(Result<R>)`. Nothing escapes as a panic: the
//! [`Generator`] wraps its producer so a panic anywhere in production becomes
//! an `Err` termination.
//!
//! Producers are plain async blocks that emit through a [`Yielder`]:
//!
//! ```
//! use keylookup_core::{Generator, FallibleSequence, Step};
//!
//! # futures::executor::block_on(async {
//! let mut numbers = Generator::<u32>::new(|y| async move {
//!     for n in 1..=3 {
//!         y.yield_item(n).await?;
//!     }
//!     Ok(())
//! });
//!
//! assert!(matches!(numbers.pull().await, Step::Item(1)));
//! # });
//! ```
//!
//! The producer is polled only from inside [`FallibleSequence::pull`], so it
//! never runs ahead of the consumer by more than the one item in flight.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::{poll_fn, BoxFuture};
use futures::FutureExt;

use crate::{Error, Result};

/// Outcome of a single pull
#[derive(Debug)]
pub enum Step<T, R = ()> {
    /// The next item
    Item(T),
    /// The sequence terminated; reported once
    Done(Result<R>),
    /// The sequence already reported its termination
    Exhausted,
}

impl<T, R> Step<T, R> {
    pub fn is_item(&self) -> bool {
        matches!(self, Step::Item(_))
    }
}

/// Pull-based sequence terminating with a [`Result`]
#[async_trait]
pub trait FallibleSequence<T: Send, R: Send = ()>: Send {
    /// Produce the next item or the termination
    async fn pull(&mut self) -> Step<T, R>;

    /// Terminate early
    ///
    /// `Ok` abandons the producer and returns the payload. `Err` is delivered
    /// to the producer as if its own pending step had failed, so it can unwind
    /// whatever it holds; its final outcome is returned.
    async fn close(&mut self, outcome: Result<R>) -> Result<R>;
}

#[async_trait]
impl<T: Send, R: Send + 'static, S: FallibleSequence<T, R> + ?Sized> FallibleSequence<T, R> for Box<S> {
    async fn pull(&mut self) -> Step<T, R> {
        (**self).pull().await
    }

    async fn close(&mut self, outcome: Result<R>) -> Result<R> {
        (**self).close(outcome).await
    }
}

/// Boxed sequence for returning across component boundaries
pub type BoxSequence<T, R = ()> = Box<dyn FallibleSequence<T, R>>;

struct Slot<T> {
    item: Option<T>,
    injected: Option<Error>,
    closing: bool,
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle a producer uses to emit items
pub struct Yielder<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Send> Yielder<T> {
    /// Hand `item` to the consumer and wait for the next pull
    ///
    /// Returns `Err` once the consumer closed the sequence with a failure;
    /// producers should propagate it with `?`.
    pub async fn yield_item(&self, item: T) -> Result<()> {
        {
            let mut slot = lock(&self.slot);
            if slot.closing {
                return Err(slot.injected.take().unwrap_or(Error::Closed));
            }
            slot.item = Some(item);
        }

        Suspend::default().await;

        let injected = lock(&self.slot).injected.take();
        match injected {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }
}

/// Pending exactly once, so the producer hands control back to `pull`
#[derive(Default)]
struct Suspend {
    suspended: bool,
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.suspended {
            Poll::Ready(())
        } else {
            self.suspended = true;
            Poll::Pending
        }
    }
}

/// [`FallibleSequence`] driven by an async producer
pub struct Generator<T, R = ()> {
    producer: Option<BoxFuture<'static, Result<R>>>,
    slot: Arc<Mutex<Slot<T>>>,
    started: bool,
}

impl<T: Send + 'static, R: Send + 'static> Generator<T, R> {
    /// Build a generator from a producer body
    ///
    /// The body does not run until the first pull.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Yielder<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot {
            item: None,
            injected: None,
            closing: false,
        }));
        let yielder = Yielder { slot: slot.clone() };

        let producer = AssertUnwindSafe(async move { body(yielder).await })
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|payload| Err(Error::from_panic(payload))))
            .boxed();

        Self {
            producer: Some(producer),
            slot,
            started: false,
        }
    }

    /// A sequence that yields `items` in order, then terminates with `outcome`
    pub fn from_items(items: Vec<T>, outcome: Result<R>) -> Self {
        Self::new(move |y| async move {
            for item in items {
                y.yield_item(item).await?;
            }
            outcome
        })
    }

    pub fn into_boxed(self) -> BoxSequence<T, R> {
        Box::new(self)
    }
}

#[async_trait]
impl<T: Send, R: Send> FallibleSequence<T, R> for Generator<T, R> {
    async fn pull(&mut self) -> Step<T, R> {
        let Some(producer) = self.producer.as_mut() else {
            return Step::Exhausted;
        };
        self.started = true;
        let slot = &self.slot;

        let step = poll_fn(|cx| match producer.as_mut().poll(cx) {
            Poll::Ready(outcome) => Poll::Ready(Step::Done(outcome)),
            Poll::Pending => match lock(slot).item.take() {
                Some(item) => Poll::Ready(Step::Item(item)),
                None => Poll::Pending,
            },
        })
        .await;

        if let Step::Done(_) = step {
            self.producer = None;
        }
        step
    }

    async fn close(&mut self, outcome: Result<R>) -> Result<R> {
        let Some(producer) = self.producer.take() else {
            return outcome;
        };

        match outcome {
            Ok(value) => {
                drop(producer);
                Ok(value)
            }
            Err(cause) if !self.started => Err(cause),
            Err(cause) => {
                {
                    let mut slot = lock(&self.slot);
                    slot.item = None;
                    slot.closing = true;
                    slot.injected = Some(cause);
                }
                producer.await
            }
        }
    }
}

/// Pull `sequence` to the end, collecting its items
///
/// A failed termination discards everything collected so far.
pub async fn drain<T, R, S>(sequence: &mut S) -> Result<(Vec<T>, R)>
where
    T: Send,
    R: Send,
    S: FallibleSequence<T, R> + ?Sized,
{
    let mut items = Vec::new();
    loop {
        match sequence.pull().await {
            Step::Item(item) => items.push(item),
            Step::Done(outcome) => return outcome.map(|value| (items, value)),
            Step::Exhausted => return Err(Error::Closed),
        }
    }
}
