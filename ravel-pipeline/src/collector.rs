//! The terminal stage and its deferred result.
//!
//! A [`ResultCollector`] feeds items into a [`Reducer`] and publishes the
//! outcome exactly once through a oneshot channel. The receiving half,
//! [`CollectedResult`], is a future resolving to that outcome. If the
//! collector is dropped without publishing, for example because the run
//! was abandoned, the future resolves to [`PipelineError::Closed`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::PipelineError;
use crate::reducer::Reducer;
use crate::stage::Item;

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    /// The reduced result.
    pub result: T,
    /// The raw body text, when body collection was enabled.
    pub body: Option<String>,
}

type Outcome<T> = Result<Collected<T>, PipelineError>;

/// Folds items and publishes the result once.
pub struct ResultCollector<R: Reducer> {
    reducer: R,
    sender: oneshot::Sender<Outcome<R::Output>>,
    items: usize,
}

impl<R: Reducer> ResultCollector<R> {
    /// Creates a collector and the future that will observe its result.
    pub fn channel(reducer: R) -> (Self, CollectedResult<R::Output>) {
        let (sender, receiver) = oneshot::channel();
        let collector = Self {
            reducer,
            sender,
            items: 0,
        };
        (collector, CollectedResult { receiver })
    }

    /// Folds one item.
    pub fn push(&mut self, item: Item) -> Result<(), PipelineError> {
        self.items += 1;
        self.reducer.reduce(item)
    }

    /// Number of items folded so far.
    pub fn items(&self) -> usize {
        self.items
    }

    /// Publishes the reduced result.
    pub fn complete(self, body: Option<String>) {
        let outcome = self
            .reducer
            .finish()
            .map(|result| Collected { result, body });
        // The receiver may be gone; nobody is waiting then.
        let _ = self.sender.send(outcome);
    }

    /// Publishes a failure; folded items are discarded.
    pub fn fail(self, error: PipelineError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Deferred outcome of one pipeline run.
#[must_use = "a collected result does nothing unless awaited"]
pub struct CollectedResult<T> {
    receiver: oneshot::Receiver<Outcome<T>>,
}

impl<T> Future for CollectedResult<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PipelineError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
