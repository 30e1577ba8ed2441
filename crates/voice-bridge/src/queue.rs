//! Ordered, closable channel between the run task and the consumer.
//!
//! The buffer is unbounded: `put` never waits, and a single conversational
//! turn produces a bounded number of items.

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc;

/// Producer half. `close` is idempotent; `put` after close is dropped.
pub struct OutputQueue<T> {
    tx: Mutex<Option<mpsc::UnboundedSender<T>>>,
}

/// Consumer half: yields items in push order until the queue is closed and
/// drained. Single consumer, not restartable.
pub struct QueueReader<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

/// Creates a connected queue/reader pair.
pub fn output_queue<T>() -> (OutputQueue<T>, QueueReader<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        OutputQueue {
            tx: Mutex::new(Some(tx)),
        },
        QueueReader { rx },
    )
}

impl<T> OutputQueue<T> {
    /// Appends an item. Returns `false` if the queue is closed or the reader
    /// has gone away.
    pub fn put(&self, item: T) -> bool {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Closes the queue. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T> QueueReader<T> {
    /// Waits for the next item; `None` once closed and drained.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> futures::Stream for QueueReader<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    #[tokio::test]
    async fn yields_in_push_order_then_ends() {
        let (queue, reader) = output_queue();
        assert!(queue.put(1));
        assert!(queue.put(2));
        assert!(queue.put(3));
        assert!(queue.close());
        assert_eq!(reader.collect::<Vec<_>>().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_put_after_close_is_dropped() {
        let (queue, mut reader) = output_queue();
        assert!(queue.put("a"));
        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());
        assert!(!queue.put("b"));
        assert_eq!(reader.next().await, Some("a"));
        assert_eq!(reader.next().await, None);
    }

    #[tokio::test]
    async fn reader_waits_for_producer() {
        let (queue, mut reader) = output_queue();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            queue.put("late");
            queue.close();
        });
        assert_eq!(reader.next().await, Some("late"));
        assert_eq!(reader.next().await, None);
        producer.await.expect("producer");
    }
}
