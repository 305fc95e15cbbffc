//! Bounded work queues connecting the pipeline stages.
//!
//! Items travel wrapped in an [`Envelope`]. A normal end of input is an
//! explicit [`Envelope::EndOfStream`]; a queue that closes without one means
//! the producing stage failed.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    Item(T),
    EndOfStream,
}

pub type QueueSender<T> = mpsc::Sender<Envelope<T>>;
pub type QueueReceiver<T> = mpsc::Receiver<Envelope<T>>;

/// Creates a FIFO queue holding at most `capacity` envelopes.
///
/// Sending blocks while the queue is full; receiving blocks while it is empty.
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    mpsc::channel(capacity)
}
