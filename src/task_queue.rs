use crate::task::QueuedJob;

use crossbeam_channel::{self, Receiver, Sender};
use std::fmt;

/// An unbounded, multi-producer, single-consumer FIFO of jobs for one worker.
///
/// Sending never blocks. The only backpressure is the worker itself: a slow job
/// lets its queue grow.
#[derive(Debug)]
pub(crate) struct TaskQueue {
  tx: Sender<QueuedJob>,
  rx: Receiver<QueuedJob>,
}

impl TaskQueue {
  pub(crate) fn new() -> Self {
    let (tx, rx) = crossbeam_channel::unbounded();
    Self { tx, rx }
  }

  /// Splits the queue into its producer and consumer halves.
  pub(crate) fn split(self) -> (QueueProducer, QueueConsumer) {
    (QueueProducer { tx: self.tx }, QueueConsumer { rx: self.rx })
  }
}

/// The producer handle, held by the pool.
#[derive(Clone)]
pub(crate) struct QueueProducer {
  tx: Sender<QueuedJob>,
}

/// The consumer handle, owned by the worker thread. It cannot be cloned.
#[derive(Debug)]
pub(crate) struct QueueConsumer {
  rx: Receiver<QueuedJob>,
}

impl fmt::Debug for QueueProducer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueProducer")
      .field("len", &self.len())
      .finish_non_exhaustive()
  }
}

impl QueueProducer {
  /// Appends a job. Hands the job back if the consumer has gone away.
  pub(crate) fn send(&self, job: QueuedJob) -> Result<(), QueuedJob> {
    self.tx.send(job).map_err(|send_error| send_error.into_inner())
  }

  /// Returns the number of jobs waiting in the queue.
  pub(crate) fn len(&self) -> usize {
    self.tx.len()
  }
}

impl QueueConsumer {
  /// Blocks until a job is available. Returns `None` once every producer has
  /// been dropped and the queue is drained.
  pub(crate) fn recv(&self) -> Option<QueuedJob> {
    self.rx.recv().ok()
  }
}
