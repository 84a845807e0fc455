use thiserror::Error;

/// A failure captured while a worker executed a parse job.
///
/// Delivered to the job's callback as the `Err` side of its result; it is
/// never rethrown on the worker thread.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkError {
  #[error("Raster image could not be decoded: {0}")]
  Decode(String),

  #[error("Geometry tile could not be parsed: {0}")]
  Parse(String),

  #[error("Work function panicked: {0}")]
  Panicked(String),
}

/// Errors that can occur while building or tearing down a `WorkerPool`.
#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
  #[error("A worker pool needs at least one thread")]
  NoWorkers,

  #[error("Failed to spawn worker thread {index}: {reason}")]
  ThreadSpawn { index: usize, reason: String },

  #[error("Worker thread {index} terminated by an uncaptured panic")]
  WorkerPanicked { index: usize },
}
