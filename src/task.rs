use crate::handle::RequestState;
use crate::context::JobContext;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

lazy_static::lazy_static! {
  static ref NEXT_WORK_REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

pub(crate) fn next_request_id() -> u64 {
  NEXT_WORK_REQUEST_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// What a thread is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadType {
  Map,
  Worker,
  Unknown,
}

/// Scheduling priority requested for a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPriority {
  Regular,
  Low,
}

/// Classification applied to every thread of a pool.
///
/// Threads are named `"{name}-{index}"`. The priority is recorded and logged;
/// mapping it onto the OS scheduler is left to the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
  pub name: String,
  pub thread_type: ThreadType,
  pub priority: ThreadPriority,
}

impl ThreadContext {
  pub fn new(name: impl Into<String>, thread_type: ThreadType, priority: ThreadPriority) -> Self {
    Self {
      name: name.into(),
      thread_type,
      priority,
    }
  }
}

impl Default for ThreadContext {
  fn default() -> Self {
    Self::new("Worker", ThreadType::Worker, ThreadPriority::Low)
  }
}

/// The four kinds of work a pool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  DecodeRaster,
  ParseGeometryTile,
  ParsePendingLayers,
  RedoPlacement,
}

impl fmt::Display for JobKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      JobKind::DecodeRaster => "decode_raster",
      JobKind::ParseGeometryTile => "parse_geometry_tile",
      JobKind::ParsePendingLayers => "parse_pending_layers",
      JobKind::RedoPlacement => "redo_placement",
    };
    f.write_str(name)
  }
}

/// The closure a worker runs. It gets exclusive access to the worker's context
/// and the request state it must deliver through.
pub(crate) type JobFn = Box<dyn FnOnce(&mut JobContext, &RequestState) + Send + 'static>;

/// Internal representation of a job sitting in a worker's queue.
pub(crate) struct QueuedJob {
  pub(crate) request_id: u64,
  pub(crate) kind: JobKind,
  pub(crate) state: Arc<RequestState>,
  pub(crate) run: JobFn,
}

impl fmt::Debug for QueuedJob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueuedJob")
      .field("request_id", &self.request_id)
      .field("kind", &self.kind)
      .field("canceled", &self.state.is_canceled())
      .finish_non_exhaustive()
  }
}
