use crate::context::JobContext;
use crate::error::PoolError;
use crate::task::{JobKind, QueuedJob, ThreadContext};
use crate::task_queue::{QueueConsumer, QueueProducer, TaskQueue};

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use tracing::{debug, error, info, info_span, trace};

thread_local! {
  /// Index of the pool worker running on this thread, set once at startup.
  static WORKER_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Returns the index of the pool worker executing the current thread, or `None`
/// when called from a thread that does not belong to a `WorkerPool`.
pub fn current_worker_index() -> Option<usize> {
  WORKER_INDEX.with(|index| index.get())
}

/// Jobs currently executing across a pool, keyed by request id.
pub(crate) type ActiveJobs = Arc<DashMap<u64, JobKind>>;

/// Removes a job from the active map, also when its closure unwinds.
struct ActiveGuard<'a> {
  active: &'a DashMap<u64, JobKind>,
  request_id: u64,
}

impl Drop for ActiveGuard<'_> {
  fn drop(&mut self) {
    self.active.remove(&self.request_id);
  }
}

/// One OS thread running queued jobs strictly one after another.
#[derive(Debug)]
pub(crate) struct WorkerThread {
  index: usize,
  producer: Option<QueueProducer>,
  join_handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
  pub(crate) fn spawn(
    index: usize,
    thread_context: &ThreadContext,
    pool_name: Arc<String>,
    active: ActiveJobs,
  ) -> Result<Self, PoolError> {
    let (producer, consumer) = TaskQueue::new().split();

    let thread_name = format!("{}-{}", thread_context.name, index);
    let priority = thread_context.priority;
    let thread_type = thread_context.thread_type;

    let join_handle = thread::Builder::new()
      .name(thread_name)
      .spawn(move || {
        WORKER_INDEX.with(|slot| slot.set(Some(index)));
        let span = info_span!("worker_thread", pool_name = %*pool_name, worker = index);
        let _entered = span.enter();
        info!(?thread_type, ?priority, "Worker thread started.");
        Self::run_loop(JobContext::new(pool_name.clone(), index), consumer, active);
      })
      .map_err(|io_error| PoolError::ThreadSpawn {
        index,
        reason: io_error.to_string(),
      })?;

    Ok(Self {
      index,
      producer: Some(producer),
      join_handle: Some(join_handle),
    })
  }

  fn run_loop(mut context: JobContext, consumer: QueueConsumer, active: ActiveJobs) {
    while let Some(job) = consumer.recv() {
      let QueuedJob {
        request_id,
        kind,
        state,
        run,
      } = job;

      if state.is_canceled() {
        debug!(%request_id, %kind, "Dequeued job whose WorkRequest was already dropped. Skipping.");
        continue;
      }

      active.insert(request_id, kind);
      let _active_guard = ActiveGuard {
        active: &active,
        request_id,
      };
      let span = info_span!("worker_job", %request_id, %kind);
      let _entered = span.enter();
      trace!("Executing job.");
      // Parse failures are captured inside the job. Anything that unwinds this
      // far is an invariant violation and takes the process down.
      if panic::catch_unwind(AssertUnwindSafe(|| run(&mut context, &state))).is_err() {
        error!("Uncaptured panic in job. Aborting the process.");
        process::abort();
      }
    }

    info!(
      jobs_executed = context.jobs_executed(),
      failures_captured = context.failures_captured(),
      "Queue closed. Worker thread stopping."
    );
  }

  /// Appends a job to this worker's queue. Hands the job back if the thread is gone.
  pub(crate) fn enqueue(&self, job: QueuedJob) -> Result<(), QueuedJob> {
    match &self.producer {
      Some(producer) => producer.send(job),
      None => Err(job),
    }
  }

  pub(crate) fn queued_len(&self) -> usize {
    self.producer.as_ref().map_or(0, QueueProducer::len)
  }

  /// Closes the queue. The thread finishes the jobs already queued, then exits.
  pub(crate) fn close(&mut self) {
    self.producer.take();
  }

  /// Closes the queue and waits for the thread to exit.
  ///
  /// Called from the worker's own thread, the handle is detached instead: the
  /// thread exits on its own once the running job returns and the queue drains.
  pub(crate) fn join(&mut self) -> Result<(), PoolError> {
    self.close();
    match self.join_handle.take() {
      Some(handle) if handle.thread().id() == thread::current().id() => {
        error!(worker = self.index, "Worker pool dropped from its own worker thread. Detaching instead of joining.");
        Ok(())
      }
      Some(handle) => handle.join().map_err(|_panic_payload| {
        error!(worker = self.index, "Worker thread terminated by a panic.");
        PoolError::WorkerPanicked { index: self.index }
      }),
      None => Ok(()),
    }
  }
}
