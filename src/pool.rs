use crate::context::JobContext;
use crate::error::PoolError;
use crate::handle::{RequestState, WorkRequest};
use crate::task::{next_request_id, JobKind, QueuedJob, ThreadContext};
use crate::tile::{
  BucketMap, ImageDecoder, PlacementConfig, RasterBucket, RasterTileParseResult, TileParseResult, TileWorker,
};
use crate::worker::{ActiveJobs, WorkerThread};

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{self, debug, error, info, trace};

/// A fixed set of background threads that parse tiles for the caller.
///
/// Every dispatch method picks the next thread round-robin, queues the job
/// there and returns immediately with a [`WorkRequest`]. Callbacks run on the
/// worker thread that executed the job. Jobs sent to the same thread run in
/// submission order; there is no ordering between threads.
///
/// Dropping the pool lets every thread finish its queued jobs and joins it.
/// Dropped from inside one of its own callbacks, the calling worker is detached
/// rather than joined and finishes its queue on its own.
#[derive(Debug)]
pub struct WorkerPool {
  pool_name: Arc<String>,
  threads: Vec<WorkerThread>,
  cursor: AtomicUsize,
  active_jobs: ActiveJobs,
}

impl WorkerPool {
  /// Starts `count` threads classified by `thread_context`.
  pub fn new(count: usize, thread_context: ThreadContext) -> Result<Self, PoolError> {
    if count == 0 {
      return Err(PoolError::NoWorkers);
    }

    let pool_name = Arc::new(thread_context.name.clone());
    let active_jobs: ActiveJobs = Arc::new(DashMap::new());
    let mut threads = Vec::with_capacity(count);

    for index in 0..count {
      match WorkerThread::spawn(index, &thread_context, pool_name.clone(), active_jobs.clone()) {
        Ok(thread) => threads.push(thread),
        Err(spawn_error) => {
          error!(pool_name = %*pool_name, worker = index, "Could not start worker pool: {}", spawn_error);
          for started in threads.iter_mut() {
            if let Err(join_error) = started.join() {
              debug!(pool_name = %*pool_name, "Worker stopped abnormally during failed startup: {}", join_error);
            }
          }
          return Err(spawn_error);
        }
      }
    }

    info!(pool_name = %*pool_name, threads = count, priority = ?thread_context.priority, "Worker pool started.");

    Ok(Self {
      pool_name,
      threads,
      cursor: AtomicUsize::new(0),
      active_jobs,
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn thread_count(&self) -> usize {
    self.threads.len()
  }

  /// Returns the number of jobs waiting in all worker queues.
  pub fn queued_job_count(&self) -> usize {
    self.threads.iter().map(WorkerThread::queued_len).sum()
  }

  /// Returns the number of jobs a worker is executing right now.
  pub fn active_job_count(&self) -> usize {
    self.active_jobs.len()
  }

  /// Decodes `data` with `decoder` and attaches the image to `bucket`.
  ///
  /// The callback receives the bucket back on success, or the captured failure.
  pub fn parse_raster_tile<D, B, F>(
    &self,
    decoder: Arc<D>,
    bucket: Box<B>,
    data: Arc<[u8]>,
    callback: F,
  ) -> WorkRequest
  where
    D: ImageDecoder,
    B: RasterBucket<Image = D::Image>,
    F: FnOnce(RasterTileParseResult<B>) + Send + 'static,
  {
    self.dispatch(JobKind::DecodeRaster, move |context, state| {
      let result = context.parse_raster_tile(&*decoder, bucket, &data);
      context.deliver(state, JobKind::DecodeRaster, move || callback(result));
    })
  }

  /// Parses every layer of a geometry tile.
  pub fn parse_geometry_tile<W, F>(
    &self,
    worker: Arc<W>,
    layers: Vec<W::Layer>,
    tile: Box<W::Tile>,
    config: PlacementConfig,
    callback: F,
  ) -> WorkRequest
  where
    W: TileWorker,
    F: FnOnce(TileParseResult<W::Outcome>) + Send + 'static,
  {
    self.dispatch(JobKind::ParseGeometryTile, move |context, state| {
      let result = context.parse_geometry_tile(&*worker, layers, &tile, config);
      context.deliver(state, JobKind::ParseGeometryTile, move || callback(result));
    })
  }

  /// Resumes layers a previous parse left pending.
  pub fn parse_pending_geometry_tile_layers<W, F>(
    &self,
    worker: Arc<W>,
    config: PlacementConfig,
    callback: F,
  ) -> WorkRequest
  where
    W: TileWorker,
    F: FnOnce(TileParseResult<W::Outcome>) + Send + 'static,
  {
    self.dispatch(JobKind::ParsePendingLayers, move |context, state| {
      let result = context.parse_pending_geometry_tile_layers(&*worker, config);
      context.deliver(state, JobKind::ParsePendingLayers, move || callback(result));
    })
  }

  /// Recomputes label placement over `buckets`.
  ///
  /// The caller must not mutate `buckets` while the job holds them. A panic in
  /// [`TileWorker::redo_placement`] is not captured: it is logged and the
  /// process aborts.
  pub fn redo_placement<W, F>(
    &self,
    worker: Arc<W>,
    buckets: Arc<BucketMap<W::Bucket>>,
    config: PlacementConfig,
    callback: F,
  ) -> WorkRequest
  where
    W: TileWorker,
    F: FnOnce() + Send + 'static,
  {
    self.dispatch(JobKind::RedoPlacement, move |context, state| {
      context.redo_placement(&*worker, &buckets, config);
      context.deliver(state, JobKind::RedoPlacement, callback);
    })
  }

  /// Stops accepting work, lets every thread drain its queue and joins them.
  ///
  /// # Errors
  /// Returns `PoolError::WorkerPanicked` for the first thread that terminated
  /// abnormally outside a job. All threads are joined regardless.
  pub fn shutdown(mut self) -> Result<(), PoolError> {
    info!(pool_name = %*self.pool_name, "Shutting down worker pool.");
    self.join_all()
  }

  fn join_all(&mut self) -> Result<(), PoolError> {
    for thread in self.threads.iter_mut() {
      thread.close();
    }

    let mut first_failure = None;
    for thread in self.threads.iter_mut() {
      if let Err(join_error) = thread.join() {
        first_failure.get_or_insert(join_error);
      }
    }

    match first_failure {
      Some(join_error) => Err(join_error),
      None => {
        trace!(pool_name = %*self.pool_name, "All worker threads joined.");
        Ok(())
      }
    }
  }

  /// Picks the next thread and queues `job` on it.
  fn dispatch<J>(&self, kind: JobKind, job: J) -> WorkRequest
  where
    J: FnOnce(&mut JobContext, &RequestState) + Send + 'static,
  {
    let thread_count = self.threads.len();
    let index = self
      .cursor
      .fetch_update(AtomicOrdering::Relaxed, AtomicOrdering::Relaxed, |current| {
        Some((current + 1) % thread_count)
      })
      .unwrap_or_else(|current| current);

    let request_id = next_request_id();
    let state = RequestState::new(request_id);
    let queued = QueuedJob {
      request_id,
      kind,
      state: state.clone(),
      run: Box::new(job),
    };

    debug!(pool_name = %*self.pool_name, worker = index, %request_id, %kind, "Dispatching job.");

    if let Err(rejected) = self.threads[index].enqueue(queued) {
      error!(
        pool_name = %*self.pool_name,
        worker = index,
        request_id = rejected.request_id,
        %kind,
        "Worker thread is gone. Job dropped without running."
      );
    }

    WorkRequest::new(state)
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    if let Err(join_error) = self.join_all() {
      tracing::warn!(pool_name = %*self.pool_name, "Worker pool dropped after a worker failed: {}", join_error);
    } else {
      debug!(pool_name = %*self.pool_name, "Worker pool dropped. All threads joined.");
    }
  }
}
