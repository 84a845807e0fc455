use crate::error::WorkError;
use crate::handle::RequestState;
use crate::task::JobKind;
use crate::tile::{
  BucketMap, ImageDecoder, PlacementConfig, RasterBucket, RasterTileParseResult, TileParseResult, TileWorker,
};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

/// Per-thread execution state. Each worker owns exactly one and hands it to one
/// job at a time, so nothing in here is locked.
#[derive(Debug)]
pub(crate) struct JobContext {
  pool_name: Arc<String>,
  worker_index: usize,
  jobs_executed: u64,
  failures_captured: u64,
}

impl JobContext {
  pub(crate) fn new(pool_name: Arc<String>, worker_index: usize) -> Self {
    Self {
      pool_name,
      worker_index,
      jobs_executed: 0,
      failures_captured: 0,
    }
  }

  pub(crate) fn jobs_executed(&self) -> u64 {
    self.jobs_executed
  }

  pub(crate) fn failures_captured(&self) -> u64 {
    self.failures_captured
  }

  pub(crate) fn parse_raster_tile<D, B>(
    &mut self,
    decoder: &D,
    mut bucket: Box<B>,
    data: &[u8],
  ) -> RasterTileParseResult<B>
  where
    D: ImageDecoder,
    B: RasterBucket<Image = D::Image>,
  {
    self.capture(JobKind::DecodeRaster, move || {
      let image = decoder.decode(data)?;
      bucket.set_image(image)?;
      Ok(bucket)
    })
  }

  pub(crate) fn parse_geometry_tile<W: TileWorker>(
    &mut self,
    worker: &W,
    layers: Vec<W::Layer>,
    tile: &W::Tile,
    config: PlacementConfig,
  ) -> TileParseResult<W::Outcome> {
    self.capture(JobKind::ParseGeometryTile, move || {
      worker.parse_all_layers(layers, tile, config)
    })
  }

  pub(crate) fn parse_pending_geometry_tile_layers<W: TileWorker>(
    &mut self,
    worker: &W,
    config: PlacementConfig,
  ) -> TileParseResult<W::Outcome> {
    self.capture(JobKind::ParsePendingLayers, move || worker.parse_pending_layers(config))
  }

  /// Not wrapped in failure capture: a panic here unwinds out of the worker.
  pub(crate) fn redo_placement<W: TileWorker>(
    &mut self,
    worker: &W,
    buckets: &BucketMap<W::Bucket>,
    config: PlacementConfig,
  ) {
    self.jobs_executed += 1;
    worker.redo_placement(buckets, config);
  }

  /// Hands a finished result to the caller unless its request was dropped.
  pub(crate) fn deliver<F: FnOnce()>(&self, state: &RequestState, kind: JobKind, callback: F) {
    if state.deliver(callback) {
      trace!(pool_name = %*self.pool_name, worker = self.worker_index, %kind, "Result delivered.");
    } else {
      debug!(
        pool_name = %*self.pool_name,
        worker = self.worker_index,
        %kind,
        "WorkRequest dropped while job was running. Result discarded."
      );
    }
  }

  fn capture<T, F>(&mut self, kind: JobKind, work: F) -> Result<T, WorkError>
  where
    F: FnOnce() -> Result<T, WorkError>,
  {
    self.jobs_executed += 1;
    let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
      Ok(result) => result,
      Err(payload) => Err(WorkError::Panicked(panic_message(payload.as_ref()))),
    };

    if let Err(ref work_error) = outcome {
      self.failures_captured += 1;
      warn!(
        pool_name = %*self.pool_name,
        worker = self.worker_index,
        %kind,
        error = %work_error,
        "Job failed. Delivering failure to callback."
      );
    }
    outcome
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
