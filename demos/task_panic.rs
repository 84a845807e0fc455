use std::sync::mpsc;
use std::sync::Arc;
use tile_workers::{BucketMap, PlacementConfig, ThreadContext, TileWorker, WorkError, WorkerPool};
use tracing::{info, warn};

struct BrokenParser;

impl TileWorker for BrokenParser {
  type Layer = String;
  type Tile = Vec<u8>;
  type Bucket = u8;
  type Outcome = ();

  fn parse_all_layers(&self, _layers: Vec<String>, tile: &Vec<u8>, _config: PlacementConfig) -> Result<(), WorkError> {
    info!("Parsing {} bytes, about to panic!", tile.len());
    panic!("feature geometry has an odd number of coordinates");
  }

  fn parse_pending_layers(&self, _config: PlacementConfig) -> Result<(), WorkError> {
    Ok(())
  }

  fn redo_placement(&self, _buckets: &BucketMap<u8>, _config: PlacementConfig) {
    panic!("collision index out of sync with buckets");
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let pool = WorkerPool::new(1, ThreadContext::default()).expect("Failed to start worker pool");
  let parser = Arc::new(BrokenParser);
  let (tx, rx) = mpsc::channel();

  let parse_request = pool.parse_geometry_tile(
    parser.clone(),
    vec!["roads".to_string()],
    Box::new(vec![0x1a, 0x02]),
    PlacementConfig::default(),
    move |result| {
      let _ = tx.send(result);
    },
  );

  match rx.recv() {
    Ok(Err(WorkError::Panicked(message))) => info!("Parse panic was captured and delivered: {}", message),
    other => warn!("Unexpected delivery: {:?}", other),
  }
  drop(parse_request);

  // Placement panics are not captured: `pool.redo_placement(parser, ...)` here
  // would log the panic and abort the whole process.
  pool.shutdown().expect("Worker pool shutdown failed");
  info!("--- Task Panic Example End ---");
}
