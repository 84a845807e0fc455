use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tile_workers::{BucketMap, PlacementConfig, ThreadContext, TileWorker, WorkError, WorkerPool};
use tracing::info;

// Sleeps while "parsing" so later jobs pile up behind it.
struct SlowParser {
  delay: Duration,
  parsed: Mutex<u32>,
}

impl TileWorker for SlowParser {
  type Layer = ();
  type Tile = ();
  type Bucket = ();
  type Outcome = u32;

  fn parse_all_layers(&self, _layers: Vec<()>, _tile: &(), config: PlacementConfig) -> Result<u32, WorkError> {
    self.parse_pending_layers(config)
  }

  fn parse_pending_layers(&self, _config: PlacementConfig) -> Result<u32, WorkError> {
    std::thread::sleep(self.delay);
    let mut parsed = self.parsed.lock().map_err(|_| WorkError::Parse("parser state poisoned".to_string()))?;
    *parsed += 1;
    Ok(*parsed)
  }

  fn redo_placement(&self, _buckets: &BucketMap<()>, _config: PlacementConfig) {}
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Individual Cancellation Example ---");

  let pool = WorkerPool::new(1, ThreadContext::default()).expect("Failed to start worker pool");
  let parser = Arc::new(SlowParser {
    delay: Duration::from_millis(300),
    parsed: Mutex::new(0),
  });
  let (tx, rx) = mpsc::channel();

  let mut requests = Vec::new();
  for tile in 0..3 {
    let tx = tx.clone();
    requests.push(pool.parse_pending_geometry_tile_layers(parser.clone(), PlacementConfig::default(), move |result| {
      let _ = tx.send((tile, result));
    }));
  }
  drop(tx);

  info!("Dropping the request for tile 1 while it is still queued.");
  let canceled = requests.remove(1);
  drop(canceled);

  for (tile, result) in rx.iter() {
    info!("Tile {} delivered: {:?}", tile, result);
    if tile == 2 {
      break;
    }
  }

  drop(requests);
  pool.shutdown().expect("Worker pool shutdown failed");
  info!("--- Individual Cancellation Example End ---");
}
