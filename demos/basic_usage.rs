use std::sync::mpsc;
use std::sync::Arc;
use tile_workers::{
  BucketMap, ImageDecoder, PlacementConfig, RasterBucket, ThreadContext, TileWorker, WorkError, WorkerPool,
};
use tracing::info;

struct LengthDecoder;

impl ImageDecoder for LengthDecoder {
  type Image = usize;

  fn decode(&self, data: &[u8]) -> Result<usize, WorkError> {
    Ok(data.len())
  }
}

#[derive(Debug, Default)]
struct Raster {
  pixels: usize,
}

impl RasterBucket for Raster {
  type Image = usize;

  fn set_image(&mut self, image: usize) -> Result<(), WorkError> {
    self.pixels = image;
    Ok(())
  }
}

struct LayerNamer;

impl TileWorker for LayerNamer {
  type Layer = &'static str;
  type Tile = String;
  type Bucket = ();
  type Outcome = Vec<String>;

  fn parse_all_layers(
    &self,
    layers: Vec<&'static str>,
    tile: &String,
    _config: PlacementConfig,
  ) -> Result<Vec<String>, WorkError> {
    Ok(layers.iter().map(|layer| format!("{}:{}", tile, layer)).collect())
  }

  fn parse_pending_layers(&self, _config: PlacementConfig) -> Result<Vec<String>, WorkError> {
    Ok(Vec::new())
  }

  fn redo_placement(&self, _buckets: &BucketMap<()>, _config: PlacementConfig) {}
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  let pool = WorkerPool::new(2, ThreadContext::default()).expect("Failed to start worker pool");
  let (tx, rx) = mpsc::channel();

  let raster_tx = tx.clone();
  let raster_request = pool.parse_raster_tile(
    Arc::new(LengthDecoder),
    Box::new(Raster::default()),
    Arc::from(&b"not really a png"[..]),
    move |result| {
      let _ = raster_tx.send(format!("raster: {:?}", result));
    },
  );

  let tile_request = pool.parse_geometry_tile(
    Arc::new(LayerNamer),
    vec!["water", "roads"],
    Box::new("12/654/1583".to_string()),
    PlacementConfig::default(),
    move |result| {
      let _ = tx.send(format!("tile: {:?}", result));
    },
  );

  for line in rx.iter().take(2) {
    info!("{}", line);
  }

  drop(raster_request);
  drop(tile_request);
  pool.shutdown().expect("Worker pool shutdown failed");
  info!("--- Basic Usage Example End ---");
}
