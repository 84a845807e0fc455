//! Interfaces to the parsing code the pool runs.
//!
//! The pool never looks inside images, layers, tiles or buckets. It only moves
//! them between threads and calls these traits on a worker.

use crate::error::WorkError;

use std::collections::HashMap;

/// Label placement parameters forwarded to every geometry job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlacementConfig {
  pub angle: f32,
  pub pitch: f32,
  pub debug: bool,
}

/// Buckets of an already parsed tile, keyed by layer id.
pub type BucketMap<B> = HashMap<String, B>;

/// Turns encoded raster bytes (PNG, JPEG, WebP...) into an image.
pub trait ImageDecoder: Send + Sync + 'static {
  type Image;

  fn decode(&self, data: &[u8]) -> Result<Self::Image, WorkError>;
}

/// A raster bucket under construction, moved onto the worker for decoding.
pub trait RasterBucket: Send + 'static {
  type Image;

  fn set_image(&mut self, image: Self::Image) -> Result<(), WorkError>;
}

/// Per-tile parser state.
///
/// The pool shares a worker between the caller and one job at a time; the
/// caller must not dispatch two jobs for the same tile concurrently.
/// Implementors provide their own interior mutability.
pub trait TileWorker: Send + Sync + 'static {
  type Layer: Send + 'static;
  type Tile: Send + 'static;
  type Bucket: Send + Sync + 'static;
  type Outcome: Send + 'static;

  fn parse_all_layers(
    &self,
    layers: Vec<Self::Layer>,
    tile: &Self::Tile,
    config: PlacementConfig,
  ) -> Result<Self::Outcome, WorkError>;

  /// Continues a parse that was waiting on dependencies such as glyphs or icons.
  fn parse_pending_layers(&self, config: PlacementConfig) -> Result<Self::Outcome, WorkError>;

  /// Recomputes label placement over buckets that were already parsed.
  /// Panics here are invariant violations and are not captured by the pool.
  fn redo_placement(&self, buckets: &BucketMap<Self::Bucket>, config: PlacementConfig);
}

/// Result delivered for a raster decode job.
pub type RasterTileParseResult<B> = Result<Box<B>, WorkError>;

/// Result delivered for both geometry parse jobs.
pub type TileParseResult<O> = Result<O, WorkError>;
