//! A fixed-size pool of background threads that takes CPU-bound tile parsing
//! (raster decoding, geometry layer parsing, label placement) off the calling
//! thread, with round-robin dispatch and cancelable work requests.

mod context;
mod error;
mod handle;
mod pool;
mod task;
mod task_queue;
mod tile;
mod worker;

pub use error::{PoolError, WorkError};
pub use handle::WorkRequest;
pub use pool::WorkerPool;
pub use task::{ThreadContext, ThreadPriority, ThreadType};
pub use tile::{
  BucketMap, ImageDecoder, PlacementConfig, RasterBucket, RasterTileParseResult, TileParseResult, TileWorker,
};
pub use worker::current_worker_index;
