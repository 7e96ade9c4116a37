//! Sync/async bridge and iteration layer over a blocking native
//! geospatial data-access library.
//!
//! The native collaborator is callable only as blocking, non-reentrant
//! entry points. This crate wraps it twice over one shared core:
//!
//! - a **synchronous façade** ([`facade`]) that validates handle state and
//!   runs the native call on the caller's thread;
//! - an **async bridge** ([`bridge`]) that schedules the same calls on a
//!   bounded worker pool, serializing work per native object while letting
//!   independent objects run in parallel, with per-item cancellation and a
//!   [`progress`] channel for long-running algorithms.
//!
//! Resource lifetime is tracked by a process-global [`handle`] registry:
//! wrappers own handles, closing a dataset invalidates every subordinate
//! wrapper, and release hooks run exactly once. Collections come in three
//! iteration shapes ([`iter`]), each with callback, blocking-pull, and
//! async-pull forms.
//!
//! # Example
//!
//! ```ignore
//! use geobridge::{alg, Bridge, BridgeConfig, Dataset};
//!
//! let bridge = Bridge::new(BridgeConfig::default());
//! let dataset = Dataset::open_memory_raster(256, 256, 1)?;
//! let band = dataset.bands()?.get(1)?;
//!
//! let sum = alg::checksum_image_async(&bridge, &band, None).wait().await?;
//! println!("checksum: {sum}");
//! ```

pub mod alg;
pub mod bridge;
pub mod config;
pub mod dataset;
pub mod error;
pub mod facade;
pub mod handle;
pub mod iter;
pub mod logging;
pub mod native;
pub mod progress;
pub mod vector;

pub use bridge::{Bridge, WorkHandle};
pub use config::BridgeConfig;
pub use dataset::{Dataset, DatasetBands, RasterBand};
pub use error::{BridgeError, Result};
pub use handle::{registry, Handle, HandleId, HandleRegistry};
pub use logging::{init_logging, LoggingGuard};
pub use native::{Connectedness, FieldType, FieldValue, GeometryType, NativeGeometry};
pub use progress::{ProgressReceiver, ProgressSink, ProgressTick};
pub use vector::{Feature, FeatureFields, Geometry, Layer, LayerFeatures};
