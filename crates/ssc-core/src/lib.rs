//! Settlement-structure complexity (SSC): per-feature urban-mask metrics, the
//! SSC index, its normalization and classification, and stratified random
//! sampling over coarse climate zones.

pub mod classify;
pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod feature;
pub mod io;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod raster;
pub mod raster_join;
pub mod sampler;
pub mod tiling;
pub mod zones;

mod par;

pub use classify::SscClass;
pub use config::{ClassThresholds, PipelineConfig};
pub use engine::{Connectivity, GeoEngine, GridEngine, Reducer};
pub use error::{FailureSummary, Result, SscError};
pub use feature::{AttrValue, Attributes, Feature, FeatureCollection, FeatureId};
pub use pipeline::{IndexRun, PipelineRun, SscPipeline, StratifyRun};
pub use raster::Raster;
pub use zones::{ClimateRangeTable, CoarseZone, ZoneIndex};
