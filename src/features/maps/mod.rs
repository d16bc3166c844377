pub mod batch;
pub mod builder;
pub mod field_path;
pub mod manifest;
pub mod map_config;
pub mod models;
pub mod preview;
pub mod render;
pub mod staleness;

pub use batch::{BatchMode, run_batch, run_batch_outcomes};
pub use builder::{BuildOptions, BuildReport, LockSettings, MapBuilder, MapOutcome};
pub use field_path::{FieldPath, ScalarValue};
pub use manifest::{AggregateIndex, ManifestBuilder, ManifestOptions, build_aggregate_index};
pub use map_config::{Dimension, MapConfig, MapDefinition, MapOptions, MapRange, Shadows};
pub use models::{Manifest, WorldManifest};
pub use render::{MapRenderer, RenderInvocation, RenderKind, UnminedCli};
pub use staleness::is_up_to_date;
