//! Spritesheet tooling for content production.
//!
//! The core is gap-based frame segmentation: [`profile`] reduces an image's alpha channel
//! to per-column/per-row occupancy, [`intervals`] turns occupancy into content runs,
//! [`grid`] crosses the runs into frame rectangles and [`make_image`] crops, scales and
//! centers every frame into a fixed-size canvas. [`pipeline`] ties these together over
//! an [`loader::ImageStore`].

pub mod audit;
pub mod background;
pub mod config;
pub mod grid;
pub mod intervals;
pub mod loader;
pub mod make_image;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod wrappers;

pub use config::{AssetCategory, AssetProfile, SlicerConfig};
pub use grid::{detect_grid, DetectedGrid, ExpectedLayout, FrameRect};
pub use intervals::{content_intervals, equal_division, ContentInterval, GapConfig};
pub use make_image::{normalize_frame, NormalizeConfig, ScaleMode};
pub use pipeline::{run_batch, slice_sheet, BatchJob, BatchReport};
pub use profile::occupancy_profile;
pub use wrappers::Axis;
