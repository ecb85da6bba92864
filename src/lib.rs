//! Choropleth map rendering.
//!
//! Region polygons are joined to a value table, split into a main view,
//! insets and context layers, and composed into a [`map::Scene`] that can be
//! written as SVG or PNG, or previewed in the terminal.
//!
//! ```no_run
//! use choromap::{data, surface, MapInputs, RenderConfig, Renderer};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RenderConfig::from_path("map.json")?;
//! let level1 = data::load_collection(Path::new("states.geojson"), &config.data_hints.geo_join_column)?;
//! let values = data::load_values(
//!     Path::new("values.json"),
//!     &config.data_hints.location_column,
//!     &config.data_hints.value_column,
//! )?;
//! let output = Renderer::new(config).render(&MapInputs {
//!     level1: &level1,
//!     values: &values,
//!     context: Default::default(),
//! })?;
//! surface::write_artifact(&output.scene, Path::new("map.svg"), surface::OutputFormat::Svg)?;
//! # Ok(())
//! # }
//! ```

pub mod braille;
pub mod config;
pub mod data;
pub mod error;
pub mod feature;
pub mod join;
pub mod map;
pub mod partition;
pub mod surface;

pub use config::RenderConfig;
pub use error::{MapError, RenderReport, RenderWarning, Result};
pub use feature::{CellValue, GeometryCollection, GeometryFeature, MergedFeature, ValueTable};
pub use map::{MapInputs, RenderOutput, Renderer};
pub use partition::ContextSources;
