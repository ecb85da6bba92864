//! Output artifacts for a rendered [`Scene`]
//!
//! SVG is written directly; PNG rasterizes the same document with resvg so
//! both formats show identical layouts.

mod svg;

pub use svg::{rasterize, SvgSurface};

use crate::error::{MapError, Result};
use crate::map::Scene;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl OutputFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| MapError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(OutputFormat::Svg),
            "png" => Ok(OutputFormat::Png),
            other => Err(MapError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Replay `scene` into an SVG document
pub fn render_svg(scene: &Scene) -> String {
    let mut surface = SvgSurface::new();
    scene.replay(&mut surface);
    surface.into_string()
}

/// Encode `scene` in `format`
pub fn encode(scene: &Scene, format: OutputFormat) -> Result<Vec<u8>> {
    let svg = render_svg(scene);
    match format {
        OutputFormat::Svg => Ok(svg.into_bytes()),
        OutputFormat::Png => rasterize(&svg),
    }
}

/// Write `scene` to `path`
pub fn write_artifact(scene: &Scene, path: &Path, format: OutputFormat) -> Result<()> {
    let bytes = encode(scene, format)?;
    fs::write(path, &bytes)?;
    tracing::info!(path = %path.display(), %format, bytes = bytes.len(), "wrote map");
    Ok(())
}
