use std::fmt;

/// Fatal errors that abort a render call
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("column '{column}' not found in {table} table (available: {available:?})")]
    Schema {
        table: &'static str,
        column: String,
        available: Vec<String>,
    },

    #[error("duplicate join key '{key}' in value table")]
    DuplicateKey { key: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("unsupported output format '{0}' (expected svg or png)")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;

impl MapError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MapError::Configuration(msg.into())
    }
}

/// Recoverable problems: the affected feature or layer was skipped and the
/// render carried on.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderWarning {
    /// Polygon was invalid and could not be repaired; it is not filled.
    InvalidGeometry { id: String },
    /// A country filter was configured but the column is missing.
    MissingFilterColumn { column: String },
    /// Reprojection failed; the layer kept its native CRS or was dropped.
    ReprojectionFailed { layer: String, reason: String },
    /// An optional layer (neighbors, water, an inset) was not drawn.
    LayerSkipped { layer: String, reason: String },
    /// A clipped label region had no intersection with its geometry.
    EmptyClip { id: String },
    /// A value cell could not be read as a number.
    NonNumericValue { key: String },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::InvalidGeometry { id } => {
                write!(f, "geometry for '{id}' is invalid and could not be repaired")
            }
            RenderWarning::MissingFilterColumn { column } => {
                write!(f, "filter column '{column}' is missing; filter skipped")
            }
            RenderWarning::ReprojectionFailed { layer, reason } => {
                write!(f, "reprojection of {layer} failed: {reason}")
            }
            RenderWarning::LayerSkipped { layer, reason } => {
                write!(f, "layer {layer} skipped: {reason}")
            }
            RenderWarning::EmptyClip { id } => {
                write!(f, "clipped label region for '{id}' is empty")
            }
            RenderWarning::NonNumericValue { key } => {
                write!(f, "value for '{key}' is not numeric")
            }
        }
    }
}

/// Side channel of a successful render: what was degraded and how the join went
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub warnings: Vec<RenderWarning>,
    /// Geometry rows with no matching value row
    pub unmatched_features: usize,
    /// Value rows whose key matched no geometry
    pub unused_values: usize,
    pub duplicate_keys: usize,
}

impl RenderReport {
    pub fn warn(&mut self, warning: RenderWarning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Names of layers that were skipped
    pub fn skipped_layers(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().filter_map(|w| match w {
            RenderWarning::LayerSkipped { layer, .. } => Some(layer.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_message() {
        let err = MapError::Schema {
            table: "value",
            column: "score".to_string(),
            available: vec!["location".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("score"));
        assert!(msg.contains("value table"));
    }

    #[test]
    fn test_report_collects_skipped_layers() {
        let mut report = RenderReport::default();
        report.warn(RenderWarning::LayerSkipped {
            layer: "water".to_string(),
            reason: "no source".to_string(),
        });
        report.warn(RenderWarning::EmptyClip { id: "MI".to_string() });
        assert!(report.has_warnings());
        assert_eq!(report.skipped_layers().collect::<Vec<_>>(), vec!["water"]);
    }
}
