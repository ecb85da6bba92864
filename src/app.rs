use anyhow::{Context, Result};
use choromap::braille::{BrailleCanvas, TerminalSurface};
use choromap::map::Scene;
use choromap::surface::{self, OutputFormat};
use choromap::{data, ContextSources, MapInputs, RenderConfig, RenderOutput, Renderer};
use std::path::{Path, PathBuf};

/// Inputs and outputs of one `render` invocation
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub level1: PathBuf,
    pub values: PathBuf,
    pub config: PathBuf,
    pub lakes: Option<PathBuf>,
    pub countries: Option<PathBuf>,
    pub title: Option<String>,
}

impl RenderJob {
    pub fn load_config(&self) -> Result<RenderConfig> {
        let mut config = RenderConfig::from_path(&self.config)
            .with_context(|| format!("loading config {}", self.config.display()))?;
        if let Some(title) = &self.title {
            config.figure.title = Some(title.clone());
        }
        Ok(config)
    }

    /// Load every input and compose the scene
    pub fn run(&self) -> Result<RenderOutput> {
        let config = self.load_config()?;
        let hints = &config.data_hints;

        let level1 = data::load_collection(&self.level1, &hints.geo_join_column)?;
        let values = data::load_values(&self.values, &hints.location_column, &hints.value_column)?;
        let countries = load_optional(self.countries.as_deref(), &hints.neighboring_country_name_column)?;
        let lakes = load_optional(self.lakes.as_deref(), &hints.lake_name_column)?;

        let inputs = MapInputs {
            level1: &level1,
            values: &values,
            context: ContextSources {
                // Neighbor level-1 regions come from the same file
                neighbor_level1: Some(&level1),
                countries: countries.as_ref(),
                water: lakes.as_ref(),
            },
        };
        let span = tracing::info_span!("render", config = %self.config.display());
        let output = Renderer::new(config).with_span(span).render(&inputs)?;

        for warning in &output.report.warnings {
            tracing::debug!(%warning, "degraded");
        }
        tracing::info!(
            unmatched = output.report.unmatched_features,
            unused = output.report.unused_values,
            duplicates = output.report.duplicate_keys,
            warnings = output.report.warnings.len(),
            "render finished"
        );
        Ok(output)
    }
}

fn load_optional(path: Option<&Path>, id_column: &str) -> Result<Option<choromap::GeometryCollection>> {
    path.map(|p| data::load_collection(p, id_column)).transpose()
}

/// Write the scene, picking the format from `format` or the file extension
pub fn write_output(scene: &Scene, path: &Path, format: Option<&str>) -> Result<OutputFormat> {
    let format = match format {
        Some(f) => f.parse::<OutputFormat>()?,
        None => OutputFormat::from_path(path)?,
    };
    surface::write_artifact(scene, path, format).with_context(|| format!("writing {}", path.display()))?;
    Ok(format)
}

/// Terminal preview state
pub struct App {
    scene: Scene,
    pub canvas: BrailleCanvas,
    pub title: String,
    pub range: Option<(f64, f64)>,
    pub warnings: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(output: RenderOutput, width: usize, height: usize) -> Self {
        let title = output
            .scene
            .title
            .as_ref()
            .map(|t| t.text.clone())
            .unwrap_or_else(|| "choromap".to_string());
        let range = output.scale.as_ref().map(|s| (s.norm.vmin, s.norm.vmax));
        let mut app = Self {
            scene: output.scene,
            canvas: BrailleCanvas::new(0, 0),
            title,
            range,
            warnings: output.report.warnings.len(),
            should_quit: false,
        };
        app.resize(width, height);
        app
    }

    /// Replay the scene for a map area of `width` x `height` cells
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.canvas.width() && height == self.canvas.height() {
            return;
        }
        let mut surface = TerminalSurface::new(width, height);
        self.scene.replay(&mut surface);
        self.canvas = surface.into_canvas();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
