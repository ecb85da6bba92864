//! Layer compositor: turns the joined, partitioned regions into a [`Scene`]

use crate::config::{AnchorFrame, BoxStyle, HAlign, InsetConfig, Orientation, RenderConfig, VAlign};
use crate::error::{MapError, RenderReport, RenderWarning, Result};
use crate::feature::{GeometryCollection, MergedFeature, ValueTable};
use crate::join::{merge, JoinColumns};
use crate::map::geometry;
use crate::map::labels::{LabelEngine, LabelPlacement, LabelStrategy};
use crate::map::scene::{
    Colorbar, DrawCommand, FillStyle, Layer, Leader, Panel, PanelKind, Scene, Stroke, TextBox, TextItem,
};
use crate::map::{Bounds, Color, ColorScale, Crs, Normalize, PixelRect, Viewport};
use crate::partition::{partition, ContextSources, Partition, RegionSet};
use glam::DVec2;

/// Points per inch; font sizes and line widths are configured in points
const POINTS_PER_INCH: f64 = 72.0;

/// matplotlib's default font size, the unit of `borderpad`
const DEFAULT_FONT_PT: f64 = 10.0;

const TITLE_FONT_PT: f64 = 12.0;

const TICK_COUNT: usize = 5;

/// Everything one render reads
#[derive(Clone, Copy, Debug)]
pub struct MapInputs<'a> {
    pub level1: &'a GeometryCollection,
    pub values: &'a ValueTable,
    pub context: ContextSources<'a>,
}

#[derive(Debug)]
pub struct RenderOutput {
    pub scene: Scene,
    pub report: RenderReport,
    /// Shared color scale; `None` when no region has a value
    pub scale: Option<ColorScale>,
}

/// Stateless render pipeline: join, partition, project, compose
pub struct Renderer {
    config: RenderConfig,
    span: tracing::Span,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            span: tracing::info_span!("render"),
        }
    }

    /// Run every pass inside `span` instead of the default `render` span
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn render(&self, inputs: &MapInputs<'_>) -> Result<RenderOutput> {
        let _guard = self.span.enter();
        let config = &self.config;
        let hints = &config.data_hints;
        let mut report = RenderReport::default();

        let columns = JoinColumns::new(&hints.geo_join_column, &hints.location_column, &hints.value_column);
        let merged = merge(inputs.level1, inputs.values, &columns, hints.duplicate_keys, &mut report)?;
        let parts = partition(merged, &inputs.level1.crs, config, &inputs.context, &mut report)?;

        let scale = Normalize::from_values(parts.target.features.iter().filter_map(|f| f.value))
            .map(|norm| ColorScale::new(config.styling.cmap.clone(), norm));
        match &scale {
            Some(s) => tracing::info!(vmin = s.norm.vmin, vmax = s.norm.vmax, "value range"),
            None => tracing::warn!("no region has a value; every region uses the missing style"),
        }

        let composer = Composer {
            config,
            scale: scale.as_ref(),
            labels: LabelEngine::new(
                &config.label_settings,
                config.level1_code_column(),
                &hints.level1_name_column,
            ),
            px_per_pt: config.figure.dpi / POINTS_PER_INCH,
        };
        let scene = composer.compose(parts, &mut report)?;

        tracing::info!(
            panels = scene.panels.len(),
            warnings = report.warnings.len(),
            "scene composed"
        );
        Ok(RenderOutput { scene, report, scale })
    }
}

struct Composer<'a> {
    config: &'a RenderConfig,
    scale: Option<&'a ColorScale>,
    labels: LabelEngine<'a>,
    px_per_pt: f64,
}

/// Context layers already transformed into the frame CRS
struct FrameLayers {
    neighbor_countries: Option<RegionSet>,
    neighbor_level1: Option<RegionSet>,
    water: Option<RegionSet>,
}

impl<'a> Composer<'a> {
    fn pt(&self, points: f64) -> f64 {
        points * self.px_per_pt
    }

    fn compose(&self, parts: Partition, report: &mut RenderReport) -> Result<Scene> {
        let config = self.config;
        let settings = &config.main_map_settings;
        let (width, height) = config.figure.pixel_size();

        let target_crs = settings.target_crs.as_deref().map(Crs::parse);
        let main = parts
            .main
            .project_and_bound(target_crs.as_ref(), settings.xlim, settings.ylim, report);
        let Some(main_bounds) = main.bounds else {
            return Err(MapError::Render("main view has no drawable geometry".to_string()));
        };
        let frame = main.crs.clone();
        tracing::debug!(crs = %frame, "frame CRS");

        let layers = FrameLayers {
            neighbor_countries: into_frame(parts.neighbor_countries, &frame, report),
            neighbor_level1: into_frame(parts.neighbor_level1, &frame, report),
            water: into_frame(parts.water, &frame, report),
        };

        let axes = axes_rect(config, width, height);
        let (main_rect, colorbar_rect) = match self.scale {
            Some(_) if config.styling.colorbar => self.split_colorbar(axes),
            _ => (axes, None),
        };

        let viewport = Viewport::fit(main_bounds, main_rect);
        let data_rect = drawn_rect(&viewport);
        let mut main_panel = Panel::new("main", PanelKind::Main, viewport, config.styling.ocean_color);

        if let Some(countries) = &layers.neighbor_countries {
            self.push_context(&mut main_panel, Layer::NeighborCountries, countries, Some(&main_bounds));
        }
        if let Some(neighbors) = &layers.neighbor_level1 {
            self.push_context(&mut main_panel, Layer::NeighborLevel1, neighbors, Some(&main_bounds));
        }
        self.push_regions(&mut main_panel, &main);
        if settings.include_lakes {
            if let Some(water) = &layers.water {
                self.push_context(&mut main_panel, Layer::Water, water, None);
            }
        }
        if config.label_settings.add_labels {
            for feature in &main.features {
                if let Some(placement) = self.labels.place(feature, report) {
                    main_panel.push(Layer::Labels, self.label_command(&placement));
                }
            }
        }

        let mut panels = vec![main_panel];
        for inset in parts.insets {
            let Some(def) = config.inset_level1_regions.get(inset.index) else {
                continue;
            };
            let figure = PixelRect::new(0.0, 0.0, width, height);
            match self.inset_panel(inset.regions, def, &frame, data_rect, figure, &layers, report) {
                Ok(panel) => panels.push(panel),
                Err(reason) => report.warn(RenderWarning::LayerSkipped {
                    layer: format!("inset {}", inset.index + 1),
                    reason,
                }),
            }
        }

        let title = config.figure.title.as_ref().map(|text| TextItem {
            text: text.clone(),
            position: DVec2::new(axes.center().x, (axes.y * 0.5).max(self.pt(TITLE_FONT_PT))),
            font_size: self.pt(TITLE_FONT_PT),
            color: config.styling.text_color,
            halign: HAlign::Center,
            valign: VAlign::Center,
            bbox: None,
        });

        let colorbar = match (self.scale, colorbar_rect) {
            (Some(scale), Some(rect)) => Some(Colorbar {
                rect,
                scale: scale.clone(),
                orientation: config.styling.colorbar_orientation,
                label: config.colorbar_label(),
                ticks: ticks(&scale.norm),
                font_size: self.pt(config.label_settings.label_fontsize + 1.0),
                text_color: config.styling.text_color,
            }),
            _ => None,
        };

        Ok(Scene {
            width,
            height,
            dpi: config.figure.dpi,
            background: Color::WHITE,
            title,
            panels,
            colorbar,
        })
    }

    /// Carve the colorbar (and room for its tick labels) off the axes area
    fn split_colorbar(&self, axes: PixelRect) -> (PixelRect, Option<PixelRect>) {
        let styling = &self.config.styling;
        let text = self.pt(self.config.label_settings.label_fontsize + 1.0);
        match styling.colorbar_orientation {
            Orientation::Vertical => {
                let bar = axes.width * styling.colorbar_fraction;
                let pad = axes.width * styling.colorbar_pad;
                let reserve = bar + pad + text * 6.0;
                let main = PixelRect::new(axes.x, axes.y, (axes.width - reserve).max(1.0), axes.height);
                let bar_rect = PixelRect::new(main.right() + pad, axes.y + axes.height * 0.05, bar, axes.height * 0.9);
                (main, Some(bar_rect))
            }
            Orientation::Horizontal => {
                let bar = axes.height * styling.colorbar_fraction;
                let pad = axes.height * styling.colorbar_pad;
                let reserve = bar + pad + text * 3.0;
                let main = PixelRect::new(axes.x, axes.y, axes.width, (axes.height - reserve).max(1.0));
                let bar_rect = PixelRect::new(axes.x + axes.width * 0.1, main.bottom() + pad, axes.width * 0.8, bar);
                (main, Some(bar_rect))
            }
        }
    }

    fn region_edge(&self) -> Stroke {
        let styling = &self.config.styling;
        Stroke::solid(styling.level1_edge_color, self.pt(styling.level1_linewidth))
    }

    fn missing_style(&self) -> FillStyle {
        FillStyle {
            fill: self.config.styling.missing_color,
            hatch: self.config.styling.missing_hatch.clone(),
            stroke: Some(self.region_edge()),
        }
    }

    /// Base pass for every region, then the data pass for those with a value
    fn push_regions(&self, panel: &mut Panel, regions: &RegionSet) {
        for feature in regions.drawable() {
            panel.push(Layer::Base, fill(feature, feature.polygon().clone(), self.missing_style()));
        }
        let Some(scale) = self.scale else {
            return;
        };
        for feature in regions.with_values() {
            let Some(value) = feature.value else { continue };
            let style = FillStyle {
                fill: scale.color_for(value),
                hatch: None,
                stroke: Some(self.region_edge()),
            };
            panel.push(Layer::Data, fill(feature, feature.polygon().clone(), style));
        }
    }

    fn context_style(&self, layer: Layer) -> FillStyle {
        let s = &self.config.styling;
        match layer {
            Layer::NeighborCountries => FillStyle {
                fill: s.country_color,
                hatch: None,
                stroke: Some(Stroke::solid(s.country_edge_color, self.pt(s.country_linewidth))),
            },
            Layer::NeighborLevel1 => FillStyle {
                fill: s.neighbor_l1_fill_color,
                hatch: None,
                stroke: Some(Stroke {
                    color: s.neighbor_l1_edgecolor,
                    width: self.pt(s.neighbor_l1_linewidth),
                    style: s.neighbor_l1_linestyle,
                }),
            },
            _ => FillStyle {
                fill: s.lake_color,
                hatch: None,
                stroke: Some(Stroke::solid(s.lake_edge_color, self.pt(s.lake_linewidth))),
            },
        }
    }

    /// Context fills, optionally clipped to a display window
    fn push_context(&self, panel: &mut Panel, layer: Layer, set: &RegionSet, clip: Option<&Bounds>) {
        let style = self.context_style(layer);
        for feature in set.drawable() {
            let geometry = match clip {
                Some(bounds) => geometry::clip_to_bounds(feature.polygon(), bounds),
                None => feature.polygon().clone(),
            };
            if geometry::is_empty(&geometry) {
                continue;
            }
            panel.push(layer, fill(feature, geometry, style.clone()));
        }
    }

    fn text_box(&self, style: &BoxStyle, font_px: f64) -> TextBox {
        let (fill, edge) = style.colors();
        TextBox {
            fill,
            edge: (style.linewidth > 0.0 && !edge.is_transparent()).then(|| Stroke::solid(edge, self.pt(style.linewidth))),
            pad: style.boxstyle.pad * font_px,
            rounded: style.boxstyle.rounded,
        }
    }

    fn leader(&self) -> Leader {
        let arrow = &self.config.label_settings.annotation_arrowprops;
        Leader {
            stroke: Stroke {
                color: arrow.color.unwrap_or(self.config.styling.text_color),
                width: self.pt(arrow.linewidth),
                style: arrow.linestyle,
            },
            head: arrow.arrowstyle,
            head_length: self.pt(arrow.head_length),
        }
    }

    /// Offset labels are annotations and take the annotation box, with or
    /// without a leader line; everything else takes the label box
    fn label_command(&self, placement: &LabelPlacement) -> DrawCommand {
        let settings = &self.config.label_settings;
        let font_px = self.pt(placement.font_size);
        let style = match placement.strategy {
            LabelStrategy::Offset { .. } => settings.annotation_bbox_style.as_ref(),
            _ => settings.label_bbox_style.as_ref(),
        };
        let text = TextItem {
            text: placement.text.clone(),
            position: placement.position,
            font_size: font_px,
            color: self.config.styling.text_color,
            halign: placement.halign,
            valign: placement.valign,
            bbox: style.map(|s| self.text_box(s, font_px)),
        };
        match placement.leader() {
            Some((_, anchor)) => DrawCommand::Annotation {
                text,
                anchor,
                leader: self.leader(),
            },
            None => DrawCommand::Text(text),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn inset_panel(
        &self,
        regions: RegionSet,
        def: &InsetConfig,
        frame: &Crs,
        axes: PixelRect,
        figure: PixelRect,
        layers: &FrameLayers,
        report: &mut RenderReport,
    ) -> std::result::Result<Panel, String> {
        let name = regions.name.clone();
        let regions = regions
            .reprojected(frame)
            .map_err(|e| format!("reprojection failed: {e}"))?
            .bounded(def.xlim, def.ylim);
        let bounds = regions.bounds.ok_or("no drawable geometry")?;

        let anchor_frame = match def.location.bbox_transform {
            AnchorFrame::Axes => axes,
            AnchorFrame::Figure => figure,
        };
        let rect = inset_rect(def, anchor_frame, self.config.figure.dpi, self.pt(DEFAULT_FONT_PT));
        tracing::debug!(inset = %name, ?rect, "inset placed");

        let mut panel = Panel::new(name, PanelKind::Inset, Viewport::fit(bounds, rect), self.config.styling.ocean_color);
        panel.frame = Some(Stroke::solid(Color::BLACK, self.pt(0.8)));
        self.push_regions(&mut panel, &regions);
        if def.include_lakes {
            if let Some(water) = &layers.water {
                self.push_context(&mut panel, Layer::Water, water, None);
            }
        }
        if self.config.label_settings.add_labels {
            for feature in &regions.features {
                if let Some(placement) = self.labels.place_in_inset(feature, &bounds, report) {
                    panel.push(Layer::Labels, self.label_command(&placement));
                }
            }
        }
        Ok(panel)
    }
}

fn fill(feature: &MergedFeature, geometry: geo::MultiPolygon<f64>, style: FillStyle) -> DrawCommand {
    DrawCommand::Fill {
        id: feature.id().to_string(),
        geometry,
        style,
    }
}

/// Reproject an optional context layer into the frame CRS; failures drop the layer
fn into_frame(set: Option<RegionSet>, frame: &Crs, report: &mut RenderReport) -> Option<RegionSet> {
    let set = set?;
    match set.reprojected(frame) {
        Ok(projected) => Some(projected),
        Err(e) => {
            tracing::error!(layer = %set.name, "failed to reproject into {frame}: {e}");
            report.warn(RenderWarning::ReprojectionFailed {
                layer: set.name.clone(),
                reason: e.to_string(),
            });
            report.warn(RenderWarning::LayerSkipped {
                layer: set.name,
                reason: "reprojection failed".to_string(),
            });
            None
        }
    }
}

/// Main axes area from `tight_layout_rect` (figure fractions, y upwards)
fn axes_rect(config: &RenderConfig, width: f64, height: f64) -> PixelRect {
    let [left, bottom, right, top] = config.figure.tight_layout_rect;
    PixelRect::new(
        left * width,
        (1.0 - top) * height,
        (right - left) * width,
        (top - bottom) * height,
    )
}

/// Pixel rectangle actually covered by the viewport's bounds
fn drawn_rect(viewport: &Viewport) -> PixelRect {
    let b = viewport.bounds;
    let top_left = viewport.project(DVec2::new(b.min.x, b.max.y));
    let bottom_right = viewport.project(DVec2::new(b.max.x, b.min.y));
    let size = bottom_right - top_left;
    PixelRect::new(top_left.x, top_left.y, size.x, size.y)
}

/// Position an inset inside its anchor box the way `inset_axes` does
fn inset_rect(def: &InsetConfig, frame: PixelRect, dpi: f64, font_px: f64) -> PixelRect {
    let loc = &def.location;
    let [x0, y0, w, h] = loc.bbox_to_anchor;
    let anchor = PixelRect::new(
        frame.x + x0 * frame.width,
        frame.bottom() - (y0 + h) * frame.height,
        w * frame.width,
        h * frame.height,
    );
    let width = loc.width.to_pixels(anchor.width, dpi);
    let height = loc.height.to_pixels(anchor.height, dpi);
    let pad = loc.borderpad * font_px;
    let (fx, fy) = loc.loc.fractions();
    PixelRect::new(
        anchor.x + pad + fx * (anchor.width - 2.0 * pad - width),
        anchor.y + pad + (1.0 - fy) * (anchor.height - 2.0 * pad - height),
        width,
        height,
    )
}

/// Evenly spaced "nice" tick values inside the normalization range
fn ticks(norm: &Normalize) -> Vec<(f64, String)> {
    let span = norm.vmax - norm.vmin;
    if !(span > 0.0) {
        return vec![(0.0, tick_label(norm.vmin, 1.0))];
    }
    let raw = span / TICK_COUNT as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let mut out = Vec::new();
    let mut value = (norm.vmin / step).ceil() * step;
    while value <= norm.vmax + step * 1e-9 {
        out.push((norm.apply(value), tick_label(value, step)));
        value += step;
    }
    out
}

fn tick_label(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 { 0 } else { (-step.log10()).ceil() as usize };
    let text = format!("{value:.decimals$}");
    // Avoid "-0"
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        text.trim_start_matches('-').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Extent, Loc};
    use crate::feature::GeometryFeature;
    use geo::{polygon, BoundingRect, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ]])
    }

    fn level1() -> GeometryCollection {
        ["A", "B"]
            .iter()
            .enumerate()
            .map(|(i, code)| {
                GeometryFeature::new(code, square(i as f64 * 2.0))
                    .with_attribute("name", *code)
                    .with_attribute("postal", *code)
            })
            .collect()
    }

    #[test]
    fn test_ticks_are_round_numbers() {
        let t = ticks(&Normalize::new(0.0, 100.0));
        let labels: Vec<&str> = t.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(labels, vec!["0", "20", "40", "60", "80", "100"]);
        assert_eq!(t[0].0, 0.0);
        assert_eq!(t[5].0, 1.0);

        let small = ticks(&Normalize::new(0.1, 0.35));
        assert_eq!(small[0].1, "0.10");
        assert_eq!(ticks(&Normalize::new(3.0, 3.0)).len(), 1);
    }

    #[test]
    fn test_inset_rect_lower_left_percent() {
        let def = InsetConfig::default();
        let rect = inset_rect(&def, PixelRect::new(100.0, 50.0, 1000.0, 500.0), 100.0, 10.0);
        assert_eq!(rect, PixelRect::new(100.0, 450.0, 200.0, 100.0));
    }

    #[test]
    fn test_inset_rect_upper_right_inches_with_pad() {
        let mut def = InsetConfig::default();
        def.location.width = Extent::Inches(1.0);
        def.location.height = Extent::Inches(0.5);
        def.location.loc = Loc::UpperRight;
        def.location.borderpad = 1.0;
        let rect = inset_rect(&def, PixelRect::new(0.0, 0.0, 1000.0, 500.0), 100.0, 10.0);
        assert_eq!(rect, PixelRect::new(890.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn test_render_basic_scene() {
        let geo = level1();
        let values = ValueTable::from_pairs("location", "value", [("A", Some(10.0))]);
        let output = Renderer::new(RenderConfig::default())
            .render(&MapInputs {
                level1: &geo,
                values: &values,
                context: ContextSources::default(),
            })
            .unwrap();

        let main = output.scene.main_panel().unwrap();
        assert_eq!(main.filled_ids(Layer::Base), vec!["A", "B"]);
        assert_eq!(main.filled_ids(Layer::Data), vec!["A"]);
        assert_eq!(output.report.unmatched_features, 1);
        assert!(output.scene.colorbar.is_some());
        // Single value: normalization collapses to the low end of the colormap
        let scale = output.scale.unwrap();
        assert_eq!(main.fill_color_of(Layer::Data, "A"), Some(scale.colormap.sample(0.0)));
    }

    #[test]
    fn test_render_without_values_has_no_colorbar() {
        let geo = level1();
        let values = ValueTable::new(&["location", "value"]);
        let output = Renderer::new(RenderConfig::default())
            .render(&MapInputs {
                level1: &geo,
                values: &values,
                context: ContextSources::default(),
            })
            .unwrap();
        assert!(output.scale.is_none());
        assert!(output.scene.colorbar.is_none());
        assert!(output.scene.main_panel().unwrap().filled_ids(Layer::Data).is_empty());
    }

    fn render_with(config: RenderConfig, geo: &GeometryCollection, context: ContextSources<'_>) -> RenderOutput {
        let values = ValueTable::from_pairs("location", "value", [("A", Some(1.0))]);
        Renderer::new(config)
            .render(&MapInputs {
                level1: geo,
                values: &values,
                context,
            })
            .unwrap()
    }

    #[test]
    fn test_context_layers_clipped_and_stacked() {
        let geo: GeometryCollection = [GeometryFeature::new("A", square(0.0))
            .with_attribute("name", "A")
            .with_attribute("postal", "A")]
        .into_iter()
        .collect();
        // Reaches from the middle of A well past the main view
        let wide = MultiPolygon::new(vec![polygon![
            (x: 0.5, y: -0.5),
            (x: 3.0, y: -0.5),
            (x: 3.0, y: 1.5),
            (x: 0.5, y: 1.5),
        ]]);
        let countries: GeometryCollection = [GeometryFeature::new("CA", wide).with_attribute("NAME", "Canada")]
            .into_iter()
            .collect();
        let pond = MultiPolygon::new(vec![polygon![
            (x: 0.2, y: 0.2),
            (x: 0.4, y: 0.2),
            (x: 0.4, y: 0.4),
            (x: 0.2, y: 0.4),
        ]]);
        let lakes: GeometryCollection = [GeometryFeature::new("L1", pond).with_attribute("name", "Pond")]
            .into_iter()
            .collect();

        let mut config = RenderConfig::default();
        config.main_map_settings.include_neighboring_countries = true;
        config.main_map_settings.include_lakes = true;
        config.main_map_settings.include_lake_names = vec!["Pond".into()];
        config.data_hints.neighboring_country_codes = vec!["Canada".into()];

        let output = render_with(
            config,
            &geo,
            ContextSources {
                countries: Some(&countries),
                water: Some(&lakes),
                ..Default::default()
            },
        );
        let main = output.scene.main_panel().unwrap();

        let fills: Vec<(Layer, &str)> = main
            .ordered()
            .into_iter()
            .filter_map(|(layer, c)| match c {
                DrawCommand::Fill { id, .. } => Some((layer, id.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            fills,
            vec![
                (Layer::NeighborCountries, "CA"),
                (Layer::Base, "A"),
                (Layer::Data, "A"),
                (Layer::Water, "L1"),
            ]
        );

        let bounds = main.viewport.bounds;
        let neighbor = main
            .commands_in(Layer::NeighborCountries)
            .find_map(|c| match c {
                DrawCommand::Fill { geometry, .. } => geometry.bounding_rect(),
                _ => None,
            })
            .unwrap();
        assert!(neighbor.min().x >= 0.5 - 1e-9);
        assert!(neighbor.max().x <= bounds.max.x + 1e-9);
        assert!(neighbor.min().y >= bounds.min.y - 1e-9);
        assert!(neighbor.max().y <= bounds.max.y + 1e-9);
        assert!(bounds.max.x < 3.0);
    }

    #[test]
    fn test_offset_label_gets_annotation_box_and_arrow() {
        let config = RenderConfig::from_json_str(
            r#"{"label_settings": {
                "add_labels": true,
                "offsets": {"A": [0.5, 0.5]},
                "annotation_bbox_style": {"boxstyle": "round,pad=0.5", "fc": "ivory", "ec": "grey"},
                "annotation_arrowprops": {"arrowstyle": "-|>", "color": "red", "lw": 1.0}
            }}"#,
        )
        .unwrap();
        let output = render_with(config, &level1(), ContextSources::default());
        let main = output.scene.main_panel().unwrap();

        let (text, leader) = main
            .commands_in(Layer::Labels)
            .find_map(|c| match c {
                DrawCommand::Annotation { text, leader, .. } => Some((text, leader)),
                _ => None,
            })
            .unwrap();
        let bbox = text.bbox.as_ref().unwrap();
        assert_eq!(bbox.fill, Color::parse("ivory").unwrap());
        assert_eq!(bbox.edge.as_ref().map(|s| s.color), Color::parse("grey"));
        assert!(bbox.rounded);
        assert_eq!(bbox.pad, 0.5 * text.font_size);
        assert_eq!(leader.head, crate::config::ArrowHead::Filled);
        assert_eq!(leader.stroke.color, Color::parse("red").unwrap());

        // B has no offset and no label box configured
        let direct = main
            .commands_in(Layer::Labels)
            .find_map(|c| match c {
                DrawCommand::Text(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert!(direct.bbox.is_none());
    }

    #[test]
    fn test_unprojectable_context_layer_is_skipped() {
        let geo = level1();
        let mut countries: GeometryCollection = [GeometryFeature::new("CA", square(5.0)).with_attribute("ADMIN", "Canada")]
            .into_iter()
            .collect();
        countries.crs = Crs::Other("EPSG:2154".into());
        let mut config = RenderConfig::default();
        config.main_map_settings.include_neighboring_countries = true;
        config.data_hints.neighboring_country_codes = vec!["Canada".into()];
        let values = ValueTable::from_pairs("location", "value", [("A", Some(1.0))]);

        let output = Renderer::new(config)
            .render(&MapInputs {
                level1: &geo,
                values: &values,
                context: ContextSources {
                    countries: Some(&countries),
                    ..Default::default()
                },
            })
            .unwrap();
        assert_eq!(output.report.skipped_layers().collect::<Vec<_>>(), vec!["neighbor countries"]);
        assert!(output.scene.main_panel().unwrap().filled_ids(Layer::NeighborCountries).is_empty());
    }
}
