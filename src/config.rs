//! Render configuration
//!
//! A [`RenderConfig`] is deserialized once per render from a JSON document and
//! never mutated afterwards. Every optional knob has a default, so an empty
//! object `{}` is a valid (if unfiltered) configuration.

use crate::error::{MapError, Result};
use crate::map::{Color, Colormap};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub figure: FigureConfig,
    /// Primary country filter applied to the level-1 geometry
    pub country_codes: Option<Vec<String>>,
    /// Explicit main-view allow-list; unset means "everything not in an inset"
    pub main_level1_codes: Option<Vec<String>>,
    pub inset_level1_regions: Vec<InsetConfig>,
    pub main_map_settings: MainMapSettings,
    pub styling: Styling,
    pub label_settings: LabelSettings,
    pub data_hints: DataHints,
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RenderConfig =
            serde_json::from_str(json).map_err(|e| MapError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Checks that serde cannot express on its own
    pub fn validate(&self) -> Result<()> {
        let [w, h] = self.figure.figsize;
        if !(w > 0.0 && h > 0.0) {
            return Err(MapError::config(format!("figure.figsize must be positive, got [{w}, {h}]")));
        }
        if !(self.figure.dpi > 0.0) {
            return Err(MapError::config("figure.dpi must be positive"));
        }
        let [l, b, r, t] = self.figure.tight_layout_rect;
        if !(l < r && b < t) {
            return Err(MapError::config("figure.tight_layout_rect must be [left, bottom, right, top]"));
        }
        if let Some(codes) = &self.country_codes {
            if codes.is_empty() {
                return Err(MapError::config(
                    "country_codes is an empty list; omit it to disable the filter",
                ));
            }
        }
        check_limits("main_map_settings.xlim", self.main_map_settings.xlim)?;
        check_limits("main_map_settings.ylim", self.main_map_settings.ylim)?;
        for (i, inset) in self.inset_level1_regions.iter().enumerate() {
            check_limits(&format!("inset_level1_regions[{i}].xlim"), inset.xlim)?;
            check_limits(&format!("inset_level1_regions[{i}].ylim"), inset.ylim)?;
        }
        for (code, spec) in &self.label_settings.clipped_regions {
            if !(spec.fraction > 0.0 && spec.fraction <= 1.0) {
                return Err(MapError::config(format!(
                    "clipped_regions.{code}: fraction must be in (0, 1], got {}",
                    spec.fraction
                )));
            }
        }
        if !(self.styling.colorbar_fraction > 0.0 && self.styling.colorbar_fraction < 1.0) {
            return Err(MapError::config("styling.colorbar_fraction must be in (0, 1)"));
        }
        Ok(())
    }

    /// Column holding the level-1 region code used in labels and code lists
    pub fn level1_code_column(&self) -> &str {
        self.label_settings
            .level1_code_column
            .as_deref()
            .unwrap_or(&self.data_hints.level1_code_column)
    }

    /// Colorbar caption: explicit label, or the value column title-cased
    pub fn colorbar_label(&self) -> String {
        match &self.styling.colorbar_label {
            Some(label) => label.clone(),
            None => title_case(&self.data_hints.value_column),
        }
    }
}

fn check_limits(name: &str, limits: Option<[f64; 2]>) -> Result<()> {
    match limits {
        Some([lo, hi]) if !(lo.is_finite() && hi.is_finite() && lo < hi) => {
            Err(MapError::config(format!("{name} must be [min, max] with min < max")))
        }
        _ => Ok(()),
    }
}

fn title_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    /// Width and height in inches
    pub figsize: [f64; 2],
    pub title: Option<String>,
    pub dpi: f64,
    /// Main-axes area as figure fractions `[left, bottom, right, top]`
    pub tight_layout_rect: [f64; 4],
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            figsize: [15.0, 10.0],
            title: None,
            dpi: 100.0,
            tight_layout_rect: [0.0, 0.03, 1.0, 0.95],
        }
    }
}

impl FigureConfig {
    /// Canvas size in pixels
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.figsize[0] * self.dpi, self.figsize[1] * self.dpi)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsetConfig {
    pub codes: Vec<String>,
    pub location: InsetLocation,
    pub xlim: Option<[f64; 2]>,
    pub ylim: Option<[f64; 2]>,
    pub include_lakes: bool,
}

/// Where an inset panel sits, in the terms of matplotlib's `inset_axes`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InsetLocation {
    pub width: Extent,
    pub height: Extent,
    pub loc: Loc,
    /// `[x0, y0, width, height]` in fractions of `bbox_transform`'s frame
    pub bbox_to_anchor: [f64; 4],
    pub bbox_transform: AnchorFrame,
    /// Padding from the anchor box edge, in multiples of the label font size
    pub borderpad: f64,
}

impl Default for InsetLocation {
    fn default() -> Self {
        Self {
            width: Extent::Relative(0.2),
            height: Extent::Relative(0.2),
            loc: Loc::LowerLeft,
            bbox_to_anchor: [0.0, 0.0, 1.0, 1.0],
            bbox_transform: AnchorFrame::Axes,
            borderpad: 0.0,
        }
    }
}

/// Inset width or height
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "ExtentRepr")]
pub enum Extent {
    /// Fraction of the anchor box (`"20%"` → 0.2)
    Relative(f64),
    Inches(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtentRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<ExtentRepr> for Extent {
    type Error = String;

    fn try_from(repr: ExtentRepr) -> std::result::Result<Self, Self::Error> {
        let extent = match repr {
            ExtentRepr::Number(n) => Extent::Inches(n),
            ExtentRepr::Text(s) => {
                let s = s.trim();
                match s.strip_suffix('%') {
                    Some(pct) => pct
                        .trim()
                        .parse::<f64>()
                        .map(|p| Extent::Relative(p / 100.0))
                        .map_err(|_| format!("invalid percentage '{s}'"))?,
                    None => s
                        .parse::<f64>()
                        .map(Extent::Inches)
                        .map_err(|_| format!("invalid extent '{s}' (use \"20%\" or inches)"))?,
                }
            }
        };
        match extent {
            Extent::Relative(v) | Extent::Inches(v) if v > 0.0 && v.is_finite() => Ok(extent),
            _ => Err("inset extent must be positive".to_string()),
        }
    }
}

impl Extent {
    /// Resolve to pixels given the anchor box length and output dpi
    pub fn to_pixels(self, anchor_len: f64, dpi: f64) -> f64 {
        match self {
            Extent::Relative(f) => f * anchor_len,
            Extent::Inches(inches) => inches * dpi,
        }
    }
}

/// Anchor position of an inset inside its anchor box
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Loc {
    #[serde(rename = "upper right")]
    UpperRight,
    #[serde(rename = "upper left")]
    UpperLeft,
    #[serde(rename = "lower left")]
    LowerLeft,
    #[serde(rename = "lower right")]
    LowerRight,
    #[serde(rename = "right", alias = "center right")]
    CenterRight,
    #[serde(rename = "center left")]
    CenterLeft,
    #[serde(rename = "upper center")]
    UpperCenter,
    #[serde(rename = "lower center")]
    LowerCenter,
    #[serde(rename = "center")]
    Center,
}

impl Loc {
    /// Horizontal and vertical position as fractions, y measured upwards
    pub fn fractions(self) -> (f64, f64) {
        match self {
            Loc::UpperRight => (1.0, 1.0),
            Loc::UpperLeft => (0.0, 1.0),
            Loc::LowerLeft => (0.0, 0.0),
            Loc::LowerRight => (1.0, 0.0),
            Loc::CenterRight => (1.0, 0.5),
            Loc::CenterLeft => (0.0, 0.5),
            Loc::UpperCenter => (0.5, 1.0),
            Loc::LowerCenter => (0.5, 0.0),
            Loc::Center => (0.5, 0.5),
        }
    }
}

/// Coordinate frame that `bbox_to_anchor` is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AnchorFrame {
    Axes,
    Figure,
}

impl From<String> for AnchorFrame {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "axes" | "ax.transaxes" | "transaxes" => AnchorFrame::Axes,
            "figure" | "fig.transfigure" | "transfigure" => AnchorFrame::Figure,
            _ => {
                tracing::warn!("unknown bbox_transform '{name}', using the main axes frame");
                AnchorFrame::Axes
            }
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MainMapSettings {
    pub target_crs: Option<String>,
    pub include_lakes: bool,
    pub include_neighboring_level1: bool,
    pub include_neighboring_countries: bool,
    /// Water bodies to draw, by name; empty means none
    pub include_lake_names: Vec<String>,
    pub xlim: Option<[f64; 2]>,
    pub ylim: Option<[f64; 2]>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl TryFrom<String> for LineStyle {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.trim() {
            "-" | "solid" => Ok(LineStyle::Solid),
            "--" | "dashed" => Ok(LineStyle::Dashed),
            ":" | "dotted" => Ok(LineStyle::Dotted),
            "-." | "dashdot" => Ok(LineStyle::DashDot),
            other => Err(format!("unknown line style '{other}'")),
        }
    }
}

impl LineStyle {
    /// Dash pattern in multiples of the line width, `None` for solid lines
    pub fn dash_pattern(self) -> Option<&'static [f64]> {
        match self {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some(&[3.7, 1.6]),
            LineStyle::Dotted => Some(&[1.0, 1.65]),
            LineStyle::DashDot => Some(&[6.4, 1.6, 1.0, 1.6]),
        }
    }
}

/// Hatch pattern in matplotlib notation, e.g. `"///"` or `"x"`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Hatch {
    /// Stroke angles in degrees
    pub angles: Vec<f64>,
    /// Repetitions of the densest symbol; more means tighter spacing
    pub density: usize,
}

impl TryFrom<String> for Hatch {
    type Error = String;

    fn try_from(pattern: String) -> std::result::Result<Self, Self::Error> {
        let mut angles: Vec<f64> = Vec::new();
        let mut counts: BTreeMap<char, usize> = BTreeMap::new();
        for c in pattern.chars() {
            let add: &[f64] = match c {
                '/' => &[45.0],
                '\\' => &[135.0],
                '-' => &[0.0],
                '|' => &[90.0],
                '+' => &[0.0, 90.0],
                'x' | 'X' => &[45.0, 135.0],
                other => return Err(format!("unsupported hatch symbol '{other}'")),
            };
            *counts.entry(c).or_default() += 1;
            for a in add {
                if !angles.contains(a) {
                    angles.push(*a);
                }
            }
        }
        let density = counts.values().copied().max().ok_or("empty hatch pattern")?;
        Ok(Hatch { angles, density })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Styling {
    pub ocean_color: Color,
    pub missing_color: Color,
    pub missing_hatch: Option<Hatch>,
    pub level1_edge_color: Color,
    pub level1_linewidth: f64,
    pub country_color: Color,
    pub country_edge_color: Color,
    pub country_linewidth: f64,
    pub neighbor_l1_fill_color: Color,
    pub neighbor_l1_edgecolor: Color,
    pub neighbor_l1_linewidth: f64,
    pub neighbor_l1_linestyle: LineStyle,
    pub lake_color: Color,
    pub lake_edge_color: Color,
    pub lake_linewidth: f64,
    pub cmap: Colormap,
    pub colorbar: bool,
    pub colorbar_orientation: Orientation,
    /// Share of the main axes given to the colorbar
    pub colorbar_fraction: f64,
    /// Gap between axes and colorbar, as a share of the main axes
    pub colorbar_pad: f64,
    pub colorbar_label: Option<String>,
    pub text_color: Color,
}

impl Default for Styling {
    fn default() -> Self {
        let grey = |v: u8| Color::rgb(v, v, v);
        Self {
            ocean_color: Color::rgb(240, 248, 255),
            missing_color: grey(211),
            missing_hatch: None,
            level1_edge_color: Color::BLACK,
            level1_linewidth: 0.5,
            country_color: grey(0xEA),
            country_edge_color: grey(169),
            country_linewidth: 0.5,
            neighbor_l1_fill_color: grey(211),
            neighbor_l1_edgecolor: grey(169),
            neighbor_l1_linewidth: 0.5,
            neighbor_l1_linestyle: LineStyle::Dashed,
            lake_color: Color::rgb(240, 248, 255),
            lake_edge_color: Color::rgb(0, 0, 139),
            lake_linewidth: 0.3,
            cmap: Colormap::viridis(),
            colorbar: true,
            colorbar_orientation: Orientation::Vertical,
            colorbar_fraction: 0.03,
            colorbar_pad: 0.02,
            colorbar_label: None,
            text_color: Color::BLACK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipSide {
    Top,
    Bottom,
    Left,
    Right,
}

/// `[side, fraction]`, e.g. `["top", 0.5]`
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(from = "(ClipSide, f64)")]
pub struct ClipSpec {
    pub side: ClipSide,
    pub fraction: f64,
}

impl From<(ClipSide, f64)> for ClipSpec {
    fn from((side, fraction): (ClipSide, f64)) -> Self {
        Self { side, fraction }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Positioning {
    RelativeToLargestPolygon,
    GeometryCentroid,
    GeometryRepresentativePoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPoint {
    Centroid,
    RepresentativePoint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Center,
    Bottom,
    Baseline,
}

/// Vertical target of an inset label: a window fraction or the anchor's own y
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RelativeY {
    Fraction(f64),
    Keyword(AnchorY),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorY {
    CentroidY,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct LabelPlacementRule {
    /// Fraction of the inset window width; unset keeps the anchor's x
    pub x_rel: Option<f64>,
    pub y_rel: Option<RelativeY>,
    pub ha: HAlign,
    pub va: VAlign,
    pub use_arrow: bool,
}

impl Default for LabelPlacementRule {
    fn default() -> Self {
        Self {
            x_rel: None,
            y_rel: None,
            ha: HAlign::Center,
            va: VAlign::Center,
            use_arrow: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct InsetLabelRule {
    pub positioning: Positioning,
    #[serde(default)]
    pub anchor_point: Option<AnchorPoint>,
    #[serde(default)]
    pub placement: LabelPlacementRule,
}

/// Box outline, `"square"` or `"round"` with an optional `",pad=0.3"`
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct BoxShape {
    pub rounded: bool,
    /// Padding around the text, in multiples of the font size
    pub pad: f64,
}

impl Default for BoxShape {
    fn default() -> Self {
        Self {
            rounded: false,
            pad: 0.3,
        }
    }
}

impl TryFrom<String> for BoxShape {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let mut parts = s.split(',').map(str::trim);
        let rounded = match parts.next() {
            Some("square") => false,
            Some("round") | Some("round4") => true,
            other => return Err(format!("unknown box style '{}'", other.unwrap_or_default())),
        };
        let mut shape = BoxShape {
            rounded,
            ..Default::default()
        };
        for part in parts {
            match part.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
                Some(("pad", v)) => shape.pad = v.parse().map_err(|_| format!("bad box pad '{v}'"))?,
                _ => return Err(format!("unknown box style attribute '{part}'")),
            }
        }
        Ok(shape)
    }
}

/// Background box behind label text, in matplotlib `bbox` terms
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoxStyle {
    pub boxstyle: BoxShape,
    #[serde(alias = "fc")]
    pub facecolor: Color,
    #[serde(alias = "ec")]
    pub edgecolor: Color,
    /// Edge width in points
    #[serde(alias = "lw")]
    pub linewidth: f64,
    /// Opacity applied to face and edge
    pub alpha: Option<f64>,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            boxstyle: BoxShape::default(),
            facecolor: Color::WHITE,
            edgecolor: Color::BLACK,
            linewidth: 1.0,
            alpha: None,
        }
    }
}

impl BoxStyle {
    /// Face and edge colors with `alpha` applied
    pub fn colors(&self) -> (Color, Color) {
        match self.alpha {
            Some(alpha) => (self.facecolor.with_opacity(alpha), self.edgecolor.with_opacity(alpha)),
            None => (self.facecolor, self.edgecolor),
        }
    }
}

/// Leader line head in matplotlib `arrowstyle` notation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ArrowHead {
    /// `"-"`
    #[default]
    None,
    /// `"->"`
    Open,
    /// `"-|>"`
    Filled,
}

impl TryFrom<String> for ArrowHead {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.trim() {
            "-" => Ok(ArrowHead::None),
            "->" => Ok(ArrowHead::Open),
            "-|>" => Ok(ArrowHead::Filled),
            other => Err(format!("unsupported arrow style '{other}'")),
        }
    }
}

/// Leader line of offset and inset annotations
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArrowStyle {
    pub arrowstyle: ArrowHead,
    /// Unset uses the text color
    pub color: Option<Color>,
    /// Points
    #[serde(alias = "lw")]
    pub linewidth: f64,
    #[serde(alias = "ls")]
    pub linestyle: LineStyle,
    /// Points
    pub head_length: f64,
}

impl Default for ArrowStyle {
    fn default() -> Self {
        Self {
            arrowstyle: ArrowHead::None,
            color: None,
            linewidth: 0.5,
            linestyle: LineStyle::Solid,
            head_length: 4.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    pub add_labels: bool,
    /// Overrides `data_hints.level1_code_column`
    pub level1_code_column: Option<String>,
    /// Label offset vectors by region code, in data units
    pub offsets: BTreeMap<String, [f64; 2]>,
    pub clipped_regions: BTreeMap<String, ClipSpec>,
    pub label_format: String,
    pub value_format: String,
    pub na_value_text: String,
    pub label_fontsize: f64,
    pub annotation_fontsize: f64,
    pub inset_label_handling: BTreeMap<String, InsetLabelRule>,
    /// Box behind labels drawn in place
    pub label_bbox_style: Option<BoxStyle>,
    /// Box behind offset and inset annotations
    pub annotation_bbox_style: Option<BoxStyle>,
    pub annotation_arrowprops: ArrowStyle,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            add_labels: false,
            level1_code_column: None,
            offsets: BTreeMap::new(),
            clipped_regions: BTreeMap::new(),
            label_format: "{code} - {value}".to_string(),
            value_format: "{:.0f}".to_string(),
            na_value_text: "N/A".to_string(),
            label_fontsize: 7.0,
            annotation_fontsize: 6.0,
            inset_label_handling: BTreeMap::new(),
            label_bbox_style: None,
            annotation_bbox_style: None,
            annotation_arrowprops: ArrowStyle::default(),
        }
    }
}

/// What to do when the value table repeats a join key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKeyPolicy {
    #[default]
    Last,
    First,
    Error,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DataHints {
    pub level1_code_column: String,
    pub level1_name_column: String,
    pub country_code_column: String,
    /// Geometry column matched against the value table's location column
    pub geo_join_column: String,
    pub location_column: String,
    pub value_column: String,
    /// Country names (matched against the country layer) drawn as context
    pub neighboring_country_codes: Vec<String>,
    pub neighboring_country_name_column: String,
    /// Countries whose level-1 regions are drawn as context
    pub neighbor_country_codes: Vec<String>,
    pub lake_name_column: String,
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for DataHints {
    fn default() -> Self {
        Self {
            level1_code_column: "postal".to_string(),
            level1_name_column: "NAME".to_string(),
            country_code_column: "iso_a2".to_string(),
            geo_join_column: "name".to_string(),
            location_column: "location".to_string(),
            value_column: "value".to_string(),
            neighboring_country_codes: Vec::new(),
            neighboring_country_name_column: "ADMIN".to_string(),
            neighbor_country_codes: Vec::new(),
            lake_name_column: "name".to_string(),
            duplicate_keys: DuplicateKeyPolicy::Last,
        }
    }
}

impl DataHints {
    /// Country-name columns to try, configured one first
    pub fn country_name_candidates(&self) -> Vec<&str> {
        candidates(&self.neighboring_country_name_column, &["NAME", "SOVEREIGNT", "name", "name_en"])
    }

    /// Water-body name columns to try, configured one first
    pub fn lake_name_candidates(&self) -> Vec<&str> {
        candidates(&self.lake_name_column, &["name_en", "gn_name", "NAME"])
    }
}

fn candidates<'a>(preferred: &'a str, fallbacks: &[&'static str]) -> Vec<&'a str> {
    let mut out = vec![preferred];
    out.extend(fallbacks.iter().copied().filter(|f| *f != preferred));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RenderConfig::from_json_str("{}").unwrap();
        assert_eq!(config.figure.figsize, [15.0, 10.0]);
        assert_eq!(config.figure.pixel_size(), (1500.0, 1000.0));
        assert_eq!(config.styling.missing_color, Color::parse("lightgrey").unwrap());
        assert_eq!(config.label_settings.label_format, "{code} - {value}");
        assert_eq!(config.level1_code_column(), "postal");
        assert_eq!(config.data_hints.duplicate_keys, DuplicateKeyPolicy::Last);
        assert!(config.main_level1_codes.is_none());
        assert_eq!(config.colorbar_label(), "Value");
    }

    #[test]
    fn test_full_sections() {
        let json = r##"{
            "figure": {"figsize": [8, 6], "title": "Population", "dpi": 150},
            "country_codes": ["US"],
            "inset_level1_regions": [
                {"codes": ["AK"], "location": {"width": "25%", "height": 1.5, "loc": "lower left",
                 "bbox_to_anchor": [0.05, 0.05, 1, 1], "bbox_transform": "ax.transAxes"},
                 "xlim": [-180, -130], "ylim": [50, 72]}
            ],
            "main_map_settings": {"target_crs": "EPSG:5070", "include_lakes": true,
                                  "include_lake_names": ["Lake Superior"]},
            "styling": {"cmap": "Blues_r", "missing_color": "#ffcccc", "neighbor_l1_linestyle": ":",
                        "missing_hatch": "//", "ocean_color": "0.9"},
            "label_settings": {"add_labels": true, "level1_code_column": "postal",
                               "offsets": {"RI": [1.5, -0.5]},
                               "clipped_regions": {"MI": ["top", 0.4]},
                               "inset_label_handling": {"HI": {"positioning": "relative_to_largest_polygon",
                                   "anchor_point": "representative_point",
                                   "placement": {"x_rel": 0.8, "y_rel": "centroid_y", "ha": "left"}}}},
            "data_hints": {"value_column": "population_density", "duplicate_keys": "error"}
        }"##;
        let config = RenderConfig::from_json_str(json).unwrap();
        let inset = &config.inset_level1_regions[0];
        assert_eq!(inset.location.width, Extent::Relative(0.25));
        assert_eq!(inset.location.height, Extent::Inches(1.5));
        assert_eq!(inset.location.bbox_transform, AnchorFrame::Axes);
        assert_eq!(config.styling.neighbor_l1_linestyle, LineStyle::Dotted);
        assert_eq!(config.styling.missing_hatch.as_ref().unwrap().density, 2);
        assert_eq!(config.styling.ocean_color, Color::rgb(230, 230, 230));
        let clip = config.label_settings.clipped_regions["MI"];
        assert_eq!((clip.side, clip.fraction), (ClipSide::Top, 0.4));
        let hi = config.label_settings.inset_label_handling["HI"];
        assert_eq!(hi.placement.y_rel, Some(RelativeY::Keyword(AnchorY::CentroidY)));
        assert!(hi.placement.use_arrow);
        assert_eq!(config.data_hints.duplicate_keys, DuplicateKeyPolicy::Error);
        assert_eq!(config.colorbar_label(), "Population Density");
    }

    #[test]
    fn test_label_box_and_arrow_styles() {
        let config = RenderConfig::from_json_str(
            r#"{"label_settings": {
                "label_bbox_style": {"boxstyle": "round,pad=0.2", "fc": "white", "ec": "none", "alpha": 0.5},
                "annotation_bbox_style": {},
                "annotation_arrowprops": {"arrowstyle": "->", "color": "grey", "lw": 0.8}
            }}"#,
        )
        .unwrap();
        let settings = &config.label_settings;
        let label_box = settings.label_bbox_style.unwrap();
        assert_eq!(label_box.boxstyle, BoxShape { rounded: true, pad: 0.2 });
        let (face, edge) = label_box.colors();
        assert_eq!(face, Color { a: 128, ..Color::WHITE });
        assert!(edge.is_transparent());
        assert_eq!(settings.annotation_bbox_style, Some(BoxStyle::default()));
        assert_eq!(settings.annotation_arrowprops.arrowstyle, ArrowHead::Open);
        assert_eq!(settings.annotation_arrowprops.color, Color::parse("grey"));
        assert_eq!(settings.annotation_arrowprops.linewidth, 0.8);

        let defaults = LabelSettings::default();
        assert!(defaults.label_bbox_style.is_none());
        assert!(defaults.annotation_bbox_style.is_none());
        assert_eq!(defaults.annotation_arrowprops.arrowstyle, ArrowHead::None);
    }

    #[test]
    fn test_bad_values_are_configuration_errors() {
        for json in [
            r#"{"styling": {"cmap": "not-a-map"}}"#,
            r#"{"styling": {"missing_color": "blurple"}}"#,
            r#"{"country_codes": []}"#,
            r#"{"main_map_settings": {"xlim": [5, 1]}}"#,
            r#"{"label_settings": {"clipped_regions": {"MI": ["top", 1.5]}}}"#,
            r#"{"label_settings": {"annotation_arrowprops": {"arrowstyle": "fancy"}}}"#,
            r#"{"label_settings": {"label_bbox_style": {"boxstyle": "sawtooth"}}}"#,
        ] {
            let err = RenderConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, MapError::Configuration(_)), "{json}: {err}");
        }
    }

    #[test]
    fn test_unknown_anchor_frame_falls_back_to_axes() {
        assert_eq!(AnchorFrame::from("ax.transData".to_string()), AnchorFrame::Axes);
        assert_eq!(AnchorFrame::from("fig.transFigure".to_string()), AnchorFrame::Figure);
    }

    #[test]
    fn test_name_candidates_put_configured_first() {
        let hints = DataHints::default();
        assert_eq!(hints.lake_name_candidates(), vec!["name", "name_en", "gn_name", "NAME"]);
        assert_eq!(hints.country_name_candidates()[0], "ADMIN");
    }
}
