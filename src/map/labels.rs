//! Label placement: anchors, strategies and label text

use crate::config::{AnchorPoint, ClipSide, HAlign, InsetLabelRule, LabelSettings, Positioning, RelativeY, VAlign};
use crate::error::{RenderReport, RenderWarning};
use crate::feature::{match_key, MergedFeature};
use crate::map::geometry::{self, Anchor};
use crate::map::Bounds;
use geo::{Centroid, MultiPolygon};
use glam::DVec2;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LabelStrategy {
    /// Text centered on the anchor
    Direct,
    /// Text displaced by `vector`, optionally joined to the anchor by a leader line
    Offset { vector: DVec2, leader: bool },
    /// Anchor taken from a side strip of the region
    Clipped { side: ClipSide, fraction: f64 },
}

/// Where and how one region's label is drawn, in data coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct LabelPlacement {
    pub code: String,
    pub text: String,
    pub anchor: DVec2,
    /// Text position; equals `anchor` except for offset labels
    pub position: DVec2,
    pub strategy: LabelStrategy,
    pub font_size: f64,
    pub halign: HAlign,
    pub valign: VAlign,
}

impl LabelPlacement {
    /// Leader line from the text to the anchor, if one is drawn
    pub fn leader(&self) -> Option<(DVec2, DVec2)> {
        match self.strategy {
            LabelStrategy::Offset { leader: true, .. } => Some((self.position, self.anchor)),
            _ => None,
        }
    }
}

/// Look up a per-code setting, comparing codes trimmed and case-folded
fn lookup<'m, V>(map: &'m BTreeMap<String, V>, code: &str) -> Option<&'m V> {
    map.get(code).or_else(|| {
        let key = match_key(code);
        map.iter().find(|(k, _)| match_key(k) == key).map(|(_, v)| v)
    })
}

pub struct LabelEngine<'a> {
    settings: &'a LabelSettings,
    code_column: &'a str,
    name_column: &'a str,
}

impl<'a> LabelEngine<'a> {
    pub fn new(settings: &'a LabelSettings, code_column: &'a str, name_column: &'a str) -> Self {
        Self {
            settings,
            code_column,
            name_column,
        }
    }

    pub fn label_text(&self, feature: &MergedFeature) -> String {
        let value = match feature.value {
            Some(v) => format_value(&self.settings.value_format, v),
            None => self.settings.na_value_text.clone(),
        };
        let name = feature
            .feature
            .attribute_key(self.name_column)
            .unwrap_or_else(|| feature.id().to_string());
        format_label(&self.settings.label_format, &feature.code(self.code_column), &value, &name)
    }

    /// Place the label of a main-view region.
    ///
    /// Offsets win over clipped regions, which win over direct placement.
    pub fn place(&self, feature: &MergedFeature, report: &mut RenderReport) -> Option<LabelPlacement> {
        self.place_with_font(feature, self.settings.label_fontsize, report)
    }

    /// Place the label of a region drawn inside an inset whose display window
    /// is `window`. Per-code inset rules take precedence; everything else is
    /// placed as in the main view with a slightly smaller font.
    pub fn place_in_inset(
        &self,
        feature: &MergedFeature,
        window: &Bounds,
        report: &mut RenderReport,
    ) -> Option<LabelPlacement> {
        let code = feature.code(self.code_column);
        if let Some(rule) = lookup(&self.settings.inset_label_handling, &code) {
            match inset_anchor(feature.polygon(), rule) {
                Some(anchor) => {
                    let target = inset_target(anchor, window, rule);
                    return Some(LabelPlacement {
                        text: self.label_text(feature),
                        code,
                        anchor,
                        position: target,
                        strategy: LabelStrategy::Offset {
                            vector: target - anchor,
                            leader: rule.placement.use_arrow,
                        },
                        font_size: self.settings.annotation_fontsize,
                        halign: rule.placement.ha,
                        valign: rule.placement.va,
                    });
                }
                None => tracing::warn!("no anchor for inset label rule of {code}; using default placement"),
            }
        }
        let font = (self.settings.label_fontsize - 1.0).max(1.0);
        self.place_with_font(feature, font, report)
    }

    fn place_with_font(&self, feature: &MergedFeature, font_size: f64, report: &mut RenderReport) -> Option<LabelPlacement> {
        let code = feature.code(self.code_column);
        let Some(default) = geometry::representative_point(feature.polygon()) else {
            tracing::debug!("{code} has no coordinates; no label");
            return None;
        };
        if default.source != geometry::AnchorSource::Interior {
            tracing::debug!(source = ?default.source, "label anchor for {code} fell back");
        }
        let text = self.label_text(feature);

        if let Some(offset) = lookup(&self.settings.offsets, &code) {
            let vector = DVec2::from_array(*offset);
            return Some(LabelPlacement {
                code,
                text,
                anchor: default.point,
                position: default.point + vector,
                strategy: LabelStrategy::Offset { vector, leader: true },
                font_size: self.settings.annotation_fontsize,
                halign: HAlign::Left,
                valign: VAlign::Center,
            });
        }

        let mut placement = LabelPlacement {
            code,
            text,
            anchor: default.point,
            position: default.point,
            strategy: LabelStrategy::Direct,
            font_size,
            halign: HAlign::Center,
            valign: VAlign::Center,
        };

        if let Some(spec) = lookup(&self.settings.clipped_regions, &placement.code) {
            let clipped = feature
                .drawable
                .then(|| geometry::clip_to_side(feature.polygon(), spec.side, spec.fraction))
                .flatten()
                .and_then(|part| geometry::representative_point(&part));
            match clipped {
                Some(Anchor { point, .. }) => {
                    placement.anchor = point;
                    placement.position = point;
                    placement.strategy = LabelStrategy::Clipped {
                        side: spec.side,
                        fraction: spec.fraction,
                    };
                }
                None => report.warn(RenderWarning::EmptyClip {
                    id: placement.code.clone(),
                }),
            }
        }
        Some(placement)
    }
}

fn inset_anchor(polygon: &MultiPolygon<f64>, rule: &InsetLabelRule) -> Option<DVec2> {
    let centroid = |g: &MultiPolygon<f64>| g.centroid().map(|c| DVec2::new(c.x(), c.y()));
    match rule.positioning {
        Positioning::RelativeToLargestPolygon => {
            let largest = MultiPolygon::new(vec![geometry::largest_polygon(polygon)?.clone()]);
            match rule.anchor_point {
                Some(AnchorPoint::RepresentativePoint) => geometry::representative_point(&largest).map(|a| a.point),
                _ => centroid(&largest),
            }
        }
        Positioning::GeometryCentroid => centroid(polygon),
        Positioning::GeometryRepresentativePoint => geometry::representative_point(polygon).map(|a| a.point),
    }
}

fn inset_target(anchor: DVec2, window: &Bounds, rule: &InsetLabelRule) -> DVec2 {
    let x = match rule.placement.x_rel {
        Some(fx) => window.min.x + window.width() * fx,
        None => anchor.x,
    };
    let y = match rule.placement.y_rel {
        Some(RelativeY::Fraction(fy)) => window.min.y + window.height() * fy,
        _ => anchor.y,
    };
    DVec2::new(x, y)
}

/// Fill a label template. Recognized placeholders are `{code}`, `{value}` and
/// `{name}`; anything else is left as written.
pub fn format_label(template: &str, code: &str, value: &str, name: &str) -> String {
    template
        .replace("{code}", code)
        .replace("{value}", value)
        .replace("{name}", name)
}

/// Format a number with a Python-style format string such as `"{:.0f}"`,
/// `"{:,.1f} km²"` or `"{:.1%}"`.
///
/// Supported: thousands grouping (`,`), precision (`.N`) and the types `f`,
/// `%`, `d`, `e` and `g`/none. Anything else falls back to plain display.
pub fn format_value(format: &str, value: f64) -> String {
    let plain = || {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            format!("{value}")
        }
    };
    let (Some(open), Some(close)) = (format.find('{'), format.find('}')) else {
        return plain();
    };
    if close < open {
        return plain();
    }
    let (prefix, suffix) = (&format[..open], &format[close + 1..]);
    let spec = format[open + 1..close].trim_start_matches(|c: char| c.is_ascii_digit());
    let spec = match spec.strip_prefix(':') {
        Some(spec) => spec,
        None if spec.is_empty() => "",
        None => return plain(),
    };
    match render_spec(spec, value) {
        Some(body) => format!("{prefix}{body}{suffix}"),
        None => plain(),
    }
}

fn render_spec(spec: &str, value: f64) -> Option<String> {
    let (grouping, rest) = match spec.strip_prefix(',') {
        Some(rest) => (true, rest),
        None => (false, spec),
    };
    let (precision, kind) = match rest.strip_prefix('.') {
        Some(rest) => {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            (Some(digits.parse::<usize>().ok()?), &rest[digits.len()..])
        }
        None => (None, rest),
    };
    if grouping && rest.contains(',') {
        return None;
    }

    let body = match kind {
        "f" | "F" => format!("{:.*}", precision.unwrap_or(6), value),
        "%" => return Some(format!("{}%", group(&format!("{:.*}", precision.unwrap_or(6), value * 100.0), grouping))),
        "d" if value.fract() == 0.0 && precision.is_none() => format!("{}", value as i64),
        "e" | "E" => {
            let s = format!("{:.*e}", precision.unwrap_or(6), value);
            let (mantissa, exp) = s.split_once('e')?;
            let exp: i32 = exp.parse().ok()?;
            let sign = if exp < 0 { '-' } else { '+' };
            let e = if kind == "E" { 'E' } else { 'e' };
            format!("{mantissa}{e}{sign}{:02}", exp.abs())
        }
        "" | "g" | "G" if precision.is_none() => {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", value as i64)
            } else {
                format!("{value}")
            }
        }
        _ => return None,
    };
    Some(group(&body, grouping))
}

/// Insert thousands separators into the integer part of a formatted number
fn group(number: &str, grouping: bool) -> String {
    if !grouping {
        return number.to_string();
    }
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let split = unsigned.find(|c: char| !c.is_ascii_digit()).unwrap_or(unsigned.len());
    let (int_part, tail) = unsigned.split_at(split);
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}{tail}")
}
