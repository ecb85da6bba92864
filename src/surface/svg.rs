use crate::config::{HAlign, Hatch, Orientation, VAlign};
use crate::error::{MapError, Result};
use crate::map::scene::{Colorbar, FillStyle, Stroke, Surface, TextBox, TextItem};
use crate::map::{Color, PixelRect};
use geo::{LineString, MultiPolygon};
use glam::DVec2;

/// Stops sampled from the colormap for the colorbar gradient
const GRADIENT_STOPS: usize = 32;
/// Hatch line spacing in pixels at density 1
const HATCH_SPACING: f64 = 12.0;
const TICK_LENGTH: f64 = 4.0;

/// Writes a scene as a standalone SVG document
#[derive(Debug, Default)]
pub struct SvgSurface {
    out: String,
    next_id: usize,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn hatch(&mut self, path: &str, hatch: &Hatch, color: Color) {
        let spacing = (HATCH_SPACING / hatch.density as f64).max(2.0);
        for angle in &hatch.angles {
            let id = self.id("hatch");
            self.out.push_str(&format!(
                r#"<defs><pattern id="{id}" patternUnits="userSpaceOnUse" width="{s:.2}" height="{s:.2}" patternTransform="rotate({a:.1})"><line x1="0" y1="{h:.2}" x2="{s:.2}" y2="{h:.2}" stroke="{c}" stroke-width="1"/></pattern></defs>"#,
                s = spacing,
                h = spacing / 2.0,
                a = -angle,
                c = color.to_hex(),
            ));
            self.out.push_str(&format!(
                r#"<path fill-rule="evenodd" fill="url(#{id})" stroke="none" d="{path}"/>"#
            ));
            self.out.push('\n');
        }
    }
}

impl Surface for SvgSurface {
    fn begin(&mut self, width: f64, height: f64, background: Color) {
        self.out.clear();
        self.out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
        self.out.push('\n');
        self.out.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}">"#
        ));
        self.out.push('\n');
        self.out.push_str(&format!(
            r#"<rect width="100%" height="100%"{}/>"#,
            fill_attrs(background)
        ));
        self.out.push('\n');
    }

    fn begin_panel(&mut self, rect: &PixelRect, background: Color) {
        let id = self.id("clip");
        self.out.push_str(&format!(
            r#"<defs><clipPath id="{id}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath></defs>"#,
            rect.x, rect.y, rect.width, rect.height
        ));
        self.out.push_str(&format!(r#"<g clip-path="url(#{id})">"#));
        self.out.push('\n');
        self.out.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"{}/>"#,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            fill_attrs(background)
        ));
        self.out.push('\n');
    }

    fn fill_polygon(&mut self, polygon: &MultiPolygon<f64>, style: &FillStyle) {
        let d = path_data(polygon);
        if d.is_empty() {
            return;
        }
        let stroke = style.stroke.as_ref().map(stroke_attrs).unwrap_or_else(|| r#" stroke="none""#.to_string());
        self.out.push_str(&format!(
            r#"<path fill-rule="evenodd"{}{stroke} stroke-linejoin="round" d="{d}"/>"#,
            fill_attrs(style.fill)
        ));
        self.out.push('\n');
        if let Some(hatch) = &style.hatch {
            let color = style.stroke.as_ref().map(|s| s.color).unwrap_or(Color::BLACK);
            self.hatch(&d, hatch, color);
        }
    }

    fn end_panel(&mut self, rect: &PixelRect, frame: Option<&Stroke>) {
        self.out.push_str("</g>\n");
        if let Some(frame) = frame {
            self.out.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none"{}/>"#,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                stroke_attrs(frame)
            ));
            self.out.push('\n');
        }
    }

    fn line(&mut self, from: DVec2, to: DVec2, stroke: &Stroke) {
        self.out.push_str(&format!(
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}"{}/>"#,
            from.x,
            from.y,
            to.x,
            to.y,
            stroke_attrs(stroke)
        ));
        self.out.push('\n');
    }

    fn text(&mut self, position: DVec2, item: &TextItem) {
        self.out.push_str(&text_element(position, item, None));
        self.out.push('\n');
    }

    fn text_box(&mut self, position: DVec2, item: &TextItem, style: &TextBox) {
        let rect = style.rect(item, position);
        let radius = if style.rounded { style.pad } else { 0.0 };
        let stroke = style.edge.as_ref().map(stroke_attrs).unwrap_or_else(|| r#" stroke="none""#.to_string());
        self.out.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{radius:.2}"{}{stroke}/>"#,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            fill_attrs(style.fill)
        ));
        self.out.push('\n');
    }

    fn colorbar(&mut self, colorbar: &Colorbar) {
        let rect = colorbar.rect;
        let id = self.id("cbar");
        let (x2, y1, y2) = match colorbar.orientation {
            // vmin at the bottom
            Orientation::Vertical => (0, 1, 0),
            Orientation::Horizontal => (1, 0, 0),
        };
        self.out.push_str(&format!(
            r#"<defs><linearGradient id="{id}" x1="0" y1="{y1}" x2="{x2}" y2="{y2}">"#
        ));
        for i in 0..GRADIENT_STOPS {
            let t = i as f64 / (GRADIENT_STOPS - 1) as f64;
            let color = colorbar.scale.colormap.sample(t);
            self.out.push_str(&format!(
                r#"<stop offset="{:.4}" stop-color="{}"/>"#,
                t,
                color.to_hex()
            ));
        }
        self.out.push_str("</linearGradient></defs>\n");
        self.out.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="url(#{id})" stroke="{}" stroke-width="0.8"/>"#,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            colorbar.text_color.to_hex()
        ));
        self.out.push('\n');

        let tick_stroke = Stroke::solid(colorbar.text_color, 0.8);
        let mut widest = 0usize;
        for (t, label) in &colorbar.ticks {
            let (from, to, item) = match colorbar.orientation {
                Orientation::Vertical => {
                    let y = rect.bottom() - t * rect.height;
                    let from = DVec2::new(rect.right(), y);
                    (from, from + DVec2::X * TICK_LENGTH, tick_text(colorbar, label, HAlign::Left, VAlign::Center))
                }
                Orientation::Horizontal => {
                    let x = rect.x + t * rect.width;
                    let from = DVec2::new(x, rect.bottom());
                    (from, from + DVec2::Y * TICK_LENGTH, tick_text(colorbar, label, HAlign::Center, VAlign::Top))
                }
            };
            self.line(from, to, &tick_stroke);
            let offset = match colorbar.orientation {
                Orientation::Vertical => DVec2::X * 2.0,
                Orientation::Horizontal => DVec2::Y * 2.0,
            };
            self.text(to + offset, &item);
            widest = widest.max(label.chars().count());
        }

        if colorbar.label.is_empty() {
            return;
        }
        let label = tick_text(colorbar, &colorbar.label, HAlign::Center, VAlign::Top);
        match colorbar.orientation {
            Orientation::Vertical => {
                let x = rect.right() + TICK_LENGTH + 4.0 + widest as f64 * colorbar.font_size * 0.6;
                let position = DVec2::new(x, rect.y + rect.height / 2.0);
                self.out.push_str(&text_element(position, &label, Some(90.0)));
            }
            Orientation::Horizontal => {
                let position = DVec2::new(
                    rect.x + rect.width / 2.0,
                    rect.bottom() + TICK_LENGTH + 4.0 + colorbar.font_size * 1.4,
                );
                self.out.push_str(&text_element(position, &label, None));
            }
        }
        self.out.push('\n');
    }

    fn finish(&mut self) {
        self.out.push_str("</svg>\n");
    }
}

fn tick_text(colorbar: &Colorbar, text: &str, halign: HAlign, valign: VAlign) -> TextItem {
    TextItem {
        text: text.to_string(),
        position: DVec2::ZERO,
        font_size: colorbar.font_size,
        color: colorbar.text_color,
        halign,
        valign,
        bbox: None,
    }
}

fn text_element(position: DVec2, item: &TextItem, rotate: Option<f64>) -> String {
    let anchor = match item.halign {
        HAlign::Left => "start",
        HAlign::Center => "middle",
        HAlign::Right => "end",
    };
    let baseline = match item.valign {
        VAlign::Top => "hanging",
        VAlign::Center => "central",
        VAlign::Bottom => "text-after-edge",
        VAlign::Baseline => "alphabetic",
    };
    let transform = rotate
        .map(|deg| format!(r#" transform="rotate({deg:.1} {:.2} {:.2})""#, position.x, position.y))
        .unwrap_or_default();
    format!(
        r#"<text x="{:.2}" y="{:.2}" font-family="sans-serif" font-size="{:.2}" text-anchor="{anchor}" dominant-baseline="{baseline}"{}{transform}>{}</text>"#,
        position.x,
        position.y,
        item.font_size,
        fill_attrs(item.color),
        escape(&item.text)
    )
}

fn fill_attrs(color: Color) -> String {
    if color.is_transparent() {
        return r#" fill="none""#.to_string();
    }
    if color.a < 255 {
        format!(r#" fill="{}" fill-opacity="{:.3}""#, color.to_hex(), color.opacity())
    } else {
        format!(r#" fill="{}""#, color.to_hex())
    }
}

fn stroke_attrs(stroke: &Stroke) -> String {
    if stroke.color.is_transparent() || stroke.width <= 0.0 {
        return r#" stroke="none""#.to_string();
    }
    let mut attrs = format!(
        r#" stroke="{}" stroke-width="{:.2}""#,
        stroke.color.to_hex(),
        stroke.width
    );
    if stroke.color.a < 255 {
        attrs.push_str(&format!(r#" stroke-opacity="{:.3}""#, stroke.color.opacity()));
    }
    if let Some(dashes) = stroke.dash_array() {
        let dashes: Vec<String> = dashes.iter().map(|d| format!("{d:.2}")).collect();
        attrs.push_str(&format!(r#" stroke-dasharray="{}""#, dashes.join(",")));
    }
    attrs
}

/// Path data for every ring; holes rely on the even-odd fill rule
fn path_data(polygon: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for p in polygon {
        ring_to_path(p.exterior(), &mut d);
        for interior in p.interiors() {
            ring_to_path(interior, &mut d);
        }
    }
    d.trim_start().to_string()
}

fn ring_to_path(ring: &LineString<f64>, out: &mut String) {
    let mut coords = ring.coords();
    let Some(first) = coords.next() else {
        return;
    };
    out.push_str(&format!(" M{:.2},{:.2}", first.x, first.y));
    for c in coords {
        out.push_str(&format!(" L{:.2},{:.2}", c.x, c.y));
    }
    out.push('Z');
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Rasterize an SVG document to PNG bytes at its own pixel size
pub fn rasterize(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| MapError::Render(format!("invalid SVG: {e}")))?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| MapError::Render(format!("cannot allocate {}x{} pixmap", size.width(), size.height())))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| MapError::Render(format!("PNG encoding failed: {e}")))
}
