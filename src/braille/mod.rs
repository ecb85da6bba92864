//! Terminal preview: a scene replayed onto a colored Braille canvas.
//!
//! Fills become cell background colors, outlines and leader lines become
//! Braille dots, and text is written into cells.

mod canvas;

pub use canvas::{clip_segment, BrailleCanvas, Cell, DotRect};

use crate::config::{HAlign, Orientation, VAlign};
use crate::map::scene::{scale_polygon, Colorbar, FillStyle, Stroke, Surface, TextBox, TextItem};
use crate::map::{Color, PixelRect};
use geo::{BoundingRect, Contains, LineString, MultiPolygon, Point};
use glam::DVec2;

/// [`Surface`] that draws onto a [`BrailleCanvas`]
pub struct TerminalSurface {
    canvas: BrailleCanvas,
    /// Scene pixels to canvas dots
    scale: f64,
}

impl TerminalSurface {
    /// Surface of `cols` x `rows` terminal cells
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            canvas: BrailleCanvas::new(cols, rows),
            scale: 1.0,
        }
    }

    pub fn canvas(&self) -> &BrailleCanvas {
        &self.canvas
    }

    pub fn into_canvas(self) -> BrailleCanvas {
        self.canvas
    }

    fn dot(&self, p: DVec2) -> (i32, i32) {
        ((p.x * self.scale).round() as i32, (p.y * self.scale).round() as i32)
    }

    fn dot_rect(&self, rect: &PixelRect) -> DotRect {
        let (x0, y0) = self.dot(rect.origin());
        let (x1, y1) = self.dot(DVec2::new(rect.right(), rect.bottom()));
        (x0, y0, x1, y1)
    }

    fn outline(&mut self, ring: &LineString<f64>, color: Color) {
        for segment in ring.lines() {
            self.canvas.draw_segment(segment.start.x_y(), segment.end.x_y(), color);
        }
    }

    /// First cell, row and length of `item` drawn at `position`
    fn text_cells(&self, position: DVec2, item: &TextItem) -> (i32, i32, i32) {
        let (x, y) = self.dot(position);
        let len = item.text.chars().count() as i32;
        let cx = match item.halign {
            HAlign::Left => x / 2,
            HAlign::Center => x / 2 - len / 2,
            HAlign::Right => x / 2 - len,
        };
        let cy = match item.valign {
            VAlign::Top => y / 4,
            VAlign::Center => y / 4,
            VAlign::Bottom | VAlign::Baseline => (y - 1).max(0) / 4,
        };
        (cx, cy, len)
    }

    fn rect_outline(&mut self, (x0, y0, x1, y1): DotRect, color: Color) {
        self.canvas.draw_line(x0, y0, x1 - 1, y0, color);
        self.canvas.draw_line(x1 - 1, y0, x1 - 1, y1 - 1, color);
        self.canvas.draw_line(x1 - 1, y1 - 1, x0, y1 - 1, color);
        self.canvas.draw_line(x0, y1 - 1, x0, y0, color);
    }

    fn fill_dot_rect(&mut self, (x0, y0, x1, y1): DotRect, color: Color) {
        let (cx0, cy0) = ((x0.max(0) / 2) as usize, (y0.max(0) / 4) as usize);
        let (cx1, cy1) = ((x1.max(0) + 1) as usize / 2, (y1.max(0) + 3) as usize / 4);
        for cy in cy0..cy1.min(self.canvas.height()) {
            for cx in cx0..cx1.min(self.canvas.width()) {
                let center = (cx as i32 * 2 + 1, cy as i32 * 4 + 2);
                if center.0 >= x0 && center.0 < x1 && center.1 >= y0 && center.1 < y1 {
                    self.canvas.fill_cell(cx, cy, color);
                }
            }
        }
    }
}

impl Surface for TerminalSurface {
    fn begin(&mut self, width: f64, height: f64, background: Color) {
        let sx = self.canvas.pixel_width() as f64 / width.max(1.0);
        let sy = self.canvas.pixel_height() as f64 / height.max(1.0);
        self.scale = sx.min(sy);
        self.canvas.set_clip(None);
        self.canvas.clear(background);
    }

    fn begin_panel(&mut self, rect: &PixelRect, background: Color) {
        let clip = self.dot_rect(rect);
        self.canvas.set_clip(Some(clip));
        if !background.is_transparent() {
            self.fill_dot_rect(clip, background);
        }
    }

    fn fill_polygon(&mut self, polygon: &MultiPolygon<f64>, style: &FillStyle) {
        let dots = scale_polygon(polygon, self.scale, self.scale);
        let Some(bbox) = dots.bounding_rect() else {
            return;
        };

        if !style.fill.is_transparent() {
            let cx0 = (bbox.min().x.max(0.0) / 2.0).floor() as usize;
            let cy0 = (bbox.min().y.max(0.0) / 4.0).floor() as usize;
            let cx1 = ((bbox.max().x.max(0.0) / 2.0).ceil() as usize).min(self.canvas.width());
            let cy1 = ((bbox.max().y.max(0.0) / 4.0).ceil() as usize).min(self.canvas.height());
            for cy in cy0..cy1 {
                for cx in cx0..cx1 {
                    let center = Point::new(cx as f64 * 2.0 + 1.0, cy as f64 * 4.0 + 2.0);
                    if dots.contains(&center) {
                        self.canvas.fill_cell(cx, cy, style.fill);
                    }
                }
            }
        }

        if let Some(stroke) = &style.stroke {
            if stroke.color.is_transparent() || stroke.width <= 0.0 {
                return;
            }
            for polygon in &dots {
                self.outline(polygon.exterior(), stroke.color);
                for interior in polygon.interiors() {
                    self.outline(interior, stroke.color);
                }
            }
        }
    }

    fn end_panel(&mut self, rect: &PixelRect, frame: Option<&Stroke>) {
        let bounds = self.dot_rect(rect);
        if let Some(frame) = frame {
            self.rect_outline(bounds, frame.color);
        }
        self.canvas.set_clip(None);
    }

    fn line(&mut self, from: DVec2, to: DVec2, stroke: &Stroke) {
        let (a, b) = (from * self.scale, to * self.scale);
        self.canvas.draw_segment((a.x, a.y), (b.x, b.y), stroke.color);
    }

    fn text(&mut self, position: DVec2, item: &TextItem) {
        let (cx, cy, _) = self.text_cells(position, item);
        self.canvas.put_text(cx, cy, &item.text, item.color);
    }

    /// One row of cell backgrounds under the text, a cell wider on each side
    fn text_box(&mut self, position: DVec2, item: &TextItem, style: &TextBox) {
        let (cx, cy, len) = self.text_cells(position, item);
        if style.fill.is_transparent() || cy < 0 {
            return;
        }
        for x in (cx - 1).max(0)..cx + len + 1 {
            self.canvas.fill_cell(x as usize, cy as usize, style.fill);
        }
    }

    fn colorbar(&mut self, colorbar: &Colorbar) {
        let (x0, y0, x1, y1) = self.dot_rect(&colorbar.rect);
        let (cx0, cy0) = (x0.max(0) / 2, y0.max(0) / 4);
        let (cx1, cy1) = (((x1 + 1) / 2).max(cx0 + 1), ((y1 + 3) / 4).max(cy0 + 1));

        for cy in cy0..cy1 {
            for cx in cx0..cx1 {
                let t = match colorbar.orientation {
                    Orientation::Vertical => 1.0 - (cy - cy0) as f64 / (cy1 - cy0 - 1).max(1) as f64,
                    Orientation::Horizontal => (cx - cx0) as f64 / (cx1 - cx0 - 1).max(1) as f64,
                };
                self.canvas
                    .fill_cell(cx as usize, cy as usize, colorbar.scale.colormap.sample(t));
            }
        }

        // End ticks only; the grid is too coarse for the full set.
        let (first, last) = match (colorbar.ticks.first(), colorbar.ticks.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return,
        };
        match colorbar.orientation {
            Orientation::Vertical => {
                self.canvas.put_text(cx1 + 1, cy1 - 1, &first.1, colorbar.text_color);
                self.canvas.put_text(cx1 + 1, cy0, &last.1, colorbar.text_color);
            }
            Orientation::Horizontal => {
                self.canvas.put_text(cx0, cy1, &first.1, colorbar.text_color);
                let len = last.1.chars().count() as i32;
                self.canvas.put_text(cx1 - len, cy1, &last.1, colorbar.text_color);
            }
        }
    }
}
