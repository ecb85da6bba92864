//! Device-independent description of a rendered map.
//!
//! The compositor builds a [`Scene`]; a [`Surface`] executes it. All sizes
//! (line widths, font sizes, rectangles) are already in output pixels, while
//! panel geometry stays in data coordinates until [`Scene::replay`] projects
//! it through the panel's [`Viewport`].

use crate::config::{ArrowHead, HAlign, Hatch, LineStyle, Orientation, VAlign};
use crate::map::{Color, ColorScale, PixelRect, Viewport};
use geo::{Coord, LineString, MapCoords, MultiPolygon, Polygon};
use glam::DVec2;

/// Feature layers of a panel, lowest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    NeighborCountries,
    NeighborLevel1,
    /// Every target region in missing-data style
    Base,
    /// Regions with a value, colored by the color scale
    Data,
    Water,
    Labels,
}

impl Layer {
    pub fn z_order(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub style: LineStyle,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            style: LineStyle::Solid,
        }
    }

    /// Dash lengths in pixels
    pub fn dash_array(&self) -> Option<Vec<f64>> {
        self.style
            .dash_pattern()
            .map(|pattern| pattern.iter().map(|d| d * self.width.max(1.0)).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FillStyle {
    pub fill: Color,
    pub hatch: Option<Hatch>,
    pub stroke: Option<Stroke>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    /// Data coordinates inside a panel, pixels for figure-level text
    pub position: DVec2,
    pub font_size: f64,
    pub color: Color,
    pub halign: HAlign,
    pub valign: VAlign,
    pub bbox: Option<TextBox>,
}

impl TextItem {
    /// Approximate rendered size in pixels
    pub fn extent(&self) -> DVec2 {
        DVec2::new(self.text.chars().count() as f64 * self.font_size * 0.6, self.font_size)
    }
}

/// Box drawn behind a label
#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    pub fill: Color,
    pub edge: Option<Stroke>,
    /// Pixels between the text and the box edge
    pub pad: f64,
    pub rounded: bool,
}

impl TextBox {
    /// Box around `item` drawn at `position`, honoring its alignment
    pub fn rect(&self, item: &TextItem, position: DVec2) -> PixelRect {
        let size = item.extent();
        let x = match item.halign {
            HAlign::Left => position.x,
            HAlign::Center => position.x - size.x / 2.0,
            HAlign::Right => position.x - size.x,
        };
        let y = match item.valign {
            VAlign::Top => position.y,
            VAlign::Center => position.y - size.y / 2.0,
            VAlign::Bottom | VAlign::Baseline => position.y - size.y,
        };
        PixelRect::new(x - self.pad, y - self.pad, size.x + 2.0 * self.pad, size.y + 2.0 * self.pad)
    }
}

/// Line from an annotation's text back to its anchor
#[derive(Clone, Debug, PartialEq)]
pub struct Leader {
    pub stroke: Stroke,
    pub head: ArrowHead,
    /// Pixels
    pub head_length: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Fill {
        id: String,
        geometry: MultiPolygon<f64>,
        style: FillStyle,
    },
    Text(TextItem),
    /// Text joined to `anchor` by a leader line
    Annotation {
        text: TextItem,
        anchor: DVec2,
        leader: Leader,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKind {
    Main,
    Inset,
}

/// One set of axes: a viewport plus its layered draw commands
#[derive(Clone, Debug)]
pub struct Panel {
    pub name: String,
    pub kind: PanelKind,
    pub viewport: Viewport,
    pub background: Color,
    pub frame: Option<Stroke>,
    commands: Vec<(Layer, DrawCommand)>,
}

impl Panel {
    pub fn new(name: impl Into<String>, kind: PanelKind, viewport: Viewport, background: Color) -> Self {
        Self {
            name: name.into(),
            kind,
            viewport,
            background,
            frame: None,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: Layer, command: DrawCommand) {
        self.commands.push((layer, command));
    }

    /// Commands sorted by z-order; insertion order is kept within a layer
    pub fn ordered(&self) -> Vec<(Layer, &DrawCommand)> {
        let mut out: Vec<(Layer, &DrawCommand)> = self.commands.iter().map(|(l, c)| (*l, c)).collect();
        out.sort_by_key(|(layer, _)| layer.z_order());
        out
    }

    pub fn commands_in(&self, layer: Layer) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter().filter(move |(l, _)| *l == layer).map(|(_, c)| c)
    }

    /// Ids of the filled regions in `layer`
    pub fn filled_ids(&self, layer: Layer) -> Vec<&str> {
        self.commands_in(layer)
            .filter_map(|c| match c {
                DrawCommand::Fill { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn fill_color_of(&self, layer: Layer, id: &str) -> Option<Color> {
        self.commands_in(layer).find_map(|c| match c {
            DrawCommand::Fill { id: fid, style, .. } if fid == id => Some(style.fill),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Continuous legend for the shared color scale
#[derive(Clone, Debug, PartialEq)]
pub struct Colorbar {
    pub rect: PixelRect,
    pub scale: ColorScale,
    pub orientation: Orientation,
    pub label: String,
    /// Tick positions as fractions along the bar, with their text
    pub ticks: Vec<(f64, String)>,
    pub font_size: f64,
    pub text_color: Color,
}

/// A whole figure ready to be replayed on a surface
#[derive(Clone, Debug)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub dpi: f64,
    pub background: Color,
    pub title: Option<TextItem>,
    /// Main panel first, then insets
    pub panels: Vec<Panel>,
    pub colorbar: Option<Colorbar>,
}

impl Scene {
    pub fn main_panel(&self) -> Option<&Panel> {
        self.panels.iter().find(|p| p.kind == PanelKind::Main)
    }

    pub fn insets(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(|p| p.kind == PanelKind::Inset)
    }

    /// Execute the scene on `surface`.
    ///
    /// Order: main panel fills, each inset (fills and labels), main labels,
    /// then title and colorbar. Fills are clipped to their panel; text is not.
    pub fn replay(&self, surface: &mut dyn Surface) {
        surface.begin(self.width, self.height, self.background);

        let (main, insets): (Vec<&Panel>, Vec<&Panel>) =
            self.panels.iter().partition(|p| p.kind == PanelKind::Main);

        for panel in &main {
            replay_fills(panel, surface);
        }
        for panel in &insets {
            replay_fills(panel, surface);
            replay_labels(panel, surface);
        }
        for panel in &main {
            replay_labels(panel, surface);
        }

        if let Some(title) = &self.title {
            boxed_text(surface, title.position, title);
        }
        if let Some(colorbar) = &self.colorbar {
            surface.colorbar(colorbar);
        }
        surface.finish();
    }
}

fn replay_fills(panel: &Panel, surface: &mut dyn Surface) {
    surface.begin_panel(&panel.viewport.rect, panel.background);
    for (layer, command) in panel.ordered() {
        if layer == Layer::Labels {
            continue;
        }
        if let DrawCommand::Fill { geometry, style, .. } = command {
            let projected = panel.viewport.project_geometry(geometry);
            surface.fill_polygon(&projected, style);
        }
    }
    surface.end_panel(&panel.viewport.rect, panel.frame.as_ref());
}

fn replay_labels(panel: &Panel, surface: &mut dyn Surface) {
    for command in panel.commands_in(Layer::Labels) {
        match command {
            DrawCommand::Text(item) => boxed_text(surface, panel.viewport.project(item.position), item),
            DrawCommand::Annotation { text, anchor, leader } => {
                let from = panel.viewport.project(text.position);
                draw_leader(surface, from, panel.viewport.project(*anchor), leader);
                boxed_text(surface, from, text);
            }
            DrawCommand::Fill { .. } => {}
        }
    }
}

fn boxed_text(surface: &mut dyn Surface, position: DVec2, item: &TextItem) {
    if let Some(bbox) = &item.bbox {
        surface.text_box(position, item, bbox);
    }
    surface.text(position, item);
}

/// Leader line, then its head at `to`
fn draw_leader(surface: &mut dyn Surface, from: DVec2, to: DVec2, leader: &Leader) {
    surface.line(from, to, &leader.stroke);
    let direction = (to - from).normalize_or_zero();
    if direction == DVec2::ZERO {
        return;
    }
    let back = to - direction * leader.head_length;
    let side = direction.perp() * leader.head_length * 0.5;
    let (left, right) = (back + side, back - side);
    let edge = Stroke::solid(leader.stroke.color, leader.stroke.width);
    match leader.head {
        ArrowHead::None => {}
        ArrowHead::Open => {
            surface.line(to, left, &edge);
            surface.line(to, right, &edge);
        }
        ArrowHead::Filled => {
            let ring = LineString::from(vec![(to.x, to.y), (left.x, left.y), (right.x, right.y)]);
            let style = FillStyle {
                fill: leader.stroke.color,
                hatch: None,
                stroke: Some(edge),
            };
            surface.fill_polygon(&MultiPolygon::new(vec![Polygon::new(ring, vec![])]), &style);
        }
    }
}

/// A device that can execute scene primitives. Coordinates are output
/// pixels with the origin at the top-left.
pub trait Surface {
    fn begin(&mut self, width: f64, height: f64, background: Color);

    /// Start a panel; subsequent fills are clipped to `rect`
    fn begin_panel(&mut self, rect: &PixelRect, background: Color);

    fn fill_polygon(&mut self, polygon: &MultiPolygon<f64>, style: &FillStyle);

    fn end_panel(&mut self, rect: &PixelRect, frame: Option<&Stroke>);

    fn line(&mut self, from: DVec2, to: DVec2, stroke: &Stroke);

    fn text(&mut self, position: DVec2, item: &TextItem);

    /// Background box of a label, drawn just before its text
    fn text_box(&mut self, position: DVec2, item: &TextItem, style: &TextBox);

    fn colorbar(&mut self, colorbar: &Colorbar);

    fn finish(&mut self) {}
}

/// Scale a pixel-space polygon, used by surfaces with a coarser grid
pub fn scale_polygon(polygon: &MultiPolygon<f64>, sx: f64, sy: f64) -> MultiPolygon<f64> {
    polygon.map_coords(|c| Coord { x: c.x * sx, y: c.y * sy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Bounds;
    use geo::polygon;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Surface for Recorder {
        fn begin(&mut self, _: f64, _: f64, _: Color) {
            self.calls.push("begin".into());
        }
        fn begin_panel(&mut self, _: &PixelRect, _: Color) {
            self.calls.push("panel".into());
        }
        fn fill_polygon(&mut self, _: &MultiPolygon<f64>, style: &FillStyle) {
            self.calls.push(format!("fill {}", style.fill));
        }
        fn end_panel(&mut self, _: &PixelRect, _: Option<&Stroke>) {
            self.calls.push("end".into());
        }
        fn line(&mut self, _: DVec2, _: DVec2, _: &Stroke) {
            self.calls.push("line".into());
        }
        fn text(&mut self, _: DVec2, item: &TextItem) {
            self.calls.push(format!("text {}", item.text));
        }
        fn text_box(&mut self, _: DVec2, item: &TextItem, _: &TextBox) {
            self.calls.push(format!("box {}", item.text));
        }
        fn colorbar(&mut self, _: &Colorbar) {
            self.calls.push("colorbar".into());
        }
    }

    fn fill(color: Color) -> DrawCommand {
        DrawCommand::Fill {
            id: color.to_hex(),
            geometry: MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]),
            style: FillStyle {
                fill: color,
                hatch: None,
                stroke: None,
            },
        }
    }

    fn text(s: &str) -> DrawCommand {
        DrawCommand::Text(TextItem {
            text: s.to_string(),
            position: DVec2::ZERO,
            font_size: 10.0,
            color: Color::BLACK,
            halign: HAlign::Center,
            valign: VAlign::Center,
            bbox: None,
        })
    }

    fn viewport() -> Viewport {
        Viewport::fit(Bounds::from_limits([0.0, 1.0], [0.0, 1.0]), PixelRect::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_commands_replay_in_z_order() {
        let mut main = Panel::new("main", PanelKind::Main, viewport(), Color::WHITE);
        main.push(Layer::Labels, text("main label"));
        main.push(Layer::Data, fill(Color::rgb(0, 0, 255)));
        main.push(Layer::Base, fill(Color::rgb(200, 200, 200)));
        let mut inset = Panel::new("inset", PanelKind::Inset, viewport(), Color::WHITE);
        inset.push(Layer::Base, fill(Color::rgb(1, 1, 1)));
        inset.push(Layer::Labels, text("inset label"));

        let scene = Scene {
            width: 10.0,
            height: 10.0,
            dpi: 72.0,
            background: Color::WHITE,
            title: None,
            panels: vec![main, inset],
            colorbar: None,
        };
        let mut recorder = Recorder::default();
        scene.replay(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec![
                "begin",
                "panel",
                "fill #c8c8c8",
                "fill #0000ff",
                "end",
                "panel",
                "fill #010101",
                "end",
                "text inset label",
                "text main label",
            ]
        );
    }

    fn label_box() -> TextBox {
        TextBox {
            fill: Color::WHITE,
            edge: Some(Stroke::solid(Color::BLACK, 1.0)),
            pad: 2.0,
            rounded: true,
        }
    }

    fn scene_with(panel: Panel) -> Scene {
        Scene {
            width: 10.0,
            height: 10.0,
            dpi: 72.0,
            background: Color::WHITE,
            title: None,
            panels: vec![panel],
            colorbar: None,
        }
    }

    #[test]
    fn test_boxed_annotation_replays_leader_box_text() {
        let mut main = Panel::new("main", PanelKind::Main, viewport(), Color::WHITE);
        let DrawCommand::Text(mut item) = text("RI - 1") else {
            unreachable!()
        };
        item.position = DVec2::new(0.8, 0.8);
        item.bbox = Some(label_box());
        main.push(
            Layer::Labels,
            DrawCommand::Annotation {
                text: item,
                anchor: DVec2::new(0.2, 0.2),
                leader: Leader {
                    stroke: Stroke::solid(Color::BLACK, 1.0),
                    head: ArrowHead::Open,
                    head_length: 2.0,
                },
            },
        );
        let mut recorder = Recorder::default();
        scene_with(main).replay(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec!["begin", "panel", "end", "line", "line", "line", "box RI - 1", "text RI - 1"]
        );
    }

    #[test]
    fn test_filled_arrow_head_is_a_fill() {
        let mut main = Panel::new("main", PanelKind::Main, viewport(), Color::WHITE);
        let DrawCommand::Text(item) = text("A") else {
            unreachable!()
        };
        main.push(
            Layer::Labels,
            DrawCommand::Annotation {
                text: item,
                anchor: DVec2::new(1.0, 1.0),
                leader: Leader {
                    stroke: Stroke::solid(Color::rgb(0, 128, 0), 1.0),
                    head: ArrowHead::Filled,
                    head_length: 3.0,
                },
            },
        );
        let mut recorder = Recorder::default();
        scene_with(main).replay(&mut recorder);
        assert_eq!(recorder.calls[3..], ["line", "fill #008000", "text A"]);
    }

    #[test]
    fn test_text_box_rect_follows_alignment() {
        let DrawCommand::Text(mut item) = text("abcd") else {
            unreachable!()
        };
        item.halign = HAlign::Left;
        item.valign = VAlign::Center;
        // 4 chars at 10px: 24 x 10
        let rect = label_box().rect(&item, DVec2::new(100.0, 50.0));
        assert_eq!(rect, PixelRect::new(98.0, 43.0, 28.0, 14.0));
    }

    #[test]
    fn test_dash_array_scales_with_width() {
        let stroke = Stroke {
            color: Color::BLACK,
            width: 2.0,
            style: LineStyle::Dashed,
        };
        assert_eq!(stroke.dash_array(), Some(vec![7.4, 3.2]));
        assert_eq!(Stroke::solid(Color::BLACK, 1.0).dash_array(), None);
    }

    #[test]
    fn test_layer_z_order() {
        // Panel backgrounds come from begin_panel; context layers are lowest
        assert_eq!(Layer::NeighborCountries.z_order(), 0);
        assert!(Layer::Base.z_order() < Layer::Data.z_order());
        assert!(Layer::NeighborCountries.z_order() < Layer::NeighborLevel1.z_order());
        assert!(Layer::Water.z_order() < Layer::Labels.z_order());
    }
}
