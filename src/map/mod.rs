mod colormap;
pub mod geometry;
pub mod labels;
mod projection;
mod renderer;
pub mod scene;

pub use colormap::{Color, ColorScale, Colormap, Normalize};
pub use labels::{LabelEngine, LabelPlacement, LabelStrategy};
pub use projection::{reproject, resolve_bounds, Bounds, Crs, PixelRect, ProjectionError, Viewport, BOUNDS_PADDING};
pub use renderer::{MapInputs, RenderOutput, Renderer};
pub use scene::{DrawCommand, Layer, Panel, Scene, Surface};
