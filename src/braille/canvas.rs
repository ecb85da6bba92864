use crate::map::Color;

/// One terminal cell: Braille dots, their color, the cell background and
/// an optional text glyph that replaces the dots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    pub dots: u8,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub glyph: Option<(char, Color)>,
}

impl Cell {
    /// Character shown for this cell
    pub fn symbol(&self) -> char {
        match self.glyph {
            Some((c, _)) => c,
            None => char::from_u32(0x2800 + self.dots as u32).unwrap_or(' '),
        }
    }

    /// Foreground color for [`Cell::symbol`]
    pub fn foreground(&self) -> Option<Color> {
        match self.glyph {
            Some((_, color)) => Some(color),
            None => self.fg,
        }
    }
}

/// Dot rectangle `(x0, y0, x1, y1)`, end-exclusive
pub type DotRect = (i32, i32, i32, i32);

/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots).
/// Unicode Braille patterns: U+2800 to U+28FF
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    cells: Vec<Cell>,
    clip: Option<DotRect>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            clip: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Restrict dots and cell fills to `clip` (in dots); `None` lifts it
    pub fn set_clip(&mut self, clip: Option<DotRect>) {
        self.clip = clip;
    }

    fn visible(&self, x: i32, y: i32) -> bool {
        match self.clip {
            Some((x0, y0, x1, y1)) => x >= x0 && x < x1 && y >= y0 && y < y1,
            None => true,
        }
    }

    pub fn cell(&self, cx: usize, cy: usize) -> Option<&Cell> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        self.cells.get(cy * self.width + cx)
    }

    fn cell_mut(&mut self, cx: usize, cy: usize) -> Option<&mut Cell> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        self.cells.get_mut(cy * self.width + cx)
    }

    /// Set a pixel at the given coordinates.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if !self.visible(x as i32, y as i32) {
            return;
        }
        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };
        if let Some(cell) = self.cell_mut(x / 2, y / 4) {
            cell.dots |= bit;
            cell.fg = Some(color);
        }
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    /// Bresenham line between two dot positions
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel_signed(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;

            if e2 >= dy {
                if x == x1 {
                    break;
                }
                err += dy;
                x += sx;
            }

            if e2 <= dx {
                if y == y1 {
                    break;
                }
                err += dx;
                y += sy;
            }
        }
    }

    /// Visible dot window: the clip intersected with the canvas
    fn window(&self) -> DotRect {
        let (w, h) = (self.pixel_width() as i32, self.pixel_height() as i32);
        match self.clip {
            Some((x0, y0, x1, y1)) => (x0.max(0), y0.max(0), x1.min(w), y1.min(h)),
            None => (0, 0, w, h),
        }
    }

    /// Line between two dot positions, cut to the visible window before rasterizing
    pub fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), color: Color) {
        let Some((a, b)) = clip_segment(self.window(), from, to) else {
            return;
        };
        self.draw_line(
            a.0.round() as i32,
            a.1.round() as i32,
            b.0.round() as i32,
            b.1.round() as i32,
            color,
        );
    }

    /// Paint a cell background if its center dot is inside the clip
    pub fn fill_cell(&mut self, cx: usize, cy: usize, color: Color) {
        if !self.visible(cx as i32 * 2 + 1, cy as i32 * 4 + 2) {
            return;
        }
        if let Some(cell) = self.cell_mut(cx, cy) {
            cell.bg = Some(color);
        }
    }

    /// Paint every cell background, ignoring the clip
    pub fn clear(&mut self, color: Color) {
        for cell in &mut self.cells {
            *cell = Cell {
                bg: Some(color),
                ..Cell::default()
            };
        }
    }

    /// Write text starting at a cell; characters past the edge are dropped
    pub fn put_text(&mut self, cx: i32, cy: i32, text: &str, color: Color) {
        if cy < 0 {
            return;
        }
        for (i, ch) in text.chars().enumerate() {
            let x = cx + i as i32;
            if x < 0 {
                continue;
            }
            if let Some(cell) = self.cell_mut(x as usize, cy as usize) {
                cell.glyph = Some((ch, color));
            }
        }
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.rows().collect::<Vec<_>>().join("\n")
    }

    /// Get a specific row as a string (for line-by-line rendering)
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.cells[row * self.width..(row + 1) * self.width]
            .iter()
            .map(Cell::symbol)
            .collect()
    }

    /// Get all rows as an iterator of strings
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.height).map(|i| self.row_to_string(i))
    }
}

/// Liang-Barsky: the part of a segment inside `rect` (dots, half-open),
/// or `None` when it misses
pub fn clip_segment(rect: DotRect, from: (f64, f64), to: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
    let (x0, y0, x1, y1) = rect;
    let (xmin, ymin, xmax, ymax) = (x0 as f64, y0 as f64, (x1 - 1) as f64, (y1 - 1) as f64);
    if xmax < xmin || ymax < ymin {
        return None;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [
        (-dx, from.0 - xmin),
        (dx, xmax - from.0),
        (-dy, from.1 - ymin),
        (dy, ymax - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}
