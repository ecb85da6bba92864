use serde::Deserialize;
use std::fmt;

/// RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a color spec: a CSS-style name, `#rgb`, `#rrggbb`, `#rrggbbaa`,
    /// `none`, or a grey level between 0 and 1 such as `"0.8"`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if let Some(hex) = spec.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Ok(level) = spec.parse::<f64>() {
            if (0.0..=1.0).contains(&level) {
                let v = (level * 255.0).round() as u8;
                return Some(Color::rgb(v, v, v));
            }
            return None;
        }
        let lower = spec.to_ascii_lowercase();
        if lower == "none" || lower == "transparent" {
            return Some(Color::TRANSPARENT);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|&(_, hex)| Color::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8))
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Color::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
            6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// `#rrggbb`, ignoring alpha
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f64 {
        self.a as f64 / 255.0
    }

    /// Scale the alpha channel by `opacity`
    pub fn with_opacity(self, opacity: f64) -> Color {
        Color {
            a: (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8,
            ..self
        }
    }

    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + t * (b as f64 - a as f64)).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        Color::parse(&spec).ok_or_else(|| format!("unknown color '{spec}'"))
    }
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xF0F8FF),
    ("azure", 0xF0FFFF),
    ("beige", 0xF5F5DC),
    ("black", 0x000000),
    ("k", 0x000000),
    ("blue", 0x0000FF),
    ("brown", 0xA52A2A),
    ("cornsilk", 0xFFF8DC),
    ("darkblue", 0x00008B),
    ("darkgray", 0xA9A9A9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xA9A9A9),
    ("darkred", 0x8B0000),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("gainsboro", 0xDCDCDC),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("grey", 0x808080),
    ("honeydew", 0xF0FFF0),
    ("ivory", 0xFFFFF0),
    ("khaki", 0xF0E68C),
    ("lavender", 0xE6E6FA),
    ("lightblue", 0xADD8E6),
    ("lightcyan", 0xE0FFFF),
    ("lightgray", 0xD3D3D3),
    ("lightgrey", 0xD3D3D3),
    ("lightsteelblue", 0xB0C4DE),
    ("lightyellow", 0xFFFFE0),
    ("linen", 0xFAF0E6),
    ("mintcream", 0xF5FFFA),
    ("navy", 0x000080),
    ("orange", 0xFFA500),
    ("powderblue", 0xB0E0E6),
    ("purple", 0x800080),
    ("red", 0xFF0000),
    ("seashell", 0xFFF5EE),
    ("silver", 0xC0C0C0),
    ("skyblue", 0x87CEEB),
    ("snow", 0xFFFAFA),
    ("steelblue", 0x4682B4),
    ("tan", 0xD2B48C),
    ("wheat", 0xF5DEB3),
    ("white", 0xFFFFFF),
    ("w", 0xFFFFFF),
    ("whitesmoke", 0xF5F5F5),
    ("yellow", 0xFFFF00),
];

type Stops = &'static [(u8, u8, u8)];

const VIRIDIS: Stops = &[
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];
const PLASMA: Stops = &[
    (13, 8, 135),
    (84, 2, 163),
    (139, 10, 165),
    (185, 50, 137),
    (219, 92, 104),
    (244, 136, 73),
    (254, 188, 43),
    (240, 249, 33),
];
const MAGMA: Stops = &[
    (0, 0, 4),
    (28, 16, 68),
    (79, 18, 123),
    (129, 37, 129),
    (181, 54, 122),
    (229, 80, 100),
    (251, 135, 97),
    (254, 194, 135),
    (252, 253, 191),
];
const INFERNO: Stops = &[
    (0, 0, 4),
    (31, 12, 72),
    (85, 15, 109),
    (136, 34, 106),
    (186, 54, 85),
    (227, 89, 51),
    (249, 140, 10),
    (249, 201, 50),
    (252, 255, 164),
];
const CIVIDIS: Stops = &[
    (0, 34, 78),
    (18, 53, 112),
    (59, 73, 108),
    (87, 93, 109),
    (112, 113, 115),
    (138, 134, 120),
    (165, 156, 116),
    (195, 180, 104),
    (225, 205, 80),
    (254, 232, 56),
];
const BLUES: Stops = &[
    (247, 251, 255),
    (222, 235, 247),
    (198, 219, 239),
    (158, 202, 225),
    (107, 174, 214),
    (66, 146, 198),
    (33, 113, 181),
    (8, 81, 156),
    (8, 48, 107),
];
const REDS: Stops = &[
    (255, 245, 240),
    (254, 224, 210),
    (252, 187, 161),
    (252, 146, 114),
    (251, 106, 74),
    (239, 59, 44),
    (203, 24, 29),
    (165, 15, 21),
    (103, 0, 13),
];
const GREENS: Stops = &[
    (247, 252, 245),
    (229, 245, 224),
    (199, 233, 192),
    (161, 217, 155),
    (116, 196, 118),
    (65, 171, 93),
    (35, 139, 69),
    (0, 109, 44),
    (0, 68, 27),
];
const ORANGES: Stops = &[
    (255, 245, 235),
    (254, 230, 206),
    (253, 208, 162),
    (253, 174, 107),
    (253, 141, 60),
    (241, 105, 19),
    (217, 72, 1),
    (166, 54, 3),
    (127, 39, 4),
];
const PURPLES: Stops = &[
    (252, 251, 253),
    (239, 237, 245),
    (218, 218, 235),
    (188, 189, 220),
    (158, 154, 200),
    (128, 125, 186),
    (106, 81, 163),
    (84, 39, 143),
    (63, 0, 125),
];
const GREYS: Stops = &[
    (255, 255, 255),
    (240, 240, 240),
    (217, 217, 217),
    (189, 189, 189),
    (150, 150, 150),
    (115, 115, 115),
    (82, 82, 82),
    (37, 37, 37),
    (0, 0, 0),
];
const YLORRD: Stops = &[
    (255, 255, 204),
    (255, 237, 160),
    (254, 217, 118),
    (254, 178, 76),
    (253, 141, 60),
    (252, 78, 42),
    (227, 26, 28),
    (189, 0, 38),
    (128, 0, 38),
];
const YLGNBU: Stops = &[
    (255, 255, 217),
    (237, 248, 177),
    (199, 233, 180),
    (127, 205, 187),
    (65, 182, 196),
    (29, 145, 192),
    (34, 94, 168),
    (37, 52, 148),
    (8, 29, 88),
];
const RDYLGN: Stops = &[
    (165, 0, 38),
    (215, 48, 39),
    (244, 109, 67),
    (253, 174, 97),
    (254, 224, 139),
    (255, 255, 191),
    (217, 239, 139),
    (166, 217, 106),
    (102, 189, 99),
    (26, 152, 80),
    (0, 104, 55),
];
const COOLWARM: Stops = &[
    (59, 76, 192),
    (98, 130, 234),
    (141, 176, 254),
    (184, 208, 249),
    (221, 221, 221),
    (245, 196, 173),
    (244, 154, 123),
    (222, 96, 77),
    (180, 4, 38),
];

const COLORMAPS: &[(&str, Stops)] = &[
    ("viridis", VIRIDIS),
    ("plasma", PLASMA),
    ("magma", MAGMA),
    ("inferno", INFERNO),
    ("cividis", CIVIDIS),
    ("blues", BLUES),
    ("reds", REDS),
    ("greens", GREENS),
    ("oranges", ORANGES),
    ("purples", PURPLES),
    ("greys", GREYS),
    ("ylorrd", YLORRD),
    ("ylgnbu", YLGNBU),
    ("rdylgn", RDYLGN),
    ("coolwarm", COOLWARM),
];

/// Continuous colormap interpolated between fixed stops
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Colormap {
    name: String,
    stops: Stops,
    reversed: bool,
}

impl Colormap {
    /// Look up a named colormap; a `_r` suffix reverses it
    pub fn named(name: &str) -> Option<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let lower = base.to_ascii_lowercase();
        COLORMAPS
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|&(_, stops)| Colormap {
                name: name.to_string(),
                stops,
                reversed,
            })
    }

    pub fn viridis() -> Self {
        Colormap {
            name: "viridis".to_string(),
            stops: VIRIDIS,
            reversed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color at position `t` in `[0, 1]` (clamped)
    pub fn sample(&self, t: f64) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let t = if self.reversed { 1.0 - t } else { t };
        let segs = (self.stops.len() - 1) as f64;
        let x = t * segs;
        let i = x.floor() as usize;
        if i >= self.stops.len() - 1 {
            let (r, g, b) = self.stops[self.stops.len() - 1];
            return Color::rgb(r, g, b);
        }
        let (r0, g0, b0) = self.stops[i];
        let (r1, g1, b1) = self.stops[i + 1];
        Color::rgb(r0, g0, b0).lerp(Color::rgb(r1, g1, b1), x - i as f64)
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Colormap::viridis()
    }
}

impl TryFrom<String> for Colormap {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Colormap::named(&name).ok_or_else(|| {
            let known: Vec<&str> = COLORMAPS.iter().map(|(n, _)| *n).collect();
            format!("unknown colormap '{name}' (known: {})", known.join(", "))
        })
    }
}

/// Linear normalization of values into `[0, 1]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalize {
    pub vmin: f64,
    pub vmax: f64,
}

impl Normalize {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self { vmin, vmax }
    }

    /// Range over the present values; `None` when there are none
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .map(|(lo, hi)| Normalize::new(lo, hi))
    }

    pub fn apply(&self, value: f64) -> f64 {
        if self.vmax > self.vmin {
            ((value - self.vmin) / (self.vmax - self.vmin)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for Normalize {
    fn default() -> Self {
        Normalize::new(0.0, 1.0)
    }
}

/// Colormap plus the normalization shared by every panel of a render
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScale {
    pub colormap: Colormap,
    pub norm: Normalize,
}

impl ColorScale {
    pub fn new(colormap: Colormap, norm: Normalize) -> Self {
        Self { colormap, norm }
    }

    pub fn color_for(&self, value: f64) -> Color {
        self.colormap.sample(self.norm.apply(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colors() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#EAEAEA"), Some(Color::rgb(0xEA, 0xEA, 0xEA)));
        assert_eq!(Color::parse("lightgrey"), Some(Color::rgb(211, 211, 211)));
        assert_eq!(Color::parse("AliceBlue"), Some(Color::rgb(240, 248, 255)));
        assert_eq!(Color::parse("0.8"), Some(Color::rgb(204, 204, 204)));
        assert!(Color::parse("none").unwrap().is_transparent());
        assert_eq!(Color::parse("chartreuse-ish"), None);
        assert_eq!(Color::parse("1.5"), None);
    }

    #[test]
    fn test_viridis_endpoints() {
        let cmap = Colormap::viridis();
        assert_eq!(cmap.sample(0.0), Color::rgb(68, 1, 84));
        assert_eq!(cmap.sample(1.0), Color::rgb(253, 231, 37));
        assert_eq!(cmap.sample(f64::NAN), Color::rgb(68, 1, 84));
    }

    #[test]
    fn test_reversed_colormap() {
        let cmap = Colormap::named("Blues_r").unwrap();
        assert_eq!(cmap.sample(0.0), Color::rgb(8, 48, 107));
        assert!(Colormap::named("jet").is_none());
    }

    #[test]
    fn test_normalize_range() {
        let norm = Normalize::from_values([5.0, f64::NAN, 10.0, 20.0]).unwrap();
        assert_eq!(norm, Normalize::new(5.0, 20.0));
        assert_eq!(norm.apply(12.5), 0.5);
        assert_eq!(norm.apply(100.0), 1.0);
        assert!(Normalize::from_values(std::iter::empty()).is_none());
        assert_eq!(Normalize::new(3.0, 3.0).apply(3.0), 0.0);
    }
}
