use geo::{BoundingRect, Coord, MapCoords, MultiPolygon, Rect};
use glam::DVec2;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Web Mercator bounds in meters (EPSG:3857)
const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Sphere radius used by the conic projection
const EARTH_RADIUS_M: f64 = 6378137.0;

/// Fraction of the data extent added on each axis around data-driven bounds
pub const BOUNDS_PADDING: f64 = 0.02;

/// Coordinate reference systems the projection manager understands
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Longitude/latitude in degrees (EPSG:4326)
    Geographic,
    /// Web Mercator in meters (EPSG:3857)
    WebMercator,
    /// Albers equal-area conic with CONUS parameters (EPSG:5070, spherical approximation)
    AlbersConus,
    /// A tag we can carry around but not transform
    Other(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("cannot transform coordinates in unsupported CRS '{0}'")]
    Unsupported(String),

    #[error("projecting ({x}, {y}) into {crs} produced a non-finite coordinate")]
    NonFinite { x: f64, y: f64, crs: String },
}

impl Crs {
    /// Parse a CRS tag. Unknown tags become [`Crs::Other`] rather than failing,
    /// so the error surfaces when a transform is actually attempted.
    pub fn parse(tag: &str) -> Self {
        let upper = tag.trim().to_ascii_uppercase();
        // urn:ogc:def:crs:EPSG::3857 -> EPSG:3857
        let upper = match upper.strip_prefix("URN:OGC:DEF:CRS:") {
            Some(rest) if rest.starts_with("OGC:") && rest.ends_with("CRS84") => "EPSG:4326".to_string(),
            Some(rest) => rest.replace("::", ":"),
            None => upper,
        };
        match upper.as_str() {
            "EPSG:4326" | "WGS84" | "CRS84" | "OGC:CRS84" | "EPSG:4269" => Crs::Geographic,
            "EPSG:3857" | "EPSG:900913" | "EPSG:3785" => Crs::WebMercator,
            "EPSG:5070" | "ESRI:102003" | "EPSG:102003" => Crs::AlbersConus,
            _ => Crs::Other(tag.trim().to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Crs::Geographic => "EPSG:4326",
            Crs::WebMercator => "EPSG:3857",
            Crs::AlbersConus => "EPSG:5070",
            Crs::Other(tag) => tag,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic)
    }

    /// Convert a coordinate in this CRS to lon/lat degrees
    fn to_geographic(&self, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match self {
            Crs::Geographic => Ok(c),
            Crs::WebMercator => {
                let lon = c.x * 180.0 / EARTH_MERCATOR_MAX;
                let lat = (PI / 2.0 - 2.0 * (-c.y * PI / EARTH_MERCATOR_MAX).exp().atan()).to_degrees();
                Ok(Coord { x: lon, y: lat })
            }
            Crs::AlbersConus => Ok(Albers::conus().inverse(c)),
            Crs::Other(tag) => Err(ProjectionError::Unsupported(tag.clone())),
        }
    }

    /// Convert lon/lat degrees into this CRS
    fn from_geographic(&self, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match self {
            Crs::Geographic => Ok(c),
            Crs::WebMercator => {
                let lat = c.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
                let lat_rad = lat.to_radians();
                let x = c.x * EARTH_MERCATOR_MAX / 180.0;
                let y = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() * EARTH_MERCATOR_MAX / PI;
                Ok(Coord { x, y })
            }
            Crs::AlbersConus => Ok(Albers::conus().forward(c)),
            Crs::Other(tag) => Err(ProjectionError::Unsupported(tag.clone())),
        }
    }

    /// Transform one coordinate from `self` into `target`
    pub fn transform(&self, target: &Crs, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        if self == target {
            return Ok(c);
        }
        let out = target.from_geographic(self.to_geographic(c)?)?;
        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(ProjectionError::NonFinite {
                x: c.x,
                y: c.y,
                crs: target.tag().to_string(),
            });
        }
        Ok(out)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::Geographic
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Crs {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Crs::parse(s))
    }
}

/// Spherical Albers equal-area conic
struct Albers {
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl Albers {
    fn new(lat0: f64, lon0: f64, lat1: f64, lat2: f64) -> Self {
        let (phi0, phi1, phi2) = (lat0.to_radians(), lat1.to_radians(), lat2.to_radians());
        let n = (phi1.sin() + phi2.sin()) / 2.0;
        let c = phi1.cos().powi(2) + 2.0 * n * phi1.sin();
        let rho0 = EARTH_RADIUS_M * (c - 2.0 * n * phi0.sin()).sqrt() / n;
        Self {
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    fn conus() -> Self {
        Self::new(23.0, -96.0, 29.5, 45.5)
    }

    fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        let (lambda, phi) = (c.x.to_radians(), c.y.to_radians());
        let rho = EARTH_RADIUS_M * (self.c - 2.0 * self.n * phi.sin()).sqrt() / self.n;
        let theta = self.n * (lambda - self.lon0);
        Coord {
            x: rho * theta.sin(),
            y: self.rho0 - rho * theta.cos(),
        }
    }

    fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let dy = self.rho0 - c.y;
        let rho = (c.x * c.x + dy * dy).sqrt();
        let theta = c.x.atan2(dy);
        let k = rho * self.n / EARTH_RADIUS_M;
        let phi = ((self.c - k * k) / (2.0 * self.n)).clamp(-1.0, 1.0).asin();
        let lambda = self.lon0 + theta / self.n;
        Coord {
            x: lambda.to_degrees(),
            y: phi.to_degrees(),
        }
    }
}

/// Reproject a polygon set between two CRSs
pub fn reproject(
    geometry: &MultiPolygon<f64>,
    from: &Crs,
    to: &Crs,
) -> Result<MultiPolygon<f64>, ProjectionError> {
    if from == to {
        return Ok(geometry.clone());
    }
    geometry.try_map_coords(|c| from.transform(to, c))
}

/// Axis-aligned display bounds in data coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_limits(xlim: [f64; 2], ylim: [f64; 2]) -> Self {
        Self::new(DVec2::new(xlim[0], ylim[0]), DVec2::new(xlim[1], ylim[1]))
    }

    /// Tight bounding box of all given geometries
    pub fn of_geometries<'a>(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Option<Self> {
        geometries
            .into_iter()
            .filter_map(|g| g.bounding_rect())
            .map(Bounds::from)
            .reduce(|a, b| a.union(&b))
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Expand by `fraction` of the extent on each side of each axis
    pub fn padded(&self, fraction: f64) -> Bounds {
        let pad = self.size() * fraction;
        Bounds::new(self.min - pad, self.max + pad)
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Point at fractional position (0..1 on each axis) inside the bounds
    pub fn at_fraction(&self, fx: f64, fy: f64) -> DVec2 {
        self.min + self.size() * DVec2::new(fx, fy)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.min.x, y: self.min.y },
            Coord { x: self.max.x, y: self.max.y },
        )
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Bounds::new(
            DVec2::new(rect.min().x, rect.min().y),
            DVec2::new(rect.max().x, rect.max().y),
        )
    }
}

/// Display bounds for a layer: explicit limits are used verbatim, a missing
/// axis falls back to the padded data extent on that axis.
pub fn resolve_bounds<'a>(
    xlim: Option<[f64; 2]>,
    ylim: Option<[f64; 2]>,
    geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> Option<Bounds> {
    if let (Some(x), Some(y)) = (xlim, ylim) {
        return Some(Bounds::from_limits(x, y));
    }
    let data = Bounds::of_geometries(geometries)?.padded(BOUNDS_PADDING);
    let x = xlim.unwrap_or([data.min.x, data.max.x]);
    let y = ylim.unwrap_or([data.min.y, data.max.y]);
    Some(Bounds::from_limits(x, y))
}

/// Rectangle in output pixels, origin top-left
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> DVec2 {
        self.origin() + self.size() * 0.5
    }
}

/// Maps data coordinates of one panel onto its pixel rectangle with an
/// equal (1:1) aspect ratio, centering the data inside the rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
    pub rect: PixelRect,
    scale: f64,
    offset: DVec2,
}

impl Viewport {
    pub fn fit(bounds: Bounds, rect: PixelRect) -> Self {
        let sx = if bounds.width() > 0.0 { rect.width / bounds.width() } else { f64::INFINITY };
        let sy = if bounds.height() > 0.0 { rect.height / bounds.height() } else { f64::INFINITY };
        let scale = match sx.min(sy) {
            s if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        };
        let drawn = bounds.size() * scale;
        let offset = (rect.size() - drawn) * 0.5;
        Self {
            bounds,
            rect,
            scale,
            offset,
        }
    }

    /// Pixels per data unit
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Project a data coordinate to pixel coordinates (y grows downwards)
    pub fn project(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.rect.x + self.offset.x + (p.x - self.bounds.min.x) * self.scale,
            self.rect.y + self.offset.y + (self.bounds.max.y - p.y) * self.scale,
        )
    }

    /// Unproject pixel coordinates back to data coordinates
    pub fn unproject(&self, px: DVec2) -> DVec2 {
        DVec2::new(
            (px.x - self.rect.x - self.offset.x) / self.scale + self.bounds.min.x,
            self.bounds.max.y - (px.y - self.rect.y - self.offset.y) / self.scale,
        )
    }

    pub fn project_geometry(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| {
            let p = self.project(DVec2::new(c.x, c.y));
            Coord { x: p.x, y: p.y }
        })
    }

    /// Check if a projected point lies inside the panel rectangle
    pub fn is_visible(&self, px: DVec2) -> bool {
        px.x >= self.rect.x && px.x <= self.rect.right() && px.y >= self.rect.y && px.y <= self.rect.bottom()
    }
}
