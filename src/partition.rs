//! Region partitioner: splits the joined geometry into the sets drawn by
//! each panel and layer.

use crate::config::RenderConfig;
use crate::error::{MapError, RenderReport, RenderWarning, Result};
use crate::feature::{match_key, GeometryCollection, MergedFeature};
use crate::map::geometry;
use crate::map::{reproject, resolve_bounds, Bounds, Crs, ProjectionError};
use std::collections::HashSet;

/// A named subset of features sharing one CRS and one display window
#[derive(Clone, Debug)]
pub struct RegionSet {
    pub name: String,
    pub features: Vec<MergedFeature>,
    pub crs: Crs,
    pub bounds: Option<Bounds>,
}

impl RegionSet {
    pub fn new(name: impl Into<String>, crs: Crs, features: Vec<MergedFeature>) -> Self {
        Self {
            name: name.into(),
            features,
            crs,
            bounds: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Region codes from `column`, in order
    pub fn codes(&self, column: &str) -> Vec<String> {
        self.features.iter().map(|f| f.code(column)).collect()
    }

    pub fn drawable(&self) -> impl Iterator<Item = &MergedFeature> {
        self.features.iter().filter(|f| f.drawable)
    }

    pub fn with_values(&self) -> impl Iterator<Item = &MergedFeature> {
        self.drawable().filter(|f| f.has_value())
    }

    /// Copy of this set with every polygon transformed into `target`
    pub fn reprojected(&self, target: &Crs) -> std::result::Result<RegionSet, ProjectionError> {
        if &self.crs == target {
            return Ok(self.clone());
        }
        let mut features = Vec::with_capacity(self.features.len());
        for merged in &self.features {
            let mut merged = merged.clone();
            merged.feature.polygon = reproject(&merged.feature.polygon, &self.crs, target)?;
            features.push(merged);
        }
        Ok(RegionSet {
            name: self.name.clone(),
            features,
            crs: target.clone(),
            bounds: None,
        })
    }

    /// Attach display bounds: explicit limits verbatim, otherwise the padded
    /// extent of the drawable geometry.
    pub fn bounded(mut self, xlim: Option<[f64; 2]>, ylim: Option<[f64; 2]>) -> Self {
        let drawable = resolve_bounds(xlim, ylim, self.drawable().map(MergedFeature::polygon));
        self.bounds = drawable.or_else(|| resolve_bounds(xlim, ylim, self.features.iter().map(MergedFeature::polygon)));
        self
    }

    /// Reproject into `target` when given, then attach bounds.
    ///
    /// A failed reprojection keeps the native CRS and records a warning;
    /// the render carries on in that frame.
    pub fn project_and_bound(
        self,
        target: Option<&Crs>,
        xlim: Option<[f64; 2]>,
        ylim: Option<[f64; 2]>,
        report: &mut RenderReport,
    ) -> Self {
        let projected = match target {
            Some(crs) => match self.reprojected(crs) {
                Ok(set) => set,
                Err(e) => {
                    tracing::error!(layer = %self.name, "reprojection to {crs} failed: {e}; keeping {}", self.crs);
                    report.warn(RenderWarning::ReprojectionFailed {
                        layer: self.name.clone(),
                        reason: e.to_string(),
                    });
                    self
                }
            },
            None => self,
        };
        projected.bounded(xlim, ylim)
    }
}

/// Inset definition index plus its regions
#[derive(Clone, Debug)]
pub struct Inset {
    /// Position in `inset_level1_regions`
    pub index: usize,
    pub regions: RegionSet,
}

/// Context layers available to a render; each is optional
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextSources<'a> {
    /// Level-1 regions of neighboring countries (often the same layer as the target)
    pub neighbor_level1: Option<&'a GeometryCollection>,
    pub countries: Option<&'a GeometryCollection>,
    pub water: Option<&'a GeometryCollection>,
}

#[derive(Clone, Debug)]
pub struct Partition {
    /// Every region passing the country filter, used for value normalization
    pub target: RegionSet,
    pub main: RegionSet,
    pub insets: Vec<Inset>,
    pub neighbor_level1: Option<RegionSet>,
    pub neighbor_countries: Option<RegionSet>,
    pub water: Option<RegionSet>,
}

fn code_set<'a>(codes: impl IntoIterator<Item = &'a String>) -> HashSet<String> {
    codes.into_iter().map(|c| match_key(c)).collect()
}

/// Repair invalid polygons in place; unrepairable ones stay but are not drawn
fn repair_features(features: &mut [MergedFeature], report: &mut RenderReport) {
    for merged in features.iter_mut() {
        match geometry::repair(&merged.feature.polygon) {
            Some(fixed) => merged.feature.polygon = fixed,
            None => {
                merged.drawable = false;
                report.warn(RenderWarning::InvalidGeometry {
                    id: merged.id().to_string(),
                });
            }
        }
    }
}

fn skip(report: &mut RenderReport, layer: &str, reason: impl Into<String>) {
    report.warn(RenderWarning::LayerSkipped {
        layer: layer.to_string(),
        reason: reason.into(),
    });
}

/// Split the joined level-1 features into target, main view, insets and
/// context layers.
///
/// Unless `main_level1_codes` is configured, every region claimed by an
/// inset is removed from the main view.
pub fn partition(
    merged: Vec<MergedFeature>,
    crs: &Crs,
    config: &RenderConfig,
    context: &ContextSources<'_>,
    report: &mut RenderReport,
) -> Result<Partition> {
    let hints = &config.data_hints;
    let code_column = config.level1_code_column();
    let total = merged.len();

    let mut target = match &config.country_codes {
        Some(codes) => {
            let column = &hints.country_code_column;
            if merged.iter().any(|m| m.feature.attributes.contains_key(column)) {
                let wanted = code_set(codes);
                let kept: Vec<MergedFeature> = merged
                    .into_iter()
                    .filter(|m| {
                        m.feature
                            .attribute_key(column)
                            .is_some_and(|c| wanted.contains(&match_key(&c)))
                    })
                    .collect();
                if kept.is_empty() {
                    return Err(MapError::config(format!(
                        "country filter {codes:?} on column '{column}' matched no regions"
                    )));
                }
                kept
            } else {
                report.warn(RenderWarning::MissingFilterColumn {
                    column: column.clone(),
                });
                merged
            }
        }
        None => merged,
    };
    tracing::info!(kept = target.len(), filtered_out = total - target.len(), "country filter applied");

    repair_features(&mut target, report);

    let inset_codes = code_set(config.inset_level1_regions.iter().flat_map(|i| &i.codes));
    let in_codes = |m: &MergedFeature, codes: &HashSet<String>| codes.contains(&match_key(&m.code(code_column)));

    let main_features: Vec<MergedFeature> = match &config.main_level1_codes {
        Some(allow) => {
            let allow = code_set(allow);
            target.iter().filter(|m| in_codes(*m, &allow)).cloned().collect()
        }
        None => target.iter().filter(|m| !in_codes(*m, &inset_codes)).cloned().collect(),
    };
    if main_features.is_empty() {
        return Err(MapError::config("main view is empty after applying inset and main_level1_codes membership"));
    }

    let mut insets = Vec::new();
    for (index, def) in config.inset_level1_regions.iter().enumerate() {
        let name = format!("inset {} [{}]", index + 1, def.codes.join(","));
        if def.codes.is_empty() {
            skip(report, &name, "no codes configured");
            continue;
        }
        let codes = code_set(&def.codes);
        let features: Vec<MergedFeature> = target.iter().filter(|m| in_codes(*m, &codes)).cloned().collect();
        if features.is_empty() {
            skip(report, &name, "no matching regions");
            continue;
        }
        insets.push(Inset {
            index,
            regions: RegionSet::new(name, crs.clone(), features),
        });
    }

    let settings = &config.main_map_settings;
    let neighbor_level1 = if settings.include_neighboring_level1 {
        neighbor_level1_set(config, context, report)
    } else {
        None
    };
    let neighbor_countries = if settings.include_neighboring_countries {
        neighbor_country_set(config, context, report)
    } else {
        None
    };
    let wants_water = settings.include_lakes || config.inset_level1_regions.iter().any(|i| i.include_lakes);
    let water = if wants_water { water_set(config, context, report) } else { None };

    tracing::info!(
        main = main_features.len(),
        insets = insets.len(),
        neighbors = neighbor_level1.as_ref().map_or(0, RegionSet::len),
        countries = neighbor_countries.as_ref().map_or(0, RegionSet::len),
        water = water.as_ref().map_or(0, RegionSet::len),
        "partitioned regions"
    );

    Ok(Partition {
        main: RegionSet::new("main", crs.clone(), main_features),
        target: RegionSet::new("target", crs.clone(), target),
        insets,
        neighbor_level1,
        neighbor_countries,
        water,
    })
}

fn context_set(
    name: &str,
    source: &GeometryCollection,
    column: &str,
    wanted: &HashSet<String>,
    report: &mut RenderReport,
) -> Option<RegionSet> {
    let mut features: Vec<MergedFeature> = source
        .iter()
        .filter(|f| f.attribute_key(column).is_some_and(|v| wanted.contains(&match_key(&v))))
        .cloned()
        .map(MergedFeature::context)
        .collect();
    if features.is_empty() {
        skip(report, name, format!("no features matched on column '{column}'"));
        return None;
    }
    repair_features(&mut features, report);
    Some(RegionSet::new(name, source.crs.clone(), features))
}

fn neighbor_level1_set(config: &RenderConfig, context: &ContextSources<'_>, report: &mut RenderReport) -> Option<RegionSet> {
    const LAYER: &str = "neighbor level-1 regions";
    let Some(source) = context.neighbor_level1 else {
        skip(report, LAYER, "no level-1 source");
        return None;
    };
    let targets = code_set(config.country_codes.iter().flatten());
    let wanted: HashSet<String> = code_set(&config.data_hints.neighbor_country_codes)
        .into_iter()
        .filter(|c| !targets.contains(c))
        .collect();
    if wanted.is_empty() {
        skip(report, LAYER, "no neighbor_country_codes outside the target countries");
        return None;
    }
    context_set(LAYER, source, &config.data_hints.country_code_column, &wanted, report)
}

fn neighbor_country_set(config: &RenderConfig, context: &ContextSources<'_>, report: &mut RenderReport) -> Option<RegionSet> {
    const LAYER: &str = "neighbor countries";
    let Some(source) = context.countries else {
        skip(report, LAYER, "no country source");
        return None;
    };
    let names = &config.data_hints.neighboring_country_codes;
    if names.is_empty() {
        skip(report, LAYER, "no neighboring_country_codes configured");
        return None;
    }
    let candidates = config.data_hints.country_name_candidates();
    let Some(column) = source.find_column(&candidates) else {
        skip(report, LAYER, format!("none of the name columns {candidates:?} exist"));
        return None;
    };
    context_set(LAYER, source, column, &code_set(names), report)
}

fn water_set(config: &RenderConfig, context: &ContextSources<'_>, report: &mut RenderReport) -> Option<RegionSet> {
    const LAYER: &str = "water";
    let Some(source) = context.water else {
        skip(report, LAYER, "no water source");
        return None;
    };
    let names = &config.main_map_settings.include_lake_names;
    if names.is_empty() {
        tracing::info!("include_lake_names is empty; no water bodies drawn");
        return None;
    }
    let candidates = config.data_hints.lake_name_candidates();
    let Some(column) = source.find_column(&candidates) else {
        skip(report, LAYER, format!("none of the name columns {candidates:?} exist"));
        return None;
    };
    context_set(LAYER, source, column, &code_set(names), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsetConfig;
    use crate::feature::GeometryFeature;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ]])
    }

    fn region(code: &str, country: &str, x: f64) -> MergedFeature {
        MergedFeature::new(
            GeometryFeature::new(code, square(x))
                .with_attribute("postal", code)
                .with_attribute("iso_a2", country),
            Some(x),
        )
    }

    fn merged() -> Vec<MergedFeature> {
        vec![
            region("A", "US", 0.0),
            region("B", "US", 2.0),
            region("C", "US", 4.0),
            region("X", "CA", 6.0),
        ]
    }

    fn inset(codes: &[&str]) -> InsetConfig {
        InsetConfig {
            codes: codes.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insets_are_excluded_from_main_view() {
        let mut config = RenderConfig::default();
        config.country_codes = Some(vec!["US".into()]);
        config.inset_level1_regions = vec![inset(&["A"]), inset(&["c"])];
        let mut report = RenderReport::default();
        let p = partition(merged(), &Crs::Geographic, &config, &ContextSources::default(), &mut report).unwrap();

        assert_eq!(p.target.len(), 3);
        assert_eq!(p.main.codes("postal"), vec!["B"]);
        assert_eq!(p.insets[0].regions.codes("postal"), vec!["A"]);
        assert_eq!(p.insets[1].regions.codes("postal"), vec!["C"]);
        assert_eq!(p.insets[1].index, 1);
    }

    #[test]
    fn test_explicit_main_codes_override_exclusion() {
        let mut config = RenderConfig::default();
        config.inset_level1_regions = vec![inset(&["A"])];
        config.main_level1_codes = Some(vec!["A".into(), "B".into()]);
        let p = partition(merged(), &Crs::Geographic, &config, &ContextSources::default(), &mut RenderReport::default()).unwrap();
        assert_eq!(p.main.codes("postal"), vec!["A", "B"]);
        assert_eq!(p.insets[0].regions.len(), 1);
    }

    #[test]
    fn test_filter_matching_nothing_is_an_error() {
        let mut config = RenderConfig::default();
        config.country_codes = Some(vec!["FR".into()]);
        let err = partition(merged(), &Crs::Geographic, &config, &ContextSources::default(), &mut RenderReport::default())
            .unwrap_err();
        assert!(matches!(err, MapError::Configuration(_)));
    }

    #[test]
    fn test_missing_filter_column_skips_filter() {
        let mut config = RenderConfig::default();
        config.country_codes = Some(vec!["US".into()]);
        config.data_hints.country_code_column = "ISO".into();
        let mut report = RenderReport::default();
        let p = partition(merged(), &Crs::Geographic, &config, &ContextSources::default(), &mut report).unwrap();
        assert_eq!(p.target.len(), 4);
        assert_eq!(report.warnings, vec![RenderWarning::MissingFilterColumn { column: "ISO".into() }]);
    }

    #[test]
    fn test_empty_inset_is_skipped() {
        let mut config = RenderConfig::default();
        config.inset_level1_regions = vec![inset(&["ZZ"]), inset(&[])];
        let mut report = RenderReport::default();
        let p = partition(merged(), &Crs::Geographic, &config, &ContextSources::default(), &mut report).unwrap();
        assert!(p.insets.is_empty());
        assert_eq!(report.skipped_layers().count(), 2);
    }

    #[test]
    fn test_neighbor_level1_excludes_targets() {
        let level1: GeometryCollection = merged().into_iter().map(|m| m.feature).collect();
        let mut config = RenderConfig::default();
        config.country_codes = Some(vec!["US".into()]);
        config.main_map_settings.include_neighboring_level1 = true;
        config.data_hints.neighbor_country_codes = vec!["CA".into(), "US".into()];
        let context = ContextSources {
            neighbor_level1: Some(&level1),
            ..Default::default()
        };
        let p = partition(merged(), &Crs::Geographic, &config, &context, &mut RenderReport::default()).unwrap();
        let neighbors = p.neighbor_level1.unwrap();
        assert_eq!(neighbors.codes("postal"), vec!["X"]);
        assert!(neighbors.features.iter().all(|f| f.value.is_none()));
    }

    #[test]
    fn test_water_filtered_by_name() {
        let water: GeometryCollection = [
            GeometryFeature::new("1", square(0.0)).with_attribute("name_en", "Lake Superior"),
            GeometryFeature::new("2", square(5.0)).with_attribute("name_en", "Lake Nowhere"),
        ]
        .into_iter()
        .collect();
        let mut config = RenderConfig::default();
        config.main_map_settings.include_lakes = true;
        config.main_map_settings.include_lake_names = vec!["Lake Superior".into()];
        let context = ContextSources {
            water: Some(&water),
            ..Default::default()
        };
        let p = partition(merged(), &Crs::Geographic, &config, &context, &mut RenderReport::default()).unwrap();
        assert_eq!(p.water.unwrap().len(), 1);
    }

    #[test]
    fn test_unrepairable_region_is_kept_but_not_drawable() {
        let mut features = merged();
        features[1].feature.polygon = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 2.0, y: 2.0),
        ]]);
        let mut report = RenderReport::default();
        let p = partition(features, &Crs::Geographic, &RenderConfig::default(), &ContextSources::default(), &mut report)
            .unwrap();
        assert_eq!(p.target.len(), 4);
        assert_eq!(p.main.drawable().count(), 3);
        assert!(matches!(report.warnings[0], RenderWarning::InvalidGeometry { ref id } if id == "B"));
    }

    #[test]
    fn test_failed_reprojection_keeps_native_crs() {
        let set = RegionSet::new("main", Crs::Other("EPSG:2154".into()), merged());
        let mut report = RenderReport::default();
        let set = set.project_and_bound(Some(&Crs::WebMercator), None, None, &mut report);
        assert_eq!(set.crs, Crs::Other("EPSG:2154".into()));
        assert!(set.bounds.is_some());
        assert!(matches!(report.warnings[0], RenderWarning::ReprojectionFailed { .. }));
    }

    #[test]
    fn test_bounds_are_padded_data_extent() {
        let set = RegionSet::new("main", Crs::Geographic, merged()).bounded(None, None);
        let b = set.bounds.unwrap();
        // x extent 0..7, y extent 0..1, padded 2% per axis
        assert!((b.min.x + 0.14).abs() < 1e-9);
        assert!((b.max.x - 7.14).abs() < 1e-9);
        assert!((b.min.y + 0.02).abs() < 1e-9);
    }
}
