//! Loaders for region geometry and value tables
//!
//! Files are read whole and parsed with simd-json; feature conversion to
//! `geo` polygons runs on the rayon pool.

use crate::feature::{CellValue, GeometryCollection, GeometryFeature, Row, ValueTable};
use crate::map::Crs;
use anyhow::{bail, Context, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{feature::Id, Feature, GeoJson};
use rayon::prelude::*;
use std::fs;
use std::path::Path;

/// Load a GeoJSON file of polygons. Each feature's id is taken from
/// `id_column`, falling back to the GeoJSON feature id, then its index.
pub fn load_collection(path: &Path, id_column: &str) -> Result<GeometryCollection> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let collection = parse_collection(&mut bytes, id_column)
        .with_context(|| format!("parsing GeoJSON {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        features = collection.len(),
        crs = %collection.crs,
        "loaded geometry"
    );
    Ok(collection)
}

/// Load a value table: either an array of row objects or a flat
/// `{key: value}` object.
pub fn load_values(path: &Path, key_column: &str, value_column: &str) -> Result<ValueTable> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value = simd_json::serde::from_slice(&mut bytes)
        .with_context(|| format!("parsing JSON {}", path.display()))?;
    let table = values_from_json(&json, key_column, value_column)
        .with_context(|| format!("reading value table {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.len(), "loaded values");
    Ok(table)
}

/// Parse GeoJSON bytes in place. The buffer is clobbered by simd-json.
pub fn parse_collection(bytes: &mut [u8], id_column: &str) -> Result<GeometryCollection> {
    let geojson: GeoJson = simd_json::serde::from_slice(bytes)?;

    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|members| members.get("crs"))
                .and_then(crs_from_member)
                .unwrap_or(Crs::Geographic);
            (fc.features, crs)
        }
        GeoJson::Feature(f) => (vec![f], Crs::Geographic),
        GeoJson::Geometry(g) => (vec![Feature::from(g)], Crs::Geographic),
    };

    let converted: Vec<crate::Result<Option<GeometryFeature>>> = features
        .into_par_iter()
        .enumerate()
        .map(|(index, feature)| convert_feature(index, feature, id_column))
        .collect();

    let mut collection = GeometryCollection::new(crs);
    let mut skipped = 0usize;
    for (index, result) in converted.into_iter().enumerate() {
        match result {
            Ok(Some(feature)) => collection.push(feature),
            Ok(None) => skipped += 1,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable feature");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "features without polygon geometry");
    }
    Ok(collection)
}

/// Build a value table from a parsed JSON document
pub fn values_from_json(json: &serde_json::Value, key_column: &str, value_column: &str) -> Result<ValueTable> {
    match json {
        serde_json::Value::Array(items) => {
            let mut table = ValueTable::default();
            for (i, item) in items.iter().enumerate() {
                let Some(object) = item.as_object() else {
                    bail!("row {i} is not an object");
                };
                let row: Row = object
                    .iter()
                    .map(|(k, v)| (k.clone(), CellValue::from_json(v)))
                    .collect();
                table.push_row(row);
            }
            Ok(table)
        }
        serde_json::Value::Object(map) => {
            let mut table = ValueTable::new(&[key_column, value_column]);
            for (key, value) in map {
                let mut row = Row::new();
                row.insert(key_column.to_string(), CellValue::Text(key.clone()));
                row.insert(value_column.to_string(), CellValue::from_json(value));
                table.push_row(row);
            }
            Ok(table)
        }
        _ => bail!("expected an array of rows or a key/value object"),
    }
}

fn convert_feature(index: usize, feature: Feature, id_column: &str) -> crate::Result<Option<GeometryFeature>> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };
    let Some(polygon) = to_multi_polygon(Geometry::<f64>::try_from(geometry)?) else {
        return Ok(None);
    };

    let properties = feature.properties.unwrap_or_default();
    let id = properties
        .get(id_column)
        .and_then(|v| CellValue::from_json(v).as_key())
        .or_else(|| match &feature.id {
            Some(Id::String(s)) => Some(s.clone()),
            Some(Id::Number(n)) => Some(n.to_string()),
            None => None,
        })
        .unwrap_or_else(|| index.to_string());

    let mut out = GeometryFeature::new(&id, polygon);
    for (column, value) in &properties {
        out = out.with_attribute(column, CellValue::from_json(value));
    }
    Ok(Some(out))
}

fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polygons: Vec<_> = gc
                .into_iter()
                .filter_map(to_multi_polygon)
                .flat_map(|mp| mp.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

// {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}
fn crs_from_member(member: &serde_json::Value) -> Option<Crs> {
    member
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(Crs::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
        "features": [
            {"type": "Feature", "properties": {"name": "Alpha", "postal": "AL"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "id": "b-7", "properties": {"postal": "BE"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[2,0],[3,0],[3,1],[2,0]]]]}},
            {"type": "Feature", "properties": {"name": "Point"},
             "geometry": {"type": "Point", "coordinates": [5, 5]}}
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let mut bytes = SAMPLE.as_bytes().to_vec();
        let collection = parse_collection(&mut bytes, "name").unwrap();

        assert_eq!(collection.crs, Crs::WebMercator);
        assert_eq!(collection.len(), 2);

        let ids: Vec<&str> = collection.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha", "b-7"]);
        assert!(collection.has_column("postal"));
    }

    #[test]
    fn test_default_crs_is_geographic() {
        let mut bytes = br#"{"type": "FeatureCollection", "features": []}"#.to_vec();
        let collection = parse_collection(&mut bytes, "name").unwrap();
        assert_eq!(collection.crs, Crs::Geographic);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_values_from_rows() {
        let json = json!([
            {"location": "A", "value": 10},
            {"location": "B", "value": "12.5"},
            {"location": "C", "value": null}
        ]);
        let table = values_from_json(&json, "location", "value").unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.has_column("location"));
        assert_eq!(table.rows[1]["value"].as_f64(), Some(12.5));
        assert!(table.rows[2]["value"].is_null());
    }

    #[test]
    fn test_values_from_object() {
        let json = json!({"A": 10, "B": 3.5});
        let table = values_from_json(&json, "location", "value").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("value"));
    }

    #[test]
    fn test_values_rejects_scalar() {
        assert!(values_from_json(&json!(42), "location", "value").is_err());
        assert!(values_from_json(&json!([1, 2]), "location", "value").is_err());
    }
}
