//! Tabular and geometric input records
//!
//! A [`GeometryCollection`] holds named polygons with attribute columns, a
//! [`ValueTable`] holds the rows to be joined onto them, and a
//! [`MergedFeature`] is the result of that join.

use crate::map::Crs;
use geo::MultiPolygon;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single attribute cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Join key form of this cell: coerced to string and trimmed.
    /// Integral numbers drop their fractional part so `6.0` matches `"6"`.
    pub fn as_key(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(normalize_key(s)),
            other => Some(normalize_key(&other.to_string())),
        }
    }

    /// Numeric form of this cell. Numeric strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Trim a raw key, preserving case
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_string()
}

/// Comparison form of a key: trimmed and case-folded
pub fn match_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub type Attributes = BTreeMap<String, CellValue>;

/// One named region
#[derive(Clone, Debug)]
pub struct GeometryFeature {
    /// Join key (trimmed, case preserved)
    pub id: String,
    pub polygon: MultiPolygon<f64>,
    pub attributes: Attributes,
}

impl GeometryFeature {
    pub fn new(id: &str, polygon: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id: normalize_key(id),
            polygon: polygon.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.attributes.insert(column.to_string(), value.into());
        self
    }

    pub fn attribute(&self, column: &str) -> Option<&CellValue> {
        self.attributes.get(column)
    }

    /// Attribute coerced to a trimmed string, if present and non-null
    pub fn attribute_key(&self, column: &str) -> Option<String> {
        self.attribute(column).and_then(CellValue::as_key)
    }
}

/// Named geometries sharing one CRS
#[derive(Clone, Debug)]
pub struct GeometryCollection {
    pub crs: Crs,
    /// Every attribute column seen on any feature
    pub columns: BTreeSet<String>,
    pub features: Vec<GeometryFeature>,
}

impl GeometryCollection {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            columns: BTreeSet::new(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: GeometryFeature) {
        self.columns.extend(feature.attributes.keys().cloned());
        self.features.push(feature);
    }

    pub fn with_feature(mut self, feature: GeometryFeature) -> Self {
        self.push(feature);
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeometryFeature> {
        self.features.iter()
    }

    /// First of `candidates` that exists as a column
    pub fn find_column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.has_column(c))
    }
}

impl FromIterator<GeometryFeature> for GeometryCollection {
    fn from_iter<I: IntoIterator<Item = GeometryFeature>>(iter: I) -> Self {
        let mut collection = GeometryCollection::new(Crs::Geographic);
        for feature in iter {
            collection.push(feature);
        }
        collection
    }
}

pub type Row = BTreeMap<String, CellValue>;

/// Rows of (key, value, ...) loaded from the caller's data
#[derive(Clone, Debug, Default)]
pub struct ValueTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ValueTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Two-column table from (key, value) pairs
    pub fn from_pairs<K, I>(key_column: &str, value_column: &str, pairs: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Option<f64>)>,
    {
        let mut table = ValueTable::new(&[key_column, value_column]);
        for (key, value) in pairs {
            let mut row = Row::new();
            row.insert(key_column.to_string(), CellValue::Text(key.as_ref().to_string()));
            row.insert(
                value_column.to_string(),
                value.map(CellValue::Number).unwrap_or(CellValue::Null),
            );
            table.rows.push(row);
        }
        table
    }

    pub fn push_row(&mut self, row: Row) {
        for column in row.keys() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A geometry row with its joined value
#[derive(Clone, Debug)]
pub struct MergedFeature {
    pub feature: GeometryFeature,
    /// Absent when no value row matched (rendered with missing styling)
    pub value: Option<f64>,
    /// False when the polygon is invalid and could not be repaired
    pub drawable: bool,
}

impl MergedFeature {
    pub fn new(feature: GeometryFeature, value: Option<f64>) -> Self {
        Self {
            feature,
            value,
            drawable: true,
        }
    }

    /// Context geometry that never carries a value
    pub fn context(feature: GeometryFeature) -> Self {
        Self::new(feature, None)
    }

    pub fn id(&self) -> &str {
        &self.feature.id
    }

    pub fn polygon(&self) -> &MultiPolygon<f64> {
        &self.feature.polygon
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Region code from `column`, falling back to the join id
    pub fn code(&self, column: &str) -> String {
        self.feature
            .attribute_key(column)
            .unwrap_or_else(|| self.feature.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]])
    }

    #[test]
    fn test_numeric_key_coercion() {
        assert_eq!(CellValue::Number(6.0).as_key(), Some("6".to_string()));
        assert_eq!(CellValue::Text("  06 ".into()).as_key(), Some("06".to_string()));
        assert_eq!(CellValue::Null.as_key(), None);
    }

    #[test]
    fn test_numeric_string_value() {
        assert_eq!(CellValue::Text(" 12.5 ".into()).as_f64(), Some(12.5));
        assert_eq!(CellValue::Text("n/a".into()).as_f64(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_collection_tracks_columns() {
        let collection = GeometryCollection::new(Crs::Geographic)
            .with_feature(GeometryFeature::new(" Texas ", unit_square()).with_attribute("postal", "TX"));
        assert!(collection.has_column("postal"));
        assert!(!collection.has_column("iso_a2"));
        assert_eq!(collection.features[0].id, "Texas");
        assert_eq!(collection.find_column(&["name", "postal"]), Some("postal"));
    }

    #[test]
    fn test_merged_code_falls_back_to_id() {
        let merged = MergedFeature::new(GeometryFeature::new("A", unit_square()), Some(1.0));
        assert_eq!(merged.code("postal"), "A");
        assert!(merged.has_value());
    }

    #[test]
    fn test_match_key_is_case_insensitive() {
        assert_eq!(match_key(" New York"), match_key("new york "));
    }
}
