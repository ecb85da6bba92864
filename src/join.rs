//! Join engine: attaches table values to geometry rows by key

use crate::config::DuplicateKeyPolicy;
use crate::error::{MapError, RenderReport, RenderWarning, Result};
use crate::feature::{match_key, CellValue, GeometryCollection, MergedFeature, ValueTable};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Columns taking part in a join
#[derive(Clone, Debug)]
pub struct JoinColumns {
    /// Attribute of the geometry holding the join key
    pub geometry_key: String,
    /// Value-table column holding the join key
    pub table_key: String,
    /// Value-table column holding the numeric value
    pub value: String,
}

impl JoinColumns {
    pub fn new(geometry_key: &str, table_key: &str, value: &str) -> Self {
        Self {
            geometry_key: geometry_key.to_string(),
            table_key: table_key.to_string(),
            value: value.to_string(),
        }
    }
}

struct Lookup {
    values: HashMap<String, Option<f64>>,
    duplicates: usize,
}

fn build_lookup(
    table: &ValueTable,
    columns: &JoinColumns,
    policy: DuplicateKeyPolicy,
    report: &mut RenderReport,
) -> Result<Lookup> {
    let mut values: HashMap<String, Option<f64>> = HashMap::with_capacity(table.len());
    let mut duplicates = 0;

    for row in &table.rows {
        let Some(key) = row.get(&columns.table_key).and_then(CellValue::as_key) else {
            continue;
        };
        let value = match row.get(&columns.value) {
            None | Some(CellValue::Null) => None,
            Some(cell) => {
                let parsed = cell.as_f64();
                if parsed.is_none() {
                    report.warn(RenderWarning::NonNumericValue { key: key.clone() });
                }
                parsed
            }
        };

        match values.entry(match_key(&key)) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                duplicates += 1;
                match policy {
                    DuplicateKeyPolicy::Last => {
                        slot.insert(value);
                    }
                    DuplicateKeyPolicy::First => {}
                    DuplicateKeyPolicy::Error => return Err(MapError::DuplicateKey { key }),
                }
            }
        }
    }

    Ok(Lookup { values, duplicates })
}

/// Left-join `table` onto `collection`.
///
/// Every geometry row yields exactly one [`MergedFeature`], in input order;
/// rows without a matching key get no value. Keys are compared trimmed and
/// case-folded, after coercing numbers to strings.
pub fn merge(
    collection: &GeometryCollection,
    table: &ValueTable,
    columns: &JoinColumns,
    policy: DuplicateKeyPolicy,
    report: &mut RenderReport,
) -> Result<Vec<MergedFeature>> {
    if !collection.has_column(&columns.geometry_key) {
        return Err(MapError::Schema {
            table: "geometry",
            column: columns.geometry_key.clone(),
            available: collection.columns.iter().cloned().collect(),
        });
    }
    for column in [&columns.table_key, &columns.value] {
        if !table.has_column(column) {
            return Err(MapError::Schema {
                table: "value",
                column: column.clone(),
                available: table.columns.clone(),
            });
        }
    }

    let lookup = build_lookup(table, columns, policy, report)?;
    let mut used: HashSet<&str> = HashSet::new();
    let mut unmatched = 0;

    let merged: Vec<MergedFeature> = collection
        .iter()
        .map(|feature| {
            let key = feature
                .attribute_key(&columns.geometry_key)
                .unwrap_or_else(|| feature.id.clone());
            let value = match lookup.values.get_key_value(&match_key(&key)) {
                Some((k, value)) => {
                    used.insert(k.as_str());
                    *value
                }
                None => {
                    unmatched += 1;
                    None
                }
            };
            MergedFeature::new(feature.clone(), value)
        })
        .collect();

    report.unmatched_features += unmatched;
    report.unused_values += lookup.values.len() - used.len();
    report.duplicate_keys += lookup.duplicates;

    if unmatched > 0 {
        tracing::info!(unmatched, total = merged.len(), "geometry rows without a value");
    }
    if lookup.duplicates > 0 {
        tracing::warn!(duplicates = lookup.duplicates, ?policy, "duplicate join keys in value table");
    }
    tracing::debug!(
        rows = table.len(),
        unused = lookup.values.len() - used.len(),
        "join complete"
    );

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{GeometryFeature, Row};
    use crate::map::Crs;
    use geo::{polygon, MultiPolygon};

    fn square(x: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ]])
    }

    fn regions(names: &[&str]) -> GeometryCollection {
        let mut collection = GeometryCollection::new(Crs::Geographic);
        for (i, name) in names.iter().enumerate() {
            collection.push(GeometryFeature::new(name, square(i as f64 * 2.0)).with_attribute("name", *name));
        }
        collection
    }

    fn columns() -> JoinColumns {
        JoinColumns::new("name", "location", "value")
    }

    #[test]
    fn test_left_join_keeps_every_row() {
        let geo = regions(&["A", "B", "C"]);
        let table = ValueTable::from_pairs("location", "value", [("A", Some(10.0)), ("Z", Some(3.0))]);
        let mut report = RenderReport::default();
        let merged = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Last, &mut report).unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].value, Some(10.0));
        assert_eq!(merged[1].value, None);
        assert_eq!(report.unmatched_features, 2);
        assert_eq!(report.unused_values, 1);
    }

    #[test]
    fn test_keys_are_trimmed_and_case_folded() {
        let geo = regions(&["New York"]);
        let table = ValueTable::from_pairs("location", "value", [("  new york ", Some(7.0))]);
        let merged = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Last, &mut RenderReport::default()).unwrap();
        assert_eq!(merged[0].value, Some(7.0));
        // Display form is untouched
        assert_eq!(merged[0].id(), "New York");
    }

    #[test]
    fn test_numeric_keys_match_string_keys() {
        let mut geo = GeometryCollection::new(Crs::Geographic);
        geo.push(GeometryFeature::new("6", square(0.0)).with_attribute("name", CellValue::Number(6.0)));
        let table = ValueTable::from_pairs("location", "value", [("6", Some(1.0))]);
        let merged = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Last, &mut RenderReport::default()).unwrap();
        assert_eq!(merged[0].value, Some(1.0));
    }

    #[test]
    fn test_duplicate_policies() {
        let geo = regions(&["A"]);
        let table = ValueTable::from_pairs("location", "value", [("A", Some(1.0)), ("a", Some(2.0))]);

        let mut report = RenderReport::default();
        let last = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Last, &mut report).unwrap();
        assert_eq!(last[0].value, Some(2.0));
        assert_eq!(report.duplicate_keys, 1);

        let first = merge(&geo, &table, &columns(), DuplicateKeyPolicy::First, &mut RenderReport::default()).unwrap();
        assert_eq!(first[0].value, Some(1.0));

        let err = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Error, &mut RenderReport::default()).unwrap_err();
        assert!(matches!(err, MapError::DuplicateKey { key } if key == "a"));
    }

    #[test]
    fn test_missing_columns_are_schema_errors() {
        let geo = regions(&["A"]);
        let table = ValueTable::from_pairs("location", "value", [("A", Some(1.0))]);

        let bad_value = JoinColumns::new("name", "location", "score");
        let err = merge(&geo, &table, &bad_value, DuplicateKeyPolicy::Last, &mut RenderReport::default()).unwrap_err();
        assert!(matches!(err, MapError::Schema { table: "value", .. }));

        let bad_geo = JoinColumns::new("NAME_1", "location", "value");
        let err = merge(&geo, &table, &bad_geo, DuplicateKeyPolicy::Last, &mut RenderReport::default()).unwrap_err();
        assert!(matches!(err, MapError::Schema { table: "geometry", .. }));
    }

    #[test]
    fn test_numeric_strings_and_garbage_values() {
        let geo = regions(&["A", "B"]);
        let mut table = ValueTable::new(&["location", "value"]);
        for (key, value) in [("A", " 12.5"), ("B", "lots")] {
            let mut row = Row::new();
            row.insert("location".into(), CellValue::from(key));
            row.insert("value".into(), CellValue::from(value));
            table.push_row(row);
        }
        let mut report = RenderReport::default();
        let merged = merge(&geo, &table, &columns(), DuplicateKeyPolicy::Last, &mut report).unwrap();
        assert_eq!(merged[0].value, Some(12.5));
        assert_eq!(merged[1].value, None);
        assert_eq!(
            report.warnings,
            vec![RenderWarning::NonNumericValue { key: "B".to_string() }]
        );
    }
}
