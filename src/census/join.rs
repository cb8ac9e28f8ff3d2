//! Zip-join aggregator - inner join of demographics and geometry by zip code

use crate::census::types::{GeoRecord, JoinedRecord, StatVector, ZipTable};
use tracing::debug;

/// Inner-join the two per-zip tables.
///
/// Output follows the order of `geo`. Zip codes present in only one input are
/// dropped silently.
pub fn join_by_zip(
    mut demographics: ZipTable<StatVector>,
    geo: ZipTable<GeoRecord>,
) -> ZipTable<JoinedRecord> {
    let mut joined = ZipTable::with_capacity(geo.len().min(demographics.len()));

    for (zip, record) in geo {
        match demographics.swap_remove(&zip) {
            Some(census_data) => {
                joined.insert(
                    zip,
                    JoinedRecord {
                        geometry: record.geometry,
                        pop_est: record.pop_est,
                        census_data,
                    },
                );
            }
            None => debug!("No demographics for zip code {}", zip),
        }
    }

    for zip in demographics.keys() {
        debug!("No geometry for zip code {}", zip);
    }

    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Geometry, Value};
    use serde_json::json;

    fn point(x: f64) -> Geometry {
        Geometry::new(Value::Point(vec![x, 40.7]))
    }

    fn stats(total: f64) -> StatVector {
        StatVector::from([("total_population".to_string(), Some(total))])
    }

    fn geo(pop_est: f64, x: f64) -> GeoRecord {
        GeoRecord {
            pop_est,
            geometry: point(x),
        }
    }

    #[test]
    fn test_drops_zip_missing_demographics() {
        let demographics = ZipTable::from([("11101".to_string(), stats(100.0))]);
        let geo_map = ZipTable::from([
            ("11101".to_string(), geo(105.0, -73.94)),
            ("11102".to_string(), geo(50.0, -73.92)),
        ]);

        let joined = join_by_zip(demographics, geo_map);

        assert_eq!(joined.len(), 1);
        assert_eq!(
            joined["11101"],
            JoinedRecord {
                geometry: point(-73.94),
                pop_est: 105.0,
                census_data: stats(100.0),
            }
        );
        assert!(!joined.contains_key("11102"));
    }

    #[test]
    fn test_serialized_shape() {
        let demographics = ZipTable::from([("11101".to_string(), stats(100.0))]);
        let geo_map = ZipTable::from([("11101".to_string(), geo(105.0, -73.94))]);

        let value = serde_json::to_value(join_by_zip(demographics, geo_map)).unwrap();

        assert_eq!(
            value,
            json!({
                "11101": {
                    "geometry": { "type": "Point", "coordinates": [-73.94, 40.7] },
                    "pop_est": 105.0,
                    "census_data": { "total_population": 100.0 }
                }
            })
        );
    }

    #[test]
    fn test_sound_and_complete() {
        let demographics: ZipTable<StatVector> = ["11101", "11103", "11368", "11691"]
            .iter()
            .map(|z| (z.to_string(), stats(1.0)))
            .collect();
        let geo_map: ZipTable<GeoRecord> = ["11691", "11004", "11368", "11101"]
            .iter()
            .map(|z| (z.to_string(), geo(1.0, -73.8)))
            .collect();

        let joined = join_by_zip(demographics.clone(), geo_map.clone());

        for zip in joined.keys() {
            assert!(demographics.contains_key(zip) && geo_map.contains_key(zip));
        }
        for zip in demographics.keys().filter(|z| geo_map.contains_key(*z)) {
            assert!(joined.contains_key(zip));
        }

        // Order follows the geo table
        let order: Vec<&str> = joined.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["11691", "11368", "11101"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(join_by_zip(ZipTable::new(), ZipTable::new()).is_empty());

        let geo_map = ZipTable::from([("11101".to_string(), geo(1.0, -73.9))]);
        assert!(join_by_zip(ZipTable::new(), geo_map).is_empty());
    }
}
