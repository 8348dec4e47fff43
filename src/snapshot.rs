use serde_json::Value;

/// One validated position from an hourly snapshot, before it is stamped
/// with fetch metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

/// The upstream serves either `[[lat, lon, alt?], ...]` or an array of
/// records with varying field names. The shape is decided once per payload
/// from the first element, not per entry.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SnapshotShape {
    Rows,
    Records,
}

/// Normalizes one hour's raw payload into validated positions. Never fails;
/// anything that is not an array, or any entry that does not carry in-range
/// finite coordinates, yields nothing.
pub fn parse_points(raw: &Value) -> Vec<Position> {
    let entries = match raw.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Vec::new(),
    };

    let shape = if entries[0].is_array() {
        SnapshotShape::Rows
    } else {
        SnapshotShape::Records
    };

    entries
        .iter()
        .filter_map(|entry| match shape {
            SnapshotShape::Rows => position_from_row(entry),
            SnapshotShape::Records => position_from_record(entry),
        })
        .collect()
}

fn position_from_row(entry: &Value) -> Option<Position> {
    let row = entry.as_array()?;
    if row.len() < 2 {
        return None;
    }

    let lat = normalize_lat(to_finite_number(&row[0]))?;
    let lon = normalize_lon(to_finite_number(&row[1]))?;
    let alt = row.get(2).and_then(to_finite_number);

    Some(Position { lat, lon, alt })
}

fn position_from_record(entry: &Value) -> Option<Position> {
    let lat = normalize_lat(field_number(entry, &["lat", "latitude"], 0))?;
    let lon = normalize_lon(field_number(entry, &["lon", "lng", "longitude"], 1))?;
    let alt = field_number(entry, &["alt", "altitude"], 2);

    Some(Position { lat, lon, alt })
}

/// Reads the first present, non-null candidate field and coerces it to a
/// finite number. Named lookups only apply to objects and the positional
/// index only to arrays, so a records-mode payload may still mix in
/// positional rows.
fn field_number(entry: &Value, names: &[&str], index: usize) -> Option<f64> {
    let candidate = names
        .iter()
        .filter_map(|name| entry.get(*name))
        .chain(entry.get(index))
        .find(|value| !value.is_null())?;
    to_finite_number(candidate)
}

fn to_finite_number(value: &Value) -> Option<f64> {
    if let Some(number) = value.as_f64() {
        return number.is_finite().then_some(number);
    }

    if let Some(string) = value.as_str() {
        let trimmed = string.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(parsed) = trimmed.parse::<f64>() {
            return parsed.is_finite().then_some(parsed);
        }
    }

    None
}

fn normalize_lat(value: Option<f64>) -> Option<f64> {
    let parsed = value?;
    (-90.0..=90.0).contains(&parsed).then_some(parsed)
}

fn normalize_lon(value: Option<f64>) -> Option<f64> {
    let parsed = value?;
    (-180.0..=180.0).contains(&parsed).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_points_reads_positional_rows() {
        let raw = json!([[10.0, 20.0, 3.5], [-45.5, 170.25]]);
        let points = parse_points(&raw);
        assert_eq!(
            points,
            vec![
                Position {
                    lat: 10.0,
                    lon: 20.0,
                    alt: Some(3.5)
                },
                Position {
                    lat: -45.5,
                    lon: 170.25,
                    alt: None
                },
            ]
        );
    }

    #[test]
    fn parse_points_reads_records_with_flexible_field_names() {
        let raw = json!([
            {"lat": 1.0, "lon": 2.0, "alt": 3.0},
            {"latitude": 4.0, "longitude": 5.0, "altitude": 6.0},
            {"lat": 7.0, "lng": 8.0},
        ]);
        let points = parse_points(&raw);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].lat, 4.0);
        assert_eq!(points[1].lon, 5.0);
        assert_eq!(points[1].alt, Some(6.0));
        assert_eq!(points[2].lon, 8.0);
        assert_eq!(points[2].alt, None);
    }

    #[test]
    fn parse_points_accepts_positional_entries_in_records_mode() {
        // Shape is decided by the first element; later positional rows
        // still resolve through the index fallback.
        let raw = json!([
            {"lat": 1.0, "lon": 2.0},
            [3.0, 4.0, 5.0],
        ]);
        let points = parse_points(&raw);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].lat, 3.0);
        assert_eq!(points[1].alt, Some(5.0));
    }

    #[test]
    fn parse_points_coerces_numeric_strings() {
        let raw = json!([["10.5", "-20.25", "100"]]);
        let points = parse_points(&raw);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lat, 10.5);
        assert_eq!(points[0].lon, -20.25);
        assert_eq!(points[0].alt, Some(100.0));
    }

    #[test]
    fn parse_points_drops_out_of_range_coordinates_entirely() {
        let raw = json!([
            {"lat": 95.0, "lon": 0.0},
            {"lat": 0.0, "lon": 181.0},
            {"lat": -90.0, "lon": 180.0},
        ]);
        let points = parse_points(&raw);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lat, -90.0);
        assert_eq!(points[0].lon, 180.0);
    }

    #[test]
    fn parse_points_drops_short_and_non_numeric_rows() {
        let raw = json!([[10.0], ["abc", 20.0], [null, 20.0], [10.0, 20.0]]);
        let points = parse_points(&raw);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].lat, 10.0);
    }

    #[test]
    fn parse_points_leaves_altitude_absent_when_non_numeric() {
        let raw = json!([[10.0, 20.0, "n/a"], {"lat": 1.0, "lon": 2.0, "alt": "x"}]);
        // First element is an array, so the second entry resolves
        // positionally and has no index 0/1 -- rows mode drops it.
        let points = parse_points(&raw);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].alt, None);
    }

    #[test]
    fn parse_points_tolerates_non_array_input() {
        assert!(parse_points(&json!(null)).is_empty());
        assert!(parse_points(&json!("nope")).is_empty());
        assert!(parse_points(&json!({"lat": 1.0})).is_empty());
        assert!(parse_points(&json!([])).is_empty());
    }
}
