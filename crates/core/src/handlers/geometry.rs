//! Geometric column handler: GeoJSON <-> WKT conversion and
//! precision-bounded coordinate equality.
//!
//! Canonical form is a GeoJSON object `{"type", "coordinates"}`. Supported
//! geometry types: Point, LineString, Polygon, MultiPoint, MultiLineString,
//! MultiPolygon. Coordinate equality is evaluated at a configurable number
//! of decimal places (default 6, roughly 0.1 m at the equator).

use serde_json::{json, Value};

/// Type tags claimed by the geometry handler.
const TAGS: [&str; 10] = [
    "geometry",
    "geography",
    "geojson",
    "wkt",
    "point",
    "linestring",
    "polygon",
    "multipoint",
    "multilinestring",
    "multipolygon",
];

/// WKT geometry type words, paired with the coordinate nesting depth of the
/// corresponding GeoJSON `coordinates` member (position = depth 0).
const WKT_TYPES: [(&str, &str, u8); 6] = [
    ("POINT", "Point", 0),
    ("LINESTRING", "LineString", 1),
    ("POLYGON", "Polygon", 2),
    ("MULTIPOINT", "MultiPoint", 1),
    ("MULTILINESTRING", "MultiLineString", 2),
    ("MULTIPOLYGON", "MultiPolygon", 3),
];

pub fn can_handle(tag: &str) -> bool {
    TAGS.iter().any(|t| tag == *t)
}

/// Normalize to canonical GeoJSON.
///
/// Accepts a GeoJSON object, a GeoJSON string, or a WKT string.
pub fn extract(raw: &Value) -> Option<Value> {
    match raw {
        Value::Object(map) => {
            if map.contains_key("type") && map.contains_key("coordinates") {
                Some(raw.clone())
            } else {
                None
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('{') {
                let parsed: Value = serde_json::from_str(trimmed).ok()?;
                extract(&parsed)
            } else {
                wkt_to_geojson(trimmed)
            }
        }
        _ => None,
    }
}

/// Equality at the given decimal precision.
///
/// Geometry types are compared case-insensitively; nested coordinate arrays
/// element-wise; different lengths differ.
pub fn compare(a: &Value, b: &Value, precision: u32) -> bool {
    let (Some(ga), Some(gb)) = (extract(a), extract(b)) else {
        tracing::warn!("Unparseable geometry pair; treating as differing");
        return false;
    };
    let type_a = ga.get("type").and_then(Value::as_str).unwrap_or_default();
    let type_b = gb.get("type").and_then(Value::as_str).unwrap_or_default();
    if !type_a.eq_ignore_ascii_case(type_b) {
        return false;
    }
    let (Some(ca), Some(cb)) = (ga.get("coordinates"), gb.get("coordinates")) else {
        return false;
    };
    coordinates_equal(ca, cb, precision)
}

/// Convert toward the target representation: WKT string when the target
/// type tag mentions WKT, canonical GeoJSON otherwise.
pub fn transform(value: &Value, tgt_type: &str) -> Option<Value> {
    let geojson = extract(value)?;
    if tgt_type.contains("wkt") || tgt_type.contains("text") {
        geojson_to_wkt(&geojson).map(Value::String)
    } else {
        Some(geojson)
    }
}

fn coordinates_equal(a: &Value, b: &Value, precision: u32) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| coordinates_equal(x, y, precision))
        }
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(fx), Some(fy)) => round_to(fx, precision) == round_to(fy, precision),
                _ => false,
            }
        }
        _ => false,
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// WKT conversion
// ---------------------------------------------------------------------------

/// Parse a WKT string into GeoJSON. Returns `None` for unsupported or
/// malformed geometry (including `EMPTY`).
pub fn wkt_to_geojson(wkt: &str) -> Option<Value> {
    let open = wkt.find('(')?;
    let type_word = wkt[..open].trim().to_ascii_uppercase();
    let (_, geojson_type, depth) = WKT_TYPES
        .iter()
        .find(|(w, _, _)| *w == type_word)?;

    let mut parser = WktParser {
        bytes: wkt.as_bytes(),
        pos: open,
    };
    let coordinates = if *depth == 0 {
        // POINT (x y): one position inside a single paren group.
        parser.expect(b'(')?;
        let position = parser.parse_position()?;
        parser.expect(b')')?;
        position
    } else if type_word == "MULTIPOINT" {
        // Both MULTIPOINT ((1 2), (3 4)) and MULTIPOINT (1 2, 3 4) occur.
        parser.parse_multipoint()?
    } else {
        parser.parse_nested(*depth)?
    };
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        return None;
    }
    Some(json!({ "type": geojson_type, "coordinates": coordinates }))
}

/// Render GeoJSON as WKT.
pub fn geojson_to_wkt(geojson: &Value) -> Option<String> {
    let gtype = geojson.get("type")?.as_str()?;
    let coords = geojson.get("coordinates")?;
    let (wkt_word, _, depth) = WKT_TYPES
        .iter()
        .find(|(_, g, _)| g.eq_ignore_ascii_case(gtype))?;

    let body = if *depth == 0 {
        format_position(coords)?
    } else {
        format_nested(coords, *depth)?
    };
    Some(format!("{wkt_word} ({body})"))
}

fn format_position(position: &Value) -> Option<String> {
    let nums = position.as_array()?;
    if nums.len() < 2 {
        return None;
    }
    let parts: Option<Vec<String>> = nums
        .iter()
        .map(|n| n.as_f64().map(format_coordinate))
        .collect();
    Some(parts?.join(" "))
}

fn format_nested(coords: &Value, depth: u8) -> Option<String> {
    let items = coords.as_array()?;
    let parts: Option<Vec<String>> = items
        .iter()
        .map(|item| {
            if depth == 1 {
                format_position(item)
            } else {
                format_nested(item, depth - 1).map(|s| format!("({s})"))
            }
        })
        .collect();
    Some(parts?.join(", "))
}

/// Trim trailing zeros so `-71.100000` renders as `-71.1`.
fn format_coordinate(value: f64) -> String {
    if value == value.trunc() {
        format!("{}", value.trunc() as i64)
    } else {
        let mut s = format!("{value}");
        if s.contains('.') {
            while s.ends_with('0') {
                s.pop();
            }
        }
        s
    }
}

struct WktParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl WktParser<'_> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek()? == byte {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    /// `x y` or `x y z` -> `[x, y]` / `[x, y, z]`.
    fn parse_position(&mut self) -> Option<Value> {
        let mut nums = Vec::new();
        while matches!(self.peek(), Some(c) if c == b'-' || c == b'+' || c.is_ascii_digit() || c == b'.')
        {
            nums.push(self.parse_number()?);
        }
        if nums.len() < 2 || nums.len() > 3 {
            return None;
        }
        Some(Value::Array(
            nums.into_iter()
                .filter_map(serde_json::Number::from_f64)
                .map(Value::Number)
                .collect(),
        ))
    }

    fn parse_number(&mut self) -> Option<f64> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            if c.is_ascii_digit() || c == b'-' || c == b'+' || c == b'.' || c == b'e' || c == b'E'
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// `( item, item, ... )` where items are positions (depth 1) or nested
    /// groups (depth > 1).
    fn parse_nested(&mut self, depth: u8) -> Option<Value> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            let item = if depth == 1 {
                self.parse_position()?
            } else {
                self.parse_nested(depth - 1)?
            };
            items.push(item);
            match self.peek()? {
                b',' => {
                    self.pos += 1;
                }
                b')' => {
                    self.pos += 1;
                    break;
                }
                _ => return None,
            }
        }
        Some(Value::Array(items))
    }

    /// MULTIPOINT accepts positions with or without per-point parens.
    fn parse_multipoint(&mut self) -> Option<Value> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            let item = if self.peek()? == b'(' {
                self.expect(b'(')?;
                let position = self.parse_position()?;
                self.expect(b')')?;
                position
            } else {
                self.parse_position()?
            };
            items.push(item);
            match self.peek()? {
                b',' => {
                    self.pos += 1;
                }
                b')' => {
                    self.pos += 1;
                    break;
                }
                _ => return None,
            }
        }
        Some(Value::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_geometry_tags() {
        assert!(can_handle("geometry"));
        assert!(can_handle("multipolygon"));
        assert!(!can_handle("jsonb"));
    }

    // -----------------------------------------------------------------------
    // WKT parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_point() {
        let g = wkt_to_geojson("POINT (-71.06 42.35)").unwrap();
        assert_eq!(g, json!({"type": "Point", "coordinates": [-71.06, 42.35]}));
    }

    #[test]
    fn parses_linestring() {
        let g = wkt_to_geojson("LINESTRING (0 0, 1 1, 2 0)").unwrap();
        assert_eq!(
            g,
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]})
        );
    }

    #[test]
    fn parses_polygon_with_hole() {
        let g = wkt_to_geojson(
            "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0), (1 1, 2 1, 2 2, 1 2, 1 1))",
        )
        .unwrap();
        let rings = g["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn parses_multipolygon() {
        let g = wkt_to_geojson("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))")
            .unwrap();
        assert_eq!(g["type"], "MultiPolygon");
        assert_eq!(g["coordinates"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_multipoint_both_syntaxes() {
        let a = wkt_to_geojson("MULTIPOINT ((1 2), (3 4))").unwrap();
        let b = wkt_to_geojson("MULTIPOINT (1 2, 3 4)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_wkt() {
        assert!(wkt_to_geojson("POINT (1)").is_none());
        assert!(wkt_to_geojson("POINT 1 2").is_none());
        assert!(wkt_to_geojson("TRIANGLE (0 0, 1 1, 2 0)").is_none());
        assert!(wkt_to_geojson("POINT (1 2) extra").is_none());
    }

    // -----------------------------------------------------------------------
    // WKT rendering and round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn renders_point() {
        let wkt = geojson_to_wkt(&json!({"type": "Point", "coordinates": [-71.06, 42.35]}))
            .unwrap();
        assert_eq!(wkt, "POINT (-71.06 42.35)");
    }

    #[test]
    fn renders_polygon() {
        let g = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 0.0]]]
        });
        assert_eq!(geojson_to_wkt(&g).unwrap(), "POLYGON ((0 0, 4 0, 4 4, 0 0))");
    }

    #[test]
    fn geojson_wkt_geojson_preserves_coordinates() {
        let original = json!({
            "type": "LineString",
            "coordinates": [[-71.123456, 42.654321], [-71.0, 42.5]]
        });
        let wkt = geojson_to_wkt(&original).unwrap();
        let back = wkt_to_geojson(&wkt).unwrap();
        assert!(compare(&original, &back, 6));
    }

    // -----------------------------------------------------------------------
    // Comparison
    // -----------------------------------------------------------------------

    #[test]
    fn wkt_string_equals_equivalent_geojson() {
        let a = json!("POINT (-71.06 42.35)");
        let b = json!({"type": "Point", "coordinates": [-71.06, 42.35]});
        assert!(compare(&a, &b, 6));
    }

    #[test]
    fn precision_bounds_equality() {
        let a = json!({"type": "Point", "coordinates": [-71.0600004, 42.35]});
        let b = json!({"type": "Point", "coordinates": [-71.0600001, 42.35]});
        assert!(compare(&a, &b, 6));
        assert!(!compare(&a, &b, 7));
    }

    #[test]
    fn different_lengths_differ() {
        let a = json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]});
        let b = json!({"type": "LineString", "coordinates": [[0.0, 0.0]]});
        assert!(!compare(&a, &b, 6));
    }

    #[test]
    fn type_mismatch_differs() {
        let a = json!({"type": "Point", "coordinates": [0.0, 0.0]});
        let b = json!({"type": "MultiPoint", "coordinates": [[0.0, 0.0]]});
        assert!(!compare(&a, &b, 6));
    }

    #[test]
    fn geometry_type_case_insensitive() {
        let a = json!({"type": "point", "coordinates": [0.0, 0.0]});
        let b = json!({"type": "Point", "coordinates": [0.0, 0.0]});
        assert!(compare(&a, &b, 6));
    }

    #[test]
    fn geojson_string_form_accepted() {
        let a = json!(r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#);
        let b = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(compare(&a, &b, 6));
    }

    #[test]
    fn garbage_differs() {
        assert!(!compare(&json!("not geometry"), &json!("POINT (0 0)"), 6));
    }

    // -----------------------------------------------------------------------
    // Transform
    // -----------------------------------------------------------------------

    #[test]
    fn transform_to_wkt_tag() {
        let v = transform(&json!({"type": "Point", "coordinates": [1.5, 2.0]}), "wkt")
            .unwrap();
        assert_eq!(v, json!("POINT (1.5 2)"));
    }

    #[test]
    fn transform_wkt_to_geometry_tag() {
        let v = transform(&json!("POINT (1.5 2)"), "geometry").unwrap();
        assert_eq!(v, json!({"type": "Point", "coordinates": [1.5, 2.0]}));
    }
}
