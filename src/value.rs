//! Values held by a parameter context.
//!
//! Values mirror JSON with two additions: [`Geometry`] for spatial extents, and
//! [`Value::Bytes`] for binary payloads that may travel with catalog metadata
//! but can never be embedded in a script.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// A single context value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    String(String),
    Geometry(Geometry),
    List(Vec<Value>),
    Map(Mapping),
    Bytes(Vec<u8>),
}

impl Value {
    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Geometry(_) => "geometry",
            Value::List(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Bytes(_) => "binary",
        }
    }

    /// Truthiness as seen by `{% if %}` blocks.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::UInt(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Geometry(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Bytes(bytes) => !bytes.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Insertion-ordered mapping with unique keys.
///
/// Contexts hold a handful of entries, so lookups are linear scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Append every entry of `other`, replacing values of keys already present.
    pub fn extend(&mut self, other: Mapping) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Mapping::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Planar geometry accepted as a search extent.
///
/// Only polygons are meaningful as search parameters; other GeoJSON types are
/// rejected when converting.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon {
        /// Exterior ring as (longitude, latitude) pairs
        exterior: Vec<(f64, f64)>,
        holes: Vec<Vec<(f64, f64)>>,
    },
}

impl Geometry {
    /// Read a GeoJSON `Polygon` object. Returns `None` for any other shape.
    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.get("type")?.as_str()? != "Polygon" {
            return None;
        }
        let rings = object.get("coordinates")?.as_array()?;
        let mut rings = rings.iter().map(parse_ring);
        let exterior = rings.next()??;
        let holes = rings.collect::<Option<Vec<_>>>()?;
        Some(Geometry::Polygon { exterior, holes })
    }

    /// Well-known text representation
    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Polygon { exterior, holes } => {
                let rings: Vec<String> = std::iter::once(exterior)
                    .chain(holes.iter())
                    .map(|ring| {
                        let points: Vec<String> =
                            ring.iter().map(|(lon, lat)| format!("{} {}", lon, lat)).collect();
                        format!("({})", points.join(", "))
                    })
                    .collect();
                format!("POLYGON ({})", rings.join(", "))
            }
        }
    }
}

fn parse_ring(ring: &serde_json::Value) -> Option<Vec<(f64, f64)>> {
    ring.as_array()?
        .iter()
        .map(|position| {
            let position = position.as_array()?;
            Some((position.first()?.as_f64()?, position.get(1)?.as_f64()?))
        })
        .collect()
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wkt())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(object) => Value::Map(object.into_iter().collect()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map(Value::Int).unwrap_or(Value::UInt(n as u64))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Geometry> for Value {
    fn from(g: Geometry) -> Self {
        Value::Geometry(g)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = Mapping::new();
        map.insert("a", 1i64);
        map.insert("b", 2i64);
        let previous = map.insert("a", 3i64);

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_json_object_keeps_key_order() {
        let value = Value::from(json!({"zeta": 1, "alpha": 2, "mid": {"y": 1, "x": 2}}));
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        let nested = map.get("mid").and_then(Value::as_map).unwrap();
        assert_eq!(nested.keys().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn test_large_integers_stay_integers() {
        let value = Value::from(json!({"orbit": 18446744073709551615u64, "small": -3, "ratio": 0.5}));
        let map = value.as_map().unwrap();
        assert_eq!(map.get("orbit"), Some(&Value::UInt(u64::MAX)));
        assert_eq!(map.get("small"), Some(&Value::Int(-3)));
        assert_eq!(map.get("ratio"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_polygon_from_geojson() {
        let geometry = Geometry::from_geojson(&json!({
            "type": "Polygon",
            "coordinates": [[[1.0, 43.0], [2.0, 43.0], [2.0, 44.0], [1.0, 43.0]]]
        }))
        .unwrap();
        assert_eq!(geometry.to_wkt(), "POLYGON ((1 43, 2 43, 2 44, 1 43))");
    }

    #[test]
    fn test_polygon_with_hole() {
        let geometry = Geometry::Polygon {
            exterior: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)],
            holes: vec![vec![(1.5, 1.5), (2.0, 1.5), (2.0, 2.0), (1.5, 1.5)]],
        };
        assert_eq!(
            geometry.to_wkt(),
            "POLYGON ((0 0, 10 0, 10 10, 0 0), (1.5 1.5, 2 1.5, 2 2, 1.5 1.5))"
        );
    }

    #[test]
    fn test_point_is_not_a_search_geometry() {
        assert!(Geometry::from_geojson(&json!({"type": "Point", "coordinates": [1.0, 2.0]})).is_none());
    }
}
