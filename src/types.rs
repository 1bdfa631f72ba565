use geo::MultiPolygon;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Identifier shared by a tabular record, its geographic feature and every
/// visual element drawn for that region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(String);

impl RegionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeSetError {
    #[error("attribute set must contain at least one attribute")]
    Empty,
    #[error("attribute '{0}' is listed more than once")]
    Duplicate(String),
}

/// Ordered, non-empty list of unique numeric attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
    names: Vec<String>,
}

impl AttributeSet {
    pub fn new<I, S>(names: I) -> Result<Self, AttributeSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if out.contains(&name) {
                return Err(AttributeSetError::Duplicate(name));
            }
            out.push(name);
        }
        if out.is_empty() {
            return Err(AttributeSetError::Empty);
        }
        Ok(Self { names: out })
    }

    pub fn first(&self) -> &str {
        &self.names[0]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

/// Parses a raw attribute cell. Unparsable text becomes NaN so it can be
/// carried through to rendering as "no data".
pub fn parse_value(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// One row of the tabular source. Immutable after load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularRecord {
    fields: HashMap<String, String>,
}

impl TabularRecord {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Parsed value of `column`; `None` when the column is absent, NaN when
    /// the cell is not numeric.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.get(column).map(parse_value)
    }
}

/// A region geometry plus the properties the joiner fills in.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub key: RegionKey,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
    /// Attribute values copied from the matching tabular record.
    /// Empty until joined; stays empty when no record matches.
    pub attributes: HashMap<String, f64>,
}

impl GeoFeature {
    pub fn new(key: RegionKey, name: Option<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            key,
            name,
            geometry,
            attributes: HashMap::new(),
        }
    }

    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.attributes.get(attribute).copied()
    }

    pub fn is_joined(&self) -> bool {
        !self.attributes.is_empty()
    }
}

/// Everything the pipeline needs after startup loading.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<TabularRecord>,
    pub regions: Vec<GeoFeature>,
    pub background: Vec<MultiPolygon<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_set_rejects_empty_and_duplicates() {
        assert_eq!(
            AttributeSet::new(Vec::<String>::new()),
            Err(AttributeSetError::Empty)
        );
        assert_eq!(
            AttributeSet::new(["a", "b", "a"]),
            Err(AttributeSetError::Duplicate("a".to_string()))
        );
        let set = AttributeSet::new(["a", "b"]).unwrap();
        assert_eq!(set.first(), "a");
        assert_eq!(set.position("b"), Some(1));
        assert!(!set.contains("c"));
    }

    #[test]
    fn record_values_parse_or_nan() {
        let rec = TabularRecord::from_pairs([("a", " 12.5 "), ("b", "n/a")]);
        assert_eq!(rec.value("a"), Some(12.5));
        assert!(rec.value("b").unwrap().is_nan());
        assert_eq!(rec.value("c"), None);
    }

    #[test]
    fn trailing_text_is_not_a_number() {
        assert!(parse_value("12%").is_nan());
        assert!(parse_value("3 people").is_nan());
        assert_eq!(parse_value("-4e2"), -400.0);
    }
}
