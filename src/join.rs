use crate::types::{parse_value, AttributeSet, GeoFeature, RegionKey, TabularRecord};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Outcome of a join, for logging. Misses are not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub matched: usize,
    /// Features left without attribute values.
    pub unmatched_features: Vec<RegionKey>,
    /// Record keys no feature asked for.
    pub unused_records: Vec<String>,
}

/// Copies every attribute of the first record whose `join_key` cell equals a
/// feature's key onto that feature, parsed as a number.
///
/// Unparsable cells are stored as NaN. Features without a match keep an empty
/// attribute map.
pub fn join_features(
    features: &mut [GeoFeature],
    records: &[TabularRecord],
    attributes: &AttributeSet,
    join_key: &str,
) -> JoinSummary {
    let mut summary = JoinSummary::default();
    let mut used: HashSet<usize> = HashSet::new();

    for feature in features.iter_mut() {
        let found = records
            .iter()
            .position(|r| r.get(join_key) == Some(feature.key.as_str()));

        let Some(idx) = found else {
            debug!(key = %feature.key, "no tabular record for region");
            summary.unmatched_features.push(feature.key.clone());
            continue;
        };

        used.insert(idx);
        let record = &records[idx];
        for attr in attributes.iter() {
            let value = record.get(attr).map(parse_value).unwrap_or(f64::NAN);
            feature.attributes.insert(attr.to_string(), value);
        }
        summary.matched += 1;
    }

    summary.unused_records = records
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .filter_map(|(_, r)| r.get(join_key).map(str::to_string))
        .collect();

    if !summary.unused_records.is_empty() {
        warn!(
            count = summary.unused_records.len(),
            "tabular records did not match any region"
        );
    }

    summary
}
