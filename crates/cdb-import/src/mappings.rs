//! Filtering of raw mapping records into importable mappings.

use cdb_common::types::{ImportMapping, MappingRecord};
use tracing::debug;

use crate::{ImportError, ImportResult};

/// Mapping type expressing identity of URIs. Identity is already handled
/// by concept coordinates, so these records carry no information.
const SAME_URI: &str = "SAME_URI";

/// Filters raw mapping records down to importable mappings.
///
/// `SAME_URI` records and records carrying a process marker are dropped.
/// A surviving record must connect exactly two classes; anything else is
/// a validation error naming the offending record.
pub fn filter_mappings(
    records: impl IntoIterator<Item = MappingRecord>,
) -> ImportResult<Vec<ImportMapping>> {
    let mut mappings = Vec::new();

    for record in records {
        if record.mapping_type == SAME_URI {
            continue;
        }
        if let Some(marker) = &record.process {
            debug!(marker = %marker, classes = ?record.classes, "Skipping mapping record with process marker");
            continue;
        }
        if record.classes.len() != 2 {
            return Err(ImportError::Validation(format!(
                "mapping record of type '{}' must connect exactly two classes, got {}: {:?}",
                record.mapping_type,
                record.classes.len(),
                record.classes
            )));
        }

        let mut classes = record.classes.into_iter();
        // len == 2 checked above
        let from = classes.next().unwrap_or_default();
        let to = classes.next().unwrap_or_default();
        mappings.push(ImportMapping {
            from,
            to,
            mapping_type: record.mapping_type,
        });
    }

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(classes: &[&str], mapping_type: &str, process: Option<&str>) -> MappingRecord {
        MappingRecord {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            mapping_type: mapping_type.to_string(),
            process: process.map(|p| p.to_string()),
        }
    }

    #[test]
    fn test_same_uri_records_are_never_emitted() {
        let mappings = filter_mappings(vec![
            record(&["a", "b"], "SAME_URI", None),
            record(&["a", "c"], "EXACT", None),
        ])
        .unwrap();

        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].mapping_type, "EXACT");
    }

    #[test]
    fn test_process_marker_excludes_record() {
        let mappings = filter_mappings(vec![
            record(&["a", "b"], "EXACT", Some("needs-review")),
            record(&["c", "d"], "EXACT", None),
        ])
        .unwrap();

        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].from, "c");
        assert_eq!(mappings[0].to, "d");
    }

    #[test]
    fn test_wrong_class_count_is_a_validation_error() {
        let result = filter_mappings(vec![record(&["a", "b", "c"], "EXACT", None)]);

        match result {
            Err(ImportError::Validation(message)) => {
                assert!(message.contains("exactly two classes"));
                assert!(message.contains("3"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|m| m.len())),
        }
    }

    #[test]
    fn test_dropped_records_are_not_validated() {
        // A malformed record that would fail validation is dropped first
        // because of its mapping type.
        let mappings = filter_mappings(vec![record(&["only-one"], "SAME_URI", None)]).unwrap();
        assert!(mappings.is_empty());
    }
}
