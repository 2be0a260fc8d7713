//! Common types used across CDB
//!
//! These are the value objects exchanged between concept creators, the
//! import pipeline and the graph layer. All of them are created once per
//! import run and never mutated after emission.

use serde::{Deserialize, Serialize};

/// Identity key of a concept within its source.
///
/// `original_id` + `source` uniquely identify a concept; `ambiguous`
/// marks identifiers that map to more than one entity in the source and
/// therefore cannot be matched by id alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptCoordinates {
    pub original_id: String,
    pub source: String,
    #[serde(default)]
    pub ambiguous: bool,
}

impl ConceptCoordinates {
    pub fn new(original_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            original_id: original_id.into(),
            source: source.into(),
            ambiguous: false,
        }
    }

    pub fn ambiguous(mut self) -> Self {
        self.ambiguous = true;
        self
    }
}

impl std::fmt::Display for ConceptCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.original_id)
    }
}

/// An atomic knowledge-graph entity.
///
/// Parents are coordinates rather than direct references because a concept
/// may have multiple parents (the taxonomy is a DAG, not a tree) and the
/// parent may live in a batch that has not been produced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub pref_name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
    pub coordinates: ConceptCoordinates,
    #[serde(default)]
    pub parents: Vec<ConceptCoordinates>,
}

impl Concept {
    pub fn new(pref_name: impl Into<String>, coordinates: ConceptCoordinates) -> Self {
        Self {
            pref_name: pref_name.into(),
            synonyms: Vec::new(),
            descriptions: Vec::new(),
            coordinates,
            parents: Vec::new(),
        }
    }

    pub fn with_synonyms(mut self, synonyms: Vec<String>) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_descriptions(mut self, descriptions: Vec<String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn with_parents(mut self, parents: Vec<ConceptCoordinates>) -> Self {
        self.parents = parents;
        self
    }
}

/// Structural type of a facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    /// Concepts form a parent/child hierarchy
    #[default]
    Hierarchical,
    /// Flat list of concepts with no parent edges
    Flat,
}

impl std::fmt::Display for FacetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacetKind::Hierarchical => write!(f, "hierarchical"),
            FacetKind::Flat => write!(f, "flat"),
        }
    }
}

/// A named grouping under which a batch of concepts is imported.
///
/// `custom_id` is the stable external identifier and the unit of
/// idempotency: a facet with an already-imported `custom_id` is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    pub group: String,
    pub short_name: String,
    pub custom_id: String,
    #[serde(default)]
    pub kind: FacetKind,
}

impl Facet {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        short_name: impl Into<String>,
        custom_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            short_name: short_name.into(),
            custom_id: custom_id.into(),
            kind: FacetKind::Hierarchical,
        }
    }

    pub fn with_kind(mut self, kind: FacetKind) -> Self {
        self.kind = kind;
        self
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.custom_id)
    }
}

/// Raw mapping record as read from a mapping source.
///
/// `classes` holds the identifiers being mapped (exactly two for a valid
/// record); `process` is a marker set by upstream tooling for records
/// that need special handling and are not importable as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub classes: Vec<String>,
    pub mapping_type: String,
    #[serde(default)]
    pub process: Option<String>,
}

/// A validated, importable mapping between two concepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMapping {
    pub from: String,
    pub to: String,
    pub mapping_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_display() {
        let coords = ConceptCoordinates::new("D012345", "MESH");
        assert_eq!(coords.to_string(), "MESH:D012345");
        assert!(!coords.ambiguous);
        assert!(ConceptCoordinates::new("1", "NCBI").ambiguous().ambiguous);
    }

    #[test]
    fn test_concept_builder() {
        let concept = Concept::new("Insulin", ConceptCoordinates::new("P01308", "UNIPROT"))
            .with_synonyms(vec!["INS".to_string()])
            .with_parents(vec![ConceptCoordinates::new("P0", "UNIPROT")]);

        assert_eq!(concept.pref_name, "Insulin");
        assert_eq!(concept.synonyms.len(), 1);
        assert_eq!(concept.parents.len(), 1);
        assert!(concept.descriptions.is_empty());
    }

    #[test]
    fn test_facet_defaults_to_hierarchical() {
        let facet = Facet::new("Diseases", "MeSH", "dis", "fid42");
        assert_eq!(facet.kind, FacetKind::Hierarchical);
        assert_eq!(facet.to_string(), "Diseases (fid42)");
    }

    #[test]
    fn test_mapping_record_deserializes_without_process() {
        let record: MappingRecord =
            serde_json::from_str(r#"{"classes":["a","b"],"mapping_type":"EXACT"}"#).unwrap();
        assert_eq!(record.process, None);
        assert_eq!(record.classes.len(), 2);
    }
}
