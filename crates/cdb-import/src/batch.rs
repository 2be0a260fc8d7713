//! Batch and stream types flowing through the import pipeline.
//!
//! A creator produces a stream of [`ConceptBatch`]es, one per facet. The
//! concepts inside a batch are themselves a stream, so a reader can hold
//! only one parse unit in memory while the inserter drains it.

use cdb_common::types::{Concept, Facet, ImportMapping, MappingRecord};
use futures::stream::{self, BoxStream, StreamExt};

use crate::ImportResult;

/// Lazy stream of concepts belonging to one facet.
pub type ConceptStream = BoxStream<'static, ImportResult<Concept>>;

/// Lazy stream of facet batches produced by a creator.
pub type BatchStream = BoxStream<'static, ImportResult<ConceptBatch>>;

/// One facet together with the concepts that belong to it.
///
/// Creators fill `mapping_records` with raw source records; the pipeline
/// filters them into `mappings`, so inserters only ever see validated
/// mappings.
pub struct ConceptBatch {
    pub facet: Facet,
    pub concepts: ConceptStream,
    pub mapping_records: Vec<MappingRecord>,
    pub mappings: Vec<ImportMapping>,
}

impl ConceptBatch {
    pub fn new(facet: Facet, concepts: ConceptStream) -> Self {
        Self {
            facet,
            concepts,
            mapping_records: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// Builds a batch over an already-materialized concept list.
    pub fn from_concepts(facet: Facet, concepts: Vec<Concept>) -> Self {
        Self::new(
            facet,
            stream::iter(concepts.into_iter().map(Ok)).boxed(),
        )
    }

    pub fn with_mapping_records(mut self, records: Vec<MappingRecord>) -> Self {
        self.mapping_records = records;
        self
    }
}

impl std::fmt::Debug for ConceptBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptBatch")
            .field("facet", &self.facet)
            .field("concepts", &"<stream>")
            .field("mapping_records", &self.mapping_records.len())
            .field("mappings", &self.mappings.len())
            .finish()
    }
}

/// Wraps a single batch as a one-element batch stream.
pub fn single_batch(batch: ConceptBatch) -> BatchStream {
    stream::iter([Ok(batch)]).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdb_common::types::ConceptCoordinates;

    #[tokio::test]
    async fn test_from_concepts_yields_in_order() {
        let facet = Facet::new("Diseases", "medical", "DIS", "facet.dis");
        let concepts = vec![
            Concept::new("a", ConceptCoordinates::new("1", "src")),
            Concept::new("b", ConceptCoordinates::new("2", "src")),
        ];
        let mut batch = ConceptBatch::from_concepts(facet, concepts);

        let mut names = Vec::new();
        while let Some(concept) = batch.concepts.next().await {
            names.push(concept.unwrap().pref_name);
        }
        assert_eq!(names, vec!["a", "b"]);
    }
}
