use std::slice;

use bson::{Document, doc};

use crate::decode::Decoded;
use crate::error::OperationError;
use crate::operation::{Find, FindOptions};
use crate::type_map::TypeMap;

/// Collection a map-reduce job wrote its output to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCollection {
    pub database: String,
    pub collection: String,
}

impl OutputCollection {
    /// Query the whole output collection, ordered by `_id` like inline results.
    pub fn find(&self, type_map: Option<TypeMap>) -> Result<Find, OperationError> {
        Find::new(
            &self.database,
            &self.collection,
            Document::new(),
            FindOptions {
                type_map,
                sort: Some(doc! { "_id": 1 }),
                ..Default::default()
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapReduceOutput {
    Inline(Vec<Decoded>),
    Collection(OutputCollection),
}

/// Outcome of a map-reduce command.
#[derive(Debug, Clone, PartialEq)]
pub struct MapReduceResult {
    pub(crate) output: MapReduceOutput,
    pub(crate) execution_time_ms: u64,
    pub(crate) counts: Document,
    pub(crate) timing: Document,
}

impl MapReduceResult {
    pub fn output(&self) -> &MapReduceOutput {
        &self.output
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Per-phase counters (`input`, `emit`, `reduce`, `output`).
    pub fn counts(&self) -> &Document {
        &self.counts
    }

    /// Timing breakdown. Empty unless the command ran verbose.
    pub fn timing(&self) -> &Document {
        &self.timing
    }

    /// Target collection, for results written to one.
    pub fn output_collection(&self) -> Option<&OutputCollection> {
        match &self.output {
            MapReduceOutput::Collection(target) => Some(target),
            MapReduceOutput::Inline(_) => None,
        }
    }

    /// Inline documents. Empty for collection output.
    pub fn documents(&self) -> &[Decoded] {
        match &self.output {
            MapReduceOutput::Inline(docs) => docs,
            MapReduceOutput::Collection(_) => &[],
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, Decoded> {
        self.documents().iter()
    }

    pub fn len(&self) -> usize {
        self.documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents().is_empty()
    }
}

impl<'a> IntoIterator for &'a MapReduceResult {
    type Item = &'a Decoded;
    type IntoIter = slice::Iter<'a, Decoded>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
