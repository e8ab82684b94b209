use std::collections::HashMap;
use std::sync::RwLock;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use imbl::Vector;

use crate::compare::{self, OrderedBson};
use crate::error::CommandError;

type Collection = Vector<Document>;

/// Failed document of an insert batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteError {
    pub index: usize,
    pub code: i32,
    pub message: String,
}

impl WriteError {
    pub fn to_document(&self) -> Document {
        doc! {
            "index": self.index as i64,
            "code": self.code,
            "errmsg": self.message.as_str(),
        }
    }
}

/// In-memory collections keyed by `"<database>.<collection>"`.
///
/// Reads clone the collection out of the lock; the clone shares
/// structure with the stored copy, so long-running commands work on a
/// stable snapshot without holding the lock.
#[derive(Default)]
pub struct Catalog {
    collections: RwLock<HashMap<String, Collection>>,
}

pub fn namespace(database: &str, collection: &str) -> String {
    format!("{database}.{collection}")
}

fn id_of(doc: &Document) -> Option<&Bson> {
    doc.get("_id")
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, ns: &str) -> Option<Collection> {
        self.collections.read().unwrap().get(ns).cloned()
    }

    pub fn exists(&self, ns: &str) -> bool {
        self.collections.read().unwrap().contains_key(ns)
    }

    /// Insert documents, assigning an ObjectId `_id` where missing.
    ///
    /// Returns the number inserted and the per-document failures. An
    /// ordered insert stops at the first failure.
    pub fn insert(
        &self,
        ns: &str,
        docs: Vec<Document>,
        ordered: bool,
    ) -> (u64, Vec<WriteError>) {
        let mut collections = self.collections.write().unwrap();
        let coll = collections.entry(ns.to_string()).or_default();
        let mut inserted = 0;
        let mut errors = Vec::new();

        for (index, mut doc) in docs.into_iter().enumerate() {
            if !doc.contains_key("_id") {
                let mut with_id = doc! { "_id": ObjectId::new() };
                with_id.extend(doc);
                doc = with_id;
            }
            let key = OrderedBson(id_of(&doc).cloned().unwrap_or(Bson::Null));
            let duplicate = coll
                .iter()
                .any(|existing| id_of(existing).is_some_and(|id| OrderedBson(id.clone()) == key));
            if duplicate {
                errors.push(WriteError {
                    index,
                    code: CommandError::DUPLICATE_KEY,
                    message: format!("duplicate key: {{ _id: {} }}", key.0),
                });
                if ordered {
                    break;
                }
                continue;
            }
            coll.push_back(doc);
            inserted += 1;
        }
        (inserted, errors)
    }

    /// Matching documents after sort, skip and limit.
    ///
    /// A missing collection reads as empty.
    pub fn find(
        &self,
        ns: &str,
        filter: &Document,
        sort: Option<&Document>,
        skip: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Document>, CommandError> {
        let Some(coll) = self.snapshot(ns) else {
            return Ok(Vec::new());
        };
        let mut docs = Vec::new();
        for doc in coll.iter() {
            if compare::matches(doc, filter)? {
                docs.push(doc.clone());
            }
        }
        if let Some(sort) = sort {
            let spec = compare::sort_spec(sort)?;
            compare::apply_sort(&mut docs, &spec);
        }
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = match limit {
            Some(0) | None => usize::MAX,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    pub fn find_by_id(&self, ns: &str, id: &Bson) -> Option<Document> {
        let key = OrderedBson(id.clone());
        self.snapshot(ns)?
            .iter()
            .find(|doc| id_of(doc).is_some_and(|v| OrderedBson(v.clone()) == key))
            .cloned()
    }

    /// Replace the whole collection, creating it if needed.
    pub fn replace_all(&self, ns: &str, docs: Vec<Document>) {
        let mut collections = self.collections.write().unwrap();
        collections.insert(ns.to_string(), docs.into_iter().collect());
    }

    /// Insert or overwrite documents by `_id`.
    pub fn upsert_all(&self, ns: &str, docs: Vec<Document>) {
        let mut collections = self.collections.write().unwrap();
        let coll = collections.entry(ns.to_string()).or_default();
        for doc in docs {
            let key = OrderedBson(id_of(&doc).cloned().unwrap_or(Bson::Null));
            let existing = coll
                .iter()
                .position(|d| id_of(d).is_some_and(|id| OrderedBson(id.clone()) == key));
            match existing {
                Some(pos) => {
                    coll.set(pos, doc);
                }
                None => coll.push_back(doc),
            }
        }
    }

    /// Remove a collection. Returns whether it existed.
    pub fn drop(&self, ns: &str) -> bool {
        self.collections.write().unwrap().remove(ns).is_some()
    }
}
