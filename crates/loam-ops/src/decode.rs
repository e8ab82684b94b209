use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use crate::error::OperationError;
use crate::type_map::{Root, TypeMap};

/// A reply document materialized under a [`TypeMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Key/value pairs in wire order.
    Array(Vec<(String, Bson)>),
    /// Field-addressed record.
    Object(Document),
}

impl Decoded {
    pub fn root(&self) -> Root {
        match self {
            Decoded::Array(_) => Root::Array,
            Decoded::Object(_) => Root::Object,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        match self {
            Decoded::Array(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Decoded::Object(doc) => doc.get(key),
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Decoded::Array(pairs) => pairs.iter().map(|(k, _)| k.as_str()).collect(),
            Decoded::Object(doc) => doc.keys().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Decoded::Array(pairs) => pairs.len(),
            Decoded::Object(doc) => doc.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_document(self) -> Document {
        match self {
            Decoded::Array(pairs) => pairs.into_iter().collect(),
            Decoded::Object(doc) => doc,
        }
    }

    /// Deserialize into an application type, whatever the root container.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, OperationError> {
        Ok(bson::deserialize_from_document(self.clone().into_document())?)
    }
}

fn as_array(doc: Document) -> Decoded {
    Decoded::Array(doc.into_iter().collect())
}

fn as_object(doc: Document) -> Decoded {
    Decoded::Object(doc)
}

fn materializer(root: Root) -> fn(Document) -> Decoded {
    match root {
        Root::Array => as_array,
        Root::Object => as_object,
    }
}

/// Materialize one document under the given root policy.
pub fn decode_document(doc: Document, type_map: &TypeMap) -> Decoded {
    materializer(type_map.root())(doc)
}

/// Materialize raw reply values under `type_map`.
///
/// Every value must be an embedded document. The output keeps input
/// order; an empty input gives an empty output.
pub fn decode(raw: Vec<Bson>, type_map: &TypeMap) -> Result<Vec<Decoded>, OperationError> {
    let materialize = materializer(type_map.root());
    raw.into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Bson::Document(doc) => Ok(materialize(doc)),
            other => Err(OperationError::decode(format!(
                "result {i} is {:?}, expected a document",
                other.element_type()
            ))),
        })
        .collect()
}
