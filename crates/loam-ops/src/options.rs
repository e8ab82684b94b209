//! Checked conversions for option values supplied as documents.

use bson::{Bson, Document};

use crate::error::OperationError;
use crate::reply::as_i64;
use crate::type_map::TypeMap;

fn mismatch(key: &str, expected: &str, value: &Bson) -> OperationError {
    OperationError::invalid(format!(
        "option `{key}` must be {expected}, got {:?}",
        value.element_type()
    ))
}

pub(crate) fn expect_bool(key: &str, value: Bson) -> Result<bool, OperationError> {
    match value {
        Bson::Boolean(b) => Ok(b),
        other => Err(mismatch(key, "a boolean", &other)),
    }
}

pub(crate) fn expect_document(key: &str, value: Bson) -> Result<Document, OperationError> {
    match value {
        Bson::Document(doc) => Ok(doc),
        other => Err(mismatch(key, "a document", &other)),
    }
}

pub(crate) fn expect_non_negative(key: &str, value: Bson) -> Result<u64, OperationError> {
    match as_i64(&value) {
        Some(n) if n >= 0 => Ok(n as u64),
        _ => Err(mismatch(key, "a non-negative integer", &value)),
    }
}

/// `null` clears the type map; a document is parsed as one.
pub(crate) fn expect_type_map(key: &str, value: Bson) -> Result<Option<TypeMap>, OperationError> {
    match value {
        Bson::Null => Ok(None),
        Bson::Document(doc) => Ok(Some(TypeMap::try_from(&doc)?)),
        other => Err(mismatch(key, "a document or null", &other)),
    }
}

pub(crate) fn unknown(key: &str) -> OperationError {
    OperationError::invalid(format!("unknown option `{key}`"))
}

/// Encode a count as the narrowest BSON integer that holds it.
pub(crate) fn count_bson(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}
