use bson::{Bson, Document};

use crate::error::OperationError;

/// Server code reported when a failed reply carries none.
const UNKNOWN_ERROR: i32 = 8;

pub(crate) fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        // i64::MAX as f64 rounds up to 2^63, which is out of range
        Bson::Double(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Some(*f as i64)
        }
        _ => None,
    }
}

/// Turn an `{ ok: 0, code, errmsg }` reply into a command error.
pub(crate) fn check_ok(reply: &Document) -> Result<(), OperationError> {
    let failed = match reply.get("ok") {
        Some(Bson::Double(f)) => *f == 0.0,
        Some(Bson::Boolean(b)) => !b,
        Some(other) => as_i64(other) == Some(0),
        None => false,
    };
    if !failed {
        return Ok(());
    }
    let code = reply
        .get("code")
        .and_then(as_i64)
        .and_then(|c| i32::try_from(c).ok())
        .unwrap_or(UNKNOWN_ERROR);
    let message = match reply.get("errmsg") {
        Some(Bson::String(s)) => s.clone(),
        _ => "command failed".to_string(),
    };
    Err(OperationError::Command { code, message })
}

pub(crate) fn take_array(reply: &mut Document, key: &str) -> Result<Vec<Bson>, OperationError> {
    match reply.remove(key) {
        Some(Bson::Array(values)) => Ok(values),
        Some(other) => Err(OperationError::decode(format!(
            "`{key}` is {:?}, expected an array",
            other.element_type()
        ))),
        None => Err(OperationError::decode(format!("missing `{key}`"))),
    }
}

pub(crate) fn take_document(reply: &mut Document, key: &str) -> Result<Document, OperationError> {
    match reply.remove(key) {
        Some(Bson::Document(doc)) => Ok(doc),
        Some(other) => Err(OperationError::decode(format!(
            "`{key}` is {:?}, expected a document",
            other.element_type()
        ))),
        None => Err(OperationError::decode(format!("missing `{key}`"))),
    }
}

pub(crate) fn read_i64(reply: &Document, key: &str) -> Result<i64, OperationError> {
    match reply.get(key) {
        Some(value) => as_i64(value)
            .ok_or_else(|| OperationError::decode(format!("`{key}` is not an integer"))),
        None => Err(OperationError::decode(format!("missing `{key}`"))),
    }
}

pub(crate) fn read_string(reply: &Document, key: &str) -> Result<String, OperationError> {
    match reply.get(key) {
        Some(Bson::String(s)) => Ok(s.clone()),
        Some(other) => Err(OperationError::decode(format!(
            "`{key}` is {:?}, expected a string",
            other.element_type()
        ))),
        None => Err(OperationError::decode(format!("missing `{key}`"))),
    }
}
