//! Command handlers. Each takes the database name and the command
//! document and returns the reply document, `ok` included.

mod drop;
mod find;
mod insert;
mod map_reduce;

use bson::{Bson, Document};

use crate::catalog::Catalog;
use crate::error::CommandError;

/// Route a command by its first key.
pub fn dispatch(catalog: &Catalog, db: &str, command: &Document) -> Result<Document, CommandError> {
    let Some(name) = command.keys().next() else {
        return Err(CommandError::failed_to_parse("empty command document"));
    };
    match name.as_str() {
        "insert" => insert::run(catalog, db, command),
        "find" => find::run(catalog, db, command),
        "getMore" => find::get_more(command),
        "drop" => drop::run(catalog, db, command),
        "mapReduce" => map_reduce::run(catalog, db, command),
        other => Err(CommandError::new(
            CommandError::COMMAND_NOT_FOUND,
            format!("no such command: '{other}'"),
        )),
    }
}

// --- Field helpers ---

pub(crate) fn required_str<'a>(command: &'a Document, key: &str) -> Result<&'a str, CommandError> {
    match command.get(key) {
        Some(Bson::String(s)) if !s.is_empty() => Ok(s),
        Some(Bson::String(_)) => Err(CommandError::bad_value(format!("'{key}' must not be empty"))),
        Some(_) => Err(CommandError::type_mismatch(key, "a string")),
        None => Err(CommandError::failed_to_parse(format!("missing '{key}'"))),
    }
}

pub(crate) fn optional_document<'a>(
    command: &'a Document,
    key: &str,
) -> Result<Option<&'a Document>, CommandError> {
    match command.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(d)) => Ok(Some(d)),
        Some(_) => Err(CommandError::type_mismatch(key, "an object")),
    }
}

pub(crate) fn optional_bool(command: &Document, key: &str) -> Result<Option<bool>, CommandError> {
    match command.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Boolean(b)) => Ok(Some(*b)),
        Some(v) => match as_i64(v) {
            Some(n) => Ok(Some(n != 0)),
            None => Err(CommandError::type_mismatch(key, "a boolean")),
        },
    }
}

/// A non-negative count. Zero is returned as-is.
pub(crate) fn optional_count(command: &Document, key: &str) -> Result<Option<u64>, CommandError> {
    match command.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(v) => match as_i64(v) {
            Some(n) if n >= 0 => Ok(Some(n as u64)),
            Some(_) => Err(CommandError::bad_value(format!("'{key}' must be non-negative"))),
            None => Err(CommandError::type_mismatch(key, "a number")),
        },
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
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

/// Reply counts go out as Int32 when they fit.
pub(crate) fn count(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(n as i64),
    }
}
