use bson::{Bson, Document, doc};

use super::{optional_count, optional_document, required_str};
use crate::catalog::{self, Catalog};
use crate::error::CommandError;

/// `{ find, filter?, sort?, projection?, skip?, limit? }`.
///
/// Every result fits in the first batch, so the cursor id is always 0.
pub fn run(catalog: &Catalog, db: &str, command: &Document) -> Result<Document, CommandError> {
    let collection = required_str(command, "find")?;
    let ns = catalog::namespace(db, collection);
    let empty = Document::new();
    let filter = optional_document(command, "filter")?.unwrap_or(&empty);
    let sort = optional_document(command, "sort")?;
    let skip = optional_count(command, "skip")?.unwrap_or(0);
    let limit = optional_count(command, "limit")?;
    optional_count(command, "batchSize")?;

    let mut docs = catalog.find(&ns, filter, sort, skip, limit)?;
    if let Some(projection) = optional_document(command, "projection")? {
        let projection = Projection::parse(projection)?;
        docs = docs.into_iter().map(|d| projection.apply(d)).collect();
    }

    let batch: Vec<Bson> = docs.into_iter().map(Bson::Document).collect();
    Ok(doc! {
        "cursor": { "id": 0_i64, "ns": ns, "firstBatch": batch },
        "ok": 1.0,
    })
}

/// Cursors never outlive their first batch.
pub fn get_more(command: &Document) -> Result<Document, CommandError> {
    let id = command.get("getMore").cloned().unwrap_or(Bson::Null);
    Err(CommandError::new(
        CommandError::CURSOR_NOT_FOUND,
        format!("cursor id {id} not found"),
    ))
}

/// Top-level field projection, either inclusive or exclusive. `_id` is
/// kept unless excluded explicitly.
#[derive(Debug)]
struct Projection {
    fields: Vec<String>,
    include: bool,
    keep_id: bool,
}

impl Projection {
    fn parse(spec: &Document) -> Result<Self, CommandError> {
        let mut fields = Vec::new();
        let mut include = None;
        let mut keep_id = true;
        for (field, flag) in spec {
            let on = match flag {
                Bson::Boolean(b) => *b,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(f) => *f != 0.0,
                _ => return Err(CommandError::type_mismatch("projection", "0/1 flags")),
            };
            if field == "_id" {
                keep_id = on;
                continue;
            }
            match include {
                Some(mode) if mode != on => {
                    return Err(CommandError::bad_value(
                        "cannot mix inclusion and exclusion in a projection",
                    ));
                }
                _ => include = Some(on),
            }
            fields.push(field.clone());
        }
        Ok(Self {
            fields,
            include: include.unwrap_or(false),
            keep_id,
        })
    }

    fn apply(&self, doc: Document) -> Document {
        doc.into_iter()
            .filter(|(key, _)| {
                if key == "_id" {
                    self.keep_id
                } else {
                    self.fields.contains(key) == self.include
                }
            })
            .collect()
    }
}
