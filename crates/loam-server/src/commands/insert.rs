use bson::{Bson, Document, doc};

use super::{count, optional_bool, required_str};
use crate::catalog::{self, Catalog};
use crate::error::CommandError;

/// `{ insert, documents, ordered? }` → `{ n, writeErrors?, ok }`.
pub fn run(catalog: &Catalog, db: &str, command: &Document) -> Result<Document, CommandError> {
    let collection = required_str(command, "insert")?;
    let documents = match command.get("documents") {
        Some(Bson::Array(items)) => items
            .iter()
            .map(|item| match item {
                Bson::Document(d) => Ok(d.clone()),
                _ => Err(CommandError::type_mismatch("documents", "an array of objects")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(CommandError::type_mismatch("documents", "an array")),
        None => return Err(CommandError::failed_to_parse("missing 'documents'")),
    };
    let ordered = optional_bool(command, "ordered")?.unwrap_or(true);

    let (n, errors) = catalog.insert(&catalog::namespace(db, collection), documents, ordered);

    let mut reply = doc! { "n": count(n) };
    if !errors.is_empty() {
        let errors: Vec<Bson> = errors.iter().map(|e| Bson::Document(e.to_document())).collect();
        reply.insert("writeErrors", errors);
    }
    reply.insert("ok", 1.0);
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_inserted_count() {
        let catalog = Catalog::new();
        let reply = run(
            &catalog,
            "test",
            &doc! { "insert": "c", "documents": [{ "_id": 1 }, { "_id": 2 }] },
        )
        .unwrap();
        assert_eq!(reply, doc! { "n": 2, "ok": 1.0 });
    }

    #[test]
    fn duplicates_become_write_errors() {
        let catalog = Catalog::new();
        let command = doc! { "insert": "c", "documents": [{ "_id": 1 }, { "_id": 1 }] };
        let reply = run(&catalog, "test", &command).unwrap();
        assert_eq!(reply.get_i32("n").unwrap(), 1);
        let errors = reply.get_array("writeErrors").unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn documents_must_be_objects() {
        let catalog = Catalog::new();
        let err = run(&catalog, "test", &doc! { "insert": "c", "documents": [1] }).unwrap_err();
        assert_eq!(err.code, CommandError::TYPE_MISMATCH);
    }
}
