use bson::{Document, doc};

use super::required_str;
use crate::catalog::{self, Catalog};
use crate::error::CommandError;

pub fn run(catalog: &Catalog, db: &str, command: &Document) -> Result<Document, CommandError> {
    let ns = catalog::namespace(db, required_str(command, "drop")?);
    if catalog.drop(&ns) {
        Ok(doc! { "ns": ns, "ok": 1.0 })
    } else {
        Err(CommandError::new(
            CommandError::NAMESPACE_NOT_FOUND,
            "ns not found",
        ))
    }
}
