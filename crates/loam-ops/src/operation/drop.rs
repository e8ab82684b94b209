use bson::Document;

use crate::error::OperationError;
use crate::operation::{Operation, check_namespace, run};
use crate::server::Server;

const NAMESPACE_NOT_FOUND: i32 = 26;

/// Drop a collection. Dropping one that does not exist is not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DropCollection {
    database: String,
    collection: String,
}

impl DropCollection {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, OperationError> {
        let database = database.into();
        let collection = collection.into();
        check_namespace(&database, &collection)?;
        Ok(Self {
            database,
            collection,
        })
    }
}

impl Operation for DropCollection {
    /// Whether the collection existed.
    type Output = bool;

    fn command(&self) -> Document {
        let mut cmd = Document::new();
        cmd.insert("drop", self.collection.as_str());
        cmd
    }

    fn execute<S: Server + ?Sized>(&self, server: &S) -> Result<bool, OperationError> {
        match run(server, &self.database, self.command()) {
            Ok(_) => Ok(true),
            Err(OperationError::Command {
                code: NAMESPACE_NOT_FOUND,
                ..
            }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
