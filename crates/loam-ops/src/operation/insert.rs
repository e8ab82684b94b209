use bson::{Bson, Document};

use crate::error::OperationError;
use crate::operation::{Operation, check_namespace, run};
use crate::reply;
use crate::server::Server;

/// Insert a batch of documents in one command.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertMany {
    database: String,
    collection: String,
    documents: Vec<Document>,
    ordered: bool,
}

impl InsertMany {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        documents: Vec<Document>,
    ) -> Result<Self, OperationError> {
        let database = database.into();
        let collection = collection.into();
        check_namespace(&database, &collection)?;
        if documents.is_empty() {
            return Err(OperationError::invalid("no documents to insert"));
        }
        Ok(Self {
            database,
            collection,
            documents,
            ordered: true,
        })
    }

    /// Keep inserting after a failed document instead of stopping.
    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }
}

impl Operation for InsertMany {
    /// Number of documents the server inserted.
    type Output = u64;

    fn command(&self) -> Document {
        let mut cmd = Document::new();
        cmd.insert("insert", self.collection.as_str());
        cmd.insert(
            "documents",
            self.documents
                .iter()
                .cloned()
                .map(Bson::Document)
                .collect::<Vec<_>>(),
        );
        cmd.insert("ordered", self.ordered);
        cmd
    }

    fn execute<S: Server + ?Sized>(&self, server: &S) -> Result<u64, OperationError> {
        let reply = run(server, &self.database, self.command())?;
        if let Some(Bson::Array(errors)) = reply.get("writeErrors") {
            if let Some(Bson::Document(first)) = errors.first() {
                let code = first
                    .get("code")
                    .and_then(reply::as_i64)
                    .and_then(|c| i32::try_from(c).ok())
                    .unwrap_or_default();
                let message = reply::read_string(first, "errmsg").unwrap_or_default();
                return Err(OperationError::Command { code, message });
            }
        }
        let n = reply::read_i64(&reply, "n")?;
        u64::try_from(n).map_err(|_| OperationError::decode("`n` is negative"))
    }
}
