use std::sync::Arc;

use bson::Document;

use crate::error::OperationError;

/// A handle that can run one command against one database node.
///
/// Implementations block until the node replies. Transport failures are
/// [`OperationError::Connection`]; a node that refuses or fails the command
/// is [`OperationError::Command`]. Timeouts and retries belong to the
/// implementation, not to the operations that call it.
pub trait Server {
    fn run_command(&self, database: &str, command: Document) -> Result<Document, OperationError>;
}

impl<S: Server + ?Sized> Server for &S {
    fn run_command(&self, database: &str, command: Document) -> Result<Document, OperationError> {
        (**self).run_command(database, command)
    }
}

impl<S: Server + ?Sized> Server for Arc<S> {
    fn run_command(&self, database: &str, command: Document) -> Result<Document, OperationError> {
        (**self).run_command(database, command)
    }
}
