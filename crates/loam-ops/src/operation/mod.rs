mod drop;
mod find;
mod insert;
mod map_reduce;
mod out;

pub use drop::DropCollection;
pub use find::{Find, FindOptions};
pub use insert::InsertMany;
pub use map_reduce::{MapReduce, MapReduceOptions};
pub use out::{Out, OutAction};

use bson::Document;

use crate::error::OperationError;
use crate::reply;
use crate::server::Server;

/// One server command: rendered from validated parameters, sent once,
/// and interpreted from the raw reply.
pub trait Operation {
    type Output;

    /// Render the command document sent to the server.
    fn command(&self) -> Document;

    /// Run the command on `server` and interpret its reply.
    fn execute<S: Server + ?Sized>(&self, server: &S) -> Result<Self::Output, OperationError>;
}

/// Send `command` and reject `{ ok: 0 }` replies.
pub(crate) fn run<S: Server + ?Sized>(
    server: &S,
    database: &str,
    command: Document,
) -> Result<Document, OperationError> {
    let reply = server.run_command(database, command)?;
    reply::check_ok(&reply)?;
    Ok(reply)
}

pub(crate) fn check_namespace(database: &str, collection: &str) -> Result<(), OperationError> {
    if database.is_empty() {
        return Err(OperationError::invalid("database name is empty"));
    }
    if collection.is_empty() {
        return Err(OperationError::invalid("collection name is empty"));
    }
    Ok(())
}
