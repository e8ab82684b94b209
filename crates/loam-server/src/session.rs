use std::sync::Arc;

use bson::Document;

use crate::catalog::Catalog;
use crate::commands;
use crate::error::CommandError;
use crate::protocol::{Request, Response};

pub struct Session {
    catalog: Arc<Catalog>,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::RunCommand { database, command } => {
                match self.run_command(&database, &command) {
                    Ok(reply) => Response::Reply(reply),
                    Err(e) => {
                        tracing::debug!(%database, code = e.code, error = %e.message, "command failed");
                        Response::Error {
                            code: e.code,
                            message: e.message,
                        }
                    }
                }
            }
        }
    }

    fn run_command(&self, database: &str, raw: &[u8]) -> Result<Vec<u8>, CommandError> {
        let command: Document = bson::deserialize_from_slice(raw)?;
        let name = command.keys().next().cloned().unwrap_or_default();
        tracing::debug!(database, command = %name, "running command");

        let reply = commands::dispatch(&self.catalog, database, &command)?;
        bson::serialize_to_vec(&reply).map_err(|e| {
            CommandError::new(CommandError::INTERNAL_ERROR, format!("encoding reply: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn request(database: &str, command: &Document) -> Request {
        Request::RunCommand {
            database: database.to_string(),
            command: bson::serialize_to_vec(command).unwrap(),
        }
    }

    #[test]
    fn replies_carry_raw_bson() {
        let session = Session::new(Arc::new(Catalog::new()));
        let response = session.handle(request(
            "test",
            &doc! { "insert": "c", "documents": [{ "_id": 1 }] },
        ));
        let Response::Reply(bytes) = response else {
            panic!("expected a reply");
        };
        let reply: Document = bson::deserialize_from_slice(&bytes).unwrap();
        assert_eq!(reply, doc! { "n": 1, "ok": 1.0 });
    }

    #[test]
    fn failures_become_error_responses() {
        let session = Session::new(Arc::new(Catalog::new()));
        let response = session.handle(request("test", &doc! { "drop": "missing" }));
        assert!(matches!(
            response,
            Response::Error { code: CommandError::NAMESPACE_NOT_FOUND, .. }
        ));

        let garbage = Request::RunCommand {
            database: "test".into(),
            command: vec![1, 2, 3],
        };
        assert!(matches!(
            session.handle(garbage),
            Response::Error { code: CommandError::FAILED_TO_PARSE, .. }
        ));
    }
}
