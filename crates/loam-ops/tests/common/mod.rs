use std::collections::VecDeque;
use std::sync::Mutex;

use loam_ops::{Document, OperationError, Server};

/// Replays canned replies and records every command it receives.
#[derive(Default)]
pub struct ScriptedServer {
    replies: Mutex<VecDeque<Result<Document, OperationError>>>,
    sent: Mutex<Vec<(String, Document)>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Document) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply));
        self
    }

    pub fn fail(self, error: OperationError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn sent(&self) -> Vec<(String, Document)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Server for ScriptedServer {
    fn run_command(&self, database: &str, command: Document) -> Result<Document, OperationError> {
        self.sent
            .lock()
            .unwrap()
            .push((database.to_string(), command));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OperationError::Connection("no scripted reply".into())))
    }
}
