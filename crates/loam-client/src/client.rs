use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use bson::Document;
use loam_ops::OperationError;
use loam_server::protocol::{FrameError, Request, Response, read_frame, write_frame};

/// Replies above this size are treated as a broken stream.
const MAX_REPLY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub enum ClientError {
    Io(std::io::Error),
    Serialization(String),
    Server { code: i32, message: String },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "io error: {e}"),
            ClientError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ClientError::Server { code, message } => {
                write!(f, "server error {code}: {message}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e)
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(e) => ClientError::Io(e),
            other => ClientError::Serialization(other.to_string()),
        }
    }
}

impl From<bson::error::Error> for ClientError {
    fn from(e: bson::error::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<ClientError> for OperationError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Server { code, message } => OperationError::Command { code, message },
            other => OperationError::Connection(other.to_string()),
        }
    }
}

/// One connection to a loam server. Commands run one at a time.
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    broken: bool,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self {
            reader,
            writer,
            broken: false,
        })
    }

    /// Whether a transport or framing failure left the stream unusable.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn request(&mut self, request: Request) -> Result<Response, ClientError> {
        // A failed exchange may leave part of a frame unread.
        let outcome = self.exchange(request);
        if outcome.is_err() {
            self.broken = true;
        }
        outcome
    }

    fn exchange(&mut self, request: Request) -> Result<Response, ClientError> {
        write_frame(&mut self.writer, &request)?;
        match read_frame(&mut self.reader, MAX_REPLY_BYTES)? {
            Some(response) => Ok(response),
            None => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))),
        }
    }

    /// Send a command document to `database` and return the reply document.
    pub fn run_command(
        &mut self,
        database: &str,
        command: &Document,
    ) -> Result<Document, ClientError> {
        let name = command.keys().next().map(String::as_str).unwrap_or_default();
        tracing::debug!(database, command = name, "sending command");

        match self.request(Request::RunCommand {
            database: database.to_string(),
            command: bson::serialize_to_vec(command)?,
        })? {
            Response::Reply(bytes) => Ok(bson::deserialize_from_slice(&bytes)?),
            Response::Error { code, message } => Err(ClientError::Server { code, message }),
        }
    }
}
