/// Errors surfaced by operation construction, execution and decoding.
///
/// Nothing in this crate retries or swallows these; every variant reaches
/// the caller of `new`, `execute` or [`decode`](crate::decode) unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
    /// Rejected locally before anything was sent to a server.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server could not be reached or the transport failed mid-command.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server ran the command and reported a failure.
    #[error("command failed with code {code}: {message}")]
    Command { code: i32, message: String },

    /// The reply did not have the shape the operation expects.
    #[error("unexpected reply: {0}")]
    Decode(String),
}

impl OperationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Server error code for [`OperationError::Command`], `None` otherwise.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<bson::error::Error> for OperationError {
    fn from(e: bson::error::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
