use std::fmt;

use loam_vm::VmError;

/// A failed command, reported to the client as `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub code: i32,
    pub message: String,
}

impl CommandError {
    pub const INTERNAL_ERROR: i32 = 1;
    pub const BAD_VALUE: i32 = 2;
    pub const FAILED_TO_PARSE: i32 = 9;
    pub const TYPE_MISMATCH: i32 = 14;
    pub const NAMESPACE_NOT_FOUND: i32 = 26;
    pub const CURSOR_NOT_FOUND: i32 = 43;
    pub const COMMAND_NOT_FOUND: i32 = 59;
    pub const JS_INTERPRETER_FAILURE: i32 = 139;
    pub const DUPLICATE_KEY: i32 = 11000;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::new(Self::BAD_VALUE, message)
    }

    pub fn failed_to_parse(message: impl Into<String>) -> Self {
        Self::new(Self::FAILED_TO_PARSE, message)
    }

    pub fn type_mismatch(field: &str, expected: &str) -> Self {
        Self::new(
            Self::TYPE_MISMATCH,
            format!("field '{field}' must be {expected}"),
        )
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for CommandError {}

impl From<VmError> for CommandError {
    fn from(e: VmError) -> Self {
        Self::new(Self::JS_INTERPRETER_FAILURE, e.to_string())
    }
}

impl From<bson::error::Error> for CommandError {
    fn from(e: bson::error::Error) -> Self {
        Self::failed_to_parse(e.to_string())
    }
}
