#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("failed to compile {name} function: {message}")]
    Compile { name: &'static str, message: String },

    #[error("{0}")]
    Runtime(String),

    #[error("cannot convert value: {0}")]
    Conversion(String),
}

impl From<mlua::Error> for VmError {
    fn from(e: mlua::Error) -> Self {
        VmError::Runtime(e.to_string())
    }
}
