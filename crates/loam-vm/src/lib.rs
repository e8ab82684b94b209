mod convert;
mod error;
mod runtime;

pub use convert::{from_lua, to_lua};
pub use error::VmError;
pub use runtime::{MapReduceVm, Scripts};
