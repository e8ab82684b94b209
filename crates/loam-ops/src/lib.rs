mod code;
mod decode;
mod error;
pub mod operation;
mod options;
mod reply;
mod result;
mod server;
mod type_map;

pub use bson::{Bson, Document, doc};
pub use code::Javascript;
pub use decode::{Decoded, decode, decode_document};
pub use error::OperationError;
pub use operation::{
    DropCollection, Find, FindOptions, InsertMany, MapReduce, MapReduceOptions, Operation, Out,
    OutAction,
};
pub use result::{MapReduceOutput, MapReduceResult, OutputCollection};
pub use server::Server;
pub use type_map::{Root, TypeMap};
