//! A small document server that executes `insert`, `find`, `getMore`,
//! `drop` and `mapReduce` commands against an in-memory catalog.

pub mod catalog;
mod commands;
mod compare;
mod config;
mod error;
pub mod protocol;
mod server;
mod session;

pub use catalog::Catalog;
pub use config::ServerConfig;
pub use error::CommandError;
pub use server::Server;
