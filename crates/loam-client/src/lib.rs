//! Blocking TCP access to a loam server.
//!
//! [`ClientPool`] implements [`loam_ops::Server`], so any operation can be
//! executed through it from several threads at once.

mod client;
mod pool;

pub use client::{Client, ClientError};
pub use pool::{ClientPool, PooledClient};
