use std::net::{SocketAddr, ToSocketAddrs};
use std::ops::{Deref, DerefMut};

use bson::Document;
use crossbeam::channel::{Receiver, Sender};
use loam_ops::{OperationError, Server};

use crate::client::{Client, ClientError};

/// A fixed-size set of connections shared between threads.
///
/// Connections that failed at the transport level are reopened the next
/// time they are checked out.
pub struct ClientPool {
    addrs: Vec<SocketAddr>,
    sender: Sender<Client>,
    receiver: Receiver<Client>,
}

impl ClientPool {
    pub fn new(addr: impl ToSocketAddrs, size: usize) -> Result<Self, ClientError> {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        let size = size.max(1);
        let (sender, receiver) = crossbeam::channel::bounded(size);
        for _ in 0..size {
            let client = Client::connect(addrs.as_slice())?;
            sender
                .send(client)
                .map_err(|e| ClientError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(Self {
            addrs,
            sender,
            receiver,
        })
    }

    pub fn get(&self) -> Result<PooledClient<'_>, ClientError> {
        let mut client = self
            .receiver
            .recv()
            .map_err(|e| ClientError::Io(std::io::Error::other(e.to_string())))?;
        if client.is_broken() {
            tracing::debug!("reopening broken connection");
            client = match Client::connect(self.addrs.as_slice()) {
                Ok(fresh) => fresh,
                Err(e) => {
                    // keep the slot so later checkouts can retry
                    let _ = self.sender.send(client);
                    return Err(e);
                }
            };
        }
        Ok(PooledClient {
            client: Some(client),
            pool: &self.sender,
        })
    }
}

impl Server for ClientPool {
    fn run_command(&self, database: &str, command: Document) -> Result<Document, OperationError> {
        let mut client = self.get()?;
        Ok(client.run_command(database, &command)?)
    }
}

pub struct PooledClient<'a> {
    client: Option<Client>,
    pool: &'a Sender<Client>,
}

impl Deref for PooledClient<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        // BUG: client is always Some until Drop runs
        self.client.as_ref().expect("BUG: client already returned")
    }
}

impl DerefMut for PooledClient<'_> {
    fn deref_mut(&mut self) -> &mut Client {
        // BUG: client is always Some until Drop runs
        self.client.as_mut().expect("BUG: client already returned")
    }
}

impl Drop for PooledClient<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = self.pool.send(client);
        }
    }
}
