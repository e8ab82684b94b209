#![allow(dead_code)]

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use loam_client::ClientPool;
use loam_ops::*;
use loam_server::{Catalog, Server, ServerConfig};

pub const DB: &str = "test";
pub const COLLECTION: &str = "points";

/// Start a server on an ephemeral port and return its address.
pub fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let server = Server::new(
        Catalog::new(),
        ServerConfig {
            addr: addr.clone(),
            ..Default::default()
        },
    );
    thread::spawn(move || {
        server.serve().unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    addr
}

pub fn connect(addr: &str) -> ClientPool {
    ClientPool::new(addr, 2).unwrap()
}

pub fn map() -> Javascript {
    Javascript::new("function(doc) emit(doc.x, doc.y) end")
}

pub fn reduce() -> Javascript {
    Javascript::new(
        "function(key, values) local s = 0 for _, v in ipairs(values) do s = s + v end return s end",
    )
}

/// Drop the collection and insert `{ x, y }` documents.
pub fn seed(pool: &ClientPool, collection: &str, points: &[(i32, i32)]) {
    DropCollection::new(DB, collection)
        .unwrap()
        .execute(pool)
        .unwrap();
    let docs = points.iter().map(|&(x, y)| doc! { "x": x, "y": y }).collect();
    let inserted = InsertMany::new(DB, collection, docs)
        .unwrap()
        .execute(pool)
        .unwrap();
    assert_eq!(inserted, points.len() as u64);
}

/// `x` in 1..=3 with `y = x * i`, so per-key sums are 3, 6 and 9.
pub fn seed_fixture(pool: &ClientPool) {
    seed(pool, COLLECTION, &[(1, 1), (2, 2), (3, 3), (1, 2), (2, 4), (3, 6)]);
}

pub fn expected_objects() -> Vec<Decoded> {
    vec![
        Decoded::Object(doc! { "_id": 1, "value": 3 }),
        Decoded::Object(doc! { "_id": 2, "value": 6 }),
        Decoded::Object(doc! { "_id": 3, "value": 9 }),
    ]
}

pub fn map_reduce(out: Out, options: MapReduceOptions) -> MapReduce {
    MapReduce::new(DB, COLLECTION, map(), reduce(), out, options).unwrap()
}
