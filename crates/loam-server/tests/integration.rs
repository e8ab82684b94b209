mod common;
use common::*;

use loam_client::ClientPool;
use loam_ops::*;
use rand::Rng;

fn read_back(pool: &ClientPool, result: &MapReduceResult, type_map: Option<TypeMap>) -> Vec<Decoded> {
    result
        .output_collection()
        .unwrap()
        .find(type_map)
        .unwrap()
        .execute(pool)
        .unwrap()
}

// ── Inline output ───────────────────────────────────────────────

#[test]
fn inline_results_under_each_type_map() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let objects = expected_objects();
    let arrays: Vec<Decoded> = objects
        .iter()
        .map(|d| Decoded::Array(d.clone().into_document().into_iter().collect()))
        .collect();

    let cases = [
        (None, &objects),
        (Some(TypeMap::with_root(Root::Array)), &arrays),
        (Some(TypeMap::with_root(Root::Object)), &objects),
    ];
    for (type_map, expected) in cases {
        let result = map_reduce(
            Out::Inline,
            MapReduceOptions {
                type_map: type_map.clone(),
                ..Default::default()
            },
        )
        .execute(&pool)
        .unwrap();
        let docs: Vec<Decoded> = result.iter().cloned().collect();
        assert_eq!(&docs, expected, "type map {type_map:?}");
    }
}

#[test]
fn inline_metadata() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let result = map_reduce(Out::Inline, Default::default())
        .execute(&pool)
        .unwrap();
    assert_eq!(
        result.counts(),
        &doc! { "input": 6, "emit": 6, "reduce": 3, "output": 3 }
    );
    assert!(!result.timing().is_empty());
    assert!(result.output_collection().is_none());

    let first: Vec<_> = result.iter().collect();
    let second: Vec<_> = (&result).into_iter().collect();
    assert_eq!(first, second);
}

#[test]
fn timing_is_empty_without_verbose() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    for out in [Out::Inline, Out::collection("sums")] {
        let result = map_reduce(
            out.clone(),
            MapReduceOptions {
                verbose: Some(false),
                ..Default::default()
            },
        )
        .execute(&pool)
        .unwrap();
        assert!(result.timing().is_empty(), "out {out:?}");
        assert_eq!(result.counts().get_i32("output").unwrap(), 3);
    }
}

#[test]
fn decoded_documents_deserialize_into_structs() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Sum {
        #[serde(rename = "_id")]
        key: i32,
        value: i32,
    }

    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let result = map_reduce(Out::Inline, Default::default())
        .execute(&pool)
        .unwrap();
    let sums: Vec<Sum> = result.iter().map(|d| d.deserialize().unwrap()).collect();
    assert_eq!(sums[2], Sum { key: 3, value: 9 });
}

// ── Collection output ───────────────────────────────────────────

#[test]
fn collection_output_reads_back_like_inline() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let result = map_reduce(Out::collection("sums"), Default::default())
        .execute(&pool)
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(
        result.output_collection(),
        Some(&OutputCollection {
            database: DB.to_string(),
            collection: "sums".to_string(),
        })
    );
    assert_eq!(read_back(&pool, &result, None), expected_objects());
    assert!(!result.timing().is_empty());
}

#[test]
fn collection_output_in_another_database() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let out = Out::Collection {
        name: "sums".into(),
        database: Some("reports".into()),
        action: OutAction::Replace,
    };
    let result = map_reduce(out, Default::default()).execute(&pool).unwrap();
    let target = result.output_collection().unwrap();
    assert_eq!(target.database, "reports");
    assert_eq!(read_back(&pool, &result, None), expected_objects());
}

#[test]
fn merge_and_reduce_actions() {
    let addr = start_server();
    let pool = connect(&addr);
    let existing = vec![doc! { "_id": 1, "value": 100 }, doc! { "_id": 7, "value": 1 }];
    InsertMany::new(DB, "sums", existing)
        .unwrap()
        .execute(&pool)
        .unwrap();
    seed_fixture(&pool);

    let merge = Out::Collection {
        name: "sums".into(),
        database: None,
        action: OutAction::Merge,
    };
    let result = map_reduce(merge, Default::default()).execute(&pool).unwrap();
    let docs = read_back(&pool, &result, None);
    assert_eq!(docs.len(), 4);
    assert_eq!(docs[0], Decoded::Object(doc! { "_id": 1, "value": 3 }));
    assert_eq!(docs[3], Decoded::Object(doc! { "_id": 7, "value": 1 }));

    let reduce = Out::Collection {
        name: "sums".into(),
        database: None,
        action: OutAction::Reduce,
    };
    let result = map_reduce(reduce, Default::default()).execute(&pool).unwrap();
    let docs = read_back(&pool, &result, None);
    assert_eq!(docs[0], Decoded::Object(doc! { "_id": 1, "value": 6 }));
    assert_eq!(docs[2], Decoded::Object(doc! { "_id": 3, "value": 18 }));
}

// ── Options ─────────────────────────────────────────────────────

#[test]
fn query_limit_finalize_and_scope() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let options = MapReduceOptions::try_from(doc! {
        "query": { "x": { "$lt": 3 } },
        "sort": { "y": -1 },
        "limit": 3,
        "finalize": Javascript::new("function(key, value) return value * factor end"),
        "scope": { "factor": 10 },
    })
    .unwrap();
    let result = map_reduce(Out::Inline, options).execute(&pool).unwrap();
    // y descending among x < 3: (2,4) (2,2) (1,2)
    assert_eq!(
        result.documents(),
        &[
            Decoded::Object(doc! { "_id": 1, "value": 20 }),
            Decoded::Object(doc! { "_id": 2, "value": 60 }),
        ]
    );
    assert_eq!(result.counts().get_i32("input").unwrap(), 3);
}

#[test]
fn random_fixture_sizes() {
    let addr = start_server();
    let pool = connect(&addr);
    let mut rng = rand::thread_rng();

    for _ in 0..5 {
        let keys = rng.gen_range(1..=8);
        let points: Vec<(i32, i32)> = (0..rng.gen_range(1..=40))
            .map(|_| (rng.gen_range(1..=keys), rng.gen_range(-50..=50)))
            .collect();
        seed(&pool, COLLECTION, &points);

        let result = map_reduce(Out::Inline, Default::default())
            .execute(&pool)
            .unwrap();

        let mut sums = std::collections::BTreeMap::new();
        for &(x, y) in &points {
            *sums.entry(x).or_insert(0) += y;
        }
        let expected: Vec<Decoded> = sums
            .into_iter()
            .map(|(x, sum)| Decoded::Object(doc! { "_id": x, "value": sum }))
            .collect();
        assert_eq!(result.documents(), expected.as_slice());
        assert_eq!(
            result.counts().get_i32("input").unwrap() as usize,
            points.len()
        );
    }
}

#[test]
fn missing_source_collection_yields_nothing() {
    let addr = start_server();
    let pool = connect(&addr);
    let result = map_reduce(Out::Inline, Default::default())
        .execute(&pool)
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.counts().get_i32("input").unwrap(), 0);
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn script_errors_surface_as_command_errors() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    let op = MapReduce::new(
        DB,
        COLLECTION,
        Javascript::new("function(doc) error('map exploded') end"),
        reduce(),
        Out::Inline,
        Default::default(),
    )
    .unwrap();
    let err = op.execute(&pool).unwrap_err();
    assert_eq!(err.code(), Some(139));
    assert!(err.to_string().contains("map exploded"));

    // the pooled connection is still usable
    let result = map_reduce(Out::Inline, Default::default())
        .execute(&pool)
        .unwrap();
    assert_eq!(result.documents(), expected_objects().as_slice());
}

#[test]
fn no_server_is_a_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = OperationError::from(ClientPool::new(addr, 1).err().unwrap());
    assert!(matches!(err, OperationError::Connection(_)));
}

#[test]
fn concurrent_executions_share_a_pool() {
    let addr = start_server();
    let pool = connect(&addr);
    seed_fixture(&pool);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let result = map_reduce(Out::Inline, Default::default())
                    .execute(&pool)
                    .unwrap();
                assert_eq!(result.documents(), expected_objects().as_slice());
            });
        }
    });
}

#[test]
fn shutdown_flag_drains_and_returns() {
    use loam_server::{Catalog, Server, ServerConfig};
    use std::sync::atomic::Ordering;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let server = Server::new(
        Catalog::new(),
        ServerConfig {
            addr: addr.clone(),
            ..Default::default()
        },
    );
    let shutdown = server.shutdown_handle();
    let handle = std::thread::spawn(move || server.serve());
    std::thread::sleep(std::time::Duration::from_millis(50));

    let pool = connect(&addr);
    seed_fixture(&pool);

    shutdown.store(true, Ordering::Relaxed);
    drop(pool);
    handle.join().unwrap().unwrap();
}
