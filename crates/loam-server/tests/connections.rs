mod common;
use common::*;

use loam_client::Client;
use loam_ops::*;

#[cfg(target_os = "linux")]
fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

#[cfg(target_os = "linux")]
#[test]
fn closed_connections_release_descriptors() {
    let addr = start_server();
    drop(Client::connect(&addr).unwrap());
    std::thread::sleep(std::time::Duration::from_millis(100));
    let before = open_descriptors();

    for _ in 0..200 {
        let mut client = Client::connect(&addr).unwrap();
        client.run_command(DB, &doc! { "find": "empty" }).unwrap();
    }
    std::thread::sleep(std::time::Duration::from_millis(300));

    let after = open_descriptors();
    assert!(after < before + 50, "descriptors grew from {before} to {after}");

    let pool = connect(&addr);
    seed_fixture(&pool);
    let result = map_reduce(Out::Inline, Default::default())
        .execute(&pool)
        .unwrap();
    assert_eq!(result.documents(), expected_objects().as_slice());
}
