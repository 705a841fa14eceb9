use futures::future::join_all;
use inventory::{MemoryReservationStore, ReservationEngine, ReservationStore};
use shared::Error;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_reserves_summing_to_capacity_all_succeed() {
    let store = Arc::new(MemoryReservationStore::new());
    let unit = store.create_unit(16).await.unwrap();
    // each commit can invalidate every other in-flight snapshot once, so the
    // retry allowance must exceed the task count
    let engine = Arc::new(ReservationEngine::new(store.clone()).with_max_attempts(32));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            let unit_id = unit.id;
            tokio::spawn(async move { engine.reserve(unit_id, Uuid::new_v4(), 1, None).await })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let unit = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(unit.capacity_remaining, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversubscribed_reserves_never_overcommit() {
    let store = Arc::new(MemoryReservationStore::new());
    let unit = store.create_unit(8).await.unwrap();
    let engine = Arc::new(ReservationEngine::new(store.clone()).with_max_attempts(64));

    let tasks: Vec<_> = (0..24)
        .map(|_| {
            let engine = engine.clone();
            let unit_id = unit.id;
            tokio::spawn(async move { engine.reserve(unit_id, Uuid::new_v4(), 1, None).await })
        })
        .collect();

    let mut succeeded = 0;
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(Error::InsufficientCapacity { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 8);
    let unit = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert_eq!(unit.capacity_remaining, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reserve_and_release_keep_counter_in_bounds() {
    let store = Arc::new(MemoryReservationStore::new());
    let unit = store.create_unit(4).await.unwrap();
    let engine = Arc::new(ReservationEngine::new(store.clone()).with_max_attempts(64));

    let mut held = Vec::new();
    for _ in 0..4 {
        held.push(
            engine
                .reserve(unit.id, Uuid::new_v4(), 1, None)
                .await
                .unwrap(),
        );
    }

    let releases: Vec<_> = held
        .iter()
        .map(|r| {
            let engine = engine.clone();
            let id = r.id;
            tokio::spawn(async move { engine.release(id).await.map(|_| ()) })
        })
        .collect();
    let reserves: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let unit_id = unit.id;
            tokio::spawn(async move {
                engine
                    .reserve(unit_id, Uuid::new_v4(), 1, None)
                    .await
                    .map(|_| ())
            })
        })
        .collect();

    for result in join_all(releases).await {
        result.unwrap().unwrap();
    }
    let mut reserved = 0i32;
    for result in join_all(reserves).await {
        match result.unwrap() {
            Ok(()) => reserved += 1,
            Err(Error::InsufficientCapacity { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let unit = store.inventory_unit(unit.id).await.unwrap().unwrap();
    assert!(unit.capacity_remaining >= 0);
    assert!(unit.capacity_remaining <= unit.capacity_total);
    // every initial hold was released, so what remains outstanding is
    // exactly the successful concurrent reserves
    assert_eq!(unit.capacity_remaining, unit.capacity_total - reserved);
}
