/// Deadlines and cancellation of store operations
use std::time::Duration;

use crate::*;

#[tokio::test]
async fn test_slow_backend_times_out() {
    let table = InstrumentedTable::stalled(crate::table(), Duration::from_millis(500));
    let store = HabitStore::new(table)
        .with_clock(fixed_now)
        .with_request_timeout(Duration::from_millis(20));

    let err = store.list_habits(&owner("U1")).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout { operation: "list_habits", .. }));
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
}

#[tokio::test]
async fn test_fast_backend_finishes_within_deadline() {
    let table = InstrumentedTable::stalled(crate::table(), Duration::from_millis(1));
    let store = HabitStore::new(table.clone())
        .with_clock(fixed_now)
        .with_request_timeout(Duration::from_secs(5));

    let habit = store.create_habit(&owner("U1"), "Read").await.unwrap();
    store
        .create_check(&owner("U1"), &habit.id, date("2024-01-10"))
        .await
        .unwrap();
    assert_eq!(table.calls(), 2);
}

#[tokio::test]
async fn test_dropped_operation_stops_waiting() {
    let table = InstrumentedTable::stalled(crate::table(), Duration::from_secs(30));
    let store = HabitStore::new(table).with_clock(fixed_now);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        store.create_habit(&owner("U1"), "Read"),
    )
    .await;
    assert!(cancelled.is_err());
}
