/// Moving habits between the active and archived collections
use futures::future::join_all;

use crate::*;

/// Exactly one of the two lookups succeeds
async fn assert_visible_once(store: &HabitStore<SqliteTable>, owner: &OwnerId, id: &HabitId, archived: bool) {
    let active = store.find_habit(owner, id).await;
    let in_archive = store.find_archived_habit(owner, id).await;
    assert_eq!(active.is_ok(), !archived);
    assert_eq!(in_archive.is_ok(), archived);
}

fn later() -> chrono::DateTime<chrono::Utc> {
    fixed_now() + chrono::Duration::hours(5)
}

#[tokio::test]
async fn test_archive_round_trip_keeps_fields() {
    let store = store();
    let u1 = owner("U1");
    let habit = store.create_habit(&u1, "Read").await.unwrap();
    store.create_check(&u1, &habit.id, date("2024-01-08")).await.unwrap();
    store.create_check(&u1, &habit.id, date("2024-01-09")).await.unwrap();
    let before = store.find_habit(&u1, &habit.id).await.unwrap();
    assert_visible_once(&store, &u1, &habit.id, false).await;

    let store = store.with_clock(later);
    store.archive_habit(&u1, &habit.id).await.unwrap();
    assert_visible_once(&store, &u1, &habit.id, true).await;

    let archived = store.find_archived_habit(&u1, &habit.id).await.unwrap();
    assert_eq!(archived.updated_at, later());
    assert_eq!(store.list_archived_habits(&u1).await.unwrap(), vec![archived]);
    assert!(store.list_habits(&u1).await.unwrap().is_empty());

    store.unarchive_habit(&u1, &habit.id).await.unwrap();
    assert_visible_once(&store, &u1, &habit.id, false).await;

    let after = store.find_habit(&u1, &habit.id).await.unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.owner_id, before.owner_id);
    assert_eq!(after.title, before.title);
    assert_eq!(after.checks_count, 2);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(Habit { updated_at: before.updated_at, ..after }, before);

    // Checks stay attached and countable after the round trip
    store.create_check(&u1, &habit.id, date("2024-01-10")).await.unwrap();
    assert_eq!(store.find_habit(&u1, &habit.id).await.unwrap().checks_count, 3);
}

#[tokio::test]
async fn test_archive_missing_habit_is_not_found() {
    let store = store();
    let u1 = owner("U1");

    assert!(store.archive_habit(&u1, &HabitId::new()).await.unwrap_err().is_not_found());
    assert!(store.unarchive_habit(&u1, &HabitId::new()).await.unwrap_err().is_not_found());

    let habit = store.create_habit(&u1, "Read").await.unwrap();
    assert!(store.unarchive_habit(&u1, &habit.id).await.unwrap_err().is_not_found());

    store.archive_habit(&u1, &habit.id).await.unwrap();
    assert!(store.archive_habit(&u1, &habit.id).await.unwrap_err().is_not_found());
    assert_visible_once(&store, &u1, &habit.id, true).await;
}

#[tokio::test]
async fn test_racing_archives_move_the_habit_once() {
    let store = store();
    let u1 = owner("U1");
    let habit = store.create_habit(&u1, "Read").await.unwrap();

    let results = join_all((0..4).map(|_| store.archive_habit(&u1, &habit.id))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_not_found() || err.is_conflict(), "unexpected error: {err}");
    }
    assert_visible_once(&store, &u1, &habit.id, true).await;
}

#[tokio::test]
async fn test_archive_racing_a_check_keeps_the_counter() {
    let store = store();
    let u1 = owner("U1");
    let habit = store.create_habit(&u1, "Read").await.unwrap();

    let archive = store.archive_habit(&u1, &habit.id);
    let check = store.create_check(&u1, &habit.id, date("2024-01-10"));
    let (archived, checked) = futures::join!(archive, check);

    let stored = stored_checks(&store, &u1, &habit.id).await as u64;
    assert_eq!(stored, u64::from(checked.is_ok()));

    let current = match archived {
        Ok(()) => store.find_archived_habit(&u1, &habit.id).await.unwrap(),
        Err(e) => {
            assert!(e.is_conflict(), "unexpected error: {e}");
            store.find_habit(&u1, &habit.id).await.unwrap()
        }
    };
    assert_eq!(current.checks_count, stored);
}
