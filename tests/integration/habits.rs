/// Habit lifecycle, owner isolation and title validation
use crate::*;

#[tokio::test]
async fn test_create_and_find_habit() {
    let store = store();
    let u1 = owner("U1");

    let habit = store.create_habit(&u1, "Read").await.unwrap();
    assert_eq!(habit.title.as_str(), "Read");
    assert_eq!(habit.checks_count, 0);
    assert_eq!(habit.created_at, fixed_now());
    assert_eq!(habit.updated_at, fixed_now());

    let found = store.find_habit(&u1, &habit.id).await.unwrap();
    assert_eq!(found, habit);
}

#[tokio::test]
async fn test_list_habits_reads_every_page() {
    let store = store();
    let u1 = owner("U1");

    let mut created = Vec::new();
    for title in ["Read", "Run", "Write", "Stretch"] {
        created.push(store.create_habit(&u1, title).await.unwrap().id);
    }

    let mut listed: Vec<_> = store
        .list_habits(&u1)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    listed.sort_by_key(|id| id.to_string());
    created.sort_by_key(|id| id.to_string());
    assert_eq!(listed, created);
}

#[tokio::test]
async fn test_empty_listings_are_not_errors() {
    let store = store();
    let u1 = owner("U1");

    assert!(store.list_habits(&u1).await.unwrap().is_empty());
    assert!(store.list_archived_habits(&u1).await.unwrap().is_empty());
    assert!(store
        .list_recent_checks_across_habits(&u1, 7)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_owners_are_isolated() {
    let store = store();
    let a = owner("A");
    let b = owner("B");

    let habit = store.create_habit(&a, "Read").await.unwrap();
    let archived = store.create_habit(&a, "Run").await.unwrap();
    store.archive_habit(&a, &archived.id).await.unwrap();
    store
        .create_check(&a, &habit.id, date("2024-01-09"))
        .await
        .unwrap();

    assert!(store.list_habits(&b).await.unwrap().is_empty());
    assert!(store.list_archived_habits(&b).await.unwrap().is_empty());
    assert!(store.find_habit(&b, &habit.id).await.unwrap_err().is_not_found());
    assert!(store
        .find_archived_habit(&b, &archived.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store
        .list_latest_checks(&b, &habit.id, 5)
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .list_recent_checks_across_habits(&b, 7)
        .await
        .unwrap()
        .is_empty());

    // B can neither check nor uncheck A's habit
    let err = store
        .create_check(&b, &habit.id, date("2024-01-10"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = store
        .delete_check(&b, &habit.id, date("2024-01-09"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.archive_habit(&b, &habit.id).await.unwrap_err().is_not_found());

    let unchanged = store.find_habit(&a, &habit.id).await.unwrap();
    assert_eq!(unchanged.checks_count, 1);
}

#[tokio::test]
async fn test_title_length_boundaries() {
    let store = store();
    let u1 = owner("U1");

    let one = store.create_habit(&u1, "x").await.unwrap();
    let fifty = "é".repeat(50);
    let habit = store.create_habit(&u1, &fifty).await.unwrap();
    assert_eq!(habit.title.as_str(), fifty);

    store.update_habit_title(&u1, &one.id, &fifty).await.unwrap();
    store.update_habit_title(&u1, &one.id, "y").await.unwrap();
}

#[tokio::test]
async fn test_invalid_titles_never_reach_storage() {
    let table = InstrumentedTable::new(crate::table());
    let store = HabitStore::new(table.clone()).with_clock(fixed_now);
    let u1 = owner("U1");

    for title in [String::new(), "é".repeat(51), "x".repeat(51)] {
        let err = store.create_habit(&u1, &title).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);

        let err = store
            .update_habit_title(&u1, &HabitId::new(), &title)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }
    assert_eq!(table.calls(), 0);
}

#[tokio::test]
async fn test_update_title_requires_active_habit() {
    let store = store();
    let u1 = owner("U1");

    let err = store
        .update_habit_title(&u1, &HabitId::new(), "Read")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    // No partial record was left behind
    assert!(store.list_habits(&u1).await.unwrap().is_empty());

    let habit = store.create_habit(&u1, "Read").await.unwrap();
    store.update_habit_title(&u1, &habit.id, "Read more").await.unwrap();
    let renamed = store.find_habit(&u1, &habit.id).await.unwrap();
    assert_eq!(renamed.title.as_str(), "Read more");
    assert_eq!(renamed.created_at, habit.created_at);

    store.archive_habit(&u1, &habit.id).await.unwrap();
    let err = store
        .update_habit_title(&u1, &habit.id, "Archived")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_habit_is_idempotent() {
    let store = store();
    let u1 = owner("U1");

    let habit = store.create_habit(&u1, "Read").await.unwrap();
    store.delete_habit(&u1, &habit.id).await.unwrap();
    store.delete_habit(&u1, &habit.id).await.unwrap();
    store.delete_habit(&u1, &HabitId::new()).await.unwrap();

    assert!(store.find_habit(&u1, &habit.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_habit_leaves_checks_behind() {
    let store = store();
    let u1 = owner("U1");

    let habit = store.create_habit(&u1, "Read").await.unwrap();
    store
        .create_check(&u1, &habit.id, date("2024-01-10"))
        .await
        .unwrap();
    store.delete_habit(&u1, &habit.id).await.unwrap();

    assert_eq!(stored_checks(&store, &u1, &habit.id).await, 1);
}

#[tokio::test]
async fn test_habits_survive_reopening_the_database() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("habits.db");
    let u1 = owner("U1");

    let habit = {
        let tracker = HabitTracker::open_at(&path, Config::default()).unwrap();
        tracker.store().create_habit(&u1, "Read").await.unwrap()
    };

    let tracker = HabitTracker::open_at(&path, Config::default()).unwrap();
    let found = tracker.store().find_habit(&u1, &habit.id).await.unwrap();
    assert_eq!(found.title.as_str(), "Read");
}
