/// Table protocol behaviour the habit store relies on
use habit_store::storage::keys::habit_table;
use habit_store::storage::table::{
    CancellationReason, Condition, Item, Key, QueryInput, SortCondition, TransactWriteItem,
    UpdateAction,
};
use habit_store::*;
use serde_json::{json, Value};

fn table() -> Box<dyn Table> {
    Box::new(
        SqliteTable::open_in_memory(habit_table("HabitTrackerApp"))
            .expect("Failed to open in-memory table")
            .with_page_size(2),
    )
}

fn item(pk: &str, sk: &str, extra: Value) -> Item {
    let mut attributes = json!({ "PK": pk, "SK": sk });
    if let (Some(map), Value::Object(extra)) = (attributes.as_object_mut(), extra) {
        map.extend(extra);
    }
    match attributes {
        Value::Object(map) => Item::from_attributes(map).unwrap(),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_items_need_string_keys() {
    let mut missing_sk = serde_json::Map::new();
    missing_sk.insert("PK".into(), json!("USER#U1"));
    assert!(Item::from_attributes(missing_sk).is_err());

    let mut numeric_pk = serde_json::Map::new();
    numeric_pk.insert("PK".into(), json!(1));
    numeric_pk.insert("SK".into(), json!("x"));
    assert!(Item::from_attributes(numeric_pk).is_err());
}

#[tokio::test]
async fn test_cancellation_reports_each_operation() {
    let table = table();
    table
        .put_item(item("USER#U1", "HABITS#a", json!({ "ChecksCount": 0 })), None)
        .await
        .unwrap();
    table
        .put_item(item("USER#U1", "HABIT#a__CHECK_DATE#2024-01-10", json!({})), None)
        .await
        .unwrap();

    let err = table
        .transact_write(vec![
            TransactWriteItem::Put {
                item: item("USER#U1", "HABIT#a__CHECK_DATE#2024-01-10", json!({})),
                condition: Some(Condition::item_not_exists()),
            },
            TransactWriteItem::Update {
                key: Key::new("USER#U1", "HABITS#a"),
                actions: vec![UpdateAction::Add("ChecksCount".into(), 1)],
                condition: Some(Condition::item_exists()),
            },
        ])
        .await
        .unwrap_err();

    match err {
        TableError::TransactionCanceled { reasons } => assert_eq!(
            reasons,
            vec![CancellationReason::ConditionalCheckFailed, CancellationReason::None]
        ),
        other => panic!("unexpected error: {other}"),
    }

    let habit = table.get_item(&Key::new("USER#U1", "HABITS#a")).await.unwrap().unwrap();
    assert_eq!(habit.get("ChecksCount"), Some(&json!(0)));
}

#[tokio::test]
async fn test_equality_condition_guards_stale_writes() {
    let table = table();
    let key = Key::new("USER#U1", "HABITS#a");
    table
        .put_item(item("USER#U1", "HABITS#a", json!({ "ChecksCount": 1, "Title": "Read" })), None)
        .await
        .unwrap();

    let stale = Condition::All(vec![
        Condition::Equals("ChecksCount".into(), json!(0)),
        Condition::Equals("Title".into(), json!("Read")),
    ]);
    assert!(matches!(
        table.delete_item(&key, Some(stale)).await,
        Err(TableError::ConditionalCheckFailed)
    ));

    let fresh = Condition::All(vec![
        Condition::Equals("ChecksCount".into(), json!(1)),
        Condition::Equals("Title".into(), json!("Read")),
    ]);
    table.delete_item(&key, Some(fresh)).await.unwrap();
    assert!(table.get_item(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_index_query_orders_by_date_across_habits() {
    let table = table();
    for (habit, day) in [("b", "2024-01-09"), ("a", "2024-01-10"), ("a", "2024-01-02"), ("b", "2024-01-05")] {
        table
            .put_item(
                item(
                    "USER#U1",
                    &format!("HABIT#{habit}__CHECK_DATE#{day}"),
                    json!({ "CheckDateLSISK": format!("CHECK_DATE#{day}__HABIT#{habit}") }),
                ),
                None,
            )
            .await
            .unwrap();
    }
    table
        .put_item(item("USER#U1", "HABITS#a", json!({})), None)
        .await
        .unwrap();

    let mut input = QueryInput::new(
        "USER#U1",
        SortCondition::GreaterOrEqual("CHECK_DATE#2024-01-05".into()),
    )
    .on_index("CheckDateLSI");

    let mut seen = Vec::new();
    loop {
        let page = table.query(&input).await.unwrap();
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|i| i.get_str("CheckDateLSISK").unwrap().to_string()));
        match page.last_evaluated {
            Some(token) => input.exclusive_start = Some(token),
            None => break,
        }
    }

    assert_eq!(
        seen,
        vec![
            "CHECK_DATE#2024-01-05__HABIT#b",
            "CHECK_DATE#2024-01-09__HABIT#b",
            "CHECK_DATE#2024-01-10__HABIT#a",
        ]
    );
}

#[tokio::test]
async fn test_reverse_prefix_query_with_limit() {
    let table = table();
    for day in ["2024-01-01", "2024-01-03", "2024-01-02"] {
        table
            .put_item(item("USER#U1", &format!("HABIT#a__CHECK_DATE#{day}"), json!({})), None)
            .await
            .unwrap();
    }

    let input = QueryInput::new("USER#U1", SortCondition::BeginsWith("HABIT#a__".into()))
        .reverse()
        .limit(1);
    let page = table.query(&input).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].sk(), "HABIT#a__CHECK_DATE#2024-01-03");
    assert!(page.last_evaluated.is_some());
}
