//! The five literal end-to-end scenarios from spec §8, written once here
//! against the fixture traits in [`crate::traits`] so every adapter crate
//! gets the same coverage by implementing the trait rather than
//! reimplementing the assertions.

use conduit_contract::{parse_event, CancellationContext, Operation};
use conduit_types::{Field, FieldMap};
use serde_json::json;

use crate::traits::{CrudAdapterTest, InsertOnlyAdapterTest};

fn field_map(pairs: &[(&str, Field)]) -> FieldMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Scenario 1 (spec §8): "Insert round-trip (relational)." Raw
/// `{operation:"INSERT", table_name, data:{id:1, name:"Ada"}}` applied to
/// an empty table is visible via `Fetch(table, 10)`.
pub async fn insert_round_trip<A: InsertOnlyAdapterTest>(fixture: &A, table_name: &str) {
    let cx = CancellationContext::new();
    let raw = json!({
        "operation": "INSERT",
        "table_name": table_name,
        "data": {"id": 1, "name": "Ada"}
    })
    .as_object()
    .unwrap()
    .clone();

    let event = parse_event(fixture.applier().backend(), &raw).expect("scenario 1 raw event parses");
    fixture.applier().apply(&cx, &event).await.expect("scenario 1 apply succeeds");

    let rows = fixture
        .data()
        .fetch(&cx, table_name, 10)
        .await
        .expect("scenario 1 fetch succeeds");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Field::Int(1)));
    assert_eq!(rows[0].get("name"), Some(&Field::String("Ada".to_string())));
}

/// Scenario 3 (spec §8): "Delete with fallback WHERE." Precondition: `t`
/// contains `{k:7,v:"x"}` and `{k:8,v:"y"}`. Raw
/// `{operation:"DELETE", table_name:"t", old_data:{k:7}}` leaves exactly
/// the `k==8` row.
pub async fn delete_with_fallback_where<A: InsertOnlyAdapterTest>(fixture: &A, table_name: &str) {
    let cx = CancellationContext::new();
    fixture
        .data()
        .insert(
            &cx,
            table_name,
            &[
                field_map(&[("k", Field::Int(7)), ("v", Field::String("x".to_string()))]),
                field_map(&[("k", Field::Int(8)), ("v", Field::String("y".to_string()))]),
            ],
        )
        .await
        .expect("scenario 3 precondition insert succeeds");

    let raw = json!({
        "operation": "DELETE",
        "table_name": table_name,
        "old_data": {"k": 7}
    })
    .as_object()
    .unwrap()
    .clone();
    let event = parse_event(fixture.applier().backend(), &raw).expect("scenario 3 raw event parses");
    fixture.applier().apply(&cx, &event).await.expect("scenario 3 apply succeeds");

    let count = fixture
        .data()
        .get_row_count(&cx, table_name, "")
        .await
        .expect("scenario 3 row count succeeds");
    assert_eq!(count, 1);
    let rows = fixture.data().fetch(&cx, table_name, 10).await.unwrap();
    assert_eq!(rows[0].get("k"), Some(&Field::Int(8)));
}

/// Scenario 4 (spec §8): "Truncate (warehouse)." Raw
/// `{operation:"TRUNCATE", table_name:"orders"}` empties the table but
/// leaves its definition intact (checked by a follow-up insert
/// succeeding).
pub async fn truncate_preserves_definition<A: InsertOnlyAdapterTest>(fixture: &A, table_name: &str) {
    let cx = CancellationContext::new();
    fixture
        .data()
        .insert(&cx, table_name, &[field_map(&[("id", Field::Int(1))])])
        .await
        .expect("scenario 4 precondition insert succeeds");

    let raw = json!({"operation": "TRUNCATE", "table_name": table_name}).as_object().unwrap().clone();
    let event = parse_event(fixture.applier().backend(), &raw).expect("scenario 4 raw event parses");
    fixture.applier().apply(&cx, &event).await.expect("scenario 4 apply succeeds");

    let count = fixture.data().get_row_count(&cx, table_name, "").await.unwrap();
    assert_eq!(count, 0);

    fixture
        .data()
        .insert(&cx, table_name, &[field_map(&[("id", Field::Int(2))])])
        .await
        .expect("table definition survives truncate");
}

/// Scenario 5 (spec §8): "Polling diff (graph, no native CDC)." Starts
/// replication, then drives insert/update/delete against the watched
/// label/table through the fixture's own `data()` operator and asserts the
/// callback receives exactly Insert, then Update (`old_data.id==1`,
/// `data.name=="a"`), then Delete (`old_data.name=="a"`), in that order.
pub async fn polling_diff_emits_insert_update_delete<A: CrudAdapterTest>(fixture: &A, table_name: &str) {
    let cx = CancellationContext::new();
    let mut events = fixture.start_replication().await;

    fixture
        .data()
        .insert(&cx, table_name, &[field_map(&[("id", Field::Int(1))])])
        .await
        .unwrap();
    let first = events.recv().await.expect("insert event observed");
    assert_eq!(first.operation, Operation::Insert);

    fixture
        .data()
        .update(
            &cx,
            table_name,
            &field_map(&[("name", Field::String("a".to_string()))]),
            &field_map(&[("id", Field::Int(1))]),
        )
        .await
        .unwrap();
    let second = events.recv().await.expect("update event observed");
    assert_eq!(second.operation, Operation::Update);
    assert_eq!(second.old_data.get("id"), Some(&Field::Int(1)));
    assert_eq!(second.data.get("name"), Some(&Field::String("a".to_string())));

    fixture
        .data()
        .delete(&cx, table_name, &field_map(&[("id", Field::Int(1))]))
        .await
        .unwrap();
    let third = events.recv().await.expect("delete event observed");
    assert_eq!(third.operation, Operation::Delete);
    assert_eq!(third.old_data.get("name"), Some(&Field::String("a".to_string())));
}
