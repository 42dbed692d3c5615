//! CRUD engine behaviour over an in-memory connector.

mod common;

use common::{FakeConnector, engine, object};
use pg_crud_mcp::ErrorKind;
use pg_crud_mcp::models::{ColumnValues, Envelope, SqlValue};
use serde_json::json;
use std::sync::Arc;

fn values(value: serde_json::Value) -> ColumnValues {
    ColumnValues::from(object(value))
}

#[tokio::test]
async fn test_create_record_returns_inserted_id() {
    let connector = FakeConnector::new().with_scalar(json!(7));
    let engine = engine(&connector);

    let envelope = engine
        .create_record("users", &values(json!({"name": "Alice", "age": 30})))
        .await;

    assert_eq!(envelope, Envelope::Inserted { id: json!(7) });
    let stmt = connector.last_statement();
    assert_eq!(
        stmt.sql,
        "INSERT INTO users (name, age) VALUES ($1, $2) RETURNING id"
    );
    assert_eq!(
        stmt.params,
        vec![SqlValue::String("Alice".to_string()), SqlValue::Int(30)]
    );
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_create_record_empty_data_never_connects() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine.create_record("users", &ColumnValues::new()).await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));
    assert!(envelope.error_message().unwrap().contains("data"));
    assert_eq!(connector.connects(), 0);
    assert!(connector.statements().is_empty());
}

#[tokio::test]
async fn test_read_records_with_conditions_and_limit() {
    let connector = FakeConnector::new().with_rows(vec![
        json!({"id": 1, "name": "Alice", "age": 30}),
    ]);
    let engine = engine(&connector);
    let conditions = values(json!({"name": "Alice", "age": 30}));

    let envelope = engine
        .read_records("users", Some(&conditions), Some(10))
        .await;

    match envelope {
        Envelope::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0]["name"], "Alice");
        }
        other => panic!("expected rows, got {:?}", other),
    }
    let stmt = connector.last_statement();
    assert_eq!(
        stmt.sql,
        "SELECT * FROM users WHERE name = $1 AND age = $2 LIMIT 10"
    );
    assert_eq!(stmt.params.len(), 2);
}

#[tokio::test]
async fn test_read_records_without_conditions_and_empty_result() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine.read_records("users", None, None).await;

    assert_eq!(envelope, Envelope::Rows(Vec::new()));
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": true, "data": []})
    );
    assert_eq!(connector.last_statement().sql, "SELECT * FROM users");
}

#[tokio::test]
async fn test_update_records_numbers_where_after_set() {
    let connector = FakeConnector::new().with_status("UPDATE 1");
    let engine = engine(&connector);

    let envelope = engine
        .update_records(
            "users",
            &values(json!({"age": 31})),
            &values(json!({"id": 1})),
        )
        .await;

    assert_eq!(envelope, Envelope::Status("UPDATE 1".to_string()));
    let stmt = connector.last_statement();
    assert_eq!(stmt.sql, "UPDATE users SET age = $1 WHERE id = $2");
    assert_eq!(stmt.params, vec![SqlValue::Int(31), SqlValue::Int(1)]);
}

#[tokio::test]
async fn test_update_records_requires_conditions() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine
        .update_records("users", &values(json!({"age": 31})), &ColumnValues::new())
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));
    assert!(envelope.error_message().unwrap().contains("conditions"));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_delete_records_reports_status() {
    let connector = FakeConnector::new().with_status("DELETE 2");
    let engine = engine(&connector);

    let envelope = engine
        .delete_records("sessions", &values(json!({"user_id": 5})))
        .await;

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": true, "message": "DELETE 2"})
    );
    assert_eq!(
        connector.last_statement().sql,
        "DELETE FROM sessions WHERE user_id = $1"
    );
}

#[tokio::test]
async fn test_delete_records_empty_conditions_rejected() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine.delete_records("users", &ColumnValues::new()).await;

    assert!(!envelope.is_success());
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_injected_table_name_rejected_before_connect() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine
        .read_records("users; DROP TABLE users", None, None)
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_injected_column_name_rejected_before_connect() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine
        .create_record("users", &values(json!({"name) VALUES ('x'); --": 1})))
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));
    assert!(connector.statements().is_empty());
}

#[tokio::test]
async fn test_connect_failure_is_connection_failure() {
    let connector = FakeConnector::new().failing_connect("connection refused");
    let engine = engine(&connector);

    let envelope = engine.list_tables().await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::ConnectionFailure));
    assert!(envelope.error_message().unwrap().contains("connection refused"));
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn test_execution_failure_still_releases_connection() {
    let connector =
        FakeConnector::new().failing_execute("relation \"nope\" does not exist");
    let engine = engine(&connector);

    let envelope = engine.read_records("nope", None, None).await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::ExecutionFailure));
    assert!(envelope.error_message().unwrap().contains("does not exist"));
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["success"], false);
}

#[tokio::test]
async fn test_list_tables_maps_names() {
    let connector = FakeConnector::new().with_rows(vec![
        json!({"table_name": "lighthouse"}),
        json!({"table_name": "users"}),
    ]);
    let engine = engine(&connector);

    let envelope = engine.list_tables().await;

    assert_eq!(
        envelope,
        Envelope::Tables(vec!["lighthouse".to_string(), "users".to_string()])
    );
    assert!(connector.last_statement().sql.contains("information_schema.tables"));
}

#[tokio::test]
async fn test_describe_table_binds_name_and_maps_columns() {
    let connector = FakeConnector::new().with_rows(vec![
        json!({
            "column_name": "id",
            "data_type": "integer",
            "is_nullable": "NO",
            "column_default": "nextval('users_id_seq'::regclass)"
        }),
        json!({
            "column_name": "name",
            "data_type": "text",
            "is_nullable": "YES",
            "column_default": null
        }),
    ]);
    let engine = engine(&connector);

    let envelope = engine.describe_table("users").await;

    match &envelope {
        Envelope::Columns { table, columns } => {
            assert_eq!(table, "users");
            assert_eq!(columns.len(), 2);
            assert_eq!(columns[1].column_name, "name");
            assert!(columns[1].column_default.is_none());
        }
        other => panic!("expected columns, got {:?}", other),
    }
    let stmt = connector.last_statement();
    assert!(stmt.sql.contains("information_schema.columns"));
    assert_eq!(
        stmt.params,
        vec![
            SqlValue::String("public".to_string()),
            SqlValue::String("users".to_string())
        ]
    );
}

#[tokio::test]
async fn test_describe_table_qualified_name_splits_schema() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine.describe_table("audit.events").await;

    assert_eq!(
        envelope,
        Envelope::Columns {
            table: "audit.events".to_string(),
            columns: Vec::new(),
        }
    );
    assert_eq!(
        connector.last_statement().params,
        vec![
            SqlValue::String("audit".to_string()),
            SqlValue::String("events".to_string())
        ]
    );
}

#[tokio::test]
async fn test_read_records_limit_beyond_bigint_never_connects() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine
        .read_records("users", None, Some(i64::MAX as u64 + 1))
        .await;

    assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));
    assert!(envelope.error_message().unwrap().contains("limit"));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_latest_value_on_empty_table_is_null() {
    let connector = FakeConnector::new();
    let engine = engine(&connector);

    let envelope = engine
        .latest_value("lighthouse", "base_site", "calculated_time")
        .await;

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": true, "base_site": null})
    );
    assert_eq!(
        connector.last_statement().sql,
        "SELECT base_site FROM lighthouse ORDER BY calculated_time DESC LIMIT 1"
    );
}

#[tokio::test]
async fn test_latest_value_returns_first_row_value() {
    let connector = FakeConnector::new().with_rows(vec![json!({"base_site": "north"})]);
    let engine = engine(&connector);

    let envelope = engine
        .latest_value("lighthouse", "base_site", "calculated_time")
        .await;

    assert_eq!(
        envelope,
        Envelope::Latest {
            column: "base_site".to_string(),
            value: Some(json!("north")),
        }
    );
}

#[tokio::test]
async fn test_concurrent_operations_release_every_connection() {
    let connector = FakeConnector::new().with_rows(vec![json!({"id": 1})]);
    let engine = Arc::new(engine(&connector));

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let conditions = ColumnValues::new().with("id", i as i64);
            engine.read_records("users", Some(&conditions), None).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }

    assert_eq!(connector.connects(), 16);
    assert_eq!(connector.closes(), 16);
    assert_eq!(connector.statements().len(), 16);
}
