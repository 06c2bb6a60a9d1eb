use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mirror::error::MirrorResult;
use mirror::reader::{ReadTableOpt, Reader, RelationshipOpt, SortOpt, SqlEngine, SqlReader};
use mirror::types::{quote_identifier, Cell, Row, TableRow};
use mirror_config::Spec;
use mirror_telemetry::init_test_tracing;
use tokio::sync::mpsc;

/// A canned dialect engine: queries are matched by substring and answered
/// from fixed row sets, and every query is recorded.
#[derive(Default)]
struct StubEngine {
    columns: HashMap<String, Vec<String>>,
    results: Vec<(String, Vec<Row>)>,
    views: Vec<String>,
    view_bodies: HashMap<String, String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StubEngine {
    fn with_columns(mut self, table: &str, columns: &[&str]) -> Self {
        self.columns
            .insert(table.to_owned(), columns.iter().map(|c| c.to_string()).collect());
        self
    }

    fn with_result(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.results.push((needle.to_owned(), rows));
        self
    }

    fn with_view(mut self, name: &str, body: &str) -> Self {
        self.views.push(name.to_owned());
        self.view_bodies.insert(name.to_owned(), body.to_owned());
        self
    }

    fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl SqlEngine for StubEngine {
    async fn fetch_tables(&self) -> MirrorResult<Vec<String>> {
        Ok(self.columns.keys().cloned().collect())
    }

    async fn fetch_views(&self) -> MirrorResult<Vec<String>> {
        Ok(self.views.clone())
    }

    async fn fetch_columns(&self, table: &str) -> MirrorResult<Vec<String>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn fetch_structure(&self) -> MirrorResult<String> {
        Ok("# stub structure\n".to_owned())
    }

    async fn fetch_view_body(&self, view: &str) -> MirrorResult<String> {
        Ok(self.view_bodies.get(view).cloned().unwrap_or_default())
    }

    async fn preamble(&self) -> MirrorResult<String> {
        Ok("# stub dump\n".to_owned())
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }

    async fn stream_rows(&self, sql: &str, out: mpsc::Sender<Row>) -> MirrorResult<()> {
        self.queries.lock().unwrap().push(sql.to_owned());

        let rows = self
            .results
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();

        for row in rows {
            if out.send(row).await.is_err() {
                break;
            }
        }

        Ok(())
    }

    async fn close(&self) -> MirrorResult<()> {
        Ok(())
    }
}

async fn read_all(reader: &SqlReader<StubEngine>, table: &str, opts: ReadTableOpt) -> Vec<TableRow> {
    let (tx, mut rx) = mpsc::channel(1);

    let (result, rows) = tokio::join!(reader.read_table(table, tx, opts), async move {
        let mut rows = Vec::new();
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }
        rows
    });
    result.unwrap();

    rows
}

fn order_row(id: i64, user_id: Cell) -> Row {
    Row::from_pairs([("id", Cell::I64(id)), ("user_id", user_id)])
}

fn user_row(id: i64, name: &str) -> Row {
    Row::from_pairs([("id", Cell::I64(id)), ("name", Cell::String(name.to_owned()))])
}

fn relationship() -> RelationshipOpt {
    RelationshipOpt {
        foreign_key: "user_id".to_owned(),
        referenced_table: "users".to_owned(),
        referenced_key: "id".to_owned(),
    }
}

#[tokio::test]
async fn test_referenced_rows_come_before_their_parent() {
    init_test_tracing();

    let engine = StubEngine::default()
        .with_columns("orders", &["id", "user_id"])
        .with_columns("users", &["id", "name"])
        .with_result(
            "FROM `orders`",
            vec![order_row(7, Cell::I64(3)), order_row(8, Cell::I64(4))],
        )
        .with_result("FROM `users` WHERE `id` = 3", vec![user_row(3, "ada")])
        .with_result("FROM `users` WHERE `id` = 4", vec![user_row(4, "grace")]);

    let reader = SqlReader::new(engine);
    let opts = ReadTableOpt {
        relationships: vec![relationship()],
        ..Default::default()
    };

    let rows = read_all(&reader, "orders", opts).await;
    let stream: Vec<(String, i64)> = rows
        .iter()
        .map(|item| {
            let id = match item.row.get("id") {
                Some(Cell::I64(id)) => *id,
                other => panic!("unexpected id cell {other:?}"),
            };
            (item.table.clone(), id)
        })
        .collect();

    // Each order's referenced user comes directly before it, with no other
    // order in between.
    assert_eq!(
        stream,
        vec![
            ("users".to_owned(), 3),
            ("orders".to_owned(), 7),
            ("users".to_owned(), 4),
            ("orders".to_owned(), 8),
        ]
    );
}

#[tokio::test]
async fn test_null_foreign_key_skips_expansion() {
    init_test_tracing();

    let engine = StubEngine::default()
        .with_columns("orders", &["id", "user_id"])
        .with_columns("users", &["id", "name"])
        .with_result("FROM `orders`", vec![order_row(7, Cell::Null)]);
    let queries = engine.queries();

    let reader = SqlReader::new(engine);
    let opts = ReadTableOpt {
        relationships: vec![relationship()],
        ..Default::default()
    };

    let rows = read_all(&reader, "orders", opts).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].table, "orders");

    let queries = queries.lock().unwrap();
    assert!(queries.iter().all(|sql| !sql.contains("FROM `users`")));
}

#[tokio::test]
async fn test_missing_referenced_table_is_fatal() {
    init_test_tracing();

    let engine = StubEngine::default()
        .with_columns("orders", &["id", "user_id"])
        .with_result("FROM `orders`", vec![order_row(7, Cell::I64(3))]);

    let reader = SqlReader::new(engine);
    let opts = ReadTableOpt {
        relationships: vec![RelationshipOpt {
            foreign_key: "user_id".to_owned(),
            referenced_table: "ghosts".to_owned(),
            referenced_key: "id".to_owned(),
        }],
        ..Default::default()
    };

    let (tx, mut rx) = mpsc::channel(1);
    let (result, _) = tokio::join!(reader.read_table("orders", tx, opts), async move {
        while rx.recv().await.is_some() {}
    });

    assert!(result.is_err());
}

#[tokio::test]
async fn test_projection_filter_sort_and_limit_in_query() {
    init_test_tracing();

    let engine = StubEngine::default().with_columns("users", &["id", "email"]);
    let queries = engine.queries();

    let reader = SqlReader::new(engine);
    let opts = ReadTableOpt {
        match_sql: Some("deleted_at IS NULL".to_owned()),
        sorts: vec![SortOpt {
            column: "id".to_owned(),
            descending: false,
        }],
        limit: Some(10),
        ..Default::default()
    };

    read_all(&reader, "users", opts).await;

    let queries = queries.lock().unwrap();
    assert_eq!(
        queries[0],
        "SELECT `users`.`id`, `users`.`email` FROM `users` \
         WHERE deleted_at IS NULL ORDER BY `id` ASC LIMIT 10"
    );
}

#[tokio::test]
async fn test_views_are_ordered_by_weight() {
    init_test_tracing();

    // Discovery order is a then b; weights flip the output order.
    let engine = StubEngine::default()
        .with_view("a", "select * from `t1`")
        .with_view("b", "select * from `t2`");

    let reader = SqlReader::new(engine);

    let mut spec = Spec::default();
    spec.views.insert("b".to_owned(), 1);
    spec.views.insert("a".to_owned(), 2);

    let sql = reader.get_view_definitions(&spec).await.unwrap();
    let b_position = sql.find("VIEW `b`").unwrap();
    let a_position = sql.find("VIEW `a`").unwrap();
    assert!(b_position < a_position);
    assert!(sql.contains("CREATE OR REPLACE VIEW `b` AS select * from `t2`;"));
}

#[tokio::test]
async fn test_unweighted_views_keep_discovery_order() {
    init_test_tracing();

    let engine = StubEngine::default()
        .with_view("first", "select 1")
        .with_view("second", "select 2");

    let reader = SqlReader::new(engine);
    let sql = reader.get_view_definitions(&Spec::default()).await.unwrap();

    let first_position = sql.find("VIEW `first`").unwrap();
    let second_position = sql.find("VIEW `second`").unwrap();
    assert!(first_position < second_position);
}
