//! # Lake Store and Catalog Tests
//!
//! Exercises the turso-backed tools against an in-memory database.

mod common;

use common::{customers_table, orders_table, setup_tracing};
use memento::{
    errors::AgentError,
    providers::db::{catalog::CatalogStore, lake::LakeStore},
    tools::{LakeTools, RunLimits, ToolPort},
};
use serde_json::json;
use std::time::Duration;

const FIXTURE: &str = "
CREATE TABLE orders (order_id INTEGER PRIMARY KEY, customer_id INTEGER, customer_name TEXT, revenue REAL);
INSERT INTO orders VALUES (1, 7, 'Acme', 120.5);
INSERT INTO orders VALUES (2, 3, 'Globex', 980.25);
INSERT INTO orders VALUES (3, 7, 'Acme', 60.0);
INSERT INTO orders VALUES (4, 5, 'Initech', 300.0);
";

async fn setup() -> anyhow::Result<(LakeStore, CatalogStore)> {
    setup_tracing();
    let db = turso::Builder::new_local(":memory:").build().await?;
    let lake = LakeStore::new(db.clone());
    lake.execute_batch(FIXTURE).await?;
    let catalog = CatalogStore::new(db, None);
    catalog.initialize_schema().await?;
    Ok((lake, catalog))
}

fn limits(row_cap: usize) -> RunLimits {
    RunLimits {
        row_cap,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_run_caps_rows_and_flags_truncation() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;

    let result = lake
        .run("SELECT order_id FROM orders ORDER BY order_id", limits(2))
        .await?;
    assert_eq!(result.columns, vec!["order_id"]);
    assert_eq!(result.rows, vec![vec![json!(1)], vec![json!(2)]]);
    assert!(result.truncated);

    let result = lake
        .run("SELECT order_id FROM orders ORDER BY order_id", limits(4))
        .await?;
    assert_eq!(result.rows.len(), 4);
    assert!(!result.truncated);
    Ok(())
}

#[tokio::test]
async fn test_run_aggregates_against_real_rows() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;

    let result = lake
        .run(
            "SELECT customer_id, SUM(revenue) AS total FROM orders GROUP BY customer_id ORDER BY total DESC LIMIT 10",
            limits(500),
        )
        .await?;
    assert_eq!(result.columns, vec!["customer_id", "total"]);
    assert_eq!(result.rows[0], vec![json!(3), json!(980.25)]);
    assert_eq!(result.rows.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_writes_are_refused_by_both_tools() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;

    let report = lake.check("DELETE FROM orders").await?;
    assert!(!report.ok);

    let err = lake.run("DROP TABLE orders", limits(10)).await.unwrap_err();
    assert!(matches!(err, AgentError::NotReadOnly(_)));

    let still_there = lake.run("SELECT COUNT(*) FROM orders", limits(10)).await?;
    assert_eq!(still_there.rows[0][0], json!(4));
    Ok(())
}

#[tokio::test]
async fn test_semicolon_inside_a_literal_is_not_a_second_statement() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;
    let query = "SELECT order_id FROM orders WHERE customer_name <> 'a;b' ORDER BY order_id LIMIT 5";

    let report = lake.check(query).await?;
    assert!(report.ok, "{:?}", report.message);

    let result = lake.run(query, limits(10)).await?;
    assert_eq!(result.rows.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_check_compiles_without_running() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;

    assert!(lake.check("SELECT revenue FROM orders").await?.ok);
    let report = lake.check("SELECT nope FROM orders").await?;
    assert!(!report.ok);
    assert!(report.message.is_some());
    Ok(())
}

#[tokio::test]
async fn test_describe_tables_excludes_the_catalog() -> anyhow::Result<()> {
    let (lake, _) = setup().await?;

    assert_eq!(lake.list_tables().await?, vec!["orders"]);
    let documents = lake.describe_tables(2).await?;
    assert_eq!(documents.len(), 1);
    let names: Vec<_> = documents[0]
        .columns
        .iter()
        .map(|c| c.col_name.as_str())
        .collect();
    assert_eq!(names, vec!["order_id", "customer_id", "customer_name", "revenue"]);
    assert!(documents[0].columns.iter().all(|c| c.sample_values.len() <= 2));
    Ok(())
}

#[tokio::test]
async fn test_catalog_ingest_is_idempotent_and_searchable() -> anyhow::Result<()> {
    let (lake, catalog) = setup().await?;

    let report = catalog.ingest(&[orders_table(), customers_table()]).await?;
    assert_eq!(report.tables_processed, 2);
    assert_eq!(report.documents_embedded, 0);

    let mut updated = orders_table();
    updated.table_desc = "Customer orders with revenue in shekels.".to_string();
    catalog.ingest(&[updated]).await?;

    let listed = catalog.list().await?;
    assert_eq!(listed.len(), 2);
    assert!(listed
        .iter()
        .any(|t| t.table_desc == "Customer orders with revenue in shekels."));

    let tools = LakeTools::new(catalog.clone(), lake, 10);
    let hits = tools.table_searcher("revenue per customer").await?;
    assert_eq!(hits[0].table.table_name, "orders");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let none = tools.table_searcher("spaceships").await?;
    assert!(none.is_empty());

    // Only stopwords: nothing to match on, so no table is offered.
    let vague = tools.table_searcher("what do we have?").await?;
    assert!(vague.is_empty(), "{vague:?}");

    assert!(catalog.remove("customers").await?);
    assert!(!catalog.remove("customers").await?);
    assert_eq!(catalog.list().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_ingest_rejects_unnamed_tables() -> anyhow::Result<()> {
    let (_, catalog) = setup().await?;
    let mut unnamed = orders_table();
    unnamed.table_name = "  ".to_string();

    let err = catalog.ingest(&[unnamed]).await.unwrap_err();
    assert!(matches!(err, AgentError::Catalog(_)));
    Ok(())
}
