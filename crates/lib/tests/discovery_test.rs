//! # Discovery and Schema Context Tests

mod common;

use common::{column, customers_table, hit, orders_table, setup_tracing, ScriptedTools};
use memento::{
    context::SchemaContextBuilder, discovery::TableDiscovery, types::TableDocument, AgentConfig,
};

#[tokio::test]
async fn test_discover_dedupes_orders_and_truncates() {
    setup_tracing();
    let tools = ScriptedTools::new(vec![
        hit(orders_table(), 0.5),
        hit(customers_table(), 0.7),
        hit(orders_table(), 0.9),
        hit(
            TableDocument {
                table_name: "products".to_string(),
                table_display_name: String::new(),
                table_desc: "Product list.".to_string(),
                table_domain: String::new(),
                is_dimension: true,
                columns: vec![],
                hierarchy: vec!["category".to_string(), "product".to_string()],
            },
            0.1,
        ),
    ]);
    let discovery = TableDiscovery::new(Box::new(tools));

    let tables = discovery.discover("orders by customer", 2).await.unwrap();

    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "customers"]);
    assert_eq!(tables[0].relevance_score, 0.9);
}

#[tokio::test]
async fn test_descriptions_carry_readable_column_hints() {
    setup_tracing();
    let tools = ScriptedTools::new(vec![hit(orders_table(), 0.9)]);
    let discovery = TableDiscovery::new(Box::new(tools));

    let tables = discovery.discover("orders", 5).await.unwrap();

    let description = &tables[0].description;
    assert!(description.starts_with("One row per customer order"));
    assert!(description.contains("Domain: sales."));
    assert!(description.contains("`customer_name` over `customer_id`"));
    assert_eq!(tables[0].sample_values["customer_name"], vec!["Acme", "Globex"]);
}

#[tokio::test]
async fn test_empty_discovery_is_not_an_error() {
    setup_tracing();
    let discovery = TableDiscovery::new(Box::new(ScriptedTools::new(vec![])));
    assert!(discovery.discover("anything", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_context_preserves_relevance_order_and_caps_samples() {
    setup_tracing();
    let mut wide = customers_table();
    wide.columns.push(column(
        "city",
        "TEXT",
        &["Haifa", "Tel Aviv", "Eilat", "Jerusalem", "Beersheba", "Nazareth", "Acre"],
    ));
    let tools = ScriptedTools::new(vec![hit(orders_table(), 0.6), hit(wide, 0.8)]);
    let discovery = TableDiscovery::new(Box::new(tools));
    let tables = discovery.discover("customers", 5).await.unwrap();

    let context = SchemaContextBuilder::from_config(&AgentConfig::default()).build(tables);

    assert_eq!(context.table_names(), vec!["customers", "orders"]);
    assert_eq!(context.tables()[0].sample_values["city"].len(), 5);
    let rendered = context.render();
    assert!(rendered.find("## Table `customers`") < rendered.find("## Table `orders`"));
}
