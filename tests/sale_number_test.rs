mod common;

use chrono::Utc;
use common::TestApp;
use rust_decimal_macros::dec;
use std::collections::HashSet;

use retail_api::services::sales::{CartLine, CommitSaleInput, CustomerPolicy};

fn unit_cart(product_id: uuid::Uuid) -> CommitSaleInput {
    CommitSaleInput {
        customer_key: "11111111-1".to_string(),
        customer_policy: CustomerPolicy::WalkIn,
        lines: vec![CartLine {
            product_id,
            quantity: 1,
            unit_price: dec!(10.00),
        }],
    }
}

#[tokio::test]
async fn numbers_are_date_prefixed_and_sequential() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(10.00), 100).await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let committed = app
            .state
            .services
            .sales
            .commit_sale(unit_cart(product.id))
            .await
            .unwrap();
        numbers.push(committed.sale.number);
    }

    let prefix = Utc::now().date_naive().format("%Y%m%d").to_string();
    assert_eq!(numbers[0], format!("{prefix}-0001"));
    assert_eq!(numbers[1], format!("{prefix}-0002"));
    assert_eq!(numbers[2], format!("{prefix}-0003"));
}

#[tokio::test]
async fn numbers_never_repeat() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(10.00), 100).await;

    let mut seen = HashSet::new();
    for _ in 0..25 {
        let committed = app
            .state
            .services
            .sales
            .commit_sale(unit_cart(product.id))
            .await
            .unwrap();
        assert!(
            seen.insert(committed.sale.number.clone()),
            "duplicate sale number {}",
            committed.sale.number
        );
    }
}

#[tokio::test]
async fn sale_date_matches_the_number_prefix() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(10.00), 100).await;

    let committed = app
        .state
        .services
        .sales
        .commit_sale(unit_cart(product.id))
        .await
        .unwrap();

    let expected_prefix = committed.sale.sale_date.format("%Y%m%d").to_string();
    assert!(
        committed.sale.number.starts_with(&format!("{expected_prefix}-")),
        "number {} does not carry the sale date prefix",
        committed.sale.number
    );
}
