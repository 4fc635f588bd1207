mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

/// Money fields serialize as JSON strings; SQLite's numeric affinity may
/// drop trailing zeros, so compare them as decimals rather than text.
fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal field must be a JSON string")
        .parse()
        .expect("decimal field must parse")
}

#[tokio::test]
async fn product_crud_over_http() {
    let app = TestApp::new().await;

    let (status, created) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "code": "KB-01",
                "name": "Keyboard",
                "price": "49.90",
                "stock": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["code"], "KB-01");
    assert_eq!(created["stock"], 10);
    let id = created["id"].as_str().expect("id").to_string();

    let (status, fetched) = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Keyboard");

    let (status, by_code) = app
        .request(Method::GET, "/api/v1/products/by-code/KB-01", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_code["id"], created["id"]);

    // Duplicate code is a conflict
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({"code": "KB-01", "name": "Other", "price": "1.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listed) = app
        .request(Method::GET, "/api/v1/products?page=1&per_page=10", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["pagination"]["total"], 1);

    // Unreferenced product deletes cleanly
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn projection_exposes_the_read_model_shape() {
    let app = TestApp::new().await;
    app.seed_product("KB-01", "Keyboard", dec!(49.90), 10).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/products/projections", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let first = &body.as_array().expect("array")[0];
    for key in ["id", "code", "name", "price", "stock"] {
        assert!(first.get(key).is_some(), "projection missing field {key}");
    }
}

#[tokio::test]
async fn commit_sale_over_http_ignores_caller_total() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(49.90), 10).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customer_national_id": "11111111-1",
                "customer_policy": "walk_in",
                "lines": [
                    {"product_id": product.id, "quantity": 2, "unit_price": "49.90"}
                ],
                // Bogus caller total: discarded silently, recomputed server-side
                "total": "0.01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal_field(&body["total"]), dec!(99.80));
    assert_eq!(decimal_field(&body["lines"][0]["subtotal"]), dec!(99.80));

    let number = body["number"].as_str().expect("number");
    let (status, by_number) = app
        .request(
            Method::GET,
            &format!("/api/v1/sales/by-number/{number}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_number["id"], body["id"]);
}

#[tokio::test]
async fn commit_sale_over_http_maps_error_statuses() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(49.90), 1).await;

    // Empty cart -> 400
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customer_national_id": "11111111-1",
                "customer_policy": "walk_in",
                "lines": []
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Strict mode with unknown customer -> 404
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customer_national_id": "99999999-9",
                "customer_policy": "strict",
                "lines": [
                    {"product_id": product.id, "quantity": 1, "unit_price": "49.90"}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Over-requested stock -> 422 with the failing line in the message
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customer_national_id": "11111111-1",
                "customer_policy": "walk_in",
                "lines": [
                    {"product_id": product.id, "quantity": 5, "unit_price": "49.90"}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = body["message"].as_str().expect("message");
    assert!(message.contains("Keyboard"));
}

#[tokio::test]
async fn product_referenced_by_a_sale_cannot_be_deleted() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(49.90), 10).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "customer_national_id": "11111111-1",
                "customer_policy": "walk_in",
                "lines": [
                    {"product_id": product.id, "quantity": 1, "unit_price": "49.90"}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", product.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().expect("message").contains("KB-01"));

    // Still present and sellable
    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/products/{}", product.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sales_history_filters_by_date_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_product("KB-01", "Keyboard", dec!(10.00), 100).await;

    for quantity in [1, 2] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/sales",
                Some(json!({
                    "customer_national_id": "11111111-1",
                    "customer_policy": "walk_in",
                    "lines": [
                        {"product_id": product.id, "quantity": quantity, "unit_price": "10.00"}
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let today = chrono::Utc::now().date_naive();
    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/sales?date={today}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(decimal_field(&body["amount_total"]), dec!(30.00));

    // A date with no sales yields an empty page and a zero grand total
    let (status, body) = app
        .request(Method::GET, "/api/v1/sales?date=1999-01-01", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);
    assert_eq!(decimal_field(&body["amount_total"]), Decimal::ZERO);

    // AI endpoints answer 503 while no API key is configured
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/ai/chat",
            Some(json!({"message": "do you sell keyboards?"})),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
