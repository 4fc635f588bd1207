use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use retail_api::{
    errors::ServiceError,
    services::ai::{AiConfig, AiService},
    services::products::ProductProjection,
};

fn projection(name: &str) -> ProductProjection {
    ProductProjection {
        id: Uuid::new_v4(),
        code: format!("{}-01", name.to_uppercase()),
        name: name.to_string(),
        price: dec!(49.90),
        stock: 10,
    }
}

fn service_for(server: &MockServer) -> AiService {
    AiService::new(AiConfig {
        api_key: "test-key".to_string(),
        base_url: server.uri(),
        model: "test-model".to_string(),
    })
    .expect("client builds")
}

fn completion_with(content: serde_json::Value) -> serde_json::Value {
    json!({
        "choices": [
            {"message": {"role": "assistant", "content": content}}
        ]
    })
}

#[tokio::test]
async fn recommendations_parse_strict_json_replies() {
    let server = MockServer::start().await;
    let catalog = vec![projection("Keyboard"), projection("Mouse")];
    let recommended = catalog[1].id;

    let reply = json!({
        "recommendations": [
            {
                "product_id": recommended,
                "name": "Mouse",
                "reason": "Pairs with the keyboard they already bought",
                "confidence": "high"
            }
        ],
        "message": "Based on your purchases, you might like these."
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!(reply))))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let result = service
        .recommend_products(&[], &catalog, 1)
        .await
        .expect("recommendation parses");

    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].product_id, recommended);
    assert_eq!(result.recommendations[0].confidence, "high");
}

#[tokio::test]
async fn recommendations_tolerate_code_fences_around_json() {
    let server = MockServer::start().await;
    let catalog = vec![projection("Keyboard")];

    let fenced = format!(
        "Sure! Here are the picks:\n```json\n{}\n```",
        json!({
            "recommendations": [],
            "message": "Nothing stands out yet."
        })
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!(fenced))))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let result = service
        .recommend_products(&[], &catalog, 3)
        .await
        .expect("fenced JSON still parses");

    assert!(result.recommendations.is_empty());
    assert_eq!(result.message, "Nothing stands out yet.");
}

#[tokio::test]
async fn description_returns_the_generated_copy() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(json!(
            "A sturdy mechanical keyboard that turns every keystroke into a pleasure."
        ))))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let text = service
        .generate_description(&projection("Keyboard"))
        .await
        .expect("description generates");

    assert!(text.contains("keyboard"));
}

#[tokio::test]
async fn upstream_failures_surface_as_external_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .support_chat("hello", &[])
        .await
        .expect_err("5xx must fail");

    assert!(matches!(err, ServiceError::ExternalApiError(_)));
}

#[tokio::test]
async fn non_json_replies_to_recommendations_are_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_with(json!("I cannot answer in JSON, sorry."))),
        )
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .recommend_products(&[], &[], 3)
        .await
        .expect_err("prose reply must fail");

    assert!(matches!(err, ServiceError::ExternalApiError(_)));
}
