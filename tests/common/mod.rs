#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use retail_api::{
    config::AppConfig,
    db,
    entities::{customer, product},
    events::{self, EventSender},
    services::{
        customers::CreateCustomerInput, products::CreateProductInput, AppServices,
    },
    AppState,
};

/// Helper harness for spinning up an application state backed by a
/// file-based SQLite database (a `sqlite::memory:` pool would give every
/// pooled connection its own empty database).
pub struct TestApp {
    pub state: AppState,
    router: Router,
    db_path: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_path =
            std::env::temp_dir().join(format!("retail_api_test_{}.db", Uuid::new_v4()));

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // SQLite serializes writers at the connection; one connection keeps
        // concurrent commits strictly ordered without "database is locked"
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), None)
            .expect("failed to build services");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", retail_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            state,
            router,
            db_path,
            _event_task: event_task,
        }
    }

    /// Seed one catalog product.
    pub async fn seed_product(
        &self,
        code: &str,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        self.state
            .services
            .products
            .create_product(CreateProductInput {
                code: code.to_string(),
                name: name.to_string(),
                price,
                stock,
            })
            .await
            .expect("failed to seed product")
    }

    /// Seed one registered customer.
    pub async fn seed_customer(&self, national_id: &str, first_name: &str) -> customer::Model {
        self.state
            .services
            .customers
            .create_customer(CreateCustomerInput {
                national_id: national_id.to_string(),
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: None,
                city: None,
            })
            .await
            .expect("failed to seed customer")
    }

    /// Send one JSON request through the router and decode the response.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder
                    .body(Body::from(json.to_string()))
                    .expect("failed to build request")
            }
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response was not JSON")
        };

        (status, value)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}
