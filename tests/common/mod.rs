#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storekeep_api::{
    config::AppConfig,
    db,
    entities::{product, product_variant, store, vendor, warehouse},
    events,
    handlers::{
        common::{STORE_HEADER, USER_HEADER},
        AppServices,
    },
    services::{collaborators::Collaborators, listings::PlatformRegistry},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Application state on a private in-memory SQLite database, seeded with one
/// store, warehouse, vendor and product variant.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store_id: Uuid,
    pub user_id: Uuid,
    pub warehouse_id: Uuid,
    pub vendor_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(Collaborators::default(), PlatformRegistry::new()).await
    }

    pub async fn with_platforms(platforms: PlatformRegistry) -> Self {
        Self::build(Collaborators::default(), platforms).await
    }

    pub async fn with_collaborators(collaborators: Collaborators) -> Self {
        Self::build(collaborators, PlatformRegistry::new()).await
    }

    async fn build(collaborators: Collaborators, platforms: PlatformRegistry) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            &cfg,
            collaborators,
            Arc::new(platforms),
        );
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let mut app = Self {
            router: storekeep_api::app(state.clone()),
            state,
            store_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: Uuid::new_v4(),
            _event_task: event_task,
        };
        app.seed().await;
        app
    }

    async fn seed(&mut self) {
        let db = self.state.db.as_ref();
        let now = Utc::now();

        store::ActiveModel {
            id: Set(self.store_id),
            name: Set("Main Street Pawn".to_string()),
            code: Set(format!("MSP-{}", &self.store_id.simple().to_string()[..6])),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed store");

        warehouse::ActiveModel {
            id: Set(self.warehouse_id),
            store_id: Set(self.store_id),
            name: Set("Back room".to_string()),
            code: Set("BACK".to_string()),
            is_active: Set(true),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed warehouse");

        vendor::ActiveModel {
            id: Set(self.vendor_id),
            store_id: Set(self.store_id),
            name: Set("Gold Supply Co".to_string()),
            email: Set(Some("orders@goldsupply.test".to_string())),
            phone: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed vendor");

        self.add_product("Gold chain", self.product_id, self.variant_id)
            .await;
    }

    /// Adds a product with a single variant to the seeded store.
    pub async fn add_product(&self, title: &str, product_id: Uuid, variant_id: Uuid) {
        let db = self.state.db.as_ref();
        let now = Utc::now();
        product::ActiveModel {
            id: Set(product_id),
            store_id: Set(self.store_id),
            category_id: Set(None),
            title: Set(title.to_string()),
            description: Set(None),
            price: Set(Decimal::new(250, 0)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed product");

        product_variant::ActiveModel {
            id: Set(variant_id),
            product_id: Set(product_id),
            sku: Set(format!("V-{}", &variant_id.simple().to_string()[..8])),
            title: Set(format!("{} / default", title)),
            price: Set(Decimal::new(250, 0)),
            cost: Set(Decimal::new(20, 0)),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed variant");
    }

    /// Sends a request with the seeded tenant headers and returns the status
    /// and decoded JSON body (`Value::Null` for an empty body).
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(STORE_HEADER, self.store_id.to_string())
            .header(USER_HEADER, self.user_id.to_string());
        self.send(request, body).await
    }

    /// Sends a request without tenant headers.
    pub async fn anonymous(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        self.send(request, None).await
    }

    async fn send(&self, request: axum::http::request::Builder, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
