#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use harvest_api::{config::AppConfig, db, entities::RecordStatus, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Helper harness for spinning up the application against a throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`], with a hook to adjust configuration first.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("harvest_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = harvest_api::app_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON response body.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse response body")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn batch(&self, operations: Value) -> (StatusCode, Value) {
        self.post(
            "/api/v1/descriptions/batch",
            json!({ "operations": operations }),
        )
        .await
    }

    /// Creates a category and returns its id.
    pub async fn seed_category(&self, name: &str) -> String {
        let (status, body) = self
            .post("/api/v1/categories", json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed category: {body}");
        body["data"]["id"].as_str().expect("category id").to_string()
    }

    /// Creates a description and returns its id.
    pub async fn seed_description(
        &self,
        category_id: &str,
        text: &str,
        parent_id: Option<&str>,
    ) -> String {
        let mut payload = json!({
            "description": text,
            "categoryId": category_id,
            "userId": "tester",
        });
        if let Some(parent_id) = parent_id {
            payload["parentId"] = json!(parent_id);
        }
        let (status, body) = self.post("/api/v1/descriptions", payload).await;
        assert_eq!(status, StatusCode::CREATED, "seed description: {body}");
        body["data"]["id"].as_str().expect("description id").to_string()
    }

    /// Status of a description as stored, bypassing the API.
    pub async fn description_status(&self, id: &str) -> RecordStatus {
        use harvest_api::entities::description;
        use sea_orm::EntityTrait;

        description::Entity::find_by_id(id.to_string())
            .one(&*self.state.db)
            .await
            .expect("query description")
            .expect("description exists")
            .status
    }

    /// Number of stored descriptions, in any status.
    pub async fn description_count(&self) -> u64 {
        use harvest_api::entities::description;
        use sea_orm::{EntityTrait, PaginatorTrait};

        description::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count descriptions")
    }
}
