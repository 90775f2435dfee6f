//! E2E test helpers for constructing the full application stack.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::api::http::routes;
use crate::app::App;
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::ports::ClockPort;
use crate::infrastructure::sqlite::test_support::temp_repositories;
use crate::infrastructure::sqlite::SqliteRepositories;
use crate::test_fixtures::geography_seeder::{seed_geography, SeededGeography};

/// A running router over a seeded store.
pub struct E2EContext {
    // Keeps the database file alive.
    _dir: TempDir,
    pub repos: SqliteRepositories,
    pub seeded: SeededGeography,
    pub router: Router,
}

impl E2EContext {
    pub async fn seeded() -> Self {
        let (dir, repos) = temp_repositories().await;
        let seeded = seed_geography(&repos).await;

        let config = EngineConfig::from_lookup(|_| None).unwrap();
        let clock: Arc<dyn ClockPort> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let app = Arc::new(App::new(
            SqliteRepositories::new(repos.pool().clone(), clock.clone()),
            config,
            clock,
        ));

        Self {
            _dir: dir,
            repos,
            seeded,
            router: routes().with_state(app),
        }
    }

    /// Send one request and decode the JSON body (`Value::Null` if empty or
    /// not JSON).
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }
}

/// Names of the items in a listing page, in order.
pub fn item_names(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
