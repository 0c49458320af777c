//! Shared setup for the HTTP-level tests.
//!
//! Builds an application around in-memory stores (or a flat-file account
//! store in a temporary directory) with cheap hashing parameters, and wraps
//! the router in small request helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use gameauth_common::TokenResponse;
use gameauth_lib::{
    auth::{DefaultAuth, Stores},
    config::{HashingSettings, Settings},
    create_admin_router, create_router, AppState,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret123";
pub const DEFAULT_IP: &str = "10.0.0.1";
pub const DEFAULT_AGENT: &str = "game-client/1.0";

/// Valid settings with cheap hashing and generous store timeouts
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.jwt.secret = "integration-secret-0123456789abcdef".to_string();
    settings.hashing = HashingSettings {
        memory_kib: 8,
        time_cost: 1,
        parallelism: 1,
        output_len: 32,
        salt_len: 16,
    };
    settings.timeouts.store_ms = 1_000;
    settings.timeouts.reporting_ms = 1_000;
    settings.rate_limit.max_requests = 1_000;
    // Attempts in flight count against the address, and tests log in in bursts
    settings.guard.max_attempts = 20;
    settings
}

/// A response with its body already collected
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn value(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn collect(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
    TestResponse { status, headers, body }
}

/// Public and admin routers plus the stores behind them
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub admin: Router,
    pub state: AppState,
    pub stores: Stores,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_stores(settings, Stores::in_memory())
    }

    pub fn with_stores(settings: Settings, stores: Stores) -> Self {
        let auth = DefaultAuth::new(&settings, stores.clone()).unwrap();
        let state = AppState::new(Arc::new(auth), settings);
        Self {
            router: create_router(state.clone()),
            admin: create_admin_router(state.clone()),
            state,
            stores,
        }
    }

    /// Send a request from the default client
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.send_from(DEFAULT_IP, DEFAULT_AGENT, method, uri, token, body).await
    }

    pub async fn send_from(
        &self,
        ip: &str,
        user_agent: &str,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip)
            .header(header::USER_AGENT, user_agent);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        collect(&self.router, request).await
    }

    /// Send a request to the admin listener
    pub async fn send_admin(&self, method: Method, uri: &str) -> TestResponse {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        collect(&self.admin, request).await
    }

    pub async fn register(&self, email: &str, username: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": email, "username": username, "password": PASSWORD})),
        )
        .await
    }

    pub async fn login(&self, login: &str, password: &str) -> TestResponse {
        self.send(Method::POST, "/auth/login", None, Some(json!({"email": login, "password": password})))
            .await
    }

    /// Register an account and log it in once
    pub async fn signup(&self, email: &str, username: &str) -> TokenResponse {
        assert_eq!(self.register(email, username).await.status, StatusCode::CREATED);
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        response.json()
    }

    pub async fn refresh(&self, refresh_token: &str) -> TestResponse {
        self.send(Method::POST, "/auth/refresh", None, Some(json!({"refreshToken": refresh_token})))
            .await
    }

    pub async fn me(&self, token: &str) -> TestResponse {
        self.send(Method::GET, "/auth/me", Some(token), None).await
    }
}
