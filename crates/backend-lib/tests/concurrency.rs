mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use common::{TestApp, PASSWORD};
use futures_util::future::join_all;
use gameauth_common::{SessionList, TokenResponse};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_replays_revoke_everything() {
    let app = TestApp::new();
    let tokens = app.signup("race@example.com", "racer").await;

    let attempts = (0..8).map(|_| {
        let app = app.clone();
        let refresh_token = tokens.refresh_token.clone();
        tokio::spawn(async move { app.refresh(&refresh_token).await })
    });
    let responses: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    let winners: Vec<TokenResponse> = responses
        .iter()
        .filter(|r| r.status == StatusCode::OK)
        .map(|r| r.json())
        .collect();
    assert!(winners.len() <= 1, "more than one refresh succeeded");
    assert!(responses
        .iter()
        .all(|r| r.status == StatusCode::OK || r.status == StatusCode::UNAUTHORIZED));

    // Every replay counts as reuse, so nothing issued in the race survives
    assert_eq!(app.me(&tokens.access_token).await.status, StatusCode::UNAUTHORIZED);
    for winner in &winners {
        assert_eq!(app.me(&winner.access_token).await.status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.refresh(&winner.refresh_token).await.status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refreshes_of_different_sessions_do_not_interfere() {
    let app = TestApp::new();
    let first = app.signup("pair@example.com", "pair").await;
    let others: Vec<TokenResponse> = join_all((0..4).map(|_| app.login("pair@example.com", PASSWORD)))
        .await
        .into_iter()
        .map(|r| r.json())
        .collect();

    let refreshes = others.iter().map(|tokens| {
        let app = app.clone();
        let refresh_token = tokens.refresh_token.clone();
        tokio::spawn(async move { app.refresh(&refresh_token).await.status })
    });
    for status in join_all(refreshes).await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }
    assert_eq!(app.me(&first.access_token).await.status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_open_distinct_sessions() {
    let app = TestApp::new();
    let first = app.signup("crowd@example.com", "crowd").await;

    let logins = (0..6).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { app.login("crowd@example.com", PASSWORD).await })
    });
    let responses = join_all(logins).await;

    let mut access_tokens = HashSet::new();
    for response in responses {
        let response = response.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        let tokens: TokenResponse = response.json();
        assert!(access_tokens.insert(tokens.access_token));
    }

    let list: SessionList = app
        .send(axum::http::Method::GET, "/auth/sessions", Some(&first.access_token), None)
        .await
        .json();
    assert_eq!(list.total, 7);
}
