#![cfg(feature = "server")]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::init_tracing;
use daga_server::bootstrap::{generate_group, GroupMaterial};
use daga_server::client::{verify_challenge_signatures, verify_tag_signatures};
use daga_server::coordinator::{
    AuthenticateRequest, AuthenticationResult, ChallengeGrant, ErrorBody,
};
use daga_server::server::{build_node, router, AppState, RateLimitSettings, ServerConfig};
use daga_server::{AuthenticationContext, ErrorKind, RandomShares, SecureRng};
use reqwest::StatusCode;
use tokio::net::TcpListener;

struct HttpCluster {
    group: GroupMaterial,
    context: AuthenticationContext,
    urls: Vec<String>,
    states: Vec<AppState>,
    http: reqwest::Client,
}

impl HttpCluster {
    async fn start(clients: usize, servers: usize) -> Self {
        Self::start_with_limit(clients, servers, ServerConfig::default().rate_limit).await
    }

    async fn start_with_limit(
        clients: usize,
        servers: usize,
        rate_limit: RateLimitSettings,
    ) -> Self {
        let group = generate_group(clients, servers, &mut SecureRng::new()).unwrap();
        let context = group.context().unwrap();

        let mut listeners = Vec::new();
        for _ in 0..servers {
            listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let urls: Vec<String> = listeners
            .iter()
            .map(|l| format!("http://{}", l.local_addr().unwrap()))
            .collect();

        let config = ServerConfig {
            peers: urls.clone(),
            rpc_timeout_ms: 5_000,
            rate_limit,
            ..ServerConfig::default()
        };

        let mut states = Vec::new();
        for (j, listener) in listeners.into_iter().enumerate() {
            let state = build_node(
                &config,
                context.clone(),
                group.server_secret(j).unwrap(),
                Arc::new(RandomShares),
            )
            .unwrap();
            states.push(state.clone());
            let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
            tokio::spawn(async move { axum::serve(listener, app).await });
        }

        Self {
            group,
            context,
            urls,
            states,
            http: reqwest::Client::new(),
        }
    }

    async fn post(
        &self,
        server: usize,
        path: &str,
        body: &impl serde::Serialize,
    ) -> reqwest::Response {
        self.http
            .post(format!("{}{path}", self.urls[server]))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn cluster_authenticates_over_http() {
    init_tracing();
    let cluster = HttpCluster::start(3, 3).await;
    let client = cluster.group.client_secret(1).unwrap();
    let pending = client.begin(&cluster.context, &mut SecureRng::new()).unwrap();

    let response = cluster.post(1, "/request_challenge", pending.client_data()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let grant: ChallengeGrant = response.json().await.unwrap();
    verify_challenge_signatures(
        &cluster.context,
        grant.auth_id.as_str(),
        &grant.challenge,
        &grant.sigs,
    )
    .unwrap();

    let request = AuthenticateRequest {
        auth_id: grant.auth_id.clone(),
        response: pending.respond(&grant.challenge),
        bind: "over-http".to_string(),
    };
    let response = cluster.post(1, "/authenticate", &request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: AuthenticationResult = response.json().await.unwrap();
    verify_tag_signatures(
        &cluster.context,
        &result.tag,
        "over-http",
        &result.tag_sigs,
        &result.binding_sigs,
    )
    .unwrap();

    for state in &cluster.states {
        assert!(state.service().store().is_bound(&result.tag).await);
    }

    let health: serde_json::Value = cluster
        .http
        .get(format!("{}/health", cluster.urls[0]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["bindings"], 1);
}

#[tokio::test]
async fn unknown_session_is_404_with_error_body() {
    let cluster = HttpCluster::start(1, 2).await;
    let client = cluster.group.client_secret(0).unwrap();
    let pending = client.begin(&cluster.context, &mut SecureRng::new()).unwrap();

    let request = AuthenticateRequest {
        auth_id: "missing".into(),
        response: pending.respond(&daga_server::Scalar::ONE),
        bind: String::new(),
    };
    let response = cluster.post(0, "/authenticate", &request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::UnknownSession);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let cluster = HttpCluster::start(1, 1).await;

    let response = cluster
        .post(0, "/request_challenge", &serde_json::json!({ "uuid": "nope" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::InvalidRequest);

    let response = cluster
        .post(0, "/internal/no_such_operation", &serde_json::json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forged_response_is_unauthorized() {
    let cluster = HttpCluster::start(1, 2).await;
    let client = cluster.group.client_secret(0).unwrap();
    let pending = client.begin(&cluster.context, &mut SecureRng::new()).unwrap();

    let grant: ChallengeGrant = cluster
        .post(0, "/request_challenge", pending.client_data())
        .await
        .json()
        .await
        .unwrap();

    let request = AuthenticateRequest {
        auth_id: grant.auth_id,
        response: pending.respond(&(grant.challenge + daga_server::Scalar::ONE)),
        bind: String::new(),
    };
    let response = cluster.post(0, "/authenticate", &request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, ErrorKind::AuthenticationFailed);
}

#[tokio::test]
async fn client_routes_are_rate_limited_per_address() {
    let cluster = HttpCluster::start_with_limit(
        1,
        1,
        RateLimitSettings {
            requests_per_minute: 1,
            burst: 2,
        },
    )
    .await;
    let body = serde_json::json!({});

    for _ in 0..2 {
        let response = cluster.post(0, "/request_challenge", &body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let response = cluster.post(0, "/request_challenge", &body).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let error: ErrorBody = response.json().await.unwrap();
    assert_eq!(error.error, ErrorKind::RateLimited);

    // Peer routes are not limited.
    let response = cluster
        .post(0, "/internal/finish_challenge_generation", &serde_json::json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cluster.states[0].rate_limiter.tracked_clients().await, 1);
}
