use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};

use outbreak_server::build_app;
use outbreak_server::config::{AuthFileConfig, SchedulerConfig, ServerConfig};
use outbreak_server::state::AppState;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth and no background tickers.
    pub async fn new() -> Self {
        Self::from_config(quiet_config()).await
    }

    /// Start a test server whose admin routes require `token`.
    pub async fn with_admin_token(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                admin_token: Some(token.to_string()),
            },
            ..quiet_config()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            client: reqwest::Client::new(),
            _shutdown: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Join and return the response body. Panics unless the server answers 201.
    pub async fn join(&self, username: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/v1/players"))
            .json(&json!({ "username": username }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "join {username} failed");
        resp.json().await.unwrap()
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn state(&self) -> Value {
        self.client
            .get(self.url("/api/v1/state"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

/// Fixed seed, scheduler off: tests drive ticks explicitly.
pub fn quiet_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        scheduler: SchedulerConfig {
            enabled: false,
            ..SchedulerConfig::default()
        },
        seed: Some(7),
        ..ServerConfig::default()
    }
}
