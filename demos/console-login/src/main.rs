//! Console walkthrough of an authkit session.
//!
//! Logs in with a toy authenticator, authorizes a few requests, then logs
//! out. Run twice to see the session restored from `demo-session.json`:
//!
//! ```text
//! RUST_LOG=debug cargo run -p console-login
//! cargo run -p console-login -- logout
//! ```

use async_trait::async_trait;
use authkit::prelude::*;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Accepts any username with the password `hunter2` and hands out a
/// token derived from it. Stands in for a real token endpoint.
struct DemoAuthenticator;

#[async_trait]
impl Authenticator for DemoAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Value,
    ) -> Result<SessionData, SessionError> {
        let username = credentials["username"].as_str().unwrap_or_default();
        if username.is_empty() || credentials["password"] != "hunter2" {
            return Err(SessionError::AuthenticationFailed(
                "invalid username or password".into(),
            ));
        }
        Ok([
            ("access_token", json!(format!("demo-{username}"))),
            ("username", json!(username)),
        ]
        .into_iter()
        .collect())
    }

    async fn restore(
        &self,
        data: &SessionData,
    ) -> Result<SessionData, SessionError> {
        match data.get_str("access_token") {
            Some(token) if token.starts_with("demo-") => Ok(data.clone()),
            _ => Err(SessionError::RestoreFailed("unrecognized token".into())),
        }
    }

    async fn invalidate(&self, data: &SessionData) -> Result<(), SessionError> {
        tracing::info!(user = ?data.get_str("username"), "revoking demo token");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let logout = std::env::args().nth(1).as_deref() == Some("logout");

    let kit = AuthKit::builder()
        .config(Configuration {
            document_url: "http://localhost:4200".into(),
            cross_origin_whitelist: vec!["https://api.example.com".into()],
            store_path: "demo-session.json".into(),
            ..Configuration::default()
        })
        .authenticator("demo", DemoAuthenticator)
        .authorizer(BearerAuthorizer::new())
        .build()?;

    let navigation = kit.spawn_navigation(|route: &str| {
        eprintln!("-> navigating to '{route}'");
    });

    match kit.restore().await {
        SessionState::Authenticated => eprintln!(
            "restored session for {}",
            kit.session().get("username").unwrap_or(Value::Null)
        ),
        SessionState::Unauthenticated => {
            if let Err(e) = kit
                .session()
                .authenticate("demo", &json!({ "username": "guest", "password": "nope" }))
                .await
            {
                eprintln!("first attempt rejected: {e}");
            }
            kit.session()
                .authenticate("demo", &json!({ "username": "guest", "password": "hunter2" }))
                .await?;
        }
    }

    for url in [
        "/api/profile",
        "https://api.example.com/orders",
        "https://tracker.example.net/pixel",
    ] {
        let mut request = OutgoingRequest::get(url);
        let authorized = kit.interceptor().intercept(&mut request);
        eprintln!(
            "{url:<40} authorized={authorized:<5} Authorization={:?}",
            request.header("Authorization")
        );
    }

    if logout {
        kit.session().invalidate().await;
    }

    drop(kit);
    navigation.await?;
    Ok(())
}
