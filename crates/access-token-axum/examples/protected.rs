//! A protected API reading tokens from the Authorization header or a signed
//! cookie.
//!
//! ```text
//! curl -H 'Authorization: Bearer alice-token' localhost:3000/me
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use access_token_axum::access_token::{extract, Strategy, Verification, Verify};
use access_token_axum::{
    AccessTokenExt, AccessTokenLayer, AuthConfig, Authenticated, CookieLayer, Key,
};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn me(user: Authenticated<User>) -> Json<User> {
    Json(user.principal)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: AuthConfig = AuthConfig::builder()
        .with_dotenv()
        .with_logging_from_env()
        .build()?;

    let users: Arc<HashMap<&'static str, User>> = Arc::new(HashMap::from([(
        "alice-token",
        User {
            id: 1,
            name: "Alice".into(),
        },
    )]));

    let strategy = Strategy::builder()
        .from_request(extract::from_extractors([
            extract::from_auth_header_as_bearer_token(),
            extract::from_cookie("access_token", true),
        ])?)
        .verify(Verify::spawn(move |token| {
            let users = Arc::clone(&users);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                match users.get(token.as_str()) {
                    Some(user) => Verification::Success {
                        principal: user.clone(),
                        info: Some(json!({ "scope": "profile" })),
                    },
                    None => Verification::Rejected(Some(json!("unknown token"))),
                }
            }
        }))
        .build()?;

    let layer = AccessTokenLayer::new(strategy)
        .with_environment(config.environment)
        .with_verify_timeout(config.verify_timeout().unwrap_or(Duration::from_secs(2)));

    let app = Router::new()
        .route("/me", get(me))
        .with_access_token(layer)
        .layer(CookieLayer::signed(Key::generate()));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting server");
    axum::serve(listener, app).await?;

    Ok(())
}
