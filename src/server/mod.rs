//! The web server: Google sign-in, encrypted cookie sessions and a small JSON API over the
//! signed-in user's Plaid accounts.

mod api;
mod error;
pub(crate) mod session;
mod signin;

use crate::api::{GoogleOAuth, IdTokenVerifier, PlaidClient};
use crate::error::Res;
use crate::storage::{self, Storage};
use crate::Config;
use anyhow::Context;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{status, AppError, AppResult};
pub use session::{generate_secret, Flow, SessionHandler};

use crate::model::Profile;

/// Everything the handlers share. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub(crate) sessions: Arc<SessionHandler>,
    pub(crate) oauth: Arc<GoogleOAuth>,
    pub(crate) verifier: Arc<IdTokenVerifier>,
    pub(crate) plaid: Arc<PlaidClient>,
    pub(crate) storage: Arc<dyn Storage>,
}

impl AppState {
    /// Builds the state from `config`, opening the configured storage.
    pub async fn new(config: &Config) -> Res<Self> {
        let storage = storage::open(config).await?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: &Config, storage: Arc<dyn Storage>) -> Res<Self> {
        let server = config.server();
        let google = config.google();
        let sessions = SessionHandler::from_hex(&server.cookie_secret, server.secure_cookies)
            .context("Invalid server.cookie_secret in the config file")?;
        let oauth = GoogleOAuth::new(google, &server.oauth_callback_url)?;
        let verifier = IdTokenVerifier::new(
            google.certs_url.clone(),
            Some(google.client_id.clone()),
            google.issuers.clone(),
        );
        Ok(Self {
            sessions: Arc::new(sessions),
            oauth: Arc::new(oauth),
            verifier: Arc::new(verifier),
            plaid: Arc::new(config.plaid().client()),
            storage,
        })
    }
}

/// The signed-in user. Handlers that take it reject requests without a valid session with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Profile);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        state
            .sessions
            .profile_from_session(&parts.headers)
            .map(CurrentUser)
            .ok_or_else(AppError::unauthorized)
    }
}

/// All routes, with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(signin::landing))
        .route("/login", get(signin::login))
        .route("/oauth2callback", get(signin::callback))
        .route("/logout", get(signin::logout))
        .route("/api/jwt", post(signin::jwt))
        .route("/api/me", get(api::me))
        .route("/api/transactions", get(api::transactions))
        .route("/api/accounts", get(api::accounts))
        .route("/api/accounts/add", post(api::add_account))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(config: &Config) -> Res<()> {
    let state = AppState::new(config).await?;
    let addr = &config.server().listen_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;
    info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The server failed")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test::TestEnv;
    use axum::body::Body;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    /// A router backed by `MemoryStorage`, plus the storage and session handler so tests can look
    /// behind the curtain.
    pub(crate) struct TestServer {
        pub(crate) env: TestEnv,
        pub(crate) state: AppState,
        pub(crate) storage: Arc<MemoryStorage>,
    }

    impl TestServer {
        pub(crate) async fn new(env: TestEnv) -> Self {
            let storage = Arc::new(MemoryStorage::default());
            let state = AppState::with_storage(&env.config(), storage.clone()).unwrap();
            Self {
                env,
                state,
                storage,
            }
        }

        pub(crate) async fn send(&self, request: Request<Body>) -> Response {
            router(self.state.clone()).oneshot(request).await.unwrap()
        }

        /// A `Cookie` header value for a signed-in `profile`.
        pub(crate) fn session_cookie(&self, profile: &Profile) -> String {
            let set = self.state.sessions.save_profile(profile).unwrap();
            set.split(';').next().unwrap().to_string()
        }

        pub(crate) fn get(&self, uri: &str, cookie: Option<&str>) -> Request<Body> {
            let mut builder = Request::get(uri);
            if let Some(c) = cookie {
                builder = builder.header(COOKIE, c);
            }
            builder.body(Body::empty()).unwrap()
        }

        pub(crate) fn post(&self, uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
            let mut builder = Request::post(uri).header("content-type", "application/json");
            if let Some(c) = cookie {
                builder = builder.header(COOKIE, c);
            }
            builder.body(Body::from(body.to_string())).unwrap()
        }
    }

    pub(crate) fn pat() -> Profile {
        Profile::new("pat@example.com", "Pat Example", "https://example.com/pat.png")
    }

    pub(crate) async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        let server = TestServer::new(TestEnv::new().await).await;
        for uri in ["/api/me", "/api/transactions", "/api/accounts"] {
            let response = server.send(server.get(uri, None)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(
                json_body(response).await,
                serde_json::json!({"error": "Not authorized"})
            );
        }
        let response = server
            .send(server.post("/api/accounts/add", None, "{}"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = server
            .send(server.get("/api/me", Some("default_session=forged")))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_cookie_secret() {
        let mut env = TestEnv::new().await;
        env.edit(|f| f.server.cookie_secret = "abcd".to_string()).await;
        let result = AppState::with_storage(&env.config(), Arc::new(MemoryStorage::default()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = TestServer::new(TestEnv::new().await).await;
        let response = server.send(server.get("/nope", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
