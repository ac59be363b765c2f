//! The OAuth 2.0 authorization code flow used for "Sign in with Google".
//!
//! The web server sends the browser to Google's consent page with `authorize_url`. Google then
//! redirects back to the callback with a code, which `exchange` trades for an access token. The
//! access token is only used once, to fetch the user's profile from the userinfo endpoint.

use crate::config::GoogleConfig;
use crate::error::Res;
use crate::model::Profile;
use anyhow::{anyhow, bail, Context};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

const SIGN_IN_SCOPES: &[&str] = &["openid", "email", "profile"];

type Client = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// A Google OAuth web client.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    client: Client,
    userinfo_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth {
    /// Builds the client from the `google` section of the config. `callback_url` is where Google
    /// redirects the browser after consent.
    pub fn new(google: &GoogleConfig, callback_url: &str) -> Res<Self> {
        let client = BasicClient::new(ClientId::new(google.client_id.clone()))
            .set_client_secret(ClientSecret::new(google.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(google.auth_url.clone()).context("Invalid auth_url")?)
            .set_token_uri(TokenUrl::new(google.token_url.clone()).context("Invalid token_url")?)
            .set_redirect_uri(
                RedirectUrl::new(callback_url.to_string())
                    .context("Invalid oauth_callback_url")?,
            );

        // The token and userinfo endpoints are never followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Unable to build the HTTP client")?;

        Ok(Self {
            client,
            userinfo_url: google.userinfo_url.clone(),
            http,
        })
    }

    /// The consent page URL. `state` comes back unchanged in the callback.
    pub fn authorize_url(&self, state: &str) -> Url {
        let state = state.to_string();
        let mut request = self.client.authorize_url(move || CsrfToken::new(state));
        for scope in SIGN_IN_SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (url, _) = request
            .add_extra_param("access_type", "online")
            .add_extra_param("prompt", "consent")
            .url();
        url
    }

    /// Trades an authorization code for an access token.
    pub async fn exchange(&self, code: &str) -> Res<String> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| anyhow!("The authorization code exchange failed: {e}"))?;
        Ok(token.access_token().secret().to_string())
    }

    /// Fetches the signed-in user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Res<Profile> {
        debug!("Fetching the user profile from {}", self.userinfo_url);
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send the userinfo request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The userinfo request failed with status {status}: {body}");
        }

        let info: UserInfo = response
            .json()
            .await
            .context("Failed to parse the userinfo response")?;
        if info.email.is_empty() {
            bail!("Google did not return an email address for this user");
        }
        Ok(Profile::new(info.email, info.name, info.picture))
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}
