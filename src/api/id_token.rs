//! Verification of Google ID tokens (JWTs) against Google's published signing keys.

use crate::error::Res;
use crate::model::Profile;
use anyhow::{bail, Context};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// How long fetched signing keys are trusted before they are fetched again.
const KEYS_TTL: Duration = Duration::from_secs(60 * 60);

/// An unknown key id does not refetch the keys if they were fetched more recently than this.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// The claims of a Google ID token that we care about.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Builds a `Profile` from verified claims. The token must carry an email address.
pub fn profile_from_claims(claims: &Claims) -> Res<Profile> {
    let email = claims
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .context("The ID token does not contain an email address")?;
    Ok(Profile::new(
        email,
        claims.name.clone().unwrap_or_default(),
        claims.picture.clone().unwrap_or_default(),
    ))
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies ID tokens. Signing keys are fetched lazily and cached. A token signed with a key we
/// have not seen triggers a refetch, which picks up Google's key rotation, at most once per
/// `MIN_REFETCH_INTERVAL`.
pub struct IdTokenVerifier {
    certs_url: String,
    audience: Option<String>,
    issuers: Vec<String>,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
    min_refetch_interval: Duration,
}

impl IdTokenVerifier {
    /// `audience` is the OAuth client id that tokens must be issued to. When it is `None` the
    /// audience is not checked.
    pub fn new(
        certs_url: impl Into<String>,
        audience: Option<String>,
        issuers: Vec<String>,
    ) -> Self {
        Self {
            certs_url: certs_url.into(),
            audience: audience.filter(|a| !a.is_empty()),
            issuers,
            http: reqwest::Client::new(),
            cache: RwLock::new(None),
            min_refetch_interval: MIN_REFETCH_INTERVAL,
        }
    }

    /// Checks the signature, expiry, issuer and audience of `token` and returns its claims.
    pub async fn verify(&self, token: &str) -> Res<Claims> {
        let header = jsonwebtoken::decode_header(token).context("The ID token is malformed")?;
        match header.alg {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {}
            other => bail!("unexpected signing method: {other:?}"),
        }
        let kid = header.kid.context("The ID token has no key id")?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        if !self.issuers.is_empty() {
            validation.set_issuer(self.issuers.as_slice());
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)
            .context("The ID token failed verification")?;
        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: &str) -> Res<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < KEYS_TTL {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return DecodingKey::from_jwk(jwk).context("Unusable signing key");
                    }
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < KEYS_TTL {
                // Another request may have refetched while we waited for the lock.
                if let Some(jwk) = cached.keys.find(kid) {
                    return DecodingKey::from_jwk(jwk).context("Unusable signing key");
                }
                if age < self.min_refetch_interval {
                    bail!("No signing key found for key id '{kid}'");
                }
            }
        }
        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .context("Unusable signing key")?;
        *cache = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.with_context(|| format!("No signing key found for key id '{kid}'"))
    }

    async fn fetch_keys(&self) -> Res<JwkSet> {
        debug!("Fetching signing keys from {}", self.certs_url);
        let response = self
            .http
            .get(&self.certs_url)
            .send()
            .await
            .context("Failed to fetch the signing keys")?;
        if !response.status().is_success() {
            bail!(
                "Fetching the signing keys failed with status {}",
                response.status()
            );
        }
        response
            .json::<JwkSet>()
            .await
            .context("Unable to parse the signing keys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{good_claims, jwks, sign, TEST_CLIENT_ID, TEST_ISSUER};
    use httpmock::prelude::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    fn verifier(server: &MockServer) -> IdTokenVerifier {
        IdTokenVerifier::new(
            server.url("/certs"),
            Some(TEST_CLIENT_ID.to_string()),
            vec!["accounts.google.com".to_string(), TEST_ISSUER.to_string()],
        )
    }

    #[tokio::test]
    async fn test_verify_good_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200).json_body(jwks());
            })
            .await;
        let verifier = verifier(&server);

        let token = sign(good_claims(), Some("test-kid"));
        let claims = verifier.verify(&token).await.unwrap();
        assert_eq!(claims.email.as_deref(), Some("pat@example.com"));
        let profile = profile_from_claims(&claims).unwrap();
        assert_eq!(
            profile,
            Profile::new("pat@example.com", "Pat Example", "https://example.com/pat.png")
        );

        // The keys are cached.
        verifier.verify(&token).await.unwrap();
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200).json_body(jwks());
            })
            .await;
        let mut verifier = verifier(&server);
        verifier.min_refetch_interval = Duration::ZERO;
        verifier
            .verify(&sign(good_claims(), Some("test-kid")))
            .await
            .unwrap();

        let err = verifier
            .verify(&sign(good_claims(), Some("rotated-kid")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rotated-kid"), "{err}");
        mock.assert_calls_async(2).await;
    }

    #[tokio::test]
    async fn test_unknown_kid_refetch_is_throttled() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200).json_body(jwks());
            })
            .await;
        let verifier = verifier(&server);
        verifier
            .verify(&sign(good_claims(), Some("test-kid")))
            .await
            .unwrap();

        // A burst of tokens with made-up key ids does not reach the certs endpoint.
        for kid in ["rotated-kid", "bogus-1", "bogus-2"] {
            let err = verifier
                .verify(&sign(good_claims(), Some(kid)))
                .await
                .unwrap_err();
            assert!(err.to_string().contains(kid), "{err}");
        }
        verifier
            .verify(&sign(good_claims(), Some("test-kid")))
            .await
            .unwrap();
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_rejected_tokens() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certs");
                then.status(200).json_body(jwks());
            })
            .await;
        let verifier = verifier(&server);

        let mut claims = good_claims();
        claims["aud"] = json!("someone-else");
        assert!(verifier.verify(&sign(claims, Some("test-kid"))).await.is_err());

        let mut claims = good_claims();
        claims["iss"] = json!("https://evil.example.com");
        assert!(verifier.verify(&sign(claims, Some("test-kid"))).await.is_err());

        let mut claims = good_claims();
        claims["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(verifier.verify(&sign(claims, Some("test-kid"))).await.is_err());

        let err = verifier
            .verify(&sign(good_claims(), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no key id"), "{err}");

        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_hmac_tokens_are_rejected() {
        let server = MockServer::start_async().await;
        let verifier = verifier(&server);
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-kid".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &good_claims(),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("unexpected signing method"), "{err}");
    }

    #[test]
    fn test_profile_requires_email() {
        let claims = Claims {
            name: Some("No Email".to_string()),
            ..Default::default()
        };
        assert!(profile_from_claims(&claims).is_err());
        let claims = Claims {
            email: Some("a@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            profile_from_claims(&claims).unwrap(),
            Profile::new("a@example.com", "", "")
        );
    }
}
