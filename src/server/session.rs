//! Encrypted cookie sessions.
//!
//! A cookie value is `base64url(nonce || ciphertext)`, where the ciphertext is the AES-256-GCM
//! encryption of `{"expires_at": <unix seconds>, "value": ...}` with the cookie name as associated
//! data. A value sealed for one cookie cannot be replayed under another name, and nothing in it
//! can be read or changed without the secret.

use crate::error::Res;
use crate::model::Profile;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, ensure, Context};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Holds the signed-in user's `Profile`.
pub const SESSION_COOKIE: &str = "default_session";

/// Holds the `Flow` between `/login` and `/oauth2callback`.
pub const FLOW_COOKIE: &str = "oauth_flow";

pub const SESSION_MAX_AGE: Duration = Duration::from_secs(3 * 60 * 60);
pub const FLOW_MAX_AGE: Duration = Duration::from_secs(10 * 60);

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Creates a new random cookie secret, hex encoded.
pub fn generate_secret() -> String {
    hex::encode(Aes256Gcm::generate_key(OsRng))
}

/// What we remember while the browser is away at Google's consent page.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub state: String,
    pub redirect: String,
}

#[derive(Serialize, Deserialize)]
struct Sealed<T> {
    expires_at: i64,
    value: T,
}

/// Seals values into cookies and opens them again.
#[derive(Clone)]
pub struct SessionHandler {
    cipher: Aes256Gcm,
    secure: bool,
}

impl std::fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler")
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionHandler {
    /// `secret` must be 32 bytes, hex encoded. When `secure` is set, cookies are only sent over
    /// HTTPS.
    pub fn from_hex(secret: &str, secure: bool) -> Res<Self> {
        let key = hex::decode(secret.trim()).context("The cookie secret is not valid hex")?;
        ensure!(
            key.len() == KEY_LEN,
            "The cookie secret must be {KEY_LEN} bytes ({} hex characters) but it is {} bytes. \
            Generate one with 'cash keygen'",
            KEY_LEN * 2,
            key.len()
        );
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| anyhow!("Invalid cookie secret: {e}"))?;
        Ok(Self { cipher, secure })
    }

    /// Encrypts `value` for the cookie `name`. It stops being readable after `max_age`.
    pub fn seal<T: Serialize>(&self, name: &str, value: &T, max_age: Duration) -> Res<String> {
        let sealed = Sealed {
            expires_at: Utc::now().timestamp() + max_age.as_secs() as i64,
            value,
        };
        let plaintext = serde_json::to_vec(&sealed).context("Unable to serialize the cookie")?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| anyhow!("Unable to encrypt the cookie: {e}"))?;
        let mut out = nonce.to_vec();
        out.extend(ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypts a value sealed for the cookie `name`. Returns `None` if it was tampered with, was
    /// sealed for another cookie or has expired.
    pub fn open<T: DeserializeOwned>(&self, name: &str, sealed: &str) -> Option<T> {
        let bytes = URL_SAFE_NO_PAD.decode(sealed).ok()?;
        if bytes.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .ok()?;
        let sealed: Sealed<T> = serde_json::from_slice(&plaintext).ok()?;
        if sealed.expires_at <= Utc::now().timestamp() {
            trace!("The {name} cookie has expired");
            return None;
        }
        Some(sealed.value)
    }

    /// A `Set-Cookie` header value that stores `value` in the cookie `name`.
    pub fn set_cookie<T: Serialize>(&self, name: &str, value: &T, max_age: Duration) -> Res<String> {
        let sealed = self.seal(name, value, max_age)?;
        Ok(self.cookie(name, &sealed, max_age.as_secs()))
    }

    /// A `Set-Cookie` header value that removes the cookie `name`.
    pub fn clear_cookie(&self, name: &str) -> String {
        self.cookie(name, "", 0)
    }

    /// Opens the cookie `name` from the request headers.
    pub fn read<T: DeserializeOwned>(&self, headers: &HeaderMap, name: &str) -> Option<T> {
        self.open(name, cookie_value(headers, name)?)
    }

    /// The signed-in user, if there is a valid session.
    pub fn profile_from_session(&self, headers: &HeaderMap) -> Option<Profile> {
        self.read(headers, SESSION_COOKIE)
    }

    pub fn save_profile(&self, profile: &Profile) -> Res<String> {
        self.set_cookie(SESSION_COOKIE, profile, SESSION_MAX_AGE)
    }

    fn cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
    }
}

/// Finds the value of the cookie `name` in the `Cookie` request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}
