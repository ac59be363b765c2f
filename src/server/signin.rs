//! Signing in and out: the Google OAuth web flow, ID token sign-in for the single page app, and
//! the landing page.

use crate::api::profile_from_claims;
use crate::error::{ErrorType, IntoResult};
use crate::server::session::{Flow, FLOW_COOKIE, FLOW_MAX_AGE, SESSION_COOKIE};
use crate::server::{AppError, AppResult, AppState};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub(super) struct RedirectQuery {
    #[serde(default)]
    redirect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CallbackQuery {
    #[serde(default)]
    state: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct JwtRequest {
    idtoken: String,
}

/// Only paths within this site are allowed as redirect targets. An empty target means `/`.
fn validate_redirect(redirect: Option<&str>) -> AppResult<String> {
    let redirect = redirect.unwrap_or_default().trim();
    if redirect.is_empty() {
        return Ok("/".to_string());
    }
    // Browsers drop tabs and newlines inside URLs, so check what they would see.
    let seen: String = redirect
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    if redirect.chars().any(char::is_control)
        || Url::parse(&seen).is_ok()
        || seen.starts_with("//")
        || seen.contains('\\')
    {
        return Err(AppError::new(
            ErrorType::Request,
            "invalid redirect URL: URL must be relative",
        ));
    }
    Ok(redirect.to_string())
}

/// A 302 to `location` that also sets `cookies`.
fn found(location: &str, cookies: &[String]) -> AppResult<Response> {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    headers.insert(
        LOCATION,
        HeaderValue::from_str(location).context("Invalid redirect location")?,
    );
    for cookie in cookies {
        headers.append(
            SET_COOKIE,
            HeaderValue::from_str(cookie).context("Invalid cookie")?,
        );
    }
    Ok(response)
}

pub(super) async fn landing(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let body = match state.sessions.profile_from_session(&headers) {
        Some(profile) => format!(
            "<p>Signed in as {}.</p>\n<p><a href=\"/logout\">Sign out</a></p>",
            escape(if profile.display_name.is_empty() {
                &profile.email
            } else {
                &profile.display_name
            })
        ),
        None => "<p><a href=\"/login?redirect=/\">Sign in with Google</a></p>".to_string(),
    };
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>cashcoach</title></head>\n<body>\n\
         <h1>cashcoach</h1>\n{body}\n</body>\n</html>\n"
    ))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let redirect = validate_redirect(query.redirect.as_deref())?;
    if state.sessions.profile_from_session(&headers).is_some() {
        debug!("Already signed in, redirecting to {redirect}");
        return found(&redirect, &[]);
    }

    let flow = Flow {
        state: Uuid::new_v4().to_string(),
        redirect,
    };
    let cookie = state
        .sessions
        .set_cookie(FLOW_COOKIE, &flow, FLOW_MAX_AGE)
        .context("could not save the sign-in flow")?;
    let auth_url = state.oauth.authorize_url(&flow.state);
    found(auth_url.as_str(), &[cookie])
}

pub(super) async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let invalid_state = || {
        AppError::new(
            ErrorType::Request,
            "invalid state parameter. try logging in again.",
        )
    };
    let flow: Flow = state
        .sessions
        .read(&headers, FLOW_COOKIE)
        .ok_or_else(invalid_state)?;
    let matches: bool = flow
        .state
        .as_bytes()
        .ct_eq(query.state.as_bytes())
        .into();
    if !matches || query.state.is_empty() {
        return Err(invalid_state());
    }
    if query.code.is_empty() {
        return Err(AppError::new(ErrorType::Request, "missing code parameter"));
    }

    let token = state
        .oauth
        .exchange(&query.code)
        .await
        .context("could not get auth token")
        .pub_result(ErrorType::Auth)?;
    let profile = state
        .oauth
        .fetch_profile(&token)
        .await
        .context("could not fetch userinfo")
        .pub_result(ErrorType::Auth)?;
    info!("{} signed in", profile.email);

    let session = state
        .sessions
        .save_profile(&profile)
        .context("could not create session")?;
    found(
        &flow.redirect,
        &[session, state.sessions.clear_cookie(FLOW_COOKIE)],
    )
}

pub(super) async fn logout(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> AppResult<Response> {
    let redirect = validate_redirect(query.redirect.as_deref())?;
    found(&redirect, &[state.sessions.clear_cookie(SESSION_COOKIE)])
}

/// Signs in with an ID token obtained by the browser from Google, creating the person on first
/// sign-in.
pub(super) async fn jwt(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let request: JwtRequest =
        serde_json::from_slice(&body).map_err(|_| AppError::bad_request())?;

    let claims = state
        .verifier
        .verify(&request.idtoken)
        .await
        .context("bad jwt")
        .pub_result(ErrorType::Auth)?;
    let profile = profile_from_claims(&claims)
        .context("couldn't create profile")
        .pub_result(ErrorType::Auth)?;
    let session = state
        .sessions
        .save_profile(&profile)
        .context("couldn't create session")?;

    let existed = state
        .storage
        .create(&profile.email)
        .await
        .context("problem checking database")
        .pub_result(ErrorType::Storage)?;
    let message = if existed {
        "sign-in success"
    } else {
        "new person created"
    };
    info!("{}: {message}", profile.email);

    let mut response = Json(message).into_response();
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_str(&session).context("Invalid cookie")?,
    );
    Ok(response)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
