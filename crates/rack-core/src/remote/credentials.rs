//! Anonymous identity session for the remote document store.
//!
//! Callers never see tokens: [`Credentials::bearer`] hands the adapter a valid
//! ID token, reusing the cached one, refreshing it, or signing up a fresh
//! anonymous identity, in that order.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::util::{compact_text, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const SIGN_UP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";
const REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";

#[derive(Clone, PartialEq, Eq)]
struct IdSession {
    id_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl IdSession {
    fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for IdSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("IdSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Ways of obtaining a token, tried in order until one succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Acquire {
    Cached,
    Refresh,
    SignUp,
}

const ACQUIRE_ORDER: [Acquire; 3] = [Acquire::Cached, Acquire::Refresh, Acquire::SignUp];

pub(crate) struct Credentials {
    api_key: String,
    client: Client,
    session: Mutex<Option<IdSession>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub(crate) fn new(api_key: impl Into<String>, client: Client) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::InvalidInput("API key must not be empty".to_string()));
        }
        Ok(Self {
            api_key,
            client,
            session: Mutex::new(None),
        })
    }

    /// A currently valid ID token.
    pub(crate) async fn bearer(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let mut last_error = None;

        for step in ACQUIRE_ORDER {
            let attempt = match step {
                Acquire::Cached => match session.as_ref() {
                    Some(current) if !current.is_expired() => Ok(current.clone()),
                    _ => continue,
                },
                Acquire::Refresh => match session.as_ref() {
                    Some(current) => self.refresh(&current.refresh_token).await,
                    None => continue,
                },
                Acquire::SignUp => self.sign_up().await,
            };

            match attempt {
                Ok(fresh) => {
                    let token = fresh.id_token.clone();
                    *session = Some(fresh);
                    return Ok(token);
                }
                // Without a network no other step can succeed either.
                Err(error) if error.is_connectivity() => return Err(error),
                Err(error) => {
                    tracing::warn!("Credential step {:?} failed: {}", step, error);
                    last_error = Some(error);
                }
            }
        }

        *session = None;
        Err(last_error
            .unwrap_or_else(|| Error::Auth("no credential could be obtained".to_string())))
    }

    /// Force the next [`Credentials::bearer`] call past the cached token.
    pub(crate) async fn invalidate(&self) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.expires_at = 0;
        }
    }

    async fn sign_up(&self) -> Result<IdSession> {
        tracing::debug!("Signing up anonymous identity");
        let response = self
            .client
            .post(SIGN_UP_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await?;

        let payload = read_auth_response::<SignUpResponse>(response).await?;
        payload.try_into()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IdSession> {
        tracing::debug!("Refreshing identity token");
        let response = self
            .client
            .post(REFRESH_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await?;

        let payload = read_auth_response::<RefreshResponse>(response).await?;
        payload.try_into()
    }
}

async fn read_auth_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(parse_api_error(status, &body)));
    }
    response
        .json::<T>()
        .await
        .map_err(|error| Error::Auth(format!("invalid token payload: {error}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

fn build_session(
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
) -> Result<IdSession> {
    let id_token = id_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Auth("token response did not include an id token".to_string()))?;
    let refresh_token = refresh_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            Error::Auth("token response did not include a refresh token".to_string())
        })?;
    let expires_in = expires_in
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or_else(|| Error::Auth("token response did not include expiresIn".to_string()))?;

    Ok(IdSession {
        id_token,
        refresh_token,
        expires_at: unix_timestamp_now().saturating_add(expires_in),
    })
}

impl TryFrom<SignUpResponse> for IdSession {
    type Error = Error;

    fn try_from(value: SignUpResponse) -> Result<Self> {
        build_session(value.id_token, value.refresh_token, value.expires_in)
    }
}

impl TryFrom<RefreshResponse> for IdSession {
    type Error = Error;

    fn try_from(value: RefreshResponse) -> Result<Self> {
        build_session(value.id_token, value.refresh_token, value.expires_in)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    status: Option<String>,
}

/// Render a Google API error body as a short message.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GoogleErrorBody>(body) {
        if let Some(error) = payload.error {
            if let Some(message) = error.message.or(error.status) {
                return format!("{} ({})", compact_text(&message), status.as_u16());
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
