//! Router login and session token cache
//!
//! The router's web API hands out a session token ("stok") after a
//! challenge-response login:
//! 1. GET the login page and scrape `deviceId` and the nonce `key` from it
//! 2. Build a nonce `0_<deviceId>_<unix time>_<random 1000..10000>`
//! 3. Send `sha1(nonce + sha1(password + key))` as the password
//! 4. Read `"token":"..."` out of the login response
//!
//! Tokens are reused for a fixed window measured from issuance. A failed
//! login leaves the cache as it was, and the next call starts again from
//! step 1.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::config::{RouterConfig, RouterPassword};
use crate::transport::RouterTransport;

const LOGIN_USERNAME: &str = "admin";
const LOGIN_TYPE: &str = "2";

static DEVICE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var deviceId = '(.*?)'").unwrap());
static NONCE_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"key: '(.*?)',").unwrap());
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""token":"(.*?)""#).unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Router login page unavailable: {0}")]
    PageUnavailable(String),

    #[error("Could not find {0} on the router login page")]
    ParseError(&'static str),

    #[error("Router login failed: {0}")]
    LoginRejected(String),

    #[error("Router login response carried no token")]
    TokenMissing,
}

/// Router session token. Only ever passed to the device lister.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for embedding in request URLs
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Values scraped from the login page for one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginChallenge {
    pub device_id: String,
    pub nonce_key: String,
}

/// Extract the device id and nonce key from the login page HTML
pub fn parse_login_page(page: &str) -> Result<LoginChallenge, AuthError> {
    let device_id = capture(&DEVICE_ID_PATTERN, page).ok_or(AuthError::ParseError("deviceId"))?;
    let nonce_key = capture(&NONCE_KEY_PATTERN, page).ok_or(AuthError::ParseError("key"))?;

    Ok(LoginChallenge {
        device_id: device_id.to_string(),
        nonce_key: nonce_key.to_string(),
    })
}

/// Extract the session token from the login response body
pub fn parse_login_response(body: &str) -> Result<SessionToken, AuthError> {
    capture(&TOKEN_PATTERN, body)
        .map(SessionToken::new)
        .ok_or(AuthError::TokenMissing)
}

fn capture<'a>(pattern: &Regex, text: &'a str) -> Option<&'a str> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

/// Build a fresh login nonce
pub fn generate_nonce<R: Rng>(device_id: &str, unix_time: i64, rng: &mut R) -> String {
    format!("0_{}_{}_{}", device_id, unix_time, rng.gen_range(1000..10000))
}

/// Compute the password field for the login request.
///
/// Both digests are lowercase hex and the second one hashes the hex text of
/// the first, not its raw bytes.
pub fn hash_credential(password: &str, nonce_key: &str, nonce: &str) -> String {
    let inner = hex::encode(Sha1::digest(format!("{}{}", password, nonce_key).as_bytes()));
    hex::encode(Sha1::digest(format!("{}{}", nonce, inner).as_bytes()))
}

struct CachedToken {
    token: SessionToken,
    issued_at: DateTime<Utc>,
}

/// Logs in to the router and caches the resulting session token
pub struct Authenticator {
    transport: Arc<dyn RouterTransport>,
    clock: Arc<dyn Clock>,
    base_url: String,
    password: RouterPassword,
    ttl: chrono::Duration,
    // Held across the whole login so concurrent callers wait for one login
    cache: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(config: &RouterConfig, transport: Arc<dyn RouterTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            base_url: config.base_url(),
            password: config.password.clone(),
            ttl: to_chrono(config.token_ttl()),
            cache: Mutex::new(None),
        }
    }

    /// Return a valid session token, logging in only if the cached one has expired
    pub async fn get_token(&self) -> Result<SessionToken, AuthError> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();

        if let Some(cached) = cache.as_ref() {
            // A clock that went backwards also expires the token
            let age = now - cached.issued_at;
            if age >= chrono::Duration::zero() && age < self.ttl {
                tracing::debug!("Using cached router token");
                return Ok(cached.token.clone());
            }
            tracing::debug!("Cached router token expired, logging in again");
        }

        let token = self.login(now).await?;
        *cache = Some(CachedToken {
            token: token.clone(),
            issued_at: self.clock.now(),
        });
        Ok(token)
    }

    /// Drop the cached token so the next call logs in again
    pub async fn invalidate(&self) {
        if self.cache.lock().await.take().is_some() {
            tracing::debug!("Router token invalidated");
        }
    }

    async fn login(&self, now: DateTime<Utc>) -> Result<SessionToken, AuthError> {
        let page = self
            .transport
            .get(&format!("{}/web", self.base_url))
            .await
            .map_err(|e| AuthError::PageUnavailable(e.to_string()))?;
        if !page.is_ok() {
            return Err(AuthError::PageUnavailable(format!("HTTP {}", page.status)));
        }

        let challenge = parse_login_page(&page.body)?;
        let nonce = generate_nonce(&challenge.device_id, now.timestamp(), &mut rand::thread_rng());
        let credential = hash_credential(self.password.expose(), &challenge.nonce_key, &nonce);

        let resp = self
            .transport
            .post_form(
                &format!("{}/api/xqsystem/login", self.base_url),
                &[
                    ("username", LOGIN_USERNAME),
                    ("password", credential.as_str()),
                    ("logtype", LOGIN_TYPE),
                    ("nonce", nonce.as_str()),
                ],
            )
            .await
            .map_err(|e| AuthError::LoginRejected(e.to_string()))?;
        if !resp.is_ok() {
            return Err(AuthError::LoginRejected(format!("HTTP {}", resp.status)));
        }

        let token = parse_login_response(&resp.body)?;
        tracing::info!("Logged in to router at {}", self.base_url);
        Ok(token)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
