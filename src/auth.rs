//! OAuth authorization-code flow and token refresh.
//!
//! [`AuthManager`] talks to the accounts service: it builds the user-facing
//! authorization URL and exchanges codes and refresh tokens for grants.
//! [`OAuthTokenProvider`] wraps it together with a shared session to
//! implement [`TokenProvider`] for the API client, collapsing overlapping
//! refresh calls into a single in-flight grant request.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};

use crate::r#trait::TokenProvider;
use crate::types::{AuthConfig, SpotifySession, TokenGrant};
use crate::{api, headers, Result, SorterError};

/// Scopes requested during authorization.
///
/// Covers playlist reads and writes plus the library endpoints backing the
/// liked-songs pseudo playlist.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-library-read",
    "user-library-modify",
];

/// Handles the OAuth dance against the accounts service.
#[derive(Clone)]
pub struct AuthManager {
    client: Arc<dyn HttpClient + Send + Sync>,
    config: AuthConfig,
}

impl AuthManager {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, config: AuthConfig) -> Self {
        Self {
            client: Arc::from(client),
            config,
        }
    }

    /// The URL the user opens in a browser to authorize the application.
    ///
    /// `state` is echoed back on the redirect and should be checked by the
    /// caller before exchanging the code.
    pub fn authorize_url(&self, state: &str) -> String {
        let scope = SCOPES.join(" ");
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.config.accounts_base_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        log::debug!("Exchanging authorization code for tokens");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    /// Mints a new access token from a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        log::debug!("Refreshing access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let url = format!("{}/api/token", self.config.accounts_base_url);
        let mut request = Request::new(Method::Post, url.parse::<Url>().unwrap());
        headers::add_token_request_headers(
            &mut request,
            &self.config.client_id,
            &self.config.client_secret,
        );

        let body = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        request.set_body(body);

        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| SorterError::Http(e.to_string()))?;

        let status: u16 = response.status().into();
        let body = response
            .body_string()
            .await
            .map_err(|e| SorterError::Http(e.to_string()))?;

        if status == 200 {
            api::parse_token_grant(&body)
        } else {
            let message = api::parse_auth_error_message(&body)
                .unwrap_or_else(|| format!("token endpoint returned status {status}"));
            Err(SorterError::Auth(message))
        }
    }
}

type SharedRefresh = Shared<LocalBoxFuture<'static, std::result::Result<TokenGrant, String>>>;

/// [`TokenProvider`] backed by the OAuth refresh flow.
///
/// The session lives behind a shared mutex so every clone observes token
/// updates, and a successful refresh folds the new grant into it. Callers
/// that hit `refresh` while a grant request is already running join that
/// request instead of starting another one.
#[derive(Clone)]
pub struct OAuthTokenProvider {
    auth: AuthManager,
    session: Arc<Mutex<SpotifySession>>,
    inflight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl OAuthTokenProvider {
    pub fn new(auth: AuthManager, session: SpotifySession) -> Self {
        Self {
            auth,
            session: Arc::new(Mutex::new(session)),
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    /// Snapshot of the current session, for persistence after refreshes.
    pub fn session(&self) -> SpotifySession {
        self.session.lock().unwrap().clone()
    }

    fn start_refresh(&self) -> SharedRefresh {
        let auth = self.auth.clone();
        let session = Arc::clone(&self.session);
        let inflight = Arc::clone(&self.inflight);

        async move {
            let refresh_token = session.lock().unwrap().refresh_token.clone();

            let result = match refresh_token {
                Some(token) => auth.refresh_token(&token).await.map_err(|e| e.to_string()),
                None => Err("session has no refresh token".to_string()),
            };

            if let Ok(grant) = &result {
                session.lock().unwrap().apply_grant(grant);
            }

            // Clear the slot before resolving so later callers start a
            // fresh refresh instead of joining a finished one.
            *inflight.lock().unwrap() = None;
            result
        }
        .boxed_local()
        .shared()
    }
}

#[async_trait(?Send)]
impl TokenProvider for OAuthTokenProvider {
    /// Returns the held token, or `None` once it is past the expiry margin
    /// so callers refresh before hitting a guaranteed rejection.
    fn access_token(&self) -> Option<String> {
        let session = self.session.lock().unwrap();
        if session.access_token.is_empty() || session.is_expired() {
            None
        } else {
            Some(session.access_token.clone())
        }
    }

    async fn refresh(&self) -> Result<TokenGrant> {
        let refresh_future = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = self.start_refresh();
                    *inflight = Some(fresh.clone());
                    fresh
                }
            }
        };

        refresh_future.await.map_err(SorterError::Auth)
    }
}
