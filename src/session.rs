use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;

/// Audience Supabase stamps on tokens of signed-in users.
const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims
///
/// The subset of a Supabase access token payload this service reads.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// The user's id in `auth.users`.
    pub sub: Uuid,
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
}

/// SessionUser
///
/// The identity behind a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// SessionTokens
///
/// A token pair issued by the provider on sign-in, sign-up, code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// ActiveSession
///
/// A verified user together with the access token that proved it. Inserted into
/// request extensions by the edge guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub user: SessionUser,
    pub access_token: String,
}

/// SessionLookup
///
/// The provider's answer for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLookup {
    pub session: Option<ActiveSession>,
    /// New tokens minted during the lookup. The caller must write them back as cookies.
    pub refreshed: Option<SessionTokens>,
    /// Tokens were presented but could not be verified or renewed; the caller
    /// should clear them.
    pub expired: bool,
}

impl SessionLookup {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// SessionError
///
/// Failures talking to the session provider.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The provider answered and refused the operation (bad credentials, weak password...).
    #[error("{0}")]
    Rejected(String),
    #[error("session provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid access token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("session provider unavailable: {0}")]
    Unavailable(String),
}

impl SessionError {
    /// The message safe to show back on a form.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Rejected(message) => message.clone(),
            _ => "The authentication service is unavailable. Please try again.".to_string(),
        }
    }
}

/// PkceChallenge
///
/// Proof-key pair for flows that come back through `/auth/callback` (email
/// confirmation, password recovery). The verifier stays in a cookie on the
/// browser; only the challenge is sent to the provider.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

// 1. SessionProvider Contract
/// SessionProvider
///
/// Everything the application needs from the hosted authentication service.
/// Handlers and the edge guard only see this trait, so tests swap in
/// `MockSessionProvider` without any network.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolves the session cookies of a request into a user, renewing the
    /// session with the refresh token when the access token is missing or expired.
    async fn lookup(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<SessionLookup, SessionError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError>;

    /// Returns `None` when the account must be confirmed by email before a
    /// session is issued.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<SessionTokens>, SessionError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError>;

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), SessionError>;

    async fn update_password(&self, access_token: &str, password: &str)
    -> Result<(), SessionError>;

    /// Trades the one-time code from an email link or OAuth redirect for a session.
    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, SessionError>;
}

/// SessionProviderState
///
/// The concrete type used to share the session provider across the application state.
pub type SessionProviderState = Arc<dyn SessionProvider>;

/// Error payload shapes returned by GoTrue; which field is set depends on the endpoint.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ProviderErrorBody {
    fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request rejected")
                    .to_string()
            })
    }
}

// 2. The Real Implementation (Supabase GoTrue)
/// SupabaseAuth
///
/// Talks to the Supabase auth REST API under `{SUPABASE_URL}/auth/v1`.
/// Access tokens are verified locally with the project's JWT secret, so a
/// request with a fresh token costs no network round trip.
#[derive(Clone)]
pub struct SupabaseAuth {
    client: reqwest::Client,
    auth_url: String,
    anon_key: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SupabaseAuth {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

        Self {
            client,
            auth_url: format!("{}/auth/v1", config.supabase_url),
            anon_key: config.anon_key.clone(),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    fn verify(&self, access_token: &str) -> Result<SessionUser, SessionError> {
        let data = decode::<Claims>(access_token, &self.decoding_key, &self.validation)?;
        Ok(SessionUser {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.auth_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SessionError> {
        let response = request.header("apikey", &self.anon_key).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // An outage is not a verdict on the credentials or tokens.
        if status.is_server_error() {
            return Err(SessionError::Unavailable(format!(
                "auth service answered {status}"
            )));
        }

        let body = response
            .json::<ProviderErrorBody>()
            .await
            .unwrap_or_default();
        Err(SessionError::Rejected(body.into_message(status)))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SessionError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SessionError::Unavailable(format!("unexpected response body: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError> {
        self.call(
            self.client
                .post(self.endpoint("/token"))
                .query(&[("grant_type", "refresh_token")])
                .json(&serde_json::json!({ "refresh_token": refresh_token })),
        )
        .await
    }
}

#[async_trait]
impl SessionProvider for SupabaseAuth {
    async fn lookup(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<SessionLookup, SessionError> {
        if let Some(token) = access_token {
            match self.verify(token) {
                Ok(user) => {
                    return Ok(SessionLookup {
                        session: Some(ActiveSession {
                            user,
                            access_token: token.to_string(),
                        }),
                        ..SessionLookup::default()
                    });
                }
                Err(e) => tracing::debug!(error = %e, "access token not accepted, trying refresh"),
            }
        }

        let Some(refresh_token) = refresh_token else {
            return Ok(SessionLookup {
                expired: access_token.is_some(),
                ..SessionLookup::default()
            });
        };

        let tokens = match self.refresh(refresh_token).await {
            Ok(tokens) => tokens,
            Err(SessionError::Rejected(reason)) => {
                tracing::debug!(%reason, "refresh token rejected");
                return Ok(SessionLookup {
                    expired: true,
                    ..SessionLookup::default()
                });
            }
            Err(e) => return Err(e),
        };

        // A freshly minted token that fails verification means the JWT secret is wrong.
        let user = self.verify(&tokens.access_token)?;
        tracing::debug!(user_id = %user.id, "session refreshed");

        Ok(SessionLookup {
            session: Some(ActiveSession {
                user,
                access_token: tokens.access_token.clone(),
            }),
            refreshed: Some(tokens),
            expired: false,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError> {
        self.call(
            self.client
                .post(self.endpoint("/token"))
                .query(&[("grant_type", "password")])
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<SessionTokens>, SessionError> {
        let body: serde_json::Value = self
            .call(
                self.client
                    .post(self.endpoint("/signup"))
                    .query(&[("redirect_to", redirect_to)])
                    .json(&serde_json::json!({
                        "email": email,
                        "password": password,
                        "code_challenge": code_challenge,
                        "code_challenge_method": "s256",
                    })),
            )
            .await?;

        // With email confirmation enabled the provider answers with the bare user.
        if body.get("access_token").is_none() {
            return Ok(None);
        }

        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| SessionError::Unavailable(format!("unexpected sign-up response: {e}")))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError> {
        self.send(
            self.client
                .post(self.endpoint("/logout"))
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), SessionError> {
        self.send(
            self.client
                .post(self.endpoint("/recover"))
                .query(&[("redirect_to", redirect_to)])
                .json(&serde_json::json!({
                    "email": email,
                    "code_challenge": code_challenge,
                    "code_challenge_method": "s256",
                })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        self.send(
            self.client
                .put(self.endpoint("/user"))
                .bearer_auth(access_token)
                .json(&serde_json::json!({ "password": password })),
        )
        .await?;
        Ok(())
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, SessionError> {
        self.call(
            self.client
                .post(self.endpoint("/token"))
                .query(&[("grant_type", "pkce")])
                .json(&serde_json::json!({
                    "auth_code": auth_code,
                    "code_verifier": code_verifier,
                })),
        )
        .await
    }
}

// 3. The Mock Implementation (For Tests)
/// MockSessionProvider
///
/// In-memory session provider. Accounts, sessions, refresh tokens and auth codes
/// are seeded through the builder methods; every mutating call is recorded so
/// tests can assert on it.
#[derive(Default)]
pub struct MockSessionProvider {
    /// When true, every operation fails as if the provider were down.
    pub should_fail: bool,
    /// When true, sign-up returns no session (email confirmation pending).
    pub requires_confirmation: bool,
    accounts: Mutex<HashMap<String, (String, SessionUser)>>,
    sessions: Mutex<HashMap<String, SessionUser>>,
    refresh_tokens: Mutex<HashMap<String, SessionUser>>,
    codes: Mutex<HashMap<String, SessionUser>>,
    signed_out: Mutex<Vec<String>>,
    reset_requests: Mutex<Vec<(String, String)>>,
    password_updates: Mutex<Vec<(Uuid, String)>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        locked(&self.accounts).insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn with_session(self, access_token: &str, user: SessionUser) -> Self {
        locked(&self.sessions).insert(access_token.to_string(), user);
        self
    }

    pub fn with_refresh_token(self, refresh_token: &str, user: SessionUser) -> Self {
        locked(&self.refresh_tokens).insert(refresh_token.to_string(), user);
        self
    }

    pub fn with_code(self, code: &str, user: SessionUser) -> Self {
        locked(&self.codes).insert(code.to_string(), user);
        self
    }

    pub fn signed_out_tokens(&self) -> Vec<String> {
        locked(&self.signed_out).clone()
    }

    /// `(email, redirect_to)` pairs of every password reset request.
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        locked(&self.reset_requests).clone()
    }

    pub fn password_updates(&self) -> Vec<(Uuid, String)> {
        locked(&self.password_updates).clone()
    }

    fn check_available(&self) -> Result<(), SessionError> {
        if self.should_fail {
            return Err(SessionError::Unavailable(
                "mock provider simulating an outage".to_string(),
            ));
        }
        Ok(())
    }

    fn issue(&self, user: SessionUser) -> SessionTokens {
        let tokens = SessionTokens {
            access_token: format!("mock-access-{}", Uuid::new_v4().simple()),
            refresh_token: format!("mock-refresh-{}", Uuid::new_v4().simple()),
            expires_in: 3600,
        };
        locked(&self.sessions).insert(tokens.access_token.clone(), user.clone());
        locked(&self.refresh_tokens).insert(tokens.refresh_token.clone(), user);
        tokens
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn lookup(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<SessionLookup, SessionError> {
        self.check_available()?;

        if let Some(token) = access_token {
            if let Some(user) = locked(&self.sessions).get(token).cloned() {
                return Ok(SessionLookup {
                    session: Some(ActiveSession {
                        user,
                        access_token: token.to_string(),
                    }),
                    ..SessionLookup::default()
                });
            }
        }

        let renewed = refresh_token.and_then(|token| locked(&self.refresh_tokens).remove(token));
        match renewed {
            Some(user) => {
                let tokens = self.issue(user.clone());
                Ok(SessionLookup {
                    session: Some(ActiveSession {
                        user,
                        access_token: tokens.access_token.clone(),
                    }),
                    refreshed: Some(tokens),
                    expired: false,
                })
            }
            None => Ok(SessionLookup {
                expired: access_token.is_some() || refresh_token.is_some(),
                ..SessionLookup::default()
            }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError> {
        self.check_available()?;
        let account = locked(&self.accounts).get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => Ok(self.issue(user)),
            _ => Err(SessionError::Rejected("Invalid login credentials".to_string())),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: &str,
        _code_challenge: &str,
    ) -> Result<Option<SessionTokens>, SessionError> {
        self.check_available()?;
        if password.len() < 6 {
            return Err(SessionError::Rejected(
                "Password should be at least 6 characters.".to_string(),
            ));
        }

        let user = {
            let mut accounts = locked(&self.accounts);
            if accounts.contains_key(email) {
                return Err(SessionError::Rejected("User already registered".to_string()));
            }
            let user = SessionUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
            };
            accounts.insert(email.to_string(), (password.to_string(), user.clone()));
            user
        };

        if self.requires_confirmation {
            return Ok(None);
        }
        Ok(Some(self.issue(user)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), SessionError> {
        self.check_available()?;
        locked(&self.sessions).remove(access_token);
        locked(&self.signed_out).push(access_token.to_string());
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
        _code_challenge: &str,
    ) -> Result<(), SessionError> {
        self.check_available()?;
        locked(&self.reset_requests).push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        self.check_available()?;
        let user = locked(&self.sessions)
            .get(access_token)
            .cloned()
            .ok_or_else(|| SessionError::Rejected("Auth session missing!".to_string()))?;
        locked(&self.password_updates).push((user.id, password.to_string()));
        Ok(())
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        _code_verifier: &str,
    ) -> Result<SessionTokens, SessionError> {
        self.check_available()?;
        let user = locked(&self.codes)
            .remove(auth_code)
            .ok_or_else(|| SessionError::Rejected("invalid flow state, no valid flow state found".to_string()))?;
        Ok(self.issue(user))
    }
}
