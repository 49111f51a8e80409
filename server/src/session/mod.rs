//! Session guard. The session is resolved once per request and handed to
//! handlers as an explicit `Session` extension.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::AuthClient;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sb-access-token";
pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard/events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip)]
    pub access_token: String,
    pub user: AuthUser,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut { access_token: String },
}

/// A session acquired from the auth backend together with a subscription
/// to auth state changes. A sign-out of the held token tears the session
/// down; dropping the context closes the subscription.
pub struct SessionContext {
    session: Option<Session>,
    events: broadcast::Receiver<AuthEvent>,
}

impl SessionContext {
    pub async fn acquire(auth: &dyn AuthClient, access_token: Option<&str>) -> Self {
        let events = auth.subscribe();
        let session = match access_token {
            Some(token) => match auth.get_session(token).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!(error = %e, "Error fetching session");
                    None
                }
            },
            None => None,
        };
        Self { session, events }
    }

    pub fn current(&mut self) -> Option<&Session> {
        loop {
            match self.events.try_recv() {
                Ok(AuthEvent::SignedOut { access_token }) => {
                    if self
                        .session
                        .as_ref()
                        .is_some_and(|s| s.access_token == access_token)
                    {
                        tracing::info!("Session signed out");
                        self.session = None;
                    }
                }
                Ok(AuthEvent::SignedIn(_)) => {}
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        self.session.as_ref()
    }

    pub fn into_session(mut self) -> Option<Session> {
        self.current();
        self.session
    }
}

/// Bearer token from the `Authorization` header, else the session cookie.
pub fn access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

pub async fn resolve_session(
    auth: &dyn AuthClient,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Option<Session> {
    let token = access_token(headers, jar);
    SessionContext::acquire(auth, token.as_deref())
        .await
        .into_session()
}

/// Where `/` and `/login` send a visitor.
pub fn landing_path(session: Option<&Session>) -> &'static str {
    if session.is_some() {
        HOME_PATH
    } else {
        LOGIN_PATH
    }
}

/// Middleware for everything under `/dashboard`.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let session = resolve_session(state.backend.auth.as_ref(), request.headers(), &jar).await;
    match session {
        Some(session) => {
            tracing::debug!(user = %session.user.id, path = %request.uri().path(), "Session accepted");
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "No session, redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryAuth, SignUpOutcome};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    /// Auth backend whose every call fails, as when the provider is down.
    struct UnreachableAuth {
        events: broadcast::Sender<AuthEvent>,
    }

    impl UnreachableAuth {
        fn new() -> Self {
            Self {
                events: broadcast::channel(4).0,
            }
        }

        fn down() -> BackendError {
            BackendError::Transport("connection refused".to_string())
        }
    }

    #[async_trait]
    impl AuthClient for UnreachableAuth {
        async fn sign_up(&self, _email: &str, _password: &str) -> Result<SignUpOutcome, BackendError> {
            Err(Self::down())
        }

        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Session, BackendError> {
            Err(Self::down())
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), BackendError> {
            Err(Self::down())
        }

        async fn get_session(&self, _access_token: &str) -> Result<Option<Session>, BackendError> {
            Err(Self::down())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    async fn signed_in(auth: &MemoryAuth) -> Session {
        auth.sign_up("admin@example.com", "secret")
            .await
            .unwrap()
            .session
            .unwrap()
    }

    #[tokio::test]
    async fn test_context_without_token_is_unauthenticated() {
        let auth = MemoryAuth::new(false);
        let mut context = SessionContext::acquire(&auth, None).await;
        assert!(context.current().is_none());
    }

    #[tokio::test]
    async fn test_session_fetch_error_is_unauthenticated() {
        let auth = UnreachableAuth::new();
        let mut context = SessionContext::acquire(&auth, Some("stale-token")).await;
        assert!(context.current().is_none());

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "stale-token"));
        assert!(resolve_session(&auth, &HeaderMap::new(), &jar).await.is_none());
    }

    #[tokio::test]
    async fn test_context_is_torn_down_on_sign_out() {
        let auth = MemoryAuth::new(false);
        let session = signed_in(&auth).await;

        let mut context = SessionContext::acquire(&auth, Some(&session.access_token)).await;
        assert_eq!(context.current().map(|s| s.user.id), Some(session.user.id));

        auth.sign_out(&session.access_token).await.unwrap();
        assert!(context.current().is_none());
    }

    #[tokio::test]
    async fn test_other_sign_out_keeps_session() {
        let auth = MemoryAuth::new(false);
        let session = signed_in(&auth).await;
        let other = auth
            .sign_in_with_password("admin@example.com", "secret")
            .await
            .unwrap();

        let mut context = SessionContext::acquire(&auth, Some(&session.access_token)).await;
        auth.sign_out(&other.access_token).await.unwrap();
        assert!(context.current().is_some());
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));

        assert_eq!(access_token(&headers, &jar).as_deref(), Some("from-header"));
        assert_eq!(
            access_token(&HeaderMap::new(), &jar).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(access_token(&HeaderMap::new(), &CookieJar::new()), None);
    }

    #[test]
    fn test_landing_path() {
        let session = Session {
            access_token: "t".to_string(),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
            },
            expires_at: None,
        };
        assert_eq!(landing_path(Some(&session)), HOME_PATH);
        assert_eq!(landing_path(None), LOGIN_PATH);
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let mut session = Session {
            access_token: "t".to_string(),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
            },
            expires_at: Some(now),
        };
        assert!(session.is_expired(now));
        session.expires_at = None;
        assert!(!session.is_expired(now));
    }
}
