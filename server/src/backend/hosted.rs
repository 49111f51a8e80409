use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    public_object_url, session_expiry, AuthClient, BackendError, ObjectStorage, SignUpOutcome,
    StoredObject, UploadOptions,
};
use crate::session::{AuthEvent, AuthUser, Session};

const API_KEY_HEADER: &str = "apikey";
const UPSERT_HEADER: &str = "x-upsert";

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Uuid,
    email: Option<String>,
}

impl From<RemoteUser> for AuthUser {
    fn from(user: RemoteUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteSession {
    access_token: String,
    expires_in: Option<i64>,
    user: RemoteUser,
}

impl RemoteSession {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            user: self.user.into(),
            expires_at: self.expires_in.map(|secs| session_expiry(Utc::now(), secs)),
        }
    }
}

/// Sign-up answers with a session, or only the user while the email
/// address awaits confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(RemoteSession),
    User(RemoteUser),
}

#[derive(Debug, Default, Deserialize)]
struct RemoteErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body: RemoteErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .msg
        .or(body.error_description)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => BackendError::Auth(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::Conflict(message),
        _ => BackendError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Client for the hosted auth REST API.
pub struct HostedAuth {
    http: Client,
    base_url: String,
    api_key: String,
    events: broadcast::Sender<AuthEvent>,
}

impl HostedAuth {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            events,
        }
    }

    async fn password_request(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<Response, BackendError> {
        let response = self
            .http
            .post(endpoint(&self.base_url, path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[async_trait]
impl AuthClient for HostedAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let response = self
            .password_request("/auth/v1/signup", email, password)
            .await?;
        match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(remote) => {
                let session = remote.into_session();
                let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
                Ok(SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                user: user.into(),
                session: None,
            }),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .password_request("/auth/v1/token?grant_type=password", email, password)
            .await?;
        let session = response.json::<RemoteSession>().await?.into_session();
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .post(endpoint(&self.base_url, "/auth/v1/logout"))
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        // An already-invalid token is as good as signed out.
        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            return Err(error_from_response(response).await);
        }
        let _ = self.events.send(AuthEvent::SignedOut {
            access_token: access_token.to_string(),
        });
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "/auth/v1/user"))
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user = response.json::<RemoteUser>().await?;
                Ok(Some(Session {
                    access_token: access_token.to_string(),
                    user: user.into(),
                    expires_at: None,
                }))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: String,
}

/// Client for the hosted object storage REST API.
pub struct HostedStorage {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HostedStorage {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for HostedStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, BackendError> {
        let url = endpoint(
            &self.base_url,
            &format!("/storage/v1/object/{}/{}", bucket, path),
        );
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(&self.api_key)
            .header(
                header::CACHE_CONTROL,
                format!("max-age={}", options.cache_control),
            )
            .header(header::CONTENT_TYPE, &options.content_type)
            .header(UPSERT_HEADER, options.upsert.to_string())
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let uploaded = response.json::<UploadResponse>().await?;
        let bucket_prefix = format!("{}/", bucket);
        let path = uploaded
            .key
            .strip_prefix(&bucket_prefix)
            .unwrap_or(&uploaded.key)
            .to_string();
        Ok(StoredObject { path })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(&self.base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(endpoint(
                &self.base_url,
                &format!("/storage/v1/object/{}", bucket),
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_response_with_session() {
        let body = r#"{
            "access_token": "token",
            "expires_in": 3600,
            "user": { "id": "6f1c5bd4-3b8e-4a4e-9f0e-1f3f3c1b2a10", "email": "a@b.co" }
        }"#;
        match serde_json::from_str::<SignUpResponse>(body).unwrap() {
            SignUpResponse::Session(session) => {
                let session = session.into_session();
                assert_eq!(session.access_token, "token");
                assert!(session.expires_at.is_some());
            }
            SignUpResponse::User(_) => panic!("expected a session"),
        }
    }

    #[test]
    fn test_sign_up_response_awaiting_confirmation() {
        let body = r#"{ "id": "6f1c5bd4-3b8e-4a4e-9f0e-1f3f3c1b2a10", "email": "a@b.co" }"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(body).unwrap(),
            SignUpResponse::User(_)
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("https://x.example.co/", "/auth/v1/user"),
            "https://x.example.co/auth/v1/user"
        );
    }
}
