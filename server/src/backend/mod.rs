//! Data backend client: authentication, the `events` table and banner
//! object storage, each behind its own trait so the dashboard can run
//! against the hosted service or entirely in memory.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{Event, EventPatch, NewEvent};
use crate::session::{AuthEvent, AuthUser, Session};

pub mod hosted;
pub mod memory;
pub mod postgres;

pub use hosted::{HostedAuth, HostedStorage};
pub use memory::{MemoryAuth, MemoryEventTable, MemoryStorage};
pub use postgres::PgEventTable;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend responded with {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

/// Result of a sign-up. `session` is absent when the account still has to
/// confirm its email address.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Live listener registered through [`on_auth_state_change`]. Dropping it
/// unsubscribes.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn on_auth_state_change<F>(auth: &dyn AuthClient, handler: F) -> Subscription
where
    F: Fn(AuthEvent) + Send + 'static,
{
    let mut events = auth.subscribe();
    let task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => handler(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Subscription { task }
}

/// Columns the list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventColumn {
    Title,
    Location,
    StartDateTime,
    CreatedAt,
    UpdatedAt,
}

impl EventColumn {
    pub fn sql_name(self) -> &'static str {
        match self {
            EventColumn::Title => "title",
            EventColumn::Location => "location",
            EventColumn::StartDateTime => "\"startDateTime\"",
            EventColumn::CreatedAt => "created_at",
            EventColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: EventColumn,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Id(Uuid),
    HasEnded(bool),
}

impl Filter {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Filter::Id(id) => event.id == *id,
            Filter::HasEnded(ended) => event.has_ended == *ended,
        }
    }
}

/// A `select` on the events table: optional exact count, one ordering and
/// an inclusive row range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub count_exact: bool,
    pub order: Option<Order>,
    pub range: Option<(u64, u64)>,
    pub filter: Option<Filter>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }

    pub fn order(mut self, column: EventColumn, ascending: bool) -> Self {
        self.order = Some(Order { column, ascending });
        self
    }

    /// Inclusive on both ends.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectResult {
    pub rows: Vec<Event>,
    pub count: Option<u64>,
}

#[async_trait]
pub trait EventTable: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, BackendError>;

    async fn insert(&self, rows: Vec<NewEvent>) -> Result<Vec<Event>, BackendError>;

    async fn update(&self, patch: &EventPatch, filter: &Filter) -> Result<Vec<Event>, BackendError>;

    async fn delete(&self, filter: &Filter) -> Result<u64, BackendError>;
}

/// Convenience for the common single-row lookup.
pub async fn find_event(events: &dyn EventTable, id: Uuid) -> Result<Option<Event>, BackendError> {
    let result = events
        .select(&SelectQuery::new().filter(Filter::Id(id)).range(0, 0))
        .await?;
    Ok(result.rows.into_iter().next())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub cache_control: String,
    pub upsert: bool,
    pub content_type: String,
}

impl UploadOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            cache_control: "3600".to_string(),
            upsert: false,
            content_type: content_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path relative to the bucket root.
    pub path: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), BackendError>;
}

pub(crate) fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path
    )
}

/// The three collaborators every dashboard page talks to.
#[derive(Clone)]
pub struct DataBackend {
    pub auth: Arc<dyn AuthClient>,
    pub events: Arc<dyn EventTable>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl DataBackend {
    pub fn new(
        auth: Arc<dyn AuthClient>,
        events: Arc<dyn EventTable>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            auth,
            events,
            storage,
        }
    }

    /// Fully in-process backend, used in development mode and in tests.
    pub fn in_memory(public_base_url: &str, require_email_confirmation: bool) -> Self {
        Self::new(
            Arc::new(MemoryAuth::new(require_email_confirmation)),
            Arc::new(MemoryEventTable::default()),
            Arc::new(MemoryStorage::new(public_base_url)),
        )
    }
}

pub(crate) fn session_expiry(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + chrono::Duration::seconds(expires_in_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_query_builder() {
        let id = Uuid::new_v4();
        let query = SelectQuery::new()
            .count_exact()
            .order(EventColumn::CreatedAt, false)
            .range(10, 19)
            .filter(Filter::Id(id));

        assert!(query.count_exact);
        assert_eq!(
            query.order,
            Some(Order {
                column: EventColumn::CreatedAt,
                ascending: false
            })
        );
        assert_eq!(query.range, Some((10, 19)));
        assert_eq!(query.filter, Some(Filter::Id(id)));
    }

    #[test]
    fn test_public_object_url_format() {
        assert_eq!(
            public_object_url("https://xyz.supabase.co/", "event-banners", "1752768022061.png"),
            "https://xyz.supabase.co/storage/v1/object/public/event-banners/1752768022061.png"
        );
    }

    #[test]
    fn test_upload_options_defaults() {
        let options = UploadOptions::new("image/png");
        assert_eq!(options.cache_control, "3600");
        assert!(!options.upsert);
    }

    #[tokio::test]
    async fn test_subscription_delivers_until_dropped() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let auth = MemoryAuth::new(false);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscription = on_auth_state_change(&auth, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        auth.sign_up("admin@example.com", "secret").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        auth.sign_in_with_password("admin@example.com", "secret")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
