use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    public_object_url, session_expiry, AuthClient, BackendError, EventColumn, EventTable, Filter,
    ObjectStorage, SelectQuery, SelectResult, SignUpOutcome, StoredObject, UploadOptions,
};
use crate::models::{Event, EventPatch, NewEvent};
use crate::session::{AuthEvent, AuthUser, Session};

const SESSION_TTL_SECS: i64 = 60 * 60;
const PASSWORD_HASH_COST: u32 = 4;

struct Account {
    user: AuthUser,
    password_hash: String,
    confirmed: bool,
}

/// In-process stand-in for the hosted auth service.
pub struct MemoryAuth {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, Session>>,
    require_email_confirmation: bool,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryAuth {
    pub fn new(require_email_confirmation: bool) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            require_email_confirmation,
            events,
        }
    }

    /// Marks an account as confirmed, as following the emailed link would.
    pub async fn confirm_email(&self, email: &str) -> bool {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&normalize_email(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    async fn open_session(&self, user: AuthUser) -> Session {
        let session = Session {
            access_token: Uuid::new_v4().simple().to_string(),
            user,
            expires_at: Some(session_expiry(Utc::now(), SESSION_TTL_SECS)),
        };
        self.sessions
            .write()
            .await
            .insert(session.access_token.clone(), session.clone());
        // No receivers is fine.
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        session
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthClient for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let key = normalize_email(email);
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(BackendError::Auth("User already registered".to_string()));
            }
            let password_hash = bcrypt::hash(password, PASSWORD_HASH_COST)
                .map_err(|e| BackendError::Auth(e.to_string()))?;
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: Some(key.clone()),
            };
            accounts.insert(
                key,
                Account {
                    user: user.clone(),
                    password_hash,
                    confirmed: !self.require_email_confirmation,
                },
            );
            user
        };

        let session = if self.require_email_confirmation {
            None
        } else {
            Some(self.open_session(user.clone()).await)
        };
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let user = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(&normalize_email(email))
                .ok_or_else(|| BackendError::Auth("Invalid login credentials".to_string()))?;
            let valid = bcrypt::verify(password, &account.password_hash)
                .map_err(|e| BackendError::Auth(e.to_string()))?;
            if !valid {
                return Err(BackendError::Auth("Invalid login credentials".to_string()));
            }
            if !account.confirmed {
                return Err(BackendError::Auth("Email not confirmed".to_string()));
            }
            account.user.clone()
        };
        Ok(self.open_session(user).await)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        if self.sessions.write().await.remove(access_token).is_some() {
            let _ = self.events.send(AuthEvent::SignedOut {
                access_token: access_token.to_string(),
            });
        }
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<Session>, BackendError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(access_token) {
            Some(session) if session.is_expired(Utc::now()) => {
                sessions.remove(access_token);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn compare_by(column: EventColumn, a: &Event, b: &Event) -> Ordering {
    match column {
        EventColumn::Title => a.title.cmp(&b.title),
        EventColumn::Location => a.location.cmp(&b.location),
        EventColumn::StartDateTime => a.start_date_time.cmp(&b.start_date_time),
        EventColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        EventColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[derive(Default)]
pub struct MemoryEventTable {
    rows: RwLock<Vec<Event>>,
}

impl MemoryEventTable {
    pub fn with_rows(rows: Vec<Event>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl EventTable for MemoryEventTable {
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, BackendError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Event> = rows
            .iter()
            .filter(|e| query.filter.map_or(true, |f| f.matches(e)))
            .cloned()
            .collect();

        if let Some(order) = query.order {
            matching.sort_by(|a, b| {
                let ordering = compare_by(order.column, a, b);
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let count = query.count_exact.then_some(matching.len() as u64);
        let rows = match query.range {
            Some((from, to)) => matching
                .into_iter()
                .skip(usize::try_from(from).unwrap_or(usize::MAX))
                .take(usize::try_from(to.saturating_sub(from)).map_or(usize::MAX, |n| n.saturating_add(1)))
                .collect(),
            None => matching,
        };

        Ok(SelectResult { rows, count })
    }

    async fn insert(&self, rows: Vec<NewEvent>) -> Result<Vec<Event>, BackendError> {
        let now = Utc::now();
        let inserted: Vec<Event> = rows
            .into_iter()
            .map(|row| row.into_event(Uuid::new_v4(), now))
            .collect();
        self.rows.write().await.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(&self, patch: &EventPatch, filter: &Filter) -> Result<Vec<Event>, BackendError> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let updated = rows
            .iter_mut()
            .filter(|e| filter.matches(e))
            .map(|e| {
                e.apply(patch, now);
                e.clone()
            })
            .collect();
        Ok(updated)
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, BackendError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|e| !filter.matches(e));
        Ok((before - rows.len()) as u64)
    }
}

struct StoredBlob {
    body: Bytes,
    content_type: String,
}

/// In-process object store. Public URLs follow the hosted layout so that
/// URL parsing behaves the same in both modes.
pub struct MemoryStorage {
    base_url: String,
    objects: RwLock<HashMap<(String, String), StoredBlob>>,
    requests: AtomicU64,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            requests: AtomicU64::new(0),
        }
    }

    /// Number of upload/remove calls received so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    pub async fn object(&self, bucket: &str, path: &str) -> Option<(Bytes, String)> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .map(|blob| (blob.body.clone(), blob.content_type.clone()))
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> Result<StoredObject, BackendError> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.objects.write().await;
        if !options.upsert && objects.contains_key(&key) {
            return Err(BackendError::Conflict("The resource already exists".to_string()));
        }
        objects.insert(
            key,
            StoredBlob {
                body,
                content_type: options.content_type.clone(),
            },
        );
        Ok(StoredObject {
            path: path.to_string(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        public_object_url(&self.base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), BackendError> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
