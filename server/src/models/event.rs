use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of the `events` collection as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    #[sqlx(rename = "startDateTime")]
    pub start_date_time: DateTime<Utc>,
    pub timezone: Option<String>,
    pub description: String,
    pub speakers: Vec<String>,
    #[sqlx(rename = "isVirtual")]
    pub is_virtual: bool,
    #[sqlx(rename = "ticketLink")]
    pub ticket_link: Option<String>,
    #[sqlx(rename = "bannerImage")]
    pub banner_image: Option<String>,
    #[sqlx(rename = "hasEnded")]
    pub has_ended: bool,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn status_label(&self) -> &'static str {
        if self.has_ended {
            "Ended"
        } else {
            "Upcoming"
        }
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_virtual {
            "Virtual"
        } else {
            "In-Person"
        }
    }

    /// Applies the set fields of `patch`. `id` and `created_at` never change.
    pub fn apply(&mut self, patch: &EventPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(location) = &patch.location {
            self.location = location.clone();
        }
        if let Some(start) = patch.start_date_time {
            self.start_date_time = start;
        }
        if let Some(timezone) = &patch.timezone {
            self.timezone = timezone.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(speakers) = &patch.speakers {
            self.speakers = speakers.clone();
        }
        if let Some(is_virtual) = patch.is_virtual {
            self.is_virtual = is_virtual;
        }
        if let Some(ticket_link) = &patch.ticket_link {
            self.ticket_link = ticket_link.clone();
        }
        if let Some(banner_image) = &patch.banner_image {
            self.banner_image = banner_image.clone();
        }
        if let Some(has_ended) = patch.has_ended {
            self.has_ended = has_ended;
        }
        self.updated_at = now;
    }
}

/// Insert payload. The backend assigns `id`, `created_at` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub location: String,
    pub start_date_time: DateTime<Utc>,
    pub timezone: Option<String>,
    pub description: String,
    pub speakers: Vec<String>,
    pub is_virtual: bool,
    pub ticket_link: Option<String>,
    pub banner_image: Option<String>,
    pub has_ended: bool,
}

impl NewEvent {
    pub fn into_event(self, id: Uuid, now: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title,
            location: self.location,
            start_date_time: self.start_date_time,
            timezone: self.timezone,
            description: self.description,
            speakers: self.speakers,
            is_virtual: self.is_virtual,
            ticket_link: self.ticket_link,
            banner_image: self.banner_image,
            has_ended: self.has_ended,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves a column alone; for nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub timezone: Option<Option<String>>,
    pub description: Option<String>,
    pub speakers: Option<Vec<String>>,
    pub is_virtual: Option<bool>,
    pub ticket_link: Option<Option<String>>,
    pub banner_image: Option<Option<String>>,
    pub has_ended: Option<bool>,
}

impl EventPatch {
    pub fn end() -> Self {
        Self {
            has_ended: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn event(title: &str) -> Event {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            location: "HQ".to_string(),
            start_date_time: at,
            timezone: Some("WAT".to_string()),
            description: "Kickoff".to_string(),
            speakers: Vec::new(),
            is_virtual: false,
            ticket_link: None,
            banner_image: None,
            has_ended: false,
            created_at: at,
            updated_at: at,
        }
    }
}
