//! Read-only event view plus the confirm-gated End/Delete/Edit actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{BackendError, EventTable, Filter};
use crate::forms::EditEventDrawer;
use crate::models::{Event, EventPatch};
use crate::richtext::Description;

/// `Wednesday, January 1, 2025 at 10:00 AM`
pub fn format_long(at: DateTime<Utc>) -> String {
    at.format("%A, %B %-d, %Y at %I:%M %p").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub id: Uuid,
    pub title: String,
    pub status: &'static str,
    pub kind: &'static str,
    pub starts_at: String,
    pub timezone: Option<String>,
    pub location: String,
    pub description_html: String,
    pub speakers: Vec<String>,
    pub ticket_link: Option<String>,
    pub banner_image: Option<String>,
    pub created: String,
    pub updated: String,
}

impl EventDetails {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            status: event.status_label(),
            kind: event.kind_label(),
            starts_at: format_long(event.start_date_time),
            timezone: event.timezone.clone(),
            location: event.location.clone(),
            description_html: Description::decode(&event.description).to_html(),
            speakers: event.speakers.clone(),
            ticket_link: event.ticket_link.clone(),
            banner_image: event.banner_image.clone(),
            created: format_long(event.created_at),
            updated: format_long(event.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetailAction {
    End,
    Delete,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionAvailability {
    pub can_edit: bool,
    pub can_end: bool,
    pub can_delete: bool,
}

impl ActionAvailability {
    pub fn for_event(event: &Event) -> Self {
        Self {
            can_edit: !event.has_ended,
            can_end: !event.has_ended,
            can_delete: true,
        }
    }

    pub fn allows(&self, action: DetailAction) -> bool {
        match action {
            DetailAction::End => self.can_end,
            DetailAction::Delete => self.can_delete,
            DetailAction::Edit => self.can_edit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDialog {
    pub action: DetailAction,
    pub title: &'static str,
    pub message: String,
    pub confirm_label: &'static str,
    pub destructive: bool,
}

impl ConfirmDialog {
    fn for_action(action: DetailAction, event: &Event) -> Self {
        match action {
            DetailAction::End => Self {
                action,
                title: "End Event",
                message: format!(
                    "Are you sure you want to end \"{}\"? This action cannot be undone.",
                    event.title
                ),
                confirm_label: "End Event",
                destructive: true,
            },
            DetailAction::Delete => Self {
                action,
                title: "Delete Event",
                message: format!(
                    "Are you sure you want to delete \"{}\"? This action cannot be undone.",
                    event.title
                ),
                confirm_label: "Delete",
                destructive: true,
            },
            DetailAction::Edit => Self {
                action,
                title: "Edit Event",
                message: format!("Do you want to edit \"{}\"?", event.title),
                confirm_label: "Edit",
                destructive: false,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No action is awaiting confirmation")]
    NothingPending,

    #[error("This action is not available for an ended event")]
    Unavailable(DetailAction),

    #[error("Event no longer exists")]
    Missing,

    #[error("{0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug)]
pub enum ActionOutcome {
    Ended(Event),
    Deleted(Uuid),
    EditOpened(EditEventDrawer),
}

impl ActionOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ActionOutcome::Ended(_) => "Event ended successfully",
            ActionOutcome::Deleted(_) => "Event deleted successfully",
            ActionOutcome::EditOpened(_) => "Editing event",
        }
    }
}

#[derive(Debug)]
pub struct EventDetailDrawer {
    event: Event,
    pending: Option<DetailAction>,
    open: bool,
}

impl EventDetailDrawer {
    pub fn open(event: Event) -> Self {
        Self {
            event,
            pending: None,
            open: true,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn details(&self) -> EventDetails {
        EventDetails::from_event(&self.event)
    }

    pub fn availability(&self) -> ActionAvailability {
        ActionAvailability::for_event(&self.event)
    }

    pub fn pending(&self) -> Option<DetailAction> {
        self.pending
    }

    pub fn request(&mut self, action: DetailAction) -> Result<ConfirmDialog, ActionError> {
        if !self.availability().allows(action) {
            return Err(ActionError::Unavailable(action));
        }
        self.pending = Some(action);
        Ok(ConfirmDialog::for_action(action, &self.event))
    }

    pub fn dismiss(&mut self) {
        self.pending = None;
    }

    /// Runs the pending action. Backend failures leave the drawer and the
    /// pending dialog as they were; `on_refresh` only runs after a write
    /// succeeded.
    pub async fn confirm<F>(
        &mut self,
        events: &dyn EventTable,
        on_refresh: F,
    ) -> Result<ActionOutcome, ActionError>
    where
        F: FnOnce(),
    {
        let action = self.pending.ok_or(ActionError::NothingPending)?;
        if !self.availability().allows(action) {
            return Err(ActionError::Unavailable(action));
        }
        let id = self.event.id;

        let outcome = match action {
            DetailAction::End => {
                let updated = events
                    .update(&EventPatch::end(), &Filter::Id(id))
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, event_id = %id, "Error ending event");
                        ActionError::from(e)
                    })?;
                let event = updated.into_iter().next().ok_or(ActionError::Missing)?;
                tracing::info!(event_id = %id, "Event ended");
                self.event = event.clone();
                on_refresh();
                ActionOutcome::Ended(event)
            }
            DetailAction::Delete => {
                let removed = events.delete(&Filter::Id(id)).await.map_err(|e| {
                    tracing::error!(error = %e, event_id = %id, "Error deleting event");
                    ActionError::from(e)
                })?;
                if removed == 0 {
                    return Err(ActionError::Missing);
                }
                tracing::info!(event_id = %id, "Event deleted");
                self.open = false;
                on_refresh();
                ActionOutcome::Deleted(id)
            }
            DetailAction::Edit => {
                self.open = false;
                ActionOutcome::EditOpened(EditEventDrawer::open(self.event.clone()))
            }
        };

        self.pending = None;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryEventTable, SelectQuery};
    use crate::models::event::fixtures;
    use crate::richtext::RawDocument;

    #[test]
    fn test_long_date_format() {
        let event = fixtures::event("Launch");
        assert_eq!(
            format_long(event.start_date_time),
            "Wednesday, January 1, 2025 at 10:00 AM"
        );
    }

    #[test]
    fn test_details_decode_description_both_ways() {
        let mut event = fixtures::event("Launch");
        event.description = "line one\nline <two>".to_string();
        let details = EventDetails::from_event(&event);
        assert_eq!(details.description_html, "line one<br />line &lt;two&gt;");

        event.description = RawDocument::from_plain_text("Kickoff").encode().unwrap();
        let details = EventDetails::from_event(&event);
        assert_eq!(details.description_html, "<p>Kickoff</p>");
        assert_eq!(details.status, "Upcoming");
        assert_eq!(details.kind, "In-Person");
    }

    #[test]
    fn test_ended_event_only_allows_delete() {
        let mut event = fixtures::event("Launch");
        event.has_ended = true;
        let mut drawer = EventDetailDrawer::open(event);

        assert!(matches!(
            drawer.request(DetailAction::End),
            Err(ActionError::Unavailable(DetailAction::End))
        ));
        assert!(drawer.request(DetailAction::Edit).is_err());
        let dialog = drawer.request(DetailAction::Delete).unwrap();
        assert_eq!(dialog.title, "Delete Event");
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_rejected() {
        let table = MemoryEventTable::default();
        let mut drawer = EventDetailDrawer::open(fixtures::event("Launch"));
        let result = drawer.confirm(&table, || {}).await;
        assert!(matches!(result, Err(ActionError::NothingPending)));
    }

    #[tokio::test]
    async fn test_end_event_flow() {
        let event = fixtures::event("Launch");
        let table = MemoryEventTable::with_rows(vec![event.clone()]);
        let mut drawer = EventDetailDrawer::open(event);
        let mut refreshed = false;

        drawer.request(DetailAction::End).unwrap();
        let outcome = drawer.confirm(&table, || refreshed = true).await.unwrap();

        assert!(matches!(outcome, ActionOutcome::Ended(ref e) if e.has_ended));
        assert!(refreshed);
        assert_eq!(drawer.pending(), None);
        let availability = drawer.availability();
        assert!(!availability.can_edit);
        assert!(!availability.can_end);
        assert!(availability.can_delete);
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_closes() {
        let event = fixtures::event("Launch");
        let table = MemoryEventTable::with_rows(vec![event.clone()]);
        let mut drawer = EventDetailDrawer::open(event);

        drawer.request(DetailAction::Delete).unwrap();
        drawer.confirm(&table, || {}).await.unwrap();

        assert!(!drawer.is_open());
        let remaining = table.select(&SelectQuery::new().count_exact()).await.unwrap();
        assert_eq!(remaining.count, Some(0));
    }

    #[tokio::test]
    async fn test_failed_action_keeps_state() {
        let event = fixtures::event("Launch");
        let table = MemoryEventTable::default();
        let mut drawer = EventDetailDrawer::open(event);
        let mut refreshed = false;

        drawer.request(DetailAction::End).unwrap();
        let result = drawer.confirm(&table, || refreshed = true).await;

        assert!(matches!(result, Err(ActionError::Missing)));
        assert!(!refreshed);
        assert_eq!(drawer.pending(), Some(DetailAction::End));
        assert!(!drawer.event().has_ended);
    }

    #[tokio::test]
    async fn test_edit_opens_edit_drawer() {
        let event = fixtures::event("Launch");
        let table = MemoryEventTable::default();
        let mut drawer = EventDetailDrawer::open(event.clone());

        drawer.request(DetailAction::Edit).unwrap();
        match drawer.confirm(&table, || {}).await.unwrap() {
            ActionOutcome::EditOpened(edit) => assert_eq!(edit.event().id, event.id),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!drawer.is_open());
    }
}
