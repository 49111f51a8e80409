use thiserror::Error;

use super::{EventForm, FormErrors};
use crate::backend::{BackendError, EventTable, Filter};
use crate::models::Event;

#[derive(Debug, Error)]
pub enum DrawerError {
    #[error("Please fix the highlighted fields")]
    Invalid(FormErrors),

    #[error("Event has ended and can no longer be edited")]
    Ended,

    #[error("Event no longer exists")]
    Missing,

    #[error("{0}")]
    Backend(#[from] BackendError),
}

pub fn created_message(event: &Event) -> String {
    format!("\"{}\" has been created successfully.", event.title)
}

pub fn updated_message(event: &Event) -> String {
    format!("\"{}\" has been updated successfully.", event.title)
}

fn validated(form: &mut EventForm) -> Result<(), DrawerError> {
    if form.validate() {
        Ok(())
    } else {
        Err(DrawerError::Invalid(form.errors.clone()))
    }
}

/// Side panel for new events. Failed submissions keep the panel open with
/// the entered data; a successful one resets and closes it.
#[derive(Debug, Default)]
pub struct CreateEventDrawer {
    form: EventForm,
    open: bool,
}

impl CreateEventDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn form(&self) -> &EventForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EventForm {
        &mut self.form
    }

    pub fn close(&mut self) {
        self.form = EventForm::blank();
        self.open = false;
    }

    pub async fn submit(&mut self, events: &dyn EventTable) -> Result<Event, DrawerError> {
        validated(&mut self.form)?;
        let new_event = self
            .form
            .to_new_event()
            .ok_or_else(|| DrawerError::Invalid(self.form.errors.clone()))?;

        let inserted = events.insert(vec![new_event]).await.map_err(|e| {
            tracing::error!(error = %e, "Error creating event");
            DrawerError::from(e)
        })?;
        let event = inserted.into_iter().next().ok_or(DrawerError::Missing)?;

        tracing::info!(event_id = %event.id, title = %event.title, "Event created");
        self.close();
        Ok(event)
    }
}

/// Side panel for an existing event.
#[derive(Debug)]
pub struct EditEventDrawer {
    event: Event,
    form: EventForm,
    open: bool,
}

impl EditEventDrawer {
    pub fn open(event: Event) -> Self {
        let form = EventForm::from_event(&event);
        Self {
            event,
            form,
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn form(&self) -> &EventForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EventForm {
        &mut self.form
    }

    /// Drops unsaved edits.
    pub fn close(&mut self) {
        self.form = EventForm::from_event(&self.event);
        self.open = false;
    }

    pub async fn submit(&mut self, events: &dyn EventTable) -> Result<Event, DrawerError> {
        if self.event.has_ended {
            return Err(DrawerError::Ended);
        }
        validated(&mut self.form)?;
        let patch = self
            .form
            .to_patch()
            .ok_or_else(|| DrawerError::Invalid(self.form.errors.clone()))?;

        let updated = events
            .update(&patch, &Filter::Id(self.event.id))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, event_id = %self.event.id, "Error updating event");
                DrawerError::from(e)
            })?;
        let event = updated.into_iter().next().ok_or(DrawerError::Missing)?;

        tracing::info!(event_id = %event.id, "Event updated");
        self.event = event.clone();
        self.close();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryEventTable, SelectQuery, SelectResult};
    use crate::forms::Field;
    use crate::models::{EventPatch, NewEvent};
    use crate::richtext::{Description, RawDocument};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails every write.
    #[derive(Default)]
    struct FailingTable {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventTable for FailingTable {
        async fn select(&self, _query: &SelectQuery) -> Result<SelectResult, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SelectResult::default())
        }

        async fn insert(&self, _rows: Vec<NewEvent>) -> Result<Vec<Event>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transport("connection reset".to_string()))
        }

        async fn update(
            &self,
            _patch: &EventPatch,
            _filter: &Filter,
        ) -> Result<Vec<Event>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transport("connection reset".to_string()))
        }

        async fn delete(&self, _filter: &Filter) -> Result<u64, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transport("connection reset".to_string()))
        }
    }

    fn fill(form: &mut EventForm) {
        form.set(Field::Title, "Launch");
        form.set(Field::Location, "HQ");
        form.set(Field::StartDateTime, "2025-01-01T10:00");
        form.set_description(RawDocument::from_plain_text("Kickoff"));
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_backend_call() {
        let table = FailingTable::default();
        let mut drawer = CreateEventDrawer::new();
        drawer.open();
        fill(drawer.form_mut());
        drawer.form_mut().set(Field::Location, "  ");

        let err = drawer.submit(&table).await.unwrap_err();
        assert!(matches!(err, DrawerError::Invalid(ref errors) if errors.location.is_some()));
        assert_eq!(table.calls.load(Ordering::SeqCst), 0);
        assert!(drawer.is_open());
    }

    #[tokio::test]
    async fn test_create_success_resets_and_closes() {
        let table = MemoryEventTable::default();
        let mut drawer = CreateEventDrawer::new();
        drawer.open();
        fill(drawer.form_mut());

        let event = drawer.submit(&table).await.unwrap();
        assert_eq!(event.title, "Launch");
        assert!(!event.has_ended);
        assert!(!drawer.is_open());
        assert!(drawer.form().title.is_empty());
        assert_eq!(created_message(&event), "\"Launch\" has been created successfully.");
    }

    #[tokio::test]
    async fn test_create_failure_keeps_data() {
        let table = FailingTable::default();
        let mut drawer = CreateEventDrawer::new();
        drawer.open();
        fill(drawer.form_mut());

        let err = drawer.submit(&table).await.unwrap_err();
        assert!(matches!(err, DrawerError::Backend(_)));
        assert!(drawer.is_open());
        assert_eq!(drawer.form().title, "Launch");
    }

    #[tokio::test]
    async fn test_edit_round_trips_rich_description() {
        let table = MemoryEventTable::default();
        let mut create = CreateEventDrawer::new();
        fill(create.form_mut());
        let created = create.submit(&table).await.unwrap();

        let mut edit = EditEventDrawer::open(created.clone());
        assert_eq!(edit.form().description.plain_text(), "Kickoff");
        edit.form_mut().set(Field::Title, "Relaunch");
        let updated = edit.submit(&table).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "Relaunch");
        assert_eq!(
            Description::decode(&updated.description),
            Description::decode(&created.description)
        );
        assert!(!edit.is_open());
    }

    #[tokio::test]
    async fn test_edit_of_ended_event_is_refused() {
        let table = FailingTable::default();
        let mut event = crate::models::event::fixtures::event("Launch");
        event.has_ended = true;

        let mut edit = EditEventDrawer::open(event);
        assert!(matches!(edit.submit(&table).await, Err(DrawerError::Ended)));
        assert_eq!(table.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_edit_close_discards_changes() {
        let event = crate::models::event::fixtures::event("Launch");
        let mut edit = EditEventDrawer::open(event);
        edit.form_mut().set(Field::Title, "Changed");
        edit.close();
        assert_eq!(edit.form().title, "Launch");
    }
}
