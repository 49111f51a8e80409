//! Event form state shared by the create and edit drawers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, EventPatch, NewEvent};
use crate::richtext::{Description, RawDocument};

pub mod banner;
pub mod drawer;

pub use banner::{BannerError, BannerFile};
pub use drawer::{CreateEventDrawer, DrawerError, EditEventDrawer};

pub const TIMEZONES: [&str; 10] = [
    "WAT", "EST", "CST", "MST", "PST", "GMT", "CET", "JST", "AEST", "UTC",
];
pub const CREATE_DEFAULT_TIMEZONE: &str = "WAT";
pub const EDIT_DEFAULT_TIMEZONE: &str = "UTC";

const TITLE_REQUIRED: &str = "Event title is required";
const LOCATION_REQUIRED: &str = "Location is required";
const START_REQUIRED: &str = "Start date and time is required";
const START_INVALID: &str = "Start date and time is invalid";
const DESCRIPTION_REQUIRED: &str = "Description is required";

/// `datetime-local` input layout.
const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Location,
    StartDateTime,
    Timezone,
    TicketLink,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_image: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Accepts the `datetime-local` layout (with or without seconds, read as
/// UTC) or a full RFC 3339 timestamp.
pub fn parse_start(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, LOCAL_INPUT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DescriptionInput {
    Document(RawDocument),
    Text(String),
}

impl DescriptionInput {
    pub fn into_document(self) -> RawDocument {
        match self {
            DescriptionInput::Document(document) => document,
            DescriptionInput::Text(text) => Description::decode(&text).into_document(),
        }
    }
}

/// A submitted form as it arrives over HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventFormInput {
    pub title: String,
    pub location: String,
    pub start_date_time: String,
    pub timezone: Option<String>,
    pub description: Option<DescriptionInput>,
    pub speakers: Vec<String>,
    pub is_virtual: bool,
    pub ticket_link: Option<String>,
    pub banner_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub title: String,
    pub location: String,
    pub start_date_time: String,
    pub timezone: String,
    pub description: RawDocument,
    pub speakers: Vec<String>,
    pub speaker_input: String,
    pub is_virtual: bool,
    pub ticket_link: String,
    pub banner_image: String,
    pub errors: FormErrors,
}

impl Default for EventForm {
    fn default() -> Self {
        Self::blank()
    }
}

impl EventForm {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            location: String::new(),
            start_date_time: String::new(),
            timezone: CREATE_DEFAULT_TIMEZONE.to_string(),
            description: RawDocument::from_plain_text(""),
            speakers: Vec::new(),
            speaker_input: String::new(),
            is_virtual: false,
            ticket_link: String::new(),
            banner_image: String::new(),
            errors: FormErrors::default(),
        }
    }

    /// Prefill for editing. Stored descriptions that are not rich documents
    /// open as plain text.
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            location: event.location.clone(),
            start_date_time: event.start_date_time.format(LOCAL_INPUT_FORMAT).to_string(),
            timezone: event
                .timezone
                .clone()
                .unwrap_or_else(|| EDIT_DEFAULT_TIMEZONE.to_string()),
            description: Description::decode(&event.description).into_document(),
            speakers: event.speakers.clone(),
            speaker_input: String::new(),
            is_virtual: event.is_virtual,
            ticket_link: event.ticket_link.clone().unwrap_or_default(),
            banner_image: event.banner_image.clone().unwrap_or_default(),
            errors: FormErrors::default(),
        }
    }

    /// Editing a field clears its error.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Title => {
                self.title = value;
                self.errors.title = None;
            }
            Field::Location => {
                self.location = value;
                self.errors.location = None;
            }
            Field::StartDateTime => {
                self.start_date_time = value;
                self.errors.start_date_time = None;
            }
            Field::Timezone => self.timezone = value,
            Field::TicketLink => self.ticket_link = value,
        }
    }

    pub fn set_description(&mut self, document: RawDocument) {
        self.description = document;
        self.errors.description = None;
    }

    pub fn set_virtual(&mut self, is_virtual: bool) {
        self.is_virtual = is_virtual;
    }

    /// Appends the trimmed speaker input unless it is blank or already
    /// listed, then clears the input.
    pub fn add_speaker(&mut self) -> bool {
        let name = self.speaker_input.trim();
        if name.is_empty() || self.speakers.iter().any(|s| s == name) {
            return false;
        }
        self.speakers.push(name.to_string());
        self.speaker_input.clear();
        true
    }

    pub fn remove_speaker(&mut self, name: &str) -> bool {
        match self.speakers.iter().position(|s| s == name) {
            Some(index) => {
                self.speakers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces the form contents with a submitted form. Speakers go
    /// through the speaker editor, so blanks and duplicates drop out.
    pub fn apply(&mut self, input: EventFormInput) {
        self.set(Field::Title, input.title);
        self.set(Field::Location, input.location);
        self.set(Field::StartDateTime, input.start_date_time);
        if let Some(timezone) = input.timezone {
            self.set(Field::Timezone, timezone);
        }
        self.set_description(
            input
                .description
                .map(DescriptionInput::into_document)
                .unwrap_or_else(|| RawDocument::from_plain_text("")),
        );
        self.speakers.clear();
        for speaker in input.speakers {
            self.speaker_input = speaker;
            self.add_speaker();
        }
        self.speaker_input.clear();
        self.set_virtual(input.is_virtual);
        self.set(Field::TicketLink, input.ticket_link.unwrap_or_default());
        self.banner_image = input.banner_image.unwrap_or_default();
    }

    /// Recomputes the field errors; true when the form may be submitted.
    pub fn validate(&mut self) -> bool {
        let mut errors = FormErrors::default();
        if self.title.trim().is_empty() {
            errors.title = Some(TITLE_REQUIRED.to_string());
        }
        if self.location.trim().is_empty() {
            errors.location = Some(LOCATION_REQUIRED.to_string());
        }
        if self.start_date_time.trim().is_empty() {
            errors.start_date_time = Some(START_REQUIRED.to_string());
        } else if parse_start(&self.start_date_time).is_none() {
            errors.start_date_time = Some(START_INVALID.to_string());
        }
        if self.description.is_blank() {
            errors.description = Some(DESCRIPTION_REQUIRED.to_string());
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    fn persisted_description(&self) -> String {
        self.description
            .encode()
            .unwrap_or_else(|_| self.description.plain_text())
    }

    fn optional(value: &str) -> Option<String> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// `None` until the form validates.
    pub fn to_new_event(&self) -> Option<NewEvent> {
        Some(NewEvent {
            title: self.title.trim().to_string(),
            location: self.location.trim().to_string(),
            start_date_time: parse_start(&self.start_date_time)?,
            timezone: Self::optional(&self.timezone),
            description: self.persisted_description(),
            speakers: self.speakers.clone(),
            is_virtual: self.is_virtual,
            ticket_link: Self::optional(&self.ticket_link),
            banner_image: Self::optional(&self.banner_image),
            has_ended: false,
        })
    }

    /// Full-form update; `hasEnded` is never touched here.
    pub fn to_patch(&self) -> Option<EventPatch> {
        Some(EventPatch {
            title: Some(self.title.trim().to_string()),
            location: Some(self.location.trim().to_string()),
            start_date_time: Some(parse_start(&self.start_date_time)?),
            timezone: Some(Self::optional(&self.timezone)),
            description: Some(self.persisted_description()),
            speakers: Some(self.speakers.clone()),
            is_virtual: Some(self.is_virtual),
            ticket_link: Some(Self::optional(&self.ticket_link)),
            banner_image: Some(Self::optional(&self.banner_image)),
            has_ended: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::fixtures::event;
    use chrono::TimeZone;

    fn filled() -> EventForm {
        let mut form = EventForm::blank();
        form.set(Field::Title, "Launch");
        form.set(Field::Location, "HQ");
        form.set(Field::StartDateTime, "2025-01-01T10:00");
        form.set_description(RawDocument::from_plain_text("Kickoff"));
        form
    }

    #[test]
    fn test_blank_fields_block_submission() {
        let mut form = filled();
        form.set(Field::Title, "   ");
        form.set_description(RawDocument::from_plain_text(" \n "));

        assert!(!form.validate());
        assert_eq!(form.errors.title.as_deref(), Some(TITLE_REQUIRED));
        assert_eq!(form.errors.description.as_deref(), Some(DESCRIPTION_REQUIRED));
        assert!(form.errors.location.is_none());
        assert!(form.errors.start_date_time.is_none());
    }

    #[test]
    fn test_every_required_field_reported() {
        let mut form = EventForm::blank();
        assert!(!form.validate());
        assert!(form.errors.title.is_some());
        assert!(form.errors.location.is_some());
        assert_eq!(form.errors.start_date_time.as_deref(), Some(START_REQUIRED));
        assert!(form.errors.description.is_some());
    }

    #[test]
    fn test_unparsable_start_is_an_error() {
        let mut form = filled();
        form.set(Field::StartDateTime, "next tuesday");
        assert!(!form.validate());
        assert_eq!(form.errors.start_date_time.as_deref(), Some(START_INVALID));
    }

    #[test]
    fn test_editing_field_clears_its_error() {
        let mut form = EventForm::blank();
        form.validate();
        form.set(Field::Title, "Launch");
        assert!(form.errors.title.is_none());
        assert!(form.errors.location.is_some());
    }

    #[test]
    fn test_add_speaker() {
        let mut form = EventForm::blank();
        form.speaker_input = "  Ada  ".to_string();
        assert!(form.add_speaker());
        assert_eq!(form.speakers, vec!["Ada"]);
        assert!(form.speaker_input.is_empty());

        form.speaker_input = "Ada".to_string();
        assert!(!form.add_speaker());
        assert_eq!(form.speakers, vec!["Ada"]);

        form.speaker_input = "ada".to_string();
        assert!(form.add_speaker());

        form.speaker_input = "   ".to_string();
        assert!(!form.add_speaker());
        assert_eq!(form.speakers, vec!["Ada", "ada"]);
    }

    #[test]
    fn test_remove_speaker_touches_only_the_match() {
        let mut form = EventForm::blank();
        form.speakers = vec!["Ada".to_string(), "Grace".to_string(), "Linus".to_string()];
        assert!(form.remove_speaker("Grace"));
        assert_eq!(form.speakers, vec!["Ada", "Linus"]);
        assert!(!form.remove_speaker("grace"));
        assert_eq!(form.speakers, vec!["Ada", "Linus"]);
    }

    #[test]
    fn test_new_event_is_trimmed_and_not_ended() {
        let mut form = filled();
        form.set(Field::Title, "  Launch ");
        form.set(Field::TicketLink, "   ");
        assert!(form.validate());

        let new_event = form.to_new_event().unwrap();
        assert_eq!(new_event.title, "Launch");
        assert_eq!(
            new_event.start_date_time,
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(new_event.timezone.as_deref(), Some("WAT"));
        assert_eq!(new_event.ticket_link, None);
        assert!(!new_event.has_ended);
        assert_eq!(
            Description::decode(&new_event.description).plain_text(),
            "Kickoff"
        );
    }

    #[test]
    fn test_from_event_decodes_legacy_description() {
        let mut stored = event("Launch");
        stored.description = "Line one\nLine two".to_string();
        stored.timezone = None;

        let form = EventForm::from_event(&stored);
        assert_eq!(form.start_date_time, "2025-01-01T10:00");
        assert_eq!(form.timezone, EDIT_DEFAULT_TIMEZONE);
        assert_eq!(form.description.blocks.len(), 2);
    }

    #[test]
    fn test_apply_input_dedups_speakers() {
        let input: EventFormInput = serde_json::from_value(serde_json::json!({
            "title": "Launch",
            "location": "HQ",
            "startDateTime": "2025-01-01T10:00",
            "description": "Kickoff",
            "speakers": ["Ada", " Ada ", "", "Grace"],
            "isVirtual": true
        }))
        .unwrap();

        let mut form = EventForm::blank();
        form.apply(input);
        assert_eq!(form.speakers, vec!["Ada", "Grace"]);
        assert!(form.is_virtual);
        assert!(form.validate());
    }

    #[test]
    fn test_parse_start_variants() {
        assert!(parse_start("2025-01-01T10:00").is_some());
        assert!(parse_start("2025-01-01T10:00:30").is_some());
        assert_eq!(
            parse_start("2025-01-01T10:00:00+01:00"),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap())
        );
        assert!(parse_start("").is_none());
    }
}
