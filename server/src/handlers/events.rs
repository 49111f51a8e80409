use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{find_event, EventTable};
use crate::detail::{
    ActionAvailability, ActionOutcome, DetailAction, EventDetailDrawer, EventDetails,
};
use crate::forms::banner::{self, BannerFile};
use crate::forms::drawer::{created_message, updated_message};
use crate::forms::{CreateEventDrawer, DrawerError, EditEventDrawer, EventForm, EventFormInput};
use crate::list::{EventListPage, ListView};
use crate::models::Event;
use crate::state::AppState;
use crate::table::SortDirection;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub page: Option<usize>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListParams {
    fn sort(&self) -> Result<Option<(&str, SortDirection)>, AppError> {
        let Some(key) = self.sort.as_deref() else {
            return Ok(None);
        };
        let direction = match self.order.as_deref() {
            None => SortDirection::Asc,
            Some(order) => SortDirection::parse(order).ok_or_else(|| {
                AppError::ValidationError(format!("Unknown sort order '{}'", order))
            })?,
        };
        Ok(Some((key, direction)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfirmRequest {
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveBannerRequest {
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventWithList {
    event: Event,
    list: ListView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetailPayload {
    details: EventDetails,
    availability: ActionAvailability,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionPayload {
    action: DetailAction,
    details: Option<EventDetails>,
    availability: Option<ActionAvailability>,
    list: Option<ListView>,
}

#[derive(Serialize)]
struct UploadedBanner {
    url: String,
}

async fn event_or_404(events: &dyn EventTable, id: Uuid) -> Result<Event, AppError> {
    find_event(events, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", id)))
}

/// List page for `params.page`, checked before anything is written.
fn list_page(state: &AppState, params: &ListParams) -> Result<EventListPage, AppError> {
    let page = EventListPage::new(state.config.events_page_size);
    let index = page.check_page(params.page.unwrap_or(0))?;
    Ok(page.with_current_page(index))
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let sort = params.sort()?;
    let events = state.backend.events.as_ref();
    let mut page = EventListPage::new(state.config.events_page_size);
    match params.page {
        Some(index) => {
            let index = page.check_page(index)?;
            page.fetch(events, index).await
        }
        None => page.mount(events).await,
    };
    let view = page.view(sort)?;
    Ok(success(view, "Events retrieved successfully"))
}

pub async fn create_event(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    Json(input): Json<EventFormInput>,
) -> Result<Response, AppError> {
    let events = state.backend.events.as_ref();
    let mut page = list_page(&state, &params)?;
    let mut drawer = CreateEventDrawer::new();
    drawer.open();
    drawer.form_mut().apply(input);
    let event = drawer.submit(events).await?;

    page.on_created(events).await;
    let list = page.view(params.sort()?)?;

    let message = created_message(&event);
    Ok(created(EventWithList { event, list }, message))
}

pub async fn event_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = event_or_404(state.backend.events.as_ref(), id).await?;
    let drawer = EventDetailDrawer::open(event);
    let payload = DetailPayload {
        details: drawer.details(),
        availability: drawer.availability(),
    };
    Ok(success(payload, "Event retrieved successfully"))
}

pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = event_or_404(state.backend.events.as_ref(), id).await?;
    if event.has_ended {
        return Err(DrawerError::Ended.into());
    }
    let drawer = EditEventDrawer::open(event);
    Ok(success(drawer.form(), "Event loaded for editing"))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
    Json(input): Json<EventFormInput>,
) -> Result<Response, AppError> {
    let events = state.backend.events.as_ref();
    let mut page = list_page(&state, &params)?;
    let event = event_or_404(events, id).await?;
    let mut drawer = EditEventDrawer::open(event);
    drawer.form_mut().apply(input);
    let event = drawer.submit(events).await?;

    page.refresh(events).await;
    let list = page.view(params.sort()?)?;

    let message = updated_message(&event);
    Ok(success(EventWithList { event, list }, message))
}

/// Shared by End and Delete: without `confirm` the dialog is returned and
/// nothing changes.
async fn run_action(
    state: &AppState,
    id: Uuid,
    action: DetailAction,
    confirm: bool,
    mut list_page: EventListPage,
) -> Result<Response, AppError> {
    let events = state.backend.events.as_ref();
    let event = event_or_404(events, id).await?;
    let mut drawer = EventDetailDrawer::open(event);
    let dialog = drawer.request(action)?;
    if !confirm {
        return Ok(success(dialog, "Confirmation required"));
    }

    let mut refresh_requested = false;
    let outcome = drawer
        .confirm(events, || refresh_requested = true)
        .await?;

    let list = if refresh_requested {
        list_page.refresh(events).await;
        Some(list_page.view(None)?)
    } else {
        None
    };

    let message = outcome.message();
    let (details, availability) = match &outcome {
        ActionOutcome::Ended(_) => (Some(drawer.details()), Some(drawer.availability())),
        _ => (None, None),
    };
    let payload = ActionPayload {
        action,
        details,
        availability,
        list,
    };
    Ok(success(payload, message))
}

pub async fn end_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Response, AppError> {
    let page = list_page(&state, &params)?;
    run_action(&state, id, DetailAction::End, request.confirm, page).await
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Response, AppError> {
    let page = list_page(&state, &params)?;
    run_action(&state, id, DetailAction::Delete, request.confirm, page).await
}

pub async fn upload_banner(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("banner").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;

        let file = BannerFile {
            file_name,
            content_type,
            bytes,
        };
        let mut form = EventForm::blank();
        let url = form
            .upload_banner(state.backend.storage.as_ref(), &state.config.banner_bucket, file)
            .await?;
        return Ok(success(UploadedBanner { url }, "Image uploaded successfully"));
    }

    Err(AppError::ValidationError("No file provided".to_string()))
}

pub async fn remove_banner(
    State(state): State<AppState>,
    Json(request): Json<RemoveBannerRequest>,
) -> Result<Response, AppError> {
    banner::remove(
        state.backend.storage.as_ref(),
        &state.config.banner_bucket,
        &request.url,
    )
    .await?;
    Ok(empty_success("Image removed successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_params() {
        let params = ListParams {
            page: None,
            sort: Some("title".to_string()),
            order: Some("DESC".to_string()),
        };
        assert_eq!(params.sort().unwrap(), Some(("title", SortDirection::Desc)));

        let bad = ListParams {
            order: Some("sideways".to_string()),
            ..params
        };
        assert!(bad.sort().is_err());
        assert_eq!(ListParams::default().sort().unwrap(), None);
    }
}
