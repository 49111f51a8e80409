//! The events list page: which page is shown, what is in flight, and the
//! table built over the loaded rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, EventColumn, EventTable, SelectQuery, SelectResult};
use crate::models::Event;
use crate::table::{
    server_range, Column, ServerPagination, SortDirection, SortValue, Table, TableView,
    DEFAULT_PAGE_SIZE,
};

pub const LOAD_FAILED: &str = "Failed to load events";

/// `Jan 1, 2025`
pub fn format_short(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

pub fn speakers_label(speakers: &[String]) -> String {
    match speakers.len() {
        0 => "TBD".to_string(),
        1 => "1 speaker".to_string(),
        n => format!("{} speakers", n),
    }
}

pub fn event_columns() -> Vec<Column<Event>> {
    vec![
        Column::new("title", "Event Title", |e: &Event| e.title.clone())
            .sortable_by(|e| SortValue::Text(e.title.to_lowercase())),
        Column::new("startDateTime", "Date", |e: &Event| format_short(e.start_date_time))
            .sortable_by(|e| SortValue::Time(e.start_date_time)),
        Column::new("location", "Location", |e: &Event| e.location.clone())
            .sortable_by(|e| SortValue::Text(e.location.to_lowercase())),
        Column::new("isVirtual", "Type", |e: &Event| e.kind_label().to_string())
            .sortable_by(|e| SortValue::Flag(e.is_virtual)),
        Column::new("hasEnded", "Status", |e: &Event| e.status_label().to_string())
            .sortable_by(|e| SortValue::Flag(e.has_ended)),
        Column::new("speakers", "Speakers", |e: &Event| speakers_label(&e.speakers))
            .sortable_by(|e| SortValue::Number(e.speakers.len() as i64)),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    pub rows: Vec<Event>,
    pub total_count: usize,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Failed(String),
    Loaded(EventPage),
}

/// Identifies one issued fetch. Only the most recent ticket is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    page: usize,
}

impl FetchTicket {
    pub fn page(&self) -> usize {
        self.page
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub table: TableView,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListViewError {
    #[error("Events are still loading")]
    Loading,

    #[error("{0}")]
    Failed(String),

    #[error("Cannot sort by '{0}'")]
    UnknownSort(String),

    #[error("Page {0} is out of range")]
    PageOutOfRange(usize),
}

#[derive(Debug)]
pub struct EventListPage {
    page_size: usize,
    current_page: usize,
    generation: u64,
    state: ListState,
}

impl Default for EventListPage {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl EventListPage {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 0,
            generation: 0,
            state: ListState::Loading,
        }
    }

    /// Starts on `page`, as when the caller already shows that page.
    pub fn with_current_page(mut self, page: usize) -> Self {
        self.current_page = page;
        self
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Newest first, with an exact total for the pager. `None` when `page`
    /// lies beyond any addressable row.
    pub fn query(&self, page: usize) -> Option<SelectQuery> {
        let (from, to) = server_range(page, self.page_size)?;
        Some(
            SelectQuery::new()
                .count_exact()
                .order(EventColumn::CreatedAt, false)
                .range(from, to),
        )
    }

    /// Checks a requested page index before it is fetched.
    pub fn check_page(&self, page: usize) -> Result<usize, ListViewError> {
        match server_range(page, self.page_size) {
            Some(_) => Ok(page),
            None => Err(ListViewError::PageOutOfRange(page)),
        }
    }

    pub fn begin(&mut self, page: usize) -> FetchTicket {
        self.generation += 1;
        self.state = ListState::Loading;
        FetchTicket {
            generation: self.generation,
            page,
        }
    }

    /// Applies a response. Returns false when a newer fetch was issued
    /// after `ticket` and the response was dropped.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<SelectResult, BackendError>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(page = ticket.page, "Dropping stale events response");
            return false;
        }
        match result {
            Ok(SelectResult { rows, count }) => {
                let total_count = count.map(|c| c as usize).unwrap_or(rows.len());
                self.current_page = ticket.page;
                self.state = ListState::Loaded(EventPage {
                    rows,
                    total_count,
                    page: ticket.page,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, page = ticket.page, "Error fetching events");
                self.state = ListState::Failed(LOAD_FAILED.to_string());
            }
        }
        true
    }

    pub async fn fetch(&mut self, events: &dyn EventTable, page: usize) -> &ListState {
        let Some(query) = self.query(page) else {
            tracing::warn!(page, "Refusing to fetch an unaddressable events page");
            self.state = ListState::Failed(LOAD_FAILED.to_string());
            return &self.state;
        };
        let ticket = self.begin(page);
        let result = events.select(&query).await;
        self.complete(ticket, result);
        &self.state
    }

    pub async fn mount(&mut self, events: &dyn EventTable) -> &ListState {
        self.fetch(events, 0).await
    }

    pub async fn on_created(&mut self, events: &dyn EventTable) -> &ListState {
        self.fetch(events, self.current_page).await
    }

    /// Refetch after an end/delete. A page emptied by a delete steps back
    /// to the one before it.
    pub async fn refresh(&mut self, events: &dyn EventTable) -> &ListState {
        let page = self.current_page;
        self.fetch(events, page).await;
        let emptied = matches!(&self.state, ListState::Loaded(loaded) if loaded.rows.is_empty());
        if emptied && page > 0 {
            self.fetch(events, page - 1).await;
        }
        &self.state
    }

    /// Table over the loaded page; `None` while loading or after a failure.
    /// Serializable view of the loaded page with `sort` applied to its rows.
    pub fn view(&self, sort: Option<(&str, SortDirection)>) -> Result<ListView, ListViewError> {
        let loaded = match &self.state {
            ListState::Loaded(loaded) => loaded,
            ListState::Failed(message) => return Err(ListViewError::Failed(message.clone())),
            ListState::Loading => return Err(ListViewError::Loading),
        };
        let mut table = self
            .table(|_| {})
            .ok_or(ListViewError::Loading)?;
        if let Some((key, direction)) = sort {
            if !table.sort_by(key, direction) {
                return Err(ListViewError::UnknownSort(key.to_string()));
            }
        }
        Ok(ListView {
            page: loaded.page,
            page_size: self.page_size,
            total_count: loaded.total_count,
            table: table.view(),
        })
    }

    pub fn table<F: FnMut(usize)>(&self, on_page_change: F) -> Option<Table<Event, ServerPagination<F>>> {
        let ListState::Loaded(loaded) = &self.state else {
            return None;
        };
        let pagination =
            ServerPagination::new(loaded.total_count, loaded.page, self.page_size, on_page_change);
        Some(
            Table::server(loaded.rows.clone(), event_columns(), pagination)
                .with_row_key(|e: &Event| e.id.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryEventTable;
    use crate::models::event::fixtures;
    use crate::table::PaginationStrategy;
    use chrono::Duration;

    fn rows(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| {
                let mut event = fixtures::event(&format!("Event {}", i));
                event.created_at += Duration::minutes(i as i64);
                event
            })
            .collect()
    }

    #[test]
    fn test_labels() {
        assert_eq!(speakers_label(&[]), "TBD");
        assert_eq!(speakers_label(&["Ada".to_string()]), "1 speaker");
        assert_eq!(speakers_label(&["Ada".to_string(), "Lin".to_string()]), "2 speakers");
        assert_eq!(format_short(fixtures::event("x").start_date_time), "Jan 1, 2025");
    }

    #[tokio::test]
    async fn test_mount_loads_newest_first() {
        let table = MemoryEventTable::with_rows(rows(12));
        let mut page = EventListPage::default();
        page.mount(&table).await;

        let ListState::Loaded(loaded) = page.state() else {
            panic!("expected loaded state");
        };
        assert_eq!(loaded.total_count, 12);
        assert_eq!(loaded.rows.len(), 10);
        assert_eq!(loaded.rows[0].title, "Event 11");
    }

    #[tokio::test]
    async fn test_table_controls_follow_total() {
        let table = MemoryEventTable::with_rows(rows(12));
        let mut page = EventListPage::default();
        page.fetch(&table, 1).await;

        let mut requested = Vec::new();
        let view = {
            let mut grid = page.table(|p| requested.push(p)).unwrap();
            assert!(grid.pagination().can_previous());
            assert!(!grid.pagination().can_next(2));
            grid.previous_page();
            grid.view()
        };
        assert_eq!(requested, vec![0]);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.footer.summary, "Showing 11 to 12 of 12 entries");
        assert_eq!(view.rows[0].cells[3], "In-Person");
        assert_eq!(view.rows[0].cells[4], "Upcoming");
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mut page = EventListPage::default();
        let first = page.begin(0);
        let second = page.begin(1);

        let newer = SelectResult {
            rows: vec![fixtures::event("newer")],
            count: Some(11),
        };
        assert!(page.complete(second, Ok(newer)));
        let older = SelectResult {
            rows: vec![fixtures::event("older")],
            count: Some(11),
        };
        assert!(!page.complete(first, Ok(older)));

        assert_eq!(page.current_page(), 1);
        let ListState::Loaded(loaded) = page.state() else {
            panic!("expected loaded state");
        };
        assert_eq!(loaded.rows[0].title, "newer");
    }

    #[test]
    fn test_failure_keeps_current_page() {
        let mut page = EventListPage::default();
        let ticket = page.begin(0);
        page.complete(ticket, Ok(SelectResult::default()));
        let ticket = page.begin(3);
        page.complete(ticket, Err(BackendError::Transport("timeout".to_string())));

        assert_eq!(page.current_page(), 0);
        assert_eq!(page.state(), &ListState::Failed(LOAD_FAILED.to_string()));
        assert!(page.table(|_| {}).is_none());
    }

    #[tokio::test]
    async fn test_view_sorts_loaded_rows() {
        let mut events = rows(3);
        events[0].location = "Accra".to_string();
        let table = MemoryEventTable::with_rows(events);
        let mut page = EventListPage::default();
        page.mount(&table).await;

        let view = page.view(Some(("location", SortDirection::Asc))).unwrap();
        assert_eq!(view.total_count, 3);
        assert_eq!(view.table.rows[0].cells[2], "Accra");
        assert_eq!(
            page.view(Some(("nope", SortDirection::Asc))).unwrap_err(),
            ListViewError::UnknownSort("nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_refresh_steps_back_from_emptied_page() {
        let events = rows(11);
        let oldest = events[0].id;
        let table = MemoryEventTable::with_rows(events);
        let mut page = EventListPage::default();
        page.fetch(&table, 1).await;
        assert_eq!(page.current_page(), 1);

        table.delete(&crate::backend::Filter::Id(oldest)).await.unwrap();
        page.refresh(&table).await;

        assert_eq!(page.current_page(), 0);
        let ListState::Loaded(loaded) = page.state() else {
            panic!("expected loaded state");
        };
        assert_eq!(loaded.rows.len(), 10);
    }

    #[tokio::test]
    async fn test_unaddressable_page_is_refused() {
        let table = MemoryEventTable::with_rows(rows(3));
        let mut page = EventListPage::default();
        assert_eq!(page.check_page(2), Ok(2));
        assert_eq!(
            page.check_page(usize::MAX),
            Err(ListViewError::PageOutOfRange(usize::MAX))
        );
        assert!(page.query(usize::MAX).is_none());

        page.fetch(&table, usize::MAX).await;
        assert_eq!(page.state(), &ListState::Failed(LOAD_FAILED.to_string()));
        assert_eq!(page.current_page(), 0);
    }
}
