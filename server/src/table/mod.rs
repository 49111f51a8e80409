//! Generic paginated, sortable grid over any row type.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod pagination;

pub use pagination::{
    server_range, ClientPagination, PaginationStrategy, ServerPagination, DEFAULT_PAGE_SIZE,
    PAGE_SIZE_OPTIONS,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Text(String),
    Number(i64),
    Flag(bool),
    Time(DateTime<Utc>),
}

type CellFn<R> = Box<dyn Fn(&R) -> String + Send + Sync>;
type SortFn<R> = Box<dyn Fn(&R) -> SortValue + Send + Sync>;

pub struct Column<R> {
    pub key: &'static str,
    pub header: &'static str,
    cell: CellFn<R>,
    sort_value: Option<SortFn<R>>,
}

impl<R> Column<R> {
    pub fn new<F>(key: &'static str, header: &'static str, cell: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        Self {
            key,
            header,
            cell: Box::new(cell),
            sort_value: None,
        }
    }

    pub fn sortable_by<F>(mut self, sort_value: F) -> Self
    where
        F: Fn(&R) -> SortValue + Send + Sync + 'static,
    {
        self.sort_value = Some(Box::new(sort_value));
        self
    }

    pub fn can_sort(&self) -> bool {
        self.sort_value.is_some()
    }

    pub fn render(&self, row: &R) -> String {
        (self.cell)(row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// At most one sorted column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sorting {
    column: Option<(String, SortDirection)>,
}

impl Sorting {
    /// Header click: ascending, then descending, then unsorted. Another
    /// column starts over at ascending.
    pub fn toggle(&mut self, key: &str) {
        self.column = match self.column.take() {
            Some((current, SortDirection::Asc)) if current == key => {
                Some((current, SortDirection::Desc))
            }
            Some((current, SortDirection::Desc)) if current == key => None,
            _ => Some((key.to_string(), SortDirection::Asc)),
        };
    }

    pub fn set(&mut self, key: &str, direction: SortDirection) {
        self.column = Some((key.to_string(), direction));
    }

    pub fn clear(&mut self) {
        self.column = None;
    }

    pub fn direction_of(&self, key: &str) -> Option<SortDirection> {
        match &self.column {
            Some((current, direction)) if current == key => Some(*direction),
            _ => None,
        }
    }

    pub fn active(&self) -> Option<(&str, SortDirection)> {
        self.column
            .as_ref()
            .map(|(key, direction)| (key.as_str(), *direction))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderView {
    pub key: &'static str,
    pub label: &'static str,
    pub sortable: bool,
    pub sorted: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub position: usize,
    pub key: Option<String>,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FooterView {
    pub summary: String,
    pub page_label: String,
    pub page_index: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub can_previous: bool,
    pub can_next: bool,
    pub page_size_options: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub headers: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub footer: FooterView,
}

pub struct Table<R, P> {
    rows: Vec<R>,
    columns: Vec<Column<R>>,
    row_key: Option<CellFn<R>>,
    sorting: Sorting,
    pagination: P,
}

impl<R> Table<R, ClientPagination> {
    /// In-memory pagination over the full row set.
    pub fn new(rows: Vec<R>, columns: Vec<Column<R>>) -> Self {
        Self::with_pagination(rows, columns, ClientPagination::default())
    }
}

impl<R, F: FnMut(usize)> Table<R, ServerPagination<F>> {
    /// `rows` is the page the caller fetched.
    pub fn server(rows: Vec<R>, columns: Vec<Column<R>>, pagination: ServerPagination<F>) -> Self {
        Self::with_pagination(rows, columns, pagination)
    }
}

impl<R, P: PaginationStrategy> Table<R, P> {
    pub fn with_pagination(rows: Vec<R>, columns: Vec<Column<R>>, pagination: P) -> Self {
        Self {
            rows,
            columns,
            row_key: None,
            sorting: Sorting::default(),
            pagination,
        }
    }

    pub fn with_row_key<F>(mut self, row_key: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        self.row_key = Some(Box::new(row_key));
        self
    }

    fn column(&self, key: &str) -> Option<&Column<R>> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Returns false for unknown or unsortable columns.
    pub fn toggle_sort(&mut self, key: &str) -> bool {
        if !self.column(key).is_some_and(Column::can_sort) {
            return false;
        }
        self.sorting.toggle(key);
        true
    }

    pub fn sort_by(&mut self, key: &str, direction: SortDirection) -> bool {
        if !self.column(key).is_some_and(Column::can_sort) {
            return false;
        }
        self.sorting.set(key, direction);
        true
    }

    pub fn sorting(&self) -> &Sorting {
        &self.sorting
    }

    pub fn pagination(&self) -> &P {
        &self.pagination
    }

    pub fn next_page(&mut self) {
        self.pagination.next(self.rows.len());
    }

    pub fn previous_page(&mut self) {
        self.pagination.previous(self.rows.len());
    }

    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        self.pagination.set_page_size(page_size, self.rows.len())
    }

    fn ordered(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        let sorter = self.sorting.active().and_then(|(key, direction)| {
            self.column(key)
                .and_then(|c| c.sort_value.as_ref())
                .map(|f| (f, direction))
        });
        if let Some((sort_value, direction)) = sorter {
            let values: Vec<SortValue> = self.rows.iter().map(|r| sort_value(r)).collect();
            order.sort_by(|a, b| {
                let ordering: Ordering = values[*a].cmp(&values[*b]);
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        order
    }

    fn visible(&self) -> Vec<usize> {
        let range = self.pagination.visible(self.rows.len());
        self.ordered()
            .into_iter()
            .skip(range.start)
            .take(range.len())
            .collect()
    }

    /// The original row behind a visible position, as a row click sees it.
    pub fn row(&self, position: usize) -> Option<&R> {
        self.visible().get(position).map(|i| &self.rows[*i])
    }

    pub fn view(&self) -> TableView {
        let headers = self
            .columns
            .iter()
            .map(|c| HeaderView {
                key: c.key,
                label: c.header,
                sortable: c.can_sort(),
                sorted: self.sorting.direction_of(c.key),
            })
            .collect();

        let rows = self
            .visible()
            .into_iter()
            .enumerate()
            .map(|(position, i)| {
                let row = &self.rows[i];
                RowView {
                    position,
                    key: self.row_key.as_ref().map(|f| f(row)),
                    cells: self.columns.iter().map(|c| c.render(row)).collect(),
                }
            })
            .collect();

        TableView {
            headers,
            rows,
            footer: self.footer(),
        }
    }

    fn footer(&self) -> FooterView {
        let loaded = self.rows.len();
        let p = &self.pagination;
        let total = p.total_rows(loaded);
        let page_size = p.page_size();
        let page_index = p.page_index();
        let page_count = p.page_count(loaded);

        let (from, to) = if total == 0 {
            (0, 0)
        } else {
            (
                page_index.saturating_mul(page_size).saturating_add(1).min(total),
                page_index.saturating_add(1).saturating_mul(page_size).min(total),
            )
        };

        FooterView {
            summary: format!("Showing {} to {} of {} entries", from, to, total),
            page_label: format!("Page {} of {}", page_index.saturating_add(1), page_count.max(1)),
            page_index,
            page_count,
            page_size,
            can_previous: p.can_previous(),
            can_next: p.can_next(loaded),
            page_size_options: p.page_size_options().map(<[usize]>::to_vec),
        }
    }
}
