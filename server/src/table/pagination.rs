use std::ops::Range;

pub const PAGE_SIZE_OPTIONS: [usize; 6] = [5, 10, 20, 30, 40, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest row position a backend range may name. SQL `OFFSET` is a signed
/// 64-bit value.
pub const MAX_ROW_OFFSET: u64 = i64::MAX as u64;

/// Row range a server-side page asks the backend for: `[p*n, p*n + n - 1]`.
/// `None` when that range does not fit below `MAX_ROW_OFFSET`.
pub fn server_range(page: usize, page_size: usize) -> Option<(u64, u64)> {
    let size = page_size.max(1) as u64;
    let from = (page as u64).checked_mul(size)?;
    let to = from.checked_add(size - 1)?;
    (to <= MAX_ROW_OFFSET).then_some((from, to))
}

/// How a table splits its rows into pages. `loaded` is always the number
/// of rows the table currently holds.
pub trait PaginationStrategy {
    fn page_index(&self) -> usize;

    fn page_size(&self) -> usize;

    fn total_rows(&self, loaded: usize) -> usize;

    /// Positions of `loaded` rows shown on the current page.
    fn visible(&self, loaded: usize) -> Range<usize>;

    fn previous(&mut self, loaded: usize);

    fn next(&mut self, loaded: usize);

    fn page_size_options(&self) -> Option<&'static [usize]> {
        None
    }

    fn set_page_size(&mut self, _page_size: usize, _loaded: usize) -> bool {
        false
    }

    fn page_count(&self, loaded: usize) -> usize {
        self.total_rows(loaded).div_ceil(self.page_size())
    }

    fn can_previous(&self) -> bool {
        self.page_index() > 0
    }

    fn can_next(&self, loaded: usize) -> bool {
        self.page_index().saturating_add(1) < self.page_count(loaded)
    }
}

/// The whole dataset is in memory; paging slices it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPagination {
    page_index: usize,
    page_size: usize,
}

impl ClientPagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn at_page(mut self, page_index: usize, loaded: usize) -> Self {
        let last = self.page_count(loaded).saturating_sub(1);
        self.page_index = page_index.min(last);
        self
    }
}

impl Default for ClientPagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PaginationStrategy for ClientPagination {
    fn page_index(&self) -> usize {
        self.page_index
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn total_rows(&self, loaded: usize) -> usize {
        loaded
    }

    fn visible(&self, loaded: usize) -> Range<usize> {
        let start = self.page_index.saturating_mul(self.page_size).min(loaded);
        let end = start.saturating_add(self.page_size).min(loaded);
        start..end
    }

    fn previous(&mut self, _loaded: usize) {
        if self.can_previous() {
            self.page_index -= 1;
        }
    }

    fn next(&mut self, loaded: usize) {
        if self.can_next(loaded) {
            self.page_index += 1;
        }
    }

    fn page_size_options(&self) -> Option<&'static [usize]> {
        Some(&PAGE_SIZE_OPTIONS)
    }

    /// Keeps the first visible row on screen.
    fn set_page_size(&mut self, page_size: usize, _loaded: usize) -> bool {
        if page_size == 0 {
            return false;
        }
        let top_row = self.page_index.saturating_mul(self.page_size);
        self.page_size = page_size;
        self.page_index = top_row / page_size;
        true
    }
}

/// The caller owns paging: rows handed to the table are exactly the
/// current page and page moves are reported through `on_page_change`.
pub struct ServerPagination<F> {
    total_count: usize,
    current_page: usize,
    page_size: usize,
    on_page_change: F,
}

impl<F: FnMut(usize)> ServerPagination<F> {
    pub fn new(total_count: usize, current_page: usize, page_size: usize, on_page_change: F) -> Self {
        Self {
            total_count,
            current_page,
            page_size: page_size.max(1),
            on_page_change,
        }
    }
}

impl<F: FnMut(usize)> PaginationStrategy for ServerPagination<F> {
    fn page_index(&self) -> usize {
        self.current_page
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn total_rows(&self, _loaded: usize) -> usize {
        self.total_count
    }

    fn visible(&self, loaded: usize) -> Range<usize> {
        0..loaded
    }

    fn previous(&mut self, _loaded: usize) {
        if self.can_previous() {
            (self.on_page_change)(self.current_page - 1);
        }
    }

    fn next(&mut self, loaded: usize) {
        if self.can_next(loaded) {
            (self.on_page_change)(self.current_page + 1);
        }
    }
}
