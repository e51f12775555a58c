//! Page-advance policy for the invoice listing endpoint.
//!
//! Zoho's `has_more_page` flag is not always accurate, so a full page is
//! treated as a hint that another page may exist even when the flag says
//! otherwise. Two empty pages in a row end the walk regardless of the flag,
//! and the page counter is capped.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ConsecutiveEmptyPages,
    Exhausted,
    PageLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Fetch(u32),
    Stop(StopReason),
}

const EMPTY_PAGES_BEFORE_STOP: u32 = 2;

#[derive(Debug, Clone)]
pub struct Paginator {
    page: u32,
    page_size: u32,
    max_pages: u32,
    consecutive_empty: u32,
}

impl Paginator {
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page: 1,
            page_size,
            max_pages,
            consecutive_empty: 0,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    /// Records the outcome of the current page. `fetched` is the raw record
    /// count returned by the provider, before any client-side filtering.
    pub fn advance(&mut self, fetched: usize, has_more_page: bool) -> PageStep {
        if fetched == 0 {
            self.consecutive_empty += 1;
            if self.consecutive_empty >= EMPTY_PAGES_BEFORE_STOP {
                return PageStep::Stop(StopReason::ConsecutiveEmptyPages);
            }
        } else {
            self.consecutive_empty = 0;
            let full_page = fetched == self.page_size as usize;
            if !has_more_page && !full_page {
                return PageStep::Stop(StopReason::Exhausted);
            }
        }

        self.page += 1;
        if self.page > self.max_pages {
            return PageStep::Stop(StopReason::PageLimit);
        }
        PageStep::Fetch(self.page)
    }
}
