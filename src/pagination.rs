use serde::{Deserialize, Serialize};

const MAX_LIMIT: u32 = 100;

/// `?page=&limit=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageQuery {
    pub fn resolve(self, default_limit: u32) -> PageWindow {
        PageWindow {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

impl PageWindow {
    pub fn limit(&self) -> i64 {
        self.limit as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(window: PageWindow, count: i64, results: Vec<T>) -> Self {
        let seen = window.offset() + window.limit();
        Self {
            count,
            next: (seen < count).then_some(window.page + 1),
            previous: (window.page > 1).then(|| window.page - 1),
            results,
        }
    }

    pub fn empty(window: PageWindow) -> Self {
        Self::new(window, 0, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let w = PageQuery::default().resolve(6);
        assert_eq!(w, PageWindow { page: 1, limit: 6 });

        let w = PageQuery { page: Some(0), limit: Some(1000) }.resolve(6);
        assert_eq!(w, PageWindow { page: 1, limit: 100 });
        assert_eq!(w.offset(), 0);
    }

    #[test]
    fn next_and_previous_pages() {
        let w = PageQuery { page: Some(2), limit: Some(5) }.resolve(6);
        assert_eq!(w.offset(), 5);

        let page = Page::new(w, 11, vec![1, 2, 3, 4, 5]);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let last = Page::new(w, 10, vec![1, 2, 3, 4, 5]);
        assert_eq!(last.next, None);
    }

    #[test]
    fn empty_page_has_no_neighbours() {
        let page: Page<i32> = Page::empty(PageQuery::default().resolve(6));
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
