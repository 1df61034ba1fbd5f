use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 15;
pub const DEFAULT_MIN_PER_PAGE: u64 = 1;
pub const DEFAULT_MAX_PER_PAGE: u64 = 150;

/// Page size and the bounds a requested page size must fall within.
///
/// A request outside `[min_per_page, max_per_page]` is ignored rather than
/// clamped: the previous `per_page` stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationBounds {
    pub per_page: u64,
    pub min_per_page: u64,
    pub max_per_page: u64,
    /// Candidate used when a paginate call doesn't ask for a size.
    pub default_per_page: u64,
}
impl Default for PaginationBounds {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            min_per_page: DEFAULT_MIN_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            default_per_page: DEFAULT_PER_PAGE,
        }
    }
}
impl PaginationBounds {
    /// Resolve the page size for one paginate call and remember it.
    ///
    /// `None` and `Some(0)` both mean "no preference" and fall back to
    /// `default_per_page`, which is then subject to the same bounds check.
    pub fn prepare(&mut self, requested: Option<u64>) -> u64 {
        let candidate = requested.filter(|n| *n > 0).unwrap_or(self.default_per_page);
        if (self.min_per_page..=self.max_per_page).contains(&candidate) {
            self.per_page = candidate;
        }
        self.per_page
    }
}
