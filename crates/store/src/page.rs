use quarry_query::Record;
use serde::{Deserialize, Serialize};

/// A length-aware page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Record>,
    /// Number of rows matching the query across all pages.
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
    /// Name of the query-string parameter that carries the page number.
    pub page_name: String,
}
impl Page {
    pub fn new(items: Vec<Record>, total: u64, per_page: u64, current_page: u64, page_name: impl Into<String>) -> Self {
        let last_page = match per_page {
            0 => 1,
            n => total.div_ceil(n).max(1),
        };
        Self {
            items,
            total,
            per_page,
            current_page,
            last_page,
            page_name: page_name.into(),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// A page of results that only knows whether another page follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplePage {
    pub items: Vec<Record>,
    pub per_page: u64,
    pub current_page: u64,
    pub has_more: bool,
    pub page_name: String,
}

/// Offset of the first row on a (1-based) page.
pub(crate) fn page_offset(page: u64, per_page: u64) -> u64 {
    page.max(1).saturating_sub(1).saturating_mul(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 15, 1)]
    #[case(15, 15, 1)]
    #[case(16, 15, 2)]
    #[case(150, 15, 10)]
    #[case(3, 0, 1)]
    fn test_last_page(#[case] total: u64, #[case] per_page: u64, #[case] expected: u64) {
        assert_eq!(Page::new(vec![], total, per_page, 1, "page").last_page, expected);
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 0)]
    #[case(2, 10, 10)]
    #[case(5, 3, 12)]
    fn test_page_offset(#[case] page: u64, #[case] per_page: u64, #[case] expected: u64) {
        assert_eq!(page_offset(page, per_page), expected);
    }

    #[test]
    fn test_has_more_pages() {
        assert!(Page::new(vec![], 30, 10, 2, "page").has_more_pages());
        assert!(!Page::new(vec![], 30, 10, 3, "page").has_more_pages());
    }
}
