//! Pagination
//!
//! Page selection and paged results. Most Procore list endpoints return
//! bare arrays without totals, so results are either sliced client-side
//! from a full list or estimated from a single server page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ProcoreError, ProcoreResult};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 100;
pub const MAX_PER_PAGE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Which page to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationOptions {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    pub sort_by: Option<String>,
    pub sort_direction: SortDirection,
    /// Sent as `filters[key]=value`.
    pub filters: BTreeMap<String, String>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort_by: None,
            sort_direction: SortDirection::Asc,
            filters: BTreeMap::new(),
        }
    }
}

impl PaginationOptions {
    /// Create options for `page` with `per_page` items.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            ..Default::default()
        }
    }

    /// Sort by `field`.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by = Some(field.into());
        self.sort_direction = direction;
        self
    }

    /// Add a filter.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Validate page bounds.
    pub fn validate(&self) -> ProcoreResult<()> {
        if self.page < 1 {
            return Err(ProcoreError::invalid_argument(
                "page",
                "Page must be greater than or equal to 1",
            ));
        }
        if self.per_page < 1 || self.per_page > MAX_PER_PAGE {
            return Err(ProcoreError::invalid_argument(
                "per_page",
                format!("Per page must be between 1 and {}", MAX_PER_PAGE),
            ));
        }
        Ok(())
    }

    /// Number of items before this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }

    /// Query parameters for server-side paging.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
        ];
        if let Some(sort) = &self.sort_by {
            let sort = match self.sort_direction {
                SortDirection::Asc => sort.clone(),
                SortDirection::Desc => format!("-{}", sort),
            };
            pairs.push(("sort".to_string(), sort));
        }
        for (key, value) in &self.filters {
            pairs.push((format!("filters[{}]", key), value.clone()));
        }
        pairs
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<T> PagedResult<T> {
    /// Slice the requested page out of a complete list.
    pub fn from_all(all: Vec<T>, options: &PaginationOptions) -> Self {
        let total_count = all.len();
        let per_page = options.per_page.max(1);
        let total_pages = total_count.div_ceil(per_page as usize) as u32;
        let items = all
            .into_iter()
            .skip(options.offset())
            .take(per_page as usize)
            .collect();

        Self {
            items,
            total_count,
            page: options.page,
            per_page,
            total_pages,
            has_next_page: options.page < total_pages,
            has_previous_page: options.page > 1,
        }
    }

    /// Wrap one server page. A full page implies there may be another, and
    /// totals are estimated from that.
    pub fn from_server_page(items: Vec<T>, options: &PaginationOptions) -> Self {
        let has_next_page = items.len() == options.per_page as usize;
        let (total_count, total_pages) = if has_next_page {
            (options.offset() + options.per_page as usize + 1, options.page + 1)
        } else {
            (options.offset() + items.len(), options.page)
        };

        Self {
            items,
            total_count,
            page: options.page,
            per_page: options.per_page,
            total_pages,
            has_next_page,
            has_previous_page: options.page > 1,
        }
    }

    /// Map the items, keeping the paging fields.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_validation() {
        let options = PaginationOptions::default();
        assert_eq!(options.page, 1);
        assert_eq!(options.per_page, 100);
        assert_eq!(options.sort_direction, SortDirection::Asc);
        assert!(options.validate().is_ok());

        assert!(PaginationOptions::new(0, 10).validate().is_err());
        assert!(PaginationOptions::new(1, 0).validate().is_err());
        assert!(PaginationOptions::new(1, 1001).validate().is_err());
        assert!(PaginationOptions::new(1, 1000).validate().is_ok());
    }

    #[test]
    fn test_client_side_slicing() {
        let all: Vec<u32> = (1..=25).collect();

        let page = PagedResult::from_all(all.clone(), &PaginationOptions::new(2, 10));
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);
        assert!(page.has_previous_page);

        let last = PagedResult::from_all(all.clone(), &PaginationOptions::new(3, 10));
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next_page);

        let beyond = PagedResult::from_all(all, &PaginationOptions::new(9, 10));
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn test_server_page_estimates() {
        let full = PagedResult::from_server_page(vec![0; 10], &PaginationOptions::new(2, 10));
        assert!(full.has_next_page);
        assert_eq!(full.total_count, 21);
        assert_eq!(full.total_pages, 3);

        let partial = PagedResult::from_server_page(vec![0; 4], &PaginationOptions::new(2, 10));
        assert!(!partial.has_next_page);
        assert_eq!(partial.total_count, 14);
        assert_eq!(partial.total_pages, 2);
    }

    #[test]
    fn test_query_pairs() {
        let options = PaginationOptions::new(3, 50)
            .with_sort("name", SortDirection::Desc)
            .with_filter("vendor_id", "7");
        let query = serde_urlencoded::to_string(options.query_pairs()).unwrap();
        assert_eq!(query, "page=3&per_page=50&sort=-name&filters%5Bvendor_id%5D=7");
    }
}
