//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Splits `items` into the requested page plus metadata.
    pub fn paginate<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let total = items.len() as u32;
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(self.per_page)
        };
        let start = ((self.page - 1) * self.per_page) as usize;
        let data = items
            .into_iter()
            .skip(start)
            .take(self.per_page as usize)
            .collect();
        (
            data,
            PaginationMeta {
                page: self.page,
                per_page: self.per_page,
                total,
                total_pages,
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn clamped_bounds_inputs() {
        let params = PaginationParams {
            page: 0,
            per_page: 5000,
        };
        let clamped = params.clamped();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.per_page, 100);
    }

    #[test]
    fn paginate_returns_requested_window() {
        let params = PaginationParams {
            page: 2,
            per_page: 2,
        }
        .clamped();
        let (data, meta) = params.paginate(vec![1, 2, 3, 4, 5]);
        assert_eq!(data, vec![3, 4]);
        assert_eq!(meta.total, 5);
        assert_eq!(meta.total_pages, 3);
    }
}
