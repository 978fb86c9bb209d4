//! Page/limit pagination and whitelisted sorting for list endpoints.

use serde::Serialize;
use service_core::error::AppError;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;
/// Keeps `(page - 1) * limit` well inside `i64` and Postgres `OFFSET`.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Normalized list request.
///
/// `sort_column` always comes from a caller-supplied whitelist, so it can be
/// interpolated into `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    pub sort_column: &'static str,
    pub sort_order: SortOrder,
}

impl PageRequest {
    pub fn new(
        page: Option<i64>,
        limit: Option<i64>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        sortable: &[&'static str],
    ) -> Result<Self, AppError> {
        let page = page.unwrap_or(1).max(1);
        if page > MAX_PAGE {
            return Err(AppError::validation(
                "page",
                "range",
                format!("page must not exceed {}", MAX_PAGE),
            ));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let sort_column = match sort_by {
            None => "created_at",
            Some(requested) => sortable
                .iter()
                .copied()
                .find(|column| *column == requested)
                .ok_or_else(|| {
                    AppError::validation(
                        "sortBy",
                        "not_sortable",
                        format!("Cannot sort by '{}'", requested),
                    )
                })?,
        };

        let sort_order = match sort_order.map(str::to_ascii_lowercase).as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(AppError::validation(
                    "sortOrder",
                    "invalid",
                    format!("sortOrder must be 'asc' or 'desc', got '{}'", other),
                ));
            }
        };

        Ok(Self {
            page,
            limit,
            sort_column,
            sort_order,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ORDER BY` body with `id` as tie-breaker so pages are stable.
    pub fn order_by(&self) -> String {
        format!(
            "{} {}, id {}",
            self.sort_column,
            self.sort_order.as_sql(),
            self.sort_order.as_sql()
        )
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            sort_column: "created_at",
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, request: &PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            data,
            pagination: PaginationMeta {
                page: request.page,
                limit: request.limit,
                total,
                total_pages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTABLE: &[&str] = &["created_at", "name"];

    #[test]
    fn defaults_to_first_page_newest_first() {
        let request = PageRequest::new(None, None, None, None, SORTABLE).unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.offset(), 0);
        assert_eq!(request.order_by(), "created_at DESC, id DESC");
    }

    #[test]
    fn limit_is_clamped_and_page_floored() {
        let request = PageRequest::new(Some(0), Some(1000), None, None, SORTABLE).unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, MAX_LIMIT);

        let request = PageRequest::new(Some(3), Some(10), Some("name"), Some("ASC"), SORTABLE)
            .unwrap();
        assert_eq!(request.offset(), 20);
        assert_eq!(request.order_by(), "name ASC, id ASC");
    }

    #[test]
    fn oversized_page_is_rejected() {
        let err = PageRequest::new(Some(i64::MAX), Some(MAX_LIMIT), None, None, SORTABLE)
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let last = PageRequest::new(Some(MAX_PAGE), Some(MAX_LIMIT), None, None, SORTABLE)
            .unwrap();
        assert_eq!(last.offset(), (MAX_PAGE - 1) * MAX_LIMIT);
    }

    #[test]
    fn offset_saturates_for_hand_built_requests() {
        let request = PageRequest {
            page: i64::MAX,
            ..PageRequest::default()
        };
        assert_eq!(request.offset(), i64::MAX);
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        let err = PageRequest::new(None, None, Some("name; DROP TABLE x"), None, SORTABLE)
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(PageRequest::new(None, None, None, Some("sideways"), SORTABLE).is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest::new(None, Some(20), None, None, SORTABLE).unwrap();
        let page = Paginated::new(vec![1, 2, 3], &request, 41);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(Paginated::<i32>::new(vec![], &request, 0).pagination.total_pages, 0);
    }
}
