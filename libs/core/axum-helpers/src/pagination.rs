//! Page/sort query parameters and the metadata returned with listings.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::ValidationErrors;

use crate::validation::{Validator, permitted_value};

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Raw `page`, `page_size` and `sort` query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number (default 1)
    pub page: Option<i64>,
    /// Records per page, 1..=100 (default 20)
    pub page_size: Option<i64>,
    /// Sort key; prefix with `-` for descending order
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Validated paging request.
///
/// `sort` is only ever turned into SQL through [`Filters::sort_column`], which
/// refuses anything outside `sort_safelist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn new(params: PageParams, default_sort: &str, sort_safelist: &'static [&'static str]) -> Self {
        Self {
            page: params.page.unwrap_or(1),
            page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            sort: params.sort.unwrap_or_else(|| default_sort.to_string()),
            sort_safelist,
        }
    }

    /// Build and validate in one step.
    pub fn parse(
        params: PageParams,
        default_sort: &str,
        sort_safelist: &'static [&'static str],
    ) -> Result<Self, ValidationErrors> {
        let filters = Self::new(params, default_sort, sort_safelist);
        filters.validate()?;
        Ok(filters)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        self.check(&mut v);
        v.finish()
    }

    /// Record paging violations into a validator shared with other query checks.
    pub fn check(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero")
            .check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million")
            .check(self.page_size > 0, "page_size", "must be greater than zero")
            .check(self.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100")
            .check(
                permitted_value(&self.sort.as_str(), self.sort_safelist),
                "sort",
                "invalid sort value",
            );
    }

    /// Column name with any leading `-` removed, if the key is allow-listed.
    pub fn sort_column(&self) -> Option<&str> {
        self.sort_safelist
            .iter()
            .find(|&&safe| safe == self.sort)
            .map(|safe| safe.trim_start_matches('-'))
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Paging metadata returned next to a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
    pub total_pages: i64,
}

impl Metadata {
    /// With no records, page and page size echo the request and every count is zero.
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self {
                current_page: page,
                page_size,
                ..Self::default()
            };
        }

        let total_pages = (total_records + page_size - 1) / page_size;
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_pages,
            total_records,
            total_pages,
        }
    }
}
