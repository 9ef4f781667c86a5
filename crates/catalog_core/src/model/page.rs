//! Paging request/response shapes.
//!
//! # Invariants
//! - A zero `limit` or `offset` is indistinguishable from "not supplied" and
//!   resolves to the default.
//! - `ItemPage::total` counts every active item matching the search filter,
//!   not just the returned slice.

use crate::model::item::Item;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::num::IntErrorKind;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const DEFAULT_PAGE_OFFSET: u32 = 0;

/// Resolved pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: DEFAULT_PAGE_OFFSET,
        }
    }
}

impl PageRequest {
    /// Builds a window, mapping zero values to the defaults.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit },
            offset: if offset == 0 { DEFAULT_PAGE_OFFSET } else { offset },
        }
    }

    /// Parses raw external `limit`/`offset` values.
    ///
    /// Missing or blank values fall back to the defaults independently.
    ///
    /// # Errors
    /// Returns [`PageParamError`] for non-numeric, negative or overflowing input.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Result<Self, PageParamError> {
        let limit = parse_param("limit", limit)?;
        let offset = parse_param("offset", offset)?;
        Ok(Self::new(limit, offset))
    }
}

/// One page of items plus the filter-consistent total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Why a raw paging parameter was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageParamReason {
    NotANumber,
    OutOfRange,
}

impl Display for PageParamReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotANumber => f.write_str("not a number"),
            Self::OutOfRange => f.write_str("out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid `{name}` parameter `{value}`: {reason}")]
pub struct PageParamError {
    pub name: &'static str,
    pub value: String,
    pub reason: PageParamReason,
}

fn parse_param(name: &'static str, raw: Option<&str>) -> Result<u32, PageParamError> {
    let text = match raw.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(text) => text,
    };

    let reject = |reason| PageParamError {
        name,
        value: text.to_string(),
        reason,
    };

    let value = text.parse::<i64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            reject(PageParamReason::OutOfRange)
        }
        _ => reject(PageParamReason::NotANumber),
    })?;

    u32::try_from(value).map_err(|_| reject(PageParamReason::OutOfRange))
}

#[cfg(test)]
mod tests {
    use super::{PageParamReason, PageRequest, DEFAULT_PAGE_LIMIT};

    #[test]
    fn zero_values_mean_defaults() {
        assert_eq!(PageRequest::new(0, 0), PageRequest::default());
        assert_eq!(PageRequest::new(3, 0).limit, 3);
    }

    #[test]
    fn parse_accepts_missing_and_blank_values() {
        let page = PageRequest::parse(None, Some(" ")).unwrap();
        assert_eq!(page, PageRequest::default());

        let page = PageRequest::parse(Some("5"), None).unwrap();
        assert_eq!(page.limit, 5);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn parse_treats_literal_zero_as_default() {
        let page = PageRequest::parse(Some("0"), Some("0")).unwrap();
        assert_eq!(page.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn parse_rejects_non_numeric_and_negative_values() {
        let err = PageRequest::parse(Some("ten"), None).unwrap_err();
        assert_eq!(err.name, "limit");
        assert_eq!(err.reason, PageParamReason::NotANumber);

        let err = PageRequest::parse(None, Some("-1")).unwrap_err();
        assert_eq!(err.name, "offset");
        assert_eq!(err.reason, PageParamReason::OutOfRange);

        let err = PageRequest::parse(Some("99999999999999999999"), None).unwrap_err();
        assert_eq!(err.reason, PageParamReason::OutOfRange);
    }
}
