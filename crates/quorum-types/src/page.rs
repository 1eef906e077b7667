//! Pagination for list operations.
//!
//! Every list operation accepts `{limit, offset}`. `limit` defaults to
//! [`DEFAULT_LIMIT`] and is clamped (never rejected) to [`MAX_LIMIT`].
//! An offset beyond the end of the collection yields an empty page.

use serde::{Deserialize, Serialize};

/// Default page size when the caller omits `limit`.
pub const DEFAULT_LIMIT: u32 = 20;

/// Hard cap on page size.
pub const MAX_LIMIT: u32 = 100;

/// Raw pagination arguments as received from the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageArgs {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Normalised pagination window.
///
/// # Example
///
/// ```
/// use quorum_types::{Page, PageArgs};
///
/// let page = Page::from_args(PageArgs { limit: Some(500), offset: None });
/// assert_eq!(page.limit, 100);
/// assert_eq!(page.offset, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Builds a page with the crate-wide default and cap.
    #[must_use]
    pub fn from_args(args: PageArgs) -> Self {
        Self::with_bounds(args, DEFAULT_LIMIT, MAX_LIMIT)
    }

    /// Builds a page with configured default and cap.
    ///
    /// A zero limit is treated as "unspecified" so callers always get rows
    /// back when rows exist.
    #[must_use]
    pub fn with_bounds(args: PageArgs, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        let limit = match args.limit {
            Some(0) | None => default_limit.clamp(1, max_limit),
            Some(limit) => limit.min(max_limit),
        };
        Self {
            limit,
            offset: args.offset.unwrap_or(0),
        }
    }

    /// Returns the window of `items` covered by this page.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.offset as usize).min(items.len());
        let end = start.saturating_add(self.limit as usize).min(items.len());
        &items[start..end]
    }

    /// Applies this page to an owned collection.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::from_args(PageArgs::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_twenty() {
        let page = Page::from_args(PageArgs::default());
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn clamps_oversized_limit() {
        let page = Page::from_args(PageArgs {
            limit: Some(500),
            offset: Some(3),
        });
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset, 3);
    }

    #[test]
    fn zero_limit_uses_default() {
        let page = Page::from_args(PageArgs {
            limit: Some(0),
            offset: None,
        });
        assert_eq!(page.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let items: Vec<u32> = (0..10).collect();
        let page = Page::from_args(PageArgs {
            limit: Some(5),
            offset: Some(50),
        });
        assert!(page.slice(&items).is_empty());
        assert!(page.apply(items).is_empty());
    }

    #[test]
    fn slice_window() {
        let items: Vec<u32> = (0..10).collect();
        let page = Page::from_args(PageArgs {
            limit: Some(4),
            offset: Some(8),
        });
        assert_eq!(page.slice(&items), &[8, 9]);
    }

    #[test]
    fn configured_bounds() {
        let page = Page::with_bounds(
            PageArgs {
                limit: Some(80),
                offset: None,
            },
            10,
            50,
        );
        assert_eq!(page.limit, 50);
        assert_eq!(Page::with_bounds(PageArgs::default(), 10, 50).limit, 10);
    }
}
