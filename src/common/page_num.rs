//! Page number within one table file.

use std::fmt;

/// Identifies a page inside a single table file.
///
/// Page numbers are 0-based offsets in units of `PAGE_SIZE`. Page 0 is
/// always the header page, which lets the on-disk format use 0 as the
/// "no page" marker for the root, parent, sibling and free-list links.
/// In memory those links are `Option<PageNum>`; [`PageNum::from_link`]
/// and [`PageNum::to_link`] convert at the encode/decode boundary.
///
/// # Example
/// ```
/// use pagekv::PageNum;
///
/// assert_eq!(PageNum::from_link(0), None);
/// assert_eq!(PageNum::from_link(7), Some(PageNum(7)));
/// assert_eq!(PageNum::to_link(None), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNum(pub u64);

impl PageNum {
    /// The header page. Never a node, never on the free list.
    pub const HEADER: PageNum = PageNum(0);

    #[inline]
    pub fn new(n: u64) -> Self {
        PageNum(n)
    }

    #[inline]
    pub fn is_header(self) -> bool {
        self == Self::HEADER
    }

    /// Decode an on-disk link field, where 0 means "none".
    #[inline]
    pub fn from_link(raw: u64) -> Option<PageNum> {
        if raw == 0 {
            None
        } else {
            Some(PageNum(raw))
        }
    }

    /// Encode an optional link back to its on-disk form.
    #[inline]
    pub fn to_link(link: Option<PageNum>) -> u64 {
        link.map_or(0, |p| p.0)
    }

    /// Byte offset of this page in its table file.
    #[inline]
    pub fn file_offset(self) -> u64 {
        self.0 * crate::common::config::PAGE_SIZE as u64
    }
}

impl fmt::Display for PageNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
