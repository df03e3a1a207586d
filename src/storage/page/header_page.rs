//! Header page (page 0) and free-list pages.

use crate::common::PageNum;

use super::page_buf::PageBuf;

/// Page 0 of every table file.
///
/// # Layout
/// ```text
/// 0        8        16        24
/// ┌────────┬────────┬─────────┬──────────────────────────────┐
/// │free    │root    │num_page │ reserved (checksum @116)     │
/// └────────┴────────┴─────────┴──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPage {
    /// Head of the free-page list.
    pub free_head: Option<PageNum>,
    /// Root of the B+ tree; `None` for an empty tree.
    pub root: Option<PageNum>,
    /// Pages in the file, header included.
    pub num_pages: u64,
}

impl HeaderPage {
    pub const OFFSET_FREE: usize = 0;
    pub const OFFSET_ROOT: usize = 8;
    pub const OFFSET_NUM_PAGES: usize = 16;

    /// Header of a freshly created file: no tree, no free pages, one page.
    pub fn new() -> Self {
        Self {
            free_head: None,
            root: None,
            num_pages: 1,
        }
    }

    pub fn decode(buf: &PageBuf) -> Self {
        Self {
            free_head: PageNum::from_link(buf.read_u64(Self::OFFSET_FREE)),
            root: PageNum::from_link(buf.read_u64(Self::OFFSET_ROOT)),
            num_pages: buf.read_u64(Self::OFFSET_NUM_PAGES),
        }
    }

    pub fn encode(&self, buf: &mut PageBuf) {
        buf.write_u64(Self::OFFSET_FREE, PageNum::to_link(self.free_head));
        buf.write_u64(Self::OFFSET_ROOT, PageNum::to_link(self.root));
        buf.write_u64(Self::OFFSET_NUM_PAGES, self.num_pages);
    }
}

impl Default for HeaderPage {
    fn default() -> Self {
        Self::new()
    }
}

/// A page on the free list. Only the link is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreePage {
    pub next: Option<PageNum>,
}

impl FreePage {
    pub const OFFSET_NEXT: usize = 0;

    pub fn decode(buf: &PageBuf) -> Self {
        Self {
            next: PageNum::from_link(buf.read_u64(Self::OFFSET_NEXT)),
        }
    }

    pub fn encode(&self, buf: &mut PageBuf) {
        buf.write_u64(Self::OFFSET_NEXT, PageNum::to_link(self.next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = HeaderPage {
            free_head: Some(PageNum(5)),
            root: Some(PageNum(3)),
            num_pages: 129,
        };
        let mut buf = PageBuf::new();
        header.encode(&mut buf);

        assert_eq!(buf.read_u64(0), 5);
        assert_eq!(buf.read_u64(8), 3);
        assert_eq!(buf.read_u64(16), 129);
        assert_eq!(HeaderPage::decode(&buf), header);
    }

    #[test]
    fn test_fresh_header() {
        let header = HeaderPage::new();
        assert_eq!(header.free_head, None);
        assert_eq!(header.root, None);
        assert_eq!(header.num_pages, 1);
    }

    #[test]
    fn test_free_page_terminator() {
        let mut buf = PageBuf::new();
        FreePage { next: None }.encode(&mut buf);
        assert_eq!(buf.read_u64(0), 0);
        assert_eq!(FreePage::decode(&buf).next, None);
    }
}
