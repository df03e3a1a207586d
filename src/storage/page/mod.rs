//! Page formats.
//!
//! - [`PageBuf`] - the raw 4KB image read from and written to disk
//! - [`Page`] - decoded content: header, free-list link, or B+ tree node
//!
//! A page never says which variant it is. Page 0 is the header; every
//! other page the buffer pool loads is a node. Free pages are only read
//! by the disk manager while walking the free list.

mod header_page;
mod node;
mod page_buf;

pub use header_page::{FreePage, HeaderPage};
pub use node::{
    InternalNode, InternalRecord, Key, LeafNode, LeafRecord, NodeKind, NodePage, Value,
    INTERNAL_CAPACITY, LEAF_CAPACITY,
};
pub use page_buf::{PageBuf, CHECKSUM_OFFSET};

use crate::common::{Error, PageNum, Result};

/// Decoded content of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Header(HeaderPage),
    Free(FreePage),
    Node(NodePage),
}

impl Page {
    /// Decode a page read through the buffer pool.
    pub fn decode(page: PageNum, buf: &PageBuf) -> Result<Self> {
        if page.is_header() {
            Ok(Page::Header(HeaderPage::decode(buf)))
        } else {
            Ok(Page::Node(NodePage::decode(page, buf)?))
        }
    }

    /// Encode into a fresh image, checksum included.
    pub fn to_buf(&self) -> PageBuf {
        let mut buf = PageBuf::new();
        match self {
            Page::Header(header) => header.encode(&mut buf),
            Page::Free(free) => free.encode(&mut buf),
            Page::Node(node) => node.encode(&mut buf),
        }
        buf.update_checksum();
        buf
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Page::Header(_) => "header",
            Page::Free(_) => "free",
            Page::Node(_) => "node",
        }
    }

    pub fn as_header(&self, page: PageNum) -> Result<&HeaderPage> {
        match self {
            Page::Header(header) => Ok(header),
            _ => Err(Error::PageTypeMismatch {
                page,
                expected: "header",
            }),
        }
    }

    pub fn as_header_mut(&mut self, page: PageNum) -> Result<&mut HeaderPage> {
        match self {
            Page::Header(header) => Ok(header),
            _ => Err(Error::PageTypeMismatch {
                page,
                expected: "header",
            }),
        }
    }

    pub fn as_node(&self, page: PageNum) -> Result<&NodePage> {
        match self {
            Page::Node(node) => Ok(node),
            _ => Err(Error::PageTypeMismatch {
                page,
                expected: "node",
            }),
        }
    }

    pub fn as_node_mut(&mut self, page: PageNum) -> Result<&mut NodePage> {
        match self {
            Page::Node(node) => Ok(node),
            _ => Err(Error::PageTypeMismatch {
                page,
                expected: "node",
            }),
        }
    }
}

impl Default for Page {
    /// Content of an empty frame.
    fn default() -> Self {
        Page::Free(FreePage::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_zero_decodes_as_header() {
        let page = Page::Header(HeaderPage {
            free_head: Some(PageNum(2)),
            root: Some(PageNum(1)),
            num_pages: 129,
        });
        let buf = page.to_buf();
        assert!(buf.verify_checksum(PageNum::HEADER).is_ok());
        assert_eq!(Page::decode(PageNum::HEADER, &buf).unwrap(), page);
    }

    #[test]
    fn test_other_pages_decode_as_nodes() {
        let page = Page::Node(NodePage::new_leaf(None, Vec::new(), None));
        let buf = page.to_buf();
        let decoded = Page::decode(PageNum(5), &buf).unwrap();
        assert!(decoded.as_node(PageNum(5)).unwrap().is_leaf());
        assert!(matches!(
            decoded.as_header(PageNum(5)),
            Err(Error::PageTypeMismatch { expected: "header", .. })
        ));
    }

    #[test]
    fn test_checksum_lives_in_reserved_bytes() {
        let node = NodePage::new_leaf(Some(PageNum(3)), Vec::new(), None);
        let buf = Page::Node(node.clone()).to_buf();
        assert_ne!(buf.stored_checksum(), 0);
        // the checksum does not disturb the decoded node
        assert_eq!(NodePage::decode(PageNum(4), &buf).unwrap(), node);
    }
}
