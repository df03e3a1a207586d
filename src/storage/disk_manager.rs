//! Disk Manager - page I/O and free-page allocation for one table file.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing single pages, or a run of pages in one write
//! - Allocating pages from the free list, growing the file in batches
//! - Returning pages to the free list

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::config::{PAGE_GROWTH_BATCH, PAGE_SIZE};
use crate::common::{Error, PageNum, Result};
use crate::storage::page::{FreePage, HeaderPage, NodePage, Page, PageBuf};

/// Manages disk I/O for a single table file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Header  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// The file length is always `num_pages × PAGE_SIZE` and only ever grows
/// by [`PAGE_GROWTH_BATCH`] pages at a time.
///
/// # Header ownership
/// [`alloc_page`](Self::alloc_page) and [`free_page`](Self::free_page)
/// update a caller-supplied [`HeaderPage`] instead of writing page 0
/// themselves. The buffer pool keeps the authoritative header in a frame
/// and writes it back like any other dirty page.
///
/// # Durability
/// Every write is followed by `fsync()`.
///
/// # Checksums
/// Pages the manager reads for itself (the header at open, a free-list
/// head on allocation) are checked only when `verify_checksums` is set.
pub struct DiskManager {
    file: File,
    path: PathBuf,
    /// Pages physically present in the file.
    page_count: u64,
    verify_checksums: bool,
}

impl DiskManager {
    /// Open `path`, creating and initializing it if it does not exist.
    ///
    /// Returns the manager and whether the file already existed.
    pub fn open_or_create<P: AsRef<Path>>(path: P, verify_checksums: bool) -> Result<(Self, bool)> {
        if path.as_ref().exists() {
            Ok((Self::open(path, verify_checksums)?, true))
        } else {
            Ok((Self::create(path, verify_checksums)?, false))
        }
    }

    /// Create a new table file holding only a fresh header page.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, verify_checksums: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let mut dm = Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count: 0,
            verify_checksums,
        };
        dm.write_pages(PageNum::HEADER, &[Page::Header(HeaderPage::new()).to_buf()])?;
        debug!(path = %dm.path.display(), "created table file");
        Ok(dm)
    }

    /// Open an existing table file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, is not a whole number
    /// of pages, or its header claims more pages than the file holds.
    pub fn open<P: AsRef<Path>>(path: P, verify_checksums: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let file_size = file.metadata()?.len();
        if file_size == 0 || file_size % PAGE_SIZE as u64 != 0 {
            return Err(Error::Corrupted {
                page: PageNum::HEADER,
                reason: format!("file size {file_size} is not a positive multiple of {PAGE_SIZE}"),
            });
        }

        let mut dm = Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count: file_size / PAGE_SIZE as u64,
            verify_checksums,
        };

        // A crash after growth but before the header is flushed leaves the
        // file longer than num_pages. The reverse means lost pages.
        let header = dm.read_header()?;
        if header.num_pages == 0 || header.num_pages > dm.page_count {
            return Err(Error::Corrupted {
                page: PageNum::HEADER,
                reason: format!(
                    "header records {} pages but the file holds {}",
                    header.num_pages, dm.page_count
                ),
            });
        }
        Ok(dm)
    }

    // ========================================================================
    // Raw page I/O
    // ========================================================================

    /// Read one page.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page is past the end of file.
    pub fn read_page(&mut self, page: PageNum) -> Result<PageBuf> {
        if page.0 >= self.page_count {
            return Err(Error::PageNotFound(page));
        }

        self.file.seek(SeekFrom::Start(page.file_offset()))?;
        let mut buf = PageBuf::new();
        self.file.read_exact(buf.as_mut_slice())?;
        Ok(buf)
    }

    /// Write one existing page and fsync.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page is past the end of file.
    pub fn write_page(&mut self, page: PageNum, buf: &PageBuf) -> Result<()> {
        if page.0 >= self.page_count {
            return Err(Error::PageNotFound(page));
        }

        self.file.seek(SeekFrom::Start(page.file_offset()))?;
        self.file.write_all(buf.as_slice())?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Write consecutive pages starting at `start` in a single write, then
    /// fsync. May extend the file, but never leave a hole.
    pub fn write_pages(&mut self, start: PageNum, bufs: &[PageBuf]) -> Result<()> {
        if start.0 > self.page_count {
            return Err(Error::PageNotFound(start));
        }

        let mut bytes = Vec::with_capacity(bufs.len() * PAGE_SIZE);
        for buf in bufs {
            bytes.extend_from_slice(buf.as_slice());
        }

        self.file.seek(SeekFrom::Start(start.file_offset()))?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;

        self.page_count = self.page_count.max(start.0 + bufs.len() as u64);
        Ok(())
    }

    pub fn read_header(&mut self) -> Result<HeaderPage> {
        let buf = self.read_checked(PageNum::HEADER)?;
        Ok(HeaderPage::decode(&buf))
    }

    #[cfg(test)]
    fn write_header(&mut self, header: &HeaderPage) -> Result<()> {
        self.write_page(PageNum::HEADER, &Page::Header(*header).to_buf())
    }

    fn read_checked(&mut self, page: PageNum) -> Result<PageBuf> {
        let buf = self.read_page(page)?;
        if self.verify_checksums {
            buf.verify_checksum(page)?;
        }
        Ok(buf)
    }

    // ========================================================================
    // Free-list allocation
    // ========================================================================

    /// Allocate a page, returning its number. The page holds a blank node.
    ///
    /// Pops the free-list head if there is one. Otherwise appends
    /// [`PAGE_GROWTH_BATCH`] pages in one write: the first is returned and
    /// the rest become the new free list.
    pub fn alloc_page(&mut self, header: &mut HeaderPage) -> Result<PageNum> {
        let blank = Page::Node(NodePage::blank()).to_buf();

        if let Some(head) = header.free_head {
            if head.is_header() || head.0 >= header.num_pages {
                return Err(Error::Corrupted {
                    page: PageNum::HEADER,
                    reason: format!("free list head {head} outside file of {} pages", header.num_pages),
                });
            }
            let buf = self.read_checked(head)?;
            let next = FreePage::decode(&buf).next;

            self.write_page(head, &blank)?;
            header.free_head = next;
            return Ok(head);
        }

        let first = PageNum(header.num_pages);
        let mut bufs = Vec::with_capacity(PAGE_GROWTH_BATCH as usize);
        bufs.push(blank);
        for offset in 1..PAGE_GROWTH_BATCH {
            let next = if offset + 1 < PAGE_GROWTH_BATCH {
                Some(PageNum(first.0 + offset + 1))
            } else {
                None
            };
            bufs.push(Page::Free(FreePage { next }).to_buf());
        }
        self.write_pages(first, &bufs)?;

        header.num_pages += PAGE_GROWTH_BATCH;
        header.free_head = Some(PageNum(first.0 + 1));
        debug!(
            path = %self.path.display(),
            num_pages = header.num_pages,
            "grew table file"
        );
        Ok(first)
    }

    /// Push `page` onto the head of the free list.
    ///
    /// # Errors
    /// Returns `Error::InvalidPageNum` for the header page or a page past
    /// `header.num_pages`.
    pub fn free_page(&mut self, header: &mut HeaderPage, page: PageNum) -> Result<()> {
        if page.is_header() || page.0 >= header.num_pages {
            return Err(Error::InvalidPageNum(page));
        }

        let free = Page::Free(FreePage {
            next: header.free_head,
        });
        self.write_page(page, &free.to_buf())?;
        header.free_head = Some(page);
        Ok(())
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[inline]
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
