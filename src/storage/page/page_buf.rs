//! PageBuf - the raw 4KB image of a page as it sits on disk.
//!
//! A [`PageBuf`] is what the disk manager reads and writes. Decoded
//! content lives in [`Page`](super::Page); conversion happens only at the
//! I/O boundary.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageNum, Result};

/// Byte range holding the CRC32 of the page. It falls in the reserved
/// area of every page variant.
pub const CHECKSUM_OFFSET: usize = 116;
const CHECKSUM_END: usize = CHECKSUM_OFFSET + 4;

/// A page image (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `PageBuf` does NOT implement `Clone` outside tests; copying 4KB should
/// be explicit.
#[repr(align(4096))]
pub struct PageBuf {
    data: [u8; PAGE_SIZE],
}

impl PageBuf {
    /// Create a new zeroed page image.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    // ========================================================================
    // Little-endian field access
    // ========================================================================

    #[inline]
    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_le_bytes(bytes)
    }

    #[inline]
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn read_i64(&self, offset: usize) -> i64 {
        self.read_u64(offset) as i64
    }

    #[inline]
    pub fn write_i64(&mut self, offset: usize, value: i64) {
        self.write_u64(offset, value as u64);
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    // ========================================================================
    // Checksum
    // ========================================================================

    /// CRC32 over the page with the checksum field treated as zero.
    pub fn compute_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data[..CHECKSUM_OFFSET]);
        hasher.update(&[0u8; 4]);
        hasher.update(&self.data[CHECKSUM_END..]);
        hasher.finalize()
    }

    #[inline]
    pub fn stored_checksum(&self) -> u32 {
        self.read_u32(CHECKSUM_OFFSET)
    }

    /// Compute and store the checksum. Call after all other writes.
    pub fn update_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.write_u32(CHECKSUM_OFFSET, checksum);
    }

    /// Verify the stored checksum.
    ///
    /// A stored value of 0 means the page was written without one and is
    /// accepted as is.
    pub fn verify_checksum(&self, page: PageNum) -> Result<()> {
        let stored = self.stored_checksum();
        if stored == 0 {
            return Ok(());
        }
        let computed = self.compute_checksum();
        if stored != computed {
            return Err(Error::ChecksumMismatch {
                page,
                stored,
                computed,
            });
        }
        Ok(())
    }
}

impl Default for PageBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for PageBuf {
    fn clone(&self) -> Self {
        let mut copy = PageBuf::new();
        copy.data.copy_from_slice(&self.data);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_alignment() {
        assert_eq!(std::mem::size_of::<PageBuf>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<PageBuf>(), 4096);
    }

    #[test]
    fn test_field_access_is_little_endian() {
        let mut buf = PageBuf::new();
        buf.write_u64(8, 0x0102_0304_0506_0708);
        assert_eq!(buf.as_slice()[8], 0x08);
        assert_eq!(buf.read_u64(8), 0x0102_0304_0506_0708);

        buf.write_i64(16, -5);
        assert_eq!(buf.read_i64(16), -5);

        buf.write_u32(24, 31);
        assert_eq!(buf.read_u32(24), 31);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut buf = PageBuf::new();
        buf.write_u64(0, 77);
        buf.update_checksum();
        assert!(buf.verify_checksum(PageNum(1)).is_ok());

        buf.as_mut_slice()[2000] ^= 0xFF;
        assert!(matches!(
            buf.verify_checksum(PageNum(1)),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_checksum_is_accepted() {
        let mut buf = PageBuf::new();
        buf.write_u64(0, 77);
        assert_eq!(buf.stored_checksum(), 0);
        assert!(buf.verify_checksum(PageNum(1)).is_ok());
    }

    #[test]
    fn test_checksum_ignores_its_own_field() {
        let mut buf = PageBuf::new();
        buf.write_u64(0, 1);
        let before = buf.compute_checksum();
        buf.update_checksum();
        assert_eq!(buf.compute_checksum(), before);
    }

    #[test]
    fn test_reset() {
        let mut buf = PageBuf::new();
        buf.as_mut_slice()[100] = 0xAB;
        buf.reset();
        assert_eq!(buf.as_slice()[100], 0);
    }
}
