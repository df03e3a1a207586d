//! Buffer frame identifier.

use std::fmt;

/// Index of a frame in the buffer pool's fixed frame array.
///
/// Frames never move, so a `FrameId` stays valid for the lifetime of the
/// pool even though the page it holds changes on eviction.
///
/// # Example
/// ```
/// use pagekv::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.index(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }

    /// Position in the frame array.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_index() {
        assert_eq!(FrameId::new(10).index(), 10);
    }

    #[test]
    fn test_frame_id_ordering() {
        assert!(FrameId::new(1) < FrameId::new(2));
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId::new(42).to_string(), "frame#42");
    }
}
