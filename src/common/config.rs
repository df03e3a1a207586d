//! Engine configuration: on-disk format constants plus the runtime [`Config`].

/// Size of a page in bytes. Every table file is a whole number of pages.
pub const PAGE_SIZE: usize = 4096;

/// Pages added to a table file each time the free list runs dry.
pub const PAGE_GROWTH_BATCH: u64 = 128;

/// Fixed payload size of a leaf record. Shorter values are NUL-padded.
pub const VALUE_SIZE: usize = 120;

/// Bytes before the record array of a node page.
pub const NODE_HEADER_SIZE: usize = 128;

/// Default (and maximum) leaf fan-out: 31 records per leaf.
pub const LEAF_ORDER: usize = 32;

/// Default (and maximum) internal fan-out: 248 keys, 249 children.
pub const INTERNAL_ORDER: usize = 249;

/// Number of table ids available at once.
pub const MAX_TABLES: usize = 10;

/// Frames allocated by [`Config::default`].
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Eviction policy used when a page fault finds no empty frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Take the last unpinned frame met while scanning the frame array.
    /// Cache hits do not reorder anything.
    #[default]
    Scan,

    /// Take the unpinned frame whose last access is oldest.
    Lru,
}

/// B+ tree fan-out. A tree must always be reopened with the orders it was
/// built with (or larger), otherwise existing nodes may not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOrder {
    /// Leaf fan-out; a leaf holds at most `leaf - 1` records.
    pub leaf: usize,
    /// Internal fan-out; a node holds at most `internal - 1` keys.
    pub internal: usize,
}

impl TreeOrder {
    pub const fn new(leaf: usize, internal: usize) -> Self {
        Self { leaf, internal }
    }

    /// Check both orders fit in a page and leave room to split.
    pub fn validate(&self) -> crate::common::Result<()> {
        if !(3..=LEAF_ORDER).contains(&self.leaf) {
            return Err(crate::common::Error::Config(format!(
                "leaf order {} outside 3..={}",
                self.leaf, LEAF_ORDER
            )));
        }
        if !(3..=INTERNAL_ORDER).contains(&self.internal) {
            return Err(crate::common::Error::Config(format!(
                "internal order {} outside 3..={}",
                self.internal, INTERNAL_ORDER
            )));
        }
        Ok(())
    }
}

impl Default for TreeOrder {
    fn default() -> Self {
        Self::new(LEAF_ORDER, INTERNAL_ORDER)
    }
}

/// Runtime configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Buffer pool
    // -------------------------------------------------------------------------
    /// Number of frames. Fixed for the life of the database.
    pub pool_size: usize,

    /// Victim selection on a page fault.
    pub eviction_policy: EvictionPolicy,

    /// Reject pages whose stored checksum does not match their contents.
    pub verify_checksums: bool,

    // -------------------------------------------------------------------------
    // Index
    // -------------------------------------------------------------------------
    pub order: TreeOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            eviction_policy: EvictionPolicy::Scan,
            verify_checksums: true,
            order: TreeOrder::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn validate(&self) -> crate::common::Result<()> {
        if self.pool_size == 0 {
            return Err(crate::common::Error::Config(
                "pool_size must be greater than 0".to_string(),
            ));
        }
        self.order.validate()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of buffer frames
    pub fn pool_size(mut self, frames: usize) -> Self {
        self.config.pool_size = frames;
        self
    }

    /// Set the eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Turn checksum verification on page load on or off
    pub fn verify_checksums(mut self, on: bool) -> Self {
        self.config.verify_checksums = on;
        self
    }

    /// Set the B+ tree fan-out
    pub fn order(mut self, order: TreeOrder) -> Self {
        self.config.order = order;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
