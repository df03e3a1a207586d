//! Printing and consistency checks.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};

use crate::common::{Error, PageNum, Result};
use crate::storage::page::{Key, NodeKind, Page};

use super::{BPlusTree, MIN_KEYS};

/// Shape of a tree that passed [`BPlusTree::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeSummary {
    /// Levels from root to leaves; 0 for an empty tree.
    pub height: usize,
    pub leaves: usize,
    pub internal_nodes: usize,
    pub records: usize,
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "height {}, {} leaves, {} internal nodes, {} records",
            self.height, self.leaves, self.internal_nodes, self.records
        )
    }
}

/// Accumulated while walking the tree.
#[derive(Default)]
struct Walk {
    summary: TreeSummary,
    leaf_depth: Option<usize>,
    /// Leaves in key order, each with its `right` link.
    leaves: Vec<(PageNum, Option<PageNum>)>,
}

impl BPlusTree<'_> {
    /// Number of levels, following first children down to a leaf.
    pub fn height(&self) -> Result<usize> {
        let Some(mut page) = self.root()? else {
            return Ok(0);
        };
        let mut height = 1;
        loop {
            match self.read_node(page)?.kind {
                NodeKind::Internal(internal) => {
                    page = internal.first_child;
                    height += 1;
                }
                NodeKind::Leaf(_) => return Ok(height),
            }
        }
    }

    /// One line per level, each node as `[page] keys | `.
    pub fn render_tree(&self) -> Result<String> {
        let Some(root) = self.root()? else {
            return Ok("(empty tree)".to_string());
        };

        let mut out = String::new();
        let mut level = VecDeque::from([root]);
        while !level.is_empty() {
            let mut next = VecDeque::new();
            for page in level {
                let node = self.read_node(page)?;
                let _ = write!(out, "[{page}] {} | ", join_keys(&node.keys()));
                if let Some(internal) = node.as_internal() {
                    next.extend(internal.children());
                }
            }
            out.push('\n');
            level = next;
        }
        Ok(out)
    }

    /// Keys of every leaf, left to right, separated by `|`.
    pub fn render_leaves(&self) -> Result<String> {
        let Some(mut page) = self.leftmost_leaf()? else {
            return Ok("(empty tree)".to_string());
        };
        let mut out = String::new();
        loop {
            let node = self.read_node(page)?;
            let leaf = node.leaf(page)?;
            let _ = write!(out, "{} | ", join_keys(&node.keys()));
            match leaf.right {
                Some(right) => page = right,
                None => break,
            }
        }
        out.push('\n');
        Ok(out)
    }

    /// Human-readable dump of one page of this table.
    pub fn describe_page(&self, page: PageNum) -> Result<String> {
        let guard = self.bpm.fetch_page_read(self.table, page)?;
        let text = match &*guard {
            Page::Header(header) => format!(
                "page {page}: header free_head={} root={} num_pages={}",
                PageNum::to_link(header.free_head),
                PageNum::to_link(header.root),
                header.num_pages
            ),
            Page::Node(node) => match &node.kind {
                NodeKind::Leaf(leaf) => format!(
                    "page {page}: leaf parent={} right={} keys=[{}]",
                    PageNum::to_link(node.parent),
                    PageNum::to_link(leaf.right),
                    join_keys(&node.keys())
                ),
                NodeKind::Internal(internal) => format!(
                    "page {page}: internal parent={} keys=[{}] children=[{}]",
                    PageNum::to_link(node.parent),
                    join_keys(&node.keys()),
                    internal
                        .children()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                ),
            },
            Page::Free(free) => format!(
                "page {page}: free next={}",
                PageNum::to_link(free.next)
            ),
        };
        Ok(text)
    }

    /// Walk the whole tree and check its structure.
    ///
    /// Checks that every leaf sits at the same depth, keys ascend within
    /// each node and respect the separators above them, parent links point
    /// back to the parent, non-root nodes hold at least [`MIN_KEYS`] keys,
    /// and the leaf chain visits the leaves in key order.
    ///
    /// # Errors
    /// `Error::InvariantViolation` naming the first page found broken.
    pub fn verify(&self) -> Result<TreeSummary> {
        let Some(root) = self.root()? else {
            return Ok(TreeSummary::default());
        };

        let mut walk = Walk::default();
        self.verify_node(root, None, None, None, 1, &mut walk)?;

        for pair in walk.leaves.windows(2) {
            let ((page, right), (next, _)) = (pair[0], pair[1]);
            if right != Some(next) {
                return violation(format!(
                    "leaf {page} links to {} but the next leaf is {next}",
                    PageNum::to_link(right)
                ));
            }
        }
        if let Some(&(page, Some(right))) = walk.leaves.last() {
            return violation(format!("rightmost leaf {page} links to {right}"));
        }

        walk.summary.height = walk.leaf_depth.unwrap_or(0);
        Ok(walk.summary)
    }

    /// Check the subtree at `page`, whose keys must lie in `[low, high)`.
    fn verify_node(
        &self,
        page: PageNum,
        parent: Option<PageNum>,
        low: Option<Key>,
        high: Option<Key>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<()> {
        let node = self.read_node(page)?;
        if node.parent != parent {
            return violation(format!(
                "page {page} has parent {} but is a child of {}",
                PageNum::to_link(node.parent),
                PageNum::to_link(parent)
            ));
        }

        let keys = node.keys();
        if parent.is_some() && keys.len() < MIN_KEYS {
            return violation(format!("page {page} holds {} keys", keys.len()));
        }
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return violation(format!("keys of page {page} are not ascending"));
        }
        let in_bounds = |k: Key| low.map_or(true, |l| k >= l) && high.map_or(true, |h| k < h);
        if let Some(key) = keys.iter().find(|&&k| !in_bounds(k)) {
            return violation(format!("key {key} of page {page} is outside its parent's range"));
        }

        match &node.kind {
            NodeKind::Leaf(leaf) => {
                if leaf.records.len() > self.leaf_capacity() {
                    return violation(format!("leaf {page} is over capacity"));
                }
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return violation(format!(
                            "leaf {page} is at depth {depth}, others at {d}"
                        ));
                    }
                    Some(_) => {}
                }
                walk.summary.leaves += 1;
                walk.summary.records += leaf.records.len();
                walk.leaves.push((page, leaf.right));
            }
            NodeKind::Internal(internal) => {
                if internal.records.is_empty() {
                    return violation(format!("internal page {page} has no keys"));
                }
                if internal.records.len() > self.internal_capacity() {
                    return violation(format!("internal page {page} is over capacity"));
                }
                walk.summary.internal_nodes += 1;

                let mut child_low = low;
                for (i, child) in internal.children().enumerate() {
                    let child_high = internal.records.get(i).map(|r| r.key).or(high);
                    self.verify_node(child, Some(page), child_low, child_high, depth + 1, walk)?;
                    child_low = child_high;
                }
            }
        }
        Ok(())
    }
}

fn join_keys(keys: &[Key]) -> String {
    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(" ")
}

fn violation<T>(message: String) -> Result<T> {
    Err(Error::InvariantViolation(message))
}
