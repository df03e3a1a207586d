//! Deletion with merge and redistribution.

use tracing::debug;

use crate::common::{Error, PageNum, Result};
use crate::storage::page::{InternalRecord, Key, NodeKind, NodePage};

use super::{BPlusTree, MIN_KEYS};

/// An underfull node together with the sibling it rebalances against.
struct Underflow {
    page: PageNum,
    node: NodePage,
    neighbor_page: PageNum,
    neighbor: NodePage,
    parent_page: PageNum,
    parent: NodePage,
    /// The node is its parent's first child, so the neighbor is on its right.
    leftmost: bool,
    /// Index in the parent of the separator between node and neighbor.
    separator_index: usize,
    separator: Key,
}

impl BPlusTree<'_> {
    /// Remove `key` and its value.
    ///
    /// # Errors
    /// `Error::KeyNotFound` if the key is absent; nothing changes.
    pub fn delete(&self, key: Key) -> Result<()> {
        let root = self.root()?.ok_or(Error::KeyNotFound(key))?;
        let leaf_page = self.find_leaf(key)?.ok_or(Error::KeyNotFound(key))?;
        if self.read_node(leaf_page)?.leaf(leaf_page)?.get(key).is_none() {
            return Err(Error::KeyNotFound(key));
        }

        let new_root = self.delete_entry(root, leaf_page, key)?;
        if new_root != Some(root) {
            self.set_root(new_root)?;
        }
        Ok(())
    }

    /// Remove `key` from `page` and rebalance upwards. For an internal node
    /// the child right of `key` goes with it. Returns the root, `None` once
    /// the tree is empty.
    fn delete_entry(&self, root: PageNum, page: PageNum, key: Key) -> Result<Option<PageNum>> {
        let mut node = self.read_node(page)?;
        remove_entry(page, &mut node, key)?;

        if page == root {
            return self.adjust_root(root, node);
        }
        if node.num_keys() >= MIN_KEYS {
            self.write_node(page, node)?;
            return Ok(Some(root));
        }

        let underflow = self.underflow(page, node)?;
        let capacity = if underflow.node.is_leaf() {
            self.order.leaf
        } else {
            self.internal_capacity()
        };

        if underflow.neighbor.num_keys() + underflow.node.num_keys() < capacity {
            self.coalesce_nodes(root, underflow)
        } else {
            self.redistribute_nodes(underflow)?;
            Ok(Some(root))
        }
    }

    fn underflow(&self, page: PageNum, node: NodePage) -> Result<Underflow> {
        let parent_page = node.parent.ok_or_else(|| {
            Error::InvariantViolation(format!("non-root page {page} has no parent"))
        })?;
        let parent = self.read_node(parent_page)?;
        let internal = parent.internal(parent_page)?;

        let index = internal.child_index(page).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "page {page} is not a child of its parent {parent_page}"
            ))
        })?;
        let leftmost = index == 0;
        let (neighbor_index, separator_index) = if leftmost {
            (1, 0)
        } else {
            (index - 1, index - 1)
        };

        let neighbor_page = internal.child_at(neighbor_index).ok_or_else(|| {
            Error::InvariantViolation(format!("parent {parent_page} of page {page} has one child"))
        })?;
        let separator = internal.records[separator_index].key;
        let neighbor = self.read_node(neighbor_page)?;

        Ok(Underflow {
            page,
            node,
            neighbor_page,
            neighbor,
            parent_page,
            parent,
            leftmost,
            separator_index,
            separator,
        })
    }

    /// Once the root loses its last key: an internal root hands the tree to
    /// its only child, a leaf root leaves the tree empty.
    fn adjust_root(&self, root: PageNum, node: NodePage) -> Result<Option<PageNum>> {
        if node.num_keys() > 0 {
            self.write_node(root, node)?;
            return Ok(Some(root));
        }

        match node.kind {
            NodeKind::Internal(internal) => {
                let new_root = internal.first_child;
                self.set_parent(new_root, None)?;
                self.free_node(root)?;
                debug!(table = %self.table, old = %root, new = %new_root, "root collapsed");
                Ok(Some(new_root))
            }
            NodeKind::Leaf(_) => {
                self.free_node(root)?;
                debug!(table = %self.table, old = %root, "tree is now empty");
                Ok(None)
            }
        }
    }

    /// Merge the right node of the pair into the left one, drop the
    /// separator from the parent and free the right page.
    fn coalesce_nodes(&self, root: PageNum, u: Underflow) -> Result<Option<PageNum>> {
        let (left_page, mut left, right_page, right) = if u.leftmost {
            (u.page, u.node, u.neighbor_page, u.neighbor)
        } else {
            (u.neighbor_page, u.neighbor, u.page, u.node)
        };

        let mut moved = Vec::new();
        match (&mut left.kind, right.kind) {
            (NodeKind::Leaf(l), NodeKind::Leaf(r)) => {
                l.records.extend(r.records);
                l.right = r.right;
            }
            (NodeKind::Internal(l), NodeKind::Internal(r)) => {
                moved.push(r.first_child);
                moved.extend(r.records.iter().map(|rec| rec.child));
                l.records.push(InternalRecord {
                    key: u.separator,
                    child: r.first_child,
                });
                l.records.extend(r.records);
            }
            _ => {
                return Err(Error::InvariantViolation(format!(
                    "siblings {left_page} and {right_page} are at different levels"
                )))
            }
        }
        self.write_node(left_page, left)?;
        for child in moved {
            self.set_parent(child, Some(left_page))?;
        }

        debug!(
            table = %self.table,
            into = %left_page,
            from = %right_page,
            "merged nodes"
        );
        let root = self.delete_entry(root, u.parent_page, u.separator)?;
        self.free_node(right_page)?;
        Ok(root)
    }

    /// Move one entry from the neighbor into the underfull node and fix the
    /// separator between them.
    fn redistribute_nodes(&self, u: Underflow) -> Result<()> {
        let Underflow {
            page,
            mut node,
            neighbor_page,
            mut neighbor,
            parent_page,
            mut parent,
            leftmost,
            separator_index,
            separator,
        } = u;

        let mut moved_child = None;
        let new_separator = match (&mut node.kind, &mut neighbor.kind) {
            (NodeKind::Leaf(n), NodeKind::Leaf(nb)) => {
                if leftmost {
                    let record = nb.records.remove(0);
                    n.records.push(record);
                    nb.first_key()
                } else {
                    let record = nb.records.pop();
                    if let Some(record) = record {
                        n.records.insert(0, record);
                    }
                    n.first_key()
                }
            }
            (NodeKind::Internal(n), NodeKind::Internal(nb)) => {
                if leftmost {
                    let first = nb.records.remove(0);
                    n.records.push(InternalRecord {
                        key: separator,
                        child: nb.first_child,
                    });
                    moved_child = Some(nb.first_child);
                    nb.first_child = first.child;
                    Some(first.key)
                } else {
                    let last = nb.records.pop();
                    last.map(|last| {
                        n.records.insert(
                            0,
                            InternalRecord {
                                key: separator,
                                child: n.first_child,
                            },
                        );
                        n.first_child = last.child;
                        moved_child = Some(last.child);
                        last.key
                    })
                }
            }
            _ => None,
        };

        let new_separator = new_separator.ok_or_else(|| {
            Error::InvariantViolation(format!(
                "cannot redistribute between pages {page} and {neighbor_page}"
            ))
        })?;
        parent.internal_mut(parent_page)?.records[separator_index].key = new_separator;

        self.write_node(page, node)?;
        self.write_node(neighbor_page, neighbor)?;
        self.write_node(parent_page, parent)?;
        if let Some(child) = moved_child {
            self.set_parent(child, Some(page))?;
        }

        debug!(
            table = %self.table,
            page = %page,
            from = %neighbor_page,
            separator = new_separator,
            "redistributed"
        );
        Ok(())
    }
}

/// Remove `key` from a node. An internal node also loses the child that
/// follows it.
fn remove_entry(page: PageNum, node: &mut NodePage, key: Key) -> Result<()> {
    let removed = match &mut node.kind {
        NodeKind::Leaf(leaf) => leaf.search(key).map(|i| {
            leaf.records.remove(i);
        }),
        NodeKind::Internal(internal) => internal
            .records
            .binary_search_by_key(&key, |r| r.key)
            .map(|i| {
                internal.records.remove(i);
            }),
    };
    removed.map_err(|_| {
        Error::InvariantViolation(format!("key {key} missing from page {page} during delete"))
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{setup, value};
    use super::*;
    use crate::common::config::TreeOrder;

    #[test]
    fn test_delete_missing_key() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());
        assert!(matches!(tree.delete(1), Err(Error::KeyNotFound(1))));

        tree.insert(1, value(1)).unwrap();
        assert!(matches!(tree.delete(2), Err(Error::KeyNotFound(2))));
        assert_eq!(tree.find(1).unwrap(), Some(value(1)));
    }

    #[test]
    fn test_delete_last_key_empties_tree() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());
        tree.insert(1, value(1)).unwrap();
        tree.delete(1).unwrap();

        assert!(tree.is_empty().unwrap());
        assert_eq!(tree.find(1).unwrap(), None);

        // the freed leaf is reused for the next tree
        tree.insert(2, value(2)).unwrap();
        assert_eq!(tree.root().unwrap(), Some(PageNum(1)));
    }

    #[test]
    fn test_coalesce_collapses_root() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());
        for key in 1..=40 {
            tree.insert(key, value(key)).unwrap();
        }
        for key in 1..=20 {
            tree.delete(key).unwrap();
        }

        let root = tree.root().unwrap().unwrap();
        let node = tree.read_node(root).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.parent, None);
        assert_eq!(node.keys(), (21..=40).collect::<Vec<_>>());
        assert_eq!(tree.verify().unwrap().height, 1);
    }

    /// Allocate `n` pages and return their numbers.
    fn pages(tree: &BPlusTree<'_>, n: usize) -> Vec<PageNum> {
        (0..n).map(|_| tree.alloc_node(NodePage::blank()).unwrap()).collect()
    }

    fn leaf(tree: &BPlusTree<'_>, page: PageNum, keys: &[Key], parent: PageNum, right: Option<PageNum>) {
        let records = keys
            .iter()
            .map(|&key| crate::storage::page::LeafRecord { key, value: value(key) })
            .collect();
        tree.write_node(page, NodePage::new_leaf(Some(parent), records, right)).unwrap();
    }

    fn internal(
        tree: &BPlusTree<'_>,
        page: PageNum,
        parent: Option<PageNum>,
        first_child: PageNum,
        rest: &[(Key, PageNum)],
    ) {
        let records = rest
            .iter()
            .map(|&(key, child)| InternalRecord { key, child })
            .collect();
        tree.write_node(page, NodePage::new_internal(parent, first_child, records)).unwrap();
    }

    #[test]
    fn test_redistribute_into_leftmost_internal_node() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 3));
        let p = pages(&tree, 8);
        let (root, a, b) = (p[0], p[1], p[2]);
        let (l10, l20, l30, l40, l50) = (p[3], p[4], p[5], p[6], p[7]);

        internal(&tree, root, None, a, &[(30, b)]);
        internal(&tree, a, Some(root), l10, &[(20, l20)]);
        internal(&tree, b, Some(root), l30, &[(40, l40), (50, l50)]);
        leaf(&tree, l10, &[10], a, Some(l20));
        leaf(&tree, l20, &[20], a, Some(l30));
        leaf(&tree, l30, &[30], b, Some(l40));
        leaf(&tree, l40, &[40], b, Some(l50));
        leaf(&tree, l50, &[50], b, None);
        tree.set_root(Some(root)).unwrap();
        tree.verify().unwrap();

        // l10 absorbs l20, `a` empties and borrows l30 from `b`
        tree.delete(10).unwrap();

        assert_eq!(tree.read_node(root).unwrap().keys(), vec![40]);
        let a_node = tree.read_node(a).unwrap();
        assert_eq!(a_node.keys(), vec![30]);
        assert_eq!(a_node.as_internal().unwrap().first_child, l10);
        assert_eq!(tree.read_node(l30).unwrap().parent, Some(a));
        let b_node = tree.read_node(b).unwrap();
        assert_eq!(b_node.keys(), vec![50]);
        assert_eq!(b_node.as_internal().unwrap().first_child, l40);

        tree.verify().unwrap();
        let keys: Vec<Key> = tree.cursor().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, vec![20, 30, 40, 50]);
    }

    #[test]
    fn test_redistribute_from_left_internal_node() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 3));
        let p = pages(&tree, 8);
        let (root, a, b) = (p[0], p[1], p[2]);
        let (l5, l10, l20, l30, l40) = (p[3], p[4], p[5], p[6], p[7]);

        internal(&tree, root, None, a, &[(30, b)]);
        internal(&tree, a, Some(root), l5, &[(10, l10), (20, l20)]);
        internal(&tree, b, Some(root), l30, &[(40, l40)]);
        leaf(&tree, l5, &[5], a, Some(l10));
        leaf(&tree, l10, &[10], a, Some(l20));
        leaf(&tree, l20, &[20], a, Some(l30));
        leaf(&tree, l30, &[30], b, Some(l40));
        leaf(&tree, l40, &[40], b, None);
        tree.set_root(Some(root)).unwrap();
        tree.verify().unwrap();

        // l40 merges into l30, `b` empties and borrows l20 from `a`
        tree.delete(40).unwrap();

        assert_eq!(tree.read_node(root).unwrap().keys(), vec![20]);
        assert_eq!(tree.read_node(a).unwrap().keys(), vec![10]);
        let b_node = tree.read_node(b).unwrap();
        assert_eq!(b_node.keys(), vec![30]);
        assert_eq!(b_node.as_internal().unwrap().first_child, l20);
        assert_eq!(tree.read_node(l20).unwrap().parent, Some(b));

        tree.verify().unwrap();
        let keys: Vec<Key> = tree.cursor().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, vec![5, 10, 20, 30]);
    }

    #[test]
    fn test_redistribute_leaf_written_under_larger_order() {
        // leaves built with room for three records, read back with order 3
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 3));
        let p = pages(&tree, 3);
        let (root, left, right) = (p[0], p[1], p[2]);

        internal(&tree, root, None, left, &[(20, right)]);
        leaf(&tree, left, &[10], root, Some(right));
        leaf(&tree, right, &[20, 30, 40], root, None);
        tree.set_root(Some(root)).unwrap();

        tree.delete(10).unwrap();

        assert_eq!(tree.read_node(root).unwrap().keys(), vec![30]);
        assert_eq!(tree.read_node(left).unwrap().keys(), vec![20]);
        assert_eq!(tree.read_node(right).unwrap().keys(), vec![30, 40]);
        assert_eq!(tree.find(20).unwrap(), Some(value(20)));
        assert_eq!(tree.find_range(0, 100).unwrap().len(), 3);
    }

    #[test]
    fn test_deep_tree_shrinks_back() {
        let (bpm, table, _dir) = setup(32);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 3));
        for key in 0..64 {
            tree.insert(key, value(key)).unwrap();
        }
        assert!(tree.verify().unwrap().height > 3);

        for key in 0..64 {
            tree.delete(key).unwrap();
            let summary = tree.verify().unwrap();
            assert_eq!(summary.records, 63 - key as usize);
        }
        assert!(tree.is_empty().unwrap());
    }

    #[test]
    fn test_delete_from_the_right_end() {
        let (bpm, table, _dir) = setup(32);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 4));
        for key in 0..50 {
            tree.insert(key, value(key)).unwrap();
        }
        for key in (0..50).rev().step_by(2) {
            tree.delete(key).unwrap();
            tree.verify().unwrap();
        }
        let keys: Vec<Key> = tree.cursor().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, (0..50).step_by(2).collect::<Vec<_>>());
    }
}
