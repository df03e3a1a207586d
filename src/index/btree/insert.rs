//! Insertion with leaf and internal splits.

use tracing::debug;

use crate::common::{Error, PageNum, Result};
use crate::storage::page::{InternalRecord, Key, LeafRecord, NodePage, Value};

use super::{cut, BPlusTree};

impl BPlusTree<'_> {
    /// Insert a new record.
    ///
    /// # Errors
    /// `Error::DuplicateKey` if `key` is already present; nothing changes.
    pub fn insert(&self, key: Key, value: Value) -> Result<()> {
        if self.find(key)?.is_some() {
            return Err(Error::DuplicateKey(key));
        }
        let record = LeafRecord { key, value };

        let Some(root) = self.root()? else {
            return self.start_new_tree(record);
        };

        let leaf_page = self.find_leaf(key)?.ok_or_else(|| {
            Error::InvariantViolation(format!("root {root} leads to no leaf"))
        })?;
        let mut node = self.read_node(leaf_page)?;
        let leaf = node.leaf_mut(leaf_page)?;

        if leaf.records.len() < self.leaf_capacity() {
            let index = leaf.search(key).map_or_else(|i| i, |i| i);
            leaf.records.insert(index, record);
            return self.write_node(leaf_page, node);
        }

        let new_root = self.split_leaf(root, leaf_page, node, record)?;
        if new_root != root {
            self.set_root(Some(new_root))?;
        }
        Ok(())
    }

    fn start_new_tree(&self, record: LeafRecord) -> Result<()> {
        let root = self.alloc_node(NodePage::new_leaf(None, vec![record], None))?;
        debug!(table = %self.table, root = %root, "started new tree");
        self.set_root(Some(root))
    }

    /// Split a full leaf while inserting `record`. Returns the root.
    fn split_leaf(
        &self,
        root: PageNum,
        leaf_page: PageNum,
        mut node: NodePage,
        record: LeafRecord,
    ) -> Result<PageNum> {
        let parent = node.parent;
        let leaf = node.leaf_mut(leaf_page)?;

        let mut records = std::mem::take(&mut leaf.records);
        let index = records
            .binary_search_by_key(&record.key, |r| r.key)
            .map_or_else(|i| i, |i| i);
        records.insert(index, record);

        let right_records = records.split_off(cut(self.leaf_capacity()));
        let separator = right_records[0].key;
        leaf.records = records;

        let new_leaf = NodePage::new_leaf(parent, right_records, leaf.right);
        let new_page = self.alloc_node(new_leaf)?;
        leaf.right = Some(new_page);
        self.write_node(leaf_page, node)?;

        debug!(
            table = %self.table,
            left = %leaf_page,
            right = %new_page,
            separator,
            "split leaf"
        );
        self.insert_into_parent(root, parent, leaf_page, separator, new_page)
    }

    /// Link `right` into the tree just after `left`, with `key` as the
    /// separator between them. Returns the (possibly new) root.
    fn insert_into_parent(
        &self,
        root: PageNum,
        parent: Option<PageNum>,
        left: PageNum,
        key: Key,
        right: PageNum,
    ) -> Result<PageNum> {
        let Some(parent_page) = parent else {
            return self.insert_into_new_root(left, key, right);
        };

        let mut node = self.read_node(parent_page)?;
        let internal = node.internal_mut(parent_page)?;
        let left_index = internal.child_index(left).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "page {left} is not a child of its parent {parent_page}"
            ))
        })?;
        let record = InternalRecord { key, child: right };

        if internal.records.len() < self.internal_capacity() {
            internal.records.insert(left_index, record);
            self.write_node(parent_page, node)?;
            return Ok(root);
        }

        self.split_internal(root, parent_page, node, left_index, record)
    }

    fn insert_into_new_root(&self, left: PageNum, key: Key, right: PageNum) -> Result<PageNum> {
        let root = self.alloc_node(NodePage::new_internal(
            None,
            left,
            vec![InternalRecord { key, child: right }],
        ))?;
        self.set_parent(left, Some(root))?;
        self.set_parent(right, Some(root))?;

        debug!(table = %self.table, root = %root, key, "new root");
        Ok(root)
    }

    /// Split a full internal node while inserting `record` at `index`.
    ///
    /// The key at the split point moves up to the parent instead of
    /// staying in either half. Returns the root.
    fn split_internal(
        &self,
        root: PageNum,
        page: PageNum,
        mut node: NodePage,
        index: usize,
        record: InternalRecord,
    ) -> Result<PageNum> {
        let parent = node.parent;
        let internal = node.internal_mut(page)?;

        let mut records = std::mem::take(&mut internal.records);
        records.insert(index, record);

        let split = cut(self.order.internal);
        let right_records = records.split_off(split);
        let Some(promoted) = records.pop() else {
            return Err(Error::InvariantViolation(format!(
                "internal split of page {page} left no key to promote"
            )));
        };
        internal.records = records;

        let new_node = NodePage::new_internal(parent, promoted.child, right_records);
        let children: Vec<PageNum> = new_node.internal(page)?.children().collect();
        let new_page = self.alloc_node(new_node)?;
        self.write_node(page, node)?;

        for child in children {
            self.set_parent(child, Some(new_page))?;
        }

        debug!(
            table = %self.table,
            left = %page,
            right = %new_page,
            separator = promoted.key,
            "split internal node"
        );
        self.insert_into_parent(root, parent, page, promoted.key, new_page)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{setup, value};
    use super::*;
    use crate::common::config::TreeOrder;

    #[test]
    fn test_duplicate_rejected() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());

        tree.insert(7, value(7)).unwrap();
        let err = tree.insert(7, Value::new(b"other").unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(7)));
        assert_eq!(tree.find(7).unwrap(), Some(value(7)));
    }

    #[test]
    fn test_first_insert_allocates_leaf_root() {
        let (bpm, table, _dir) = setup(8);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());

        tree.insert(1, value(1)).unwrap();
        assert_eq!(tree.root().unwrap(), Some(PageNum(1)));
        assert!(tree.read_node(PageNum(1)).unwrap().is_leaf());
    }

    #[test]
    fn test_leaf_split_at_default_order() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::default());
        for key in 1..=40 {
            tree.insert(key, value(key)).unwrap();
        }

        let root = tree.root().unwrap().unwrap();
        assert_eq!(root, PageNum(3));
        let root_node = tree.read_node(root).unwrap();
        assert_eq!(root_node.keys(), vec![17]);

        let internal = root_node.as_internal().unwrap();
        let left = tree.read_node(internal.first_child).unwrap();
        let right = tree.read_node(internal.records[0].child).unwrap();
        assert_eq!(left.keys(), (1..=16).collect::<Vec<_>>());
        assert_eq!(right.keys(), (17..=40).collect::<Vec<_>>());
        assert_eq!(left.as_leaf().unwrap().right, Some(internal.records[0].child));
        assert_eq!(right.as_leaf().unwrap().right, None);
        assert_eq!(left.parent, Some(root));
        assert_eq!(right.parent, Some(root));
    }

    #[test]
    fn test_split_links_new_leaf_between_siblings() {
        let (bpm, table, _dir) = setup(16);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(4, 4));
        for key in [10, 20, 30, 40, 50, 60] {
            tree.insert(key, value(key)).unwrap();
        }
        // fill the leftmost leaf and split it in the middle of the chain
        tree.insert(11, value(11)).unwrap();
        tree.insert(12, value(12)).unwrap();

        let keys: Vec<Key> = tree.cursor().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, vec![10, 11, 12, 20, 30, 40, 50, 60]);
        tree.verify().unwrap();
    }

    #[test]
    fn test_internal_split_reparents_children() {
        let (bpm, table, _dir) = setup(32);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(3, 3));
        for key in 0..30 {
            tree.insert(key, value(key)).unwrap();
        }

        let summary = tree.verify().unwrap();
        assert!(summary.height >= 3);
        assert_eq!(summary.records, 30);
        for key in 0..30 {
            assert_eq!(tree.find(key).unwrap(), Some(value(key)));
        }
    }

    #[test]
    fn test_descending_and_negative_keys() {
        let (bpm, table, _dir) = setup(32);
        let tree = BPlusTree::new(&bpm, table, TreeOrder::new(5, 4));
        for key in (-50..50).rev() {
            tree.insert(key, value(key)).unwrap();
        }

        tree.verify().unwrap();
        let keys: Vec<Key> = tree.cursor().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(keys, (-50..50).collect::<Vec<_>>());
    }
}
