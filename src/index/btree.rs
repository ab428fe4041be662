use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use super::error::{IndexError, IndexResult};
use super::IndexKey;
use crate::buffer::{BufferPoolManager, PageKey};
use crate::catalog::{DataType, IndexDefinition, IndexKind};
use crate::file::{HEADER_SIZE, HeapPage, PAGE_SIZE, PageId};
use crate::heap::Tid;

const META_MAGIC: u32 = 0x4249_4458;
const META_VERSION: u32 = 1;
const NODE_MAGIC: u32 = 0x424E_4F44;

/// Payload capacity of one page past the slotted-page header, which the
/// node layout overlays instead of using slots
const PAGE_CAPACITY: usize = PAGE_SIZE - HEADER_SIZE;

const META_MAGIC_OFF: usize = HEADER_SIZE;
const META_VERSION_OFF: usize = HEADER_SIZE + 4;
const META_ROOT_OFF: usize = HEADER_SIZE + 8;
const META_HEIGHT_OFF: usize = HEADER_SIZE + 12;
const META_LEFTMOST_OFF: usize = HEADER_SIZE + 16;
const META_NEXT_PAGE_OFF: usize = HEADER_SIZE + 20;

const NODE_MAGIC_OFF: usize = HEADER_SIZE;
const NODE_IS_LEAF_OFF: usize = HEADER_SIZE + 4;
const NODE_PARENT_OFF: usize = HEADER_SIZE + 8;
const NODE_LEFT_SIB_OFF: usize = HEADER_SIZE + 12;
const NODE_RIGHT_SIB_OFF: usize = HEADER_SIZE + 16;
const NODE_KEY_COUNT_OFF: usize = HEADER_SIZE + 20;
const NODE_HDR_SIZE: usize = 24;
const NODE_DATA_OFF: usize = HEADER_SIZE + NODE_HDR_SIZE;

/// Sentinel for "no page" in parent/sibling pointers
const NO_PAGE: i32 = -1;

#[derive(Debug, Clone, Copy)]
struct Meta {
    root: PageId,
    height: u32,
    leftmost_leaf: PageId,
    next_page_id: PageId,
}

/// One node materialized from its page. Nodes reference each other only
/// by page id; the tree never holds in-memory links between them.
struct Node {
    page_id: PageId,
    is_leaf: bool,
    parent: i32,
    left_sibling: i32,
    right_sibling: i32,
    keys: Vec<IndexKey>,
    /// Leaf only: one TID list per key (duplicates share a key slot)
    values: Vec<Vec<Tid>>,
    /// Internal only: key_count + 1 children
    children: Vec<PageId>,
}

impl Node {
    fn new(page_id: PageId, is_leaf: bool) -> Self {
        Self {
            page_id,
            is_leaf,
            parent: NO_PAGE,
            left_sibling: NO_PAGE,
            right_sibling: NO_PAGE,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// On-disk B+tree: a sibling-chained leaf level under internal fan-out
/// nodes, with bottom-up split propagation. Page 0 holds the meta record
/// (root, height, leftmost leaf, page allocator).
pub struct DiskBTreeIndex {
    pool: Arc<BufferPoolManager>,
    def: IndexDefinition,
    key_type: DataType,
    meta: Meta,
}

impl DiskBTreeIndex {
    pub fn open(pool: Arc<BufferPoolManager>, def: IndexDefinition) -> IndexResult<Self> {
        if def.kind != IndexKind::BTree {
            return Err(IndexError::WrongIndexKind {
                expected: IndexKind::BTree,
                actual: def.kind,
            });
        }

        let path = pool.storage_root().join(&def.file_node);
        let needs_init = !path.exists() || std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

        let key_type = def.key_type;
        let mut index = Self {
            pool,
            def,
            key_type,
            meta: Meta {
                root: 0,
                height: 0,
                leftmost_leaf: 0,
                next_page_id: 0,
            },
        };

        if needs_init {
            index.initialize_new()?;
        } else {
            index.load_meta()?;
        }
        Ok(index)
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.def
    }

    /// Current tree height (1 = root is a leaf)
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn insert(&mut self, key: &IndexKey, tid: Tid) -> IndexResult<()> {
        self.check_key_type(key)?;

        let mut path: Vec<PageId> = Vec::new();
        let mut leaf = self.find_leaf(key, Some(&mut path))?;
        Self::insert_into_leaf(&mut leaf, key, tid);

        if self.node_size(&leaf) <= PAGE_CAPACITY {
            self.write_node(&leaf)?;
            return Ok(());
        }
        self.split_leaf(leaf, &mut path)
    }

    pub fn search(&self, key: &IndexKey) -> IndexResult<Vec<Tid>> {
        self.check_key_type(key)?;

        let leaf = self.find_leaf(key, None)?;
        let pos = lower_bound(&leaf.keys, key);
        if pos >= leaf.keys.len() || leaf.keys[pos] != *key {
            return Ok(Vec::new());
        }
        Ok(leaf.values[pos].clone())
    }

    /// Walk the leaf chain collecting TIDs for keys within the bounds.
    /// An inverted range returns empty without touching any leaf.
    pub fn range_search(
        &self,
        from: Option<&IndexKey>,
        from_inclusive: bool,
        to: Option<&IndexKey>,
        to_inclusive: bool,
    ) -> IndexResult<Vec<Tid>> {
        if let Some(from) = from {
            self.check_key_type(from)?;
        }
        if let Some(to) = to {
            self.check_key_type(to)?;
        }
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Ok(Vec::new());
        }

        let (mut current, mut pos) = match from {
            None => (self.meta.leftmost_leaf as i32, 0usize),
            Some(from) => {
                let leaf = self.find_leaf(from, None)?;
                (leaf.page_id as i32, lower_bound(&leaf.keys, from))
            }
        };

        let mut out = Vec::new();
        while current != NO_PAGE {
            let leaf = self.read_node(current as PageId)?;
            if !leaf.is_leaf {
                return Err(IndexError::CorruptNode {
                    page_id: leaf.page_id,
                    detail: "expected leaf on the sibling chain".to_string(),
                });
            }

            while pos < leaf.keys.len() {
                let k = &leaf.keys[pos];
                if let Some(from) = from {
                    let c = k.cmp(from);
                    if c == Ordering::Less || (!from_inclusive && c == Ordering::Equal) {
                        pos += 1;
                        continue;
                    }
                }
                if let Some(to) = to {
                    let c = k.cmp(to);
                    if c == Ordering::Greater || (!to_inclusive && c == Ordering::Equal) {
                        return Ok(out);
                    }
                }
                out.extend_from_slice(&leaf.values[pos]);
                pos += 1;
            }

            current = leaf.right_sibling;
            pos = 0;
        }
        Ok(out)
    }

    fn initialize_new(&mut self) -> IndexResult<()> {
        self.pool.new_page(&self.key(0), HeapPage::new(0))?;
        self.pool.new_page(&self.key(1), HeapPage::new(1))?;

        self.meta = Meta {
            root: 1,
            height: 1,
            leftmost_leaf: 1,
            next_page_id: 2,
        };

        let leaf = Node::new(1, true);
        self.write_node(&leaf)?;
        self.write_meta()?;

        self.pool.flush_all_pages()?;
        debug!(index = %self.def.name, "initialized btree index file");
        Ok(())
    }

    fn load_meta(&mut self) -> IndexResult<()> {
        let page = self.pool.get_page(&self.key(0))?;
        let buf = page.bytes();

        let magic = read_u32_at(buf, META_MAGIC_OFF);
        if magic != META_MAGIC {
            return Err(IndexError::BadMagic(magic));
        }
        let version = read_u32_at(buf, META_VERSION_OFF);
        if version != META_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }

        self.meta = Meta {
            root: read_u32_at(buf, META_ROOT_OFF),
            height: read_u32_at(buf, META_HEIGHT_OFF),
            leftmost_leaf: read_u32_at(buf, META_LEFTMOST_OFF),
            next_page_id: read_u32_at(buf, META_NEXT_PAGE_OFF),
        };
        Ok(())
    }

    fn write_meta(&self) -> IndexResult<()> {
        let key = self.key(0);
        let mut page = self.pool.get_page(&key)?;
        let buf = page.bytes_mut();

        write_u32_at(buf, META_MAGIC_OFF, META_MAGIC);
        write_u32_at(buf, META_VERSION_OFF, META_VERSION);
        write_u32_at(buf, META_ROOT_OFF, self.meta.root);
        write_u32_at(buf, META_HEIGHT_OFF, self.meta.height);
        write_u32_at(buf, META_LEFTMOST_OFF, self.meta.leftmost_leaf);
        write_u32_at(buf, META_NEXT_PAGE_OFF, self.meta.next_page_id);

        self.pool.update_page(&key, page)?;
        Ok(())
    }

    /// Descend from the root to the leaf owning `key`, optionally
    /// recording the page ids along the way for split propagation
    fn find_leaf(&self, key: &IndexKey, mut path: Option<&mut Vec<PageId>>) -> IndexResult<Node> {
        let mut current = self.meta.root;
        loop {
            let node = self.read_node(current)?;
            if let Some(path) = path.as_deref_mut() {
                path.push(current);
            }
            if node.is_leaf {
                return Ok(node);
            }
            let idx = child_index(&node.keys, key);
            current = node.children[idx];
        }
    }

    fn insert_into_leaf(leaf: &mut Node, key: &IndexKey, tid: Tid) {
        let pos = lower_bound(&leaf.keys, key);
        if pos < leaf.keys.len() && leaf.keys[pos] == *key {
            leaf.values[pos].push(tid);
            return;
        }
        leaf.keys.insert(pos, key.clone());
        leaf.values.insert(pos, vec![tid]);
    }

    fn split_leaf(&mut self, mut leaf: Node, path: &mut Vec<PageId>) -> IndexResult<()> {
        let split_pos = (leaf.keys.len() + 1) / 2;

        let mut right = Node::new(self.allocate_page_id()?, true);
        right.parent = leaf.parent;
        right.keys = leaf.keys.split_off(split_pos);
        right.values = leaf.values.split_off(split_pos);

        right.right_sibling = leaf.right_sibling;
        right.left_sibling = leaf.page_id as i32;
        leaf.right_sibling = right.page_id as i32;

        if right.right_sibling != NO_PAGE {
            let mut old_right = self.read_node(right.right_sibling as PageId)?;
            old_right.left_sibling = right.page_id as i32;
            self.write_node(&old_right)?;
        }

        self.write_node(&leaf)?;
        self.write_node(&right)?;

        let separator = right.keys[0].clone();
        path.pop();

        if leaf.parent == NO_PAGE || path.is_empty() {
            return self.grow_root(separator, leaf, right);
        }

        let mut parent = self.read_node(leaf.parent as PageId)?;
        insert_into_internal(&mut parent, separator, right.page_id, leaf.page_id);
        self.write_node(&parent)?;

        if self.node_size(&parent) > PAGE_CAPACITY {
            self.split_internal(parent, path)?;
        }
        Ok(())
    }

    fn split_internal(&mut self, mut node: Node, path: &mut Vec<PageId>) -> IndexResult<()> {
        let mid = node.keys.len() / 2;
        let separator = node.keys[mid].clone();

        let mut right = Node::new(self.allocate_page_id()?, false);
        right.parent = node.parent;
        right.keys = node.keys.split_off(mid + 1);
        right.children = node.children.split_off(mid + 1);
        // The separator leaves the node entirely; it moves up to the parent
        node.keys.truncate(mid);

        // Children that moved right must learn their new parent
        for &child_id in &right.children {
            let mut child = self.read_node(child_id)?;
            child.parent = right.page_id as i32;
            self.write_node(&child)?;
        }

        self.write_node(&node)?;
        self.write_node(&right)?;

        path.pop();

        if node.parent == NO_PAGE || path.is_empty() {
            return self.grow_root(separator, node, right);
        }

        let mut parent = self.read_node(node.parent as PageId)?;
        insert_into_internal(&mut parent, separator, right.page_id, node.page_id);
        self.write_node(&parent)?;

        if self.node_size(&parent) > PAGE_CAPACITY {
            self.split_internal(parent, path)?;
        }
        Ok(())
    }

    /// Install a new root above a freshly split pair, increasing the
    /// tree height
    fn grow_root(&mut self, separator: IndexKey, mut left: Node, mut right: Node) -> IndexResult<()> {
        let mut root = Node::new(self.allocate_page_id()?, false);
        root.keys.push(separator);
        root.children.push(left.page_id);
        root.children.push(right.page_id);

        left.parent = root.page_id as i32;
        right.parent = root.page_id as i32;
        self.write_node(&left)?;
        self.write_node(&right)?;
        self.write_node(&root)?;

        self.meta.root = root.page_id;
        self.meta.height += 1;
        self.write_meta()?;
        debug!(
            index = %self.def.name,
            height = self.meta.height,
            "btree grew a level"
        );
        Ok(())
    }

    /// Draw a fresh page id from the meta allocator, persisting the
    /// counter before the page is used
    fn allocate_page_id(&mut self) -> IndexResult<PageId> {
        let id = self.meta.next_page_id;
        self.meta.next_page_id += 1;
        self.write_meta()?;

        let key = self.key(id);
        let page = HeapPage::new(id);
        self.pool.new_page(&key, page.clone())?;
        self.pool.update_page(&key, page)?;
        Ok(id)
    }

    fn read_node(&self, page_id: PageId) -> IndexResult<Node> {
        let page = self.pool.get_page(&self.key(page_id))?;
        let buf = page.bytes();

        let magic = read_u32_at(buf, NODE_MAGIC_OFF);
        if magic != NODE_MAGIC {
            return Err(IndexError::CorruptNode {
                page_id,
                detail: format!("bad node magic {magic:#010x}"),
            });
        }

        let mut node = Node::new(page_id, read_u32_at(buf, NODE_IS_LEAF_OFF) != 0);
        node.parent = read_i32_at(buf, NODE_PARENT_OFF);
        node.left_sibling = read_i32_at(buf, NODE_LEFT_SIB_OFF);
        node.right_sibling = read_i32_at(buf, NODE_RIGHT_SIB_OFF);
        let key_count = read_u32_at(buf, NODE_KEY_COUNT_OFF) as usize;

        let mut off = NODE_DATA_OFF;
        for _ in 0..key_count {
            let len = read_u16_at(buf, off) as usize;
            off += 2;
            node.keys
                .push(IndexKey::decode(self.key_type, &buf[off..off + len])?);
            off += len;
        }

        if node.is_leaf {
            for _ in 0..key_count {
                let tid_count = read_u32_at(buf, off) as usize;
                off += 4;
                let mut tids = Vec::with_capacity(tid_count);
                for _ in 0..tid_count {
                    tids.push(Tid::read_from(&buf[off..off + Tid::ENCODED_LEN]));
                    off += Tid::ENCODED_LEN;
                }
                node.values.push(tids);
            }
        } else {
            let child_count = read_u32_at(buf, off) as usize;
            off += 4;
            for _ in 0..child_count {
                node.children.push(read_u32_at(buf, off));
                off += 4;
            }
        }

        Ok(node)
    }

    fn write_node(&self, node: &Node) -> IndexResult<()> {
        let size = self.node_size(node);
        if size > PAGE_CAPACITY {
            return Err(IndexError::NodeTooLarge { size });
        }

        let key = self.key(node.page_id);
        let mut page = self.pool.get_page(&key)?;
        let buf = page.bytes_mut();
        buf[HEADER_SIZE..].fill(0);

        write_u32_at(buf, NODE_MAGIC_OFF, NODE_MAGIC);
        write_u32_at(buf, NODE_IS_LEAF_OFF, node.is_leaf as u32);
        write_i32_at(buf, NODE_PARENT_OFF, node.parent);
        write_i32_at(buf, NODE_LEFT_SIB_OFF, node.left_sibling);
        write_i32_at(buf, NODE_RIGHT_SIB_OFF, node.right_sibling);
        write_u32_at(buf, NODE_KEY_COUNT_OFF, node.keys.len() as u32);

        let mut off = NODE_DATA_OFF;
        for key in &node.keys {
            let encoded = key.encode()?;
            write_u16_at(buf, off, encoded.len() as u16);
            off += 2;
            buf[off..off + encoded.len()].copy_from_slice(&encoded);
            off += encoded.len();
        }

        if node.is_leaf {
            for tids in &node.values {
                write_u32_at(buf, off, tids.len() as u32);
                off += 4;
                for tid in tids {
                    tid.write_to(&mut buf[off..off + Tid::ENCODED_LEN]);
                    off += Tid::ENCODED_LEN;
                }
            }
        } else {
            write_u32_at(buf, off, node.children.len() as u32);
            off += 4;
            for &child in &node.children {
                write_u32_at(buf, off, child);
                off += 4;
            }
        }

        self.pool.update_page(&key, page)?;
        Ok(())
    }

    /// Serialized size of a node, used as the split trigger
    fn node_size(&self, node: &Node) -> usize {
        let mut size = NODE_HDR_SIZE;
        for key in &node.keys {
            size += 2 + key.encoded_len();
        }
        if node.is_leaf {
            for tids in &node.values {
                size += 4 + tids.len() * Tid::ENCODED_LEN;
            }
        } else {
            size += 4 + node.children.len() * 4;
        }
        size
    }

    fn check_key_type(&self, key: &IndexKey) -> IndexResult<()> {
        if key.data_type() != self.key_type {
            return Err(IndexError::KeyTypeMismatch {
                expected: self.key_type,
                actual: key.data_type(),
            });
        }
        Ok(())
    }

    fn key(&self, page_id: PageId) -> PageKey {
        PageKey::new(self.def.file_node.clone(), page_id)
    }
}

/// First child whose separator is strictly greater than the key; ties
/// descend right
fn child_index(keys: &[IndexKey], key: &IndexKey) -> usize {
    keys.iter().position(|k| k > key).unwrap_or(keys.len())
}

/// First position whose key is >= the probe
fn lower_bound(keys: &[IndexKey], key: &IndexKey) -> usize {
    keys.partition_point(|k| k < key)
}

fn insert_into_internal(parent: &mut Node, key: IndexKey, right_child: PageId, left_child: PageId) {
    let left_pos = parent
        .children
        .iter()
        .position(|&c| c == left_child)
        .unwrap_or_else(|| child_index(&parent.keys, &key));
    parent.keys.insert(left_pos, key);
    parent.children.insert(left_pos + 1, right_child);
}

fn read_u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_i32_at(buf: &[u8], off: usize) -> i32 {
    i32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn write_u16_at(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_be_bytes());
}

fn write_u32_at(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

fn write_i32_at(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LruReplacer;
    use crate::catalog::{Catalog, IndexKind};
    use crate::file::PageFileManager;
    use tempfile::TempDir;

    fn open_pool(root: &std::path::Path, capacity: usize) -> Arc<BufferPoolManager> {
        Arc::new(BufferPoolManager::new(
            capacity,
            PageFileManager::new(),
            Box::new(LruReplacer::new()),
            root,
        ))
    }

    fn int_index_def(root: &std::path::Path) -> IndexDefinition {
        let catalog = Catalog::open(root).unwrap();
        if catalog.table("t").is_err() {
            catalog
                .create_table("t", &[("id".to_string(), DataType::Int64)])
                .unwrap();
        }
        match catalog.index("idx_t_id") {
            Ok(def) => def,
            Err(_) => catalog
                .create_index("idx_t_id", "t", "id", IndexKind::BTree)
                .unwrap(),
        }
    }

    #[test]
    fn test_insert_and_search_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 64);
        let mut index = DiskBTreeIndex::open(pool, int_index_def(temp_dir.path())).unwrap();

        index.insert(&IndexKey::Int64(10), Tid::new(0, 1)).unwrap();
        index.insert(&IndexKey::Int64(10), Tid::new(0, 2)).unwrap();

        let found = index.search(&IndexKey::Int64(10)).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&Tid::new(0, 1)));
        assert!(found.contains(&Tid::new(0, 2)));

        assert!(index.search(&IndexKey::Int64(11)).unwrap().is_empty());
    }

    #[test]
    fn test_full_scan_returns_sorted_key_order() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 64);
        let mut index = DiskBTreeIndex::open(pool, int_index_def(temp_dir.path())).unwrap();

        for k in [5i64, 1, 9, 3, 7, 2, 8, 6, 4, 0] {
            index
                .insert(&IndexKey::Int64(k), Tid::new(0, k as u16))
                .unwrap();
        }

        let all = index.range_search(None, true, None, true).unwrap();
        let slots: Vec<u16> = all.iter().map(|tid| tid.slot_id).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_range_search_bounds_and_inclusivity() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 128);
        let mut index = DiskBTreeIndex::open(pool, int_index_def(temp_dir.path())).unwrap();

        for k in 0i64..100 {
            index
                .insert(&IndexKey::Int64(k), Tid::new(0, k as u16))
                .unwrap();
        }

        let res = index
            .range_search(
                Some(&IndexKey::Int64(10)),
                true,
                Some(&IndexKey::Int64(20)),
                true,
            )
            .unwrap();
        assert_eq!(res.len(), 11);
        assert_eq!(res[0], Tid::new(0, 10));
        assert_eq!(res[10], Tid::new(0, 20));

        let res = index
            .range_search(
                Some(&IndexKey::Int64(10)),
                false,
                Some(&IndexKey::Int64(20)),
                false,
            )
            .unwrap();
        assert_eq!(res.len(), 9);
        assert_eq!(res[0], Tid::new(0, 11));
        assert_eq!(res[8], Tid::new(0, 19));
    }

    #[test]
    fn test_inverted_range_is_empty_without_page_reads() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path(), 64);
        let mut index =
            DiskBTreeIndex::open(Arc::clone(&pool), int_index_def(temp_dir.path())).unwrap();

        for k in 0i64..50 {
            index
                .insert(&IndexKey::Int64(k), Tid::new(0, k as u16))
                .unwrap();
        }
        pool.flush_all_pages().unwrap();
        let before = pool.file_manager().read_count();

        let res = index
            .range_search(
                Some(&IndexKey::Int64(30)),
                true,
                Some(&IndexKey::Int64(10)),
                true,
            )
            .unwrap();
        assert!(res.is_empty());
        assert_eq!(pool.file_manager().read_count(), before);
    }

    #[test]
    fn test_splits_increase_height_and_survive_restart() {
        let temp_dir = TempDir::new().unwrap();
        let probes = [0i64, 1, 42, 999];
        {
            let pool = open_pool(temp_dir.path(), 256);
            let mut index =
                DiskBTreeIndex::open(Arc::clone(&pool), int_index_def(temp_dir.path())).unwrap();

            for i in 0i64..1000 {
                index
                    .insert(
                        &IndexKey::Int64(i),
                        Tid::new((i / 100) as u32, (i % 100) as u16),
                    )
                    .unwrap();
            }
            assert!(index.height() >= 2, "expected splits to increase height");

            for &k in &probes {
                let got = index.search(&IndexKey::Int64(k)).unwrap();
                assert_eq!(got, vec![Tid::new((k / 100) as u32, (k % 100) as u16)]);
            }

            pool.flush_all_pages().unwrap();
        }

        // Fresh pool, same files
        let pool = open_pool(temp_dir.path(), 256);
        let index = DiskBTreeIndex::open(pool, int_index_def(temp_dir.path())).unwrap();
        assert!(index.height() >= 2);
        for &k in &probes {
            let got = index.search(&IndexKey::Int64(k)).unwrap();
            assert_eq!(got, vec![Tid::new((k / 100) as u32, (k % 100) as u16)]);
        }
    }

    #[test]
    fn test_text_keys_sort_lexicographically() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Catalog::open(temp_dir.path()).unwrap();
        catalog
            .create_table("s", &[("name".to_string(), DataType::Varchar)])
            .unwrap();
        let def = catalog
            .create_index("idx_s_name", "s", "name", IndexKind::BTree)
            .unwrap();

        let pool = open_pool(temp_dir.path(), 64);
        let mut index = DiskBTreeIndex::open(pool, def).unwrap();

        for (slot, name) in ["pear", "apple", "quince", "banana"].iter().enumerate() {
            index
                .insert(&IndexKey::Text(name.to_string()), Tid::new(0, slot as u16))
                .unwrap();
        }

        let all = index.range_search(None, true, None, true).unwrap();
        // apple, banana, pear, quince
        assert_eq!(
            all,
            vec![Tid::new(0, 1), Tid::new(0, 3), Tid::new(0, 0), Tid::new(0, 2)]
        );

        let err = index.search(&IndexKey::Int64(1)).unwrap_err();
        assert!(matches!(err, IndexError::KeyTypeMismatch { .. }));
    }
}
