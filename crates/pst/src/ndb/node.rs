//! Resolution of NIDs and BIDs into the bytes they name.
//!
//! [NodeDatabase] walks the node BTree down to an NBTENTRY, then the block BTree down to each
//! BBTENTRY, and reassembles the node's data tree and sub-node tree. Nothing is cached: every
//! lookup re-walks the BTree from its root page.

use std::{borrow::Cow, collections::BTreeMap};
use tracing::trace;

use super::{
    block::*,
    block_id::*,
    block_ref::*,
    header::*,
    node_id::*,
    page::*,
    *,
};
use crate::encode::permute;

/// Read-only view of the NDB layer over the whole file buffer.
#[derive(Clone, Copy, Default, Debug)]
pub struct NodeDatabase<'a> {
    file: &'a [u8],
    crypt_method: NdbCryptMethod,
    node_btree: BlockRef,
    block_btree: BlockRef,
}

impl<'a> NodeDatabase<'a> {
    pub fn new(file: &'a [u8], header: &Header) -> Self {
        Self {
            file,
            crypt_method: header.crypt_method(),
            node_btree: header.root().node_btree(),
            block_btree: header.root().block_btree(),
        }
    }

    pub fn file(&self) -> &'a [u8] {
        self.file
    }

    pub fn crypt_method(&self) -> NdbCryptMethod {
        self.crypt_method
    }

    pub fn node_btree(&self) -> NdbResult<BTreePage<'a>> {
        Self::root_page(self.file, self.node_btree)
    }

    pub fn block_btree(&self) -> NdbResult<BTreePage<'a>> {
        Self::root_page(self.file, self.block_btree)
    }

    fn root_page(file: &'a [u8], root: BlockRef) -> NdbResult<BTreePage<'a>> {
        match Page::read(file, root.index().index())? {
            Page::BTree(page) => Ok(page),
            other => Err(NdbError::ExpectedBTreePage(other.trailer().page_type())),
        }
    }

    pub fn find_node(&self, node: NodeId) -> NdbResult<NodeBTreeEntry<'a>> {
        match self.node_btree()?.find_entry(node.search_key())? {
            Some(BTreeEntry::Node(entry)) => Ok(entry),
            Some(other) => Err(NdbError::ExpectedNodeEntry(other.key())),
            None => Err(NdbError::NodeNotFound(node)),
        }
    }

    pub fn find_block(&self, block: BlockId) -> NdbResult<BlockBTreeEntry<'a>> {
        match self.block_btree()?.find_entry(block.search_key())? {
            Some(BTreeEntry::Block(entry)) => Ok(entry),
            Some(other) => Err(NdbError::ExpectedBlockEntry(other.key())),
            None => Err(NdbError::BlockNotFound(block)),
        }
    }

    /// The `cb` bytes of a single block, decoded when the file is encoded and the block
    /// holds external data.
    pub fn read_block(&self, block: BlockId) -> NdbResult<Cow<'a, [u8]>> {
        let entry = self.find_block(block)?;
        let start = usize::try_from(entry.block().index().index())
            .map_err(|_| NdbError::BlockOutOfBounds(block))?;
        let end = start
            .checked_add(usize::from(entry.size()))
            .ok_or(NdbError::BlockOutOfBounds(block))?;
        let data = self
            .file
            .get(start..end)
            .ok_or(NdbError::BlockOutOfBounds(block))?;

        trace!(block = u64::from(block), start, size = data.len(), "read block");

        if block.is_internal() {
            return Ok(Cow::Borrowed(data));
        }

        match self.crypt_method {
            NdbCryptMethod::None => Ok(Cow::Borrowed(data)),
            NdbCryptMethod::Permute => Ok(permute::decode_copy(data)),
            NdbCryptMethod::Cyclic => Err(NdbError::UnsupportedNdbCryptMethod(self.crypt_method)),
        }
    }

    /// The leaf data blocks of a data tree, in order.
    ///
    /// An XXBLOCK may only point at XBLOCKs, and an XBLOCK only at data blocks.
    pub fn read_data_tree(&self, block: BlockId) -> NdbResult<Vec<Cow<'a, [u8]>>> {
        if !block.is_internal() {
            return Ok(vec![self.read_block(block)?]);
        }

        let data = self.read_block(block)?;
        let tree = DataTreeBlock::read(&data)?;
        let mut blocks = Vec::new();
        for entry in tree.entries() {
            if tree.level() == 1 {
                blocks.push(self.read_block(entry)?);
                continue;
            }

            let child_data = self.read_block(entry)?;
            let child = DataTreeBlock::read(&child_data)?;
            if child.level() != 1 {
                return Err(NdbError::InvalidInternalBlockLevel(child.level()));
            }
            for leaf in child.entries() {
                blocks.push(self.read_block(leaf)?);
            }
        }
        Ok(blocks)
    }

    /// Flatten an SLBLOCK/SIBLOCK tree into its leaf entries. An SIBLOCK may only point at
    /// SLBLOCKs.
    pub fn read_sub_node_tree(&self, block: BlockId) -> NdbResult<BTreeMap<NodeId, SubNodeEntry>> {
        let data = self.read_block(block)?;
        let mut entries = BTreeMap::new();
        match SubNodeTreeBlock::read(&data)? {
            tree @ SubNodeTreeBlock::Leaf(_) => {
                entries.extend(tree.leaf_entries().into_iter().map(|e| (e.node(), e)));
            }
            tree @ SubNodeTreeBlock::Intermediate(_) => {
                for entry in tree.intermediate_entries() {
                    let child_data = self.read_block(entry.block())?;
                    let child @ SubNodeTreeBlock::Leaf(_) = SubNodeTreeBlock::read(&child_data)?
                    else {
                        return Err(NdbError::InvalidInternalBlockLevel(1));
                    };
                    entries.extend(child.leaf_entries().into_iter().map(|e| (e.node(), e)));
                }
            }
        }
        Ok(entries)
    }

    /// Resolve a top-level node through the node BTree.
    pub fn node(&self, node: NodeId) -> NdbResult<Node<'a>> {
        let entry = self.find_node(node)?;
        Node::read(*self, entry.node(), entry.parent(), entry.data(), entry.sub_node())
    }
}

/// The sub-nodes of a node, resolved on demand.
#[derive(Clone, Default, Debug)]
pub struct SubNodeTree<'a> {
    database: NodeDatabase<'a>,
    entries: BTreeMap<NodeId, SubNodeEntry>,
}

impl<'a> SubNodeTree<'a> {
    pub fn read(database: NodeDatabase<'a>, block: Option<BlockId>) -> NdbResult<Self> {
        let entries = match block {
            Some(block) => database.read_sub_node_tree(block)?,
            None => Default::default(),
        };
        Ok(Self { database, entries })
    }

    pub fn database(&self) -> NodeDatabase<'a> {
        self.database
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn node(&self, node: NodeId) -> NdbResult<Node<'a>> {
        let entry = self
            .entries
            .get(&node)
            .ok_or(NdbError::SubNodeNotFound(node))?;
        Node::read(self.database, entry.node(), None, entry.data(), entry.sub_node())
    }
}

/// A resolved node: its data blocks and its sub-node tree.
#[derive(Clone, Debug)]
pub struct Node<'a> {
    id: NodeId,
    parent: Option<NodeId>,
    blocks: Vec<Cow<'a, [u8]>>,
    sub_nodes: SubNodeTree<'a>,
}

impl<'a> Node<'a> {
    fn read(
        database: NodeDatabase<'a>,
        id: NodeId,
        parent: Option<NodeId>,
        data: BlockId,
        sub_node: Option<BlockId>,
    ) -> NdbResult<Self> {
        Ok(Self {
            id,
            parent,
            blocks: database.read_data_tree(data)?,
            sub_nodes: SubNodeTree::read(database, sub_node)?,
        })
    }

    /// A node whose blocks did not come from a file. It has no sub-nodes.
    pub fn from_blocks(id: NodeId, blocks: Vec<Cow<'a, [u8]>>) -> Self {
        Self {
            id,
            parent: None,
            blocks,
            sub_nodes: Default::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn blocks(&self) -> &[Cow<'a, [u8]>] {
        &self.blocks
    }

    pub fn sub_nodes(&self) -> &SubNodeTree<'a> {
        &self.sub_nodes
    }

    pub fn into_parts(self) -> (Vec<Cow<'a, [u8]>>, SubNodeTree<'a>) {
        (self.blocks, self.sub_nodes)
    }

    /// All data blocks as one contiguous value. Borrows when there is a single block.
    pub fn into_data(self) -> Cow<'a, [u8]> {
        join_blocks(self.blocks)
    }
}

pub(crate) fn join_blocks(mut blocks: Vec<Cow<'_, [u8]>>) -> Cow<'_, [u8]> {
    match blocks.len() {
        0 => Cow::Borrowed(&[]),
        1 => blocks.remove(0),
        _ => Cow::Owned(blocks.concat()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn test_resolve_node_data() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let data = builder.add_block(b"hello node");
        builder.add_node(0x21, data, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x21)).unwrap();
        assert_eq!(node.blocks().len(), 1);
        assert!(matches!(node.blocks()[0], Cow::Borrowed(_)));
        assert_eq!(node.into_data().as_ref(), b"hello node");

        let Err(NdbError::NodeNotFound(missing)) = database.node(NodeId::from(0x61)) else {
            panic!("0x61 should not resolve");
        };
        assert_eq!(u32::from(missing), 0x61);
    }

    #[test]
    fn test_permute_encoded_block() {
        let mut builder = PstBuilder::new(NdbCryptMethod::Permute);
        let data = builder.add_block(b"secret");
        builder.add_node(0x21, data, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x21)).unwrap();
        assert!(matches!(node.blocks()[0], Cow::Owned(_)));
        assert_eq!(node.into_data().as_ref(), b"secret");
    }

    #[test]
    fn test_cyclic_is_unsupported() {
        let mut builder = PstBuilder::new(NdbCryptMethod::Cyclic);
        let data = builder.add_block(b"secret");
        builder.add_node(0x21, data, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let Err(NdbError::UnsupportedNdbCryptMethod(NdbCryptMethod::Cyclic)) =
            database.node(NodeId::from(0x21))
        else {
            panic!("cyclic encoding should be reported");
        };
    }

    #[test]
    fn test_data_tree_spans_blocks() {
        let mut builder = PstBuilder::new(NdbCryptMethod::Permute);
        let first = builder.add_block(b"first ");
        let second = builder.add_block(b"second");
        let tree = builder.add_data_tree(&[first, second]);
        builder.add_node(0x21, tree, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x21)).unwrap();
        assert_eq!(node.blocks().len(), 2);
        assert_eq!(node.into_data().as_ref(), b"first second");
    }

    #[test]
    fn test_two_level_data_tree() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let first = builder.add_block(b"first ");
        let second = builder.add_block(b"second ");
        let third = builder.add_block(b"third");
        let left = builder.add_data_tree(&[first, second]);
        let right = builder.add_data_tree(&[third]);
        let tree = builder.add_data_tree_of_trees(&[left, right]);
        builder.add_node(0x21, tree, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x21)).unwrap();
        assert_eq!(node.blocks().len(), 3);
        assert_eq!(node.into_data().as_ref(), b"first second third");
    }

    #[test]
    fn test_data_tree_names_itself() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let tree = builder.add_internal_block(|block| xblock(2, 0, &[u64::from(block)]));
        builder.add_node(0x21, tree, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let Err(NdbError::InvalidInternalBlockLevel(2)) = database.read_data_tree(tree) else {
            panic!("an XXBLOCK child must be an XBLOCK");
        };
        let Err(NdbError::InvalidInternalBlockLevel(2)) = database.node(NodeId::from(0x21)) else {
            panic!("node data must not resolve through a cyclic tree");
        };
    }

    #[test]
    fn test_sub_node_tree_names_itself() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let data = builder.add_block(b"parent");
        let tree = builder.add_internal_block(|block| siblock(&[(0x671, u64::from(block))]));
        builder.add_node(0x2004, data, Some(tree));
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let Err(NdbError::InvalidInternalBlockLevel(1)) = database.read_sub_node_tree(tree) else {
            panic!("an SIBLOCK child must be an SLBLOCK");
        };
        let Err(NdbError::InvalidInternalBlockLevel(1)) = database.node(NodeId::from(0x2004))
        else {
            panic!("sub-nodes must not resolve through a cyclic tree");
        };
    }

    #[test]
    fn test_intermediate_sub_node_tree() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let data = builder.add_block(b"parent");
        let child = builder.add_block(b"child");
        let leaf = builder.add_sub_node_tree(&[(0x671, child, None)]);
        let tree = builder.add_internal_block(|_| siblock(&[(0x671, u64::from(leaf))]));
        builder.add_node(0x2004, data, Some(tree));
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x2004)).unwrap();
        let child = node.sub_nodes().node(NodeId::from(0x671)).unwrap();
        assert_eq!(child.into_data().as_ref(), b"child");
    }

    #[test]
    fn test_block_range_overflow() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let data = builder.add_block_entry(u64::MAX - 8, 64);
        builder.add_node(0x21, data, None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let Err(NdbError::BlockOutOfBounds(block)) = database.read_block(data) else {
            panic!("ib + cb past the address space should be rejected");
        };
        assert_eq!(block, data);
    }

    #[test]
    fn test_sub_node_tree() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        let data = builder.add_block(b"parent");
        let child = builder.add_block(b"child");
        let sub_nodes = builder.add_sub_node_tree(&[(0x671, child, None)]);
        builder.add_node(0x2004, data, Some(sub_nodes));
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let node = database.node(NodeId::from(0x2004)).unwrap();
        assert!(node.sub_nodes().contains(NodeId::from(0x671)));
        let child = node.sub_nodes().node(NodeId::from(0x671)).unwrap();
        assert_eq!(child.into_data().as_ref(), b"child");

        let Err(NdbError::SubNodeNotFound(_)) = node.sub_nodes().node(NodeId::from(0x692)) else {
            panic!("0x692 is not a sub-node");
        };
    }

    #[test]
    fn test_block_not_found() {
        let mut builder = PstBuilder::new(NdbCryptMethod::None);
        builder.add_node(0x21, BlockId::from(0x400), None);
        let file = builder.build();
        let header = Header::read(&file).unwrap();
        let database = NodeDatabase::new(&file, &header);

        let Err(NdbError::BlockNotFound(block)) = database.node(NodeId::from(0x21)) else {
            panic!("bidData 0x400 should not resolve");
        };
        assert_eq!(u64::from(block), 0x400);
    }
}
