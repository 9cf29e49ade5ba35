//! In-memory builders for pages, blocks, heaps and whole PST images.

use std::collections::BTreeMap;

use crate::{
    encode::permute,
    ltp::{heap::*, prop_type::*, table_context::*},
    ndb::{block::block_size, block_id::*, header::*, page::*},
};

const HEAP_HEADER_SIZE: usize = 12;
const TABLE_INFO_SIZE: usize = 22;
const PAGE_ENTRY_REGION: usize = 488;

/// A 512-byte BTPAGE with `entries` packed from offset 0.
pub fn btree_page(
    page_type: u8,
    level: u8,
    entry_size: usize,
    entries: &[Vec<u8>],
) -> [u8; PAGE_SIZE] {
    let mut page = [0_u8; PAGE_SIZE];
    for (i, entry) in entries.iter().enumerate() {
        page[i * entry_size..i * entry_size + entry.len()].copy_from_slice(entry);
    }
    page[488] = entries.len() as u8;
    page[489] = (PAGE_ENTRY_REGION / entry_size) as u8;
    page[490] = entry_size as u8;
    page[491] = level;
    page[496] = page_type;
    page[497] = page_type;
    page
}

/// BTENTRY
pub fn bt_entry(key: u64, block: u64, index: u64) -> Vec<u8> {
    let mut entry = Vec::with_capacity(24);
    entry.extend(key.to_le_bytes());
    entry.extend(block.to_le_bytes());
    entry.extend(index.to_le_bytes());
    entry
}

/// BBTENTRY
pub fn bbt_entry(block: u64, index: u64, size: u16, ref_count: u16) -> Vec<u8> {
    let mut entry = Vec::with_capacity(24);
    entry.extend(block.to_le_bytes());
    entry.extend(index.to_le_bytes());
    entry.extend(size.to_le_bytes());
    entry.extend(ref_count.to_le_bytes());
    entry.extend([0; 4]);
    entry
}

/// NBTENTRY
pub fn nbt_entry(node: u32, data: u64, sub_node: u64, parent: u32) -> Vec<u8> {
    let mut entry = Vec::with_capacity(32);
    entry.extend(u64::from(node).to_le_bytes());
    entry.extend(data.to_le_bytes());
    entry.extend(sub_node.to_le_bytes());
    entry.extend(parent.to_le_bytes());
    entry.extend([0; 4]);
    entry
}

/// A Unicode HEADER with the given root BREFs as `(bid, ib)` pairs.
pub fn header_bytes(
    crypt_method: NdbCryptMethod,
    node_btree: (u64, u64),
    block_btree: (u64, u64),
) -> Vec<u8> {
    let mut header = vec![0_u8; HEADER_SIZE];
    header[0..4].copy_from_slice(b"!BDN");
    header[8..10].copy_from_slice(b"SM");
    header[10..12].copy_from_slice(&(NdbVersion::Unicode as u16).to_le_bytes());
    header[12..14].copy_from_slice(&19_u16.to_le_bytes());

    let root = &mut header[180..252];
    root[36..44].copy_from_slice(&node_btree.0.to_le_bytes());
    root[44..52].copy_from_slice(&node_btree.1.to_le_bytes());
    root[52..60].copy_from_slice(&block_btree.0.to_le_bytes());
    root[60..68].copy_from_slice(&block_btree.1.to_le_bytes());
    root[68] = AmapStatus::Valid2 as u8;

    header[513] = crypt_method as u8;
    header
}

/// XBLOCK (`level` 1) or XXBLOCK (`level` 2).
pub fn xblock(level: u8, total_size: u32, blocks: &[u64]) -> Vec<u8> {
    let mut block = vec![0x01, level];
    block.extend((blocks.len() as u16).to_le_bytes());
    block.extend(total_size.to_le_bytes());
    for bid in blocks {
        block.extend(bid.to_le_bytes());
    }
    block
}

/// SLBLOCK with `(nid, bidData, bidSub)` entries.
pub fn slblock(entries: &[(u32, u64, u64)]) -> Vec<u8> {
    let mut block = vec![0x02, 0];
    block.extend((entries.len() as u16).to_le_bytes());
    block.extend([0; 4]);
    for &(node, data, sub_node) in entries {
        block.extend(u64::from(node).to_le_bytes());
        block.extend(data.to_le_bytes());
        block.extend(sub_node.to_le_bytes());
    }
    block
}

/// SIBLOCK with `(nid, bid)` entries.
pub fn siblock(entries: &[(u32, u64)]) -> Vec<u8> {
    let mut block = vec![0x02, 1];
    block.extend((entries.len() as u16).to_le_bytes());
    block.extend([0; 4]);
    for &(node, bid) in entries {
        block.extend(u64::from(node).to_le_bytes());
        block.extend(bid.to_le_bytes());
    }
    block
}

/// Items back to back after `prefix`, followed by an HNPAGEMAP. The first 2 bytes of
/// `prefix` are patched with `ibHnpm`.
fn heap_with_page_map(mut block: Vec<u8>, items: &[&[u8]]) -> Vec<u8> {
    let mut offsets = Vec::with_capacity(items.len() + 1);
    for item in items {
        offsets.push(block.len() as u16);
        block.extend_from_slice(item);
    }
    offsets.push(block.len() as u16);

    if block.len() % 2 != 0 {
        block.push(0);
    }
    let page_map = block.len() as u16;
    block[..2].copy_from_slice(&page_map.to_le_bytes());

    block.extend((items.len() as u16).to_le_bytes());
    block.extend(0_u16.to_le_bytes());
    for offset in offsets {
        block.extend(offset.to_le_bytes());
    }
    block
}

/// First block of a heap: HNHDR, `items`, HNPAGEMAP.
pub fn heap_block(client_signature: u8, user_root: u32, items: &[&[u8]]) -> Vec<u8> {
    let mut block = vec![0, 0, 0xEC, client_signature];
    block.extend(user_root.to_le_bytes());
    block.extend([0; 4]);
    assert_eq!(block.len(), HEAP_HEADER_SIZE);
    heap_with_page_map(block, items)
}

/// Any later block of a heap: HNPAGEHDR, `items`, HNPAGEMAP.
pub fn heap_page_block(items: &[&[u8]]) -> Vec<u8> {
    heap_with_page_map(vec![0, 0], items)
}

/// HID of allocation `index` in the first heap block.
pub fn heap_id(index: u16) -> HeapId {
    HeapId::new(index + 1, 0).unwrap()
}

/// BTHHEADER
pub fn bth_header(key_size: u8, entry_size: u8, levels: u8, root: u32) -> [u8; 8] {
    let mut header = [0xB5, key_size, entry_size, levels, 0, 0, 0, 0];
    header[4..].copy_from_slice(&root.to_le_bytes());
    header
}

pub fn utf16(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Variable-width multi-value: `ulCount`, `rgulDataOffsets`, then the items.
pub fn multi_value(items: &[&[u8]]) -> Vec<u8> {
    let header_size = 4 * (items.len() + 1);
    let mut value = Vec::new();
    value.extend((items.len() as u32).to_le_bytes());
    let mut offset = header_size;
    for item in items {
        value.extend((offset as u32).to_le_bytes());
        offset += item.len();
    }
    for item in items {
        value.extend_from_slice(item);
    }
    value
}

/// Where a test property's `dwValueHnid` points.
#[derive(Clone, Copy, Debug)]
pub enum TestValue<'t> {
    Inline(u32),
    Heap(&'t [u8]),
    Empty,
    Node(u32),
}

/// A single-block PC heap. Allocation 0 is the BTHHEADER, 1 the records, then any
/// [TestValue::Heap] values in order.
pub fn property_block(properties: &[(u16, PropertyType, TestValue)]) -> Vec<u8> {
    let properties: Vec<_> = properties
        .iter()
        .map(|&(tag, prop_type, value)| (tag, u16::from(prop_type), value))
        .collect();
    property_block_raw(&properties)
}

/// [property_block] with raw `wPropType` values.
pub fn property_block_raw(properties: &[(u16, u16, TestValue)]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut values: Vec<&[u8]> = Vec::new();
    for &(tag, prop_type, value) in properties {
        let hnid = match value {
            TestValue::Inline(value) => value,
            TestValue::Heap(data) => {
                values.push(data);
                u32::from(heap_id(values.len() as u16 + 1))
            }
            TestValue::Empty => 0,
            TestValue::Node(node) => node,
        };
        records.extend(tag.to_le_bytes());
        records.extend(prop_type.to_le_bytes());
        records.extend(hnid.to_le_bytes());
    }

    let root = if records.is_empty() {
        0
    } else {
        u32::from(heap_id(1))
    };
    let header = bth_header(2, 6, 0, root);
    let mut items = vec![header.as_slice(), records.as_slice()];
    items.extend(values);
    heap_block(HeapNodeType::Properties as u8, u32::from(heap_id(0)), &items)
}

/// Byte offset of TCOLDESC `column` in a block built by [TableBuilder].
pub fn table_column_offset(_block: &[u8], column: usize) -> usize {
    HEAP_HEADER_SIZE + TABLE_INFO_SIZE + column * 8
}

/// A single-block TC heap. The row id column is always first.
///
/// Allocation 0 is the TCINFO, 1 the row matrix (empty when the rows are in a sub-node),
/// then anything added with [TableBuilder::add_heap_item].
pub struct TableBuilder {
    columns: Vec<(u16, PropertyType)>,
    rows: Vec<(Option<u32>, Vec<Option<Vec<u8>>>)>,
    heap_items: Vec<Vec<u8>>,
}

impl TableBuilder {
    pub fn new(columns: &[(u16, PropertyType)]) -> Self {
        let mut all_columns = vec![(LTP_ROW_ID_PROP_ID, PropertyType::Integer32)];
        all_columns.extend_from_slice(columns);
        Self {
            columns: all_columns,
            rows: Vec::new(),
            heap_items: Vec::new(),
        }
    }

    /// [TableBuilder::new] with a row id column of another type.
    pub fn with_row_id_type(row_id_type: PropertyType, columns: &[(u16, PropertyType)]) -> Self {
        let mut builder = Self::new(columns);
        builder.columns[0].1 = row_id_type;
        builder
    }

    /// Store a variable-width cell value in the heap and return its HID.
    pub fn add_heap_item(&mut self, data: &[u8]) -> u32 {
        self.heap_items.push(data.to_vec());
        u32::from(heap_id(self.heap_items.len() as u16 + 1))
    }

    /// `cells` follow the columns passed to [TableBuilder::new].
    pub fn add_row(&mut self, row_id: Option<u32>, cells: Vec<Option<Vec<u8>>>) {
        assert_eq!(cells.len() + 1, self.columns.len());
        self.rows.push((row_id, cells));
    }

    fn cell_size(prop_type: PropertyType) -> usize {
        match prop_type.fixed_size() {
            Some(size) if size <= 8 => size,
            _ => 4,
        }
    }

    /// `(ibData, cbData)` of each column and the `rgib` array.
    fn layout(&self) -> (Vec<(u16, u8)>, [u16; 4]) {
        let mut layout = vec![(0, 0); self.columns.len()];
        let mut offset = 0;
        let mut ends = [0; 4];
        for (group, sizes) in [[8, 4], [2, 2], [1, 1]].iter().enumerate() {
            for (i, &(_, prop_type)) in self.columns.iter().enumerate() {
                let size = Self::cell_size(prop_type);
                if sizes.contains(&size) {
                    layout[i] = (offset as u16, size as u8);
                    offset += size;
                }
            }
            ends[group] = offset as u16;
        }
        ends[3] = (offset + existence_bitmap_size(self.columns.len())) as u16;
        (layout, ends)
    }

    /// Returns the heap block and the row matrix. With `rows_node`, `hnidRows` names that
    /// sub-node and the caller stores the matrix there; otherwise the matrix is in the heap
    /// and the second value is empty.
    pub fn build(&self, rows_node: Option<u32>) -> (Vec<u8>, Vec<u8>) {
        let (layout, ends) = self.layout();
        let row_size = usize::from(ends[3]);

        let mut matrix = Vec::new();
        for (row_id, cells) in self.rows.iter() {
            let mut row = vec![0_u8; row_size];
            let values = std::iter::once(row_id.map(|id| id.to_le_bytes().to_vec()))
                .chain(cells.iter().cloned());
            for (bit, (value, &(offset, size))) in values.zip(layout.iter()).enumerate() {
                let Some(value) = value else {
                    continue;
                };
                let offset = usize::from(offset);
                let len = value.len().min(usize::from(size));
                row[offset..offset + len].copy_from_slice(&value[..len]);
                row[usize::from(ends[2]) + bit / 8] |= 1 << (7 - bit % 8);
            }
            matrix.extend(row);
        }

        let rows = match rows_node {
            _ if self.rows.is_empty() => 0,
            Some(node) => node,
            None => u32::from(heap_id(1)),
        };

        let mut info = vec![HeapNodeType::Table as u8, self.columns.len() as u8];
        for end in ends {
            info.extend(end.to_le_bytes());
        }
        info.extend(0_u32.to_le_bytes());
        info.extend(rows.to_le_bytes());
        info.extend(0_u32.to_le_bytes());
        for (bit, (&(prop_id, prop_type), &(offset, size))) in
            self.columns.iter().zip(layout.iter()).enumerate()
        {
            info.extend(u16::from(prop_type).to_le_bytes());
            info.extend(prop_id.to_le_bytes());
            info.extend(offset.to_le_bytes());
            info.push(size);
            info.push(bit as u8);
        }

        let heap_rows: &[u8] = if rows_node.is_some() { &[] } else { &matrix };
        let mut items = vec![info.as_slice(), heap_rows];
        items.extend(self.heap_items.iter().map(Vec::as_slice));
        let block = heap_block(HeapNodeType::Table as u8, u32::from(heap_id(0)), &items);

        let node_rows = if rows_node.is_some() { matrix } else { Vec::new() };
        (block, node_rows)
    }
}

/// Assembles a PST image: data blocks, internal blocks, and single-level or two-level node
/// and block BTrees.
pub struct PstBuilder {
    crypt_method: NdbCryptMethod,
    next_index: u64,
    blocks: Vec<(BlockId, Vec<u8>)>,
    unwritten_blocks: Vec<(BlockId, u64, u16)>,
    nodes: BTreeMap<u32, (BlockId, Option<BlockId>)>,
}

impl PstBuilder {
    pub fn new(crypt_method: NdbCryptMethod) -> Self {
        Self {
            crypt_method,
            next_index: 1,
            blocks: Vec::new(),
            unwritten_blocks: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    fn next_block_id(&mut self, is_internal: bool) -> BlockId {
        let block = BlockId::new(is_internal, self.next_index).unwrap();
        self.next_index += 1;
        block
    }

    /// A data block, encoded the way the file says.
    pub fn add_block(&mut self, data: &[u8]) -> BlockId {
        let block = self.next_block_id(false);
        let mut data = data.to_vec();
        if self.crypt_method == NdbCryptMethod::Permute {
            permute::encode_block(&mut data);
        }
        self.blocks.push((block, data));
        block
    }

    /// An XBLOCK over existing data blocks.
    pub fn add_data_tree(&mut self, blocks: &[BlockId]) -> BlockId {
        let total_size = blocks
            .iter()
            .filter_map(|block| self.blocks.iter().find(|(id, _)| id == block))
            .map(|(_, data)| data.len() as u32)
            .sum();
        let entries: Vec<_> = blocks.iter().copied().map(u64::from).collect();
        let block = self.next_block_id(true);
        self.blocks.push((block, xblock(1, total_size, &entries)));
        block
    }

    /// An XXBLOCK over existing XBLOCKs.
    pub fn add_data_tree_of_trees(&mut self, trees: &[BlockId]) -> BlockId {
        let entries: Vec<_> = trees.iter().copied().map(u64::from).collect();
        let block = self.next_block_id(true);
        self.blocks.push((block, xblock(2, 0, &entries)));
        block
    }

    /// An internal block built from its own BID.
    pub fn add_internal_block(&mut self, data: impl FnOnce(BlockId) -> Vec<u8>) -> BlockId {
        let block = self.next_block_id(true);
        self.blocks.push((block, data(block)));
        block
    }

    /// A BBTENTRY with the given `ib` and `cb` and nothing written at that offset.
    pub fn add_block_entry(&mut self, index: u64, size: u16) -> BlockId {
        let block = self.next_block_id(false);
        self.unwritten_blocks.push((block, index, size));
        block
    }

    /// An SLBLOCK with `(nid, bidData, bidSub)` entries.
    pub fn add_sub_node_tree(&mut self, entries: &[(u32, BlockId, Option<BlockId>)]) -> BlockId {
        let entries: Vec<_> = entries
            .iter()
            .map(|&(node, data, sub_node)| {
                (node, u64::from(data), sub_node.map(u64::from).unwrap_or(0))
            })
            .collect();
        let block = self.next_block_id(true);
        self.blocks.push((block, slblock(&entries)));
        block
    }

    pub fn add_node(&mut self, node: u32, data: BlockId, sub_node: Option<BlockId>) {
        self.nodes.insert(node, (data, sub_node));
    }

    pub fn build(&self) -> Vec<u8> {
        let mut file = vec![0_u8; 1024];

        let mut block_entries = Vec::new();
        for (block, data) in self.blocks.iter() {
            let index = file.len() as u64;
            file.extend_from_slice(data);
            let padded = usize::from(block_size(data.len() as u16)) - data.len();
            file.extend(std::iter::repeat(0).take(padded));
            block_entries.push((
                u64::from(*block),
                bbt_entry(u64::from(*block), index, data.len() as u16, 1),
            ));
        }
        for &(block, index, size) in self.unwritten_blocks.iter() {
            block_entries.push((u64::from(block), bbt_entry(u64::from(block), index, size, 1)));
        }
        block_entries.sort_by_key(|(key, _)| *key);

        let node_entries: Vec<_> = self
            .nodes
            .iter()
            .map(|(&node, &(data, sub_node))| {
                (
                    u64::from(node),
                    nbt_entry(
                        node,
                        u64::from(data),
                        sub_node.map(u64::from).unwrap_or(0),
                        0,
                    ),
                )
            })
            .collect();

        let node_btree = Self::write_btree(
            &mut file,
            PageType::NodeBTree as u8,
            32,
            &node_entries,
        );
        let block_btree = Self::write_btree(
            &mut file,
            PageType::BlockBTree as u8,
            24,
            &block_entries,
        );

        let header = header_bytes(self.crypt_method, (0, node_btree), (0, block_btree));
        file[..header.len()].copy_from_slice(&header);
        file
    }

    /// Write leaf pages, plus a branch page over them when one leaf is not enough, and
    /// return the offset of the root page.
    fn write_btree(
        file: &mut Vec<u8>,
        page_type: u8,
        entry_size: usize,
        entries: &[(u64, Vec<u8>)],
    ) -> u64 {
        fn align(file: &mut Vec<u8>) -> u64 {
            let padded = file.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
            file.resize(padded, 0);
            file.len() as u64
        }

        let per_page = PAGE_ENTRY_REGION / entry_size;
        let chunks: Vec<_> = entries.chunks(per_page.max(1)).collect();
        if chunks.len() <= 1 {
            let leaf: Vec<_> = entries.iter().map(|(_, entry)| entry.clone()).collect();
            let offset = align(file);
            file.extend(btree_page(page_type, 0, entry_size, &leaf));
            return offset;
        }

        let mut branch = Vec::new();
        for chunk in chunks {
            let leaf: Vec<_> = chunk.iter().map(|(_, entry)| entry.clone()).collect();
            let offset = align(file);
            file.extend(btree_page(page_type, 0, entry_size, &leaf));
            branch.push(bt_entry(chunk[0].0, 0, offset));
        }
        let offset = align(file);
        file.extend(btree_page(page_type, 1, BTreePageEntry::SIZE, &branch));
        offset
    }
}

/// NID of the message written by [MessageBuilder].
pub const TEST_MESSAGE: u32 = 0x2004;

/// A message node with recipient and attachment table sub-nodes.
#[derive(Default)]
pub struct MessageBuilder {
    /// The message PC heap, see [property_block].
    pub properties: Vec<u8>,
    /// `(PidTagRecipientType, PidTagDisplayName, PidTagEmailAddress)`
    pub recipients: Vec<(i32, Option<&'static str>, Option<&'static str>)>,
    /// `(row id, PC heap)` per attachment row. The PC, when given, is stored as the sub-node
    /// named by the row id. `None` leaves out the attachment table.
    pub attachments: Option<Vec<(Option<u32>, Option<Vec<u8>>)>>,
}

impl MessageBuilder {
    pub fn new(properties: Vec<u8>) -> Self {
        Self {
            properties,
            ..Default::default()
        }
    }

    fn recipient_table(&self) -> Vec<u8> {
        let mut table = TableBuilder::new(&[
            (0x0C15, PropertyType::Integer32),
            (0x3001, PropertyType::Unicode),
            (0x3003, PropertyType::Unicode),
        ]);
        for (i, &(recipient_type, name, address)) in self.recipients.iter().enumerate() {
            let mut text = |value: Option<&str>| {
                value.map(|value| table.add_heap_item(&utf16(value)).to_le_bytes().to_vec())
            };
            let name = text(name);
            let address = text(address);
            table.add_row(
                Some(0x21 + 0x20 * i as u32),
                vec![Some(recipient_type.to_le_bytes().to_vec()), name, address],
            );
        }
        table.build(None).0
    }

    pub fn build(&self) -> Vec<u8> {
        let mut builder = PstBuilder::new(NdbCryptMethod::Permute);
        let data = builder.add_block(&self.properties);

        let recipients = builder.add_block(&self.recipient_table());
        let mut sub_nodes = vec![(0x692, recipients, None)];

        if let Some(attachments) = self.attachments.as_ref() {
            let mut table = TableBuilder::new(&[(0x3705, PropertyType::Integer32)]);
            for (row_id, properties) in attachments {
                table.add_row(*row_id, vec![Some(1_i32.to_le_bytes().to_vec())]);
                if let (Some(row_id), Some(properties)) = (row_id, properties) {
                    let block = builder.add_block(properties);
                    sub_nodes.push((*row_id, block, None));
                }
            }
            let table = builder.add_block(&table.build(None).0);
            sub_nodes.push((0x671, table, None));
        }

        let sub_nodes = builder.add_sub_node_tree(&sub_nodes);
        builder.add_node(TEST_MESSAGE, data, Some(sub_nodes));
        builder.build()
    }
}
