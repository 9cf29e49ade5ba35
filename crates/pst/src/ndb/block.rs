//! [Blocks](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a9c1981d-d1ea-457c-b39e-dc7fb0eb95d4)

use byteorder::{ByteOrder, LittleEndian};

use super::{block_id::*, node_id::*, *};

pub const MAX_BLOCK_SIZE: u16 = 8192;

/// Size of a Unicode BLOCKTRAILER.
pub const BLOCK_TRAILER_SIZE: u16 = 16;

/// Bytes a block of `size` data bytes occupies on disk, trailer included.
pub const fn block_size(size: u16) -> u16 {
    let size = size.saturating_add(BLOCK_TRAILER_SIZE);
    if size >= MAX_BLOCK_SIZE {
        MAX_BLOCK_SIZE
    } else {
        let tail = size % 64;
        if tail == 0 {
            size
        } else {
            size - tail + 64
        }
    }
}

const BLOCK_TYPE_DATA_TREE: u8 = 0x01;
const BLOCK_TYPE_SUB_NODE_TREE: u8 = 0x02;

/// [XBLOCK](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5b7a6935-e83d-4917-9f62-6ce3707f09e0)
/// or [XXBLOCK](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/061b6ac4-d1da-468c-b75d-0303a0a8f468)
#[derive(Clone, Copy, Debug)]
pub struct DataTreeBlock<'a> {
    level: u8,
    total_size: u32,
    entries: &'a [u8],
}

impl<'a> DataTreeBlock<'a> {
    pub fn read(block: &'a [u8]) -> NdbResult<Self> {
        let (block_type, level, count) = read_internal_header(block)?;
        if block_type != BLOCK_TYPE_DATA_TREE {
            return Err(NdbError::InvalidInternalBlockType(block_type));
        }
        if !(1..=2).contains(&level) {
            return Err(NdbError::InvalidInternalBlockLevel(level));
        }

        let total_size = LittleEndian::read_u32(&block[4..8]);
        let entries = internal_entries(block, count, 8)?;

        Ok(Self {
            level,
            total_size,
            entries,
        })
    }

    /// 1 for an XBLOCK, 2 for an XXBLOCK.
    pub fn level(&self) -> u8 {
        self.level
    }

    // lcbTotal
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    // rgbid
    pub fn entries(&self) -> impl Iterator<Item = BlockId> + 'a {
        self.entries.chunks_exact(8).map(BlockId::read)
    }
}

/// [SLENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85c4d943-0779-43c5-bd98-61dc9bb5dfd6)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SubNodeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
}

impl SubNodeEntry {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> Option<BlockId> {
        self.sub_node
    }
}

/// [SIENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/9e79c673-d2c4-477a-a1f3-6d70e7462c1d)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IntermediateSubNodeEntry {
    node: NodeId,
    block: BlockId,
}

impl IntermediateSubNodeEntry {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn block(&self) -> BlockId {
        self.block
    }
}

/// [SLBLOCK](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5182eb24-4b0b-4816-aa35-14e1a1a8b0c7)
/// or [SIBLOCK](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/729fb9bd-060a-4d6e-9b5f-5a9ae1e8a1b7)
#[derive(Clone, Copy, Debug)]
pub enum SubNodeTreeBlock<'a> {
    Leaf(&'a [u8]),
    Intermediate(&'a [u8]),
}

impl<'a> SubNodeTreeBlock<'a> {
    const LEAF_ENTRY_SIZE: usize = 24;
    const INTERMEDIATE_ENTRY_SIZE: usize = 16;

    pub fn read(block: &'a [u8]) -> NdbResult<Self> {
        let (block_type, level, count) = read_internal_header(block)?;
        if block_type != BLOCK_TYPE_SUB_NODE_TREE {
            return Err(NdbError::InvalidInternalBlockType(block_type));
        }

        // dwPadding follows cEnt
        match level {
            0 => Ok(Self::Leaf(internal_entries_sized(
                block,
                count,
                8,
                Self::LEAF_ENTRY_SIZE,
            )?)),
            1 => Ok(Self::Intermediate(internal_entries_sized(
                block,
                count,
                8,
                Self::INTERMEDIATE_ENTRY_SIZE,
            )?)),
            _ => Err(NdbError::InvalidInternalBlockLevel(level)),
        }
    }

    pub fn leaf_entries(&self) -> Vec<SubNodeEntry> {
        let Self::Leaf(entries) = self else {
            return Vec::new();
        };

        entries
            .chunks_exact(Self::LEAF_ENTRY_SIZE)
            .map(|entry| {
                let sub_node = BlockId::read(&entry[16..24]);
                SubNodeEntry {
                    node: NodeId::read(&entry[..4]),
                    data: BlockId::read(&entry[8..16]),
                    sub_node: (u64::from(sub_node) != 0).then_some(sub_node),
                }
            })
            .collect()
    }

    pub fn intermediate_entries(&self) -> Vec<IntermediateSubNodeEntry> {
        let Self::Intermediate(entries) = self else {
            return Vec::new();
        };

        entries
            .chunks_exact(Self::INTERMEDIATE_ENTRY_SIZE)
            .map(|entry| IntermediateSubNodeEntry {
                node: NodeId::read(&entry[..4]),
                block: BlockId::read(&entry[8..16]),
            })
            .collect()
    }
}

/// `btype`, `cLevel` and `cEnt` shared by every internal block.
fn read_internal_header(block: &[u8]) -> NdbResult<(u8, u8, u16)> {
    if block.len() < 8 {
        return Err(NdbError::InvalidInternalBlockEntryCount(0));
    }
    Ok((block[0], block[1], LittleEndian::read_u16(&block[2..4])))
}

fn internal_entries(block: &[u8], count: u16, offset: usize) -> NdbResult<&[u8]> {
    internal_entries_sized(block, count, offset, 8)
}

fn internal_entries_sized(
    block: &[u8],
    count: u16,
    offset: usize,
    entry_size: usize,
) -> NdbResult<&[u8]> {
    let end = offset + usize::from(count) * entry_size;
    block
        .get(offset..end)
        .ok_or(NdbError::InvalidInternalBlockEntryCount(count))
}
