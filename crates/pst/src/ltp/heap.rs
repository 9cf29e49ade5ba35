//! ## [HN (Heap-on-Node)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/77ce49a3-3772-4d8d-bb2c-2f7520a238a6)

use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;

use super::*;
use crate::ndb::node_id::*;

pub const HEAP_INDEX_MASK: u32 = (1_u16.rotate_right(5) - 1) as u32;

/// `bSig` of every HNHDR.
const HEAP_SIGNATURE: u8 = 0xEC;

/// [HID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85b9e985-ea53-447f-b70c-eb82bfbdcbc9)
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct HeapId(NodeId);

impl HeapId {
    pub fn new(index: u16, block_index: u16) -> LtpResult<Self> {
        let shifted_index = index.rotate_left(11);
        if shifted_index & 0x1F != 0 {
            return Err(LtpError::InvalidHeapIndex(index));
        };

        let node_index = (u32::from(block_index) << 11) | u32::from(index);

        Ok(Self(NodeId::new(NodeIdType::HeapNode, node_index)?))
    }

    /// Zero-based allocation index within the block.
    pub fn index(&self) -> LtpResult<u16> {
        let id_type = self.0.id_type()?;
        if id_type != NodeIdType::HeapNode {
            return Err(LtpError::InvalidHeapNodeType(id_type));
        }

        let index = (self.0.index() & HEAP_INDEX_MASK) as u16;
        if index < 1 {
            return Err(LtpError::InvalidHeapIndex(index));
        }
        Ok(index - 1)
    }

    pub fn block_index(&self) -> u16 {
        (self.0.index() >> 11) as u16
    }

    pub fn is_empty(&self) -> bool {
        u32::from(self.0) == 0
    }
}

impl From<u32> for HeapId {
    fn from(value: u32) -> Self {
        Self(NodeId::from(value))
    }
}

impl From<HeapId> for u32 {
    fn from(value: HeapId) -> Self {
        u32::from(value.0)
    }
}

/// `bClientSig`
///
/// ### See also
/// [HeapNodeHeader]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeapNodeType {
    /// `bTypeReserved1`: Reserved
    Reserved1 = 0x6C,
    /// `bTypeTC`: Table Context (TC/HN)
    Table = 0x7C,
    /// `bTypeReserved2`: Reserved
    Reserved2 = 0x8C,
    /// `bTypeReserved3`: Reserved
    Reserved3 = 0x9C,
    /// `bTypeReserved4`: Reserved
    Reserved4 = 0xA5,
    /// `bTypeReserved5`: Reserved
    Reserved5 = 0xAC,
    /// `bTypeBTH`: BTree-on-Heap (BTH)
    Tree = 0xB5,
    /// `bTypePC`: Property Context (PC/BTH)
    Properties = 0xBC,
    /// `bTypeReserved6`: Reserved
    Reserved6 = 0xCC,
}

impl TryFrom<u8> for HeapNodeType {
    type Error = LtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x6C => Ok(Self::Reserved1),
            0x7C => Ok(Self::Table),
            0x8C => Ok(Self::Reserved2),
            0x9C => Ok(Self::Reserved3),
            0xA5 => Ok(Self::Reserved4),
            0xAC => Ok(Self::Reserved5),
            0xB5 => Ok(Self::Tree),
            0xBC => Ok(Self::Properties),
            0xCC => Ok(Self::Reserved6),
            _ => Err(LtpError::InvalidHeapClientSignature(value)),
        }
    }
}

/// [HNHDR](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
#[derive(Clone, Copy, Debug)]
pub struct HeapNodeHeader {
    page_map_offset: u16,
    client_signature: HeapNodeType,
    user_root: HeapId,
    fill_levels: u32,
}

impl HeapNodeHeader {
    const SIZE: usize = 12;

    pub fn read(block: &[u8]) -> LtpResult<Self> {
        if block.len() < Self::SIZE {
            return Err(LtpError::HeapBlockTooSmall(block.len()));
        }

        let signature = block[2];
        if signature != HEAP_SIGNATURE {
            return Err(LtpError::InvalidHeapSignature(signature));
        }

        Ok(Self {
            page_map_offset: LittleEndian::read_u16(&block[..2]),
            client_signature: HeapNodeType::try_from(block[3])?,
            user_root: HeapId::from(LittleEndian::read_u32(&block[4..8])),
            fill_levels: LittleEndian::read_u32(&block[8..12]),
        })
    }

    // ibHnpm
    pub fn page_map_offset(&self) -> u16 {
        self.page_map_offset
    }

    pub fn client_signature(&self) -> HeapNodeType {
        self.client_signature
    }

    // hidUserRoot
    pub fn user_root(&self) -> HeapId {
        self.user_root
    }

    /// Packed `rgbFillLevel` nibbles for the first 8 blocks.
    pub fn fill_levels(&self) -> u32 {
        self.fill_levels
    }
}

/// A heap spread across the data blocks of one node.
#[derive(Clone, Debug)]
pub struct HeapNode<'a> {
    blocks: Vec<Cow<'a, [u8]>>,
    header: HeapNodeHeader,
}

impl<'a> HeapNode<'a> {
    pub fn read(blocks: Vec<Cow<'a, [u8]>>) -> LtpResult<Self> {
        let first = blocks.first().ok_or(LtpError::EmptyHeapNode)?;
        let header = HeapNodeHeader::read(first)?;
        Ok(Self { blocks, header })
    }

    pub fn header(&self) -> &HeapNodeHeader {
        &self.header
    }

    pub fn blocks(&self) -> &[Cow<'a, [u8]>] {
        &self.blocks
    }

    /// Require a specific `bClientSig`.
    pub fn expect_client_signature(&self, expected: HeapNodeType) -> LtpResult<()> {
        let found = self.header.client_signature();
        if found != expected {
            return Err(LtpError::UnexpectedHeapClientSignature { expected, found });
        }
        Ok(())
    }

    /// Borrow the allocation named by `heap_id`.
    pub fn find_entry(&self, heap_id: HeapId) -> LtpResult<&[u8]> {
        let block_index = heap_id.block_index();
        let block = self
            .blocks
            .get(usize::from(block_index))
            .ok_or(LtpError::HeapBlockIndexNotFound(block_index))?;
        if block.len() < 2 {
            return Err(LtpError::HeapBlockTooSmall(block.len()));
        }

        // HNHDR, HNPAGEHDR and HNBITMAPHDR all start with ibHnpm.
        let page_map_offset = LittleEndian::read_u16(&block[..2]);
        let page_map = block
            .get(usize::from(page_map_offset)..)
            .filter(|page_map| page_map.len() >= 4)
            .ok_or(LtpError::InvalidHeapPageMapOffset(page_map_offset))?;

        // cAlloc, then cFree
        let alloc_count = LittleEndian::read_u16(&page_map[..2]);

        let index = heap_id.index()?;
        if index >= alloc_count {
            return Err(LtpError::HeapAllocIndexNotFound(index));
        }

        // rgibAlloc
        let offsets = &page_map[4..];
        let offset_at = |i: usize| {
            offsets
                .get(i * 2..i * 2 + 2)
                .map(LittleEndian::read_u16)
                .ok_or(LtpError::InvalidHeapPageMapOffset(page_map_offset))
        };
        let start = offset_at(usize::from(index))?;
        let end = offset_at(usize::from(index) + 1)?;
        if start > end {
            return Err(LtpError::InvalidHeapPageAllocOffset(start));
        }

        block
            .get(usize::from(start)..usize::from(end))
            .ok_or(LtpError::InvalidHeapPageAllocOffset(end))
    }
}
