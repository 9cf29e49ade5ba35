//! [BREF](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/844a5ebf-488a-45fd-8fce-92a84d8e24a3)
//! and [IB (Byte Index)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/7d53d413-b492-4483-b624-4e2fa2a08cf3)

use byteorder::{ByteOrder, LittleEndian};

use super::block_id::*;

/// Absolute file offset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ByteIndex(u64);

impl ByteIndex {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u64 {
        self.0
    }
}

impl From<ByteIndex> for u64 {
    fn from(value: ByteIndex) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct BlockRef {
    block: BlockId,
    index: ByteIndex,
}

impl BlockRef {
    /// Size of a Unicode BREF on disk.
    pub const SIZE: usize = 16;

    pub fn new(block: BlockId, index: ByteIndex) -> Self {
        Self { block, index }
    }

    /// Decode the 16-byte BREF at the start of `buffer`.
    pub fn read(buffer: &[u8]) -> Self {
        Self {
            block: BlockId::read(&buffer[..8]),
            index: ByteIndex(LittleEndian::read_u64(&buffer[8..16])),
        }
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn index(&self) -> ByteIndex {
        self.index
    }
}
