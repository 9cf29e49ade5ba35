//! [BID (Block ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/d3155aa1-ccdd-4dee-a0a9-5363ccca5352)

use byteorder::{ByteOrder, LittleEndian};

use super::*;

pub const MAX_BLOCK_INDEX: u64 = 1_u64.rotate_right(2) - 1;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(u64);

impl BlockId {
    pub fn new(is_internal: bool, index: u64) -> NdbResult<Self> {
        if index > MAX_BLOCK_INDEX {
            return Err(NdbError::InvalidBlockIndex(index));
        }

        let is_internal = if is_internal { 0x2 } else { 0x0 };
        Ok(Self((index << 2) | is_internal))
    }

    /// Decode the little-endian BID at the start of `buffer`.
    pub fn read(buffer: &[u8]) -> Self {
        Self(LittleEndian::read_u64(buffer))
    }

    /// Internal blocks hold XBLOCK/XXBLOCK/SLBLOCK/SIBLOCK data and are never encoded.
    pub fn is_internal(&self) -> bool {
        self.0 & 0x2 == 0x2
    }

    pub fn index(&self) -> u64 {
        self.0 >> 2
    }

    /// The key this block is stored under in the block BTree.
    pub fn search_key(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BlockId> for u64 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_index_overflow() {
        let Err(NdbError::InvalidBlockIndex(value)) = BlockId::new(false, MAX_BLOCK_INDEX + 1)
        else {
            panic!("BlockId should be out of range");
        };
        assert_eq!(value, MAX_BLOCK_INDEX + 1);
    }

    #[test]
    fn test_bid_internal_flag() {
        let internal = BlockId::new(true, 3).unwrap();
        assert_eq!(u64::from(internal), 0x0E);
        assert!(internal.is_internal());
        assert_eq!(internal.index(), 3);

        let external = BlockId::from(0x0C);
        assert!(!external.is_internal());
        assert_eq!(external.index(), 3);
    }
}
