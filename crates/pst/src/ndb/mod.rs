//! ## [Node Database (NDB) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e4efaad0-1876-446e-9d34-bb921588f924)

use std::io;
use thiserror::Error;

pub mod block;
pub mod block_id;
pub mod block_ref;
pub mod header;
pub mod node;
pub mod node_id;
pub mod page;

use block_id::BlockId;
use header::NdbCryptMethod;
use node_id::NodeId;

#[derive(Error, Debug)]
pub enum NdbError {
    #[error("Invalid nidType: 0x{0:02X}")]
    InvalidNodeIdType(u8),
    #[error("Invalid nidIndex: 0x{0:08X}")]
    InvalidNodeIndex(u32),
    #[error("Invalid bidIndex: 0x{0:016X}")]
    InvalidBlockIndex(u64),
    #[error("File is too small for a HEADER: {0} bytes")]
    HeaderTooSmall(usize),
    #[error("Invalid HEADER dwMagic: 0x{0:08X}")]
    InvalidNdbHeaderMagicValue(u32),
    #[error("Invalid HEADER wMagicClient: 0x{0:04X}")]
    InvalidNdbHeaderMagicClientValue(u16),
    #[error("ANSI PST version: 0x{0:04X}")]
    AnsiPstVersion(u16),
    #[error("Invalid HEADER wVer: 0x{0:04X}")]
    InvalidNdbVersion(u16),
    #[error("Invalid HEADER bCryptMethod: 0x{0:02X}")]
    InvalidNdbCryptMethod(u8),
    #[error("Unsupported HEADER bCryptMethod: {0:?}")]
    UnsupportedNdbCryptMethod(NdbCryptMethod),
    #[error("Invalid ROOT fAMapValid: 0x{0:02X}")]
    InvalidAmapStatus(u8),
    #[error("Page window is {0} bytes, expected 512")]
    InvalidPageSize(usize),
    #[error("Page at ib 0x{0:016X} extends past the end of the file")]
    PageOutOfBounds(u64),
    #[error("Invalid PAGETRAILER ptype for a BTPAGE leaf: 0x{0:02X}")]
    InvalidBTreeLeafPageType(u8),
    #[error("Expected a BTPAGE, found PAGETRAILER ptype: 0x{0:02X}")]
    ExpectedBTreePage(u8),
    #[error("Expected a BTENTRY on a BTPAGE with cLevel {0}")]
    ExpectedBranchEntry(u8),
    #[error("Invalid child BTPAGE cLevel: expected {expected}, found {found}")]
    InvalidBTreeChildLevel { expected: u8, found: u8 },
    #[error("Invalid BTPAGE cEnt: {0}")]
    InvalidBTreeEntryCount(u8),
    #[error("Invalid BTPAGE cbEnt: {0}")]
    InvalidBTreeEntrySize(u8),
    #[error("BTPAGE entry index out of range: {index} (cEnt {count})")]
    BTreeEntryIndexOutOfRange { index: usize, count: usize },
    #[error("Expected an NBTENTRY, found key: 0x{0:016X}")]
    ExpectedNodeEntry(u64),
    #[error("Expected a BBTENTRY, found key: 0x{0:016X}")]
    ExpectedBlockEntry(u64),
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Block not found: {0:?}")]
    BlockNotFound(BlockId),
    #[error("Sub-node not found: {0:?}")]
    SubNodeNotFound(NodeId),
    #[error("Block extends past the end of the file: {0:?}")]
    BlockOutOfBounds(BlockId),
    #[error("Invalid internal block btype: 0x{0:02X}")]
    InvalidInternalBlockType(u8),
    #[error("Invalid internal block cLevel: 0x{0:02X}")]
    InvalidInternalBlockLevel(u8),
    #[error("Invalid internal block cEnt: {0}")]
    InvalidInternalBlockEntryCount(u16),
}

impl From<NdbError> for io::Error {
    fn from(err: NdbError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type NdbResult<T> = Result<T, NdbError>;
