//! ## [Lists, Tables, and Properties (LTP) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4c24c7d2-5c5a-4b99-88b2-f4b84cc293ae)

use std::io;
use thiserror::Error;

pub mod heap;
pub mod prop_context;
pub mod prop_type;
pub mod table_context;
pub mod tags;
pub mod tree;

use heap::HeapNodeType;
use prop_type::PropertyType;

#[derive(Error, Debug)]
pub enum LtpError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] crate::ndb::NdbError),
    #[error("Invalid HID hidIndex: 0x{0:04X}")]
    InvalidHeapIndex(u16),
    #[error("Invalid HID hidType: {0:?}")]
    InvalidHeapNodeType(crate::ndb::node_id::NodeIdType),
    #[error("Heap-on-node has no data blocks")]
    EmptyHeapNode,
    #[error("Heap-on-node block is too small: {0} bytes")]
    HeapBlockTooSmall(usize),
    #[error("Invalid HNHDR bSig: 0x{0:02X}")]
    InvalidHeapSignature(u8),
    #[error("Invalid HNHDR bClientSig: 0x{0:02X}")]
    InvalidHeapClientSignature(u8),
    #[error("Unexpected HNHDR bClientSig: expected {expected:?}, found {found:?}")]
    UnexpectedHeapClientSignature {
        expected: HeapNodeType,
        found: HeapNodeType,
    },
    #[error("HID block index not found: 0x{0:04X}")]
    HeapBlockIndexNotFound(u16),
    #[error("HID allocation index not found: 0x{0:04X}")]
    HeapAllocIndexNotFound(u16),
    #[error("Invalid HNPAGEMAP offset: 0x{0:04X}")]
    InvalidHeapPageMapOffset(u16),
    #[error("Invalid HNPAGEMAP rgibAlloc entry: 0x{0:04X}")]
    InvalidHeapPageAllocOffset(u16),
    #[error("Invalid BTHHEADER bType: 0x{0:02X}")]
    InvalidHeapTreeSignature(u8),
    #[error("Invalid BTHHEADER cbKey: {0}")]
    InvalidHeapTreeKeySize(u8),
    #[error("Invalid BTHHEADER cbEnt: {0}")]
    InvalidHeapTreeEntrySize(u8),
    #[error("BTH allocation of {size} bytes is not a whole number of {record}-byte records")]
    InvalidHeapTreeRecordSize { size: usize, record: usize },
    #[error("Invalid property type: 0x{0:04X}")]
    InvalidPropertyType(u16),
    #[error("Value of {prop_type:?} is too short: {size} bytes")]
    PropertyValueTooShort {
        prop_type: PropertyType,
        size: usize,
    },
    #[error("Invalid multi-value property count: {0}")]
    InvalidMultiValuePropertyCount(usize),
    #[error("Invalid multi-value property offset: 0x{0:X}")]
    InvalidMultiValuePropertyOffset(usize),
    #[error("Invalid TCINFO bType: 0x{0:02X}")]
    InvalidTableSignature(u8),
    #[error("TCINFO is too small: {0} bytes")]
    TableInfoTooSmall(usize),
    #[error("Invalid TCINFO row size: {0}")]
    InvalidTableRowSize(u16),
    #[error("TCOLDESC 0x{0:04X} does not fit in a row")]
    InvalidTableColumn(u16),
    #[error("Row index out of range: {index} (row count {count})")]
    RowIndexOutOfRange { index: usize, count: usize },
}

impl From<LtpError> for io::Error {
    fn from(err: LtpError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type LtpResult<T> = Result<T, LtpError>;
