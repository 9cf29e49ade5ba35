//! [NID (Node ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/18d7644e-cb33-4e11-95c0-34d8a84fbff6)

use byteorder::{ByteOrder, LittleEndian};
use std::fmt::{self, Debug};

use super::*;

/// `nidType`
///
/// ### See also
/// [NodeId]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeIdType {
    /// `NID_TYPE_HID`: allocations inside a heap, see [HeapId](crate::ltp::heap::HeapId)
    HeapNode = 0x00,
    /// `NID_TYPE_INTERNAL`
    Internal = 0x01,
    /// `NID_TYPE_NORMAL_FOLDER`
    NormalFolder = 0x02,
    /// `NID_TYPE_SEARCH_FOLDER`
    SearchFolder = 0x03,
    /// `NID_TYPE_NORMAL_MESSAGE`
    NormalMessage = 0x04,
    /// `NID_TYPE_ATTACHMENT`
    Attachment = 0x05,
    /// `NID_TYPE_SEARCH_UPDATE_QUEUE`
    SearchUpdateQueue = 0x06,
    /// `NID_TYPE_SEARCH_CRITERIA_OBJECT`
    SearchCriteria = 0x07,
    /// `NID_TYPE_ASSOC_MESSAGE`
    AssociatedMessage = 0x08,
    /// `NID_TYPE_CONTENTS_TABLE_INDEX`
    ContentsTableIndex = 0x0A,
    /// `NID_TYPE_RECEIVE_FOLDER_TABLE`
    ReceiveFolderTable = 0x0B,
    /// `NID_TYPE_OUTGOING_QUEUE_TABLE`
    OutgoingQueueTable = 0x0C,
    /// `NID_TYPE_HIERARCHY_TABLE`
    HierarchyTable = 0x0D,
    /// `NID_TYPE_CONTENTS_TABLE`
    ContentsTable = 0x0E,
    /// `NID_TYPE_ASSOC_CONTENTS_TABLE`
    AssociatedContentsTable = 0x0F,
    /// `NID_TYPE_SEARCH_CONTENTS_TABLE`
    SearchContentsTable = 0x10,
    /// `NID_TYPE_ATTACHMENT_TABLE`
    AttachmentTable = 0x11,
    /// `NID_TYPE_RECIPIENT_TABLE`
    RecipientTable = 0x12,
    /// `NID_TYPE_SEARCH_TABLE_INDEX`
    SearchTableIndex = 0x13,
    /// `NID_TYPE_LTP`
    ListsTablesProperties = 0x1F,
}

impl TryFrom<u8> for NodeIdType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(NodeIdType::HeapNode),
            0x01 => Ok(NodeIdType::Internal),
            0x02 => Ok(NodeIdType::NormalFolder),
            0x03 => Ok(NodeIdType::SearchFolder),
            0x04 => Ok(NodeIdType::NormalMessage),
            0x05 => Ok(NodeIdType::Attachment),
            0x06 => Ok(NodeIdType::SearchUpdateQueue),
            0x07 => Ok(NodeIdType::SearchCriteria),
            0x08 => Ok(NodeIdType::AssociatedMessage),
            0x0A => Ok(NodeIdType::ContentsTableIndex),
            0x0B => Ok(NodeIdType::ReceiveFolderTable),
            0x0C => Ok(NodeIdType::OutgoingQueueTable),
            0x0D => Ok(NodeIdType::HierarchyTable),
            0x0E => Ok(NodeIdType::ContentsTable),
            0x0F => Ok(NodeIdType::AssociatedContentsTable),
            0x10 => Ok(NodeIdType::SearchContentsTable),
            0x11 => Ok(NodeIdType::AttachmentTable),
            0x12 => Ok(NodeIdType::RecipientTable),
            0x13 => Ok(NodeIdType::SearchTableIndex),
            0x1F => Ok(NodeIdType::ListsTablesProperties),
            _ => Err(NdbError::InvalidNodeIdType(value)),
        }
    }
}

pub const MAX_NODE_INDEX: u32 = 1_u32.rotate_right(5) - 1;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id_type: NodeIdType, index: u32) -> NdbResult<Self> {
        if index > MAX_NODE_INDEX {
            return Err(NdbError::InvalidNodeIndex(index));
        }

        Ok(Self((index << 5) | u32::from(id_type as u8)))
    }

    /// Decode the little-endian NID at the start of `buffer`.
    pub fn read(buffer: &[u8]) -> Self {
        Self(LittleEndian::read_u32(buffer))
    }

    pub fn id_type(&self) -> NdbResult<NodeIdType> {
        NodeIdType::try_from((self.0 & 0x1F) as u8)
    }

    pub fn index(&self) -> u32 {
        self.0 >> 5
    }

    /// The key this node is stored under in the node BTree.
    pub fn search_key(&self) -> u64 {
        u64::from(self.0)
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(id_type) = self.id_type() else {
            return write!(f, "NodeId {{ invalid: 0x{:08X} }}", self.0);
        };

        write!(f, "NodeId {{ {:?}: 0x{:X} }}", id_type, self.index())
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u32 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// [`NID_MESSAGE_STORE`](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/0510ece4-6853-4bef-8cc8-8df3468e3ff1):
/// Message store node.
pub const NID_MESSAGE_STORE: NodeId = NodeId(0x21);

/// [`NID_ROOT_FOLDER`](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/0510ece4-6853-4bef-8cc8-8df3468e3ff1):
/// Root Mailbox Folder object of PST.
pub const NID_ROOT_FOLDER: NodeId = NodeId(0x122);

/// Attachment table sub-node of every Message object.
pub const NID_ATTACHMENT_TABLE: NodeId = NodeId(0x671);

/// Recipient table sub-node of every Message object.
pub const NID_RECIPIENT_TABLE: NodeId = NodeId(0x692);
