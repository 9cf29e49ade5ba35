#![doc = include_str!("../README.md")]

use std::{fs, io, path::Path};
use thiserror::Error;

pub mod encode;
pub mod ltp;
pub mod messaging;
pub mod ndb;

#[cfg(test)]
mod testing;

use ltp::{prop_context::PropertyContext, table_context::TableContext, LtpError, LtpResult};
use messaging::{message::Message, MessagingError, MessagingResult};
use ndb::{
    header::Header,
    node::{Node, NodeDatabase, SubNodeTree},
    node_id::NodeId,
    NdbError, NdbResult,
};

#[derive(Error, Debug)]
pub enum PstError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] NdbError),
    #[error("Lists, Tables, and Properties error: {0}")]
    ListsTablesPropertiesError(#[from] LtpError),
    #[error("Messaging error: {0}")]
    MessagingError(#[from] MessagingError),
}

impl From<PstError> for io::Error {
    fn from(err: PstError) -> io::Error {
        match err {
            PstError::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type PstResult<T> = Result<T, PstError>;

/// Resolves a NID to the [PropertyContext] stored at that node.
///
/// A [Message](messaging::message::Message) resolves its attachments through the sub-node
/// tree of its own node; top-level nodes resolve through the node BTree of a [PstFile].
pub trait PstContext<'a> {
    fn sub_property_context(&self, node: NodeId) -> LtpResult<PropertyContext<'a>>;
}

impl<'a> PstContext<'a> for SubNodeTree<'a> {
    fn sub_property_context(&self, node: NodeId) -> LtpResult<PropertyContext<'a>> {
        PropertyContext::read(self.node(node)?)
    }
}

impl<'a> PstContext<'a> for &'a PstFile {
    fn sub_property_context(&self, node: NodeId) -> LtpResult<PropertyContext<'a>> {
        self.property_context(node)
    }
}

/// [PST File](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/6b57253b-0853-47bb-99bb-d4b8f78105f0)
///
/// Owns the whole file. Everything read from it borrows this buffer.
pub struct PstFile {
    data: Vec<u8>,
    header: Header,
}

impl PstFile {
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let data = fs::read(path)?;
        Ok(Self::from_bytes(data)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> NdbResult<Self> {
        let header = Header::read(&data)?;
        Ok(Self { data, header })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn node_database(&self) -> NodeDatabase<'_> {
        NodeDatabase::new(&self.data, &self.header)
    }

    pub fn node(&self, node: NodeId) -> NdbResult<Node<'_>> {
        self.node_database().node(node)
    }

    pub fn property_context(&self, node: NodeId) -> LtpResult<PropertyContext<'_>> {
        PropertyContext::read(self.node(node)?)
    }

    pub fn table_context(&self, node: NodeId) -> LtpResult<TableContext<'_>> {
        TableContext::read(self.node(node)?)
    }

    pub fn message(&self, node: NodeId) -> MessagingResult<Message<'_>> {
        Message::read(self, node)
    }
}
