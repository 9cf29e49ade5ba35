//! ## [Messaging Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3f1bc553-d15d-4dcf-9b80-fbf1dd6c7e79)

use std::io;
use thiserror::Error;

pub mod attachment;
pub mod mail;
pub mod message;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] crate::ndb::NdbError),
    #[error("Lists, Tables, and Properties error: {0}")]
    ListsTablesPropertiesError(#[from] crate::ltp::LtpError),
    #[error("Invalid string property 0x{0:04X}: {1:?}")]
    InvalidStringProperty(u16, crate::ltp::prop_type::PropertyType),
    #[error("Invalid PidTagAttachMethod: 0x{0:08X}")]
    InvalidAttachmentMethod(i32),
    #[error("Unsupported code page: {0}")]
    UnsupportedCodePage(u16),
    #[error("Invalid PtypString8 for code page {0}")]
    InvalidString8(u16),
    #[error("Missing PidTagAttachDataBinary on attachment")]
    AttachmentDataNotFound,
    #[error("Invalid PidTagAttachDataBinary on attachment: {0:?}")]
    InvalidAttachmentData(crate::ltp::prop_type::PropertyType),
}

impl From<MessagingError> for io::Error {
    fn from(err: MessagingError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
