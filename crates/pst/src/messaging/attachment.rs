//! ## [Attachment Objects](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/46eb4828-c6a5-420d-a137-9ee36df317c1)

use super::{
    mail::MailAttachment,
    message::{properties_to_map, value_to_string, PropertyMap},
    *,
};
use crate::ltp::{
    prop_context::{PropertyContext, PropertyValue},
    tags::*,
};

/// [PidTagAttachMethod](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxcmsg/252923d6-dd41-468b-9c57-d3f68051a516)
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum AttachmentMethod {
    /// `afNone`
    #[default]
    None = 0x00000000,
    /// `afByValue`: `PidTagAttachDataBinary` holds the content.
    ByValue = 0x00000001,
    /// `afByReference`
    ByReference = 0x00000002,
    /// `afByReferenceOnly`
    ByReferenceOnly = 0x00000004,
    /// `afEmbeddedMessage`: `PidTagAttachDataObject` holds a message.
    EmbeddedMessage = 0x00000005,
    /// `afStorage`
    Storage = 0x00000006,
    /// `afByWebReference`
    ByWebReference = 0x00000007,
}

impl TryFrom<i32> for AttachmentMethod {
    type Error = MessagingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0x00000000 => Ok(Self::None),
            0x00000001 => Ok(Self::ByValue),
            0x00000002 => Ok(Self::ByReference),
            0x00000004 => Ok(Self::ByReferenceOnly),
            0x00000005 => Ok(Self::EmbeddedMessage),
            0x00000006 => Ok(Self::Storage),
            0x00000007 => Ok(Self::ByWebReference),
            _ => Err(MessagingError::InvalidAttachmentMethod(value)),
        }
    }
}

/// The property context of one attachment, read with the code page of its message.
pub struct Attachment<'a> {
    properties: PropertyContext<'a>,
    code_page: u16,
}

impl<'a> Attachment<'a> {
    pub fn new(properties: PropertyContext<'a>, code_page: u16) -> Self {
        Self {
            properties,
            code_page,
        }
    }

    pub fn properties(&self) -> &PropertyContext<'a> {
        &self.properties
    }

    pub fn all_properties(&self) -> MessagingResult<PropertyMap<'_>> {
        Ok(properties_to_map(self.properties.all_properties()?))
    }

    fn string_value(&self, tag: u16) -> MessagingResult<Option<String>> {
        self.properties
            .get_value(tag)?
            .map(|value| value_to_string(tag, &value, self.code_page))
            .transpose()
    }

    /// The first non-empty one of `PidTagAttachLongFilename`, `PidTagAttachFilename` and
    /// `PidTagDisplayName`.
    pub fn filename(&self) -> MessagingResult<Option<String>> {
        for tag in [
            PID_TAG_ATTACH_LONG_FILENAME,
            PID_TAG_ATTACH_FILENAME,
            PID_TAG_DISPLAY_NAME,
        ] {
            if let Some(name) = self.string_value(tag)?.filter(|name| !name.is_empty()) {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    pub fn content_id(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_ATTACH_CONTENT_ID)
    }

    pub fn mime_type(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_ATTACH_MIME_TAG)
    }

    pub fn method(&self) -> MessagingResult<Option<AttachmentMethod>> {
        self.properties
            .get_value(PID_TAG_ATTACH_METHOD)?
            .and_then(|value| value.as_i32())
            .map(AttachmentMethod::try_from)
            .transpose()
    }

    pub fn size(&self) -> MessagingResult<Option<i32>> {
        Ok(self
            .properties
            .get_value(PID_TAG_ATTACH_SIZE)?
            .and_then(|value| value.as_i32()))
    }

    /// `PidTagAttachDataBinary`. Attachments without it have no content to export.
    pub fn content(&self) -> MessagingResult<Vec<u8>> {
        match self.properties.get_value(PID_TAG_ATTACH_DATA_BINARY)? {
            Some(PropertyValue::Binary(data)) => Ok(data.into_owned()),
            Some(invalid) => Err(MessagingError::InvalidAttachmentData(invalid.prop_type())),
            None => Err(MessagingError::AttachmentDataNotFound),
        }
    }

    pub fn to_mail_attachment(&self) -> MessagingResult<MailAttachment> {
        Ok(MailAttachment {
            filename: self.filename()?,
            cid: self.content_id()?,
            content: self.content()?,
            content_type: self.mime_type()?,
        })
    }
}
