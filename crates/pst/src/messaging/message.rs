//! ## [Message Objects](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/1042af37-aaa4-4edc-bffd-90a1ede24188)

use codepage_strings::Coding;
use std::{collections::BTreeMap, iter};
use tracing::debug;

use super::{attachment::Attachment, *};
use crate::{
    ltp::{
        prop_context::{decode_unicode, PropertyContext, PropertyRecord, PropertyValue},
        table_context::{TableContext, LTP_ROW_ID_PROP_ID},
        tags::*,
        LtpResult,
    },
    ndb::{
        node::SubNodeTree,
        node_id::{NodeId, NID_ATTACHMENT_TABLE, NID_RECIPIENT_TABLE},
    },
    PstContext, PstFile,
};

/// `PidTagMessageCodepage` when the message does not carry one.
pub const DEFAULT_CODE_PAGE: u16 = 1252;

/// Property values keyed by tag name, or by hex tag when the name is unknown.
pub type PropertyMap<'a> = BTreeMap<String, PropertyValue<'a>>;

/// Collect records into a [PropertyMap]. A later record replaces an earlier one with the
/// same key.
pub fn properties_to_map<'a>(
    records: impl IntoIterator<Item = PropertyRecord<'a>>,
) -> PropertyMap<'a> {
    let mut map = PropertyMap::new();
    for record in records {
        map.insert(record.key(), record.value);
    }
    map
}

/// Decode `PtypString8` bytes in `code_page`, dropping trailing NUL characters.
pub fn decode_string8(data: &[u8], code_page: u16) -> MessagingResult<String> {
    let coding =
        Coding::new(code_page).map_err(|_| MessagingError::UnsupportedCodePage(code_page))?;
    let text = coding
        .decode(data)
        .map_err(|_| MessagingError::InvalidString8(code_page))?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// Text of a `PtypString` or `PtypString8` value.
pub fn value_to_string(
    tag: u16,
    value: &PropertyValue<'_>,
    code_page: u16,
) -> MessagingResult<String> {
    match value {
        PropertyValue::Unicode(value) => Ok(decode_unicode(value)),
        PropertyValue::String8(value) => decode_string8(value, code_page),
        other => Err(MessagingError::InvalidStringProperty(tag, other.prop_type())),
    }
}

/// Drop the `0x01` marker and the prefix length that follows it from `PidTagSubject`.
pub fn strip_subject_prefix(subject: &str) -> &str {
    let mut chars = subject.chars();
    if chars.next() != Some('\u{1}') {
        return subject;
    }
    chars.next();
    chars.as_str()
}

fn read_table<'a>(
    sub_nodes: &SubNodeTree<'a>,
    node: NodeId,
) -> LtpResult<Option<TableContext<'a>>> {
    if !sub_nodes.contains(node) {
        return Ok(None);
    }
    TableContext::read(sub_nodes.node(node)?).map(Some)
}

fn table_rows<'t>(table: Option<&'t TableContext<'_>>) -> MessagingResult<Vec<PropertyMap<'t>>> {
    let Some(table) = table else {
        return Ok(Vec::new());
    };
    (0..table.record_count())
        .map(|index| -> MessagingResult<_> {
            Ok(properties_to_map(table.all_row_properties(index)?))
        })
        .collect()
}

/// A Message object: its property context, its recipient and attachment tables, and the
/// [PstContext] that resolves attachment row ids.
pub struct Message<'a, C = SubNodeTree<'a>> {
    node: NodeId,
    properties: PropertyContext<'a>,
    recipients: Option<TableContext<'a>>,
    attachments: Option<TableContext<'a>>,
    context: C,
}

impl<'a> Message<'a> {
    /// Read the message at `node`. Attachments resolve through the message's sub-nodes.
    pub fn read(pst: &'a PstFile, node: NodeId) -> MessagingResult<Self> {
        let node = pst.node(node)?;
        let id = node.id();
        let (blocks, sub_nodes) = node.into_parts();

        let properties = PropertyContext::new(blocks, sub_nodes.clone())?;
        let recipients = read_table(&sub_nodes, NID_RECIPIENT_TABLE)?;
        let attachments = read_table(&sub_nodes, NID_ATTACHMENT_TABLE)?;

        debug!(
            node = u32::from(id),
            recipients = recipients.as_ref().map_or(0, TableContext::record_count),
            attachments = attachments.as_ref().map_or(0, TableContext::record_count),
            "read message"
        );

        Ok(Self::new(id, properties, recipients, attachments, sub_nodes))
    }
}

impl<'a, C: PstContext<'a>> Message<'a, C> {
    pub fn new(
        node: NodeId,
        properties: PropertyContext<'a>,
        recipients: Option<TableContext<'a>>,
        attachments: Option<TableContext<'a>>,
        context: C,
    ) -> Self {
        Self {
            node,
            properties,
            recipients,
            attachments,
            context,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn properties(&self) -> &PropertyContext<'a> {
        &self.properties
    }

    pub fn recipient_table(&self) -> Option<&TableContext<'a>> {
        self.recipients.as_ref()
    }

    pub fn attachment_table(&self) -> Option<&TableContext<'a>> {
        self.attachments.as_ref()
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn all_properties(&self) -> MessagingResult<PropertyMap<'_>> {
        Ok(properties_to_map(self.properties.all_properties()?))
    }

    /// [Message::all_properties] with `PidTagTransportMessageHeaders` looked up first, even
    /// when the message does not have it. Values that are missing or fail to decode are
    /// [PropertyValue::Null].
    pub fn all_properties_with_headers(&self) -> PropertyMap<'_> {
        let tags = iter::once(PID_TAG_TRANSPORT_MESSAGE_HEADERS).chain(self.properties.keys());
        properties_to_map(tags.map(|tag| {
            let value = self
                .properties
                .get_value(tag)
                .ok()
                .flatten()
                .unwrap_or_default();
            PropertyRecord::new(tag, value)
        }))
    }

    pub fn all_recipients(&self) -> MessagingResult<Vec<PropertyMap<'_>>> {
        table_rows(self.recipients.as_ref())
    }

    pub fn attachment_entries(&self) -> MessagingResult<Vec<PropertyMap<'_>>> {
        table_rows(self.attachments.as_ref())
    }

    /// The property context of attachment row `index`, or `None` when there is no attachment
    /// table or the row has no `PtypInteger32` row id.
    pub fn attachment_context(&self, index: usize) -> MessagingResult<Option<PropertyContext<'a>>> {
        let Some(table) = self.attachments.as_ref() else {
            return Ok(None);
        };

        let node = match table.cell_value(index, LTP_ROW_ID_PROP_ID)? {
            None => return Ok(None),
            Some(PropertyValue::Integer32(row_id)) => NodeId::from(row_id as u32),
            Some(other) => {
                debug!(
                    node = u32::from(self.node),
                    index,
                    prop_type = ?other.prop_type(),
                    "attachment row id is not an Integer32"
                );
                return Ok(None);
            }
        };

        Ok(Some(self.context.sub_property_context(node)?))
    }

    /// Every property of attachment row `index`, detached from the file.
    pub fn attachment(&self, index: usize) -> MessagingResult<Option<PropertyMap<'static>>> {
        let Some(context) = self.attachment_context(index)? else {
            return Ok(None);
        };
        let records = context.all_properties()?;
        Ok(Some(properties_to_map(
            records.into_iter().map(PropertyRecord::into_owned),
        )))
    }

    pub fn open_attachment(&self, index: usize) -> MessagingResult<Option<Attachment<'a>>> {
        let code_page = self.code_page();
        Ok(self
            .attachment_context(index)?
            .map(|context| Attachment::new(context, code_page)))
    }

    /// `PidTagMessageCodepage`, used for every `PtypString8` value of the message.
    pub fn code_page(&self) -> u16 {
        self.properties
            .get_value(PID_TAG_MESSAGE_CODEPAGE)
            .ok()
            .flatten()
            .and_then(|value| value.as_i32())
            .and_then(|value| u16::try_from(value).ok())
            .unwrap_or(DEFAULT_CODE_PAGE)
    }

    pub fn string_value(&self, tag: u16) -> MessagingResult<Option<String>> {
        self.properties
            .get_value(tag)?
            .map(|value| value_to_string(tag, &value, self.code_page()))
            .transpose()
    }

    fn time_value(&self, tag: u16) -> MessagingResult<Option<i64>> {
        Ok(match self.properties.get_value(tag)? {
            Some(PropertyValue::Time(value)) => Some(value),
            _ => None,
        })
    }

    pub fn subject(&self) -> MessagingResult<Option<String>> {
        Ok(self
            .string_value(PID_TAG_SUBJECT)?
            .map(|subject| strip_subject_prefix(&subject).to_string()))
    }

    pub fn body(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_BODY)
    }

    /// `PidTagBodyHtml`, read as UTF-8 when it is stored as binary.
    pub fn body_html(&self) -> MessagingResult<Option<String>> {
        match self.properties.get_value(PID_TAG_BODY_HTML)? {
            Some(PropertyValue::Binary(value)) => Ok(Some(String::from_utf8_lossy(&value).into_owned())),
            Some(value) => value_to_string(PID_TAG_BODY_HTML, &value, self.code_page()).map(Some),
            None => Ok(None),
        }
    }

    pub fn message_class(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_MESSAGE_CLASS)
    }

    pub fn message_flags(&self) -> MessagingResult<Option<i32>> {
        Ok(self
            .properties
            .get_value(PID_TAG_MESSAGE_FLAGS)?
            .and_then(|value| value.as_i32()))
    }

    /// `MSGFLAG_HASATTACH`, or `None` without `PidTagMessageFlags`.
    pub fn has_attachments(&self) -> MessagingResult<Option<bool>> {
        Ok(self
            .message_flags()?
            .map(|flags| flags & MESSAGE_FLAG_HAS_ATTACHMENTS != 0))
    }

    pub fn internet_message_id(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_INTERNET_MESSAGE_ID)
    }

    pub fn sender_name(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_SENDER_NAME)
    }

    pub fn sender_email_address(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_SENDER_EMAIL_ADDRESS)
    }

    pub fn transport_message_headers(&self) -> MessagingResult<Option<String>> {
        self.string_value(PID_TAG_TRANSPORT_MESSAGE_HEADERS)
    }

    /// `PidTagClientSubmitTime` as a FILETIME.
    pub fn client_submit_time(&self) -> MessagingResult<Option<i64>> {
        self.time_value(PID_TAG_CLIENT_SUBMIT_TIME)
    }

    /// `PidTagMessageDeliveryTime` as a FILETIME.
    pub fn message_delivery_time(&self) -> MessagingResult<Option<i64>> {
        self.time_value(PID_TAG_MESSAGE_DELIVERY_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ltp::{prop_type::PropertyType, LtpError},
        ndb::NdbError,
        testing::*,
    };

    fn attachment_block(filename: &str) -> Vec<u8> {
        property_block(&[
            (0x3701, PropertyType::Binary, TestValue::Heap(b"payload")),
            (0x3704, PropertyType::Unicode, TestValue::Heap(&utf16(filename))),
        ])
    }

    fn sample() -> Vec<u8> {
        let subject = utf16("\u{1}\u{5}RE: lunch");
        let class = utf16("IPM.Note");
        let sender = b"Ren\xe9e\0".to_vec();
        let properties = property_block(&[
            (0x001A, PropertyType::Unicode, TestValue::Heap(&class)),
            (0x0037, PropertyType::Unicode, TestValue::Heap(&subject)),
            (0x0C1A, PropertyType::String8, TestValue::Heap(&sender)),
            (0x0E07, PropertyType::Integer32, TestValue::Inline(0x11)),
            (0x1013, PropertyType::Binary, TestValue::Heap("<p>caf\u{e9}</p>".as_bytes())),
            (0x8003, PropertyType::Integer32, TestValue::Inline(7)),
        ]);

        let mut message = MessageBuilder::new(properties);
        message.recipients = vec![
            (1, Some("Jane Doe"), Some("JANE@EX.COM")),
            (2, None, Some("cc@ex.com")),
        ];
        message.attachments = Some(vec![
            (Some(0x8025), Some(attachment_block("notes.txt"))),
            (None, None),
            (Some(0x8045), None),
        ]);
        message.build()
    }

    #[test]
    fn test_getters() {
        let pst = PstFile::from_bytes(sample()).unwrap();
        let message = pst.message(NodeId::from(TEST_MESSAGE)).unwrap();

        assert_eq!(message.subject().unwrap().as_deref(), Some("RE: lunch"));
        assert_eq!(message.message_class().unwrap().as_deref(), Some("IPM.Note"));
        assert_eq!(message.sender_name().unwrap().as_deref(), Some("Ren\u{e9}e"));
        assert_eq!(
            message.body_html().unwrap().as_deref(),
            Some("<p>caf\u{e9}</p>")
        );
        assert_eq!(message.body().unwrap(), None);
        assert_eq!(message.has_attachments().unwrap(), Some(true));
        assert_eq!(message.code_page(), DEFAULT_CODE_PAGE);
    }

    #[test]
    fn test_all_properties() {
        let pst = PstFile::from_bytes(sample()).unwrap();
        let message = pst.message(NodeId::from(TEST_MESSAGE)).unwrap();

        let properties = message.all_properties().unwrap();
        assert_eq!(properties.len(), 6);
        assert_eq!(properties["messageFlags"], PropertyValue::Integer32(0x11));
        assert_eq!(properties["0x8003"], PropertyValue::Integer32(7));
        assert!(!properties.contains_key("transportMessageHeaders"));

        let properties = message.all_properties_with_headers();
        assert_eq!(properties.len(), 7);
        assert_eq!(properties["transportMessageHeaders"], PropertyValue::Null);
    }

    #[test]
    fn test_later_duplicates_win() {
        let map = properties_to_map([
            PropertyRecord::new(0x0037, PropertyValue::Integer32(1)),
            PropertyRecord::new(0x0037, PropertyValue::Integer32(2)),
        ]);
        assert_eq!(map["subject"], PropertyValue::Integer32(2));
    }

    #[test]
    fn test_tables() {
        let pst = PstFile::from_bytes(sample()).unwrap();
        let message = pst.message(NodeId::from(TEST_MESSAGE)).unwrap();

        let recipients = message.all_recipients().unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0]["recipientType"], PropertyValue::Integer32(1));
        assert!(!recipients[1].contains_key("displayName"));

        let attachments = message.attachment_entries().unwrap();
        assert_eq!(attachments.len(), 3);
        assert_eq!(attachments[0]["ltpRowId"], PropertyValue::Integer32(0x8025));
        assert!(!attachments[1].contains_key("ltpRowId"));
    }

    #[test]
    fn test_attachment() {
        let pst = PstFile::from_bytes(sample()).unwrap();
        let message = pst.message(NodeId::from(TEST_MESSAGE)).unwrap();

        let attachment = message.attachment(0).unwrap().unwrap();
        let Some(PropertyValue::Binary(data)) = attachment.get("attachDataBinary") else {
            panic!("attachment 0 should have data");
        };
        assert_eq!(data.as_ref(), b"payload");

        // No row id.
        assert!(message.attachment(1).unwrap().is_none());

        // Row id without a sub-node.
        let Err(MessagingError::ListsTablesPropertiesError(LtpError::NodeDatabaseError(
            NdbError::SubNodeNotFound(node),
        ))) = message.attachment(2)
        else {
            panic!("0x8045 should not resolve");
        };
        assert_eq!(u32::from(node), 0x8045);

        let Err(MessagingError::ListsTablesPropertiesError(LtpError::RowIndexOutOfRange {
            index: 3,
            count: 3,
        })) = message.attachment(3)
        else {
            panic!("row 3 should be out of range");
        };
    }

    #[test]
    fn test_message_without_attachment_table() {
        let properties = property_block(&[(0x0E07, PropertyType::Integer32, TestValue::Inline(0))]);
        let pst = PstFile::from_bytes(MessageBuilder::new(properties).build()).unwrap();
        let message = pst.message(NodeId::from(TEST_MESSAGE)).unwrap();

        assert!(message.attachment_table().is_none());
        assert!(message.attachment_entries().unwrap().is_empty());
        assert!(message.attachment(0).unwrap().is_none());
        assert!(message.all_recipients().unwrap().is_empty());
        assert_eq!(message.has_attachments().unwrap(), Some(false));
        assert_eq!(message.subject().unwrap(), None);
    }

    #[test]
    fn test_resolve_through_file() {
        let mut builder = PstBuilder::new(crate::ndb::header::NdbCryptMethod::None);
        let attachment = builder.add_block(&attachment_block("top.txt"));
        builder.add_node(0x8025, attachment, None);
        let message = builder.add_block(&property_block(&[]));
        builder.add_node(TEST_MESSAGE, message, None);
        let mut table = TableBuilder::new(&[]);
        table.add_row(Some(0x8025), vec![]);
        let (table, _) = table.build(None);
        let file = builder.build();
        let pst = PstFile::from_bytes(file).unwrap();

        let attachments = TableContext::new(vec![table.into()], Default::default()).unwrap();
        let message = Message::new(
            NodeId::from(TEST_MESSAGE),
            pst.property_context(NodeId::from(TEST_MESSAGE)).unwrap(),
            None,
            Some(attachments),
            &pst,
        );
        let attachment = message.open_attachment(0).unwrap().unwrap();
        assert_eq!(attachment.filename().unwrap().as_deref(), Some("top.txt"));
    }

    #[test]
    fn test_wide_attachment_row_id() {
        let pst = PstFile::from_bytes(MessageBuilder::new(property_block(&[])).build()).unwrap();
        let mut table = TableBuilder::with_row_id_type(PropertyType::Integer64, &[]);
        table.add_row(Some(0x8025), vec![]);
        let (table, _) = table.build(None);
        let attachments = TableContext::new(vec![table.into()], Default::default()).unwrap();
        assert_eq!(
            attachments.cell_value(0, LTP_ROW_ID_PROP_ID).unwrap(),
            Some(PropertyValue::Integer64(0x8025))
        );

        let message = Message::new(
            NodeId::from(TEST_MESSAGE),
            pst.property_context(NodeId::from(TEST_MESSAGE)).unwrap(),
            None,
            Some(attachments),
            &pst,
        );
        assert!(message.attachment_context(0).unwrap().is_none());
        assert!(message.attachment(0).unwrap().is_none());
        assert!(message.open_attachment(0).unwrap().is_none());
    }

    #[test]
    fn test_strip_subject_prefix() {
        assert_eq!(strip_subject_prefix("\u{1}\u{4}FW: hi"), "FW: hi");
        assert_eq!(strip_subject_prefix("plain"), "plain");
        assert_eq!(strip_subject_prefix("\u{1}"), "");
        assert_eq!(strip_subject_prefix(""), "");
    }

    #[test]
    fn test_decode_string8() {
        assert_eq!(decode_string8(b"caf\xe9\0", 1252).unwrap(), "caf\u{e9}");
        let Err(MessagingError::InvalidStringProperty(0x0E07, PropertyType::Integer32)) =
            value_to_string(0x0E07, &PropertyValue::Integer32(1), 1252)
        else {
            panic!("an integer is not a string");
        };
    }
}
