//! Property tags read by this crate, and the display names used when a property bag is
//! turned into a map.

pub const PID_TAG_IMPORTANCE: u16 = 0x0017;
pub const PID_TAG_MESSAGE_CLASS: u16 = 0x001A;
pub const PID_TAG_SUBJECT: u16 = 0x0037;
pub const PID_TAG_CLIENT_SUBMIT_TIME: u16 = 0x0039;
pub const PID_TAG_SENT_REPRESENTING_NAME: u16 = 0x0042;
pub const PID_TAG_SENT_REPRESENTING_EMAIL_ADDRESS: u16 = 0x0065;
pub const PID_TAG_TRANSPORT_MESSAGE_HEADERS: u16 = 0x007D;
pub const PID_TAG_RECIPIENT_TYPE: u16 = 0x0C15;
pub const PID_TAG_SENDER_NAME: u16 = 0x0C1A;
pub const PID_TAG_SENDER_EMAIL_ADDRESS: u16 = 0x0C1F;
pub const PID_TAG_MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
pub const PID_TAG_MESSAGE_FLAGS: u16 = 0x0E07;
pub const PID_TAG_MESSAGE_SIZE: u16 = 0x0E08;
pub const PID_TAG_ATTACH_SIZE: u16 = 0x0E20;
pub const PID_TAG_BODY: u16 = 0x1000;
pub const PID_TAG_BODY_HTML: u16 = 0x1013;
pub const PID_TAG_INTERNET_MESSAGE_ID: u16 = 0x1035;
pub const PID_TAG_DISPLAY_NAME: u16 = 0x3001;
pub const PID_TAG_EMAIL_ADDRESS: u16 = 0x3003;
pub const PID_TAG_ATTACH_DATA_BINARY: u16 = 0x3701;
pub const PID_TAG_ATTACH_FILENAME: u16 = 0x3704;
pub const PID_TAG_ATTACH_METHOD: u16 = 0x3705;
pub const PID_TAG_ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const PID_TAG_ATTACH_MIME_TAG: u16 = 0x370E;
pub const PID_TAG_ATTACH_CONTENT_ID: u16 = 0x3712;
pub const PID_TAG_MESSAGE_CODEPAGE: u16 = 0x3FFD;
pub const PID_TAG_LTP_ROW_ID: u16 = 0x67F2;
pub const PID_TAG_LTP_ROW_VER: u16 = 0x67F3;

/// `MSGFLAG_HASATTACH` in `PidTagMessageFlags`.
pub const MESSAGE_FLAG_HAS_ATTACHMENTS: i32 = 0x10;

static TAG_NAMES: &[(u16, &str)] = &[
    (0x0002, "alternateRecipientAllowed"),
    (PID_TAG_IMPORTANCE, "importance"),
    (PID_TAG_MESSAGE_CLASS, "messageClass"),
    (0x0023, "originatorDeliveryReportRequested"),
    (0x0026, "priority"),
    (0x0029, "readReceiptRequested"),
    (0x002B, "recipientReassignmentProhibited"),
    (0x0036, "sensitivity"),
    (PID_TAG_SUBJECT, "subject"),
    (PID_TAG_CLIENT_SUBMIT_TIME, "clientSubmitTime"),
    (0x003B, "sentRepresentingSearchKey"),
    (0x0040, "receivedByName"),
    (0x0041, "sentRepresentingEntryId"),
    (PID_TAG_SENT_REPRESENTING_NAME, "sentRepresentingName"),
    (0x0057, "messageToMe"),
    (0x0058, "messageCcMe"),
    (0x0064, "sentRepresentingAddressType"),
    (PID_TAG_SENT_REPRESENTING_EMAIL_ADDRESS, "sentRepresentingEmailAddress"),
    (0x0070, "conversationTopic"),
    (0x0071, "conversationIndex"),
    (0x0075, "receivedByAddressType"),
    (0x0076, "receivedByEmailAddress"),
    (PID_TAG_TRANSPORT_MESSAGE_HEADERS, "transportMessageHeaders"),
    (PID_TAG_RECIPIENT_TYPE, "recipientType"),
    (0x0C17, "replyRequested"),
    (0x0C19, "senderEntryId"),
    (PID_TAG_SENDER_NAME, "senderName"),
    (0x0C1D, "senderSearchKey"),
    (0x0C1E, "senderAddressType"),
    (PID_TAG_SENDER_EMAIL_ADDRESS, "senderEmailAddress"),
    (0x0E01, "deleteAfterSubmit"),
    (0x0E02, "displayBcc"),
    (0x0E03, "displayCc"),
    (0x0E04, "displayTo"),
    (PID_TAG_MESSAGE_DELIVERY_TIME, "messageDeliveryTime"),
    (PID_TAG_MESSAGE_FLAGS, "messageFlags"),
    (PID_TAG_MESSAGE_SIZE, "messageSize"),
    (0x0E17, "messageStatus"),
    (0x0E1B, "hasAttachments"),
    (0x0E1F, "rtfInSync"),
    (PID_TAG_ATTACH_SIZE, "attachSize"),
    (0x0E21, "attachNumber"),
    (0x0FF9, "recordKey"),
    (0x0FFE, "objectType"),
    (0x0FFF, "entryId"),
    (PID_TAG_BODY, "body"),
    (0x1009, "rtfCompressed"),
    (PID_TAG_BODY_HTML, "bodyHtml"),
    (PID_TAG_INTERNET_MESSAGE_ID, "internetMessageId"),
    (0x1039, "internetReferences"),
    (0x1042, "inReplyToId"),
    (0x1080, "iconIndex"),
    (PID_TAG_DISPLAY_NAME, "displayName"),
    (0x3002, "addressType"),
    (PID_TAG_EMAIL_ADDRESS, "emailAddress"),
    (0x3007, "creationTime"),
    (0x3008, "lastModificationTime"),
    (0x300B, "searchKey"),
    (0x3602, "contentCount"),
    (0x3603, "contentUnreadCount"),
    (0x360A, "subfolders"),
    (0x3613, "containerClass"),
    (PID_TAG_ATTACH_DATA_BINARY, "attachDataBinary"),
    (0x3703, "attachExtension"),
    (PID_TAG_ATTACH_FILENAME, "attachFilename"),
    (PID_TAG_ATTACH_METHOD, "attachMethod"),
    (PID_TAG_ATTACH_LONG_FILENAME, "attachLongFilename"),
    (0x370B, "renderingPosition"),
    (PID_TAG_ATTACH_MIME_TAG, "attachMimeTag"),
    (PID_TAG_ATTACH_CONTENT_ID, "attachContentId"),
    (0x3714, "attachFlags"),
    (0x39FE, "smtpAddress"),
    (0x3A00, "account"),
    (0x3A20, "transmittableDisplayName"),
    (0x3FDE, "internetCodepage"),
    (0x3FF1, "messageLocaleId"),
    (PID_TAG_MESSAGE_CODEPAGE, "messageCodepage"),
    (0x5FF6, "recipientDisplayName"),
    (0x5FFD, "recipientFlags"),
    (0x5FFF, "recipientTrackStatus"),
    (PID_TAG_LTP_ROW_ID, "ltpRowId"),
    (PID_TAG_LTP_ROW_VER, "ltpRowVer"),
];

/// Display name of a property tag, if it is one this crate knows.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    TAG_NAMES
        .iter()
        .find(|(id, _)| *id == tag)
        .map(|(_, name)| *name)
}

/// `0x` followed by the tag as 4 lower-case hex digits.
pub fn tag_hex(tag: u16) -> String {
    format!("0x{tag:04x}")
}
