//! Plain mail objects built from `IPM.Note` messages, ready for an RFC 5322 writer.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{
    message::{value_to_string, Message},
    *,
};
use crate::{ltp::tags::*, ndb::node_id::NodeId, PstContext};

/// Difference between the FILETIME epoch (1601-01-01) and the Unix epoch in 100ns ticks.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

/// Header names longer than this are not carried over.
const MAX_HEADER_KEY_LEN: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailHeader {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: Option<String>,
    pub cid: Option<String>,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailObject {
    pub message_id: Option<String>,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub headers: Vec<MailHeader>,
    pub date: Option<DateTime<Utc>>,
    pub attachments: Vec<MailAttachment>,
}

/// An attachment row left out of [MailObject::attachments].
#[derive(Debug)]
pub struct AttachmentFailure {
    pub index: usize,
    pub error: MessagingError,
}

/// A mail field left empty because its property could not be decoded.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: &'static str,
    pub error: MessagingError,
}

/// The result of [Message::to_mail_object].
#[derive(Debug)]
pub struct MailConversion {
    pub mail: MailObject,
    pub failures: Vec<AttachmentFailure>,
    pub field_failures: Vec<FieldFailure>,
}

/// Turns per-field read errors into `None`, keeping a record of each one.
struct FieldReader {
    node: NodeId,
    failures: Vec<FieldFailure>,
}

impl FieldReader {
    fn read<T>(&mut self, field: &'static str, value: MessagingResult<Option<T>>) -> Option<T> {
        match value {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    node = u32::from(self.node),
                    field,
                    %error,
                    "dropping undecodable mail field"
                );
                self.failures.push(FieldFailure { field, error });
                None
            }
        }
    }
}

/// Format a display name and an email address as a single address.
///
/// The address is lowercased. When both are present and the name is just the address, the
/// address alone is returned; otherwise the result is `name <address>`.
pub fn rfc_address(display: Option<&str>, address: Option<&str>) -> Option<String> {
    let display = display.filter(|display| !display.is_empty());
    let address = address.filter(|address| !address.is_empty());

    match (display, address) {
        (None, None) => None,
        (None, Some(address)) => Some(address.to_lowercase().trim().to_string()),
        (Some(display), None) => Some(display.trim().to_string()),
        (Some(display), Some(address)) => {
            let address = address.to_lowercase().trim().to_string();
            if display.to_lowercase().trim() == address {
                Some(address)
            } else {
                Some(format!("{display} <{address}>"))
            }
        }
    }
}

/// Split `PidTagTransportMessageHeaders` into headers.
///
/// Lines starting with whitespace continue the previous header and are joined with `\n`.
/// `Content-Type` is skipped, as are headers with an empty value, no `:`, or an overlong name.
pub fn fold_headers(headers: &str) -> Vec<MailHeader> {
    let mut lines: Vec<String> = Vec::new();
    for line in headers.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        match lines.last_mut() {
            Some(last) if line.starts_with([' ', '\t']) => {
                last.push('\n');
                last.push_str(line.trim());
            }
            _ => lines.push(line.to_string()),
        }
    }

    lines
        .into_iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.is_empty()
                || key.len() >= MAX_HEADER_KEY_LEN
                || key.eq_ignore_ascii_case("content-type")
            {
                return None;
            }
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            Some(MailHeader {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Convert a `PtypTime` FILETIME to UTC.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    let ticks = filetime.checked_sub(FILETIME_UNIX_EPOCH)?;
    let seconds = ticks.div_euclid(10_000_000);
    let nanos = ticks.rem_euclid(10_000_000) * 100;
    DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
}

impl<'a, C: PstContext<'a>> Message<'a, C> {
    /// Build the [MailObject] for an `IPM.Note` message, or `None` for any other class.
    ///
    /// A field whose property cannot be decoded is left empty and reported in
    /// [MailConversion::field_failures]. Attachments that cannot be read are reported in
    /// [MailConversion::failures]. Both are logged and the rest of the message is still
    /// converted. The message class and the tables themselves must be readable.
    pub fn to_mail_object(&self) -> MessagingResult<Option<MailConversion>> {
        if self.message_class()?.as_deref() != Some("IPM.Note") {
            return Ok(None);
        }

        let mut fields = FieldReader {
            node: self.node(),
            failures: Vec::new(),
        };
        let sender_name = fields.read("sender_name", self.sender_name());
        let sender_address = fields.read("sender_email_address", self.sender_email_address());
        let headers = fields.read("headers", self.transport_message_headers());
        let date = fields
            .read("client_submit_time", self.client_submit_time())
            .or_else(|| fields.read("message_delivery_time", self.message_delivery_time()));

        let mut mail = MailObject {
            message_id: fields.read("message_id", self.internet_message_id()),
            from: rfc_address(sender_name.as_deref(), sender_address.as_deref()),
            subject: fields.read("subject", self.subject()),
            text: fields.read("text", self.body()),
            html: fields.read("html", self.body_html()),
            headers: fold_headers(&headers.unwrap_or_default()),
            date: date.and_then(filetime_to_datetime),
            ..Default::default()
        };

        self.add_recipients(&mut mail, &mut fields)?;

        let mut failures = Vec::new();
        if fields.read("has_attachments", self.has_attachments()) == Some(true) {
            let count = self
                .attachment_table()
                .map_or(0, |table| table.record_count());
            for index in 0..count {
                let attachment = self
                    .open_attachment(index)
                    .and_then(|attachment| {
                        attachment
                            .map(|attachment| attachment.to_mail_attachment())
                            .transpose()
                    });
                match attachment {
                    Ok(Some(attachment)) => mail.attachments.push(attachment),
                    Ok(None) => {}
                    Err(error) => {
                        warn!(
                            node = u32::from(self.node()),
                            index,
                            %error,
                            "skipping attachment"
                        );
                        failures.push(AttachmentFailure { index, error });
                    }
                }
            }
        }

        Ok(Some(MailConversion {
            mail,
            failures,
            field_failures: fields.failures,
        }))
    }

    fn add_recipients(
        &self,
        mail: &mut MailObject,
        fields: &mut FieldReader,
    ) -> MessagingResult<()> {
        let Some(table) = self.recipient_table() else {
            return Ok(());
        };
        let code_page = self.code_page();
        let text = |index, tag| -> MessagingResult<Option<String>> {
            table
                .cell_value(index, tag)?
                .map(|value| value_to_string(tag, &value, code_page))
                .transpose()
        };

        for index in 0..table.record_count() {
            let recipient_type = table
                .cell_value(index, PID_TAG_RECIPIENT_TYPE)?
                .and_then(|value| value.as_i32());
            let list = match recipient_type {
                Some(1) => &mut mail.to,
                Some(2) => &mut mail.cc,
                Some(3) => &mut mail.bcc,
                _ => continue,
            };
            let display = fields.read(
                "recipient_display_name",
                text(index, PID_TAG_DISPLAY_NAME),
            );
            let address = fields.read(
                "recipient_email_address",
                text(index, PID_TAG_EMAIL_ADDRESS),
            );
            if let Some(address) = rfc_address(display.as_deref(), address.as_deref()) {
                list.push(address);
            }
        }
        Ok(())
    }
}
