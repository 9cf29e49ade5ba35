//! ## [Property Context (PC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/294c83c6-ff92-42f5-b6b6-876c29fa9737)

use byteorder::{ByteOrder, LittleEndian};
use std::{borrow::Cow, fmt::Debug, ops::Range};
use tracing::debug;

use super::{heap::*, prop_type::*, tags, tree::*, *};
use crate::ndb::{
    node::{Node, SubNodeTree},
    node_id::NodeId,
};

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct GuidValue {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl GuidValue {
    const SIZE: usize = 16;

    fn read(data: &[u8]) -> Self {
        let mut data4 = [0; 8];
        data4.copy_from_slice(&data[8..16]);
        Self {
            data1: LittleEndian::read_u32(&data[..4]),
            data2: LittleEndian::read_u16(&data[4..6]),
            data3: LittleEndian::read_u16(&data[6..8]),
            data4,
        }
    }

    pub fn data1(&self) -> u32 {
        self.data1
    }

    pub fn data2(&self) -> u16 {
        self.data2
    }

    pub fn data3(&self) -> u16 {
        self.data3
    }

    pub fn data4(&self) -> &[u8; 8] {
        &self.data4
    }
}

impl Debug for GuidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GuidValue {{ {:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X} }}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

/// `PtypObject` payload: the sub-node holding the object and its size.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectValue {
    node_id: NodeId,
    size: u32,
}

impl ObjectValue {
    pub fn node(&self) -> NodeId {
        self.node_id
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Debug for ObjectValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectValue {{ {:?}, size: 0x{:X} }}",
            self.node_id, self.size
        )
    }
}

/// A decoded property. Strings and binaries are views over the node's bytes; text decoding
/// is left to the caller ([decode_unicode], or a code page for `String8`).
#[derive(Clone, Default, PartialEq, Debug)]
pub enum PropertyValue<'a> {
    /// `PtypNull`: None: This property is a placeholder.
    #[default]
    Null,
    /// `PtypInteger16`: 2 bytes; a 16-bit integer
    Integer16(i16),
    /// `PtypInteger32`: 4 bytes; a 32-bit integer
    Integer32(i32),
    /// `PtypFloating32`: 4 bytes; a 32-bit floating-point number
    Floating32(f32),
    /// `PtypFloating64`: 8 bytes; a 64-bit floating-point number
    Floating64(f64),
    /// `PtypCurrency`: 8 bytes; a 64-bit signed, scaled integer representation of a decimal
    /// currency value, with four places to the right of the decimal point
    Currency(i64),
    /// `PtypFloatingTime`: 8 bytes; days since December 30, 1899 as a 64-bit float
    FloatingTime(f64),
    /// `PtypErrorCode`: 4 bytes; a 32-bit integer encoding error information
    ErrorCode(i32),
    /// `PtypBoolean`: 1 byte; restricted to 1 or 0
    Boolean(bool),
    /// `PtypInteger64`: 8 bytes; a 64-bit integer
    Integer64(i64),
    /// `PtypString8`: multibyte characters in the message code page
    String8(Cow<'a, [u8]>),
    /// `PtypString`: UTF-16LE bytes
    Unicode(Cow<'a, [u8]>),
    /// `PtypTime`: 8 bytes; 100-nanosecond intervals since January 1, 1601
    Time(i64),
    /// `PtypGuid`: 16 bytes; a GUID with Data1, Data2, and Data3 fields in little-endian format
    Guid(GuidValue),
    /// `PtypBinary`: Variable size
    Binary(Cow<'a, [u8]>),
    /// `PtypObject`: reference to a sub-node
    Object(ObjectValue),

    MultipleInteger16(Vec<i16>),
    MultipleInteger32(Vec<i32>),
    MultipleFloating32(Vec<f32>),
    MultipleFloating64(Vec<f64>),
    MultipleCurrency(Vec<i64>),
    MultipleFloatingTime(Vec<f64>),
    MultipleInteger64(Vec<i64>),
    MultipleString8(Vec<Cow<'a, [u8]>>),
    MultipleUnicode(Vec<Cow<'a, [u8]>>),
    MultipleTime(Vec<i64>),
    MultipleGuid(Vec<GuidValue>),
    MultipleBinary(Vec<Cow<'a, [u8]>>),
}

impl<'a> PropertyValue<'a> {
    /// Decode a fixed-width value from the front of `data`.
    pub fn read_fixed(prop_type: PropertyType, data: &[u8]) -> LtpResult<Self> {
        let size = prop_type
            .fixed_size()
            .ok_or(LtpError::InvalidPropertyType(u16::from(prop_type)))?;
        let data = data.get(..size).ok_or(LtpError::PropertyValueTooShort {
            prop_type,
            size: data.len(),
        })?;

        Ok(match prop_type {
            PropertyType::Null => Self::Null,
            PropertyType::Boolean => Self::Boolean(data[0] != 0),
            PropertyType::Integer16 => Self::Integer16(LittleEndian::read_i16(data)),
            PropertyType::Integer32 => Self::Integer32(LittleEndian::read_i32(data)),
            PropertyType::Floating32 => Self::Floating32(LittleEndian::read_f32(data)),
            PropertyType::ErrorCode => Self::ErrorCode(LittleEndian::read_i32(data)),
            PropertyType::Floating64 => Self::Floating64(LittleEndian::read_f64(data)),
            PropertyType::Currency => Self::Currency(LittleEndian::read_i64(data)),
            PropertyType::FloatingTime => Self::FloatingTime(LittleEndian::read_f64(data)),
            PropertyType::Integer64 => Self::Integer64(LittleEndian::read_i64(data)),
            PropertyType::Time => Self::Time(LittleEndian::read_i64(data)),
            PropertyType::Guid => Self::Guid(GuidValue::read(data)),
            _ => return Err(LtpError::InvalidPropertyType(u16::from(prop_type))),
        })
    }

    /// Decode a value stored out of line, at a HID or in a sub-node.
    pub fn read(prop_type: PropertyType, data: Cow<'a, [u8]>) -> LtpResult<Self> {
        if prop_type.fixed_size().is_some() {
            return Self::read_fixed(prop_type, &data);
        }

        match prop_type {
            PropertyType::String8 => Ok(Self::String8(data)),
            PropertyType::Unicode => Ok(Self::Unicode(data)),
            PropertyType::Binary => Ok(Self::Binary(data)),

            PropertyType::Object => {
                if data.len() < 8 {
                    return Err(LtpError::PropertyValueTooShort {
                        prop_type,
                        size: data.len(),
                    });
                }
                Ok(Self::Object(ObjectValue {
                    node_id: NodeId::read(&data[..4]),
                    size: LittleEndian::read_u32(&data[4..8]),
                }))
            }

            PropertyType::MultipleInteger16 => Ok(Self::MultipleInteger16(packed(
                &data,
                2,
                LittleEndian::read_i16,
            )?)),
            PropertyType::MultipleInteger32 => Ok(Self::MultipleInteger32(packed(
                &data,
                4,
                LittleEndian::read_i32,
            )?)),
            PropertyType::MultipleFloating32 => Ok(Self::MultipleFloating32(packed(
                &data,
                4,
                LittleEndian::read_f32,
            )?)),
            PropertyType::MultipleFloating64 => Ok(Self::MultipleFloating64(packed(
                &data,
                8,
                LittleEndian::read_f64,
            )?)),
            PropertyType::MultipleCurrency => Ok(Self::MultipleCurrency(packed(
                &data,
                8,
                LittleEndian::read_i64,
            )?)),
            PropertyType::MultipleFloatingTime => Ok(Self::MultipleFloatingTime(packed(
                &data,
                8,
                LittleEndian::read_f64,
            )?)),
            PropertyType::MultipleInteger64 => Ok(Self::MultipleInteger64(packed(
                &data,
                8,
                LittleEndian::read_i64,
            )?)),
            PropertyType::MultipleTime => Ok(Self::MultipleTime(packed(
                &data,
                8,
                LittleEndian::read_i64,
            )?)),
            PropertyType::MultipleGuid => Ok(Self::MultipleGuid(packed(
                &data,
                GuidValue::SIZE,
                GuidValue::read,
            )?)),

            PropertyType::MultipleString8 => Ok(Self::MultipleString8(variable_items(data)?)),
            PropertyType::MultipleUnicode => Ok(Self::MultipleUnicode(variable_items(data)?)),
            PropertyType::MultipleBinary => Ok(Self::MultipleBinary(variable_items(data)?)),

            _ => Err(LtpError::InvalidPropertyType(u16::from(prop_type))),
        }
    }

    pub fn prop_type(&self) -> PropertyType {
        match self {
            Self::Null => PropertyType::Null,
            Self::Integer16(_) => PropertyType::Integer16,
            Self::Integer32(_) => PropertyType::Integer32,
            Self::Floating32(_) => PropertyType::Floating32,
            Self::Floating64(_) => PropertyType::Floating64,
            Self::Currency(_) => PropertyType::Currency,
            Self::FloatingTime(_) => PropertyType::FloatingTime,
            Self::ErrorCode(_) => PropertyType::ErrorCode,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Integer64(_) => PropertyType::Integer64,
            Self::String8(_) => PropertyType::String8,
            Self::Unicode(_) => PropertyType::Unicode,
            Self::Time(_) => PropertyType::Time,
            Self::Guid(_) => PropertyType::Guid,
            Self::Binary(_) => PropertyType::Binary,
            Self::Object(_) => PropertyType::Object,
            Self::MultipleInteger16(_) => PropertyType::MultipleInteger16,
            Self::MultipleInteger32(_) => PropertyType::MultipleInteger32,
            Self::MultipleFloating32(_) => PropertyType::MultipleFloating32,
            Self::MultipleFloating64(_) => PropertyType::MultipleFloating64,
            Self::MultipleCurrency(_) => PropertyType::MultipleCurrency,
            Self::MultipleFloatingTime(_) => PropertyType::MultipleFloatingTime,
            Self::MultipleInteger64(_) => PropertyType::MultipleInteger64,
            Self::MultipleString8(_) => PropertyType::MultipleString8,
            Self::MultipleUnicode(_) => PropertyType::MultipleUnicode,
            Self::MultipleTime(_) => PropertyType::MultipleTime,
            Self::MultipleGuid(_) => PropertyType::MultipleGuid,
            Self::MultipleBinary(_) => PropertyType::MultipleBinary,
        }
    }

    /// Detach the value from the file buffer.
    pub fn into_owned(self) -> PropertyValue<'static> {
        fn owned(value: Cow<'_, [u8]>) -> Cow<'static, [u8]> {
            Cow::Owned(value.into_owned())
        }

        fn all_owned(values: Vec<Cow<'_, [u8]>>) -> Vec<Cow<'static, [u8]>> {
            values.into_iter().map(owned).collect()
        }

        match self {
            Self::Null => PropertyValue::Null,
            Self::Integer16(value) => PropertyValue::Integer16(value),
            Self::Integer32(value) => PropertyValue::Integer32(value),
            Self::Floating32(value) => PropertyValue::Floating32(value),
            Self::Floating64(value) => PropertyValue::Floating64(value),
            Self::Currency(value) => PropertyValue::Currency(value),
            Self::FloatingTime(value) => PropertyValue::FloatingTime(value),
            Self::ErrorCode(value) => PropertyValue::ErrorCode(value),
            Self::Boolean(value) => PropertyValue::Boolean(value),
            Self::Integer64(value) => PropertyValue::Integer64(value),
            Self::String8(value) => PropertyValue::String8(owned(value)),
            Self::Unicode(value) => PropertyValue::Unicode(owned(value)),
            Self::Time(value) => PropertyValue::Time(value),
            Self::Guid(value) => PropertyValue::Guid(value),
            Self::Binary(value) => PropertyValue::Binary(owned(value)),
            Self::Object(value) => PropertyValue::Object(value),
            Self::MultipleInteger16(values) => PropertyValue::MultipleInteger16(values),
            Self::MultipleInteger32(values) => PropertyValue::MultipleInteger32(values),
            Self::MultipleFloating32(values) => PropertyValue::MultipleFloating32(values),
            Self::MultipleFloating64(values) => PropertyValue::MultipleFloating64(values),
            Self::MultipleCurrency(values) => PropertyValue::MultipleCurrency(values),
            Self::MultipleFloatingTime(values) => PropertyValue::MultipleFloatingTime(values),
            Self::MultipleInteger64(values) => PropertyValue::MultipleInteger64(values),
            Self::MultipleString8(values) => PropertyValue::MultipleString8(all_owned(values)),
            Self::MultipleUnicode(values) => PropertyValue::MultipleUnicode(all_owned(values)),
            Self::MultipleTime(values) => PropertyValue::MultipleTime(values),
            Self::MultipleGuid(values) => PropertyValue::MultipleGuid(values),
            Self::MultipleBinary(values) => PropertyValue::MultipleBinary(all_owned(values)),
        }
    }

    /// `Integer16` and `Integer32` values, widened.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer16(value) => Some(i32::from(*value)),
            Self::Integer32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Raw bytes of `Binary`, `String8` and `Unicode` values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(value) | Self::String8(value) | Self::Unicode(value) => Some(value),
            _ => None,
        }
    }
}

/// Decode UTF-16LE text, dropping any trailing NUL characters. The bytes are reassembled
/// pairwise, so the buffer does not need 2-byte alignment.
pub fn decode_unicode(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(LittleEndian::read_u16)
        .collect();
    let text = String::from_utf16_lossy(&units);
    text.trim_end_matches('\0').to_string()
}

fn packed<T>(data: &[u8], size: usize, read: fn(&[u8]) -> T) -> LtpResult<Vec<T>> {
    if data.len() % size != 0 {
        return Err(LtpError::InvalidMultiValuePropertyCount(data.len()));
    }
    Ok(data.chunks_exact(size).map(read).collect())
}

fn sub_range<'a>(data: &Cow<'a, [u8]>, range: Range<usize>) -> Cow<'a, [u8]> {
    match *data {
        Cow::Borrowed(data) => Cow::Borrowed(&data[range]),
        Cow::Owned(ref data) => Cow::Owned(data[range].to_vec()),
    }
}

/// `ulCount`, `rgulDataOffsets[ulCount]`, then the items back to back.
fn variable_items(data: Cow<'_, [u8]>) -> LtpResult<Vec<Cow<'_, [u8]>>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 4 {
        return Err(LtpError::InvalidMultiValuePropertyCount(data.len()));
    }

    let count = LittleEndian::read_u32(&data[..4]) as usize;
    let header_size = count
        .checked_add(1)
        .and_then(|count| count.checked_mul(4))
        .filter(|&size| size <= data.len())
        .ok_or(LtpError::InvalidMultiValuePropertyCount(count))?;

    let offsets: Vec<usize> = data[4..header_size]
        .chunks_exact(4)
        .map(|offset| LittleEndian::read_u32(offset) as usize)
        .collect();

    let mut items = Vec::with_capacity(count);
    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        if start < header_size || start > data.len() {
            return Err(LtpError::InvalidMultiValuePropertyOffset(start));
        }
        if end < start || end > data.len() {
            return Err(LtpError::InvalidMultiValuePropertyOffset(end));
        }
        items.push(sub_range(&data, start..end));
    }
    Ok(items)
}

/// Resolve a `dwValueHnid` or TC cell HNID: zero is empty, a HID is a heap allocation, and
/// anything else names a sub-node whose data is the value.
pub(crate) fn read_hnid<'s, 'a: 's>(
    heap: &'s HeapNode<'a>,
    sub_nodes: &SubNodeTree<'a>,
    hnid: u32,
) -> LtpResult<Cow<'s, [u8]>> {
    if hnid == 0 {
        return Ok(Cow::Borrowed(&[]));
    }

    // nidType HID
    if hnid & 0x1F == 0 {
        return Ok(Cow::Borrowed(heap.find_entry(HeapId::from(hnid))?));
    }

    Ok(sub_nodes.node(NodeId::from(hnid))?.into_data())
}

/// [PC BTH Record](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/7daab6f5-ce65-437e-80d5-1b1be4088bd3)
///
/// `wPropType` is kept raw so that an unknown type only fails when its value is decoded.
#[derive(Clone, Copy, Debug)]
pub struct PropertyTreeRecord {
    prop_id: u16,
    prop_type: u16,
    value: u32,
}

impl PropertyTreeRecord {
    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    pub fn prop_type(&self) -> LtpResult<PropertyType> {
        PropertyType::try_from(self.prop_type)
    }

    // dwValueHnid
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// One decoded property with its display names.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord<'a> {
    pub tag: u16,
    pub tag_hex: String,
    pub tag_name: Option<&'static str>,
    pub value: PropertyValue<'a>,
}

impl<'a> PropertyRecord<'a> {
    pub fn new(tag: u16, value: PropertyValue<'a>) -> Self {
        Self {
            tag,
            tag_hex: tags::tag_hex(tag),
            tag_name: tags::tag_name(tag),
            value,
        }
    }

    /// Detach the value from the file buffer.
    pub fn into_owned(self) -> PropertyRecord<'static> {
        PropertyRecord {
            tag: self.tag,
            tag_hex: self.tag_hex,
            tag_name: self.tag_name,
            value: self.value.into_owned(),
        }
    }

    /// The map key for this property: its name when known, otherwise its hex tag.
    pub fn key(&self) -> String {
        self.tag_name
            .map(str::to_string)
            .unwrap_or_else(|| self.tag_hex.clone())
    }
}

/// A node's property bag.
#[derive(Clone, Debug)]
pub struct PropertyContext<'a> {
    heap: HeapNode<'a>,
    sub_nodes: SubNodeTree<'a>,
    records: Vec<PropertyTreeRecord>,
}

impl<'a> PropertyContext<'a> {
    pub fn read(node: Node<'a>) -> LtpResult<Self> {
        let id = node.id();
        let (blocks, sub_nodes) = node.into_parts();
        let context = Self::new(blocks, sub_nodes)?;
        debug!(node = u32::from(id), properties = context.records.len(), "read property context");
        Ok(context)
    }

    pub fn new(blocks: Vec<Cow<'a, [u8]>>, sub_nodes: SubNodeTree<'a>) -> LtpResult<Self> {
        let heap = HeapNode::read(blocks)?;
        heap.expect_client_signature(HeapNodeType::Properties)?;

        let tree = HeapTree::new(&heap, heap.header().user_root())?;
        let header = tree.header();
        if header.key_size() != 2 {
            return Err(LtpError::InvalidHeapTreeKeySize(header.key_size()));
        }
        if header.entry_size() != 6 {
            return Err(LtpError::InvalidHeapTreeEntrySize(header.entry_size()));
        }

        let records = tree
            .entries()?
            .into_iter()
            .map(|entry| PropertyTreeRecord {
                prop_id: LittleEndian::read_u16(entry.key()),
                prop_type: LittleEndian::read_u16(&entry.data()[..2]),
                value: LittleEndian::read_u32(&entry.data()[2..6]),
            })
            .collect();

        Ok(Self {
            heap,
            sub_nodes,
            records,
        })
    }

    pub fn sub_nodes(&self) -> &SubNodeTree<'a> {
        &self.sub_nodes
    }

    pub fn records(&self) -> &[PropertyTreeRecord] {
        &self.records
    }

    /// Property tags in heap order.
    pub fn keys(&self) -> Vec<u16> {
        self.records.iter().map(|record| record.prop_id).collect()
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.records.iter().any(|record| record.prop_id == tag)
    }

    pub fn get_value(&self, tag: u16) -> LtpResult<Option<PropertyValue<'_>>> {
        self.records
            .iter()
            .find(|record| record.prop_id == tag)
            .map(|record| self.read_value(record))
            .transpose()
    }

    pub fn read_value(&self, record: &PropertyTreeRecord) -> LtpResult<PropertyValue<'_>> {
        let prop_type = record.prop_type()?;
        if prop_type.is_inline() {
            return PropertyValue::read_fixed(prop_type, &record.value.to_le_bytes());
        }

        let data = read_hnid(&self.heap, &self.sub_nodes, record.value)?;
        PropertyValue::read(prop_type, data)
    }

    /// Every property in heap order.
    pub fn all_properties(&self) -> LtpResult<Vec<PropertyRecord<'_>>> {
        self.records
            .iter()
            .map(|record| -> LtpResult<_> {
                Ok(PropertyRecord::new(record.prop_id, self.read_value(record)?))
            })
            .collect()
    }
}
