//! ## [Table Context (TC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5e48be0d-a75a-4918-a277-50408ff96740)

use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;
use tracing::debug;

use super::{heap::*, prop_context::*, prop_type::*, tags, *};
use crate::ndb::{
    node::{Node, SubNodeTree},
    node_id::NodeId,
};

pub const LTP_ROW_ID_PROP_ID: u16 = tags::PID_TAG_LTP_ROW_ID;
pub const LTP_ROW_VERSION_PROP_ID: u16 = tags::PID_TAG_LTP_ROW_VER;

pub const fn existence_bitmap_size(column_count: usize) -> usize {
    column_count / 8 + if column_count % 8 == 0 { 0 } else { 1 }
}

/// Test bit `iBit` of a row's CEB, most significant bit first.
pub fn check_existence_bitmap(bit: u8, existence_bitmap: &[u8]) -> bool {
    let bit = usize::from(bit);
    existence_bitmap
        .get(bit / 8)
        .is_some_and(|byte| byte & (1_u8 << (7 - (bit % 8))) != 0)
}

/// [TCOLDESC](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3a2f63cf-bb40-4559-910c-e55ec43d9cbb)
#[derive(Clone, Copy, Debug)]
pub struct TableColumnDescriptor {
    prop_type: u16,
    prop_id: u16,
    offset: u16,
    size: u8,
    existence_bitmap_index: u8,
}

impl TableColumnDescriptor {
    const SIZE: usize = 8;

    fn read(data: &[u8]) -> Self {
        Self {
            prop_type: LittleEndian::read_u16(&data[..2]),
            prop_id: LittleEndian::read_u16(&data[2..4]),
            offset: LittleEndian::read_u16(&data[4..6]),
            size: data[6],
            existence_bitmap_index: data[7],
        }
    }

    /// An unknown `wPropType` fails when a cell of this column is decoded.
    pub fn prop_type(&self) -> LtpResult<PropertyType> {
        PropertyType::try_from(self.prop_type)
    }

    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    // ibData
    pub fn offset(&self) -> u16 {
        self.offset
    }

    // cbData
    pub fn size(&self) -> u8 {
        self.size
    }

    // iBit
    pub fn existence_bitmap_index(&self) -> u8 {
        self.existence_bitmap_index
    }
}

/// [TCINFO](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/45b3a0c5-d6d6-4e02-aebf-13766ff693f0)
#[derive(Clone, Default, Debug)]
pub struct TableContextInfo {
    end_4byte_values: u16,
    end_2byte_values: u16,
    end_1byte_values: u16,
    end_existence_bitmap: u16,
    row_index: HeapId,
    rows: u32,
    columns: Vec<TableColumnDescriptor>,
}

impl TableContextInfo {
    const HEADER_SIZE: usize = 22;

    pub fn read(data: &[u8]) -> LtpResult<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(LtpError::TableInfoTooSmall(data.len()));
        }

        // bType
        if data[0] != HeapNodeType::Table as u8 {
            return Err(LtpError::InvalidTableSignature(data[0]));
        }

        // cCols
        let column_count = usize::from(data[1]);
        let end = Self::HEADER_SIZE + column_count * TableColumnDescriptor::SIZE;
        let columns = data
            .get(Self::HEADER_SIZE..end)
            .ok_or(LtpError::TableInfoTooSmall(data.len()))?
            .chunks_exact(TableColumnDescriptor::SIZE)
            .map(TableColumnDescriptor::read)
            .collect();

        // hidIndex at 18 is deprecated
        let info = Self {
            end_4byte_values: LittleEndian::read_u16(&data[2..4]),
            end_2byte_values: LittleEndian::read_u16(&data[4..6]),
            end_1byte_values: LittleEndian::read_u16(&data[6..8]),
            end_existence_bitmap: LittleEndian::read_u16(&data[8..10]),
            row_index: HeapId::from(LittleEndian::read_u32(&data[10..14])),
            rows: LittleEndian::read_u32(&data[14..18]),
            columns,
        };
        info.validate()?;
        Ok(info)
    }

    fn validate(&self) -> LtpResult<()> {
        let row_size = self.end_existence_bitmap;
        for column in self.columns.iter() {
            let end = u32::from(column.offset) + u32::from(column.size);
            let bitmap_byte =
                u32::from(self.end_1byte_values) + u32::from(column.existence_bitmap_index / 8);
            if end > u32::from(row_size) || bitmap_byte >= u32::from(row_size) {
                return Err(LtpError::InvalidTableColumn(column.prop_id));
            }
        }
        Ok(())
    }

    pub fn end_4byte_values(&self) -> u16 {
        self.end_4byte_values
    }

    pub fn end_2byte_values(&self) -> u16 {
        self.end_2byte_values
    }

    pub fn end_1byte_values(&self) -> u16 {
        self.end_1byte_values
    }

    /// `rgib[TCI_bm]`, which is also the size of a row.
    pub fn end_existence_bitmap(&self) -> u16 {
        self.end_existence_bitmap
    }

    // hidRowIndex
    pub fn row_index(&self) -> HeapId {
        self.row_index
    }

    // hnidRows
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> &[TableColumnDescriptor] {
        &self.columns
    }
}

fn row_at(data: &[u8], index: usize, row_size: usize) -> Option<&[u8]> {
    data.get(index * row_size..(index + 1) * row_size)
}

/// Where the row matrix lives.
#[derive(Clone, Debug)]
enum RowMatrix<'a> {
    Empty,
    Heap(HeapId),
    Node(Vec<Cow<'a, [u8]>>),
}

/// A node's row table.
#[derive(Clone, Debug)]
pub struct TableContext<'a> {
    heap: HeapNode<'a>,
    sub_nodes: SubNodeTree<'a>,
    info: TableContextInfo,
    rows: RowMatrix<'a>,
    record_count: usize,
}

impl<'a> TableContext<'a> {
    pub fn read(node: Node<'a>) -> LtpResult<Self> {
        let id = node.id();
        let (blocks, sub_nodes) = node.into_parts();
        let context = Self::new(blocks, sub_nodes)?;
        debug!(
            node = u32::from(id),
            columns = context.info.columns.len(),
            rows = context.record_count,
            "read table context"
        );
        Ok(context)
    }

    pub fn new(blocks: Vec<Cow<'a, [u8]>>, sub_nodes: SubNodeTree<'a>) -> LtpResult<Self> {
        let heap = HeapNode::read(blocks)?;
        heap.expect_client_signature(HeapNodeType::Table)?;

        let info = TableContextInfo::read(heap.find_entry(heap.header().user_root())?)?;
        let row_size = usize::from(info.end_existence_bitmap());

        let rows = match info.rows() {
            0 => RowMatrix::Empty,
            hnid if hnid & 0x1F == 0 => RowMatrix::Heap(HeapId::from(hnid)),
            nid => RowMatrix::Node(sub_nodes.node(NodeId::from(nid))?.into_parts().0),
        };

        let record_count = match &rows {
            RowMatrix::Empty => 0,
            _ if row_size == 0 => {
                return Err(LtpError::InvalidTableRowSize(info.end_existence_bitmap()))
            }
            RowMatrix::Heap(heap_id) => heap.find_entry(*heap_id)?.len() / row_size,
            RowMatrix::Node(blocks) => blocks.iter().map(|block| block.len() / row_size).sum(),
        };

        Ok(Self {
            heap,
            sub_nodes,
            info,
            rows,
            record_count,
        })
    }

    pub fn info(&self) -> &TableContextInfo {
        &self.info
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// The raw bytes of row `index`.
    pub fn row(&self, index: usize) -> LtpResult<&[u8]> {
        let out_of_range = LtpError::RowIndexOutOfRange {
            index,
            count: self.record_count,
        };
        if index >= self.record_count {
            return Err(out_of_range);
        }

        let row_size = usize::from(self.info.end_existence_bitmap());
        match &self.rows {
            RowMatrix::Empty => Err(out_of_range),
            RowMatrix::Heap(heap_id) => {
                row_at(self.heap.find_entry(*heap_id)?, index, row_size).ok_or(out_of_range)
            }
            RowMatrix::Node(blocks) => {
                // Rows never straddle data blocks.
                let mut index = index;
                for block in blocks.iter() {
                    let count = block.len() / row_size;
                    if index < count {
                        return row_at(block, index, row_size).ok_or(out_of_range);
                    }
                    index -= count;
                }
                Err(out_of_range)
            }
        }
    }

    /// The decoded cell for column `tag` in row `index`, or `None` if the table has no such
    /// column or the row's existence bit for it is clear.
    pub fn cell_value(&self, index: usize, tag: u16) -> LtpResult<Option<PropertyValue<'_>>> {
        let row = self.row(index)?;
        let Some(column) = self
            .info
            .columns()
            .iter()
            .find(|column| column.prop_id() == tag)
        else {
            return Ok(None);
        };
        self.read_cell(row, column)
    }

    /// Every present cell of row `index`, in column order.
    pub fn all_row_properties(&self, index: usize) -> LtpResult<Vec<PropertyRecord<'_>>> {
        let row = self.row(index)?;
        let mut records = Vec::new();
        for column in self.info.columns() {
            if let Some(value) = self.read_cell(row, column)? {
                records.push(PropertyRecord::new(column.prop_id(), value));
            }
        }
        Ok(records)
    }

    fn read_cell<'s>(
        &'s self,
        row: &'s [u8],
        column: &TableColumnDescriptor,
    ) -> LtpResult<Option<PropertyValue<'s>>> {
        let bitmap = &row[usize::from(self.info.end_1byte_values())..];
        if !check_existence_bitmap(column.existence_bitmap_index(), bitmap) {
            return Ok(None);
        }

        let start = usize::from(column.offset());
        let cell = &row[start..start + usize::from(column.size())];
        let prop_type = column.prop_type()?;

        match prop_type.fixed_size() {
            Some(size) if size <= 8 => PropertyValue::read_fixed(prop_type, cell).map(Some),
            _ => {
                if cell.len() < 4 {
                    return Err(LtpError::PropertyValueTooShort {
                        prop_type,
                        size: cell.len(),
                    });
                }
                let hnid = LittleEndian::read_u32(cell);
                let data = read_hnid(&self.heap, &self.sub_nodes, hnid)?;
                PropertyValue::read(prop_type, data).map(Some)
            }
        }
    }
}
