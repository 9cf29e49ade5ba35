//! ## [BTree-on-Heap (BTH)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/2dd1a95a-c8b1-4ac5-87d1-10cb8de64053)

use byteorder::{ByteOrder, LittleEndian};

use super::{heap::*, *};

/// [BTHHEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
#[derive(Clone, Copy, Debug)]
pub struct HeapTreeHeader {
    key_size: u8,
    entry_size: u8,
    levels: u8,
    root: HeapId,
}

impl HeapTreeHeader {
    const SIZE: usize = 8;

    pub fn new(key_size: u8, entry_size: u8, levels: u8, root: HeapId) -> LtpResult<Self> {
        match key_size {
            2 | 4 | 8 | 16 => {}
            invalid => {
                return Err(LtpError::InvalidHeapTreeKeySize(invalid));
            }
        }

        match entry_size {
            1..=32 => {}
            invalid => {
                return Err(LtpError::InvalidHeapTreeEntrySize(invalid));
            }
        }

        Ok(Self {
            key_size,
            entry_size,
            levels,
            root,
        })
    }

    pub fn read(data: &[u8]) -> LtpResult<Self> {
        if data.len() < Self::SIZE {
            return Err(LtpError::InvalidHeapTreeRecordSize {
                size: data.len(),
                record: Self::SIZE,
            });
        }

        // bType
        if data[0] != HeapNodeType::Tree as u8 {
            return Err(LtpError::InvalidHeapTreeSignature(data[0]));
        }

        Self::new(
            data[1],
            data[2],
            data[3],
            HeapId::from(LittleEndian::read_u32(&data[4..8])),
        )
    }

    // cbKey
    pub fn key_size(&self) -> u8 {
        self.key_size
    }

    // cbEnt
    pub fn entry_size(&self) -> u8 {
        self.entry_size
    }

    // bIdxLevels
    pub fn levels(&self) -> u8 {
        self.levels
    }

    // hidRoot
    pub fn root(&self) -> HeapId {
        self.root
    }
}

/// [Leaf BTH (Data) Record](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/660db569-c8f7-4516-82ad-44709b1c667f)
/// borrowed from its heap allocation.
#[derive(Clone, Copy, Debug)]
pub struct HeapTreeEntry<'h> {
    key: &'h [u8],
    data: &'h [u8],
}

impl<'h> HeapTreeEntry<'h> {
    pub fn key(&self) -> &'h [u8] {
        self.key
    }

    pub fn data(&self) -> &'h [u8] {
        self.data
    }
}

/// A BTH rooted in a [HeapNode].
#[derive(Clone, Copy, Debug)]
pub struct HeapTree<'h, 'a> {
    heap: &'h HeapNode<'a>,
    header: HeapTreeHeader,
}

impl<'h, 'a> HeapTree<'h, 'a> {
    pub fn new(heap: &'h HeapNode<'a>, header: HeapId) -> LtpResult<Self> {
        let header = HeapTreeHeader::read(heap.find_entry(header)?)?;
        Ok(Self { heap, header })
    }

    pub fn header(&self) -> &HeapTreeHeader {
        &self.header
    }

    /// Every leaf record in heap order.
    pub fn entries(&self) -> LtpResult<Vec<HeapTreeEntry<'h>>> {
        let mut entries = Vec::new();
        if !self.header.root().is_empty() {
            self.collect(self.header.root(), self.header.levels(), &mut entries)?;
        }
        Ok(entries)
    }

    fn collect(
        &self,
        heap_id: HeapId,
        level: u8,
        entries: &mut Vec<HeapTreeEntry<'h>>,
    ) -> LtpResult<()> {
        let key_size = usize::from(self.header.key_size());
        let data = self.heap.find_entry(heap_id)?;

        let record = if level == 0 {
            key_size + usize::from(self.header.entry_size())
        } else {
            key_size + 4
        };
        if data.len() % record != 0 {
            return Err(LtpError::InvalidHeapTreeRecordSize {
                size: data.len(),
                record,
            });
        }

        for chunk in data.chunks_exact(record) {
            let (key, value) = chunk.split_at(key_size);
            if level == 0 {
                entries.push(HeapTreeEntry { key, data: value });
            } else {
                let next_level = HeapId::from(LittleEndian::read_u32(value));
                self.collect(next_level, level - 1, entries)?;
            }
        }
        Ok(())
    }
}
