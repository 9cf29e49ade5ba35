//! [Pages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5774b4f2-cdc4-453e-996a-8c8230116930)

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::{block_id::*, block_ref::*, node_id::*, *};

pub const PAGE_SIZE: usize = 512;

const PAGE_TRAILER_OFFSET: usize = 496;
const BTREE_HEADER_OFFSET: usize = 488;

/// `ptype`
///
/// ### See also
/// [PageTrailer]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PageType {
    /// `ptypeBBT`: Block BTree page
    BlockBTree = 0x80,
    /// `ptypeNBT`: Node BTree page
    NodeBTree = 0x81,
    /// `ptypeFMap`: Free Map page
    FreeMap = 0x82,
    /// `ptypePMap`: Allocation Page Map page
    AllocationPageMap = 0x83,
    /// `ptypeAMap`: Allocation Map page
    AllocationMap = 0x84,
    /// `ptypeFPMap`: Free Page Map page
    FreePageMap = 0x85,
    /// `ptypeDL`: Density List page
    DensityList = 0x86,
}

impl TryFrom<u8> for PageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(PageType::BlockBTree),
            0x81 => Ok(PageType::NodeBTree),
            0x82 => Ok(PageType::FreeMap),
            0x83 => Ok(PageType::AllocationPageMap),
            0x84 => Ok(PageType::AllocationMap),
            0x85 => Ok(PageType::FreePageMap),
            0x86 => Ok(PageType::DensityList),
            _ => Err(value),
        }
    }
}

/// [PAGETRAILER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/f4ccb38a-930a-4db4-98df-a69c195926ba)
///
/// `ptypeRepeat`, `wSig` and `dwCRC` are exposed but never verified.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PageTrailer {
    page_type: u8,
    page_type_repeat: u8,
    signature: u16,
    crc: u32,
    block_id: BlockId,
}

impl PageTrailer {
    /// Decode the trailer in the last 16 bytes of a 512-byte page window.
    pub fn read(window: &[u8]) -> NdbResult<Self> {
        if window.len() != PAGE_SIZE {
            return Err(NdbError::InvalidPageSize(window.len()));
        }

        let trailer = &window[PAGE_TRAILER_OFFSET..];
        Ok(Self {
            page_type: trailer[0],
            page_type_repeat: trailer[1],
            signature: LittleEndian::read_u16(&trailer[2..4]),
            crc: LittleEndian::read_u32(&trailer[4..8]),
            block_id: BlockId::read(&trailer[8..16]),
        })
    }

    /// Raw `ptype`, which may not name a known [PageType].
    pub fn page_type(&self) -> u8 {
        self.page_type
    }

    pub fn page_type_repeat(&self) -> u8 {
        self.page_type_repeat
    }

    pub fn signature(&self) -> u16 {
        self.signature
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

/// Bound a single page window at `offset` in `file`.
fn page_window(file: &[u8], offset: u64) -> NdbResult<&[u8]> {
    let start = usize::try_from(offset).map_err(|_| NdbError::PageOutOfBounds(offset))?;
    let end = start
        .checked_add(PAGE_SIZE)
        .ok_or(NdbError::PageOutOfBounds(offset))?;
    file.get(start..end).ok_or(NdbError::PageOutOfBounds(offset))
}

/// A page this reader recognizes but does not interpret beyond its trailer.
#[derive(Clone, Copy, Debug)]
pub struct RawPage<'a> {
    window: &'a [u8],
    trailer: PageTrailer,
}

impl<'a> RawPage<'a> {
    pub fn window(&self) -> &'a [u8] {
        self.window
    }

    pub fn trailer(&self) -> &PageTrailer {
        &self.trailer
    }
}

/// Any 512-byte page, dispatched once by `ptype`.
#[derive(Clone, Copy, Debug)]
pub enum Page<'a> {
    BTree(BTreePage<'a>),
    FreeMap(RawPage<'a>),
    AllocationPageMap(RawPage<'a>),
    AllocationMap(RawPage<'a>),
    FreePageMap(RawPage<'a>),
    DensityList(RawPage<'a>),
    Unknown(RawPage<'a>),
}

impl<'a> Page<'a> {
    /// Read the page at `offset`. The window is always exactly [PAGE_SIZE] bytes.
    pub fn read(file: &'a [u8], offset: u64) -> NdbResult<Self> {
        let window = page_window(file, offset)?;
        let trailer = PageTrailer::read(window)?;
        let raw = RawPage { window, trailer };

        Ok(match PageType::try_from(trailer.page_type()) {
            Ok(PageType::BlockBTree | PageType::NodeBTree) => {
                Self::BTree(BTreePage::new(file, window, trailer)?)
            }
            Ok(PageType::FreeMap) => Self::FreeMap(raw),
            Ok(PageType::AllocationPageMap) => Self::AllocationPageMap(raw),
            Ok(PageType::AllocationMap) => Self::AllocationMap(raw),
            Ok(PageType::FreePageMap) => Self::FreePageMap(raw),
            Ok(PageType::DensityList) => Self::DensityList(raw),
            Err(_) => Self::Unknown(raw),
        })
    }

    pub fn trailer(&self) -> &PageTrailer {
        match self {
            Self::BTree(page) => page.trailer(),
            Self::FreeMap(page)
            | Self::AllocationPageMap(page)
            | Self::AllocationMap(page)
            | Self::FreePageMap(page)
            | Self::DensityList(page)
            | Self::Unknown(page) => page.trailer(),
        }
    }
}

/// [BTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/bc8052a3-f300-4022-be31-f0f408fffca0)
#[derive(Clone, Copy, Debug)]
pub struct BTreePageEntry<'a>(&'a [u8]);

impl<'a> BTreePageEntry<'a> {
    pub const SIZE: usize = 24;

    pub fn new(entry: &'a [u8]) -> NdbResult<Self> {
        check_entry_size(entry, Self::SIZE)?;
        Ok(Self(entry))
    }

    // btkey
    pub fn key(&self) -> u64 {
        LittleEndian::read_u64(&self.0[..8])
    }

    // BREF
    pub fn block(&self) -> BlockRef {
        BlockRef::read(&self.0[8..24])
    }
}

/// [BBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, Debug)]
pub struct BlockBTreeEntry<'a>(&'a [u8]);

impl<'a> BlockBTreeEntry<'a> {
    pub const SIZE: usize = 24;

    pub fn new(entry: &'a [u8]) -> NdbResult<Self> {
        check_entry_size(entry, Self::SIZE)?;
        Ok(Self(entry))
    }

    pub fn block(&self) -> BlockRef {
        BlockRef::read(&self.0[..16])
    }

    // cb
    pub fn size(&self) -> u16 {
        LittleEndian::read_u16(&self.0[16..18])
    }

    // cRef
    pub fn ref_count(&self) -> u16 {
        LittleEndian::read_u16(&self.0[18..20])
    }

    pub fn key(&self) -> u64 {
        self.block().block().search_key()
    }
}

/// [NBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, Debug)]
pub struct NodeBTreeEntry<'a>(&'a [u8]);

impl<'a> NodeBTreeEntry<'a> {
    pub const SIZE: usize = 32;

    pub fn new(entry: &'a [u8]) -> NdbResult<Self> {
        check_entry_size(entry, Self::SIZE)?;
        Ok(Self(entry))
    }

    /// The on-disk `nid` is 8 bytes wide; only the low 32 bits carry the NID.
    pub fn node(&self) -> NodeId {
        NodeId::read(&self.0[..4])
    }

    pub fn data(&self) -> BlockId {
        BlockId::read(&self.0[8..16])
    }

    /// `bidSub`, or `None` when the node has no sub-node tree.
    pub fn sub_node(&self) -> Option<BlockId> {
        let block = BlockId::read(&self.0[16..24]);
        (u64::from(block) != 0).then_some(block)
    }

    pub fn parent(&self) -> Option<NodeId> {
        let parent = NodeId::read(&self.0[24..28]);
        (u32::from(parent) != 0).then_some(parent)
    }

    pub fn key(&self) -> u64 {
        LittleEndian::read_u64(&self.0[..8])
    }
}

fn check_entry_size(entry: &[u8], size: usize) -> NdbResult<()> {
    if entry.len() < size {
        return Err(NdbError::InvalidBTreeEntrySize(
            u8::try_from(entry.len()).unwrap_or(u8::MAX),
        ));
    }
    Ok(())
}

/// One decoded slot of a [BTreePage].
#[derive(Clone, Copy, Debug)]
pub enum BTreeEntry<'a> {
    Branch(BTreePageEntry<'a>),
    Block(BlockBTreeEntry<'a>),
    Node(NodeBTreeEntry<'a>),
}

impl BTreeEntry<'_> {
    pub fn key(&self) -> u64 {
        match self {
            Self::Branch(entry) => entry.key(),
            Self::Block(entry) => entry.key(),
            Self::Node(entry) => entry.key(),
        }
    }
}

/// [BTPAGE](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4f0cd8e7-c2d0-4975-90a4-d417cfca77f8)
#[derive(Clone, Copy, Debug)]
pub struct BTreePage<'a> {
    file: &'a [u8],
    window: &'a [u8],
    trailer: PageTrailer,
    entry_count: u8,
    max_entries: u8,
    entry_size: u8,
    level: u8,
    padding: u32,
}

impl<'a> BTreePage<'a> {
    /// Interpret the page at `offset` as a BTPAGE regardless of its `ptype`.
    pub fn read(file: &'a [u8], offset: u64) -> NdbResult<Self> {
        let window = page_window(file, offset)?;
        let trailer = PageTrailer::read(window)?;
        Self::new(file, window, trailer)
    }

    fn new(file: &'a [u8], window: &'a [u8], trailer: PageTrailer) -> NdbResult<Self> {
        let header = &window[BTREE_HEADER_OFFSET..PAGE_TRAILER_OFFSET];
        let entry_count = header[0];
        let max_entries = header[1];
        let entry_size = header[2];
        let level = header[3];
        let padding = LittleEndian::read_u32(&header[4..8]);

        if usize::from(entry_count) * usize::from(entry_size) > BTREE_HEADER_OFFSET {
            return Err(NdbError::InvalidBTreeEntryCount(entry_count));
        }

        Ok(Self {
            file,
            window,
            trailer,
            entry_count,
            max_entries,
            entry_size,
            level,
            padding,
        })
    }

    pub fn trailer(&self) -> &PageTrailer {
        &self.trailer
    }

    // cEnt
    pub fn entry_count(&self) -> usize {
        usize::from(self.entry_count)
    }

    // cEntMax
    pub fn max_entries(&self) -> u8 {
        self.max_entries
    }

    // cbEnt
    pub fn entry_size(&self) -> u8 {
        self.entry_size
    }

    // cLevel
    pub fn level(&self) -> u8 {
        self.level
    }

    // dwPadding
    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }

    pub fn entry_at(&self, index: usize) -> NdbResult<BTreeEntry<'a>> {
        let count = self.entry_count();
        if index >= count {
            return Err(NdbError::BTreeEntryIndexOutOfRange { index, count });
        }

        let size = usize::from(self.entry_size);
        let entry = &self.window[index * size..(index + 1) * size];

        if self.level > 0 {
            return Ok(BTreeEntry::Branch(BTreePageEntry::new(entry)?));
        }

        match PageType::try_from(self.trailer.page_type()) {
            Ok(PageType::BlockBTree) => Ok(BTreeEntry::Block(BlockBTreeEntry::new(entry)?)),
            Ok(PageType::NodeBTree) => Ok(BTreeEntry::Node(NodeBTreeEntry::new(entry)?)),
            _ => Err(NdbError::InvalidBTreeLeafPageType(self.trailer.page_type())),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = NdbResult<BTreeEntry<'a>>> + '_ {
        (0..self.entry_count()).map(|index| self.entry_at(index))
    }

    pub fn keys(&self) -> NdbResult<Vec<u64>> {
        self.entries().map(|entry| entry.map(|e| e.key())).collect()
    }

    /// Load the child page referenced by the branch entry at `index`.
    pub fn child(&self, index: usize) -> NdbResult<BTreePage<'a>> {
        let BTreeEntry::Branch(entry) = self.entry_at(index)? else {
            return Err(NdbError::ExpectedBranchEntry(self.level));
        };

        let offset = entry.block().index().index();
        let child = match Page::read(self.file, offset)? {
            Page::BTree(child) => child,
            other => return Err(NdbError::ExpectedBTreePage(other.trailer().page_type())),
        };

        let expected = self.level.saturating_sub(1);
        if child.level != expected {
            return Err(NdbError::InvalidBTreeChildLevel {
                expected,
                found: child.level,
            });
        }

        Ok(child)
    }

    /// Find the leaf entry whose key equals `key`, descending from this page.
    pub fn find_entry(&self, key: u64) -> NdbResult<Option<BTreeEntry<'a>>> {
        let keys = self.keys()?;

        if self.is_leaf() {
            return keys
                .iter()
                .position(|&k| k == key)
                .map(|index| self.entry_at(index))
                .transpose();
        }

        let index = match keys.iter().position(|&k| k > key) {
            Some(0) => return Ok(None),
            Some(next) => next - 1,
            None if keys.is_empty() => return Ok(None),
            None => keys.len() - 1,
        };

        trace!(key, level = self.level, index, "descending BTPAGE");
        self.child(index)?.find_entry(key)
    }

    /// Every key in the subtree rooted at this page, in entry order.
    pub fn all_keys(&self) -> NdbResult<Vec<u64>> {
        if self.is_leaf() {
            return self.keys();
        }

        let mut keys = Vec::new();
        for index in 0..self.entry_count() {
            keys.extend(self.child(index)?.all_keys()?);
        }
        Ok(keys)
    }
}
