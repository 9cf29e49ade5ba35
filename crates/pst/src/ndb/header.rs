//! [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)
//! and [ROOT](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/32ce8c94-4757-46c8-a169-3fd21abee584)

use byteorder::{ByteOrder, LittleEndian};

use super::{block_id::*, block_ref::*, *};

/// `dwMagic`
///
/// ### See also
/// [Header]
const HEADER_MAGIC: u32 = u32::from_be_bytes(*b"NDB!");

const HEADER_MAGIC_CLIENT: u16 = u16::from_be_bytes(*b"MS");

/// Bytes of a Unicode HEADER that this reader consumes.
pub const HEADER_SIZE: usize = 564;

const ROOT_OFFSET: usize = 180;
const CRYPT_METHOD_OFFSET: usize = 513;

/// `wVer`
///
/// ### See also
/// [Header]
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum NdbVersion {
    Ansi = 15,
    #[default]
    Unicode = 23,
}

impl TryFrom<u16> for NdbVersion {
    type Error = NdbError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            14..=15 => Ok(NdbVersion::Ansi),
            23 => Ok(NdbVersion::Unicode),
            _ => Err(NdbError::InvalidNdbVersion(value)),
        }
    }
}

/// `bCryptMethod`
///
/// ### See also
/// [Header]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum NdbCryptMethod {
    /// `NDB_CRYPT_NONE`: Data blocks are not encoded
    #[default]
    None = 0x00,
    /// `NDB_CRYPT_PERMUTE`: Encoded with the [Permutation algorithm](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5faf4800-645d-49d1-9457-2ac40eb467bd)
    Permute = 0x01,
    /// `NDB_CRYPT_CYCLIC`: Encoded with the [Cyclic algorithm](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/9979fc01-0a3e-496f-900f-a6a867951f23)
    Cyclic = 0x02,
}

impl TryFrom<u8> for NdbCryptMethod {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(NdbCryptMethod::None),
            0x01 => Ok(NdbCryptMethod::Permute),
            0x02 => Ok(NdbCryptMethod::Cyclic),
            _ => Err(NdbError::InvalidNdbCryptMethod(value)),
        }
    }
}

/// `fAMapValid`
///
/// ### See also
/// [Root]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum AmapStatus {
    /// `INVALID_AMAP`: One or more AMaps in the PST are INVALID
    #[default]
    Invalid = 0x00,
    /// `VALID_AMAP1`: Deprecated. The AMaps are VALID.
    Valid1 = 0x01,
    /// `VALID_AMAP2`: The AMaps are VALID.
    Valid2 = 0x02,
}

impl TryFrom<u8> for AmapStatus {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(AmapStatus::Invalid),
            0x01 => Ok(AmapStatus::Valid1),
            0x02 => Ok(AmapStatus::Valid2),
            _ => Err(NdbError::InvalidAmapStatus(value)),
        }
    }
}

/// [ROOT](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/32ce8c94-4757-46c8-a169-3fd21abee584)
#[derive(Clone, Copy, Default, Debug)]
pub struct Root {
    file_eof_index: u64,
    amap_last_index: u64,
    amap_free_size: u64,
    pmap_free_size: u64,
    node_btree: BlockRef,
    block_btree: BlockRef,
    amap_is_valid: AmapStatus,
}

impl Root {
    fn read(buffer: &[u8]) -> NdbResult<Self> {
        Ok(Self {
            // dwReserved is skipped
            file_eof_index: LittleEndian::read_u64(&buffer[4..12]),
            amap_last_index: LittleEndian::read_u64(&buffer[12..20]),
            amap_free_size: LittleEndian::read_u64(&buffer[20..28]),
            pmap_free_size: LittleEndian::read_u64(&buffer[28..36]),
            node_btree: BlockRef::read(&buffer[36..52]),
            block_btree: BlockRef::read(&buffer[52..68]),
            amap_is_valid: AmapStatus::try_from(buffer[68])?,
        })
    }

    // ibFileEof
    pub fn file_eof_index(&self) -> u64 {
        self.file_eof_index
    }

    // ibAMapLast
    pub fn amap_last_index(&self) -> u64 {
        self.amap_last_index
    }

    // cbAMapFree
    pub fn amap_free_size(&self) -> u64 {
        self.amap_free_size
    }

    // cbPMapFree
    pub fn pmap_free_size(&self) -> u64 {
        self.pmap_free_size
    }

    // BREFNBT
    pub fn node_btree(&self) -> BlockRef {
        self.node_btree
    }

    // BREFBBT
    pub fn block_btree(&self) -> BlockRef {
        self.block_btree
    }

    pub fn amap_is_valid(&self) -> AmapStatus {
        self.amap_is_valid
    }
}

/// Unicode [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)
#[derive(Clone, Copy, Debug)]
pub struct Header {
    version: NdbVersion,
    client_version: u16,
    next_page: BlockId,
    unique: u32,
    root: Root,
    crypt_method: NdbCryptMethod,
    next_block: BlockId,
}

impl Header {
    /// Decode the HEADER at the start of `file`. ANSI files are rejected.
    pub fn read(file: &[u8]) -> NdbResult<Self> {
        if file.len() < HEADER_SIZE {
            return Err(NdbError::HeaderTooSmall(file.len()));
        }

        // dwMagic
        let magic = LittleEndian::read_u32(&file[0..4]);
        if magic != HEADER_MAGIC {
            return Err(NdbError::InvalidNdbHeaderMagicValue(magic));
        }

        // wMagicClient
        let magic_client = LittleEndian::read_u16(&file[8..10]);
        if magic_client != HEADER_MAGIC_CLIENT {
            return Err(NdbError::InvalidNdbHeaderMagicClientValue(magic_client));
        }

        // wVer
        let version = LittleEndian::read_u16(&file[10..12]);
        let version = match NdbVersion::try_from(version)? {
            NdbVersion::Ansi => return Err(NdbError::AnsiPstVersion(version)),
            version => version,
        };

        Ok(Self {
            version,
            client_version: LittleEndian::read_u16(&file[12..14]),
            next_page: BlockId::read(&file[32..40]),
            unique: LittleEndian::read_u32(&file[40..44]),
            root: Root::read(&file[ROOT_OFFSET..ROOT_OFFSET + 72])?,
            crypt_method: NdbCryptMethod::try_from(file[CRYPT_METHOD_OFFSET])?,
            next_block: BlockId::read(&file[516..524]),
        })
    }

    pub fn version(&self) -> NdbVersion {
        self.version
    }

    // wVerClient
    pub fn client_version(&self) -> u16 {
        self.client_version
    }

    // bidNextP
    pub fn next_page(&self) -> BlockId {
        self.next_page
    }

    // dwUnique
    pub fn unique(&self) -> u32 {
        self.unique
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn crypt_method(&self) -> NdbCryptMethod {
        self.crypt_method
    }

    // bidNextB
    pub fn next_block(&self) -> BlockId {
        self.next_block
    }
}
