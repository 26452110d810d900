/* Dex file format structures, limited to what an inventory of classes and strings needs */

use crate::dex::error::DexError;
use crate::dex::{read_u1, read_u4, read_uleb128, read_x};
use log::debug;

/* Constants */
pub const DEX_MAGIC_PREFIX: [u8; 4] = [ 0x64, 0x65, 0x78, 0x0a ];
pub const SUPPORTED_VERSIONS: [&[u8; 3]; 7] = [ b"035", b"036", b"037", b"038", b"039", b"040", b"041" ];
pub const HEADER_SIZE: usize = 0x70;
pub const NO_INDEX: u32 = 0xffffffff;

const CLASS_DEF_SIZE: usize = 0x20;

type StringId = usize;
type TypeId = usize;

/// `dex\n`, a known three-digit version, then NUL.
pub fn is_magic_valid(bytes: &[u8]) -> bool
{
    if bytes.len() < 8 || bytes[..4] != DEX_MAGIC_PREFIX || bytes[7] != 0
    {
        return false;
    }
    SUPPORTED_VERSIONS.iter().any(|v| bytes[4..7] == v[..])
}


#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Header {
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<Header, DexError>
    {
        if bytes.len() < HEADER_SIZE {
            return Err(DexError::new("Not enough bytes for header"));
        }
        if !is_magic_valid(bytes) {
            return Err(DexError::new("Invalid magic value"));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&read_x(bytes, ix, 8)?);
        let checksum = read_u4(bytes, ix)?;
        let mut signature = [0u8; 20];
        signature.copy_from_slice(&read_x(bytes, ix, 20)?);

        Ok(Header {
            magic,
            checksum,
            signature,
            file_size: read_u4(bytes, ix)?,
            header_size: read_u4(bytes, ix)?,
            endian_tag: read_u4(bytes, ix)?,
            link_size: read_u4(bytes, ix)?,
            link_off: read_u4(bytes, ix)?,
            map_off: read_u4(bytes, ix)?,
            string_ids_size: read_u4(bytes, ix)?,
            string_ids_off: read_u4(bytes, ix)?,
            type_ids_size: read_u4(bytes, ix)?,
            type_ids_off: read_u4(bytes, ix)?,
            proto_ids_size: read_u4(bytes, ix)?,
            proto_ids_off: read_u4(bytes, ix)?,
            field_ids_size: read_u4(bytes, ix)?,
            field_ids_off: read_u4(bytes, ix)?,
            method_ids_size: read_u4(bytes, ix)?,
            method_ids_off: read_u4(bytes, ix)?,
            class_defs_size: read_u4(bytes, ix)?,
            class_defs_off: read_u4(bytes, ix)?,
            data_size: read_u4(bytes, ix)?,
            data_off: read_u4(bytes, ix)?,
        })
    }

    /// The numeric version from the magic, e.g. 35 or 39.
    pub fn version(&self) -> u32
    {
        self.magic[4..7]
            .iter()
            .fold(0, |acc, d| acc * 10 + (d - b'0') as u32)
    }
}


/// A `string_data_item`. Strings that are not valid MUTF-8 keep their bytes.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum DexString
{
    Decoded(String),
    Raw(u32, Vec<u8>),
}

impl DexString
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<DexString, DexError>
    {
        let utf16_size = read_uleb128(bytes, ix)?;
        let mut v = vec![];

        loop
        {
            let u = read_u1(bytes, ix)?;
            if u != 0 { v.push(u); }
            else { break; }
        }

        Ok(match cesu8::from_java_cesu8(v.as_slice())
        {
            Ok(converted_str) => DexString::Decoded(converted_str.to_string()),
            _ => DexString::Raw(utf16_size, v)
        })
    }

    /// Decoded text, or the raw bytes converted lossily.
    pub fn to_string_lossy(&self) -> String
    {
        match self
        {
            DexString::Decoded(s) => s.clone(),
            DexString::Raw(_, v) => String::from_utf8_lossy(v).into_owned(),
        }
    }

    pub fn is_decoded(&self) -> bool
    {
        matches!(self, DexString::Decoded(_))
    }
}


#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ClassDefItem {
    // The class_def_item struct; offsets into the data section are not followed
    pub class_idx: TypeId,
    pub access_flags: u32,
    pub superclass_idx: u32,
    pub source_file_idx: u32,
}

impl ClassDefItem
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassDefItem, DexError>
    {
        let class_idx = read_u4(bytes, ix)? as TypeId;
        let access_flags = read_u4(bytes, ix)?;
        let superclass_idx = read_u4(bytes, ix)?;
        read_u4(bytes, ix)?; // interfaces_off
        let source_file_idx = read_u4(bytes, ix)?;
        read_u4(bytes, ix)?; // annotations_off
        read_u4(bytes, ix)?; // class_data_off
        read_u4(bytes, ix)?; // static_values_off

        Ok(ClassDefItem {
            class_idx,
            access_flags,
            superclass_idx,
            source_file_idx,
        })
    }
}


#[derive(Debug, Clone)]
pub struct DexFile {
    pub header: Header,
    pub strings: Vec<DexString>,
    pub types: Vec<StringId>,
    pub class_defs: Vec<ClassDefItem>,
}

impl DexFile {

    fn read(bytes: &[u8], ix: &mut usize) -> Result<DexFile, DexError>
    {
        let header = Header::read(bytes, ix)?;
        check_section(bytes, "string_ids", header.string_ids_off, header.string_ids_size, 4)?;
        check_section(bytes, "type_ids", header.type_ids_off, header.type_ids_size, 4)?;
        check_section(bytes, "class_defs", header.class_defs_off, header.class_defs_size, CLASS_DEF_SIZE)?;

        let mut dex = DexFile {
            header,
            strings: vec![],
            types: vec![],
            class_defs: vec![],
        };

        // Read the strings
        *ix = dex.header.string_ids_off as usize;
        for i in 0..dex.header.string_ids_size
        {
            let mut string_data_off = read_u4(bytes, ix)? as usize;
            let ds = DexString::read(bytes, &mut string_data_off).map_err(|e| err!(e, "string_id {}", i))?;
            dex.strings.push(ds);
        }

        // Read the type_ids
        *ix = dex.header.type_ids_off as usize;
        for _ in 0..dex.header.type_ids_size
        {
            let descriptor_idx = read_u4(bytes, ix)? as StringId;
            if descriptor_idx >= dex.strings.len()
            {
                fail!("Type descriptor index {} out of range", descriptor_idx);
            }
            dex.types.push(descriptor_idx);
        }

        // Read the Class Defs
        *ix = dex.header.class_defs_off as usize;
        for i in 0..dex.header.class_defs_size
        {
            let class_def = ClassDefItem::read(bytes, ix).map_err(|e| err!(e, "class_def {}", i))?;
            if class_def.class_idx >= dex.types.len()
            {
                fail!("Class type index {} out of range", class_def.class_idx);
            }
            dex.class_defs.push(class_def);
        }

        debug!(
            "read dex v{:03}: {} strings, {} types, {} classes",
            dex.header.version(),
            dex.strings.len(),
            dex.types.len(),
            dex.class_defs.len()
        );
        Ok(dex)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DexFile, DexError>
    {
        let mut ix = 0;
        DexFile::read(bytes, &mut ix)
    }

    /// The type descriptor of a class, e.g. `Lcom/example/Foo;`.
    pub fn class_descriptor(&self, class_def: &ClassDefItem) -> Option<&DexString>
    {
        self.types
            .get(class_def.class_idx)
            .and_then(|string_idx| self.strings.get(*string_idx))
    }
}

fn check_section(bytes: &[u8], name: &str, offset: u32, count: u32, item_size: usize) -> Result<(), DexError>
{
    if count == 0
    {
        return Ok(());
    }
    let end = (count as usize)
        .checked_mul(item_size)
        .and_then(|len| len.checked_add(offset as usize));
    match end
    {
        Some(end) if end <= bytes.len() => Ok(()),
        _ => Err(DexError::new(&format!("{} section exceeds file bounds", name))),
    }
}
