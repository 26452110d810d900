//! Decoder for compiled resource tables (`resources.arsc`).

use crate::android::chunk::{
    read_chunk_header, read_fixed_utf16, BinaryReader, ChunkHeader, DecodeError, DecodeResult,
    StringPool, RES_STRING_POOL_TYPE, RES_TABLE_TYPE,
};
use crate::android::config::{best_value, Locale, ResConfig};
use crate::android::value::{ResId, StyledString, Value, TYPE_STRING};
use bitflags::bitflags;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
const RES_TABLE_TYPE_TYPE: u16 = 0x0201;
const RES_TABLE_TYPE_SPEC_TYPE: u16 = 0x0202;
const RES_TABLE_LIBRARY_TYPE: u16 = 0x0203;

const PACKAGE_NAME_BYTES: usize = 256;
// Package headers written before type id offsets were introduced stop here.
const PACKAGE_HEADER_BASE_SIZE: usize = 284;

bitflags! {
    // ResTable_type flags, selecting the layout of the entry offset table.
    struct TypeFlags: u8 {
        const SPARSE = 0x01;
        const OFFSET16 = 0x02;
    }
}

bitflags! {
    // ResTable_entry flags. A compact entry keeps its value's data type in the high byte.
    struct EntryFlags: u16 {
        const COMPLEX = 0x0001;
        const PUBLIC = 0x0002;
        const WEAK = 0x0004;
        const COMPACT = 0x0008;
    }
}

const NO_ENTRY_OFFSET: u32 = 0xFFFF_FFFF;
const NO_ENTRY_OFFSET16: u16 = 0xFFFF;
const MAX_DENSE_ENTRIES: usize = 0x1_0000;

/// One resource with every configured value the table holds for it, in table order.
#[derive(Clone, Debug, PartialEq)]
pub struct ResEntry {
    pub id: ResId,
    pub name: String,
    pub values: Vec<(ResConfig, Value)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResType {
    pub id: u8,
    pub name: String,
    pub entries: BTreeMap<u16, ResEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResPackage {
    pub id: u8,
    pub name: String,
    pub types: Vec<ResType>,
}

impl ResPackage {
    pub fn find_type(&self, type_id: u8) -> Option<&ResType> {
        self.types.iter().find(|ty| ty.id == type_id)
    }

    fn type_mut(&mut self, type_id: u8, name: &str) -> &mut ResType {
        let position = match self.types.iter().position(|ty| ty.id == type_id) {
            Some(position) => position,
            None => {
                self.types.push(ResType {
                    id: type_id,
                    name: name.to_string(),
                    entries: BTreeMap::new(),
                });
                self.types.len() - 1
            }
        };
        &mut self.types[position]
    }
}

/// A decoded resource table: the global value string pool and its packages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResTable {
    strings: StringPool,
    packages: Vec<ResPackage>,
}

impl ResTable {
    pub fn parse(bytes: &[u8]) -> DecodeResult<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header = read_chunk_header(&mut reader)?;
        if header.chunk_type != RES_TABLE_TYPE {
            return Err(DecodeError::malformed(format!(
                "resource table starts with chunk 0x{:04x}",
                header.chunk_type
            )));
        }
        let package_count = reader.read_u32()?;
        reader.seek(header.body_start())?;

        let mut strings: Option<StringPool> = None;
        let mut packages = Vec::new();
        while reader.position() < header.end() {
            let chunk = read_chunk_header(&mut reader)?;
            match chunk.chunk_type {
                RES_STRING_POOL_TYPE if strings.is_none() => {
                    strings = Some(StringPool::parse(&mut reader, &chunk)?);
                }
                RES_TABLE_PACKAGE_TYPE => {
                    let pool = strings.as_ref().ok_or_else(|| {
                        DecodeError::malformed("package chunk encountered before value string pool")
                    })?;
                    packages.push(parse_package(&mut reader, &chunk, pool)?);
                }
                other => debug!("skipping table chunk 0x{other:04x} at 0x{:x}", chunk.start),
            }
            reader.seek(chunk.end())?;
        }

        if packages.len() != package_count as usize {
            debug!(
                "resource table declares {package_count} packages but holds {}",
                packages.len()
            );
        }
        Ok(ResTable {
            strings: strings.unwrap_or_default(),
            packages,
        })
    }

    /// The global value string pool.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn packages(&self) -> &[ResPackage] {
        &self.packages
    }

    pub fn package(&self, id: u8) -> Option<&ResPackage> {
        self.packages.iter().find(|package| package.id == id)
    }

    pub fn entry(&self, id: ResId) -> Option<&ResEntry> {
        self.package(id.package_id())?
            .find_type(id.type_id())?
            .entries
            .get(&id.entry_index())
    }

    /// Every entry of every package, in package, type and entry order.
    pub fn entries(&self) -> impl Iterator<Item = &ResEntry> {
        self.packages
            .iter()
            .flat_map(|package| package.types.iter())
            .flat_map(|ty| ty.entries.values())
    }

    pub fn best_value(&self, id: ResId, target: &ResConfig) -> Option<&Value> {
        best_value(&self.entry(id)?.values, target)
    }

    /// Distinct locales of all configurations, default locale included, sorted.
    pub fn locales(&self) -> Vec<Locale> {
        self.entries()
            .flat_map(|entry| entry.values.iter().map(|(config, _)| config.locale()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn parse_package(
    reader: &mut BinaryReader<'_>,
    header: &ChunkHeader,
    values: &StringPool,
) -> DecodeResult<ResPackage> {
    let id = reader.read_u32()?;
    let name = read_fixed_utf16(reader.read_bytes(PACKAGE_NAME_BYTES)?);
    let type_strings = reader.read_u32()? as usize;
    reader.read_u32()?; // lastPublicType
    let key_strings = reader.read_u32()? as usize;
    reader.read_u32()?; // lastPublicKey
    let type_id_offset = if header.header_size as usize > PACKAGE_HEADER_BASE_SIZE {
        reader.read_u32()?
    } else {
        0
    };
    let id = u8::try_from(id)
        .map_err(|_| DecodeError::malformed(format!("package id 0x{id:x} out of range")))?;

    let mut type_names: Option<StringPool> = None;
    let mut key_names: Option<StringPool> = None;
    let mut package = ResPackage {
        id,
        name,
        types: Vec::new(),
    };

    reader.seek(header.body_start())?;
    while reader.position() < header.end() {
        let chunk = read_chunk_header(reader)?;
        if chunk.end() > header.end() {
            return Err(DecodeError::malformed("chunk extends past its package"));
        }
        let relative = chunk.start - header.start;
        match chunk.chunk_type {
            RES_STRING_POOL_TYPE if relative == type_strings => {
                type_names = Some(StringPool::parse(reader, &chunk)?);
            }
            RES_STRING_POOL_TYPE if relative == key_strings => {
                key_names = Some(StringPool::parse(reader, &chunk)?);
            }
            RES_TABLE_TYPE_TYPE => {
                let (Some(type_names), Some(key_names)) = (&type_names, &key_names) else {
                    return Err(DecodeError::malformed(
                        "type chunk encountered before type and key pools",
                    ));
                };
                let pools = PackagePools {
                    values,
                    type_names,
                    key_names,
                    type_id_offset,
                };
                parse_type(reader, &chunk, &pools, &mut package)?;
            }
            RES_TABLE_TYPE_SPEC_TYPE | RES_TABLE_LIBRARY_TYPE => {}
            other => debug!("skipping package chunk 0x{other:04x} at 0x{:x}", chunk.start),
        }
        reader.seek(chunk.end())?;
    }
    Ok(package)
}

struct PackagePools<'p> {
    values: &'p StringPool,
    type_names: &'p StringPool,
    key_names: &'p StringPool,
    type_id_offset: u32,
}

fn parse_type(
    reader: &mut BinaryReader<'_>,
    header: &ChunkHeader,
    pools: &PackagePools<'_>,
    package: &mut ResPackage,
) -> DecodeResult<()> {
    let type_id = reader.read_u8()?;
    let flags = TypeFlags::from_bits_retain(reader.read_u8()?);
    reader.read_u16()?; // reserved
    let entry_count = reader.read_u32()? as usize;
    let entries_start = reader.read_u32()? as usize;
    let config = ResConfig::parse(reader)?;
    if type_id == 0 {
        return Err(DecodeError::malformed("type chunk with id 0"));
    }

    let type_name = (type_id as u32)
        .checked_sub(1 + pools.type_id_offset)
        .and_then(|idx| pools.type_names.get(idx))
        .unwrap_or_default()
        .to_string();
    let package_id = package.id;
    let res_type = package.type_mut(type_id, &type_name);

    // Dense tables index entries by position and entry indices are 16 bits wide.
    if !flags.contains(TypeFlags::SPARSE) && entry_count > MAX_DENSE_ENTRIES {
        return Err(DecodeError::malformed(format!(
            "type {type_name} declares {entry_count} entries"
        )));
    }

    reader.seek(header.body_start())?;
    let mut offsets: Vec<(u16, usize)> = Vec::new();
    if flags.contains(TypeFlags::SPARSE) {
        for _ in 0..entry_count {
            let index = reader.read_u16()?;
            let offset = reader.read_u16()? as usize * 4;
            offsets.push((index, offset));
        }
    } else if flags.contains(TypeFlags::OFFSET16) {
        for index in 0..entry_count {
            let offset = reader.read_u16()?;
            if offset != NO_ENTRY_OFFSET16 {
                offsets.push((index as u16, offset as usize * 4));
            }
        }
    } else {
        for index in 0..entry_count {
            let offset = reader.read_u32()?;
            if offset != NO_ENTRY_OFFSET {
                offsets.push((index as u16, offset as usize));
            }
        }
    }

    let entries_base = header.start + entries_start;
    for (index, offset) in offsets {
        let position = entries_base + offset;
        if position >= header.end() {
            return Err(DecodeError::malformed(format!(
                "entry {index} of type {type_name} lies outside its chunk"
            )));
        }
        reader.seek(position)?;
        let Some((key, data_type, data)) = read_entry(reader, &type_name, index)? else {
            continue;
        };
        let id = ResId::new(package_id, type_id, index);
        let Some(value) = table_value(pools.values, &type_name, data_type, data) else {
            debug!("entry {id} references a missing string, skipped");
            continue;
        };
        let name = pools.key_names.get(key).unwrap_or_default().to_string();
        res_type
            .entries
            .entry(index)
            .or_insert_with(|| ResEntry {
                id,
                name,
                values: Vec::new(),
            })
            .values
            .push((config, value));
    }
    Ok(())
}

/// Returns `(key, data type, data)` for a simple entry, `None` for a bag.
fn read_entry(
    reader: &mut BinaryReader<'_>,
    type_name: &str,
    index: u16,
) -> DecodeResult<Option<(u32, u8, u32)>> {
    let start = reader.position();
    let size_or_key = reader.read_u16()?;
    let raw_flags = reader.read_u16()?;
    let flags = EntryFlags::from_bits_retain(raw_flags);
    if flags.contains(EntryFlags::COMPACT) {
        let data = reader.read_u32()?;
        return Ok(Some((size_or_key as u32, (raw_flags >> 8) as u8, data)));
    }
    let key = reader.read_u32()?;
    if flags.contains(EntryFlags::COMPLEX) {
        debug!("skipping complex entry {type_name}[{index}]");
        return Ok(None);
    }
    reader.seek(start + size_or_key as usize)?;
    reader.read_u16()?; // Res_value size
    reader.read_u8()?; // res0
    let data_type = reader.read_u8()?;
    let data = reader.read_u32()?;
    Ok(Some((key, data_type, data)))
}

fn table_value(strings: &StringPool, type_name: &str, data_type: u8, data: u32) -> Option<Value> {
    if data_type != TYPE_STRING {
        return Some(Value::from_typed_data(data_type, data));
    }
    let text = strings.get(data)?;
    let value = if strings.is_styled(data) {
        Value::StyledString(StyledString {
            text: text.to_string(),
            spans: strings.spans(data),
        })
    } else if type_name != "string" && text.starts_with("res/") {
        Value::FileReference(text.to_string())
    } else {
        Value::String(text.to_string())
    };
    Some(value)
}
