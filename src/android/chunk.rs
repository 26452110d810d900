//! Chunk-level primitives shared by the compiled XML and resource table decoders.
//!
//! Both formats are a sequence of `ResChunk_header`-prefixed chunks in little-endian order, and both
//! carry their text in a `ResStringPool` chunk.

pub(crate) const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub(crate) const RES_TABLE_TYPE: u16 = 0x0002;
pub(crate) const RES_XML_TYPE: u16 = 0x0003;

pub(crate) const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
const STRING_FLAG_UTF8: u32 = 0x0000_0100;
const SPAN_END: u32 = 0xFFFF_FFFF;

/// Result alias for chunk decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding compiled XML or a resource table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes do not have the expected structure.
    Malformed(String),
    /// The archive entry holding the bytes could not be read.
    Unreadable(String),
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        DecodeError::Malformed(msg.into())
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed chunk data: {msg}"),
            DecodeError::Unreadable(msg) => write!(f, "entry could not be read: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub(crate) struct ChunkHeader {
    pub(crate) chunk_type: u16,
    pub(crate) header_size: u16,
    pub(crate) chunk_size: u32,
    pub(crate) start: usize,
}

impl ChunkHeader {
    pub(crate) fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }

    pub(crate) fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }
}

pub(crate) struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, pos: 0 }
    }

    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| DecodeError::malformed(format!("unexpected end of data at 0x{:x}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> DecodeResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> DecodeResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        self.take(len)
    }

    pub(crate) fn seek(&mut self, offset: usize) -> DecodeResult<()> {
        if offset > self.data.len() {
            return Err(DecodeError::malformed(format!(
                "attempted to seek to 0x{offset:x} past end of data"
            )));
        }
        self.pos = offset;
        Ok(())
    }
}

pub(crate) fn read_chunk_header(reader: &mut BinaryReader<'_>) -> DecodeResult<ChunkHeader> {
    let start = reader.position();
    if reader.remaining() < 8 {
        return Err(DecodeError::malformed("truncated chunk header"));
    }
    let chunk_type = reader.read_u16()?;
    let header_size = reader.read_u16()?;
    let chunk_size = reader.read_u32()?;
    if header_size < 8 || chunk_size < header_size as u32 {
        return Err(DecodeError::malformed(format!(
            "invalid sizing for chunk 0x{chunk_type:04x} at 0x{start:x}"
        )));
    }
    let end = start
        .checked_add(chunk_size as usize)
        .ok_or_else(|| DecodeError::malformed("chunk size overflow"))?;
    if end > reader.data().len() {
        return Err(DecodeError::malformed(format!(
            "chunk 0x{chunk_type:04x} at 0x{start:x} extends past end of data"
        )));
    }
    Ok(ChunkHeader {
        chunk_type,
        header_size,
        chunk_size,
        start,
    })
}

/// A styling span attached to one pool string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleSpan {
    pub name: String,
    pub first_char: u32,
    pub last_char: u32,
}

/// A decoded `ResStringPool` chunk.
///
/// Strings keep the pool's storage order. Malformed text is decoded lossily rather than failing the
/// whole pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
    styles: Vec<Vec<(u32, u32, u32)>>,
}

impl StringPool {
    pub(crate) fn parse(reader: &mut BinaryReader<'_>, header: &ChunkHeader) -> DecodeResult<Self> {
        let string_count = reader.read_u32()? as usize;
        let style_count = reader.read_u32()? as usize;
        let flags = reader.read_u32()?;
        let strings_start = reader.read_u32()? as usize;
        let styles_start = reader.read_u32()? as usize;

        let is_utf8 = (flags & STRING_FLAG_UTF8) != 0;
        let chunk_end = header.end();

        let offsets_len = string_count
            .checked_add(style_count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| DecodeError::malformed("string pool offset table overflow"))?;
        if header.body_start() + offsets_len > chunk_end {
            return Err(DecodeError::malformed("string pool offset table exceeds chunk"));
        }

        reader.seek(header.body_start())?;
        let mut string_offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            string_offsets.push(reader.read_u32()? as usize);
        }
        let mut style_offsets = Vec::with_capacity(style_count);
        for _ in 0..style_count {
            style_offsets.push(reader.read_u32()? as usize);
        }

        let data = reader.data();
        let strings_base = header.start + strings_start;
        let mut strings = Vec::with_capacity(string_count);
        for offset in string_offsets {
            let absolute = strings_base + offset;
            let text = if is_utf8 {
                read_utf8_string(data, absolute, chunk_end)?
            } else {
                read_utf16_string(data, absolute, chunk_end)?
            };
            strings.push(text);
        }

        let styles_base = header.start + styles_start;
        let mut styles = Vec::with_capacity(style_count);
        for offset in style_offsets {
            styles.push(read_spans(data, styles_base + offset, chunk_end)?);
        }

        reader.seek(chunk_end)?;
        Ok(StringPool { strings, styles })
    }

    pub fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    /// Style spans of the string at `idx`, empty for unstyled strings.
    pub fn spans(&self, idx: u32) -> Vec<StyleSpan> {
        let Some(raw) = self.styles.get(idx as usize) else {
            return Vec::new();
        };
        raw.iter()
            .map(|(name, first_char, last_char)| StyleSpan {
                name: self.get(*name).unwrap_or_default().to_string(),
                first_char: *first_char,
                last_char: *last_char,
            })
            .collect()
    }

    pub fn is_styled(&self, idx: u32) -> bool {
        self.styles
            .get(idx as usize)
            .is_some_and(|spans| !spans.is_empty())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate strings in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

fn read_spans(data: &[u8], offset: usize, limit: usize) -> DecodeResult<Vec<(u32, u32, u32)>> {
    let mut reader = BinaryReader::new(&data[..limit.min(data.len())]);
    reader.seek(offset)?;
    let mut spans = Vec::new();
    loop {
        let name = reader.read_u32()?;
        if name == SPAN_END {
            return Ok(spans);
        }
        let first_char = reader.read_u32()?;
        let last_char = reader.read_u32()?;
        spans.push((name, first_char, last_char));
    }
}

fn read_utf8_string(data: &[u8], offset: usize, limit: usize) -> DecodeResult<String> {
    let mut cursor = offset;
    // The first length is in UTF-16 units and is only informative here.
    let (_, len_bytes) = read_utf8_length(data, cursor, limit)?;
    cursor += len_bytes;
    let (byte_len, byte_len_size) = read_utf8_length(data, cursor, limit)?;
    cursor += byte_len_size;
    if cursor + byte_len > limit {
        return Err(DecodeError::malformed("UTF-8 string exceeds chunk bounds"));
    }
    Ok(String::from_utf8_lossy(&data[cursor..cursor + byte_len]).into_owned())
}

fn read_utf16_string(data: &[u8], offset: usize, limit: usize) -> DecodeResult<String> {
    let mut cursor = offset;
    let (char_count, header_bytes) = read_utf16_length(data, cursor, limit)?;
    cursor += header_bytes;
    let byte_len = char_count * 2;
    if cursor + byte_len > limit {
        return Err(DecodeError::malformed("UTF-16 string exceeds chunk bounds"));
    }
    let units: Vec<u16> = data[cursor..cursor + byte_len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

fn read_utf8_length(data: &[u8], offset: usize, limit: usize) -> DecodeResult<(usize, usize)> {
    if offset >= limit {
        return Err(DecodeError::malformed("invalid UTF-8 length offset"));
    }
    let first = data[offset];
    if (first & 0x80) == 0 {
        Ok((first as usize, 1))
    } else {
        if offset + 1 >= limit {
            return Err(DecodeError::malformed("truncated UTF-8 length"));
        }
        let second = data[offset + 1];
        Ok(((((first & 0x7F) as usize) << 8) | second as usize, 2))
    }
}

fn read_utf16_length(data: &[u8], offset: usize, limit: usize) -> DecodeResult<(usize, usize)> {
    if offset + 2 > limit {
        return Err(DecodeError::malformed("invalid UTF-16 length offset"));
    }
    let first = u16::from_le_bytes([data[offset], data[offset + 1]]);
    if (first & 0x8000) == 0 {
        Ok((first as usize, 2))
    } else {
        if offset + 4 > limit {
            return Err(DecodeError::malformed("truncated UTF-16 length"));
        }
        let second = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
        Ok(((((first & 0x7FFF) as usize) << 16) | second as usize, 4))
    }
}

/// Decode a fixed-size, NUL-padded UTF-16 name field such as the package name.
pub(crate) fn read_fixed_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::StringPoolBuilder;

    fn parse_pool(bytes: &[u8]) -> StringPool {
        let mut reader = BinaryReader::new(bytes);
        let header = read_chunk_header(&mut reader).expect("pool header");
        assert_eq!(header.chunk_type, RES_STRING_POOL_TYPE);
        StringPool::parse(&mut reader, &header).expect("pool body")
    }

    #[test]
    fn reads_utf16_pool_in_storage_order() {
        let mut builder = StringPoolBuilder::new();
        builder.intern("manifest");
        builder.intern("package");
        builder.intern("日本語");
        let pool = parse_pool(&builder.to_chunk());
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(2), Some("日本語"));
        assert_eq!(pool.get(NO_ENTRY_INDEX), None);
        assert_eq!(pool.get(7), None);
        assert!(!pool.is_styled(0));
    }

    #[test]
    fn reads_style_spans() {
        let mut builder = StringPoolBuilder::new();
        let text = builder.intern("Hello bold");
        let tag = builder.intern("b");
        builder.style(text, vec![(tag, 6, 9)]);
        let pool = parse_pool(&builder.to_chunk());
        assert!(pool.is_styled(text));
        let spans = pool.spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "b");
        assert_eq!((spans[0].first_char, spans[0].last_char), (6, 9));
        assert!(pool.spans(tag).is_empty());
    }

    #[test]
    fn rejects_chunk_past_end() {
        let mut bytes = StringPoolBuilder::new().to_chunk();
        bytes[4..8].copy_from_slice(&1024u32.to_le_bytes());
        let mut reader = BinaryReader::new(&bytes);
        assert!(matches!(read_chunk_header(&mut reader), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn fixed_utf16_stops_at_nul() {
        let mut raw = Vec::new();
        for unit in "com.example".encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        raw.resize(256, 0);
        assert_eq!(read_fixed_utf16(&raw), "com.example");
    }
}
