//! Decoder for compiled (binary) XML documents such as `AndroidManifest.xml`.
//!
//! The output is a plain owned element tree. Attribute values keep both their inlined text and their
//! typed `Res_value`, so later stages can resolve resource references and still fall back to the
//! text the resource compiler recorded.

use crate::android::chunk::{
    read_chunk_header, BinaryReader, DecodeError, DecodeResult, StringPool, RES_STRING_POOL_TYPE,
    RES_XML_TYPE,
};
use crate::android::value::{Value, TYPE_NULL, TYPE_STRING};
use log::debug;

const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
const RES_XML_CDATA_TYPE: u16 = 0x0104;

const ATTRIBUTE_MIN_SIZE: usize = 20;
const RES_VALUE_SIZE: u16 = 8;

/// The platform attribute namespace, conventionally bound to the `android` prefix.
pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

/// A namespace declaration made on an element. The prefix is empty for the default namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XmlAttribute {
    /// Empty when the attribute has no namespace.
    pub namespace_uri: String,
    pub name: String,
    /// Text as inlined in the document, or the compiler's spelling of the typed value.
    pub raw: String,
    /// The typed value; absent only for an undefined value.
    pub compiled: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub namespace_uri: Option<String>,
    pub namespace_decls: Vec<NamespaceDecl>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..XmlElement::default()
        }
    }

    /// Look up an attribute by namespace uri (empty for none) and local name.
    pub fn attribute(&self, namespace_uri: &str, name: &str) -> Option<&XmlAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.namespace_uri == namespace_uri && attr.name == name)
    }
}

/// Decode a compiled XML document into its root element.
pub fn parse_document(bytes: &[u8]) -> DecodeResult<XmlElement> {
    let mut reader = BinaryReader::new(bytes);
    let xml_header = read_chunk_header(&mut reader)?;
    if xml_header.chunk_type != RES_XML_TYPE {
        return Err(DecodeError::malformed(
            "binary XML does not start with RES_XML_TYPE header",
        ));
    }

    let xml_end = xml_header.end();
    reader.seek(xml_header.body_start())?;

    let mut string_pool: Option<StringPool> = None;
    let mut pending_namespaces: Vec<NamespaceDecl> = Vec::new();
    let mut element_stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    while reader.position() < xml_end {
        let chunk_header = read_chunk_header(&mut reader)?;
        let chunk_end = chunk_header.end();
        if chunk_end > xml_end {
            return Err(DecodeError::malformed("chunk extends past XML document"));
        }
        match chunk_header.chunk_type {
            RES_STRING_POOL_TYPE => {
                string_pool = Some(StringPool::parse(&mut reader, &chunk_header)?);
            }
            RES_XML_START_NAMESPACE_TYPE => {
                let pool = require_pool(&string_pool, "namespace")?;
                reader.seek(chunk_header.body_start())?;
                let prefix_idx = reader.read_u32()?;
                let uri_idx = reader.read_u32()?;
                pending_namespaces.push(NamespaceDecl {
                    prefix: pool.get(prefix_idx).unwrap_or_default().to_string(),
                    uri: pool.get(uri_idx).unwrap_or_default().to_string(),
                });
            }
            RES_XML_END_NAMESPACE_TYPE => {}
            RES_XML_START_ELEMENT_TYPE => {
                let pool = require_pool(&string_pool, "start element")?;
                if root.is_some() {
                    return Err(DecodeError::malformed("multiple root elements"));
                }
                reader.seek(chunk_header.body_start())?;
                let ext_start = reader.position();
                let ns_idx = reader.read_u32()?;
                let name_idx = reader.read_u32()?;
                let attribute_start = reader.read_u16()? as usize;
                let attribute_size = reader.read_u16()? as usize;
                let attribute_count = reader.read_u16()? as usize;

                let name = pool
                    .get(name_idx)
                    .ok_or_else(|| DecodeError::malformed("element references invalid string index"))?
                    .to_string();
                if attribute_count > 0 && attribute_size < ATTRIBUTE_MIN_SIZE {
                    return Err(DecodeError::malformed(format!(
                        "attribute size {attribute_size} too small on <{name}>"
                    )));
                }

                let mut attributes = Vec::with_capacity(attribute_count);
                for i in 0..attribute_count {
                    reader.seek(ext_start + attribute_start + i * attribute_size)?;
                    attributes.push(read_attribute(&mut reader, pool)?);
                }
                if reader.position() > chunk_end {
                    return Err(DecodeError::malformed(format!(
                        "attributes of <{name}> exceed their chunk"
                    )));
                }

                element_stack.push(XmlElement {
                    name,
                    namespace_uri: pool.get(ns_idx).map(str::to_string),
                    namespace_decls: std::mem::take(&mut pending_namespaces),
                    attributes,
                    children: Vec::new(),
                });
            }
            RES_XML_END_ELEMENT_TYPE => {
                let element = element_stack
                    .pop()
                    .ok_or_else(|| DecodeError::malformed("end element without matching start"))?;
                match element_stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            RES_XML_CDATA_TYPE => {
                debug!("skipping character data at 0x{:x}", chunk_header.start);
            }
            other => {
                debug!("skipping unknown XML chunk 0x{other:04x} at 0x{:x}", chunk_header.start);
            }
        }
        reader.seek(chunk_end)?;
    }

    if !element_stack.is_empty() {
        return Err(DecodeError::malformed("unclosed XML elements at end of document"));
    }
    root.ok_or_else(|| DecodeError::malformed("document has no root element"))
}

fn require_pool<'p>(pool: &'p Option<StringPool>, what: &str) -> DecodeResult<&'p StringPool> {
    pool.as_ref()
        .ok_or_else(|| DecodeError::malformed(format!("{what} chunk encountered before string pool")))
}

fn read_attribute(
    reader: &mut BinaryReader<'_>,
    pool: &StringPool,
) -> DecodeResult<XmlAttribute> {
    let ns_idx = reader.read_u32()?;
    let name_idx = reader.read_u32()?;
    let raw_idx = reader.read_u32()?;
    let value_size = reader.read_u16()?;
    reader.read_u8()?; // res0
    let data_type = reader.read_u8()?;
    let data = reader.read_u32()?;
    if value_size != RES_VALUE_SIZE {
        return Err(DecodeError::malformed("attribute value size must be 8"));
    }

    let name = pool
        .get(name_idx)
        .ok_or_else(|| DecodeError::malformed("attribute name references invalid string index"))?
        .to_string();
    let raw_text = pool.get(raw_idx);

    let compiled = match data_type {
        TYPE_NULL if data == 0 => None,
        TYPE_STRING => {
            let text = pool.get(data).or(raw_text).ok_or_else(|| {
                DecodeError::malformed(format!("attribute {name} references missing pool entry"))
            })?;
            Some(Value::RawString(text.to_string()))
        }
        _ => Some(Value::from_typed_data(data_type, data)),
    };

    let raw = match (raw_text, &compiled) {
        (Some(text), _) => text.to_string(),
        (None, Some(value)) => value.to_source_text(),
        (None, None) => String::new(),
    };

    Ok(XmlAttribute {
        namespace_uri: pool.get(ns_idx).unwrap_or_default().to_string(),
        name,
        raw,
        compiled,
    })
}
