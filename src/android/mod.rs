//! Android package formats: the archive, compiled XML, the resource table and value selection.

pub mod binary_xml;
pub mod chunk;
pub mod config;
pub mod manifest;
pub mod res_table;
pub mod resolve;
pub mod value;
pub mod zip;
