//! Normalized inventories of resource strings, class names and string literals.

use crate::android::chunk::StringPool;
use crate::dex::dex_file::{is_magic_valid, DexFile};
use crate::dex::error::DexError;
use log::warn;
use serde::Serialize;
use std::collections::BTreeSet;

/// Remove every carriage return, line feed, tab and space, wherever it occurs.
pub fn strip_whitespace(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t' | ' '))
        .collect()
}

/// Pool strings in storage order, whitespace removed, empty results dropped. Duplicates are kept.
pub fn collect_resource_strings(pool: &StringPool) -> Vec<String> {
    pool.iter()
        .filter(|text| !text.is_empty())
        .map(strip_whitespace)
        .filter(|text| !text.is_empty())
        .collect()
}

/// `Lcom/example/Foo$1;` becomes `com.example.Foo`. Empty descriptors yield `None`.
pub fn class_name(descriptor: &str) -> Option<String> {
    if descriptor.is_empty() {
        return None;
    }
    let trimmed = descriptor.strip_prefix('L').unwrap_or(descriptor);
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    let outer = match trimmed.find('$') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    Some(outer.replace('/', "."))
}

/// Class names and string literals across all containers of a package.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DexInventory {
    #[serde(rename = "dex_classes")]
    pub classes: BTreeSet<String>,
    #[serde(rename = "dex_strings")]
    pub strings: BTreeSet<String>,
}

impl DexInventory {
    /// Add one decoded container.
    pub fn add(&mut self, dex: &DexFile) {
        for class_def in &dex.class_defs {
            let Some(descriptor) = dex.class_descriptor(class_def) else {
                continue;
            };
            if let Some(name) = class_name(&descriptor.to_string_lossy()) {
                self.classes.insert(name);
            }
        }
        for literal in &dex.strings {
            let text = literal.to_string_lossy();
            if text.is_empty() {
                continue;
            }
            let stripped = strip_whitespace(&text);
            if !stripped.is_empty() {
                self.strings.insert(stripped);
            }
        }
    }

    /// Union with another inventory.
    pub fn merge(&mut self, other: DexInventory) {
        self.classes.extend(other.classes);
        self.strings.extend(other.strings);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.strings.is_empty()
    }
}

/// Validate and decode one container.
pub fn read_container(bytes: &[u8]) -> Result<DexFile, DexError> {
    if !is_magic_valid(bytes) {
        return Err(DexError::new("Invalid magic value"));
    }
    DexFile::from_bytes(bytes)
}

/// Inventory every valid container; invalid ones are skipped with a warning.
pub fn collect_dex_inventory<'a, I>(containers: I) -> DexInventory
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut inventory = DexInventory::default();
    for (name, bytes) in containers {
        match read_container(bytes) {
            Ok(dex) => {
                let mut local = DexInventory::default();
                local.add(&dex);
                inventory.merge(local);
            }
            Err(err) => warn!("skipping {name}: {err}"),
        }
    }
    inventory
}
