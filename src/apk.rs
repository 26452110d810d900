//! One opened package: its decoded manifest, resource table and bytecode containers.

use crate::android::binary_xml::{parse_document, XmlElement};
use crate::android::chunk::{DecodeError, DecodeResult};
use crate::android::config::ResConfig;
use crate::android::manifest::{ManifestPrinter, RenderedManifest};
use crate::android::res_table::ResTable;
use crate::android::resolve::TableIndex;
use crate::android::zip::{ApkFile, ApkZipError};
use crate::inventory::{collect_dex_inventory, collect_resource_strings, DexInventory};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek};
use std::path::Path;

pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";
pub const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";

const DEX_NAME_MARKER: &str = ".dex";
const DEX_MIN_LEN: usize = 4;

/// An artifact some operations require.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Artifact {
    Manifest,
    ResourceTable,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Manifest => write!(f, "{MANIFEST_ENTRY}"),
            Artifact::ResourceTable => write!(f, "{RESOURCE_TABLE_ENTRY}"),
        }
    }
}

/// A step of [`Apk::all`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Manifest,
    Strings,
    Dexes,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Manifest => write!(f, "manifest"),
            Task::Strings => write!(f, "strings"),
            Task::Dexes => write!(f, "dexes"),
        }
    }
}

#[derive(Debug)]
pub enum ApkError {
    /// The package is not a readable archive.
    ArchiveOpen(ApkZipError),
    /// An artifact is present but its bytes do not decode.
    Decode { artifact: Artifact, source: DecodeError },
    /// The operation needs an artifact the package does not contain.
    MissingArtifact(Artifact),
    /// A step of a combined operation failed.
    TaskFailed { task: Task, source: Box<ApkError> },
}

impl fmt::Display for ApkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApkError::ArchiveOpen(err) => write!(f, "failed opening package: {err}"),
            ApkError::Decode { artifact, source } => write!(f, "failed decoding {artifact}: {source}"),
            ApkError::MissingArtifact(artifact) => write!(f, "package has no {artifact}"),
            ApkError::TaskFailed { task, source } => write!(f, "{task} failed: {source}"),
        }
    }
}

impl std::error::Error for ApkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApkError::ArchiveOpen(err) => Some(err),
            ApkError::Decode { source, .. } => Some(source),
            ApkError::MissingArtifact(_) => None,
            ApkError::TaskFailed { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<ApkZipError> for ApkError {
    fn from(value: ApkZipError) -> Self {
        ApkError::ArchiveOpen(value)
    }
}

impl ApkError {
    /// The innermost error, past any task wrappers.
    pub fn root(&self) -> &ApkError {
        match self {
            ApkError::TaskFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Resource strings under their table's entry name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStrings {
    pub strings: Vec<String>,
}

/// Combined result of [`Apk::all`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllTasks {
    pub manifest: String,
    #[serde(rename = "displayNames")]
    pub display_names: BTreeMap<String, String>,
    #[serde(rename = "resources.arsc")]
    pub resources: ResourceStrings,
    #[serde(flatten)]
    pub dexes: DexInventory,
}

/// A package decoded once at open time and read-only afterwards.
pub struct Apk {
    manifest: Option<DecodeResult<XmlElement>>,
    table: Option<DecodeResult<ResTable>>,
    index: TableIndex,
    containers: Vec<(String, Vec<u8>)>,
}

impl Apk {
    pub fn open(path: impl AsRef<Path>) -> Result<Apk, ApkError> {
        let archive = ApkFile::from_file(path)?;
        Ok(Apk::from_archive(archive))
    }

    /// Decode the manifest and resource table and collect the bytecode containers.
    ///
    /// Read and decode failures are kept and reported by the operations that need the artifact.
    /// Containers that cannot be read are skipped.
    pub fn from_archive<R: Read + Seek>(mut archive: ApkFile<R>) -> Apk {
        let table = archive
            .read(RESOURCE_TABLE_ENTRY)
            .map(|read| read_artifact(read).and_then(|bytes| ResTable::parse(&bytes)));
        let index = match &table {
            Some(Ok(table)) => TableIndex::build(table, &ResConfig::canonical()),
            Some(Err(err)) => {
                warn!("{RESOURCE_TABLE_ENTRY}: {err}");
                TableIndex::default()
            }
            None => TableIndex::default(),
        };

        let manifest = archive
            .read(MANIFEST_ENTRY)
            .map(|read| read_artifact(read).and_then(|bytes| parse_document(&bytes)));
        if let Some(Err(err)) = &manifest {
            warn!("{MANIFEST_ENTRY}: {err}");
        }

        let candidates: Vec<String> = archive
            .entry_names()
            .filter(|name| name.contains(DEX_NAME_MARKER))
            .map(str::to_string)
            .collect();
        let mut containers = Vec::new();
        for name in candidates {
            let data = match archive.read(&name) {
                Some(Ok(data)) => data,
                Some(Err(err)) => {
                    warn!("skipping {name}: {err}");
                    continue;
                }
                None => continue,
            };
            if data.len() < DEX_MIN_LEN {
                warn!("skipping {name}: {} bytes is too short for a container", data.len());
                continue;
            }
            containers.push((name, data));
        }

        info!(
            "loaded package: manifest {}, {} resolved resources, {} container candidates",
            if manifest.is_some() { "present" } else { "absent" },
            index.len(),
            containers.len()
        );
        Apk {
            manifest,
            table,
            index,
            containers,
        }
    }

    fn manifest_tree(&self) -> Result<&XmlElement, ApkError> {
        match &self.manifest {
            None => Err(ApkError::MissingArtifact(Artifact::Manifest)),
            Some(Err(source)) => Err(ApkError::Decode {
                artifact: Artifact::Manifest,
                source: source.clone(),
            }),
            Some(Ok(root)) => Ok(root),
        }
    }

    fn resource_table(&self) -> Result<&ResTable, ApkError> {
        match &self.table {
            None => Err(ApkError::MissingArtifact(Artifact::ResourceTable)),
            Some(Err(source)) => Err(ApkError::Decode {
                artifact: Artifact::ResourceTable,
                source: source.clone(),
            }),
            Some(Ok(table)) => Ok(table),
        }
    }

    fn render_manifest(&self) -> Result<RenderedManifest, ApkError> {
        let root = self.manifest_tree()?;
        let table = self.table.as_ref().and_then(|table| table.as_ref().ok());
        Ok(ManifestPrinter::new(&self.index, table).print(root))
    }

    /// The manifest as indented XML with resource references resolved.
    pub fn manifest(&self) -> Result<String, ApkError> {
        self.render_manifest().map(|rendered| rendered.text)
    }

    /// The application label per locale, keyed `application-label[-<locale>]`.
    pub fn display_names(&self) -> Result<BTreeMap<String, String>, ApkError> {
        self.render_manifest().map(|rendered| rendered.display_names)
    }

    /// The resource table's string pool, normalized.
    pub fn strings(&self) -> Result<Vec<String>, ApkError> {
        let table = self.resource_table()?;
        Ok(collect_resource_strings(table.strings()))
    }

    /// Class names and string literals of every valid container. Never fails.
    pub fn dexes(&self) -> DexInventory {
        collect_dex_inventory(
            self.containers
                .iter()
                .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
        )
    }

    /// Every operation at once; the first failing step fails the whole.
    pub fn all(&self) -> Result<AllTasks, ApkError> {
        let rendered = self.render_manifest().map_err(task_failed(Task::Manifest))?;
        let strings = self.strings().map_err(task_failed(Task::Strings))?;
        Ok(AllTasks {
            manifest: rendered.text,
            display_names: rendered.display_names,
            resources: ResourceStrings { strings },
            dexes: self.dexes(),
        })
    }
}

fn read_artifact(read: Result<Vec<u8>, ApkZipError>) -> DecodeResult<Vec<u8>> {
    read.map_err(|err| DecodeError::Unreadable(err.to_string()))
}

fn task_failed(task: Task) -> impl FnOnce(ApkError) -> ApkError {
    move |source| ApkError::TaskFailed {
        task,
        source: Box::new(source),
    }
}

/// Serialize with a four-space indent.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    // serde_json only ever writes valid UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}
