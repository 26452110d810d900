use log::warn;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Component, Path};
use zip::read::ZipArchive;

/// Result alias for APK (ZIP) operations.
pub type ApkZipResult<T> = Result<T, ApkZipError>;

/// Errors surfaced while reading an APK archive.
#[derive(Debug)]
pub enum ApkZipError {
    Io(io::Error),
    Zip(zip::result::ZipError),
    InvalidInput(String),
}

impl std::fmt::Display for ApkZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApkZipError::Io(err) => write!(f, "I/O error: {err}"),
            ApkZipError::Zip(err) => write!(f, "ZIP error: {err}"),
            ApkZipError::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApkZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApkZipError::Io(err) => Some(err),
            ApkZipError::Zip(err) => Some(err),
            ApkZipError::InvalidInput(_) => None,
        }
    }
}

impl From<io::Error> for ApkZipError {
    fn from(value: io::Error) -> Self {
        ApkZipError::Io(value)
    }
}

impl From<zip::result::ZipError> for ApkZipError {
    fn from(value: zip::result::ZipError) -> Self {
        ApkZipError::Zip(value)
    }
}

/// An APK (ZIP) file whose entries are read on demand.
///
/// Entry names are normalized and kept in a `BTreeMap`, so iteration order is the sorted path order
/// regardless of how the archive was written. A damaged entry only fails its own read.
pub struct ApkFile<R> {
    archive: ZipArchive<R>,
    entries: BTreeMap<String, usize>,
}

impl ApkFile<BufReader<File>> {
    /// Open an APK on disk.
    pub fn from_file(path: impl AsRef<Path>) -> ApkZipResult<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(ApkZipError::InvalidInput(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> ApkFile<R> {
    /// Index the file entries of a ZIP stream. Entries whose names escape the archive root, or
    /// whose local headers cannot be read, are skipped.
    pub fn from_reader(reader: R) -> ApkZipResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();
        for idx in 0..archive.len() {
            let entry = match archive.by_index_raw(idx) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping archive entry {idx}: {err}");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let Some(enclosed) = entry.enclosed_name() else {
                warn!("skipping archive entry with unsafe path {:?}", entry.name());
                continue;
            };
            let name = path_to_entry_name(&enclosed)?;
            entries.insert(name, idx);
        }
        Ok(ApkFile { archive, entries })
    }

    /// Iterate over entry names in sorted order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Decompress one entry (e.g., `classes.dex`). `None` when the archive has no such entry.
    pub fn read(&mut self, name: &str) -> Option<ApkZipResult<Vec<u8>>> {
        let idx = *self.entries.get(name)?;
        Some(self.read_index(idx))
    }

    fn read_index(&mut self, idx: usize) -> ApkZipResult<Vec<u8>> {
        let mut entry = self.archive.by_index(idx)?;
        // Not preallocated from the declared size.
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

fn path_to_entry_name(path: &Path) -> ApkZipResult<String> {
    let mut components = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => components.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(ApkZipError::InvalidInput(format!(
                    "invalid entry path component in {}",
                    path.display()
                )));
            }
            Component::ParentDir => {
                return Err(ApkZipError::InvalidInput(
                    "entry paths may not contain parent components".to_string(),
                ));
            }
        }
    }
    if components.is_empty() {
        return Err(ApkZipError::InvalidInput(
            "entry name must not be empty".to_string(),
        ));
    }
    Ok(components.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::zip_bytes;
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn reads_entries_by_path() {
        let bytes = zip_bytes(&[
            ("AndroidManifest.xml", b"manifest".as_slice()),
            ("classes.dex", b"dex\n".as_slice()),
            ("res/raw/notes.txt", b"".as_slice()),
        ]);
        let mut apk = ApkFile::from_reader(Cursor::new(bytes)).expect("read archive");
        assert_eq!(
            apk.entry_names().collect::<Vec<_>>(),
            ["AndroidManifest.xml", "classes.dex", "res/raw/notes.txt"]
        );
        assert_eq!(apk.read("classes.dex").expect("present").expect("readable"), b"dex\n");
        assert_eq!(apk.read("res/raw/notes.txt").expect("present").expect("readable"), b"");
        assert!(apk.read("missing").is_none());
    }

    #[test]
    fn damaged_entry_fails_only_its_own_read() {
        let payload = b"0123456789abcdef".as_slice();
        let mut bytes = zip_bytes(&[
            ("AndroidManifest.xml", b"manifest".as_slice()),
            ("classes.dex", payload),
        ]);
        let at = bytes
            .windows(payload.len())
            .position(|window| window == payload)
            .expect("stored payload");
        bytes[at + 4] ^= 0xFF;

        let mut apk = ApkFile::from_reader(Cursor::new(bytes)).expect("index survives");
        assert!(apk.read("classes.dex").expect("present").is_err());
        assert_eq!(
            apk.read("AndroidManifest.xml").expect("present").expect("readable"),
            b"manifest"
        );
    }

    #[test]
    fn rejects_non_archives() {
        let err = ApkFile::from_reader(Cursor::new(b"not a zip".to_vec()))
            .err()
            .expect("garbage is not an archive");
        assert!(matches!(err, ApkZipError::Zip(_)));
        assert!(matches!(
            ApkFile::from_file("/nonexistent/app.apk"),
            Err(ApkZipError::Io(_))
        ));
    }

    #[test]
    fn entry_names_are_normalized() {
        assert_eq!(
            path_to_entry_name(&PathBuf::from("./lib/arm64/libfoo.so")).expect("relative"),
            "lib/arm64/libfoo.so"
        );
        assert!(path_to_entry_name(&PathBuf::from("../evil")).is_err());
        assert!(path_to_entry_name(&PathBuf::from("/abs")).is_err());
        assert!(path_to_entry_name(&PathBuf::from("")).is_err());
    }
}
