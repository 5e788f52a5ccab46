//! This implementation of the DocumentStore trait keeps the document in a single file.
//!
//! Every save writes the whole document to a temporary file in the same directory and renames
//! it over the original, so readers see either the old document or the new one.  The new file
//! gets the permissions of the one it replaces.

use log::{debug, trace};
use snafu::ResultExt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::element::Element;
use super::{error, DocumentStore, Result};

#[derive(Debug)]
pub struct FilesystemDocumentStore {
    path: PathBuf,
}

impl FilesystemDocumentStore {
    pub fn new<P: AsRef<Path>>(path: P) -> FilesystemDocumentStore {
        FilesystemDocumentStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Helper for replacing a file atomically.  The temporary file has to live in the same
/// directory as the target so the final rename doesn't cross filesystems.
fn write_atomic<S: AsRef<str>>(path: &Path, data: S) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tempfile = NamedTempFile::new_in(dir).context(error::CreateTempfileSnafu { dir })?;
    trace!("Writing document to temporary file {}", tempfile.path().display());
    tempfile
        .write_all(data.as_ref().as_bytes())
        .context(error::TempfileWriteSnafu { path })?;
    tempfile
        .as_file()
        .sync_all()
        .context(error::TempfileWriteSnafu { path })?;

    match fs::metadata(path) {
        Ok(metadata) => fs::set_permissions(tempfile.path(), metadata.permissions())
            .context(error::CopyPermissionsSnafu { path })?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).context(error::CopyPermissionsSnafu { path }),
    }

    tempfile
        .persist(path)
        .context(error::PersistDocumentSnafu { path })?;
    Ok(())
}

impl DocumentStore for FilesystemDocumentStore {
    fn load(&self) -> Result<Element> {
        trace!("Reading configuration document {}", self.path.display());
        let xml = fs::read_to_string(&self.path).context(error::DocumentReadSnafu {
            path: &self.path,
        })?;
        Element::parse(&xml)
    }

    fn save(&mut self, root: &Element) -> Result<()> {
        let xml = root.to_xml()?;
        write_atomic(&self.path, xml)?;
        debug!("Wrote configuration document {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ConfigPath, Error};
    use std::os::unix::fs::PermissionsExt;

    static DOC: &str = "<pfsense><system><nextuid>2000</nextuid></system></pfsense>";

    fn store_with(dir: &Path, xml: &str) -> FilesystemDocumentStore {
        let path = dir.join("config.xml");
        fs::write(&path, xml).unwrap();
        FilesystemDocumentStore::new(path)
    }

    #[test]
    fn changes_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), DOC);
        let counter = ConfigPath::new("system/nextuid").unwrap();

        assert_eq!(store.allocate_counter(&counter).unwrap(), 2000);

        let reopened = FilesystemDocumentStore::new(store.path());
        assert_eq!(
            reopened.get_value(&counter).unwrap(),
            Some("2001".to_string())
        );
        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\"?>"));
        assert!(written.contains("\t\t<nextuid>2001</nextuid>"));
    }

    #[test]
    fn permissions_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), DOC);
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o600)).unwrap();

        store
            .set_value(&ConfigPath::new("system/nextuid").unwrap(), "3000")
            .unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_change_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(dir.path(), DOC);

        store
            .set_value(&ConfigPath::new("system/hostname").unwrap(), "fw")
            .unwrap_err();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), DOC);
        // No stray temporary files.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unreadable_documents() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FilesystemDocumentStore::new(dir.path().join("missing.xml"));
        assert!(matches!(
            missing.load(),
            Err(Error::DocumentRead { .. })
        ));

        let broken = store_with(dir.path(), "<pfsense><system></pfsense>");
        assert!(broken.load().is_err());
    }
}
