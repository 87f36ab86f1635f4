use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ab_session::persistence::KeyValueStore;

use crate::survey::*;

/// A store keeping one JSON file per key in a directory.
///
/// Values are written to a temporary file first and then renamed, so that a
/// crash in the middle of a write leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> AppResult<FileStore> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context(CreatingStoreSnafu {
            path: dir.display().to_string(),
        })?;
        debug!("FileStore::open: {}", dir.display());
        Ok(FileStore { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.key_path(key))
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            x => x,
        }
    }
}
