//! File-backed [`KeyPairStore`].
//!
//! Each connection owns two files under the store root: `<id>.json` with the
//! key pair record and `<id>.pem` with the private key.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};

use crate::cloudstack::CloudstackError;
use crate::key_pair::{KeyPair, KeyPairStore};

#[derive(Debug, Deserialize, Serialize)]
struct StoredRecord {
    connection_id: u64,
    name: String,
}

/// Stores key pairs as files in one directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileKeyPairStore {
    root: Utf8PathBuf,
}

fn record_file(connection_id: u64) -> String {
    format!("{connection_id}.json")
}

fn secret_file(connection_id: u64) -> String {
    format!("{connection_id}.pem")
}

impl FileKeyPairStore {
    /// Store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the files.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn io_error(&self, file: &str, err: &io::Error) -> CloudstackError {
        CloudstackError::Store {
            message: format!("{}: {err}", self.root.join(file)),
        }
    }

    /// Opens the root, or `None` when it does not exist yet.
    fn open(&self) -> Result<Option<Dir>, CloudstackError> {
        match Dir::open_ambient_dir(&self.root, ambient_authority()) {
            Ok(dir) => Ok(Some(dir)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error("", &err)),
        }
    }

    fn open_or_create(&self) -> Result<Dir, CloudstackError> {
        Dir::create_ambient_dir_all(&self.root, ambient_authority())
            .map_err(|err| self.io_error("", &err))?;
        Dir::open_ambient_dir(&self.root, ambient_authority())
            .map_err(|err| self.io_error("", &err))
    }

    fn remove(&self, file: &str) -> Result<(), CloudstackError> {
        let Some(dir) = self.open()? else {
            return Ok(());
        };
        match dir.remove_file(file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(file, &err)),
        }
    }
}

/// Writes a private key readable by the owner only.
///
/// Any earlier file is removed first so its permissions are not inherited.
#[cfg(unix)]
fn write_secret(dir: &Dir, name: &str, contents: &[u8]) -> io::Result<()> {
    use cap_std::fs::{OpenOptions, OpenOptionsExt};
    use std::io::Write;

    match dir.remove_file(name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    let mut file = dir.open_with(name, &options)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_secret(dir: &Dir, name: &str, contents: &[u8]) -> io::Result<()> {
    dir.write(name, contents)
}

impl KeyPairStore for FileKeyPairStore {
    fn find(&self, connection_id: u64) -> Result<Option<KeyPair>, CloudstackError> {
        let Some(dir) = self.open()? else {
            return Ok(None);
        };
        let record_name = record_file(connection_id);
        let exists = dir
            .try_exists(&record_name)
            .map_err(|err| self.io_error(&record_name, &err))?;
        if !exists {
            return Ok(None);
        }

        let raw = dir
            .read_to_string(&record_name)
            .map_err(|err| self.io_error(&record_name, &err))?;
        let record: StoredRecord =
            serde_json::from_str(&raw).map_err(|err| CloudstackError::Store {
                message: format!("{}: {err}", self.root.join(&record_name)),
            })?;

        let secret_name = secret_file(connection_id);
        let secret = match dir.read_to_string(&secret_name) {
            Ok(secret) => secret,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(self.io_error(&secret_name, &err)),
        };

        Ok(Some(KeyPair {
            connection_id: record.connection_id,
            name: record.name,
            secret,
        }))
    }

    fn save(&self, key_pair: &KeyPair) -> Result<(), CloudstackError> {
        let dir = self.open_or_create()?;
        let secret_name = secret_file(key_pair.connection_id);
        write_secret(&dir, &secret_name, key_pair.secret.as_bytes())
            .map_err(|err| self.io_error(&secret_name, &err))?;

        let record = StoredRecord {
            connection_id: key_pair.connection_id,
            name: key_pair.name.clone(),
        };
        let body = serde_json::to_string_pretty(&record).map_err(|err| CloudstackError::Store {
            message: err.to_string(),
        })?;
        let record_name = record_file(key_pair.connection_id);
        dir.write(&record_name, body.as_bytes())
            .map_err(|err| self.io_error(&record_name, &err))
    }

    fn remove_secret(&self, connection_id: u64) -> Result<(), CloudstackError> {
        self.remove(&secret_file(connection_id))
    }

    fn remove_record(&self, connection_id: u64) -> Result<(), CloudstackError> {
        self.remove(&record_file(connection_id))
    }
}
