//! Append-only log file backing store
//!
//! Each map is one log file of length-framed bincode records. The file is
//! replayed into memory on open; every write appends a record. A torn record
//! at the tail (crash in the middle of an append) is cut off on open, and a
//! failed append is cut off before the next one.

use super::{KvStore, StoreFactory};
use crate::error::{DictError, Result};
use bincode::{Decode, Encode};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Size of the record length prefix
const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Encode, Decode)]
enum LogRecord {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Write end of a log file
struct LogWriter {
    file: File,
    /// Length of the complete records on disk
    len: u64,
    /// A failed append may have left a partial frame past `len`
    torn: bool,
}

impl LogWriter {
    fn append_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        if self.torn {
            self.file.set_len(self.len)?;
            self.torn = false;
        }
        if let Err(e) = self.file.write_all(frame) {
            self.torn = self.file.set_len(self.len).is_err();
            return Err(e);
        }
        self.len += frame.len() as u64;
        Ok(())
    }
}

/// Key-value map persisted as an append-only log
pub struct FileStore {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl FileStore {
    /// Open or create the log at `path` and replay it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (entries, valid_len) = replay(&data);
        if valid_len < data.len() {
            warn!(
                "Truncating {} torn bytes at the end of {}",
                data.len() - valid_len,
                path.display()
            );
            file.set_len(valid_len as u64)?;
        }
        debug!("Replayed {} entries from {}", entries.len(), path.display());

        Ok(Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                len: valid_len as u64,
                torn: false,
            }),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &LogRecord) -> Result<()> {
        let payload = bincode::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| DictError::Codec(format!("Failed to encode log record: {}", e)))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| DictError::StorageAccess("log record too large".to_string()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&payload);

        let mut writer = self.writer.lock();
        writer.append_frame(&frame).map_err(|e| {
            if writer.torn {
                warn!("Could not cut failed append from {}", self.path.display());
            }
            DictError::StorageAccess(format!(
                "Failed to append to {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // The map lock is held across the append so log order matches map order.
        let mut entries = self.entries.write();
        self.append(&LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            self.append(&LogRecord::Delete { key: key.to_vec() })?;
            entries.remove(key);
        }
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().file.sync_all()?;
        Ok(())
    }
}

/// Rebuild the map from a log, returning it with the length of the valid prefix
fn replay(data: &[u8]) -> (BTreeMap<Vec<u8>, Vec<u8>>, usize) {
    let mut entries = BTreeMap::new();
    let mut offset = 0;

    while data.len() - offset >= FRAME_HEADER_LEN {
        let header: [u8; FRAME_HEADER_LEN] = [
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ];
        let len = u32::from_be_bytes(header) as usize;
        let start = offset + FRAME_HEADER_LEN;
        if data.len() - start < len {
            break;
        }

        let decoded: std::result::Result<(LogRecord, usize), _> =
            bincode::decode_from_slice(&data[start..start + len], bincode::config::standard());
        match decoded {
            Ok((LogRecord::Put { key, value }, _)) => {
                entries.insert(key, value);
            }
            Ok((LogRecord::Delete { key }, _)) => {
                entries.remove(&key);
            }
            Err(_) => break,
        }
        offset = start + len;
    }

    (entries, offset)
}

/// Factory creating one log file per map inside a directory
pub struct FileStoreFactory {
    dir: PathBuf,
    stores: Mutex<HashMap<String, Arc<FileStore>>>,
}

impl FileStoreFactory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            DictError::Initialisation(format!(
                "Cannot create store directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            stores: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StoreFactory for FileStoreFactory {
    fn open(&self, name: &str) -> Result<Arc<dyn KvStore>> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(DictError::Initialisation(format!(
                "invalid store name '{name}'"
            )));
        }

        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(name) {
            return Ok(store.clone());
        }

        let path = self.dir.join(format!("{name}.log"));
        let store = FileStore::open(&path).map_err(|e| {
            DictError::Initialisation(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let store = Arc::new(store);
        stores.insert(name.to_string(), store.clone());
        Ok(store)
    }
}
