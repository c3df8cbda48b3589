//! Directory-backed backend, safe for concurrent use by several processes.
//!
//! Layout under the backend root:
//!
//! ```text
//! <root>/
//! ├─ .registry.lock       # serializes log creation
//! └─ <log name>/
//!    ├─ META              # LogMetadata (CBOR), written last on create
//!    ├─ SEQ               # position counter, u64 little-endian
//!    ├─ SEQ.lock
//!    ├─ stripe.<k>        # BTreeMap<position, Entry> (CBOR)
//!    └─ stripe.<k>.lock
//! ```
//!
//! Every mutation takes an exclusive advisory lock on the object's lock
//! file, reads the object, and replaces it with write-temp, fsync, rename.
//! Readers never lock: a rename is atomic, so they observe either the old
//! or the new object.

use crate::backend::LogBackend;
use crate::entry::{CasOutcome, Entry, EntryState, LogMetadata};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const REGISTRY_LOCK: &str = ".registry.lock";
const META_FILE: &str = "META";
const SEQ_FILE: &str = "SEQ";
const SEQ_LOCK: &str = "SEQ.lock";

type Stripe = BTreeMap<u64, Entry>;

/// A directory-backed backend.
///
/// Several `FileBackend` handles, in one process or many, may share a root
/// directory. Atomicity of `allocate` and `compare_and_swap` comes from
/// exclusive `flock`-style locks, not from any in-process state.
///
/// # Example
///
/// ```no_run
/// use zlog_storage::{FileBackend, LogBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("/var/lib/zlog")).unwrap();
/// backend.create_log("events", 8).unwrap();
/// let first = backend.allocate("events", 1).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    /// META is immutable once written, so lookups are cached per handle.
    metadata: RwLock<HashMap<String, LogMetadata>>,
}

/// Exclusive advisory lock, released on drop.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl FileBackend {
    /// Opens a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            metadata: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the logs registered under the root, sorted by name.
    pub fn log_names(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for dirent in fs::read_dir(&self.root)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_dir() {
                continue;
            }
            if dirent.path().join(META_FILE).exists() {
                if let Some(name) = dirent.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn log_dir(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn metadata(&self, name: &str) -> StorageResult<LogMetadata> {
        if let Some(meta) = self.metadata.read().get(name) {
            return Ok(meta.clone());
        }

        let path = self.log_dir(name)?.join(META_FILE);
        let meta: LogMetadata = read_object(&path)?.ok_or_else(|| StorageError::LogNotFound {
            name: name.to_string(),
        })?;
        self.metadata
            .write()
            .insert(name.to_string(), meta.clone());
        Ok(meta)
    }

    fn stripe_paths(&self, name: &str, position: u64) -> StorageResult<(PathBuf, PathBuf)> {
        let meta = self.metadata(name)?;
        let dir = self.log_dir(name)?;
        let stripe = meta.stripe_of(position);
        Ok((
            dir.join(format!("stripe.{stripe}")),
            dir.join(format!("stripe.{stripe}.lock")),
        ))
    }
}

impl LogBackend for FileBackend {
    fn create_log(&self, name: &str, stripe_width: u32) -> StorageResult<LogMetadata> {
        if stripe_width == 0 {
            return Err(StorageError::InvalidArgument(
                "stripe width must be positive".into(),
            ));
        }
        let dir = self.log_dir(name)?;

        let _registry = LockGuard::acquire(&self.root.join(REGISTRY_LOCK))?;
        if dir.join(META_FILE).exists() {
            return Err(StorageError::LogExists {
                name: name.to_string(),
            });
        }

        // A directory without META is a creation that never finished.
        fs::create_dir_all(&dir)?;
        write_counter(&dir, 0)?;

        let meta = LogMetadata {
            name: name.to_string(),
            stripe_width,
        };
        write_object(&dir.join(META_FILE), &meta)?;
        sync_directory(&self.root)?;

        self.metadata
            .write()
            .insert(name.to_string(), meta.clone());
        Ok(meta)
    }

    fn log_metadata(&self, name: &str) -> StorageResult<LogMetadata> {
        self.metadata(name)
    }

    fn tail(&self, name: &str) -> StorageResult<u64> {
        self.metadata(name)?;
        read_counter(&self.log_dir(name)?)
    }

    fn allocate(&self, name: &str, count: u64) -> StorageResult<u64> {
        if count == 0 {
            return Err(StorageError::InvalidArgument(
                "cannot allocate zero positions".into(),
            ));
        }
        self.metadata(name)?;
        let dir = self.log_dir(name)?;

        let _lock = LockGuard::acquire(&dir.join(SEQ_LOCK))?;
        let first = read_counter(&dir)?;
        let next = first
            .checked_add(count)
            .ok_or_else(|| StorageError::InvalidArgument("position space exhausted".into()))?;
        write_counter(&dir, next)?;
        Ok(first)
    }

    fn read_entry(&self, name: &str, position: u64) -> StorageResult<Entry> {
        let (path, _) = self.stripe_paths(name, position)?;
        let stripe: Stripe = read_object(&path)?.unwrap_or_default();
        Ok(stripe.get(&position).cloned().unwrap_or_default())
    }

    fn read_range(&self, name: &str, start: u64, end: u64) -> StorageResult<Vec<Entry>> {
        let meta = self.metadata(name)?;
        let dir = self.log_dir(name)?;

        let mut stripes: HashMap<u32, Stripe> = HashMap::new();
        let mut entries = Vec::with_capacity(end.saturating_sub(start) as usize);
        for position in start..end {
            let index = meta.stripe_of(position);
            let stripe = match stripes.entry(index) {
                std::collections::hash_map::Entry::Occupied(slot) => slot.into_mut(),
                std::collections::hash_map::Entry::Vacant(slot) => {
                    let loaded = read_object(&dir.join(format!("stripe.{index}")))?;
                    slot.insert(loaded.unwrap_or_default())
                }
            };
            entries.push(stripe.get(&position).cloned().unwrap_or_default());
        }
        Ok(entries)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        position: u64,
        expected: EntryState,
        entry: Entry,
    ) -> StorageResult<CasOutcome> {
        let (path, lock_path) = self.stripe_paths(name, position)?;

        let _lock = LockGuard::acquire(&lock_path)?;
        let mut stripe: Stripe = read_object(&path)?.unwrap_or_default();

        let current = stripe.get(&position).cloned().unwrap_or_default();
        if current.state != expected {
            return Ok(CasOutcome::Mismatch(current));
        }

        stripe.insert(position, entry);
        write_object(&path, &stripe)?;
        Ok(CasOutcome::Swapped)
    }
}

fn validate_name(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn read_object<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    ciborium::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_object<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let temp_path = temp_path_for(path);
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(value, &mut writer)
            .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn read_counter(dir: &Path) -> StorageResult<u64> {
    match fs::read(dir.join(SEQ_FILE)) {
        Ok(bytes) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                StorageError::Corrupted(format!("SEQ has {} bytes, expected 8", bytes.len()))
            })?;
            Ok(u64::from_le_bytes(raw))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn write_counter(dir: &Path, value: u64) -> StorageResult<()> {
    let path = dir.join(SEQ_FILE);
    let temp_path = temp_path_for(&path);
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&value.to_le_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, &path)?;
    Ok(())
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    Ok(())
}
