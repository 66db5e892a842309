//! Cleanup Registry
//!
//! Records the instances this process created so they can be deleted after a
//! crash. Handles are added as soon as an instance is created and removed once
//! it has been deleted.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use droid_fleet_core::{FleetError, InstanceHandle, Result};

/// Durable record of instance handles owned by this process
#[async_trait]
pub trait CleanupRegistry: Send + Sync {
    /// Register a handle. Registering a known handle is a no-op.
    async fn allocate_device(&self, handle: InstanceHandle) -> Result<()>;

    /// Remove a handle. Removing an unknown handle is a no-op.
    async fn dispose_device(&self, handle: &InstanceHandle) -> Result<()>;

    /// Handles currently registered
    async fn handles(&self) -> Result<Vec<InstanceHandle>>;
}

/// Process-local cleanup registry
#[derive(Default)]
pub struct InMemoryCleanupRegistry {
    handles: Mutex<BTreeMap<String, InstanceHandle>>,
}

impl InMemoryCleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handle: &InstanceHandle) -> bool {
        self.handles.lock().contains_key(&handle.uuid)
    }
}

#[async_trait]
impl CleanupRegistry for InMemoryCleanupRegistry {
    async fn allocate_device(&self, handle: InstanceHandle) -> Result<()> {
        self.handles.lock().insert(handle.uuid.clone(), handle);
        Ok(())
    }

    async fn dispose_device(&self, handle: &InstanceHandle) -> Result<()> {
        self.handles.lock().remove(&handle.uuid);
        Ok(())
    }

    async fn handles(&self) -> Result<Vec<InstanceHandle>> {
        Ok(self.handles.lock().values().cloned().collect())
    }
}

/// One persisted registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupEntry {
    #[serde(flatten)]
    pub handle: InstanceHandle,
    /// Process that registered the handle
    pub pid: u32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CleanupFile {
    #[serde(default)]
    devices: Vec<CleanupEntry>,
}

/// Cleanup registry persisted as a JSON file
///
/// Every process points at the same file, so each read-modify-write holds an
/// exclusive lock on a sibling `.lock` file. The new contents go to a uniquely
/// named temporary file that is renamed over the registry, so a crash never
/// leaves a half-written registry behind.
pub struct FileCleanupRegistry {
    path: PathBuf,
}

impl FileCleanupRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted entries, including their owner and registration time
    pub async fn entries(&self) -> Result<Vec<CleanupEntry>> {
        self.locked(|file| Ok((file.devices.clone(), false))).await
    }

    /// Run `change` on the current contents under the file lock. The file is
    /// rewritten when `change` reports a modification.
    async fn locked<T, F>(&self, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut CleanupFile) -> Result<(T, bool)> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let dir = registry_dir(&path);
            std::fs::create_dir_all(dir)?;

            let lock = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(lock_path(&path))?;
            lock.lock_exclusive()?;

            let mut file = read_file(&path)?;
            let (value, modified) = change(&mut file)?;
            if modified {
                write_file(dir, &path, &file)?;
            }
            // closing `lock` releases it
            Ok(value)
        })
        .await
        .map_err(|e| FleetError::CleanupRegistry(format!("registry task failed: {}", e)))?
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

fn registry_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn read_file(path: &Path) -> Result<CleanupFile> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(CleanupFile::default()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            FleetError::CleanupRegistry(format!("corrupt registry {:?}: {}", path, e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CleanupFile::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_file(dir: &Path, path: &Path, file: &CleanupFile) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, file)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CleanupRegistry for FileCleanupRegistry {
    async fn allocate_device(&self, handle: InstanceHandle) -> Result<()> {
        let path = self.path.clone();
        self.locked(move |file| {
            if file.devices.iter().any(|entry| entry.handle == handle) {
                return Ok(((), false));
            }

            info!("Registering {} for cleanup in {:?}", handle.uuid, path);
            file.devices.push(CleanupEntry {
                handle,
                pid: std::process::id(),
                registered_at: Utc::now(),
            });
            Ok(((), true))
        })
        .await
    }

    async fn dispose_device(&self, handle: &InstanceHandle) -> Result<()> {
        let handle = handle.clone();
        self.locked(move |file| {
            let before = file.devices.len();
            file.devices.retain(|entry| entry.handle != handle);
            let removed = file.devices.len() != before;
            if removed {
                debug!("Disposed cleanup record for {}", handle.uuid);
            }
            Ok(((), removed))
        })
        .await
    }

    async fn handles(&self) -> Result<Vec<InstanceHandle>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|entry| entry.handle)
            .collect())
    }
}
