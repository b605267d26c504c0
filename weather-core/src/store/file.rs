use async_trait::async_trait;
use fd_lock::RwLock;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use super::{ObservationStore, QuotaStore, Snapshot, WindowUpdate};
use crate::{
    error::StoreError,
    model::{Location, Observation, QuotaWindow},
};

/// JSON-file store that can be shared by several processes.
///
/// Every operation takes an advisory lock on a sibling `.lock` file (shared
/// for reads, exclusive for writes) and works on the file's current contents,
/// so concurrent `weather` invocations see each other's appends and quota
/// increments. Writes go through a temporary file renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Opens the store at `path`. A missing file means an empty store; an
    /// unreadable one is reported here rather than on first use.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let store = Self { lock_path: path.with_extension("lock"), path };
        store.read(|_| ()).await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Snapshot) -> R + Send + 'static,
        R: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || {
            let lock = RwLock::new(open_lock_file(&lock_path)?);
            let _guard = lock.read().map_err(|source| io_error(&lock_path, source))?;
            Ok(f(&load(&path)?))
        })
        .await
        .map_err(StoreError::Worker)?
    }

    async fn write<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Snapshot) -> R + Send + 'static,
        R: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || {
            let mut lock = RwLock::new(open_lock_file(&lock_path)?);
            let _guard = lock.write().map_err(|source| io_error(&lock_path, source))?;

            let mut snapshot = load(&path)?;
            let out = f(&mut snapshot);
            save(&path, &snapshot)?;
            Ok(out)
        })
        .await
        .map_err(StoreError::Worker)?
    }
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io { path: path.display().to_string(), source }
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }

    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|source| io_error(lock_path, source))
}

fn load(path: &Path) -> Result<Snapshot, StoreError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path: path.display().to_string(), source }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Snapshot::default()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn save(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Serialize)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|source| io_error(&tmp, source))?;
    fs::rename(&tmp, path).map_err(|source| io_error(path, source))
}

#[async_trait]
impl ObservationStore for FileStore {
    async fn append(&self, observation: &Observation) -> Result<(), StoreError> {
        let observation = observation.clone();
        self.write(move |s| s.append(&observation)).await
    }

    async fn latest_for_location(
        &self,
        location: &Location,
    ) -> Result<Option<Observation>, StoreError> {
        let location = location.clone();
        self.read(move |s| s.latest_for_location(&location)).await
    }

    async fn list_for_location(&self, location: &Location) -> Result<Vec<Observation>, StoreError> {
        let location = location.clone();
        self.read(move |s| s.list_for_location(&location)).await
    }

    async fn list_for_credential(&self, credential: &str) -> Result<Vec<Observation>, StoreError> {
        let credential = credential.to_owned();
        self.read(move |s| s.list_for_credential(&credential)).await
    }
}

#[async_trait]
impl QuotaStore for FileStore {
    async fn load_window(&self, credential: &str) -> Result<Option<QuotaWindow>, StoreError> {
        let credential = credential.to_owned();
        self.read(move |s| s.load_window(&credential)).await
    }

    async fn save_window(&self, window: &QuotaWindow) -> Result<(), StoreError> {
        let window = window.clone();
        self.write(move |s| s.save_window(&window)).await
    }

    async fn update_window(
        &self,
        credential: &str,
        update: WindowUpdate,
    ) -> Result<Option<QuotaWindow>, StoreError> {
        let credential = credential.to_owned();
        self.write(move |s| s.update_window(&credential, update)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;
    use chrono::{TimeZone, Utc};

    fn observed(city: &str) -> Observation {
        Observation::new(
            Location::new(city, "DE"),
            Condition {
                code: "500".into(),
                category: "Rain".into(),
                description: "light rain".into(),
                icon: "10d".into(),
            },
            "K1",
            Utc.with_ymd_and_hms(2025, 8, 8, 9, 15, 0).unwrap(),
        )
    }

    fn bump(credential: &str) -> WindowUpdate {
        let credential = credential.to_owned();
        let at = Utc.with_ymd_and_hms(2025, 8, 8, 9, 0, 0).unwrap();
        Box::new(move |current| {
            let mut w = current.unwrap_or(QuotaWindow {
                credential,
                request_count: 0,
                window_start: at,
                last_request: at,
            });
            w.request_count += 1;
            Some(w)
        })
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).await.unwrap();

        let found = store.list_for_credential("K1").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.append(&observed("Berlin")).await.unwrap();
        let window = QuotaWindow {
            credential: "K1".into(),
            request_count: 3,
            window_start: Utc.with_ymd_and_hms(2025, 8, 8, 9, 0, 0).unwrap(),
            last_request: Utc.with_ymd_and_hms(2025, 8, 8, 9, 15, 0).unwrap(),
        };
        store.save_window(&window).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        let latest = reopened.latest_for_location(&Location::new("berlin", "de")).await.unwrap();
        assert_eq!(latest, Some(observed("Berlin")));
        assert_eq!(reopened.load_window("K1").await.unwrap(), Some(window));
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn two_handles_keep_each_others_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = FileStore::open(&path).await.unwrap();
        let second = FileStore::open(&path).await.unwrap();
        first.append(&observed("Berlin")).await.unwrap();
        second.append(&observed("Hamburg")).await.unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        let berlin = reopened.list_for_location(&Location::new("Berlin", "DE")).await.unwrap();
        let hamburg = reopened.list_for_location(&Location::new("Hamburg", "DE")).await.unwrap();
        assert_eq!(berlin.len(), 1);
        assert_eq!(hamburg.len(), 1);
        assert_eq!(first.list_for_credential("K1").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn quota_updates_from_many_handles_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = FileStore::open(&path).await.unwrap();
            tasks.push(tokio::spawn(async move { store.update_window("K1", bump("K1")).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.load_window("K1").await.unwrap().unwrap().request_count, 16);
    }

    #[tokio::test]
    async fn declined_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).await.unwrap();

        let written = store.update_window("K1", Box::new(|_| None)).await.unwrap();
        assert!(written.is_none());
        assert!(store.load_window("K1").await.unwrap().is_none());
    }
}
