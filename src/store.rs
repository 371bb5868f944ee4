use std::{
    collections::{BTreeMap, HashMap},
    ffi::OsString,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, RwLock};

use crate::error::StoreError;

/// File-backed map of short key -> destination URL.
///
/// The whole map lives in memory behind a reader/writer lock. Every mutation
/// is written through to disk before it returns: the map is serialised to a
/// sibling `<db>.tmp` file which is then renamed over the database file, so a
/// reader of the file only ever sees a complete version of it.
///
/// If persisting fails the in-memory change stays applied and the error is
/// returned; the next successful write (or the shutdown flush) brings the file
/// back in line.
#[derive(Debug)]
pub struct LinkStore {
    links: RwLock<HashMap<String, String>>,
    path: PathBuf,
    tmp_path: PathBuf,
    // Serialises snapshot -> write -> rename so two passes never share the temp file.
    persist: Mutex<()>,
}

impl LinkStore {
    /// Load the database at `path`. A missing or empty file yields an empty
    /// store; a file that is not valid JSON is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let links = load(&path)?;
        let tmp_path = tmp_path_for(&path);

        Ok(Self {
            links: RwLock::new(links),
            path,
            tmp_path,
            persist: Mutex::new(()),
        })
    }

    /// Look up a key. Returns a clone of the destination if present.
    pub fn get(&self, key: &str) -> Option<String> {
        self.links.read().get(key).cloned()
    }

    /// Insert or overwrite a link, then persist.
    pub fn set(&self, key: impl Into<String>, url: impl Into<String>) -> Result<(), StoreError> {
        self.links.write().insert(key.into(), url.into());
        self.save()
    }

    /// Change the destination of an existing link. Returns `Ok(false)` without
    /// touching the disk if the key is unknown.
    pub fn update(&self, key: &str, url: impl Into<String>) -> Result<bool, StoreError> {
        {
            let mut links = self.links.write();
            match links.get_mut(key) {
                Some(slot) => *slot = url.into(),
                None => return Ok(false),
            }
        }
        self.save()?;
        Ok(true)
    }

    /// Remove a link. Returns `Ok(false)` without touching the disk if the key
    /// is unknown.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        if self.links.write().remove(key).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Independent snapshot of every link.
    pub fn all(&self) -> HashMap<String, String> {
        self.links.read().clone()
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }

    /// Write the current in-memory state to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let _guard = self.persist.lock();

        // Snapshot taken after acquiring the persist lock, so the last pass to
        // run always writes the newest state.
        let data = {
            let links = self.links.read();
            let sorted: BTreeMap<&str, &str> = links
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let mut data = serde_json::to_vec_pretty(&sorted).map_err(StoreError::Encode)?;
            data.push(b'\n');
            data
        };

        write_atomic(&self.path, &self.tmp_path, &data)
    }
}

fn load(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(file = %path.display(), "No existing database file, starting fresh");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }

    let links: HashMap<String, String> =
        serde_json::from_slice(&data).map_err(|source| StoreError::Decode {
            path: path.to_owned(),
            source,
        })?;

    tracing::info!(count = links.len(), file = %path.display(), "Loaded links");
    Ok(links)
}

fn write_atomic(path: &Path, tmp_path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(tmp_path).map_err(|e| StoreError::io(tmp_path, e))?;
    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::io(tmp_path, e))?;
    drop(file);

    fs::rename(tmp_path, path).map_err(|e| StoreError::io(path, e))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_is_a_sibling() {
        let tmp = tmp_path_for(Path::new("/data/go_links.json"));
        assert_eq!(tmp, PathBuf::from("/data/go_links.json.tmp"));
    }

    #[test]
    fn all_is_a_detached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = LinkStore::open(dir.path().join("links.json")).unwrap();
        store.set("gh", "https://github.com").unwrap();

        let mut snapshot = store.all();
        snapshot.insert("evil".into(), "https://example.com".into());
        snapshot.remove("gh");

        assert_eq!(store.get("gh").as_deref(), Some("https://github.com"));
        assert_eq!(store.get("evil"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_is_pretty_printed_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        let store = LinkStore::open(&path).unwrap();
        store.set("zz", "https://z.example").unwrap();
        store.set("aa", "https://a.example").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "{\n  \"aa\": \"https://a.example\",\n  \"zz\": \"https://z.example\"\n}\n"
        );
        assert!(!store.tmp_path.exists());
    }

    #[test]
    fn save_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so the temp file cannot be created.
        let store = LinkStore::open(dir.path().join("missing").join("links.json")).unwrap();

        let err = store.set("gh", "https://github.com").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.get("gh").as_deref(), Some("https://github.com"));
    }
}
