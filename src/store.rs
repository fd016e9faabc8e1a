//! Artifact store: extracted text, quizzes, scripts and audio, by key.
//!
//! Keys are content-addressed (see [`ArtifactKey`]), so identical uploads map
//! to identical keys regardless of file name. The store is optimistic: a
//! caller probes with [`ArtifactStore::exists`] and then reads, and an entry
//! that vanishes in between surfaces as [`StoreError::NotFound`], which the
//! pipeline treats as a miss. Concurrent writes to the same key are
//! last-writer-wins.

use crate::config::SpeedHint;
use crate::document::ContentHash;
use crate::error::StoreError;
use crate::pipeline::extract::ExtractionMode;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// A storage key such as `audio/<sha256>_host_1.00.mp3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Wrap an arbitrary key. Validity is checked by the store.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `text/{hash}.txt`, or `text/{hash}.layer.txt` for layer-only text.
    pub fn text(hash: &ContentHash, mode: ExtractionMode) -> Self {
        Self(format!("text/{}.txt", stem(hash, mode)))
    }

    /// `quiz/{hash}.json`
    pub fn quiz(hash: &ContentHash, mode: ExtractionMode) -> Self {
        Self(format!("quiz/{}.json", stem(hash, mode)))
    }

    /// `audio/{hash}_{voice}_{speed:.2}.mp3`
    pub fn audio(hash: &ContentHash, mode: ExtractionMode, voice: &str, speed: SpeedHint) -> Self {
        Self(format!(
            "audio/{}_{}_{}.mp3",
            stem(hash, mode),
            voice,
            speed.key_fragment()
        ))
    }

    /// `script/{hash}_{voice}_{speed:.2}.txt`
    pub fn script(hash: &ContentHash, mode: ExtractionMode, voice: &str, speed: SpeedHint) -> Self {
        Self(format!(
            "script/{}_{}_{}.txt",
            stem(hash, mode),
            voice,
            speed.key_fragment()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Artifacts derived from layer-only text carry a `.layer` marker after the
/// hash.
fn stem(hash: &ContentHash, mode: ExtractionMode) -> String {
    match mode {
        ExtractionMode::Full => hash.to_string(),
        ExtractionMode::LayerOnly => format!("{}.layer", hash),
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte storage keyed by [`ArtifactKey`].
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError>;

    /// Read an artifact. Absent keys return [`StoreError::NotFound`].
    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StoreError>;

    /// Write an artifact, replacing any previous value.
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Artifacts as files under a root directory.
///
/// `put` writes to a temporary file in the destination directory and renames
/// it over the target, so readers never observe a partial artifact.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, rejecting anything that escapes it.
    pub fn path_for(&self, key: &ArtifactKey) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let raw = key.as_str();
        if raw.is_empty() {
            return Err(invalid("empty key"));
        }
        if raw.contains('\\') {
            return Err(invalid("backslash in key"));
        }
        let relative = Path::new(raw);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => return Err(invalid("'..' segment")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("absolute key"))
                }
                Component::CurDir => return Err(invalid("'.' segment")),
            }
        }
        Ok(self.root.join(relative))
    }
}

fn io_err(key: &ArtifactKey) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path).await.map_err(io_err(key))
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let data = bytes.to_vec();
        let owned_key = key.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            std::fs::create_dir_all(&dir).map_err(io_err(&owned_key))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err(&owned_key))?;
            tmp.write_all(&data).map_err(io_err(&owned_key))?;
            tmp.as_file().sync_all().map_err(io_err(&owned_key))?;
            tmp.persist(&path)
                .map_err(|e| io_err(&owned_key)(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::other(e.to_string()),
        })??;

        debug!("Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

/// Process-local store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one entry, as an external eviction would.
    pub fn remove(&self, key: &ArtifactKey) -> bool {
        self.entries
            .write()
            .map(|mut m| m.remove(key.as_str()).is_some())
            .unwrap_or(false)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned(key: &ArtifactKey) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source: std::io::Error::other("memory store lock poisoned"),
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        let map = self.entries.read().map_err(|_| poisoned(key))?;
        Ok(map.contains_key(key.as_str()))
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StoreError> {
        let map = self.entries.read().map_err(|_| poisoned(key))?;
        map.get(key.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        let mut map = self.entries.write().map_err(|_| poisoned(key))?;
        map.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> ContentHash {
        ContentHash::of(b"deck")
    }

    #[test]
    fn key_layout() {
        let h = hash();
        let full = ExtractionMode::Full;
        assert_eq!(ArtifactKey::text(&h, full).as_str(), format!("text/{h}.txt"));
        assert_eq!(ArtifactKey::quiz(&h, full).as_str(), format!("quiz/{h}.json"));
        assert_eq!(
            ArtifactKey::audio(&h, full, "host", SpeedHint::FAST).as_str(),
            format!("audio/{h}_host_1.25.mp3")
        );
        assert_eq!(
            ArtifactKey::script(&h, full, "host", SpeedHint::SLOW).as_str(),
            format!("script/{h}_host_0.80.txt")
        );
    }

    #[test]
    fn layer_only_keys_never_alias_full_keys() {
        let h = hash();
        let layer = ExtractionMode::LayerOnly;
        assert_eq!(ArtifactKey::text(&h, layer).as_str(), format!("text/{h}.layer.txt"));
        assert_eq!(ArtifactKey::quiz(&h, layer).as_str(), format!("quiz/{h}.layer.json"));
        assert_eq!(
            ArtifactKey::audio(&h, layer, "host", SpeedHint::NORMAL).as_str(),
            format!("audio/{h}.layer_host_1.00.mp3")
        );
        assert_ne!(
            ArtifactKey::script(&h, layer, "host", SpeedHint::NORMAL),
            ArtifactKey::script(&h, ExtractionMode::Full, "host", SpeedHint::NORMAL)
        );
    }

    #[test]
    fn speed_partitions_audio_keys() {
        let h = hash();
        let full = ExtractionMode::Full;
        assert_ne!(
            ArtifactKey::audio(&h, full, "host", SpeedHint::NORMAL),
            ArtifactKey::audio(&h, full, "host", SpeedHint::FAST)
        );
    }

    #[test]
    fn traversal_keys_rejected() {
        let store = FsArtifactStore::new("/tmp/artifacts");
        for bad in ["../etc/passwd", "audio/../../x", "/abs/key", "", "a\\..\\b", "./x"] {
            let err = store.path_for(&ArtifactKey::new(bad)).unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{bad:?} accepted");
        }
        assert_eq!(
            store.path_for(&ArtifactKey::new("text/abc.txt")).unwrap(),
            PathBuf::from("/tmp/artifacts/text/abc.txt")
        );
    }

    #[tokio::test]
    async fn fs_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let key = ArtifactKey::text(&hash(), ExtractionMode::Full);

        assert!(!store.exists(&key).await.unwrap());
        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));

        store.put(&key, b"first").await.unwrap();
        store.put(&key, b"second").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), b"second");

        // No temp files left next to the artifact.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("text"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn fs_put_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("root"));
        let err = store
            .put(&ArtifactKey::new("../escaped.txt"), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn memory_store_behaves_like_fs_store() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::quiz(&hash(), ExtractionMode::Full);
        assert!(!store.exists(&key).await.unwrap());
        store.put(&key, b"[]").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"[]");
        assert_eq!(store.keys(), vec![key.to_string()]);
        assert!(store.remove(&key));
        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }
}
