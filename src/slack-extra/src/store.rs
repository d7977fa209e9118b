//! Local persistence.
//!
//! Three kinds of records live under the data directory:
//! - spoilers, keyed by the posted message's channel and ts, kept until
//!   someone presses "View spoiler"
//! - anchor configurations, one per channel
//! - movers, named groups of channels whose members are kept in sync

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{SlackError, SlackResult};

/// A posted spoiler and its revealed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSpoiler {
    pub channel: String,
    pub message_ts: String,
    /// Revealed rich-text document, verbatim.
    pub message: Value,
    /// Who posted it.
    pub user: String,
    pub created_at: DateTime<Utc>,
}

impl StoredSpoiler {
    pub fn new(
        channel: impl Into<String>,
        message_ts: impl Into<String>,
        message: Value,
        user: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            message_ts: message_ts.into(),
            message,
            user: user.into(),
            created_at: Utc::now(),
        }
    }
}

/// A message kept at the bottom of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub channel: String,
    pub enabled: bool,
    /// Rich-text block posted as the anchor.
    pub message: Value,
    /// ts of the currently posted copy.
    pub message_ts: String,
    /// Who configured it last.
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnchorConfig {
    pub fn new(
        channel: impl Into<String>,
        message: Value,
        message_ts: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            channel: channel.into(),
            enabled: true,
            message,
            message_ts: message_ts.into(),
            user: user.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Channels whose new members are added to every other channel of the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverConfig {
    pub id: String,
    pub name: String,
    /// Who set it up.
    pub user: String,
    pub channels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl MoverConfig {
    pub fn new(name: impl Into<String>, user: impl Into<String>, channels: Vec<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: format!("{:x}", created_at.timestamp_micros()),
            name: name.into(),
            user: user.into(),
            channels,
            created_at,
        }
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
    }
}

#[async_trait]
pub trait SpoilerStore: Send + Sync {
    /// Insert or replace the record for `(channel, message_ts)`.
    async fn save(&self, spoiler: &StoredSpoiler) -> SlackResult<()>;

    async fn get(&self, channel: &str, message_ts: &str) -> SlackResult<Option<StoredSpoiler>>;

    /// Returns whether a record existed.
    async fn delete(&self, channel: &str, message_ts: &str) -> SlackResult<bool>;
}

#[async_trait]
pub trait AnchorStore: Send + Sync {
    /// Insert or replace the channel's anchor.
    async fn save_anchor(&self, anchor: &AnchorConfig) -> SlackResult<()>;

    async fn anchor(&self, channel: &str) -> SlackResult<Option<AnchorConfig>>;
}

#[async_trait]
pub trait MoverStore: Send + Sync {
    /// Insert or replace the mover with `mover.id`.
    async fn save_mover(&self, mover: &MoverConfig) -> SlackResult<()>;

    async fn mover(&self, id: &str) -> SlackResult<Option<MoverConfig>>;

    /// Every mover, oldest first.
    async fn movers(&self) -> SlackResult<Vec<MoverConfig>>;
}

/// Everything the handlers persist.
pub trait Store: SpoilerStore + AnchorStore + MoverStore {}

impl<T: SpoilerStore + AnchorStore + MoverStore> Store for T {}

/// One pretty-printed JSON file per record under `<root>/spoilers/`,
/// `<root>/anchors/` and `<root>/movers/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

/// Keep ids from escaping the store directory.
fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

async fn write_json<T: Serialize>(dir: &Path, path: &Path, record: &T) -> SlackResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
    }

    let content = serde_json::to_string_pretty(record)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;

    #[cfg(unix)]
    {
        if let Ok(dir) = fs::File::open(dir).await {
            let _ = dir.sync_all().await;
        }
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> SlackResult<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let record = serde_json::from_str(&content)
        .map_err(|e| SlackError::Storage(format!("Corrupt record {}: {}", path.display(), e)))?;
    Ok(Some(record))
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Create the store directories.
    pub async fn init(&self) -> SlackResult<()> {
        for dir in [self.spoiler_dir(), self.anchor_dir(), self.mover_dir()] {
            fs::create_dir_all(&dir).await?;
        }
        info!(dir = %self.root.display(), "Store initialized");
        Ok(())
    }

    pub fn spoiler_dir(&self) -> PathBuf {
        self.root.join("spoilers")
    }

    pub fn anchor_dir(&self) -> PathBuf {
        self.root.join("anchors")
    }

    pub fn mover_dir(&self) -> PathBuf {
        self.root.join("movers")
    }

    fn spoiler_path(&self, channel: &str, message_ts: &str) -> PathBuf {
        self.spoiler_dir().join(format!(
            "{}_{}.json",
            file_component(channel),
            file_component(message_ts)
        ))
    }

    fn anchor_path(&self, channel: &str) -> PathBuf {
        self.anchor_dir()
            .join(format!("{}.json", file_component(channel)))
    }

    fn mover_path(&self, id: &str) -> PathBuf {
        self.mover_dir().join(format!("{}.json", file_component(id)))
    }
}

#[async_trait]
impl SpoilerStore for FileStore {
    async fn save(&self, spoiler: &StoredSpoiler) -> SlackResult<()> {
        let path = self.spoiler_path(&spoiler.channel, &spoiler.message_ts);
        write_json(&self.spoiler_dir(), &path, spoiler).await?;
        debug!(channel = %spoiler.channel, ts = %spoiler.message_ts, "Spoiler saved");
        Ok(())
    }

    async fn get(&self, channel: &str, message_ts: &str) -> SlackResult<Option<StoredSpoiler>> {
        read_json(&self.spoiler_path(channel, message_ts)).await
    }

    async fn delete(&self, channel: &str, message_ts: &str) -> SlackResult<bool> {
        match fs::remove_file(self.spoiler_path(channel, message_ts)).await {
            Ok(()) => {
                debug!(channel, ts = message_ts, "Spoiler deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AnchorStore for FileStore {
    async fn save_anchor(&self, anchor: &AnchorConfig) -> SlackResult<()> {
        let path = self.anchor_path(&anchor.channel);
        write_json(&self.anchor_dir(), &path, anchor).await?;
        debug!(channel = %anchor.channel, enabled = anchor.enabled, "Anchor saved");
        Ok(())
    }

    async fn anchor(&self, channel: &str) -> SlackResult<Option<AnchorConfig>> {
        read_json(&self.anchor_path(channel)).await
    }
}

#[async_trait]
impl MoverStore for FileStore {
    async fn save_mover(&self, mover: &MoverConfig) -> SlackResult<()> {
        let path = self.mover_path(&mover.id);
        write_json(&self.mover_dir(), &path, mover).await?;
        debug!(id = %mover.id, channels = mover.channels.len(), "Mover saved");
        Ok(())
    }

    async fn mover(&self, id: &str) -> SlackResult<Option<MoverConfig>> {
        read_json(&self.mover_path(id)).await
    }

    async fn movers(&self) -> SlackResult<Vec<MoverConfig>> {
        let mut entries = match fs::read_dir(self.mover_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut movers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(mover) = read_json::<MoverConfig>(&path).await? {
                movers.push(mover);
            }
        }
        movers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(movers)
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    spoilers: RwLock<HashMap<(String, String), StoredSpoiler>>,
    anchors: RwLock<HashMap<String, AnchorConfig>>,
    movers: RwLock<Vec<MoverConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored spoilers.
    pub async fn len(&self) -> usize {
        self.spoilers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.spoilers.read().await.is_empty()
    }
}

#[async_trait]
impl SpoilerStore for MemoryStore {
    async fn save(&self, spoiler: &StoredSpoiler) -> SlackResult<()> {
        self.spoilers.write().await.insert(
            (spoiler.channel.clone(), spoiler.message_ts.clone()),
            spoiler.clone(),
        );
        Ok(())
    }

    async fn get(&self, channel: &str, message_ts: &str) -> SlackResult<Option<StoredSpoiler>> {
        Ok(self
            .spoilers
            .read()
            .await
            .get(&(channel.to_string(), message_ts.to_string()))
            .cloned())
    }

    async fn delete(&self, channel: &str, message_ts: &str) -> SlackResult<bool> {
        Ok(self
            .spoilers
            .write()
            .await
            .remove(&(channel.to_string(), message_ts.to_string()))
            .is_some())
    }
}

#[async_trait]
impl AnchorStore for MemoryStore {
    async fn save_anchor(&self, anchor: &AnchorConfig) -> SlackResult<()> {
        self.anchors
            .write()
            .await
            .insert(anchor.channel.clone(), anchor.clone());
        Ok(())
    }

    async fn anchor(&self, channel: &str) -> SlackResult<Option<AnchorConfig>> {
        Ok(self.anchors.read().await.get(channel).cloned())
    }
}

#[async_trait]
impl MoverStore for MemoryStore {
    async fn save_mover(&self, mover: &MoverConfig) -> SlackResult<()> {
        let mut movers = self.movers.write().await;
        match movers.iter_mut().find(|m| m.id == mover.id) {
            Some(existing) => *existing = mover.clone(),
            None => movers.push(mover.clone()),
        }
        Ok(())
    }

    async fn mover(&self, id: &str) -> SlackResult<Option<MoverConfig>> {
        Ok(self.movers.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn movers(&self) -> SlackResult<Vec<MoverConfig>> {
        Ok(self.movers.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn spoiler(ts: &str) -> StoredSpoiler {
        StoredSpoiler::new(
            "C123",
            ts,
            json!([{"type": "rich_text", "elements": []}]),
            "U1",
        )
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        store.init().await.unwrap();

        let saved = spoiler("1700000000.000100");
        store.save(&saved).await.unwrap();

        let loaded = store.get("C123", "1700000000.000100").await.unwrap();
        assert_eq!(loaded, Some(saved));
        assert!(store.spoiler_dir().join("C123_1700000000.000100.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_missing_and_delete() {
        let temp = TempDir::new().unwrap();
        // No init: save creates the directory.
        let store = FileStore::new(temp.path());

        assert_eq!(store.get("C123", "1.1").await.unwrap(), None);
        assert!(!store.delete("C123", "1.1").await.unwrap());

        store.save(&spoiler("1.1")).await.unwrap();
        assert!(store.delete("C123", "1.1").await.unwrap());
        assert_eq!(store.get("C123", "1.1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_replaces_record() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        store.save(&spoiler("2.2")).await.unwrap();
        let mut updated = spoiler("2.2");
        updated.user = "U2".to_string();
        store.save(&updated).await.unwrap();

        let loaded = store.get("C123", "2.2").await.unwrap().unwrap();
        assert_eq!(loaded.user, "U2");
    }

    #[tokio::test]
    async fn test_file_store_sanitizes_keys() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        let mut sneaky = spoiler("../../etc");
        sneaky.channel = "../C1".to_string();
        store.save(&sneaky).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(store.spoiler_dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(store.get("../C1", "../../etc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        store.init().await.unwrap();
        std::fs::write(store.spoiler_dir().join("C123_3.3.json"), "{not json").unwrap();

        let err = store.get("C123", "3.3").await.unwrap_err();
        assert!(matches!(err, SlackError::Storage(_)));
    }

    #[tokio::test]
    async fn test_file_store_anchors() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        assert_eq!(store.anchor("C1").await.unwrap(), None);

        let mut anchor = AnchorConfig::new("C1", json!({"type": "rich_text"}), "1.1", "U1");
        store.save_anchor(&anchor).await.unwrap();
        assert!(store.anchor_dir().join("C1.json").exists());

        anchor.enabled = false;
        anchor.message_ts = "1.2".to_string();
        store.save_anchor(&anchor).await.unwrap();

        let loaded = store.anchor("C1").await.unwrap().unwrap();
        assert!(!loaded.enabled);
        assert_eq!(loaded.message_ts, "1.2");
    }

    #[tokio::test]
    async fn test_file_store_movers() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        assert!(store.movers().await.unwrap().is_empty());

        let first = MoverConfig {
            id: "a1".into(),
            name: "lounge".into(),
            user: "U1".into(),
            channels: vec!["C1".into(), "C2".into()],
            created_at: Utc::now(),
        };
        let mut second = first.clone();
        second.id = "b2".into();
        second.channels = vec!["C3".into(), "C4".into()];
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        store.save_mover(&second).await.unwrap();
        store.save_mover(&first).await.unwrap();
        std::fs::write(store.mover_dir().join("notes.txt"), "ignored").unwrap();

        let movers = store.movers().await.unwrap();
        assert_eq!(
            movers.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["a1", "b2"]
        );
        assert!(store.mover("b2").await.unwrap().unwrap().contains("C4"));
        assert_eq!(store.mover("zz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.save(&spoiler("1.1")).await.unwrap();
        store.save(&spoiler("1.2")).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("C123", "1.2").await.unwrap().unwrap().message_ts, "1.2");

        assert!(store.delete("C123", "1.1").await.unwrap());
        assert!(!store.delete("C123", "1.1").await.unwrap());
        assert_eq!(store.get("C999", "1.2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_replaces_mover() {
        let store = MemoryStore::new();
        let mut mover = MoverConfig::new("pair", "U1", vec!["C1".into(), "C2".into()]);
        store.save_mover(&mover).await.unwrap();

        mover.channels.push("C3".into());
        store.save_mover(&mover).await.unwrap();

        let movers = store.movers().await.unwrap();
        assert_eq!(movers.len(), 1);
        assert_eq!(movers[0].channels.len(), 3);
    }
}
