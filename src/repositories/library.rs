//! JSON-file backed library store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::LibraryStore;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::PlaylistEntry;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryDocument {
    #[serde(default)]
    playlists: Vec<PlaylistEntry>,
    /// playlist id → favorite channel names
    #[serde(default)]
    favorites: HashMap<String, BTreeSet<String>>,
}

/// Whole library in one JSON document, rewritten on every change
pub struct JsonFileLibraryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Missing file means an empty library; an unreadable document is
    /// treated the same and replaced on the next write
    async fn load(&self) -> RepositoryResult<LibraryDocument> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LibraryDocument::default());
            }
            Err(e) => return Err(RepositoryError::io(self.path_str(), &e)),
        };

        match serde_json::from_str(&contents) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(
                    "Library file {} is not valid JSON ({}), starting empty",
                    self.path_str(),
                    e
                );
                Ok(LibraryDocument::default())
            }
        }
    }

    async fn save(&self, document: &LibraryDocument) -> RepositoryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepositoryError::io(parent.display().to_string(), &e))?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| RepositoryError::io(tmp.display().to_string(), &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RepositoryError::io(self.path_str(), &e))?;
        debug!("Library saved to {}", self.path_str());
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for JsonFileLibraryStore {
    async fn list_playlists(&self) -> RepositoryResult<Vec<PlaylistEntry>> {
        Ok(self.load().await?.playlists)
    }

    async fn add_playlist(&self, name: &str, url: &str) -> RepositoryResult<PlaylistEntry> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let entry = PlaylistEntry::new(name, url);
        document.playlists.push(entry.clone());
        self.save(&document).await?;
        info!("Added playlist '{}' ({})", entry.name, entry.id);
        Ok(entry)
    }

    async fn remove_playlist(&self, id: &str) -> RepositoryResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let before = document.playlists.len();
        document.playlists.retain(|p| p.id != id);
        let removed = document.playlists.len() != before;
        document.favorites.remove(id);
        self.save(&document).await?;
        if removed {
            info!("Removed playlist {}", id);
        }
        Ok(removed)
    }

    async fn favorites(&self, playlist_id: &str) -> RepositoryResult<BTreeSet<String>> {
        Ok(self
            .load()
            .await?
            .favorites
            .remove(playlist_id)
            .unwrap_or_default())
    }

    async fn toggle_favorite(&self, playlist_id: &str, channel_name: &str) -> RepositoryResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let favorites = document.favorites.entry(playlist_id.to_string()).or_default();
        let added = if favorites.remove(channel_name) {
            false
        } else {
            favorites.insert(channel_name.to_string());
            true
        };
        self.save(&document).await?;
        debug!(
            "Favorite '{}' in playlist {} is now {}",
            channel_name, playlist_id, added
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelDescriptor;
    use crate::repositories::mark_favorites;

    fn store() -> (tempfile::TempDir, JsonFileLibraryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLibraryStore::new(dir.path().join("nested").join("library.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_empty_library() {
        let (_dir, store) = store();
        assert!(store.list_playlists().await.unwrap().is_empty());
        assert!(store.favorites("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_playlist_drops_favorites() {
        let (_dir, store) = store();
        let sports = store
            .add_playlist("Sports", " https://example.com/sports.m3u ")
            .await
            .unwrap();
        let news = store
            .add_playlist("News", "https://example.com/news.m3u")
            .await
            .unwrap();
        assert_eq!(sports.url, "https://example.com/sports.m3u");

        assert!(store.toggle_favorite(&sports.id, "Sports One").await.unwrap());
        assert!(store.is_favorite(&sports.id, "Sports One").await.unwrap());
        assert!(!store.is_favorite(&news.id, "Sports One").await.unwrap());

        assert!(store.remove_playlist(&sports.id).await.unwrap());
        assert!(!store.remove_playlist(&sports.id).await.unwrap());

        let remaining = store.list_playlists().await.unwrap();
        assert_eq!(remaining, vec![news]);
        assert!(store.favorites(&sports.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_twice_clears() {
        let (_dir, store) = store();
        assert!(store.toggle_favorite("p1", "A").await.unwrap());
        assert!(!store.toggle_favorite("p1", "A").await.unwrap());
        assert!(!store.is_favorite("p1", "A").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = JsonFileLibraryStore::new(&path);
        assert!(store.list_playlists().await.unwrap().is_empty());
        store.add_playlist("Fresh", "https://e/x.m3u").await.unwrap();
        assert_eq!(store.list_playlists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_favorites() {
        let (_dir, store) = store();
        store.toggle_favorite("p", "Fav").await.unwrap();
        let mut channels = vec![
            ChannelDescriptor {
                name: "Fav".to_string(),
                logo_url: None,
                group_title: None,
                tvg_id: None,
                tvg_name: None,
                encoded_stream_url: "http://h/1".to_string(),
                is_favorite: false,
            },
            ChannelDescriptor {
                name: "Other".to_string(),
                logo_url: None,
                group_title: None,
                tvg_id: None,
                tvg_name: None,
                encoded_stream_url: "http://h/2".to_string(),
                is_favorite: true,
            },
        ];
        mark_favorites(&mut channels, &store.favorites("p").await.unwrap());
        assert!(channels[0].is_favorite);
        assert!(!channels[1].is_favorite);
    }
}
