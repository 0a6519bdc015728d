use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::errors::RepositoryResult;
use crate::models::{ChannelDescriptor, PlaylistEntry};

/// Saved playlists and their favorite channels
///
/// Favorites are keyed by channel name within a playlist. Writes are
/// last-writer-wins.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn list_playlists(&self) -> RepositoryResult<Vec<PlaylistEntry>>;

    async fn add_playlist(&self, name: &str, url: &str) -> RepositoryResult<PlaylistEntry>;

    /// Remove a playlist together with its favorites; `false` if it was unknown
    async fn remove_playlist(&self, id: &str) -> RepositoryResult<bool>;

    async fn favorites(&self, playlist_id: &str) -> RepositoryResult<BTreeSet<String>>;

    /// Flip a channel's favorite flag, returning the new state
    async fn toggle_favorite(&self, playlist_id: &str, channel_name: &str) -> RepositoryResult<bool>;

    async fn is_favorite(&self, playlist_id: &str, channel_name: &str) -> RepositoryResult<bool> {
        Ok(self.favorites(playlist_id).await?.contains(channel_name))
    }
}

/// Set `is_favorite` on freshly parsed channels
pub fn mark_favorites(channels: &mut [ChannelDescriptor], favorites: &BTreeSet<String>) {
    for channel in channels {
        channel.is_favorite = favorites.contains(&channel.name);
    }
}
