use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod stream;

pub use stream::*;

/// A channel parsed from an M3U playlist
///
/// `encoded_stream_url` is the only playback reference that gets persisted;
/// headers and DRM material travel inside it in pipe-encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub logo_url: Option<String>,
    pub group_title: Option<String>,
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub encoded_stream_url: String,
    /// Owned by the library store, always false straight out of the parser
    #[serde(default)]
    pub is_favorite: bool,
}

/// A user-saved playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Epoch milliseconds
    pub added_at: i64,
}

impl PlaylistEntry {
    pub fn new(name: impl Into<String>, url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            url: url.trim().to_string(),
            added_at: Utc::now().timestamp_millis(),
        }
    }
}
