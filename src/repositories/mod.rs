//! Persistence of the user's library: saved playlists and per-playlist favorites
//!
//! Callers depend on the [`LibraryStore`] trait; [`JsonFileLibraryStore`] is
//! the on-disk implementation.
//!
//! # Usage
//!
//! ```rust,no_run
//! use streamtv_core::repositories::{JsonFileLibraryStore, LibraryStore};
//!
//! # async fn example() -> streamtv_core::errors::RepositoryResult<()> {
//! let store = JsonFileLibraryStore::new("./data/library.json");
//! let entry = store.add_playlist("Sports", "https://example.com/sports.m3u").await?;
//! store.toggle_favorite(&entry.id, "Sports One").await?;
//! # Ok(())
//! # }
//! ```

pub mod library;
pub mod traits;

pub use library::JsonFileLibraryStore;
pub use traits::*;
