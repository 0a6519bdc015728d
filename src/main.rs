use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamtv_core::{
    config::Config,
    ingestor::PlaylistFetcher,
    playback::MediaRequest,
    repositories::{mark_favorites, JsonFileLibraryStore, LibraryStore},
    streaming::{DrmConfigBuilder, StreamDescriptorResolver},
};

#[derive(Parser)]
#[command(name = "streamtv")]
#[command(version = "0.1.0")]
#[command(about = "IPTV playlist parsing and stream resolution")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (default: $STREAMTV_CONFIG, then streamtv.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Library file (overrides config file)
    #[arg(short = 'l', long, value_name = "PATH")]
    library: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a playlist (URL or file) and print its channels as JSON
    Channels {
        source: String,
        /// Saved playlist whose favorites should be marked
        #[arg(long)]
        playlist_id: Option<String>,
    },
    /// Show what the player would request for an encoded stream URL
    Resolve {
        encoded: String,
        /// Resolve as a playlist stream (rotation User-Agents)
        #[arg(long)]
        playlist_mode: bool,
        /// Rotation entry to use in playlist mode
        #[arg(long, default_value_t = 0)]
        user_agent_index: usize,
    },
    /// Manage saved playlists
    #[command(subcommand)]
    Playlist(PlaylistCommand),
    /// Manage favorites of a saved playlist
    #[command(subcommand)]
    Favorite(FavoriteCommand),
}

#[derive(Subcommand)]
enum PlaylistCommand {
    Add { name: String, url: String },
    Remove { id: String },
    List,
}

#[derive(Subcommand)]
enum FavoriteCommand {
    Toggle { playlist_id: String, channel: String },
    List { playlist_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("streamtv_core={},streamtv={}", cli.log_level, cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };
    if let Some(library) = cli.library {
        config.storage.library_path = library;
    }

    let store = JsonFileLibraryStore::new(config.storage.library_path.clone());

    match cli.command {
        Command::Channels {
            source,
            playlist_id,
        } => {
            let fetcher = PlaylistFetcher::new(&config.fetch)?;
            let mut channels = fetcher.fetch_channels(&source).await;
            if let Some(playlist_id) = playlist_id {
                let favorites = store.favorites(&playlist_id).await?;
                mark_favorites(&mut channels, &favorites);
            }
            println!("{}", serde_json::to_string_pretty(&channels)?);
        }
        Command::Resolve {
            encoded,
            playlist_mode,
            user_agent_index,
        } => {
            let descriptor = StreamDescriptorResolver::resolve(&encoded);
            let user_agent = if playlist_mode {
                config.playback.rotation_user_agent(user_agent_index)
            } else {
                config.playback.default_user_agent.as_str()
            };
            let headers = StreamDescriptorResolver::request_headers(&descriptor, user_agent);
            let activation = DrmConfigBuilder::build(&descriptor, &headers);
            let media = MediaRequest::from_activation(&descriptor.base_url, &activation);
            let output = json!({
                "descriptor": descriptor,
                "request_headers": headers,
                "drm": activation,
                "media": media,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Playlist(PlaylistCommand::Add { name, url }) => {
            let entry = store.add_playlist(&name, &url).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Playlist(PlaylistCommand::Remove { id }) => {
            if !store.remove_playlist(&id).await? {
                anyhow::bail!("no playlist with id {id}");
            }
        }
        Command::Playlist(PlaylistCommand::List) => {
            let playlists = store.list_playlists().await?;
            println!("{}", serde_json::to_string_pretty(&playlists)?);
        }
        Command::Favorite(FavoriteCommand::Toggle {
            playlist_id,
            channel,
        }) => {
            let added = store.toggle_favorite(&playlist_id, &channel).await?;
            println!("{}", json!({ "channel": channel, "favorite": added }));
        }
        Command::Favorite(FavoriteCommand::List { playlist_id }) => {
            let favorites = store.favorites(&playlist_id).await?;
            println!("{}", serde_json::to_string_pretty(&favorites)?);
        }
    }

    Ok(())
}
