use tracing::{debug, error, info, warn};

use crate::config::FetchConfig;
use crate::errors::{SourceError, SourceResult};
use crate::models::ChannelDescriptor;
use crate::utils::url::UrlUtils;

pub mod line;
pub mod m3u_parser;

pub use line::Line;
pub use m3u_parser::M3uParser;

/// Loads playlist text from an HTTP(S) URL or a local file
pub struct PlaylistFetcher {
    client: reqwest::Client,
}

impl PlaylistFetcher {
    pub fn new(config: &FetchConfig) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Request {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Raw playlist text for `source`
    pub async fn fetch_text(&self, source: &str) -> SourceResult<String> {
        let source = source.trim();
        if UrlUtils::is_remote(source) {
            self.fetch_remote(source).await
        } else {
            debug!("Reading playlist file: {}", source);
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| SourceError::Read {
                    path: source.to_string(),
                    message: e.to_string(),
                })
        }
    }

    async fn fetch_remote(&self, url: &str) -> SourceResult<String> {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        info!("Fetching playlist: {}", safe_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::from_reqwest(&safe_url, &e))?;

        let content_length = response.content_length();
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(&safe_url, &e))?;

        debug!(
            "Downloaded playlist '{}': {} bytes (content-length {:?})",
            safe_url,
            text.len(),
            content_length
        );
        Ok(text)
    }

    /// Fetch and parse `source`; any failure yields an empty list
    pub async fn fetch_channels(&self, source: &str) -> Vec<ChannelDescriptor> {
        match self.fetch_text(source).await {
            Ok(text) => {
                if !text.trim_start().starts_with("#EXTM3U") {
                    warn!(
                        "Playlist '{}' has no #EXTM3U header, parsing anyway",
                        UrlUtils::obfuscate_credentials(source)
                    );
                }
                M3uParser::parse_content(&text)
            }
            Err(e) => {
                error!("Playlist fetch error: {}", e);
                Vec::new()
            }
        }
    }
}
