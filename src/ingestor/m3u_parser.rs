use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::line::Line;
use crate::models::{ChannelDescriptor, DrmScheme, RawMetadata};
use crate::streaming::MetadataCodec;
use crate::utils::url::UrlUtils;

fn attribute_pattern() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"([A-Za-z0-9_.-]+)="([^"]*)""#).expect("attribute pattern is a valid regex")
    })
}

/// Split a `key=value` tag payload at the first `=`
///
/// The key is lowercased and reduced to its last `.` segment, so
/// `inputstream.adaptive.license_type` reads as `license_type`. Values may
/// themselves contain `=`.
fn split_tag(payload: &str) -> Option<(String, &str)> {
    let (key, value) = payload.split_once('=')?;
    let key = key.trim();
    let key = key.rsplit('.').next().unwrap_or(key).to_ascii_lowercase();
    Some((key, value.trim()))
}

fn normalize_scheme(value: Option<&str>) -> String {
    value
        .map(|v| DrmScheme::from_label(v).as_str().to_string())
        .unwrap_or_default()
}

/// Everything gathered for one entry before encoding
#[derive(Debug, Default)]
struct BlockMetadata {
    raw: RawMetadata,
    group: Option<String>,
}

impl BlockMetadata {
    fn apply(&mut self, line: &Line<'_>) {
        match *line {
            Line::OptionTag(payload) => self.apply_option(payload),
            Line::PropertyTag(payload) => self.apply_property(payload),
            Line::RawJsonTag(json) => self.raw.ext_http_json = json.to_string(),
            Line::GroupTag(group) if !group.is_empty() => self.group = Some(group.to_string()),
            _ => {}
        }
    }

    fn apply_option(&mut self, payload: &str) {
        let Some((key, value)) = split_tag(payload) else {
            return;
        };
        let raw = &mut self.raw;

        match key.as_str() {
            "drm-scheme" => raw.drm_scheme = normalize_scheme(Some(value)),
            _ if value.is_empty() => {}
            "http-user-agent" => raw.user_agent = value.to_string(),
            "http-referrer" | "http-referer" => raw.referer = value.to_string(),
            "http-cookie" => {
                let cookie = value.trim_matches('"').trim();
                if !cookie.is_empty() {
                    raw.cookie = cookie.to_string();
                }
            }
            "http-origin" => raw.origin = value.to_string(),
            "drm-license" => raw.drm_license = value.to_string(),
            _ => {}
        }
    }

    /// Accepts both `license_type=` and `inputstream.adaptive.license_type=`
    fn apply_property(&mut self, payload: &str) {
        let Some((key, value)) = split_tag(payload) else {
            return;
        };

        match key.as_str() {
            "license_type" => self.raw.drm_scheme = normalize_scheme(Some(value)),
            "license_key" if !value.is_empty() => self.raw.drm_license = value.to_string(),
            _ => {}
        }
    }

    /// Fill fields the tags left empty from `url|key=value` parameters
    fn fill_from_pipe(&mut self, params: &HashMap<String, String>) {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| params.get(*k).filter(|v| !v.is_empty()).cloned())
        };
        let raw = &mut self.raw;

        if raw.user_agent.is_empty() {
            raw.user_agent = lookup(&["user-agent", "useragent"]).unwrap_or_default();
        }
        if raw.referer.is_empty() {
            raw.referer = lookup(&["referer", "referrer"]).unwrap_or_default();
        }
        if raw.origin.is_empty() {
            raw.origin = lookup(&["origin"]).unwrap_or_default();
        }
        if raw.cookie.is_empty() {
            raw.cookie = lookup(&["cookie"]).unwrap_or_default();
        }
        if raw.drm_scheme.is_empty() {
            raw.drm_scheme =
                normalize_scheme(lookup(&["drmscheme", "drm-scheme", "drm_scheme"]).as_deref());
        }
        if raw.drm_license.is_empty() {
            raw.drm_license = lookup(&["drmlicense", "drm-license", "drm_license", "license_key"])
                .unwrap_or_default();
        }
    }
}

/// M3U/M3U8 playlist parser
///
/// Tag lines attach to the entry they are adjacent to, whether they come
/// before the `#EXTINF` line or between it and the stream URL.
pub struct M3uParser;

impl M3uParser {
    pub fn parse_content(content: &str) -> Vec<ChannelDescriptor> {
        let lines: Vec<Line<'_>> = content.lines().map(Line::classify).collect();
        let mut channels = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Line::Entry(entry) = lines[i] else {
                i += 1;
                continue;
            };

            let mut meta: Vec<Line<'_>> = lines[..i]
                .iter()
                .rev()
                .take_while(|line| line.is_tag())
                .copied()
                .collect();
            meta.reverse();

            let mut j = i + 1;
            let mut url = None;
            while j < lines.len() {
                match lines[j] {
                    Line::Blank | Line::Header => {}
                    Line::Entry(_) => break,
                    Line::Url(u) => {
                        url = Some(u);
                        break;
                    }
                    tag => meta.push(tag),
                }
                j += 1;
            }

            let Some(url_line) = url else {
                debug!("Skipping entry without stream URL: {}", entry);
                i += 1;
                continue;
            };
            i = j + 1;

            match Self::parse_block(entry, &meta, url_line) {
                Some(channel) => channels.push(channel),
                None => debug!("Skipping entry with empty stream URL: {}", entry),
            }
        }

        info!("Parsed {} channels from playlist", channels.len());
        channels
    }

    fn parse_block(entry: &str, meta: &[Line<'_>], url_line: &str) -> Option<ChannelDescriptor> {
        let (base_url, pipe_params) = Self::split_url_and_pipe(url_line);
        if base_url.is_empty() {
            return None;
        }

        let mut block = BlockMetadata::default();
        for line in meta {
            block.apply(line);
        }
        if !pipe_params.is_empty() {
            block.fill_from_pipe(&pipe_params);
        }

        let attributes = Self::parse_attributes(entry);
        let attr = |key: &str| attributes.get(key).cloned();
        let tvg_name = attr("tvg-name");
        let name = match entry.rfind(',') {
            Some(pos) => entry[pos + 1..].trim().to_string(),
            None => tvg_name.clone().unwrap_or_default(),
        };

        debug!(
            "[{}] scheme={:?} license_len={} url={}",
            name,
            block.raw.drm_scheme,
            block.raw.drm_license.len(),
            UrlUtils::preview(base_url, 60)
        );

        Some(ChannelDescriptor {
            encoded_stream_url: MetadataCodec::encode(base_url, &block.raw),
            logo_url: attr("tvg-logo"),
            group_title: attr("group-title").or(block.group),
            tvg_id: attr("tvg-id"),
            tvg_name,
            name,
            is_favorite: false,
        })
    }

    /// Quoted `key="value"` attributes of an entry line; keys lowercased,
    /// first occurrence wins, blank values dropped
    fn parse_attributes(entry: &str) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        for caps in attribute_pattern().captures_iter(entry) {
            let value = caps[2].trim();
            if value.is_empty() {
                continue;
            }
            attrs
                .entry(caps[1].to_ascii_lowercase())
                .or_insert_with(|| value.to_string());
        }
        attrs
    }

    /// Split `url[?]|params` into the base URL and lowercased parameters
    fn split_url_and_pipe(url_line: &str) -> (&str, HashMap<String, String>) {
        let Some((base, suffix)) = url_line.split_once('|') else {
            return (url_line.trim_end_matches('?'), HashMap::new());
        };

        let base = base.trim_end_matches('?').trim();
        let suffix = suffix.trim();
        if base.is_empty() {
            return ("", HashMap::new());
        }

        let separator = if suffix.contains('&') || !suffix.contains('|') {
            '&'
        } else {
            '|'
        };
        let params = suffix
            .split(separator)
            .filter_map(|segment| segment.split_once('='))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        (base, params)
    }
}
