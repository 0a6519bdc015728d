//! Encoded stream URL → [`StreamDescriptor`]

use serde_json::Value;
use tracing::{debug, warn};

use super::codec::MetadataCodec;
use crate::models::{
    DrmLicense, DrmScheme, HEADER_COOKIE, HEADER_ORIGIN, HEADER_REFERER, HEADER_USER_AGENT,
    HeaderMap, StreamDescriptor,
};
use crate::utils::url::UrlUtils;

pub struct StreamDescriptorResolver;

impl StreamDescriptorResolver {
    /// Decode `encoded` and merge its `extHttpJson` blob into the headers
    ///
    /// Pipe-encoded headers win over JSON-sourced ones. No default
    /// User-Agent is added here; see [`Self::request_headers`].
    pub fn resolve(encoded: &str) -> StreamDescriptor {
        let decoded = MetadataCodec::decode(encoded);
        let meta = decoded.metadata;

        let mut headers = HeaderMap::new();
        for (name, value) in [
            (HEADER_USER_AGENT, &meta.user_agent),
            (HEADER_COOKIE, &meta.cookie),
            (HEADER_REFERER, &meta.referer),
            (HEADER_ORIGIN, &meta.origin),
        ] {
            if !value.is_empty() {
                headers.insert(name.to_string(), value.clone());
            }
        }
        for (name, value) in decoded.extra_headers {
            headers.entry(name).or_insert(value);
        }

        if !meta.ext_http_json.is_empty() {
            Self::merge_ext_http_json(&mut headers, &meta.ext_http_json);
        }

        let (drm_scheme, drm_license) = if meta.has_drm() {
            (
                DrmScheme::from_name(&meta.drm_scheme),
                DrmLicense::from_raw(&meta.drm_license),
            )
        } else {
            if !meta.drm_scheme.is_empty() || !meta.drm_license.is_empty() {
                debug!(
                    "Ignoring incomplete DRM fields for '{}' (scheme={:?}, license length={})",
                    decoded.base_url,
                    meta.drm_scheme,
                    meta.drm_license.len()
                );
            }
            (DrmScheme::None, DrmLicense::Absent)
        };

        debug!(
            "Resolved stream '{}': {} headers, scheme={}, license={}",
            decoded.base_url,
            headers.len(),
            drm_scheme,
            UrlUtils::preview(drm_license.as_str().unwrap_or(""), 60)
        );

        StreamDescriptor {
            base_url: decoded.base_url,
            headers,
            drm_scheme,
            drm_license,
            ext_http_json: (!meta.ext_http_json.is_empty()).then_some(meta.ext_http_json),
        }
    }

    /// Merge a flat JSON object into `headers`, first write wins
    ///
    /// Malformed JSON is logged and ignored.
    pub fn merge_ext_http_json(headers: &mut HeaderMap, json: &str) {
        let object = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                warn!("extHttpJson is not an object, ignoring: {}", other);
                return;
            }
            Err(e) => {
                warn!("extHttpJson parse error: {}", e);
                return;
            }
        };

        for (key, value) in object {
            let value = match value {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            headers
                .entry(Self::canonical_header_name(&key))
                .or_insert(value);
        }
    }

    /// Canonical spelling for the header names playlists commonly lowercase
    pub fn canonical_header_name(name: &str) -> String {
        match name.to_ascii_lowercase().as_str() {
            "cookie" => HEADER_COOKIE.to_string(),
            "user-agent" => HEADER_USER_AGENT.to_string(),
            "referer" => HEADER_REFERER.to_string(),
            "origin" => HEADER_ORIGIN.to_string(),
            _ => name.to_string(),
        }
    }

    /// Final request headers: the descriptor's own plus a User-Agent if it has none
    pub fn request_headers(descriptor: &StreamDescriptor, fallback_user_agent: &str) -> HeaderMap {
        let mut headers = descriptor.headers.clone();
        headers
            .entry(HEADER_USER_AGENT.to_string())
            .or_insert_with(|| fallback_user_agent.to_string());
        headers
    }
}
