//! Stream-level data carried from the playlist to the playback engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::utils::url::UrlUtils;

pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_COOKIE: &str = "Cookie";
pub const HEADER_REFERER: &str = "Referer";
pub const HEADER_ORIGIN: &str = "Origin";
pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_ACCEPT_LANGUAGE: &str = "Accept-Language";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Request headers keyed by canonical name
pub type HeaderMap = HashMap<String, String>;

/// Fields accumulated while scanning one playlist block
///
/// Every field is a plain string where empty means absent; this is exactly
/// what the pipe-encoded URL can represent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    pub user_agent: String,
    pub cookie: String,
    pub referer: String,
    pub origin: String,
    pub drm_scheme: String,
    pub drm_license: String,
    pub ext_http_json: String,
}

impl RawMetadata {
    /// Scheme and license only count as a pair
    pub fn has_drm(&self) -> bool {
        !self.drm_scheme.is_empty() && !self.drm_license.is_empty()
    }
}

/// DRM system named by a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmScheme {
    #[default]
    None,
    ClearKey,
    Widevine,
    PlayReady,
    /// Named in an encoded URL but not one we can activate
    Unsupported(String),
}

const CLEARKEY_SYSTEM_ID: u128 = 0xe2719d58_a985_b3c9_781a_b030af78d30e;
const WIDEVINE_SYSTEM_ID: u128 = 0xedef8ba9_79d6_4ace_a3c8_27dcd51d21ed;
const PLAYREADY_SYSTEM_ID: u128 = 0x9a04f079_9840_4286_ab92_e65be0885f95;

impl DrmScheme {
    /// Normalize a free-form playlist value (`com.widevine.alpha`,
    /// `org.w3.clearkey`, ...) by substring match; unknown values yield `None`
    pub fn from_label(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        if lower.contains("widevine") {
            Self::Widevine
        } else if lower.contains("playready") {
            Self::PlayReady
        } else if lower.contains("clearkey") {
            Self::ClearKey
        } else {
            Self::None
        }
    }

    /// Strict lookup of an already-normalized name
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Self::None,
            "clearkey" => Self::ClearKey,
            "widevine" => Self::Widevine,
            "playready" => Self::PlayReady,
            _ => Self::Unsupported(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "",
            Self::ClearKey => "clearkey",
            Self::Widevine => "widevine",
            Self::PlayReady => "playready",
            Self::Unsupported(name) => name,
        }
    }

    /// Protection system UUID the engine keys its DRM session on
    pub fn system_id(&self) -> Option<Uuid> {
        match self {
            Self::ClearKey => Some(Uuid::from_u128(CLEARKEY_SYSTEM_ID)),
            Self::Widevine => Some(Uuid::from_u128(WIDEVINE_SYSTEM_ID)),
            Self::PlayReady => Some(Uuid::from_u128(PLAYREADY_SYSTEM_ID)),
            Self::None | Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for DrmScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Where the keys for a protected stream come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DrmLicense {
    #[default]
    Absent,
    /// License server to POST challenges to
    LicenseUrl(String),
    /// ClearKey JSON or `kid:key` pairs, unparsed
    InlineKeyMaterial(String),
}

impl DrmLicense {
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Absent
        } else if UrlUtils::is_license_url(raw) {
            Self::LicenseUrl(raw.to_string())
        } else {
            Self::InlineKeyMaterial(raw.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::LicenseUrl(value) | Self::InlineKeyMaterial(value) => Some(value),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Fully decoded playback reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub base_url: String,
    pub headers: HeaderMap,
    pub drm_scheme: DrmScheme,
    pub drm_license: DrmLicense,
    pub ext_http_json: Option<String>,
}

impl StreamDescriptor {
    /// Whether the stream itself dictates a User-Agent
    pub fn has_explicit_user_agent(&self) -> bool {
        self.headers.contains_key(HEADER_USER_AGENT)
    }
}

/// How the engine should obtain content keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DrmActivation {
    /// Plain playback
    None,
    /// Keys fetched from a license server
    HttpLicense {
        scheme: DrmScheme,
        uri: String,
        headers: HeaderMap,
    },
    /// ClearKey key set delivered locally
    InlineClearKey { keys_json: String },
}

impl DrmActivation {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
