//! DRM activation decision
//!
//! Three key-delivery paths exist for a protected stream:
//!
//! - **HTTP license**: the license value is a server URL; the engine posts
//!   its challenges there with the stream's request headers.
//! - **Inline ClearKey**: the license value is a ClearKey JSON key set, or
//!   `kid:key` pairs that are converted into one.
//! - **None**: no DRM, an unsupported scheme, or key material that yields no
//!   usable key. Playback continues unencrypted and may fail at the engine.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{DrmActivation, DrmLicense, DrmScheme, HeaderMap, StreamDescriptor};
use crate::utils::url::UrlUtils;

/// One symmetric key in a ClearKey key set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKeyEntry {
    pub kty: String,
    pub k: String,
    pub kid: String,
}

/// ClearKey license document as consumed by the engine's local DRM callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKeySet {
    pub keys: Vec<ClearKeyEntry>,
    #[serde(rename = "type")]
    pub session_type: String,
}

impl ClearKeySet {
    pub fn temporary(keys: Vec<ClearKeyEntry>) -> Self {
        Self {
            keys,
            session_type: "temporary".to_string(),
        }
    }
}

pub struct DrmConfigBuilder;

impl DrmConfigBuilder {
    /// Pick the activation mode for `descriptor`
    ///
    /// `headers` are the resolved request headers; an HTTP license request
    /// carries the same headers as the media requests.
    pub fn build(descriptor: &StreamDescriptor, headers: &HeaderMap) -> DrmActivation {
        let license = match (&descriptor.drm_scheme, descriptor.drm_license.as_str()) {
            (DrmScheme::None, _) | (_, None) => {
                debug!("No DRM for '{}', plain playback", descriptor.base_url);
                return DrmActivation::None;
            }
            (DrmScheme::Unsupported(name), _) => {
                warn!(
                    "Unsupported DRM scheme '{}' for '{}', playing without DRM",
                    name, descriptor.base_url
                );
                return DrmActivation::None;
            }
            (_, Some(license)) => license,
        };

        if matches!(descriptor.drm_license, DrmLicense::LicenseUrl(_))
            || UrlUtils::is_license_url(license)
        {
            debug!(
                "HTTP license for '{}' ({})",
                descriptor.base_url, descriptor.drm_scheme
            );
            return DrmActivation::HttpLicense {
                scheme: descriptor.drm_scheme.clone(),
                uri: license.to_string(),
                headers: headers.clone(),
            };
        }

        match Self::inline_key_set(license) {
            Some(keys_json) => {
                debug!(
                    "Inline ClearKey for '{}': {}",
                    descriptor.base_url,
                    UrlUtils::preview(&keys_json, 120)
                );
                DrmActivation::InlineClearKey { keys_json }
            }
            None => {
                warn!(
                    "Could not build ClearKey JSON for '{}' (license length {}), playing without DRM",
                    descriptor.base_url,
                    license.len()
                );
                DrmActivation::None
            }
        }
    }

    /// ClearKey JSON for inline key material, `None` if no pair survives
    pub fn inline_key_set(license: &str) -> Option<String> {
        if license.trim_start().starts_with('{') {
            return Some(license.to_string());
        }

        let separator = if license.contains('|') { '|' } else { ',' };
        let keys: Vec<ClearKeyEntry> = license
            .split(separator)
            .filter_map(Self::key_entry)
            .collect();

        if keys.is_empty() {
            return None;
        }
        serde_json::to_string(&ClearKeySet::temporary(keys)).ok()
    }

    fn key_entry(pair: &str) -> Option<ClearKeyEntry> {
        let (kid, key) = pair.split_once(':')?;
        let kid = kid.trim();
        let key = key.trim();
        if kid.is_empty() || key.is_empty() {
            return None;
        }

        let (kid_b64, key_b64) = match (hex_to_base64url(kid), hex_to_base64url(key)) {
            (Ok(kid_b64), Ok(key_b64)) => (kid_b64, key_b64),
            _ => {
                debug!("Key pair is not hex, using it as base64url as-is");
                (kid.to_string(), key.to_string())
            }
        };

        Some(ClearKeyEntry {
            kty: "oct".to_string(),
            k: key_b64,
            kid: kid_b64,
        })
    }
}

/// Hex string → raw bytes → unpadded URL-safe base64
pub fn hex_to_base64url(hex_value: &str) -> Result<String, hex::FromHexError> {
    let bytes = hex::decode(hex_value)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Inverse of [`hex_to_base64url`]; accepts padded or unpadded input
pub fn base64url_to_hex(b64: &str) -> Result<String, base64::DecodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(b64.trim_end_matches('='))?;
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HEADER_COOKIE;
    use tracing_test::traced_test;

    fn descriptor(scheme: DrmScheme, license: &str) -> StreamDescriptor {
        StreamDescriptor {
            base_url: "https://cdn.example.com/live.mpd".to_string(),
            drm_license: DrmLicense::from_raw(license),
            drm_scheme: scheme,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_drm() {
        let plain = StreamDescriptor::default();
        assert_eq!(
            DrmConfigBuilder::build(&plain, &HeaderMap::new()),
            DrmActivation::None
        );
    }

    #[test]
    fn test_http_license_keeps_exact_uri_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_COOKIE.to_string(), "session=1".to_string());
        let d = descriptor(DrmScheme::Widevine, "https://lic.example.com/key?a=1&b=2");

        match DrmConfigBuilder::build(&d, &headers) {
            DrmActivation::HttpLicense {
                scheme,
                uri,
                headers: license_headers,
            } => {
                assert_eq!(scheme, DrmScheme::Widevine);
                assert_eq!(uri, "https://lic.example.com/key?a=1&b=2");
                assert_eq!(license_headers["Cookie"], "session=1");
            }
            other => panic!("expected HttpLicense, got {other:?}"),
        }
    }

    #[test]
    fn test_single_hex_pair() {
        let d = descriptor(DrmScheme::ClearKey, "ab12:cd34");
        let DrmActivation::InlineClearKey { keys_json } =
            DrmConfigBuilder::build(&d, &HeaderMap::new())
        else {
            panic!("expected InlineClearKey");
        };
        assert_eq!(
            keys_json,
            r#"{"keys":[{"kty":"oct","k":"zTQ","kid":"qxI"}],"type":"temporary"}"#
        );
    }

    #[test]
    fn test_json_license_used_verbatim() {
        let json = r#"{"keys":[{"kty":"oct","k":"AAA","kid":"BBB"}],"type":"temporary"}"#;
        let d = descriptor(DrmScheme::ClearKey, json);
        assert_eq!(
            DrmConfigBuilder::build(&d, &HeaderMap::new()),
            DrmActivation::InlineClearKey {
                keys_json: json.to_string()
            }
        );
    }

    #[test]
    #[traced_test]
    fn test_unknown_scheme_is_none() {
        let d = descriptor(DrmScheme::Unsupported("unknown".to_string()), "ab12:cd34");
        assert_eq!(
            DrmConfigBuilder::build(&d, &HeaderMap::new()),
            DrmActivation::None
        );
        assert!(logs_contain("Unsupported DRM scheme 'unknown'"));
    }

    #[test]
    fn test_pipe_and_comma_separators() {
        let set: ClearKeySet = serde_json::from_str(
            &DrmConfigBuilder::inline_key_set("0011:2233|4455:6677").unwrap(),
        )
        .unwrap();
        assert_eq!(set.keys.len(), 2);

        let set: ClearKeySet = serde_json::from_str(
            &DrmConfigBuilder::inline_key_set("0011:2233, 4455:6677").unwrap(),
        )
        .unwrap();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[1].kid, hex_to_base64url("4455").unwrap());
    }

    #[test]
    fn test_bad_pairs_dropped() {
        let set: ClearKeySet = serde_json::from_str(
            &DrmConfigBuilder::inline_key_set("nocolon,:cd34,ab12:,ab12:cd34").unwrap(),
        )
        .unwrap();
        assert_eq!(set.keys.len(), 1);

        assert_eq!(DrmConfigBuilder::inline_key_set("nocolon,:x"), None);
        let d = descriptor(DrmScheme::ClearKey, "garbage");
        assert_eq!(
            DrmConfigBuilder::build(&d, &HeaderMap::new()),
            DrmActivation::None
        );
    }

    #[test]
    fn test_odd_hex_falls_back_to_raw_pair() {
        let set: ClearKeySet =
            serde_json::from_str(&DrmConfigBuilder::inline_key_set("abc:cd34,ab12:cd34").unwrap())
                .unwrap();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[0].kid, "abc");
        assert_eq!(set.keys[0].k, "cd34");
        assert_eq!(set.keys[1].kid, "qxI");
    }

    #[test]
    fn test_base64url_to_hex() {
        assert_eq!(base64url_to_hex("qxI").unwrap(), "ab12");
        assert_eq!(base64url_to_hex("qxI=").unwrap(), "ab12");
        assert!(base64url_to_hex("!!").is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_hex_base64url_bijection(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
                let hex_value = hex::encode(&bytes);
                let b64 = hex_to_base64url(&hex_value).unwrap();
                prop_assert!(!b64.contains('='));
                prop_assert!(!b64.contains('+') && !b64.contains('/'));
                prop_assert_eq!(base64url_to_hex(&b64).unwrap(), hex_value);
            }

            #[test]
            fn test_odd_length_hex_rejected(hex_value in "[0-9a-f]{1,63}") {
                prop_assume!(hex_value.len() % 2 == 1);
                prop_assert!(hex_to_base64url(&hex_value).is_err());
            }
        }
    }
}
