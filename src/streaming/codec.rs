//! Pipe-encoded stream URLs
//!
//! A channel's headers and DRM material are persisted inside its stream URL:
//!
//! ```text
//! https://cdn.example.com/live.mpd|User-Agent=VLC&Cookie=a=b&drmScheme=clearkey&drmLicense=<rest>
//! ```
//!
//! Keys are written in a fixed order and `drmLicense` is always last. On the
//! way back in, everything after `drmLicense=` is taken verbatim so that
//! license server URLs keep their own `&` and `=` characters.
//!
//! Only the license is delimiter-safe. A literal `&` inside any other value
//! splits that value, and `%26` / `%3D` are left encoded on purpose because
//! decoding them before the split would erase the field boundaries.

use tracing::trace;

use crate::models::{
    HEADER_ACCEPT, HEADER_ACCEPT_LANGUAGE, HEADER_AUTHORIZATION, RawMetadata,
};

pub const KEY_USER_AGENT: &str = "User-Agent";
pub const KEY_COOKIE: &str = "Cookie";
pub const KEY_REFERER: &str = "Referer";
pub const KEY_ORIGIN: &str = "Origin";
pub const KEY_EXT_HTTP_JSON: &str = "extHttpJson";
pub const KEY_DRM_SCHEME: &str = "drmScheme";
pub const KEY_DRM_LICENSE: &str = "drmLicense";

/// Percent-escapes undone before splitting; `%26` and `%3D` are not among them
const SAFE_ESCAPES: [(&str, &str); 6] = [
    ("%7C", "|"),
    ("%3F", "?"),
    ("%3A", ":"),
    ("%2F", "/"),
    ("%20", " "),
    ("%2C", ","),
];

/// Result of decoding a pipe-encoded URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedStream {
    pub base_url: String,
    pub metadata: RawMetadata,
    /// Headers outside the fixed vocabulary, canonicalized where known
    pub extra_headers: Vec<(String, String)>,
}

/// Encoder/decoder for the `baseUrl|Key=Value&...` format
pub struct MetadataCodec;

impl MetadataCodec {
    /// Pack `metadata` onto `base_url`
    ///
    /// The DRM pair is written only when both halves are present.
    pub fn encode(base_url: &str, metadata: &RawMetadata) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut push = |key: &str, value: &str| {
            if !value.is_empty() {
                parts.push(format!("{key}={value}"));
            }
        };

        push(KEY_USER_AGENT, &metadata.user_agent);
        push(KEY_COOKIE, &metadata.cookie);
        push(KEY_REFERER, &metadata.referer);
        push(KEY_ORIGIN, &metadata.origin);
        push(KEY_EXT_HTTP_JSON, &metadata.ext_http_json);
        if metadata.has_drm() {
            push(KEY_DRM_SCHEME, &metadata.drm_scheme);
            push(KEY_DRM_LICENSE, &metadata.drm_license);
        }

        if parts.is_empty() {
            base_url.to_string()
        } else {
            format!("{}|{}", base_url, parts.join("&"))
        }
    }

    /// Unpack a pipe-encoded URL
    pub fn decode(encoded: &str) -> DecodedStream {
        let unescaped = Self::unescape_safe(encoded);
        let unescaped = unescaped.trim();

        let (base_url, params) = match unescaped.split_once('|') {
            Some((base, params)) => {
                let base = base.strip_suffix('?').unwrap_or(base);
                (base.trim(), params.trim())
            }
            None => (unescaped, ""),
        };

        let mut decoded = DecodedStream {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        if params.is_empty() {
            return decoded;
        }

        let (simple_part, license) = match Self::find_license_key(params) {
            Some(idx) => {
                let value_start = idx + KEY_DRM_LICENSE.len() + 1;
                (&params[..idx], &params[value_start..])
            }
            None => (params, ""),
        };

        for param in simple_part.split('&') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            Self::assign(&mut decoded, key, value);
        }
        decoded.metadata.drm_license = license.to_string();

        trace!(
            "Decoded stream '{}' with {} extra headers",
            decoded.base_url,
            decoded.extra_headers.len()
        );
        decoded
    }

    fn assign(decoded: &mut DecodedStream, key: &str, value: &str) {
        let meta = &mut decoded.metadata;
        match key.to_ascii_lowercase().as_str() {
            "user-agent" | "useragent" => meta.user_agent = value.to_string(),
            "cookie" => meta.cookie = value.to_string(),
            "referer" => meta.referer = value.to_string(),
            "origin" => meta.origin = value.to_string(),
            "drmscheme" => meta.drm_scheme = value.to_string(),
            "exthttpjson" => meta.ext_http_json = value.to_string(),
            "accept" => Self::push_extra(decoded, HEADER_ACCEPT, value),
            "accept-language" => Self::push_extra(decoded, HEADER_ACCEPT_LANGUAGE, value),
            "authorization" => Self::push_extra(decoded, HEADER_AUTHORIZATION, value),
            _ => {
                if !key.is_empty() && !value.is_empty() {
                    Self::push_extra(decoded, key, value);
                }
            }
        }
    }

    fn push_extra(decoded: &mut DecodedStream, name: &str, value: &str) {
        decoded
            .extra_headers
            .retain(|(existing, _)| existing != name);
        decoded
            .extra_headers
            .push((name.to_string(), value.to_string()));
    }

    /// Byte offset of `drmLicense=` at the start of `params` or right after `&`
    fn find_license_key(params: &str) -> Option<usize> {
        let needle = "drmlicense=";
        let lower = params.to_ascii_lowercase();
        let bytes = params.as_bytes();
        lower
            .match_indices(needle)
            .map(|(idx, _)| idx)
            .find(|&idx| idx == 0 || bytes[idx - 1] == b'&')
    }

    fn unescape_safe(input: &str) -> String {
        let mut out = input.to_string();
        for (escape, replacement) in SAFE_ESCAPES {
            if out.contains('%') {
                out = out
                    .replace(escape, replacement)
                    .replace(&escape.to_ascii_lowercase(), replacement);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drm_metadata(license: &str) -> RawMetadata {
        RawMetadata {
            drm_scheme: "clearkey".to_string(),
            drm_license: license.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_bare_url() {
        let url = MetadataCodec::encode("https://cdn.example.com/a.m3u8", &RawMetadata::default());
        assert_eq!(url, "https://cdn.example.com/a.m3u8");
    }

    #[test]
    fn test_encode_field_order() {
        let meta = RawMetadata {
            user_agent: "UA".to_string(),
            cookie: "c=1".to_string(),
            referer: "https://ref.example.com/".to_string(),
            origin: "https://ref.example.com".to_string(),
            ext_http_json: r#"{"x":"y"}"#.to_string(),
            drm_scheme: "widevine".to_string(),
            drm_license: "https://lic.example.com/wv".to_string(),
        };
        assert_eq!(
            MetadataCodec::encode("https://cdn.example.com/a.mpd", &meta),
            "https://cdn.example.com/a.mpd|User-Agent=UA&Cookie=c=1&Referer=https://ref.example.com/\
             &Origin=https://ref.example.com&extHttpJson={\"x\":\"y\"}&drmScheme=widevine\
             &drmLicense=https://lic.example.com/wv"
        );
    }

    #[test]
    fn test_encode_drops_half_drm_pair() {
        let meta = RawMetadata {
            drm_license: "ab:cd".to_string(),
            ..Default::default()
        };
        assert_eq!(MetadataCodec::encode("http://a/b", &meta), "http://a/b");
    }

    #[test]
    fn test_license_with_delimiters_round_trips() {
        let meta = drm_metadata("https://lic.example.com/key?a=1&b=2");
        let encoded = MetadataCodec::encode("https://cdn.example.com/a.mpd", &meta);
        let decoded = MetadataCodec::decode(&encoded);
        assert_eq!(decoded.base_url, "https://cdn.example.com/a.mpd");
        assert_eq!(decoded.metadata, meta);
        assert!(decoded.extra_headers.is_empty());
    }

    #[test]
    fn test_pipe_separated_key_pairs_survive() {
        let meta = drm_metadata("aa11:bb22|cc33:dd44");
        let decoded = MetadataCodec::decode(&MetadataCodec::encode("http://h/x.mpd", &meta));
        assert_eq!(decoded.metadata.drm_license, "aa11:bb22|cc33:dd44");
        assert_eq!(decoded.base_url, "http://h/x.mpd");
    }

    #[test]
    fn test_license_key_anchoring() {
        // "xdrmLicense=" inside a value must not be taken as the license key
        let decoded =
            MetadataCodec::decode("http://h/x|Cookie=xdrmLicense=1&drmScheme=clearkey&DRMLICENSE=k:v");
        assert_eq!(decoded.metadata.cookie, "xdrmLicense=1");
        assert_eq!(decoded.metadata.drm_license, "k:v");
        assert_eq!(decoded.metadata.drm_scheme, "clearkey");
    }

    #[test]
    fn test_trailing_question_mark_trimmed() {
        let decoded = MetadataCodec::decode("https://cdn.example.com/live.m3u8?|User-Agent=VLC");
        assert_eq!(decoded.base_url, "https://cdn.example.com/live.m3u8");
        assert_eq!(decoded.metadata.user_agent, "VLC");
    }

    #[test]
    fn test_safe_escapes_decoded() {
        let decoded = MetadataCodec::decode(
            "https%3A%2F%2Fcdn.example.com%2Flive.m3u8%7CReferer=https%3a%2f%2fsite.example.com%2F",
        );
        assert_eq!(decoded.base_url, "https://cdn.example.com/live.m3u8");
        assert_eq!(decoded.metadata.referer, "https://site.example.com/");
    }

    #[test]
    fn test_delimiter_escapes_left_alone() {
        let decoded = MetadataCodec::decode("http://h/x|Cookie=a%3Db%26c");
        assert_eq!(decoded.metadata.cookie, "a%3Db%26c");
    }

    #[test]
    fn test_aliases_and_extra_headers() {
        let decoded = MetadataCodec::decode(
            "http://h/x|useragent=Foo&accept=*/*&AUTHORIZATION=Bearer t&X-Custom=1&novalue&empty=",
        );
        assert_eq!(decoded.metadata.user_agent, "Foo");
        assert_eq!(
            decoded.extra_headers,
            vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("X-Custom".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_params() {
        let decoded = MetadataCodec::decode("  http://h/x.ts  ");
        assert_eq!(decoded.base_url, "http://h/x.ts");
        assert_eq!(decoded.metadata, RawMetadata::default());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        // Values exclude the documented collisions: '&' (field delimiter),
        // '%' (escape decoding) and surrounding whitespace (trimmed).
        fn field() -> impl Strategy<Value = String> {
            prop_oneof![
                Just(String::new()),
                "[A-Za-z0-9][A-Za-z0-9 ;:/.,=_~-]{0,24}[A-Za-z0-9]",
            ]
        }

        fn license() -> impl Strategy<Value = String> {
            prop_oneof![
                "[0-9a-f]{32}:[0-9a-f]{32}",
                "https://lic\\.example\\.com/[a-z]{1,8}\\?[a-z]=[0-9]{1,3}&[a-z]=[0-9]{1,3}",
                "[0-9a-f]{8}:[0-9a-f]{8}(\\|[0-9a-f]{8}:[0-9a-f]{8}){0,3}",
                Just(r#"{"keys":[{"kty":"oct","k":"a=b&c","kid":"d"}],"type":"temporary"}"#.to_string()),
            ]
        }

        /// Flat `#EXTHTTP` objects, same character limits as `field`
        fn ext_http_json() -> impl Strategy<Value = String> {
            prop_oneof![
                Just(String::new()),
                prop::collection::btree_map("[a-z][a-z-]{0,8}", "[A-Za-z0-9 ;:/.,=_~-]{0,16}", 1..4)
                    .prop_map(|headers| serde_json::to_string(&headers).unwrap()),
            ]
        }

        fn metadata() -> impl Strategy<Value = RawMetadata> {
            (
                field(),
                field(),
                field(),
                field(),
                ext_http_json(),
                prop::option::of(("(clearkey|widevine|playready)", license())),
            )
                .prop_map(|(user_agent, cookie, referer, origin, ext_http_json, drm)| {
                    let (drm_scheme, drm_license) = drm.unwrap_or_default();
                    RawMetadata {
                        user_agent,
                        cookie,
                        referer,
                        origin,
                        drm_scheme,
                        drm_license,
                        ext_http_json,
                    }
                })
        }

        proptest! {
            #[test]
            fn test_decode_inverts_encode(meta in metadata()) {
                let base = "https://cdn.example.com/live/index.mpd";
                let decoded = MetadataCodec::decode(&MetadataCodec::encode(base, &meta));
                prop_assert_eq!(decoded.base_url, base);
                prop_assert_eq!(decoded.metadata, meta);
            }
        }
    }
}
