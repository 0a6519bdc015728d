//! One-pass classification of playlist lines

/// A trimmed playlist line, classified once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// `#EXTM3U`
    Header,
    /// `#EXTINF:...`, the whole line
    Entry(&'a str),
    /// `#EXTVLCOPT:` payload
    OptionTag(&'a str),
    /// `#KODIPROP:` payload
    PropertyTag(&'a str),
    /// `#EXTHTTP:` payload, kept verbatim
    RawJsonTag(&'a str),
    /// `#EXTGRP:` payload
    GroupTag(&'a str),
    /// Any other `#` line
    OtherTag(&'a str),
    Url(&'a str),
}

const HEADER: &str = "#EXTM3U";
const ENTRY: &str = "#EXTINF";
const OPTION: &str = "#EXTVLCOPT";
const PROPERTY: &str = "#KODIPROP";
const RAW_JSON: &str = "#EXTHTTP";
const GROUP: &str = "#EXTGRP";

impl<'a> Line<'a> {
    pub fn classify(raw: &'a str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        if !line.starts_with('#') {
            return Self::Url(line);
        }

        if has_prefix(line, HEADER) {
            Self::Header
        } else if has_prefix(line, ENTRY) {
            Self::Entry(line)
        } else if has_prefix(line, OPTION) {
            Self::OptionTag(payload(line, OPTION))
        } else if has_prefix(line, PROPERTY) {
            Self::PropertyTag(payload(line, PROPERTY))
        } else if has_prefix(line, RAW_JSON) {
            Self::RawJsonTag(payload(line, RAW_JSON))
        } else if has_prefix(line, GROUP) {
            Self::GroupTag(payload(line, GROUP))
        } else {
            Self::OtherTag(line)
        }
    }

    /// Metadata that may sit around an entry line
    pub fn is_tag(&self) -> bool {
        matches!(
            self,
            Self::OptionTag(_)
                | Self::PropertyTag(_)
                | Self::RawJsonTag(_)
                | Self::GroupTag(_)
                | Self::OtherTag(_)
        )
    }
}

fn has_prefix(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.is_char_boundary(prefix.len())
        && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Text after the tag's `:`, trimmed
fn payload<'a>(line: &'a str, prefix: &str) -> &'a str {
    let rest = &line[prefix.len()..];
    rest.strip_prefix(':').unwrap_or(rest).trim()
}
