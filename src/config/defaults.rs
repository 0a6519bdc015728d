//! Configuration default values
//!
//! This module contains all the default values for configuration options,
//! making them easily changeable in one central location.

// Playlist fetch defaults
pub const DEFAULT_FETCH_TIMEOUT: &str = "30s";
pub const DEFAULT_FETCH_CONNECT_TIMEOUT: &str = "15s";
pub const DEFAULT_FETCH_USER_AGENT: &str = "VLC/3.0.18 LibVLC/3.0.18";

// Playback defaults
pub const DEFAULT_RETRY_DELAY: &str = "600ms";
pub const DEFAULT_APP_USER_AGENT: &str = "StreamTV/1.0.0 (Android)";
pub const DEFAULT_ENGINE_CONNECT_TIMEOUT: &str = "30s";
pub const DEFAULT_ENGINE_READ_TIMEOUT: &str = "30s";

/// User-Agents tried in order when a playlist stream keeps failing
pub const DEFAULT_USER_AGENT_ROTATION: [&str; 5] = [
    "Mozilla/5.0 (Linux; Android 10; SM-G975F) AppleWebKit/537.36 Chrome/91.0.4472.120 Mobile Safari/537.36",
    "VLC/3.0.18 LibVLC/3.0.18",
    "Dalvik/2.1.0 (Linux; U; Android 10; SM-G975F Build/QP1A.190711.020)",
    "stagefright/1.2 (Linux;Android 10)",
    "ExoPlayer/2.19.1 (Linux; Android 10)",
];

// Storage defaults
pub const DEFAULT_LIBRARY_PATH: &str = "./data/library.json";
