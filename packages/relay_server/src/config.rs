use frame_relay::{RetentionPolicy, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [stream]
//                    max_fps = 15.0
//
//   env var:         RELAY_STREAM__MAX_FPS=15.0   (double underscore = nesting)
//
//   (single underscore stays within field names: RELAY_STREAM__STALE_TIMEOUT_SECS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub stream: StreamFileConfig,
    #[serde(default)]
    pub presence: PresenceFileConfig,
    #[serde(default)]
    pub retention: RetentionFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Viewer stream tunables (lives under `[stream]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamFileConfig {
    #[serde(default = "default_max_fps")]
    pub max_fps: f64,
    /// 0 disables the inactivity timeout
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    #[serde(default = "default_new_frame_poll_ms")]
    pub new_frame_poll_ms: u64,
}

impl Default for StreamFileConfig {
    fn default() -> Self {
        Self {
            max_fps: default_max_fps(),
            stale_timeout_secs: default_stale_timeout_secs(),
            idle_poll_ms: default_idle_poll_ms(),
            new_frame_poll_ms: default_new_frame_poll_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceFileConfig {
    #[serde(default = "default_threshold_secs")]
    pub default_threshold_secs: u64,
}

impl Default for PresenceFileConfig {
    fn default() -> Self {
        Self {
            default_threshold_secs: default_threshold_secs(),
        }
    }
}

/// Key retention (lives under `[retention]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RetentionFileConfig {
    /// Evict keys idle for longer than this; 0 keeps them forever
    #[serde(default)]
    pub max_age_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_max_fps() -> f64 {
    10.0
}
fn default_stale_timeout_secs() -> u64 {
    60
}
fn default_idle_poll_ms() -> u64 {
    100
}
fn default_new_frame_poll_ms() -> u64 {
    10
}
fn default_threshold_secs() -> u64 {
    10
}

/// Build a figment that layers: defaults → config.toml → RELAY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `RELAY_SERVER__PORT=9000`  →  `server.port = 9000`
///   `RELAY_RETENTION__MAX_AGE_SECS=3600`  →  `retention.max_age_secs = 3600`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_toml_path(data_dir)))
        .merge(Env::prefixed("RELAY_").split("__"))
}

pub fn config_toml_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub stream: StreamConfig,
    pub presence_threshold: Duration,
    pub retention: RetentionPolicy,
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            stream: stream_config_from_file(&fc.stream),
            presence_threshold: Duration::from_secs(fc.presence.default_threshold_secs),
            retention: retention_from_file(&fc.retention),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

fn stream_config_from_file(fc: &StreamFileConfig) -> StreamConfig {
    StreamConfig {
        max_stream_fps: fc.max_fps,
        stale_timeout: Duration::from_secs(fc.stale_timeout_secs),
        idle_poll_interval: Duration::from_millis(fc.idle_poll_ms),
        new_frame_poll_interval: Duration::from_millis(fc.new_frame_poll_ms),
    }
}

fn retention_from_file(fc: &RetentionFileConfig) -> RetentionPolicy {
    if fc.max_age_secs == 0 {
        RetentionPolicy::keep_forever()
    } else {
        RetentionPolicy::evict_after(Duration::from_secs(fc.max_age_secs))
    }
}
