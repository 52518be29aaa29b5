use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub swipe: SwipeConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u64,
    #[serde(default = "default_fade_steps")]
    pub fade_steps: u32,
}

/// Gesture tuning. Distances are in terminal columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeConfig {
    #[serde(default = "default_commit_threshold")]
    pub commit_threshold: f32,
    /// Degrees of tilt per column of drag.
    #[serde(default = "default_rotation_factor")]
    pub rotation_factor: f32,
    #[serde(default = "default_overlay_span")]
    pub overlay_span: f32,
    #[serde(default = "default_max_overlay_opacity")]
    pub max_overlay_opacity: f32,
    #[serde(default = "default_commit_animation_ms")]
    pub commit_animation_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_max_genres")]
    pub max_genres: usize,
    #[serde(default = "default_swipe_commit_retries")]
    pub swipe_commit_retries: u32,
    #[serde(default = "default_swipe_retry_backoff_ms")]
    pub swipe_retry_backoff_ms: u64,
    /// How long Loading waits, after settling, for unresolved swipe commits.
    #[serde(default = "default_commit_wait_ms")]
    pub commit_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Deep-link prefix; the track id is appended.
    #[serde(default = "default_track_url_base")]
    pub track_url_base: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            fade_out_ms: default_fade_out_ms(),
            fade_steps: default_fade_steps(),
        }
    }
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            commit_threshold: default_commit_threshold(),
            rotation_factor: default_rotation_factor(),
            overlay_span: default_overlay_span(),
            max_overlay_opacity: default_max_overlay_opacity(),
            commit_animation_ms: default_commit_animation_ms(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            max_genres: default_max_genres(),
            swipe_commit_retries: default_swipe_commit_retries(),
            swipe_retry_backoff_ms: default_swipe_retry_backoff_ms(),
            commit_wait_ms: default_commit_wait_ms(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            track_url_base: default_track_url_base(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_user_agent() -> String {
    format!("spotiswipe/{}", env!("CARGO_PKG_VERSION"))
}

fn default_volume() -> f32 {
    0.5
}

fn default_fade_out_ms() -> u64 {
    400
}

fn default_fade_steps() -> u32 {
    8
}

fn default_commit_threshold() -> f32 {
    12.0
}

fn default_rotation_factor() -> f32 {
    0.1
}

fn default_overlay_span() -> f32 {
    16.0
}

fn default_max_overlay_opacity() -> f32 {
    0.8
}

fn default_commit_animation_ms() -> u64 {
    300
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_max_genres() -> usize {
    5
}

fn default_swipe_commit_retries() -> u32 {
    2
}

fn default_swipe_retry_backoff_ms() -> u64 {
    500
}

fn default_commit_wait_ms() -> u64 {
    3000
}

fn default_track_url_base() -> String {
    "https://open.spotify.com/track/".to_string()
}

impl PlaybackConfig {
    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }
}

impl SwipeConfig {
    pub fn commit_animation(&self) -> Duration {
        Duration::from_millis(self.commit_animation_ms)
    }
}

impl FlowConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn commit_wait(&self) -> Duration {
        Duration::from_millis(self.commit_wait_ms)
    }

    /// Wait before retry number `attempt` (1-based) of a swipe commit.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.swipe_retry_backoff_ms * u64::from(attempt))
    }
}

impl ListenConfig {
    pub fn track_url(&self, track_id: &str) -> String {
        format!("{}{}", self.track_url_base, track_id)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.flow.max_genres, 5);
        assert_eq!(config.playback.default_volume, 0.5);
        assert!(config.swipe.commit_threshold > 0.0);
        assert!(Config::config_path().ends_with("spotiswipe/config.toml"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [backend]
            base_url = "https://swipe.example.net"

            [swipe]
            commit_threshold = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "https://swipe.example.net");
        assert_eq!(config.swipe.commit_threshold, 20.0);
        assert_eq!(config.swipe.commit_animation_ms, 300);
        assert_eq!(config.flow.settle_delay(), Duration::from_millis(1500));
        assert_eq!(config.flow.commit_wait(), Duration::from_millis(3000));
    }

    #[test]
    fn retry_backoff_is_linear() {
        let flow = FlowConfig::default();
        assert_eq!(flow.retry_backoff(1), Duration::from_millis(500));
        assert_eq!(flow.retry_backoff(2), Duration::from_millis(1000));
    }

    #[test]
    fn track_url_appends_id() {
        let listen = ListenConfig::default();
        assert_eq!(
            listen.track_url("abc123"),
            "https://open.spotify.com/track/abc123"
        );
    }
}
