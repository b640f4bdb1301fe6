//! Client configuration.
//!
//! One [`ClientConfig`] is built at startup (from defaults, a TOML file, or
//! the builder) and handed to every component, which copies out the values
//! it needs.
//!
//! ```toml
//! [server]
//! host = "10.0.0.2"
//! port = 3000
//!
//! [audio]
//! vad_threshold = 1200.0
//! noise = { mode = "adaptive", alpha = 0.05, initial = 0.1 }
//!
//! [reliability]
//! heartbeat_interval_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::ConfigError;
use crate::core::constants::{
    BYTES_PER_SAMPLE, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_FRAME_SAMPLES, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_MAX_RETRIES, DEFAULT_NOISE_LEVEL, DEFAULT_RECONNECT_DELAY, DEFAULT_RETRY_DELAY,
    DEFAULT_SAMPLE_RATE, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_SOCKET_TIMEOUT,
    DEFAULT_STATE_FILE, DEFAULT_VAD_THRESHOLD, MAX_PACKET_SIZE,
};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Ingestion endpoint.
    #[serde(default)]
    pub server: ServerSection,
    /// Capture and voice gate parameters.
    #[serde(default)]
    pub audio: AudioSection,
    /// Retry, timeout and interval constants.
    #[serde(default)]
    pub reliability: ReliabilitySection,
    /// Persisted state location.
    #[serde(default)]
    pub storage: StorageSection,
    /// Sub-second timings set through the builder; wins over `reliability`.
    #[serde(skip)]
    timings_override: Option<Timings>,
}

/// The `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Endpoint host name or address.
    pub host: String,
    /// Endpoint TCP port.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Background noise estimate used by the voice gate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NoiseConfig {
    /// Constant noise level.
    Fixed {
        /// Noise level multiplier.
        level: f32,
    },
    /// Exponential moving average over silent frames.
    Adaptive {
        /// Smoothing factor in (0, 1].
        alpha: f32,
        /// Starting noise level.
        initial: f32,
    },
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig::Fixed {
            level: DEFAULT_NOISE_LEVEL,
        }
    }
}

/// The `[audio]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    /// Capture sample rate in Hz (informational for the capture source).
    pub sample_rate: u32,
    /// Samples per captured frame.
    pub frame_samples: usize,
    /// Base mean-amplitude threshold.
    pub vad_threshold: f32,
    /// Noise estimate mode.
    pub noise: NoiseConfig,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            noise: NoiseConfig::default(),
        }
    }
}

impl AudioSection {
    /// Frame size in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * BYTES_PER_SAMPLE
    }
}

/// The `[reliability]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReliabilitySection {
    /// Attempts per bounded operation and tolerated heartbeat failures.
    pub max_retries: u32,
    /// Minimum spacing between heartbeats, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Bound on one association or connect attempt, in seconds.
    pub connection_timeout_secs: u64,
    /// Bound on every socket read, in seconds.
    pub socket_timeout_secs: u64,
    /// Pause between connection attempts, in seconds.
    pub reconnect_delay_secs: u64,
    /// Pause between retransmissions, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ReliabilitySection {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT.as_secs(),
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT.as_secs(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY.as_secs(),
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

/// The `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Path of the persisted state file.
    pub state_file: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

/// Timing values resolved to [`Duration`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Attempts per bounded operation.
    pub max_retries: u32,
    /// Minimum spacing between heartbeats.
    pub heartbeat_interval: Duration,
    /// Bound on one association or connect attempt.
    pub connection_timeout: Duration,
    /// Bound on every socket read.
    pub socket_timeout: Duration,
    /// Pause between connection attempts.
    pub reconnect_delay: Duration,
    /// Pause between retransmissions.
    pub retry_delay: Duration,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` of the ingestion endpoint.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resolve the reliability section into durations.
    pub fn timings(&self) -> Timings {
        if let Some(timings) = self.timings_override {
            return timings;
        }
        let r = &self.reliability;
        Timings {
            max_retries: r.max_retries,
            heartbeat_interval: Duration::from_secs(r.heartbeat_interval_secs),
            connection_timeout: Duration::from_secs(r.connection_timeout_secs),
            socket_timeout: Duration::from_secs(r.socket_timeout_secs),
            reconnect_delay: Duration::from_secs(r.reconnect_delay_secs),
            retry_delay: Duration::from_millis(r.retry_delay_ms),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.audio.frame_samples == 0 {
            return Err(ConfigError::Invalid(
                "audio.frame_samples must be non-zero".into(),
            ));
        }
        if self.audio.frame_bytes() > MAX_PACKET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "audio.frame_samples too large: {} bytes exceeds {MAX_PACKET_SIZE}",
                self.audio.frame_bytes()
            )));
        }
        if !(self.audio.vad_threshold.is_finite() && self.audio.vad_threshold >= 0.0) {
            return Err(ConfigError::Invalid(
                "audio.vad_threshold must be a non-negative number".into(),
            ));
        }
        match self.audio.noise {
            NoiseConfig::Fixed { level } if !(level.is_finite() && level >= 0.0) => {
                return Err(ConfigError::Invalid(
                    "audio.noise.level must be a non-negative number".into(),
                ));
            }
            NoiseConfig::Adaptive { alpha, initial }
                if !(alpha > 0.0 && alpha <= 1.0) || !(initial.is_finite() && initial >= 0.0) =>
            {
                return Err(ConfigError::Invalid(
                    "audio.noise requires 0 < alpha <= 1 and initial >= 0".into(),
                ));
            }
            _ => {}
        }

        let t = self.timings();
        if t.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "reliability.max_retries must be at least 1".into(),
            ));
        }
        if t.connection_timeout.is_zero() || t.socket_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "reliability timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`], mainly for embedding and tests.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint host and port.
    pub fn server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.server.host = host.into();
        self.config.server.port = port;
        self
    }

    /// Set the samples per frame.
    pub fn frame_samples(mut self, samples: usize) -> Self {
        self.config.audio.frame_samples = samples;
        self
    }

    /// Set the base voice threshold.
    pub fn vad_threshold(mut self, threshold: f32) -> Self {
        self.config.audio.vad_threshold = threshold;
        self
    }

    /// Set the noise estimate mode.
    pub fn noise(mut self, noise: NoiseConfig) -> Self {
        self.config.audio.noise = noise;
        self
    }

    /// Set the retry bound.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.reliability.max_retries = retries;
        if let Some(timings) = self.config.timings_override.as_mut() {
            timings.max_retries = retries;
        }
        self
    }

    /// Override all timings with sub-second precision.
    pub fn timings(mut self, timings: Timings) -> Self {
        self.config.reliability.max_retries = timings.max_retries;
        self.config.timings_override = Some(timings);
        self
    }

    /// Set the persisted state path.
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.state_file = path.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
