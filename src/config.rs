//! # Engine and producer configuration.
//!
//! [`EngineConfig`] defines the runner's behavior: task concurrency limits,
//! instrument defaults, and the event-producer settings. [`ProducerConfig`]
//! controls batching, linger, topic prefixing, and compression of the event
//! bus producer.
//!
//! Both are plain structs with documented defaults; [`EngineConfig::from_env`]
//! overlays the recognized `FLOWVISOR_*` environment knobs on top of the
//! defaults.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use flowvisor::{Compression, EngineConfig};
//!
//! let mut cfg = EngineConfig::default();
//! cfg.max_concurrent = 4;
//! cfg.producer.batch_size = 100;
//! cfg.producer.linger = Duration::from_millis(250);
//! cfg.producer.compression = Compression::Lz4;
//!
//! assert_eq!(cfg.max_concurrent, 4);
//! ```

use std::env;
use std::time::Duration;

/// Compression codec requested from the event-bus transport.
///
/// Carried as a producer property; the in-memory test transport ignores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Compression {
    /// Gzip compression.
    Gzip,
    /// Snappy compression.
    Snappy,
    /// LZ4 compression.
    Lz4,
    /// No compression (default).
    #[default]
    None,
}

impl Compression {
    /// Parses a codec name as found in the `FLOWVISOR_COMPRESSION` knob.
    ///
    /// Unknown names fall back to [`Compression::None`].
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "gzip" => Compression::Gzip,
            "snappy" => Compression::Snappy,
            "lz4" => Compression::Lz4,
            _ => Compression::None,
        }
    }

    /// Returns the codec name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::None => "none",
        }
    }
}

/// Configuration for the event bus producer.
///
/// Controls when buffered events are flushed and how topics are qualified.
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    /// Flush when the buffer reaches this many messages.
    pub batch_size: usize,
    /// Flush when this much time has passed since the last flush.
    pub linger: Duration,
    /// Prefix applied to every logical topic name.
    pub topic_prefix: String,
    /// Compression codec requested from the transport.
    pub compression: Compression,
}

impl Default for ProducerConfig {
    /// Provides a default configuration:
    /// - `batch_size = 50`
    /// - `linger = 500ms`
    /// - `topic_prefix = "flowvisor"`
    /// - `compression = None`
    fn default() -> Self {
        Self {
            batch_size: 50,
            linger: Duration::from_millis(500),
            topic_prefix: "flowvisor".to_string(),
            compression: Compression::None,
        }
    }
}

/// Global configuration for the workflow engine.
///
/// Controls task concurrency, instrument behavior, producer settings, and
/// the observability endpoints recognized from the environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of tasks to run concurrently (0 = unlimited).
    ///
    /// A workflow's own `maxConcurrentTasks` policy takes precedence when
    /// non-zero.
    pub max_concurrent: usize,
    /// Whether newly registered probes start enabled.
    pub auto_enable_instruments: bool,
    /// Maximum number of `Continuous`-phase probes fired per phase
    /// invocation (0 = unlimited).
    pub max_continuous: usize,
    /// Event bus producer settings.
    pub producer: ProducerConfig,
    /// OTLP trace endpoint, if any. Recognized and stored; exporter wiring
    /// is the host process's concern.
    pub trace_endpoint: Option<String>,
    /// Metrics endpoint, if any. Recognized and stored.
    pub metrics_endpoint: Option<String>,
    /// Metrics push interval.
    pub metrics_interval: Duration,
    /// Log level filter for the binary's subscriber.
    pub log_level: String,
}

impl Default for EngineConfig {
    /// Provides a default configuration:
    /// - `max_concurrent = 0` (unlimited)
    /// - `auto_enable_instruments = true`
    /// - `max_continuous = 0` (unlimited)
    /// - `metrics_interval = 10s`
    /// - `log_level = "info"`
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            auto_enable_instruments: true,
            max_continuous: 0,
            producer: ProducerConfig::default(),
            trace_endpoint: None,
            metrics_endpoint: None,
            metrics_interval: Duration::from_secs(10),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `FLOWVISOR_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    ///
    /// Recognized knobs: `FLOWVISOR_BATCH_SIZE`, `FLOWVISOR_LINGER_MS`,
    /// `FLOWVISOR_COMPRESSION`, `FLOWVISOR_TOPIC_PREFIX`,
    /// `FLOWVISOR_TRACE_ENDPOINT`, `FLOWVISOR_METRICS_ENDPOINT`,
    /// `FLOWVISOR_METRICS_INTERVAL_MS`, `FLOWVISOR_LOG_LEVEL`,
    /// `FLOWVISOR_AUTO_ENABLE_INSTRUMENTS`, `FLOWVISOR_MAX_CONTINUOUS`,
    /// `FLOWVISOR_MAX_CONCURRENT`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>("FLOWVISOR_BATCH_SIZE") {
            cfg.producer.batch_size = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("FLOWVISOR_LINGER_MS") {
            cfg.producer.linger = Duration::from_millis(ms);
        }
        if let Ok(s) = env::var("FLOWVISOR_COMPRESSION") {
            cfg.producer.compression = Compression::parse(&s);
        }
        if let Ok(s) = env::var("FLOWVISOR_TOPIC_PREFIX") {
            if !s.is_empty() {
                cfg.producer.topic_prefix = s;
            }
        }
        if let Ok(s) = env::var("FLOWVISOR_TRACE_ENDPOINT") {
            if !s.is_empty() {
                cfg.trace_endpoint = Some(s);
            }
        }
        if let Ok(s) = env::var("FLOWVISOR_METRICS_ENDPOINT") {
            if !s.is_empty() {
                cfg.metrics_endpoint = Some(s);
            }
        }
        if let Some(ms) = env_parse::<u64>("FLOWVISOR_METRICS_INTERVAL_MS") {
            cfg.metrics_interval = Duration::from_millis(ms);
        }
        if let Ok(s) = env::var("FLOWVISOR_LOG_LEVEL") {
            if !s.is_empty() {
                cfg.log_level = s;
            }
        }
        if let Some(b) = env_parse::<bool>("FLOWVISOR_AUTO_ENABLE_INSTRUMENTS") {
            cfg.auto_enable_instruments = b;
        }
        if let Some(n) = env_parse::<usize>("FLOWVISOR_MAX_CONTINUOUS") {
            cfg.max_continuous = n;
        }
        if let Some(n) = env_parse::<usize>("FLOWVISOR_MAX_CONCURRENT") {
            cfg.max_concurrent = n;
        }

        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
