//! Batcher configuration snapshot and settings derivation
//!
//! `BatcherConfig` is the validated snapshot the batcher holds for its
//! lifetime. It can be built directly, deserialized, or derived from a
//! flat [`Settings`] bag the way the enclosing client wires its
//! per-section options (one section for interactions, one for
//! observations).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default batch cut threshold in bytes (256 KiB)
pub const DEFAULT_SEND_HIGH_WATER_MARK: usize = 256 * 1024;

/// Default flush period in milliseconds
pub const DEFAULT_SEND_BATCH_INTERVAL_MS: u64 = 1000;

/// Default queue capacity in events
pub const DEFAULT_SEND_QUEUE_MAX_CAPACITY: usize = 8192;

/// Overflow policy when the event queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueMode {
    /// Producers wait until the flusher makes room
    #[default]
    Block,
    /// A probabilistic prune pass thins the queue instead
    Drop,
}

impl QueueMode {
    /// Parse the settings string ("BLOCK" / "DROP", case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("BLOCK") {
            Some(Self::Block)
        } else if value.eq_ignore_ascii_case("DROP") {
            Some(Self::Drop)
        } else {
            None
        }
    }
}

/// Whether the batcher assigns event indices and reports per-batch
/// original counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterStatus {
    Enable,
    #[default]
    Disable,
}

impl CounterStatus {
    #[inline]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enable)
    }
}

/// Configuration section a batcher serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Interaction,
    Observation,
}

impl Section {
    /// Key prefix of this section's options.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::Observation => "observation",
        }
    }

    /// This section's HTTP API sender implementation name. Counted
    /// sends are derived from it for the interaction section only.
    pub fn http_api_sender(self) -> &'static str {
        match self {
            Self::Interaction => "INTERACTION_HTTP_API_SENDER",
            Self::Observation => "OBSERVATION_HTTP_API_SENDER",
        }
    }
}

/// Flat string-keyed settings bag.
///
/// A thin stand-in for the client's configuration loader: values arrive
/// as strings and are parsed on read, falling back to the caller's
/// default when absent or unparsable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a flat JSON object of string values.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn get_f32(&self, key: &str, default: f32) -> f32 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

/// Snapshot of the batcher options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Batch cut threshold in bytes
    pub send_high_water_mark: usize,

    /// Flush period in milliseconds
    pub send_batch_interval_ms: u64,

    /// Queue capacity in events
    pub send_queue_max_capacity: usize,

    /// Overflow policy
    pub queue_mode: QueueMode,

    /// Per-event admit probability in (0, 1]
    pub subsample_rate: f32,

    /// Whether to assign and report event indices
    pub events_counter_status: CounterStatus,

    /// Content encoding passed through to the serializer
    pub batch_content_encoding: String,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            send_high_water_mark: DEFAULT_SEND_HIGH_WATER_MARK,
            send_batch_interval_ms: DEFAULT_SEND_BATCH_INTERVAL_MS,
            send_queue_max_capacity: DEFAULT_SEND_QUEUE_MAX_CAPACITY,
            queue_mode: QueueMode::default(),
            subsample_rate: 1.0,
            events_counter_status: CounterStatus::default(),
            batch_content_encoding: "identity".into(),
        }
    }
}

impl BatcherConfig {
    #[must_use]
    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.send_high_water_mark = bytes;
        self
    }

    #[must_use]
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.send_batch_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, events: usize) -> Self {
        self.send_queue_max_capacity = events;
        self
    }

    #[must_use]
    pub fn with_queue_mode(mut self, mode: QueueMode) -> Self {
        self.queue_mode = mode;
        self
    }

    #[must_use]
    pub fn with_subsample_rate(mut self, rate: f32) -> Self {
        self.subsample_rate = rate;
        self
    }

    #[must_use]
    pub fn with_counter_status(mut self, status: CounterStatus) -> Self {
        self.events_counter_status = status;
        self
    }

    #[must_use]
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.batch_content_encoding = encoding.into();
        self
    }

    /// Flush period as a `Duration`.
    #[inline]
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.send_batch_interval_ms)
    }

    /// Build one section's batcher config from settings.
    ///
    /// Counter mode is never read directly: only the interaction
    /// section counts, and only when `protocol.version` is 2 and its
    /// sender implementation is the HTTP API sender.
    pub fn from_settings(settings: &Settings, section: Section) -> Self {
        let prefix = section.prefix();
        let key = |name: &str| format!("{prefix}.{name}");
        let defaults = Self::default();

        let queue_mode = settings
            .get(&key("queue_mode"))
            .and_then(QueueMode::parse)
            .unwrap_or_default();

        let protocol_v2 = settings.get("protocol.version") == Some("2");
        let http_api_sender =
            settings.get(&key("sender.implementation")) == Some(section.http_api_sender());
        let events_counter_status =
            if section == Section::Interaction && protocol_v2 && http_api_sender {
                CounterStatus::Enable
            } else {
                CounterStatus::Disable
            };

        Self {
            send_high_water_mark: settings.get_usize(
                &key("send_high_water_mark"),
                defaults.send_high_water_mark,
            ),
            send_batch_interval_ms: settings.get_u64(
                &key("send_batch_interval_ms"),
                defaults.send_batch_interval_ms,
            ),
            send_queue_max_capacity: settings.get_usize(
                &key("send_queue_max_capacity"),
                defaults.send_queue_max_capacity,
            ),
            queue_mode,
            subsample_rate: settings.get_f32(&key("subsample_rate"), defaults.subsample_rate),
            events_counter_status,
            batch_content_encoding: settings
                .get(&key("batch_content_encoding"))
                .unwrap_or("identity")
                .to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
