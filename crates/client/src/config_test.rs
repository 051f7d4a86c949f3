//! Tests for configuration snapshots and settings derivation

use std::time::Duration;

use crate::config::*;

#[test]
fn test_defaults() {
    let config = BatcherConfig::default();
    assert_eq!(config.send_high_water_mark, DEFAULT_SEND_HIGH_WATER_MARK);
    assert_eq!(config.send_batch_interval_ms, DEFAULT_SEND_BATCH_INTERVAL_MS);
    assert_eq!(config.send_queue_max_capacity, DEFAULT_SEND_QUEUE_MAX_CAPACITY);
    assert_eq!(config.queue_mode, QueueMode::Block);
    assert_eq!(config.subsample_rate, 1.0);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);
    assert_eq!(config.batch_content_encoding, "identity");
}

#[test]
fn test_builders() {
    let config = BatcherConfig::default()
        .with_high_water_mark(10)
        .with_batch_interval(Duration::from_millis(250))
        .with_queue_capacity(3)
        .with_queue_mode(QueueMode::Drop)
        .with_subsample_rate(0.7)
        .with_counter_status(CounterStatus::Enable)
        .with_content_encoding("lz4");

    assert_eq!(config.send_high_water_mark, 10);
    assert_eq!(config.batch_interval(), Duration::from_millis(250));
    assert_eq!(config.send_queue_max_capacity, 3);
    assert_eq!(config.queue_mode, QueueMode::Drop);
    assert_eq!(config.subsample_rate, 0.7);
    assert!(config.events_counter_status.is_enabled());
    assert_eq!(config.batch_content_encoding, "lz4");
}

#[test]
fn test_queue_mode_parse() {
    assert_eq!(QueueMode::parse("BLOCK"), Some(QueueMode::Block));
    assert_eq!(QueueMode::parse("drop"), Some(QueueMode::Drop));
    assert_eq!(QueueMode::parse("TAIL"), None);
}

#[test]
fn test_from_settings_reads_section_keys() {
    let mut settings = Settings::new();
    settings
        .set("interaction.send_high_water_mark", "1024")
        .set("interaction.send_batch_interval_ms", "50")
        .set("interaction.send_queue_max_capacity", "16")
        .set("interaction.queue_mode", "DROP")
        .set("interaction.subsample_rate", "0.5")
        .set("interaction.batch_content_encoding", "lz4")
        .set("observation.send_high_water_mark", "99");

    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.send_high_water_mark, 1024);
    assert_eq!(config.send_batch_interval_ms, 50);
    assert_eq!(config.send_queue_max_capacity, 16);
    assert_eq!(config.queue_mode, QueueMode::Drop);
    assert_eq!(config.subsample_rate, 0.5);
    assert_eq!(config.batch_content_encoding, "lz4");

    // the other section is untouched by interaction keys
    let other = BatcherConfig::from_settings(&settings, Section::Observation);
    assert_eq!(other.send_high_water_mark, 99);
    assert_eq!(other.queue_mode, QueueMode::Block);
}

#[test]
fn test_unparsable_values_fall_back_to_defaults() {
    let mut settings = Settings::new();
    settings
        .set("interaction.send_high_water_mark", "lots")
        .set("interaction.subsample_rate", "maybe")
        .set("interaction.queue_mode", "SIDEWAYS");

    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.send_high_water_mark, DEFAULT_SEND_HIGH_WATER_MARK);
    assert_eq!(config.subsample_rate, 1.0);
    assert_eq!(config.queue_mode, QueueMode::Block);
}

#[test]
fn test_counter_status_derivation() {
    let mut settings = Settings::new();

    // nothing set: DISABLE
    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);

    // HTTP API sender alone is not enough
    settings.set("interaction.sender.implementation", "INTERACTION_HTTP_API_SENDER");
    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);

    // protocol v2 + HTTP API sender: ENABLE
    settings.set("protocol.version", "2");
    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.events_counter_status, CounterStatus::Enable);

    // any other sender implementation turns it back off
    settings.set("interaction.sender.implementation", "INTERACTION_FILE_SENDER");
    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);

    settings.set("interaction.sender.implementation", "INTERACTION_EH_SENDER");
    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);

    // counting is interaction-only: the observation section stays off
    // even with its own HTTP API sender under protocol v2
    settings.set("observation.sender.implementation", "OBSERVATION_EH_SENDER");
    let config = BatcherConfig::from_settings(&settings, Section::Observation);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);

    settings.set("observation.sender.implementation", "OBSERVATION_HTTP_API_SENDER");
    let config = BatcherConfig::from_settings(&settings, Section::Observation);
    assert_eq!(config.events_counter_status, CounterStatus::Disable);
}

#[test]
fn test_settings_from_json() {
    let settings = Settings::from_json(
        r#"{"protocol.version": "2", "interaction.queue_mode": "DROP"}"#,
    )
    .unwrap();
    assert_eq!(settings.get("protocol.version"), Some("2"));

    let config = BatcherConfig::from_settings(&settings, Section::Interaction);
    assert_eq!(config.queue_mode, QueueMode::Drop);
}

#[test]
fn test_config_deserializes_with_partial_fields() {
    let config: BatcherConfig =
        serde_json::from_str(r#"{"send_high_water_mark": 10, "queue_mode": "DROP"}"#).unwrap();
    assert_eq!(config.send_high_water_mark, 10);
    assert_eq!(config.queue_mode, QueueMode::Drop);
    assert_eq!(config.send_batch_interval_ms, DEFAULT_SEND_BATCH_INTERVAL_MS);
}
