// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. Errors are collected, not fail-fast, so the operator sees
//! every problem in one pass.

use crate::diagnostic::ConfigError;
use crate::model::GreenroomConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &GreenroomConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if !config.broker.url.starts_with("amqp://") && !config.broker.url.starts_with("amqps://") {
        errors.push(ConfigError::Validation {
            message: format!(
                "broker.url must be an amqp:// or amqps:// URL, got `{}`",
                config.broker.url
            ),
        });
    }

    if !config.bridge.url.starts_with("ws://") && !config.bridge.url.starts_with("wss://") {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.url must be a ws:// or wss:// URL, got `{}`",
                config.bridge.url
            ),
        });
    }

    if config.session.credential_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "session.credential_dir must not be empty".to_string(),
        });
    }

    if config.session.reconnect_base_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "session.reconnect_base_secs must be at least 1".to_string(),
        });
    }

    if config.session.reconnect_max_secs < config.session.reconnect_base_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.reconnect_max_secs ({}) must be >= reconnect_base_secs ({})",
                config.session.reconnect_max_secs, config.session.reconnect_base_secs
            ),
        });
    }

    if config.dedup.retain >= config.dedup.capacity {
        errors.push(ConfigError::Validation {
            message: format!(
                "dedup.retain ({}) must be smaller than dedup.capacity ({})",
                config.dedup.retain, config.dedup.capacity
            ),
        });
    }

    if config.dedup.retain == 0 {
        errors.push(ConfigError::Validation {
            message: "dedup.retain must be at least 1".to_string(),
        });
    }

    if config.coalesce.window_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "coalesce.window_ms must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = GreenroomConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn non_amqp_broker_url_fails() {
        let mut config = GreenroomConfig::default();
        config.broker.url = "http://localhost:5672".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("broker.url"))
        ));
    }

    #[test]
    fn retain_must_be_below_capacity() {
        let mut config = GreenroomConfig::default();
        config.dedup.capacity = 100;
        config.dedup.retain = 100;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("dedup.retain"))
        ));
    }

    #[test]
    fn reconnect_ceiling_below_base_fails() {
        let mut config = GreenroomConfig::default();
        config.session.reconnect_base_secs = 30;
        config.session.reconnect_max_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("reconnect_max_secs")
        )));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = GreenroomConfig::default();
        config.broker.url = "nope".to_string();
        config.bridge.url = "nope".to_string();
        config.coalesce.window_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
