// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./greenroom.toml` > `~/.config/greenroom/greenroom.toml`
//! > `/etc/greenroom/greenroom.toml`, with environment variable overrides via
//! the `GREENROOM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GreenroomConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/greenroom/greenroom.toml` (system-wide)
/// 3. `~/.config/greenroom/greenroom.toml` (user XDG config)
/// 4. `./greenroom.toml` (local directory)
/// 5. `GREENROOM_*` environment variables
pub fn load_config() -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::file("/etc/greenroom/greenroom.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("greenroom/greenroom.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("greenroom.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `GREENROOM_SESSION_CREDENTIAL_DIR` must
/// map to `session.credential_dir`, not `session.credential.dir`.
fn env_provider() -> Env {
    Env::prefixed("GREENROOM_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped,
        // e.g. GREENROOM_SESSION_CREDENTIAL_DIR -> "session_credential_dir".
        let mapped = key
            .as_str()
            .replacen("log_", "log.", 1)
            .replacen("server_", "server.", 1)
            .replacen("broker_", "broker.", 1)
            .replacen("bridge_", "bridge.", 1)
            .replacen("session_", "session.", 1)
            .replacen("dedup_", "dedup.", 1)
            .replacen("coalesce_", "coalesce.", 1)
            .replacen("throttle_", "throttle.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract_cleanly() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 8085);
        assert_eq!(config.dedup.capacity, 5_000);
        assert_eq!(config.dedup.retain, 1_000);
        assert_eq!(config.session.reconnect_base_secs, 5);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[server]
port = 9090

[broker]
url = "amqp://broker.internal:5672"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.broker.url, "amqp://broker.internal:5672");
        // Untouched sections keep defaults.
        assert_eq!(config.coalesce.window_ms, 750);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
[server]
prot = 9090
"#,
        );
        assert!(result.is_err());
    }
}
