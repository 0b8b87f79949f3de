// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Timing, tag and connect-policy configuration for the controller
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below (defaults, validation, TOML overrides)
//!
//! Every field has a default, so an empty TOML document is a valid configuration.
//! Firmware builds use `ControllerConfig::default()`; host builds may load overrides.

use serde::Deserialize;
use thiserror::Error;

/// Default period between request sends.
pub const DEFAULT_SEND_PERIOD_US: u64 = 30_000_000;
/// Default watchdog deadline for an outstanding exchange.
pub const DEFAULT_KILL_PERIOD_US: u64 = 15_000_000;
/// Default LED toggle period.
pub const DEFAULT_LED_PERIOD_US: u64 = 250_000;
/// Default host-side request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 10_000;
/// Default correlation tag for the network request.
pub const DEFAULT_NETWORK_TAG: u32 = 1;
/// Default correlation tag for the data channel. Tag 2 belongs to the log channel.
pub const DEFAULT_CHANNEL_TAG: u32 = 3;
/// Default IRQ line the notification center is bound to.
pub const DEFAULT_IRQ: u32 = 13;
/// Default chunk size for response body reads.
pub const DEFAULT_BODY_CHUNK_BYTES: usize = 1024;

/// How the startup path waits for the network to come up.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectPolicy {
    /// First pause between status polls.
    pub poll_interval_us: u64,
    /// Cap on the doubled pause.
    pub max_poll_interval_us: u64,
    /// Give up after this long; `None` waits forever.
    pub timeout_us: Option<u64>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self { poll_interval_us: 1_000, max_poll_interval_us: 1_000, timeout_us: Some(60_000_000) }
    }
}

impl ConnectPolicy {
    /// Pause to use after `current`: doubled, capped at `max_poll_interval_us`.
    pub fn next_interval(&self, current: u64) -> u64 {
        current.saturating_mul(2).min(self.max_poll_interval_us).max(self.poll_interval_us)
    }
}

/// Controller configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Minimum time between request sends.
    pub send_period_us: u64,
    /// Outstanding exchanges older than this are force-closed.
    pub kill_period_us: u64,
    /// LED toggle period.
    pub led_period_us: u64,
    /// Passed through to the host with every HTTP request.
    pub request_timeout_ms: u32,
    /// IRQ line for the notification center.
    pub irq: u32,
    /// Tag attached to the network request.
    pub network_tag: u32,
    /// Tag attached to the data channel.
    pub channel_tag: u32,
    /// Bytes fetched per `read_response_body` call.
    pub body_chunk_bytes: usize,
    /// Startup connect wait.
    pub connect: ConnectPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            send_period_us: DEFAULT_SEND_PERIOD_US,
            kill_period_us: DEFAULT_KILL_PERIOD_US,
            led_period_us: DEFAULT_LED_PERIOD_US,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            irq: DEFAULT_IRQ,
            network_tag: DEFAULT_NETWORK_TAG,
            channel_tag: DEFAULT_CHANNEL_TAG,
            body_chunk_bytes: DEFAULT_BODY_CHUNK_BYTES,
            connect: ConnectPolicy::default(),
        }
    }
}

/// Configuration rejected at load or validation time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A period or size that must be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// The watchdog would never fire before the next send.
    #[error("kill_period_us ({kill_us}) must be shorter than send_period_us ({send_us})")]
    KillNotShorterThanSend {
        /// Configured kill period.
        kill_us: u64,
        /// Configured send period.
        send_us: u64,
    },
    /// Backoff cap is below the initial interval.
    #[error("connect.max_poll_interval_us ({max_us}) is below connect.poll_interval_us ({initial_us})")]
    BackoffCapBelowInterval {
        /// Configured initial interval.
        initial_us: u64,
        /// Configured cap.
        max_us: u64,
    },
    /// Config file could not be read.
    #[cfg(feature = "std")]
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        /// File path.
        path: std::path::PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Config text is not valid TOML for this schema.
    #[cfg(feature = "std")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ControllerConfig {
    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("send_period_us", self.send_period_us),
            ("kill_period_us", self.kill_period_us),
            ("led_period_us", self.led_period_us),
            ("body_chunk_bytes", self.body_chunk_bytes as u64),
            ("connect.poll_interval_us", self.connect.poll_interval_us),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.kill_period_us >= self.send_period_us {
            return Err(ConfigError::KillNotShorterThanSend {
                kill_us: self.kill_period_us,
                send_us: self.send_period_us,
            });
        }
        if self.connect.max_poll_interval_us < self.connect.poll_interval_us {
            return Err(ConfigError::BackoffCapBelowInterval {
                initial_us: self.connect.poll_interval_us,
                max_us: self.connect.max_poll_interval_us,
            });
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    #[cfg(feature = "std")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    #[cfg(feature = "std")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }
}
