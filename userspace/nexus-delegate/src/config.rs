// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for servicing threads.
//!
//! ```toml
//! tick_hz = 1000
//! dispatch_timeout_ticks = 100  # omit to wait forever, 0 to poll
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nexus_ipc::Wait;
use serde::Deserialize;
use thiserror::Error;

/// Kernel tick frequency assumed when none is configured.
pub const DEFAULT_TICK_HZ: u32 = 1000;

/// Errors raised while loading a [`DelegateConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read delegate config {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse delegate config {path}: {source}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
    /// The values parsed but are out of range.
    #[error("invalid delegate config: {0}")]
    Invalid(&'static str),
}

/// Tick rate and default dispatch wait of a servicing thread.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelegateConfig {
    /// Kernel tick frequency used to convert ticks into wall time.
    pub tick_hz: u32,
    /// Default dispatch wait in ticks. `None` waits forever, `Some(0)` polls.
    pub dispatch_timeout_ticks: Option<u64>,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self { tick_hz: DEFAULT_TICK_HZ, dispatch_timeout_ticks: None }
    }
}

impl DelegateConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, Path::new("<inline>"))
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be greater than zero"));
        }
        Ok(())
    }

    /// Wall-clock length of `ticks` at the configured tick rate, rounded up to
    /// whole nanoseconds so a wait never ends early.
    pub fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let hz = u128::from(self.tick_hz.max(1));
        let nanos = (u128::from(ticks) * 1_000_000_000).div_ceil(hz);
        let secs = nanos / 1_000_000_000;
        match u64::try_from(secs) {
            Ok(secs) => Duration::new(secs, (nanos % 1_000_000_000) as u32),
            Err(_) => Duration::MAX,
        }
    }

    /// Dispatch wait derived from `dispatch_timeout_ticks`.
    pub fn dispatch_wait(&self) -> Wait {
        match self.dispatch_timeout_ticks {
            None => Wait::Blocking,
            Some(0) => Wait::NonBlocking,
            Some(ticks) => Wait::Timeout(self.ticks_to_duration(ticks)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DelegateConfig::from_toml_str("").unwrap();
        assert_eq!(config, DelegateConfig::default());
        assert_eq!(config.dispatch_wait(), Wait::Blocking);
    }

    #[test]
    fn ticks_map_to_waits() {
        let config =
            DelegateConfig::from_toml_str("tick_hz = 100\ndispatch_timeout_ticks = 25\n").unwrap();
        assert_eq!(config.dispatch_wait(), Wait::Timeout(Duration::from_millis(250)));

        let poll = DelegateConfig { dispatch_timeout_ticks: Some(0), ..config };
        assert_eq!(poll.dispatch_wait(), Wait::NonBlocking);
    }

    #[test]
    fn tick_conversion_rounds_up() {
        let config = DelegateConfig { tick_hz: 3, dispatch_timeout_ticks: None };
        assert_eq!(config.ticks_to_duration(1), Duration::from_nanos(333_333_334));
        assert_eq!(config.ticks_to_duration(3), Duration::from_secs(1));
        assert_eq!(config.ticks_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn zero_tick_rate_rejected() {
        let err = DelegateConfig::from_toml_str("tick_hz = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = DelegateConfig::from_toml_str("tick_hz = 10\npriority = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_hz = 10000").unwrap();
        writeln!(file, "dispatch_timeout_ticks = 5").unwrap();
        let config = DelegateConfig::load(file.path()).unwrap();
        assert_eq!(config.dispatch_wait(), Wait::Timeout(Duration::from_micros(500)));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delegate.toml");
        match DelegateConfig::load(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
