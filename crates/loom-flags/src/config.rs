// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registry configuration.
//!
//! Values come from three places, later ones winning:
//! 1. Built-in defaults
//! 2. A TOML `[flags]` section parsed into a [`RegistryConfigLayer`]
//! 3. Environment variables with the `LOOM_FLAGS_` prefix

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlagsError, Result};

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EVENT_WARN_DEPTH: usize = 1024;

const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "LOOM_FLAGS_SHUTDOWN_TIMEOUT_SECS";
const ENV_EVENT_WARN_DEPTH: &str = "LOOM_FLAGS_EVENT_WARN_DEPTH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfigLayer {
	pub shutdown_timeout_secs: Option<u64>,
	pub event_warn_depth: Option<usize>,
}

impl RegistryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.shutdown_timeout_secs.is_some() {
			self.shutdown_timeout_secs = other.shutdown_timeout_secs;
		}
		if other.event_warn_depth.is_some() {
			self.event_warn_depth = other.event_warn_depth;
		}
	}

	pub fn finalize(self) -> RegistryConfig {
		RegistryConfig {
			shutdown_timeout: Duration::from_secs(
				self.shutdown_timeout_secs
					.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
			),
			event_warn_depth: self.event_warn_depth.unwrap_or(DEFAULT_EVENT_WARN_DEPTH),
		}
	}

	/// Parses a layer from the contents of a `[flags]` TOML section.
	pub fn from_toml_str(contents: &str) -> Result<Self> {
		toml::from_str(contents).map_err(|e| FlagsError::Config(format!("invalid flags config: {e}")))
	}

	/// Reads the `LOOM_FLAGS_*` environment variables. Unset variables stay `None`.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		Ok(Self {
			shutdown_timeout_secs: parse_var(&lookup, ENV_SHUTDOWN_TIMEOUT_SECS)?,
			event_warn_depth: parse_var(&lookup, ENV_EVENT_WARN_DEPTH)?,
		})
	}
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match lookup(key) {
		None => Ok(None),
		Some(raw) => raw
			.trim()
			.parse()
			.map(Some)
			.map_err(|e| FlagsError::Config(format!("invalid {key}: {e}"))),
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
	/// Upper bound on how long `shutdown_all` waits for pending initialization
	/// and shutdown tasks.
	pub shutdown_timeout: Duration,
	/// Undelivered event count at which an emitter warns that its listener is
	/// falling behind. The queue itself is unbounded.
	pub event_warn_depth: usize,
}

impl RegistryConfig {
	/// Defaults overridden by `LOOM_FLAGS_*` environment variables.
	pub fn from_env() -> Result<Self> {
		Ok(RegistryConfigLayer::from_env()?.finalize())
	}
}

impl Default for RegistryConfig {
	fn default() -> Self {
		RegistryConfigLayer::default().finalize()
	}
}
