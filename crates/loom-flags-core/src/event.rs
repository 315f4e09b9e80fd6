// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider lifecycle events.
//!
//! A provider announces state transitions through its event emitter. Each
//! announcement is a [`ProviderEvent`] plus a [`ProviderEventDetails`] payload.
//!
//! # Events
//!
//! - `PROVIDER_READY` - Provider finished initializing or recovered
//! - `PROVIDER_CONFIGURATION_CHANGED` - Flag configuration changed upstream
//! - `PROVIDER_STALE` - Cached data may be out of date
//! - `PROVIDER_ERROR` - Provider hit an error and may not evaluate correctly
//!
//! # Example
//!
//! ```
//! use loom_flags_core::{ProviderEvent, ProviderEventDetails};
//!
//! let details = ProviderEventDetails::new()
//!     .with_flags_changed(["checkout.new_flow"])
//!     .with_message("rules reloaded");
//!
//! assert_eq!(ProviderEvent::ConfigurationChanged.event_type(), "PROVIDER_CONFIGURATION_CHANGED");
//! assert_eq!(details.flags_changed, vec!["checkout.new_flow".to_string()]);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ErrorCode;

/// Kind of lifecycle event a provider can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderEvent {
	#[serde(rename = "PROVIDER_READY")]
	Ready,

	#[serde(rename = "PROVIDER_CONFIGURATION_CHANGED")]
	ConfigurationChanged,

	#[serde(rename = "PROVIDER_STALE")]
	Stale,

	#[serde(rename = "PROVIDER_ERROR")]
	Error,
}

impl ProviderEvent {
	/// Returns the event type name as a string.
	pub fn event_type(&self) -> &'static str {
		match self {
			ProviderEvent::Ready => "PROVIDER_READY",
			ProviderEvent::ConfigurationChanged => "PROVIDER_CONFIGURATION_CHANGED",
			ProviderEvent::Stale => "PROVIDER_STALE",
			ProviderEvent::Error => "PROVIDER_ERROR",
		}
	}
}

impl std::fmt::Display for ProviderEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.event_type())
	}
}

/// Payload accompanying a [`ProviderEvent`].
///
/// All fields are optional; an empty payload is valid for every event kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderEventDetails {
	/// Keys of flags whose configuration changed.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub flags_changed: Vec<String>,

	/// Human-readable explanation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,

	/// Set on `PROVIDER_ERROR` events.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_code: Option<ErrorCode>,

	/// Provider-specific extras.
	#[serde(default, skip_serializing_if = "HashMap::is_empty")]
	pub event_metadata: HashMap<String, serde_json::Value>,
}

impl ProviderEventDetails {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_flags_changed<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.flags_changed.extend(keys.into_iter().map(Into::into));
		self
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with_error_code(mut self, code: ErrorCode) -> Self {
		self.error_code = Some(code);
		self
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.event_metadata.insert(key.into(), value);
		self
	}
}
