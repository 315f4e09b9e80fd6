// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Readiness of a provider, owned by the provider itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
	#[default]
	NotReady,
	Ready,
	Error,
	Stale,
	Fatal,
}

impl ProviderState {
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready)
	}

	/// Only a provider that has never been initialized gets `initialize` called.
	pub fn needs_initialization(&self) -> bool {
		matches!(self, Self::NotReady)
	}
}

impl std::fmt::Display for ProviderState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Self::NotReady => "NOT_READY",
			Self::Ready => "READY",
			Self::Error => "ERROR",
			Self::Stale => "STALE",
			Self::Fatal => "FATAL",
		};
		f.write_str(s)
	}
}

/// Descriptive information about a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// e.g., "loom-remote", "file"
	pub name: String,
}

impl ProviderMetadata {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_state_is_not_ready() {
		let state = ProviderState::default();
		assert!(state.needs_initialization());
		assert!(!state.is_ready());
	}

	#[test]
	fn only_not_ready_needs_initialization() {
		for state in [
			ProviderState::Ready,
			ProviderState::Error,
			ProviderState::Stale,
			ProviderState::Fatal,
		] {
			assert!(!state.needs_initialization(), "{state}");
		}
	}

	#[test]
	fn state_serializes_like_display() {
		let json = serde_json::to_string(&ProviderState::NotReady).unwrap();
		assert_eq!(json, format!("\"{}\"", ProviderState::NotReady));
	}
}
