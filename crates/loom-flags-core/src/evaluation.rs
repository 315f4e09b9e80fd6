// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Context handed to a provider when it initializes.
///
/// The orchestrator owns the context and passes a snapshot of it each time a
/// provider is registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
	/// Identifier of the subject flags are evaluated for (user, device, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub targeting_key: Option<String>,

	#[serde(default)]
	pub attributes: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
	pub fn new(targeting_key: impl Into<String>) -> Self {
		Self {
			targeting_key: Some(targeting_key.into()),
			attributes: HashMap::new(),
		}
	}

	pub fn with_targeting_key(mut self, targeting_key: impl Into<String>) -> Self {
		self.targeting_key = Some(targeting_key.into());
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
		self.attributes.get(key)
	}

	pub fn is_empty(&self) -> bool {
		self.targeting_key.is_none() && self.attributes.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_context_is_empty() {
		assert!(EvaluationContext::default().is_empty());
		assert!(!EvaluationContext::new("user123").is_empty());
	}

	#[test]
	fn attributes_are_overwritten_by_key() {
		let ctx = EvaluationContext::default()
			.with_attribute("plan", serde_json::json!("free"))
			.with_attribute("plan", serde_json::json!("enterprise"));

		assert_eq!(ctx.attribute("plan"), Some(&serde_json::json!("enterprise")));
		assert_eq!(ctx.attributes.len(), 1);
		assert!(ctx.attribute("missing").is_none());
	}

	#[test]
	fn targeting_key_is_omitted_when_absent() {
		let json = serde_json::to_value(EvaluationContext::default()).unwrap();
		assert_eq!(json, serde_json::json!({ "attributes": {} }));
	}
}
