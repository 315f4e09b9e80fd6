// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The feature provider capability.
//!
//! A provider is the pluggable backend that actually evaluates flags (a remote
//! flag service, a local file, ...). This runtime only cares about its
//! lifecycle: readiness state, initialization, shutdown, and the optional
//! [`EventEmitter`] it uses to announce state transitions.
//!
//! # Example
//!
//! ```ignore
//! use loom_flags::{
//!     EvaluationContext, EventEmitter, FeatureProvider, ProviderEventDetails, ProviderMetadata,
//!     ProviderState,
//! };
//! use async_trait::async_trait;
//! use parking_lot::Mutex;
//!
//! struct FileProvider {
//!     state: Mutex<ProviderState>,
//!     events: EventEmitter,
//! }
//!
//! #[async_trait]
//! impl FeatureProvider for FileProvider {
//!     fn metadata(&self) -> ProviderMetadata {
//!         ProviderMetadata::new("file")
//!     }
//!
//!     fn state(&self) -> ProviderState {
//!         *self.state.lock()
//!     }
//!
//!     async fn initialize(&self, _ctx: &EvaluationContext) -> anyhow::Result<()> {
//!         // load flags from disk
//!         *self.state.lock() = ProviderState::Ready;
//!         self.events.emit_ready(ProviderEventDetails::new());
//!         Ok(())
//!     }
//!
//!     fn event_emitter(&self) -> Option<&EventEmitter> {
//!         Some(&self.events)
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use loom_flags_core::{EvaluationContext, ProviderMetadata, ProviderState};

use crate::events::EventEmitter;

/// A pluggable flag backend whose lifecycle is managed by the
/// [`crate::ProviderRegistry`].
///
/// Providers are compared by identity (the shared allocation), never by value.
#[async_trait]
pub trait FeatureProvider: Send + Sync + 'static {
	fn metadata(&self) -> ProviderMetadata;

	/// Current readiness. `initialize` is only called while this is
	/// [`ProviderState::NotReady`].
	fn state(&self) -> ProviderState;

	/// Prepares the provider for evaluation.
	///
	/// Return a [`loom_flags_core::ProviderError`] (wrapped in `anyhow`) to report a
	/// known failure; any other error is reported as
	/// [`loom_flags_core::ProviderError::General`].
	async fn initialize(&self, _context: &EvaluationContext) -> anyhow::Result<()> {
		Ok(())
	}

	/// Releases resources. Called at most once, after the provider is no
	/// longer bound anywhere. Failures are logged by the registry.
	async fn shutdown(&self) -> anyhow::Result<()> {
		Ok(())
	}

	/// The emitter this provider announces lifecycle events through, if any.
	fn event_emitter(&self) -> Option<&EventEmitter> {
		None
	}
}

/// Type alias for a shared provider.
pub type SharedProvider = Arc<dyn FeatureProvider>;

impl std::fmt::Debug for dyn FeatureProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FeatureProvider")
			.field("name", &self.metadata().name)
			.finish()
	}
}

/// Returns true when both handles point at the same provider instance.
pub fn same_provider(a: &SharedProvider, b: &SharedProvider) -> bool {
	// Data addresses only; vtable pointers are not unique per type.
	Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Provider installed in the default slot before anything else is set.
///
/// Always ready; holds no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProvider;

impl NoOpProvider {
	pub const NAME: &'static str = "No-op Provider";
}

#[async_trait]
impl FeatureProvider for NoOpProvider {
	fn metadata(&self) -> ProviderMetadata {
		ProviderMetadata::new(Self::NAME)
	}

	fn state(&self) -> ProviderState {
		ProviderState::Ready
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_is_by_instance() {
		let a: SharedProvider = Arc::new(NoOpProvider);
		let b: SharedProvider = Arc::new(NoOpProvider);
		let a2 = Arc::clone(&a);

		assert!(same_provider(&a, &a2));
		assert!(!same_provider(&a, &b));
	}

	#[tokio::test]
	async fn noop_provider_is_ready_and_silent() {
		let provider: SharedProvider = Arc::new(NoOpProvider);

		assert_eq!(provider.state(), ProviderState::Ready);
		assert_eq!(provider.metadata().name, NoOpProvider::NAME);
		assert!(provider.event_emitter().is_none());
		assert!(provider.initialize(&EvaluationContext::default()).await.is_ok());
		assert!(provider.shutdown().await.is_ok());
	}

	#[test]
	fn debug_shows_provider_name() {
		let provider: SharedProvider = Arc::new(NoOpProvider);
		assert!(format!("{provider:?}").contains(NoOpProvider::NAME));
	}
}
