// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle outcomes reported by the registry.
//!
//! Every `set_provider` call reports what happened to the providers involved
//! through a single [`LifecycleObserver`]. The orchestrator uses these reports
//! to rebroadcast application-level events without the registry knowing about
//! any wider event bus.
//!
//! | Outcome | When |
//! |---------|------|
//! | [`LifecycleEvent::Set`] | A provider instance not bound anywhere was bound, before initialization |
//! | [`LifecycleEvent::Initialized`] | `initialize` succeeded |
//! | [`LifecycleEvent::Errored`] | `initialize` failed; the error is always structured |
//! | [`LifecycleEvent::Shutdown`] | The replaced provider was orphaned and its shutdown was scheduled |

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use loom_flags_core::ProviderError;
use tracing::error;

use crate::provider::SharedProvider;

/// Outcome of a registry operation for one provider.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
	Set(SharedProvider),
	Initialized(SharedProvider),
	Shutdown(SharedProvider),
	Errored(SharedProvider, ProviderError),
}

impl LifecycleEvent {
	/// The provider this outcome is about.
	pub fn provider(&self) -> &SharedProvider {
		match self {
			Self::Set(p) | Self::Initialized(p) | Self::Shutdown(p) | Self::Errored(p, _) => p,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::Set(_) => "set",
			Self::Initialized(_) => "initialized",
			Self::Shutdown(_) => "shutdown",
			Self::Errored(_, _) => "errored",
		}
	}
}

/// Receives [`LifecycleEvent`]s from the registry.
///
/// `Set` is always delivered on the task that called `set_provider`. The other
/// outcomes arrive on that task when waiting for initialization and on a pool
/// task otherwise. Implementations should return quickly.
pub trait LifecycleObserver: Send + Sync + 'static {
	fn on_lifecycle_event(&self, event: LifecycleEvent);
}

impl<F> LifecycleObserver for F
where
	F: Fn(LifecycleEvent) + Send + Sync + 'static,
{
	fn on_lifecycle_event(&self, event: LifecycleEvent) {
		self(event)
	}
}

/// Type alias for a shared lifecycle observer.
pub type SharedLifecycleObserver = Arc<dyn LifecycleObserver>;

/// An observer that discards all outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLifecycleObserver;

impl LifecycleObserver for NoOpLifecycleObserver {
	fn on_lifecycle_event(&self, _event: LifecycleEvent) {}
}

/// Delivers `event`, logging instead of unwinding if the observer panics so the
/// registry can finish the operation.
pub(crate) fn notify(observer: &SharedLifecycleObserver, event: LifecycleEvent) {
	let kind = event.kind();
	let name = event.provider().metadata().name;
	if catch_unwind(AssertUnwindSafe(|| observer.on_lifecycle_event(event))).is_err() {
		error!(provider = %name, outcome = kind, "Lifecycle observer panicked");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::NoOpProvider;
	use parking_lot::Mutex;

	#[test]
	fn closure_observer_receives_events() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let observer: SharedLifecycleObserver =
			Arc::new(move |event: LifecycleEvent| sink.lock().push(event.kind()));

		let provider: SharedProvider = Arc::new(NoOpProvider);
		notify(&observer, LifecycleEvent::Set(provider.clone()));
		notify(&observer, LifecycleEvent::Initialized(provider));

		assert_eq!(*seen.lock(), vec!["set", "initialized"]);
	}

	#[test]
	fn panicking_observer_is_contained() {
		let observer: SharedLifecycleObserver =
			Arc::new(|_event: LifecycleEvent| panic!("observer bug"));
		let provider: SharedProvider = Arc::new(NoOpProvider);

		notify(&observer, LifecycleEvent::Shutdown(provider));
	}

	#[test]
	fn errored_exposes_provider_and_error() {
		let provider: SharedProvider = Arc::new(NoOpProvider);
		let event = LifecycleEvent::Errored(provider.clone(), ProviderError::general("boom"));

		assert!(crate::provider::same_provider(event.provider(), &provider));
		assert_eq!(event.kind(), "errored");
	}
}
