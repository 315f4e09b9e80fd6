// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider lifecycle event emission.
//!
//! Each provider embeds an [`EventEmitter`]. The orchestrator attaches exactly
//! one [`ProviderEventListener`] to it; the provider then announces transitions
//! with [`EventEmitter::emit`] or one of the per-event wrappers.
//!
//! Delivery never happens on the emitting thread. `emit` pushes onto an
//! unbounded channel and returns; a delivery task spawned at attach time
//! drains the channel and calls the listener. A provider may therefore emit
//! while holding its own locks, and a listener may emit again from inside its
//! callback, without deadlocking.
//!
//! ```text
//!   provider thread            delivery task
//!   ───────────────            ─────────────
//!   emit(READY) ──► channel ──► listener(provider, READY, details)
//!        │                            │
//!     returns                   emit(READY) ──► channel (re-entry is just another send)
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use loom_flags_core::{ProviderEvent, ProviderEventDetails};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::config::DEFAULT_EVENT_WARN_DEPTH;
use crate::error::{FlagsError, Result};
use crate::provider::{FeatureProvider, SharedProvider};

/// Receives lifecycle events from a provider's emitter.
///
/// Called from the emitter's delivery task, one event at a time and in emission
/// order. Keep it short; a slow listener only delays later events for the same
/// provider.
pub trait ProviderEventListener: Send + Sync + 'static {
	fn on_provider_event(
		&self,
		provider: &SharedProvider,
		event: ProviderEvent,
		details: &ProviderEventDetails,
	);
}

impl<F> ProviderEventListener for F
where
	F: Fn(&SharedProvider, ProviderEvent, &ProviderEventDetails) + Send + Sync + 'static,
{
	fn on_provider_event(
		&self,
		provider: &SharedProvider,
		event: ProviderEvent,
		details: &ProviderEventDetails,
	) {
		self(provider, event, details)
	}
}

/// Type alias for a shared event listener.
pub type SharedEventListener = Arc<dyn ProviderEventListener>;

fn same_listener(a: &SharedEventListener, b: &SharedEventListener) -> bool {
	Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

struct QueuedEvent {
	event: ProviderEvent,
	details: ProviderEventDetails,
}

struct Attachment {
	listener: SharedEventListener,
	sender: mpsc::UnboundedSender<QueuedEvent>,
	/// Events sent but not yet handed to the listener.
	backlog: Arc<AtomicUsize>,
	warn_depth: usize,
	task: JoinHandle<()>,
}

/// Forwards a provider's lifecycle events to a single attached listener.
pub struct EventEmitter {
	slot: Mutex<Option<Attachment>>,
	warn_depth: usize,
}

impl EventEmitter {
	pub fn new() -> Self {
		Self::with_warn_depth(DEFAULT_EVENT_WARN_DEPTH)
	}

	/// Creates an emitter that warns once every `warn_depth` undelivered events.
	pub fn with_warn_depth(warn_depth: usize) -> Self {
		Self {
			slot: Mutex::new(None),
			warn_depth: warn_depth.max(1),
		}
	}

	/// Attaches `listener` and starts delivering events for `provider`.
	///
	/// `provider` must be the provider that owns this emitter; it is held weakly
	/// and passed to the listener with every event. Attaching the listener that
	/// is already attached is a no-op. Attaching a different one fails with
	/// [`FlagsError::InvalidState`], as does attaching outside a tokio runtime.
	pub fn attach(&self, provider: &SharedProvider, listener: SharedEventListener) -> Result<()> {
		self.attach_with_warn_depth(provider, listener, self.warn_depth)
	}

	/// Like [`EventEmitter::attach`], but warns about a lagging listener every
	/// `warn_depth` undelivered events instead of the emitter's own setting.
	pub fn attach_with_warn_depth(
		&self,
		provider: &SharedProvider,
		listener: SharedEventListener,
		warn_depth: usize,
	) -> Result<()> {
		let mut slot = self.slot.lock();
		let same = slot.as_ref().map(|a| same_listener(&a.listener, &listener));
		match same {
			Some(true) => return Ok(()),
			Some(false) => {
				drop(slot);
				return Err(FlagsError::invalid_state(format!(
					"provider '{}' already has a different event listener attached",
					provider.metadata().name
				)));
			}
			None => {}
		}

		let runtime = Handle::try_current()
			.map_err(|_| FlagsError::invalid_state("event delivery requires a tokio runtime"))?;

		let (sender, receiver) = mpsc::unbounded_channel();
		let backlog = Arc::new(AtomicUsize::new(0));
		let task = runtime.spawn(deliver_events(
			Arc::downgrade(provider),
			Arc::clone(&listener),
			receiver,
			Arc::clone(&backlog),
		));

		*slot = Some(Attachment {
			listener,
			sender,
			backlog,
			warn_depth: warn_depth.max(1),
			task,
		});
		Ok(())
	}

	/// Stops delivery and clears the listener slot. Undelivered events are dropped.
	pub fn detach(&self) {
		if let Some(attachment) = self.slot.lock().take() {
			attachment.task.abort();
		}
	}

	pub fn is_attached(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Backlog size that triggers a warning for the current attachment, or the
	/// emitter's default when nothing is attached.
	pub fn warn_depth(&self) -> usize {
		self.slot
			.lock()
			.as_ref()
			.map_or(self.warn_depth, |attachment| attachment.warn_depth)
	}

	/// Queues `event` for the attached listener. Without a listener this is a no-op.
	pub fn emit(&self, event: ProviderEvent, details: ProviderEventDetails) {
		let (sender, backlog, warn_depth) = {
			let slot = self.slot.lock();
			match slot.as_ref() {
				Some(attachment) => (
					attachment.sender.clone(),
					Arc::clone(&attachment.backlog),
					attachment.warn_depth,
				),
				None => {
					trace!(event = %event, "No listener attached, dropping provider event");
					return;
				}
			}
		};

		let depth = backlog.fetch_add(1, Ordering::SeqCst) + 1;
		if depth % warn_depth == 0 {
			warn!(depth, event = %event, "Provider event listener is falling behind");
		}

		if sender.send(QueuedEvent { event, details }).is_err() {
			backlog.fetch_sub(1, Ordering::SeqCst);
			debug!(event = %event, "Event delivery task has stopped, dropping provider event");
		}
	}

	pub fn emit_ready(&self, details: ProviderEventDetails) {
		self.emit(ProviderEvent::Ready, details);
	}

	pub fn emit_configuration_changed(&self, details: ProviderEventDetails) {
		self.emit(ProviderEvent::ConfigurationChanged, details);
	}

	pub fn emit_stale(&self, details: ProviderEventDetails) {
		self.emit(ProviderEvent::Stale, details);
	}

	pub fn emit_error(&self, details: ProviderEventDetails) {
		self.emit(ProviderEvent::Error, details);
	}
}

impl Default for EventEmitter {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for EventEmitter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventEmitter")
			.field("attached", &self.is_attached())
			.field("warn_depth", &self.warn_depth)
			.finish()
	}
}

impl Drop for EventEmitter {
	fn drop(&mut self) {
		if let Some(attachment) = self.slot.get_mut().take() {
			attachment.task.abort();
		}
	}
}

/// Attaches `listener` to `provider`'s emitter.
///
/// Returns `Ok(false)` when the provider does not emit events.
pub fn attach_listener(provider: &SharedProvider, listener: SharedEventListener) -> Result<bool> {
	match provider.event_emitter() {
		Some(emitter) => emitter.attach(provider, listener).map(|()| true),
		None => Ok(false),
	}
}

async fn deliver_events(
	owner: Weak<dyn FeatureProvider>,
	listener: SharedEventListener,
	mut receiver: mpsc::UnboundedReceiver<QueuedEvent>,
	backlog: Arc<AtomicUsize>,
) {
	debug!("Provider event delivery started");

	while let Some(queued) = receiver.recv().await {
		backlog.fetch_sub(1, Ordering::SeqCst);

		let Some(provider) = owner.upgrade() else {
			debug!("Provider dropped, stopping event delivery");
			break;
		};

		let delivered = catch_unwind(AssertUnwindSafe(|| {
			listener.on_provider_event(&provider, queued.event, &queued.details)
		}));
		if delivered.is_err() {
			error!(
				provider = %provider.metadata().name,
				event = %queued.event,
				"Provider event listener panicked"
			);
		}
	}

	debug!("Provider event delivery stopped");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::NoOpProvider;
	use async_trait::async_trait;
	use loom_flags_core::{ErrorCode, ProviderMetadata, ProviderState};
	use std::time::Duration;
	use tokio_test::{assert_err, assert_ok};

	struct TestEventProvider {
		events: EventEmitter,
	}

	impl TestEventProvider {
		fn shared() -> (Arc<TestEventProvider>, SharedProvider) {
			let concrete = Arc::new(TestEventProvider {
				events: EventEmitter::new(),
			});
			let shared: SharedProvider = concrete.clone();
			(concrete, shared)
		}
	}

	#[async_trait]
	impl FeatureProvider for TestEventProvider {
		fn metadata(&self) -> ProviderMetadata {
			ProviderMetadata::new("TestEventProvider")
		}

		fn state(&self) -> ProviderState {
			ProviderState::Ready
		}

		fn event_emitter(&self) -> Option<&EventEmitter> {
			Some(&self.events)
		}
	}

	#[derive(Default)]
	struct RecordingListener {
		seen: Mutex<Vec<(ProviderEvent, ProviderEventDetails)>>,
	}

	impl ProviderEventListener for RecordingListener {
		fn on_provider_event(
			&self,
			_provider: &SharedProvider,
			event: ProviderEvent,
			details: &ProviderEventDetails,
		) {
			self.seen.lock().push((event, details.clone()));
		}
	}

	async fn wait_for(mut done: impl FnMut() -> bool) {
		tokio::time::timeout(Duration::from_secs(2), async {
			while !done() {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("condition not reached within 2s");
	}

	#[tokio::test]
	async fn emits_events_when_attached() {
		let (concrete, provider) = TestEventProvider::shared();
		let listener = Arc::new(RecordingListener::default());
		assert_ok!(concrete.events.attach(&provider, listener.clone()));

		let details = ProviderEventDetails::new().with_message("hello");
		concrete.events.emit(ProviderEvent::Ready, details.clone());
		concrete.events.emit_ready(details.clone());
		concrete.events.emit_configuration_changed(details.clone());
		concrete.events.emit_stale(details.clone());
		concrete.events.emit_error(details.clone().with_error_code(ErrorCode::General));

		wait_for(|| listener.seen.lock().len() == 5).await;

		let kinds: Vec<ProviderEvent> = listener.seen.lock().iter().map(|(e, _)| *e).collect();
		assert_eq!(
			kinds,
			vec![
				ProviderEvent::Ready,
				ProviderEvent::Ready,
				ProviderEvent::ConfigurationChanged,
				ProviderEvent::Stale,
				ProviderEvent::Error,
			]
		);
		assert_eq!(listener.seen.lock()[0].1, details);
		assert_eq!(listener.seen.lock()[4].1.error_code, Some(ErrorCode::General));
	}

	#[tokio::test]
	async fn does_nothing_when_not_attached() {
		let (concrete, _provider) = TestEventProvider::shared();

		concrete.events.emit_ready(ProviderEventDetails::new());
		concrete.events.emit_error(ProviderEventDetails::new());

		assert!(!concrete.events.is_attached());
	}

	#[tokio::test]
	async fn listener_receives_owning_provider() {
		let (concrete, provider) = TestEventProvider::shared();
		let received: Arc<Mutex<Option<SharedProvider>>> = Arc::new(Mutex::new(None));
		let sink = Arc::clone(&received);
		let listener: SharedEventListener =
			Arc::new(move |p: &SharedProvider, _e: ProviderEvent, _d: &ProviderEventDetails| {
				*sink.lock() = Some(Arc::clone(p));
			});
		assert_ok!(concrete.events.attach(&provider, listener));

		concrete.events.emit_stale(ProviderEventDetails::new());
		wait_for(|| received.lock().is_some()).await;

		let got = received.lock().clone().unwrap();
		assert!(crate::provider::same_provider(&got, &provider));
	}

	#[tokio::test]
	async fn rejects_second_different_listener() {
		let (concrete, provider) = TestEventProvider::shared();
		let first: SharedEventListener = Arc::new(RecordingListener::default());
		let second: SharedEventListener = Arc::new(RecordingListener::default());

		assert_ok!(concrete.events.attach(&provider, first));
		let err = assert_err!(concrete.events.attach(&provider, second));
		assert!(matches!(err, FlagsError::InvalidState(_)));
	}

	#[tokio::test]
	async fn same_listener_twice_is_noop() {
		let (concrete, provider) = TestEventProvider::shared();
		let listener = Arc::new(RecordingListener::default());
		let first: SharedEventListener = listener.clone();
		let again: SharedEventListener = listener.clone();

		assert_ok!(concrete.events.attach(&provider, first));
		assert_ok!(concrete.events.attach(&provider, again));

		concrete.events.emit_ready(ProviderEventDetails::new());
		wait_for(|| listener.seen.lock().len() == 1).await;
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(listener.seen.lock().len(), 1);
	}

	#[test]
	fn attach_outside_runtime_fails() {
		let (concrete, provider) = TestEventProvider::shared();
		let listener: SharedEventListener = Arc::new(RecordingListener::default());

		let result = concrete.events.attach(&provider, listener);
		assert!(matches!(result, Err(FlagsError::InvalidState(_))));
		assert!(!concrete.events.is_attached());
	}

	#[tokio::test]
	async fn detach_allows_new_listener() {
		let (concrete, provider) = TestEventProvider::shared();
		let first: SharedEventListener = Arc::new(RecordingListener::default());
		let second = Arc::new(RecordingListener::default());

		assert_ok!(concrete.events.attach(&provider, first));
		concrete.events.detach();
		assert!(!concrete.events.is_attached());

		assert_ok!(concrete.events.attach(&provider, second.clone()));
		concrete.events.emit_ready(ProviderEventDetails::new());
		wait_for(|| second.seen.lock().len() == 1).await;
	}

	#[tokio::test]
	async fn reentrant_emit_from_listener_does_not_deadlock() {
		let (concrete, provider) = TestEventProvider::shared();
		let calls = Arc::new(AtomicUsize::new(0));

		let counter = Arc::clone(&calls);
		let emitter_owner = Arc::clone(&concrete);
		let listener: SharedEventListener =
			Arc::new(move |_p: &SharedProvider, event: ProviderEvent, _d: &ProviderEventDetails| {
				let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
				if event == ProviderEvent::Ready && n == 1 {
					emitter_owner.events.emit_ready(ProviderEventDetails::new());
				}
			});
		assert_ok!(concrete.events.attach(&provider, listener));

		concrete.events.emit_ready(ProviderEventDetails::new());

		wait_for(|| calls.load(Ordering::SeqCst) == 2).await;
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn panicking_listener_keeps_delivering() {
		let (concrete, provider) = TestEventProvider::shared();
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let listener: SharedEventListener =
			Arc::new(move |_p: &SharedProvider, _e: ProviderEvent, _d: &ProviderEventDetails| {
				if counter.fetch_add(1, Ordering::SeqCst) == 0 {
					panic!("listener bug");
				}
			});
		assert_ok!(concrete.events.attach(&provider, listener));

		concrete.events.emit_ready(ProviderEventDetails::new());
		concrete.events.emit_stale(ProviderEventDetails::new());

		wait_for(|| calls.load(Ordering::SeqCst) == 2).await;
	}

	#[tokio::test]
	async fn attach_with_warn_depth_overrides_default() {
		let (concrete, provider) = TestEventProvider::shared();
		assert_eq!(concrete.events.warn_depth(), DEFAULT_EVENT_WARN_DEPTH);

		let listener = Arc::new(RecordingListener::default());
		assert_ok!(concrete.events.attach_with_warn_depth(&provider, listener.clone(), 0));
		assert_eq!(concrete.events.warn_depth(), 1);

		concrete.events.emit_ready(ProviderEventDetails::new());
		concrete.events.emit_stale(ProviderEventDetails::new());
		wait_for(|| listener.seen.lock().len() == 2).await;

		concrete.events.detach();
		assert_eq!(concrete.events.warn_depth(), DEFAULT_EVENT_WARN_DEPTH);
	}

	#[tokio::test]
	async fn attach_listener_skips_providers_without_emitter() {
		let provider: SharedProvider = Arc::new(NoOpProvider);
		let listener: SharedEventListener = Arc::new(RecordingListener::default());

		assert!(!assert_ok!(attach_listener(&provider, listener)));

		let (_concrete, emitting) = TestEventProvider::shared();
		let listener: SharedEventListener = Arc::new(RecordingListener::default());
		assert!(assert_ok!(attach_listener(&emitting, listener)));
	}
}
