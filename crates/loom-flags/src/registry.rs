// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider bindings and their lifecycle.
//!
//! The [`ProviderRegistry`] maps the default slot and named domains to provider
//! instances. Setting a provider swaps the binding atomically, initializes the
//! new provider on the registry's task pool (optionally waiting for it) and
//! shuts down the previous occupant once nothing references it anymore.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_flags::{EvaluationContext, LifecycleEvent, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! let observer = Arc::new(|event: LifecycleEvent| {
//!     println!("{} {}", event.kind(), event.provider().metadata().name);
//! });
//!
//! // Bind a provider to the "checkout" domain and wait until it is initialized.
//! registry
//!     .set_provider("checkout", provider, EvaluationContext::default(), observer, true)
//!     .await?;
//!
//! let p = registry.provider(Some("checkout"));
//! ```

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures::FutureExt;
use loom_flags_core::{EvaluationContext, ProviderError};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RegistryConfig;
use crate::error::{FlagsError, Result};
use crate::events::SharedEventListener;
use crate::lifecycle::{notify, LifecycleEvent, SharedLifecycleObserver};
use crate::provider::{same_provider, NoOpProvider, SharedProvider};

/// Thread-safe mapping from the default slot and named domains to providers.
///
/// Cloning the registry yields another handle to the same bindings.
#[derive(Clone)]
pub struct ProviderRegistry {
	inner: Arc<RegistryInner>,
}

struct RegistryInner {
	default_provider: ArcSwap<SharedProvider>,
	providers: DashMap<String, SharedProvider>,
	/// Pool for background initialization and shutdown.
	tasks: TaskTracker,
	closed: AtomicBool,
	config: RegistryConfig,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::with_config(RegistryConfig::default())
	}

	pub fn with_config(config: RegistryConfig) -> Self {
		let noop: SharedProvider = Arc::new(NoOpProvider);
		Self {
			inner: Arc::new(RegistryInner {
				default_provider: ArcSwap::from_pointee(noop),
				providers: DashMap::new(),
				tasks: TaskTracker::new(),
				closed: AtomicBool::new(false),
				config,
			}),
		}
	}

	pub fn config(&self) -> &RegistryConfig {
		&self.inner.config
	}

	pub fn default_provider(&self) -> SharedProvider {
		self.inner.load_default()
	}

	/// Returns the provider bound to `domain`, or the default provider when the
	/// domain is `None` or unbound.
	pub fn provider(&self, domain: Option<&str>) -> SharedProvider {
		let bound = domain.and_then(|d| self.inner.providers.get(d).map(|e| e.value().clone()));
		bound.unwrap_or_else(|| self.inner.load_default())
	}

	/// All domains currently bound to this provider instance.
	pub fn domains_for_provider(&self, provider: &SharedProvider) -> Vec<String> {
		self.inner
			.providers
			.iter()
			.filter(|entry| same_provider(entry.value(), provider))
			.map(|entry| entry.key().clone())
			.collect()
	}

	/// Snapshot of every bound domain.
	pub fn bound_domains(&self) -> HashSet<String> {
		self.inner
			.providers
			.iter()
			.map(|entry| entry.key().clone())
			.collect()
	}

	pub fn is_default_provider(&self, provider: &SharedProvider) -> bool {
		same_provider(&self.inner.load_default(), provider)
	}

	/// True when the instance is bound to the default slot or any domain.
	pub fn is_registered(&self, provider: &SharedProvider) -> bool {
		self.inner.is_registered(provider)
	}

	/// True once [`ProviderRegistry::shutdown_all`] has run.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Attaches `listener` to `provider`'s emitter with this registry's
	/// `event_warn_depth`.
	///
	/// Returns `Ok(false)` when the provider does not emit events.
	pub fn attach_listener(
		&self,
		provider: &SharedProvider,
		listener: SharedEventListener,
	) -> Result<bool> {
		match provider.event_emitter() {
			Some(emitter) => emitter
				.attach_with_warn_depth(provider, listener, self.inner.config.event_warn_depth)
				.map(|()| true),
			None => Ok(false),
		}
	}

	/// Replaces the default provider.
	///
	/// See [`ProviderRegistry::set_provider`] for the sequence of lifecycle
	/// outcomes reported to `observer`.
	#[instrument(skip_all, fields(provider = %provider.metadata().name, wait_for_init = wait_for_init))]
	pub async fn set_default_provider(
		&self,
		provider: SharedProvider,
		context: EvaluationContext,
		observer: SharedLifecycleObserver,
		wait_for_init: bool,
	) -> Result<()> {
		self.ensure_open()?;
		self.prepare_and_initialize(None, provider, context, observer, wait_for_init)
			.await;
		Ok(())
	}

	/// Binds `provider` to `domain`.
	///
	/// 1. Reports [`LifecycleEvent::Set`] on the calling task if the instance is
	///    not registered anywhere yet.
	/// 2. Swaps the binding, keeping the previous occupant.
	/// 3. Initializes the provider with `context` on the registry's task pool if
	///    its state is `NotReady`, reporting `Initialized` or `Errored`. With
	///    `wait_for_init` the call returns after this and step 4 are done; the
	///    work still completes if the returned future is dropped early.
	/// 4. Shuts the previous occupant down and reports `Shutdown` if it is no
	///    longer bound anywhere.
	///
	/// Initialization failures are never returned; they arrive as
	/// [`LifecycleEvent::Errored`]. An empty domain is rejected with
	/// [`FlagsError::InvalidArgument`] before anything changes.
	#[instrument(skip_all, fields(domain = %domain, provider = %provider.metadata().name, wait_for_init = wait_for_init))]
	pub async fn set_provider(
		&self,
		domain: &str,
		provider: SharedProvider,
		context: EvaluationContext,
		observer: SharedLifecycleObserver,
		wait_for_init: bool,
	) -> Result<()> {
		if domain.is_empty() {
			return Err(FlagsError::invalid_argument("domain cannot be empty"));
		}
		self.ensure_open()?;
		self.prepare_and_initialize(Some(domain), provider, context, observer, wait_for_init)
			.await;
		Ok(())
	}

	/// Shuts down every distinct bound provider, clears all domain bindings and
	/// drains the task pool.
	///
	/// Failures are logged per provider. Calling this again is a no-op.
	#[instrument(skip(self))]
	pub async fn shutdown_all(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			debug!("Provider registry already shut down");
			return;
		}

		let mut distinct = vec![self.inner.load_default()];
		for entry in self.inner.providers.iter() {
			if !distinct.iter().any(|p| same_provider(p, entry.value())) {
				distinct.push(entry.value().clone());
			}
		}
		self.inner.providers.clear();

		info!(provider_count = distinct.len(), "Shutting down feature providers");
		for provider in distinct {
			self.inner.spawn_shutdown(provider);
		}

		self.inner.tasks.close();
		let timeout = self.inner.config.shutdown_timeout;
		if tokio::time::timeout(timeout, self.inner.tasks.wait())
			.await
			.is_err()
		{
			warn!(
				timeout_secs = timeout.as_secs(),
				pending = self.inner.tasks.len(),
				"Timed out waiting for provider tasks to finish"
			);
		}

		info!("Provider registry shut down");
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(FlagsError::RegistryClosed);
		}
		Ok(())
	}

	async fn prepare_and_initialize(
		&self,
		domain: Option<&str>,
		provider: SharedProvider,
		context: EvaluationContext,
		observer: SharedLifecycleObserver,
		wait_for_init: bool,
	) {
		if !self.inner.is_registered(&provider) {
			notify(&observer, LifecycleEvent::Set(provider.clone()));
		}

		let old = match domain {
			Some(domain) => self
				.inner
				.providers
				.insert(domain.to_string(), provider.clone()),
			None => Some(self.inner.swap_default(provider.clone())),
		};
		debug!(replaced = old.is_some(), "Provider bound");

		// Runs on the pool; dropping this future does not cancel it.
		let inner = Arc::clone(&self.inner);
		let task = self.inner.tasks.spawn(async move {
			inner
				.initialize_provider(provider, old, context, observer)
				.await;
		});

		if wait_for_init {
			if let Err(e) = task.await {
				error!(error = %e, "Provider initialization task failed");
			}
		}
	}
}

impl Default for ProviderRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for ProviderRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProviderRegistry")
			.field("default_provider", &self.inner.load_default())
			.field("domains", &self.bound_domains())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl RegistryInner {
	fn load_default(&self) -> SharedProvider {
		let guard = self.default_provider.load();
		SharedProvider::clone(&guard)
	}

	fn swap_default(&self, provider: SharedProvider) -> SharedProvider {
		let old = self.default_provider.swap(Arc::new(provider));
		SharedProvider::clone(&old)
	}

	fn is_registered(&self, provider: &SharedProvider) -> bool {
		same_provider(&self.load_default(), provider)
			|| self
				.providers
				.iter()
				.any(|entry| same_provider(entry.value(), provider))
	}

	async fn initialize_provider(
		&self,
		provider: SharedProvider,
		old: Option<SharedProvider>,
		context: EvaluationContext,
		observer: SharedLifecycleObserver,
	) {
		let name = provider.metadata().name;
		if self.closed.load(Ordering::SeqCst) {
			debug!(provider = %name, "Registry shut down before initialization ran, skipping");
			return;
		}

		let state = provider.state();
		if state.needs_initialization() {
			match run_initialize(&provider, &context).await {
				Ok(()) => {
					info!(provider = %name, "Feature provider initialized");
					notify(&observer, LifecycleEvent::Initialized(provider.clone()));
				}
				Err(e) => {
					error!(provider = %name, error = %e, code = %e.code(), "Failed to initialize feature provider");
					notify(&observer, LifecycleEvent::Errored(provider.clone(), e));
				}
			}
		} else {
			debug!(provider = %name, state = %state, "Provider already initialized, skipping");
		}

		if let Some(old) = old {
			self.shut_down_if_orphaned(old, &observer);
		}
	}

	fn shut_down_if_orphaned(&self, old: SharedProvider, observer: &SharedLifecycleObserver) {
		// After shutdown_all every binding has already been shut down.
		if self.closed.load(Ordering::SeqCst) || self.is_registered(&old) {
			return;
		}
		self.spawn_shutdown(old.clone());
		notify(observer, LifecycleEvent::Shutdown(old));
	}

	fn spawn_shutdown(&self, provider: SharedProvider) {
		self.tasks.spawn(shutdown_provider(provider));
	}
}

async fn run_initialize(
	provider: &SharedProvider,
	context: &EvaluationContext,
) -> std::result::Result<(), ProviderError> {
	match AssertUnwindSafe(provider.initialize(context))
		.catch_unwind()
		.await
	{
		Ok(Ok(())) => Ok(()),
		Ok(Err(e)) => Err(into_provider_error(e)),
		Err(panic) => Err(ProviderError::general(format!(
			"initialize panicked: {}",
			panic_message(panic.as_ref())
		))),
	}
}

async fn shutdown_provider(provider: SharedProvider) {
	let name = provider.metadata().name;
	match AssertUnwindSafe(provider.shutdown()).catch_unwind().await {
		Ok(Ok(())) => debug!(provider = %name, "Feature provider shut down"),
		Ok(Err(e)) => error!(provider = %name, error = %e, "Failed to shut down feature provider"),
		Err(panic) => error!(
			provider = %name,
			panic = %panic_message(panic.as_ref()),
			"Feature provider panicked during shutdown"
		),
	}
}

/// Keeps provider-raised errors intact and wraps everything else as `General`.
fn into_provider_error(err: anyhow::Error) -> ProviderError {
	match err.downcast::<ProviderError>() {
		Ok(e) => e,
		Err(other) => ProviderError::general(format!("{other:#}")),
	}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}
