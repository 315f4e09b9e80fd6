// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flag provider runtime for Loom.
//!
//! This crate manages the lifecycle of pluggable flag providers on behalf of a
//! feature flag client: which provider serves which domain, when providers are
//! initialized and shut down, and how providers announce state changes.
//!
//! # Features
//!
//! - **Domain bindings**: A default provider plus any number of named domains,
//!   swapped atomically and readable from any thread
//! - **Managed lifecycle**: Initialization inline or on a background task pool,
//!   shutdown of providers once nothing references them
//! - **Structured outcomes**: Every set/initialize/shutdown is reported through
//!   a single [`LifecycleObserver`]
//! - **Provider events**: A per-provider [`EventEmitter`] that delivers events on
//!   its own task, so providers and listeners can emit freely
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_flags::{EvaluationContext, LifecycleEvent, ProviderRegistry, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ProviderRegistry::with_config(RegistryConfig::from_env()?);
//!
//!     let observer = Arc::new(|event: LifecycleEvent| {
//!         tracing::info!(outcome = event.kind(), "provider lifecycle");
//!     });
//!
//!     registry
//!         .set_default_provider(my_provider(), EvaluationContext::default(), observer, true)
//!         .await?;
//!
//!     let provider = registry.provider(Some("checkout"));
//!
//!     registry.shutdown_all().await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod lifecycle;
mod provider;
mod registry;

pub use config::{
	RegistryConfig, RegistryConfigLayer, DEFAULT_EVENT_WARN_DEPTH, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use error::{FlagsError, Result};
pub use events::{attach_listener, EventEmitter, ProviderEventListener, SharedEventListener};
pub use lifecycle::{
	LifecycleEvent, LifecycleObserver, NoOpLifecycleObserver, SharedLifecycleObserver,
};
pub use provider::{same_provider, FeatureProvider, NoOpProvider, SharedProvider};
pub use registry::ProviderRegistry;

// Re-export core types for convenience
pub use loom_flags_core::{
	ErrorCode, EvaluationContext, ProviderError, ProviderEvent, ProviderEventDetails,
	ProviderMetadata, ProviderState,
};
