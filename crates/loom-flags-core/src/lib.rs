// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom feature flags provider runtime.
//!
//! This crate provides the value types shared by flag providers and the
//! runtime that manages them (`loom-flags`). It has no async runtime
//! dependency, so provider implementations can depend on it alone.
//!
//! # Overview
//!
//! - [`ProviderState`] - readiness state machine owned by each provider
//! - [`ProviderEvent`] / [`ProviderEventDetails`] - lifecycle announcements
//! - [`EvaluationContext`] - context passed to providers at initialization
//! - [`ProviderError`] / [`ErrorCode`] - structured provider failures
//!
//! # Example
//!
//! ```
//! use loom_flags_core::{EvaluationContext, ErrorCode, ProviderError, ProviderState};
//!
//! let ctx = EvaluationContext::new("user123")
//!     .with_attribute("plan", serde_json::json!("enterprise"));
//!
//! let err = ProviderError::Fatal("credentials revoked".to_string());
//! assert_eq!(err.code(), ErrorCode::ProviderFatal);
//! assert!(ProviderState::NotReady.needs_initialization());
//! ```

pub mod error;
pub mod evaluation;
pub mod event;
pub mod state;

pub use error::{ErrorCode, ProviderError, Result};
pub use evaluation::EvaluationContext;
pub use event::{ProviderEvent, ProviderEventDetails};
pub use state::{ProviderMetadata, ProviderState};
