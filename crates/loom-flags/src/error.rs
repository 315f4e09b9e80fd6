// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, FlagsError>;

/// Errors returned synchronously by the registry and event emitter.
///
/// Initialization and shutdown failures never show up here; they are reported
/// through [`crate::LifecycleEvent::Errored`] or logged.
#[derive(Debug, Error)]
pub enum FlagsError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("invalid state: {0}")]
	InvalidState(String),

	#[error("provider registry has been shut down")]
	RegistryClosed,

	#[error("configuration error: {0}")]
	Config(String),
}

impl FlagsError {
	pub fn invalid_argument(msg: impl Into<String>) -> Self {
		Self::InvalidArgument(msg.into())
	}

	pub fn invalid_state(msg: impl Into<String>) -> Self {
		Self::InvalidState(msg.into())
	}
}
