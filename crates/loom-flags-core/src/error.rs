// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured provider errors.
//!
//! Every failure a provider reports carries an [`ErrorCode`], so callers can
//! tell a known provider condition apart from an unexpected fault.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Machine-readable classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	ProviderNotReady,
	FlagNotFound,
	ParseError,
	TypeMismatch,
	TargetingKeyMissing,
	InvalidContext,
	ProviderFatal,
	General,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ErrorCode::ProviderNotReady => "PROVIDER_NOT_READY",
			ErrorCode::FlagNotFound => "FLAG_NOT_FOUND",
			ErrorCode::ParseError => "PARSE_ERROR",
			ErrorCode::TypeMismatch => "TYPE_MISMATCH",
			ErrorCode::TargetingKeyMissing => "TARGETING_KEY_MISSING",
			ErrorCode::InvalidContext => "INVALID_CONTEXT",
			ErrorCode::ProviderFatal => "PROVIDER_FATAL",
			ErrorCode::General => "GENERAL",
		};
		f.write_str(s)
	}
}

/// An error raised by a provider, tagged with its [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
	#[error("provider not ready: {0}")]
	NotReady(String),

	#[error("flag not found: {0}")]
	FlagNotFound(String),

	#[error("parse error: {0}")]
	Parse(String),

	#[error("type mismatch: {0}")]
	TypeMismatch(String),

	#[error("targeting key missing: {0}")]
	TargetingKeyMissing(String),

	#[error("invalid context: {0}")]
	InvalidContext(String),

	#[error("provider fatal: {0}")]
	Fatal(String),

	#[error("general error: {0}")]
	General(String),
}

impl ProviderError {
	/// Create a general error
	pub fn general(msg: impl Into<String>) -> Self {
		Self::General(msg.into())
	}

	/// Create a type mismatch error
	pub fn type_mismatch(msg: impl Into<String>) -> Self {
		Self::TypeMismatch(msg.into())
	}

	/// Returns the code classifying this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::NotReady(_) => ErrorCode::ProviderNotReady,
			Self::FlagNotFound(_) => ErrorCode::FlagNotFound,
			Self::Parse(_) => ErrorCode::ParseError,
			Self::TypeMismatch(_) => ErrorCode::TypeMismatch,
			Self::TargetingKeyMissing(_) => ErrorCode::TargetingKeyMissing,
			Self::InvalidContext(_) => ErrorCode::InvalidContext,
			Self::Fatal(_) => ErrorCode::ProviderFatal,
			Self::General(_) => ErrorCode::General,
		}
	}

	/// Returns the message without the code prefix.
	pub fn message(&self) -> &str {
		match self {
			Self::NotReady(m)
			| Self::FlagNotFound(m)
			| Self::Parse(m)
			| Self::TypeMismatch(m)
			| Self::TargetingKeyMissing(m)
			| Self::InvalidContext(m)
			| Self::Fatal(m)
			| Self::General(m) => m,
		}
	}

	/// True when the provider cannot recover without being replaced.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Fatal(_))
	}
}
