// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the policy decision point.
//!
//! Errors are split by where they surface:
//!
//! - [`TypeError`]: flags type construction and type registry lookups
//! - [`EvalError`]: evaluation statuses carried inside a [`crate::Response`]
//! - [`PolicyError`]: structural tree edits and tree marshaling
//! - [`WireError`]: request decoding and response encoding

use thiserror::Error;

use crate::policy::NodeKind;

/// Result type for policy tree operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors raised while defining types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
	#[error("can't create flags type \"{0}\": the name duplicates a built-in type")]
	DuplicatesBuiltinType(String),

	#[error("can't create flags type \"{0}\": no flags defined")]
	NoFlagsDefined(String),

	#[error("can't create flags type \"{name}\": {count} flags defined, at most 64 allowed")]
	TooManyFlagsDefined { name: String, count: usize },

	#[error("can't create flags type \"{name}\": flag \"{flag}\" defined more than once")]
	DuplicateFlagName { name: String, flag: String },

	#[error("flags type \"{name}\" has no flag \"{flag}\"")]
	UnknownFlag { name: String, flag: String },

	#[error("type \"{0}\" is already registered")]
	DuplicateCustomType(String),

	#[error("unknown type \"{0}\"")]
	UnknownType(String),
}

/// Errors produced during evaluation.
///
/// These values travel as the status of a response, so they are cheap to
/// clone and their `Display` output is the status message put on the wire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
	#[error("missing attribute \"{id}\" of type \"{ty}\"")]
	MissingAttribute { id: String, ty: String },

	#[error("no content store attached to the context")]
	MissingContentStore,

	#[error("missing content item \"{item}\" in storage \"{storage}\"")]
	MissingContentItem { storage: String, item: String },

	#[error("missing key \"{key}\" in content item \"{item}\" of storage \"{storage}\"")]
	MissingContentKey {
		storage: String,
		item: String,
		key: String,
	},

	#[error("content item \"{item}\" of storage \"{storage}\" holds \"{actual}\" but \"{expected}\" was requested")]
	ContentTypeMismatch {
		storage: String,
		item: String,
		expected: String,
		actual: String,
	},

	#[error("function \"{function}\" expects {expected} arguments but got {actual}")]
	ArgumentCount {
		function: &'static str,
		expected: usize,
		actual: usize,
	},

	#[error("function \"{function}\" can't take \"{actual}\" as argument {position}")]
	InvalidArgument {
		function: &'static str,
		position: usize,
		actual: String,
	},

	#[error("mapper can't dispatch on a value of type \"{0}\"")]
	InvalidMapperArgument(String),

	#[error("mapper argument selects {0} children and no sub-algorithm is configured")]
	AmbiguousMapping(usize),

	#[error("obligation \"{id}\": {source}")]
	Obligation { id: String, source: Box<EvalError> },

	#[error("{}", render_multiple(.0))]
	Multiple(Vec<EvalError>),
}

impl EvalError {
	/// Collapses a list of failures into a single status.
	///
	/// Nested aggregates are flattened so every message is quoted once.
	pub fn aggregate(errors: impl IntoIterator<Item = EvalError>) -> Option<EvalError> {
		let mut flat = Vec::new();
		for err in errors {
			match err {
				EvalError::Multiple(inner) => flat.extend(inner),
				other => flat.push(other),
			}
		}

		match flat.len() {
			0 => None,
			1 => flat.pop(),
			_ => Some(EvalError::Multiple(flat)),
		}
	}

	/// Returns true for failures that mean "attribute not available".
	pub fn is_missing_attribute(&self) -> bool {
		matches!(self, EvalError::MissingAttribute { .. })
	}
}

/// Renders `multiple errors: "m1", "m2"`.
pub(crate) fn render_multiple<T: std::fmt::Display>(messages: impl IntoIterator<Item = T>) -> String {
	let parts: Vec<String> = messages.into_iter().map(|m| format!("\"{m}\"")).collect();
	format!("multiple errors: {}", parts.join(", "))
}

/// Errors raised by structural tree operations.
#[derive(Debug, Error)]
pub enum PolicyError {
	#[error("can't modify hidden item")]
	HiddenPolicyModification,

	#[error("path is too short")]
	TooShortPath,

	#[error("path is too long: {}", .0.join("/"))]
	TooLongPath(Vec<String>),

	#[error("expected {expected:?} as child item but got {actual:?}")]
	InvalidPolicyItemType { expected: NodeKind, actual: NodeKind },

	/// The single path segment of a policy-level edit is the id of the
	/// appended item; `item` is that item's id, `None` when hidden.
	#[error("path addresses \"{path}\" but the item is {}", describe_item(.item))]
	MismatchedChildId { path: String, item: Option<String> },

	#[error("\"{parent}\" has no child \"{child}\"")]
	MissingPolicyChild { parent: String, child: String },

	#[error("flags mapper argument must have a flags type, got \"{0}\"")]
	InvalidFlagsMapperArgument(String),

	#[error("expected non-negative depth but got {0}")]
	InvalidMarshalDepth(i32),

	#[error("marshal error: {0}")]
	Marshal(#[from] serde_json::Error),
}

fn describe_item(item: &Option<String>) -> String {
	match item {
		Some(id) => format!("\"{id}\""),
		None => "hidden".to_string(),
	}
}

/// Errors raised by the binary request/response codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
	#[error("unexpected end of buffer at offset {offset}: need {needed} more bytes")]
	UnexpectedEnd { offset: usize, needed: usize },

	#[error("unsupported wire version {0}")]
	UnsupportedVersion(u16),

	#[error("request of {size} bytes exceeds limit of {limit} bytes")]
	RequestTooLarge { size: usize, limit: usize },

	#[error("request carries {count} attributes, limit is {limit}")]
	TooManyAttributes { count: usize, limit: usize },

	#[error("attribute {index}: {source}")]
	Attribute {
		index: usize,
		source: Box<WireError>,
	},

	#[error("unknown type tag {0}")]
	UnknownTypeTag(u8),

	#[error("invalid UTF-8 in string value")]
	InvalidUtf8,

	#[error("invalid domain name \"{0}\"")]
	InvalidDomain(String),

	#[error("invalid network prefix length {0}")]
	InvalidPrefix(u8),

	#[error("{what} of length {len} exceeds maximum of {max}")]
	TooLong {
		what: &'static str,
		len: usize,
		max: usize,
	},

	#[error("unknown flags type \"{0}\"")]
	UnknownFlagsType(String),

	#[error("flags type \"{name}\" has capacity {expected} bits but value is encoded with {actual}")]
	FlagsWidthMismatch {
		name: String,
		expected: u32,
		actual: u32,
	},

	#[error("flags value {value:#x} sets bits undefined by type \"{name}\"")]
	InvalidFlagsValue { name: String, value: u64 },

	#[error("can't marshal value of type \"{0}\"")]
	UnsupportedValueType(String),

	#[error("unknown effect code {0}")]
	UnknownEffect(u8),

	#[error("{0} trailing bytes after last entry")]
	TrailingBytes(usize),

	#[error("buffer of {available} bytes is too small, {required} bytes required")]
	BufferOverflow { required: usize, available: usize },
}

impl WireError {
	pub(crate) fn at(self, index: usize) -> WireError {
		WireError::Attribute {
			index,
			source: Box::new(self),
		}
	}
}
