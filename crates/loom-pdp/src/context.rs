// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request context.
//!
//! A [`Context`] maps attribute ids to typed values. It is built once, either
//! from a decoder callback or from a wire buffer, and is read-only afterwards,
//! so a single context can be shared by any number of concurrent evaluations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::content::{ContentRef, ContentStore};
use crate::error::{EvalError, WireError};
use crate::types::{Type, TypeRegistry};
use crate::value::AttributeValue;
use crate::wire::{RequestReader, WireLimits};

/// Values stored under one attribute id.
///
/// Almost every id carries a single value; only ids reused with different
/// types pay for a per-type map.
#[derive(Debug, Clone)]
enum AttributeSlot {
	Single(AttributeValue),
	ByType(HashMap<Type, AttributeValue>),
}

impl AttributeSlot {
	fn insert(&mut self, value: AttributeValue) {
		match self {
			AttributeSlot::Single(existing) if existing.ty() == value.ty() => *existing = value,
			AttributeSlot::Single(existing) => {
				let mut by_type = HashMap::with_capacity(2);
				let previous = std::mem::replace(existing, AttributeValue::Undefined);
				by_type.insert(previous.ty(), previous);
				by_type.insert(value.ty(), value);
				*self = AttributeSlot::ByType(by_type);
			}
			AttributeSlot::ByType(by_type) => {
				by_type.insert(value.ty(), value);
			}
		}
	}

	fn get(&self, ty: &Type) -> Option<&AttributeValue> {
		match self {
			AttributeSlot::Single(v) => ty.matches(&v.ty()).then_some(v),
			AttributeSlot::ByType(by_type) => by_type
				.get(ty)
				.or_else(|| by_type.iter().find(|(t, _)| ty.matches(t)).map(|(_, v)| v)),
		}
	}
}

/// Immutable set of request attributes.
#[derive(Clone, Default)]
pub struct Context {
	attributes: HashMap<String, AttributeSlot>,
	content: Option<Arc<dyn ContentStore>>,
}

impl Context {
	/// Context without attributes or content.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Builds a context by calling `decoder` for every index in `0..count`.
	///
	/// The first decoder error aborts construction and is returned as is.
	/// A later attribute with the same id and type replaces the earlier one;
	/// attributes sharing an id with different types are all kept.
	#[instrument(level = "debug", skip(decoder, content))]
	pub fn build<F, E>(
		count: usize,
		mut decoder: F,
		content: Option<Arc<dyn ContentStore>>,
	) -> Result<Context, E>
	where
		F: FnMut(usize) -> Result<(String, AttributeValue), E>,
	{
		let mut attributes: HashMap<String, AttributeSlot> = HashMap::with_capacity(count);
		for i in 0..count {
			let (id, value) = decoder(i)?;
			match attributes.get_mut(&id) {
				Some(slot) => slot.insert(value),
				None => {
					attributes.insert(id, AttributeSlot::Single(value));
				}
			}
		}

		debug!(attributes = attributes.len(), "context built");
		Ok(Context {
			attributes,
			content,
		})
	}

	/// Builds a context from a request in wire format.
	#[instrument(level = "debug", skip_all, fields(size = bytes.len()))]
	pub fn from_wire(
		bytes: &[u8],
		registry: &TypeRegistry,
		limits: &WireLimits,
		content: Option<Arc<dyn ContentStore>>,
	) -> Result<Context, WireError> {
		let mut reader = RequestReader::new(bytes, registry, limits)?;
		let ctx = Context::build(reader.count(), |i| reader.next_attribute(i), content)?;
		reader.finish()?;
		Ok(ctx)
	}

	/// Returns the attribute `id` if present with a type matching `ty`.
	pub fn get(&self, id: &str, ty: &Type) -> Result<&AttributeValue, EvalError> {
		self
			.attributes
			.get(id)
			.and_then(|slot| slot.get(ty))
			.ok_or_else(|| EvalError::MissingAttribute {
				id: id.to_string(),
				ty: ty.to_string(),
			})
	}

	/// Looks up a content item in the attached store.
	pub fn get_content(&self, storage_id: &str, item_id: &str) -> Result<ContentRef, EvalError> {
		let store = self.content.as_ref().ok_or(EvalError::MissingContentStore)?;
		store
			.lookup(storage_id, item_id)
			.ok_or_else(|| EvalError::MissingContentItem {
				storage: storage_id.to_string(),
				item: item_id.to_string(),
			})
	}

	/// Number of distinct attribute ids.
	pub fn len(&self) -> usize {
		self.attributes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.attributes.is_empty()
	}
}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("attributes", &self.attributes)
			.field("content", &self.content.is_some())
			.finish()
	}
}
