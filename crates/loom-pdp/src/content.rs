// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local content: named data sets that selectors read during evaluation.
//!
//! The engine only looks content up; it never mutates a store. Hosts swap in
//! a new [`LocalContentStorage`] when content changes, and may use the
//! per-content version tag to detect stale readers.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::types::Type;
use crate::value::AttributeValue;

/// Read-only lookup of content items.
pub trait ContentStore: Send + Sync {
	fn lookup(&self, storage_id: &str, item_id: &str) -> Option<ContentRef>;
}

/// A content item together with the version tag of the content holding it.
#[derive(Debug, Clone)]
pub struct ContentRef {
	pub item: Arc<ContentItem>,
	pub tag: Option<Uuid>,
}

/// Node of a content item: a value or a string-keyed map of nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
	Value(AttributeValue),
	Map(HashMap<String, ContentNode>),
}

/// A typed content item.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
	ty: Type,
	root: ContentNode,
}

impl ContentItem {
	pub fn new(ty: Type, root: ContentNode) -> Self {
		Self { ty, root }
	}

	/// Item holding a single value.
	pub fn value(value: AttributeValue) -> Self {
		Self::new(value.ty(), ContentNode::Value(value))
	}

	/// Item holding a one-level map of values of the given type.
	pub fn map<K: Into<String>>(ty: Type, entries: impl IntoIterator<Item = (K, AttributeValue)>) -> Self {
		let map = entries
			.into_iter()
			.map(|(k, v)| (k.into(), ContentNode::Value(v)))
			.collect();
		Self::new(ty, ContentNode::Map(map))
	}

	pub fn ty(&self) -> &Type {
		&self.ty
	}

	/// Walks `path` through nested maps to a value.
	pub fn get(&self, path: &[String]) -> Option<&AttributeValue> {
		let mut node = &self.root;
		for key in path {
			match node {
				ContentNode::Map(map) => node = map.get(key)?,
				ContentNode::Value(_) => return None,
			}
		}

		match node {
			ContentNode::Value(v) => Some(v),
			ContentNode::Map(_) => None,
		}
	}
}

/// A named, versioned collection of content items.
#[derive(Debug, Clone)]
pub struct LocalContent {
	id: String,
	tag: Option<Uuid>,
	items: HashMap<String, Arc<ContentItem>>,
}

impl LocalContent {
	pub fn new(id: impl Into<String>, tag: Option<Uuid>) -> Self {
		Self {
			id: id.into(),
			tag,
			items: HashMap::new(),
		}
	}

	pub fn with_item(mut self, item_id: impl Into<String>, item: ContentItem) -> Self {
		self.items.insert(item_id.into(), Arc::new(item));
		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn tag(&self) -> Option<Uuid> {
		self.tag
	}

	pub fn item(&self, item_id: &str) -> Option<&Arc<ContentItem>> {
		self.items.get(item_id)
	}
}

/// In-memory content store.
///
/// Adding content returns a new storage; contents already handed out stay
/// valid for readers of the previous storage.
#[derive(Debug, Clone, Default)]
pub struct LocalContentStorage {
	contents: HashMap<String, Arc<LocalContent>>,
}

impl LocalContentStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a storage with `content` added, replacing any content with the same id.
	pub fn with_content(&self, content: LocalContent) -> Self {
		let mut contents = self.contents.clone();
		contents.insert(content.id.clone(), Arc::new(content));
		Self { contents }
	}

	pub fn get(&self, id: &str) -> Option<&Arc<LocalContent>> {
		self.contents.get(id)
	}
}

impl ContentStore for LocalContentStorage {
	fn lookup(&self, storage_id: &str, item_id: &str) -> Option<ContentRef> {
		let content = self.contents.get(storage_id)?;
		let item = content.item(item_id)?;
		Some(ContentRef {
			item: Arc::clone(item),
			tag: content.tag,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn storage() -> LocalContentStorage {
		let tag = Uuid::new_v4();
		let content = LocalContent::new("acl", Some(tag))
			.with_item(
				"roles",
				ContentItem::map(
					Type::String,
					[("alice", AttributeValue::string("admin"))],
				),
			)
			.with_item("mode", ContentItem::value(AttributeValue::string("strict")));
		LocalContentStorage::new().with_content(content)
	}

	#[test]
	fn looks_up_item_with_tag() {
		let s = storage();
		let found = s.lookup("acl", "roles").unwrap();
		assert_eq!(found.tag, s.get("acl").unwrap().tag());
		assert_eq!(
			found.item.get(&["alice".to_string()]),
			Some(&AttributeValue::string("admin"))
		);
	}

	#[test]
	fn missing_storage_or_item_is_none() {
		let s = storage();
		assert!(s.lookup("other", "roles").is_none());
		assert!(s.lookup("acl", "other").is_none());
	}

	#[test]
	fn path_must_end_on_a_value() {
		let s = storage();
		let roles = s.lookup("acl", "roles").unwrap();
		assert!(roles.item.get(&[]).is_none());
		assert!(roles.item.get(&["bob".to_string()]).is_none());

		let mode = s.lookup("acl", "mode").unwrap();
		assert_eq!(mode.item.get(&[]), Some(&AttributeValue::string("strict")));
		assert!(mode.item.get(&["x".to_string()]).is_none());
	}

	#[test]
	fn adding_content_keeps_previous_storage_intact() {
		let before = storage();
		let after = before.with_content(LocalContent::new("extra", None));
		assert!(before.get("extra").is_none());
		assert!(after.get("extra").is_some());
		assert!(after.get("acl").is_some());
	}
}
