// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Published policy tree.

use tracing::{info, instrument};
use uuid::Uuid;

use crate::context::Context;
use crate::error::{PolicyError, Result};
use crate::policy::{Node, NodeKind};
use crate::response::Response;

/// Root of a policy tree together with a version tag.
///
/// Every edit yields a new storage with a fresh tag. Hosts publish a storage
/// by swapping a shared reference; evaluations in flight keep the storage
/// they started with.
#[derive(Debug, Clone)]
pub struct PolicyStorage {
	root: Node,
	tag: Uuid,
}

impl PolicyStorage {
	pub fn new(root: impl Into<Node>) -> Self {
		Self {
			root: root.into(),
			tag: Uuid::new_v4(),
		}
	}

	pub fn root(&self) -> &Node {
		&self.root
	}

	pub fn tag(&self) -> Uuid {
		self.tag
	}

	pub fn calculate(&self, ctx: &Context) -> Response {
		self.root.calculate(ctx)
	}

	/// Adds or replaces `item` at `path`, relative to the root.
	///
	/// All segments but the last name nested policies; the last names the
	/// item itself.
	#[instrument(level = "debug", skip(self, item), fields(tag = %self.tag))]
	pub fn append(&self, path: &[&str], item: Node) -> Result<PolicyStorage> {
		let root = append_at(&self.root, path, item)?;
		Ok(self.published(root, "append"))
	}

	/// Removes the item at `path`, relative to the root.
	#[instrument(level = "debug", skip(self), fields(tag = %self.tag))]
	pub fn delete(&self, path: &[&str]) -> Result<PolicyStorage> {
		let root = delete_at(&self.root, path)?;
		Ok(self.published(root, "delete"))
	}

	fn published(&self, root: Node, edit: &str) -> PolicyStorage {
		let storage = PolicyStorage {
			root,
			tag: Uuid::new_v4(),
		};
		info!(edit, previous = %self.tag, tag = %storage.tag, "policy storage updated");
		storage
	}
}

fn append_at(node: &Node, path: &[&str], item: Node) -> Result<Node> {
	match path {
		[] => Err(PolicyError::TooShortPath),
		[_] => node.append(path, item),
		[first, rest @ ..] => {
			let child = nested(node, first)?;
			let updated = append_at(child, rest, item)?;
			node.append(&[*first], updated)
		}
	}
}

fn delete_at(node: &Node, path: &[&str]) -> Result<Node> {
	match path {
		[] => Err(PolicyError::TooShortPath),
		[_] => node.delete(path),
		[first, rest @ ..] => {
			let child = nested(node, first)?;
			let updated = delete_at(child, rest)?;
			node.append(&[*first], updated)
		}
	}
}

/// Child `id` of `node`, which must be an editable policy.
fn nested<'n>(node: &'n Node, id: &str) -> Result<&'n Node> {
	let policy = node.as_policy().ok_or(PolicyError::InvalidPolicyItemType {
		expected: NodeKind::Policy,
		actual: NodeKind::Rule,
	})?;
	policy.ensure_editable()?;

	policy.child(id).ok_or_else(|| PolicyError::MissingPolicyChild {
		parent: policy.id().unwrap_or_default().to_string(),
		child: id.to_string(),
	})
}
