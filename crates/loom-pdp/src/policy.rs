// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy tree.
//!
//! Trees are persistent: nodes are shared through [`Arc`] and never change
//! once built. [`Policy::append`] and [`Policy::delete`] return a new policy
//! that shares every untouched child with the old one, so readers holding
//! the old tree keep a consistent snapshot without any locking.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::algorithm::CombiningAlgorithm;
use crate::context::Context;
use crate::error::{PolicyError, Result};
use crate::response::Response;
use crate::rule::Rule;
use crate::target::Target;
use crate::value::{resolve_all, AttributeAssignment};

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	Rule,
	Policy,
}

/// A child of a policy: a rule or a nested policy.
#[derive(Debug, Clone)]
pub enum Node {
	Rule(Arc<Rule>),
	Policy(Arc<Policy>),
}

impl Node {
	pub fn id(&self) -> Option<&str> {
		match self {
			Node::Rule(r) => r.id(),
			Node::Policy(p) => p.id(),
		}
	}

	pub fn ord(&self) -> usize {
		match self {
			Node::Rule(r) => r.ord(),
			Node::Policy(p) => p.ord(),
		}
	}

	pub fn kind(&self) -> NodeKind {
		match self {
			Node::Rule(_) => NodeKind::Rule,
			Node::Policy(_) => NodeKind::Policy,
		}
	}

	pub fn is_hidden(&self) -> bool {
		self.id().is_none()
	}

	pub fn as_policy(&self) -> Option<&Arc<Policy>> {
		match self {
			Node::Policy(p) => Some(p),
			Node::Rule(_) => None,
		}
	}

	pub fn as_rule(&self) -> Option<&Arc<Rule>> {
		match self {
			Node::Rule(r) => Some(r),
			Node::Policy(_) => None,
		}
	}

	pub fn calculate(&self, ctx: &Context) -> Response {
		match self {
			Node::Rule(r) => r.calculate(ctx),
			Node::Policy(p) => p.calculate(ctx),
		}
	}

	/// Single-segment edit of a nested policy. Rules can't be edited.
	pub(crate) fn append(&self, path: &[&str], item: Node) -> Result<Node> {
		match self {
			Node::Policy(p) => p.append(path, item).map(Node::from),
			Node::Rule(_) => Err(PolicyError::InvalidPolicyItemType {
				expected: NodeKind::Policy,
				actual: NodeKind::Rule,
			}),
		}
	}

	pub(crate) fn delete(&self, path: &[&str]) -> Result<Node> {
		match self {
			Node::Policy(p) => p.delete(path).map(Node::from),
			Node::Rule(_) => Err(PolicyError::InvalidPolicyItemType {
				expected: NodeKind::Policy,
				actual: NodeKind::Rule,
			}),
		}
	}

	fn with_ord(&self, ord: usize) -> Node {
		if self.ord() == ord {
			return self.clone();
		}
		match self {
			Node::Rule(r) => Node::Rule(Arc::new(r.with_ord(ord))),
			Node::Policy(p) => Node::Policy(Arc::new(p.with_ord(ord))),
		}
	}
}

impl From<Rule> for Node {
	fn from(rule: Rule) -> Self {
		Node::Rule(Arc::new(rule))
	}
}

impl From<Policy> for Node {
	fn from(policy: Policy) -> Self {
		Node::Policy(Arc::new(policy))
	}
}

/// Interior node of the tree.
///
/// All children of a policy have the same kind. A policy without an id is
/// hidden and rejects every edit.
#[derive(Debug, Clone)]
pub struct Policy {
	ord: usize,
	id: Option<String>,
	target: Target,
	child_kind: NodeKind,
	children: Vec<Node>,
	algorithm: CombiningAlgorithm,
	obligations: Vec<AttributeAssignment>,
}

impl Policy {
	/// Starts a policy whose children are rules.
	pub fn rules(id: impl Into<String>) -> PolicyBuilder {
		PolicyBuilder::new(Some(id.into()), NodeKind::Rule)
	}

	/// Starts a policy whose children are policies.
	pub fn policies(id: impl Into<String>) -> PolicyBuilder {
		PolicyBuilder::new(Some(id.into()), NodeKind::Policy)
	}

	pub fn ord(&self) -> usize {
		self.ord
	}

	pub fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	pub fn is_hidden(&self) -> bool {
		self.id.is_none()
	}

	pub fn target(&self) -> &Target {
		&self.target
	}

	pub fn child_kind(&self) -> NodeKind {
		self.child_kind
	}

	pub fn children(&self) -> &[Node] {
		&self.children
	}

	pub fn child(&self, id: &str) -> Option<&Node> {
		self.children.iter().find(|c| c.id() == Some(id))
	}

	pub fn algorithm(&self) -> &CombiningAlgorithm {
		&self.algorithm
	}

	pub fn obligations(&self) -> &[AttributeAssignment] {
		&self.obligations
	}

	fn display_id(&self) -> &str {
		self.id.as_deref().unwrap_or("hidden")
	}

	fn with_ord(&self, ord: usize) -> Policy {
		Policy { ord, ..self.clone() }
	}

	/// Evaluates the policy.
	///
	/// An inapplicable target short-circuits to NotApplicable. Otherwise the
	/// combining algorithm decides, and a Permit or Deny gains the policy's
	/// own obligations after those of the deciding children.
	#[instrument(
		level = "debug",
		skip_all,
		fields(id = self.display_id(), algorithm = self.algorithm.name(), children = self.children.len())
	)]
	pub fn calculate(&self, ctx: &Context) -> Response {
		let m = self.target.evaluate(ctx);
		if !m.matched {
			debug!(status = ?m.status, "policy target not matched");
			return Response::not_applicable(m.status);
		}

		let mut response = self.algorithm.combine(&self.children, ctx);
		if response.effect.is_decision() && !self.obligations.is_empty() {
			match resolve_all(&self.obligations, ctx) {
				Ok(obligations) => response.obligations.extend(obligations),
				Err(e) => {
					debug!(error = %e, "policy obligation failed");
					return Response::indeterminate(e);
				}
			}
		}

		debug!(effect = %response.effect, "policy calculated");
		response
	}

	/// Adds or replaces the direct child named by `path`.
	///
	/// `path` must hold exactly one segment, the id of `item`; any other
	/// segment fails with [`PolicyError::MismatchedChildId`]. A child with
	/// that id is replaced and keeps its position; otherwise `item` goes last
	/// with its position set to the current number of children.
	#[instrument(level = "debug", skip(self, item), fields(id = self.display_id()))]
	pub fn append(&self, path: &[&str], item: Node) -> Result<Policy> {
		self.ensure_editable()?;
		let child_id = single_segment(path)?;

		if item.kind() != self.child_kind {
			return Err(PolicyError::InvalidPolicyItemType {
				expected: self.child_kind,
				actual: item.kind(),
			});
		}

		if item.id() != Some(child_id) {
			return Err(PolicyError::MismatchedChildId {
				path: child_id.to_string(),
				item: item.id().map(str::to_string),
			});
		}

		let mut children = self.children.clone();
		match children.iter().position(|c| c.id() == Some(child_id)) {
			Some(i) => {
				let ord = children[i].ord();
				children[i] = item.with_ord(ord);
				debug!(child = child_id, ord, "child replaced");
			}
			None => {
				let ord = children.len();
				children.push(item.with_ord(ord));
				debug!(child = child_id, ord, "child appended");
			}
		}

		Ok(self.rebuilt(children))
	}

	/// Removes the direct child named by `path`. Remaining children keep
	/// their positions.
	#[instrument(level = "debug", skip(self), fields(id = self.display_id()))]
	pub fn delete(&self, path: &[&str]) -> Result<Policy> {
		self.ensure_editable()?;
		let child_id = single_segment(path)?;

		let i = self
			.children
			.iter()
			.position(|c| c.id() == Some(child_id))
			.ok_or_else(|| PolicyError::MissingPolicyChild {
				parent: self.display_id().to_string(),
				child: child_id.to_string(),
			})?;

		let mut children = self.children.clone();
		children.remove(i);
		debug!(child = child_id, "child deleted");
		Ok(self.rebuilt(children))
	}

	/// Writes the policy as JSON with `depth` generations of children.
	///
	/// Children are only ever listed by position and id, so any depth of one
	/// or more gives the same output.
	pub fn marshal_with_depth<W: io::Write>(&self, writer: W, depth: i32) -> Result<()> {
		if depth < 0 {
			return Err(PolicyError::InvalidMarshalDepth(depth));
		}

		let children: Vec<ChildSummary<'_>> = if depth == 0 {
			Vec::new()
		} else {
			self
				.children
				.iter()
				.map(|c| ChildSummary {
					ord: c.ord(),
					id: c.id(),
				})
				.collect()
		};

		let (rules, policies) = match self.child_kind {
			NodeKind::Rule => (Some(children), None),
			NodeKind::Policy => (None, Some(children)),
		};

		let summary = PolicySummary {
			ord: self.ord,
			id: self.id(),
			rules,
			policies,
		};
		serde_json::to_writer(writer, &summary)?;
		Ok(())
	}

	pub(crate) fn ensure_editable(&self) -> Result<()> {
		if self.is_hidden() {
			return Err(PolicyError::HiddenPolicyModification);
		}
		Ok(())
	}

	fn rebuilt(&self, children: Vec<Node>) -> Policy {
		Policy {
			ord: self.ord,
			id: self.id.clone(),
			target: self.target.clone(),
			child_kind: self.child_kind,
			algorithm: self.algorithm.rebuild(&children),
			children,
			obligations: self.obligations.clone(),
		}
	}
}

fn single_segment<'p>(path: &[&'p str]) -> Result<&'p str> {
	match path {
		[] => Err(PolicyError::TooShortPath),
		[id] => Ok(*id),
		_ => Err(PolicyError::TooLongPath(
			path.iter().map(|s| s.to_string()).collect(),
		)),
	}
}

#[derive(Serialize)]
struct ChildSummary<'a> {
	ord: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	id: Option<&'a str>,
}

#[derive(Serialize)]
struct PolicySummary<'a> {
	ord: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	id: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	rules: Option<Vec<ChildSummary<'a>>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	policies: Option<Vec<ChildSummary<'a>>>,
}

/// Builder for [`Policy`].
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
	id: Option<String>,
	target: Target,
	child_kind: NodeKind,
	children: Vec<Node>,
	algorithm: CombiningAlgorithm,
	obligations: Vec<AttributeAssignment>,
}

impl PolicyBuilder {
	fn new(id: Option<String>, child_kind: NodeKind) -> Self {
		Self {
			id,
			target: Target::default(),
			child_kind,
			children: Vec::new(),
			algorithm: CombiningAlgorithm::default(),
			obligations: Vec::new(),
		}
	}

	/// Drops the id, making the policy hidden.
	pub fn hidden(mut self) -> Self {
		self.id = None;
		self
	}

	pub fn target(mut self, target: Target) -> Self {
		self.target = target;
		self
	}

	pub fn algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
		self.algorithm = algorithm;
		self
	}

	pub fn obligation(mut self, obligation: AttributeAssignment) -> Self {
		self.obligations.push(obligation);
		self
	}

	pub fn child(mut self, child: impl Into<Node>) -> Self {
		self.children.push(child.into());
		self
	}

	/// Builds the policy, numbering children by position.
	pub fn build(self) -> Result<Policy> {
		let mut children = Vec::with_capacity(self.children.len());
		for (ord, child) in self.children.iter().enumerate() {
			if child.kind() != self.child_kind {
				return Err(PolicyError::InvalidPolicyItemType {
					expected: self.child_kind,
					actual: child.kind(),
				});
			}
			children.push(child.with_ord(ord));
		}

		Ok(Policy {
			ord: 0,
			id: self.id,
			target: self.target,
			child_kind: self.child_kind,
			algorithm: self.algorithm.rebuild(&children),
			children,
			obligations: self.obligations,
		})
	}
}
